use std::cell::RefCell;
use std::rc::Rc;

use vellum_core::{
    Directive, DirectiveInstance, NodeDef, NodeFlags, Provider, SimpleChanges, Token, Value,
    ViewError, ViewResult,
};

/// Shared, ordered record of lifecycle hook calls.
#[derive(Clone, Debug, Default)]
pub struct HookLog {
    entries: Rc<RefCell<Vec<String>>>,
}

impl HookLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token() -> Token {
        Token::of::<HookLog>()
    }

    /// Module provider that makes this log injectable by [`HookRecorder`]s.
    pub fn provider(&self) -> Provider {
        Provider::value(Self::token(), Value::from_rc(Rc::new(self.clone())))
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Directive that writes `"<name>.<hook>"` to the injected [`HookLog`] for
/// every lifecycle hook it receives.
pub struct HookRecorder {
    name: String,
    log: HookLog,
}

impl HookRecorder {
    /// Directive node registered for every lifecycle hook. Each recorder
    /// gets its own token so several can share an element.
    pub fn node(name: &str) -> NodeDef {
        Self::node_with_hooks(name, NodeFlags::LIFECYCLE_HOOKS)
    }

    pub fn node_with_hooks(name: &str, hooks: NodeFlags) -> NodeDef {
        let owned = name.to_string();
        NodeDef::directive(
            Token::new(name),
            vec![HookLog::token().into()],
            move |args| {
                let log = args
                    .first()
                    .and_then(|value| value.downcast::<HookLog>())
                    .ok_or_else(|| ViewError::illegal_state("no HookLog provided"))?;
                Ok(DirectiveInstance::new(HookRecorder {
                    name: owned.clone(),
                    log: (*log).clone(),
                }))
            },
        )
        .with_hooks(hooks)
    }

    fn record(&self, hook: &str) -> ViewResult<()> {
        self.log.record(format!("{}.{hook}", self.name));
        Ok(())
    }
}

impl Directive for HookRecorder {
    fn on_changes(&mut self, changes: &SimpleChanges) -> ViewResult<()> {
        let mut names: Vec<&String> = changes.keys().collect();
        names.sort();
        let names: Vec<&str> = names.into_iter().map(String::as_str).collect();
        self.record(&format!("on_changes({})", names.join(",")))
    }

    fn on_init(&mut self) -> ViewResult<()> {
        self.record("on_init")
    }

    fn do_check(&mut self) -> ViewResult<()> {
        self.record("do_check")
    }

    fn after_content_init(&mut self) -> ViewResult<()> {
        self.record("after_content_init")
    }

    fn after_content_checked(&mut self) -> ViewResult<()> {
        self.record("after_content_checked")
    }

    fn after_view_init(&mut self) -> ViewResult<()> {
        self.record("after_view_init")
    }

    fn after_view_checked(&mut self) -> ViewResult<()> {
        self.record("after_view_checked")
    }

    fn on_destroy(&mut self) -> ViewResult<()> {
        self.record("on_destroy")
    }
}
