//! Fixtures shared by the unit test modules.

use crate::app::{EnvironmentBuilder, ErrorHandler};
use crate::config::EngineConfig;
use crate::di::Injector;
use crate::error::{ViewError, ViewResult};
use crate::render::{MemoryRenderer, MemoryRendererFactory, RNode};
use crate::value::Value;
use crate::view::{
    create_root_view, resolve_definition, Environment, RootContext, ViewDefinitionFactory, ViewRef,
};
use std::cell::RefCell;
use std::rc::Rc;

thread_local! {
    static LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Appends to the per-thread event log.
pub fn log(entry: impl Into<String>) {
    LOG.with(|l| l.borrow_mut().push(entry.into()));
}

pub fn take_log() -> Vec<String> {
    LOG.with(|l| std::mem::take(&mut *l.borrow_mut()))
}

/// Clones the injected handle at `index` out of a directive factory's
/// arguments.
pub fn dep<T: Clone + 'static>(args: &[Value], index: usize) -> ViewResult<T> {
    args.get(index)
        .and_then(|value| value.downcast::<T>())
        .map(|rc| (*rc).clone())
        .ok_or_else(|| ViewError::illegal_state(format!("dependency {index} has the wrong type")))
}

#[derive(Default)]
pub struct CollectingErrorHandler {
    pub errors: RefCell<Vec<String>>,
}

impl ErrorHandler for CollectingErrorHandler {
    fn handle_error(&self, error: &ViewError) {
        self.errors.borrow_mut().push(error.to_string());
    }
}

pub struct Harness {
    pub factory: MemoryRendererFactory,
    pub renderer: MemoryRenderer,
    pub errors: Rc<CollectingErrorHandler>,
    pub env: Environment,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_injector(injector: Rc<dyn Injector>) -> Self {
        Self::build(Some(injector))
    }

    fn build(injector: Option<Rc<dyn Injector>>) -> Self {
        take_log();
        let factory = MemoryRendererFactory::new();
        let renderer = factory.renderer();
        let errors = Rc::new(CollectingErrorHandler::default());
        let mut builder = EnvironmentBuilder::new(Rc::new(factory.clone()))
            .error_handler(errors.clone())
            .config(EngineConfig::development());
        if let Some(injector) = injector {
            builder = builder.injector(injector);
        }
        Self {
            factory,
            renderer,
            errors,
            env: builder.build(),
        }
    }

    pub fn root_view(&self, def: ViewDefinitionFactory, context: Value) -> ViewRef {
        self.try_root_view(def, context).expect("root view")
    }

    pub fn try_root_view(&self, def: ViewDefinitionFactory, context: Value) -> ViewResult<ViewRef> {
        let root = RootContext::new(self.env.clone(), None, Vec::new());
        create_root_view(root, resolve_definition(def)?, context)
    }

    /// First root node of `view`, the host element most tests wrap their
    /// templates in.
    pub fn host(&self, view: &ViewRef) -> RNode {
        view.root_nodes()[0]
    }

    pub fn text(&self, view: &ViewRef) -> String {
        self.renderer.text_content(self.host(view))
    }
}
