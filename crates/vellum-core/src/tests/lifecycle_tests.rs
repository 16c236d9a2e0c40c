use crate::directive::{Directive, Pipe, SimpleChanges};
use crate::error::ViewError;
use crate::test_support::{dep, log, take_log, Harness};
use crate::value::Value;
use crate::token::Token;
use crate::view::{ChangeDetectorRef, NodeDef, NodeFlags, ViewDefinition};
use crate::ViewResult;

struct Hooked {
    name: &'static str,
}

impl Hooked {
    fn node(name: &'static str) -> NodeDef {
        NodeDef::directive(crate::Token::new(name), vec![], move |_| {
            Ok(crate::DirectiveInstance::new(Hooked { name }))
        })
        .with_hooks(NodeFlags::LIFECYCLE_HOOKS)
    }

    fn log(&self, hook: &str) {
        log(format!("{}.{hook}", self.name));
    }
}

impl Directive for Hooked {
    fn on_changes(&mut self, _changes: &SimpleChanges) -> ViewResult<()> {
        self.log("on_changes");
        Ok(())
    }

    fn on_init(&mut self) -> ViewResult<()> {
        self.log("on_init");
        Ok(())
    }

    fn do_check(&mut self) -> ViewResult<()> {
        self.log("do_check");
        Ok(())
    }

    fn after_content_init(&mut self) -> ViewResult<()> {
        self.log("after_content_init");
        Ok(())
    }

    fn after_content_checked(&mut self) -> ViewResult<()> {
        self.log("after_content_checked");
        Ok(())
    }

    fn after_view_init(&mut self) -> ViewResult<()> {
        self.log("after_view_init");
        Ok(())
    }

    fn after_view_checked(&mut self) -> ViewResult<()> {
        self.log("after_view_checked");
        Ok(())
    }

    fn on_destroy(&mut self) -> ViewResult<()> {
        self.log("on_destroy");
        Ok(())
    }
}

fn nested_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::element("div", 3),
        NodeDef::element("span", 1),
        Hooked::node("child"),
        Hooked::node("parent"),
    ])
    .build()
}

#[test]
fn hooks_run_in_order_with_content_and_view_hooks_child_first() {
    let h = Harness::new();
    let view = h.root_view(nested_view, Value::Null);

    view.detect_changes().unwrap();
    assert_eq!(
        take_log(),
        vec![
            "child.on_init",
            "child.do_check",
            "parent.on_init",
            "parent.do_check",
            "child.after_content_init",
            "child.after_content_checked",
            "parent.after_content_init",
            "parent.after_content_checked",
            "child.after_view_init",
            "child.after_view_checked",
            "parent.after_view_init",
            "parent.after_view_checked",
        ]
    );

    view.detect_changes().unwrap();
    assert_eq!(
        take_log(),
        vec![
            "child.do_check",
            "parent.do_check",
            "child.after_content_checked",
            "parent.after_content_checked",
            "child.after_view_checked",
            "parent.after_view_checked",
        ]
    );

    view.destroy().unwrap();
    assert_eq!(take_log(), vec!["child.on_destroy", "parent.on_destroy"]);
}

#[test]
fn no_changes_pass_runs_no_hooks() {
    let h = Harness::new();
    let view = h.root_view(nested_view, Value::Null);
    view.detect_changes().unwrap();
    take_log();

    view.check_no_changes().unwrap();
    assert!(take_log().is_empty());
}

fn inner_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![NodeDef::element("span", 1), Hooked::node("inner")]).build()
}

fn component_host_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::element("div", 2),
        NodeDef::element("app-inner", 1).with_component(inner_view, None),
        Hooked::node("cmp").component(),
    ])
    .build()
}

#[test]
fn component_views_are_checked_between_content_and_view_hooks() {
    let h = Harness::new();
    let view = h.root_view(component_host_view, Value::Null);

    view.detect_changes().unwrap();
    assert_eq!(
        take_log(),
        vec![
            "cmp.on_init",
            "cmp.do_check",
            "cmp.after_content_init",
            "cmp.after_content_checked",
            "inner.on_init",
            "inner.do_check",
            "inner.after_content_init",
            "inner.after_content_checked",
            "inner.after_view_init",
            "inner.after_view_checked",
            "cmp.after_view_init",
            "cmp.after_view_checked",
        ]
    );

    view.destroy().unwrap();
    assert_eq!(take_log(), vec!["inner.on_destroy", "cmp.on_destroy"]);
}

struct FailsOnce;

impl Directive for FailsOnce {
    fn on_init(&mut self) -> ViewResult<()> {
        log("on_init");
        Err(ViewError::application("init failed"))
    }

    fn do_check(&mut self) -> ViewResult<()> {
        log("do_check");
        Ok(())
    }

    fn after_view_init(&mut self) -> ViewResult<()> {
        log("after_view_init");
        Ok(())
    }
}

fn failing_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::element("div", 1),
        NodeDef::directive_of::<FailsOnce>(vec![], |_| Ok(FailsOnce)).with_hooks(
            NodeFlags::ON_INIT | NodeFlags::DO_CHECK | NodeFlags::AFTER_VIEW_INIT,
        ),
    ])
    .build()
}

#[test]
fn init_hooks_are_not_retried_after_an_error() {
    let h = Harness::new();
    let view = h.root_view(failing_view, Value::Null);

    let err = view.detect_changes().unwrap_err();
    assert_eq!(err, ViewError::application("init failed"));
    assert_eq!(take_log(), vec!["on_init"]);

    view.detect_changes().unwrap();
    assert_eq!(take_log(), vec!["do_check", "after_view_init"]);

    view.detect_changes().unwrap();
    assert_eq!(take_log(), vec!["do_check"]);
}

#[derive(Default)]
struct Tracker;

impl Directive for Tracker {
    fn on_changes(&mut self, changes: &SimpleChanges) -> ViewResult<()> {
        let mut keys: Vec<_> = changes.keys().cloned().collect();
        keys.sort();
        for key in keys {
            let change = &changes[&key];
            log(format!(
                "{key}: {:?} -> {:?} first={}",
                change.previous_value,
                change.current_value,
                change.is_first_change()
            ));
        }
        Ok(())
    }

    fn on_init(&mut self) -> ViewResult<()> {
        log("on_init");
        Ok(())
    }
}

thread_local! {
    static INPUTS: std::cell::RefCell<(i64, i64)> = const { std::cell::RefCell::new((1, 10)) };
}

fn tracked_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::element("div", 1),
        NodeDef::directive_of::<Tracker>(vec![], |_| Ok(Tracker))
            .with_input("count")
            .with_aliased_input("limit", "max")
            .with_hooks(NodeFlags::ON_CHANGES | NodeFlags::ON_INIT),
    ])
    .update_directives(|check| {
        let (count, limit) = INPUTS.with(|i| *i.borrow());
        check.node(1, &[Value::from(count), Value::from(limit)])?;
        Ok(())
    })
    .build()
}

#[test]
fn on_changes_reports_changed_inputs_by_public_name() {
    INPUTS.with(|i| *i.borrow_mut() = (1, 10));
    let h = Harness::new();
    let view = h.root_view(tracked_view, Value::Null);

    view.detect_changes().unwrap();
    assert_eq!(
        take_log(),
        vec![
            "count: null -> 1 first=true",
            "max: null -> 10 first=true",
            "on_init",
        ]
    );

    view.detect_changes().unwrap();
    assert!(take_log().is_empty());

    INPUTS.with(|i| i.borrow_mut().1 = 20);
    view.detect_changes().unwrap();
    assert_eq!(take_log(), vec!["max: 10 -> 20 first=false"]);
}

struct Closing;

impl Pipe for Closing {
    fn transform(&mut self, args: &[Value]) -> ViewResult<Value> {
        Ok(args[0].clone())
    }

    fn on_destroy(&mut self) -> ViewResult<()> {
        log("pipe.on_destroy");
        Ok(())
    }
}

fn pipe_and_hooks_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::element("div", 2),
        NodeDef::pipe_of::<Closing>(vec![], |_| Ok(Closing)).with_hooks(NodeFlags::ON_DESTROY),
        Hooked::node("dir"),
    ])
    .build()
}

#[test]
fn destroy_runs_hooks_once_and_disables_the_view() {
    let h = Harness::new();
    let view = h.root_view(pipe_and_hooks_view, Value::Null);
    view.detect_changes().unwrap();
    take_log();
    let host = h.host(&view);
    view.on_destroy(|| log("callback"));

    view.destroy().unwrap();
    assert_eq!(
        take_log(),
        vec!["pipe.on_destroy", "dir.on_destroy", "callback"]
    );
    assert!(view.is_destroyed());

    view.destroy().unwrap();
    assert!(take_log().is_empty());
    assert_eq!(
        view.detect_changes().unwrap_err(),
        ViewError::ViewDestroyed("detectChanges")
    );
    assert!(h.renderer.is_destroyed(host));
}

struct SelfChecking {
    cd: ChangeDetectorRef,
    label: String,
}

impl Directive for SelfChecking {
    fn after_view_init(&mut self) -> ViewResult<()> {
        self.label = "ready".into();
        match self.cd.detect_changes() {
            Ok(()) => log("nested check ran"),
            Err(err) => log(err.to_string()),
        }
        Ok(())
    }
}

fn labelled_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![NodeDef::element("b", 1), NodeDef::text(&["", ""])])
        .update_renderer(|check| {
            let label = check
                .component()
                .with(|c: &SelfChecking| c.label.clone())
                .unwrap_or_default();
            check.node(1, &[Value::from(label)])?;
            Ok(())
        })
        .build()
}

fn self_checking_host_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::element("div", 2),
        NodeDef::element("app-label", 1).with_component(labelled_view, None),
        NodeDef::directive_of::<SelfChecking>(vec![Token::CHANGE_DETECTOR_REF.into()], |args| {
            Ok(SelfChecking {
                cd: dep(args, 0)?,
                label: "new".into(),
            })
        })
        .component()
        .with_hooks(NodeFlags::AFTER_VIEW_INIT),
    ])
    .build()
}

#[test]
fn hooks_that_check_their_own_component_view_get_an_error() {
    let h = Harness::new();
    let view = h.root_view(self_checking_host_view, Value::Null);

    view.detect_changes().expect("outer check");
    assert_eq!(
        take_log(),
        vec![ViewError::illegal_state(
            "view checked re-entrantly from a lifecycle hook of its own component"
        )
        .to_string()]
    );
    assert_eq!(h.text(&view), "new");

    let cd = view
        .data()
        .directive(2)
        .and_then(|d| d.with(|c: &SelfChecking| c.cd.clone()))
        .expect("component directive");
    cd.detect_changes().expect("check outside hooks");
    assert_eq!(h.text(&view), "ready");
    assert!(h.errors.errors.borrow().is_empty());
}
