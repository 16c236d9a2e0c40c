use crate::app::EnvironmentBuilder;
use crate::component::ComponentFactory;
use crate::config::EngineConfig;
use crate::directive::{Directive, Pipe, SimpleChange, SimpleChanges};
use crate::error::ViewError;
use crate::render::{MemoryRendererFactory, Sanitizer, SecurityContext};
use crate::test_support::{log, take_log, Harness};
use crate::value::Value;
use crate::view::{NodeDef, NodeFlags, ViewDefinition};
use crate::ViewResult;
use std::cell::Cell;
use std::rc::Rc;

#[derive(Default)]
struct Model {
    name: String,
    active: bool,
    width: i64,
    title: Value,
    ratio: f64,
}

fn model(check_ctx: &Value) -> (String, bool, i64, Value, f64) {
    check_ctx
        .with(|m: &Model| (m.name.clone(), m.active, m.width, m.title.clone(), m.ratio))
        .unwrap_or_default()
}

fn greeting_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::element("div", 1),
        NodeDef::text(&["Hello ", "!"]),
    ])
    .update_renderer(|check| {
        let (name, ..) = model(&check.context());
        check.node(1, &[Value::from(name)])?;
        Ok(())
    })
    .build()
}

#[test]
fn text_interpolation_follows_the_context() {
    let h = Harness::new();
    let ctx = Value::object(Model {
        name: "World".into(),
        ..Default::default()
    });
    let view = h.root_view(greeting_view, ctx.clone());

    view.detect_changes().unwrap();
    assert_eq!(h.text(&view), "Hello World!");

    ctx.with_mut(|m: &mut Model| m.name = "Rust".into());
    view.detect_changes().unwrap();
    assert_eq!(h.text(&view), "Hello Rust!");
    view.check_no_changes().unwrap();
}

fn bound_element_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![NodeDef::element("div", 0)
        .with_property("title")
        .with_class("active")
        .with_style("width", Some("px"))
        .with_attribute("data-ratio")])
    .update_renderer(|check| {
        let (_, active, width, title, ratio) = model(&check.context());
        check.node(
            0,
            &[
                title,
                Value::from(active),
                Value::from(width),
                Value::from(ratio),
            ],
        )?;
        Ok(())
    })
    .build()
}

#[test]
fn element_bindings_write_through_the_renderer() {
    let h = Harness::new();
    let ctx = Value::object(Model {
        active: true,
        width: 10,
        title: Value::from("tip"),
        ratio: 0.5,
        ..Default::default()
    });
    let view = h.root_view(bound_element_view, ctx.clone());
    view.detect_changes().unwrap();

    let el = h.host(&view);
    assert_eq!(h.renderer.property(el, "title"), Some(Value::from("tip")));
    assert!(h.renderer.has_class(el, "active"));
    assert_eq!(h.renderer.style(el, "width").as_deref(), Some("10px"));
    assert_eq!(h.renderer.attribute(el, "data-ratio").as_deref(), Some("0.5"));

    ctx.with_mut(|m: &mut Model| {
        m.active = false;
        m.title = Value::Null;
    });
    view.detect_changes().unwrap();
    assert!(!h.renderer.has_class(el, "active"));
    assert_eq!(h.renderer.property(el, "title"), Some(Value::Null));
}

#[test]
fn unchanged_bindings_are_not_rewritten() {
    let h = Harness::new();
    let ctx = Value::object(Model {
        title: Value::from("same"),
        ..Default::default()
    });
    let view = h.root_view(bound_element_view, ctx.clone());
    view.detect_changes().unwrap();
    assert_eq!(h.renderer.binding_writes(), 4);

    h.renderer.clear_ops();
    view.detect_changes().unwrap();
    assert_eq!(h.renderer.binding_writes(), 0);

    ctx.with_mut(|m: &mut Model| m.width = 3);
    view.detect_changes().unwrap();
    assert_eq!(h.renderer.binding_writes(), 1);
}

#[test]
fn nan_is_unchanged_against_itself() {
    let h = Harness::new();
    let ctx = Value::object(Model {
        ratio: f64::NAN,
        ..Default::default()
    });
    let view = h.root_view(bound_element_view, ctx);
    view.detect_changes().unwrap();
    assert_eq!(
        h.renderer.attribute(h.host(&view), "data-ratio").as_deref(),
        Some("NaN")
    );

    h.renderer.clear_ops();
    view.detect_changes().unwrap();
    view.check_no_changes().unwrap();
    assert_eq!(h.renderer.binding_writes(), 0);
}

thread_local! {
    static TICKS: Cell<i64> = const { Cell::new(0) };
}

fn unstable_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![NodeDef::element("div", 1), NodeDef::text(&["", ""])])
        .update_renderer(|check| {
            let next = TICKS.with(|t| {
                t.set(t.get() + 1);
                t.get()
            });
            check.node(1, &[Value::from(next)])?;
            Ok(())
        })
        .build()
}

#[test]
fn no_changes_pass_reports_unstable_bindings() {
    TICKS.with(|t| t.set(0));
    let h = Harness::new();
    let view = h.root_view(unstable_view, Value::Null);
    view.detect_changes().unwrap();

    match view.check_no_changes() {
        Err(ViewError::ExpressionChanged {
            previous,
            current,
            first_check,
        }) => {
            assert_eq!(previous, "text0: 1");
            assert_eq!(current, "text0: 2");
            assert!(!first_check);
        }
        other => panic!("expected ExpressionChanged, got {other:?}"),
    }
}

#[test]
fn no_changes_before_first_check_is_flagged() {
    let h = Harness::new();
    let ctx = Value::object(Model::default());
    let view = h.root_view(greeting_view, ctx);
    let err = view.check_no_changes().unwrap_err();
    assert!(matches!(
        err,
        ViewError::ExpressionChanged {
            first_check: true,
            ..
        }
    ));
    assert!(err.to_string().contains("change detection hook"));
}

thread_local! {
    static EXTERNAL: Cell<i64> = const { Cell::new(0) };
}

#[derive(Default)]
struct Badge {
    label: String,
}

impl Directive for Badge {
    fn set_input(&mut self, name: &str, value: Value) {
        if name == "label" {
            self.label = value.render_string();
        }
    }
}

fn badge_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![NodeDef::element("span", 1), NodeDef::text(&["", ""])])
        .on_push()
        .update_renderer(|check| {
            let label = check
                .component()
                .with(|b: &Badge| b.label.clone())
                .unwrap_or_default();
            let external = EXTERNAL.with(Cell::get);
            check.node(1, &[Value::from(format!("{label}-{external}"))])?;
            Ok(())
        })
        .build()
}

fn badge_host_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::element("div", 2),
        NodeDef::element("app-badge", 1).with_component(badge_view, None),
        NodeDef::directive_of::<Badge>(vec![], |_| Ok(Badge::default()))
            .component()
            .with_input("label"),
    ])
    .update_directives(|check| {
        let (name, ..) = model(&check.context());
        check.node(2, &[Value::from(name)])?;
        Ok(())
    })
    .build()
}

#[test]
fn on_push_views_only_check_after_input_changes() {
    EXTERNAL.with(|e| e.set(0));
    let h = Harness::new();
    let ctx = Value::object(Model {
        name: "a".into(),
        ..Default::default()
    });
    let view = h.root_view(badge_host_view, ctx.clone());
    view.detect_changes().unwrap();
    assert_eq!(h.text(&view), "a-0");

    EXTERNAL.with(|e| e.set(1));
    view.detect_changes().unwrap();
    assert_eq!(h.text(&view), "a-0");

    view.mark_for_check();
    view.detect_changes().unwrap();
    assert_eq!(h.text(&view), "a-0");

    ctx.with_mut(|m: &mut Model| m.name = "b".into());
    view.detect_changes().unwrap();
    assert_eq!(h.text(&view), "b-1");
}

thread_local! {
    static COUNTER_UPDATES: Cell<usize> = const { Cell::new(0) };
}

#[derive(Default)]
struct Counter {
    count: i64,
    changes: Vec<SimpleChange>,
}

impl Directive for Counter {
    fn set_input(&mut self, _name: &str, value: Value) {
        if let Value::Int(count) = value {
            self.count = count;
        }
    }

    fn on_changes(&mut self, changes: &SimpleChanges) -> ViewResult<()> {
        self.changes.extend(changes.get("count").cloned());
        Ok(())
    }
}

fn counter_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![NodeDef::element("output", 1), NodeDef::text(&["", ""])])
        .on_push()
        .update_renderer(|check| {
            COUNTER_UPDATES.with(|n| n.set(n.get() + 1));
            let count = check
                .component()
                .with(|c: &Counter| c.count)
                .unwrap_or_default();
            check.node(1, &[Value::from(count)])?;
            Ok(())
        })
        .build()
}

fn counter_host_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::element("div", 2),
        NodeDef::element("app-counter", 1).with_component(counter_view, None),
        NodeDef::directive_of::<Counter>(vec![], |_| Ok(Counter::default()))
            .component()
            .with_input("count")
            .with_hooks(NodeFlags::ON_CHANGES),
    ])
    .update_directives(|check| {
        let (_, _, width, ..) = model(&check.context());
        check.node(2, &[Value::from(width)])?;
        Ok(())
    })
    .build()
}

fn counter_changes(view: &crate::view::ViewRef) -> Vec<SimpleChange> {
    view.data()
        .directive(2)
        .and_then(|d| d.with_mut(|c: &mut Counter| std::mem::take(&mut c.changes)))
        .expect("counter directive")
}

#[test]
fn on_push_child_skips_its_update_until_the_input_changes() {
    COUNTER_UPDATES.with(|n| n.set(0));
    let h = Harness::new();
    let ctx = Value::object(Model {
        width: 1,
        ..Default::default()
    });
    let view = h.root_view(counter_host_view, ctx.clone());
    view.detect_changes().unwrap();
    assert_eq!(h.text(&view), "1");
    assert_eq!(COUNTER_UPDATES.with(Cell::get), 1);
    assert_eq!(
        counter_changes(&view),
        vec![SimpleChange {
            previous_value: Value::Null,
            current_value: Value::from(1),
            first_change: true,
        }]
    );

    ctx.with_mut(|m: &mut Model| m.width = 1);
    view.detect_changes().unwrap();
    assert_eq!(COUNTER_UPDATES.with(Cell::get), 1);
    assert!(counter_changes(&view).is_empty());

    ctx.with_mut(|m: &mut Model| m.width = 2);
    view.detect_changes().unwrap();
    assert_eq!(COUNTER_UPDATES.with(Cell::get), 2);
    assert_eq!(h.text(&view), "2");
    assert_eq!(
        counter_changes(&view),
        vec![SimpleChange {
            previous_value: Value::from(1),
            current_value: Value::from(2),
            first_change: false,
        }]
    );
}

#[test]
fn on_push_component_rechecks_after_mark_for_check() {
    EXTERNAL.with(|e| e.set(0));
    let h = Harness::new();
    let factory = ComponentFactory::new(
        "app-badge",
        NodeDef::directive_of::<Badge>(vec![], |_| Ok(Badge::default())),
        badge_view,
        None,
    )
    .unwrap();
    let component = factory.create(h.env.clone(), Vec::new(), None).unwrap();
    let host = component.host_view();
    host.detect_changes().unwrap();
    let el = component.location().native_element();
    assert_eq!(h.renderer.text_content(el), "-0");

    EXTERNAL.with(|e| e.set(5));
    host.detect_changes().unwrap();
    assert_eq!(h.renderer.text_content(el), "-0");

    component.component_view().mark_for_check();
    host.detect_changes().unwrap();
    assert_eq!(h.renderer.text_content(el), "-5");
}

fn plain_badge_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![NodeDef::element("span", 1), NodeDef::text(&["", ""])])
        .update_renderer(|check| {
            check.node(1, &[Value::from(EXTERNAL.with(Cell::get))])?;
            Ok(())
        })
        .build()
}

#[test]
fn detached_views_are_skipped_until_reattached() {
    EXTERNAL.with(|e| e.set(1));
    let h = Harness::new();
    let factory = ComponentFactory::new(
        "app-plain",
        NodeDef::directive_of::<Badge>(vec![], |_| Ok(Badge::default())),
        plain_badge_view,
        None,
    )
    .unwrap();
    let component = factory.create(h.env.clone(), Vec::new(), None).unwrap();
    let el = component.location().native_element();
    component.host_view().detect_changes().unwrap();
    assert_eq!(h.renderer.text_content(el), "1");

    component.component_view().detach();
    assert!(!component.component_view().is_attached());
    EXTERNAL.with(|e| e.set(2));
    component.host_view().detect_changes().unwrap();
    assert_eq!(h.renderer.text_content(el), "1");

    component.component_view().detect_changes().unwrap();
    assert_eq!(h.renderer.text_content(el), "2");

    EXTERNAL.with(|e| e.set(3));
    component.component_view().reattach();
    component.host_view().detect_changes().unwrap();
    assert_eq!(h.renderer.text_content(el), "3");
}

#[derive(Default)]
struct Sink {
    received: Vec<Value>,
}

impl Directive for Sink {
    fn set_input(&mut self, _name: &str, value: Value) {
        self.received.push(value);
    }
}

fn pure_array_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::element("div", 2),
        NodeDef::pure_array(2),
        NodeDef::directive_of::<Sink>(vec![], |_| Ok(Sink::default())).with_input("items"),
    ])
    .update_directives(|check| {
        let (_, _, width, ..) = model(&check.context());
        let items = check.node(1, &[Value::from(width), Value::from("x")])?;
        check.node(2, &[items])?;
        Ok(())
    })
    .build()
}

#[test]
fn pure_arrays_keep_identity_while_arguments_are_unchanged() {
    let h = Harness::new();
    let ctx = Value::object(Model {
        width: 1,
        ..Default::default()
    });
    let view = h.root_view(pure_array_view, ctx.clone());
    view.detect_changes().unwrap();
    view.detect_changes().unwrap();
    view.check_no_changes().unwrap();

    ctx.with_mut(|m: &mut Model| m.width = 2);
    view.detect_changes().unwrap();

    let sink = view.data().directive(2).expect("sink");
    let received = sink.with(|s: &Sink| s.received.clone()).unwrap();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0], Value::list([Value::Int(1), Value::from("x")]));
    assert_eq!(received[1], Value::list([Value::Int(2), Value::from("x")]));
}

struct Upper;

impl Pipe for Upper {
    fn transform(&mut self, args: &[Value]) -> ViewResult<Value> {
        log(format!("upper({})", args[0]));
        Ok(Value::from(args[0].render_string().to_uppercase()))
    }
}

fn pipe_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::element("div", 3),
        NodeDef::pipe_of::<Upper>(vec![], |_| Ok(Upper)),
        NodeDef::pure_pipe(1, 1),
        NodeDef::text(&["", "/", ""]),
    ])
    .update_renderer(|check| {
        let (name, ..) = model(&check.context());
        let pure = check.node(2, &[Value::from(name.clone())])?;
        let impure = check.pipe_transform(1, &[Value::from(name)])?;
        check.node(3, &[pure, impure])?;
        Ok(())
    })
    .build()
}

#[test]
fn pure_pipes_transform_only_on_argument_change() {
    let h = Harness::new();
    let ctx = Value::object(Model {
        name: "ab".into(),
        ..Default::default()
    });
    let view = h.root_view(pipe_view, ctx.clone());
    view.detect_changes().unwrap();
    view.detect_changes().unwrap();
    assert_eq!(h.text(&view), "AB/AB");
    assert_eq!(take_log(), vec!["upper(ab)", "upper(ab)", "upper(ab)"]);

    ctx.with_mut(|m: &mut Model| m.name = "cd".into());
    view.detect_changes().unwrap();
    assert_eq!(h.text(&view), "CD/CD");
    assert_eq!(take_log(), vec!["upper(cd)", "upper(cd)"]);
}

struct Redacting;

impl Sanitizer for Redacting {
    fn sanitize(&self, context: SecurityContext, value: &Value) -> Value {
        match context {
            SecurityContext::Url if value.render_string().starts_with("javascript:") => {
                Value::from("unsafe:blocked")
            }
            _ => value.clone(),
        }
    }
}

fn link_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::element("a", 0).with_sanitized_attribute("href", SecurityContext::Url)
    ])
    .update_renderer(|check| {
        let (name, ..) = model(&check.context());
        check.node(0, &[Value::from(name)])?;
        Ok(())
    })
    .build()
}

#[test]
fn sanitized_bindings_pass_through_the_sanitizer() {
    let factory = MemoryRendererFactory::new();
    let renderer = factory.renderer();
    let env = EnvironmentBuilder::new(Rc::new(factory))
        .sanitizer(Rc::new(Redacting))
        .config(EngineConfig::development())
        .build();
    let root = crate::view::RootContext::new(env, None, Vec::new());
    let def = crate::view::resolve_definition(link_view).unwrap();
    let ctx = Value::object(Model {
        name: "javascript:alert(1)".into(),
        ..Default::default()
    });
    let view = crate::view::create_root_view(root, def, ctx).unwrap();
    view.detect_changes().unwrap();

    let link = view.root_nodes()[0];
    assert_eq!(
        renderer.attribute(link, "href").as_deref(),
        Some("unsafe:blocked")
    );
}

#[test]
fn update_rejects_more_values_than_bindings() {
    fn overfull() -> ViewResult<ViewDefinition> {
        ViewDefinition::builder(vec![NodeDef::element("div", 1), NodeDef::text(&["", ""])])
            .update_renderer(|check| {
                check.node(1, &[Value::from(1), Value::from(2)])?;
                Ok(())
            })
            .build()
    }
    let h = Harness::new();
    let view = h.root_view(overfull, Value::Null);
    assert!(matches!(
        view.detect_changes(),
        Err(ViewError::IllegalState(_))
    ));
}

#[test]
fn detect_changes_brackets_the_renderer_factory() {
    let h = Harness::new();
    let view = h.root_view(greeting_view, Value::object(Model::default()));
    view.detect_changes().unwrap();
    view.detect_changes().unwrap();
    assert_eq!(h.factory.passes(), (2, 2));
}

#[test]
fn hook_flags_are_required_for_implicit_checks() {
    struct Quiet;
    impl Directive for Quiet {
        fn do_check(&mut self) -> ViewResult<()> {
            log("do_check");
            Ok(())
        }
    }
    fn view() -> ViewResult<ViewDefinition> {
        ViewDefinition::builder(vec![
            NodeDef::element("div", 2),
            NodeDef::directive_of::<Quiet>(vec![], |_| Ok(Quiet)),
            NodeDef::directive_of::<Quiet>(vec![], |_| Ok(Quiet)).with_hooks(NodeFlags::DO_CHECK),
        ])
        .build()
    }
    let h = Harness::new();
    let root = h.root_view(view, Value::Null);
    root.detect_changes().unwrap();
    assert_eq!(take_log(), vec!["do_check"]);
}
