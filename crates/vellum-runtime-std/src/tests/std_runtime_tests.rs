use super::StdRuntime;
use std::cell::Cell;
use std::rc::Rc;
use vellum_core::{
    ChangeDetectorRef, ComponentFactory, Directive, EngineConfig, EnvironmentBuilder,
    MemoryRenderer, MemoryRendererFactory, NodeDef, NodeFlags, Token, Value, ViewDefinition,
    ViewError, ViewResult,
};

#[derive(Default)]
struct Clicks {
    count: i64,
}

impl Directive for Clicks {}

fn clicks_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::element("button", 1).on("click"),
        NodeDef::text(&["", ""]),
    ])
    .update_renderer(|check| {
        let count = check.component().with(|c: &Clicks| c.count).unwrap_or_default();
        check.node(1, &[Value::from(count)])?;
        Ok(())
    })
    .handle_event(|ctx, _, _, _| {
        ctx.component().with_mut(|c: &mut Clicks| c.count += 1);
        Ok(true)
    })
    .build()
}

fn runtime() -> (StdRuntime, MemoryRenderer) {
    let factory = MemoryRendererFactory::new();
    let renderer = factory.renderer();
    let env = EnvironmentBuilder::new(Rc::new(factory))
        .config(EngineConfig::development())
        .build();
    (StdRuntime::new(env), renderer)
}

#[test]
fn std_runtime_requests_a_tick_and_rerenders_on_events() {
    let (runtime, renderer) = runtime();
    let root = renderer.add_root_element("app-clicks", "app-clicks");
    let factory = ComponentFactory::new(
        "app-clicks",
        NodeDef::directive_of::<Clicks>(vec![], |_| Ok(Clicks::default())),
        clicks_view,
        None,
    )
    .expect("component factory");
    runtime
        .application()
        .bootstrap(&factory, "app-clicks")
        .expect("bootstrap");
    assert_eq!(renderer.text_content(root), "0");

    let woken = Rc::new(Cell::new(0));
    let counter = Rc::clone(&woken);
    runtime.set_tick_waker(move || counter.set(counter.get() + 1));
    let scheduled = runtime.scheduler().scheduled_ticks();

    let button = renderer.children(root)[0];
    renderer.dispatch_event(button, "click", &Value::Null);
    renderer.dispatch_event(button, "click", &Value::Null);
    assert_eq!(woken.get(), 1);
    assert_eq!(runtime.scheduler().scheduled_ticks(), scheduled + 1);
    assert_eq!(renderer.text_content(root), "0");

    assert_eq!(runtime.run_until_stable(StdRuntime::DEFAULT_MAX_TICKS), Ok(1));
    assert_eq!(renderer.text_content(root), "2");
    assert_eq!(runtime.timer().ticks(), 1);
    assert_eq!(runtime.timer().total(), runtime.timer().last_tick());
    assert!(!runtime.take_tick_request());
    assert_eq!(runtime.run_until_stable(StdRuntime::DEFAULT_MAX_TICKS), Ok(0));
    assert_eq!(runtime.timer().ticks(), 1);

    runtime.clear_tick_waker();
    renderer.dispatch_event(button, "click", &Value::Null);
    assert_eq!(woken.get(), 1);
    assert!(runtime.take_tick_request());
}

/// Marks itself dirty on every check, so the application never settles.
struct Restless {
    cd: ChangeDetectorRef,
}

impl Directive for Restless {
    fn do_check(&mut self) -> ViewResult<()> {
        self.cd.mark_for_check()
    }
}

fn restless_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::element("div", 1),
        NodeDef::directive_of::<Restless>(vec![Token::CHANGE_DETECTOR_REF.into()], |args| {
            let cd = args
                .first()
                .and_then(|v| v.downcast::<ChangeDetectorRef>())
                .ok_or_else(|| ViewError::illegal_state("missing change detector"))?;
            Ok(Restless {
                cd: (*cd).clone(),
            })
        })
        .with_hooks(NodeFlags::DO_CHECK),
    ])
    .build()
}

#[test]
fn run_until_stable_gives_up_on_endless_ticks() {
    let (runtime, renderer) = runtime();
    renderer.add_root_element("app-restless", "app-restless");
    struct Host;
    impl Directive for Host {}
    let factory = ComponentFactory::new(
        "app-restless",
        NodeDef::directive_of::<Host>(vec![], |_| Ok(Host)),
        restless_view,
        None,
    )
    .expect("component factory");
    runtime
        .application()
        .bootstrap(&factory, "app-restless")
        .expect("bootstrap");

    let err = runtime.run_until_stable(3).unwrap_err();
    assert!(matches!(err, ViewError::IllegalState(_)), "{err}");
    assert_eq!(runtime.timer().ticks(), 3);
}
