use crate::component::ComponentFactory;
use crate::directive::{Directive, QueryResult};
use crate::test_support::{dep, Harness};
use crate::token::Token;
use crate::value::Value;
use crate::view::{
    ElementRef, NodeDef, QueryBindingKind, QueryList, QueryValueType, TemplateRef,
    ViewContainerRef, ViewDefinition, ViewRef,
};
use crate::ViewResult;
use std::cell::Cell;
use std::rc::Rc;

#[derive(Default)]
struct Collector {
    items: Option<QueryList>,
    first: Value,
    updates: usize,
}

impl Directive for Collector {
    fn set_query(&mut self, prop: &str, value: QueryResult) {
        self.updates += 1;
        match (prop, value) {
            ("items", QueryResult::All(list)) => self.items = Some(list),
            ("first", QueryResult::First(value)) => self.first = value,
            _ => {}
        }
    }
}

/// Collector directive owning the query node that follows it.
fn collector() -> NodeDef {
    NodeDef::directive_of::<Collector>(vec![], |_| Ok(Collector::default())).with_child_count(1)
}

fn collected<R>(view: &ViewRef, index: usize, f: impl FnOnce(&Collector) -> R) -> R {
    view.data()
        .directive(index)
        .and_then(|d| d.with(f))
        .expect("collector directive")
}

fn element_of(value: &Value) -> ElementRef {
    *value.downcast::<ElementRef>().expect("element ref")
}

fn content_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::element("div", 4),
        collector(),
        NodeDef::content_query(
            0,
            &[
                ("items", QueryBindingKind::All),
                ("first", QueryBindingKind::First),
            ],
        ),
        NodeDef::element("span", 0).matching(0, QueryValueType::ElementRef),
        NodeDef::element("em", 0).matching(0, QueryValueType::ElementRef),
    ])
    .build()
}

#[test]
fn content_query_collects_matching_children_in_document_order() {
    let h = Harness::new();
    let view = h.root_view(content_view, Value::Null);
    view.detect_changes().unwrap();

    let children = h.renderer.children(h.host(&view));
    let (items, first, updates) =
        collected(&view, 1, |c| (c.items.clone(), c.first.clone(), c.updates));
    let items = items.expect("query list delivered");
    assert_eq!(items.len(), 2);
    assert_eq!(element_of(&items.to_vec()[0]).native_element(), children[0]);
    assert_eq!(element_of(&items.to_vec()[1]).native_element(), children[1]);
    assert_eq!(element_of(&first).native_element(), children[0]);
    assert_eq!(updates, 2);
    assert!(!items.is_dirty());

    view.detect_changes().unwrap();
    assert_eq!(collected(&view, 1, |c| c.updates), 2);
}

struct Repeater {
    container: ViewContainerRef,
    template: TemplateRef,
}

impl Directive for Repeater {}

fn bold_template() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::element("b", 0).matching(0, QueryValueType::ElementRef)
    ])
    .build()
}

fn dynamic_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::element("div", 5),
        collector(),
        NodeDef::content_query(0, &[("items", QueryBindingKind::All)]),
        NodeDef::anchor(1).with_template(bold_template),
        NodeDef::directive_of::<Repeater>(
            vec![Token::VIEW_CONTAINER_REF.into(), Token::TEMPLATE_REF.into()],
            |args| {
                Ok(Repeater {
                    container: dep(args, 0)?,
                    template: dep(args, 1)?,
                })
            },
        ),
        NodeDef::element("span", 0).matching(0, QueryValueType::ElementRef),
    ])
    .build()
}

fn tags(h: &Harness, list: &QueryList) -> Vec<String> {
    list.to_vec()
        .iter()
        .map(|v| {
            h.renderer
                .tag_name(element_of(v).native_element())
                .unwrap_or_default()
        })
        .collect()
}

#[test]
fn container_edits_dirty_the_query_and_notify_once_per_check() {
    let h = Harness::new();
    let view = h.root_view(dynamic_view, Value::Null);
    let (container, template) = view
        .data()
        .directive(4)
        .and_then(|d| d.with(|r: &Repeater| (r.container.clone(), r.template.clone())))
        .expect("repeater");
    view.detect_changes().unwrap();

    let list = collected(&view, 1, |c| c.items.clone()).expect("list");
    let notified = Rc::new(Cell::new(0));
    let counter = Rc::clone(&notified);
    let _unsubscribe = list.subscribe(move |_| counter.set(counter.get() + 1));
    assert_eq!(tags(&h, &list), vec!["span"]);

    container
        .create_embedded_view(&template, Value::Null, None)
        .unwrap();
    container
        .create_embedded_view(&template, Value::Null, None)
        .unwrap();
    assert!(list.is_dirty());
    view.detect_changes().unwrap();
    assert_eq!(tags(&h, &list), vec!["b", "b", "span"]);
    assert_eq!(notified.get(), 1);

    view.detect_changes().unwrap();
    assert_eq!(notified.get(), 1);

    container.remove(Some(0)).unwrap();
    view.detect_changes().unwrap();
    assert_eq!(tags(&h, &list), vec!["b", "span"]);
    assert_eq!(notified.get(), 2);
}

fn static_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::element("div", 3),
        collector(),
        NodeDef::content_query(2, &[("first", QueryBindingKind::First)]).static_query(),
        NodeDef::element("span", 0).matching(2, QueryValueType::ElementRef),
    ])
    .build()
}

#[test]
fn static_queries_resolve_during_creation() {
    let h = Harness::new();
    let view = h.root_view(static_view, Value::Null);
    let first = collected(&view, 1, |c| c.first.clone());
    let span = h.renderer.children(h.host(&view))[0];
    assert_eq!(element_of(&first).native_element(), span);
}

#[derive(Default)]
struct Gallery {
    slides: Option<QueryList>,
    marker: Value,
}

impl Directive for Gallery {
    fn set_query(&mut self, prop: &str, value: QueryResult) {
        match (prop, value) {
            ("slides", QueryResult::All(list)) => self.slides = Some(list),
            ("marker", QueryResult::First(value)) => self.marker = value,
            _ => {}
        }
    }
}

struct Marker;

impl Directive for Marker {}

fn gallery_view() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::view_query(1, &[("slides", QueryBindingKind::All)]),
        NodeDef::view_query(2, &[("marker", QueryBindingKind::First)]),
        NodeDef::element("div", 3),
        NodeDef::element("img", 0).matching(1, QueryValueType::ElementRef),
        NodeDef::element("img", 1).matching(1, QueryValueType::ElementRef),
        NodeDef::directive_of::<Marker>(vec![], |_| Ok(Marker))
            .matching(2, QueryValueType::Provider),
    ])
    .build()
}

#[test]
fn view_queries_are_delivered_to_the_component() {
    let h = Harness::new();
    let factory = ComponentFactory::new(
        "app-gallery",
        NodeDef::directive_of::<Gallery>(vec![], |_| Ok(Gallery::default())),
        gallery_view,
        None,
    )
    .unwrap();
    let component = factory.create(h.env.clone(), Vec::new(), None).unwrap();
    component.host_view().detect_changes().unwrap();

    let (slides, marker) = component
        .instance()
        .with(|g: &Gallery| (g.slides.clone(), g.marker.clone()))
        .unwrap();
    assert_eq!(slides.expect("slides").len(), 2);
    assert!(marker.borrow::<Marker>().is_some());
}

#[test]
fn unsubscribed_listeners_are_not_notified() {
    let h = Harness::new();
    let view = h.root_view(dynamic_view, Value::Null);
    let (container, template) = view
        .data()
        .directive(4)
        .and_then(|d| d.with(|r: &Repeater| (r.container.clone(), r.template.clone())))
        .expect("repeater");
    view.detect_changes().unwrap();
    let list = collected(&view, 1, |c| c.items.clone()).expect("list");

    let kept = Rc::new(Cell::new(0));
    let dropped = Rc::new(Cell::new(0));
    let counter = Rc::clone(&kept);
    let _keep = list.subscribe(move |_| counter.set(counter.get() + 1));
    let counter = Rc::clone(&dropped);
    let unsubscribe = list.subscribe(move |_| counter.set(counter.get() + 1));
    unsubscribe();

    container
        .create_embedded_view(&template, Value::Null, None)
        .unwrap();
    view.detect_changes().unwrap();
    assert_eq!((kept.get(), dropped.get()), (1, 0));
}
