use crate::directive::Directive;
use crate::error::ViewError;
use crate::token::Token;
use crate::view::{
    resolve_definition, view_def, NodeDef, NodeFlags, QueryBindingKind, QueryValueType,
    ViewDefinition, ViewFlags,
};
use crate::ViewResult;
use std::rc::Rc;

struct Plain;

impl Directive for Plain {}

fn plain() -> NodeDef {
    NodeDef::directive_of::<Plain>(vec![], |_| Ok(Plain))
}

fn build(nodes: Vec<NodeDef>) -> ViewResult<ViewDefinition> {
    view_def(ViewFlags::empty(), nodes, None, None, None)
}

fn illegal(result: ViewResult<ViewDefinition>) -> String {
    match result {
        Err(ViewError::IllegalState(message)) => message,
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("definition should be rejected"),
    }
}

fn item_template() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![NodeDef::element("li", 1), NodeDef::text(&["item"])]).build()
}

fn empty_template() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![]).build()
}

fn nested_anchor_template() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![NodeDef::anchor(0).with_template(item_template)]).build()
}

fn matching_template() -> ViewResult<ViewDefinition> {
    ViewDefinition::builder(vec![
        NodeDef::element("b", 0).matching(3, QueryValueType::ElementRef)
    ])
    .build()
}

#[test]
fn assigns_parents_and_aggregates_child_flags() {
    let def = build(vec![
        NodeDef::element("div", 3),
        NodeDef::element("span", 1),
        plain().with_hooks(NodeFlags::ON_INIT),
        NodeDef::text(&["x"]),
    ])
    .unwrap();

    assert_eq!(def.nodes[0].parent, None);
    assert_eq!(def.nodes[1].parent, Some(0));
    assert_eq!(def.nodes[2].parent, Some(1));
    assert_eq!(def.nodes[3].parent, Some(0));
    assert!(def.nodes[0].child_flags.contains(NodeFlags::ON_INIT));
    assert!(def.nodes[0].child_flags.contains(NodeFlags::TYPE_DIRECTIVE));
    assert!(!def.nodes[0].direct_child_flags.contains(NodeFlags::ON_INIT));
    assert!(def.nodes[1].direct_child_flags.contains(NodeFlags::ON_INIT));
    assert!(def.node_flags.contains(NodeFlags::TYPE_TEXT | NodeFlags::ON_INIT));
    assert_eq!(def.root_node_flags, NodeFlags::TYPE_ELEMENT);
}

#[test]
fn binding_and_output_slots_are_contiguous() {
    let def = build(vec![
        NodeDef::element("div", 2)
            .with_property("title")
            .with_class("active")
            .on("click"),
        NodeDef::text(&["", " of ", ""]),
        NodeDef::element("input", 0).on("input").on_global("window", "resize"),
    ])
    .unwrap();

    assert_eq!(def.nodes[0].binding_index, 0);
    assert_eq!(def.nodes[1].binding_index, 2);
    assert_eq!(def.nodes[1].bindings.len(), 2);
    assert_eq!(def.nodes[2].binding_index, 4);
    assert_eq!(def.binding_count, 4);
    assert_eq!(def.nodes[2].output_index, 1);
    assert_eq!(def.output_count, 3);
    assert_eq!(def.nodes[2].outputs[1].full_event_name(), "window:resize");
}

#[test]
fn render_parents_skip_ng_containers() {
    let def = build(vec![
        NodeDef::element("div", 3),
        NodeDef::ng_container(1),
        NodeDef::text(&["inside"]),
        NodeDef::element("p", 0),
    ])
    .unwrap();

    assert_eq!(def.nodes[1].render_parent, Some(0));
    assert_eq!(def.nodes[2].parent, Some(1));
    assert_eq!(def.nodes[2].render_parent, Some(0));
    assert_eq!(def.nodes[3].render_parent, Some(0));
}

#[test]
fn last_render_root_node_looks_through_root_ng_containers() {
    let def = build(vec![
        NodeDef::element("a", 0),
        NodeDef::ng_container(1),
        NodeDef::element("b", 0),
    ])
    .unwrap();
    assert_eq!(def.last_render_root_node, Some(2));

    let def = build(vec![NodeDef::element("a", 1), NodeDef::text(&["t"])]).unwrap();
    assert_eq!(def.last_render_root_node, Some(0));
}

#[test]
fn template_queries_bubble_to_the_anchor() {
    let def = build(vec![
        NodeDef::element("div", 1),
        NodeDef::anchor(0).with_template(matching_template),
    ])
    .unwrap();

    assert!(def.nodes[1].flags.contains(NodeFlags::EMBEDDED_VIEWS));
    assert!(def.nodes[1].child_matched_queries.contains(3));
    assert!(def.nodes[0].child_matched_queries.contains(3));
    assert!(def.node_matched_queries.contains(3));
}

#[test]
fn providers_register_on_their_element() {
    let token = Token::new("Local");
    let def = build(vec![
        NodeDef::element("div", 2),
        NodeDef::value_provider(token, 1),
        plain(),
    ])
    .unwrap();

    let el = def.nodes[0].as_element().expect("element");
    assert_eq!(el.providers, vec![1, 2]);
    let bit = token.bloom_bit().expect("bit assigned on registration");
    assert!(el.own_bloom.contains(bit));
}

#[test]
fn view_container_dependency_marks_the_host() {
    let def = build(vec![
        NodeDef::element("div", 1),
        NodeDef::directive_of::<Plain>(vec![Token::VIEW_CONTAINER_REF.into()], |_| Ok(Plain)),
    ])
    .unwrap();
    assert!(def.nodes[0].flags.contains(NodeFlags::EMBEDDED_VIEWS));
}

#[test]
fn rejects_root_level_providers() {
    let message = illegal(build(vec![plain()]));
    assert!(message.contains("children of elements"), "{message}");
}

#[test]
fn rejects_content_query_outside_a_directive() {
    let message = illegal(build(vec![
        NodeDef::element("div", 1),
        NodeDef::content_query(0, &[("items", QueryBindingKind::All)]),
    ]));
    assert!(message.contains("Content Query"), "{message}");
}

#[test]
fn rejects_nested_view_query() {
    let message = illegal(build(vec![
        NodeDef::element("div", 1),
        NodeDef::view_query(0, &[("items", QueryBindingKind::All)]),
    ]));
    assert!(message.contains("top level"), "{message}");
}

#[test]
fn rejects_child_count_past_the_parent() {
    let message = illegal(build(vec![
        NodeDef::element("div", 1),
        NodeDef::element("span", 2),
        NodeDef::text(&["a"]),
    ]));
    assert!(message.contains("childCount"), "{message}");
}

#[test]
fn rejects_templates_without_nodes() {
    let message = illegal(build(vec![
        NodeDef::element("div", 1),
        NodeDef::anchor(0).with_template(empty_template),
    ]));
    assert!(message.contains("without nodes"), "{message}");
}

#[test]
fn rejects_templates_ending_in_an_anchor() {
    let message = illegal(build(vec![
        NodeDef::element("div", 1),
        NodeDef::anchor(0).with_template(nested_anchor_template),
    ]));
    assert!(message.contains("can't have embedded views"), "{message}");
}

#[test]
fn rejects_component_directive_without_component_view() {
    let message = illegal(build(vec![NodeDef::element("div", 1), plain().component()]));
    assert!(message.contains("without a component view"), "{message}");
}

#[test]
fn rejects_component_view_without_component_directive() {
    let message = illegal(build(vec![
        NodeDef::element("my-cmp", 0).with_component(item_template, None)
    ]));
    assert!(message.contains("declares no component directive"), "{message}");
}

#[test]
fn rejects_pure_pipe_without_pipe_node() {
    let message = illegal(build(vec![
        NodeDef::element("div", 1),
        NodeDef::pure_pipe(0, 1),
    ]));
    assert!(message.contains("earlier pipe node"), "{message}");
}

#[test]
fn definitions_are_memoized_per_factory() {
    let first = resolve_definition(item_template).unwrap();
    let second = resolve_definition(item_template).unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(first.nodes.len(), 2);
    let other = resolve_definition(matching_template).unwrap();
    assert_eq!(other.nodes.len(), 1);
    assert!(other.nodes[0].matched_query_ids.contains(3));
}

#[test]
fn query_ids_must_fit_the_query_bit_set() {
    let message = illegal(build(vec![
        NodeDef::element("div", 1),
        NodeDef::element("b", 0).matching(64, QueryValueType::ElementRef),
    ]));
    assert!(message.contains("Query id 64 is out of range"), "{message}");

    let message = illegal(build(vec![NodeDef::view_query(
        70,
        &[("items", QueryBindingKind::All)],
    )]));
    assert!(message.contains("Query id 70"), "{message}");

    let def = build(vec![
        NodeDef::element("div", 1),
        NodeDef::element("b", 0).matching(63, QueryValueType::ElementRef),
        NodeDef::view_query(63, &[("items", QueryBindingKind::All)]),
    ])
    .unwrap();
    assert!(def.nodes[0].child_matched_queries.contains(63));
    assert!(!def.nodes[0].child_matched_queries.contains(0));
}
