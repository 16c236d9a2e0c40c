//! View instantiation.

use super::check::{exec_component_views_action, exec_queries_action, CheckType, ViewAction};
use super::container::ViewContainerData;
use super::data::{
    ElementData, NodeData, ProviderInstance, RootContext, RootSelector, TemplateData, ViewData,
    ViewKind,
};
use super::def::{
    resolve_definition, ElementDef, NodeDef, NodeFlags, NodeKind, ProviderSource, ViewDefinition,
};
use super::event::dispatch_event;
use super::query::QueryList;
use super::render_nodes::{append_ng_content, get_parent_render_element};
use crate::di::node_injector::resolve_dep;
use crate::di::NodeBloom;
use crate::directive::{DirectiveInstance, PipeInstance};
use crate::error::{ViewError, ViewResult};
use crate::render::{EventListener, RNode};
use crate::token::{Dep, Token};
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Creates a root view rendering into the root context's selector or node.
pub(crate) fn create_root_view(
    root: Rc<RootContext>,
    def: Rc<ViewDefinition>,
    context: Value,
) -> ViewResult<ViewData> {
    let renderer = Rc::clone(&root.renderer);
    let view = ViewData::new(root, renderer, None, None, ViewKind::Root, def);
    view.init(None, context);
    create_view_nodes(&view)?;
    log::debug!("created root view with {} nodes", view.def.nodes.len());
    Ok(view)
}

/// Creates an embedded view declared at `anchor` of `parent`. The view is not
/// inserted into any container.
pub(crate) fn create_embedded_view(
    parent: &ViewData,
    anchor: usize,
    def: Rc<ViewDefinition>,
    context: Value,
) -> ViewResult<ViewData> {
    let view = ViewData::new(
        Rc::clone(&parent.root),
        Rc::clone(&parent.renderer),
        Some(parent),
        Some(anchor),
        ViewKind::Embedded,
        def,
    );
    view.init(parent.component(), context);
    create_view_nodes(&view)?;
    Ok(view)
}

fn create_component_view(
    parent: &ViewData,
    node: &NodeDef,
    el: &ElementDef,
    def: Rc<ViewDefinition>,
    host: RNode,
) -> ViewData {
    let root = Rc::clone(&parent.root);
    let renderer = match &el.component_renderer_type {
        Some(renderer_type) => root
            .env
            .renderer_factory
            .create_renderer(Some(host), Some(renderer_type)),
        None => Rc::clone(&parent.root.renderer),
    };
    ViewData::new(
        root,
        renderer,
        Some(parent),
        Some(node.node_index),
        ViewKind::Component,
        def,
    )
}

/// Creates render nodes, listeners, directives and the other node instances
/// of `view`, then the nodes of its component views and the static queries.
pub(crate) fn create_view_nodes(view: &ViewData) -> ViewResult<()> {
    let render_host = if view.is_component_view() {
        view.parent_view()
            .zip(view.parent_node)
            .and_then(|(host_view, index)| host_view.render_node(index))
    } else {
        None
    };
    let def = Rc::clone(&view.def);
    for (i, node) in def.nodes.iter().enumerate() {
        match &node.kind {
            NodeKind::Element(el) => {
                let render_element = create_element(view, render_host, node, el)?;
                let component_view = match el.component_view {
                    Some(factory) if node.flags.contains(NodeFlags::COMPONENT_VIEW) => {
                        let component_def = resolve_definition(factory)?;
                        Some(create_component_view(
                            view,
                            node,
                            el,
                            component_def,
                            render_element,
                        ))
                    }
                    _ => None,
                };
                listen_to_element_outputs(view, node, render_element);
                let template = el.template.as_ref().map(|_| {
                    Rc::new(TemplateData {
                        projected_views: RefCell::new(Vec::new()),
                    })
                });
                let view_container = node
                    .flags
                    .contains(NodeFlags::EMBEDDED_VIEWS)
                    .then(|| Rc::new(ViewContainerData::new()));
                let bloom = NodeBloom::new(el.own_bloom, parent_bloom(view, node).as_ref());
                view.set_node(
                    i,
                    NodeData::Element(ElementData {
                        render_element,
                        component_view,
                        view_container,
                        template,
                        bloom,
                    }),
                );
            }
            NodeKind::Text { prefix } => {
                let text = view.renderer.create_text(prefix);
                if let Some(parent) = get_parent_render_element(view, render_host, node) {
                    view.renderer.append_child(parent, text);
                }
                view.set_node(i, NodeData::Text(text));
            }
            NodeKind::Provider(_) => {
                let lazy = node.flags.contains(NodeFlags::LAZY_PROVIDER);
                let created = matches!(view.node(i), NodeData::Provider(_));
                if !lazy && !created {
                    let instance = instantiate_provider(view, i)?;
                    if node.flags.contains(NodeFlags::COMPONENT) {
                        if let (ProviderInstance::Directive(component), Some(parent)) =
                            (&instance, node.parent)
                        {
                            if let Some(component_view) = view.component_view(parent) {
                                component_view.init(Some(component.clone()), component.value());
                            }
                        }
                    }
                }
            }
            NodeKind::PureExpression(_) => view.set_node(i, NodeData::Pure(Value::Null)),
            NodeKind::Query(_) => view.set_node(i, NodeData::Query(QueryList::new())),
            NodeKind::NgContent { .. } => append_ng_content(view, render_host, node),
        }
    }
    exec_component_views_action(view, ViewAction::CreateViewNodes)?;
    exec_queries_action(
        view,
        NodeFlags::TYPE_CONTENT_QUERY | NodeFlags::TYPE_VIEW_QUERY,
        NodeFlags::STATIC_QUERY,
        CheckType::CheckAndUpdate,
    )?;
    Ok(())
}

fn create_element(
    view: &ViewData,
    render_host: Option<RNode>,
    node: &NodeDef,
    el: &ElementDef,
) -> ViewResult<RNode> {
    let renderer = &view.renderer;
    let selector = match (&view.parent, &view.root.selector_or_node) {
        (None, Some(selector)) => Some(selector),
        _ => None,
    };
    let rnode = match selector {
        None => {
            let rnode = match &el.name {
                Some(name) => renderer.create_element(name, el.ns.as_deref()),
                None => renderer.create_comment(""),
            };
            if let Some(parent) = get_parent_render_element(view, render_host, node) {
                renderer.append_child(parent, rnode);
            }
            rnode
        }
        Some(selector) => {
            if node.node_index > 0 {
                log::warn!(
                    "root selector reused for node {} of a root view",
                    node.node_index
                );
            }
            match selector {
                RootSelector::Selector(selector) => renderer.select_root_element(selector)?,
                RootSelector::Node(rnode) => *rnode,
            }
        }
    };
    for (name, value) in &el.attrs {
        renderer.set_attribute(rnode, name, value, None);
    }
    Ok(rnode)
}

fn parent_bloom(view: &ViewData, node: &NodeDef) -> Option<NodeBloom> {
    let mut parent = node.parent;
    while let Some(p) = parent {
        if let Ok(el) = view.element(p) {
            return Some(el.bloom);
        }
        parent = view.node_def(p).parent;
    }
    let host_view = view.parent_view()?;
    let host = view.parent_node?;
    host_view.element(host).ok().map(|el| el.bloom)
}

fn listen_to_element_outputs(view: &ViewData, node: &NodeDef, render_element: RNode) {
    for (i, output) in node.outputs.iter().enumerate() {
        let weak = view.downgrade();
        let index = node.node_index;
        let event_name = output.full_event_name();
        let listener: EventListener = Rc::new(move |event: &Value| {
            match ViewData::from_weak(&weak) {
                Some(view) => dispatch_event(&view, index, &event_name, event),
                None => true,
            }
        });
        let unlisten = view.renderer.listen(
            render_element,
            output.target.as_deref(),
            &output.event_name,
            listener,
        );
        if let Some(slot) = view.disposables.borrow_mut().get_mut(node.output_index + i) {
            *slot = Some(unlisten);
        }
    }
}

/// Creates the provider, directive or pipe at `index` and stores it in the
/// view. The slot holds `Creating` while dependencies resolve so that cycles
/// are detected.
pub(crate) fn instantiate_provider(view: &ViewData, index: usize) -> ViewResult<ProviderInstance> {
    view.set_node(index, NodeData::Creating);
    match create_provider_instance(view, index) {
        Ok(instance) => {
            view.set_node(index, NodeData::Provider(instance.clone()));
            Ok(instance)
        }
        Err(err) => {
            view.set_node(index, NodeData::Empty);
            Err(err)
        }
    }
}

fn create_provider_instance(view: &ViewData, index: usize) -> ViewResult<ProviderInstance> {
    let def = Rc::clone(&view.def);
    let node = &def.nodes[index];
    let provider = node
        .provider()
        .ok_or_else(|| ViewError::illegal_state(format!("node {index} is not a provider")))?;
    match &provider.source {
        ProviderSource::Value(value) => Ok(ProviderInstance::Value(value.clone())),
        ProviderSource::Factory(factory) => {
            let args = resolve_deps(view, node, &provider.deps)?;
            Ok(ProviderInstance::Value(factory(&args)?))
        }
        ProviderSource::Existing(token) => {
            let value = resolve_dep(
                view,
                node.parent,
                node.flags.contains(NodeFlags::PRIVATE_PROVIDER),
                (*token).into(),
                None,
            )?;
            Ok(ProviderInstance::Value(value))
        }
        ProviderSource::Directive(factory) => {
            let args = resolve_deps(view, node, &provider.deps)?;
            let directive = factory(&args)?;
            subscribe_to_outputs(view, node, &directive)?;
            Ok(ProviderInstance::Directive(directive))
        }
        ProviderSource::Pipe(factory) => {
            let args = resolve_pipe_deps(view, &provider.deps)?;
            let pipe: PipeInstance = factory(&args)?;
            Ok(ProviderInstance::Pipe(pipe))
        }
    }
}

fn resolve_deps(
    view: &ViewData,
    node: &NodeDef,
    deps: &[Dep],
) -> ViewResult<Vec<Value>> {
    let allow_private = node
        .flags
        .intersects(NodeFlags::COMPONENT | NodeFlags::PRIVATE_PROVIDER);
    deps.iter()
        .map(|dep| {
            resolve_dep(view, node.parent, allow_private, *dep, None)
                .map_err(|err| ViewError::from(err.with_token(node_token(node))))
        })
        .collect()
}

fn node_token(node: &NodeDef) -> Token {
    node.provider()
        .map(|p| p.token)
        .unwrap_or(Token::INJECTOR)
}

/// Pipes resolve against the host element of the enclosing component view,
/// or the module injector for pipes of a root view.
fn resolve_pipe_deps(view: &ViewData, deps: &[Dep]) -> ViewResult<Vec<Value>> {
    let host = view.host_element();
    deps.iter()
        .map(|dep| {
            let result = match &host {
                Some((host_view, host_index)) => {
                    resolve_dep(host_view, Some(*host_index), true, *dep, None)
                }
                None => resolve_dep(view, None, false, *dep, None),
            };
            result.map_err(ViewError::from)
        })
        .collect()
}

fn subscribe_to_outputs(
    view: &ViewData,
    node: &NodeDef,
    directive: &DirectiveInstance,
) -> ViewResult<()> {
    if node.outputs.is_empty() {
        return Ok(());
    }
    let Some(element_index) = node.parent else {
        return Ok(());
    };
    for (i, output) in node.outputs.iter().enumerate() {
        let Some(prop) = output.prop_name.as_deref() else {
            continue;
        };
        let emitter = directive.hooks()?.output(prop).ok_or_else(|| {
            ViewError::illegal_state(format!(
                "@Output {prop} not initialized in '{}'",
                node_token(node)
            ))
        })?;
        let weak = view.downgrade();
        let event_name = output.event_name.clone();
        let unsubscribe = emitter.subscribe(move |event| {
            if let Some(view) = ViewData::from_weak(&weak) {
                dispatch_event(&view, element_index, &event_name, event);
            }
        });
        if let Some(slot) = view.disposables.borrow_mut().get_mut(node.output_index + i) {
            *slot = Some(unsubscribe);
        }
    }
    Ok(())
}
