//! Walks over the render nodes a view contributes to its parent.

use super::data::ViewData;
use super::def::{NodeDef, NodeFlags, NodeKind};
use crate::render::{RNode, ViewEncapsulation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderNodeAction {
    AppendChild,
    InsertBefore,
    RemoveChild,
    Collect,
}

/// Top-level render nodes of `view` in document order.
pub(crate) fn root_render_nodes(view: &ViewData) -> Vec<RNode> {
    let mut nodes = Vec::new();
    visit_root_render_nodes(view, RenderNodeAction::Collect, None, None, &mut nodes);
    nodes
}

pub(crate) fn visit_root_render_nodes(
    view: &ViewData,
    action: RenderNodeAction,
    parent: Option<RNode>,
    next_sibling: Option<RNode>,
    target: &mut Vec<RNode>,
) {
    let mut parent = parent;
    if action == RenderNodeAction::RemoveChild {
        parent = view
            .def
            .last_render_root_node
            .and_then(|i| view.render_node(i))
            .and_then(|node| view.renderer.parent_node(node));
    }
    let Some(last) = view.def.nodes.len().checked_sub(1) else {
        return;
    };
    visit_sibling_render_nodes(view, action, 0, last, parent, next_sibling, target);
}

fn visit_sibling_render_nodes(
    view: &ViewData,
    action: RenderNodeAction,
    start: usize,
    end: usize,
    parent: Option<RNode>,
    next_sibling: Option<RNode>,
    target: &mut Vec<RNode>,
) {
    let mut i = start;
    while i <= end {
        let node = view.node_def(i);
        if node
            .flags
            .intersects(NodeFlags::TYPE_ELEMENT | NodeFlags::TYPE_TEXT | NodeFlags::TYPE_NG_CONTENT)
        {
            visit_render_node(view, node, action, parent, next_sibling, target);
        }
        i += node.child_count + 1;
    }
}

fn visit_render_node(
    view: &ViewData,
    node: &NodeDef,
    action: RenderNodeAction,
    parent: Option<RNode>,
    next_sibling: Option<RNode>,
    target: &mut Vec<RNode>,
) {
    if let NodeKind::NgContent { index } = node.kind {
        visit_projected_render_nodes(view, index, action, parent, next_sibling, target);
        return;
    }
    let Some(rnode) = view.render_node(node.node_index) else {
        return;
    };
    exec_render_node_action(view, rnode, action, parent, next_sibling, target);
    if node.flags.contains(NodeFlags::EMBEDDED_VIEWS) {
        for embedded in view.embedded_views(node.node_index) {
            visit_root_render_nodes(&embedded, action, parent, next_sibling, target);
        }
    }
    // Children of an ng-container render as its siblings.
    if node.is_ng_container() && node.child_count > 0 {
        let end = node.node_index + node.child_count;
        visit_sibling_render_nodes(view, action, node.node_index + 1, end, parent, next_sibling, target);
    }
}

/// Visits the nodes the host of the enclosing component projects into
/// `ng_content_index`.
pub(crate) fn visit_projected_render_nodes(
    view: &ViewData,
    ng_content_index: usize,
    action: RenderNodeAction,
    parent: Option<RNode>,
    next_sibling: Option<RNode>,
    target: &mut Vec<RNode>,
) {
    let mut comp_view = Some(view.clone());
    while let Some(v) = comp_view.as_ref() {
        if v.is_component_view() {
            break;
        }
        comp_view = v.parent_view();
    }
    let Some(comp_view) = comp_view else {
        return;
    };
    let (Some(host_view), Some(host_index)) = (comp_view.parent_view(), comp_view.parent_node)
    else {
        return;
    };
    let host = host_view.node_def(host_index);
    let mut i = host_index + 1;
    while i <= host_index + host.child_count {
        let node = host_view.node_def(i);
        if node.ng_content_index == Some(ng_content_index) {
            visit_render_node(&host_view, node, action, parent, next_sibling, target);
        }
        i += node.child_count + 1;
    }
    if host_view.parent.is_none() {
        if let Some(projected) = view.root.projectable_nodes.get(ng_content_index) {
            for &rnode in projected {
                exec_render_node_action(view, rnode, action, parent, next_sibling, target);
            }
        }
    }
}

fn exec_render_node_action(
    view: &ViewData,
    rnode: RNode,
    action: RenderNodeAction,
    parent: Option<RNode>,
    next_sibling: Option<RNode>,
    target: &mut Vec<RNode>,
) {
    let renderer = &view.renderer;
    match action {
        RenderNodeAction::AppendChild => {
            if let Some(parent) = parent {
                renderer.append_child(parent, rnode);
            }
        }
        RenderNodeAction::InsertBefore => {
            if let Some(parent) = parent {
                renderer.insert_before(parent, rnode, next_sibling);
            }
        }
        RenderNodeAction::RemoveChild => {
            if let Some(parent) = parent {
                renderer.remove_child(parent, rnode);
            }
        }
        RenderNodeAction::Collect => target.push(rnode),
    }
}

/// Render node that children of `node` are appended to while the view is
/// created, or `None` when they are attached later: children of a component
/// host wait for projection, and root nodes of embedded views wait for
/// insertion into a container.
pub(crate) fn get_parent_render_element(
    view: &ViewData,
    render_host: Option<RNode>,
    node: &NodeDef,
) -> Option<RNode> {
    match node.render_parent {
        Some(render_parent) => {
            let parent = view.node_def(render_parent);
            let projects_children = parent.flags.contains(NodeFlags::TYPE_ELEMENT)
                && parent.flags.contains(NodeFlags::COMPONENT_VIEW)
                && parent
                    .as_element()
                    .and_then(|el| el.component_renderer_type.as_ref())
                    .map(|rt| rt.encapsulation != ViewEncapsulation::Native)
                    .unwrap_or(true);
            if projects_children {
                None
            } else {
                view.render_node(render_parent)
            }
        }
        None => render_host,
    }
}

/// Appends the nodes projected into `ng-content` `node` to its render
/// parent.
pub(crate) fn append_ng_content(view: &ViewData, render_host: Option<RNode>, node: &NodeDef) {
    let Some(parent) = get_parent_render_element(view, render_host, node) else {
        return;
    };
    let NodeKind::NgContent { index } = node.kind else {
        return;
    };
    visit_projected_render_nodes(
        view,
        index,
        RenderNodeAction::AppendChild,
        Some(parent),
        None,
        &mut Vec::new(),
    );
}
