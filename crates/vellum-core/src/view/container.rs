//! Embedded view containers: attach, detach and move.

use super::data::{ContainerLink, ElementData, ViewData, ViewState};
use super::def::NodeFlags;
use super::render_nodes::{visit_root_render_nodes, RenderNodeAction};
use crate::error::{ViewError, ViewResult};
use std::cell::RefCell;

/// Embedded views currently inserted after one anchor.
#[derive(Default)]
pub(crate) struct ViewContainerData {
    views: RefCell<Vec<ViewData>>,
}

impl ViewContainerData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn views(&self) -> Vec<ViewData> {
        self.views.borrow().clone()
    }
}

fn container_of(view: &ViewData, anchor: usize) -> ViewResult<ElementData> {
    let element = view.element(anchor)?;
    if element.view_container.is_none() {
        return Err(ViewError::illegal_state(format!(
            "node {anchor} does not host a view container"
        )));
    }
    Ok(element)
}

pub(crate) fn attach_embedded_view(
    parent_view: &ViewData,
    anchor: usize,
    index: Option<usize>,
    view: &ViewData,
) -> ViewResult<()> {
    let element = container_of(parent_view, anchor)?;
    let Some(container) = element.view_container.as_ref() else {
        return Ok(());
    };
    let (index, prev) = {
        let mut views = container.views.borrow_mut();
        let len = views.len();
        let index = index.unwrap_or(len);
        if index > len {
            return Err(ViewError::illegal_state(format!(
                "index {index} is out of range for a container of {len} views"
            )));
        }
        views.insert(index, view.clone());
        let prev = index.checked_sub(1).map(|i| views[i].clone());
        (index, prev)
    };
    *view.container_parent.borrow_mut() = Some(ContainerLink {
        view: parent_view.downgrade(),
        anchor,
    });
    attach_projected_view(parent_view, anchor, view);
    dirty_parent_queries(view);
    render_attach_embedded_view(&element, prev.as_ref(), view);
    log::trace!("attached embedded view at {index} after node {anchor}");
    Ok(())
}

/// Removes the view at `index` (the last one when `index` is `None` or out of
/// range) without destroying it.
pub(crate) fn detach_embedded_view(
    parent_view: &ViewData,
    anchor: usize,
    index: Option<usize>,
) -> ViewResult<Option<ViewData>> {
    let element = container_of(parent_view, anchor)?;
    let Some(container) = element.view_container.as_ref() else {
        return Ok(None);
    };
    let view = {
        let mut views = container.views.borrow_mut();
        let Some(last) = views.len().checked_sub(1) else {
            return Ok(None);
        };
        let index = index.filter(|i| *i <= last).unwrap_or(last);
        views.remove(index)
    };
    *view.container_parent.borrow_mut() = None;
    dirty_parent_queries(&view);
    render_detach_view(&view);
    Ok(Some(view))
}

pub(crate) fn move_embedded_view(
    parent_view: &ViewData,
    anchor: usize,
    old_index: usize,
    new_index: usize,
) -> ViewResult<ViewData> {
    let element = container_of(parent_view, anchor)?;
    let Some(container) = element.view_container.as_ref() else {
        return Err(ViewError::illegal_state("missing view container"));
    };
    let (view, prev) = {
        let mut views = container.views.borrow_mut();
        let len = views.len();
        if old_index >= len || new_index >= len {
            return Err(ViewError::illegal_state(format!(
                "cannot move view {old_index} to {new_index} in a container of {len} views"
            )));
        }
        let view = views.remove(old_index);
        views.insert(new_index, view.clone());
        let prev = new_index.checked_sub(1).map(|i| views[i].clone());
        (view, prev)
    };
    dirty_parent_queries(&view);
    render_detach_view(&view);
    render_attach_embedded_view(&element, prev.as_ref(), &view);
    Ok(view)
}

/// Records `view` on its declaring template when it is inserted into a
/// container other than the one at its declaration site.
fn attach_projected_view(container_view: &ViewData, anchor: usize, view: &ViewData) {
    let (Some(declaring), Some(declared_anchor)) = (view.parent_view(), view.parent_node) else {
        return;
    };
    if declaring == *container_view && declared_anchor == anchor {
        return;
    }
    if view.has_state(ViewState::IS_PROJECTED_VIEW) {
        return;
    }
    view.set_state(ViewState::IS_PROJECTED_VIEW);
    if let Ok(ElementData {
        template: Some(template),
        ..
    }) = declaring.element(declared_anchor)
    {
        template.projected_views.borrow_mut().push(view.clone());
    }
}

pub(crate) fn detach_projected_view(view: &ViewData) {
    if !view.has_state(ViewState::IS_PROJECTED_VIEW) {
        return;
    }
    let (Some(declaring), Some(declared_anchor)) = (view.parent_view(), view.parent_node) else {
        return;
    };
    if let Ok(ElementData {
        template: Some(template),
        ..
    }) = declaring.element(declared_anchor)
    {
        template.projected_views.borrow_mut().retain(|v| v != view);
        dirty_parent_queries(view);
    }
}

/// Marks every dynamic query that may see `view` as dirty: content queries
/// around the declaration anchors up the embedded chain, then the view
/// queries of the enclosing component or root view.
pub(crate) fn dirty_parent_queries(view: &ViewData) {
    let mut view = view.clone();
    while view.is_embedded_view() {
        let (Some(parent), Some(anchor)) = (view.parent_view(), view.parent_node) else {
            break;
        };
        let template = parent.node_def(anchor);
        let end = anchor + template.child_count;
        let mut i = 0;
        while i <= end {
            let node = parent.node_def(i);
            if node.flags.contains(NodeFlags::TYPE_CONTENT_QUERY)
                && node.flags.contains(NodeFlags::DYNAMIC_QUERY)
                && node
                    .query()
                    .map(|q| template.child_matched_queries.contains(q.id))
                    .unwrap_or(false)
            {
                if let Some(list) = parent.query_list(i) {
                    list.set_dirty();
                }
            }
            let outside = node.flags.contains(NodeFlags::TYPE_ELEMENT)
                && i + node.child_count < anchor;
            if outside
                || !node.child_flags.contains(NodeFlags::TYPE_CONTENT_QUERY)
                || !node.child_flags.contains(NodeFlags::DYNAMIC_QUERY)
            {
                i += node.child_count;
            }
            i += 1;
        }
        view = parent;
    }

    let def = &view.def;
    if !def.node_flags.contains(NodeFlags::TYPE_VIEW_QUERY) {
        return;
    }
    let mut i = 0;
    while i < def.nodes.len() {
        let node = &def.nodes[i];
        if node.flags.contains(NodeFlags::TYPE_VIEW_QUERY)
            && node.flags.contains(NodeFlags::DYNAMIC_QUERY)
        {
            if let Some(list) = view.query_list(i) {
                list.set_dirty();
            }
        }
        i += node.child_count + 1;
    }
}

fn render_attach_embedded_view(element: &ElementData, prev: Option<&ViewData>, view: &ViewData) {
    let prev_node = match prev {
        Some(prev) => prev
            .def
            .last_render_root_node
            .and_then(|i| prev.render_node(i)),
        None => Some(element.render_element),
    };
    let Some(prev_node) = prev_node else {
        return;
    };
    let parent = view.renderer.parent_node(prev_node);
    let next = view.renderer.next_sibling(prev_node);
    if parent.is_some() {
        visit_root_render_nodes(view, RenderNodeAction::InsertBefore, parent, next, &mut Vec::new());
    }
}

fn render_detach_view(view: &ViewData) {
    visit_root_render_nodes(view, RenderNodeAction::RemoveChild, None, None, &mut Vec::new());
}
