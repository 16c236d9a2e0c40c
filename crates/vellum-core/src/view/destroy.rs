use super::check::{
    call_lifecycle_hooks_child_first, exec_component_views_action, exec_embedded_views_action,
    ViewAction,
};
use super::container::detach_projected_view;
use super::data::{NodeData, ViewData, ViewState};
use super::def::NodeFlags;
use crate::error::ViewResult;

/// Tears `view` down: nested views first, then `OnDestroy` hooks children
/// first, listeners and subscriptions, render nodes and finally the view's
/// destroy callbacks. Destroying twice is a no-op.
pub(crate) fn destroy_view(view: &ViewData) -> ViewResult<()> {
    if view.is_destroyed() {
        return Ok(());
    }
    exec_embedded_views_action(view, ViewAction::Destroy)?;
    exec_component_views_action(view, ViewAction::Destroy)?;
    call_lifecycle_hooks_child_first(view, NodeFlags::ON_DESTROY)?;

    let disposables: Vec<Box<dyn FnOnce()>> = view
        .disposables
        .borrow_mut()
        .iter_mut()
        .filter_map(Option::take)
        .collect();
    for dispose in disposables {
        dispose();
    }
    detach_projected_view(view);
    destroy_view_nodes(view);
    if view.is_component_view() {
        view.renderer.destroy();
    }
    view.set_state(ViewState::DESTROYED);

    let callbacks = std::mem::take(&mut *view.on_destroy.borrow_mut());
    for callback in callbacks {
        callback();
    }
    log::trace!("destroyed {:?} view", view.kind);
    Ok(())
}

fn destroy_view_nodes(view: &ViewData) {
    for i in 0..view.def.nodes.len() {
        match view.node(i) {
            NodeData::Element(el) => view.renderer.destroy_node(el.render_element),
            NodeData::Text(rnode) => view.renderer.destroy_node(rnode),
            NodeData::Query(list) if view.node_def(i).flags.intersects(NodeFlags::CAT_QUERY) => {
                list.destroy()
            }
            _ => {}
        }
    }
}
