//! Event dispatch into a view's handler.

use super::data::{NodeData, ViewData, ViewState};
use super::def::NodeFlags;
use super::refs::{ElementRef, ViewRef};
use crate::value::Value;
use std::rc::Rc;

/// Handle passed to a view's event handler.
pub struct EventContext<'a> {
    view: &'a ViewData,
}

impl EventContext<'_> {
    pub fn component(&self) -> Value {
        self.view
            .component()
            .map(|c| c.value())
            .unwrap_or_default()
    }

    pub fn context(&self) -> Value {
        self.view.context()
    }

    pub fn node_value(&self, index: usize) -> Value {
        node_value(self.view, index)
    }

    pub fn view_ref(&self) -> ViewRef {
        ViewRef::new(self.view.clone())
    }
}

/// Value exposed for node `index` to update functions and event handlers.
pub(crate) fn node_value(view: &ViewData, index: usize) -> Value {
    match view.node(index) {
        NodeData::Element(el) => Value::from_rc(Rc::new(ElementRef::new(el.render_element))),
        NodeData::Text(rnode) => Value::from_rc(Rc::new(rnode)),
        NodeData::Provider(instance) => instance.value(),
        NodeData::Pure(value) => value,
        NodeData::Query(list) => Value::from_rc(Rc::new(list)),
        NodeData::Empty | NodeData::Creating => Value::Null,
    }
}

/// Routes an event raised on element `index` of `view` to the view's
/// handler. Marks the path to the root for check first and requests a tick.
///
/// Returns `false` when the handler asks to prevent the default action.
/// Handler errors go to the application's error handler.
pub(crate) fn dispatch_event(view: &ViewData, index: usize, event_name: &str, event: &Value) -> bool {
    if view.is_destroyed() {
        return true;
    }
    let start = if view.node_def(index).flags.contains(NodeFlags::COMPONENT_VIEW) {
        view.component_view(index).unwrap_or_else(|| view.clone())
    } else {
        view.clone()
    };
    mark_parent_views_for_check(&start);
    let result = match view.def.handle_event.clone() {
        Some(handler) => handler(&EventContext { view }, index, event_name, event),
        None => Ok(true),
    };
    view.root.notify_dirty();
    match result {
        Ok(allow_default) => allow_default,
        Err(err) => {
            log::debug!("event {event_name} on node {index} failed: {err}");
            view.root.env.error_handler.handle_error(&err);
            true
        }
    }
}

/// Enables checks on every OnPush view from `view` up to its root.
pub(crate) fn mark_parent_views_for_check(view: &ViewData) {
    let mut current = Some(view.clone());
    while let Some(v) = current {
        if v.def.is_on_push() {
            v.set_state(ViewState::CHECKS_ENABLED);
        }
        current = v.container_parent_view().or_else(|| v.parent_view());
    }
}
