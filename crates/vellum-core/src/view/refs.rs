//! Public handles onto views, containers, templates and elements.
//!
//! Handles that injection can hand out (`ChangeDetectorRef`, `TemplateRef`,
//! `ViewContainerRef`) refer to their view weakly so that a directive holding
//! one does not keep its own view alive. They fail with
//! [`ViewError::ViewDestroyed`] once the view is gone.

use super::check::{check_and_update_view, check_no_changes_view};
use super::container::{attach_embedded_view, detach_embedded_view, move_embedded_view};
use super::create::create_embedded_view;
use super::data::{ViewData, ViewInner, ViewState};
use super::destroy::destroy_view;
use super::event::mark_parent_views_for_check;
use super::render_nodes::root_render_nodes;
use crate::error::{ViewError, ViewResult};
use crate::render::RNode;
use crate::value::Value;
use std::fmt;
use std::rc::Weak;

/// Wrapper around the render node of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef {
    native_element: RNode,
}

impl ElementRef {
    pub fn new(native_element: RNode) -> Self {
        Self { native_element }
    }

    pub fn native_element(&self) -> RNode {
        self.native_element
    }
}

fn detect_changes(view: &ViewData) -> ViewResult<()> {
    view.ensure_alive("detectChanges")?;
    let factory = &view.root.env.renderer_factory;
    factory.begin();
    let result = check_and_update_view(view);
    factory.end();
    result
}

fn check_no_changes(view: &ViewData) -> ViewResult<()> {
    view.ensure_alive("checkNoChanges")?;
    check_no_changes_view(view)
}

fn mark_for_check(view: &ViewData) {
    mark_parent_views_for_check(view);
    view.root.notify_dirty();
}

/// Owning handle to a root, component or embedded view.
#[derive(Clone)]
pub struct ViewRef {
    view: ViewData,
}

impl ViewRef {
    pub(crate) fn new(view: ViewData) -> Self {
        Self { view }
    }

    pub(crate) fn data(&self) -> &ViewData {
        &self.view
    }

    pub fn context(&self) -> Value {
        self.view.context()
    }

    /// Replaces the context of an embedded view.
    pub fn set_context(&self, context: Value) {
        *self.view.context.borrow_mut() = context;
    }

    pub fn component(&self) -> Option<Value> {
        self.view.component().map(|c| c.value())
    }

    /// Top-level render nodes in document order, including nodes of nested
    /// embedded views and projected content.
    pub fn root_nodes(&self) -> Vec<RNode> {
        root_render_nodes(&self.view)
    }

    pub fn detect_changes(&self) -> ViewResult<()> {
        detect_changes(&self.view)
    }

    pub fn check_no_changes(&self) -> ViewResult<()> {
        check_no_changes(&self.view)
    }

    pub fn mark_for_check(&self) {
        mark_for_check(&self.view);
    }

    /// Excludes the view from change detection until [`ViewRef::reattach`].
    pub fn detach(&self) {
        self.view.clear_state(ViewState::ATTACHED);
    }

    pub fn reattach(&self) {
        self.view.set_state(ViewState::ATTACHED);
    }

    pub fn is_attached(&self) -> bool {
        self.view.has_state(ViewState::ATTACHED)
    }

    pub fn state(&self) -> ViewState {
        self.view.state.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.view.is_destroyed()
    }

    /// Destroys the view, removing it from its container first if it is
    /// inserted in one.
    pub fn destroy(&self) -> ViewResult<()> {
        let link = self.view.container_parent.borrow().clone();
        if let Some(link) = link {
            if let Some(parent) = ViewData::from_weak(&link.view) {
                let container = ViewContainerRef::new(&parent, link.anchor);
                if let Some(index) = container.index_of(self) {
                    return container.remove(Some(index));
                }
            }
        }
        destroy_view(&self.view)
    }

    /// Runs `callback` once the view is destroyed.
    pub fn on_destroy(&self, callback: impl FnOnce() + 'static) {
        self.view.on_destroy.borrow_mut().push(Box::new(callback));
    }

    pub fn ptr_eq(&self, other: &ViewRef) -> bool {
        self.view == other.view
    }
}

impl fmt::Debug for ViewRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewRef")
            .field("kind", &self.view.kind)
            .field("state", &self.view.state.get())
            .finish()
    }
}

/// Change detection controls for the view a directive lives in.
#[derive(Clone)]
pub struct ChangeDetectorRef {
    view: Weak<ViewInner>,
}

impl ChangeDetectorRef {
    pub(crate) fn new(view: &ViewData) -> Self {
        Self {
            view: view.downgrade(),
        }
    }

    fn view(&self) -> ViewResult<ViewData> {
        ViewData::from_weak(&self.view).ok_or(ViewError::ViewDestroyed("ChangeDetectorRef"))
    }

    pub fn detect_changes(&self) -> ViewResult<()> {
        detect_changes(&self.view()?)
    }

    pub fn check_no_changes(&self) -> ViewResult<()> {
        check_no_changes(&self.view()?)
    }

    pub fn mark_for_check(&self) -> ViewResult<()> {
        mark_for_check(&self.view()?);
        Ok(())
    }

    pub fn detach(&self) -> ViewResult<()> {
        self.view()?.clear_state(ViewState::ATTACHED);
        Ok(())
    }

    pub fn reattach(&self) -> ViewResult<()> {
        self.view()?.set_state(ViewState::ATTACHED);
        Ok(())
    }

    pub fn view_ref(&self) -> ViewResult<ViewRef> {
        Ok(ViewRef::new(self.view()?))
    }
}

impl fmt::Debug for ChangeDetectorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeDetectorRef")
            .field("alive", &(self.view.strong_count() > 0))
            .finish()
    }
}

/// A template anchor from which embedded views are stamped.
#[derive(Clone)]
pub struct TemplateRef {
    view: Weak<ViewInner>,
    anchor: usize,
}

impl TemplateRef {
    pub(crate) fn new(view: &ViewData, anchor: usize) -> Self {
        Self {
            view: view.downgrade(),
            anchor,
        }
    }

    fn parts(&self) -> ViewResult<(ViewData, usize)> {
        let view =
            ViewData::from_weak(&self.view).ok_or(ViewError::ViewDestroyed("TemplateRef"))?;
        Ok((view, self.anchor))
    }

    /// Creates a view from the template without inserting it anywhere.
    pub fn create_embedded_view(&self, context: Value) -> ViewResult<ViewRef> {
        let (view, anchor) = self.parts()?;
        view.ensure_alive("createEmbeddedView")?;
        let def = view
            .node_def(anchor)
            .as_element()
            .and_then(|el| el.template.clone())
            .ok_or_else(|| {
                ViewError::illegal_state(format!("node {anchor} does not declare a template"))
            })?;
        create_embedded_view(&view, anchor, def, context).map(ViewRef::new)
    }

    pub fn element_ref(&self) -> ViewResult<ElementRef> {
        let (view, anchor) = self.parts()?;
        Ok(ElementRef::new(view.element(anchor)?.render_element))
    }
}

impl fmt::Debug for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRef")
            .field("anchor", &self.anchor)
            .finish()
    }
}

/// Ordered list of embedded views rendered after an anchor element.
#[derive(Clone)]
pub struct ViewContainerRef {
    view: Weak<ViewInner>,
    anchor: usize,
}

impl ViewContainerRef {
    pub(crate) fn new(view: &ViewData, anchor: usize) -> Self {
        Self {
            view: view.downgrade(),
            anchor,
        }
    }

    fn parent(&self) -> ViewResult<ViewData> {
        ViewData::from_weak(&self.view).ok_or(ViewError::ViewDestroyed("ViewContainerRef"))
    }

    fn views(&self) -> Vec<ViewData> {
        ViewData::from_weak(&self.view)
            .map(|parent| parent.embedded_views(self.anchor))
            .unwrap_or_default()
    }

    pub fn element(&self) -> ViewResult<ElementRef> {
        Ok(ElementRef::new(
            self.parent()?.element(self.anchor)?.render_element,
        ))
    }

    pub fn len(&self) -> usize {
        self.views().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<ViewRef> {
        self.views().get(index).cloned().map(ViewRef::new)
    }

    pub fn index_of(&self, view: &ViewRef) -> Option<usize> {
        self.views().iter().position(|v| *v == view.view)
    }

    /// Creates a view from `template` and inserts it at `index`, or at the
    /// end when `index` is `None`.
    pub fn create_embedded_view(
        &self,
        template: &TemplateRef,
        context: Value,
        index: Option<usize>,
    ) -> ViewResult<ViewRef> {
        let view = template.create_embedded_view(context)?;
        self.insert(&view, index)
    }

    pub fn insert(&self, view: &ViewRef, index: Option<usize>) -> ViewResult<ViewRef> {
        let parent = self.parent()?;
        parent.ensure_alive("ViewContainerRef.insert")?;
        view.view.ensure_alive("ViewContainerRef.insert")?;
        if !view.view.is_embedded_view() {
            return Err(ViewError::illegal_state(
                "only embedded views can be inserted into a container",
            ));
        }
        if view.view.container_parent.borrow().is_some() {
            return Err(ViewError::illegal_state(
                "view is already attached to a container",
            ));
        }
        attach_embedded_view(&parent, self.anchor, index, &view.view)?;
        log::debug!("inserted view into container at node {}", self.anchor);
        Ok(view.clone())
    }

    /// Moves an inserted view to `index`.
    pub fn move_view(&self, view: &ViewRef, index: usize) -> ViewResult<ViewRef> {
        let parent = self.parent()?;
        let old_index = self.index_of(view).ok_or_else(|| {
            ViewError::illegal_state("view is not attached to this container")
        })?;
        move_embedded_view(&parent, self.anchor, old_index, index)?;
        Ok(view.clone())
    }

    /// Destroys the view at `index`, or the last one, then removes it. The
    /// view leaves the container even when its teardown fails.
    pub fn remove(&self, index: Option<usize>) -> ViewResult<()> {
        let parent = self.parent()?;
        let views = parent.embedded_views(self.anchor);
        let Some(last) = views.len().checked_sub(1) else {
            return Ok(());
        };
        let index = index.filter(|i| *i <= last).unwrap_or(last);
        let view = views[index].clone();
        let destroyed = destroy_view(&view);
        let position = parent
            .embedded_views(self.anchor)
            .iter()
            .position(|v| *v == view);
        if let Some(position) = position {
            detach_embedded_view(&parent, self.anchor, Some(position))?;
        }
        log::debug!("removed view {index} from container at node {}", self.anchor);
        destroyed
    }

    /// Removes the view at `index`, or the last one, without destroying it.
    pub fn detach(&self, index: Option<usize>) -> ViewResult<Option<ViewRef>> {
        let parent = self.parent()?;
        Ok(detach_embedded_view(&parent, self.anchor, index)?.map(ViewRef::new))
    }

    pub fn clear(&self) -> ViewResult<()> {
        while !self.is_empty() {
            self.remove(None)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ViewContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewContainerRef")
            .field("anchor", &self.anchor)
            .field("len", &self.len())
            .finish()
    }
}
