//! Per-instance view state.

use super::def::{NodeDef, ViewDefinition};
use super::query::QueryList;
use super::container::ViewContainerData;
use crate::app::ErrorHandler;
use crate::config::EngineConfig;
use crate::di::{Injector, NodeBloom};
use crate::directive::{DirectiveInstance, PipeInstance};
use crate::error::{ViewError, ViewResult};
use crate::render::{RNode, Renderer, RendererFactory, Sanitizer};
use crate::value::Value;
use bitflags::bitflags;
use std::cell::{Cell, RefCell};
use std::ops::Deref;
use std::rc::{Rc, Weak};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ViewState: u16 {
        const BEFORE_FIRST_CHECK = 1 << 0;
        const FIRST_CHECK = 1 << 1;
        const ATTACHED = 1 << 2;
        const CHECKS_ENABLED = 1 << 3;
        const IS_PROJECTED_VIEW = 1 << 4;
        const CHECK_PROJECTED_VIEW = 1 << 5;
        const CHECK_PROJECTED_VIEWS = 1 << 6;
        const DESTROYED = 1 << 7;

        const CAT_DETECT_CHANGES = Self::ATTACHED.bits() | Self::CHECKS_ENABLED.bits();
        const CAT_INIT = Self::BEFORE_FIRST_CHECK.bits() | Self::CAT_DETECT_CHANGES.bits();
    }
}

/// Progress through the one-shot init hooks. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InitState {
    BeforeInit,
    CallingOnInit,
    CallingAfterContentInit,
    CallingAfterViewInit,
    AfterInit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Root,
    Component,
    Embedded,
}

/// Where a root view gets its host element from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootSelector {
    Selector(String),
    Node(RNode),
}

/// Services shared by every view of one application.
#[derive(Clone)]
pub struct Environment {
    pub injector: Rc<dyn Injector>,
    pub renderer_factory: Rc<dyn RendererFactory>,
    pub sanitizer: Rc<dyn Sanitizer>,
    pub error_handler: Rc<dyn ErrorHandler>,
    pub config: EngineConfig,
}

/// State shared by a root view and all of its descendants.
pub struct RootContext {
    pub env: Environment,
    pub renderer: Rc<dyn Renderer>,
    pub selector_or_node: Option<RootSelector>,
    pub projectable_nodes: Vec<Vec<RNode>>,
    on_dirty: RefCell<Option<Rc<dyn Fn()>>>,
}

impl RootContext {
    pub fn new(
        env: Environment,
        selector_or_node: Option<RootSelector>,
        projectable_nodes: Vec<Vec<RNode>>,
    ) -> Rc<Self> {
        let renderer = env.renderer_factory.create_renderer(None, None);
        Rc::new(Self {
            env,
            renderer,
            selector_or_node,
            projectable_nodes,
            on_dirty: RefCell::new(None),
        })
    }

    /// Installs the callback run whenever a view of this tree is marked
    /// dirty.
    pub fn set_on_dirty(&self, callback: Option<Rc<dyn Fn()>>) {
        *self.on_dirty.borrow_mut() = callback;
    }

    pub(crate) fn notify_dirty(&self) {
        let callback = self.on_dirty.borrow().clone();
        if let Some(callback) = callback {
            callback();
        }
    }
}

/// Declaring-side data of a template anchor.
pub(crate) struct TemplateData {
    /// Views created from this template and inserted into a container other
    /// than the anchor's own.
    pub projected_views: RefCell<Vec<ViewData>>,
}

#[derive(Clone)]
pub(crate) struct ElementData {
    pub render_element: RNode,
    pub component_view: Option<ViewData>,
    pub view_container: Option<Rc<ViewContainerData>>,
    pub template: Option<Rc<TemplateData>>,
    pub bloom: NodeBloom,
}

#[derive(Clone)]
pub(crate) enum ProviderInstance {
    Value(Value),
    Directive(DirectiveInstance),
    Pipe(PipeInstance),
}

impl ProviderInstance {
    pub fn value(&self) -> Value {
        match self {
            ProviderInstance::Value(value) => value.clone(),
            ProviderInstance::Directive(directive) => directive.value(),
            ProviderInstance::Pipe(pipe) => pipe.value(),
        }
    }
}

#[derive(Clone, Default)]
pub(crate) enum NodeData {
    #[default]
    Empty,
    Element(ElementData),
    Text(RNode),
    /// Provider being constructed; seeing it again means a dependency cycle.
    Creating,
    Provider(ProviderInstance),
    Pure(Value),
    Query(QueryList),
}

/// Link from an embedded view to the container it is inserted in.
#[derive(Clone)]
pub(crate) struct ContainerLink {
    pub view: Weak<ViewInner>,
    pub anchor: usize,
}

pub(crate) struct ViewInner {
    pub def: Rc<ViewDefinition>,
    pub root: Rc<RootContext>,
    pub renderer: Rc<dyn Renderer>,
    /// Declaring view for embedded views, host view for component views.
    pub parent: Option<Weak<ViewInner>>,
    /// Host element of a component view or anchor of an embedded view, in
    /// `parent`.
    pub parent_node: Option<usize>,
    pub kind: ViewKind,
    pub container_parent: RefCell<Option<ContainerLink>>,
    pub context: RefCell<Value>,
    pub component: RefCell<Option<DirectiveInstance>>,
    pub nodes: RefCell<Vec<NodeData>>,
    pub old_values: RefCell<Vec<Value>>,
    pub disposables: RefCell<Vec<Option<Box<dyn FnOnce()>>>>,
    pub state: Cell<ViewState>,
    pub init_state: Cell<InitState>,
    pub init_index: Cell<usize>,
    pub on_destroy: RefCell<Vec<Box<dyn FnOnce()>>>,
}

/// Shared handle to one view instance.
#[derive(Clone)]
pub(crate) struct ViewData(pub(crate) Rc<ViewInner>);

impl Deref for ViewData {
    type Target = ViewInner;

    fn deref(&self) -> &ViewInner {
        &self.0
    }
}

impl PartialEq for ViewData {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl ViewData {
    pub fn new(
        root: Rc<RootContext>,
        renderer: Rc<dyn Renderer>,
        parent: Option<&ViewData>,
        parent_node: Option<usize>,
        kind: ViewKind,
        def: Rc<ViewDefinition>,
    ) -> ViewData {
        let node_count = def.nodes.len();
        let binding_count = def.binding_count;
        let output_count = def.output_count;
        ViewData(Rc::new(ViewInner {
            def,
            root,
            renderer,
            parent: parent.map(|p| Rc::downgrade(&p.0)),
            parent_node,
            kind,
            container_parent: RefCell::new(None),
            context: RefCell::new(Value::Null),
            component: RefCell::new(None),
            nodes: RefCell::new(vec![NodeData::Empty; node_count]),
            old_values: RefCell::new(vec![Value::Null; binding_count]),
            disposables: RefCell::new((0..output_count).map(|_| None).collect()),
            state: Cell::new(ViewState::CAT_INIT),
            init_state: Cell::new(InitState::BeforeInit),
            init_index: Cell::new(0),
            on_destroy: RefCell::new(Vec::new()),
        }))
    }

    pub fn from_weak(weak: &Weak<ViewInner>) -> Option<ViewData> {
        weak.upgrade().map(ViewData)
    }

    pub fn downgrade(&self) -> Weak<ViewInner> {
        Rc::downgrade(&self.0)
    }

    pub fn parent_view(&self) -> Option<ViewData> {
        self.parent.as_ref().and_then(ViewData::from_weak)
    }

    pub fn container_parent_view(&self) -> Option<ViewData> {
        self.container_parent
            .borrow()
            .as_ref()
            .and_then(|link| ViewData::from_weak(&link.view))
    }

    pub fn is_component_view(&self) -> bool {
        self.kind == ViewKind::Component
    }

    pub fn is_embedded_view(&self) -> bool {
        self.kind == ViewKind::Embedded
    }

    pub fn node_def(&self, index: usize) -> &NodeDef {
        &self.def.nodes[index]
    }

    pub fn has_state(&self, state: ViewState) -> bool {
        self.state.get().contains(state)
    }

    pub fn is_destroyed(&self) -> bool {
        self.has_state(ViewState::DESTROYED)
    }

    pub fn set_state(&self, state: ViewState) {
        self.state.set(self.state.get() | state);
    }

    pub fn clear_state(&self, state: ViewState) {
        self.state.set(self.state.get() - state);
    }

    pub fn node(&self, index: usize) -> NodeData {
        self.nodes
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_node(&self, index: usize, data: NodeData) {
        if let Some(slot) = self.nodes.borrow_mut().get_mut(index) {
            *slot = data;
        }
    }

    pub fn element(&self, index: usize) -> ViewResult<ElementData> {
        match self.node(index) {
            NodeData::Element(el) => Ok(el),
            _ => Err(ViewError::illegal_state(format!(
                "node {index} is not an element"
            ))),
        }
    }

    pub fn render_node(&self, index: usize) -> Option<RNode> {
        match self.node(index) {
            NodeData::Element(el) => Some(el.render_element),
            NodeData::Text(node) => Some(node),
            _ => None,
        }
    }

    pub fn provider(&self, index: usize) -> Option<ProviderInstance> {
        match self.node(index) {
            NodeData::Provider(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn directive(&self, index: usize) -> Option<DirectiveInstance> {
        match self.node(index) {
            NodeData::Provider(ProviderInstance::Directive(directive)) => Some(directive),
            _ => None,
        }
    }

    pub fn query_list(&self, index: usize) -> Option<QueryList> {
        match self.node(index) {
            NodeData::Query(list) => Some(list),
            _ => None,
        }
    }

    pub fn embedded_views(&self, index: usize) -> Vec<ViewData> {
        match self.node(index) {
            NodeData::Element(ElementData {
                view_container: Some(container),
                ..
            }) => container.views(),
            _ => Vec::new(),
        }
    }

    pub fn component_view(&self, index: usize) -> Option<ViewData> {
        match self.node(index) {
            NodeData::Element(el) => el.component_view,
            _ => None,
        }
    }

    pub fn old_value(&self, index: usize) -> Value {
        self.old_values
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_old_value(&self, index: usize, value: Value) {
        if let Some(slot) = self.old_values.borrow_mut().get_mut(index) {
            *slot = value;
        }
    }

    pub fn context(&self) -> Value {
        self.context.borrow().clone()
    }

    pub fn component(&self) -> Option<DirectiveInstance> {
        self.component.borrow().clone()
    }

    /// Sets the component and context. Embedded views share the component
    /// of their declaring view.
    pub fn init(&self, component: Option<DirectiveInstance>, context: Value) {
        *self.component.borrow_mut() = component;
        *self.context.borrow_mut() = context;
    }

    /// Nearest enclosing component or root view.
    pub fn component_or_root_view(&self) -> ViewData {
        let mut view = self.clone();
        while view.is_embedded_view() {
            match view.parent_view() {
                Some(parent) => view = parent,
                None => break,
            }
        }
        view
    }

    /// Host element of the nearest component view: `(host view, element
    /// index)`.
    pub fn host_element(&self) -> Option<(ViewData, usize)> {
        let comp = self.component_or_root_view();
        let host_index = comp.parent_node?;
        Some((comp.parent_view()?, host_index))
    }

    pub fn ensure_alive(&self, action: &'static str) -> ViewResult<()> {
        if self.is_destroyed() {
            Err(ViewError::ViewDestroyed(action))
        } else {
            Ok(())
        }
    }
}
