//! Creating components as roots of their own view trees.

use crate::di::ElementInjector;
use crate::error::{ViewError, ViewResult};
use crate::render::{RNode, RendererType};
use crate::token::Token;
use crate::value::Value;
use crate::view::{
    create_root_view, ChangeDetectorRef, ElementRef, Environment, NodeDef, RootContext,
    RootSelector, ViewDefinition, ViewDefinitionFactory, ViewFlags, ViewRef,
};
use std::fmt;
use std::rc::Rc;

const HOST_ELEMENT: usize = 0;
const HOST_COMPONENT: usize = 1;

/// Creates a component together with a host view holding its host element.
pub struct ComponentFactory {
    selector: String,
    component_token: Token,
    host_def: Rc<ViewDefinition>,
}

impl ComponentFactory {
    /// `component` is the component's directive node; `view` produces its
    /// view definition.
    pub fn new(
        selector: &str,
        component: NodeDef,
        view: ViewDefinitionFactory,
        renderer_type: Option<RendererType>,
    ) -> ViewResult<Self> {
        let component_token = component
            .provider()
            .map(|p| p.token)
            .ok_or_else(|| ViewError::illegal_state("component node must be a directive"))?;
        let host_def = crate::view::view_def(
            ViewFlags::empty(),
            vec![
                NodeDef::element(selector, 1).with_component(view, renderer_type),
                component.component(),
            ],
            None,
            None,
            None,
        )?;
        Ok(Self {
            selector: selector.to_string(),
            component_token,
            host_def: Rc::new(host_def),
        })
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn component_token(&self) -> Token {
        self.component_token
    }

    /// Instantiates the component. With a `root_selector` the host element
    /// is looked up through the renderer; otherwise a detached host element
    /// is created. `projectable_nodes[i]` are rendered at the component's
    /// `i`-th `ng-content`.
    pub fn create(
        &self,
        env: Environment,
        projectable_nodes: Vec<Vec<RNode>>,
        root_selector: Option<RootSelector>,
    ) -> ViewResult<ComponentRef> {
        let root = RootContext::new(env, root_selector, projectable_nodes);
        let host_view = create_root_view(root, Rc::clone(&self.host_def), Value::Null)?;
        let data = host_view.data();
        let instance = data
            .provider(HOST_COMPONENT)
            .map(|instance| instance.value())
            .ok_or_else(|| ViewError::illegal_state("component was not created"))?;
        let location = ElementRef::new(data.element(HOST_ELEMENT)?.render_element);
        let component_view = data
            .component_view(HOST_ELEMENT)
            .ok_or_else(|| ViewError::illegal_state("component view was not created"))?;
        let injector = ElementInjector::new(data, HOST_ELEMENT);
        log::debug!("created component {}", self.selector);
        Ok(ComponentRef {
            host_view,
            component_view: ViewRef::new(component_view),
            instance,
            location,
            injector,
        })
    }
}

impl fmt::Debug for ComponentFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentFactory")
            .field("selector", &self.selector)
            .field("component", &self.component_token)
            .finish()
    }
}

/// A created component.
#[derive(Clone)]
pub struct ComponentRef {
    host_view: ViewRef,
    component_view: ViewRef,
    instance: Value,
    location: ElementRef,
    injector: ElementInjector,
}

impl ComponentRef {
    /// The root view holding the host element. Checking it checks the
    /// component.
    pub fn host_view(&self) -> &ViewRef {
        &self.host_view
    }

    pub fn component_view(&self) -> &ViewRef {
        &self.component_view
    }

    pub fn instance(&self) -> Value {
        self.instance.clone()
    }

    pub fn location(&self) -> ElementRef {
        self.location
    }

    pub fn injector(&self) -> &ElementInjector {
        &self.injector
    }

    pub fn change_detector_ref(&self) -> ChangeDetectorRef {
        ChangeDetectorRef::new(self.host_view.data())
    }

    pub fn destroy(&self) -> ViewResult<()> {
        self.host_view.destroy()
    }

    pub fn on_destroy(&self, callback: impl FnOnce() + 'static) {
        self.host_view.on_destroy(callback);
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRef")
            .field("location", &self.location)
            .finish()
    }
}
