//! Renderer abstraction the view engine writes through.
//!
//! The engine never touches a concrete node tree. It creates, attaches and
//! mutates render nodes exclusively through [`Renderer`], and obtains one
//! renderer per component through [`RendererFactory`] so that components can
//! use different encapsulation strategies.

mod memory;

pub use memory::{MemoryRenderer, MemoryRendererFactory, RenderOp};

use crate::error::ViewError;
use crate::value::Value;
use std::rc::Rc;

/// Opaque handle to a node owned by a renderer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RNode(pub usize);

/// Callback invoked by the renderer when an event fires on a listened node.
/// Returning `false` asks the renderer to prevent the default action.
pub type EventListener = Rc<dyn Fn(&Value) -> bool>;

/// Detaches a listener previously registered with [`Renderer::listen`].
pub type Unlisten = Box<dyn FnOnce()>;

pub trait Renderer {
    fn create_element(&self, name: &str, namespace: Option<&str>) -> RNode;
    fn create_comment(&self, value: &str) -> RNode;
    fn create_text(&self, value: &str) -> RNode;

    fn append_child(&self, parent: RNode, child: RNode);
    fn insert_before(&self, parent: RNode, child: RNode, reference: Option<RNode>);
    fn remove_child(&self, parent: RNode, child: RNode);
    fn destroy_node(&self, _node: RNode) {}

    /// Resolves the pre-existing root element a root view renders into.
    fn select_root_element(&self, selector: &str) -> Result<RNode, ViewError>;

    fn parent_node(&self, node: RNode) -> Option<RNode>;
    fn next_sibling(&self, node: RNode) -> Option<RNode>;

    fn set_attribute(&self, el: RNode, name: &str, value: &str, namespace: Option<&str>);
    fn remove_attribute(&self, el: RNode, name: &str, namespace: Option<&str>);
    fn add_class(&self, el: RNode, name: &str);
    fn remove_class(&self, el: RNode, name: &str);
    fn set_style(&self, el: RNode, style: &str, value: &str);
    fn remove_style(&self, el: RNode, style: &str);
    fn set_property(&self, el: RNode, name: &str, value: &Value);
    fn set_value(&self, node: RNode, value: &str);

    /// `target` of `None` listens on `node`; `Some("window")` and friends
    /// listen on a global target.
    fn listen(
        &self,
        node: RNode,
        target: Option<&str>,
        event: &str,
        callback: EventListener,
    ) -> Unlisten;

    /// Called when the component view owning this renderer is destroyed.
    fn destroy(&self) {}
}

/// Injectable handle to the renderer of the nearest component view.
#[derive(Clone)]
pub struct RendererHandle(pub Rc<dyn Renderer>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewEncapsulation {
    #[default]
    Emulated,
    Native,
    None,
}

/// Per-component rendering metadata supplied by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererType {
    pub id: String,
    pub encapsulation: ViewEncapsulation,
    pub styles: Vec<String>,
}

impl RendererType {
    pub fn new(id: impl Into<String>, encapsulation: ViewEncapsulation) -> Self {
        Self {
            id: id.into(),
            encapsulation,
            styles: Vec::new(),
        }
    }
}

pub trait RendererFactory {
    fn create_renderer(
        &self,
        host: Option<RNode>,
        renderer_type: Option<&RendererType>,
    ) -> Rc<dyn Renderer>;

    /// Brackets a change detection pass.
    fn begin(&self) {}
    fn end(&self) {}
}

/// Security context of a bound property or attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityContext {
    #[default]
    None,
    Html,
    Style,
    Script,
    Url,
    ResourceUrl,
}

/// Cleans values before they reach the renderer. Only consulted for bindings
/// whose security context is not [`SecurityContext::None`].
pub trait Sanitizer {
    fn sanitize(&self, context: SecurityContext, value: &Value) -> Value;
}

/// Sanitizer that passes values through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSanitizer;

impl Sanitizer for NoopSanitizer {
    fn sanitize(&self, _context: SecurityContext, value: &Value) -> Value {
        value.clone()
    }
}
