use super::{EventListener, RNode, Renderer, RendererFactory, RendererType, Unlisten};
use crate::collections::map::HashMap;
use crate::error::ViewError;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt::Write;
use std::rc::Rc;

/// Mutation recorded by [`MemoryRenderer`].
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOp {
    CreateElement(String),
    CreateText(String),
    CreateComment,
    AppendChild { parent: RNode, child: RNode },
    InsertBefore { parent: RNode, child: RNode, reference: Option<RNode> },
    RemoveChild { parent: RNode, child: RNode },
    DestroyNode(RNode),
    SetAttribute { el: RNode, name: String, value: String },
    RemoveAttribute { el: RNode, name: String },
    AddClass { el: RNode, name: String },
    RemoveClass { el: RNode, name: String },
    SetStyle { el: RNode, name: String, value: String },
    RemoveStyle { el: RNode, name: String },
    SetProperty { el: RNode, name: String, value: Value },
    SetValue { node: RNode, value: String },
    Listen { node: RNode, event: String },
}

impl RenderOp {
    /// Whether the op writes a binding result (as opposed to building the
    /// tree).
    pub fn is_binding_write(&self) -> bool {
        matches!(
            self,
            RenderOp::SetAttribute { .. }
                | RenderOp::RemoveAttribute { .. }
                | RenderOp::AddClass { .. }
                | RenderOp::RemoveClass { .. }
                | RenderOp::SetStyle { .. }
                | RenderOp::RemoveStyle { .. }
                | RenderOp::SetProperty { .. }
                | RenderOp::SetValue { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MemKind {
    Element { name: String },
    Text,
    Comment,
}

struct Listener {
    id: u64,
    target: Option<String>,
    event: String,
    callback: EventListener,
}

struct MemNode {
    kind: MemKind,
    value: String,
    parent: Option<RNode>,
    children: Vec<RNode>,
    attributes: Vec<(String, String)>,
    classes: BTreeSet<String>,
    styles: Vec<(String, String)>,
    properties: Vec<(String, Value)>,
    listeners: Vec<Listener>,
    destroyed: bool,
}

impl MemNode {
    fn new(kind: MemKind, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
            parent: None,
            children: Vec::new(),
            attributes: Vec::new(),
            classes: BTreeSet::new(),
            styles: Vec::new(),
            properties: Vec::new(),
            listeners: Vec::new(),
            destroyed: false,
        }
    }
}

#[derive(Default)]
struct MemoryTree {
    nodes: Vec<MemNode>,
    ops: Vec<RenderOp>,
    roots: HashMap<String, RNode>,
    next_listener: u64,
    destroyed_renderers: Vec<String>,
}

impl MemoryTree {
    fn push(&mut self, node: MemNode) -> RNode {
        let id = RNode(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn node(&self, id: RNode) -> Option<&MemNode> {
        self.nodes.get(id.0)
    }

    fn node_mut(&mut self, id: RNode) -> Option<&mut MemNode> {
        self.nodes.get_mut(id.0)
    }

    fn detach(&mut self, child: RNode) {
        let Some(parent) = self.node(child).and_then(|n| n.parent) else {
            return;
        };
        if let Some(parent) = self.node_mut(parent) {
            parent.children.retain(|c| *c != child);
        }
        if let Some(child) = self.node_mut(child) {
            child.parent = None;
        }
    }

    fn insert(&mut self, parent: RNode, child: RNode, reference: Option<RNode>) {
        self.detach(child);
        let Some(parent_node) = self.node_mut(parent) else {
            return;
        };
        let position = reference
            .and_then(|r| parent_node.children.iter().position(|c| *c == r))
            .unwrap_or(parent_node.children.len());
        parent_node.children.insert(position, child);
        if let Some(child) = self.node_mut(child) {
            child.parent = Some(parent);
        }
    }
}

/// In-memory renderer recording every call, used by tests and headless hosts.
///
/// All renderers produced by one [`MemoryRendererFactory`] share a single
/// node tree, the way component renderers share a document.
#[derive(Clone, Default)]
pub struct MemoryRenderer {
    tree: Rc<RefCell<MemoryTree>>,
    component_id: Option<String>,
}

impl MemoryRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pre-existing element that `select_root_element(selector)`
    /// will return.
    pub fn add_root_element(&self, selector: &str, tag: &str) -> RNode {
        let mut tree = self.tree.borrow_mut();
        let node = tree.push(MemNode::new(
            MemKind::Element {
                name: tag.to_string(),
            },
            "",
        ));
        tree.roots.insert(selector.to_string(), node);
        node
    }

    /// Creates a detached container element without recording an op.
    pub fn create_detached_root(&self, tag: &str) -> RNode {
        self.tree.borrow_mut().push(MemNode::new(
            MemKind::Element {
                name: tag.to_string(),
            },
            "",
        ))
    }

    pub fn component_id(&self) -> Option<&str> {
        self.component_id.as_deref()
    }

    pub fn ops(&self) -> Vec<RenderOp> {
        self.tree.borrow().ops.clone()
    }

    pub fn take_ops(&self) -> Vec<RenderOp> {
        std::mem::take(&mut self.tree.borrow_mut().ops)
    }

    pub fn clear_ops(&self) {
        self.tree.borrow_mut().ops.clear();
    }

    pub fn binding_writes(&self) -> usize {
        self.tree
            .borrow()
            .ops
            .iter()
            .filter(|op| op.is_binding_write())
            .count()
    }

    pub fn destroyed_renderers(&self) -> Vec<String> {
        self.tree.borrow().destroyed_renderers.clone()
    }

    pub fn children(&self, node: RNode) -> Vec<RNode> {
        self.tree
            .borrow()
            .node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn tag_name(&self, node: RNode) -> Option<String> {
        match self.tree.borrow().node(node).map(|n| n.kind.clone()) {
            Some(MemKind::Element { name }) => Some(name),
            _ => None,
        }
    }

    pub fn is_comment(&self, node: RNode) -> bool {
        matches!(
            self.tree.borrow().node(node).map(|n| &n.kind),
            Some(MemKind::Comment)
        )
    }

    pub fn is_destroyed(&self, node: RNode) -> bool {
        self.tree
            .borrow()
            .node(node)
            .map(|n| n.destroyed)
            .unwrap_or(true)
    }

    pub fn node_value(&self, node: RNode) -> Option<String> {
        self.tree.borrow().node(node).map(|n| n.value.clone())
    }

    pub fn attribute(&self, el: RNode, name: &str) -> Option<String> {
        self.tree.borrow().node(el).and_then(|n| {
            n.attributes
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        })
    }

    pub fn has_class(&self, el: RNode, name: &str) -> bool {
        self.tree
            .borrow()
            .node(el)
            .map(|n| n.classes.contains(name))
            .unwrap_or(false)
    }

    pub fn style(&self, el: RNode, name: &str) -> Option<String> {
        self.tree.borrow().node(el).and_then(|n| {
            n.styles
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        })
    }

    pub fn property(&self, el: RNode, name: &str) -> Option<Value> {
        self.tree.borrow().node(el).and_then(|n| {
            n.properties
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        })
    }

    pub fn listener_count(&self, node: RNode) -> usize {
        self.tree
            .borrow()
            .node(node)
            .map(|n| n.listeners.len())
            .unwrap_or(0)
    }

    /// Concatenated text of all text descendants, in tree order.
    pub fn text_content(&self, node: RNode) -> String {
        let tree = self.tree.borrow();
        let mut out = String::new();
        collect_text(&tree, node, &mut out);
        out
    }

    /// Delivers `event` to the listeners registered on `node` for `name`.
    /// Returns `false` if any listener asked to prevent the default action.
    pub fn dispatch_event(&self, node: RNode, name: &str, event: &Value) -> bool {
        self.dispatch(node, None, name, event)
    }

    /// Delivers an event to listeners registered on a global target such as
    /// `"window"`.
    pub fn dispatch_global_event(&self, target: &str, name: &str, event: &Value) -> bool {
        let listeners: Vec<EventListener> = {
            let tree = self.tree.borrow();
            tree.nodes
                .iter()
                .flat_map(|n| n.listeners.iter())
                .filter(|l| l.target.as_deref() == Some(target) && l.event == name)
                .map(|l| Rc::clone(&l.callback))
                .collect()
        };
        listeners
            .into_iter()
            .fold(true, |allow, listener| listener(event) && allow)
    }

    fn dispatch(&self, node: RNode, target: Option<&str>, name: &str, event: &Value) -> bool {
        let listeners: Vec<EventListener> = {
            let tree = self.tree.borrow();
            match tree.node(node) {
                Some(n) => n
                    .listeners
                    .iter()
                    .filter(|l| l.target.as_deref() == target && l.event == name)
                    .map(|l| Rc::clone(&l.callback))
                    .collect(),
                None => Vec::new(),
            }
        };
        listeners
            .into_iter()
            .fold(true, |allow, listener| listener(event) && allow)
    }

    pub fn dump_tree(&self, root: Option<RNode>) -> String {
        let mut output = String::new();
        match root {
            Some(root) => {
                let tree = self.tree.borrow();
                dump_node(&tree, &mut output, root, 0);
            }
            None => output.push_str("(no root)\n"),
        }
        output
    }

    fn record(&self, op: RenderOp) {
        self.tree.borrow_mut().ops.push(op);
    }
}

fn collect_text(tree: &MemoryTree, node: RNode, out: &mut String) {
    let Some(n) = tree.node(node) else {
        return;
    };
    if n.kind == MemKind::Text {
        out.push_str(&n.value);
    }
    for child in &n.children {
        collect_text(tree, *child, out);
    }
}

fn dump_node(tree: &MemoryTree, output: &mut String, id: RNode, depth: usize) {
    let indent = "  ".repeat(depth);
    let Some(node) = tree.node(id) else {
        let _ = writeln!(output, "{indent}(missing {})", id.0);
        return;
    };
    match &node.kind {
        MemKind::Element { name } => {
            let _ = write!(output, "{indent}<{name}");
            for (k, v) in &node.attributes {
                let _ = write!(output, " {k}=\"{v}\"");
            }
            if !node.classes.is_empty() {
                let classes: Vec<&str> = node.classes.iter().map(String::as_str).collect();
                let _ = write!(output, " class=\"{}\"", classes.join(" "));
            }
            output.push_str(">\n");
        }
        MemKind::Text => {
            let _ = writeln!(output, "{indent}{:?}", node.value);
        }
        MemKind::Comment => {
            let _ = writeln!(output, "{indent}<!--{}-->", node.value);
        }
    }
    for child in &node.children {
        dump_node(tree, output, *child, depth + 1);
    }
}

impl Renderer for MemoryRenderer {
    fn create_element(&self, name: &str, _namespace: Option<&str>) -> RNode {
        self.record(RenderOp::CreateElement(name.to_string()));
        self.tree.borrow_mut().push(MemNode::new(
            MemKind::Element {
                name: name.to_string(),
            },
            "",
        ))
    }

    fn create_comment(&self, value: &str) -> RNode {
        self.record(RenderOp::CreateComment);
        self.tree
            .borrow_mut()
            .push(MemNode::new(MemKind::Comment, value))
    }

    fn create_text(&self, value: &str) -> RNode {
        self.record(RenderOp::CreateText(value.to_string()));
        self.tree.borrow_mut().push(MemNode::new(MemKind::Text, value))
    }

    fn append_child(&self, parent: RNode, child: RNode) {
        self.record(RenderOp::AppendChild { parent, child });
        self.tree.borrow_mut().insert(parent, child, None);
    }

    fn insert_before(&self, parent: RNode, child: RNode, reference: Option<RNode>) {
        self.record(RenderOp::InsertBefore {
            parent,
            child,
            reference,
        });
        self.tree.borrow_mut().insert(parent, child, reference);
    }

    fn remove_child(&self, parent: RNode, child: RNode) {
        self.record(RenderOp::RemoveChild { parent, child });
        let mut tree = self.tree.borrow_mut();
        if tree.node(child).and_then(|n| n.parent) == Some(parent) {
            tree.detach(child);
        }
    }

    fn destroy_node(&self, node: RNode) {
        self.record(RenderOp::DestroyNode(node));
        if let Some(node) = self.tree.borrow_mut().node_mut(node) {
            node.destroyed = true;
            node.listeners.clear();
        }
    }

    fn select_root_element(&self, selector: &str) -> Result<RNode, ViewError> {
        let root = self
            .tree
            .borrow()
            .roots
            .get(selector)
            .copied()
            .ok_or_else(|| ViewError::SelectorNotFound(selector.to_string()))?;
        let children = self.children(root);
        let mut tree = self.tree.borrow_mut();
        for child in children {
            tree.detach(child);
        }
        Ok(root)
    }

    fn parent_node(&self, node: RNode) -> Option<RNode> {
        self.tree.borrow().node(node).and_then(|n| n.parent)
    }

    fn next_sibling(&self, node: RNode) -> Option<RNode> {
        let tree = self.tree.borrow();
        let parent = tree.node(node)?.parent?;
        let siblings = &tree.node(parent)?.children;
        let index = siblings.iter().position(|c| *c == node)?;
        siblings.get(index + 1).copied()
    }

    fn set_attribute(&self, el: RNode, name: &str, value: &str, _namespace: Option<&str>) {
        self.record(RenderOp::SetAttribute {
            el,
            name: name.to_string(),
            value: value.to_string(),
        });
        if let Some(node) = self.tree.borrow_mut().node_mut(el) {
            match node.attributes.iter_mut().find(|(k, _)| k == name) {
                Some(entry) => entry.1 = value.to_string(),
                None => node.attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    fn remove_attribute(&self, el: RNode, name: &str, _namespace: Option<&str>) {
        self.record(RenderOp::RemoveAttribute {
            el,
            name: name.to_string(),
        });
        if let Some(node) = self.tree.borrow_mut().node_mut(el) {
            node.attributes.retain(|(k, _)| k != name);
        }
    }

    fn add_class(&self, el: RNode, name: &str) {
        self.record(RenderOp::AddClass {
            el,
            name: name.to_string(),
        });
        if let Some(node) = self.tree.borrow_mut().node_mut(el) {
            node.classes.insert(name.to_string());
        }
    }

    fn remove_class(&self, el: RNode, name: &str) {
        self.record(RenderOp::RemoveClass {
            el,
            name: name.to_string(),
        });
        if let Some(node) = self.tree.borrow_mut().node_mut(el) {
            node.classes.remove(name);
        }
    }

    fn set_style(&self, el: RNode, style: &str, value: &str) {
        self.record(RenderOp::SetStyle {
            el,
            name: style.to_string(),
            value: value.to_string(),
        });
        if let Some(node) = self.tree.borrow_mut().node_mut(el) {
            match node.styles.iter_mut().find(|(k, _)| k == style) {
                Some(entry) => entry.1 = value.to_string(),
                None => node.styles.push((style.to_string(), value.to_string())),
            }
        }
    }

    fn remove_style(&self, el: RNode, style: &str) {
        self.record(RenderOp::RemoveStyle {
            el,
            name: style.to_string(),
        });
        if let Some(node) = self.tree.borrow_mut().node_mut(el) {
            node.styles.retain(|(k, _)| k != style);
        }
    }

    fn set_property(&self, el: RNode, name: &str, value: &Value) {
        self.record(RenderOp::SetProperty {
            el,
            name: name.to_string(),
            value: value.clone(),
        });
        if let Some(node) = self.tree.borrow_mut().node_mut(el) {
            match node.properties.iter_mut().find(|(k, _)| k == name) {
                Some(entry) => entry.1 = value.clone(),
                None => node.properties.push((name.to_string(), value.clone())),
            }
        }
    }

    fn set_value(&self, node: RNode, value: &str) {
        self.record(RenderOp::SetValue {
            node,
            value: value.to_string(),
        });
        if let Some(node) = self.tree.borrow_mut().node_mut(node) {
            node.value = value.to_string();
        }
    }

    fn listen(
        &self,
        node: RNode,
        target: Option<&str>,
        event: &str,
        callback: EventListener,
    ) -> Unlisten {
        self.record(RenderOp::Listen {
            node,
            event: event.to_string(),
        });
        let id = {
            let mut tree = self.tree.borrow_mut();
            let id = tree.next_listener;
            tree.next_listener += 1;
            if let Some(n) = tree.node_mut(node) {
                n.listeners.push(Listener {
                    id,
                    target: target.map(str::to_string),
                    event: event.to_string(),
                    callback,
                });
            }
            id
        };
        let tree = Rc::downgrade(&self.tree);
        Box::new(move || {
            if let Some(tree) = tree.upgrade() {
                if let Some(n) = tree.borrow_mut().node_mut(node) {
                    n.listeners.retain(|l| l.id != id);
                }
            }
        })
    }

    fn destroy(&self) {
        if let Some(id) = &self.component_id {
            self.tree.borrow_mut().destroyed_renderers.push(id.clone());
        }
    }
}

/// Hands out [`MemoryRenderer`]s sharing one tree.
#[derive(Clone, Default)]
pub struct MemoryRendererFactory {
    renderer: MemoryRenderer,
    passes: Rc<RefCell<(usize, usize)>>,
}

impl MemoryRendererFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The renderer used for root views and for components without a
    /// renderer type.
    pub fn renderer(&self) -> MemoryRenderer {
        self.renderer.clone()
    }

    /// Number of `begin`/`end` brackets observed.
    pub fn passes(&self) -> (usize, usize) {
        *self.passes.borrow()
    }
}

impl RendererFactory for MemoryRendererFactory {
    fn create_renderer(
        &self,
        _host: Option<RNode>,
        renderer_type: Option<&RendererType>,
    ) -> Rc<dyn Renderer> {
        match renderer_type {
            Some(ty) => Rc::new(MemoryRenderer {
                tree: Rc::clone(&self.renderer.tree),
                component_id: Some(ty.id.clone()),
            }),
            None => Rc::new(self.renderer.clone()),
        }
    }

    fn begin(&self) {
        self.passes.borrow_mut().0 += 1;
    }

    fn end(&self) {
        self.passes.borrow_mut().1 += 1;
    }
}
