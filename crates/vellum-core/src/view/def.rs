//! Immutable view definitions and the builders the template compiler emits.

use super::check::NodeCheck;
use super::event::EventContext;
use crate::collections::map::HashMap;
use crate::di::BloomFilter;
use crate::directive::{Directive, DirectiveInstance, Pipe, PipeInstance};
use crate::error::{InjectError, ViewError, ViewResult};
use crate::render::{RendererType, SecurityContext};
use crate::token::{Dep, Token};
use crate::value::Value;
use bitflags::bitflags;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

bitflags! {
    /// Kind, capability and lifecycle bits of a node, aggregated over
    /// subtrees so traversals can skip whole branches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NodeFlags: u32 {
        const TYPE_ELEMENT = 1 << 0;
        const TYPE_TEXT = 1 << 1;
        const TYPE_PROVIDER = 1 << 2;
        const TYPE_DIRECTIVE = 1 << 3;
        const TYPE_PIPE = 1 << 4;
        const TYPE_PURE_EXPRESSION = 1 << 5;
        const TYPE_CONTENT_QUERY = 1 << 6;
        const TYPE_VIEW_QUERY = 1 << 7;
        const TYPE_NG_CONTENT = 1 << 8;
        const EMBEDDED_VIEWS = 1 << 9;
        const COMPONENT_VIEW = 1 << 10;
        const COMPONENT = 1 << 11;
        const ON_INIT = 1 << 12;
        const ON_DESTROY = 1 << 13;
        const DO_CHECK = 1 << 14;
        const ON_CHANGES = 1 << 15;
        const AFTER_CONTENT_INIT = 1 << 16;
        const AFTER_CONTENT_CHECKED = 1 << 17;
        const AFTER_VIEW_INIT = 1 << 18;
        const AFTER_VIEW_CHECKED = 1 << 19;
        const LAZY_PROVIDER = 1 << 20;
        const PRIVATE_PROVIDER = 1 << 21;
        const STATIC_QUERY = 1 << 22;
        const DYNAMIC_QUERY = 1 << 23;

        const CAT_RENDER_NODE = Self::TYPE_ELEMENT.bits() | Self::TYPE_TEXT.bits();
        const CAT_PROVIDER = Self::TYPE_PROVIDER.bits() | Self::TYPE_DIRECTIVE.bits();
        const CAT_QUERY = Self::TYPE_CONTENT_QUERY.bits() | Self::TYPE_VIEW_QUERY.bits();
        const LIFECYCLE_HOOKS = Self::ON_INIT.bits()
            | Self::ON_DESTROY.bits()
            | Self::DO_CHECK.bits()
            | Self::ON_CHANGES.bits()
            | Self::AFTER_CONTENT_INIT.bits()
            | Self::AFTER_CONTENT_CHECKED.bits()
            | Self::AFTER_VIEW_INIT.bits()
            | Self::AFTER_VIEW_CHECKED.bits();
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ViewFlags: u8 {
        /// The view is only checked after it was explicitly marked dirty.
        const ON_PUSH = 1 << 0;
    }
}

/// Set of query ids, one bit per id. Ids above [`QueryIds::MAX_ID`] are
/// rejected when the view definition is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct QueryIds(u64);

impl QueryIds {
    pub const EMPTY: QueryIds = QueryIds(0);
    pub const MAX_ID: u32 = u64::BITS - 1;

    fn bit(id: u32) -> u64 {
        1u64.checked_shl(id).unwrap_or(0)
    }

    pub fn single(id: u32) -> QueryIds {
        QueryIds(Self::bit(id))
    }

    pub fn insert(&mut self, id: u32) {
        self.0 |= Self::bit(id);
    }

    pub fn contains(self, id: u32) -> bool {
        self.0 & Self::bit(id) != 0
    }

    pub fn union(self, other: QueryIds) -> QueryIds {
        QueryIds(self.0 | other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// What a query match yields for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryValueType {
    ElementRef,
    RenderElement,
    TemplateRef,
    ViewContainerRef,
    Provider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryBindingKind {
    /// The first match, or null.
    First,
    /// The live query list.
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBindingDef {
    pub prop_name: String,
    pub kind: QueryBindingKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDef {
    pub id: u32,
    pub bindings: Vec<QueryBindingDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Attribute,
    Class,
    Style,
    Property,
    /// Directive input.
    Input,
    /// Text interpolation part.
    Interpolation,
    /// Pure expression argument.
    Argument,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BindingDef {
    pub kind: BindingKind,
    pub ns: Option<String>,
    pub name: String,
    pub non_minified_name: String,
    pub security_context: SecurityContext,
    /// Text suffix for interpolations, unit for styles.
    pub suffix: Option<String>,
}

impl BindingDef {
    fn new(kind: BindingKind, name: &str) -> Self {
        Self {
            kind,
            ns: None,
            name: name.to_string(),
            non_minified_name: name.to_string(),
            security_context: SecurityContext::None,
            suffix: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDef {
    /// Global listen target such as `window`, `None` for the element itself.
    pub target: Option<String>,
    pub event_name: String,
    /// Directive property holding the emitter, `None` for element events.
    pub prop_name: Option<String>,
}

impl OutputDef {
    /// Name passed to the view's event handler.
    pub fn full_event_name(&self) -> String {
        match &self.target {
            Some(target) => format!("{target}:{}", self.event_name),
            None => self.event_name.clone(),
        }
    }
}

/// Produces a view definition. Definitions are memoized per factory through
/// [`resolve_definition`].
pub type ViewDefinitionFactory = fn() -> ViewResult<ViewDefinition>;

pub type UpdateFn = Rc<dyn Fn(&mut NodeCheck<'_>) -> ViewResult<()>>;
pub type HandleEventFn = Rc<dyn Fn(&EventContext<'_>, usize, &str, &Value) -> ViewResult<bool>>;
pub type DirectiveFactory = Rc<dyn Fn(&[Value]) -> ViewResult<DirectiveInstance>>;
pub type PipeFactory = Rc<dyn Fn(&[Value]) -> ViewResult<PipeInstance>>;
pub type ProviderFactory = Rc<dyn Fn(&[Value]) -> Result<Value, InjectError>>;

#[derive(Clone)]
pub struct ElementDef {
    /// `None` for comment anchors and `ng-container`s.
    pub name: Option<String>,
    pub ns: Option<String>,
    pub attrs: Vec<(String, String)>,
    pub template: Option<Rc<ViewDefinition>>,
    template_factory: Option<ViewDefinitionFactory>,
    pub component_view: Option<ViewDefinitionFactory>,
    pub component_renderer_type: Option<Rc<RendererType>>,
    pub component_provider: Option<usize>,
    /// Provider and directive nodes declared on this element.
    pub providers: Vec<usize>,
    pub own_bloom: BloomFilter,
}

#[derive(Clone)]
pub enum ProviderSource {
    Value(Value),
    Factory(ProviderFactory),
    Existing(Token),
    Directive(DirectiveFactory),
    Pipe(PipeFactory),
}

#[derive(Clone)]
pub struct ProviderDef {
    pub token: Token,
    pub source: ProviderSource,
    pub deps: Vec<Dep>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PureKind {
    Array,
    Object(Vec<String>),
    Pipe { pipe_node: usize },
}

#[derive(Clone)]
pub enum NodeKind {
    Element(ElementDef),
    Text { prefix: String },
    Provider(ProviderDef),
    PureExpression(PureKind),
    Query(QueryDef),
    NgContent { index: usize },
}

/// One node of a view definition.
#[derive(Clone)]
pub struct NodeDef {
    pub node_index: usize,
    pub parent: Option<usize>,
    pub render_parent: Option<usize>,
    pub flags: NodeFlags,
    pub child_flags: NodeFlags,
    pub direct_child_flags: NodeFlags,
    pub child_count: usize,
    pub binding_index: usize,
    pub bindings: Vec<BindingDef>,
    pub output_index: usize,
    pub outputs: Vec<OutputDef>,
    pub matched_queries: SmallVec<[(u32, QueryValueType); 2]>,
    pub matched_query_ids: QueryIds,
    pub child_matched_queries: QueryIds,
    /// Slot of the parent component's `ng-content` this node is projected
    /// into.
    pub ng_content_index: Option<usize>,
    pub kind: NodeKind,
}

impl NodeDef {
    fn new(flags: NodeFlags, child_count: usize, kind: NodeKind) -> Self {
        Self {
            node_index: 0,
            parent: None,
            render_parent: None,
            flags,
            child_flags: NodeFlags::empty(),
            direct_child_flags: NodeFlags::empty(),
            child_count,
            binding_index: 0,
            bindings: Vec::new(),
            output_index: 0,
            outputs: Vec::new(),
            matched_queries: SmallVec::new(),
            matched_query_ids: QueryIds::EMPTY,
            child_matched_queries: QueryIds::EMPTY,
            ng_content_index: None,
            kind,
        }
    }

    fn element_def(name: Option<&str>) -> ElementDef {
        ElementDef {
            name: name.map(str::to_string),
            ns: None,
            attrs: Vec::new(),
            template: None,
            template_factory: None,
            component_view: None,
            component_renderer_type: None,
            component_provider: None,
            providers: Vec::new(),
            own_bloom: BloomFilter::EMPTY,
        }
    }

    pub fn element(name: &str, child_count: usize) -> Self {
        Self::new(
            NodeFlags::TYPE_ELEMENT,
            child_count,
            NodeKind::Element(Self::element_def(Some(name))),
        )
    }

    /// Grouping element that renders as a comment and lets its children
    /// attach to its own render parent.
    pub fn ng_container(child_count: usize) -> Self {
        Self::new(
            NodeFlags::TYPE_ELEMENT,
            child_count,
            NodeKind::Element(Self::element_def(None)),
        )
    }

    /// Comment anchor, usually carrying an embedded template.
    pub fn anchor(child_count: usize) -> Self {
        Self::ng_container(child_count)
    }

    /// Text node: `parts[0]` is the static prefix and every further part is
    /// the suffix following one interpolated binding.
    pub fn text(parts: &[&str]) -> Self {
        let prefix = parts.first().copied().unwrap_or_default();
        let mut node = Self::new(
            NodeFlags::TYPE_TEXT,
            0,
            NodeKind::Text {
                prefix: prefix.to_string(),
            },
        );
        for (i, suffix) in parts.iter().skip(1).enumerate() {
            let mut binding = BindingDef::new(BindingKind::Interpolation, &format!("text{i}"));
            binding.suffix = Some(suffix.to_string());
            node.bindings.push(binding);
        }
        node
    }

    pub fn directive(
        token: Token,
        deps: Vec<Dep>,
        factory: impl Fn(&[Value]) -> ViewResult<DirectiveInstance> + 'static,
    ) -> Self {
        Self::new(
            NodeFlags::TYPE_DIRECTIVE,
            0,
            NodeKind::Provider(ProviderDef {
                token,
                source: ProviderSource::Directive(Rc::new(factory)),
                deps,
            }),
        )
    }

    /// Directive whose token is its type.
    pub fn directive_of<T: Directive>(
        deps: Vec<Dep>,
        construct: impl Fn(&[Value]) -> ViewResult<T> + 'static,
    ) -> Self {
        Self::directive(Token::of::<T>(), deps, move |args| {
            construct(args).map(DirectiveInstance::new)
        })
    }

    pub fn value_provider(token: Token, value: impl Into<Value>) -> Self {
        Self::provider_node(token, ProviderSource::Value(value.into()), Vec::new())
    }

    pub fn factory_provider(
        token: Token,
        deps: Vec<Dep>,
        factory: impl Fn(&[Value]) -> Result<Value, InjectError> + 'static,
    ) -> Self {
        Self::provider_node(token, ProviderSource::Factory(Rc::new(factory)), deps)
    }

    pub fn existing_provider(token: Token, existing: Token) -> Self {
        Self::provider_node(token, ProviderSource::Existing(existing), Vec::new())
    }

    fn provider_node(token: Token, source: ProviderSource, deps: Vec<Dep>) -> Self {
        Self::new(
            NodeFlags::TYPE_PROVIDER,
            0,
            NodeKind::Provider(ProviderDef {
                token,
                source,
                deps,
            }),
        )
    }

    pub fn pipe(
        token: Token,
        deps: Vec<Dep>,
        factory: impl Fn(&[Value]) -> ViewResult<PipeInstance> + 'static,
    ) -> Self {
        Self::new(
            NodeFlags::TYPE_PIPE,
            0,
            NodeKind::Provider(ProviderDef {
                token,
                source: ProviderSource::Pipe(Rc::new(factory)),
                deps,
            }),
        )
    }

    pub fn pipe_of<T: Pipe>(
        deps: Vec<Dep>,
        construct: impl Fn(&[Value]) -> ViewResult<T> + 'static,
    ) -> Self {
        Self::pipe(Token::of::<T>(), deps, move |args| {
            construct(args).map(PipeInstance::new)
        })
    }

    pub fn pure_array(arg_count: usize) -> Self {
        let mut node = Self::new(
            NodeFlags::TYPE_PURE_EXPRESSION,
            0,
            NodeKind::PureExpression(PureKind::Array),
        );
        for i in 0..arg_count {
            node.bindings
                .push(BindingDef::new(BindingKind::Argument, &format!("[{i}]")));
        }
        node
    }

    pub fn pure_object(keys: &[&str]) -> Self {
        let mut node = Self::new(
            NodeFlags::TYPE_PURE_EXPRESSION,
            0,
            NodeKind::PureExpression(PureKind::Object(
                keys.iter().map(|k| k.to_string()).collect(),
            )),
        );
        for key in keys {
            node.bindings.push(BindingDef::new(BindingKind::Argument, key));
        }
        node
    }

    /// Pure pipe application; recomputed only when an argument changes.
    pub fn pure_pipe(pipe_node: usize, arg_count: usize) -> Self {
        let mut node = Self::new(
            NodeFlags::TYPE_PURE_EXPRESSION,
            0,
            NodeKind::PureExpression(PureKind::Pipe { pipe_node }),
        );
        for i in 0..arg_count {
            node.bindings
                .push(BindingDef::new(BindingKind::Argument, &format!("arg{i}")));
        }
        node
    }

    pub fn content_query(id: u32, bindings: &[(&str, QueryBindingKind)]) -> Self {
        Self::query_node(NodeFlags::TYPE_CONTENT_QUERY, id, bindings)
    }

    pub fn view_query(id: u32, bindings: &[(&str, QueryBindingKind)]) -> Self {
        Self::query_node(NodeFlags::TYPE_VIEW_QUERY, id, bindings)
    }

    fn query_node(flags: NodeFlags, id: u32, bindings: &[(&str, QueryBindingKind)]) -> Self {
        Self::new(
            flags | NodeFlags::DYNAMIC_QUERY,
            0,
            NodeKind::Query(QueryDef {
                id,
                bindings: bindings
                    .iter()
                    .map(|(prop, kind)| QueryBindingDef {
                        prop_name: prop.to_string(),
                        kind: *kind,
                    })
                    .collect(),
            }),
        )
    }

    pub fn ng_content(index: usize) -> Self {
        Self::new(NodeFlags::TYPE_NG_CONTENT, 0, NodeKind::NgContent { index })
    }

    pub fn with_ns(mut self, ns: &str) -> Self {
        if let NodeKind::Element(el) = &mut self.kind {
            el.ns = Some(ns.to_string());
        }
        self
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        if let NodeKind::Element(el) = &mut self.kind {
            el.attrs.push((name.to_string(), value.to_string()));
        }
        self
    }

    pub fn with_template(mut self, factory: ViewDefinitionFactory) -> Self {
        if let NodeKind::Element(el) = &mut self.kind {
            el.template_factory = Some(factory);
            self.flags |= NodeFlags::EMBEDDED_VIEWS;
        }
        self
    }

    /// Gives the element a view container without a template.
    pub fn with_view_container(mut self) -> Self {
        self.flags |= NodeFlags::EMBEDDED_VIEWS;
        self
    }

    /// Hosts a component whose view comes from `view`. The component
    /// directive must be one of the element's children.
    pub fn with_component(
        mut self,
        view: ViewDefinitionFactory,
        renderer_type: Option<RendererType>,
    ) -> Self {
        if let NodeKind::Element(el) = &mut self.kind {
            el.component_view = Some(view);
            el.component_renderer_type = renderer_type.map(Rc::new);
            self.flags |= NodeFlags::COMPONENT_VIEW;
        }
        self
    }

    fn with_binding(mut self, binding: BindingDef) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn with_property(self, name: &str) -> Self {
        self.with_binding(BindingDef::new(BindingKind::Property, name))
    }

    pub fn with_sanitized_property(self, name: &str, context: SecurityContext) -> Self {
        let mut binding = BindingDef::new(BindingKind::Property, name);
        binding.security_context = context;
        self.with_binding(binding)
    }

    pub fn with_attribute(self, name: &str) -> Self {
        self.with_binding(BindingDef::new(BindingKind::Attribute, name))
    }

    pub fn with_sanitized_attribute(self, name: &str, context: SecurityContext) -> Self {
        let mut binding = BindingDef::new(BindingKind::Attribute, name);
        binding.security_context = context;
        self.with_binding(binding)
    }

    pub fn with_class(self, name: &str) -> Self {
        self.with_binding(BindingDef::new(BindingKind::Class, name))
    }

    pub fn with_style(self, name: &str, unit: Option<&str>) -> Self {
        let mut binding = BindingDef::new(BindingKind::Style, name);
        binding.suffix = unit.map(str::to_string);
        self.with_binding(binding)
    }

    /// Directive input bound to property `name`.
    pub fn with_input(self, name: &str) -> Self {
        self.with_binding(BindingDef::new(BindingKind::Input, name))
    }

    /// Directive input whose public name differs from the property name.
    pub fn with_aliased_input(self, prop: &str, public_name: &str) -> Self {
        let mut binding = BindingDef::new(BindingKind::Input, prop);
        binding.non_minified_name = public_name.to_string();
        self.with_binding(binding)
    }

    /// Element event listener.
    pub fn on(mut self, event: &str) -> Self {
        self.outputs.push(OutputDef {
            target: None,
            event_name: event.to_string(),
            prop_name: None,
        });
        self
    }

    /// Listener on a global target such as `window` or `document`.
    pub fn on_global(mut self, target: &str, event: &str) -> Self {
        self.outputs.push(OutputDef {
            target: Some(target.to_string()),
            event_name: event.to_string(),
            prop_name: None,
        });
        self
    }

    /// Directive output: subscribes to the emitter at `prop` and forwards
    /// its values to the view's event handler as `event`.
    pub fn with_output(mut self, prop: &str, event: &str) -> Self {
        self.outputs.push(OutputDef {
            target: None,
            event_name: event.to_string(),
            prop_name: Some(prop.to_string()),
        });
        self
    }

    pub fn with_hooks(mut self, hooks: NodeFlags) -> Self {
        self.flags |= hooks & NodeFlags::LIFECYCLE_HOOKS;
        self
    }

    /// Marks a directive as the component of its host element.
    pub fn component(mut self) -> Self {
        self.flags |= NodeFlags::COMPONENT;
        self
    }

    /// Number of query nodes following a directive that belong to it.
    pub fn with_child_count(mut self, child_count: usize) -> Self {
        self.child_count = child_count;
        self
    }

    pub fn lazy(mut self) -> Self {
        self.flags |= NodeFlags::LAZY_PROVIDER;
        self
    }

    /// Only visible from inside the host component's own view.
    pub fn private(mut self) -> Self {
        self.flags |= NodeFlags::PRIVATE_PROVIDER;
        self
    }

    pub fn static_query(mut self) -> Self {
        self.flags.remove(NodeFlags::DYNAMIC_QUERY);
        self.flags |= NodeFlags::STATIC_QUERY;
        self
    }

    pub fn matching(mut self, query_id: u32, value_type: QueryValueType) -> Self {
        self.matched_queries.push((query_id, value_type));
        self.matched_query_ids.insert(query_id);
        self
    }

    pub fn projected_into(mut self, ng_content_index: usize) -> Self {
        self.ng_content_index = Some(ng_content_index);
        self
    }

    pub fn as_element(&self) -> Option<&ElementDef> {
        match &self.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn provider(&self) -> Option<&ProviderDef> {
        match &self.kind {
            NodeKind::Provider(provider) => Some(provider),
            _ => None,
        }
    }

    pub fn query(&self) -> Option<&QueryDef> {
        match &self.kind {
            NodeKind::Query(query) => Some(query),
            _ => None,
        }
    }

    /// Elements without a tag name do not become render parents.
    pub fn is_ng_container(&self) -> bool {
        matches!(&self.kind, NodeKind::Element(el) if el.name.is_none())
    }

    pub fn matched_query_value(&self, query_id: u32) -> Option<QueryValueType> {
        self.matched_queries
            .iter()
            .find(|(id, _)| *id == query_id)
            .map(|(_, value_type)| *value_type)
    }
}

impl fmt::Debug for NodeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            NodeKind::Element(el) => format!("Element({:?})", el.name),
            NodeKind::Text { prefix } => format!("Text({prefix:?})"),
            NodeKind::Provider(p) => format!("Provider({})", p.token),
            NodeKind::PureExpression(kind) => format!("Pure({kind:?})"),
            NodeKind::Query(q) => format!("Query({})", q.id),
            NodeKind::NgContent { index } => format!("NgContent({index})"),
        };
        f.debug_struct("NodeDef")
            .field("index", &self.node_index)
            .field("kind", &kind)
            .field("parent", &self.parent)
            .field("child_count", &self.child_count)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Immutable description of one template, shared by all of its instances.
pub struct ViewDefinition {
    pub flags: ViewFlags,
    pub nodes: Vec<NodeDef>,
    pub node_flags: NodeFlags,
    pub root_node_flags: NodeFlags,
    /// Every query id matched anywhere in this view, including nested
    /// templates.
    pub node_matched_queries: QueryIds,
    pub binding_count: usize,
    pub output_count: usize,
    pub last_render_root_node: Option<usize>,
    pub(crate) update_directives: Option<UpdateFn>,
    pub(crate) update_renderer: Option<UpdateFn>,
    pub(crate) handle_event: Option<HandleEventFn>,
}

impl ViewDefinition {
    pub fn builder(nodes: Vec<NodeDef>) -> ViewDefBuilder {
        ViewDefBuilder {
            flags: ViewFlags::empty(),
            nodes,
            update_directives: None,
            update_renderer: None,
            handle_event: None,
        }
    }

    pub fn is_on_push(&self) -> bool {
        self.flags.contains(ViewFlags::ON_PUSH)
    }
}

impl fmt::Debug for ViewDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewDefinition")
            .field("flags", &self.flags)
            .field("nodes", &self.nodes)
            .field("binding_count", &self.binding_count)
            .field("output_count", &self.output_count)
            .field("last_render_root_node", &self.last_render_root_node)
            .finish()
    }
}

/// Fluent front-end for [`view_def`].
pub struct ViewDefBuilder {
    flags: ViewFlags,
    nodes: Vec<NodeDef>,
    update_directives: Option<UpdateFn>,
    update_renderer: Option<UpdateFn>,
    handle_event: Option<HandleEventFn>,
}

impl ViewDefBuilder {
    pub fn on_push(mut self) -> Self {
        self.flags |= ViewFlags::ON_PUSH;
        self
    }

    pub fn update_directives(
        mut self,
        f: impl Fn(&mut NodeCheck<'_>) -> ViewResult<()> + 'static,
    ) -> Self {
        self.update_directives = Some(Rc::new(f));
        self
    }

    pub fn update_renderer(
        mut self,
        f: impl Fn(&mut NodeCheck<'_>) -> ViewResult<()> + 'static,
    ) -> Self {
        self.update_renderer = Some(Rc::new(f));
        self
    }

    pub fn handle_event(
        mut self,
        f: impl Fn(&EventContext<'_>, usize, &str, &Value) -> ViewResult<bool> + 'static,
    ) -> Self {
        self.handle_event = Some(Rc::new(f));
        self
    }

    pub fn build(self) -> ViewResult<ViewDefinition> {
        view_def(
            self.flags,
            self.nodes,
            self.update_directives,
            self.update_renderer,
            self.handle_event,
        )
    }
}

/// Builds a view definition from a flat pre-order node list.
///
/// Assigns indices, parents, render parents, binding and output offsets,
/// aggregates child flags and matched queries bottom-up and validates the
/// structure, failing with [`ViewError::IllegalState`].
pub fn view_def(
    flags: ViewFlags,
    mut nodes: Vec<NodeDef>,
    update_directives: Option<UpdateFn>,
    update_renderer: Option<UpdateFn>,
    handle_event: Option<HandleEventFn>,
) -> ViewResult<ViewDefinition> {
    link_parents(&mut nodes)?;
    resolve_templates(&mut nodes)?;
    register_providers(&mut nodes)?;

    let node_count = nodes.len();
    let mut binding_count = 0;
    let mut output_count = 0;
    let mut node_flags = NodeFlags::empty();
    let mut root_node_flags = NodeFlags::empty();
    let mut node_matched_queries = QueryIds::EMPTY;
    let mut last_render_root_node = None;
    let mut current_parent: Option<usize> = None;
    let mut current_render_parent: Option<usize> = None;

    for i in 0..node_count {
        {
            let node = &mut nodes[i];
            node.node_index = i;
            node.render_parent = current_render_parent;
            node.binding_index = binding_count;
            node.output_index = output_count;
            node_flags |= node.flags;
            node_matched_queries = node_matched_queries.union(node.matched_query_ids);
            if let Some(template) = node.as_element().and_then(|el| el.template.as_ref()) {
                node_matched_queries = node_matched_queries.union(template.node_matched_queries);
            }
            binding_count += node.bindings.len();
            output_count += node.outputs.len();
        }
        validate_node(&nodes, current_parent, i)?;
        if current_render_parent.is_none() && nodes[i].flags.intersects(NodeFlags::CAT_RENDER_NODE) {
            last_render_root_node = Some(i);
        }

        match current_parent {
            Some(parent) => {
                let (node_flags_i, matched, template_matched) = {
                    let node = &nodes[i];
                    (
                        node.flags,
                        node.matched_query_ids,
                        node.as_element()
                            .and_then(|el| el.template.as_ref())
                            .map(|t| t.node_matched_queries),
                    )
                };
                let parent = &mut nodes[parent];
                parent.child_flags |= node_flags_i;
                parent.direct_child_flags |= node_flags_i;
                parent.child_matched_queries = parent.child_matched_queries.union(matched);
                if let Some(template_matched) = template_matched {
                    parent.child_matched_queries =
                        parent.child_matched_queries.union(template_matched);
                }
            }
            None => root_node_flags |= nodes[i].flags,
        }

        if let Some(template_matched) = nodes[i]
            .as_element()
            .and_then(|el| el.template.as_ref())
            .map(|t| t.node_matched_queries)
        {
            nodes[i].child_matched_queries = nodes[i].child_matched_queries.union(template_matched);
        }

        if nodes[i].child_count > 0 {
            current_parent = Some(i);
            if nodes[i].flags.contains(NodeFlags::TYPE_ELEMENT) && !nodes[i].is_ng_container() {
                current_render_parent = Some(i);
            }
        } else {
            while let Some(parent) = current_parent {
                if i != parent + nodes[parent].child_count {
                    break;
                }
                let new_parent = nodes[parent].parent;
                if let Some(new_parent) = new_parent {
                    let (child_flags, child_queries) =
                        (nodes[parent].child_flags, nodes[parent].child_matched_queries);
                    let np = &mut nodes[new_parent];
                    np.child_flags |= child_flags;
                    np.child_matched_queries = np.child_matched_queries.union(child_queries);
                }
                current_parent = new_parent;
                current_render_parent = match current_parent {
                    Some(p) if nodes[p].is_ng_container() => nodes[p].render_parent,
                    other => other,
                };
            }
        }
    }

    Ok(ViewDefinition {
        flags,
        nodes,
        node_flags,
        root_node_flags,
        node_matched_queries,
        binding_count,
        output_count,
        last_render_root_node,
        update_directives,
        update_renderer,
        handle_event,
    })
}

/// Assigns `parent` from the child counts.
fn link_parents(nodes: &mut [NodeDef]) -> ViewResult<()> {
    let mut stack: Vec<usize> = Vec::new();
    for i in 0..nodes.len() {
        while let Some(&open) = stack.last() {
            if i > open + nodes[open].child_count {
                stack.pop();
            } else {
                break;
            }
        }
        nodes[i].node_index = i;
        nodes[i].parent = stack.last().copied();
        if nodes[i].child_count > 0 {
            stack.push(i);
        }
    }
    Ok(())
}

fn resolve_templates(nodes: &mut [NodeDef]) -> ViewResult<()> {
    for node in nodes.iter_mut() {
        if let NodeKind::Element(el) = &mut node.kind {
            if let Some(factory) = el.template_factory {
                el.template = Some(resolve_definition(factory)?);
            }
        }
    }
    Ok(())
}

/// Links every provider and directive to its element, sets the element's own
/// bloom bits and derives capability flags from declared dependencies.
fn register_providers(nodes: &mut [NodeDef]) -> ViewResult<()> {
    for i in 0..nodes.len() {
        if !nodes[i].flags.intersects(NodeFlags::CAT_PROVIDER) {
            continue;
        }
        let Some(parent) = nodes[i].parent else {
            continue;
        };
        let (token, needs_container, is_component) = {
            let node = &nodes[i];
            let Some(provider) = node.provider() else {
                continue;
            };
            (
                provider.token,
                provider
                    .deps
                    .iter()
                    .any(|dep| dep.token == Token::VIEW_CONTAINER_REF),
                node.flags.contains(NodeFlags::COMPONENT),
            )
        };
        let parent_node = &mut nodes[parent];
        if needs_container {
            parent_node.flags |= NodeFlags::EMBEDDED_VIEWS;
        }
        let has_component_view = parent_node.flags.contains(NodeFlags::COMPONENT_VIEW);
        if let NodeKind::Element(el) = &mut parent_node.kind {
            el.providers.push(i);
            el.own_bloom.insert(token.assign_bloom_bit());
            if is_component {
                if !has_component_view {
                    return Err(ViewError::illegal_state(format!(
                        "Component directive at index {i} is declared on an element without a component view!"
                    )));
                }
                if el.component_provider.is_some() {
                    return Err(ViewError::illegal_state(format!(
                        "Multiple components match node at index {parent}!"
                    )));
                }
                el.component_provider = Some(i);
            }
        }
    }
    for (i, node) in nodes.iter().enumerate() {
        if let NodeKind::Element(el) = &node.kind {
            if node.flags.contains(NodeFlags::COMPONENT_VIEW) && el.component_provider.is_none() {
                return Err(ViewError::illegal_state(format!(
                    "Element at index {i} hosts a component view but declares no component directive!"
                )));
            }
        }
    }
    Ok(())
}

fn validate_node(nodes: &[NodeDef], parent: Option<usize>, index: usize) -> ViewResult<()> {
    let node = &nodes[index];
    let query_ids = node.query().map(|q| q.id).into_iter();
    let matched_ids = node.matched_queries.iter().map(|(id, _)| *id);
    if let Some(id) = query_ids.chain(matched_ids).find(|id| *id > QueryIds::MAX_ID) {
        return Err(ViewError::illegal_state(format!(
            "Query id {id} is out of range (max {}), at index {index}!",
            QueryIds::MAX_ID
        )));
    }
    if let Some(template) = node.as_element().and_then(|el| el.template.as_ref()) {
        match template.last_render_root_node {
            None => {
                return Err(ViewError::illegal_state(
                    "Embedded templates without nodes are not allowed!",
                ))
            }
            Some(last) if template.nodes[last].flags.contains(NodeFlags::EMBEDDED_VIEWS) => {
                return Err(ViewError::illegal_state(format!(
                    "Last root node of a template can't have embedded views, at index {index}!"
                )))
            }
            Some(_) => {}
        }
    }
    if node.flags.intersects(NodeFlags::CAT_PROVIDER) {
        let parent_is_element = parent
            .map(|p| nodes[p].flags.contains(NodeFlags::TYPE_ELEMENT))
            .unwrap_or(false);
        if !parent_is_element {
            return Err(ViewError::illegal_state(format!(
                "Provider/Directive nodes need to be children of elements or anchors, at index {index}!"
            )));
        }
    }
    if node.flags.contains(NodeFlags::TYPE_CONTENT_QUERY) {
        let parent_is_directive = parent
            .map(|p| nodes[p].flags.contains(NodeFlags::TYPE_DIRECTIVE))
            .unwrap_or(false);
        if !parent_is_directive {
            return Err(ViewError::illegal_state(format!(
                "Content Query nodes need to be children of directives, at index {index}!"
            )));
        }
    }
    if node.flags.contains(NodeFlags::TYPE_VIEW_QUERY) && parent.is_some() {
        return Err(ViewError::illegal_state(format!(
            "View Query nodes have to be top level nodes, at index {index}!"
        )));
    }
    if node.child_count > 0 {
        let parent_end = match parent {
            Some(p) => p + nodes[p].child_count,
            None => nodes.len().saturating_sub(1),
        };
        if index <= parent_end && index + node.child_count > parent_end {
            return Err(ViewError::illegal_state(format!(
                "childCount of node leads outside of parent, at index {index}!"
            )));
        }
    }
    if let NodeKind::PureExpression(PureKind::Pipe { pipe_node }) = &node.kind {
        let is_pipe = nodes
            .get(*pipe_node)
            .map(|n| n.flags.contains(NodeFlags::TYPE_PIPE))
            .unwrap_or(false);
        if !is_pipe || *pipe_node >= index {
            return Err(ViewError::illegal_state(format!(
                "Pure pipe at index {index} must reference an earlier pipe node!"
            )));
        }
    }
    Ok(())
}

thread_local! {
    static DEFINITIONS: RefCell<HashMap<usize, Rc<ViewDefinition>>> =
        RefCell::new(HashMap::default());
}

/// Returns the definition produced by `factory`, building it on first use.
/// Every later call with the same factory returns the same `Rc`.
///
/// The cache is keyed by the function's address, which is not guaranteed to
/// be unique. Functions with identical machine code may be folded into one,
/// and then build identical definitions. One function may also have several
/// addresses across codegen units and get built once per address. Callers
/// must not rely on distinct factories yielding distinct `Rc`s.
pub fn resolve_definition(factory: ViewDefinitionFactory) -> ViewResult<Rc<ViewDefinition>> {
    let key = factory as usize;
    if let Some(def) = DEFINITIONS.with(|defs| defs.borrow().get(&key).cloned()) {
        return Ok(def);
    }
    let def = Rc::new(factory()?);
    log::trace!("resolved view definition with {} nodes", def.nodes.len());
    Ok(DEFINITIONS.with(|defs| Rc::clone(defs.borrow_mut().entry(key).or_insert(def))))
}
