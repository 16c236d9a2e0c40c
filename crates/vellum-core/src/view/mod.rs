//! View definitions, view instances and change detection.
//!
//! A [`ViewDefinition`] is the immutable, compiler-produced description of a
//! template. Instantiating it yields a view whose nodes hold render nodes,
//! directive instances and last binding values. Views form a tree: component
//! views hang off their host element, embedded views are created from
//! template anchors and inserted into view containers.

mod check;
mod container;
mod create;
pub(crate) mod data;
pub(crate) mod def;
mod destroy;
mod event;
mod query;
mod refs;
mod render_nodes;

pub use check::{CheckType, NodeCheck};
pub use data::{Environment, InitState, RootContext, RootSelector, ViewKind, ViewState};
pub use def::{
    resolve_definition, view_def, BindingDef, BindingKind, DirectiveFactory, ElementDef,
    HandleEventFn, NodeDef, NodeFlags, NodeKind, OutputDef, PipeFactory, ProviderDef,
    ProviderFactory, ProviderSource, PureKind, QueryBindingDef, QueryBindingKind, QueryDef,
    QueryIds, QueryValueType, UpdateFn, ViewDefBuilder, ViewDefinition, ViewDefinitionFactory,
    ViewFlags,
};
pub use event::EventContext;
pub use query::QueryList;
pub use refs::{ChangeDetectorRef, ElementRef, TemplateRef, ViewContainerRef, ViewRef};

pub(crate) use create::instantiate_provider;

use crate::error::ViewResult;
use crate::value::Value;
use std::rc::Rc;

/// Instantiates `def` as a root view of `root`.
///
/// When the root context carries a selector or node, the view's elements
/// render into it instead of creating new ones.
pub fn create_root_view(
    root: Rc<RootContext>,
    def: Rc<ViewDefinition>,
    context: Value,
) -> ViewResult<ViewRef> {
    create::create_root_view(root, def, context).map(ViewRef::new)
}
