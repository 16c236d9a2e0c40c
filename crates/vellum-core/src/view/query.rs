//! Content and view queries.

use super::data::{ElementData, NodeData, ViewData};
use super::def::{NodeDef, NodeFlags, QueryBindingKind, QueryValueType};
use super::refs::{ElementRef, TemplateRef, ViewContainerRef};
use crate::directive::QueryResult;
use crate::error::{ViewError, ViewResult};
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

type ChangeListener = Rc<dyn Fn(&QueryList)>;

struct QueryListInner {
    values: RefCell<Vec<Value>>,
    dirty: Cell<bool>,
    listeners: RefCell<Vec<(u64, ChangeListener)>>,
    next_id: Cell<u64>,
}

/// Live result of a query.
///
/// Starts dirty and is recomputed during the next check of its view after any
/// change to the views it covers.
#[derive(Clone)]
pub struct QueryList {
    inner: Rc<QueryListInner>,
}

impl Default for QueryList {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryList {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(QueryListInner {
                values: RefCell::new(Vec::new()),
                dirty: Cell::new(true),
                listeners: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.values.borrow().get(index).cloned()
    }

    pub fn first(&self) -> Option<Value> {
        self.get(0)
    }

    pub fn last(&self) -> Option<Value> {
        self.inner.values.borrow().last().cloned()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.values.borrow().clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    pub fn ptr_eq(&self, other: &QueryList) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Registers `listener` to run after each recomputation. Returns a closure
    /// that removes it.
    pub fn subscribe(&self, listener: impl Fn(&QueryList) + 'static) -> Box<dyn FnOnce()> {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));
        let inner = Rc::downgrade(&self.inner);
        Box::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.listeners.borrow_mut().retain(|(lid, _)| *lid != id);
            }
        })
    }

    pub(crate) fn reset(&self, values: Vec<Value>) {
        *self.inner.values.borrow_mut() = values;
        self.inner.dirty.set(false);
    }

    pub(crate) fn set_dirty(&self) {
        self.inner.dirty.set(true);
    }

    pub(crate) fn notify_on_changes(&self) {
        let listeners: Vec<ChangeListener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener(self);
        }
    }

    pub(crate) fn destroy(&self) {
        self.inner.listeners.borrow_mut().clear();
    }
}

impl fmt::Debug for QueryList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryList")
            .field("len", &self.len())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

/// Recomputes the query at `index` if it is dirty and pushes the result into
/// the owning directive (content queries) or component (view queries).
pub(crate) fn check_and_update_query(view: &ViewData, index: usize) -> ViewResult<()> {
    let Some(list) = view.query_list(index) else {
        return Ok(());
    };
    if !list.is_dirty() {
        return Ok(());
    }
    let node = view.node_def(index);
    let query = node
        .query()
        .ok_or_else(|| ViewError::illegal_state(format!("node {index} is not a query")))?;
    let mut values = Vec::new();
    let target = if node.flags.contains(NodeFlags::TYPE_CONTENT_QUERY) {
        let directive_index = node.parent.ok_or_else(|| {
            ViewError::illegal_state(format!("content query {index} has no directive"))
        })?;
        let element_index = view.node_def(directive_index).parent.ok_or_else(|| {
            ViewError::illegal_state(format!("content query {index} has no host element"))
        })?;
        let element = view.node_def(element_index);
        calc_query_values(
            view,
            element_index,
            element_index + element.child_count,
            query.id,
            &mut values,
        )?;
        view.directive(directive_index)
    } else {
        let last = view.def.nodes.len().saturating_sub(1);
        calc_query_values(view, 0, last, query.id, &mut values)?;
        view.component()
    };
    list.reset(values);

    let mut notify = false;
    if let Some(target) = target {
        let mut hooks = target.hooks()?;
        for binding in &query.bindings {
            let result = match binding.kind {
                QueryBindingKind::First => QueryResult::First(list.first().unwrap_or_default()),
                QueryBindingKind::All => {
                    notify = true;
                    QueryResult::All(list.clone())
                }
            };
            hooks.set_query(&binding.prop_name, result);
        }
    }
    if notify {
        list.notify_on_changes();
    }
    Ok(())
}

/// Collects matches for `query_id` among nodes `start..=end` of `view`, in
/// document order, descending into embedded views declared at matching
/// anchors and into views projected out of them.
fn calc_query_values(
    view: &ViewData,
    start: usize,
    end: usize,
    query_id: u32,
    values: &mut Vec<Value>,
) -> ViewResult<()> {
    let nodes = &view.def.nodes;
    let mut i = start;
    while i <= end && i < nodes.len() {
        let node = &nodes[i];
        if let Some(value_type) = node.matched_query_value(query_id) {
            values.push(get_query_value(view, node, value_type));
        }
        let template_matches = node
            .as_element()
            .and_then(|el| el.template.as_ref())
            .map(|t| t.node_matched_queries.contains(query_id))
            .unwrap_or(false);
        if template_matches {
            let element = view.element(i)?;
            if node.flags.contains(NodeFlags::EMBEDDED_VIEWS) {
                for embedded in view.embedded_views(i) {
                    if declared_at(&embedded, view, i) {
                        collect_view(&embedded, query_id, values)?;
                    }
                }
            }
            if let Some(template) = &element.template {
                let projected = template.projected_views.borrow().clone();
                for projected_view in projected {
                    collect_view(&projected_view, query_id, values)?;
                }
            }
        }
        if !node.child_matched_queries.contains(query_id) {
            i += node.child_count;
        }
        i += 1;
    }
    Ok(())
}

fn collect_view(view: &ViewData, query_id: u32, values: &mut Vec<Value>) -> ViewResult<()> {
    let last = view.def.nodes.len().saturating_sub(1);
    calc_query_values(view, 0, last, query_id, values)
}

fn declared_at(embedded: &ViewData, view: &ViewData, anchor: usize) -> bool {
    embedded.parent_node == Some(anchor)
        && embedded
            .parent_view()
            .map(|parent| parent == *view)
            .unwrap_or(false)
}

pub(crate) fn get_query_value(view: &ViewData, node: &NodeDef, value_type: QueryValueType) -> Value {
    let index = node.node_index;
    match value_type {
        QueryValueType::ElementRef => match view.node(index) {
            NodeData::Element(ElementData { render_element, .. }) => {
                Value::from_rc(Rc::new(ElementRef::new(render_element)))
            }
            _ => Value::Null,
        },
        QueryValueType::RenderElement => view
            .render_node(index)
            .map(|rnode| Value::from_rc(Rc::new(rnode)))
            .unwrap_or_default(),
        QueryValueType::TemplateRef => Value::from_rc(Rc::new(TemplateRef::new(view, index))),
        QueryValueType::ViewContainerRef => {
            Value::from_rc(Rc::new(ViewContainerRef::new(view, index)))
        }
        QueryValueType::Provider => view
            .provider(index)
            .map(|instance| instance.value())
            .unwrap_or_default(),
    }
}
