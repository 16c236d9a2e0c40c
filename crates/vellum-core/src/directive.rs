//! Directive, pipe and output contracts implemented by application code.

use crate::collections::map::HashMap;
use crate::error::{ViewError, ViewResult};
use crate::value::Value;
use crate::view::QueryList;
use std::any::Any;
use std::cell::{Cell, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

/// Value delivered to a directive property bound to a query.
#[derive(Clone)]
pub enum QueryResult {
    /// First match, `Value::Null` when nothing matched.
    First(Value),
    /// Live list of every match.
    All(QueryList),
}

/// Behaviour attached to an element.
///
/// Every hook defaults to a no-op. The engine only invokes the hooks whose
/// flag is set on the directive node, so a directive has to declare the hooks
/// it implements with `NodeDef::with_hooks`.
pub trait Directive: Any {
    fn set_input(&mut self, _name: &str, _value: Value) {}

    fn set_query(&mut self, _prop: &str, _value: QueryResult) {}

    /// Emitter backing the output property `prop`.
    fn output(&self, _prop: &str) -> Option<EventEmitter> {
        None
    }

    fn on_changes(&mut self, _changes: &SimpleChanges) -> ViewResult<()> {
        Ok(())
    }

    fn on_init(&mut self) -> ViewResult<()> {
        Ok(())
    }

    fn do_check(&mut self) -> ViewResult<()> {
        Ok(())
    }

    fn after_content_init(&mut self) -> ViewResult<()> {
        Ok(())
    }

    fn after_content_checked(&mut self) -> ViewResult<()> {
        Ok(())
    }

    fn after_view_init(&mut self) -> ViewResult<()> {
        Ok(())
    }

    fn after_view_checked(&mut self) -> ViewResult<()> {
        Ok(())
    }

    fn on_destroy(&mut self) -> ViewResult<()> {
        Ok(())
    }
}

/// A created directive: the shared object handed to injection and queries
/// plus the trait object the engine drives hooks through. Both point at the
/// same allocation.
#[derive(Clone)]
pub struct DirectiveInstance {
    value: Value,
    hooks: Rc<RefCell<dyn Directive>>,
}

impl DirectiveInstance {
    pub fn new<T: Directive>(directive: T) -> Self {
        let cell = Rc::new(RefCell::new(directive));
        let hooks: Rc<RefCell<dyn Directive>> = cell.clone();
        Self {
            value: Value::Object(cell),
            hooks,
        }
    }

    pub fn value(&self) -> Value {
        self.value.clone()
    }

    pub fn with<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.value.with(f)
    }

    pub fn with_mut<T: 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.value.with_mut(f)
    }

    pub fn ptr_eq(&self, other: &DirectiveInstance) -> bool {
        self.value.loose_identical(&other.value)
    }

    /// Whether one of the directive's hooks is running.
    pub(crate) fn is_busy(&self) -> bool {
        self.hooks.try_borrow().is_err()
    }

    pub(crate) fn hooks(&self) -> ViewResult<RefMut<'_, dyn Directive>> {
        self.hooks
            .try_borrow_mut()
            .map_err(|_| ViewError::illegal_state("directive re-entered while running a hook"))
    }
}

impl fmt::Debug for DirectiveInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DirectiveInstance")
    }
}

/// Value transformation usable from templates.
pub trait Pipe: Any {
    fn transform(&mut self, args: &[Value]) -> ViewResult<Value>;

    fn on_destroy(&mut self) -> ViewResult<()> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct PipeInstance {
    value: Value,
    pipe: Rc<RefCell<dyn Pipe>>,
}

impl PipeInstance {
    pub fn new<T: Pipe>(pipe: T) -> Self {
        let cell = Rc::new(RefCell::new(pipe));
        let handle: Rc<RefCell<dyn Pipe>> = cell.clone();
        Self {
            value: Value::Object(cell),
            pipe: handle,
        }
    }

    pub fn value(&self) -> Value {
        self.value.clone()
    }

    pub fn transform(&self, args: &[Value]) -> ViewResult<Value> {
        self.pipe
            .try_borrow_mut()
            .map_err(|_| ViewError::illegal_state("pipe re-entered while transforming"))?
            .transform(args)
    }

    pub(crate) fn destroy(&self) -> ViewResult<()> {
        self.pipe
            .try_borrow_mut()
            .map_err(|_| ViewError::illegal_state("pipe re-entered while destroying"))?
            .on_destroy()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleChange {
    pub previous_value: Value,
    pub current_value: Value,
    pub first_change: bool,
}

impl SimpleChange {
    pub fn is_first_change(&self) -> bool {
        self.first_change
    }
}

/// Input changes keyed by the input's public name.
pub type SimpleChanges = HashMap<String, SimpleChange>;

type Subscriber = Rc<dyn Fn(&Value)>;

/// Synchronous multicast emitter backing directive outputs.
#[derive(Clone, Default)]
pub struct EventEmitter {
    subscribers: Rc<RefCell<Vec<(u64, Subscriber)>>>,
    next_id: Rc<Cell<u64>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `value` to every current subscriber. Subscribers added while
    /// emitting only see later values.
    pub fn emit(&self, value: impl Into<Value>) {
        let value = value.into();
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, s)| Rc::clone(s))
            .collect();
        for subscriber in subscribers {
            subscriber(&value);
        }
    }

    /// Returns a closure that removes the subscription.
    pub fn subscribe(&self, subscriber: impl Fn(&Value) + 'static) -> Box<dyn FnOnce()> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.subscribers
            .borrow_mut()
            .push((id, Rc::new(subscriber)));
        let subscribers = Rc::downgrade(&self.subscribers);
        Box::new(move || {
            if let Some(subscribers) = subscribers.upgrade() {
                subscribers.borrow_mut().retain(|(sid, _)| *sid != id);
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
