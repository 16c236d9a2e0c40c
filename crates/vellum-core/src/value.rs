//! Dynamic values flowing through bindings, pure expressions and injection.

use std::any::Any;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

/// A binding or injection value.
///
/// Scalars compare by value; lists, maps and objects compare by identity so
/// that a pure expression only counts as changed when it produced a new
/// allocation.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<Vec<Value>>),
    Map(Rc<Vec<(String, Value)>>),
    Object(Rc<dyn Any>),
}

impl Value {
    pub fn str(value: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(value.as_ref()))
    }

    pub fn list(values: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Rc::new(values.into_iter().collect()))
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(Rc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Wraps `value` in a shared cell so it can later be borrowed mutably
    /// through [`Value::with_mut`].
    pub fn object<T: 'static>(value: T) -> Self {
        Value::Object(Rc::new(RefCell::new(value)))
    }

    pub fn from_rc<T: 'static>(value: Rc<T>) -> Self {
        Value::Object(value)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v.as_ref()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Truthiness used by class bindings.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(v) => *v,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0 && !v.is_nan(),
            Value::Str(v) => !v.is_empty(),
            Value::List(_) | Value::Map(_) | Value::Object(_) => true,
        }
    }

    /// Downcasts an object value to the shared allocation it wraps.
    pub fn downcast<T: 'static>(&self) -> Option<Rc<T>> {
        match self {
            Value::Object(any) => Rc::clone(any).downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Immutably borrows an object created with [`Value::object`]. `None`
    /// while the object is mutably borrowed, e.g. by a running hook.
    pub fn borrow<T: 'static>(&self) -> Option<Ref<'_, T>> {
        match self {
            Value::Object(any) => any
                .downcast_ref::<RefCell<T>>()
                .and_then(|cell| cell.try_borrow().ok()),
            _ => None,
        }
    }

    pub fn with<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.borrow::<T>().map(|value| f(&value))
    }

    pub fn with_mut<T: 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        match self {
            Value::Object(any) => any
                .downcast_ref::<RefCell<T>>()
                .and_then(|cell| cell.try_borrow_mut().ok())
                .map(|mut value| f(&mut value)),
            _ => None,
        }
    }

    /// Identity comparison with the NaN exception: `NaN` is unchanged against
    /// itself.
    pub fn loose_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Equality used by the no-changes verification pass: lists are compared
    /// element-wise and opaque objects are never reported as changed.
    pub fn dev_mode_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.dev_mode_equal(y))
            }
            (Value::Map(_), Value::Map(_)) | (Value::Object(_), Value::Object(_)) => true,
            _ => self.loose_identical(other),
        }
    }

    /// Text representation written into text nodes and attributes.
    pub fn render_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => format_float(*v),
            Value::Str(v) => v.to_string(),
            Value::List(values) => values
                .iter()
                .map(Value::render_string)
                .collect::<Vec<_>>()
                .join(","),
            Value::Map(_) | Value::Object(_) => "[object Object]".to_string(),
        }
    }
}

fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if v.fract() == 0.0 && v.abs() < 1e21 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => f.write_str(&format_float(*v)),
            Value::Str(v) => write!(f, "{v:?}"),
            Value::List(values) => f.debug_list().entries(values.iter()).finish(),
            Value::Map(entries) => f
                .debug_map()
                .entries(entries.iter().map(|(k, v)| (k, v)))
                .finish(),
            Value::Object(_) => f.write_str("[object]"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_string())
    }
}

/// Structural equality for assertions; objects compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => self.loose_identical(other),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::str(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Rc::from(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
