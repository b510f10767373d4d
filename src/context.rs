//! External data context and its live projection onto mounted instances
//!
//! A [`Context`] is owned by the host. Binding it to a mounted instance does
//! not copy any value: the instance's [`PropertyTable`] gets one accessor per
//! context property, and every read or write goes through to the context.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use log::debug;
use thiserror::Error;

/// Errors raised by property access on a mounted instance
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    /// The property mirrors a callable and only has a read accessor
    #[error("property is read-only: {name}")]
    ReadOnly { name: String },
}

/// A callable context value
#[derive(Clone)]
pub struct Callable(Rc<dyn Fn(&[Value]) -> Value>);

impl Callable {
    pub fn new(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke the callable
    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Callable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callable(..)")
    }
}

/// A context property value
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Callable(Callable),
}

impl Value {
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Callable(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Largest magnitude below which every whole `f64` is an exact `i64` (2^53)
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < MAX_EXACT_INTEGER => {
                write!(f, "{}", *n as i64)
            }
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
            Value::Callable(_) => f.write_str("[callable]"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Callable> for Value {
    fn from(c: Callable) -> Self {
        Value::Callable(c)
    }
}

impl From<toml::Value> for Value {
    fn from(v: toml::Value) -> Self {
        match v {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Number(i as f64),
            toml::Value::Float(f) => Value::Number(f),
            toml::Value::Boolean(b) => Value::Bool(b),
            other => Value::String(other.to_string()),
        }
    }
}

/// Host-owned property bag, shared by handle
///
/// Cloning a `Context` clones the handle, not the properties.
#[derive(Debug, Clone, Default)]
pub struct Context {
    properties: Rc<RefCell<BTreeMap<String, Value>>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.properties.borrow().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.borrow_mut().insert(name.into(), value.into());
    }

    /// Own property names, in key order
    pub fn names(&self) -> Vec<String> {
        self.properties.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.properties.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.borrow().is_empty()
    }

    /// Whether both handles point at the same property bag
    pub fn ptr_eq(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.properties, &other.properties)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let context = Context::new();
        for (k, v) in iter {
            context.set(k, v);
        }
        context
    }
}

type Getter = Box<dyn Fn() -> Value>;
type Setter = Box<dyn Fn(Value)>;

/// An installed accessor pair; `set` is absent for read-only mirrors
pub struct Accessor {
    get: Getter,
    set: Option<Setter>,
}

impl Accessor {
    pub fn read_only(get: impl Fn() -> Value + 'static) -> Self {
        Self {
            get: Box::new(get),
            set: None,
        }
    }

    pub fn read_write(get: impl Fn() -> Value + 'static, set: impl Fn(Value) + 'static) -> Self {
        Self {
            get: Box::new(get),
            set: Some(Box::new(set)),
        }
    }

    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }
}

/// Per-instance property capability: `get(name)` / `set(name, value)`
///
/// Names with an installed accessor forward to it. Other names fall back to
/// plain instance-local storage.
#[derive(Default)]
pub struct PropertyTable {
    accessors: RefCell<HashMap<String, Accessor>>,
    local: RefCell<HashMap<String, Value>>,
}

impl PropertyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the accessor for `name`
    pub fn define(&self, name: impl Into<String>, accessor: Accessor) {
        let name = name.into();
        self.local.borrow_mut().remove(&name);
        self.accessors.borrow_mut().insert(name, accessor);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(accessor) = self.accessors.borrow().get(name) {
            return Some((accessor.get)());
        }
        self.local.borrow().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), PropertyError> {
        let value = value.into();
        if let Some(accessor) = self.accessors.borrow().get(name) {
            return match &accessor.set {
                Some(set) => {
                    set(value);
                    Ok(())
                }
                None => Err(PropertyError::ReadOnly {
                    name: name.to_string(),
                }),
            };
        }
        self.local.borrow_mut().insert(name.to_string(), value);
        Ok(())
    }

    pub fn has_accessor(&self, name: &str) -> bool {
        self.accessors.borrow().contains_key(name)
    }

    pub fn is_writable(&self, name: &str) -> bool {
        match self.accessors.borrow().get(name) {
            Some(accessor) => accessor.is_writable(),
            None => true,
        }
    }
}

impl fmt::Debug for PropertyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.accessors.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("PropertyTable")
            .field("accessors", &names)
            .field("local", &self.local.borrow().len())
            .finish()
    }
}

/// Projects context properties onto a property table
pub struct ContextBinder;

impl ContextBinder {
    /// Install one live accessor per context property
    ///
    /// Non-callable values get a read/write pair. Callable values get a read
    /// accessor only. The value kind is sampled once, at bind time.
    pub fn bind(context: Option<&Context>, table: &PropertyTable) {
        let Some(context) = context else {
            return;
        };

        for name in context.names() {
            let callable = context.get(&name).is_some_and(|v| v.is_callable());

            let getter = {
                let context = context.clone();
                let name = name.clone();
                move || context.get(&name).unwrap_or(Value::Null)
            };

            let accessor = if callable {
                Accessor::read_only(getter)
            } else {
                let context = context.clone();
                let key = name.clone();
                Accessor::read_write(getter, move |v| context.set(key.clone(), v))
            };

            debug!("binding context property {} (writable: {})", name, !callable);
            table.define(name, accessor);
        }
    }
}
