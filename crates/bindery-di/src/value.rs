//! Instances, argument values and call-time argument lists

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::service_id::ServiceId;

/// Converts a type-erased instance into a boxed `Arc<I>` for some interface `I`
pub(crate) type CastFn =
    Arc<dyn Fn(Arc<dyn Any + Send + Sync>) -> Option<Box<dyn Any>> + Send + Sync>;

/// Interface casts keyed by `TypeId::of::<Arc<I>>()`
pub(crate) type CastTable = HashMap<TypeId, CastFn>;

/// A constructed instance together with the class it was built from
#[derive(Clone)]
pub struct Object {
    class: ServiceId,
    instance: Arc<dyn Any + Send + Sync>,
    casts: Arc<CastTable>,
}

impl Object {
    /// Wrap a value without any interface casts
    pub fn new<T: Any + Send + Sync>(class: impl Into<ServiceId>, value: T) -> Self {
        Self::from_arc(class, Arc::new(value))
    }

    pub fn from_arc(class: impl Into<ServiceId>, instance: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            class: class.into(),
            instance,
            casts: Arc::default(),
        }
    }

    pub(crate) fn with_casts(
        class: ServiceId,
        instance: Arc<dyn Any + Send + Sync>,
        casts: Arc<CastTable>,
    ) -> Self {
        Self {
            class,
            instance,
            casts,
        }
    }

    /// Concrete class of the instance
    pub fn class(&self) -> &ServiceId {
        &self.class
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.instance).downcast::<T>().ok()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.instance.is::<T>()
    }

    /// View the instance through an interface registered with
    /// [`DescriptorBuilder::implements_as`](crate::registry::DescriptorBuilder::implements_as)
    pub fn cast<I: ?Sized + 'static>(&self) -> Option<Arc<I>> {
        let cast = self.casts.get(&TypeId::of::<Arc<I>>())?;
        let boxed = cast(Arc::clone(&self.instance))?;
        boxed.downcast::<Arc<I>>().ok().map(|arc| *arc)
    }

    pub fn instance(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.instance
    }

    /// Reference identity
    pub fn ptr_eq(&self, other: &Object) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.instance) as *const (),
            Arc::as_ptr(&other.instance) as *const (),
        )
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class)
            .field("ptr", &(Arc::as_ptr(&self.instance) as *const ()))
            .finish()
    }
}

/// A value usable as a constructor argument or substitution payload
#[derive(Debug, Clone)]
pub enum Value {
    /// Plain data (strings, numbers, lists, maps, null)
    Data(serde_json::Value),
    /// An already constructed instance
    Object(Object),
    /// Reference to a service, resolved when the value is used
    Service(ServiceId),
}

impl Value {
    pub fn null() -> Self {
        Value::Data(serde_json::Value::Null)
    }

    pub fn service(id: impl Into<ServiceId>) -> Self {
        Value::Service(id.into())
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Data(serde_json::Value::Null))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Data(a), Value::Data(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Service(a), Value::Service(b)) => a == b,
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::Data(value)
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Value::Object(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Data(serde_json::Value::String(value.to_string()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Data(serde_json::Value::String(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Data(serde_json::Value::Bool(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Data(serde_json::Value::from(value))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Data(serde_json::Value::from(value))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Data(serde_json::Value::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Data(serde_json::Value::from(value))
    }
}

/// Call-time arguments for `get`.
///
/// Positional values are matched by declared type first and then by order;
/// named values go to the parameter with that name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional value
    pub fn push(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append a positional instance
    pub fn object(self, object: Object) -> Self {
        self.push(Value::Object(object))
    }

    /// Set a named value; a leading `$` on the name is ignored
    pub fn named(mut self, name: &str, value: impl Into<Value>) -> Self {
        let name = name.strip_prefix('$').unwrap_or(name).to_string();
        let value = value.into();
        match self.named.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.named.push((name, value)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn named_values(&self) -> &[(String, Value)] {
        &self.named
    }

    pub(crate) fn into_parts(self) -> (Vec<Value>, Vec<(String, Value)>) {
        (self.positional, self.named)
    }
}

impl From<Vec<Value>> for Args {
    fn from(positional: Vec<Value>) -> Self {
        Self {
            positional,
            named: Vec::new(),
        }
    }
}
