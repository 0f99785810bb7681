//! Dynamically typed values that flow through invocations.
//!
//! Arguments, return values and by-reference cells are all [`Value`]s. Object
//! references pair the runtime type with an opaque, shareable Rust state, which is
//! what method bodies downcast to reach their data.

use std::{any::Any, fmt, sync::Arc};

use crate::metadata::{
    method::TypeSig,
    typesystem::{CorePrimitive, ManagedTypeRc},
};

/// A reference to an instance of a managed type.
///
/// Cloning an `ObjectRef` clones the reference, not the instance: both clones report
/// [`ObjectRef::same_instance`].
#[derive(Clone)]
pub struct ObjectRef {
    ty: ManagedTypeRc,
    state: Arc<dyn Any + Send + Sync>,
}

impl ObjectRef {
    /// Creates a new instance of `ty` carrying `state`.
    pub fn new<T: Any + Send + Sync>(ty: &ManagedTypeRc, state: T) -> Self {
        Self {
            ty: ty.clone(),
            state: Arc::new(state),
        }
    }

    /// Creates an instance from an already shared state.
    pub fn from_state(ty: &ManagedTypeRc, state: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            ty: ty.clone(),
            state,
        }
    }

    /// The runtime type of this instance
    #[must_use]
    pub fn ty(&self) -> &ManagedTypeRc {
        &self.ty
    }

    /// The shared state of this instance
    #[must_use]
    pub fn state(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.state
    }

    /// Downcasts the state to a concrete Rust type.
    #[must_use]
    pub fn downcast<T: Any>(&self) -> Option<&T> {
        self.state.downcast_ref::<T>()
    }

    /// Returns true if both references point to the same instance.
    #[must_use]
    pub fn same_instance(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ObjectRef({} @ {:p})",
            self.ty.fullname(),
            Arc::as_ptr(&self.state)
        )
    }
}

/// A dynamically typed value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// No value. Used for `void` returns and for unset return slots and `out` cells.
    #[default]
    Void,
    /// The null reference
    Null,
    /// `System.Boolean`
    Bool(bool),
    /// `System.Int32`
    I32(i32),
    /// `System.Int64`
    I64(i64),
    /// `System.Double`
    F64(f64),
    /// `System.Char`
    Char(char),
    /// `System.String`
    Str(String),
    /// A `System.Type` value, e.g. a generic argument
    Type(ManagedTypeRc),
    /// A reference to an object
    Object(ObjectRef),
}

impl Value {
    /// The default value of a type: zero for the primitive value types, null otherwise.
    #[must_use]
    pub fn default_of(ty: &ManagedTypeRc) -> Value {
        match CorePrimitive::from_fullname(&ty.fullname()) {
            Some(CorePrimitive::Boolean) => Value::Bool(false),
            Some(CorePrimitive::Char) => Value::Char('\0'),
            Some(CorePrimitive::Int32) => Value::I32(0),
            Some(CorePrimitive::Int64) => Value::I64(0),
            Some(CorePrimitive::Double) => Value::F64(0.0),
            Some(CorePrimitive::String | CorePrimitive::Type) | None => Value::Null,
        }
    }

    /// The default value for a signature.
    ///
    /// `method_args` closes method generic parameters; unresolved signatures default
    /// to null.
    #[must_use]
    pub fn default_for(sig: &TypeSig, method_args: &[ManagedTypeRc]) -> Value {
        match sig {
            TypeSig::Void => Value::Void,
            _ => sig
                .resolve(method_args)
                .map_or(Value::Null, |ty| Value::default_of(&ty)),
        }
    }

    /// Returns true for [`Value::Void`]
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    /// Returns the boolean payload
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the `i32` payload
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the `i64` payload, widening `i32`
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(value) => Some(*value),
            Value::I32(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    /// Returns the `f64` payload
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string payload
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the type payload
    #[must_use]
    pub fn as_type(&self) -> Option<&ManagedTypeRc> {
        match self {
            Value::Type(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the object payload
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(value) => Some(value),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a.token == b.token,
            (Value::Object(a), Value::Object(b)) => a.same_instance(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Value::Object(value)
    }
}
