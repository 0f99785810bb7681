//! Methods of the runtime type model.
//!
//! A [`Method`] describes a single member: its accessibility, modifiers, parameters,
//! return type and generic parameters. Methods that have an implementation carry a
//! [`MethodBody`], a closure that receives the instance and a [`CallFrame`] with the
//! arguments. Bodies write `ref`/`out` results back into the frame.
//!
//! # Key Types
//! - [`Method`] - a method definition, shared as [`MethodRc`]
//! - [`MethodBuilder`] - fluent construction, used through [`crate::metadata::typesystem::TypeBuilder`]
//! - [`TypeSig`] - parameter and return type signatures
//! - [`CallFrame`] - arguments handed to a [`MethodBody`]
//!
//! # Examples
//!
//! ```rust,ignore
//! use proxyscope::metadata::method::{MethodBuilder, TypeSig};
//! use proxyscope::metadata::value::Value;
//!
//! let add = MethodBuilder::new("Add")
//!     .param("a", TypeSig::of(&int32))
//!     .param("b", TypeSig::of(&int32))
//!     .returns(TypeSig::of(&int32))
//!     .make_virtual()
//!     .body(|_this, frame| {
//!         let a = frame.argument(0)?.as_i32().unwrap_or_default();
//!         let b = frame.argument(1)?.as_i32().unwrap_or_default();
//!         Ok(Value::I32(a + b))
//!     });
//! ```

mod builder;
mod types;

use std::{
    fmt,
    sync::{Arc, Weak},
};

pub use builder::MethodBuilder;
pub use types::*;

use crate::{
    metadata::{
        token::Token,
        typesystem::{hash, ManagedType, ManagedTypeRc, ManagedTypeRef},
        value::{ObjectRef, Value},
    },
    Error, Result,
};

/// A reference to a `Method`
pub type MethodRc = Arc<Method>;

/// An executable method implementation.
///
/// Receives the instance the method is invoked on and the call frame. The returned
/// value becomes the return value of the call; `ref`/`out` results are written into
/// [`CallFrame::arguments`].
pub type MethodBody = Arc<dyn Fn(&ObjectRef, &mut CallFrame) -> Result<Value> + Send + Sync>;

/// The type of a parameter or a return value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeSig {
    /// `void`
    Void,
    /// A concrete type
    Type(ManagedTypeRef),
    /// Generic parameter of the declaring type, by position
    TypeParam(u16),
    /// Generic parameter of the method, by position
    MethodParam(u16),
}

impl TypeSig {
    /// Signature for a concrete type.
    #[must_use]
    pub fn of(ty: &ManagedTypeRc) -> Self {
        TypeSig::Type(ManagedTypeRef::new(ty))
    }

    /// Resolves the signature to a type, closing method generic parameters over
    /// `method_args`.
    #[must_use]
    pub fn resolve(&self, method_args: &[ManagedTypeRc]) -> Option<ManagedTypeRc> {
        match self {
            TypeSig::Type(ty) => ty.upgrade(),
            TypeSig::MethodParam(index) => method_args.get(usize::from(*index)).cloned(),
            TypeSig::Void | TypeSig::TypeParam(_) => None,
        }
    }

    /// Returns true if values of this signature are value types.
    #[must_use]
    pub fn is_value_type(&self, method_args: &[ManagedTypeRc]) -> bool {
        self.resolve(method_args)
            .is_some_and(|ty| ty.is_value_type())
    }
}

impl fmt::Display for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSig::Void => write!(f, "void"),
            TypeSig::Type(ty) => match ty.upgrade() {
                Some(ty) => write!(f, "{}", ty.fullname()),
                None => write!(f, "{}", ty.token()),
            },
            TypeSig::TypeParam(index) => write!(f, "!{}", index),
            TypeSig::MethodParam(index) => write!(f, "!!{}", index),
        }
    }
}

/// A method parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub sig: TypeSig,
    /// How the parameter is passed
    pub mode: ParamMode,
}

/// The arguments of a single method body execution.
pub struct CallFrame {
    /// The method being executed
    pub method: MethodRc,
    /// Positional arguments; `ref`/`out` results are written here
    pub arguments: Vec<Value>,
    /// Type arguments closing a generic method
    pub generic_arguments: Vec<ManagedTypeRc>,
}

impl CallFrame {
    /// Returns the argument at `index`.
    ///
    /// # Errors
    /// Returns [`Error::ArgumentIndex`] if `index` is out of range.
    pub fn argument(&self, index: usize) -> Result<&Value> {
        self.arguments.get(index).ok_or_else(|| Error::ArgumentIndex {
            method: self.method.full_name(),
            index,
            count: self.arguments.len(),
        })
    }

    /// Overwrites the argument at `index`, used for `ref`/`out` results.
    ///
    /// # Errors
    /// Returns [`Error::ArgumentIndex`] if `index` is out of range.
    pub fn set_argument(&mut self, index: usize, value: Value) -> Result<()> {
        let count = self.arguments.len();
        match self.arguments.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::ArgumentIndex {
                method: self.method.full_name(),
                index,
                count,
            }),
        }
    }
}

/// A method definition.
pub struct Method {
    /// Token allocated by the registry
    pub token: Token,
    /// Method name
    pub name: String,
    /// Accessibility
    pub access: MethodAccessFlags,
    /// Modifiers
    pub modifiers: MethodModifiers,
    /// Parameters in declaration order
    pub params: Vec<Parameter>,
    /// Return type
    pub return_type: TypeSig,
    /// Names of the method's own generic parameters
    pub generic_params: Vec<String>,
    /// The type declaring this method
    pub declaring_type: Weak<ManagedType>,
    /// The implementation, if any
    pub body: Option<MethodBody>,
}

impl Method {
    /// Returns true if the method is virtual
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.modifiers.contains(MethodModifiers::VIRTUAL)
    }

    /// Returns true if the method is sealed (virtual and final)
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.modifiers.contains(MethodModifiers::FINAL)
    }

    /// Returns true if the method has no implementation
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.modifiers.contains(MethodModifiers::ABSTRACT)
    }

    /// Returns true for static methods
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.modifiers.contains(MethodModifiers::STATIC)
    }

    /// Returns true for property and event accessors
    #[must_use]
    pub fn is_special_name(&self) -> bool {
        self.modifiers.contains(MethodModifiers::SPECIAL_NAME)
    }

    /// Returns true for generic method definitions
    #[must_use]
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// Returns true for finalizers (`void Finalize()`)
    #[must_use]
    pub fn is_finalizer(&self) -> bool {
        self.name == "Finalize"
            && self.params.is_empty()
            && self.generic_params.is_empty()
            && self.return_type == TypeSig::Void
    }

    /// The type declaring this method
    #[must_use]
    pub fn declaring_type(&self) -> Option<ManagedTypeRc> {
        self.declaring_type.upgrade()
    }

    /// Returns `Namespace.Type.Name`
    #[must_use]
    pub fn full_name(&self) -> String {
        match self.declaring_type() {
            Some(ty) => format!("{}.{}", ty.fullname(), self.name),
            None => self.name.clone(),
        }
    }

    /// Returns true if `other` has the same name and signature.
    ///
    /// Parameter names are ignored; types, modes, generic arity and the return type
    /// must match.
    #[must_use]
    pub fn signature_matches(&self, other: &Method) -> bool {
        self.name == other.name
            && self.generic_params.len() == other.generic_params.len()
            && self.return_type == other.return_type
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.sig == b.sig && a.mode == b.mode)
    }

    /// A hash over everything [`Method::signature_matches`] compares.
    #[must_use]
    pub fn signature_hash(&self) -> u64 {
        hash::signature_hash(self)
    }

    /// Executes the body on `this`.
    ///
    /// # Errors
    /// Returns [`Error::NoTarget`] if the method has no body, or whatever the body
    /// returns.
    pub fn invoke(&self, this: &ObjectRef, frame: &mut CallFrame) -> Result<Value> {
        match &self.body {
            Some(body) => body(this, frame),
            None => Err(Error::NoTarget {
                method: self.full_name(),
            }),
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("token", &self.token)
            .field("name", &self.full_name())
            .field("access", &self.access)
            .field("modifiers", &self.modifiers)
            .field("params", &self.params.len())
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.return_type, self.full_name())?;
        if self.is_generic() {
            write!(f, "<{}>", self.generic_params.join(", "))?;
        }
        write!(f, "(")?;
        for (index, param) in self.params.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            match param.mode {
                ParamMode::In => {}
                ParamMode::Ref => write!(f, "ref ")?,
                ParamMode::Out => write!(f, "out ")?,
            }
            write!(f, "{}", param.sig)?;
        }
        write!(f, ")")
    }
}

/// A method together with the type arguments closing it.
#[derive(Clone, Debug)]
pub struct MethodInstance {
    /// The method definition
    pub method: MethodRc,
    /// Type arguments, empty for non-generic methods
    pub type_arguments: Vec<ManagedTypeRc>,
}

impl MethodInstance {
    /// Resolves the return type against the type arguments.
    #[must_use]
    pub fn return_type(&self) -> Option<ManagedTypeRc> {
        self.method.return_type.resolve(&self.type_arguments)
    }
}
