//! Central type registry.
//!
//! This module provides the `TypeRegistry`, a thread-safe registry for all types
//! proxies can be generated against. It allocates tokens, indexes types by token and
//! by full name, and owns the well-known root types every hierarchy ends in.
//!
//! # Registry Architecture
//!
//! - **Token-based lookup**: Primary index using tokens (`SkipMap`)
//! - **Name-based lookup**: Secondary index by full name (`DashMap`)
//! - **Token allocation**: Per-kind atomic counters
//!
//! # Well-known Types
//!
//! Every registry is created with:
//! - `System.Object`, with `ToString`, `Equals`, `GetHashCode`, `GetType` and `Finalize`
//! - `System.ValueType` and `System.MarshalByRefObject`
//! - the primitives listed in [`CorePrimitive`]
//! - the `IProxyTargetAccessor` infrastructure interface implemented by every proxy
//!
//! # Thread Safety
//!
//! Lookups and registrations never block each other. Registering two types with the
//! same full name concurrently lets exactly one of them win.
//!
//! # Examples
//!
//! ```rust,ignore
//! use proxyscope::metadata::typesystem::{CorePrimitive, TypeRegistry};
//!
//! let registry = TypeRegistry::new()?;
//! let int32 = registry.primitive(CorePrimitive::Int32);
//! assert_eq!(registry.get_by_fullname("System.Int32").unwrap().token, int32.token);
//! # Ok::<(), proxyscope::Error>(())
//! ```

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use crossbeam_skiplist::SkipMap;
use dashmap::{mapref::entry::Entry, DashMap};
use strum::IntoEnumIterator;

use crate::{
    metadata::{
        method::{MethodBuilder, TypeSig},
        token::Token,
        typesystem::{CorePrimitive, ManagedTypeRc, Module, ModuleRc, TypeBuilder},
        value::Value,
    },
    Error, Result,
};

/// Name of the module declaring the well-known root types
pub const CORE_MODULE: &str = "System.Private.CoreLib";
/// Name of the module declaring the proxy infrastructure interfaces
pub const RUNTIME_MODULE: &str = "ProxyScope.Runtime";
/// Name of the default module user types are declared in
pub const DEFAULT_MODULE: &str = "Application";

/// Storage and token allocation shared by the registry and the type builder.
pub(crate) struct TypeStore {
    types: SkipMap<Token, ManagedTypeRc>,
    fullnames: DashMap<String, Token>,
    next_type: AtomicU32,
    next_method: AtomicU32,
    next_property: AtomicU32,
    next_event: AtomicU32,
}

impl TypeStore {
    fn new() -> Self {
        TypeStore {
            types: SkipMap::new(),
            fullnames: DashMap::new(),
            next_type: AtomicU32::new(1),
            next_method: AtomicU32::new(1),
            next_property: AtomicU32::new(1),
            next_event: AtomicU32::new(1),
        }
    }

    /// Allocates the next token of `kind`
    pub(crate) fn next_token(&self, kind: u8) -> Token {
        let counter = match kind {
            Token::KIND_METHOD => &self.next_method,
            Token::KIND_PROPERTY => &self.next_property,
            Token::KIND_EVENT => &self.next_event,
            _ => &self.next_type,
        };
        Token::from_parts(kind, counter.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a type, failing if the full name is taken
    pub(crate) fn insert(&self, ty: &ManagedTypeRc) -> Result<()> {
        let fullname = ty.fullname();
        match self.fullnames.entry(fullname.clone()) {
            Entry::Occupied(_) => Err(invalid_contract!(
                fullname,
                "a type with this name is already registered"
            )),
            Entry::Vacant(slot) => {
                slot.insert(ty.token);
                self.types.insert(ty.token, ty.clone());
                Ok(())
            }
        }
    }
}

/// Central registry for all types known to the proxy generator
pub struct TypeRegistry {
    pub(crate) store: TypeStore,
    core_module: ModuleRc,
    default_module: ModuleRc,
    object: ManagedTypeRc,
    value_type: ManagedTypeRc,
    marshal_by_ref_object: ManagedTypeRc,
    proxy_target_accessor: ManagedTypeRc,
    primitives: Vec<(CorePrimitive, ManagedTypeRc)>,
}

impl TypeRegistry {
    /// Create a new registry with the well-known root types
    ///
    /// # Errors
    /// Returns an error if the root types can not be declared.
    pub fn new() -> Result<Self> {
        let store = TypeStore::new();
        let core_module = Module::new(CORE_MODULE);

        let mut primitives = Vec::new();
        for primitive in CorePrimitive::iter() {
            let builder = if primitive.is_value_type() {
                TypeBuilder::value_type("System", primitive.to_string())
            } else if primitive == CorePrimitive::Type {
                TypeBuilder::class("System", primitive.to_string()).make_abstract()
            } else {
                TypeBuilder::class("System", primitive.to_string()).sealed()
            };
            primitives.push((primitive, builder.build_into(&store, None, core_module.clone())?));
        }

        let sig_of = |wanted: CorePrimitive| -> Result<TypeSig> {
            primitives
                .iter()
                .find(|(p, _)| *p == wanted)
                .map(|(_, ty)| TypeSig::of(ty))
                .ok_or_else(|| Error::Error(format!("primitive {} is missing", wanted)))
        };
        let boolean = sig_of(CorePrimitive::Boolean)?;
        let int32 = sig_of(CorePrimitive::Int32)?;
        let string = sig_of(CorePrimitive::String)?;
        let system_type = sig_of(CorePrimitive::Type)?;

        let object = TypeBuilder::class("System", "Object")
            .method(
                MethodBuilder::new("ToString")
                    .make_virtual()
                    .returns(string)
                    .body(|this, _| Ok(Value::Str(this.ty().fullname()))),
            )
            .self_method(move |this| {
                MethodBuilder::new("Equals")
                    .make_virtual()
                    .param("obj", this.clone())
                    .returns(boolean)
                    .body(|this, frame| {
                        let same = frame
                            .argument(0)?
                            .as_object()
                            .is_some_and(|other| other.same_instance(this));
                        Ok(Value::Bool(same))
                    })
            })
            .method(
                MethodBuilder::new("GetHashCode")
                    .make_virtual()
                    .returns(int32)
                    .body(|this, _| {
                        let address = Arc::as_ptr(this.state()).cast::<()>() as usize;
                        Ok(Value::I32(address as i32))
                    }),
            )
            .method(
                MethodBuilder::new("GetType")
                    .returns(system_type)
                    .body(|this, _| Ok(Value::Type(this.ty().clone()))),
            )
            .method(
                MethodBuilder::new("Finalize")
                    .protected()
                    .make_virtual()
                    .body(|_, _| Ok(Value::Void)),
            )
            .build_into(&store, None, core_module.clone())?;

        let value_type = TypeBuilder::class("System", "ValueType")
            .make_abstract()
            .build_into(&store, Some(&object), core_module.clone())?;
        let marshal_by_ref_object = TypeBuilder::class("System", "MarshalByRefObject")
            .make_abstract()
            .build_into(&store, Some(&object), core_module.clone())?;

        for (primitive, ty) in &primitives {
            if primitive.is_value_type() {
                ty.set_base(&value_type);
            } else {
                ty.set_base(&object);
            }
        }

        let object_sig = TypeSig::of(&object);
        let proxy_target_accessor = TypeBuilder::interface("ProxyScope", "IProxyTargetAccessor")
            .method(MethodBuilder::new("DynProxyGetTarget").returns(object_sig.clone()))
            .method(MethodBuilder::new("GetInterceptors").returns(object_sig))
            .build_into(&store, None, Module::new(RUNTIME_MODULE))?;

        Ok(TypeRegistry {
            store,
            core_module,
            default_module: Module::new(DEFAULT_MODULE),
            object,
            value_type,
            marshal_by_ref_object,
            proxy_target_accessor,
            primitives,
        })
    }

    /// `System.Object`
    #[must_use]
    pub fn object(&self) -> ManagedTypeRc {
        self.object.clone()
    }

    /// `System.ValueType`
    #[must_use]
    pub fn value_type(&self) -> ManagedTypeRc {
        self.value_type.clone()
    }

    /// `System.MarshalByRefObject`
    #[must_use]
    pub fn marshal_by_ref_object(&self) -> ManagedTypeRc {
        self.marshal_by_ref_object.clone()
    }

    /// The infrastructure interface every proxy implements on its own
    #[must_use]
    pub fn proxy_target_accessor(&self) -> ManagedTypeRc {
        self.proxy_target_accessor.clone()
    }

    /// Returns a built-in primitive type
    #[must_use]
    pub fn primitive(&self, primitive: CorePrimitive) -> ManagedTypeRc {
        self.primitives
            .iter()
            .find(|(p, _)| *p == primitive)
            .map_or_else(|| self.object.clone(), |(_, ty)| ty.clone())
    }

    /// The module declaring the well-known root types
    #[must_use]
    pub fn core_module(&self) -> ModuleRc {
        self.core_module.clone()
    }

    /// The module types are declared in unless the builder names another one
    #[must_use]
    pub fn default_module(&self) -> ModuleRc {
        self.default_module.clone()
    }

    /// Returns true for the roots whose members are never intercepted
    /// (`System.Object` and `System.MarshalByRefObject`)
    #[must_use]
    pub fn is_excluded_root(&self, ty: &ManagedTypeRc) -> bool {
        ty.token == self.object.token || ty.token == self.marshal_by_ref_object.token
    }

    /// Returns true for infrastructure interfaces a caller can not request
    #[must_use]
    pub fn is_infrastructure(&self, ty: &ManagedTypeRc) -> bool {
        ty.token == self.proxy_target_accessor.token
    }

    /// Look up a type by token
    #[must_use]
    pub fn get(&self, token: &Token) -> Option<ManagedTypeRc> {
        self.store.types.get(token).map(|entry| entry.value().clone())
    }

    /// Look up a type by token, failing if it is unknown
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] if no type has this token.
    pub fn resolve(&self, token: &Token) -> Result<ManagedTypeRc> {
        self.get(token).ok_or(Error::TypeNotFound(*token))
    }

    /// Look up a type by full name (`Namespace.Name`)
    #[must_use]
    pub fn get_by_fullname(&self, fullname: &str) -> Option<ManagedTypeRc> {
        let token = *self.store.fullnames.get(fullname)?;
        self.get(&token)
    }

    /// Number of registered types
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.types.len()
    }

    /// Returns true if no type is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.types.is_empty()
    }

    /// All registered types in token order
    #[must_use]
    pub fn all_types(&self) -> Vec<ManagedTypeRc> {
        self.store
            .types
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
