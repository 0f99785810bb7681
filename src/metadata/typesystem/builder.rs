//! Builder for types of the runtime type model.
//!
//! This module provides the [`TypeBuilder`] struct, which offers a fluent API for
//! declaring interfaces, classes and value types together with their methods,
//! properties, events and explicit interface implementations, and registering them
//! in a [`TypeRegistry`].
//!
//! # Example
//!
//! ```rust,ignore
//! use proxyscope::metadata::typesystem::{PropertyBuilder, TypeBuilder, TypeRegistry, CorePrimitive};
//! use proxyscope::metadata::method::{MethodBuilder, TypeSig};
//!
//! let registry = TypeRegistry::new()?;
//! let string = TypeSig::of(&registry.primitive(CorePrimitive::String));
//!
//! let named = TypeBuilder::interface("Samples", "INamed")
//!     .property(PropertyBuilder::new("Name", string).read_write())
//!     .method(MethodBuilder::new("Reset"))
//!     .build(&registry)?;
//! # Ok::<(), proxyscope::Error>(())
//! ```

use std::{
    any::Any,
    sync::{Arc, Weak},
};

use crate::{
    metadata::{
        method::{MethodBuilder, MethodRc, Parameter, TypeSig},
        token::Token,
        typesystem::{
            registry::TypeStore, Constructor, Event, ExplicitImpl, ManagedType, ManagedTypeRc,
            ManagedTypeRef, ModuleRc, Property, TypeFlags, TypeRegistry,
        },
        value::Value,
    },
    Result,
};

type DeferredMethod = Box<dyn FnOnce(&TypeSig) -> MethodBuilder>;

enum PendingMethod {
    Ready(MethodBuilder),
    Deferred(DeferredMethod),
}

enum BaseSpec {
    Default,
    Type(ManagedTypeRc),
}

#[derive(Clone, Copy, PartialEq)]
enum TypeKind {
    Interface,
    Class,
    ValueType,
}

/// Fluent builder for a property and its accessors.
pub struct PropertyBuilder {
    name: String,
    sig: TypeSig,
    getter: Option<MethodBuilder>,
    setter: Option<MethodBuilder>,
}

impl PropertyBuilder {
    /// Starts a property without accessors.
    pub fn new(name: impl Into<String>, sig: TypeSig) -> Self {
        Self {
            name: name.into(),
            sig,
            getter: None,
            setter: None,
        }
    }

    /// Adds a `get_` accessor, configured by `configure`.
    #[must_use]
    pub fn getter(mut self, configure: impl FnOnce(MethodBuilder) -> MethodBuilder) -> Self {
        let accessor = MethodBuilder::new(format!("get_{}", self.name))
            .returns(self.sig.clone())
            .special_name();
        self.getter = Some(configure(accessor));
        self
    }

    /// Adds a `set_` accessor, configured by `configure`.
    #[must_use]
    pub fn setter(mut self, configure: impl FnOnce(MethodBuilder) -> MethodBuilder) -> Self {
        let accessor = MethodBuilder::new(format!("set_{}", self.name))
            .param("value", self.sig.clone())
            .special_name();
        self.setter = Some(configure(accessor));
        self
    }

    /// Adds both accessors with default settings.
    #[must_use]
    pub fn read_write(self) -> Self {
        self.getter(|m| m).setter(|m| m)
    }
}

/// Fluent builder for an event and its accessors.
pub struct EventBuilder {
    name: String,
    handler: TypeSig,
    adder: Option<MethodBuilder>,
    remover: Option<MethodBuilder>,
}

impl EventBuilder {
    /// Starts an event without accessors.
    pub fn new(name: impl Into<String>, handler: TypeSig) -> Self {
        Self {
            name: name.into(),
            handler,
            adder: None,
            remover: None,
        }
    }

    /// Adds an `add_` accessor, configured by `configure`.
    #[must_use]
    pub fn adder(mut self, configure: impl FnOnce(MethodBuilder) -> MethodBuilder) -> Self {
        let accessor = MethodBuilder::new(format!("add_{}", self.name))
            .param("value", self.handler.clone())
            .special_name();
        self.adder = Some(configure(accessor));
        self
    }

    /// Adds a `remove_` accessor, configured by `configure`.
    #[must_use]
    pub fn remover(mut self, configure: impl FnOnce(MethodBuilder) -> MethodBuilder) -> Self {
        let accessor = MethodBuilder::new(format!("remove_{}", self.name))
            .param("value", self.handler.clone())
            .special_name();
        self.remover = Some(configure(accessor));
        self
    }

    /// Adds both accessors with default settings.
    #[must_use]
    pub fn with_accessors(self) -> Self {
        self.adder(|m| m).remover(|m| m)
    }
}

/// Provides a fluent API for declaring and registering types
pub struct TypeBuilder {
    kind: TypeKind,
    namespace: String,
    name: String,
    module: Option<ModuleRc>,
    flags: TypeFlags,
    base: BaseSpec,
    interfaces: Vec<ManagedTypeRc>,
    methods: Vec<PendingMethod>,
    properties: Vec<PropertyBuilder>,
    events: Vec<EventBuilder>,
    explicit_impls: Vec<(MethodRc, MethodBuilder)>,
    generic_params: Vec<String>,
    generic_args: Vec<ManagedTypeRc>,
    constructor: Option<Constructor>,
}

impl TypeBuilder {
    fn new(kind: TypeKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        let flags = match kind {
            TypeKind::Interface => TypeFlags::PUBLIC | TypeFlags::INTERFACE | TypeFlags::ABSTRACT,
            TypeKind::Class => TypeFlags::PUBLIC,
            TypeKind::ValueType => TypeFlags::PUBLIC | TypeFlags::SEALED | TypeFlags::VALUE_TYPE,
        };

        TypeBuilder {
            kind,
            namespace: namespace.into(),
            name: name.into(),
            module: None,
            flags,
            base: BaseSpec::Default,
            interfaces: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            explicit_impls: Vec::new(),
            generic_params: Vec::new(),
            generic_args: Vec::new(),
            constructor: None,
        }
    }

    /// Starts an interface
    pub fn interface(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(TypeKind::Interface, namespace, name)
    }

    /// Starts a class deriving from `System.Object`
    pub fn class(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(TypeKind::Class, namespace, name)
    }

    /// Starts a value type deriving from `System.ValueType`
    pub fn value_type(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(TypeKind::ValueType, namespace, name)
    }

    /// Sets the declaring module. Defaults to the registry's default module.
    #[must_use]
    pub fn module(mut self, module: &ModuleRc) -> Self {
        self.module = Some(module.clone());
        self
    }

    /// Marks the type `sealed`
    #[must_use]
    pub fn sealed(mut self) -> Self {
        self.flags |= TypeFlags::SEALED;
        self
    }

    /// Marks the type `abstract`
    #[must_use]
    pub fn make_abstract(mut self) -> Self {
        self.flags |= TypeFlags::ABSTRACT;
        self
    }

    /// Marks the type `internal`
    #[must_use]
    pub fn internal(mut self) -> Self {
        self.flags.remove(TypeFlags::PUBLIC);
        self
    }

    /// Sets the base class
    #[must_use]
    pub fn extends(mut self, base: &ManagedTypeRc) -> Self {
        self.base = BaseSpec::Type(base.clone());
        self
    }

    /// Adds an implemented interface (for interfaces: an inherited interface)
    #[must_use]
    pub fn implements(mut self, iface: &ManagedTypeRc) -> Self {
        self.interfaces.push(iface.clone());
        self
    }

    /// Adds a method
    #[must_use]
    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.methods.push(PendingMethod::Ready(method));
        self
    }

    /// Adds a method whose signature refers to the type being built.
    ///
    /// `declare` receives the signature of the new type.
    #[must_use]
    pub fn self_method(mut self, declare: impl FnOnce(&TypeSig) -> MethodBuilder + 'static) -> Self {
        self.methods.push(PendingMethod::Deferred(Box::new(declare)));
        self
    }

    /// Adds a property
    #[must_use]
    pub fn property(mut self, property: PropertyBuilder) -> Self {
        self.properties.push(property);
        self
    }

    /// Adds an event
    #[must_use]
    pub fn event(mut self, event: EventBuilder) -> Self {
        self.events.push(event);
        self
    }

    /// Adds an explicit implementation of `interface_method`.
    ///
    /// The implementing method is private and sealed, and named after the interface
    /// (`Namespace.IFoo.Run`).
    #[must_use]
    pub fn explicit_impl(mut self, interface_method: &MethodRc, method: MethodBuilder) -> Self {
        self.explicit_impls.push((interface_method.clone(), method));
        self
    }

    /// Adds a generic parameter, making the type a generic definition
    #[must_use]
    pub fn generic_param(mut self, name: impl Into<String>) -> Self {
        self.generic_params.push(name.into());
        self
    }

    /// Adds a generic argument, closing a generic type
    #[must_use]
    pub fn generic_arg(mut self, arg: &ManagedTypeRc) -> Self {
        self.generic_args.push(arg.clone());
        self
    }

    /// Sets the instance constructor
    #[must_use]
    pub fn constructor<F>(mut self, params: Vec<Parameter>, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Arc<dyn Any + Send + Sync>> + Send + Sync + 'static,
    {
        self.constructor = Some(Constructor {
            params,
            body: Arc::new(body),
        });
        self
    }

    fn fullname(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Builds the type and registers it.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidContract`] if the declaration is inconsistent
    /// (an interface with a base class, a sealed or interface base, a non-interface in
    /// the implemented list) or the name is already registered.
    pub fn build(self, registry: &TypeRegistry) -> Result<ManagedTypeRc> {
        let fullname = self.fullname();

        let base = match (&self.base, self.kind) {
            (BaseSpec::Default, TypeKind::Interface) => None,
            (BaseSpec::Default, TypeKind::Class) => Some(registry.object()),
            (BaseSpec::Default, TypeKind::ValueType) => Some(registry.value_type()),
            (BaseSpec::Type(_), TypeKind::Interface) => {
                return Err(invalid_contract!(fullname, "interfaces can not have a base class"))
            }
            (BaseSpec::Type(base), _) => {
                if base.is_interface() {
                    return Err(invalid_contract!(
                        fullname,
                        "base type {} is an interface",
                        base.fullname()
                    ));
                }
                if base.is_sealed() {
                    return Err(invalid_contract!(
                        fullname,
                        "base type {} is sealed",
                        base.fullname()
                    ));
                }
                Some(base.clone())
            }
        };

        let module = self
            .module
            .clone()
            .unwrap_or_else(|| registry.default_module());
        self.build_into(&registry.store, base.as_ref(), module)
    }

    pub(crate) fn build_into(
        self,
        store: &TypeStore,
        base: Option<&ManagedTypeRc>,
        module: ModuleRc,
    ) -> Result<ManagedTypeRc> {
        let fullname = self.fullname();

        if let Some(iface) = self.interfaces.iter().find(|i| !i.is_interface()) {
            return Err(invalid_contract!(
                fullname,
                "{} is not an interface",
                iface.fullname()
            ));
        }
        if let Some((method, _)) = self
            .explicit_impls
            .iter()
            .find(|(m, _)| !m.declaring_type().is_some_and(|t| t.is_interface()))
        {
            return Err(invalid_contract!(
                fullname,
                "{} is not an interface method",
                method.full_name()
            ));
        }
        let interface = self.kind == TypeKind::Interface;
        let token = store.next_token(Token::KIND_TYPE);

        let ty = Arc::new_cyclic(|weak: &Weak<ManagedType>| {
            let self_sig = TypeSig::Type(ManagedTypeRef::from_weak(weak.clone(), token));
            let build_method = |builder: MethodBuilder| -> MethodRc {
                Arc::new(builder.build(store.next_token(Token::KIND_METHOD), weak.clone(), interface))
            };

            let mut methods: Vec<MethodRc> = self
                .methods
                .into_iter()
                .map(|pending| match pending {
                    PendingMethod::Ready(builder) => build_method(builder),
                    PendingMethod::Deferred(declare) => build_method(declare(&self_sig)),
                })
                .collect();

            let mut properties = Vec::with_capacity(self.properties.len());
            for property in self.properties {
                let getter = property.getter.map(&build_method);
                let setter = property.setter.map(&build_method);
                methods.extend(getter.iter().chain(setter.iter()).cloned());
                properties.push(Arc::new(Property {
                    token: store.next_token(Token::KIND_PROPERTY),
                    name: property.name,
                    sig: property.sig,
                    getter,
                    setter,
                }));
            }

            let mut events = Vec::with_capacity(self.events.len());
            for event in self.events {
                let adder = event.adder.map(&build_method);
                let remover = event.remover.map(&build_method);
                methods.extend(adder.iter().chain(remover.iter()).cloned());
                events.push(Arc::new(Event {
                    token: store.next_token(Token::KIND_EVENT),
                    name: event.name,
                    handler: event.handler,
                    adder,
                    remover,
                }));
            }

            let mut explicit_impls = Vec::with_capacity(self.explicit_impls.len());
            for (interface_method, builder) in self.explicit_impls {
                let name = format!(
                    "{}.{}",
                    interface_method
                        .declaring_type()
                        .map(|t| t.fullname())
                        .unwrap_or_default(),
                    builder.name()
                );
                let implementation = build_method(builder.with_name(name).private().sealed());
                methods.push(implementation.clone());
                explicit_impls.push(ExplicitImpl {
                    interface_method,
                    implementation,
                });
            }

            ManagedType {
                token,
                namespace: self.namespace,
                name: self.name,
                module,
                flags: self.flags,
                base: std::sync::OnceLock::new(),
                interfaces: self.interfaces,
                methods,
                properties,
                events,
                explicit_impls,
                generic_params: self.generic_params,
                generic_args: self.generic_args,
                constructor: self.constructor,
            }
        });

        if let Some(base) = base {
            ty.set_base(base);
        }

        store.insert(&ty)?;
        Ok(ty)
    }
}
