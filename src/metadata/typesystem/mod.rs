//! Runtime type system proxies are generated against.
//!
//! This module provides a compact .NET-style type model: namespaced types living in
//! modules, with a single base class, implemented interfaces, methods, properties,
//! events and explicit interface implementations. Every type is registered in a
//! [`TypeRegistry`], which also owns the well-known root types.
//!
//! # Key Components
//!
//! - [`ManagedType`]: Core type representation
//! - [`TypeRegistry`]: Central registry for all types, including `System.Object` and the primitives
//! - [`TypeBuilder`]: Builder pattern for constructing types
//! - [`CorePrimitive`]: Built-in primitive types (int32, string, ...)
//! - [`TypeKey`]: Identity of a type inside hashed keys
//!
//! # Type System Features
//!
//! - **Inheritance**: Base class chain and transitive interface tracking
//! - **Implementation maps**: Explicit implementations first, then signature matching
//! - **Modules**: Module membership and internals-visible-to trust
//! - **Construction**: Optional constructors producing instance state
//!
//! # Examples
//!
//! ```rust,ignore
//! use proxyscope::metadata::typesystem::{TypeBuilder, TypeRegistry};
//! use proxyscope::metadata::method::MethodBuilder;
//!
//! let registry = TypeRegistry::new()?;
//! let service = TypeBuilder::class("Samples", "Service")
//!     .method(MethodBuilder::new("Run").make_virtual())
//!     .build(&registry)?;
//!
//! assert_eq!(service.base().unwrap().fullname(), "System.Object");
//! # Ok::<(), proxyscope::Error>(())
//! ```

mod builder;
pub(crate) mod hash;
mod primitives;
mod registry;

use std::{
    any::Any,
    collections::HashSet,
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, OnceLock, Weak},
};

use bitflags::bitflags;

pub use builder::{EventBuilder, PropertyBuilder, TypeBuilder};
pub use primitives::CorePrimitive;
pub use registry::TypeRegistry;

use crate::{
    metadata::{
        method::{Method, MethodRc, Parameter, TypeSig},
        token::Token,
        value::{ObjectRef, Value},
    },
    Error, Result,
};

/// Reference to a `ManagedType`
pub type ManagedTypeRc = Arc<ManagedType>;
/// Reference to a `Module`
pub type ModuleRc = Arc<Module>;
/// Reference to a `Property`
pub type PropertyRc = Arc<Property>;
/// Reference to an `Event`
pub type EventRc = Arc<Event>;

/// Default limit for walking interface hierarchies
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Produces the state of a new instance from constructor arguments.
pub type ConstructorBody =
    Arc<dyn Fn(&[Value]) -> Result<Arc<dyn Any + Send + Sync>> + Send + Sync>;

bitflags! {
    #[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
    /// Type attributes
    pub struct TypeFlags: u32 {
        /// Type is visible outside its module
        const PUBLIC = 0x0000_0001;
        /// Type is an interface
        const INTERFACE = 0x0000_0020;
        /// Type can not be instantiated
        const ABSTRACT = 0x0000_0080;
        /// Type can not be derived from
        const SEALED = 0x0000_0100;
        /// Type is a value type
        const VALUE_TYPE = 0x0100_0000;
    }
}

/// A module (assembly) types are declared in.
#[derive(Debug)]
pub struct Module {
    /// Module name
    pub name: String,
    /// Modules allowed to see this module's internal members
    pub internals_visible_to: Vec<String>,
}

impl Module {
    /// Creates a module that trusts nobody.
    pub fn new(name: impl Into<String>) -> ModuleRc {
        Arc::new(Module {
            name: name.into(),
            internals_visible_to: Vec::new(),
        })
    }

    /// Creates a module whose internals are visible to `friends`.
    pub fn with_friends(name: impl Into<String>, friends: &[&str]) -> ModuleRc {
        Arc::new(Module {
            name: name.into(),
            internals_visible_to: friends.iter().map(ToString::to_string).collect(),
        })
    }

    /// Returns true if `module_name` may see this module's internal members.
    #[must_use]
    pub fn trusts(&self, module_name: &str) -> bool {
        self.name == module_name || self.internals_visible_to.iter().any(|m| m == module_name)
    }
}

/// A weak reference to a `ManagedType` which remembers the token of its target.
///
/// Signatures use these so types can reference each other (and themselves) without
/// reference cycles.
#[derive(Clone)]
pub struct ManagedTypeRef {
    weak_ref: Weak<ManagedType>,
    token: Token,
}

impl ManagedTypeRef {
    /// Create a new `ManagedTypeRef` from a strong reference
    #[must_use]
    pub fn new(strong_ref: &ManagedTypeRc) -> Self {
        Self {
            weak_ref: Arc::downgrade(strong_ref),
            token: strong_ref.token,
        }
    }

    pub(crate) fn from_weak(weak_ref: Weak<ManagedType>, token: Token) -> Self {
        Self { weak_ref, token }
    }

    /// Get a strong reference to the type, returning None if the type has been dropped
    #[must_use]
    pub fn upgrade(&self) -> Option<ManagedTypeRc> {
        self.weak_ref.upgrade()
    }

    /// Token of the referenced type
    #[must_use]
    pub fn token(&self) -> Token {
        self.token
    }
}

impl fmt::Debug for ManagedTypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ManagedTypeRef({})", self.token)
    }
}

impl PartialEq for ManagedTypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

impl Eq for ManagedTypeRef {}

impl Hash for ManagedTypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.token.hash(state);
    }
}

/// A type used as part of a hashed key, compared by token.
#[derive(Clone)]
pub struct TypeKey(pub ManagedTypeRc);

impl TypeKey {
    /// The wrapped type
    #[must_use]
    pub fn ty(&self) -> &ManagedTypeRc {
        &self.0
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.token == other.0.token
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.token.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.fullname())
    }
}

impl From<&ManagedTypeRc> for TypeKey {
    fn from(ty: &ManagedTypeRc) -> Self {
        TypeKey(ty.clone())
    }
}

/// A property and its accessors.
#[derive(Debug)]
pub struct Property {
    /// Token allocated by the registry
    pub token: Token,
    /// Property name
    pub name: String,
    /// Property type
    pub sig: TypeSig,
    /// `get_` accessor
    pub getter: Option<MethodRc>,
    /// `set_` accessor
    pub setter: Option<MethodRc>,
}

impl Property {
    /// The accessors present on this property
    pub fn accessors(&self) -> impl Iterator<Item = &MethodRc> {
        self.getter.iter().chain(self.setter.iter())
    }
}

/// An event and its accessors.
#[derive(Debug)]
pub struct Event {
    /// Token allocated by the registry
    pub token: Token,
    /// Event name
    pub name: String,
    /// Handler type
    pub handler: TypeSig,
    /// `add_` accessor
    pub adder: Option<MethodRc>,
    /// `remove_` accessor
    pub remover: Option<MethodRc>,
}

impl Event {
    /// The accessors present on this event
    pub fn accessors(&self) -> impl Iterator<Item = &MethodRc> {
        self.adder.iter().chain(self.remover.iter())
    }
}

/// An explicit interface method implementation (`void IFoo.Run() { }`).
#[derive(Debug, Clone)]
pub struct ExplicitImpl {
    /// The implemented interface method
    pub interface_method: MethodRc,
    /// The implementing method on the class
    pub implementation: MethodRc,
}

/// Instance constructor of a class.
#[derive(Clone)]
pub struct Constructor {
    /// Constructor parameters
    pub params: Vec<Parameter>,
    /// Produces the instance state
    pub body: ConstructorBody,
}

/// A type of the runtime type model.
pub struct ManagedType {
    /// Token allocated by the registry
    pub token: Token,
    /// Namespace, may be empty
    pub namespace: String,
    /// Type name
    pub name: String,
    /// Declaring module
    pub module: ModuleRc,
    /// Type attributes
    pub flags: TypeFlags,
    base: OnceLock<ManagedTypeRef>,
    /// Directly implemented (or, for interfaces, inherited) interfaces
    pub interfaces: Vec<ManagedTypeRc>,
    /// Methods declared on this type, accessors included
    pub methods: Vec<MethodRc>,
    /// Properties declared on this type
    pub properties: Vec<PropertyRc>,
    /// Events declared on this type
    pub events: Vec<EventRc>,
    /// Explicit interface method implementations
    pub explicit_impls: Vec<ExplicitImpl>,
    /// Generic parameter names of a generic definition
    pub generic_params: Vec<String>,
    /// Generic arguments of a closed generic type
    pub generic_args: Vec<ManagedTypeRc>,
    /// Instance constructor
    pub constructor: Option<Constructor>,
}

impl ManagedType {
    /// Returns the full name (Namespace.Name) of the type
    #[must_use]
    pub fn fullname(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Returns true for interfaces
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(TypeFlags::INTERFACE)
    }

    /// Returns true for sealed types
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.flags.contains(TypeFlags::SEALED)
    }

    /// Returns true for abstract types
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(TypeFlags::ABSTRACT)
    }

    /// Returns true for value types
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        self.flags.contains(TypeFlags::VALUE_TYPE)
    }

    /// Returns true for classes (neither interfaces nor value types)
    #[must_use]
    pub fn is_class(&self) -> bool {
        !self.is_interface() && !self.is_value_type()
    }

    /// Returns true for types visible outside their module
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.flags.contains(TypeFlags::PUBLIC)
    }

    /// Returns true for open generic type definitions
    #[must_use]
    pub fn is_generic_definition(&self) -> bool {
        !self.generic_params.is_empty() && self.generic_args.is_empty()
    }

    /// The base type, if any
    #[must_use]
    pub fn base(&self) -> Option<ManagedTypeRc> {
        self.base.get().and_then(ManagedTypeRef::upgrade)
    }

    /// Sets the base type once. Returns false if a base was already set.
    pub(crate) fn set_base(&self, base: &ManagedTypeRc) -> bool {
        self.base.set(ManagedTypeRef::new(base)).is_ok()
    }

    /// This type followed by its base types, most derived first.
    #[must_use]
    pub fn hierarchy(self: &Arc<Self>) -> Vec<ManagedTypeRc> {
        let mut chain = vec![self.clone()];
        let mut current = self.base();
        while let Some(ty) = current {
            if chain.iter().any(|seen| seen.token == ty.token) {
                break;
            }
            current = ty.base();
            chain.push(ty);
        }
        chain
    }

    /// All interfaces of this type, transitively and de-duplicated, in declaration
    /// order. For classes this includes the interfaces of every base type; for
    /// interfaces it is the set of inherited interfaces.
    ///
    /// # Errors
    /// Returns [`Error::RecursionLimit`] if the hierarchy is deeper than `max_depth`.
    pub fn all_interfaces(self: &Arc<Self>, max_depth: usize) -> Result<Vec<ManagedTypeRc>> {
        let mut visited = HashSet::new();
        let mut result = Vec::new();
        for ty in self.hierarchy() {
            for iface in &ty.interfaces {
                collect_interfaces(iface, 1, max_depth, &mut visited, &mut result)?;
            }
        }
        Ok(result)
    }

    /// Returns true if this type implements (or, for interfaces, inherits) `iface`.
    #[must_use]
    pub fn implements(self: &Arc<Self>, iface: &ManagedTypeRc) -> bool {
        self.all_interfaces(DEFAULT_MAX_DEPTH)
            .is_ok_and(|all| all.iter().any(|ty| ty.token == iface.token))
    }

    /// Returns true if a value of this type can be used where `other` is expected.
    #[must_use]
    pub fn is_assignable_to(self: &Arc<Self>, other: &ManagedTypeRc) -> bool {
        if other.is_interface() {
            return self.token == other.token || self.implements(other);
        }
        self.hierarchy().iter().any(|ty| ty.token == other.token)
    }

    /// Methods declared on this type with the given name
    #[must_use]
    pub fn methods_named(&self, name: &str) -> Vec<MethodRc> {
        self.methods
            .iter()
            .filter(|method| method.name == name)
            .cloned()
            .collect()
    }

    /// Resolves the implementation of an interface method on this class.
    ///
    /// Explicit implementations anywhere on the class chain win, most derived first.
    /// Otherwise the most derived public instance method with a matching signature
    /// is used.
    #[must_use]
    pub fn find_implementation(self: &Arc<Self>, interface_method: &Method) -> Option<MethodRc> {
        let hierarchy = self.hierarchy();

        for ty in &hierarchy {
            if let Some(explicit) = ty
                .explicit_impls
                .iter()
                .find(|e| e.interface_method.token == interface_method.token)
            {
                return Some(explicit.implementation.clone());
            }
        }

        hierarchy.iter().find_map(|ty| {
            ty.methods
                .iter()
                .find(|m| {
                    !m.is_static()
                        && m.access.is_public()
                        && m.signature_matches(interface_method)
                })
                .cloned()
        })
    }

    /// Resolves the most derived override of `method` on this class chain.
    #[must_use]
    pub fn find_override(self: &Arc<Self>, method: &Method) -> Option<MethodRc> {
        self.hierarchy().iter().find_map(|ty| {
            ty.methods
                .iter()
                .find(|m| !m.is_static() && m.signature_matches(method))
                .cloned()
        })
    }

    /// Creates an instance by running the constructor.
    ///
    /// Types without a constructor accept no arguments and get an empty state.
    ///
    /// # Errors
    /// Returns [`Error::ArgumentCount`] on an arity mismatch, or the constructor's error.
    pub fn construct(self: &Arc<Self>, arguments: &[Value]) -> Result<ObjectRef> {
        match &self.constructor {
            None if arguments.is_empty() => Ok(ObjectRef::new(self, ())),
            None => Err(Error::ArgumentCount {
                method: format!("{}..ctor", self.fullname()),
                expected: 0,
                actual: arguments.len(),
            }),
            Some(ctor) => {
                if ctor.params.len() != arguments.len() {
                    return Err(Error::ArgumentCount {
                        method: format!("{}..ctor", self.fullname()),
                        expected: ctor.params.len(),
                        actual: arguments.len(),
                    });
                }
                let state = (ctor.body)(arguments)?;
                Ok(ObjectRef::from_state(self, state))
            }
        }
    }
}

fn collect_interfaces(
    iface: &ManagedTypeRc,
    depth: usize,
    max_depth: usize,
    visited: &mut HashSet<Token>,
    out: &mut Vec<ManagedTypeRc>,
) -> Result<()> {
    if depth > max_depth {
        return Err(Error::RecursionLimit(max_depth));
    }
    if !visited.insert(iface.token) {
        return Ok(());
    }

    out.push(iface.clone());
    for inherited in &iface.interfaces {
        collect_interfaces(inherited, depth + 1, max_depth, visited, out)?;
    }
    Ok(())
}

impl fmt::Debug for ManagedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedType")
            .field("token", &self.token)
            .field("fullname", &self.fullname())
            .field("module", &self.module.name)
            .field("flags", &self.flags)
            .field("methods", &self.methods.len())
            .finish()
    }
}

impl fmt::Display for ManagedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fullname())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::method::MethodBuilder;

    #[test]
    fn test_interface_flattening() {
        let registry = TypeRegistry::new().unwrap();
        let base = TypeBuilder::interface("Samples", "IBase")
            .method(MethodBuilder::new("A"))
            .build(&registry)
            .unwrap();
        let left = TypeBuilder::interface("Samples", "ILeft")
            .implements(&base)
            .build(&registry)
            .unwrap();
        let right = TypeBuilder::interface("Samples", "IRight")
            .implements(&base)
            .build(&registry)
            .unwrap();
        let both = TypeBuilder::interface("Samples", "IBoth")
            .implements(&left)
            .implements(&right)
            .build(&registry)
            .unwrap();

        let all = both.all_interfaces(DEFAULT_MAX_DEPTH).unwrap();
        let names: Vec<String> = all.iter().map(|t| t.fullname()).collect();
        assert_eq!(names, vec!["Samples.ILeft", "Samples.IBase", "Samples.IRight"]);
        assert!(both.implements(&base));
        assert!(!base.implements(&both));
    }

    #[test]
    fn test_interface_depth_limit() {
        let registry = TypeRegistry::new().unwrap();
        let mut current = TypeBuilder::interface("Samples", "I0")
            .build(&registry)
            .unwrap();
        for depth in 1..5 {
            current = TypeBuilder::interface("Samples", format!("I{}", depth))
                .implements(&current)
                .build(&registry)
                .unwrap();
        }

        assert_eq!(current.all_interfaces(8).unwrap().len(), 4);
        assert!(matches!(
            current.all_interfaces(2),
            Err(Error::RecursionLimit(2))
        ));
    }

    #[test]
    fn test_class_hierarchy_and_assignability() {
        let registry = TypeRegistry::new().unwrap();
        let iface = TypeBuilder::interface("Samples", "IRunner")
            .method(MethodBuilder::new("Run"))
            .build(&registry)
            .unwrap();
        let base = TypeBuilder::class("Samples", "RunnerBase")
            .implements(&iface)
            .method(MethodBuilder::new("Run").make_virtual())
            .build(&registry)
            .unwrap();
        let derived = TypeBuilder::class("Samples", "Runner")
            .extends(&base)
            .build(&registry)
            .unwrap();

        let chain: Vec<String> = derived.hierarchy().iter().map(|t| t.fullname()).collect();
        assert_eq!(chain, vec!["Samples.Runner", "Samples.RunnerBase", "System.Object"]);
        assert!(derived.is_assignable_to(&iface));
        assert!(derived.is_assignable_to(&base));
        assert!(!base.is_assignable_to(&derived));

        let implementation = derived.find_implementation(&iface.methods[0]).unwrap();
        assert_eq!(implementation.token, base.methods[0].token);
    }

    #[test]
    fn test_explicit_implementation_wins() {
        let registry = TypeRegistry::new().unwrap();
        let iface = TypeBuilder::interface("Samples", "IRunner")
            .method(MethodBuilder::new("Run"))
            .build(&registry)
            .unwrap();
        let class = TypeBuilder::class("Samples", "Runner")
            .implements(&iface)
            .method(MethodBuilder::new("Run"))
            .explicit_impl(&iface.methods[0], MethodBuilder::new("Run"))
            .build(&registry)
            .unwrap();

        let implementation = class.find_implementation(&iface.methods[0]).unwrap();
        assert_eq!(implementation.name, "Samples.IRunner.Run");
        assert!(implementation.access.is_private());
    }

    #[test]
    fn test_module_trust() {
        let module = Module::with_friends("Samples", &["DynamicProxyGenAssembly2"]);
        assert!(module.trusts("DynamicProxyGenAssembly2"));
        assert!(module.trusts("Samples"));
        assert!(!module.trusts("Other"));
    }

    #[test]
    fn test_construct() {
        let registry = TypeRegistry::new().unwrap();
        let int32 = registry.primitive(CorePrimitive::Int32);
        let counter = TypeBuilder::class("Samples", "Counter")
            .constructor(
                vec![Parameter {
                    name: "start".to_string(),
                    sig: TypeSig::of(&int32),
                    mode: crate::metadata::method::ParamMode::In,
                }],
                |args| {
                    let start = args[0].as_i32().unwrap_or_default();
                    Ok(Arc::new(start) as Arc<dyn Any + Send + Sync>)
                },
            )
            .build(&registry)
            .unwrap();

        let instance = counter.construct(&[Value::I32(7)]).unwrap();
        assert_eq!(instance.downcast::<i32>(), Some(&7));
        assert!(matches!(
            counter.construct(&[]),
            Err(Error::ArgumentCount { expected: 1, actual: 0, .. })
        ));
    }
}
