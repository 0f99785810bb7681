//! Invocation descriptors.
//!
//! For every intercepted method the generator builds an [`InvocationDescriptor`]: where
//! the call forwards to, how the proxied method's generic parameters map onto the
//! implementation's, which arguments are passed by reference, and whether the target
//! may be swapped at run time. Descriptors are immutable and shared by every
//! invocation of the method.

use std::fmt;

use crate::{
    metadata::{
        method::{MethodRc, ParamMode, TypeSig},
        typesystem::ManagedTypeRc,
    },
    proxy::{
        collector::{Contributor, Implementation, MethodToGenerate},
        identity::ProxyFlavor,
    },
    Error, Result,
};

/// Where a proxied call forwards to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetField {
    /// The proxy's target
    Primary,
    /// The mixin instance at the given position
    Mixin(usize),
    /// The proxy's own base class implementation
    ProxyBase,
    /// Nothing
    None,
}

/// The method a proxied call forwards to.
#[derive(Debug, Clone)]
pub enum Callback {
    /// Fixed at generation time
    Resolved(MethodRc),
    /// Looked up on the current target when the call forwards
    Dynamic,
    /// There is no implementation
    None,
}

/// Positional correspondence between a generic parameter of the proxied method and
/// one of the implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericMapping {
    /// Position of the parameter
    pub position: u16,
    /// Name on the proxied method
    pub proxied: String,
    /// Name on the implementation, unknown for dynamic callbacks
    pub callback: Option<String>,
}

/// A `ref` or `out` parameter whose value is written back after forwarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByRefSlot {
    /// Argument position
    pub index: usize,
    /// `Ref` or `Out`
    pub mode: ParamMode,
    /// Parameter type
    pub sig: TypeSig,
}

/// Forwarding metadata of one intercepted method.
#[derive(Clone)]
pub struct InvocationDescriptor {
    /// Unique name of the invocation, e.g. `ICalculator_Add`
    pub name: String,
    /// The intercepted method
    pub member: MethodRc,
    /// The contract the member was collected from
    pub contract: ManagedTypeRc,
    /// Who provides the member
    pub contributor: Contributor,
    /// Where the call forwards to
    pub target_field: TargetField,
    /// What the call forwards to
    pub callback: Callback,
    /// Generic parameter correspondence
    pub generic_parameters: Vec<GenericMapping>,
    /// By-reference parameters
    pub by_ref_slots: Vec<ByRefSlot>,
    /// Whether invocation and proxy targets may be replaced during the call
    pub can_change_target: bool,
}

impl InvocationDescriptor {
    /// Builds the descriptor of a collected method for a proxy of `flavor`.
    ///
    /// # Errors
    /// Returns [`Error::GenericArity`] if a resolved implementation does not have the
    /// generic arity of the proxied method.
    pub fn build(
        method: &MethodToGenerate,
        flavor: ProxyFlavor,
        name: impl Into<String>,
    ) -> Result<Self> {
        let member = &method.method;

        let target_field = match (method.contributor, flavor) {
            (Contributor::Mixin(position), _) => TargetField::Mixin(position),
            (Contributor::Standalone, _) | (_, ProxyFlavor::InterfaceWithoutTarget) => {
                TargetField::None
            }
            (Contributor::Primary, ProxyFlavor::Class) => TargetField::ProxyBase,
            (Contributor::Primary, _) => TargetField::Primary,
        };

        let callback = match (&method.implementation, target_field) {
            (_, TargetField::None) | (Implementation::Missing, _) => Callback::None,
            (Implementation::Dynamic, _) => Callback::Dynamic,
            (Implementation::Resolved(implementation), _) => {
                if implementation.generic_params.len() != member.generic_params.len() {
                    return Err(Error::GenericArity {
                        method: implementation.full_name(),
                        expected: member.generic_params.len(),
                        actual: implementation.generic_params.len(),
                    });
                }
                Callback::Resolved(implementation.clone())
            }
        };

        let generic_parameters = member
            .generic_params
            .iter()
            .enumerate()
            .map(|(position, proxied)| GenericMapping {
                position: u16::try_from(position).unwrap_or(u16::MAX),
                proxied: proxied.clone(),
                callback: match &callback {
                    Callback::Resolved(implementation) => {
                        implementation.generic_params.get(position).cloned()
                    }
                    _ => None,
                },
            })
            .collect();

        let by_ref_slots = member
            .params
            .iter()
            .enumerate()
            .filter(|(_, param)| param.mode.is_by_ref())
            .map(|(index, param)| ByRefSlot {
                index,
                mode: param.mode,
                sig: param.sig.clone(),
            })
            .collect();

        Ok(Self {
            name: name.into(),
            member: member.clone(),
            contract: method.contract.clone(),
            contributor: method.contributor,
            target_field,
            can_change_target: flavor.allows_target_change() && target_field == TargetField::Primary,
            callback,
            generic_parameters,
            by_ref_slots,
        })
    }

    /// Returns true if the call has nothing to forward to
    #[must_use]
    pub fn is_target_less(&self) -> bool {
        matches!(self.callback, Callback::None)
    }

    /// Display name of the member used in errors
    #[must_use]
    pub fn member_name(&self) -> String {
        self.member.full_name()
    }

    /// Closes the implementation's generic parameters over the type arguments of the
    /// proxied call.
    #[must_use]
    pub fn map_generic_arguments(&self, arguments: &[ManagedTypeRc]) -> Vec<ManagedTypeRc> {
        self.generic_parameters
            .iter()
            .filter_map(|mapping| arguments.get(usize::from(mapping.position)).cloned())
            .collect()
    }

    /// Fails with [`Error::NoTarget`] naming the member
    ///
    /// # Errors
    /// Always.
    pub fn no_target<T>(&self) -> Result<T> {
        Err(Error::NoTarget {
            method: self.member_name(),
        })
    }
}

impl fmt::Debug for InvocationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationDescriptor")
            .field("name", &self.name)
            .field("member", &self.member_name())
            .field("target_field", &self.target_field)
            .field("callback", &self.callback)
            .field("generic_parameters", &self.generic_parameters)
            .field("by_ref_slots", &self.by_ref_slots)
            .field("can_change_target", &self.can_change_target)
            .finish()
    }
}
