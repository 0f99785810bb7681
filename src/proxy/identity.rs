//! Proxy identity, the key of the proxy type cache.
//!
//! Two requests produce the same proxy type exactly when their identities are equal:
//! same flavor, same contract, same target type, the same extra interfaces in the same
//! order, and equal [`OptionsIdentity`].

use std::fmt;

use strum::Display;

use crate::{
    metadata::typesystem::{ManagedTypeRc, TypeKey},
    proxy::options::OptionsIdentity,
};

/// The kind of proxy being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ProxyFlavor {
    /// Interface proxy forwarding to a target of a fixed type
    InterfaceWithTarget,
    /// Interface proxy without a target; interceptors produce every result
    InterfaceWithoutTarget,
    /// Interface proxy whose target is only known by the interface and can be swapped
    InterfaceWithTargetInterface,
    /// Subclass of a non-sealed class; the class itself is the implementation
    Class,
}

impl ProxyFlavor {
    /// Returns true for flavors whose instances carry a target
    #[must_use]
    pub fn has_target(self) -> bool {
        matches!(
            self,
            ProxyFlavor::InterfaceWithTarget | ProxyFlavor::InterfaceWithTargetInterface
        )
    }

    /// Returns true if the target of a running invocation or of the proxy may be
    /// replaced
    #[must_use]
    pub fn allows_target_change(self) -> bool {
        self == ProxyFlavor::InterfaceWithTargetInterface
    }
}

/// Canonical key of a proxy generation request.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ProxyIdentity {
    flavor: ProxyFlavor,
    contract: TypeKey,
    target_type: Option<TypeKey>,
    extra_interfaces: Vec<TypeKey>,
    options: OptionsIdentity,
}

impl ProxyIdentity {
    /// Builds the identity of a request.
    ///
    /// Extra interfaces are compared positionally; callers wanting order-independent
    /// caching have to pass them in a canonical order.
    #[must_use]
    pub fn new(
        flavor: ProxyFlavor,
        contract: &ManagedTypeRc,
        target_type: Option<&ManagedTypeRc>,
        extra_interfaces: &[ManagedTypeRc],
        options: OptionsIdentity,
    ) -> Self {
        Self {
            flavor,
            contract: TypeKey::from(contract),
            target_type: target_type.map(TypeKey::from),
            extra_interfaces: extra_interfaces.iter().map(TypeKey::from).collect(),
            options,
        }
    }

    /// The proxy flavor
    #[must_use]
    pub fn flavor(&self) -> ProxyFlavor {
        self.flavor
    }

    /// The proxied contract
    #[must_use]
    pub fn contract(&self) -> &ManagedTypeRc {
        self.contract.ty()
    }

    /// The target type, for proxies bound to one
    #[must_use]
    pub fn target_type(&self) -> Option<&ManagedTypeRc> {
        self.target_type.as_ref().map(TypeKey::ty)
    }

    /// The options part of the identity
    #[must_use]
    pub fn options(&self) -> &OptionsIdentity {
        &self.options
    }
}

impl fmt::Debug for ProxyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyIdentity")
            .field("flavor", &self.flavor)
            .field("contract", &self.contract)
            .field("target_type", &self.target_type)
            .field("extra_interfaces", &self.extra_interfaces)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ProxyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} proxy of {}", self.flavor, self.contract.ty().fullname())?;
        if let Some(target) = &self.target_type {
            write!(f, " for {}", target.ty().fullname())?;
        }
        if !self.extra_interfaces.is_empty() {
            let names: Vec<String> = self
                .extra_interfaces
                .iter()
                .map(|key| key.ty().fullname())
                .collect();
            write!(f, " + [{}]", names.join(", "))?;
        }
        Ok(())
    }
}
