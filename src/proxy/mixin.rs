//! Mixin composition.
//!
//! Mixins contribute additional interface implementations to a proxy. Every
//! interface a mixin instance implements (including inherited ones) becomes one
//! entry; entries are sorted by interface name so the order mixins were added in never
//! affects the generated proxy type. An interface may be contributed by at most one
//! mixin.
//!
//! A mixin that implements three interfaces occupies three positions, one per
//! interface, all referring to the same instance.

use std::{cmp::Ordering, collections::HashSet};

use crate::{
    metadata::{
        typesystem::{ManagedTypeRc, TypeKey},
        value::ObjectRef,
    },
    Error, Result,
};

/// One interface contributed by a mixin instance.
#[derive(Clone, Debug)]
pub struct MixinEntry {
    /// The contributed interface
    pub interface: ManagedTypeRc,
    /// The instance implementing it
    pub instance: ObjectRef,
}

fn sort_key(ty: &ManagedTypeRc) -> (String, String) {
    (ty.fullname(), ty.module.name.clone())
}

/// Canonical, order-independent set of mixins.
#[derive(Clone, Debug, Default)]
pub struct MixinData {
    entries: Vec<MixinEntry>,
}

impl MixinData {
    /// Composes mixin instances.
    ///
    /// Instances whose type implements no interface are ignored.
    ///
    /// # Errors
    /// Returns [`Error::MixinCollision`] if two instances contribute the same
    /// interface, or [`Error::RecursionLimit`] if an interface hierarchy is deeper
    /// than `max_depth`.
    pub fn new(mixins: &[ObjectRef], max_depth: usize) -> Result<Self> {
        let mut entries: Vec<MixinEntry> = Vec::new();

        for mixin in mixins {
            let interfaces = mixin.ty().all_interfaces(max_depth)?;
            if interfaces.is_empty() {
                tracing::debug!(
                    mixin = %mixin.ty().fullname(),
                    "ignoring mixin without interfaces"
                );
                continue;
            }

            for interface in interfaces {
                if let Some(existing) = entries
                    .iter()
                    .find(|e| e.interface.token == interface.token)
                {
                    return Err(Error::MixinCollision {
                        interface: interface.fullname(),
                        first: existing.instance.ty().fullname(),
                        second: mixin.ty().fullname(),
                    });
                }
                entries.push(MixinEntry {
                    interface,
                    instance: mixin.clone(),
                });
            }
        }

        entries.sort_by(|a, b| match sort_key(&a.interface).cmp(&sort_key(&b.interface)) {
            Ordering::Equal => a.interface.token.cmp(&b.interface.token),
            other => other,
        });

        Ok(MixinData { entries })
    }

    /// Checks that no mixin interface collides with the proxied contract or with an
    /// explicitly requested extra interface, directly or through inheritance.
    ///
    /// # Errors
    /// Returns [`Error::MixinInterfaceConflict`] naming the first colliding interface.
    pub fn validate_against(
        &self,
        contract: &ManagedTypeRc,
        extra_interfaces: &[ManagedTypeRc],
        max_depth: usize,
    ) -> Result<()> {
        let mut claimed: Vec<(ManagedTypeRc, String)> = Vec::new();

        if contract.is_interface() {
            claimed.push((contract.clone(), format!("the proxied interface {}", contract.fullname())));
        }
        for inherited in contract.all_interfaces(max_depth)? {
            claimed.push((inherited, format!("the proxied type {}", contract.fullname())));
        }
        for extra in extra_interfaces {
            claimed.push((extra.clone(), format!("the additional interface {}", extra.fullname())));
            for inherited in extra.all_interfaces(max_depth)? {
                claimed.push((inherited, format!("the additional interface {}", extra.fullname())));
            }
        }

        let mut seen = HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.interface.token) {
                continue;
            }
            if let Some((_, owner)) = claimed
                .iter()
                .find(|(iface, _)| iface.token == entry.interface.token)
            {
                return Err(Error::MixinInterfaceConflict {
                    mixin: entry.instance.ty().fullname(),
                    interface: entry.interface.fullname(),
                    conflict: owner.clone(),
                });
            }
        }
        Ok(())
    }

    /// All entries in canonical order
    #[must_use]
    pub fn entries(&self) -> &[MixinEntry] {
        &self.entries
    }

    /// The contributed interfaces in canonical order
    pub fn interfaces(&self) -> impl Iterator<Item = &ManagedTypeRc> {
        self.entries.iter().map(|e| &e.interface)
    }

    /// The instance of every position, in canonical order
    #[must_use]
    pub fn instances(&self) -> Vec<ObjectRef> {
        self.entries.iter().map(|e| e.instance.clone()).collect()
    }

    /// Returns true if a mixin contributes `interface`
    #[must_use]
    pub fn contains(&self, interface: &ManagedTypeRc) -> bool {
        self.position_of(interface).is_some()
    }

    /// The position of the mixin contributing `interface`
    #[must_use]
    pub fn position_of(&self, interface: &ManagedTypeRc) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.interface.token == interface.token)
    }

    /// Number of positions
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no mixin contributes an interface
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The comparable shape of the mixins: each position's interface and mixin type.
    ///
    /// Instances do not take part; two sets of mixins of the same types are equal.
    #[must_use]
    pub fn identity(&self) -> Vec<(TypeKey, TypeKey)> {
        self.entries
            .iter()
            .map(|e| (TypeKey::from(&e.interface), TypeKey::from(e.instance.ty())))
            .collect()
    }
}
