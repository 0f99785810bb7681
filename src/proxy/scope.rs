//! The proxy type cache and naming scope.
//!
//! A [`ProxyScope`] owns everything that lives as long as generated proxy types do:
//! the cache mapping [`ProxyIdentity`] to generated types, the set of names already
//! handed out, and the diagnostics recorded during generation.
//!
//! # Locking
//!
//! Lookups dominate, so the cache is guarded by a reader-writer lock. A lookup first
//! probes under a shared lock. On a miss it takes an upgradable read lock, which only
//! one thread can hold at a time, probes again, generates, and upgrades to an exclusive
//! lock for the insert. Two threads asking for the same shape therefore never produce
//! two distinct types, while plain lookups of other shapes proceed during generation.

use std::{collections::HashMap, fmt};

use dashmap::DashSet;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use crate::{
    metadata::diagnostics::Diagnostics,
    proxy::{activation::ProxyTypeRc, config::ScopeConfig, identity::ProxyIdentity},
    Result,
};

/// Hands out unique names.
///
/// The first request for a name gets it unchanged; later requests get `_1`, `_2`, ...
/// suffixes.
#[derive(Debug, Default)]
pub struct NamingScope {
    names: DashSet<String>,
}

impl NamingScope {
    /// Creates an empty scope
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a name based on `suggested` that this scope never handed out before.
    pub fn unique_name(&self, suggested: &str) -> String {
        self.unique_name_where(suggested, |_| false)
    }

    /// Like [`NamingScope::unique_name`], additionally skipping names for which `taken`
    /// returns true.
    pub fn unique_name_where(&self, suggested: &str, taken: impl Fn(&str) -> bool) -> String {
        if !taken(suggested) && self.names.insert(suggested.to_string()) {
            return suggested.to_string();
        }

        let mut counter = 1_usize;
        loop {
            let candidate = format!("{}_{}", suggested, counter);
            if !taken(&candidate) && self.names.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Gives a name back so it can be handed out again. Returns false if the name was
    /// never handed out.
    pub fn release(&self, name: &str) -> bool {
        self.names.remove(name).is_some()
    }

    /// A fresh, independent scope, e.g. for the invocation names of one proxy type
    #[must_use]
    pub fn sub_scope(&self) -> NamingScope {
        NamingScope::new()
    }

    /// Number of names handed out
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if no name was handed out
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Owner of generated proxy types.
///
/// Share a scope between generators with an `Arc`; the cache keeps generated types
/// alive as long as the scope. The `Proxies.*` classes registered for them belong to
/// the [`TypeRegistry`](crate::metadata::typesystem::TypeRegistry) and stay resolvable
/// until the registry is dropped, even after their scope is gone.
pub struct ProxyScope {
    config: ScopeConfig,
    cache: RwLock<HashMap<ProxyIdentity, ProxyTypeRc>>,
    naming: NamingScope,
    diagnostics: Diagnostics,
}

impl ProxyScope {
    /// Creates a scope with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ScopeConfig::default())
    }

    /// Creates a scope with the given configuration
    #[must_use]
    pub fn with_config(config: ScopeConfig) -> Self {
        Self {
            config,
            cache: RwLock::new(HashMap::new()),
            naming: NamingScope::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// The scope configuration
    #[must_use]
    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    /// Names handed out to proxy types
    #[must_use]
    pub fn naming(&self) -> &NamingScope {
        &self.naming
    }

    /// Diagnostics recorded while generating proxy types
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Looks up a cached proxy type
    #[must_use]
    pub fn lookup(&self, identity: &ProxyIdentity) -> Option<ProxyTypeRc> {
        self.cache.read().get(identity).cloned()
    }

    /// Stores a proxy type, returning the one it replaced
    pub fn insert(&self, identity: ProxyIdentity, proxy_type: ProxyTypeRc) -> Option<ProxyTypeRc> {
        self.cache.write().insert(identity, proxy_type)
    }

    /// Returns the cached type for `identity`, generating it with `factory` on a miss.
    ///
    /// `factory` runs at most once per identity. If it fails nothing is cached.
    ///
    /// # Errors
    /// Returns the error of `factory`.
    pub fn obtain<F>(&self, identity: ProxyIdentity, factory: F) -> Result<ProxyTypeRc>
    where
        F: FnOnce() -> Result<ProxyTypeRc>,
    {
        if let Some(cached) = self.lookup(&identity) {
            tracing::debug!(proxy = %identity, "proxy type cache hit");
            return Ok(cached);
        }

        let guard = self.cache.upgradable_read();
        if let Some(cached) = guard.get(&identity) {
            tracing::debug!(proxy = %identity, "proxy type generated concurrently");
            return Ok(cached.clone());
        }

        tracing::debug!(proxy = %identity, "proxy type cache miss, generating");
        let generated = factory()?;

        let mut cache = RwLockUpgradableReadGuard::upgrade(guard);
        cache.insert(identity, generated.clone());
        Ok(generated)
    }

    /// Number of cached proxy types
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Returns true if no proxy type was generated yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    /// All cached proxy types
    #[must_use]
    pub fn proxy_types(&self) -> Vec<ProxyTypeRc> {
        self.cache.read().values().cloned().collect()
    }
}

impl Default for ProxyScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProxyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyScope")
            .field("config", &self.config)
            .field("cached", &self.len())
            .field("diagnostics", &self.diagnostics.len())
            .finish()
    }
}
