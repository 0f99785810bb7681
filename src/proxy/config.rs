//! Configuration of a proxy scope
//!
//! This module provides the settings that apply to every proxy generated within one
//! [`ProxyScope`](crate::proxy::ProxyScope): the name of the module generated types
//! live in, which non-public members may be intercepted, and the limits applied
//! while walking type hierarchies.

use crate::metadata::typesystem::DEFAULT_MAX_DEPTH;

/// Name of the module proxy types are generated into unless configured otherwise.
///
/// Types that want their internal members intercepted list this name as a friend
/// module.
pub const DEFAULT_PROXY_MODULE: &str = "DynamicProxyGenAssembly2";

/// Which assembly-internal members can be intercepted.
///
/// `protected` members of class proxies are always interceptable and `private`
/// members never are; this policy decides the `internal` ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum InternalsPolicy {
    /// Never intercept internal members
    Never,
    /// Intercept internal members whose declaring module trusts the proxy module
    TrustedModules,
    /// Intercept all internal members
    Always,
}

/// Configuration for a proxy scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeConfig {
    /// Module the generated proxy types belong to
    pub module_name: String,

    /// Handling of assembly-internal members
    pub internals: InternalsPolicy,

    /// Maximum depth of interface inheritance walked during generation (default: 64)
    pub max_interface_depth: usize,

    /// Record member exclusions in the scope's diagnostics
    pub record_diagnostics: bool,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            module_name: DEFAULT_PROXY_MODULE.to_string(),
            internals: InternalsPolicy::TrustedModules,
            max_interface_depth: DEFAULT_MAX_DEPTH,
            record_diagnostics: true,
        }
    }
}

impl ScopeConfig {
    /// Creates a configuration that only intercepts members visible to everybody
    /// and subclasses
    #[must_use]
    pub fn strict() -> Self {
        Self {
            internals: InternalsPolicy::Never,
            ..Self::default()
        }
    }

    /// Creates a configuration that intercepts internal members regardless of trust
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            internals: InternalsPolicy::Always,
            ..Self::default()
        }
    }

    /// Creates a configuration for maximum throughput: no diagnostics are recorded
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            record_diagnostics: false,
            ..Self::default()
        }
    }

    /// Sets the proxy module name
    #[must_use]
    pub fn with_module_name(mut self, module_name: impl Into<String>) -> Self {
        self.module_name = module_name.into();
        self
    }
}
