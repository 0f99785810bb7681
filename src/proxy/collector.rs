//! Member collection.
//!
//! The collector walks a contract and decides, member by member, whether a proxy can
//! intercept it. Members that can not be intercepted are excluded without failing the
//! request; the exclusion is logged and, when enabled, recorded as a diagnostic.
//!
//! # Screening Order
//!
//! A method is rejected as soon as one of these rules applies:
//!
//! 1. it is sealed
//! 2. it is assembly-internal and the scope's [`InternalsPolicy`] does not allow it
//! 3. on class proxies, it is not virtual (the hook is notified unless the method is
//!    declared on an excluded root)
//! 4. it is private
//! 5. it is declared on `System.Object` or `System.MarshalByRefObject`
//! 6. the hook rejects it
//!
//! Properties and events are collected before plain methods and surface when at
//! least one of their accessors passes. Accessors are never screened twice.

use std::collections::HashSet;

use strum::Display;

use crate::{
    metadata::{
        diagnostics::{DiagnosticCategory, Diagnostic, DiagnosticSeverity, Diagnostics},
        method::MethodRc,
        token::Token,
        typesystem::{hash::SignatureSet, ManagedTypeRc},
    },
    proxy::{
        config::{InternalsPolicy, ScopeConfig},
        hook::ProxyGenerationHook,
    },
    Result,
};

/// Kind of a proxied member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum MemberKind {
    /// A plain method
    Method,
    /// A property; its accessors are the proxied methods
    Property,
    /// An event; its accessors are the proxied methods
    Event,
}

/// Who provides the members of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Contributor {
    /// The proxied contract, backed by the target or the proxied class
    Primary,
    /// The mixin at the given position
    Mixin(usize),
    /// An additional interface nothing implements
    Standalone,
}

/// Where implementations of the collected members come from.
#[derive(Debug, Clone, Copy)]
pub enum Backing<'a> {
    /// Nothing implements the members
    None,
    /// Instances of the given type; implementations are resolved through its
    /// implementation map
    Target(&'a ManagedTypeRc),
    /// The proxied class implements its own members
    Base,
    /// The target can change at run time; implementations are resolved per call
    Dynamic,
}

/// The implementation a proxied method forwards to.
#[derive(Debug, Clone)]
pub enum Implementation {
    /// A method known at generation time
    Resolved(MethodRc),
    /// Resolved against the current target on every call
    Dynamic,
    /// No implementation; interceptors must produce the result
    Missing,
}

/// A method the proxy intercepts.
#[derive(Debug, Clone)]
pub struct MethodToGenerate {
    /// The intercepted method
    pub method: MethodRc,
    /// The contract the method was collected from
    pub contract: ManagedTypeRc,
    /// Who provides the method
    pub contributor: Contributor,
    /// What the method forwards to
    pub implementation: Implementation,
}

impl MethodToGenerate {
    /// Returns true if the method can forward to an implementation
    #[must_use]
    pub fn has_target(&self) -> bool {
        !matches!(self.implementation, Implementation::Missing)
    }
}

/// A member of the generated proxy: a method, or a property or event with its
/// intercepted accessors.
#[derive(Debug, Clone)]
pub struct MemberToGenerate {
    /// Member kind
    pub kind: MemberKind,
    /// Member name
    pub name: String,
    /// Token of the method, property or event
    pub token: Token,
    /// The intercepted methods; a single one for [`MemberKind::Method`]
    pub methods: Vec<MethodToGenerate>,
}

enum Screening {
    Accepted,
    Rejected,
}

/// Walks contracts and selects the members a proxy intercepts.
pub struct MemberCollector<'a> {
    config: &'a ScopeConfig,
    hook: &'a dyn ProxyGenerationHook,
    diagnostics: Option<&'a Diagnostics>,
    checked: HashSet<Token>,
}

impl<'a> MemberCollector<'a> {
    /// Creates a collector.
    ///
    /// `diagnostics` receives member exclusions; pass `None` to only log them.
    pub fn new(
        config: &'a ScopeConfig,
        hook: &'a dyn ProxyGenerationHook,
        diagnostics: Option<&'a Diagnostics>,
    ) -> Self {
        Self {
            config,
            hook,
            diagnostics,
            checked: HashSet::new(),
        }
    }

    /// Collects the members of a contract.
    ///
    /// For interfaces every transitively inherited interface is included. For classes
    /// the base chain is walked, the most derived override wins, and only virtual
    /// members are accepted.
    ///
    /// # Errors
    /// Returns [`crate::Error::RecursionLimit`] if the interface hierarchy is deeper than
    /// the scope allows.
    pub fn collect(
        &mut self,
        contract: &ManagedTypeRc,
        contributor: Contributor,
        backing: Backing<'_>,
    ) -> Result<Vec<MemberToGenerate>> {
        let only_virtual = contract.is_class();
        let types = if contract.is_interface() {
            let mut types = vec![contract.clone()];
            types.extend(contract.all_interfaces(self.config.max_interface_depth)?);
            types
        } else {
            contract.hierarchy()
        };

        Ok(self.collect_from(contract, &types, contributor, backing, only_virtual))
    }

    /// Collects the members declared directly on a mixin interface.
    ///
    /// Inherited interfaces of a mixin occupy their own positions and are collected
    /// separately.
    pub fn collect_mixin(
        &mut self,
        interface: &ManagedTypeRc,
        position: usize,
        mixin_type: &ManagedTypeRc,
    ) -> Vec<MemberToGenerate> {
        self.collect_from(
            interface,
            std::slice::from_ref(interface),
            Contributor::Mixin(position),
            Backing::Target(mixin_type),
            false,
        )
    }

    fn collect_from(
        &mut self,
        contract: &ManagedTypeRc,
        types: &[ManagedTypeRc],
        contributor: Contributor,
        backing: Backing<'_>,
        only_virtual: bool,
    ) -> Vec<MemberToGenerate> {
        let mut members = Vec::new();
        // Most derived first; a base method overridden by one of these is skipped.
        let mut seen = SignatureSet::new();
        let overrides = contract.is_class();

        for ty in types {
            for property in &ty.properties {
                if overrides && members.iter().any(|m: &MemberToGenerate| {
                    m.kind == MemberKind::Property && m.name == property.name
                }) {
                    continue;
                }
                let accessors = property
                    .accessors()
                    .map(|accessor| Self::most_derived(contract, accessor, overrides))
                    .collect::<Vec<_>>();
                let accepted = self.screen_accessors(
                    contract,
                    &accessors,
                    contributor,
                    backing,
                    only_virtual,
                    &mut seen,
                    DiagnosticCategory::Property,
                );
                if !accepted.is_empty() {
                    members.push(MemberToGenerate {
                        kind: MemberKind::Property,
                        name: property.name.clone(),
                        token: property.token,
                        methods: accepted,
                    });
                }
            }

            for event in &ty.events {
                if overrides && members.iter().any(|m: &MemberToGenerate| {
                    m.kind == MemberKind::Event && m.name == event.name
                }) {
                    continue;
                }
                let accessors = event
                    .accessors()
                    .map(|accessor| Self::most_derived(contract, accessor, overrides))
                    .collect::<Vec<_>>();
                let accepted = self.screen_accessors(
                    contract,
                    &accessors,
                    contributor,
                    backing,
                    only_virtual,
                    &mut seen,
                    DiagnosticCategory::Event,
                );
                if !accepted.is_empty() {
                    members.push(MemberToGenerate {
                        kind: MemberKind::Event,
                        name: event.name.clone(),
                        token: event.token,
                        methods: accepted,
                    });
                }
            }
        }

        for ty in types {
            for method in &ty.methods {
                if method.is_static() || self.checked.contains(&method.token) {
                    continue;
                }
                if overrides && seen.contains(method) {
                    continue;
                }
                self.checked.insert(method.token);
                seen.insert(method);

                if let Screening::Accepted =
                    self.screen(contract, method, only_virtual, DiagnosticCategory::Method)
                {
                    members.push(MemberToGenerate {
                        kind: MemberKind::Method,
                        name: method.name.clone(),
                        token: method.token,
                        methods: vec![Self::to_generate(contract, method, contributor, backing)],
                    });
                }
            }
        }

        tracing::debug!(
            contract = %contract.fullname(),
            members = members.len(),
            "collected members"
        );
        members
    }

    fn most_derived(contract: &ManagedTypeRc, accessor: &MethodRc, overrides: bool) -> MethodRc {
        if overrides {
            contract
                .find_override(accessor)
                .unwrap_or_else(|| accessor.clone())
        } else {
            accessor.clone()
        }
    }

    fn screen_accessors(
        &mut self,
        contract: &ManagedTypeRc,
        accessors: &[MethodRc],
        contributor: Contributor,
        backing: Backing<'_>,
        only_virtual: bool,
        seen: &mut SignatureSet,
        category: DiagnosticCategory,
    ) -> Vec<MethodToGenerate> {
        let mut accepted = Vec::new();
        for accessor in accessors {
            if accessor.is_static() || !self.checked.insert(accessor.token) {
                continue;
            }
            seen.insert(accessor);
            if let Screening::Accepted = self.screen(contract, accessor, only_virtual, category) {
                accepted.push(Self::to_generate(contract, accessor, contributor, backing));
            }
        }
        accepted
    }

    fn to_generate(
        contract: &ManagedTypeRc,
        method: &MethodRc,
        contributor: Contributor,
        backing: Backing<'_>,
    ) -> MethodToGenerate {
        let implementation = match backing {
            Backing::None => Implementation::Missing,
            Backing::Dynamic => Implementation::Dynamic,
            Backing::Base if method.is_abstract() || method.body.is_none() => {
                Implementation::Missing
            }
            Backing::Base => Implementation::Resolved(method.clone()),
            Backing::Target(target) => match target
                .find_implementation(method)
                .filter(|implementation| !implementation.is_abstract())
            {
                Some(implementation) => Implementation::Resolved(implementation),
                // Targets that only claim the interface, such as other proxies,
                // are resolved per call
                None if method
                    .declaring_type()
                    .is_some_and(|owner| owner.is_interface() && target.implements(&owner)) =>
                {
                    Implementation::Dynamic
                }
                None => Implementation::Missing,
            },
        };

        MethodToGenerate {
            method: method.clone(),
            contract: contract.clone(),
            contributor,
            implementation,
        }
    }

    fn screen(
        &self,
        contract: &ManagedTypeRc,
        method: &MethodRc,
        only_virtual: bool,
        category: DiagnosticCategory,
    ) -> Screening {
        if method.is_final() {
            self.exclude(method, category, DiagnosticSeverity::Info, "it is sealed");
            return Screening::Rejected;
        }

        if method.access.is_assembly() && !self.internals_visible(method) {
            self.exclude(
                method,
                category,
                DiagnosticSeverity::Info,
                "it is internal and not visible to the proxy module",
            );
            return Screening::Rejected;
        }

        let on_root = Self::declared_on_root(method);

        if only_virtual && !method.is_virtual() {
            if !on_root {
                self.exclude(
                    method,
                    category,
                    DiagnosticSeverity::Warning,
                    "it is not virtual; calls will not be intercepted",
                );
                self.hook.non_proxyable_member_notification(contract, method);
            }
            return Screening::Rejected;
        }

        if method.access.is_private() {
            self.exclude(method, category, DiagnosticSeverity::Info, "it is private");
            return Screening::Rejected;
        }

        if on_root {
            tracing::trace!(method = %method.full_name(), "skipping root member");
            return Screening::Rejected;
        }

        if !self.hook.should_intercept_method(contract, method) {
            tracing::trace!(method = %method.full_name(), "rejected by hook");
            return Screening::Rejected;
        }

        Screening::Accepted
    }

    fn declared_on_root(method: &MethodRc) -> bool {
        method.declaring_type().is_some_and(|ty| {
            let name = ty.fullname();
            name == "System.Object" || name == "System.MarshalByRefObject"
        })
    }

    fn internals_visible(&self, method: &MethodRc) -> bool {
        match self.config.internals {
            InternalsPolicy::Never => false,
            InternalsPolicy::Always => true,
            InternalsPolicy::TrustedModules => method
                .declaring_type()
                .is_some_and(|ty| ty.module.trusts(&self.config.module_name)),
        }
    }

    fn exclude(
        &self,
        method: &MethodRc,
        category: DiagnosticCategory,
        severity: DiagnosticSeverity,
        reason: &str,
    ) {
        tracing::trace!(method = %method.full_name(), reason, "excluding member");
        if !self.config.record_diagnostics {
            return;
        }
        if let Some(diagnostics) = self.diagnostics {
            diagnostics.record(Diagnostic::excluded(
                severity,
                category,
                &method.full_name(),
                method.token,
                reason,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{
            method::{MethodBuilder, TypeSig},
            typesystem::{PropertyBuilder, TypeBuilder},
        },
        proxy::hook::{AllMethodsHook, FilterHook},
        test::{MixinFixture, ServiceFixture},
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn names(members: &[MemberToGenerate]) -> Vec<String> {
        members.iter().map(|m| m.name.clone()).collect()
    }

    #[test]
    fn test_interface_members_properties_first() {
        let fx = ServiceFixture::new();
        let config = ScopeConfig::default();
        let mut collector = MemberCollector::new(&config, &AllMethodsHook, None);

        let members = collector
            .collect(&fx.calculator_iface, Contributor::Primary, Backing::Target(&fx.calculator))
            .unwrap();

        assert_eq!(
            names(&members),
            vec!["Total", "Changed", "Add", "TryParse", "Swap", "Echo"]
        );
        assert_eq!(members[0].kind, MemberKind::Property);
        assert_eq!(members[0].methods.len(), 2);
        assert_eq!(members[1].kind, MemberKind::Event);
        assert!(members.iter().flat_map(|m| &m.methods).all(MethodToGenerate::has_target));
    }

    #[test]
    fn test_class_members_screening() {
        let fx = ServiceFixture::new();
        let config = ScopeConfig::default();
        let diagnostics = Diagnostics::new();
        let mut collector = MemberCollector::new(&config, &AllMethodsHook, Some(&diagnostics));

        let members = collector
            .collect(&fx.service, Contributor::Primary, Backing::Base)
            .unwrap();

        // Helper is non-virtual, Audit internal, Secret private, Locked sealed,
        // Create static; Object members are excluded roots.
        assert_eq!(names(&members), vec!["Name", "Greet", "OnGreet"]);
        let warnings: Vec<_> = diagnostics.at_least(DiagnosticSeverity::Warning).collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("Helper"));
        assert!(diagnostics.iter().any(|d| d.message.contains("Audit")));
        assert!(diagnostics.iter().any(|d| d.message.contains("Locked")));
        assert!(diagnostics.iter().all(|d| !d.message.contains("GetType")));
    }

    #[test]
    fn test_internals_policy() {
        let fx = ServiceFixture::new();
        let config = ScopeConfig::permissive();
        let mut collector = MemberCollector::new(&config, &AllMethodsHook, None);
        let members = collector
            .collect(&fx.service, Contributor::Primary, Backing::Base)
            .unwrap();
        assert!(names(&members).contains(&"Audit".to_string()));

        let registry = &fx.registry;
        let friendly = crate::metadata::typesystem::Module::with_friends(
            "Samples.Friendly",
            &[crate::proxy::config::DEFAULT_PROXY_MODULE],
        );
        let trusting = TypeBuilder::class("Samples", "Trusting")
            .module(&friendly)
            .method(MethodBuilder::new("Work").internal().make_virtual())
            .build(registry)
            .unwrap();

        let config = ScopeConfig::default();
        let mut collector = MemberCollector::new(&config, &AllMethodsHook, None);
        let members = collector
            .collect(&trusting, Contributor::Primary, Backing::Base)
            .unwrap();
        assert_eq!(names(&members), vec!["Work"]);

        let config = ScopeConfig::strict();
        let mut collector = MemberCollector::new(&config, &AllMethodsHook, None);
        let members = collector
            .collect(&trusting, Contributor::Primary, Backing::Base)
            .unwrap();
        assert!(members.is_empty());
    }

    #[test]
    fn test_non_proxyable_notification() {
        struct Counting(AtomicUsize);
        impl ProxyGenerationHook for Counting {
            fn should_intercept_method(&self, _: &ManagedTypeRc, _: &MethodRc) -> bool {
                true
            }
            fn non_proxyable_member_notification(&self, _: &ManagedTypeRc, method: &MethodRc) {
                assert_eq!(method.name, "Helper");
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let fx = ServiceFixture::new();
        let config = ScopeConfig::default();
        let hook = Counting(AtomicUsize::new(0));
        let mut collector = MemberCollector::new(&config, &hook, None);
        collector
            .collect(&fx.service, Contributor::Primary, Backing::Base)
            .unwrap();

        assert_eq!(hook.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_most_derived_override_wins() {
        let fx = ServiceFixture::new();
        let derived = TypeBuilder::class("Samples", "LoudService")
            .extends(&fx.service)
            .method(
                MethodBuilder::new("Greet")
                    .make_virtual()
                    .param("name", crate::metadata::method::TypeSig::of(&fx.string))
                    .returns(crate::metadata::method::TypeSig::of(&fx.string)),
            )
            .build(&fx.registry)
            .unwrap();

        let config = ScopeConfig::default();
        let mut collector = MemberCollector::new(&config, &AllMethodsHook, None);
        let members = collector
            .collect(&derived, Contributor::Primary, Backing::Base)
            .unwrap();

        let greets: Vec<&MemberToGenerate> = members.iter().filter(|m| m.name == "Greet").collect();
        assert_eq!(greets.len(), 1);
        assert_eq!(greets[0].token, derived.methods[0].token);
        // No body on the override
        assert!(!greets[0].methods[0].has_target());
    }

    #[test]
    fn test_abstract_members_are_target_less() {
        let fx = ServiceFixture::new();
        let config = ScopeConfig::default();
        let mut collector = MemberCollector::new(&config, &AllMethodsHook, None);
        let members = collector
            .collect(&fx.service_base, Contributor::Primary, Backing::Base)
            .unwrap();

        let compute = members.iter().find(|m| m.name == "Compute").unwrap();
        let describe = members.iter().find(|m| m.name == "Describe").unwrap();
        assert!(!compute.methods[0].has_target());
        assert!(describe.methods[0].has_target());
    }

    #[test]
    fn test_hook_filters_accessors() {
        let fx = ServiceFixture::new();
        let config = ScopeConfig::default();
        let hook = FilterHook::new(|_: &ManagedTypeRc, m: &MethodRc| m.name != "set_Total");
        let mut collector = MemberCollector::new(&config, &hook, None);
        let members = collector
            .collect(&fx.calculator_iface, Contributor::Primary, Backing::None)
            .unwrap();

        let total = members.iter().find(|m| m.name == "Total").unwrap();
        assert_eq!(total.methods.len(), 1);
        assert_eq!(total.methods[0].method.name, "get_Total");
        assert!(!total.methods[0].has_target());
    }

    #[test]
    fn test_let_prefix_is_an_ordinary_method() {
        let fx = ServiceFixture::new();
        let int32 = TypeSig::of(&fx.int32);
        let settings = TypeBuilder::interface("Samples", "ISettings")
            .property(PropertyBuilder::new("Value", int32.clone()).read_write())
            .method(MethodBuilder::new("let_Value").param("value", int32.clone()).special_name())
            .method(MethodBuilder::new("let_Other").param("value", int32))
            .build(&fx.registry)
            .unwrap();
        let config = ScopeConfig::default();
        let mut collector = MemberCollector::new(&config, &AllMethodsHook, None);

        let members = collector
            .collect(&settings, Contributor::Primary, Backing::None)
            .unwrap();

        assert_eq!(names(&members), vec!["Value", "let_Value", "let_Other"]);
        let value = &members[0];
        assert_eq!(value.kind, MemberKind::Property);
        let accessors: Vec<&str> = value.methods.iter().map(|m| m.method.name.as_str()).collect();
        assert_eq!(accessors, vec!["get_Value", "set_Value"]);
        assert!(members[1..].iter().all(|m| m.kind == MemberKind::Method));
    }

    #[test]
    fn test_mixin_members_declared_only() {
        let fx = MixinFixture::new();
        let config = ScopeConfig::default();
        let mut collector = MemberCollector::new(&config, &AllMethodsHook, None);

        let members = collector.collect_mixin(&fx.first, 2, &fx.complex_type);
        assert_eq!(names(&members), vec!["First"]);
        assert_eq!(members[0].methods[0].contributor, Contributor::Mixin(2));
        assert!(members[0].methods[0].has_target());
    }
}
