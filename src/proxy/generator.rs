//! The proxy generator, entry point for every proxy request.
//!
//! A request names the contract, any additional interfaces, the target (if the flavor
//! has one) and the [`GenerationOptions`]. The generator:
//!
//! 1. validates the request
//! 2. finalizes the options and composes the mixins
//! 3. computes the [`ProxyIdentity`] and asks the [`ProxyScope`] for the proxy type,
//!    generating it on a miss
//! 4. activates an instance, if an instance was requested
//!
//! Configuration errors surface in steps 1 and 2 and never populate the cache.
//!
//! # Examples
//!
//! ```rust,ignore
//! use proxyscope::prelude::*;
//!
//! let generator = ProxyGenerator::new(registry.clone());
//! let proxy = generator.create_interface_proxy_without_target(
//!     &calculator,
//!     &[],
//!     &GenerationOptions::default(),
//!     vec![Arc::new(answer_everything)],
//! )?;
//! assert_eq!(proxy.call("Add", &mut [Value::I32(1), Value::I32(2)])?, Value::I32(42));
//! ```

use std::{collections::HashSet, fmt, sync::Arc};

use crate::{
    interception::InterceptorRc,
    metadata::{
        typesystem::{ManagedTypeRc, TypeRegistry},
        value::{ObjectRef, Value},
    },
    proxy::{
        activation::{ActivationArgs, ProxyInstanceRc, ProxyTypeRc},
        backend::{ProxyBlueprint, ProxyTypeBuilder, TableBackend, PROXY_NAMESPACE},
        collector::{Backing, Contributor, MemberCollector},
        config::InternalsPolicy,
        descriptor::InvocationDescriptor,
        identity::{ProxyFlavor, ProxyIdentity},
        mixin::MixinData,
        options::GenerationOptions,
        scope::ProxyScope,
    },
    Error, Result,
};

struct Request<'a> {
    flavor: ProxyFlavor,
    contract: &'a ManagedTypeRc,
    target_type: Option<&'a ManagedTypeRc>,
    extras: &'a [ManagedTypeRc],
    options: &'a GenerationOptions,
}

/// Generates proxy types and instances.
///
/// Generators are cheap to clone and share their [`ProxyScope`]; proxy types generated
/// by any generator of a scope are reused by all of them.
#[derive(Clone)]
pub struct ProxyGenerator {
    registry: Arc<TypeRegistry>,
    scope: Arc<ProxyScope>,
    backend: Arc<dyn ProxyTypeBuilder>,
}

impl ProxyGenerator {
    /// Creates a generator with a fresh default scope and the [`TableBackend`].
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::with_scope(registry, Arc::new(ProxyScope::new()))
    }

    /// Creates a generator using an existing scope.
    #[must_use]
    pub fn with_scope(registry: Arc<TypeRegistry>, scope: Arc<ProxyScope>) -> Self {
        Self {
            registry,
            scope,
            backend: Arc::new(TableBackend),
        }
    }

    /// Replaces the backend building proxy types.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn ProxyTypeBuilder>) -> Self {
        self.backend = backend;
        self
    }

    /// The type registry
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// The scope caching generated types
    #[must_use]
    pub fn scope(&self) -> &Arc<ProxyScope> {
        &self.scope
    }

    /// Proxy type for an interface whose calls forward to a target of `target_type`.
    ///
    /// # Errors
    /// Returns a configuration error if the request is invalid, see [`Error::is_configuration`].
    pub fn create_interface_proxy_type_with_target(
        &self,
        contract: &ManagedTypeRc,
        extras: &[ManagedTypeRc],
        target_type: &ManagedTypeRc,
        options: &GenerationOptions,
    ) -> Result<ProxyTypeRc> {
        self.obtain(&Request {
            flavor: ProxyFlavor::InterfaceWithTarget,
            contract,
            target_type: Some(target_type),
            extras,
            options,
        })
    }

    /// Proxy type for an interface without target; interceptors produce all results.
    ///
    /// # Errors
    /// Returns a configuration error if the request is invalid.
    pub fn create_interface_proxy_type_without_target(
        &self,
        contract: &ManagedTypeRc,
        extras: &[ManagedTypeRc],
        options: &GenerationOptions,
    ) -> Result<ProxyTypeRc> {
        self.obtain(&Request {
            flavor: ProxyFlavor::InterfaceWithoutTarget,
            contract,
            target_type: None,
            extras,
            options,
        })
    }

    /// Proxy type for an interface whose target is only known as the interface and can
    /// be replaced by interceptors.
    ///
    /// # Errors
    /// Returns a configuration error if the request is invalid.
    pub fn create_interface_proxy_type_with_target_interface(
        &self,
        contract: &ManagedTypeRc,
        extras: &[ManagedTypeRc],
        options: &GenerationOptions,
    ) -> Result<ProxyTypeRc> {
        self.obtain(&Request {
            flavor: ProxyFlavor::InterfaceWithTargetInterface,
            contract,
            target_type: None,
            extras,
            options,
        })
    }

    /// Proxy type deriving from a non-sealed class.
    ///
    /// # Errors
    /// Returns a configuration error if the request is invalid.
    pub fn create_class_proxy_type(
        &self,
        class: &ManagedTypeRc,
        extras: &[ManagedTypeRc],
        options: &GenerationOptions,
    ) -> Result<ProxyTypeRc> {
        self.obtain(&Request {
            flavor: ProxyFlavor::Class,
            contract: class,
            target_type: None,
            extras,
            options,
        })
    }

    /// Creates an interface proxy forwarding to `target`.
    ///
    /// # Errors
    /// Returns a configuration error if the request is invalid, or
    /// [`Error::Activation`] if the instance can not be created.
    pub fn create_interface_proxy_with_target(
        &self,
        contract: &ManagedTypeRc,
        extras: &[ManagedTypeRc],
        target: ObjectRef,
        options: &GenerationOptions,
        interceptors: Vec<InterceptorRc>,
    ) -> Result<ProxyInstanceRc> {
        let target_type = target.ty().clone();
        let proxy_type =
            self.create_interface_proxy_type_with_target(contract, extras, &target_type, options)?;
        Self::activate(&proxy_type, options, interceptors, Some(target), Vec::new())
    }

    /// Creates an interface proxy whose target may be replaced during calls.
    ///
    /// # Errors
    /// Returns a configuration error if the request is invalid, or
    /// [`Error::Activation`] if `target` does not implement `contract`.
    pub fn create_interface_proxy_with_target_interface(
        &self,
        contract: &ManagedTypeRc,
        extras: &[ManagedTypeRc],
        target: ObjectRef,
        options: &GenerationOptions,
        interceptors: Vec<InterceptorRc>,
    ) -> Result<ProxyInstanceRc> {
        let proxy_type =
            self.create_interface_proxy_type_with_target_interface(contract, extras, options)?;
        Self::activate(&proxy_type, options, interceptors, Some(target), Vec::new())
    }

    /// Creates an interface proxy without target.
    ///
    /// # Errors
    /// Returns a configuration error if the request is invalid.
    pub fn create_interface_proxy_without_target(
        &self,
        contract: &ManagedTypeRc,
        extras: &[ManagedTypeRc],
        options: &GenerationOptions,
        interceptors: Vec<InterceptorRc>,
    ) -> Result<ProxyInstanceRc> {
        let proxy_type = self.create_interface_proxy_type_without_target(contract, extras, options)?;
        Self::activate(&proxy_type, options, interceptors, None, Vec::new())
    }

    /// Creates a class proxy, passing `constructor_arguments` to the class's
    /// constructor.
    ///
    /// # Errors
    /// Returns a configuration error if the request is invalid, or
    /// [`Error::Activation`] if the constructor rejects the arguments.
    pub fn create_class_proxy(
        &self,
        class: &ManagedTypeRc,
        extras: &[ManagedTypeRc],
        constructor_arguments: Vec<Value>,
        options: &GenerationOptions,
        interceptors: Vec<InterceptorRc>,
    ) -> Result<ProxyInstanceRc> {
        let proxy_type = self.create_class_proxy_type(class, extras, options)?;
        Self::activate(&proxy_type, options, interceptors, None, constructor_arguments)
    }

    /// Creates an interface proxy for `target`, inferring the contract from the single
    /// interface the target implements.
    ///
    /// Interfaces inherited by another interface of the target and infrastructure
    /// interfaces do not count.
    ///
    /// # Errors
    /// Returns [`Error::ContractNotImplied`] if the target implements no interface or
    /// several unrelated ones.
    pub fn create_proxy_for_target(
        &self,
        target: ObjectRef,
        options: &GenerationOptions,
        interceptors: Vec<InterceptorRc>,
    ) -> Result<ProxyInstanceRc> {
        let contract = self.imply_contract(target.ty())?;
        self.create_interface_proxy_with_target(&contract, &[], target, options, interceptors)
    }

    fn imply_contract(&self, target_type: &ManagedTypeRc) -> Result<ManagedTypeRc> {
        let candidates: Vec<ManagedTypeRc> = target_type
            .all_interfaces(self.scope.config().max_interface_depth)?
            .into_iter()
            .filter(|i| !self.registry.is_infrastructure(i))
            .collect();
        let roots: Vec<&ManagedTypeRc> = candidates
            .iter()
            .filter(|candidate| {
                !candidates
                    .iter()
                    .any(|other| other.token != candidate.token && other.implements(candidate))
            })
            .collect();

        match roots.as_slice() {
            [single] => Ok((*single).clone()),
            [] => Err(Error::ContractNotImplied {
                target: target_type.fullname(),
                reason: "it implements no interface".to_string(),
            }),
            many => Err(Error::ContractNotImplied {
                target: target_type.fullname(),
                reason: format!(
                    "it implements several unrelated interfaces: {}",
                    many.iter().map(|i| i.fullname()).collect::<Vec<_>>().join(", ")
                ),
            }),
        }
    }

    fn activate(
        proxy_type: &ProxyTypeRc,
        options: &GenerationOptions,
        interceptors: Vec<InterceptorRc>,
        target: Option<ObjectRef>,
        constructor_arguments: Vec<Value>,
    ) -> Result<ProxyInstanceRc> {
        proxy_type.create_instance(ActivationArgs {
            mixins: options.mixin_data().map(MixinData::instances).unwrap_or_default(),
            interceptors,
            target,
            selector: options.selector().cloned(),
            constructor_arguments,
        })
    }

    fn obtain(&self, request: &Request<'_>) -> Result<ProxyTypeRc> {
        self.validate(request)?;

        let depth = self.scope.config().max_interface_depth;
        let finalized = request.options.initialize(depth)?;
        finalized
            .mixin_data
            .validate_against(request.contract, request.extras, depth)?;

        let identity = ProxyIdentity::new(
            request.flavor,
            request.contract,
            request.target_type,
            request.extras,
            finalized.identity.clone(),
        );
        self.scope
            .obtain(identity, || self.generate(request, &finalized.mixin_data))
    }

    fn validate(&self, request: &Request<'_>) -> Result<()> {
        let contract = request.contract;
        let name = contract.fullname();

        if contract.is_generic_definition() {
            return Err(invalid_contract!(name, "open generic type definitions can not be proxied"));
        }
        if self.registry.is_infrastructure(contract) {
            return Err(invalid_contract!(name, "it is implemented by every proxy"));
        }
        match request.flavor {
            ProxyFlavor::Class => {
                if !contract.is_class() {
                    return Err(invalid_contract!(name, "class proxies require a class"));
                }
                if contract.is_sealed() {
                    return Err(invalid_contract!(name, "sealed classes can not be proxied"));
                }
            }
            _ if !contract.is_interface() => {
                return Err(invalid_contract!(name, "interface proxies require an interface"));
            }
            _ => {}
        }
        if !contract.is_public() && !self.internals_visible(contract) {
            return Err(invalid_contract!(
                name,
                "it is not public and its module does not trust {}",
                self.scope.config().module_name
            ));
        }

        for extra in request.extras {
            let extra_name = extra.fullname();
            if !extra.is_interface() {
                return Err(invalid_contract!(extra_name, "additional types must be interfaces"));
            }
            if extra.is_generic_definition() {
                return Err(invalid_contract!(
                    extra_name,
                    "open generic type definitions can not be proxied"
                ));
            }
            if self.registry.is_infrastructure(extra) {
                return Err(invalid_contract!(extra_name, "it is implemented by every proxy"));
            }
        }

        if let Some(target_type) = request.target_type {
            if !target_type.is_assignable_to(contract) {
                return Err(invalid_contract!(
                    target_type.fullname(),
                    "the target does not implement {}",
                    name
                ));
            }
        }

        if request.flavor != ProxyFlavor::Class {
            if let Some(base) = request.options.base_type_for_interface_proxy() {
                if base.is_interface() || base.is_sealed() || !base.is_class() {
                    return Err(invalid_contract!(
                        base.fullname(),
                        "the base type of interface proxies must be a non-sealed class"
                    ));
                }
            }
        }

        let depth = self.scope.config().max_interface_depth;
        for mixin in request.options.mixins() {
            if let Some(infrastructure) = mixin
                .ty()
                .all_interfaces(depth)?
                .iter()
                .find(|i| self.registry.is_infrastructure(i))
            {
                return Err(invalid_contract!(
                    mixin.ty().fullname(),
                    "mixins can not implement {}",
                    infrastructure.fullname()
                ));
            }
        }

        Ok(())
    }

    fn internals_visible(&self, ty: &ManagedTypeRc) -> bool {
        let config = self.scope.config();
        match config.internals {
            InternalsPolicy::Never => false,
            InternalsPolicy::Always => true,
            InternalsPolicy::TrustedModules => ty.module.trusts(&config.module_name),
        }
    }

    fn generate(&self, request: &Request<'_>, mixins: &MixinData) -> Result<ProxyTypeRc> {
        let config = self.scope.config();
        let depth = config.max_interface_depth;
        let contract = request.contract;
        let hook = request.options.hook().hook();

        tracing::debug!(
            contract = %contract.fullname(),
            flavor = %request.flavor,
            extras = request.extras.len(),
            mixins = mixins.len(),
            "generating proxy type"
        );

        let mut collector = MemberCollector::new(config, hook, Some(self.scope.diagnostics()));
        let backing = match (request.flavor, request.target_type) {
            (ProxyFlavor::InterfaceWithTarget, Some(target_type)) => Backing::Target(target_type),
            (ProxyFlavor::InterfaceWithTargetInterface, _) => Backing::Dynamic,
            (ProxyFlavor::Class, _) => Backing::Base,
            _ => Backing::None,
        };
        let mut members = collector.collect(contract, Contributor::Primary, backing)?;

        let mut interfaces = Vec::new();
        let mut covered = HashSet::new();
        let mut cover = |interface: &ManagedTypeRc, interfaces: &mut Vec<ManagedTypeRc>| {
            if covered.insert(interface.token) {
                interfaces.push(interface.clone());
            }
        };
        if contract.is_interface() {
            cover(contract, &mut interfaces);
        }
        for inherited in contract.all_interfaces(depth)? {
            cover(&inherited, &mut interfaces);
        }

        for extra in request.extras {
            if interfaces.iter().any(|i| i.token == extra.token) {
                continue;
            }
            let (contributor, extra_backing) = match (request.flavor, request.target_type) {
                (ProxyFlavor::InterfaceWithTarget, Some(target_type)) if target_type.implements(extra) => {
                    (Contributor::Primary, Backing::Target(target_type))
                }
                _ => (Contributor::Standalone, Backing::None),
            };
            members.extend(collector.collect(extra, contributor, extra_backing)?);
            cover(extra, &mut interfaces);
            for inherited in extra.all_interfaces(depth)? {
                cover(&inherited, &mut interfaces);
            }
        }

        let mut mixin_layout = Vec::with_capacity(mixins.len());
        for (position, entry) in mixins.entries().iter().enumerate() {
            members.extend(collector.collect_mixin(&entry.interface, position, entry.instance.ty()));
            mixin_layout.push(entry.instance.ty().clone());
            cover(&entry.interface, &mut interfaces);
        }
        cover(&self.registry.proxy_target_accessor(), &mut interfaces);

        hook.methods_inspected();

        let invocation_names = self.scope.naming().sub_scope();
        let descriptors = members
            .iter()
            .flat_map(|member| &member.methods)
            .map(|method| {
                let name = invocation_names
                    .unique_name(&format!("{}_{}", method.contract.name, method.method.name));
                InvocationDescriptor::build(method, request.flavor, name)
            })
            .collect::<Result<Vec<_>>>()?;

        let name = self
            .scope
            .naming()
            .unique_name_where(&format!("{}Proxy", contract.name), |candidate| {
                self.registry
                    .get_by_fullname(&format!("{}.{}", PROXY_NAMESPACE, candidate))
                    .is_some()
            });
        let base_type = match request.flavor {
            ProxyFlavor::Class => contract.clone(),
            _ => request
                .options
                .base_type_for_interface_proxy()
                .cloned()
                .unwrap_or_else(|| self.registry.object()),
        };

        let built = self.backend.build(
            &self.registry,
            ProxyBlueprint {
                name: name.clone(),
                flavor: request.flavor,
                contract: contract.clone(),
                base_type,
                interfaces,
                target_type: request.target_type.cloned(),
                members,
                descriptors,
                mixin_layout,
                attributes: request.options.additional_attributes().to_vec(),
                module: config.module_name.clone(),
            },
        );
        if built.is_err() {
            self.scope.naming().release(&name);
        }
        built
    }
}

impl fmt::Debug for ProxyGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyGenerator")
            .field("registry", &self.registry.len())
            .field("scope", &self.scope)
            .finish()
    }
}
