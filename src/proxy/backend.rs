//! Proxy type construction backends.
//!
//! The generator decides what a proxy type looks like and hands the result to a
//! [`ProxyTypeBuilder`] as a [`ProxyBlueprint`]. The backend turns the blueprint into a
//! usable [`ProxyType`]. [`TableBackend`], the default, registers the proxy class in
//! the type registry and dispatches calls through a table keyed by member token.

use std::sync::Arc;

use crate::{
    metadata::{
        method::MethodBuilder,
        typesystem::{ManagedTypeRc, Module, TypeBuilder, TypeRegistry},
        value::Value,
    },
    proxy::{
        activation::{ProxyInstance, ProxyType, ProxyTypeRc},
        collector::MemberToGenerate,
        descriptor::InvocationDescriptor,
        identity::ProxyFlavor,
        options::AttributeInfo,
    },
    Error, Result,
};

/// Namespace of generated proxy types
pub const PROXY_NAMESPACE: &str = "Proxies";

/// Everything the generator decided about a proxy type.
#[derive(Debug, Clone)]
pub struct ProxyBlueprint {
    /// Unique type name, without namespace
    pub name: String,
    /// The kind of proxy
    pub flavor: ProxyFlavor,
    /// The proxied contract
    pub contract: ManagedTypeRc,
    /// The class the proxy derives from
    pub base_type: ManagedTypeRc,
    /// Interfaces the proxy implements, infrastructure included
    pub interfaces: Vec<ManagedTypeRc>,
    /// Target type of with-target proxies
    pub target_type: Option<ManagedTypeRc>,
    /// Intercepted members
    pub members: Vec<MemberToGenerate>,
    /// One descriptor per intercepted method
    pub descriptors: Vec<InvocationDescriptor>,
    /// Mixin instance types by position
    pub mixin_layout: Vec<ManagedTypeRc>,
    /// Attributes applied to the type
    pub attributes: Vec<AttributeInfo>,
    /// Module the type is generated into
    pub module: String,
}

/// Builds proxy types from blueprints.
pub trait ProxyTypeBuilder: Send + Sync {
    /// Builds the proxy type.
    ///
    /// # Errors
    /// Returns [`Error::Backend`] if the type can not be built.
    fn build(&self, registry: &TypeRegistry, blueprint: ProxyBlueprint) -> Result<ProxyTypeRc>;
}

/// The default backend: registers `Proxies.{name}` and dispatches through a table.
///
/// The registered class derives from the blueprint's base type, implements all of its
/// interfaces and implements the target accessor explicitly.
#[derive(Debug, Default, Clone, Copy)]
pub struct TableBackend;

impl ProxyTypeBuilder for TableBackend {
    fn build(&self, registry: &TypeRegistry, blueprint: ProxyBlueprint) -> Result<ProxyTypeRc> {
        let accessor = registry.proxy_target_accessor();
        let get_target = accessor
            .methods_named("DynProxyGetTarget")
            .into_iter()
            .next()
            .ok_or_else(|| Error::Backend("the target accessor has no DynProxyGetTarget".to_string()))?;

        let mut builder = TypeBuilder::class(PROXY_NAMESPACE, blueprint.name.clone())
            .module(&Module::new(blueprint.module.clone()))
            .extends(&blueprint.base_type);
        for interface in &blueprint.interfaces {
            builder = builder.implements(interface);
        }
        builder = builder.explicit_impl(
            &get_target,
            MethodBuilder::new("DynProxyGetTarget")
                .returns(get_target.return_type.clone())
                .body(|this, _| {
                    Ok(ProxyInstance::from_object(this)
                        .and_then(|proxy| proxy.target())
                        .map_or(Value::Null, Value::Object))
                }),
        );

        let managed = builder
            .build(registry)
            .map_err(|error| Error::Backend(error.to_string()))?;

        tracing::debug!(
            proxy = %managed.fullname(),
            flavor = %blueprint.flavor,
            intercepted = blueprint.descriptors.len(),
            "built proxy type"
        );
        Ok(Arc::new(ProxyType::from_blueprint(blueprint, managed)))
    }
}
