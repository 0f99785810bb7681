//! Proxy generation.
//!
//! This module turns a proxy request into a cached proxy type and activates
//! instances of it. The pieces, in the order a request passes through them:
//!
//! - [`options`] - [`GenerationOptions`] and their comparable [`OptionsIdentity`]
//! - [`mixin`] - [`MixinData`], the canonical composition of mixin instances
//! - [`identity`] - [`ProxyIdentity`], the cache key, and the [`ProxyFlavor`]s
//! - [`scope`] - [`ProxyScope`], the proxy type cache and naming scope
//! - [`collector`] - [`MemberCollector`], which members are intercepted
//! - [`descriptor`] - [`InvocationDescriptor`], per-method forwarding metadata
//! - [`backend`] - [`ProxyTypeBuilder`], turning blueprints into proxy types
//! - [`activation`] - [`ProxyType`] and [`ProxyInstance`]
//! - [`generator`] - [`ProxyGenerator`], the entry point
//!
//! [`config`] holds the scope-wide settings and [`hook`] the member selection and
//! interceptor selection extension points.

pub mod activation;
pub mod backend;
pub mod collector;
pub mod config;
pub mod descriptor;
pub mod generator;
pub mod hook;
pub mod identity;
pub mod mixin;
pub mod options;
pub mod scope;

pub use activation::{ActivationArgs, ProxyInstance, ProxyInstanceRc, ProxyType, ProxyTypeRc};
pub use backend::{ProxyBlueprint, ProxyTypeBuilder, TableBackend};
pub use collector::{Contributor, MemberCollector, MemberKind, MemberToGenerate, MethodToGenerate};
pub use config::{InternalsPolicy, ScopeConfig};
pub use descriptor::{Callback, InvocationDescriptor, TargetField};
pub use generator::ProxyGenerator;
pub use hook::{
    AllMethodsHook, FilterHook, FnSelector, HookHandle, InterceptorSelector, ProxyGenerationHook,
    SelectorRc,
};
pub use identity::{ProxyFlavor, ProxyIdentity};
pub use mixin::{MixinData, MixinEntry};
pub use options::{AttributeInfo, GenerationOptions, GenerationOptionsBuilder, OptionsIdentity};
pub use scope::{NamingScope, ProxyScope};
