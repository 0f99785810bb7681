//! # proxyscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the proxyscope library. Import this module to get quick access to everything needed
//! to declare contracts, generate proxies and write interceptors.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all proxyscope operations
pub use crate::Error;

/// The result type used throughout proxyscope
pub use crate::Result;

// ================================================================================================
// Type Model
// ================================================================================================

/// Identity tokens for types and members
pub use crate::metadata::token::Token;

/// Types, the registry and the builders
pub use crate::metadata::typesystem::{
    CorePrimitive, EventBuilder, ManagedType, ManagedTypeRc, Module, PropertyBuilder, TypeBuilder,
    TypeRegistry,
};

/// Methods and signatures
pub use crate::metadata::method::{CallFrame, Method, MethodBuilder, MethodInstance, MethodRc, TypeSig};

/// Values flowing through calls
pub use crate::metadata::value::{ObjectRef, Value};

/// Generation diagnostics
pub use crate::metadata::diagnostics::{Diagnostic, DiagnosticSeverity, Diagnostics};

// ================================================================================================
// Proxy Generation
// ================================================================================================

/// The entry point
pub use crate::proxy::ProxyGenerator;

/// Options and their extension points
pub use crate::proxy::{
    AllMethodsHook, AttributeInfo, FilterHook, FnSelector, GenerationOptions, HookHandle,
    InterceptorSelector, ProxyGenerationHook,
};

/// Scope, cache and configuration
pub use crate::proxy::{InternalsPolicy, ProxyScope, ScopeConfig};

/// Generated types and instances
pub use crate::proxy::{ProxyFlavor, ProxyInstance, ProxyInstanceRc, ProxyType, ProxyTypeRc};

// ================================================================================================
// Interception
// ================================================================================================

/// Interceptors and the invocation they receive
pub use crate::interception::{
    FnInterceptor, Interceptor, InterceptorRc, Invocation, ProceedToken, Standard,
    StandardInterceptor,
};
