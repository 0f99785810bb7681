//! Runtime type model for proxy generation.
//!
//! Proxies are generated against descriptions of .NET-style types rather than against
//! compiled Rust types. This module provides that model and the pieces that hang off it.
//!
//! # Key Components
//!
//! - [`token`] - Identity tokens for types and members, allocated by the registry
//! - [`typesystem`] - [`typesystem::ManagedType`], the [`typesystem::TypeRegistry`] and the [`typesystem::TypeBuilder`]
//! - [`method`] - Methods, parameters, access flags and executable bodies
//! - [`value`] - Dynamically typed values passed through invocations
//! - [`diagnostics`] - Lock-free collection of notes raised while selecting members
//!
//! # Examples
//!
//! ```rust,ignore
//! use proxyscope::metadata::typesystem::{TypeBuilder, TypeRegistry};
//! use proxyscope::metadata::method::MethodBuilder;
//!
//! let registry = TypeRegistry::new()?;
//! let disposable = TypeBuilder::interface("System", "IDisposable")
//!     .method(MethodBuilder::new("Dispose"))
//!     .build(&registry)?;
//! assert!(disposable.is_interface());
//! # Ok::<(), proxyscope::Error>(())
//! ```

/// Diagnostics collected while proxy types are generated
pub mod diagnostics;
/// Methods, parameters and method bodies
pub mod method;
/// Identity tokens for types and members
pub mod token;
/// Types, modules, the type registry and the type builder
pub mod typesystem;
/// Dynamically typed values and object references
pub mod value;
