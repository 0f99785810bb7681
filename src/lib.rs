// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # proxyscope
//!
//! Runtime interception proxies for .NET-style contracts.
//!
//! `proxyscope` synthesizes proxy types that stand in for a requested contract (an
//! interface or a non-sealed class) and route every intercepted call through an
//! ordered chain of interceptors before optionally forwarding it to a real backing
//! implementation. It is the decision layer underneath aspect-oriented and
//! dependency-injection style proxying:
//!
//! - **Member selection** - which members of a contract are eligible for interception
//! - **Proxy identity and caching** - identical requests reuse one generated proxy type
//! - **Mixins** - auxiliary interface implementations merged deterministically
//! - **Invocation descriptors** - per-member forwarding metadata (targets, generics, by-ref slots)
//! - **The Proceed pipeline** - the re-entrant protocol interceptors use to cooperate
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use proxyscope::prelude::*;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(TypeRegistry::new()?);
//! let int32 = registry.primitive(CorePrimitive::Int32);
//!
//! let calculator = TypeBuilder::interface("Samples", "ICalculator")
//!     .method(
//!         MethodBuilder::new("Add")
//!             .param("a", TypeSig::of(&int32))
//!             .param("b", TypeSig::of(&int32))
//!             .returns(TypeSig::of(&int32)),
//!     )
//!     .build(&registry)?;
//!
//! let generator = ProxyGenerator::new(registry.clone());
//! let logging = FnInterceptor::new("log", |invocation: &mut Invocation| {
//!     println!("calling {}", invocation.method().name);
//!     invocation.proceed()
//! });
//!
//! let proxy = generator.create_interface_proxy_with_target(
//!     &calculator,
//!     &[],
//!     ObjectRef::new(&calculator_impl, ()),
//!     &GenerationOptions::default(),
//!     vec![Arc::new(logging)],
//! )?;
//! let sum = proxy.call("Add", &mut [Value::I32(2), Value::I32(3)])?;
//! # Ok::<(), proxyscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`] - the runtime type model proxies are built against
//! - [`proxy`] - options, mixins, member collection, descriptors, identity and the cache
//! - [`interception`] - interceptors, [`interception::Invocation`] and the Proceed protocol
//! - [`Error`] and [`Result`] - crate-wide error handling

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// ```rust,ignore
/// use proxyscope::prelude::*;
/// ```
pub mod prelude;

/// The runtime type model: types, methods, properties, events, values and diagnostics.
///
/// Proxies are generated against [`metadata::typesystem::ManagedType`] descriptions that
/// are registered in a [`metadata::typesystem::TypeRegistry`]. Method implementations
/// are plain closures, so backing targets and mixins are ordinary Rust values wrapped
/// in [`metadata::value::ObjectRef`].
pub mod metadata;

/// Proxy generation: options, mixins, member selection, descriptors, identity and caching.
pub mod proxy;

/// The interception pipeline realized by every proxied member.
pub mod interception;

/// `proxyscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `proxyscope` Error type
///
/// See [`error::Error`] for the configuration and pipeline failure modes.
pub use error::Error;
