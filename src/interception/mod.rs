//! The interception pipeline.
//!
//! Every intercepted member of a generated proxy routes its calls through the same
//! pipeline: an [`Invocation`] is created with the call's arguments, the interceptors
//! the selector chose run in order, and the innermost step forwards to the backing
//! implementation.
//!
//! # Key Components
//!
//! - [`Interceptor`] - receives calls and decides whether and how often to proceed
//! - [`Invocation`] - arguments, return value and the position in the chain
//! - [`ProceedToken`] - a saved position to continue the chain later
//!
//! # Proceed Protocol
//!
//! ```text
//! caller ─▶ interceptor[0] ─proceed─▶ interceptor[1] ─proceed─▶ ... ─proceed─▶ target
//!        ◀─ return value ◀───────────────────────────────────────────────────┘
//! ```
//!
//! - interceptors run in registration order, their post-processing in reverse
//! - `proceed` restores the position when it returns, so proceeding twice re-runs the
//!   rest of the chain
//! - an interceptor that does not proceed short-circuits the call and must provide the
//!   return value and `out` arguments itself
//! - for members without an implementation, proceeding past the last interceptor
//!   fails with [`crate::Error::NoTarget`]
//!
//! # Examples
//!
//! ```rust,ignore
//! use proxyscope::interception::{FnInterceptor, Invocation};
//! use proxyscope::metadata::value::Value;
//!
//! let cache = FnInterceptor::new("cache", |invocation: &mut Invocation| {
//!     if invocation.argument(0)?.as_i32() == Some(0) {
//!         invocation.set_return_value(Value::I32(0));
//!         return Ok(());
//!     }
//!     invocation.proceed()
//! });
//! ```

mod interceptor;
mod invocation;
mod token;

pub use interceptor::{FnInterceptor, Interceptor, InterceptorRc, Standard, StandardInterceptor};
pub use invocation::{Invocation, InvocationParts};
pub use token::{CapturedState, ProceedToken};
