//! Interceptors.
//!
//! An [`Interceptor`] receives every call of the members it is attached to. It can
//! inspect and rewrite arguments, call [`Invocation::proceed`] to continue down the
//! chain (zero, one or several times), and set or replace the return value.
//!
//! # Available Interceptors
//!
//! | Type | Description |
//! |------|-------------|
//! | [`FnInterceptor`] | Wraps a closure |
//! | [`Standard`] | Adapts a [`StandardInterceptor`] (pre, perform, post steps) |

use std::{any::type_name, fmt, sync::Arc};

use crate::{interception::Invocation, Result};

/// Receives intercepted calls.
///
/// # Thread Safety
///
/// Interceptors are shared by every proxy instance they were attached to and can be
/// called from any thread at the same time.
pub trait Interceptor: Send + Sync {
    /// Handles a call. Call [`Invocation::proceed`] to continue down the chain.
    ///
    /// # Errors
    /// Errors are returned to the caller of the proxied member unchanged, unless an
    /// outer interceptor handles them.
    fn intercept(&self, invocation: &mut Invocation) -> Result<()>;

    /// Name used in logs and debug output
    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

/// Reference to an `Interceptor`
pub type InterceptorRc = Arc<dyn Interceptor>;

impl fmt::Debug for dyn Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interceptor({})", self.name())
    }
}

/// An interceptor backed by a closure.
///
/// ```rust,ignore
/// let double = FnInterceptor::new("double", |invocation: &mut Invocation| {
///     invocation.proceed()?;
///     let value = invocation.return_value().as_i32().unwrap_or_default();
///     invocation.set_return_value(Value::I32(value * 2));
///     Ok(())
/// });
/// ```
pub struct FnInterceptor<F> {
    name: String,
    intercept: F,
}

impl<F> FnInterceptor<F>
where
    F: Fn(&mut Invocation) -> Result<()> + Send + Sync,
{
    /// Creates a named closure interceptor.
    pub fn new(name: impl Into<String>, intercept: F) -> Self {
        Self {
            name: name.into(),
            intercept,
        }
    }
}

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(&mut Invocation) -> Result<()> + Send + Sync,
{
    fn intercept(&self, invocation: &mut Invocation) -> Result<()> {
        (self.intercept)(invocation)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// An interceptor split into the steps before, around and after proceeding.
///
/// Implementations override the steps they need and are attached wrapped in
/// [`Standard`]. `post_proceed` only runs if `perform_proceed` succeeded.
pub trait StandardInterceptor: Send + Sync {
    /// Runs before the call proceeds
    ///
    /// # Errors
    /// Aborts the call.
    fn pre_proceed(&self, _invocation: &mut Invocation) -> Result<()> {
        Ok(())
    }

    /// Proceeds; the default continues down the chain
    ///
    /// # Errors
    /// Whatever the rest of the chain returned.
    fn perform_proceed(&self, invocation: &mut Invocation) -> Result<()> {
        invocation.proceed()
    }

    /// Runs after the call proceeded
    ///
    /// # Errors
    /// Returned to the caller.
    fn post_proceed(&self, _invocation: &mut Invocation) -> Result<()> {
        Ok(())
    }
}

/// Adapts a [`StandardInterceptor`] to [`Interceptor`].
pub struct Standard<T>(pub T);

impl<T: StandardInterceptor> Interceptor for Standard<T> {
    fn intercept(&self, invocation: &mut Invocation) -> Result<()> {
        self.0.pre_proceed(invocation)?;
        self.0.perform_proceed(invocation)?;
        self.0.post_proceed(invocation)
    }

    fn name(&self) -> &str {
        type_name::<T>()
    }
}
