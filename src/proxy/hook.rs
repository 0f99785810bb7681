//! Member selection hooks and interceptor selectors.
//!
//! A [`ProxyGenerationHook`] decides, once per proxy type, which members are
//! intercepted. An [`InterceptorSelector`] decides, on every call, which of the
//! proxy's interceptors run for the member being called.
//!
//! # Available Hooks
//!
//! | Hook | Description |
//! |------|-------------|
//! | [`AllMethodsHook`] | Intercepts everything except root members and finalizers (default) |
//! | [`FilterHook`] | [`AllMethodsHook`] narrowed by a predicate |
//!
//! # Hook Identity
//!
//! Hooks take part in proxy type caching. Two hooks are considered equal when they
//! are of the same Rust type: a hook's behavior must be fully determined by its type.
//! Hooks carrying per-instance configuration should use distinct types.
//!
//! ```rust,ignore
//! use proxyscope::proxy::{FilterHook, HookHandle};
//!
//! let hook = HookHandle::new(FilterHook::new(|_, method| method.name != "Dispose"));
//! ```

use std::{
    any::{type_name, TypeId},
    fmt,
    sync::Arc,
};

use crate::{
    interception::InterceptorRc,
    metadata::{method::MethodRc, typesystem::ManagedTypeRc},
};

/// Full names of the roots whose members are never intercepted
pub const EXCLUDED_ROOTS: [&str; 3] = [
    "System.Object",
    "System.MarshalByRefObject",
    "System.ContextBoundObject",
];

/// Decides which members of a proxied type are intercepted.
///
/// The member collector has already dropped members that can not be intercepted
/// (sealed, inaccessible, non-virtual on class proxies) before the hook is asked.
///
/// # Thread Safety
///
/// Hooks must be `Send + Sync`; generation can run on any thread.
pub trait ProxyGenerationHook: Send + Sync {
    /// Returns true if `method`, found on `ty`, should be intercepted.
    fn should_intercept_method(&self, ty: &ManagedTypeRc, method: &MethodRc) -> bool;

    /// Called for every member that would have been intercepted but can not be, such
    /// as a non-virtual method on a class proxy.
    fn non_proxyable_member_notification(&self, _ty: &ManagedTypeRc, _method: &MethodRc) {}

    /// Called once per generated proxy type, after all members were inspected.
    fn methods_inspected(&self) {}
}

/// Returns true if `method` is declared on one of the [`EXCLUDED_ROOTS`].
#[must_use]
pub fn is_declared_on_root(method: &MethodRc) -> bool {
    method
        .declaring_type()
        .is_some_and(|ty| EXCLUDED_ROOTS.contains(&ty.fullname().as_str()))
}

/// The default hook: intercepts every member except the members of the excluded
/// roots and finalizers.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllMethodsHook;

impl ProxyGenerationHook for AllMethodsHook {
    fn should_intercept_method(&self, _ty: &ManagedTypeRc, method: &MethodRc) -> bool {
        !is_declared_on_root(method) && !method.is_finalizer()
    }
}

/// [`AllMethodsHook`] narrowed by a predicate.
pub struct FilterHook<F> {
    predicate: F,
}

impl<F> FilterHook<F>
where
    F: Fn(&ManagedTypeRc, &MethodRc) -> bool + Send + Sync,
{
    /// Creates a hook intercepting the members `predicate` accepts.
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> ProxyGenerationHook for FilterHook<F>
where
    F: Fn(&ManagedTypeRc, &MethodRc) -> bool + Send + Sync,
{
    fn should_intercept_method(&self, ty: &ManagedTypeRc, method: &MethodRc) -> bool {
        AllMethodsHook.should_intercept_method(ty, method) && (self.predicate)(ty, method)
    }
}

/// A shared hook together with its policy identity.
#[derive(Clone)]
pub struct HookHandle {
    hook: Arc<dyn ProxyGenerationHook>,
    policy: TypeId,
    name: &'static str,
}

impl HookHandle {
    /// Wraps a hook.
    pub fn new<H: ProxyGenerationHook + 'static>(hook: H) -> Self {
        Self {
            hook: Arc::new(hook),
            policy: TypeId::of::<H>(),
            name: type_name::<H>(),
        }
    }

    /// Wraps an already shared hook.
    pub fn from_arc<H: ProxyGenerationHook + 'static>(hook: Arc<H>) -> Self {
        Self {
            hook,
            policy: TypeId::of::<H>(),
            name: type_name::<H>(),
        }
    }

    /// The policy type identifying this hook in cache keys
    #[must_use]
    pub fn policy(&self) -> TypeId {
        self.policy
    }

    /// Name of the policy type
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The wrapped hook
    #[must_use]
    pub fn hook(&self) -> &dyn ProxyGenerationHook {
        self.hook.as_ref()
    }
}

impl Default for HookHandle {
    fn default() -> Self {
        Self::new(AllMethodsHook)
    }
}

impl PartialEq for HookHandle {
    fn eq(&self, other: &Self) -> bool {
        self.policy == other.policy
    }
}

impl Eq for HookHandle {}

impl fmt::Debug for HookHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HookHandle({})", self.name)
    }
}

/// Chooses the interceptors that run for a call.
///
/// Consulted on every call with the proxied contract, the member being called and
/// the proxy's full interceptor chain; the returned chain is the one the invocation
/// runs. Returning an empty chain calls straight through to the target.
pub trait InterceptorSelector: Send + Sync {
    /// Selects the interceptors for a call of `method` on `ty`.
    fn select_interceptors(
        &self,
        ty: &ManagedTypeRc,
        method: &MethodRc,
        interceptors: &[InterceptorRc],
    ) -> Vec<InterceptorRc>;
}

/// Reference to an `InterceptorSelector`
pub type SelectorRc = Arc<dyn InterceptorSelector>;

/// An [`InterceptorSelector`] backed by a closure.
pub struct FnSelector<F> {
    select: F,
}

impl<F> FnSelector<F>
where
    F: Fn(&ManagedTypeRc, &MethodRc, &[InterceptorRc]) -> Vec<InterceptorRc> + Send + Sync,
{
    /// Creates a selector from a closure.
    pub fn new(select: F) -> Self {
        Self { select }
    }
}

impl<F> InterceptorSelector for FnSelector<F>
where
    F: Fn(&ManagedTypeRc, &MethodRc, &[InterceptorRc]) -> Vec<InterceptorRc> + Send + Sync,
{
    fn select_interceptors(
        &self,
        ty: &ManagedTypeRc,
        method: &MethodRc,
        interceptors: &[InterceptorRc],
    ) -> Vec<InterceptorRc> {
        (self.select)(ty, method, interceptors)
    }
}
