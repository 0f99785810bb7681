use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! invalid_contract {
    // Single string version
    ($contract:expr, $msg:expr) => {
        crate::Error::InvalidContract {
            contract: $contract.to_string(),
            reason: $msg.to_string(),
        }
    };

    // Format string with arguments version
    ($contract:expr, $fmt:expr, $($arg:tt)*) => {
        crate::Error::InvalidContract {
            contract: $contract.to_string(),
            reason: format!($fmt, $($arg)*),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Configuration Errors
/// Raised at request time, before any proxy type is generated. None of them populate
/// the proxy type cache.
/// - [`Error::InvalidContract`] - The contract, an extra interface or the base type can not be proxied
/// - [`Error::MixinCollision`] - Two mixins implement the same interface
/// - [`Error::MixinInterfaceConflict`] - A mixin interface collides with the contract or an extra interface
/// - [`Error::ContractNotImplied`] - No contract could be inferred for a standalone request
/// - [`Error::Activation`] - A proxy instance could not be constructed from the given arguments
/// - [`Error::OptionsFrozen`] - Generation options were modified after they were finalized
///
/// ## Pipeline Errors
/// Raised at call time by the interception pipeline.
/// - [`Error::ProceedPastEnd`] - `proceed` was called more often than the chain allows
/// - [`Error::NoTarget`] - `proceed` reached a member that has no backing implementation
/// - [`Error::TargetChangeNotAllowed`], [`Error::InvalidTarget`] - Target substitution failures
/// - [`Error::ArgumentIndex`], [`Error::ArgumentCount`], [`Error::GenericArity`] - Call shape mismatches
/// - [`Error::MissingReturnValue`] - A value-typed member finished without a return value
/// - [`Error::ForeignProceedToken`] - A proceed token was used on another invocation
/// - [`Error::MemberNotProxied`], [`Error::AmbiguousMember`] - Member lookup failures on a proxy
///
/// # Examples
///
/// ```rust,ignore
/// match proxy.call("Add", &mut args) {
///     Ok(value) => println!("{:?}", value),
///     Err(Error::NoTarget { method }) => eprintln!("{} has no implementation", method),
///     Err(e) if e.is_configuration() => eprintln!("misconfigured: {}", e),
///     Err(e) => eprintln!("call failed: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    /// A requested contract, extra interface or base type can not be proxied.
    ///
    /// Covers sealed classes, open generic type definitions, interfaces where classes
    /// are required (and vice versa), and infrastructure interfaces that every proxy
    /// implements on its own.
    #[error("Can not create proxy for type {contract}: {reason}")]
    InvalidContract {
        /// Full name of the offending type
        contract: String,
        /// Why the type was rejected
        reason: String,
    },

    /// Two mixins implement the same interface.
    #[error("A mixin that implements {interface} was already added: {first} and {second} both implement it")]
    MixinCollision {
        /// Full name of the shared interface
        interface: String,
        /// Type of the mixin registered first
        first: String,
        /// Type of the mixin registered second
        second: String,
    },

    /// A mixin interface collides with the primary contract or an explicitly requested
    /// interface, directly or through its inherited interfaces.
    #[error("Mixin type {mixin} implements {interface}, which is also provided by {conflict}")]
    MixinInterfaceConflict {
        /// Type of the mixin instance
        mixin: String,
        /// The colliding interface
        interface: String,
        /// What the interface collides with (contract or extra interface)
        conflict: String,
    },

    /// A contract could not be inferred for a request that did not name one.
    #[error("Unable to imply a contract for target {target}: {reason}")]
    ContractNotImplied {
        /// Full name of the target type
        target: String,
        /// Why inference failed
        reason: String,
    },

    /// A proxy instance could not be constructed.
    #[error("Can not instantiate proxy of {contract} with arguments ({arguments}): {reason}")]
    Activation {
        /// Full name of the proxied contract
        contract: String,
        /// Description of the attempted activation arguments
        arguments: String,
        /// Why activation failed
        reason: String,
    },

    /// Generation options were mutated after they were finalized by a proxy request.
    #[error("GenerationOptions can not be modified after they have been used to generate a proxy")]
    OptionsFrozen,

    // Pipeline errors
    /// `proceed` was called after the chain was exhausted.
    ///
    /// This signifies a bug in an interceptor or in the calling code, not a missing
    /// implementation.
    #[error("Proceed was called for '{method}' more times than its {interceptors} interceptor(s) allow; the pipeline has already completed")]
    ProceedPastEnd {
        /// Display name of the proxied member
        method: String,
        /// Number of interceptors in the chain
        interceptors: usize,
    },

    /// `proceed` reached a member without a backing implementation.
    #[error("The interceptor attempted to proceed for '{method}', which has no target. There is no implementation to proceed to; an interceptor must provide the return value and out arguments")]
    NoTarget {
        /// Display name of the proxied member
        method: String,
    },

    /// A target substitution was attempted on a member that does not support it.
    #[error("The invocation target of '{method}' can not be changed")]
    TargetChangeNotAllowed {
        /// Display name of the proxied member
        method: String,
    },

    /// A substituted target is not usable for the member.
    #[error("Invalid target for '{method}': {reason}")]
    InvalidTarget {
        /// Display name of the proxied member
        method: String,
        /// Why the target was rejected
        reason: String,
    },

    /// Positional argument access out of range.
    #[error("Argument index {index} is out of range for '{method}' ({count} arguments)")]
    ArgumentIndex {
        /// Display name of the proxied member
        method: String,
        /// Requested index
        index: usize,
        /// Number of arguments
        count: usize,
    },

    /// A call supplied the wrong number of arguments.
    #[error("'{method}' expects {expected} arguments, {actual} were supplied")]
    ArgumentCount {
        /// Display name of the proxied member
        method: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// A generic method was invoked with the wrong number of type arguments.
    #[error("'{method}' expects {expected} generic arguments, {actual} were supplied")]
    GenericArity {
        /// Display name of the proxied member
        method: String,
        /// Declared generic parameter count
        expected: usize,
        /// Supplied type argument count
        actual: usize,
    },

    /// A member returning a value type completed without a return value.
    #[error("Interceptors failed to set a return value for '{method}', or swallowed the error raised by the target")]
    MissingReturnValue {
        /// Display name of the proxied member
        method: String,
    },

    /// A proceed token captured on one invocation was applied to another.
    #[error("The proceed token does not belong to the invocation of '{method}'")]
    ForeignProceedToken {
        /// Display name of the proxied member
        method: String,
    },

    /// The member is not intercepted by the proxy type.
    #[error("Member '{member}' is not proxied by {proxy}")]
    MemberNotProxied {
        /// The requested member
        member: String,
        /// Name of the proxy type
        proxy: String,
    },

    /// A member lookup by name matched more than one proxied member.
    #[error("Member name '{name}' is ambiguous on {proxy}")]
    AmbiguousMember {
        /// The requested member name
        name: String,
        /// Name of the proxy type
        proxy: String,
    },

    // Type system errors
    /// Failed to find type in `TypeRegistry`.
    #[error("Failed to find type in TypeRegistry - {0}")]
    TypeNotFound(Token),

    /// Recursion limit reached while walking an interface hierarchy.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// The proxy backend failed to build a type.
    #[error("Proxy backend failure: {0}")]
    Backend(String),

    /// Generic error for miscellaneous failures.
    ///
    /// Used by method bodies and interceptors that need to report a domain failure
    /// through the pipeline.
    #[error("{0}")]
    Error(String),
}

impl Error {
    /// Returns true for errors raised at request time, before generation.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidContract { .. }
                | Error::MixinCollision { .. }
                | Error::MixinInterfaceConflict { .. }
                | Error::ContractNotImplied { .. }
                | Error::Activation { .. }
                | Error::OptionsFrozen
                | Error::RecursionLimit(_)
        )
    }

    /// Returns true for errors raised by the interception pipeline at call time.
    #[must_use]
    pub fn is_pipeline(&self) -> bool {
        matches!(
            self,
            Error::ProceedPastEnd { .. }
                | Error::NoTarget { .. }
                | Error::TargetChangeNotAllowed { .. }
                | Error::InvalidTarget { .. }
                | Error::ArgumentIndex { .. }
                | Error::ArgumentCount { .. }
                | Error::GenericArity { .. }
                | Error::MissingReturnValue { .. }
                | Error::ForeignProceedToken { .. }
        )
    }
}
