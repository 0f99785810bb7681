//! Proceed tokens.
//!
//! A [`ProceedToken`] remembers a position in an invocation's interceptor chain so the
//! rest of the chain can be run later, for example from a completion callback after the
//! interceptor itself has returned. Tokens can be sent to other threads; the invocation
//! they belong to still has to be handed back to proceed.

use crate::{interception::Invocation, metadata::value::Value, Result};

/// Arguments and return value captured together with a position.
#[derive(Debug, Clone)]
pub struct CapturedState {
    /// Arguments at capture time
    pub arguments: Vec<Value>,
    /// Return value at capture time
    pub return_value: Value,
}

/// A saved position in an invocation's interceptor chain.
#[derive(Debug, Clone)]
pub struct ProceedToken {
    pub(crate) invocation: u64,
    pub(crate) cursor: usize,
    pub(crate) state: Option<CapturedState>,
}

impl ProceedToken {
    /// Id of the invocation the token belongs to
    #[must_use]
    pub fn invocation_id(&self) -> u64 {
        self.invocation
    }

    /// The captured arguments and return value, if any
    #[must_use]
    pub fn state(&self) -> Option<&CapturedState> {
        self.state.as_ref()
    }

    /// Continues `invocation` from the saved position.
    ///
    /// # Errors
    /// See [`Invocation::resume`].
    pub fn proceed(&self, invocation: &mut Invocation) -> Result<()> {
        invocation.resume(self)
    }
}
