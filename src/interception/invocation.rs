//! The invocation of a proxied member and the Proceed protocol.
//!
//! Every call of an intercepted member creates one [`Invocation`]. It owns a copy of
//! the arguments, the return value slot and a cursor into the interceptor chain.
//!
//! # Proceed
//!
//! Each [`Invocation::proceed`] advances the cursor by one:
//!
//! - while interceptors remain, the next one runs
//! - right after the last interceptor, the call forwards to the implementation, or
//!   fails with [`Error::NoTarget`] if there is none
//! - past that, it fails with [`Error::ProceedPastEnd`]
//!
//! When the step returns, the cursor is restored, so an interceptor may proceed more
//! than once (for retries) and nested interceptors see a consistent position.
//!
//! Once the top-level call driven by [`Invocation::run`] has completed, a direct
//! `proceed` fails with [`Error::ProceedPastEnd`]. A [`ProceedToken`] captured earlier
//! still continues the chain from where it was captured.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crate::{
    interception::{token::CapturedState, InterceptorRc, ProceedToken},
    metadata::{
        method::{CallFrame, MethodInstance, MethodRc, ParamMode},
        typesystem::ManagedTypeRc,
        value::{ObjectRef, Value},
    },
    proxy::{Callback, InvocationDescriptor, ProxyInstance},
    Error, Result,
};

static NEXT_INVOCATION_ID: AtomicU64 = AtomicU64::new(1);

/// Everything an [`Invocation`] is created from.
pub struct InvocationParts {
    /// Forwarding metadata of the member
    pub descriptor: Arc<InvocationDescriptor>,
    /// The proxy the member was called on
    pub proxy: ObjectRef,
    /// The object the call forwards to
    pub target: Option<ObjectRef>,
    /// The interceptor chain; `None` forwards straight to the target
    pub interceptors: Option<Vec<InterceptorRc>>,
    /// Call arguments
    pub arguments: Vec<Value>,
    /// Type arguments of a generic method call
    pub generic_arguments: Vec<ManagedTypeRc>,
}

/// A single call of a proxied member.
pub struct Invocation {
    id: u64,
    descriptor: Arc<InvocationDescriptor>,
    proxy: ObjectRef,
    target: Option<ObjectRef>,
    interceptors: Option<Arc<[InterceptorRc]>>,
    // Number of steps entered; the next proceed runs interceptor `cursor`
    cursor: usize,
    arguments: Vec<Value>,
    return_value: Value,
    generic_arguments: Vec<ManagedTypeRc>,
    completed: bool,
}

impl Invocation {
    /// Creates an invocation positioned before the first interceptor.
    #[must_use]
    pub fn new(parts: InvocationParts) -> Self {
        Self {
            id: NEXT_INVOCATION_ID.fetch_add(1, Ordering::Relaxed),
            descriptor: parts.descriptor,
            proxy: parts.proxy,
            target: parts.target,
            interceptors: parts.interceptors.map(Arc::from),
            cursor: 0,
            arguments: parts.arguments,
            return_value: Value::Void,
            generic_arguments: parts.generic_arguments,
            completed: false,
        }
    }

    /// Unique id of this invocation
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The proxied member
    #[must_use]
    pub fn method(&self) -> &MethodRc {
        &self.descriptor.member
    }

    /// The proxied member closed over the call's type arguments
    #[must_use]
    pub fn concrete_method(&self) -> MethodInstance {
        MethodInstance {
            method: self.descriptor.member.clone(),
            type_arguments: self.generic_arguments.clone(),
        }
    }

    /// The method the call forwards to, if it can be resolved
    #[must_use]
    pub fn method_invocation_target(&self) -> Option<MethodRc> {
        match &self.descriptor.callback {
            Callback::Resolved(method) => Some(method.clone()),
            Callback::Dynamic => {
                let target = self.target.as_ref()?;
                if ProxyInstance::from_object(target).is_some() {
                    return Some(self.descriptor.member.clone());
                }
                target.ty().find_implementation(&self.descriptor.member)
            }
            Callback::None => None,
        }
    }

    /// [`Invocation::method_invocation_target`] closed over the call's type arguments
    #[must_use]
    pub fn concrete_method_invocation_target(&self) -> Option<MethodInstance> {
        self.method_invocation_target().map(|method| MethodInstance {
            method,
            type_arguments: self.descriptor.map_generic_arguments(&self.generic_arguments),
        })
    }

    /// The forwarding metadata of the member
    #[must_use]
    pub fn descriptor(&self) -> &InvocationDescriptor {
        &self.descriptor
    }

    /// The proxy the member was called on
    #[must_use]
    pub fn proxy(&self) -> &ObjectRef {
        &self.proxy
    }

    /// The object the call forwards to: the target, a mixin instance, or for class
    /// proxies the instance of the proxied class
    #[must_use]
    pub fn invocation_target(&self) -> Option<&ObjectRef> {
        self.target.as_ref()
    }

    /// Type of [`Invocation::invocation_target`]
    #[must_use]
    pub fn target_type(&self) -> Option<ManagedTypeRc> {
        self.target.as_ref().map(|target| target.ty().clone())
    }

    /// Type arguments of a generic method call
    #[must_use]
    pub fn generic_arguments(&self) -> &[ManagedTypeRc] {
        &self.generic_arguments
    }

    /// All arguments
    #[must_use]
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// All arguments, mutable
    pub fn arguments_mut(&mut self) -> &mut [Value] {
        &mut self.arguments
    }

    /// The argument at `index`.
    ///
    /// # Errors
    /// Returns [`Error::ArgumentIndex`] if `index` is out of range.
    pub fn argument(&self, index: usize) -> Result<&Value> {
        self.arguments.get(index).ok_or_else(|| Error::ArgumentIndex {
            method: self.descriptor.member_name(),
            index,
            count: self.arguments.len(),
        })
    }

    /// Replaces the argument at `index`.
    ///
    /// # Errors
    /// Returns [`Error::ArgumentIndex`] if `index` is out of range.
    pub fn set_argument(&mut self, index: usize, value: Value) -> Result<()> {
        let count = self.arguments.len();
        match self.arguments.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::ArgumentIndex {
                method: self.descriptor.member_name(),
                index,
                count,
            }),
        }
    }

    /// The return value; [`Value::Void`] until something sets it
    #[must_use]
    pub fn return_value(&self) -> &Value {
        &self.return_value
    }

    /// Sets the return value
    pub fn set_return_value(&mut self, value: Value) {
        self.return_value = value;
    }

    /// Takes the return value, leaving [`Value::Void`]
    pub fn take_return_value(&mut self) -> Value {
        std::mem::take(&mut self.return_value)
    }

    /// Returns true once [`Invocation::run`] has finished
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Drives the call from the first interceptor and marks the invocation completed.
    ///
    /// # Errors
    /// Whatever the chain returns.
    pub fn run(&mut self) -> Result<()> {
        if self.completed {
            return Err(self.past_end());
        }
        let result = self.step();
        self.completed = true;
        result
    }

    /// Continues with the next interceptor, or with the implementation after the last.
    ///
    /// # Errors
    /// - [`Error::ProceedPastEnd`] if the chain is exhausted or the call already
    ///   completed
    /// - [`Error::NoTarget`] if the member has no implementation to forward to
    /// - whatever the next interceptor or the implementation returns
    pub fn proceed(&mut self) -> Result<()> {
        if self.completed {
            tracing::warn!(
                method = %self.descriptor.member_name(),
                "proceed called after the invocation completed"
            );
            return Err(self.past_end());
        }
        self.step()
    }

    /// Remembers the current position in the chain.
    #[must_use]
    pub fn capture_proceed_info(&self) -> ProceedToken {
        ProceedToken {
            invocation: self.id,
            cursor: self.cursor,
            state: None,
        }
    }

    /// Remembers the current position together with the arguments and return value,
    /// which are restored when the token is used.
    #[must_use]
    pub fn capture_proceed_state(&self) -> ProceedToken {
        ProceedToken {
            invocation: self.id,
            cursor: self.cursor,
            state: Some(CapturedState {
                arguments: self.arguments.clone(),
                return_value: self.return_value.clone(),
            }),
        }
    }

    /// Continues the chain from the position saved in `token`, also after the
    /// invocation completed. The current position is restored afterwards.
    ///
    /// # Errors
    /// Returns [`Error::ForeignProceedToken`] if the token belongs to another invocation,
    /// otherwise see [`Invocation::proceed`].
    pub fn resume(&mut self, token: &ProceedToken) -> Result<()> {
        if token.invocation != self.id {
            return Err(Error::ForeignProceedToken {
                method: self.descriptor.member_name(),
            });
        }
        if let Some(state) = &token.state {
            self.arguments.clone_from(&state.arguments);
            self.return_value = state.return_value.clone();
        }

        let previous = self.cursor;
        self.cursor = token.cursor;
        let result = self.step();
        self.cursor = previous;
        result
    }

    /// Replaces the object this call forwards to.
    ///
    /// # Errors
    /// - [`Error::TargetChangeNotAllowed`] unless the proxy was created for a target
    ///   interface
    /// - [`Error::InvalidTarget`] if `target` does not implement the contract or is the
    ///   proxy itself
    pub fn change_invocation_target(&mut self, target: ObjectRef) -> Result<()> {
        self.ensure_target_change(&target)?;
        self.target = Some(target);
        Ok(())
    }

    /// Replaces the target of the proxy for all later calls. The running call keeps
    /// its target.
    ///
    /// # Errors
    /// See [`Invocation::change_invocation_target`].
    pub fn change_proxy_target(&mut self, target: ObjectRef) -> Result<()> {
        self.ensure_target_change(&target)?;
        let proxy = ProxyInstance::from_object(&self.proxy).ok_or_else(|| Error::InvalidTarget {
            method: self.descriptor.member_name(),
            reason: "the invocation was not created by a proxy instance".to_string(),
        })?;
        proxy.set_target(target);
        Ok(())
    }

    fn ensure_target_change(&self, target: &ObjectRef) -> Result<()> {
        if !self.descriptor.can_change_target {
            return Err(Error::TargetChangeNotAllowed {
                method: self.descriptor.member_name(),
            });
        }
        if target.same_instance(&self.proxy) {
            return Err(Error::InvalidTarget {
                method: self.descriptor.member_name(),
                reason: "a proxy can not be its own target".to_string(),
            });
        }
        if !target.ty().is_assignable_to(&self.descriptor.contract) {
            return Err(Error::InvalidTarget {
                method: self.descriptor.member_name(),
                reason: format!(
                    "{} does not implement {}",
                    target.ty().fullname(),
                    self.descriptor.contract.fullname()
                ),
            });
        }
        Ok(())
    }

    fn past_end(&self) -> Error {
        Error::ProceedPastEnd {
            method: self.descriptor.member_name(),
            interceptors: self.interceptors.as_ref().map_or(0, |chain| chain.len()),
        }
    }

    fn step(&mut self) -> Result<()> {
        let Some(interceptors) = self.interceptors.clone() else {
            return self.invoke_target();
        };

        let index = self.cursor;
        self.cursor += 1;
        let result = match interceptors.get(index) {
            Some(interceptor) => {
                tracing::trace!(
                    method = %self.descriptor.member_name(),
                    interceptor = interceptor.name(),
                    index,
                    "entering interceptor"
                );
                interceptor.intercept(self)
            }
            None if index == interceptors.len() => self.invoke_target(),
            None => {
                tracing::warn!(
                    method = %self.descriptor.member_name(),
                    index,
                    "proceed called past the end of the interceptor chain"
                );
                Err(self.past_end())
            }
        };
        self.cursor = index;
        result
    }

    fn invoke_target(&mut self) -> Result<()> {
        let descriptor = Arc::clone(&self.descriptor);
        let target = match (&descriptor.callback, &self.target) {
            (Callback::None, _) | (_, None) => return descriptor.no_target(),
            (_, Some(target)) => target.clone(),
        };

        let mut arguments = self.arguments.clone();
        for slot in &descriptor.by_ref_slots {
            if let Some(cell) = arguments.get_mut(slot.index) {
                if slot.mode == ParamMode::Out && cell.is_void() {
                    *cell = Value::default_for(&slot.sig, &self.generic_arguments);
                }
            }
        }
        let generic_arguments = descriptor.map_generic_arguments(&self.generic_arguments);

        let result = if let Some(inner) = ProxyInstance::from_object(&target) {
            inner.invoke(&descriptor.member, &generic_arguments, &mut arguments)
        } else {
            let callback = match &descriptor.callback {
                Callback::Resolved(method) => method.clone(),
                Callback::Dynamic => target
                    .ty()
                    .find_implementation(&descriptor.member)
                    .filter(|method| !method.is_abstract())
                    .ok_or_else(|| Error::InvalidTarget {
                        method: descriptor.member_name(),
                        reason: format!("{} does not implement it", target.ty().fullname()),
                    })?,
                Callback::None => return descriptor.no_target(),
            };

            let mut frame = CallFrame {
                method: callback.clone(),
                arguments,
                generic_arguments,
            };
            let result = callback.invoke(&target, &mut frame);
            arguments = frame.arguments;
            result
        };

        for slot in &descriptor.by_ref_slots {
            if let (Some(cell), Some(written)) =
                (self.arguments.get_mut(slot.index), arguments.get(slot.index))
            {
                cell.clone_from(written);
            }
        }
        self.return_value = result?;
        Ok(())
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("id", &self.id)
            .field("method", &self.descriptor.member_name())
            .field("cursor", &self.cursor)
            .field("interceptors", &self.interceptors.as_ref().map(|chain| chain.len()))
            .field("arguments", &self.arguments)
            .field("return_value", &self.return_value)
            .field("completed", &self.completed)
            .finish()
    }
}
