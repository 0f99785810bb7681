use std::sync::{Arc, Weak};

use crate::{
    metadata::{
        method::{
            CallFrame, Method, MethodAccessFlags, MethodBody, MethodModifiers, ParamMode,
            Parameter, TypeSig,
        },
        token::Token,
        typesystem::ManagedType,
        value::{ObjectRef, Value},
    },
    Result,
};

/// Fluent builder for [`Method`] definitions.
///
/// Methods default to `public`, non-virtual and `void`. Interface methods are forced
/// to `public abstract virtual` when the declaring interface is built.
#[derive(Clone)]
pub struct MethodBuilder {
    name: String,
    access: MethodAccessFlags,
    modifiers: MethodModifiers,
    params: Vec<Parameter>,
    return_type: TypeSig,
    generic_params: Vec<String>,
    body: Option<MethodBody>,
}

impl MethodBuilder {
    /// Starts a public, non-virtual `void` method.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            access: MethodAccessFlags::PUBLIC,
            modifiers: MethodModifiers::HIDE_BY_SIG,
            params: Vec::new(),
            return_type: TypeSig::Void,
            generic_params: Vec::new(),
            body: None,
        }
    }

    /// The method name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn with_name(mut self, name: String) -> Self {
        self.name = name;
        self
    }

    /// Sets the accessibility
    #[must_use]
    pub fn access(mut self, access: MethodAccessFlags) -> Self {
        self.access = access;
        self
    }

    /// `public`
    #[must_use]
    pub fn public(self) -> Self {
        self.access(MethodAccessFlags::PUBLIC)
    }

    /// `protected`
    #[must_use]
    pub fn protected(self) -> Self {
        self.access(MethodAccessFlags::FAMILY)
    }

    /// `internal`
    #[must_use]
    pub fn internal(self) -> Self {
        self.access(MethodAccessFlags::ASSEM)
    }

    /// `protected internal`
    #[must_use]
    pub fn protected_internal(self) -> Self {
        self.access(MethodAccessFlags::FAM_OR_ASSEM)
    }

    /// `private`
    #[must_use]
    pub fn private(self) -> Self {
        self.access(MethodAccessFlags::PRIVATE)
    }

    /// `virtual`
    #[must_use]
    pub fn make_virtual(mut self) -> Self {
        self.modifiers |= MethodModifiers::VIRTUAL;
        self
    }

    /// `sealed override`
    #[must_use]
    pub fn sealed(mut self) -> Self {
        self.modifiers |= MethodModifiers::VIRTUAL | MethodModifiers::FINAL;
        self
    }

    /// `abstract`
    #[must_use]
    pub fn make_abstract(mut self) -> Self {
        self.modifiers |= MethodModifiers::VIRTUAL | MethodModifiers::ABSTRACT;
        self
    }

    /// `static`
    #[must_use]
    pub fn make_static(mut self) -> Self {
        self.modifiers |= MethodModifiers::STATIC;
        self
    }

    /// Marks a property or event accessor
    #[must_use]
    pub fn special_name(mut self) -> Self {
        self.modifiers |= MethodModifiers::SPECIAL_NAME;
        self
    }

    /// Adds a by-value parameter
    #[must_use]
    pub fn param(self, name: impl Into<String>, sig: TypeSig) -> Self {
        self.push_param(name, sig, ParamMode::In)
    }

    /// Adds a `ref` parameter
    #[must_use]
    pub fn ref_param(self, name: impl Into<String>, sig: TypeSig) -> Self {
        self.push_param(name, sig, ParamMode::Ref)
    }

    /// Adds an `out` parameter
    #[must_use]
    pub fn out_param(self, name: impl Into<String>, sig: TypeSig) -> Self {
        self.push_param(name, sig, ParamMode::Out)
    }

    fn push_param(mut self, name: impl Into<String>, sig: TypeSig, mode: ParamMode) -> Self {
        self.params.push(Parameter {
            name: name.into(),
            sig,
            mode,
        });
        self
    }

    /// Sets the return type
    #[must_use]
    pub fn returns(mut self, sig: TypeSig) -> Self {
        self.return_type = sig;
        self
    }

    /// Adds a method generic parameter, referenced as [`TypeSig::MethodParam`]
    #[must_use]
    pub fn generic(mut self, name: impl Into<String>) -> Self {
        self.generic_params.push(name.into());
        self
    }

    /// Sets the implementation
    #[must_use]
    pub fn body<F>(mut self, body: F) -> Self
    where
        F: Fn(&ObjectRef, &mut CallFrame) -> Result<Value> + Send + Sync + 'static,
    {
        self.body = Some(Arc::new(body));
        self
    }

    /// Builds the method for its declaring type.
    pub(crate) fn build(self, token: Token, declaring_type: Weak<ManagedType>, interface: bool) -> Method {
        let mut access = self.access;
        let mut modifiers = self.modifiers;
        let mut body = self.body;

        if interface && !modifiers.contains(MethodModifiers::STATIC) {
            access = MethodAccessFlags::PUBLIC;
            modifiers |= MethodModifiers::VIRTUAL | MethodModifiers::ABSTRACT | MethodModifiers::NEW_SLOT;
            body = None;
        }
        if modifiers.contains(MethodModifiers::ABSTRACT) {
            body = None;
        }

        Method {
            token,
            name: self.name,
            access,
            modifiers,
            params: self.params,
            return_type: self.return_type,
            generic_params: self.generic_params,
            declaring_type,
            body,
        }
    }
}
