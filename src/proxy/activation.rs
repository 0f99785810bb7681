//! Generated proxy types and their instances.
//!
//! A [`ProxyType`] is what the generator caches: the members it intercepts, one
//! [`InvocationDescriptor`] per intercepted method, and the layout of the instances it
//! creates. [`ProxyType::create_instance`] activates it with the mixin instances,
//! interceptors, target and selector of one proxy object.
//!
//! Calls enter a [`ProxyInstance`] through [`ProxyInstance::call`] (by name) or
//! [`ProxyInstance::invoke`] (by method). Intercepted members run the interception
//! pipeline; everything else goes straight to the implementation.

use std::{any::Any, collections::HashMap, fmt, sync::Arc};

use parking_lot::RwLock;

use crate::{
    interception::{InterceptorRc, Invocation, InvocationParts},
    metadata::{
        method::{CallFrame, MethodRc, TypeSig},
        token::Token,
        typesystem::ManagedTypeRc,
        value::{ObjectRef, Value},
    },
    proxy::{
        backend::ProxyBlueprint,
        collector::MemberToGenerate,
        descriptor::{InvocationDescriptor, TargetField},
        hook::SelectorRc,
        identity::ProxyFlavor,
        options::AttributeInfo,
    },
    Error, Result,
};

/// Reference to a `ProxyType`
pub type ProxyTypeRc = Arc<ProxyType>;
/// Reference to a `ProxyInstance`
pub type ProxyInstanceRc = Arc<ProxyInstance>;

/// A generated proxy type.
pub struct ProxyType {
    name: String,
    flavor: ProxyFlavor,
    contract: ManagedTypeRc,
    base_type: ManagedTypeRc,
    interfaces: Vec<ManagedTypeRc>,
    target_type: Option<ManagedTypeRc>,
    mixin_layout: Vec<ManagedTypeRc>,
    managed: ManagedTypeRc,
    members: Vec<MemberToGenerate>,
    dispatch: HashMap<Token, Arc<InvocationDescriptor>>,
    by_name: HashMap<String, Vec<Token>>,
    attributes: Vec<AttributeInfo>,
}

impl ProxyType {
    /// Creates the proxy type of a blueprint, represented in the type model by
    /// `managed`.
    #[must_use]
    pub fn from_blueprint(blueprint: ProxyBlueprint, managed: ManagedTypeRc) -> Self {
        let mut dispatch = HashMap::with_capacity(blueprint.descriptors.len());
        let mut by_name: HashMap<String, Vec<Token>> = HashMap::new();

        for descriptor in blueprint.descriptors {
            let token = descriptor.member.token;
            for key in [descriptor.member.name.clone(), descriptor.member.full_name()] {
                let tokens = by_name.entry(key).or_default();
                if !tokens.contains(&token) {
                    tokens.push(token);
                }
            }
            dispatch.insert(token, Arc::new(descriptor));
        }

        Self {
            name: blueprint.name,
            flavor: blueprint.flavor,
            contract: blueprint.contract,
            base_type: blueprint.base_type,
            interfaces: blueprint.interfaces,
            target_type: blueprint.target_type,
            mixin_layout: blueprint.mixin_layout,
            managed,
            members: blueprint.members,
            dispatch,
            by_name,
            attributes: blueprint.attributes,
        }
    }

    /// Name of the generated type, unique within its scope
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The kind of proxy
    #[must_use]
    pub fn flavor(&self) -> ProxyFlavor {
        self.flavor
    }

    /// The proxied contract
    #[must_use]
    pub fn contract(&self) -> &ManagedTypeRc {
        &self.contract
    }

    /// The class the proxy derives from
    #[must_use]
    pub fn base_type(&self) -> &ManagedTypeRc {
        &self.base_type
    }

    /// Every interface the proxy implements, infrastructure included
    #[must_use]
    pub fn interfaces(&self) -> &[ManagedTypeRc] {
        &self.interfaces
    }

    /// Type of the targets instances forward to, for the with-target flavor
    #[must_use]
    pub fn target_type(&self) -> Option<&ManagedTypeRc> {
        self.target_type.as_ref()
    }

    /// Types of the mixin instances, one per mixin interface position
    #[must_use]
    pub fn mixin_layout(&self) -> &[ManagedTypeRc] {
        &self.mixin_layout
    }

    /// The proxy type as registered in the type model
    #[must_use]
    pub fn managed_type(&self) -> &ManagedTypeRc {
        &self.managed
    }

    /// The intercepted members
    #[must_use]
    pub fn members(&self) -> &[MemberToGenerate] {
        &self.members
    }

    /// Attributes applied to the type
    #[must_use]
    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }

    /// Returns true if the proxy type implements `interface`
    #[must_use]
    pub fn implements(&self, interface: &ManagedTypeRc) -> bool {
        self.interfaces.iter().any(|i| i.token == interface.token)
    }

    /// The descriptor of an intercepted method
    #[must_use]
    pub fn descriptor(&self, method: Token) -> Option<&Arc<InvocationDescriptor>> {
        self.dispatch.get(&method)
    }

    /// All invocation descriptors
    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<InvocationDescriptor>> {
        self.dispatch.values()
    }

    /// Looks up an intercepted method by name or full name.
    ///
    /// # Errors
    /// Returns [`Error::AmbiguousMember`] if several methods share the name.
    pub fn find_descriptor(&self, name: &str) -> Result<Option<&Arc<InvocationDescriptor>>> {
        match self.by_name.get(name).map(Vec::as_slice) {
            None | Some([]) => Ok(None),
            Some([token]) => Ok(self.dispatch.get(token)),
            Some(_) => Err(Error::AmbiguousMember {
                name: name.to_string(),
                proxy: self.name.clone(),
            }),
        }
    }

    /// Creates an instance.
    ///
    /// # Errors
    /// Returns [`Error::Activation`] if the arguments do not fit the proxy type: mixin
    /// instances that do not match the layout, a missing or unsuitable target, a
    /// target for a class proxy, or a failing base class constructor.
    pub fn create_instance(self: &Arc<Self>, args: ActivationArgs) -> Result<ProxyInstanceRc> {
        let fail = |reason: String| Error::Activation {
            contract: self.contract.fullname(),
            arguments: args.describe(),
            reason,
        };

        if args.mixins.len() != self.mixin_layout.len() {
            return Err(fail(format!(
                "expected {} mixin instances, got {}",
                self.mixin_layout.len(),
                args.mixins.len()
            )));
        }
        if let Some((position, (mixin, expected))) = args
            .mixins
            .iter()
            .zip(&self.mixin_layout)
            .enumerate()
            .find(|(_, (mixin, expected))| mixin.ty().token != expected.token)
        {
            return Err(fail(format!(
                "mixin {} is a {}, expected {}",
                position,
                mixin.ty().fullname(),
                expected.fullname()
            )));
        }

        match (&args.target, self.flavor) {
            (Some(_), ProxyFlavor::Class | ProxyFlavor::InterfaceWithoutTarget) => {
                return Err(fail(format!("{} proxies do not take a target", self.flavor)));
            }
            (None, flavor) if flavor.has_target() => {
                return Err(fail("a target is required".to_string()));
            }
            (Some(target), _) => {
                let required = self.target_type.as_ref().unwrap_or(&self.contract);
                if !target.ty().is_assignable_to(required) {
                    return Err(fail(format!(
                        "target {} is not a {}",
                        target.ty().fullname(),
                        required.fullname()
                    )));
                }
            }
            (None, _) => {}
        }

        if self.flavor != ProxyFlavor::Class && !args.constructor_arguments.is_empty() {
            return Err(fail("interface proxies take no constructor arguments".to_string()));
        }
        let base = self
            .base_type
            .construct(&args.constructor_arguments)
            .map_err(|error| fail(error.to_string()))?;

        tracing::trace!(proxy = %self.name, "activated proxy instance");
        Ok(Arc::new(ProxyInstance {
            ty: Arc::clone(self),
            base,
            target: RwLock::new(args.target),
            mixins: args.mixins,
            interceptors: args.interceptors,
            selector: args.selector,
        }))
    }
}

impl fmt::Debug for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyType")
            .field("name", &self.name)
            .field("flavor", &self.flavor)
            .field("contract", &self.contract.fullname())
            .field("base_type", &self.base_type.fullname())
            .field("intercepted", &self.dispatch.len())
            .field("mixins", &self.mixin_layout.len())
            .finish()
    }
}

/// Constructor arguments of a proxy instance, in activation order.
#[derive(Clone, Default)]
pub struct ActivationArgs {
    /// One instance per mixin interface position
    pub mixins: Vec<ObjectRef>,
    /// The interceptor chain
    pub interceptors: Vec<InterceptorRc>,
    /// The target, for flavors that have one
    pub target: Option<ObjectRef>,
    /// The interceptor selector
    pub selector: Option<SelectorRc>,
    /// Arguments of the proxied class's constructor
    pub constructor_arguments: Vec<Value>,
}

impl ActivationArgs {
    fn describe(&self) -> String {
        let mixins: Vec<String> = self.mixins.iter().map(|m| m.ty().fullname()).collect();
        format!(
            "mixins: [{}], interceptors: {}, target: {}, selector: {}, constructor: {:?}",
            mixins.join(", "),
            self.interceptors.len(),
            self.target
                .as_ref()
                .map_or_else(|| "none".to_string(), |t| t.ty().fullname()),
            if self.selector.is_some() { "yes" } else { "no" },
            self.constructor_arguments
        )
    }
}

/// An instance of a proxy type.
pub struct ProxyInstance {
    ty: ProxyTypeRc,
    base: ObjectRef,
    target: RwLock<Option<ObjectRef>>,
    mixins: Vec<ObjectRef>,
    interceptors: Vec<InterceptorRc>,
    selector: Option<SelectorRc>,
}

impl ProxyInstance {
    /// The proxy type
    #[must_use]
    pub fn proxy_type(&self) -> &ProxyTypeRc {
        &self.ty
    }

    /// The instance as an object of the type model, usable as an argument or as the
    /// target of another proxy
    #[must_use]
    pub fn as_object(self: &Arc<Self>) -> ObjectRef {
        let state: Arc<dyn Any + Send + Sync> = self.clone();
        ObjectRef::from_state(&self.ty.managed, state)
    }

    /// Recovers the proxy behind an object created by [`ProxyInstance::as_object`]
    #[must_use]
    pub fn from_object(object: &ObjectRef) -> Option<ProxyInstanceRc> {
        Arc::clone(object.state()).downcast::<ProxyInstance>().ok()
    }

    /// The current target
    #[must_use]
    pub fn target(&self) -> Option<ObjectRef> {
        self.target.read().clone()
    }

    /// Replaces the target for all later calls.
    pub(crate) fn set_target(&self, target: ObjectRef) {
        tracing::debug!(
            proxy = %self.ty.name,
            target = %target.ty().fullname(),
            "proxy target changed"
        );
        *self.target.write() = Some(target);
    }

    /// The instance of the base class; for class proxies this is the proxied object
    #[must_use]
    pub fn base(&self) -> &ObjectRef {
        &self.base
    }

    /// Mixin instances by position
    #[must_use]
    pub fn mixins(&self) -> &[ObjectRef] {
        &self.mixins
    }

    /// The interceptor chain
    #[must_use]
    pub fn interceptors(&self) -> &[InterceptorRc] {
        &self.interceptors
    }

    /// The object behind the proxy: the target, or for class proxies the base instance
    #[must_use]
    pub fn unproxied(self: &Arc<Self>) -> ObjectRef {
        match (self.target(), self.ty.flavor) {
            (Some(target), _) => target,
            (None, ProxyFlavor::Class) => self.base.clone(),
            (None, _) => self.as_object(),
        }
    }

    /// Calls a member by name or full name.
    ///
    /// `ref` and `out` results are written back into `arguments`.
    ///
    /// # Errors
    /// - [`Error::MemberNotProxied`] if the proxy has no such member
    /// - [`Error::AmbiguousMember`] if the name matches several intercepted methods
    /// - any pipeline error, see [`ProxyInstance::invoke`]
    pub fn call(self: &Arc<Self>, name: &str, arguments: &mut [Value]) -> Result<Value> {
        self.call_generic(name, &[], arguments)
    }

    /// Calls a generic member by name, closed over `generic_arguments`.
    ///
    /// # Errors
    /// See [`ProxyInstance::call`].
    pub fn call_generic(
        self: &Arc<Self>,
        name: &str,
        generic_arguments: &[ManagedTypeRc],
        arguments: &mut [Value],
    ) -> Result<Value> {
        if let Some(descriptor) = self.ty.find_descriptor(name)? {
            let member = descriptor.member.clone();
            return self.invoke(&member, generic_arguments, arguments);
        }

        let method = self.find_unproxied(name).ok_or_else(|| Error::MemberNotProxied {
            member: name.to_string(),
            proxy: self.ty.name.clone(),
        })?;
        self.invoke(&method, generic_arguments, arguments)
    }

    /// Reads a property
    ///
    /// # Errors
    /// See [`ProxyInstance::call`].
    pub fn get(self: &Arc<Self>, property: &str) -> Result<Value> {
        self.call(&format!("get_{}", property), &mut [])
    }

    /// Writes a property
    ///
    /// # Errors
    /// See [`ProxyInstance::call`].
    pub fn set(self: &Arc<Self>, property: &str, value: Value) -> Result<()> {
        self.call(&format!("set_{}", property), &mut [value])
            .map(|_| ())
    }

    /// Calls `method` on the proxy.
    ///
    /// Intercepted methods run the interceptor chain; other methods are executed on
    /// the target, the base instance or the proxy itself.
    ///
    /// # Errors
    /// - [`Error::ArgumentCount`] or [`Error::GenericArity`] if the call does not match
    ///   the method's shape
    /// - [`Error::MissingReturnValue`] if a value-typed member completed without a
    ///   return value
    /// - whatever the interceptors or the implementation return
    pub fn invoke(
        self: &Arc<Self>,
        method: &MethodRc,
        generic_arguments: &[ManagedTypeRc],
        arguments: &mut [Value],
    ) -> Result<Value> {
        if arguments.len() != method.params.len() {
            return Err(Error::ArgumentCount {
                method: method.full_name(),
                expected: method.params.len(),
                actual: arguments.len(),
            });
        }
        if generic_arguments.len() != method.generic_params.len() {
            return Err(Error::GenericArity {
                method: method.full_name(),
                expected: method.generic_params.len(),
                actual: generic_arguments.len(),
            });
        }

        match self.ty.descriptor(method.token) {
            Some(descriptor) => {
                let descriptor = Arc::clone(descriptor);
                self.dispatch(&descriptor, generic_arguments, arguments)
            }
            None => self.invoke_unproxied(method, generic_arguments, arguments),
        }
    }

    fn dispatch(
        self: &Arc<Self>,
        descriptor: &Arc<InvocationDescriptor>,
        generic_arguments: &[ManagedTypeRc],
        arguments: &mut [Value],
    ) -> Result<Value> {
        let interceptors = match &self.selector {
            Some(selector) => selector.select_interceptors(
                &descriptor.contract,
                &descriptor.member,
                &self.interceptors,
            ),
            None => self.interceptors.clone(),
        };
        let target = match descriptor.target_field {
            TargetField::Primary => self.target(),
            TargetField::Mixin(position) => self.mixins.get(position).cloned(),
            TargetField::ProxyBase => Some(self.base.clone()),
            TargetField::None => None,
        };

        let mut invocation = Invocation::new(InvocationParts {
            descriptor: Arc::clone(descriptor),
            proxy: self.as_object(),
            target,
            interceptors: Some(interceptors),
            arguments: arguments.to_vec(),
            generic_arguments: generic_arguments.to_vec(),
        });
        let result = invocation.run();

        // By-ref results reach the caller even when the call failed
        for slot in &descriptor.by_ref_slots {
            if let (Some(cell), Some(value)) =
                (arguments.get_mut(slot.index), invocation.arguments().get(slot.index))
            {
                cell.clone_from(value);
            }
        }
        result?;

        let value = invocation.take_return_value();
        let member = &descriptor.member;
        if value.is_void() && member.return_type != TypeSig::Void {
            if member.return_type.is_value_type(generic_arguments) {
                return Err(Error::MissingReturnValue {
                    method: member.full_name(),
                });
            }
            return Ok(Value::Null);
        }
        Ok(value)
    }

    fn find_unproxied(&self, name: &str) -> Option<MethodRc> {
        if let Some(explicit) = self
            .ty
            .managed
            .explicit_impls
            .iter()
            .find(|e| e.interface_method.name == name)
        {
            return Some(explicit.interface_method.clone());
        }

        let mut owners = vec![self.ty.contract.clone()];
        owners.extend(self.ty.interfaces.iter().cloned());
        owners.extend(self.base.ty().hierarchy());
        owners.iter().find_map(|owner| {
            owner
                .methods
                .iter()
                .find(|m| !m.is_static() && (m.name == name || m.full_name() == name))
                .cloned()
        })
    }

    fn invoke_unproxied(
        self: &Arc<Self>,
        method: &MethodRc,
        generic_arguments: &[ManagedTypeRc],
        arguments: &mut [Value],
    ) -> Result<Value> {
        let no_target = || Error::NoTarget {
            method: method.full_name(),
        };

        let Some(interface) = method.declaring_type().filter(|t| t.is_interface()) else {
            let implementation = self
                .base
                .ty()
                .find_override(method)
                .filter(|m| m.body.is_some())
                .ok_or_else(no_target)?;
            return execute(&self.base, method, &implementation, generic_arguments, arguments);
        };

        if let Some(explicit) = self
            .ty
            .managed
            .explicit_impls
            .iter()
            .find(|e| e.interface_method.token == method.token)
        {
            return execute(
                &self.as_object(),
                method,
                &explicit.implementation,
                generic_arguments,
                arguments,
            );
        }

        let receivers = self
            .target()
            .into_iter()
            .chain(self.mixins.iter().cloned())
            .chain(std::iter::once(self.base.clone()));
        for receiver in receivers {
            if let Some(inner) = ProxyInstance::from_object(&receiver) {
                if inner.ty.managed.is_assignable_to(&interface) {
                    return inner.invoke(method, generic_arguments, arguments);
                }
                continue;
            }
            if let Some(implementation) = receiver
                .ty()
                .find_implementation(method)
                .filter(|m| m.body.is_some())
            {
                return execute(&receiver, method, &implementation, generic_arguments, arguments);
            }
        }
        Err(no_target())
    }
}

/// Runs `implementation` on `this` and copies by-ref results of `method` back.
fn execute(
    this: &ObjectRef,
    method: &MethodRc,
    implementation: &MethodRc,
    generic_arguments: &[ManagedTypeRc],
    arguments: &mut [Value],
) -> Result<Value> {
    let mut frame = CallFrame {
        method: implementation.clone(),
        arguments: arguments.to_vec(),
        generic_arguments: generic_arguments.to_vec(),
    };
    let result = implementation.invoke(this, &mut frame);
    for (index, param) in method.params.iter().enumerate() {
        if param.mode.is_by_ref() {
            if let (Some(cell), Some(written)) = (arguments.get_mut(index), frame.arguments.get(index)) {
                cell.clone_from(written);
            }
        }
    }
    result
}

impl fmt::Debug for ProxyInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyInstance")
            .field("type", &self.ty.name)
            .field("target", &self.target())
            .field("mixins", &self.mixins.len())
            .field("interceptors", &self.interceptors)
            .finish()
    }
}
