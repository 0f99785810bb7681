//! Per-request generation options and their comparable identity.
//!
//! [`GenerationOptions`] carry every knob that changes the shape of a generated proxy
//! type. Before a proxy is generated the options are finalized once: mixins are
//! composed into [`MixinData`] and an [`OptionsIdentity`] is computed. From then on
//! the options are frozen and every setter fails with [`Error::OptionsFrozen`].
//!
//! Two options are interchangeable for caching when their identities are equal:
//!
//! - the hook is compared by its policy type
//! - the selector only by its presence
//! - mixins by the (interface, mixin type) pairs they contribute
//! - additional attributes as a multiset
//! - a base type of `System.Object` is the same as no base type
//!
//! # Examples
//!
//! ```rust,ignore
//! use proxyscope::proxy::{GenerationOptions, HookHandle, FilterHook};
//!
//! let options = GenerationOptions::builder()
//!     .hook(HookHandle::new(FilterHook::new(|_, m| m.name != "Dispose")))
//!     .mixin(audit_log)
//!     .build();
//! ```

use std::{any::TypeId, fmt, sync::OnceLock};

use crate::{
    metadata::{
        typesystem::{ManagedTypeRc, TypeKey},
        value::ObjectRef,
    },
    proxy::{
        hook::{HookHandle, SelectorRc},
        mixin::MixinData,
    },
    Error, Result,
};

const OBJECT_TYPE: &str = "System.Object";

/// A custom attribute applied to the generated proxy type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeInfo {
    /// Full name of the attribute type
    pub attribute_type: String,
    /// Positional constructor arguments, rendered as text
    pub arguments: Vec<String>,
    /// Named arguments
    pub named: Vec<(String, String)>,
}

impl AttributeInfo {
    /// An attribute without arguments
    pub fn new(attribute_type: impl Into<String>) -> Self {
        Self {
            attribute_type: attribute_type.into(),
            arguments: Vec::new(),
            named: Vec::new(),
        }
    }

    /// Adds a positional argument
    #[must_use]
    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    /// Adds a named argument
    #[must_use]
    pub fn with_named(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.named.push((name.into(), value.into()));
        self
    }
}

/// Canonical, hashable form of [`GenerationOptions`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptionsIdentity {
    hook: TypeId,
    has_selector: bool,
    base_type: Option<TypeKey>,
    mixins: Vec<(TypeKey, TypeKey)>,
    attributes: Vec<AttributeInfo>,
}

impl OptionsIdentity {
    /// Policy type of the hook
    #[must_use]
    pub fn hook(&self) -> TypeId {
        self.hook
    }

    /// Whether an interceptor selector is configured
    #[must_use]
    pub fn has_selector(&self) -> bool {
        self.has_selector
    }

    /// Normalized base type for interface proxies
    #[must_use]
    pub fn base_type(&self) -> Option<&ManagedTypeRc> {
        self.base_type.as_ref().map(TypeKey::ty)
    }
}

/// The product of finalizing a [`GenerationOptions`].
#[derive(Debug)]
pub struct FinalizedOptions {
    /// Composed mixins
    pub mixin_data: MixinData,
    /// Comparable identity
    pub identity: OptionsIdentity,
}

/// Options for a single proxy generation request.
pub struct GenerationOptions {
    hook: HookHandle,
    selector: Option<SelectorRc>,
    base_type_for_interface_proxy: Option<ManagedTypeRc>,
    mixins: Vec<ObjectRef>,
    additional_attributes: Vec<AttributeInfo>,
    finalized: OnceLock<FinalizedOptions>,
}

impl GenerationOptions {
    /// Options with the default hook and nothing else
    #[must_use]
    pub fn new() -> Self {
        Self {
            hook: HookHandle::default(),
            selector: None,
            base_type_for_interface_proxy: None,
            mixins: Vec::new(),
            additional_attributes: Vec::new(),
            finalized: OnceLock::new(),
        }
    }

    /// Starts building options
    #[must_use]
    pub fn builder() -> GenerationOptionsBuilder {
        GenerationOptionsBuilder {
            options: Self::new(),
        }
    }

    /// The member selection hook
    #[must_use]
    pub fn hook(&self) -> &HookHandle {
        &self.hook
    }

    /// The interceptor selector, if any
    #[must_use]
    pub fn selector(&self) -> Option<&SelectorRc> {
        self.selector.as_ref()
    }

    /// Base class used for interface proxies
    #[must_use]
    pub fn base_type_for_interface_proxy(&self) -> Option<&ManagedTypeRc> {
        self.base_type_for_interface_proxy.as_ref()
    }

    /// Mixin instances in the order they were added
    #[must_use]
    pub fn mixins(&self) -> &[ObjectRef] {
        &self.mixins
    }

    /// Attributes applied to generated proxy types
    #[must_use]
    pub fn additional_attributes(&self) -> &[AttributeInfo] {
        &self.additional_attributes
    }

    /// Returns true once the options were used for a generation request
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized.get().is_some()
    }

    /// Composed mixins, available after finalization
    #[must_use]
    pub fn mixin_data(&self) -> Option<&MixinData> {
        self.finalized.get().map(|f| &f.mixin_data)
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.is_finalized() {
            return Err(Error::OptionsFrozen);
        }
        Ok(())
    }

    /// Replaces the hook.
    ///
    /// # Errors
    /// Returns [`Error::OptionsFrozen`] after finalization.
    pub fn set_hook(&mut self, hook: HookHandle) -> Result<()> {
        self.ensure_mutable()?;
        self.hook = hook;
        Ok(())
    }

    /// Sets or clears the interceptor selector.
    ///
    /// # Errors
    /// Returns [`Error::OptionsFrozen`] after finalization.
    pub fn set_selector(&mut self, selector: Option<SelectorRc>) -> Result<()> {
        self.ensure_mutable()?;
        self.selector = selector;
        Ok(())
    }

    /// Sets the base class of interface proxies.
    ///
    /// # Errors
    /// Returns [`Error::OptionsFrozen`] after finalization.
    pub fn set_base_type_for_interface_proxy(&mut self, base: Option<ManagedTypeRc>) -> Result<()> {
        self.ensure_mutable()?;
        self.base_type_for_interface_proxy = base;
        Ok(())
    }

    /// Adds a mixin instance.
    ///
    /// # Errors
    /// Returns [`Error::OptionsFrozen`] after finalization.
    pub fn add_mixin_instance(&mut self, instance: ObjectRef) -> Result<()> {
        self.ensure_mutable()?;
        self.mixins.push(instance);
        Ok(())
    }

    /// Adds an attribute for generated proxy types.
    ///
    /// # Errors
    /// Returns [`Error::OptionsFrozen`] after finalization.
    pub fn add_attribute(&mut self, attribute: AttributeInfo) -> Result<()> {
        self.ensure_mutable()?;
        self.additional_attributes.push(attribute);
        Ok(())
    }

    /// Finalizes the options, composing mixins and computing the identity.
    ///
    /// The first successful call wins; later calls return the memoized result.
    ///
    /// # Errors
    /// Returns the mixin composition error, see [`MixinData::new`].
    pub fn initialize(&self, max_depth: usize) -> Result<&FinalizedOptions> {
        if let Some(finalized) = self.finalized.get() {
            return Ok(finalized);
        }

        let mixin_data = MixinData::new(&self.mixins, max_depth)?;

        let mut attributes = self.additional_attributes.clone();
        attributes.sort();

        let identity = OptionsIdentity {
            hook: self.hook.policy(),
            has_selector: self.selector.is_some(),
            base_type: self
                .base_type_for_interface_proxy
                .as_ref()
                .filter(|base| base.fullname() != OBJECT_TYPE)
                .map(TypeKey::from),
            mixins: mixin_data.identity(),
            attributes,
        };

        Ok(self.finalized.get_or_init(|| FinalizedOptions {
            mixin_data,
            identity,
        }))
    }

    /// The comparable identity of these options, finalizing them if needed.
    ///
    /// # Errors
    /// See [`GenerationOptions::initialize`].
    pub fn identity(&self, max_depth: usize) -> Result<OptionsIdentity> {
        Ok(self.initialize(max_depth)?.identity.clone())
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Clones the configuration; the clone is not finalized.
impl Clone for GenerationOptions {
    fn clone(&self) -> Self {
        Self {
            hook: self.hook.clone(),
            selector: self.selector.clone(),
            base_type_for_interface_proxy: self.base_type_for_interface_proxy.clone(),
            mixins: self.mixins.clone(),
            additional_attributes: self.additional_attributes.clone(),
            finalized: OnceLock::new(),
        }
    }
}

impl fmt::Debug for GenerationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationOptions")
            .field("hook", &self.hook)
            .field("selector", &self.selector.is_some())
            .field(
                "base_type_for_interface_proxy",
                &self.base_type_for_interface_proxy.as_ref().map(|t| t.fullname()),
            )
            .field("mixins", &self.mixins.len())
            .field("additional_attributes", &self.additional_attributes)
            .field("finalized", &self.is_finalized())
            .finish()
    }
}

/// Builder for [`GenerationOptions`].
pub struct GenerationOptionsBuilder {
    options: GenerationOptions,
}

impl GenerationOptionsBuilder {
    /// Sets the member selection hook
    #[must_use]
    pub fn hook(mut self, hook: HookHandle) -> Self {
        self.options.hook = hook;
        self
    }

    /// Sets the interceptor selector
    #[must_use]
    pub fn selector(mut self, selector: SelectorRc) -> Self {
        self.options.selector = Some(selector);
        self
    }

    /// Sets the base class of interface proxies
    #[must_use]
    pub fn base_type_for_interface_proxy(mut self, base: &ManagedTypeRc) -> Self {
        self.options.base_type_for_interface_proxy = Some(base.clone());
        self
    }

    /// Adds a mixin instance
    #[must_use]
    pub fn mixin(mut self, instance: ObjectRef) -> Self {
        self.options.mixins.push(instance);
        self
    }

    /// Adds an attribute for generated proxy types
    #[must_use]
    pub fn attribute(mut self, attribute: AttributeInfo) -> Self {
        self.options.additional_attributes.push(attribute);
        self
    }

    /// Finishes the options
    #[must_use]
    pub fn build(self) -> GenerationOptions {
        self.options
    }
}
