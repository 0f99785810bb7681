//! Method attribute flags.
//!
//! # Key Types
//! - [`MethodAccessFlags`]: Member accessibility
//! - [`MethodModifiers`]: Static, sealed, virtual, abstract and special-name markers
//! - [`ParamMode`]: How a parameter is passed

use bitflags::bitflags;

/// Bits of the raw method attributes holding the access level
pub const METHOD_ACCESS_MASK: u32 = 0x0007;

bitflags! {
    #[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
    /// Access level of a method. The levels are values, not independent bits.
    pub struct MethodAccessFlags: u32 {
        /// Only the compiler may reference the member
        const COMPILER_CONTROLLED = 0x0000;
        /// `private`
        const PRIVATE = 0x0001;
        /// `private protected`
        const FAM_AND_ASSEM = 0x0002;
        /// `internal`
        const ASSEM = 0x0003;
        /// `protected`
        const FAMILY = 0x0004;
        /// `protected internal`
        const FAM_OR_ASSEM = 0x0005;
        /// `public`
        const PUBLIC = 0x0006;
    }
}

impl MethodAccessFlags {
    /// The access level of raw method attributes
    #[must_use]
    pub fn from_method_flags(flags: u32) -> Self {
        let access = flags & METHOD_ACCESS_MASK;
        Self::from_bits_truncate(access)
    }

    /// The access level, compared by value since the flags overlap
    #[must_use]
    pub fn level(self) -> u32 {
        self.bits() & METHOD_ACCESS_MASK
    }

    /// Returns true for `public` members
    #[must_use]
    pub fn is_public(self) -> bool {
        self.level() == Self::PUBLIC.bits()
    }

    /// Returns true for `private` and compiler controlled members
    #[must_use]
    pub fn is_private(self) -> bool {
        self.level() <= Self::PRIVATE.bits()
    }

    /// Returns true if subclasses in other modules can see the member (`protected`
    /// and `protected internal`)
    #[must_use]
    pub fn is_family(self) -> bool {
        self.level() == Self::FAMILY.bits() || self.level() == Self::FAM_OR_ASSEM.bits()
    }

    /// Returns true for members only visible inside their module (`internal` and
    /// `private protected`)
    #[must_use]
    pub fn is_assembly(self) -> bool {
        self.level() == Self::ASSEM.bits() || self.level() == Self::FAM_AND_ASSEM.bits()
    }
}

bitflags! {
    #[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
    /// Modifiers of a method, the non-access bits of its attributes
    pub struct MethodModifiers: u32 {
        /// No instance; never proxied
        const STATIC = 0x0010;
        /// `sealed` override; can not be intercepted
        const FINAL = 0x0020;
        /// `virtual`, `abstract` or interface member
        const VIRTUAL = 0x0040;
        /// Hides base methods by signature rather than by name
        const HIDE_BY_SIG = 0x0080;
        /// `new` slot instead of an override
        const NEW_SLOT = 0x0100;
        /// No body; calls need an interceptor or a target
        const ABSTRACT = 0x0400;
        /// Property or event accessor
        const SPECIAL_NAME = 0x0800;
    }
}

impl MethodModifiers {
    /// The modifiers of raw method attributes
    #[must_use]
    pub fn from_method_flags(flags: u32) -> Self {
        Self::from_bits_truncate(flags & !METHOD_ACCESS_MASK)
    }
}

/// How a parameter is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ParamMode {
    /// By value
    In,
    /// By reference (`ref`), read and written back
    Ref,
    /// Output parameter (`out`), written back only
    Out,
}

impl ParamMode {
    /// Returns true for `ref` and `out` parameters
    #[must_use]
    pub fn is_by_ref(self) -> bool {
        matches!(self, ParamMode::Ref | ParamMode::Out)
    }
}
