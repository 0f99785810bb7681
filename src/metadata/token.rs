//! Identity tokens.
//!
//! Every type, method, property and event registered in a
//! [`TypeRegistry`](crate::metadata::typesystem::TypeRegistry) gets a [`Token`]. Proxy
//! identities, dispatch tables and diagnostics key on tokens rather than names, since
//! overloads and types from different modules can share a name.

use std::fmt;

/// A 32-bit identity in .NET metadata token layout: the kind of entity in the high
/// byte, a row allocated by the registry in the low 24 bits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Types (`TypeDef`)
    pub const KIND_TYPE: u8 = 0x02;
    /// Methods and accessors (`MethodDef`)
    pub const KIND_METHOD: u8 = 0x06;
    /// Events (`Event`)
    pub const KIND_EVENT: u8 = 0x14;
    /// Properties (`Property`)
    pub const KIND_PROPERTY: u8 = 0x17;

    const ROW_MASK: u32 = 0x00FF_FFFF;

    /// Combines a kind byte and a row. Rows wider than 24 bits are truncated.
    #[must_use]
    pub fn from_parts(kind: u8, row: u32) -> Self {
        Token((u32::from(kind) << 24) | (row & Self::ROW_MASK))
    }

    /// The kind byte
    #[must_use]
    pub fn kind(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The row
    #[must_use]
    pub fn row(self) -> u32 {
        self.0 & Self::ROW_MASK
    }

    /// Returns true for type tokens
    #[must_use]
    pub fn is_type(self) -> bool {
        self.kind() == Self::KIND_TYPE
    }

    /// Returns true for method tokens
    #[must_use]
    pub fn is_method(self) -> bool {
        self.kind() == Self::KIND_METHOD
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind() {
            Self::KIND_TYPE => "type",
            Self::KIND_METHOD => "method",
            Self::KIND_EVENT => "event",
            Self::KIND_PROPERTY => "property",
            _ => "unknown",
        };
        write!(f, "Token({} #{})", kind, self.row())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
