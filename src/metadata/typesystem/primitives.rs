use strum::{EnumIter, IntoEnumIterator};

/// The built-in types every registry provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, strum::Display)]
pub enum CorePrimitive {
    /// `System.Boolean`
    Boolean,
    /// `System.Char`
    Char,
    /// `System.Int32`
    Int32,
    /// `System.Int64`
    Int64,
    /// `System.Double`
    Double,
    /// `System.String`
    String,
    /// `System.Type`
    Type,
}

impl CorePrimitive {
    /// The full name of the primitive, e.g. `System.Int32`
    #[must_use]
    pub fn fullname(self) -> String {
        format!("System.{}", self)
    }

    /// Looks a primitive up by full name
    #[must_use]
    pub fn from_fullname(fullname: &str) -> Option<Self> {
        let name = fullname.strip_prefix("System.")?;
        CorePrimitive::iter().find(|p| p.to_string() == name)
    }

    /// Returns true for primitives that are value types
    #[must_use]
    pub fn is_value_type(self) -> bool {
        !matches!(self, CorePrimitive::String | CorePrimitive::Type)
    }
}
