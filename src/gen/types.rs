//! The generator's view of the protocol type system.
//!
//! The set of type shapes is closed, so types are represented as a single
//! sum over the possible variants rather than a trait hierarchy; the code
//! emitters branch on the variant during generation.

use std::fmt;

/// The length qualifier of a string type: a numeric literal, a reference to
/// a length field, or unspecified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Length {
    string: Option<String>,
}

impl Length {
    /// Creates a length from a schema `length` attribute value.
    pub fn from_string(length_string: &str) -> Self {
        Length {
            string: Some(length_string.to_owned()),
        }
    }

    /// Creates an unspecified length.
    pub fn unspecified() -> Self {
        Length { string: None }
    }

    /// Returns the length as an integer, if it is a numeric literal.
    pub fn as_integer(&self) -> Option<usize> {
        self.string.as_deref().and_then(|s| s.parse().ok())
    }

    /// Returns true if a length was specified.
    pub fn specified(&self) -> bool {
        self.string.is_some()
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.string {
            Some(string) => f.write_str(string),
            None => f.write_str("[unspecified]"),
        }
    }
}

/// One of the four encoded integer types, or `byte`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegerType {
    name: String,
    size: usize,
}

impl IntegerType {
    pub fn new(name: &str, size: usize) -> Self {
        IntegerType {
            name: name.to_owned(),
            size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// The largest value the type can carry on the wire.
    pub fn max_value(&self) -> u64 {
        if self.name == "byte" {
            0xFF
        } else {
            253u64.pow(self.size as u32) - 1
        }
    }
}

/// A single named ordinal of an enum type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumValue {
    ordinal: u32,
    name: String,
}

impl EnumValue {
    pub fn new(ordinal: u32, name: &str) -> Self {
        EnumValue {
            ordinal,
            name: name.to_owned(),
        }
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An enumeration defined by the schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumType {
    name: String,
    source_path: String,
    underlying: IntegerType,
    values: Vec<EnumValue>,
}

impl EnumType {
    pub fn new(
        name: &str,
        source_path: &str,
        underlying: IntegerType,
        values: Vec<EnumValue>,
    ) -> Self {
        EnumType {
            name: name.to_owned(),
            source_path: source_path.to_owned(),
            underlying,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn underlying(&self) -> &IntegerType {
        &self.underlying
    }

    pub fn values(&self) -> &[EnumValue] {
        &self.values
    }

    pub fn value_by_ordinal(&self, ordinal: u32) -> Option<&EnumValue> {
        self.values.iter().find(|value| value.ordinal == ordinal)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&EnumValue> {
        self.values.iter().find(|value| value.name == name)
    }
}

/// A structure defined by the schema, with its precomputed size analysis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructType {
    name: String,
    fixed_size: Option<usize>,
    bounded: bool,
    source_path: String,
}

impl StructType {
    pub fn new(name: &str, fixed_size: Option<usize>, bounded: bool, source_path: &str) -> Self {
        StructType {
            name: name.to_owned(),
            fixed_size,
            bounded,
            source_path: source_path.to_owned(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }
}

/// A resolved protocol type.
#[derive(Clone, Debug, PartialEq)]
pub enum EoType {
    /// `byte`, `char`, `short`, `three` or `int`
    Integer(IntegerType),
    /// `bool`, backed by an integer type
    Bool {
        /// The integer type carrying the value on the wire
        underlying: IntegerType,
    },
    /// `string` or `encoded_string`, with an optional length qualifier
    String {
        /// `string` or `encoded_string`
        name: String,
        /// The length qualifier
        length: Length,
    },
    /// An opaque byte run consuming the rest of the chunk or reader
    Blob,
    /// A schema-defined enumeration
    Enum(EnumType),
    /// A schema-defined structure
    Struct(StructType),
}

impl EoType {
    /// Returns the protocol-level name of the type.
    pub fn name(&self) -> &str {
        match self {
            EoType::Integer(integer) => integer.name(),
            EoType::Bool { .. } => "bool",
            EoType::String { name, .. } => name,
            EoType::Blob => "blob",
            EoType::Enum(protocol_enum) => protocol_enum.name(),
            EoType::Struct(protocol_struct) => protocol_struct.name(),
        }
    }

    /// Returns the serialized size of the type, if it is a compile-time
    /// constant.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            EoType::Integer(integer) => Some(integer.size()),
            EoType::Bool { underlying } => Some(underlying.size()),
            EoType::String { length, .. } => length.as_integer(),
            EoType::Blob => None,
            EoType::Enum(protocol_enum) => Some(protocol_enum.underlying().size()),
            EoType::Struct(protocol_struct) => protocol_struct.fixed_size,
        }
    }

    /// Returns true if the end of a serialized value of this type can be
    /// determined by counting bytes.
    pub fn bounded(&self) -> bool {
        match self {
            EoType::Integer(_) | EoType::Bool { .. } | EoType::Enum(_) => true,
            EoType::String { length, .. } => length.specified(),
            EoType::Blob => false,
            EoType::Struct(protocol_struct) => protocol_struct.bounded,
        }
    }

    /// Returns true for the basic types: integers, bool, and strings.
    pub fn is_basic(&self) -> bool {
        matches!(
            self,
            EoType::Integer(_) | EoType::Bool { .. } | EoType::String { .. }
        )
    }

    /// Returns the underlying integer type for types that carry one.
    pub fn underlying(&self) -> Option<&IntegerType> {
        match self {
            EoType::Bool { underlying } => Some(underlying),
            EoType::Enum(protocol_enum) => Some(protocol_enum.underlying()),
            _ => None,
        }
    }

    /// Returns the schema directory the type was defined in, for custom
    /// types.
    pub fn source_path(&self) -> Option<&str> {
        match self {
            EoType::Enum(protocol_enum) => Some(protocol_enum.source_path()),
            EoType::Struct(protocol_struct) => Some(protocol_struct.source_path()),
            _ => None,
        }
    }
}
