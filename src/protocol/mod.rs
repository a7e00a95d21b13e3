//! Shared contracts for protocol data structures.
//!
//! Generated protocol types implement [`EoSerialize`] and [`EoDeserialize`]
//! on top of [`EoWriter`](crate::data::EoWriter) and
//! [`EoReader`](crate::data::EoReader).

use std::fmt;

use crate::data::{DataError, EoReader, EoWriter};

/// An error in serializing a protocol data structure.
#[derive(Clone, Debug)]
pub struct SerializationError {
    message: String,
}

impl SerializationError {
    /// Constructs a `SerializationError` with the specified error message.
    pub fn new(message: impl Into<String>) -> Self {
        SerializationError {
            message: message.into(),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SerializationError {}

impl From<DataError> for SerializationError {
    fn from(error: DataError) -> Self {
        SerializationError::new(error.to_string())
    }
}

/// A protocol data structure that can be serialized to an
/// [`EoWriter`](crate::data::EoWriter).
pub trait EoSerialize {
    /// Serializes this value to the provided writer.
    fn serialize(&self, writer: &mut EoWriter) -> Result<(), SerializationError>;
}

/// A protocol data structure that can be deserialized from an
/// [`EoReader`](crate::data::EoReader).
pub trait EoDeserialize: Sized {
    /// Deserializes a value of this type from the provided reader.
    fn deserialize(reader: &mut EoReader) -> Result<Self, SerializationError>;
}
