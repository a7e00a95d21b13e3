//! Reading and writing of raw EO data types.
//!
//! The EO protocol encodes integers in base 253 rather than base 256, because
//! the bytes `0xFE` and `0xFF` carry special meaning on the wire: `0xFE`
//! terminates the significant digits of an encoded number, and `0xFF`
//! delimits "chunks" within a packet. Strings travel as windows-1252 bytes,
//! optionally scrambled with a reversible transform.

use std::fmt;

mod number;
mod reader;
mod string;
mod writer;

pub use self::number::{decode_number, encode_number};
pub use self::reader::EoReader;
pub use self::string::{decode_string, encode_string};
pub use self::writer::EoWriter;

/// The maximum value of an EO char (1-byte encoded integer type).
pub const CHAR_MAX: u32 = 253;

/// The maximum value of an EO short (2-byte encoded integer type).
pub const SHORT_MAX: u32 = CHAR_MAX * CHAR_MAX;

/// The maximum value of an EO three (3-byte encoded integer type).
pub const THREE_MAX: u32 = CHAR_MAX * CHAR_MAX * CHAR_MAX;

/// The maximum value of an EO int (4-byte encoded integer type).
///
/// The largest valid value for each type is `TYPE_MAX - 1`.
pub const INT_MAX: u64 = CHAR_MAX as u64 * CHAR_MAX as u64 * CHAR_MAX as u64 * CHAR_MAX as u64;

/// An error in reading or writing raw EO data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataError {
    /// A number was too large for the encoded integer type it was written as.
    ValueOutOfBounds {
        /// The offending value
        value: u32,
        /// The largest value the type can hold
        max: u32,
    },
    /// A padded fixed-size string was longer than the length of its field.
    StringTooLong {
        /// The offending string
        string: String,
        /// The length of the field
        length: usize,
    },
    /// An unpadded fixed-size string did not have exactly the length of its
    /// field.
    StringLengthMismatch {
        /// The offending string
        string: String,
        /// The length of the field
        length: usize,
    },
    /// `next_chunk` was called on a reader that is not in chunked reading
    /// mode.
    NotInChunkedReadingMode,
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DataError::ValueOutOfBounds { value, max } => {
                write!(f, "Value {} exceeds maximum of {}", value, max)
            }
            DataError::StringTooLong { ref string, length } => {
                write!(
                    f,
                    "Padded string \"{}\" is too large for a length of {}",
                    string, length
                )
            }
            DataError::StringLengthMismatch { ref string, length } => {
                write!(
                    f,
                    "String \"{}\" does not have expected length of {}",
                    string, length
                )
            }
            DataError::NotInChunkedReadingMode => {
                write!(f, "Not in chunked reading mode")
            }
        }
    }
}

impl std::error::Error for DataError {}
