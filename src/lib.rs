//! Core library for handling the Endless Online network protocol.
//!
//! The [`data`] module implements the EO wire primitives: base-253 encoded
//! integers, windows-1252 strings with a reversible scramble, and the
//! chunked reading mode used to tolerate truncated or trailing payloads.
//! [`encrypt`] provides the symmetric byte transforms applied to packets and
//! data files, and [`packet`] the client-side packet sequencer.
//!
//! The [`gen`] module (enabled by the default `codegen` feature, along with
//! the `eo-protocol-gen` binary) compiles the eo-protocol XML schema files
//! into type-safe serializers and deserializers implementing the traits in
//! [`protocol`].
//!
//! ```
//! use eolib::data::{EoReader, EoWriter};
//!
//! let mut writer = EoWriter::new();
//! writer.add_char(123)?;
//! writer.add_short(12345)?;
//! let data = writer.to_byte_array();
//!
//! let mut reader = EoReader::new(&data);
//! assert_eq!(reader.get_char(), 123);
//! assert_eq!(reader.get_short(), 12345);
//! # Ok::<(), eolib::data::DataError>(())
//! ```

pub mod data;
pub mod encrypt;
pub mod packet;
pub mod protocol;

#[cfg(feature = "codegen")]
pub mod gen;

pub use self::data::{EoReader, EoWriter};
