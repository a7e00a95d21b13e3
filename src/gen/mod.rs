//! The EO protocol code generator.
//!
//! Ingests a tree of `protocol.xml` schema documents describing the protocol
//! (enumerations, structures, and bidirectional packets) and emits type-safe
//! serializers and deserializers layered on the
//! [`data`](crate::data) module's reader and writer.
//!
//! The pipeline: [`generator::ProtocolCodeGenerator`] walks the input tree
//! and indexes every custom type into a [`type_factory::TypeFactory`], which
//! resolves names to [`types::EoType`] values on demand. Each schema element
//! is translated by an [`object_generator::ObjectCodeGenerator`], which
//! drives the field and switch generators to produce code fragments, and the
//! results are written out as a module tree of Rust source files.

use std::fmt;
use std::io;
use std::path::PathBuf;

pub mod code_block;
pub mod field_generator;
pub mod generator;
pub mod object_generator;
pub mod rust_file;
pub mod switch_generator;
pub mod type_factory;
pub mod types;
pub mod xml;

pub use self::generator::ProtocolCodeGenerator;

/// An error raised while loading schemas or generating protocol code.
///
/// Any error is fatal: it aborts the generation run and leaves the output
/// tree undefined.
#[derive(Debug)]
pub enum GenError {
    /// An I/O failure on an input or output file.
    Io {
        /// The file being read or written
        path: PathBuf,
        /// The underlying I/O error
        source: io::Error,
    },
    /// A malformed XML document.
    Xml {
        /// The document being parsed
        path: PathBuf,
        /// The parse failure
        message: String,
    },
    /// A required attribute was missing from a schema element.
    MissingAttribute {
        /// The schema element
        element: String,
        /// The missing attribute
        attribute: String,
    },
    /// An attribute held a value of the wrong shape.
    InvalidAttribute {
        /// The attribute name
        attribute: String,
        /// The offending value
        value: String,
    },
    /// Text content appeared where none was expected.
    UnexpectedText(String),
    /// A schema invariant was violated.
    Schema(String),
}

impl GenError {
    /// Constructs a schema-invariant error from a message.
    pub fn schema(message: impl Into<String>) -> Self {
        GenError::Schema(message.into())
    }
}

impl fmt::Display for GenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GenError::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
            GenError::Xml { path, message } => {
                write!(f, "Failed to parse {}: {}", path.display(), message)
            }
            GenError::MissingAttribute { element, attribute } => {
                write!(
                    f,
                    "Required attribute \"{}\" is missing from <{}>",
                    attribute, element
                )
            }
            GenError::InvalidAttribute { attribute, value } => {
                write!(
                    f,
                    "{} attribute has an invalid value: {}",
                    attribute, value
                )
            }
            GenError::UnexpectedText(text) => {
                write!(f, "Unexpected text content \"{}\"", text)
            }
            GenError::Schema(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for GenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GenError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "static", "struct", "super", "trait", "true", "type",
    "unsafe", "use", "where", "while",
];

/// Renders a schema name as a Rust identifier, switching to a raw identifier
/// when the name collides with a keyword.
pub(crate) fn rust_ident(name: &str) -> String {
    if RUST_KEYWORDS.contains(&name) {
        format!("r#{}", name)
    } else {
        name.to_owned()
    }
}

/// Converts a PascalCase name to snake_case.
pub(crate) fn pascal_case_to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut result = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        let boundary = i > 0
            && c.is_ascii_uppercase()
            && (chars
                .get(i + 1)
                .map(|next| !next.is_ascii_uppercase())
                .unwrap_or(false)
                || chars[i - 1].is_ascii_lowercase());
        if boundary {
            result.push('_');
        }
        result.push(c.to_ascii_lowercase());
    }

    result
}

/// Converts a snake_case name to PascalCase.
pub(crate) fn snake_case_to_pascal_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut uppercase_next = true;

    for c in name.chars() {
        if c == '_' {
            uppercase_next = true;
            continue;
        }
        if uppercase_next {
            result.push(c.to_ascii_uppercase());
            uppercase_next = false;
        } else {
            result.push(c.to_ascii_lowercase());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pascal_to_snake() {
        assert_eq!(pascal_case_to_snake_case("FooBar"), "foo_bar");
        assert_eq!(pascal_case_to_snake_case("NpcMapInfo"), "npc_map_info");
        assert_eq!(pascal_case_to_snake_case("NPCMapInfo"), "npc_map_info");
        assert_eq!(pascal_case_to_snake_case("ItemTypeEXP"), "item_type_exp");
        assert_eq!(pascal_case_to_snake_case("foo"), "foo");
        assert_eq!(pascal_case_to_snake_case(""), "");
    }

    #[test]
    fn snake_to_pascal() {
        assert_eq!(snake_case_to_pascal_case("foo_bar"), "FooBar");
        assert_eq!(snake_case_to_pascal_case("reply_code"), "ReplyCode");
        assert_eq!(snake_case_to_pascal_case("foo"), "Foo");
        assert_eq!(snake_case_to_pascal_case(""), "");
    }
}
