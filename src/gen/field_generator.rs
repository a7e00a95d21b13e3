//! Emission of per-field serialize/deserialize fragments.
//!
//! One `FieldCodeGenerator` handles a single `field`, `array`, `length`, or
//! `dummy` instruction: it contributes the storage slot and accessors to the
//! generated type, and the read/write statements to its serialize and
//! deserialize bodies.

use std::rc::Rc;

use super::code_block::{CodeBlock, Import};
use super::object_generator::{FieldData, ObjectGenerationContext, ObjectGenerationData};
use super::type_factory::TypeFactory;
use super::types::{EoType, IntegerType, Length};
use super::xml::try_parse_int;
use super::{rust_ident, GenError};

struct DeprecatedField {
    type_name: &'static str,
    old_field_name: &'static str,
    new_field_name: &'static str,
    since: &'static str,
}

// A single accessor was renamed after release; keep forwarding to it.
const DEPRECATED_FIELDS: &[DeprecatedField] = &[DeprecatedField {
    type_name: "WalkPlayerServerPacket",
    old_field_name: "Direction",
    new_field_name: "direction",
    since: "1.1.0",
}];

fn get_deprecated_field(type_name: &str, field_name: &str) -> Option<&'static DeprecatedField> {
    DEPRECATED_FIELDS
        .iter()
        .find(|field| field.type_name == type_name && field.new_field_name == field_name)
}

/// Escapes a schema-supplied value for use in a Rust string literal.
pub(crate) fn escape_string_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// The Rust type a protocol type is stored as.
pub(crate) fn rust_type_name(field_type: &EoType) -> String {
    match field_type {
        EoType::Integer(integer) => {
            if integer.name() == "byte" {
                "u8".to_owned()
            } else {
                "u32".to_owned()
            }
        }
        EoType::Bool { .. } => "bool".to_owned(),
        EoType::String { .. } => "String".to_owned(),
        EoType::Blob => "Vec<u8>".to_owned(),
        EoType::Enum(protocol_enum) => protocol_enum.name().to_owned(),
        EoType::Struct(protocol_struct) => protocol_struct.name().to_owned(),
    }
}

/// The import needed to name a custom type from another generated file, if
/// the type is custom.
pub(crate) fn custom_type_import(field_type: &EoType) -> Option<Import> {
    field_type.source_path().map(|source_path| Import::Generated {
        module_dir: source_path.to_owned(),
        name: field_type.name().to_owned(),
    })
}

/// Builds a `///` doc comment from a schema comment and generated notes.
pub(crate) fn doc_comment(comment: Option<&str>, notes: &[String]) -> CodeBlock {
    let mut lines: Vec<String> = Vec::new();

    if let Some(comment) = comment {
        lines.extend(comment.lines().map(|line| line.trim().to_owned()));
    }

    if !notes.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Notes:".to_owned());
        for note in notes {
            lines.push(format!("  - {}", note));
        }
    }

    let mut result = CodeBlock::new();
    for line in lines {
        if line.is_empty() {
            result.add_line("///");
        } else {
            result.add_line(&format!("/// {}", line));
        }
    }
    result
}

/// The largest value an integer-typed field can carry.
pub(crate) fn max_value_of(integer: &IntegerType) -> u64 {
    integer.max_value()
}

/// Collects the attributes of a field-like instruction before constructing
/// the generator for it.
#[derive(Default)]
pub struct FieldCodeGeneratorBuilder {
    name: Option<String>,
    type_string: Option<String>,
    length: Option<String>,
    offset: i32,
    padded: bool,
    optional: bool,
    hardcoded_value: Option<String>,
    comment: Option<String>,
    array_field: bool,
    length_field: bool,
    delimited: bool,
    trailing_delimiter: bool,
}

impl FieldCodeGeneratorBuilder {
    pub fn new() -> Self {
        FieldCodeGeneratorBuilder::default()
    }

    pub fn name(mut self, name: Option<&str>) -> Self {
        self.name = name.map(str::to_owned);
        self
    }

    pub fn type_string(mut self, type_string: &str) -> Self {
        self.type_string = Some(type_string.to_owned());
        self
    }

    pub fn length(mut self, length: Option<&str>) -> Self {
        self.length = length.map(str::to_owned);
        self
    }

    pub fn offset(mut self, offset: i32) -> Self {
        self.offset = offset;
        self
    }

    pub fn padded(mut self, padded: bool) -> Self {
        self.padded = padded;
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn hardcoded_value(mut self, hardcoded_value: Option<String>) -> Self {
        self.hardcoded_value = hardcoded_value;
        self
    }

    pub fn comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    pub fn array_field(mut self, array_field: bool) -> Self {
        self.array_field = array_field;
        self
    }

    pub fn length_field(mut self, length_field: bool) -> Self {
        self.length_field = length_field;
        self
    }

    pub fn delimited(mut self, delimited: bool) -> Self {
        self.delimited = delimited;
        self
    }

    pub fn trailing_delimiter(mut self, trailing_delimiter: bool) -> Self {
        self.trailing_delimiter = trailing_delimiter;
        self
    }

    pub fn build<'a>(
        self,
        type_factory: &mut TypeFactory,
        context: &'a mut ObjectGenerationContext,
        data: &'a mut ObjectGenerationData,
    ) -> Result<FieldCodeGenerator<'a>, GenError> {
        let type_string = self
            .type_string
            .ok_or_else(|| GenError::schema("type must be provided"))?;

        let type_length = if self.array_field {
            Length::unspecified()
        } else {
            match &self.length {
                Some(length) => Length::from_string(length),
                None => Length::unspecified(),
            }
        };
        let field_type = type_factory.get_type_with_length(&type_string, type_length)?;

        let generator = FieldCodeGenerator {
            context,
            data,
            name: self.name,
            type_string,
            field_type,
            length_string: self.length,
            offset: self.offset,
            padded: self.padded,
            optional: self.optional,
            hardcoded_value: self.hardcoded_value,
            comment: self.comment,
            array_field: self.array_field,
            length_field: self.length_field,
            delimited: self.delimited,
            trailing_delimiter: self.trailing_delimiter,
        };
        generator.validate()?;

        Ok(generator)
    }
}

/// Emits the storage, accessors, and read/write fragments for one field.
pub struct FieldCodeGenerator<'a> {
    context: &'a mut ObjectGenerationContext,
    data: &'a mut ObjectGenerationData,
    name: Option<String>,
    type_string: String,
    field_type: Rc<EoType>,
    length_string: Option<String>,
    offset: i32,
    padded: bool,
    optional: bool,
    hardcoded_value: Option<String>,
    comment: Option<String>,
    array_field: bool,
    length_field: bool,
    delimited: bool,
    trailing_delimiter: bool,
}

impl<'a> FieldCodeGenerator<'a> {
    fn validate(&self) -> Result<(), GenError> {
        self.validate_special_fields()?;
        self.validate_optional_field()?;
        self.validate_array_field()?;
        self.validate_length_field()?;
        self.validate_unnamed_field()?;
        self.validate_hardcoded_value()?;
        self.validate_unique_name()?;
        self.validate_length_attribute()?;
        Ok(())
    }

    fn validate_special_fields(&self) -> Result<(), GenError> {
        if self.array_field && self.length_field {
            return Err(GenError::schema(
                "A field cannot be both a length field and an array field.",
            ));
        }
        Ok(())
    }

    fn validate_optional_field(&self) -> Result<(), GenError> {
        if self.optional && self.name.is_none() {
            return Err(GenError::schema("Optional fields must specify a name."));
        }
        Ok(())
    }

    fn validate_array_field(&self) -> Result<(), GenError> {
        if self.array_field {
            if self.name.is_none() {
                return Err(GenError::schema("Array fields must specify a name."));
            }
            if self.hardcoded_value.is_some() {
                return Err(GenError::schema(
                    "Array fields may not specify hardcoded values.",
                ));
            }
            if !self.delimited && !self.field_type.bounded() {
                return Err(GenError::schema(format!(
                    "Unbounded element type ({}) forbidden in non-delimited array.",
                    self.type_string
                )));
            }
        } else if self.delimited {
            return Err(GenError::schema("Only arrays can be delimited."));
        }
        Ok(())
    }

    fn validate_length_field(&self) -> Result<(), GenError> {
        if self.length_field {
            if self.name.is_none() {
                return Err(GenError::schema("Length fields must specify a name."));
            }
            if self.hardcoded_value.is_some() {
                return Err(GenError::schema(
                    "Length fields may not specify hardcoded values.",
                ));
            }
            if !matches!(&*self.field_type, EoType::Integer(_)) {
                return Err(GenError::schema(format!(
                    "{} is not a numeric type, so it is not allowed for a length field.",
                    self.field_type.name()
                )));
            }
        } else if self.offset != 0 {
            return Err(GenError::schema("Only length fields can have an offset."));
        }
        Ok(())
    }

    fn validate_unnamed_field(&self) -> Result<(), GenError> {
        if self.name.is_some() {
            return Ok(());
        }
        if self.hardcoded_value.is_none() {
            return Err(GenError::schema(
                "Unnamed fields must specify a hardcoded field value.",
            ));
        }
        if self.optional {
            return Err(GenError::schema("Unnamed fields may not be optional."));
        }
        Ok(())
    }

    fn validate_hardcoded_value(&self) -> Result<(), GenError> {
        let hardcoded_value = match &self.hardcoded_value {
            Some(hardcoded_value) => hardcoded_value,
            None => return Ok(()),
        };

        if let EoType::String { .. } = &*self.field_type {
            let length = self.length_string.as_deref().and_then(try_parse_int);
            if let Some(length) = length {
                if length as usize != hardcoded_value.chars().count() {
                    return Err(GenError::schema(format!(
                        "Expected length of {} for hardcoded string value \"{}\".",
                        length, hardcoded_value
                    )));
                }
            }
        }

        if !self.field_type.is_basic() {
            return Err(GenError::schema(format!(
                "Hardcoded field values are not allowed for {} fields (must be a basic type).",
                self.field_type.name()
            )));
        }

        Ok(())
    }

    fn validate_unique_name(&self) -> Result<(), GenError> {
        if let Some(name) = &self.name {
            if self.context.accessible_fields.contains_key(name) {
                return Err(GenError::schema(format!("Cannot redefine {} field.", name)));
            }
        }
        Ok(())
    }

    fn validate_length_attribute(&self) -> Result<(), GenError> {
        let length_string = match &self.length_string {
            Some(length_string) => length_string,
            None => return Ok(()),
        };

        if try_parse_int(length_string).is_none()
            && !self
                .context
                .length_field_is_referenced_map
                .contains_key(length_string)
        {
            return Err(GenError::schema(format!(
                "Length attribute \"{}\" must be a numeric literal, or refer to a length field.",
                length_string
            )));
        }

        let is_already_referenced = self
            .context
            .length_field_is_referenced_map
            .get(length_string)
            .copied()
            .unwrap_or(false);

        if is_already_referenced {
            return Err(GenError::schema(format!(
                "Length field \"{}\" must not be referenced by multiple fields.",
                length_string
            )));
        }

        Ok(())
    }

    /// Contributes the storage slot, accessor, and setter for a named field.
    pub fn generate_field(&mut self) -> Result<(), GenError> {
        let name = match &self.name {
            Some(name) => name.clone(),
            None => return Ok(()),
        };
        let ident = rust_ident(&name);

        let storage_type = self.storage_type_name();
        let initializer = self.initializer_expression();

        self.context.accessible_fields.insert(
            name.clone(),
            FieldData {
                name: name.clone(),
                field_type: Rc::clone(&self.field_type),
                offset: self.offset,
                array: self.array_field,
            },
        );

        self.data
            .add_field_decl(&ident, &storage_type, &initializer);

        if let Some(import) = custom_type_import(&self.field_type) {
            self.data.imports.add_import(import);
        }

        if self.length_field {
            self.context
                .length_field_is_referenced_map
                .insert(name, false);
            return Ok(());
        }

        let doc = self.accessor_doc();
        let (accessor_type, accessor_body) = self.accessor_shape(&ident);

        let mut accessor = CodeBlock::new();
        accessor.add_code_block(&doc);
        accessor.begin_control_flow(&format!(
            "pub fn {}(&self) -> {}",
            ident, accessor_type
        ));
        accessor.add_line(&accessor_body);
        accessor.end_control_flow();
        self.data.add_method(&accessor);

        self.data.repr_fields.push(ident.clone());

        if self.hardcoded_value.is_none() {
            let mut setter = CodeBlock::new();
            setter.add_code_block(&doc);
            setter.begin_control_flow(&format!(
                "pub fn set_{}(&mut self, {}: {})",
                name, ident, storage_type
            ));
            setter.add_line(&format!("self.{} = {};", ident, ident));

            if let Some(length_string) = self.length_string.clone() {
                if self
                    .context
                    .length_field_is_referenced_map
                    .contains_key(&length_string)
                {
                    self.context
                        .length_field_is_referenced_map
                        .insert(length_string.clone(), true);
                    let length_field_data = &self.context.accessible_fields[&length_string];
                    let length_ident = rust_ident(&length_field_data.name);
                    let length_type = rust_type_name(&length_field_data.field_type);
                    if self.optional {
                        setter.add_line(&format!(
                            "self.{} = self.{}.as_ref().map_or(0, |value| value.{}) as {};",
                            length_ident,
                            ident,
                            self.value_length_call(),
                            length_type
                        ));
                    } else {
                        setter.add_line(&format!(
                            "self.{} = self.{}.{} as {};",
                            length_ident,
                            ident,
                            self.value_length_call(),
                            length_type
                        ));
                    }
                }
            }

            setter.end_control_flow();
            self.data.add_method(&setter);
        }

        if let Some(deprecated) = get_deprecated_field(&self.data.class_name, &name) {
            self.generate_deprecated_accessors(deprecated, &ident, &accessor_type, &storage_type);
        }

        Ok(())
    }

    fn generate_deprecated_accessors(
        &mut self,
        deprecated: &DeprecatedField,
        ident: &str,
        accessor_type: &str,
        storage_type: &str,
    ) {
        let old_name = deprecated.old_field_name;

        let mut accessor = CodeBlock::new();
        accessor.add_line("#[allow(non_snake_case)]");
        accessor.add_line(&format!(
            "#[deprecated(since = \"{}\", note = \"use `{}` instead\")]",
            deprecated.since, ident
        ));
        accessor.begin_control_flow(&format!(
            "pub fn {}(&self) -> {}",
            old_name, accessor_type
        ));
        accessor.add_line(&format!("self.{}()", ident));
        accessor.end_control_flow();
        self.data.add_method(&accessor);

        if self.hardcoded_value.is_none() {
            let mut setter = CodeBlock::new();
            setter.add_line("#[allow(non_snake_case)]");
            setter.add_line(&format!(
                "#[deprecated(since = \"{}\", note = \"use `set_{}` instead\")]",
                deprecated.since, ident
            ));
            setter.begin_control_flow(&format!(
                "pub fn set_{}(&mut self, {}: {})",
                old_name, ident, storage_type
            ));
            setter.add_line(&format!("self.set_{}({});", ident, ident));
            setter.end_control_flow();
            self.data.add_method(&setter);
        }
    }

    /// Emits this field's fragment of the serialize body.
    pub fn generate_serialize(&mut self) -> Result<(), GenError> {
        self.generate_serialize_missing_optional_guard();
        self.generate_serialize_length_check()?;

        if self.array_field {
            let array_size_expression = match self.length_expression()? {
                Some(expression) => expression,
                None => format!("{}.len()", self.value_place()),
            };

            self.data
                .serialize
                .begin_control_flow(&format!("for i in 0..{}", array_size_expression));

            if self.delimited && !self.trailing_delimiter {
                self.data.serialize.begin_control_flow("if i > 0");
                self.data.serialize.add_line("writer.add_byte(0xFF);");
                self.data.serialize.end_control_flow();
            }
        }

        let write_statement = self.write_statement()?;
        self.data.serialize.add_code_block(&write_statement);

        if self.array_field {
            if self.delimited && self.trailing_delimiter {
                self.data.serialize.add_line("writer.add_byte(0xFF);");
            }
            self.data.serialize.end_control_flow();
        }

        if self.optional {
            self.data.serialize.end_control_flow();
        }

        Ok(())
    }

    /// Emits this field's fragment of the deserialize body.
    pub fn generate_deserialize(&mut self) -> Result<(), GenError> {
        if self.optional {
            self.data
                .deserialize
                .begin_control_flow("if reader.remaining() > 0");
        }

        if self.array_field {
            self.generate_deserialize_array()?;
        } else {
            let read_statement = self.read_statement(&self.assignment_target())?;
            self.data.deserialize.add_code_block(&read_statement);
        }

        if self.optional {
            self.data.deserialize.end_control_flow();
        }

        Ok(())
    }

    fn generate_serialize_missing_optional_guard(&mut self) {
        if !self.optional {
            return;
        }

        let ident = rust_ident(self.name.as_deref().unwrap_or_default());
        if self.context.reached_optional_field {
            self.data.serialize.add_line(&format!(
                "let reached_missing_optional = reached_missing_optional || data.{}.is_none();",
                ident
            ));
        } else {
            self.data.serialize.add_line(&format!(
                "let reached_missing_optional = data.{}.is_none();",
                ident
            ));
        }
        self.data
            .serialize
            .begin_control_flow("if !reached_missing_optional");
    }

    fn generate_serialize_length_check(&mut self) -> Result<(), GenError> {
        let name = match &self.name {
            Some(name) => name.clone(),
            None => return Ok(()),
        };

        let field_data = self
            .length_string
            .as_deref()
            .and_then(|length_string| self.context.accessible_fields.get(length_string));

        let length_expression = match field_data {
            Some(field_data) => match &*field_data.field_type {
                EoType::Integer(integer) => {
                    Some((max_value_of(integer) as i64 + field_data.offset as i64).to_string())
                }
                _ => None,
            },
            None => self.length_string.clone(),
        };

        let length_expression = match length_expression {
            Some(length_expression) => length_expression,
            None => return Ok(()),
        };

        let variable_size = self.padded || field_data.is_some();
        let length_check_operator = if variable_size { ">" } else { "!=" };
        let expected_length_description = if variable_size {
            format!("{} or less", length_expression)
        } else {
            format!("exactly {}", length_expression)
        };

        let length_of_field = format!("{}.{}", self.value_place(), self.value_length_call());

        self.data.serialize.begin_control_flow(&format!(
            "if {} {} {}",
            length_of_field, length_check_operator, length_expression
        ));
        self.data.serialize.add_line("return Err(SerializationError::new(format!(");
        self.data.serialize.indent();
        self.data.serialize.add_line(&format!(
            "\"Expected length of {} to be {}, got {{}}.\",",
            name, expected_length_description
        ));
        self.data.serialize.add_line(&length_of_field);
        self.data.serialize.unindent();
        self.data.serialize.add_line(")));");
        self.data.serialize.end_control_flow();

        Ok(())
    }

    // The call that measures the field's wire length: character count for
    // strings (one windows-1252 byte per char, while String::len would
    // count UTF-8 bytes), element count for arrays.
    fn value_length_call(&self) -> &'static str {
        if !self.array_field && matches!(&*self.field_type, EoType::String { .. }) {
            "chars().count()"
        } else {
            "len()"
        }
    }

    // The place expression for the field's value, before array indexing.
    // Optional values are unwrapped: by value for Copy shapes, by reference
    // otherwise.
    fn value_place(&self) -> String {
        let ident = rust_ident(self.name.as_deref().unwrap_or_default());
        if self.optional {
            let copy_shape = !self.array_field
                && matches!(
                    &*self.field_type,
                    EoType::Integer(_) | EoType::Bool { .. } | EoType::Enum(_)
                );
            if copy_shape {
                format!("data.{}.unwrap()", ident)
            } else {
                format!("data.{}.as_ref().unwrap()", ident)
            }
        } else {
            format!("data.{}", ident)
        }
    }

    fn write_statement(&self) -> Result<CodeBlock, GenError> {
        let mut result = CodeBlock::new();

        match &*self.field_type {
            EoType::Blob => {
                let value = if self.array_field {
                    format!("&{}[i]", self.value_place())
                } else if self.optional {
                    let ident = rust_ident(self.name.as_deref().unwrap_or_default());
                    format!("data.{}.as_deref().unwrap()", ident)
                } else {
                    format!("&{}", self.value_place())
                };
                result.add_line(&format!("writer.add_bytes({});", value));
            }
            EoType::Struct(protocol_struct) => {
                let value = if self.array_field {
                    format!("{}[i]", self.value_place())
                } else {
                    self.value_place()
                };
                result.add_line(&format!("{}.serialize(writer)?;", value));
                result.add_import(Import::Generated {
                    module_dir: protocol_struct.source_path().to_owned(),
                    name: protocol_struct.name().to_owned(),
                });
            }
            _ => {
                let value_expression = self.write_value_expression()?;
                let length_expression = if self.array_field {
                    None
                } else {
                    self.length_expression()?
                };
                let underlying_name = self
                    .field_type
                    .underlying()
                    .map(|underlying| underlying.name().to_owned())
                    .unwrap_or_else(|| self.field_type.name().to_owned());
                result.add_line(&Self::write_statement_for_basic_type(
                    &underlying_name,
                    &value_expression,
                    length_expression.as_deref(),
                    self.padded,
                ));
            }
        }

        Ok(result)
    }

    fn write_value_expression(&self) -> Result<String, GenError> {
        if self.name.is_none() {
            let hardcoded_value = self.hardcoded_value.as_deref().unwrap_or_default();
            return match &*self.field_type {
                EoType::Integer(_) => {
                    if try_parse_int(hardcoded_value).is_some() {
                        Ok(hardcoded_value.to_owned())
                    } else {
                        Err(GenError::schema(format!(
                            "\"{}\" is not a valid integer value.",
                            hardcoded_value
                        )))
                    }
                }
                EoType::Bool { .. } => match hardcoded_value {
                    "false" => Ok("0".to_owned()),
                    "true" => Ok("1".to_owned()),
                    _ => Err(GenError::schema(format!(
                        "\"{}\" is not a valid bool value.",
                        hardcoded_value
                    ))),
                },
                EoType::String { .. } => {
                    Ok(format!("\"{}\"", escape_string_literal(hardcoded_value)))
                }
                _ => Err(GenError::schema("Unhandled basic type")),
            };
        }

        let mut expression = self.value_place();
        if self.array_field {
            expression.push_str("[i]");
        }

        // Wrap the raw field value into the wire shape of the underlying
        // type
        match &*self.field_type {
            EoType::Bool { .. } => {
                expression = format!("if {} {{ 1 }} else {{ 0 }}", expression);
            }
            EoType::Enum(protocol_enum) => {
                expression = format!("u32::from({})", expression);
                if protocol_enum.underlying().name() == "byte" {
                    expression = format!("{} as u8", expression);
                }
            }
            EoType::String { .. } => {
                if self.optional && !self.array_field {
                    // as_deref yields the borrowed form directly
                    let ident = rust_ident(self.name.as_deref().unwrap_or_default());
                    expression = format!("data.{}.as_deref().unwrap()", ident);
                } else {
                    expression = format!("&{}", expression);
                }
            }
            _ => {}
        }

        if let Some(offset_expression) = Self::length_offset_expression(-self.offset) {
            expression.push_str(&offset_expression);
        }

        Ok(expression)
    }

    fn write_statement_for_basic_type(
        underlying_name: &str,
        value_expression: &str,
        length_expression: Option<&str>,
        padded: bool,
    ) -> String {
        match underlying_name {
            "byte" => format!("writer.add_byte({});", value_expression),
            "char" => format!("writer.add_char({})?;", value_expression),
            "short" => format!("writer.add_short({})?;", value_expression),
            "three" => format!("writer.add_three({})?;", value_expression),
            "int" => format!("writer.add_int({})?;", value_expression),
            "string" => match length_expression {
                None => format!("writer.add_string({});", value_expression),
                Some(length_expression) => format!(
                    "writer.add_fixed_string({}, {}, {})?;",
                    value_expression, length_expression, padded
                ),
            },
            "encoded_string" => match length_expression {
                None => format!("writer.add_encoded_string({});", value_expression),
                Some(length_expression) => format!(
                    "writer.add_fixed_encoded_string({}, {}, {})?;",
                    value_expression, length_expression, padded
                ),
            },
            _ => unreachable!("unhandled basic type"),
        }
    }

    fn generate_deserialize_array(&mut self) -> Result<(), GenError> {
        let ident = rust_ident(self.name.as_deref().unwrap_or_default());
        let mut array_length_expression = self.length_expression()?;

        if array_length_expression.is_none() && !self.delimited {
            if let Some(element_size) = self.field_type.fixed_size() {
                let variable = format!("{}_length", self.name.as_deref().unwrap_or_default());
                self.data.deserialize.add_line(&format!(
                    "let {} = reader.remaining() / {};",
                    variable, element_size
                ));
                array_length_expression = Some(variable);
            }
        }

        // Optional arrays collect into a local buffer so the slot only
        // becomes Some when data was present
        let target = if self.optional {
            self.data.deserialize.add_line(&format!(
                "let mut {}: Vec<{}> = Vec::new();",
                ident,
                rust_type_name(&self.field_type)
            ));
            ident.clone()
        } else {
            format!("data.{}", ident)
        };

        let needs_guard =
            self.delimited && !self.trailing_delimiter && array_length_expression.is_some();

        match &array_length_expression {
            None => {
                self.data
                    .deserialize
                    .begin_control_flow("while reader.remaining() > 0");
            }
            Some(expression) => {
                let index = if needs_guard { "i" } else { "_" };
                self.data
                    .deserialize
                    .begin_control_flow(&format!("for {} in 0..{}", index, expression));
            }
        }

        let read_statement = self.read_statement(&format!("{}.push(", target))?;
        self.data.deserialize.add_code_block(&read_statement);

        if self.delimited {
            if needs_guard {
                self.data.deserialize.begin_control_flow(&format!(
                    "if i + 1 < {}",
                    array_length_expression.as_deref().unwrap_or_default()
                ));
            }
            self.data.deserialize.add_line("reader.next_chunk()?;");
            if needs_guard {
                self.data.deserialize.end_control_flow();
            }
        }

        self.data.deserialize.end_control_flow();

        if self.optional {
            self.data
                .deserialize
                .add_line(&format!("data.{} = Some({});", ident, ident));
        }

        Ok(())
    }

    // The left-hand side of a non-array read, e.g. `data.x = ` or
    // `data.x = Some(`.
    fn assignment_target(&self) -> String {
        match &self.name {
            None => String::new(),
            Some(name) => {
                let ident = rust_ident(name);
                if self.optional {
                    format!("data.{} = Some(", ident)
                } else {
                    format!("data.{} = ", ident)
                }
            }
        }
    }

    fn read_statement(&self, target: &str) -> Result<CodeBlock, GenError> {
        let mut statement = CodeBlock::new();
        statement.add(target);

        match &*self.field_type {
            EoType::Blob => {
                statement.add("reader.get_bytes(reader.remaining())");
            }
            EoType::Struct(protocol_struct) => {
                statement.add(&format!("{}::deserialize(reader)?", protocol_struct.name()));
                statement.add_import(Import::Generated {
                    module_dir: protocol_struct.source_path().to_owned(),
                    name: protocol_struct.name().to_owned(),
                });
            }
            _ => {
                let length_expression = if self.array_field {
                    None
                } else {
                    self.length_expression()?
                };
                let underlying_name = self
                    .field_type
                    .underlying()
                    .map(|underlying| underlying.name().to_owned())
                    .unwrap_or_else(|| self.field_type.name().to_owned());

                let mut read_basic_type = Self::read_statement_for_basic_type(
                    &underlying_name,
                    length_expression.as_deref(),
                    self.padded,
                );

                if let Some(offset_expression) = Self::length_offset_expression(self.offset) {
                    read_basic_type.push_str(&offset_expression);
                }

                match &*self.field_type {
                    EoType::Bool { .. } => {
                        statement.add(&format!("{} != 0", read_basic_type));
                    }
                    EoType::Enum(protocol_enum) => {
                        if protocol_enum.underlying().name() == "byte" {
                            read_basic_type = format!("u32::from({})", read_basic_type);
                        }
                        statement.add(&format!(
                            "{}::from({})",
                            protocol_enum.name(),
                            read_basic_type
                        ));
                    }
                    _ => {
                        statement.add(&read_basic_type);
                    }
                }
            }
        }

        // Close the Some(...) or push(...) wrapper
        if target.ends_with('(') {
            statement.add(")");
        }
        if !target.is_empty() || self.name.is_none() {
            statement.add(";");
        }
        statement.add("\n");

        Ok(statement)
    }

    fn read_statement_for_basic_type(
        underlying_name: &str,
        length_expression: Option<&str>,
        padded: bool,
    ) -> String {
        match underlying_name {
            "byte" => "reader.get_byte()".to_owned(),
            "char" => "reader.get_char()".to_owned(),
            "short" => "reader.get_short()".to_owned(),
            "three" => "reader.get_three()".to_owned(),
            "int" => "reader.get_int()".to_owned(),
            "string" => match length_expression {
                None => "reader.get_string()".to_owned(),
                Some(length_expression) => {
                    format!("reader.get_fixed_string({}, {})", length_expression, padded)
                }
            },
            "encoded_string" => match length_expression {
                None => "reader.get_encoded_string()".to_owned(),
                Some(length_expression) => format!(
                    "reader.get_fixed_encoded_string({}, {})",
                    length_expression, padded
                ),
            },
            _ => unreachable!("unhandled basic type"),
        }
    }

    fn length_expression(&self) -> Result<Option<String>, GenError> {
        let length_string = match &self.length_string {
            Some(length_string) => length_string,
            None => return Ok(None),
        };

        if try_parse_int(length_string).is_some() {
            return Ok(Some(length_string.clone()));
        }

        if !self.context.accessible_fields.contains_key(length_string) {
            return Err(GenError::schema(format!(
                "Referenced {} field is not accessible.",
                length_string
            )));
        }

        Ok(Some(format!("data.{} as usize", rust_ident(length_string))))
    }

    fn length_offset_expression(offset: i32) -> Option<String> {
        if offset != 0 {
            Some(format!(
                " {} {}",
                if offset > 0 { "+" } else { "-" },
                offset.abs()
            ))
        } else {
            None
        }
    }

    fn storage_type_name(&self) -> String {
        let mut type_name = rust_type_name(&self.field_type);
        if self.array_field {
            type_name = format!("Vec<{}>", type_name);
        }
        if self.optional {
            type_name = format!("Option<{}>", type_name);
        }
        type_name
    }

    fn initializer_expression(&self) -> String {
        if self.optional {
            return "None".to_owned();
        }
        if self.array_field {
            return "Vec::new()".to_owned();
        }

        match &*self.field_type {
            EoType::Integer(_) => self
                .hardcoded_value
                .clone()
                .unwrap_or_else(|| "0".to_owned()),
            EoType::Bool { .. } => self
                .hardcoded_value
                .clone()
                .unwrap_or_else(|| "false".to_owned()),
            EoType::String { .. } => match &self.hardcoded_value {
                Some(hardcoded_value) => format!(
                    "String::from(\"{}\")",
                    escape_string_literal(hardcoded_value)
                ),
                None => "String::new()".to_owned(),
            },
            EoType::Blob => "Vec::new()".to_owned(),
            EoType::Enum(protocol_enum) => format!("{}::default()", protocol_enum.name()),
            EoType::Struct(protocol_struct) => {
                format!("{}::default()", protocol_struct.name())
            }
        }
    }

    fn accessor_doc(&self) -> CodeBlock {
        let mut notes = Vec::new();

        if let Some(length_string) = &self.length_string {
            let field_data = self.context.accessible_fields.get(length_string);
            let size_description = match field_data {
                Some(field_data) => match &*field_data.field_type {
                    EoType::Integer(integer) => {
                        format!(
                            "{} or less",
                            max_value_of(integer) as i64 + field_data.offset as i64
                        )
                    }
                    _ => format!("`{}`", length_string),
                },
                None => {
                    let mut description = format!("`{}`", length_string);
                    if self.padded {
                        description.push_str(" or less");
                    }
                    description
                }
            };
            notes.push(format!("Length must be {}.", size_description));
        }

        if let EoType::Integer(integer) = &*self.field_type {
            let value_description = if self.array_field {
                "Element value"
            } else {
                "Value"
            };
            notes.push(format!(
                "{} range is 0-{}.",
                value_description,
                max_value_of(integer)
            ));
        }

        doc_comment(self.comment.as_deref(), &notes)
    }

    // (accessor return type, accessor body)
    fn accessor_shape(&self, ident: &str) -> (String, String) {
        let base = rust_type_name(&self.field_type);

        let by_value = matches!(
            &*self.field_type,
            EoType::Integer(_) | EoType::Bool { .. } | EoType::Enum(_)
        ) && !self.array_field;

        if self.optional {
            if by_value {
                (
                    format!("Option<{}>", base),
                    format!("self.{}", ident),
                )
            } else if self.array_field {
                (
                    format!("Option<&[{}]>", base),
                    format!("self.{}.as_deref()", ident),
                )
            } else {
                match &*self.field_type {
                    EoType::String { .. } => (
                        "Option<&str>".to_owned(),
                        format!("self.{}.as_deref()", ident),
                    ),
                    EoType::Blob => (
                        "Option<&[u8]>".to_owned(),
                        format!("self.{}.as_deref()", ident),
                    ),
                    _ => (
                        format!("Option<&{}>", base),
                        format!("self.{}.as_ref()", ident),
                    ),
                }
            }
        } else if self.array_field {
            (format!("&[{}]", base), format!("&self.{}", ident))
        } else if by_value {
            (base, format!("self.{}", ident))
        } else {
            match &*self.field_type {
                EoType::String { .. } => ("&str".to_owned(), format!("&self.{}", ident)),
                EoType::Blob => ("&[u8]".to_owned(), format!("&self.{}", ident)),
                _ => (format!("&{}", base), format!("&self.{}", ident)),
            }
        }
    }
}
