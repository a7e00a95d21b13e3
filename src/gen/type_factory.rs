//! Indexing and lazy resolution of schema-defined types.

use std::collections::HashMap;
use std::rc::Rc;

use super::types::{EnumType, EnumValue, EoType, IntegerType, Length, StructType};
use super::xml::{try_parse_int, Element};
use super::GenError;

/// A custom type that has been indexed but not yet resolved.
#[derive(Clone, Debug)]
struct UnresolvedCustomType {
    element: Element,
    source_path: String,
}

/// Resolves schema type names to [`EoType`] values.
///
/// Custom types are indexed up front from their XML elements and resolved on
/// first use; resolved types are cached for the rest of the generation run.
/// String types with a specified length are the exception: each length
/// qualifier yields a distinct instance, so they bypass the cache.
#[derive(Default)]
pub struct TypeFactory {
    unresolved_types: HashMap<String, UnresolvedCustomType>,
    types: HashMap<String, Rc<EoType>>,
}

impl TypeFactory {
    pub fn new() -> Self {
        TypeFactory::default()
    }

    /// Resolves a type by name, with no length qualifier.
    pub fn get_type(&mut self, name: &str) -> Result<Rc<EoType>, GenError> {
        self.get_type_with_length(name, Length::unspecified())
    }

    /// Resolves a type by name and length qualifier.
    pub fn get_type_with_length(
        &mut self,
        name: &str,
        length: Length,
    ) -> Result<Rc<EoType>, GenError> {
        if length.specified() {
            return Self::create_type_with_specified_length(name, length);
        }
        if let Some(existing) = self.types.get(name) {
            return Ok(Rc::clone(existing));
        }
        let created = Rc::new(self.create_type(name)?);
        self.types.insert(name.to_owned(), Rc::clone(&created));
        Ok(created)
    }

    /// Indexes a custom type element for later resolution.
    ///
    /// Returns false if a type with the same name was already indexed.
    pub fn define_custom_type(
        &mut self,
        element: &Element,
        source_path: &str,
    ) -> Result<bool, GenError> {
        let name = element.required_attr("name")?;
        if self.unresolved_types.contains_key(name) {
            return Ok(false);
        }
        self.unresolved_types.insert(
            name.to_owned(),
            UnresolvedCustomType {
                element: element.clone(),
                source_path: source_path.to_owned(),
            },
        );
        Ok(true)
    }

    fn create_type(&mut self, name: &str) -> Result<EoType, GenError> {
        let underlying_type = self.read_underlying_type(name)?;
        let name = match name.find(':') {
            Some(index) => &name[..index],
            None => name,
        };

        let result = match name {
            "byte" | "char" => EoType::Integer(IntegerType::new(name, 1)),
            "short" => EoType::Integer(IntegerType::new(name, 2)),
            "three" => EoType::Integer(IntegerType::new(name, 3)),
            "int" => EoType::Integer(IntegerType::new(name, 4)),
            "bool" => EoType::Bool {
                underlying: match underlying_type.clone() {
                    Some(underlying) => underlying,
                    None => IntegerType::new("char", 1),
                },
            },
            "string" | "encoded_string" => EoType::String {
                name: name.to_owned(),
                length: Length::unspecified(),
            },
            "blob" => EoType::Blob,
            _ => self.create_custom_type(name, underlying_type.clone())?,
        };

        if underlying_type.is_some() && result.underlying().is_none() {
            return Err(GenError::schema(format!(
                "{} has no underlying type, so an underlying type override is not allowed.",
                result.name()
            )));
        }

        Ok(result)
    }

    fn read_underlying_type(&mut self, name: &str) -> Result<Option<IntegerType>, GenError> {
        let mut parts = name.split(':');
        let type_name = parts.next().unwrap_or_default();
        let underlying_type_name = match parts.next() {
            Some(underlying_type_name) => underlying_type_name,
            None => return Ok(None),
        };

        if parts.next().is_some() {
            return Err(GenError::schema(format!(
                "\"{}\" type syntax is invalid. (Only one colon is allowed)",
                name
            )));
        }

        if type_name == underlying_type_name {
            return Err(GenError::schema(format!(
                "{} type cannot specify itself as an underlying type.",
                type_name
            )));
        }

        let underlying_type = self.get_type(underlying_type_name)?;
        match &*underlying_type {
            EoType::Integer(integer) => Ok(Some(integer.clone())),
            other => Err(GenError::schema(format!(
                "{} is not a numeric type, so it cannot be specified as an underlying type.",
                other.name()
            ))),
        }
    }

    fn create_custom_type(
        &mut self,
        name: &str,
        underlying_type_override: Option<IntegerType>,
    ) -> Result<EoType, GenError> {
        let unresolved = match self.unresolved_types.get(name) {
            Some(unresolved) => unresolved.clone(),
            None => {
                return Err(GenError::schema(format!("{} type is not defined.", name)));
            }
        };

        match unresolved.element.name() {
            "enum" => self.create_enum_type(
                &unresolved.element,
                underlying_type_override,
                &unresolved.source_path,
            ),
            "struct" => self.create_struct_type(&unresolved.element, &unresolved.source_path),
            other => Err(GenError::schema(format!(
                "Unhandled custom type xml element: <{}>",
                other
            ))),
        }
    }

    fn create_enum_type(
        &mut self,
        protocol_enum: &Element,
        underlying_type_override: Option<IntegerType>,
        source_path: &str,
    ) -> Result<EoType, GenError> {
        let enum_name = protocol_enum.required_attr("name")?.to_owned();

        let underlying_type = match underlying_type_override {
            Some(underlying_type) => underlying_type,
            None => {
                let underlying_type_name = protocol_enum.required_attr("type")?.to_owned();
                if enum_name == underlying_type_name {
                    return Err(GenError::schema(format!(
                        "{} type cannot specify itself as an underlying type.",
                        enum_name
                    )));
                }

                let default_underlying_type = self.get_type(&underlying_type_name)?;
                match &*default_underlying_type {
                    EoType::Integer(integer) => integer.clone(),
                    other => {
                        return Err(GenError::schema(format!(
                            "{} is not a numeric type, so it cannot be specified as an \
                             underlying type.",
                            other.name()
                        )));
                    }
                }
            }
        };

        let mut values = Vec::new();
        let mut ordinals = Vec::new();
        let mut names = Vec::new();

        for protocol_value in protocol_enum.find_all("value") {
            let text = protocol_value.text()?;
            let value_name = protocol_value.required_attr("name")?.to_owned();

            let ordinal = match text.as_deref().and_then(try_parse_int) {
                Some(ordinal) => ordinal,
                None => {
                    return Err(GenError::schema(format!(
                        "{}.{} has invalid ordinal value \"{}\"",
                        enum_name,
                        value_name,
                        text.as_deref().unwrap_or("")
                    )));
                }
            };

            if ordinals.contains(&ordinal) {
                return Err(GenError::schema(format!(
                    "{}.{} cannot redefine ordinal value {}.",
                    enum_name, value_name, ordinal
                )));
            }
            ordinals.push(ordinal);

            if names.contains(&value_name) {
                return Err(GenError::schema(format!(
                    "{} enum cannot redefine value name {}.",
                    enum_name, value_name
                )));
            }
            names.push(value_name.clone());

            values.push(EnumValue::new(ordinal, &value_name));
        }

        Ok(EoType::Enum(EnumType::new(
            &enum_name,
            source_path,
            underlying_type,
            values,
        )))
    }

    fn create_struct_type(
        &mut self,
        protocol_struct: &Element,
        source_path: &str,
    ) -> Result<EoType, GenError> {
        Ok(EoType::Struct(StructType::new(
            protocol_struct.required_attr("name")?,
            self.calculate_fixed_struct_size(protocol_struct)?,
            self.is_bounded(protocol_struct)?,
            source_path,
        )))
    }

    fn calculate_fixed_struct_size(
        &mut self,
        protocol_struct: &Element,
    ) -> Result<Option<usize>, GenError> {
        let mut size = 0;

        for instruction in Self::flatten_instructions(protocol_struct) {
            let instruction_size = match instruction.name() {
                "field" => self.fixed_field_size(instruction)?,
                "array" => self.fixed_array_size(instruction)?,
                "dummy" => self.fixed_dummy_size(instruction)?,
                // Chunked reading and switch sections are not allowed in
                // fixed-size structs
                "chunked" | "switch" => return Ok(None),
                _ => Some(0),
            };

            match instruction_size {
                Some(instruction_size) => size += instruction_size,
                None => return Ok(None),
            }
        }

        Ok(Some(size))
    }

    fn fixed_field_size(&mut self, protocol_field: &Element) -> Result<Option<usize>, GenError> {
        let type_name = protocol_field.required_attr("type")?.to_owned();
        let type_length = Self::field_type_length(protocol_field);
        let type_instance = self.get_type_with_length(&type_name, type_length)?;

        let field_size = match type_instance.fixed_size() {
            // All fields in a fixed-size struct must also be fixed-size
            None => return Ok(None),
            Some(field_size) => field_size,
        };

        if protocol_field.attr("optional").is_some() {
            // Nothing can be optional in a fixed-size struct
            return Ok(None);
        }

        Ok(Some(field_size))
    }

    fn fixed_array_size(&mut self, protocol_array: &Element) -> Result<Option<usize>, GenError> {
        let length = match protocol_array.attr("length").and_then(try_parse_int) {
            // An array cannot be fixed-size unless a numeric length
            // attribute is provided
            None => return Ok(None),
            Some(length) => length as usize,
        };

        let type_name = protocol_array.required_attr("type")?.to_owned();
        let type_instance = self.get_type(&type_name)?;

        let element_size = match type_instance.fixed_size() {
            // An array cannot be fixed-size unless its elements are also
            // fixed-size
            None => return Ok(None),
            Some(element_size) => element_size,
        };

        if protocol_array.attr("optional").is_some() {
            return Ok(None);
        }

        if protocol_array.attr("delimited").is_some() {
            // It's possible to omit data or insert garbage data at the end
            // of each chunk
            return Ok(None);
        }

        Ok(Some(length * element_size))
    }

    fn fixed_dummy_size(&mut self, protocol_dummy: &Element) -> Result<Option<usize>, GenError> {
        let type_name = protocol_dummy.required_attr("type")?.to_owned();
        let type_instance = self.get_type(&type_name)?;
        Ok(type_instance.fixed_size())
    }

    fn is_bounded(&mut self, protocol_struct: &Element) -> Result<bool, GenError> {
        let mut result = true;

        for instruction in Self::flatten_instructions(protocol_struct) {
            if !result {
                // A break restores bounded reading for the rest of the chunk
                result = instruction.name() == "break";
                continue;
            }

            match instruction.name() {
                "field" => {
                    let type_name = instruction.required_attr("type")?.to_owned();
                    let field_type = self
                        .get_type_with_length(&type_name, Self::field_type_length(instruction))?;
                    result = field_type.bounded();
                }
                "array" => {
                    let type_name = instruction.required_attr("type")?.to_owned();
                    let element_type = self.get_type(&type_name)?;
                    result = element_type.bounded() && instruction.attr("length").is_some();
                }
                "dummy" => {
                    let type_name = instruction.required_attr("type")?.to_owned();
                    let dummy_type = self.get_type(&type_name)?;
                    result = dummy_type.bounded();
                }
                _ => {}
            }
        }

        Ok(result)
    }

    fn flatten_instructions(element: &Element) -> Vec<&Element> {
        let mut result = Vec::new();
        for instruction in element.instructions() {
            Self::flatten_instruction(instruction, &mut result);
        }
        result
    }

    fn flatten_instruction<'a>(instruction: &'a Element, result: &mut Vec<&'a Element>) {
        result.push(instruction);

        match instruction.name() {
            "chunked" => {
                for chunked_instruction in instruction.instructions() {
                    Self::flatten_instruction(chunked_instruction, result);
                }
            }
            "switch" => {
                for protocol_case in instruction.find_all("case") {
                    for case_instruction in protocol_case.instructions() {
                        Self::flatten_instruction(case_instruction, result);
                    }
                }
            }
            _ => {}
        }
    }

    fn field_type_length(protocol_field: &Element) -> Length {
        match protocol_field.attr("length") {
            Some(length_string) => Length::from_string(length_string),
            None => Length::unspecified(),
        }
    }

    fn create_type_with_specified_length(
        name: &str,
        length: Length,
    ) -> Result<Rc<EoType>, GenError> {
        match name {
            "string" | "encoded_string" => Ok(Rc::new(EoType::String {
                name: name.to_owned(),
                length,
            })),
            _ => Err(GenError::schema(format!(
                "{} type with length {} is invalid. (Only string types may specify a length)",
                name, length
            ))),
        }
    }
}
