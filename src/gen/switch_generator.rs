//! Emission of tagged-union case data for `<switch>` instructions.
//!
//! Each switch over a field produces a sum type with one variant per
//! non-empty case (each carrying a generated case struct), stored in a
//! nullable slot on the parent type. Empty cases enforce a `None` payload.

use super::code_block::CodeBlock;
use super::object_generator::{
    FieldData, ObjectCodeGenerator, ObjectGenerationContext, ObjectGenerationData,
};
use super::type_factory::TypeFactory;
use super::types::EoType;
use super::xml::{try_parse_int, Element};
use super::{rust_ident, snake_case_to_pascal_case, GenError};

pub struct SwitchCodeGenerator<'a> {
    field_name: String,
    type_factory: &'a mut TypeFactory,
    context: &'a mut ObjectGenerationContext,
    data: &'a mut ObjectGenerationData,
}

impl<'a> SwitchCodeGenerator<'a> {
    pub fn new(
        field_name: &str,
        type_factory: &'a mut TypeFactory,
        context: &'a mut ObjectGenerationContext,
        data: &'a mut ObjectGenerationData,
    ) -> Self {
        SwitchCodeGenerator {
            field_name: field_name.to_owned(),
            type_factory,
            context,
            data,
        }
    }

    pub fn reached_optional_field(&self) -> bool {
        self.context.reached_optional_field
    }

    pub fn reached_dummy(&self) -> bool {
        self.context.reached_dummy
    }

    /// Emits the sum type over the switch's non-empty cases.
    pub fn generate_case_data_interface(
        &mut self,
        protocol_cases: &[&Element],
    ) -> Result<(), GenError> {
        let interface_type_name = self.interface_type_name();

        let mut interface = CodeBlock::new();
        interface.add_line(&format!(
            "/// Data associated with different values of the `{}` field.",
            self.field_name
        ));
        interface.add_line("#[derive(Clone, Debug)]");
        interface.begin_control_flow(&format!("pub enum {}", interface_type_name));
        for protocol_case in protocol_cases {
            if protocol_case.instructions().is_empty() {
                continue;
            }
            let variant = self.case_variant_name(protocol_case)?;
            interface.add_line(&format!("{}({}{}),", variant, interface_type_name, variant));
        }
        interface.end_control_flow();

        self.data.add_auxiliary_type(&interface);

        Ok(())
    }

    /// Emits the nullable case data slot and its accessors.
    pub fn generate_case_data_field(&mut self) {
        let interface_type_name = self.interface_type_name();
        let case_data_field_name = self.case_data_field_name();

        self.data.add_field_decl(
            &case_data_field_name,
            &format!("Option<{}>", interface_type_name),
            "None",
        );

        let mut accessor = CodeBlock::new();
        accessor.add_line(&format!(
            "/// Returns the data associated with the `{}` field.",
            self.field_name
        ));
        accessor.begin_control_flow(&format!(
            "pub fn {}(&self) -> Option<&{}>",
            case_data_field_name, interface_type_name
        ));
        accessor.add_line(&format!("self.{}.as_ref()", case_data_field_name));
        accessor.end_control_flow();
        self.data.add_method(&accessor);

        let mut setter = CodeBlock::new();
        setter.begin_control_flow(&format!(
            "pub fn set_{}(&mut self, {}: Option<{}>)",
            case_data_field_name, case_data_field_name, interface_type_name
        ));
        setter.add_line(&format!(
            "self.{} = {};",
            case_data_field_name, case_data_field_name
        ));
        setter.end_control_flow();
        self.data.add_method(&setter);

        self.data.repr_fields.push(case_data_field_name);
    }

    /// Emits one case's branch of the serialize/deserialize dispatch and, for
    /// non-empty cases, its generated case struct.
    ///
    /// Returns the case's generation context so the caller can merge the
    /// reached-optional and reached-dummy flags.
    pub fn generate_case(
        &mut self,
        protocol_case: &Element,
        start: bool,
    ) -> Result<ObjectGenerationContext, GenError> {
        let mut case_context = self.context.clone();
        case_context.accessible_fields.clear();
        case_context.length_field_is_referenced_map.clear();

        let default = protocol_case.bool_attr("default", false);

        if default {
            if start {
                return Err(GenError::schema("Standalone default case is not allowed."));
            }
            self.data.serialize.next_control_flow("else");
            self.data.deserialize.next_control_flow("else");
        } else {
            let condition = format!(
                "if data.{} == {}",
                rust_ident(&self.field_name),
                self.case_value_expression(protocol_case)?
            );
            if start {
                self.data.serialize.begin_control_flow(&condition);
                self.data.deserialize.begin_control_flow(&condition);
            } else {
                self.data
                    .serialize
                    .next_control_flow(&format!("else {}", condition));
                self.data
                    .deserialize
                    .next_control_flow(&format!("else {}", condition));
            }
        }

        let field_format_spec = match &*self.field_data()?.field_type {
            EoType::Enum(_) => "{:?}",
            _ => "{}",
        };
        let field_value_expression = format!("data.{}", rust_ident(&self.field_name));
        let case_data_field_name = self.case_data_field_name();

        if protocol_case.instructions().is_empty() {
            self.data.serialize.begin_control_flow(&format!(
                "if data.{}.is_some()",
                case_data_field_name
            ));
            self.data
                .serialize
                .add_line("return Err(SerializationError::new(format!(");
            self.data.serialize.indent();
            self.data.serialize.add_line(&format!(
                "\"Expected {} to be None for {} {}.\",",
                case_data_field_name, self.field_name, field_format_spec
            ));
            self.data
                .serialize
                .add_line(&field_value_expression);
            self.data.serialize.unindent();
            self.data.serialize.add_line(")));");
            self.data.serialize.end_control_flow();

            self.data
                .deserialize
                .add_line(&format!("data.{} = None;", case_data_field_name));

            return Ok(case_context);
        }

        let variant = self.case_variant_name(protocol_case)?;
        let interface_type_name = self.interface_type_name();
        let case_data_type_name = format!("{}{}", interface_type_name, variant);

        let (case_code, result_context) =
            self.generate_case_data_type(protocol_case, &case_data_type_name, case_context)?;
        self.data.add_auxiliary_type(&case_code);

        self.data
            .serialize
            .begin_control_flow(&format!("match &data.{}", case_data_field_name));
        self.data.serialize.begin_control_flow(&format!(
            "Some({}::{}(case_data)) =>",
            interface_type_name, variant
        ));
        self.data.serialize.add_line("case_data.serialize(writer)?;");
        self.data.serialize.end_control_flow();
        self.data.serialize.begin_control_flow("_ =>");
        self.data
            .serialize
            .add_line("return Err(SerializationError::new(format!(");
        self.data.serialize.indent();
        self.data.serialize.add_line(&format!(
            "\"Expected {} to be {}::{} for {} {}.\",",
            case_data_field_name, interface_type_name, variant, self.field_name, field_format_spec
        ));
        self.data
            .serialize
            .add_line(&field_value_expression);
        self.data.serialize.unindent();
        self.data.serialize.add_line(")));");
        self.data.serialize.end_control_flow();
        self.data.serialize.end_control_flow();

        self.data.deserialize.add_line(&format!(
            "data.{} = Some({}::{}({}::deserialize(reader)?));",
            case_data_field_name, interface_type_name, variant, case_data_type_name
        ));

        Ok(result_context)
    }

    /// Closes the serialize/deserialize dispatch opened by the first case.
    pub fn end_switch(&mut self) {
        self.data.serialize.end_control_flow();
        self.data.deserialize.end_control_flow();
    }

    fn generate_case_data_type(
        &mut self,
        protocol_case: &Element,
        case_data_type_name: &str,
        case_context: ObjectGenerationContext,
    ) -> Result<(CodeBlock, ObjectGenerationContext), GenError> {
        let default = protocol_case.bool_attr("default", false);
        let mut comment = if default {
            format!("Default data associated with {}", self.field_name)
        } else {
            format!(
                "Data associated with {} value {}",
                self.field_name,
                self.case_value_expression(protocol_case)?
            )
        };

        if let Some(protocol_comment) = protocol_case.comment() {
            comment.push_str("\n\n");
            comment.push_str(&protocol_comment);
        }

        let mut case_generator = ObjectCodeGenerator::with_context(
            case_data_type_name,
            self.type_factory,
            case_context,
        );

        for instruction in protocol_case.instructions() {
            case_generator.generate_instruction(instruction)?;
        }

        case_generator.set_doc(Some(&comment));

        let result_context = case_generator.context().clone();
        Ok((case_generator.into_code(), result_context))
    }

    fn field_data(&self) -> Result<FieldData, GenError> {
        self.context
            .accessible_fields
            .get(&self.field_name)
            .cloned()
            .ok_or_else(|| {
                GenError::schema(format!(
                    "Referenced {} is not accessible.",
                    self.field_name
                ))
            })
    }

    fn interface_type_name(&self) -> String {
        format!(
            "{}{}Data",
            self.data.class_name,
            snake_case_to_pascal_case(&self.field_name)
        )
    }

    fn case_data_field_name(&self) -> String {
        format!("{}_data", self.field_name)
    }

    fn case_variant_name(&self, protocol_case: &Element) -> Result<String, GenError> {
        if protocol_case.bool_attr("default", false) {
            return Ok("Default".to_owned());
        }
        let value = protocol_case.required_attr("value")?;
        if value.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            Ok(format!("Case{}", value))
        } else {
            Ok(value.to_owned())
        }
    }

    fn case_value_expression(&self, protocol_case: &Element) -> Result<String, GenError> {
        let field_data = self.field_data()?;

        if field_data.array {
            return Err(GenError::schema(format!(
                "\"{}\" field referenced by switch must not be an array.",
                self.field_name
            )));
        }

        let case_value = protocol_case.required_attr("value")?;

        match &*field_data.field_type {
            EoType::Integer(_) => {
                if try_parse_int(case_value).is_none() {
                    return Err(GenError::schema(format!(
                        "\"{}\" is not a valid integer value.",
                        case_value
                    )));
                }
                Ok(case_value.to_owned())
            }
            EoType::Enum(protocol_enum) => {
                if let Some(ordinal) = try_parse_int(case_value) {
                    if let Some(enum_value) = protocol_enum.value_by_ordinal(ordinal) {
                        return Err(GenError::schema(format!(
                            "{} value {} must be referred to by name ({})",
                            protocol_enum.name(),
                            case_value,
                            enum_value.name()
                        )));
                    }
                    // An ordinal the enum does not define round-trips through
                    // the Unrecognized variant
                    return Ok(format!("{}::from({})", protocol_enum.name(), case_value));
                }

                match protocol_enum.value_by_name(case_value) {
                    Some(enum_value) => {
                        Ok(format!("{}::{}", protocol_enum.name(), enum_value.name()))
                    }
                    None => Err(GenError::schema(format!(
                        "\"{}\" is not a valid value for enum type {}.",
                        case_value,
                        protocol_enum.name()
                    ))),
                }
            }
            _ => Err(GenError::schema(format!(
                "{} field referenced by switch must be a numeric or enumeration type.",
                self.field_name
            ))),
        }
    }
}
