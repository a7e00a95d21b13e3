//! Translation of one schema element into a generated type definition.
//!
//! An `ObjectCodeGenerator` consumes the child instruction sequence of a
//! `<struct>` or `<packet>` element, delegating to the field and switch
//! generators, and assembles the storage struct, accessors, trait impls, and
//! debug representation of the generated type.

use std::collections::HashMap;
use std::rc::Rc;

use super::code_block::{CodeBlock, Import};
use super::field_generator::{doc_comment, FieldCodeGeneratorBuilder};
use super::switch_generator::SwitchCodeGenerator;
use super::type_factory::TypeFactory;
use super::types::EoType;
use super::xml::Element;
use super::GenError;

/// A named field that later instructions may reference (as a length source
/// or switch discriminator).
#[derive(Clone, Debug)]
pub struct FieldData {
    pub name: String,
    pub field_type: Rc<EoType>,
    pub offset: i32,
    pub array: bool,
}

/// Generation state threaded through the instruction sequence.
#[derive(Clone, Debug, Default)]
pub struct ObjectGenerationContext {
    pub chunked_reading_enabled: bool,
    pub reached_optional_field: bool,
    pub reached_dummy: bool,
    pub needs_old_writer_length_variable: bool,
    pub accessible_fields: HashMap<String, FieldData>,
    pub length_field_is_referenced_map: HashMap<String, bool>,
}

/// One storage slot of the generated struct.
pub struct FieldDecl {
    pub ident: String,
    pub type_name: String,
    pub initializer: String,
}

/// The accumulated pieces of a generated type definition.
pub struct ObjectGenerationData {
    pub class_name: String,
    pub field_decls: Vec<FieldDecl>,
    pub imports: CodeBlock,
    pub methods: CodeBlock,
    pub serialize: CodeBlock,
    pub deserialize: CodeBlock,
    pub auxiliary_types: CodeBlock,
    pub doc: CodeBlock,
    pub repr_fields: Vec<String>,
}

impl ObjectGenerationData {
    fn new(class_name: &str) -> Self {
        ObjectGenerationData {
            class_name: class_name.to_owned(),
            field_decls: Vec::new(),
            imports: CodeBlock::new(),
            methods: CodeBlock::new(),
            serialize: CodeBlock::new(),
            deserialize: CodeBlock::new(),
            auxiliary_types: CodeBlock::new(),
            doc: CodeBlock::new(),
            repr_fields: vec!["byte_size".to_owned()],
        }
    }

    pub fn add_field_decl(&mut self, ident: &str, type_name: &str, initializer: &str) {
        self.field_decls.push(FieldDecl {
            ident: ident.to_owned(),
            type_name: type_name.to_owned(),
            initializer: initializer.to_owned(),
        });
    }

    pub fn add_method(&mut self, method: &CodeBlock) {
        if !self.methods.is_empty() {
            self.methods.add_break();
        }
        self.methods.add_code_block(method);
    }

    pub fn add_auxiliary_type(&mut self, auxiliary_type: &CodeBlock) {
        if !self.auxiliary_types.is_empty() {
            self.auxiliary_types.add_break();
        }
        self.auxiliary_types.add_code_block(auxiliary_type);
    }
}

/// Generates one type definition from a schema element's instructions.
pub struct ObjectCodeGenerator<'a> {
    type_factory: &'a mut TypeFactory,
    context: ObjectGenerationContext,
    data: ObjectGenerationData,
}

impl<'a> ObjectCodeGenerator<'a> {
    pub fn new(class_name: &str, type_factory: &'a mut TypeFactory) -> Self {
        Self::with_context(class_name, type_factory, ObjectGenerationContext::default())
    }

    pub fn with_context(
        class_name: &str,
        type_factory: &'a mut TypeFactory,
        context: ObjectGenerationContext,
    ) -> Self {
        ObjectCodeGenerator {
            type_factory,
            context,
            data: ObjectGenerationData::new(class_name),
        }
    }

    pub fn context(&self) -> &ObjectGenerationContext {
        &self.context
    }

    /// Sets the doc comment of the generated type.
    pub fn set_doc(&mut self, comment: Option<&str>) {
        self.data.doc = doc_comment(comment, &[]);
    }

    /// Generates code for a single child instruction.
    pub fn generate_instruction(&mut self, instruction: &Element) -> Result<(), GenError> {
        if self.context.reached_dummy {
            return Err(GenError::schema(
                "<dummy> elements must not be followed by any other elements.",
            ));
        }

        match instruction.name() {
            "field" => self.generate_field(instruction),
            "array" => self.generate_array(instruction),
            "length" => self.generate_length(instruction),
            "dummy" => self.generate_dummy(instruction),
            "switch" => self.generate_switch(instruction),
            "chunked" => self.generate_chunked(instruction),
            "break" => self.generate_break(),
            _ => Ok(()),
        }
    }

    fn generate_field(&mut self, protocol_field: &Element) -> Result<(), GenError> {
        let optional = protocol_field.attr("optional").is_some();
        self.check_optional_field(optional)?;

        let mut field = FieldCodeGeneratorBuilder::new()
            .name(protocol_field.attr("name"))
            .type_string(protocol_field.required_attr("type")?)
            .length(protocol_field.attr("length"))
            .padded(protocol_field.bool_attr("padded", false))
            .optional(optional)
            .hardcoded_value(protocol_field.text()?)
            .comment(protocol_field.comment())
            .build(self.type_factory, &mut self.context, &mut self.data)?;

        field.generate_field()?;
        field.generate_serialize()?;
        field.generate_deserialize()?;

        if optional {
            self.context.reached_optional_field = true;
        }

        Ok(())
    }

    fn generate_array(&mut self, protocol_array: &Element) -> Result<(), GenError> {
        let optional = protocol_array.attr("optional").is_some();
        self.check_optional_field(optional)?;

        let delimited = protocol_array.attr("delimited").is_some();
        if delimited && !self.context.chunked_reading_enabled {
            return Err(GenError::schema(
                "Cannot generate a delimited array instruction unless chunked reading is enabled.",
            ));
        }

        let mut field = FieldCodeGeneratorBuilder::new()
            .name(Some(protocol_array.required_attr("name")?))
            .type_string(protocol_array.required_attr("type")?)
            .length(protocol_array.attr("length"))
            .optional(optional)
            .comment(protocol_array.comment())
            .array_field(true)
            .delimited(delimited)
            .trailing_delimiter(protocol_array.bool_attr("trailing-delimiter", true))
            .build(self.type_factory, &mut self.context, &mut self.data)?;

        field.generate_field()?;
        field.generate_serialize()?;
        field.generate_deserialize()?;

        if optional {
            self.context.reached_optional_field = true;
        }

        Ok(())
    }

    fn generate_length(&mut self, protocol_length: &Element) -> Result<(), GenError> {
        let optional = protocol_length.attr("optional").is_some();
        self.check_optional_field(optional)?;

        let mut field = FieldCodeGeneratorBuilder::new()
            .name(Some(protocol_length.required_attr("name")?))
            .type_string(protocol_length.required_attr("type")?)
            .offset(protocol_length.int_attr("offset", 0)?)
            .length_field(true)
            .optional(optional)
            .comment(protocol_length.comment())
            .build(self.type_factory, &mut self.context, &mut self.data)?;

        field.generate_field()?;
        field.generate_serialize()?;
        field.generate_deserialize()?;

        if optional {
            self.context.reached_optional_field = true;
        }

        Ok(())
    }

    fn generate_dummy(&mut self, protocol_dummy: &Element) -> Result<(), GenError> {
        let needs_if_guards =
            !self.data.serialize.is_empty() || !self.data.deserialize.is_empty();

        if needs_if_guards {
            self.data
                .serialize
                .begin_control_flow("if writer.length() == old_writer_length");
            self.data
                .deserialize
                .begin_control_flow("if reader.position() == reader_start_position");
        }

        let mut field = FieldCodeGeneratorBuilder::new()
            .type_string(protocol_dummy.required_attr("type")?)
            .hardcoded_value(protocol_dummy.text()?)
            .comment(protocol_dummy.comment())
            .build(self.type_factory, &mut self.context, &mut self.data)?;

        field.generate_serialize()?;
        field.generate_deserialize()?;

        if needs_if_guards {
            self.data.serialize.end_control_flow();
            self.data.deserialize.end_control_flow();
            self.context.needs_old_writer_length_variable = true;
        }

        self.context.reached_dummy = true;

        Ok(())
    }

    fn generate_switch(&mut self, protocol_switch: &Element) -> Result<(), GenError> {
        let field_name = protocol_switch.required_attr("field")?.to_owned();
        let protocol_cases = protocol_switch.find_all("case");

        let mut switch_generator = SwitchCodeGenerator::new(
            &field_name,
            self.type_factory,
            &mut self.context,
            &mut self.data,
        );

        switch_generator.generate_case_data_interface(&protocol_cases)?;
        switch_generator.generate_case_data_field();

        let mut reached_optional_field = switch_generator.reached_optional_field();
        let mut reached_dummy = switch_generator.reached_dummy();
        let mut start = true;

        for protocol_case in &protocol_cases {
            let case_context = switch_generator.generate_case(protocol_case, start)?;

            reached_optional_field = reached_optional_field || case_context.reached_optional_field;
            reached_dummy = reached_dummy || case_context.reached_dummy;
            start = false;
        }

        if !protocol_cases.is_empty() {
            switch_generator.end_switch();
        }

        self.context.reached_optional_field = reached_optional_field;
        self.context.reached_dummy = reached_dummy;

        Ok(())
    }

    fn generate_chunked(&mut self, protocol_chunked: &Element) -> Result<(), GenError> {
        let was_already_enabled = self.context.chunked_reading_enabled;
        if !was_already_enabled {
            self.context.chunked_reading_enabled = true;
            self.data
                .deserialize
                .add_line("reader.set_chunked_reading_mode(true);");
            self.data
                .serialize
                .add_line("writer.set_string_sanitization_mode(true);");
        }

        for instruction in protocol_chunked.instructions() {
            self.generate_instruction(instruction)?;
        }

        if !was_already_enabled {
            self.context.chunked_reading_enabled = false;
            self.data
                .deserialize
                .add_line("reader.set_chunked_reading_mode(false);");
            self.data
                .serialize
                .add_line("writer.set_string_sanitization_mode(false);");
        }

        Ok(())
    }

    fn generate_break(&mut self) -> Result<(), GenError> {
        if !self.context.chunked_reading_enabled {
            return Err(GenError::schema(
                "Cannot generate a break instruction unless chunked reading is enabled.",
            ));
        }

        self.context.reached_optional_field = false;
        self.context.reached_dummy = false;

        self.data.serialize.add_line("writer.add_byte(0xFF);");
        self.data.deserialize.add_line("reader.next_chunk()?;");

        Ok(())
    }

    fn check_optional_field(&self, optional: bool) -> Result<(), GenError> {
        if self.context.reached_optional_field && !optional {
            return Err(GenError::schema(
                "Optional fields may not be followed by non-optional fields.",
            ));
        }
        Ok(())
    }

    /// Assembles the complete generated type definition.
    pub fn into_code(self) -> CodeBlock {
        let context = self.context;
        let data = self.data;
        let class_name = data.class_name.clone();

        let mut result = CodeBlock::new();
        result.add_import(Import::External(
            "eolib::data::{EoReader, EoWriter}".to_owned(),
        ));
        result.add_import(Import::External(
            "eolib::protocol::{EoDeserialize, EoSerialize, SerializationError}".to_owned(),
        ));
        result.add_import(Import::External("std::fmt".to_owned()));
        result.add_code_block(&data.imports);

        // Struct declaration
        result.add_code_block(&data.doc);
        result.add_line("#[derive(Clone)]");
        result.begin_control_flow(&format!("pub struct {}", class_name));
        result.add_line("byte_size: usize,");
        for field_decl in &data.field_decls {
            result.add_line(&format!("{}: {},", field_decl.ident, field_decl.type_name));
        }
        result.end_control_flow();
        result.add_break();

        // Default
        result.begin_control_flow(&format!("impl Default for {}", class_name));
        result.begin_control_flow("fn default() -> Self");
        result.begin_control_flow("Self");
        result.add_line("byte_size: 0,");
        for field_decl in &data.field_decls {
            result.add_line(&format!("{}: {},", field_decl.ident, field_decl.initializer));
        }
        result.end_control_flow();
        result.end_control_flow();
        result.end_control_flow();
        result.add_break();

        // Inherent methods: byte_size plus the field accessors
        result.begin_control_flow(&format!("impl {}", class_name));
        result.add_line("/// Returns the size of the data that this was deserialized from.");
        result.begin_control_flow("pub fn byte_size(&self) -> usize");
        result.add_line("self.byte_size");
        result.end_control_flow();
        if !data.methods.is_empty() {
            result.add_break();
            result.add_code_block(&data.methods);
        }
        result.end_control_flow();
        result.add_break();

        // Serialize
        result.begin_control_flow(&format!("impl EoSerialize for {}", class_name));
        result.begin_control_flow(
            "fn serialize(&self, writer: &mut EoWriter) -> Result<(), SerializationError>",
        );
        if data.serialize.contains("data") {
            result.add_line("let data = self;");
        }
        if context.needs_old_writer_length_variable {
            result.add_line("let old_writer_length = writer.length();");
        }
        result.add_line("let old_string_sanitization_mode = writer.string_sanitization_mode();");
        result.begin_control_flow("let result = (|| -> Result<(), SerializationError>");
        result.add_code_block(&data.serialize);
        result.add_line("Ok(())");
        result.unindent();
        result.add_line("})();");
        result.add_line("writer.set_string_sanitization_mode(old_string_sanitization_mode);");
        result.add_line("result");
        result.end_control_flow();
        result.end_control_flow();
        result.add_break();

        // Deserialize
        result.begin_control_flow(&format!("impl EoDeserialize for {}", class_name));
        result.begin_control_flow(
            "fn deserialize(reader: &mut EoReader) -> Result<Self, SerializationError>",
        );
        result.add_line("let mut data = Self::default();");
        result.add_line("let old_chunked_reading_mode = reader.chunked_reading_mode();");
        result.begin_control_flow("let result = (|| -> Result<(), SerializationError>");
        result.add_line("let reader_start_position = reader.position();");
        result.add_code_block(&data.deserialize);
        result.add_line("data.byte_size = reader.position() - reader_start_position;");
        result.add_line("Ok(())");
        result.unindent();
        result.add_line("})();");
        result.add_line("reader.set_chunked_reading_mode(old_chunked_reading_mode);");
        result.add_line("result?;");
        result.add_line("Ok(data)");
        result.end_control_flow();
        result.end_control_flow();
        result.add_break();

        // Debug
        result.begin_control_flow(&format!("impl fmt::Debug for {}", class_name));
        result.begin_control_flow("fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result");
        result.add_line(&format!("f.debug_struct(\"{}\")", class_name));
        result.indent();
        for repr_field in &data.repr_fields {
            let display_name = repr_field.strip_prefix("r#").unwrap_or(repr_field);
            result.add_line(&format!(".field(\"{}\", &self.{})", display_name, repr_field));
        }
        result.add_line(".finish()");
        result.unindent();
        result.end_control_flow();
        result.end_control_flow();

        if !data.auxiliary_types.is_empty() {
            result.add_break();
            result.add_code_block(&data.auxiliary_types);
        }

        result
    }
}
