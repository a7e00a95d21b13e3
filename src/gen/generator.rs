//! The generation driver: walks the schema tree, indexes types, and emits
//! the generated source files.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use super::code_block::{CodeBlock, Import};
use super::field_generator::doc_comment;
use super::object_generator::ObjectCodeGenerator;
use super::rust_file::{ModuleTree, RustFile};
use super::type_factory::TypeFactory;
use super::types::{EnumType, EoType};
use super::xml::Element;
use super::{pascal_case_to_snake_case, GenError};

struct ProtocolFile {
    source_path: String,
    protocol: Element,
}

/// Generates protocol code from a tree of `protocol.xml` schema documents.
///
/// A generator performs a single run: it indexes every schema file under the
/// input root, then writes one source file per protocol type plus the
/// `mod.rs` files stitching them together. Any failure aborts the run and
/// leaves the output tree undefined; repeated runs on the same inputs
/// produce identical outputs.
pub struct ProtocolCodeGenerator {
    input_root: PathBuf,
    protocol_files: Vec<ProtocolFile>,
    type_factory: TypeFactory,
}

impl ProtocolCodeGenerator {
    /// Creates a generator reading schemas from the given input root.
    pub fn new(input_root: PathBuf) -> Self {
        ProtocolCodeGenerator {
            input_root,
            protocol_files: Vec::new(),
            type_factory: TypeFactory::new(),
        }
    }

    /// Runs the generation, writing the output tree under `output_root`.
    pub fn generate(mut self, output_root: &Path) -> Result<(), GenError> {
        self.index_protocol_files()?;
        self.generate_source_files(output_root)?;
        Ok(())
    }

    fn index_protocol_files(&mut self) -> Result<(), GenError> {
        let mut paths = Vec::new();

        for entry in WalkDir::new(&self.input_root).sort_by_file_name() {
            let entry = entry.map_err(|source| GenError::Io {
                path: self.input_root.clone(),
                source: source.into(),
            })?;
            if entry.file_type().is_file() && entry.file_name() == "protocol.xml" {
                paths.push(entry.into_path());
            }
        }

        for path in paths {
            self.index_protocol_file(&path)?;
        }

        Ok(())
    }

    fn index_protocol_file(&mut self, path: &Path) -> Result<(), GenError> {
        debug!("Indexing protocol file: {}", path.display());

        let contents = fs::read_to_string(path).map_err(|source| GenError::Io {
            path: path.to_owned(),
            source,
        })?;
        let protocol = Element::parse(&contents).map_err(|message| GenError::Xml {
            path: path.to_owned(),
            message,
        })?;

        if protocol.name() != "protocol" {
            return Err(GenError::schema("Expected a root <protocol> element."));
        }

        let source_path = path
            .parent()
            .and_then(|parent| parent.strip_prefix(&self.input_root).ok())
            .map(|relative| {
                relative
                    .components()
                    .map(|component| component.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default();

        for custom_type in protocol.find_all("enum") {
            if !self
                .type_factory
                .define_custom_type(custom_type, &source_path)?
            {
                return Err(GenError::schema(format!(
                    "{} type cannot be redefined.",
                    custom_type.required_attr("name")?
                )));
            }
        }

        for custom_type in protocol.find_all("struct") {
            if !self
                .type_factory
                .define_custom_type(custom_type, &source_path)?
            {
                return Err(GenError::schema(format!(
                    "{} type cannot be redefined.",
                    custom_type.required_attr("name")?
                )));
            }
        }

        let mut declared_packets = HashSet::new();
        for protocol_packet in protocol.find_all("packet") {
            let packet_identifier = format!(
                "{}_{}",
                protocol_packet.required_attr("family")?,
                protocol_packet.required_attr("action")?
            );
            if !declared_packets.insert(packet_identifier.clone()) {
                return Err(GenError::schema(format!(
                    "{} packet cannot be redefined in the same file.",
                    packet_identifier
                )));
            }
        }

        self.protocol_files.push(ProtocolFile {
            source_path,
            protocol,
        });

        Ok(())
    }

    fn generate_source_files(&mut self, output_root: &Path) -> Result<(), GenError> {
        let mut module_tree = ModuleTree::new();
        let mut generated_any_packet = false;

        let protocol_files = std::mem::take(&mut self.protocol_files);

        for protocol_file in &protocol_files {
            for protocol_enum in protocol_file.protocol.find_all("enum") {
                let (file, module_path) = self.generate_enum(protocol_enum)?;
                file.write(output_root)?;
                module_tree.add_module(&module_path);
            }

            for protocol_struct in protocol_file.protocol.find_all("struct") {
                let (file, module_path) = self.generate_struct(protocol_struct)?;
                file.write(output_root)?;
                module_tree.add_module(&module_path);
            }

            for protocol_packet in protocol_file.protocol.find_all("packet") {
                let (file, module_path) =
                    self.generate_packet(protocol_packet, &protocol_file.source_path)?;
                file.write(output_root)?;
                module_tree.add_module(&module_path);
                generated_any_packet = true;
            }
        }

        let mut extras = BTreeMap::new();
        if generated_any_packet {
            extras.insert("net".to_owned(), Self::packet_trait_code());
        }

        module_tree.write(output_root, &extras)?;

        Ok(())
    }

    fn generate_enum(
        &mut self,
        protocol_enum: &Element,
    ) -> Result<(RustFile, String), GenError> {
        let type_name = protocol_enum.required_attr("name")?.to_owned();
        let resolved = self.type_factory.get_type(&type_name)?;
        let enum_type = match &*resolved {
            EoType::Enum(enum_type) => enum_type.clone(),
            _ => {
                return Err(GenError::schema(format!(
                    "{} is not a valid enum type.",
                    type_name
                )));
            }
        };

        info!("Generating enum: {}", type_name);

        let mut code = CodeBlock::new();
        code.add_code_block(&doc_comment(protocol_enum.comment().as_deref(), &[]));
        code.add_line("#[derive(Debug, Clone, Copy, PartialEq, Eq)]");
        code.begin_control_flow(&format!("pub enum {}", type_name));
        for protocol_value in protocol_enum.find_all("value") {
            let value_name = protocol_value.required_attr("name")?;
            let value = enum_type.value_by_name(value_name).ok_or_else(|| {
                GenError::schema(format!("{} has no value named {}.", type_name, value_name))
            })?;
            code.add_code_block(&doc_comment(protocol_value.comment().as_deref(), &[]));
            code.add_line(&format!("{},", value.name()));
        }
        code.add_line("/// An ordinal value not defined in the protocol.");
        code.add_line("Unrecognized(u32),");
        code.end_control_flow();
        code.add_break();

        code.begin_control_flow(&format!("impl From<u32> for {}", type_name));
        code.begin_control_flow("fn from(value: u32) -> Self");
        code.begin_control_flow("match value");
        for value in enum_type.values() {
            code.add_line(&format!(
                "{} => {}::{},",
                value.ordinal(),
                type_name,
                value.name()
            ));
        }
        code.add_line(&format!("_ => {}::Unrecognized(value),", type_name));
        code.end_control_flow();
        code.end_control_flow();
        code.end_control_flow();
        code.add_break();

        code.begin_control_flow(&format!("impl From<{}> for u32", type_name));
        code.begin_control_flow(&format!("fn from(value: {}) -> u32", type_name));
        code.begin_control_flow("match value");
        for value in enum_type.values() {
            code.add_line(&format!(
                "{}::{} => {},",
                type_name,
                value.name(),
                value.ordinal()
            ));
        }
        code.add_line(&format!("{}::Unrecognized(ordinal) => ordinal,", type_name));
        code.end_control_flow();
        code.end_control_flow();
        code.end_control_flow();
        code.add_break();

        code.begin_control_flow(&format!("impl Default for {}", type_name));
        code.begin_control_flow("fn default() -> Self");
        code.add_line(&format!("{}::from(0)", type_name));
        code.end_control_flow();
        code.end_control_flow();

        let module_path = Self::module_path(enum_type.source_path(), &type_name);
        Ok((RustFile::new(&module_path, code), module_path))
    }

    fn generate_struct(
        &mut self,
        protocol_struct: &Element,
    ) -> Result<(RustFile, String), GenError> {
        let type_name = protocol_struct.required_attr("name")?.to_owned();
        let resolved = self.type_factory.get_type(&type_name)?;
        let struct_type = match &*resolved {
            EoType::Struct(struct_type) => struct_type.clone(),
            _ => {
                return Err(GenError::schema(format!(
                    "{} is not a valid struct type.",
                    type_name
                )));
            }
        };

        info!("Generating struct: {}", type_name);

        let mut object_generator = ObjectCodeGenerator::new(&type_name, &mut self.type_factory);
        for instruction in protocol_struct.instructions() {
            object_generator.generate_instruction(instruction)?;
        }
        object_generator.set_doc(protocol_struct.comment().as_deref());

        let code = object_generator.into_code();
        let module_path = Self::module_path(struct_type.source_path(), &type_name);
        Ok((RustFile::new(&module_path, code), module_path))
    }

    fn generate_packet(
        &mut self,
        protocol_packet: &Element,
        source_path: &str,
    ) -> Result<(RustFile, String), GenError> {
        let packet_suffix = Self::packet_suffix(source_path)?;
        let family_attribute = protocol_packet.required_attr("family")?.to_owned();
        let action_attribute = protocol_packet.required_attr("action")?.to_owned();
        let packet_type_name = format!("{}{}{}", family_attribute, action_attribute, packet_suffix);

        info!("Generating packet: {}", packet_type_name);

        let family_type = self.packet_metadata_enum("PacketFamily")?;
        let action_type = self.packet_metadata_enum("PacketAction")?;

        let family_enum_value = family_type.value_by_name(&family_attribute).ok_or_else(|| {
            GenError::schema(format!("Unknown packet family \"{}\"", family_attribute))
        })?;
        let action_enum_value = action_type.value_by_name(&action_attribute).ok_or_else(|| {
            GenError::schema(format!("Unknown packet action \"{}\"", action_attribute))
        })?;

        let mut object_generator =
            ObjectCodeGenerator::new(&packet_type_name, &mut self.type_factory);
        for instruction in protocol_packet.instructions() {
            object_generator.generate_instruction(instruction)?;
        }
        object_generator.set_doc(protocol_packet.comment().as_deref());

        let mut code = object_generator.into_code();
        code.add_break();

        code.add_import(Import::Generated {
            module_dir: "net".to_owned(),
            name: "Packet".to_owned(),
        });
        code.add_import(Import::Generated {
            module_dir: family_type.source_path().to_owned(),
            name: "PacketFamily".to_owned(),
        });
        code.add_import(Import::Generated {
            module_dir: action_type.source_path().to_owned(),
            name: "PacketAction".to_owned(),
        });

        code.begin_control_flow(&format!("impl Packet for {}", packet_type_name));
        code.begin_control_flow("fn family() -> PacketFamily");
        code.add_line(&format!("PacketFamily::{}", family_enum_value.name()));
        code.end_control_flow();
        code.add_break();
        code.begin_control_flow("fn action() -> PacketAction");
        code.add_line(&format!("PacketAction::{}", action_enum_value.name()));
        code.end_control_flow();
        code.end_control_flow();

        let module_path = Self::module_path(source_path, &packet_type_name);
        Ok((RustFile::new(&module_path, code), module_path))
    }

    fn packet_metadata_enum(&mut self, name: &str) -> Result<EnumType, GenError> {
        let resolved = self
            .type_factory
            .get_type(name)
            .map_err(|_| GenError::schema(format!("{} enum is missing.", name)))?;
        match &*resolved {
            EoType::Enum(enum_type) => Ok(enum_type.clone()),
            _ => Err(GenError::schema(format!("{} enum is missing.", name))),
        }
    }

    fn packet_suffix(source_path: &str) -> Result<&'static str, GenError> {
        match source_path {
            "net/client" => Ok("ClientPacket"),
            "net/server" => Ok("ServerPacket"),
            _ => Err(GenError::schema(format!(
                "Cannot create packet name suffix for path {}",
                source_path
            ))),
        }
    }

    fn module_path(source_path: &str, type_name: &str) -> String {
        let module_name = pascal_case_to_snake_case(type_name);
        if source_path.is_empty() {
            module_name
        } else {
            format!("{}/{}", source_path, module_name)
        }
    }

    fn packet_trait_code() -> CodeBlock {
        let mut code = CodeBlock::new();
        code.add_import(Import::External("eolib::data::EoWriter".to_owned()));
        code.add_import(Import::External(
            "eolib::protocol::{EoSerialize, SerializationError}".to_owned(),
        ));
        code.add_line("/// Object representation of a packet in the EO network protocol.");
        code.begin_control_flow("pub trait Packet: EoSerialize");
        code.add_line("/// Returns the packet family associated with this packet.");
        code.add_line("fn family() -> PacketFamily;");
        code.add_break();
        code.add_line("/// Returns the packet action associated with this packet.");
        code.add_line("fn action() -> PacketAction;");
        code.add_break();
        code.add_line("/// Serializes and writes this packet to the provided writer.");
        code.begin_control_flow(
            "fn write(&self, writer: &mut EoWriter) -> Result<(), SerializationError>",
        );
        code.add_line("self.serialize(writer)");
        code.end_control_flow();
        code.end_control_flow();
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_schema(root: &Path, relative_dir: &str, contents: &str) {
        let dir = root.join(relative_dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("protocol.xml"), contents).unwrap();
    }

    fn generate(schemas: &[(&str, &str)]) -> Result<tempfile::TempDir, GenError> {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        for (relative_dir, contents) in schemas {
            write_schema(input.path(), relative_dir, contents);
        }
        ProtocolCodeGenerator::new(input.path().to_owned())
            .generate(output.path())
            .map(|()| output)
    }

    const NET_SCHEMA: &str = r#"<protocol>
        <enum name="PacketFamily" type="char">
            <value name="Connection">1</value>
            <value name="Account">2</value>
        </enum>
        <enum name="PacketAction" type="char">
            <value name="Request">1</value>
            <value name="Accept">2</value>
        </enum>
        <struct name="BigCoords">
            <comment>Map coordinates with 2-byte values</comment>
            <field name="x" type="short"/>
            <field name="y" type="short"/>
        </struct>
    </protocol>"#;

    #[test]
    fn generates_enum_files() {
        let output = generate(&[("net", NET_SCHEMA)]).unwrap();

        let contents =
            fs::read_to_string(output.path().join("net/packet_family.rs")).unwrap();
        assert!(contents.contains("pub enum PacketFamily {"));
        assert!(contents.contains("Connection,"));
        assert!(contents.contains("Unrecognized(u32),"));
        assert!(contents.contains("impl From<u32> for PacketFamily {"));
        assert!(contents.contains("1 => PacketFamily::Connection,"));
        assert!(contents.contains("_ => PacketFamily::Unrecognized(value),"));
        assert!(contents.contains("impl From<PacketFamily> for u32 {"));
        assert!(contents.contains("impl Default for PacketFamily {"));
    }

    #[test]
    fn generates_struct_files() {
        let output = generate(&[("net", NET_SCHEMA)]).unwrap();

        let contents = fs::read_to_string(output.path().join("net/big_coords.rs")).unwrap();
        assert!(contents.contains("/// Map coordinates with 2-byte values"));
        assert!(contents.contains("pub struct BigCoords {"));
        assert!(contents.contains("byte_size: usize,"));
        assert!(contents.contains("x: u32,"));
        assert!(contents.contains("pub fn set_x(&mut self, x: u32)"));
        assert!(contents.contains("impl EoSerialize for BigCoords {"));
        assert!(contents.contains("writer.add_short(data.x)?;"));
        assert!(contents.contains("data.x = reader.get_short();"));
        assert!(contents.contains("data.byte_size = reader.position() - reader_start_position;"));
        assert!(contents.contains("impl fmt::Debug for BigCoords {"));
    }

    #[test]
    fn generates_packet_files_and_trait() {
        let schema = r#"<protocol>
            <packet family="Account" action="Request">
                <field name="username" type="string"/>
            </packet>
        </protocol>"#;
        let output = generate(&[("net", NET_SCHEMA), ("net/client", schema)]).unwrap();

        let contents = fs::read_to_string(
            output
                .path()
                .join("net/client/account_request_client_packet.rs"),
        )
        .unwrap();
        assert!(contents.contains("pub struct AccountRequestClientPacket {"));
        assert!(contents.contains("impl Packet for AccountRequestClientPacket {"));
        assert!(contents.contains("PacketFamily::Account"));
        assert!(contents.contains("PacketAction::Request"));
        assert!(contents.contains("use super::super::Packet;"));
        assert!(contents.contains("use super::super::PacketFamily;"));

        let net_mod = fs::read_to_string(output.path().join("net/mod.rs")).unwrap();
        assert!(net_mod.contains("pub mod client;"));
        assert!(net_mod.contains("pub use self::packet_family::*;"));
        assert!(net_mod.contains("pub trait Packet: EoSerialize {"));

        let root_mod = fs::read_to_string(output.path().join("mod.rs")).unwrap();
        assert!(root_mod.contains("pub mod net;"));
    }

    #[test]
    fn generates_cross_file_imports() {
        let map_schema = r#"<protocol>
            <struct name="MapItem">
                <field name="coords" type="BigCoords"/>
            </struct>
        </protocol>"#;
        let output = generate(&[("net", NET_SCHEMA), ("map", map_schema)]).unwrap();

        let contents = fs::read_to_string(output.path().join("map/map_item.rs")).unwrap();
        assert!(contents.contains("use super::super::net::BigCoords;"));
        assert!(contents.contains("coords: BigCoords,"));
        assert!(contents.contains("data.coords.serialize(writer)?;"));
        assert!(contents.contains("data.coords = BigCoords::deserialize(reader)?;"));
    }

    #[test]
    fn generates_chunked_structures() {
        let schema = r#"<protocol>
            <struct name="Chunky">
                <chunked>
                    <field name="name" type="string"/>
                    <break/>
                    <field name="level" type="char"/>
                </chunked>
            </struct>
        </protocol>"#;
        let output = generate(&[("pub", schema)]).unwrap();

        let contents = fs::read_to_string(output.path().join("pub/chunky.rs")).unwrap();
        assert!(contents.contains("writer.set_string_sanitization_mode(true);"));
        assert!(contents.contains("writer.add_byte(0xFF);"));
        assert!(contents.contains("reader.set_chunked_reading_mode(true);"));
        assert!(contents.contains("reader.next_chunk()?;"));
        assert!(contents.contains("reader.set_chunked_reading_mode(false);"));
    }

    #[test]
    fn generates_switch_structures() {
        let schema = r#"<protocol>
            <enum name="ReplyCode" type="char">
                <value name="Ok">1</value>
                <value name="Busy">2</value>
            </enum>
            <struct name="Reply">
                <field name="reply_code" type="ReplyCode"/>
                <switch field="reply_code">
                    <case value="Ok">
                        <field name="session" type="short"/>
                    </case>
                    <case default="true"/>
                </switch>
            </struct>
        </protocol>"#;
        let output = generate(&[("net", schema)]).unwrap();

        let contents = fs::read_to_string(output.path().join("net/reply.rs")).unwrap();
        assert!(contents.contains("pub enum ReplyReplyCodeData {"));
        assert!(contents.contains("Ok(ReplyReplyCodeDataOk),"));
        assert!(contents.contains("reply_code_data: Option<ReplyReplyCodeData>,"));
        assert!(contents.contains("if data.reply_code == ReplyCode::Ok {"));
        assert!(contents.contains("} else {"));
        assert!(contents.contains("pub struct ReplyReplyCodeDataOk {"));
        assert!(contents
            .contains("data.reply_code_data = Some(ReplyReplyCodeData::Ok(ReplyReplyCodeDataOk::deserialize(reader)?));"));
        assert!(contents.contains("data.reply_code_data = None;"));
    }

    #[test]
    fn rejects_duplicate_type_across_files() {
        let schema_a = r#"<protocol>
            <struct name="Coords"><field name="x" type="char"/></struct>
        </protocol>"#;
        let schema_b = r#"<protocol>
            <struct name="Coords"><field name="y" type="char"/></struct>
        </protocol>"#;
        let result = generate(&[("a", schema_a), ("b", schema_b)]);
        assert!(matches!(result, Err(GenError::Schema(_))));
    }

    #[test]
    fn rejects_duplicate_packet_in_same_file() {
        let schema = r#"<protocol>
            <packet family="Account" action="Request"/>
            <packet family="Account" action="Request"/>
        </protocol>"#;
        let result = generate(&[("net", NET_SCHEMA), ("net/client", schema)]);
        assert!(matches!(result, Err(GenError::Schema(_))));
    }

    #[test]
    fn rejects_unknown_packet_family() {
        let schema = r#"<protocol>
            <packet family="Bogus" action="Request"/>
        </protocol>"#;
        let result = generate(&[("net", NET_SCHEMA), ("net/client", schema)]);
        assert!(matches!(result, Err(GenError::Schema(_))));
    }

    #[test]
    fn rejects_packets_outside_net_directories() {
        let schema = r#"<protocol>
            <packet family="Account" action="Request"/>
        </protocol>"#;
        let result = generate(&[("net", NET_SCHEMA), ("elsewhere", schema)]);
        assert!(matches!(result, Err(GenError::Schema(_))));
    }

    #[test]
    fn rejects_non_protocol_root() {
        let result = generate(&[("net", "<protocols></protocols>")]);
        assert!(matches!(result, Err(GenError::Schema(_))));
    }

    #[test]
    fn rejects_dummy_followed_by_field() {
        let schema = r#"<protocol>
            <struct name="Bad">
                <dummy type="char">0</dummy>
                <field name="x" type="char"/>
            </struct>
        </protocol>"#;
        let result = generate(&[("net", schema)]);
        assert!(matches!(result, Err(GenError::Schema(_))));
    }

    #[test]
    fn rejects_optional_followed_by_required() {
        let schema = r#"<protocol>
            <struct name="Bad">
                <field name="x" type="char" optional="true"/>
                <field name="y" type="char"/>
            </struct>
        </protocol>"#;
        let result = generate(&[("net", schema)]);
        assert!(matches!(result, Err(GenError::Schema(_))));
    }

    #[test]
    fn rejects_delimited_array_outside_chunked() {
        let schema = r#"<protocol>
            <struct name="Bad">
                <array name="items" type="char" delimited="true"/>
            </struct>
        </protocol>"#;
        let result = generate(&[("net", schema)]);
        assert!(matches!(result, Err(GenError::Schema(_))));
    }

    #[test]
    fn rejects_break_outside_chunked() {
        let schema = r#"<protocol>
            <struct name="Bad">
                <field name="x" type="char"/>
                <break/>
            </struct>
        </protocol>"#;
        let result = generate(&[("net", schema)]);
        assert!(matches!(result, Err(GenError::Schema(_))));
    }

    #[test]
    fn rejects_dangling_length_reference() {
        let schema = r#"<protocol>
            <struct name="Bad">
                <field name="name" type="string" length="name_length"/>
            </struct>
        </protocol>"#;
        let result = generate(&[("net", schema)]);
        assert!(matches!(result, Err(GenError::Schema(_))));
    }

    #[test]
    fn rejects_doubly_referenced_length_field() {
        let schema = r#"<protocol>
            <struct name="Bad">
                <length name="size" type="char"/>
                <array name="a" type="char" length="size"/>
                <array name="b" type="char" length="size"/>
            </struct>
        </protocol>"#;
        let result = generate(&[("net", schema)]);
        assert!(matches!(result, Err(GenError::Schema(_))));
    }

    #[test]
    fn rejects_switch_over_array_field() {
        let schema = r#"<protocol>
            <struct name="Bad">
                <array name="codes" type="char" length="2"/>
                <switch field="codes">
                    <case value="1"/>
                </switch>
            </struct>
        </protocol>"#;
        let result = generate(&[("net", schema)]);
        assert!(matches!(result, Err(GenError::Schema(_))));
    }

    #[test]
    fn rejects_standalone_default_case() {
        let schema = r#"<protocol>
            <struct name="Bad">
                <field name="code" type="char"/>
                <switch field="code">
                    <case default="true"/>
                </switch>
            </struct>
        </protocol>"#;
        let result = generate(&[("net", schema)]);
        assert!(matches!(result, Err(GenError::Schema(_))));
    }

    #[test]
    fn rejects_enum_case_by_ordinal() {
        let schema = r#"<protocol>
            <enum name="Code" type="char">
                <value name="Ok">1</value>
            </enum>
            <struct name="Bad">
                <field name="code" type="Code"/>
                <switch field="code">
                    <case value="1"/>
                </switch>
            </struct>
        </protocol>"#;
        let result = generate(&[("net", schema)]);
        assert!(matches!(result, Err(GenError::Schema(_))));
    }

    #[test]
    fn length_field_and_referencing_array() {
        let schema = r#"<protocol>
            <struct name="Bag">
                <length name="items_count" type="char" offset="1"/>
                <array name="items" type="char" length="items_count"/>
            </struct>
        </protocol>"#;
        let output = generate(&[("net", schema)]).unwrap();

        let contents = fs::read_to_string(output.path().join("net/bag.rs")).unwrap();
        assert!(contents.contains("writer.add_char(data.items_count - 1)?;"));
        assert!(contents.contains("data.items_count = reader.get_char() + 1;"));
        assert!(contents.contains("for i in 0..data.items_count as usize {"));
        assert!(contents.contains("self.items_count = self.items.len() as u32;"));
        assert!(!contents.contains("pub fn set_items_count"));
    }

    #[test]
    fn string_length_checks_count_characters() {
        // String::len would count UTF-8 bytes; the wire length of a
        // windows-1252 string is its character count.
        let schema = r#"<protocol>
            <struct name="Tag">
                <length name="name_length" type="char"/>
                <field name="name" type="string" length="name_length"/>
                <field name="motto" type="string" length="4"/>
            </struct>
        </protocol>"#;
        let output = generate(&[("net", schema)]).unwrap();

        let contents = fs::read_to_string(output.path().join("net/tag.rs")).unwrap();
        assert!(contents.contains("self.name_length = self.name.chars().count() as u32;"));
        assert!(contents.contains("if data.name.chars().count() > 252 {"));
        assert!(contents.contains("if data.motto.chars().count() != 4 {"));
        assert!(!contents.contains("data.name.len()"));
    }

    #[test]
    fn hardcoded_string_field_length_is_validated() {
        let schema = r#"<protocol>
            <struct name="Bad">
                <field type="string" length="3">toolong</field>
            </struct>
        </protocol>"#;
        let result = generate(&[("net", schema)]);
        assert!(matches!(result, Err(GenError::Schema(_))));
    }

    #[test]
    fn generation_is_deterministic() {
        let output_a = generate(&[("net", NET_SCHEMA)]).unwrap();
        let output_b = generate(&[("net", NET_SCHEMA)]).unwrap();

        for file in ["mod.rs", "net/mod.rs", "net/big_coords.rs", "net/packet_family.rs"] {
            let a = fs::read_to_string(output_a.path().join(file)).unwrap();
            let b = fs::read_to_string(output_b.path().join(file)).unwrap();
            assert_eq!(a, b, "{} should be identical across runs", file);
        }
    }
}
