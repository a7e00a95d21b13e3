//! Writing generated source files and their module tree.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::code_block::CodeBlock;
use super::{rust_ident, GenError};

const GENERATED_HEADER: &str = "\
// Generated from the eo-protocol XML specification.
//
// This file should not be modified.
// Changes will be lost when code is regenerated.
";

/// A single generated source file, addressed relative to the output root.
pub struct RustFile {
    relative_path: PathBuf,
    code: CodeBlock,
}

impl RustFile {
    /// Creates a generated file at `relative_path` (forward-slash separated,
    /// without the `.rs` suffix) holding the given code.
    pub fn new(relative_path: &str, code: CodeBlock) -> Self {
        RustFile {
            relative_path: PathBuf::from(format!("{}.rs", relative_path)),
            code,
        }
    }

    /// Returns the directory part of the file's relative path, which is also
    /// its module directory for import relativization.
    pub fn module_dir(&self) -> String {
        self.relative_path
            .parent()
            .map(|parent| parent.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default()
    }

    /// Writes the file under `output_root`, creating directories as needed.
    pub fn write(&self, output_root: &Path) -> Result<(), GenError> {
        let output_path = output_root.join(&self.relative_path);
        let contents = format!(
            "{}\n{}",
            GENERATED_HEADER,
            self.code.to_string(&self.module_dir())
        );
        write_source_file(&output_path, &contents)
    }
}

/// Collects the generated module paths and writes the `mod.rs` files that
/// stitch them into a navigable tree.
#[derive(Default)]
pub struct ModuleTree {
    // dir -> (sub-directories, file modules)
    directories: BTreeMap<String, (Vec<String>, Vec<String>)>,
}

impl ModuleTree {
    pub fn new() -> Self {
        ModuleTree::default()
    }

    /// Records a generated file module, e.g. `net/client/login_request_client_packet`.
    pub fn add_module(&mut self, relative_module_path: &str) {
        let (dir, module) = match relative_module_path.rfind('/') {
            Some(index) => (
                &relative_module_path[..index],
                &relative_module_path[index + 1..],
            ),
            None => ("", relative_module_path),
        };

        let entry = self.directories.entry(dir.to_owned()).or_default();
        if !entry.1.contains(&module.to_owned()) {
            entry.1.push(module.to_owned());
        }

        // Register each ancestor directory with its parent
        let mut child = dir.to_owned();
        while !child.is_empty() {
            let (parent, name) = match child.rfind('/') {
                Some(index) => (child[..index].to_owned(), child[index + 1..].to_owned()),
                None => (String::new(), child.clone()),
            };
            let entry = self.directories.entry(parent.clone()).or_default();
            if !entry.0.contains(&name) {
                entry.0.push(name);
            }
            child = parent;
        }
    }

    /// Writes one `mod.rs` per directory, declaring child directories and
    /// file modules and re-exporting the latter. `extra` supplies additional
    /// code appended to specific directories' `mod.rs` files.
    pub fn write(
        &self,
        output_root: &Path,
        extra: &BTreeMap<String, CodeBlock>,
    ) -> Result<(), GenError> {
        for (dir, (subdirectories, modules)) in &self.directories {
            let mut code = CodeBlock::new();

            let mut subdirectories = subdirectories.clone();
            subdirectories.sort();
            for subdirectory in &subdirectories {
                code.add_line(&format!("pub mod {};", rust_ident(subdirectory)));
            }

            let mut modules = modules.clone();
            modules.sort();
            for module in &modules {
                code.add_line(&format!("mod {};", rust_ident(module)));
            }
            for module in &modules {
                code.add_line(&format!("pub use self::{}::*;", rust_ident(module)));
            }

            if let Some(extra_code) = extra.get(dir) {
                code.add_break();
                code.add_code_block(extra_code);
            }

            let relative_path = if dir.is_empty() {
                PathBuf::from("mod.rs")
            } else {
                PathBuf::from(dir).join("mod.rs")
            };
            let contents = format!("{}\n{}", GENERATED_HEADER, code.to_string(dir));
            write_source_file(&output_root.join(relative_path), &contents)?;
        }

        Ok(())
    }
}

fn write_source_file(path: &Path, contents: &str) -> Result<(), GenError> {
    let io_error = |source| GenError::Io {
        path: path.to_owned(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    let mut file = fs::File::create(path).map_err(io_error)?;
    file.write_all(contents.as_bytes()).map_err(io_error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_file_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let mut code = CodeBlock::new();
        code.add_line("pub struct Coords;");

        RustFile::new("net/coords", code).write(dir.path()).unwrap();

        let contents = fs::read_to_string(dir.path().join("net/coords.rs")).unwrap();
        assert!(contents.starts_with("// Generated from the eo-protocol XML specification."));
        assert!(contents.ends_with("pub struct Coords;\n"));
    }

    #[test]
    fn module_tree_covers_ancestors() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = ModuleTree::new();
        tree.add_module("net/client/coords");
        tree.add_module("net/packet_family");
        tree.add_module("admin_level");

        tree.write(dir.path(), &BTreeMap::new()).unwrap();

        let root = fs::read_to_string(dir.path().join("mod.rs")).unwrap();
        assert!(root.contains("pub mod net;"));
        assert!(root.contains("mod admin_level;"));
        assert!(root.contains("pub use self::admin_level::*;"));

        let net = fs::read_to_string(dir.path().join("net/mod.rs")).unwrap();
        assert!(net.contains("pub mod client;"));
        assert!(net.contains("mod packet_family;"));

        let client = fs::read_to_string(dir.path().join("net/client/mod.rs")).unwrap();
        assert!(client.contains("mod coords;"));
        assert!(client.contains("pub use self::coords::*;"));
    }
}
