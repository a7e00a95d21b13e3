//! An indent-aware line buffer for emitting generated source code.

use std::collections::BTreeSet;

use super::rust_ident;

const INDENT: &str = "    ";

/// A single `use` declaration needed by a block of generated code.
///
/// External imports name items outside the generated tree and are emitted
/// verbatim. Generated imports name items in other generated modules and are
/// relativized with `super::` chains against the importing file's module
/// directory.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Import {
    /// A full path outside the generated tree, e.g. `eolib::data::EoWriter`
    External(String),
    /// An item re-exported from another generated module directory
    Generated {
        /// The schema source path of the module, e.g. `net/client`
        module_dir: String,
        /// The item name
        name: String,
    },
}

impl Import {
    fn relativize(&self, current_dir: &str) -> String {
        match self {
            Import::External(path) => format!("use {};", path),
            Import::Generated { module_dir, name } => {
                let mut current: Vec<&str> =
                    current_dir.split('/').filter(|part| !part.is_empty()).collect();
                let mut target: Vec<&str> =
                    module_dir.split('/').filter(|part| !part.is_empty()).collect();

                while !current.is_empty() && !target.is_empty() && current[0] == target[0] {
                    current.remove(0);
                    target.remove(0);
                }

                // One extra super to step out of the importing file's own
                // module
                let mut path = "super::".repeat(current.len() + 1);
                for part in target {
                    path.push_str(&rust_ident(part));
                    path.push_str("::");
                }
                path.push_str(name);

                format!("use {};", path)
            }
        }
    }
}

/// A growing block of generated code.
///
/// Lines are indented as they are added, control-flow helpers manage braces,
/// and the set of imports travels with the block so that nested fragments
/// can declare what they need and have it surface in the final file.
#[derive(Clone, Debug)]
pub struct CodeBlock {
    imports: BTreeSet<Import>,
    lines: Vec<String>,
    indentation: usize,
}

impl Default for CodeBlock {
    fn default() -> Self {
        CodeBlock {
            imports: BTreeSet::new(),
            lines: vec![String::new()],
            indentation: 0,
        }
    }
}

impl CodeBlock {
    pub fn new() -> Self {
        CodeBlock::default()
    }

    /// Appends code to the block. Newlines within the code start new lines;
    /// code without a trailing newline leaves the final line open.
    pub fn add(&mut self, code: &str) -> &mut Self {
        let parts: Vec<&str> = code.split('\n').collect();
        for (i, part) in parts.iter().enumerate() {
            if !part.is_empty() {
                let line = self.lines.last_mut().expect("line buffer is never empty");
                if line.is_empty() {
                    line.push_str(&INDENT.repeat(self.indentation));
                }
                line.push_str(part);
            }
            if i != parts.len() - 1 {
                self.lines.push(String::new());
            }
        }
        self
    }

    /// Appends a full line of code.
    pub fn add_line(&mut self, line: &str) -> &mut Self {
        self.add(line);
        self.add("\n");
        self
    }

    /// Appends an empty line.
    pub fn add_break(&mut self) -> &mut Self {
        self.add("\n")
    }

    /// Appends another block, merging its imports.
    pub fn add_code_block(&mut self, block: &CodeBlock) -> &mut Self {
        for import in &block.imports {
            self.imports.insert(import.clone());
        }

        for (i, line) in block.lines.iter().enumerate() {
            if i == block.lines.len() - 1 {
                self.add(line);
            } else {
                self.add_line(line);
            }
        }

        self
    }

    /// Records an import required by this block.
    pub fn add_import(&mut self, import: Import) -> &mut Self {
        self.imports.insert(import);
        self
    }

    /// Opens a control-flow block: the line followed by `{`.
    pub fn begin_control_flow(&mut self, control_flow: &str) -> &mut Self {
        self.add_line(&format!("{} {{", control_flow));
        self.indent();
        self
    }

    /// Closes the current control-flow block and opens a chained one, e.g.
    /// `} else {`.
    pub fn next_control_flow(&mut self, control_flow: &str) -> &mut Self {
        self.unindent();
        self.add_line(&format!("}} {} {{", control_flow));
        self.indent();
        self
    }

    /// Closes the current control-flow block.
    pub fn end_control_flow(&mut self) -> &mut Self {
        self.unindent();
        self.add_line("}");
        self
    }

    pub fn indent(&mut self) -> &mut Self {
        self.indentation += 1;
        self
    }

    pub fn unindent(&mut self) -> &mut Self {
        self.indentation = self.indentation.saturating_sub(1);
        self
    }

    /// Returns true if no code has been added.
    pub fn is_empty(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].is_empty()
    }

    /// Returns true if any line of the block contains the needle.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }

    /// Renders the block, with imports relativized against the given module
    /// directory and emitted first.
    pub fn to_string(&self, module_dir: &str) -> String {
        let mut result = String::new();

        let import_lines: BTreeSet<String> = self
            .imports
            .iter()
            .map(|import| import.relativize(module_dir))
            .collect();

        for import in &import_lines {
            result.push_str(import);
            result.push('\n');
        }

        if !self.is_empty() {
            if !result.is_empty() {
                result.push('\n');
            }
            result.push_str(&self.lines.join("\n"));
        }

        result
    }
}
