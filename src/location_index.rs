//! Source location index built from a breakdown.
//!
//! Maps each source file to the lines that operations in the breakdown were
//! attributed to, with a short annotation per operation. Files and lines
//! keep the order in which the operation tree lists them.

use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::protocol::messages::{BreakdownResponse, OperationData};

/// One annotated line in a source file.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct LineAnnotation {
    /// 1-based line number as reported by the backend.
    pub line: u32,
    /// Markdown text describing the operation.
    pub text: String,
}

/// Annotations for a single file, in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct FileAnnotations {
    pub path: String,
    pub lines: Vec<LineAnnotation>,
}

/// Mapping from normalized file path to annotated lines.
///
/// Serializes as a JSON object whose keys keep insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationIndex {
    files: Vec<FileAnnotations>,
    positions: HashMap<String, usize>,
}

impl LocationIndex {
    /// Build the index from a breakdown.
    ///
    /// Every (operation node, source context) pair contributes one entry.
    /// Contexts without a path and nodes without operation data are skipped.
    pub fn build(breakdown: &BreakdownResponse) -> Self {
        let mut index = Self::default();

        for node in &breakdown.operation_tree {
            let Some(operation) = node.operation() else {
                continue;
            };

            for context in &node.contexts {
                let path = match &context.file_path {
                    Some(path) if !path.components.is_empty() => path.joined(),
                    _ => continue,
                };

                index.push(
                    path,
                    LineAnnotation {
                        line: context.line_number,
                        text: annotation_text(operation),
                    },
                );
            }
        }

        index
    }

    fn push(&mut self, path: String, annotation: LineAnnotation) {
        let position = match self.positions.get(&path) {
            Some(&position) => position,
            None => {
                self.files.push(FileAnnotations {
                    path: path.clone(),
                    lines: Vec::new(),
                });
                self.positions.insert(path, self.files.len() - 1);
                self.files.len() - 1
            }
        };
        self.files[position].lines.push(annotation);
    }

    /// Annotated lines for a file, if any.
    pub fn get(&self, path: &str) -> Option<&[LineAnnotation]> {
        self.positions
            .get(path)
            .map(|&position| self.files[position].lines.as_slice())
    }

    /// Iterate over files in insertion order.
    pub fn files(&self) -> impl Iterator<Item = &FileAnnotations> {
        self.files.iter()
    }

    /// Number of distinct files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Serialize for LocationIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.files.len()))?;
        for file in &self.files {
            map.serialize_entry(&file.path, &file.lines)?;
        }
        map.end()
    }
}

/// Hover text for one operation.
fn annotation_text(operation: &OperationData) -> String {
    format!(
        "**Forward**: {:.3} ms\n\n**Backward**: {:.3} ms\n\n**Size**: {} bytes\n\n",
        operation.forward_ms, operation.backward_ms, operation.size_bytes
    )
}
