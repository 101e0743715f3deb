use crate::cs::errors::TreeSitterError;
use crate::cs::parser::{collect_error_nodes, has_error_nodes, ErrorNode};
use crate::edit::{EditError, TextEdit};
use crate::pool::with_parser;
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tree_sitter::{Node, Tree};

/// An immutable parsed C# file.
///
/// Cloning is cheap: the text is shared and tree-sitter trees are
/// reference counted. Edits never touch `self`; they splice a copy of the
/// text and reparse it into a new `SourceTree`.
#[derive(Clone)]
pub struct SourceTree {
    path: Option<PathBuf>,
    text: Arc<str>,
    tree: Tree,
}

impl SourceTree {
    /// Parse source text with the thread-local C# parser.
    pub fn parse(text: impl Into<String>) -> Result<Self, TreeSitterError> {
        let text: Arc<str> = Arc::from(text.into());
        let tree = with_parser(|parser| parser.parse(&text))??;
        Ok(Self {
            path: None,
            text,
            tree,
        })
    }

    /// Read and parse a file, remembering its path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TreeSitterError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TreeSitterError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(text)?.with_path(path))
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root_node(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Extract text for a node's byte range.
    pub fn node_text(&self, node: Node<'_>) -> &str {
        &self.text[node.byte_range()]
    }

    pub fn span_text(&self, span: Range<usize>) -> &str {
        &self.text[span]
    }

    /// Check if the tree contains any ERROR or MISSING nodes.
    pub fn has_errors(&self) -> bool {
        has_error_nodes(self.tree.root_node())
    }

    pub fn error_nodes(&self) -> Vec<ErrorNode> {
        let mut errors = Vec::new();
        collect_error_nodes(self.tree.root_node(), &mut errors);
        errors
    }

    /// Apply a byte-span edit and reparse, producing a new tree.
    pub fn apply(&self, edit: &TextEdit) -> Result<SourceTree, EditError> {
        let text = edit.apply_to(&self.text)?;
        let tree = with_parser(|parser| parser.parse(&text))??;
        Ok(SourceTree {
            path: self.path.clone(),
            text: Arc::from(text),
            tree,
        })
    }

    /// Insert `text` at byte offset `at`.
    pub fn insert(&self, at: usize, text: impl Into<String>) -> Result<SourceTree, EditError> {
        self.apply(&TextEdit::insert(at, text))
    }
}

impl PartialEq for SourceTree {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.text == other.text
    }
}

impl Eq for SourceTree {}

impl fmt::Debug for SourceTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceTree")
            .field("path", &self.path)
            .field("len", &self.text.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_returns_new_tree_and_keeps_original() {
        let original = SourceTree::parse("class A\n{\n}\n").unwrap();
        let edited = original.insert(10, "    int x;\n").unwrap();

        assert_eq!(original.text(), "class A\n{\n}\n");
        assert_eq!(edited.text(), "class A\n{\n    int x;\n}\n");
        assert!(!edited.has_errors());
    }

    #[test]
    fn path_survives_edits() {
        let tree = SourceTree::parse("class A {}").unwrap().with_path("A.cs");
        let edited = tree.insert(0, "using System;\n").unwrap();
        assert_eq!(edited.path(), Some(Path::new("A.cs")));
    }

    #[test]
    fn equality_is_textual() {
        let a = SourceTree::parse("class A {}").unwrap();
        let b = SourceTree::parse("class A {}").unwrap();
        let c = SourceTree::parse("class B {}").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
