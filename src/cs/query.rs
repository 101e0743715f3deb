use crate::cs::errors::TreeSitterError;
use crate::cs::parser::csharp_language;
use crate::cs::tree::SourceTree;
use std::collections::HashMap;
use tree_sitter::{Query, QueryCursor, StreamingIterator};

/// A match from a tree-sitter query with captured nodes.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    /// The full match byte range
    pub byte_start: usize,
    pub byte_end: usize,
    /// Named captures: capture_name -> (byte_start, byte_end, text)
    pub captures: HashMap<String, CapturedNode>,
}

#[derive(Debug, Clone)]
pub struct CapturedNode {
    pub byte_start: usize,
    pub byte_end: usize,
    pub text: String,
    pub kind: String,
}

/// Engine for executing tree-sitter queries against parsed C# source.
pub struct QueryEngine {
    query: Query,
    capture_names: Vec<String>,
}

impl QueryEngine {
    /// Create a new query engine from a tree-sitter query string.
    ///
    /// ```text
    /// (class_declaration
    ///   name: (identifier) @name) @class
    /// ```
    pub fn new(query_str: &str) -> Result<Self, TreeSitterError> {
        let language = csharp_language();
        let query = Query::new(&language, query_str).map_err(|e| TreeSitterError::InvalidQuery {
            message: e.to_string(),
        })?;

        let capture_names = query.capture_names().iter().map(|s| s.to_string()).collect();

        Ok(Self {
            query,
            capture_names,
        })
    }

    /// Execute the query against a tree and return all matches.
    pub fn find_all(&self, source: &SourceTree) -> Vec<QueryMatch> {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.query, source.root_node(), source.text().as_bytes());

        let mut results = Vec::new();

        while let Some(m) = matches.next() {
            let mut captures = HashMap::new();
            let mut overall_start = usize::MAX;
            let mut overall_end = 0usize;

            for capture in m.captures {
                let node = capture.node;
                let name = &self.capture_names[capture.index as usize];

                overall_start = overall_start.min(node.start_byte());
                overall_end = overall_end.max(node.end_byte());

                captures.insert(
                    name.clone(),
                    CapturedNode {
                        byte_start: node.start_byte(),
                        byte_end: node.end_byte(),
                        text: source.node_text(node).to_string(),
                        kind: node.kind().to_string(),
                    },
                );
            }

            if overall_start != usize::MAX {
                results.push(QueryMatch {
                    byte_start: overall_start,
                    byte_end: overall_end,
                    captures,
                });
            }
        }

        results
    }
}

/// Common tree-sitter queries for C# constructs.
pub mod queries {
    /// `using` directives at file scope, in source order.
    pub const TOP_LEVEL_USINGS: &str = r#"(compilation_unit
        (using_directive) @using)"#;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_usings_in_order() {
        let source = SourceTree::parse(
            "using System;\nusing System.Linq;\n\nnamespace Demo { class A { } }\n",
        )
        .unwrap();
        let engine = QueryEngine::new(queries::TOP_LEVEL_USINGS).unwrap();

        let usings: Vec<_> = engine
            .find_all(&source)
            .into_iter()
            .map(|m| m.captures["using"].text.clone())
            .collect();
        assert_eq!(usings, vec!["using System;", "using System.Linq;"]);
    }

    #[test]
    fn nested_usings_are_not_top_level() {
        let source = SourceTree::parse(
            "using System;\n\nnamespace Demo\n{\n    using System.Linq;\n    class A { }\n}\n",
        )
        .unwrap();
        let engine = QueryEngine::new(queries::TOP_LEVEL_USINGS).unwrap();

        let matches = engine.find_all(&source);
        assert_eq!(matches.len(), 1);
        let using = &matches[0].captures["using"];
        assert_eq!(using.kind, "using_directive");
        assert_eq!((using.byte_start, using.byte_end), (0, 13));
    }

    #[test]
    fn invalid_query_is_reported() {
        assert!(matches!(
            QueryEngine::new("(class_declaration"),
            Err(TreeSitterError::InvalidQuery { .. })
        ));
    }
}
