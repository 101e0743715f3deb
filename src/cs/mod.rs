//! Tree-sitter integration for structural C# code queries.
//!
//! This module provides CST-based span location using tree-sitter, so edits
//! can be planned as byte-span insertions without losing comments or
//! formatting.

pub mod errors;
pub mod nodes;
pub mod parser;
pub mod query;
pub mod tree;
pub mod validator;

pub use errors::TreeSitterError;
pub use parser::{csharp_language, CSharpParser, ErrorNode};
pub use query::{queries, QueryEngine, QueryMatch};
pub use tree::SourceTree;
pub use validator::{validate_edit, validate_snippet, validate_syntax, SnippetCategory};
