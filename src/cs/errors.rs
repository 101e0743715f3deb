use std::path::PathBuf;
use thiserror::Error;

/// Failures while parsing, querying or validating C# source.
#[derive(Error, Debug)]
pub enum TreeSitterError {
    #[error("failed to load the C# grammar into the parser")]
    LanguageSet,

    #[error("tree-sitter returned no tree for the C# source")]
    ParseFailed,

    #[error("invalid C# tree-sitter query: {message}")]
    InvalidQuery { message: String },

    #[error("C# syntax error at byte {byte_start}..{byte_end}")]
    SyntaxError { byte_start: usize, byte_end: usize },

    #[error("{count} C# syntax errors (ERROR or MISSING nodes)")]
    MultipleSyntaxErrors { count: usize },

    #[error("failed to read C# source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
