use crate::cs::{SourceTree, TreeSitterError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The fundamental edit primitive: byte-span replacement with verification.
///
/// Every structural operation compiles down to one or more of these, applied
/// to a copy of a tree's text. Intelligence lives in span acquisition, not
/// application.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "TextEdit does nothing until applied"]
pub struct TextEdit {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// New text to put at [byte_start, byte_end)
    pub new_text: String,
    /// Verification of what we expect to find before applying
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large spans)
    Hash(u64),
}

impl EditVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("before-text verification failed at byte {byte_start}")]
    BeforeTextMismatch {
        byte_start: usize,
        byte_end: usize,
        expected: String,
        found: String,
    },

    #[error("invalid byte range: [{byte_start}, {byte_end}) in text of length {len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        len: usize,
    },

    #[error("edit boundary at byte {0} splits a UTF-8 character")]
    NotCharBoundary(usize),

    #[error("failed to reparse edited text: {0}")]
    Reparse(#[from] TreeSitterError),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot write a tree that has no path")]
    MissingPath,

    #[error("{0} changed on disk after it was loaded")]
    StaleFile(PathBuf),
}

impl TextEdit {
    /// Create a new edit with automatic verification generation.
    pub fn new(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: impl Into<String>,
    ) -> Self {
        let expected = expected_before.into();
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(&expected),
        }
    }

    /// Zero-width insertion at `at`.
    pub fn insert(at: usize, new_text: impl Into<String>) -> Self {
        Self::new(at, at, new_text, "")
    }

    /// Validate the edit against the current text.
    fn validate(&self, content: &str) -> Result<(), EditError> {
        if self.byte_start > self.byte_end || self.byte_end > content.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                len: content.len(),
            });
        }

        for boundary in [self.byte_start, self.byte_end] {
            if !content.is_char_boundary(boundary) {
                return Err(EditError::NotCharBoundary(boundary));
            }
        }

        let current_text = &content[self.byte_start..self.byte_end];
        if !self.expected_before.matches(current_text) {
            return Err(EditError::BeforeTextMismatch {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                expected: format!("{:?}", self.expected_before),
                found: current_text.to_string(),
            });
        }

        Ok(())
    }

    /// Produce the edited text. `content` itself is left untouched.
    pub fn apply_to(&self, content: &str) -> Result<String, EditError> {
        self.validate(content)?;

        let mut new_content = String::with_capacity(
            content.len() + self.new_text.len() - (self.byte_end - self.byte_start),
        );
        new_content.push_str(&content[..self.byte_start]);
        new_content.push_str(&self.new_text);
        new_content.push_str(&content[self.byte_end..]);
        Ok(new_content)
    }
}

/// Outcome of a structural edit.
///
/// `edited == false` is the no-op outcome: nothing to anchor on, or the
/// target already has what was asked for. Both trees are `None` then.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditResult carries the new tree; the caller must persist it"]
pub struct EditResult {
    pub edited: bool,
    pub old_tree: Option<SourceTree>,
    pub new_tree: Option<SourceTree>,
}

impl EditResult {
    pub fn unchanged() -> Self {
        Self {
            edited: false,
            old_tree: None,
            new_tree: None,
        }
    }

    pub fn changed(old_tree: SourceTree, new_tree: SourceTree) -> Self {
        Self {
            edited: true,
            old_tree: Some(old_tree),
            new_tree: Some(new_tree),
        }
    }
}

/// Write `new_tree` over its file, provided the file still holds the text
/// of `old_tree`. Large files are compared by xxh3 hash.
pub fn write_edit(old_tree: &SourceTree, new_tree: &SourceTree) -> Result<PathBuf, EditError> {
    let path = new_tree.path().ok_or(EditError::MissingPath)?;
    let current = fs::read_to_string(path)?;
    if !EditVerification::from_text(old_tree.text()).matches(&current) {
        return Err(EditError::StaleFile(path.to_path_buf()));
    }
    write_atomic(path, new_tree.text().as_bytes())?;
    Ok(path.to_path_buf())
}

/// Atomic file write: tempfile + fsync + rename, then bump the mtime so
/// incremental builds notice the change.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    let now = filetime::FileTime::now();
    filetime::set_file_mtime(path, now)?;

    Ok(())
}

/// Read a file if it exists; `None` when it does not.
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>, std::io::Error> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_verification_exact_match() {
        let verify = EditVerification::ExactMatch("hello world".to_string());
        assert!(verify.matches("hello world"));
        assert!(!verify.matches("hello"));
    }

    #[test]
    fn test_edit_verification_hash() {
        let text = "hello world";
        let verify = EditVerification::Hash(xxh3_64(text.as_bytes()));
        assert!(verify.matches(text));
        assert!(!verify.matches("goodbye world"));
    }

    #[test]
    fn test_edit_verification_from_text_large() {
        let text = "x".repeat(2000);
        assert!(matches!(
            EditVerification::from_text(&text),
            EditVerification::Hash(_)
        ));
        assert!(matches!(
            EditVerification::from_text("small"),
            EditVerification::ExactMatch(_)
        ));
    }

    #[test]
    fn test_apply_replaces_span() {
        let edit = TextEdit::new(0, 5, "HELLO", "hello");
        assert_eq!(edit.apply_to("hello world").unwrap(), "HELLO world");
    }

    #[test]
    fn test_insert_is_zero_width() {
        let edit = TextEdit::insert(5, ",");
        assert_eq!(edit.apply_to("hello world").unwrap(), "hello, world");
    }

    #[test]
    fn test_invalid_range() {
        let edit = TextEdit::new(5, 20, "replacement", "");
        assert!(matches!(
            edit.apply_to("hello world"),
            Err(EditError::InvalidByteRange { .. })
        ));

        let inverted = TextEdit::new(10, 5, "replacement", "");
        assert!(matches!(
            inverted.apply_to("hello world"),
            Err(EditError::InvalidByteRange { .. })
        ));
    }

    #[test]
    fn test_before_text_mismatch() {
        let edit = TextEdit::new(0, 5, "HELLO", "howdy");
        assert!(matches!(
            edit.apply_to("hello world"),
            Err(EditError::BeforeTextMismatch { .. })
        ));
    }

    #[test]
    fn test_char_boundary_rejected() {
        let edit = TextEdit::insert(1, "x");
        assert!(matches!(
            edit.apply_to("é"),
            Err(EditError::NotCharBoundary(1))
        ));
    }

    #[test]
    fn test_atomic_write_integration() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("Blog.cs");
        fs::write(&file_path, b"class Blog {}").unwrap();

        let tree = SourceTree::from_file(&file_path).unwrap();
        let edited = tree.insert(0, "using System;\n").unwrap();
        let written = write_edit(&tree, &edited).unwrap();

        assert_eq!(written, file_path);
        assert_eq!(
            fs::read_to_string(&file_path).unwrap(),
            "using System;\nclass Blog {}"
        );
    }

    #[test]
    fn test_write_edit_without_path() {
        let tree = SourceTree::parse("class Blog {}").unwrap();
        assert!(matches!(write_edit(&tree, &tree), Err(EditError::MissingPath)));
    }

    #[test]
    fn test_write_edit_refuses_changed_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("Blog.cs");
        fs::write(&file_path, b"class Blog {}").unwrap();

        let tree = SourceTree::from_file(&file_path).unwrap();
        let edited = tree.insert(0, "using System;\n").unwrap();
        fs::write(&file_path, b"class Blog { int Id; }").unwrap();

        assert!(matches!(
            write_edit(&tree, &edited),
            Err(EditError::StaleFile(_))
        ));
        assert_eq!(
            fs::read_to_string(&file_path).unwrap(),
            "class Blog { int Id; }"
        );
    }

    #[test]
    fn test_write_edit_compares_large_files_by_hash() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("Big.cs");
        let body: String = (0..100).map(|i| format!("    int field{i};\n")).collect();
        let original = format!("class Big\n{{\n{body}}}\n");
        assert!(original.len() > 1024);
        fs::write(&file_path, &original).unwrap();

        let tree = SourceTree::from_file(&file_path).unwrap();
        let edited = tree.insert(0, "using System;\n").unwrap();
        assert!(write_edit(&tree, &edited).is_ok());

        // The file now holds the edited text, so the old tree is stale.
        let again = tree.insert(0, "using System.Linq;\n").unwrap();
        assert!(matches!(
            write_edit(&tree, &again),
            Err(EditError::StaleFile(_))
        ));
    }

    #[test]
    fn test_read_optional_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(read_optional(&temp_dir.path().join("nope.json"))
            .unwrap()
            .is_none());
    }
}
