//! Small helpers over tree-sitter nodes and line geometry.
//!
//! The C# grammar does not expose every child through a field, so lookups
//! fall back to scanning children by kind.

use std::ops::Range;
use tree_sitter::Node;

/// Node kinds that declare a type with a member body.
pub const TYPE_DECLARATION_KINDS: &[&str] = &[
    "class_declaration",
    "struct_declaration",
    "interface_declaration",
    "record_declaration",
    "record_struct_declaration",
];

/// Node kinds that sit between members without being members themselves.
const NON_MEMBER_KINDS: &[&str] = &[
    "comment",
    "preproc_region",
    "preproc_endregion",
    "preproc_pragma",
    "preproc_nullable",
    "preproc_line",
    "preproc_error",
    "preproc_warning",
    "preproc_define",
    "preproc_undef",
    "{",
    "}",
    ";",
];

pub fn is_type_declaration(node: Node<'_>) -> bool {
    TYPE_DECLARATION_KINDS.contains(&node.kind())
}

pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

pub fn child_by_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|child| child.kind() == kind);
    found
}

/// Field lookup with a by-kind fallback for grammar versions that do not
/// name the child.
pub fn field_or_kind<'t>(node: Node<'t>, field: &str, kind: &str) -> Option<Node<'t>> {
    node.child_by_field_name(field)
        .or_else(|| child_by_kind(node, kind))
}

/// Members of a `declaration_list` or `compilation_unit`, skipping
/// comments, directives and punctuation.
pub fn members(container: Node<'_>) -> Vec<Node<'_>> {
    named_children(container)
        .into_iter()
        .filter(|child| !NON_MEMBER_KINDS.contains(&child.kind()))
        .collect()
}

/// First descendant (pre-order, including `node`) of the given kind.
pub fn find_descendant<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    if node.kind() == kind {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(found) = find_descendant(child, kind) {
            return Some(found);
        }
    }
    None
}

/// The type declaration or compilation unit that encloses `span`.
pub fn enclosing_declaration(root: Node<'_>, span: Range<usize>) -> Option<Node<'_>> {
    let mut node = root.descendant_for_byte_range(span.start, span.end)?;
    loop {
        if is_type_declaration(node) || node.kind() == "compilation_unit" {
            return Some(node);
        }
        node = node.parent()?;
    }
}

/// Byte offset of the start of the line containing `byte`.
pub fn line_start(text: &str, byte: usize) -> usize {
    text[..byte].rfind('\n').map(|idx| idx + 1).unwrap_or(0)
}

/// Byte offset just past the newline ending the line containing `byte`,
/// or the end of the text when that line is the last one.
pub fn line_end(text: &str, byte: usize) -> usize {
    text[byte..]
        .find('\n')
        .map(|idx| byte + idx + 1)
        .unwrap_or(text.len())
}

/// Leading whitespace of the line containing `byte`.
pub fn line_indent(text: &str, byte: usize) -> &str {
    let start = line_start(text, byte);
    let line = &text[start..];
    let width = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..width]
}

/// True when only spaces and tabs precede `byte` on its line.
pub fn starts_line(text: &str, byte: usize) -> bool {
    let start = line_start(text, byte);
    text[start..byte].chars().all(|c| c == ' ' || c == '\t')
}

/// Compute where and what to insert so that `content` (a block of whole
/// lines ending in `\n`) lands just before the closing brace at `close`.
///
/// When the brace sits on its own line the content goes at the start of
/// that line. Otherwise a line break is opened before the brace and the
/// brace keeps the indentation of the line it was on.
pub fn before_closing_brace(text: &str, close: usize, content: &str) -> (usize, String) {
    if starts_line(text, close) && line_start(text, close) > 0 {
        return (line_start(text, close), content.to_string());
    }
    let indent = line_indent(text, close);
    (close, format!("\n{content}{indent}"))
}

/// The namespace a `using` directive imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsingTarget {
    pub namespace: String,
    pub global: bool,
}

/// Read a `using` directive's text. Alias and `using static` forms import
/// no namespace and yield `None`.
pub fn using_target(directive: &str) -> Option<UsingTarget> {
    let text = directive.trim().trim_end_matches(';').trim();
    let (global, rest) = match text.strip_prefix("global") {
        Some(rest) if rest.starts_with(char::is_whitespace) => (true, rest.trim_start()),
        _ => (false, text),
    };
    let rest = rest.strip_prefix("using")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim();
    if rest.contains('=') || rest.starts_with("static ") || rest.starts_with("unsafe ") {
        return None;
    }
    let namespace: String = rest.chars().filter(|c| !c.is_whitespace()).collect();
    if namespace.is_empty() {
        return None;
    }
    Some(UsingTarget { namespace, global })
}
