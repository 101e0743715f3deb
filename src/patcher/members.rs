use crate::cs::nodes::{
    before_closing_brace, enclosing_declaration, field_or_kind, line_end, line_indent, members,
    starts_line,
};
use crate::cs::{validate_snippet, SnippetCategory, SourceTree};
use crate::patcher::{splice, PatchError};
use crate::symbols::{SourceLocation, TypeSymbol};

/// `base`, or `base_1`, `base_2`, ... whichever is first not taken by a
/// direct member of `ty`.
pub fn safe_member_name(base: &str, ty: &TypeSymbol) -> String {
    let mut candidate = base.to_string();
    let mut suffix = 1usize;
    while ty.has_member_named(&candidate) {
        candidate = format!("{base}_{suffix}");
        suffix += 1;
    }
    candidate
}

/// `public DbSet<Full.Name> Name { get; set; }`
pub fn collection_property(collection_type: &str, element_full_name: &str, name: &str) -> String {
    format!("public {collection_type}<{element_full_name}> {name} {{ get; set; }}")
}

/// Insert `declaration` as the last member of the type declared at
/// `location`. `Ok(None)` when the location does not lead to a type body.
pub fn append_member(
    location: &SourceLocation,
    declaration: &str,
) -> Result<Option<SourceTree>, PatchError> {
    validate_snippet(declaration, SnippetCategory::Member).map_err(PatchError::Syntax)?;

    let tree = &location.tree;
    let Some(declaring) = enclosing_declaration(tree.root_node(), location.span.clone()) else {
        return Ok(None);
    };
    let Some(body) = field_or_kind(declaring, "body", "declaration_list") else {
        return Ok(None);
    };

    let text = tree.text();
    let open = body.start_byte();
    let close = body.end_byte() - 1;
    if text.as_bytes().get(close) != Some(&b'}') {
        return Ok(None);
    }

    let (at, insertion) = match members(body).last() {
        Some(last) if line_end(text, last.end_byte()) <= close => {
            let indent = line_indent(text, last.start_byte());
            (
                line_end(text, last.end_byte()),
                format!("{indent}{declaration}\n"),
            )
        }
        Some(last) if starts_line(text, last.start_byte()) => {
            let indent = line_indent(text, last.start_byte());
            before_closing_brace(text, close, &format!("{indent}{declaration}\n"))
        }
        _ => {
            let indent = format!("{}    ", line_indent(text, open));
            before_closing_brace(text, close, &format!("{indent}{declaration}\n"))
        }
    };

    splice(tree, at, &insertion).map(Some)
}
