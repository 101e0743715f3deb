//! `using` directive maintenance.

use crate::cs::nodes::{line_end, line_indent, line_start, named_children, using_target};
use crate::cs::{queries, QueryEngine, SourceTree};
use crate::patcher::{splice, PatchError};
use tracing::debug;

/// Add a top-level `using` for each namespace that is not imported yet.
///
/// New directives go after the last existing top-level `using`, or ahead of
/// the first declaration when the file has none. Empty namespaces are
/// skipped.
pub fn ensure_usings<S: AsRef<str>>(
    mut tree: SourceTree,
    namespaces: &[S],
) -> Result<SourceTree, PatchError> {
    let engine = QueryEngine::new(queries::TOP_LEVEL_USINGS)?;

    for namespace in namespaces.iter().map(AsRef::as_ref) {
        if namespace.trim().is_empty() {
            continue;
        }

        let usings = engine.find_all(&tree);
        let present = usings.iter().any(|m| {
            m.captures
                .get("using")
                .and_then(|c| using_target(&c.text))
                .is_some_and(|target| target.namespace == namespace)
        });
        if present {
            continue;
        }

        let directive = format!("using {namespace};");
        let (at, text) = match usings.iter().map(|m| m.byte_end).max() {
            Some(last_end) => {
                let content = tree.text();
                let indent = line_indent(content, last_end);
                let at = line_end(content, last_end);
                if at == content.len() && !content.ends_with('\n') {
                    (at, format!("\n{indent}{directive}\n"))
                } else {
                    (at, format!("{indent}{directive}\n"))
                }
            }
            None => first_declaration_slot(&tree, &directive),
        };

        tree = splice(&tree, at, &text)?;
        debug!(namespace, "added using directive");
    }

    Ok(tree)
}

fn first_declaration_slot(tree: &SourceTree, directive: &str) -> (usize, String) {
    let first = named_children(tree.root_node())
        .into_iter()
        .find(|n| n.kind() != "comment");
    match first {
        Some(node) => (
            line_start(tree.text(), node.start_byte()),
            format!("{directive}\n\n"),
        ),
        None => {
            let content = tree.text();
            if content.is_empty() || content.ends_with('\n') {
                (content.len(), format!("{directive}\n"))
            } else {
                (content.len(), format!("\n{directive}\n"))
            }
        }
    }
}
