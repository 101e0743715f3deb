use crate::cs::errors::TreeSitterError;
use crate::cs::parser::ErrorNode;
use crate::cs::tree::SourceTree;

/// Validate that C# source code has no syntax errors.
///
/// Returns Ok(()) if the code parses without ERROR or MISSING nodes.
pub fn validate_syntax(source: &str) -> Result<(), TreeSitterError> {
    let parsed = SourceTree::parse(source)?;
    errors_to_result(&parsed.error_nodes())
}

/// Validate that an edit doesn't introduce syntax errors.
///
/// Applies the edit virtually and compares error counts. Positions cannot
/// be compared directly because everything after the splice shifts.
pub fn validate_edit(
    source: &str,
    byte_start: usize,
    byte_end: usize,
    new_text: &str,
) -> Result<(), TreeSitterError> {
    let mut new_source =
        String::with_capacity(source.len() + new_text.len() - (byte_end - byte_start));
    new_source.push_str(&source[..byte_start]);
    new_source.push_str(new_text);
    new_source.push_str(&source[byte_end..]);

    let original_errors = SourceTree::parse(source)?.error_nodes();
    let new_errors = SourceTree::parse(new_source)?.error_nodes();

    if new_errors.len() <= original_errors.len() {
        return Ok(());
    }
    let added = new_errors.len() - original_errors.len();

    let introduced: Vec<ErrorNode> = new_errors
        .into_iter()
        .filter(|e| {
            !original_errors
                .iter()
                .any(|o| o.byte_start == e.byte_start && o.byte_end == e.byte_end)
        })
        .collect();
    if introduced.is_empty() {
        return Err(TreeSitterError::MultipleSyntaxErrors { count: added });
    }
    errors_to_result(&introduced)
}

/// Check if a code snippet is valid as a specific syntactic category.
pub fn validate_snippet(snippet: &str, category: SnippetCategory) -> Result<(), TreeSitterError> {
    let wrapped = match category {
        SnippetCategory::CompilationUnit | SnippetCategory::GlobalStatement => snippet.to_string(),
        SnippetCategory::Member => format!("class __Wrapper__\n{{\n{snippet}\n}}\n"),
        SnippetCategory::Statement => {
            format!("class __Wrapper__\n{{\nvoid __Method__()\n{{\n{snippet}\n}}\n}}\n")
        }
    };

    validate_syntax(&wrapped)
}

fn errors_to_result(errors: &[ErrorNode]) -> Result<(), TreeSitterError> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(TreeSitterError::SyntaxError {
            byte_start: errors[0].byte_start,
            byte_end: errors[0].byte_end,
        }),
        n => Err(TreeSitterError::MultipleSyntaxErrors { count: n }),
    }
}

/// Category of code snippet for validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnippetCategory {
    /// A whole file, or top-level directives such as `using`
    CompilationUnit,
    /// A class member (property, method, field)
    Member,
    /// A statement inside a method body
    Statement,
    /// A top-level statement
    GlobalStatement,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_valid_syntax() {
        let source = r#"
namespace Demo
{
    public class Blog
    {
        public int Id { get; set; }
    }
}
"#;
        assert!(validate_syntax(source).is_ok());
    }

    #[test]
    fn validate_invalid_syntax() {
        assert!(validate_syntax("public class Blog {").is_err());
    }

    #[test]
    fn validate_edit_introduces_error() {
        let source = "class A { int x; }";
        let result = validate_edit(source, 10, 16, "int x =");
        assert!(result.is_err());
    }

    #[test]
    fn validate_edit_no_new_errors() {
        let source = "class A { int x; }";
        let result = validate_edit(source, 10, 16, "int y;");
        assert!(result.is_ok());
    }

    #[test]
    fn validate_member_snippet() {
        assert!(validate_snippet("public DbSet<Demo.Blog> Blog { get; set; }", SnippetCategory::Member).is_ok());
        assert!(validate_snippet("public DbSet<Demo.Blog> { get; set; ", SnippetCategory::Member).is_err());
    }

    #[test]
    fn validate_statement_snippet() {
        let statement = "services.AddDbContext<BlogContext>(options =>\n    options.UseSqlite(Configuration.GetConnectionString(\"BlogContext\")));";
        assert!(validate_snippet(statement, SnippetCategory::Statement).is_ok());
        assert!(validate_snippet("services.AddDbContext<(;", SnippetCategory::Statement).is_err());
    }

    #[test]
    fn validate_using_snippet() {
        assert!(validate_snippet("using Microsoft.EntityFrameworkCore;", SnippetCategory::CompilationUnit).is_ok());
        assert!(validate_snippet("using Microsoft..EntityFrameworkCore;", SnippetCategory::CompilationUnit).is_err());
    }
}
