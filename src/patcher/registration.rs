use crate::cs::nodes::{before_closing_brace, line_end, line_indent};
use crate::cs::{validate_snippet, SnippetCategory, SourceTree};
use crate::host::{MethodAnchor, StatementAnchor};
use crate::patcher::{splice, PatchError};
use crate::settings::ProviderVariant;

/// What one `AddDbContext` registration says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationSpec {
    /// Expression the call is made on: `services` or `builder.Services`
    pub receiver: String,
    pub context_type: String,
    /// Expression exposing `GetConnectionString`
    pub config_source: String,
    pub provider: ProviderVariant,
}

impl RegistrationSpec {
    /// Two-line statement: the first line starts with `first_indent`, the
    /// options lambda body with `continuation_indent`.
    pub fn render(&self, first_indent: &str, continuation_indent: &str) -> String {
        format!(
            "{first_indent}{receiver}.AddDbContext<{context}>(options =>\n\
             {continuation_indent}options.{method}({config}.GetConnectionString(\"{context}\")));\n",
            receiver = self.receiver,
            context = self.context_type,
            method = self.provider.use_method(),
            config = self.config_source,
        )
    }
}

/// Append the registration as the last statement of the init method.
pub fn insert_classic(
    tree: &SourceTree,
    anchor: &MethodAnchor,
    context_type: &str,
    provider: ProviderVariant,
) -> Result<SourceTree, PatchError> {
    let spec = RegistrationSpec {
        receiver: anchor.services.clone(),
        context_type: context_type.to_string(),
        config_source: anchor.configuration.clone(),
        provider,
    };
    let indent = format!("{}    ", line_indent(tree.text(), anchor.body_open));
    let statement = spec.render(&indent, &format!("{indent}        "));
    validate_snippet(&statement, SnippetCategory::Statement).map_err(PatchError::Syntax)?;

    let content = if anchor.has_statements {
        format!("\n{statement}")
    } else {
        statement
    };
    let (at, insertion) = before_closing_brace(tree.text(), anchor.body_close, &content);
    splice(tree, at, &insertion)
}

/// Insert the registration as a top-level statement after the anchor,
/// separated from it by a blank line. A statement that follows the anchor
/// on the same line is moved below the registration.
pub fn insert_minimal(
    tree: &SourceTree,
    anchor: &StatementAnchor,
    context_type: &str,
    provider: ProviderVariant,
) -> Result<SourceTree, PatchError> {
    let spec = RegistrationSpec {
        receiver: format!("{}.Services", anchor.receiver),
        context_type: context_type.to_string(),
        config_source: format!("{}.Configuration", anchor.receiver),
        provider,
    };
    let statement = spec.render("", &format!("{}    ", anchor.member_indent));
    validate_snippet(&statement, SnippetCategory::GlobalStatement).map_err(PatchError::Syntax)?;

    let text = tree.text();
    let end = anchor.anchor.end;
    let rest_of_line = &text[end..line_end(text, end)];
    let trailing = rest_of_line.trim_start_matches([' ', '\t']);

    let (at, insertion) = if trailing.trim_end().is_empty() || trailing.starts_with("//") {
        let at = line_end(text, end);
        if at == text.len() && !text.ends_with('\n') {
            (at, format!("\n\n{statement}"))
        } else {
            (at, format!("\n{statement}"))
        }
    } else {
        // Another statement shares the anchor's line; break it onto its own.
        let at = end + (rest_of_line.len() - trailing.len());
        (at, format!("\n\n{statement}{}", anchor.member_indent))
    };
    splice(tree, at, &insertion)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_classic_statement() {
        let spec = RegistrationSpec {
            receiver: "services".to_string(),
            context_type: "BlogContext".to_string(),
            config_source: "Configuration".to_string(),
            provider: ProviderVariant::Server,
        };
        assert_eq!(
            spec.render("        ", "                "),
            "        services.AddDbContext<BlogContext>(options =>\n                options.UseSqlServer(Configuration.GetConnectionString(\"BlogContext\")));\n"
        );
    }

    #[test]
    fn renders_minimal_statement() {
        let spec = RegistrationSpec {
            receiver: "builder.Services".to_string(),
            context_type: "BlogContext".to_string(),
            config_source: "builder.Configuration".to_string(),
            provider: ProviderVariant::File,
        };
        assert_eq!(
            spec.render("", "    "),
            "builder.Services.AddDbContext<BlogContext>(options =>\n    options.UseSqlite(builder.Configuration.GetConnectionString(\"BlogContext\")));\n"
        );
    }

    #[test]
    fn minimal_insert_at_end_of_file_without_newline() {
        let source = "var builder = WebApplication.CreateBuilder(args);";
        let tree = SourceTree::parse(source).unwrap();
        let anchor = StatementAnchor {
            anchor: 0..source.len(),
            member_indent: String::new(),
            receiver: "builder".to_string(),
        };
        let out = insert_minimal(&tree, &anchor, "Ctx", ProviderVariant::File).unwrap();
        assert!(out
            .text()
            .starts_with("var builder = WebApplication.CreateBuilder(args);\n\nbuilder.Services"));
        assert!(!out.has_errors());
    }

    fn minimal_anchor_for(source: &str, anchor_text: &str) -> StatementAnchor {
        let start = source.find(anchor_text).unwrap();
        StatementAnchor {
            anchor: start..start + anchor_text.len(),
            member_indent: String::new(),
            receiver: "builder".to_string(),
        }
    }

    #[test]
    fn minimal_insert_precedes_statement_on_the_anchor_line() {
        let source = "var builder = WebApplication.CreateBuilder(args); var app = builder.Build();\napp.Run();\n";
        let tree = SourceTree::parse(source).unwrap();
        let anchor = minimal_anchor_for(source, "var builder = WebApplication.CreateBuilder(args);");

        let out = insert_minimal(&tree, &anchor, "Ctx", ProviderVariant::File).unwrap();
        assert_eq!(
            out.text(),
            "var builder = WebApplication.CreateBuilder(args); \n\nbuilder.Services.AddDbContext<Ctx>(options =>\n    options.UseSqlite(builder.Configuration.GetConnectionString(\"Ctx\")));\nvar app = builder.Build();\napp.Run();\n"
        );
        let registration = out.text().find("AddDbContext").unwrap();
        let build = out.text().find("builder.Build()").unwrap();
        assert!(registration < build);
    }

    #[test]
    fn minimal_insert_keeps_trailing_comment_on_anchor_line() {
        let source = "var builder = WebApplication.CreateBuilder(args); // host\nvar app = builder.Build();\n";
        let tree = SourceTree::parse(source).unwrap();
        let anchor = minimal_anchor_for(source, "var builder = WebApplication.CreateBuilder(args);");

        let out = insert_minimal(&tree, &anchor, "Ctx", ProviderVariant::Server).unwrap();
        assert!(out.text().starts_with(
            "var builder = WebApplication.CreateBuilder(args); // host\n\nbuilder.Services.AddDbContext<Ctx>"
        ));
    }
}
