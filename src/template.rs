//! Text templates for files the patcher creates from scratch.

use handlebars::Handlebars;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Name of the template that renders a new, empty data context.
pub const NEW_LOCAL_DB_CONTEXT: &str = "NewLocalDbContext";

const NEW_LOCAL_DB_CONTEXT_TEMPLATE: &str = r#"{{#each required_namespaces}}using {{this}};
{{/each}}using Microsoft.EntityFrameworkCore;

namespace {{context_namespace}}
{
    public class {{context_type_name}} : DbContext
    {
        public {{context_type_name}}(DbContextOptions<{{context_type_name}}> options)
            : base(options)
        {
        }

        public DbSet<{{model_type_full_name}}> {{model_type_name}} { get; set; } = default!;
    }
}
"#;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("failed to register template '{name}': {message}")]
    Register { name: String, message: String },

    #[error("failed to read template override {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    Render { message: String },
}

/// Renders a named template against a JSON model.
pub trait Templating {
    fn render(&self, template: &str, model: &Value) -> Result<String, TemplateError>;
}

/// Handlebars templates: built-ins, optionally overridden from a directory.
pub struct HandlebarsTemplating {
    handlebars: Handlebars<'static>,
}

impl HandlebarsTemplating {
    pub fn new() -> Result<Self, TemplateError> {
        let mut handlebars = Handlebars::new();
        // The output is C#, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.set_strict_mode(true);
        handlebars
            .register_template_string(NEW_LOCAL_DB_CONTEXT, NEW_LOCAL_DB_CONTEXT_TEMPLATE)
            .map_err(|e| TemplateError::Register {
                name: NEW_LOCAL_DB_CONTEXT.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { handlebars })
    }

    /// Replace built-ins with any `<Name>.hbs` files found in `dir`.
    pub fn with_overrides(mut self, dir: &Path) -> Result<Self, TemplateError> {
        let entries = fs::read_dir(dir).map_err(|source| TemplateError::Read {
            path: dir.to_path_buf(),
            source,
        })?;

        for entry in entries {
            let path = entry
                .map_err(|source| TemplateError::Read {
                    path: dir.to_path_buf(),
                    source,
                })?
                .path();
            if path.extension().and_then(|s| s.to_str()) != Some("hbs") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let content = fs::read_to_string(&path).map_err(|source| TemplateError::Read {
                path: path.clone(),
                source,
            })?;
            self.handlebars
                .register_template_string(&name, content)
                .map_err(|e| TemplateError::Register {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            debug!(template = %name, path = %path.display(), "registered template override");
        }
        Ok(self)
    }
}

impl Templating for HandlebarsTemplating {
    fn render(&self, template: &str, model: &Value) -> Result<String, TemplateError> {
        self.handlebars
            .render(template, model)
            .map_err(|e| TemplateError::Render {
                message: e.to_string(),
            })
    }
}
