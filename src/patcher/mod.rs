//! Structural edits on data-context and composition-root files.
//!
//! Every operation takes immutable trees and symbols and returns an
//! [`EditResult`]; nothing is written here except connection strings,
//! which go through the [`ConnectionStringsWriter`] collaborator.
//!
//! ```no_run
//! use scaffold_patcher::patcher::{DbContextEditor, RegistrationRequest};
//! use scaffold_patcher::settings::{AppSettingsWriter, ProviderVariant};
//! use scaffold_patcher::symbols::ProjectLoader;
//! use scaffold_patcher::template::HandlebarsTemplating;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let project = ProjectLoader::default().load("./MyApp")?;
//! let settings = AppSettingsWriter::new("./MyApp/appsettings.json");
//! let templating = HandlebarsTemplating::new()?;
//! let editor = DbContextEditor::new(&settings, &templating);
//!
//! let context = project.find_type("MyApp.Data.ShopContext")?;
//! let model = project.find_type("MyApp.Models.Product")?;
//! let result = editor.add_collection_member(&context, &model)?;
//! if let (Some(old), Some(new)) = (&result.old_tree, &result.new_tree) {
//!     scaffold_patcher::edit::write_edit(old, new)?;
//! }
//!
//! let host = project.program().expect("top-level Program.cs");
//! let request = RegistrationRequest::new("ShopContext", "MyApp.Data", "Shop", ProviderVariant::File);
//! let _ = editor.add_service_registration(&host, &request)?;
//! # Ok(())
//! # }
//! ```

pub mod imports;
pub mod members;
pub mod registration;

use crate::config::Conventions;
use crate::cs::{validate_edit, SourceTree, TreeSitterError};
use crate::edit::{EditError, EditResult};
use crate::host::{HostDetector, HostShape};
use crate::settings::{ConnectionStringsWriter, ProviderVariant, SettingsError};
use crate::symbols::{has_matching_member, is_collection_property_of, TypeSymbol};
use crate::template::{Templating, NEW_LOCAL_DB_CONTEXT};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

pub use imports::ensure_usings;
pub use members::{collection_property, safe_member_name};
pub use registration::RegistrationSpec;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("invalid argument: '{0}' must not be empty")]
    InvalidArgument(&'static str),

    #[error("generated code does not parse: {0}")]
    Syntax(#[source] TreeSitterError),

    #[error("there was an error running the template {template}: {message}")]
    TemplateProcessing { template: String, message: String },

    #[error("failed to update connection strings: {0}")]
    ConnectionStrings(#[from] SettingsError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    TreeSitter(#[from] TreeSitterError),
}

/// Insert `text` at `at`, refusing results with more syntax errors than
/// the input had.
pub(crate) fn splice(tree: &SourceTree, at: usize, text: &str) -> Result<SourceTree, PatchError> {
    let edited = tree.insert(at, text)?;
    validate_edit(tree.text(), at, at, text).map_err(PatchError::Syntax)?;
    Ok(edited)
}

/// Input for a new data-context file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewContextModel {
    pub context_namespace: String,
    pub context_type_name: String,
    pub model_type_name: String,
    pub model_type_full_name: String,
    pub required_namespaces: Vec<String>,
}

/// What `add_service_registration` registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub context_type_name: String,
    pub context_namespace: String,
    /// Database name used in the default connection string
    pub resource_name: String,
    pub provider: ProviderVariant,
}

impl RegistrationRequest {
    pub fn new(
        context_type_name: impl Into<String>,
        context_namespace: impl Into<String>,
        resource_name: impl Into<String>,
        provider: ProviderVariant,
    ) -> Self {
        Self {
            context_type_name: context_type_name.into(),
            context_namespace: context_namespace.into(),
            resource_name: resource_name.into(),
            provider,
        }
    }
}

pub struct DbContextEditor<'a> {
    conventions: Conventions,
    connection_strings: &'a dyn ConnectionStringsWriter,
    templating: &'a dyn Templating,
}

impl<'a> DbContextEditor<'a> {
    pub fn new(
        connection_strings: &'a dyn ConnectionStringsWriter,
        templating: &'a dyn Templating,
    ) -> Self {
        Self {
            conventions: Conventions::default(),
            connection_strings,
            templating,
        }
    }

    pub fn with_conventions(mut self, conventions: Conventions) -> Self {
        self.conventions = conventions;
        self
    }

    pub fn conventions(&self) -> &Conventions {
        &self.conventions
    }

    /// Render a new data-context file. The tree has no path; the caller
    /// decides where it goes.
    pub fn add_new_context(&self, model: &NewContextModel) -> Result<SourceTree, PatchError> {
        for (field, value) in [
            ("context_namespace", &model.context_namespace),
            ("context_type_name", &model.context_type_name),
            ("model_type_name", &model.model_type_name),
            ("model_type_full_name", &model.model_type_full_name),
        ] {
            if value.trim().is_empty() {
                return Err(PatchError::InvalidArgument(field));
            }
        }

        let processing_error = |message: String| PatchError::TemplateProcessing {
            template: NEW_LOCAL_DB_CONTEXT.to_string(),
            message,
        };
        let data = serde_json::to_value(model).map_err(|e| processing_error(e.to_string()))?;
        let text = self
            .templating
            .render(NEW_LOCAL_DB_CONTEXT, &data)
            .map_err(|e| processing_error(e.to_string()))?;

        let tree = SourceTree::parse(text)?;
        if let Some(first) = tree.error_nodes().first() {
            return Err(PatchError::Syntax(TreeSitterError::SyntaxError {
                byte_start: first.byte_start,
                byte_end: first.byte_end,
            }));
        }
        info!(context = %model.context_type_name, "rendered new data context");
        Ok(tree)
    }

    /// Add a `DbSet<Element>` property to `container` unless it or one of
    /// its base types already has one.
    pub fn add_collection_member(
        &self,
        container: &TypeSymbol,
        element: &TypeSymbol,
    ) -> Result<EditResult, PatchError> {
        if element.name.trim().is_empty() {
            return Err(PatchError::InvalidArgument("element"));
        }

        let element_full_name = element.full_name();
        let already_there = has_matching_member(
            container,
            is_collection_property_of(&self.conventions.collection_type, &element_full_name),
        );
        if already_there {
            debug!(container = %container.full_name(), element = %element_full_name, "collection property exists");
            return Ok(EditResult::unchanged());
        }

        let Some(location) = container.primary_location() else {
            debug!(container = %container.full_name(), "container has no source location");
            return Ok(EditResult::unchanged());
        };

        let name = safe_member_name(&element.name, container);
        let declaration =
            collection_property(&self.conventions.collection_type, &element_full_name, &name);
        let Some(with_member) = members::append_member(location, &declaration)? else {
            debug!(container = %container.full_name(), "container declaration has no body");
            return Ok(EditResult::unchanged());
        };

        let mut namespaces = vec![self.conventions.collection_namespace.clone()];
        namespaces.extend(element.namespace.clone());
        let new_tree = ensure_usings(with_member, namespaces.as_slice())?;

        info!(container = %container.full_name(), property = %name, "added collection property");
        Ok(EditResult::changed(location.tree.clone(), new_tree))
    }

    /// Register the data context with the host's service collection.
    ///
    /// The connection string is written once a host shape is detected and
    /// before the statement is spliced in. A failure after that point leaves
    /// the settings file updated.
    pub fn add_service_registration(
        &self,
        host: &TypeSymbol,
        request: &RegistrationRequest,
    ) -> Result<EditResult, PatchError> {
        if request.context_type_name.trim().is_empty() {
            return Err(PatchError::InvalidArgument("context_type_name"));
        }
        if request.resource_name.trim().is_empty() {
            return Err(PatchError::InvalidArgument("resource_name"));
        }

        let Some(detection) = HostDetector::new(&self.conventions).detect(host) else {
            return Ok(EditResult::unchanged());
        };

        self.connection_strings.add_connection_string(
            &request.context_type_name,
            &request.resource_name,
            request.provider,
        )?;

        let with_statement = match &detection.shape {
            HostShape::Classic(anchor) => registration::insert_classic(
                &detection.tree,
                anchor,
                &request.context_type_name,
                request.provider,
            )?,
            HostShape::Minimal(anchor) => registration::insert_minimal(
                &detection.tree,
                anchor,
                &request.context_type_name,
                request.provider,
            )?,
        };

        let mut namespaces = self.conventions.registration_namespaces.clone();
        namespaces.push(request.context_namespace.clone());
        let new_tree = ensure_usings(with_statement, namespaces.as_slice())?;

        info!(
            host = %host.full_name(),
            context = %request.context_type_name,
            provider = %request.provider,
            "added service registration"
        );
        Ok(EditResult::changed(detection.tree, new_tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{HandlebarsTemplating, TemplateError};
    use serde_json::Value;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingWriter {
        calls: RefCell<Vec<(String, String, ProviderVariant)>>,
    }

    impl ConnectionStringsWriter for RecordingWriter {
        fn add_connection_string(
            &self,
            key: &str,
            resource: &str,
            provider: ProviderVariant,
        ) -> Result<bool, SettingsError> {
            self.calls
                .borrow_mut()
                .push((key.to_string(), resource.to_string(), provider));
            Ok(true)
        }
    }

    struct FailingTemplating;

    impl Templating for FailingTemplating {
        fn render(&self, _template: &str, _model: &Value) -> Result<String, TemplateError> {
            Err(TemplateError::Render {
                message: "boom".to_string(),
            })
        }
    }

    struct FixedTemplating(&'static str);

    impl Templating for FixedTemplating {
        fn render(&self, _template: &str, _model: &Value) -> Result<String, TemplateError> {
            Ok(self.0.to_string())
        }
    }

    fn model() -> NewContextModel {
        NewContextModel {
            context_namespace: "Shop.Data".to_string(),
            context_type_name: "ShopContext".to_string(),
            model_type_name: "Product".to_string(),
            model_type_full_name: "Shop.Models.Product".to_string(),
            required_namespaces: vec!["Shop.Models".to_string()],
        }
    }

    #[test]
    fn new_context_renders_and_parses() {
        let writer = RecordingWriter::default();
        let templating = HandlebarsTemplating::new().unwrap();
        let editor = DbContextEditor::new(&writer, &templating);

        let tree = editor.add_new_context(&model()).unwrap();
        assert!(tree.path().is_none());
        assert!(!tree.has_errors());
        assert!(tree.text().contains("public class ShopContext : DbContext"));
    }

    #[test]
    fn template_failure_names_the_template() {
        let writer = RecordingWriter::default();
        let editor = DbContextEditor::new(&writer, &FailingTemplating);

        match editor.add_new_context(&model()) {
            Err(PatchError::TemplateProcessing { template, message }) => {
                assert_eq!(template, "NewLocalDbContext");
                assert_eq!(message, "boom");
            }
            other => panic!("expected TemplateProcessing, got {other:?}"),
        }
    }

    #[test]
    fn unparsable_template_output_is_a_syntax_error() {
        let writer = RecordingWriter::default();
        let templating = FixedTemplating("public class {");
        let editor = DbContextEditor::new(&writer, &templating);
        assert!(matches!(
            editor.add_new_context(&model()),
            Err(PatchError::Syntax(_))
        ));
    }

    #[test]
    fn empty_arguments_are_rejected_up_front() {
        let writer = RecordingWriter::default();
        let templating = HandlebarsTemplating::new().unwrap();
        let editor = DbContextEditor::new(&writer, &templating);

        let mut bad = model();
        bad.context_type_name = String::new();
        assert!(matches!(
            editor.add_new_context(&bad),
            Err(PatchError::InvalidArgument("context_type_name"))
        ));

        let host = TypeSymbol::class("Startup");
        let request = RegistrationRequest::new("Ctx", "Demo", "", ProviderVariant::File);
        assert!(matches!(
            editor.add_service_registration(&host, &request),
            Err(PatchError::InvalidArgument("resource_name"))
        ));
        assert!(writer.calls.borrow().is_empty());
    }

    #[test]
    fn splice_refuses_new_errors() {
        let tree = SourceTree::parse("class A { }\n").unwrap();
        assert!(matches!(
            splice(&tree, 10, "int ;"),
            Err(PatchError::Syntax(_))
        ));
        assert!(splice(&tree, 10, "int x; ").is_ok());
    }
}
