use crate::symbols::ExternalType;
use serde::Deserialize;
use std::fmt;

/// Contents of `scaffold-patcher.toml`. Every section is optional.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct PatcherConfig {
    #[serde(default)]
    pub conventions: Conventions,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
}

impl PatcherConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        let conventions = &self.conventions;

        let required = [
            ("conventions.init_method", &conventions.init_method),
            ("conventions.services_type", &conventions.services_type),
            (
                "conventions.page_registration_sentinel",
                &conventions.page_registration_sentinel,
            ),
            (
                "conventions.create_builder_sentinel",
                &conventions.create_builder_sentinel,
            ),
            ("conventions.builder_sentinel", &conventions.builder_sentinel),
            ("conventions.fallback_receiver", &conventions.fallback_receiver),
            ("conventions.collection_type", &conventions.collection_type),
            (
                "conventions.collection_namespace",
                &conventions.collection_namespace,
            ),
            (
                "conventions.configuration_type.name",
                &conventions.configuration_type.name,
            ),
            (
                "conventions.configuration_type.namespace",
                &conventions.configuration_type.namespace,
            ),
            (
                "conventions.configuration_type.assembly",
                &conventions.configuration_type.assembly,
            ),
            ("settings.file", &self.settings.file),
            ("settings.section", &self.settings.section),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                issues.push(ValidationIssue::MissingField { field });
            }
        }

        for (field, value) in [
            ("conventions.fallback_receiver", &conventions.fallback_receiver),
            ("conventions.collection_type", &conventions.collection_type),
            ("conventions.init_method", &conventions.init_method),
        ] {
            if !value.trim().is_empty() && !is_identifier(value) {
                issues.push(ValidationIssue::InvalidValue {
                    field,
                    message: format!("'{value}' is not a C# identifier"),
                });
            }
        }

        for namespace in &conventions.registration_namespaces {
            if !is_namespace(namespace) {
                issues.push(ValidationIssue::InvalidValue {
                    field: "conventions.registration_namespaces",
                    message: format!("'{namespace}' is not a namespace"),
                });
            }
        }

        for namespace in &self.project.implicit_usings {
            if !is_namespace(namespace) {
                issues.push(ValidationIssue::InvalidValue {
                    field: "project.implicit_usings",
                    message: format!("'{namespace}' is not a namespace"),
                });
            }
        }

        for external in &self.project.external_types {
            if !is_identifier(&external.name) {
                issues.push(ValidationIssue::InvalidValue {
                    field: "project.external_types.name",
                    message: format!("'{}' is not a C# identifier", external.name),
                });
            }
            if !is_namespace(&external.namespace) {
                issues.push(ValidationIssue::InvalidValue {
                    field: "project.external_types.namespace",
                    message: format!("'{}' is not a namespace", external.namespace),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

/// Names and sentinels the patcher looks for in host files.
#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct Conventions {
    pub init_method: String,
    pub services_type: String,
    pub page_registration_sentinel: String,
    pub create_builder_sentinel: String,
    pub builder_sentinel: String,
    pub fallback_receiver: String,
    pub collection_type: String,
    pub collection_namespace: String,
    /// Imports every registration needs, besides the context's own namespace
    pub registration_namespaces: Vec<String>,
    pub configuration_type: ConfigurationType,
}

impl Default for Conventions {
    fn default() -> Self {
        Self {
            init_method: "ConfigureServices".to_string(),
            services_type: "IServiceCollection".to_string(),
            page_registration_sentinel: "Services.AddRazorPages()".to_string(),
            create_builder_sentinel: "CreateBuilder(args)".to_string(),
            builder_sentinel: "WebApplication.CreateBuilder".to_string(),
            fallback_receiver: "builder".to_string(),
            collection_type: "DbSet".to_string(),
            collection_namespace: "Microsoft.EntityFrameworkCore".to_string(),
            registration_namespaces: vec![
                "Microsoft.EntityFrameworkCore".to_string(),
                "Microsoft.Extensions.DependencyInjection".to_string(),
            ],
            configuration_type: ConfigurationType::default(),
        }
    }
}

/// External identity of the configuration interface a classic host exposes.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigurationType {
    pub assembly: String,
    pub namespace: String,
    pub name: String,
}

impl Default for ConfigurationType {
    fn default() -> Self {
        Self {
            assembly: "Microsoft.Extensions.Configuration.Abstractions".to_string(),
            namespace: "Microsoft.Extensions.Configuration".to_string(),
            name: "IConfiguration".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsConfig {
    /// Settings file, relative to the project root
    pub file: String,
    pub section: String,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            file: "appsettings.json".to_string(),
            section: "ConnectionStrings".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub implicit_usings: Vec<String>,
    pub exclude_dirs: Vec<String>,
    pub external_types: Vec<ExternalType>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            implicit_usings: Vec::new(),
            exclude_dirs: vec!["bin".to_string(), "obj".to_string()],
            external_types: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct TemplatesConfig {
    /// Directory of `<TemplateName>.hbs` overrides, relative to the project root
    pub dir: Option<String>,
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn is_namespace(value: &str) -> bool {
    value.split('.').all(is_identifier)
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    MissingField {
        field: &'static str,
    },
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => {
                write!(f, "required field '{field}' is empty")
            }
            ValidationIssue::InvalidValue { field, message } => {
                write!(f, "invalid value for '{field}': {message}")
            }
        }
    }
}
