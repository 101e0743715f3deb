use crate::config::schema::{PatcherConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up in the project root when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "scaffold-patcher.toml";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read patcher config from {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse patcher config TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse patcher config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid patcher config ({}): {}", path.display(), source),
                None => write!(f, "invalid patcher config: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<PatcherConfig, ConfigError> {
    let config: PatcherConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatcherConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// Load `scaffold-patcher.toml` from `project_dir`, or the defaults when the
/// project has none.
pub fn discover(project_dir: impl AsRef<Path>) -> Result<PatcherConfig, ConfigError> {
    let candidate = project_dir.as_ref().join(CONFIG_FILE_NAME);
    if candidate.is_file() {
        load_from_path(candidate)
    } else {
        Ok(PatcherConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = load_from_str("").unwrap();
        assert_eq!(config.conventions.fallback_receiver, "builder");
        assert_eq!(config.settings.section, "ConnectionStrings");
    }

    #[test]
    fn overrides_and_external_types() {
        let config = load_from_str(
            r#"
[conventions]
fallback_receiver = "host"

[settings]
file = "config/appsettings.Development.json"

[project]
implicit_usings = ["System", "System.Linq"]

[[project.external_types]]
name = "IdentityDbContext"
namespace = "Microsoft.AspNetCore.Identity.EntityFrameworkCore"
assembly = "Microsoft.AspNetCore.Identity.EntityFrameworkCore"
"#,
        )
        .unwrap();

        assert_eq!(config.conventions.fallback_receiver, "host");
        assert_eq!(config.conventions.init_method, "ConfigureServices");
        assert_eq!(config.settings.file, "config/appsettings.Development.json");
        assert_eq!(config.project.implicit_usings.len(), 2);
        assert_eq!(config.project.external_types[0].arity, 0);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = load_from_str("[conventions]\nreceiver = \"b\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml { path: None, .. }));
    }

    #[test]
    fn errors_from_files_carry_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[settings]\nsection = \"\"\n").unwrap();

        let err = discover(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { path: Some(_), .. }));
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = discover(dir.path()).unwrap();
        assert_eq!(config.templates.dir, None);
    }
}
