//! Connection strings in `appsettings.json`.

use crate::edit::{read_optional, write_atomic, EditError};
use json_comments::StripComments;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

/// Backing database engine for a registered context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderVariant {
    /// File-based (SQLite)
    File,
    /// Server-based (SQL Server LocalDB)
    Server,
}

impl ProviderVariant {
    /// The `DbContextOptionsBuilder` extension the registration calls.
    pub fn use_method(self) -> &'static str {
        match self {
            ProviderVariant::File => "UseSqlite",
            ProviderVariant::Server => "UseSqlServer",
        }
    }

    pub fn default_connection_string(self, database: &str) -> String {
        match self {
            ProviderVariant::File => format!("Data Source={database}.db"),
            ProviderVariant::Server => format!(
                "Server=(localdb)\\mssqllocaldb;Database={database};Trusted_Connection=True;MultipleActiveResultSets=true"
            ),
        }
    }
}

impl FromStr for ProviderVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" | "sqlite" => Ok(ProviderVariant::File),
            "server" | "sqlserver" | "sql-server" => Ok(ProviderVariant::Server),
            other => Err(format!(
                "unknown provider '{other}' (expected 'sqlite' or 'sqlserver')"
            )),
        }
    }
}

impl fmt::Display for ProviderVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderVariant::File => f.write_str("sqlite"),
            ProviderVariant::Server => f.write_str("sqlserver"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path}: expected {expected} at '{location}'")]
    UnexpectedShape {
        path: PathBuf,
        location: String,
        expected: &'static str,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: EditError,
    },
}

/// Persists named connection strings for the registrations the patcher adds.
pub trait ConnectionStringsWriter {
    /// Add `key` with the provider's default connection string for `resource`
    /// unless the key is already present. Returns whether anything was written.
    fn add_connection_string(
        &self,
        key: &str,
        resource: &str,
        provider: ProviderVariant,
    ) -> Result<bool, SettingsError>;
}

/// Writes connection strings into a JSON settings file, keeping key order.
///
/// Comments are accepted on read. Formatting and comments are not
/// preserved once a change is written.
#[derive(Debug, Clone)]
pub struct AppSettingsWriter {
    path: PathBuf,
    section: String,
}

impl AppSettingsWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_section(path, "ConnectionStrings")
    }

    pub fn with_section(path: impl Into<PathBuf>, section: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            section: section.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Map<String, Value>, SettingsError> {
        let content = read_optional(&self.path).map_err(|source| SettingsError::Read {
            path: self.path.clone(),
            source,
        })?;

        let content = match content {
            Some(content) if !content.trim().is_empty() => content,
            _ => return Ok(Map::new()),
        };

        // appsettings.json is commonly hand-edited with `//` and `/* */` comments
        let value: Value = serde_json::from_reader(StripComments::new(content.as_bytes()))
            .map_err(|source| SettingsError::Json {
                path: self.path.clone(),
                source,
            })?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(SettingsError::UnexpectedShape {
                path: self.path.clone(),
                location: "$".to_string(),
                expected: "an object",
            }),
        }
    }
}

impl ConnectionStringsWriter for AppSettingsWriter {
    fn add_connection_string(
        &self,
        key: &str,
        resource: &str,
        provider: ProviderVariant,
    ) -> Result<bool, SettingsError> {
        let mut document = self.read_document()?;

        let section = document
            .entry(self.section.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(section) = section else {
            return Err(SettingsError::UnexpectedShape {
                path: self.path.clone(),
                location: self.section.clone(),
                expected: "an object",
            });
        };

        if section.contains_key(key) {
            debug!(key, path = %self.path.display(), "connection string already present");
            return Ok(false);
        }
        section.insert(
            key.to_string(),
            Value::String(provider.default_connection_string(resource)),
        );

        let mut rendered = serde_json::to_string_pretty(&Value::Object(document)).map_err(
            |source| SettingsError::Json {
                path: self.path.clone(),
                source,
            },
        )?;
        rendered.push('\n');

        write_atomic(&self.path, rendered.as_bytes()).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!(key, %provider, path = %self.path.display(), "added connection string");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn provider_strings() {
        assert_eq!(ProviderVariant::File.use_method(), "UseSqlite");
        assert_eq!(ProviderVariant::Server.use_method(), "UseSqlServer");
        assert_eq!(
            ProviderVariant::File.default_connection_string("Blogs"),
            "Data Source=Blogs.db"
        );
        assert_eq!(
            ProviderVariant::Server.default_connection_string("Blogs"),
            "Server=(localdb)\\mssqllocaldb;Database=Blogs;Trusted_Connection=True;MultipleActiveResultSets=true"
        );
        assert_eq!("SQLite".parse::<ProviderVariant>(), Ok(ProviderVariant::File));
        assert!("postgres".parse::<ProviderVariant>().is_err());
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appsettings.json");
        let writer = AppSettingsWriter::new(&path);

        assert!(writer
            .add_connection_string("BlogContext", "BlogContext-1", ProviderVariant::File)
            .unwrap());
        assert_eq!(
            read_json(&path)["ConnectionStrings"]["BlogContext"],
            "Data Source=BlogContext-1.db"
        );
    }

    #[test]
    fn existing_key_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appsettings.json");
        let original = "{ \"ConnectionStrings\": { \"BlogContext\": \"custom\" } }";
        fs::write(&path, original).unwrap();

        let writer = AppSettingsWriter::new(&path);
        assert!(!writer
            .add_connection_string("BlogContext", "Other", ProviderVariant::Server)
            .unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn other_sections_keep_their_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appsettings.json");
        fs::write(
            &path,
            r#"{ "Logging": { "LogLevel": { "Default": "Information" } }, "AllowedHosts": "*" }"#,
        )
        .unwrap();

        AppSettingsWriter::new(&path)
            .add_connection_string("ShopContext", "Shop", ProviderVariant::Server)
            .unwrap();

        let document = read_json(&path);
        let keys: Vec<&String> = document.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["Logging", "AllowedHosts", "ConnectionStrings"]);
    }

    #[test]
    fn non_object_section_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appsettings.json");
        fs::write(&path, r#"{ "ConnectionStrings": "oops" }"#).unwrap();

        let err = AppSettingsWriter::new(&path)
            .add_connection_string("Ctx", "Ctx", ProviderVariant::File)
            .unwrap_err();
        assert!(matches!(err, SettingsError::UnexpectedShape { .. }));
    }

    #[test]
    fn commented_file_with_existing_key_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appsettings.json");
        let original = "{\n  // hand edited\n  \"ConnectionStrings\": { \"BlogContext\": \"custom\" }\n}\n";
        fs::write(&path, original).unwrap();

        let writer = AppSettingsWriter::new(&path);
        assert!(!writer
            .add_connection_string("BlogContext", "Blogs", ProviderVariant::File)
            .unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn commented_file_gains_new_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appsettings.json");
        fs::write(
            &path,
            "{\n  /* logging */\n  \"Logging\": { \"LogLevel\": { \"Default\": \"Warning\" } } // trailing\n}\n",
        )
        .unwrap();

        assert!(AppSettingsWriter::new(&path)
            .add_connection_string("ShopContext", "Shop", ProviderVariant::File)
            .unwrap());
        let document = read_json(&path);
        assert_eq!(document["Logging"]["LogLevel"]["Default"], "Warning");
        assert_eq!(
            document["ConnectionStrings"]["ShopContext"],
            "Data Source=Shop.db"
        );
    }
}
