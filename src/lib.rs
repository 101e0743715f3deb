//! Scaffold Patcher: structural edits for C# data contexts and
//! ASP.NET Core composition roots.
//!
//! Built on byte-span replacement over tree-sitter C# trees. The patcher
//! locates an anchor (the last member of a type, the end of an init
//! method, a top-level statement), synthesizes text for the new code,
//! checks that it parses on its own and splices it into a copy of the
//! file. Everything outside the inserted text stays byte-identical.
//!
//! # Architecture
//!
//! - [`cs`]: parsing, queries and node/line helpers over [`SourceTree`]
//! - [`symbols`]: type symbols built from source, with base-type chains
//! - [`host`]: classic vs. minimal composition-root detection
//! - [`patcher`]: the edit operations, returning an [`EditResult`]
//! - [`settings`], [`template`]: connection-string and template collaborators
//!
//! # Safety
//!
//! - Edits verify expected before-text before applying
//! - Synthesized code is rejected if it would add syntax errors
//! - Atomic file writes (tempfile + fsync + rename)
//! - Project boundary enforcement
//! - Idempotent operations
//!
//! # Example
//!
//! ```no_run
//! use scaffold_patcher::settings::AppSettingsWriter;
//! use scaffold_patcher::symbols::ProjectLoader;
//! use scaffold_patcher::template::HandlebarsTemplating;
//! use scaffold_patcher::DbContextEditor;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let project = ProjectLoader::default().load("./MyApp")?;
//! let settings = AppSettingsWriter::new("./MyApp/appsettings.json");
//! let templating = HandlebarsTemplating::new()?;
//! let editor = DbContextEditor::new(&settings, &templating);
//!
//! let context = project.find_type("BlogContext")?;
//! let blog = project.find_type("Blog")?;
//! match editor.add_collection_member(&context, &blog)? {
//!     result if result.edited => println!("added DbSet<{}>", blog.full_name()),
//!     _ => println!("nothing to do"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cs;
pub mod edit;
pub mod host;
pub mod patcher;
pub mod pool;
pub mod safety;
pub mod settings;
pub mod symbols;
pub mod template;

// Re-exports
pub use config::{load_from_path, load_from_str, ConfigError, Conventions, PatcherConfig};
pub use cs::{SourceTree, TreeSitterError};
pub use edit::{EditError, EditResult, EditVerification, TextEdit};
pub use host::{Detection, HostDetector, HostShape};
pub use patcher::{DbContextEditor, NewContextModel, PatchError, RegistrationRequest};
pub use safety::{ProjectGuard, SafetyError};
pub use settings::{AppSettingsWriter, ConnectionStringsWriter, ProviderVariant, SettingsError};
pub use symbols::{LoadError, Project, ProjectLoader, TypeSymbol};
pub use template::{HandlebarsTemplating, TemplateError, Templating};
