//! Semantic model: type symbols, their members and base types, built from
//! the project's syntax trees.

pub mod loader;
pub mod model;
pub mod query;
pub mod typename;

pub use loader::{builtin_external_types, ExternalType, LoadError, LoaderOptions, Project, ProjectLoader};
pub use model::{MemberKind, MemberSymbol, SourceLocation, TypeKind, TypeRef, TypeSymbol};
pub use query::{find_property_of_type, has_matching_member, is_collection_property_of, self_and_base_types};
pub use typename::TypeName;
