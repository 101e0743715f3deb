//! Loading projects from disk: discovery, partial types, base chains.

use scaffold_patcher::symbols::{
    has_matching_member, is_collection_property_of, LoadError, LoaderOptions, ProjectLoader,
    TypeKind,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A small web app: models, a split data context, a minimal host and
/// build output that must be ignored.
fn setup_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    write(
        root,
        "Models/Blog.cs",
        "namespace Demo.Models;\n\npublic class Blog\n{\n    public int Id { get; set; }\n}\n",
    );
    write(
        root,
        "Data/BlogContext.cs",
        r#"using Microsoft.EntityFrameworkCore;

namespace Demo.Data
{
    public partial class BlogContext : DbContext
    {
        public BlogContext(DbContextOptions<BlogContext> options) : base(options) { }
    }
}
"#,
    );
    write(
        root,
        "Data/BlogContext.Sets.cs",
        r#"using Demo.Models;
using Microsoft.EntityFrameworkCore;

namespace Demo.Data
{
    public partial class BlogContext
    {
        public DbSet<Blog> Blogs { get; set; }
    }
}
"#,
    );
    write(
        root,
        "Program.cs",
        "var builder = WebApplication.CreateBuilder(args);\nvar app = builder.Build();\napp.Run();\n",
    );
    write(root, "obj/Debug/Generated.cs", "namespace Demo { public class Generated { } }\n");
    write(root, "bin/Copy.cs", "namespace Demo { public class Copied { } }\n");
    write(root, ".hidden/Secret.cs", "public class Secret { }\n");

    dir
}

#[test]
fn discovers_sources_and_skips_build_output() {
    let dir = setup_project();
    let project = ProjectLoader::default().load(dir.path()).unwrap();

    assert_eq!(project.root(), Some(dir.path()));
    assert_eq!(project.trees().len(), 4);
    assert!(project.find_type("Generated").is_err());
    assert!(project.find_type("Copied").is_err());
    assert!(project.find_type("Secret").is_err());
}

#[test]
fn partial_declarations_share_one_symbol() {
    let dir = setup_project();
    let project = ProjectLoader::default().load(dir.path()).unwrap();

    let context = project.find_type("Demo.Data.BlogContext").unwrap();
    assert_eq!(context.locations.len(), 2);
    assert!(context.has_member_named("Blogs"));
    assert!(context.has_member_named(".ctor"));

    let base = context.base_type().unwrap();
    assert_eq!(base.full_name(), "Microsoft.EntityFrameworkCore.DbContext");
    assert_eq!(base.assembly.as_deref(), Some("Microsoft.EntityFrameworkCore"));

    assert!(has_matching_member(
        &context,
        is_collection_property_of("DbSet", "Demo.Models.Blog")
    ));
}

#[test]
fn file_scoped_namespace_applies_to_the_file() {
    let dir = setup_project();
    let project = ProjectLoader::default().load(dir.path()).unwrap();

    let blog = project.find_type("Blog").unwrap();
    assert_eq!(blog.namespace.as_deref(), Some("Demo.Models"));
    let location = blog.primary_location().unwrap();
    assert!(location.tree.path().unwrap().ends_with("Models/Blog.cs"));
}

#[test]
fn top_level_statements_become_program() {
    let dir = setup_project();
    let project = ProjectLoader::default().load(dir.path()).unwrap();

    let program = project.program().unwrap();
    assert_eq!(program.kind, TypeKind::TopLevelProgram);
    assert!(program
        .primary_location()
        .unwrap()
        .tree
        .path()
        .unwrap()
        .ends_with("Program.cs"));
}

#[test]
fn unknown_type_suggests_close_names() {
    let dir = setup_project();
    let project = ProjectLoader::default().load(dir.path()).unwrap();

    match project.find_type("BlogContxt") {
        Err(LoadError::UnknownType { suggestions, .. }) => {
            assert_eq!(suggestions.first().map(String::as_str), Some("Demo.Data.BlogContext"));
        }
        other => panic!("expected UnknownType, got {other:?}"),
    }
}

#[test]
fn excluded_directories_are_configurable() {
    let dir = setup_project();
    let options = LoaderOptions {
        exclude_dirs: vec!["bin".to_string()],
        ..LoaderOptions::default()
    };
    let project = ProjectLoader::new(options).load(dir.path()).unwrap();
    assert!(project.find_type("Demo.Generated").is_ok());
    assert!(project.find_type("Demo.Copied").is_err());
}

#[test]
fn missing_directory_is_an_error() {
    let dir = TempDir::new().unwrap();
    let result = ProjectLoader::default().load(dir.path().join("nope"));
    assert!(matches!(result, Err(LoadError::NotADirectory(_))));
}
