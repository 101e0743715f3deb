//! Builds type symbols for a project straight from its syntax trees.
//!
//! This is name resolution only: namespaces, usings (file, namespace,
//! `global` and implicit) and a registry of framework types stand in for
//! referenced assemblies. It never type-checks.

use crate::cs::nodes::{
    field_or_kind, find_descendant, is_type_declaration, members, named_children, using_target,
};
use crate::cs::{SourceTree, TreeSitterError};
use crate::symbols::model::{MemberKind, MemberSymbol, SourceLocation, TypeKind, TypeRef, TypeSymbol};
use crate::symbols::typename::TypeName;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use tree_sitter::Node;
use walkdir::WalkDir;

/// A type that lives in a referenced assembly rather than in source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExternalType {
    pub name: String,
    pub namespace: String,
    pub assembly: String,
    #[serde(default)]
    pub arity: usize,
}

impl ExternalType {
    fn new(name: &str, namespace: &str, assembly: &str, arity: usize) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            assembly: assembly.to_string(),
            arity,
        }
    }

    fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

/// Framework types the patcher needs to recognize by identity.
pub fn builtin_external_types() -> Vec<ExternalType> {
    const EF_CORE: &str = "Microsoft.EntityFrameworkCore";
    const CONFIG_NS: &str = "Microsoft.Extensions.Configuration";
    const CONFIG_ASM: &str = "Microsoft.Extensions.Configuration.Abstractions";
    const DI_NS: &str = "Microsoft.Extensions.DependencyInjection";
    const DI_ASM: &str = "Microsoft.Extensions.DependencyInjection.Abstractions";

    vec![
        ExternalType::new("DbContext", EF_CORE, EF_CORE, 0),
        ExternalType::new("DbSet", EF_CORE, EF_CORE, 1),
        ExternalType::new("DbContextOptions", EF_CORE, EF_CORE, 0),
        ExternalType::new("DbContextOptions", EF_CORE, EF_CORE, 1),
        ExternalType::new("IConfiguration", CONFIG_NS, CONFIG_ASM, 0),
        ExternalType::new("IConfigurationRoot", CONFIG_NS, CONFIG_ASM, 0),
        ExternalType::new("IServiceCollection", DI_NS, DI_ASM, 0),
        ExternalType::new("WebApplication", "Microsoft.AspNetCore.Builder", "Microsoft.AspNetCore", 0),
        ExternalType::new(
            "IWebHostEnvironment",
            "Microsoft.AspNetCore.Hosting",
            "Microsoft.AspNetCore.Hosting.Abstractions",
            0,
        ),
    ]
}

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Namespaces visible in every file, as with SDK implicit usings
    pub implicit_usings: Vec<String>,
    pub external_types: Vec<ExternalType>,
    /// Directory names never descended into
    pub exclude_dirs: Vec<String>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            implicit_usings: Vec::new(),
            external_types: builtin_external_types(),
            exclude_dirs: vec!["bin".to_string(), "obj".to_string()],
        }
    }
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: TreeSitterError,
    },

    #[error("failed to walk project directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("project path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("type '{name}' not found in project{}", format_suggestions(.suggestions))]
    UnknownType {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("type name '{name}' is ambiguous: {}", .candidates.join(", "))]
    AmbiguousType {
        name: String,
        candidates: Vec<String>,
    },
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean {}?)", suggestions.join(", "))
    }
}

/// A loaded project: its parsed files and the types declared in them.
#[derive(Debug, Clone)]
pub struct Project {
    root: Option<PathBuf>,
    trees: Vec<SourceTree>,
    types: Vec<Arc<TypeSymbol>>,
}

impl Project {
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn trees(&self) -> &[SourceTree] {
        &self.trees
    }

    pub fn types(&self) -> &[Arc<TypeSymbol>] {
        &self.types
    }

    /// Look a type up by full name, or by simple name when that is unique.
    pub fn find_type(&self, name: &str) -> Result<Arc<TypeSymbol>, LoadError> {
        if let Some(found) = self.types.iter().find(|t| t.full_name() == name) {
            return Ok(Arc::clone(found));
        }

        let by_simple: Vec<&Arc<TypeSymbol>> =
            self.types.iter().filter(|t| t.name == name).collect();
        match by_simple.as_slice() {
            [single] => Ok(Arc::clone(single)),
            [] => Err(LoadError::UnknownType {
                name: name.to_string(),
                suggestions: self.suggest(name),
            }),
            many => Err(LoadError::AmbiguousType {
                name: name.to_string(),
                candidates: many.iter().map(|t| t.full_name()).collect(),
            }),
        }
    }

    /// The synthesized owner of top-level statements, if any file has them.
    pub fn program(&self) -> Option<Arc<TypeSymbol>> {
        self.types
            .iter()
            .find(|t| t.kind == TypeKind::TopLevelProgram)
            .cloned()
    }

    fn suggest(&self, name: &str) -> Vec<String> {
        let mut scored: Vec<(f64, String)> = self
            .types
            .iter()
            .map(|t| (strsim::jaro_winkler(name, &t.name), t.full_name()))
            .filter(|(score, _)| *score >= 0.85)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().take(3).map(|(_, name)| name).collect()
    }
}

pub struct ProjectLoader {
    options: LoaderOptions,
}

impl Default for ProjectLoader {
    fn default() -> Self {
        Self::new(LoaderOptions::default())
    }
}

impl ProjectLoader {
    pub fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Discover every `.cs` file under `project_dir` and load them.
    pub fn load(&self, project_dir: impl AsRef<Path>) -> Result<Project, LoadError> {
        let project_dir = project_dir.as_ref();
        let files = self.discover(project_dir)?;
        self.load_files(project_dir, &files)
    }

    /// Load an explicit list of files belonging to `project_dir`.
    pub fn load_files(&self, project_dir: &Path, files: &[PathBuf]) -> Result<Project, LoadError> {
        let mut trees = Vec::with_capacity(files.len());
        for file in files {
            let path = if file.is_absolute() {
                file.clone()
            } else {
                project_dir.join(file)
            };
            let tree = SourceTree::from_file(&path)
                .map_err(|source| LoadError::Parse { path, source })?;
            trees.push(tree);
        }

        let mut project = self.load_sources(trees);
        project.root = Some(project_dir.to_path_buf());
        Ok(project)
    }

    /// Build symbols for trees that are already parsed.
    pub fn load_sources(&self, trees: Vec<SourceTree>) -> Project {
        let mut collector = Collector::default();
        for tree in &trees {
            collector.collect_tree(tree);
        }

        let resolver = Resolver::new(&self.options, &collector);
        let types = resolver.build_all();
        debug!(files = trees.len(), types = types.len(), "loaded project symbols");

        Project {
            root: None,
            trees,
            types,
        }
    }

    fn discover(&self, project_dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
        if !project_dir.is_dir() {
            return Err(LoadError::NotADirectory(project_dir.to_path_buf()));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(project_dir).into_iter().filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !name.starts_with('.') && !self.options.exclude_dirs.iter().any(|d| *d == name)
        });

        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some("cs")
            {
                files.push(entry.path().to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }
}

/// Names visible where a declaration was written.
#[derive(Debug, Default)]
struct Scope {
    namespace: Option<String>,
    usings: Vec<String>,
}

#[derive(Debug)]
struct RawMember {
    name: String,
    kind: MemberKind,
    type_text: Option<String>,
    scope: Arc<Scope>,
}

#[derive(Debug)]
struct RawType {
    name: String,
    namespace: Option<String>,
    arity: usize,
    kind: TypeKind,
    base: Option<(String, Arc<Scope>)>,
    members: Vec<RawMember>,
    locations: Vec<SourceLocation>,
}

type TypeKey = (String, usize);

#[derive(Default)]
struct Collector {
    types: Vec<RawType>,
    index: HashMap<TypeKey, usize>,
    global_usings: Vec<String>,
}

impl Collector {
    fn collect_tree(&mut self, tree: &SourceTree) {
        let root = tree.root_node();
        let mut file_usings = Vec::new();
        let mut file_namespace: Option<String> = None;
        let mut has_top_level_statements = false;

        for child in named_children(root) {
            match child.kind() {
                "using_directive" => self.record_using(tree, child, &mut file_usings),
                "global_statement" => has_top_level_statements = true,
                "file_scoped_namespace_declaration" => {
                    let name = child
                        .child_by_field_name("name")
                        .map(|n| tree.node_text(n).to_string());
                    file_namespace = name.clone();
                    // Some grammar versions nest the members inside the declaration.
                    self.collect_members_of(tree, child, name.as_deref(), &file_usings);
                }
                "namespace_declaration" => {
                    self.collect_namespace(tree, child, file_namespace.as_deref(), &file_usings)
                }
                _ if is_type_declaration(child) => {
                    let scope = Arc::new(Scope {
                        namespace: file_namespace.clone(),
                        usings: file_usings.clone(),
                    });
                    self.collect_type(tree, child, scope);
                }
                _ => {}
            }
        }

        if has_top_level_statements {
            let location = SourceLocation {
                tree: tree.clone(),
                span: root.byte_range(),
            };
            self.add_top_level_program(location);
        }
    }

    fn record_using(&mut self, tree: &SourceTree, node: Node<'_>, usings: &mut Vec<String>) {
        if let Some(target) = using_target(tree.node_text(node)) {
            if target.global {
                self.global_usings.push(target.namespace);
            } else {
                usings.push(target.namespace);
            }
        }
    }

    fn collect_namespace(
        &mut self,
        tree: &SourceTree,
        node: Node<'_>,
        outer: Option<&str>,
        usings: &[String],
    ) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let name = tree.node_text(name);
        let full = match outer {
            Some(outer) => format!("{outer}.{name}"),
            None => name.to_string(),
        };
        if let Some(body) = field_or_kind(node, "body", "declaration_list") {
            self.collect_members_of(tree, body, Some(&full), usings);
        }
    }

    fn collect_members_of(
        &mut self,
        tree: &SourceTree,
        container: Node<'_>,
        namespace: Option<&str>,
        usings: &[String],
    ) {
        let mut local_usings = usings.to_vec();
        for child in named_children(container) {
            match child.kind() {
                "using_directive" => self.record_using(tree, child, &mut local_usings),
                "namespace_declaration" => {
                    self.collect_namespace(tree, child, namespace, &local_usings)
                }
                _ if is_type_declaration(child) => {
                    let scope = Arc::new(Scope {
                        namespace: namespace.map(str::to_string),
                        usings: local_usings.clone(),
                    });
                    self.collect_type(tree, child, scope);
                }
                _ => {}
            }
        }
    }

    fn collect_type(&mut self, tree: &SourceTree, node: Node<'_>, scope: Arc<Scope>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = tree.node_text(name_node).to_string();
        let kind = match node.kind() {
            "struct_declaration" => TypeKind::Struct,
            "interface_declaration" => TypeKind::Interface,
            "record_declaration" | "record_struct_declaration" => TypeKind::Record,
            _ => TypeKind::Class,
        };
        let arity = find_child_of_kind(node, "type_parameter_list")
            .map(|list| {
                named_children(list)
                    .iter()
                    .filter(|p| p.kind() == "type_parameter")
                    .count()
            })
            .unwrap_or(0);
        let base = find_child_of_kind(node, "base_list")
            .and_then(|list| named_children(list).into_iter().next())
            .map(|first| {
                let type_node = if first.kind() == "primary_constructor_base_type" {
                    named_children(first).into_iter().next().unwrap_or(first)
                } else {
                    first
                };
                (tree.node_text(type_node).to_string(), Arc::clone(&scope))
            });

        let mut raw_members = Vec::new();
        if let Some(body) = field_or_kind(node, "body", "declaration_list") {
            for member in members(body) {
                collect_member(tree, member, &scope, &mut raw_members);
            }
        }

        let location = SourceLocation {
            tree: tree.clone(),
            span: name_node.byte_range(),
        };
        let key = (qualify(scope.namespace.as_deref(), &name), arity);

        match self.index.get(&key) {
            Some(&idx) => {
                let existing = &mut self.types[idx];
                existing.members.extend(raw_members);
                existing.locations.push(location);
                if existing.base.is_none() {
                    existing.base = base;
                }
            }
            None => {
                self.index.insert(key, self.types.len());
                self.types.push(RawType {
                    name,
                    namespace: scope.namespace.clone(),
                    arity,
                    kind,
                    base,
                    members: raw_members,
                    locations: vec![location],
                });
            }
        }
    }

    fn add_top_level_program(&mut self, location: SourceLocation) {
        let key = ("Program".to_string(), 0);
        match self.index.get(&key) {
            Some(&idx) => {
                let existing = &mut self.types[idx];
                existing.kind = TypeKind::TopLevelProgram;
                existing.locations.insert(0, location);
            }
            None => {
                self.index.insert(key, self.types.len());
                self.types.push(RawType {
                    name: "Program".to_string(),
                    namespace: None,
                    arity: 0,
                    kind: TypeKind::TopLevelProgram,
                    base: None,
                    members: Vec::new(),
                    locations: vec![location],
                });
            }
        }
    }
}

fn find_child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    named_children(node).into_iter().find(|c| c.kind() == kind)
}

fn collect_member(tree: &SourceTree, node: Node<'_>, scope: &Arc<Scope>, out: &mut Vec<RawMember>) {
    let text_of = |n: Node<'_>| tree.node_text(n).to_string();
    let mut push = |name: String, kind: MemberKind, type_text: Option<String>| {
        out.push(RawMember {
            name,
            kind,
            type_text,
            scope: Arc::clone(scope),
        })
    };

    match node.kind() {
        "property_declaration" | "event_declaration" => {
            let kind = if node.kind() == "property_declaration" {
                MemberKind::Property
            } else {
                MemberKind::Event
            };
            if let Some(name) = node.child_by_field_name("name") {
                let type_text = node.child_by_field_name("type").map(text_of);
                push(text_of(name), kind, type_text);
            }
        }
        "field_declaration" | "event_field_declaration" => {
            let kind = if node.kind() == "field_declaration" {
                MemberKind::Field
            } else {
                MemberKind::Event
            };
            let Some(declaration) = find_descendant(node, "variable_declaration") else {
                return;
            };
            let type_text = declaration.child_by_field_name("type").map(text_of);
            for declarator in named_children(declaration)
                .into_iter()
                .filter(|c| c.kind() == "variable_declarator")
            {
                if let Some(name) = field_or_kind(declarator, "name", "identifier") {
                    push(text_of(name), kind, type_text.clone());
                }
            }
        }
        "method_declaration" => {
            if let Some(name) = node.child_by_field_name("name") {
                let returns = node
                    .child_by_field_name("returns")
                    .or_else(|| node.child_by_field_name("type"))
                    .map(text_of);
                push(text_of(name), MemberKind::Method, returns);
            }
        }
        "constructor_declaration" => push(".ctor".to_string(), MemberKind::Constructor, None),
        "enum_declaration" | "delegate_declaration" => {
            if let Some(name) = node.child_by_field_name("name") {
                push(text_of(name), MemberKind::NestedType, None);
            }
        }
        _ if is_type_declaration(node) => {
            if let Some(name) = node.child_by_field_name("name") {
                push(text_of(name), MemberKind::NestedType, None);
            }
        }
        _ => {}
    }
}

fn qualify(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}.{name}"),
        _ => name.to_string(),
    }
}

#[derive(Debug, Clone)]
enum Target {
    Source(usize),
    External(ExternalType),
}

struct Resolver<'a> {
    collector: &'a Collector,
    external: HashMap<TypeKey, ExternalType>,
    shared_usings: Vec<String>,
}

impl<'a> Resolver<'a> {
    fn new(options: &LoaderOptions, collector: &'a Collector) -> Self {
        let external = options
            .external_types
            .iter()
            .map(|ext| ((ext.full_name(), ext.arity), ext.clone()))
            .collect();
        let mut shared_usings = collector.global_usings.clone();
        shared_usings.extend(options.implicit_usings.iter().cloned());
        Self {
            collector,
            external,
            shared_usings,
        }
    }

    fn build_all(&self) -> Vec<Arc<TypeSymbol>> {
        let mut memo: HashMap<usize, Arc<TypeSymbol>> = HashMap::new();
        let mut visiting = HashSet::new();
        (0..self.collector.types.len())
            .map(|idx| self.build(idx, &mut memo, &mut visiting))
            .collect()
    }

    fn build(
        &self,
        idx: usize,
        memo: &mut HashMap<usize, Arc<TypeSymbol>>,
        visiting: &mut HashSet<usize>,
    ) -> Arc<TypeSymbol> {
        if let Some(done) = memo.get(&idx) {
            return Arc::clone(done);
        }
        visiting.insert(idx);

        let raw = &self.collector.types[idx];
        let base_type = match raw.kind {
            TypeKind::Class | TypeKind::Record => raw
                .base
                .as_ref()
                .and_then(|(text, scope)| self.resolve_base(text, scope, memo, visiting)),
            _ => None,
        };

        let members = raw
            .members
            .iter()
            .map(|m| MemberSymbol {
                name: m.name.clone(),
                kind: m.kind,
                type_ref: m.type_text.as_deref().map(|t| self.type_ref(t, &m.scope)),
            })
            .collect();

        let symbol = Arc::new(TypeSymbol {
            name: raw.name.clone(),
            namespace: raw.namespace.clone(),
            assembly: None,
            kind: raw.kind,
            members,
            base_type,
            locations: raw.locations.clone(),
        });

        visiting.remove(&idx);
        memo.insert(idx, Arc::clone(&symbol));
        symbol
    }

    fn resolve_base(
        &self,
        text: &str,
        scope: &Scope,
        memo: &mut HashMap<usize, Arc<TypeSymbol>>,
        visiting: &mut HashSet<usize>,
    ) -> Option<Arc<TypeSymbol>> {
        let written = TypeName::parse(text)?;
        match self.lookup(&written, scope)? {
            Target::Source(idx) => {
                let kind = self.collector.types[idx].kind;
                if visiting.contains(&idx) || !matches!(kind, TypeKind::Class | TypeKind::Record) {
                    return None;
                }
                Some(self.build(idx, memo, visiting))
            }
            Target::External(ext) => Some(Arc::new(
                TypeSymbol::class(ext.name)
                    .in_namespace(ext.namespace)
                    .in_assembly(ext.assembly),
            )),
        }
    }

    fn type_ref(&self, text: &str, scope: &Scope) -> TypeRef {
        match TypeName::parse(text) {
            Some(written) if !written.suffix.contains('[') => self.type_ref_from(&written, scope),
            _ => TypeRef::named(text.trim()),
        }
    }

    fn type_ref_from(&self, written: &TypeName, scope: &Scope) -> TypeRef {
        let type_arguments = written
            .arguments
            .iter()
            .map(|arg| self.type_ref_from(arg, scope))
            .collect();

        let (name, namespace, assembly) = match self.lookup(written, scope) {
            Some(Target::Source(idx)) => {
                let raw = &self.collector.types[idx];
                (raw.name.clone(), raw.namespace.clone(), None)
            }
            Some(Target::External(ext)) => (ext.name, Some(ext.namespace), Some(ext.assembly)),
            None => (written.dotted(), None, None),
        };

        TypeRef {
            name,
            namespace,
            assembly,
            type_arguments,
            arity: written.arity,
            nullable: written.suffix.ends_with('?'),
        }
    }

    /// C# lookup order, simplified: enclosing namespaces innermost first,
    /// then the global namespace, then imported namespaces.
    fn lookup(&self, written: &TypeName, scope: &Scope) -> Option<Target> {
        let dotted = written.dotted();
        let mut prefixes: Vec<String> = Vec::new();
        if let Some(ns) = &scope.namespace {
            let parts: Vec<&str> = ns.split('.').collect();
            for len in (1..=parts.len()).rev() {
                prefixes.push(parts[..len].join("."));
            }
        }
        prefixes.push(String::new());
        if written.qualifier().is_none() {
            prefixes.extend(scope.usings.iter().cloned());
            prefixes.extend(self.shared_usings.iter().cloned());
        }

        prefixes.iter().find_map(|prefix| {
            let key = (qualify(Some(prefix), &dotted), written.arity);
            if let Some(&idx) = self.collector.index.get(&key) {
                return Some(Target::Source(idx));
            }
            self.external.get(&key).cloned().map(Target::External)
        })
    }
}
