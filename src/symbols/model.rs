use crate::cs::SourceTree;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Where a symbol is declared: a tree and the span of its name.
///
/// For the synthesized type that owns top-level statements the span
/// covers the whole compilation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub tree: SourceTree,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Record,
    /// Compiler-synthesized owner of top-level statements
    TopLevelProgram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Property,
    Field,
    Method,
    Event,
    Constructor,
    NestedType,
}

/// A reference to a type as seen from a member declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub name: String,
    /// `None` for types that could not be resolved, in which case `name`
    /// holds the text as written (qualifier included)
    pub namespace: Option<String>,
    pub assembly: Option<String>,
    pub type_arguments: Vec<TypeRef>,
    pub arity: usize,
    pub nullable: bool,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            assembly: None,
            type_arguments: Vec::new(),
            arity: 0,
            nullable: false,
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn in_assembly(mut self, assembly: impl Into<String>) -> Self {
        self.assembly = Some(assembly.into());
        self
    }

    pub fn with_arguments(mut self, arguments: Vec<TypeRef>) -> Self {
        self.arity = arguments.len();
        self.type_arguments = arguments;
        self
    }

    pub fn is_generic(&self) -> bool {
        self.arity > 0
    }

    pub fn is_unbound_generic(&self) -> bool {
        self.arity > 0 && self.type_arguments.is_empty()
    }

    /// Namespace-qualified name without type arguments.
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => format!("{ns}.{}", self.name),
            _ => self.name.clone(),
        }
    }

    /// Fully qualified display form, e.g. `Microsoft.EntityFrameworkCore.DbSet<Demo.Blog>`.
    pub fn display_string(&self) -> String {
        let mut out = self.full_name();
        if self.is_generic() {
            out.push('<');
            if self.type_arguments.is_empty() {
                out.push_str(&",".repeat(self.arity - 1));
            } else {
                let args: Vec<String> = self
                    .type_arguments
                    .iter()
                    .map(TypeRef::display_string)
                    .collect();
                out.push_str(&args.join(", "));
            }
            out.push('>');
        }
        if self.nullable {
            out.push('?');
        }
        out
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSymbol {
    pub name: String,
    pub kind: MemberKind,
    /// Declared type for properties, fields and events; return type for methods
    pub type_ref: Option<TypeRef>,
}

impl MemberSymbol {
    pub fn property(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Property,
            type_ref: Some(type_ref),
        }
    }

    pub fn method(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Method,
            type_ref: None,
        }
    }
}

/// A declared type: identity, members, base type and declaring locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSymbol {
    pub name: String,
    pub namespace: Option<String>,
    pub assembly: Option<String>,
    pub kind: TypeKind,
    pub members: Vec<MemberSymbol>,
    pub base_type: Option<Arc<TypeSymbol>>,
    pub locations: Vec<SourceLocation>,
}

impl TypeSymbol {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            assembly: None,
            kind,
            members: Vec::new(),
            base_type: None,
            locations: Vec::new(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn in_assembly(mut self, assembly: impl Into<String>) -> Self {
        self.assembly = Some(assembly.into());
        self
    }

    pub fn with_member(mut self, member: MemberSymbol) -> Self {
        self.members.push(member);
        self
    }

    pub fn with_base(mut self, base: Arc<TypeSymbol>) -> Self {
        self.base_type = Some(base);
        self
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.locations.push(location);
        self
    }

    /// Namespace-qualified name, as rendered into generated code.
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => format!("{ns}.{}", self.name),
            _ => self.name.clone(),
        }
    }

    pub fn base_type(&self) -> Option<&TypeSymbol> {
        self.base_type.as_deref()
    }

    /// Direct members with the given name; inherited members are not included.
    pub fn members_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MemberSymbol> + 'a {
        self.members.iter().filter(move |m| m.name == name)
    }

    pub fn has_member_named(&self, name: &str) -> bool {
        self.members_named(name).next().is_some()
    }

    pub fn properties(&self) -> impl Iterator<Item = &MemberSymbol> {
        self.members
            .iter()
            .filter(|m| m.kind == MemberKind::Property)
    }

    /// First location whose tree is available, the one edits are made against.
    pub fn primary_location(&self) -> Option<&SourceLocation> {
        self.locations.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_string_is_fully_qualified() {
        let dbset = TypeRef::named("DbSet")
            .in_namespace("Microsoft.EntityFrameworkCore")
            .with_arguments(vec![TypeRef::named("Blog").in_namespace("Demo.Models")]);

        assert_eq!(
            dbset.display_string(),
            "Microsoft.EntityFrameworkCore.DbSet<Demo.Models.Blog>"
        );
        assert!(dbset.is_generic());
        assert!(!dbset.is_unbound_generic());
    }

    #[test]
    fn unbound_display() {
        let mut unbound = TypeRef::named("Dictionary").in_namespace("System.Collections.Generic");
        unbound.arity = 2;
        assert_eq!(
            unbound.display_string(),
            "System.Collections.Generic.Dictionary<,>"
        );
        assert!(unbound.is_unbound_generic());
    }

    #[test]
    fn members_named_only_sees_direct_members() {
        let base = Arc::new(TypeSymbol::class("Base").with_member(MemberSymbol::method("Save")));
        let derived = TypeSymbol::class("Derived")
            .with_member(MemberSymbol::method("Load"))
            .with_base(base);

        assert!(derived.has_member_named("Load"));
        assert!(!derived.has_member_named("Save"));
        assert_eq!(derived.base_type().map(|b| b.name.as_str()), Some("Base"));
    }

    #[test]
    fn full_name_without_namespace() {
        assert_eq!(TypeSymbol::class("Program").full_name(), "Program");
        assert_eq!(
            TypeSymbol::class("Blog").in_namespace("Demo").full_name(),
            "Demo.Blog"
        );
    }
}
