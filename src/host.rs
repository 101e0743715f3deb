//! Composition-root shape detection.
//!
//! A host is either a class with an initialization method taking the
//! service collection (classic) or a file of top-level statements
//! (minimal). Detection is best effort: method and parameter names are
//! compared textually and minimal anchors are found by substring.

use crate::config::Conventions;
use crate::cs::nodes::{enclosing_declaration, field_or_kind, line_indent, members, named_children};
use crate::cs::SourceTree;
use crate::symbols::{find_property_of_type, TypeName, TypeSymbol};
use std::ops::Range;
use tracing::{debug, warn};
use tree_sitter::Node;

/// Where a classic registration goes: the end of the init method's body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodAnchor {
    /// Byte offset of the body's `{`
    pub body_open: usize,
    /// Byte offset of the body's `}`
    pub body_close: usize,
    pub has_statements: bool,
    /// Name of the service-collection parameter
    pub services: String,
    /// Name of the configuration property
    pub configuration: String,
}

/// Where a minimal registration goes: right after one top-level statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementAnchor {
    pub anchor: Range<usize>,
    /// Indentation of the first top-level member
    pub member_indent: String,
    /// Variable holding the application builder
    pub receiver: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostShape {
    Classic(MethodAnchor),
    Minimal(StatementAnchor),
}

/// A successful detection: the tree the anchor refers to and the shape.
#[derive(Debug, Clone)]
pub struct Detection {
    pub tree: SourceTree,
    pub shape: HostShape,
}

pub struct HostDetector<'a> {
    conventions: &'a Conventions,
}

impl<'a> HostDetector<'a> {
    pub fn new(conventions: &'a Conventions) -> Self {
        Self { conventions }
    }

    /// Classify `host`. `None` means no usable anchor; that is not an error.
    pub fn detect(&self, host: &TypeSymbol) -> Option<Detection> {
        let Some(location) = host.primary_location() else {
            debug!(host = %host.full_name(), "host has no source location");
            return None;
        };
        let tree = &location.tree;
        let declaring = enclosing_declaration(tree.root_node(), location.span.clone())?;

        let init_method = self.find_init_method(tree, declaring);
        let configuration = find_property_of_type(
            host,
            &self.conventions.configuration_type.assembly,
            &self.conventions.configuration_type.namespace,
            &self.conventions.configuration_type.name,
        );

        let shape = match (init_method, configuration) {
            (Some(method), Some(configuration)) => {
                let anchor = self.classic_anchor(tree, method, &configuration.name)?;
                debug!(host = %host.full_name(), services = %anchor.services, "classic host");
                HostShape::Classic(anchor)
            }
            _ if declaring.kind() == "compilation_unit" => {
                let anchor = self.minimal_anchor(tree, declaring)?;
                debug!(host = %host.full_name(), receiver = %anchor.receiver, "minimal host");
                HostShape::Minimal(anchor)
            }
            _ => {
                debug!(host = %host.full_name(), "host is neither classic nor minimal");
                return None;
            }
        };

        Some(Detection {
            tree: tree.clone(),
            shape,
        })
    }

    fn find_init_method<'t>(&self, tree: &SourceTree, declaring: Node<'t>) -> Option<Node<'t>> {
        let body = field_or_kind(declaring, "body", "declaration_list")?;
        members(body).into_iter().find(|member| {
            member.kind() == "method_declaration"
                && member
                    .child_by_field_name("name")
                    .is_some_and(|name| tree.node_text(name) == self.conventions.init_method)
        })
    }

    fn classic_anchor(
        &self,
        tree: &SourceTree,
        method: Node<'_>,
        configuration: &str,
    ) -> Option<MethodAnchor> {
        let parameters = field_or_kind(method, "parameters", "parameter_list")?;
        let services = named_children(parameters)
            .into_iter()
            .filter(|p| p.kind() == "parameter")
            .find(|p| {
                p.child_by_field_name("type")
                    .and_then(|t| TypeName::parse(tree.node_text(t)))
                    .is_some_and(|t| {
                        t.name() == self.conventions.services_type
                            && t.arity == 0
                            && t.suffix.is_empty()
                    })
            })
            .and_then(|p| p.child_by_field_name("name"))
            .map(|name| tree.node_text(name).to_string());
        let Some(services) = services else {
            debug!(method = %self.conventions.init_method, "no service collection parameter");
            return None;
        };

        let Some(body) = method
            .child_by_field_name("body")
            .filter(|body| body.kind() == "block")
        else {
            debug!(method = %self.conventions.init_method, "init method has no block body");
            return None;
        };

        let has_statements = named_children(body).iter().any(|n| n.kind() != "comment");
        Some(MethodAnchor {
            body_open: body.start_byte(),
            body_close: body.end_byte() - 1,
            has_statements,
            services,
            configuration: configuration.to_string(),
        })
    }

    fn minimal_anchor(&self, tree: &SourceTree, unit: Node<'_>) -> Option<StatementAnchor> {
        let top_level: Vec<Node<'_>> = members(unit)
            .into_iter()
            .filter(|m| {
                !matches!(
                    m.kind(),
                    "using_directive" | "extern_alias_directive" | "global_attribute"
                )
            })
            .collect();
        let first = top_level.first()?;
        let text_of = |node: Node<'_>| tree.node_text(node);

        let anchor = top_level
            .iter()
            .rev()
            .find(|m| text_of(**m).contains(&self.conventions.page_registration_sentinel))
            .or_else(|| {
                top_level
                    .iter()
                    .find(|m| text_of(**m).contains(&self.conventions.create_builder_sentinel))
            });
        let Some(anchor) = anchor else {
            debug!("no minimal-host anchor statement");
            return None;
        };

        let receiver = top_level
            .iter()
            .find(|m| text_of(**m).contains(&self.conventions.builder_sentinel))
            .and_then(|m| builder_variable(tree, *m));
        let receiver = match receiver {
            Some(receiver) => receiver,
            None => {
                warn!(
                    fallback = %self.conventions.fallback_receiver,
                    "could not find the builder variable, using fallback"
                );
                self.conventions.fallback_receiver.clone()
            }
        };

        Some(StatementAnchor {
            anchor: anchor.byte_range(),
            member_indent: line_indent(tree.text(), first.start_byte()).to_string(),
            receiver,
        })
    }
}

/// Name of the first variable declared by a top-level statement.
fn builder_variable(tree: &SourceTree, member: Node<'_>) -> Option<String> {
    let statement = named_children(member).into_iter().next()?;
    if statement.kind() != "local_declaration_statement" {
        return None;
    }
    let declaration = named_children(statement)
        .into_iter()
        .find(|n| n.kind() == "variable_declaration")?;
    let declarator = named_children(declaration)
        .into_iter()
        .find(|n| n.kind() == "variable_declarator")?;
    let name = field_or_kind(declarator, "name", "identifier")?;
    Some(tree.node_text(name).to_string()).filter(|name| !name.is_empty())
}
