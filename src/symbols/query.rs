//! Member lookups that follow the base-type chain.

use crate::symbols::model::{MemberKind, MemberSymbol, TypeRef, TypeSymbol};

/// Iterate a type and then each of its base types, nearest first.
pub fn self_and_base_types(ty: &TypeSymbol) -> impl Iterator<Item = &TypeSymbol> {
    std::iter::successors(Some(ty), |current| current.base_type())
}

/// True when `ty` or any type it inherits from declares a member that
/// satisfies `predicate`.
pub fn has_matching_member<P>(ty: &TypeSymbol, predicate: P) -> bool
where
    P: Fn(&MemberSymbol) -> bool,
{
    self_and_base_types(ty).any(|current| current.members.iter().any(&predicate))
}

/// Predicate for "a property of type `Collection<...>` with an argument
/// whose display name is `element_full_name`".
///
/// Type arguments are compared by display string, not identity, so an
/// aliased or differently qualified spelling of the same type will not
/// match.
pub fn is_collection_property_of<'a>(
    collection_type: &'a str,
    element_full_name: &'a str,
) -> impl Fn(&MemberSymbol) -> bool + 'a {
    move |member| {
        if member.kind != MemberKind::Property {
            return false;
        }
        let Some(type_ref) = &member.type_ref else {
            return false;
        };
        is_bound_generic_named(type_ref, collection_type)
            && type_ref
                .type_arguments
                .iter()
                .any(|arg| arg.display_string() == element_full_name)
    }
}

fn is_bound_generic_named(type_ref: &TypeRef, name: &str) -> bool {
    type_ref.is_generic() && !type_ref.is_unbound_generic() && type_ref.name == name
}

/// Find a property whose type is exactly `assembly`/`namespace`/`name`.
///
/// This one is matched by external identity rather than by spelling, so a
/// same-named type from another assembly is never picked up.
pub fn find_property_of_type<'a>(
    ty: &'a TypeSymbol,
    assembly: &str,
    namespace: &str,
    name: &str,
) -> Option<&'a MemberSymbol> {
    ty.properties().find(|property| {
        property.type_ref.as_ref().is_some_and(|t| {
            t.assembly.as_deref() == Some(assembly)
                && t.namespace.as_deref() == Some(namespace)
                && t.name == name
        })
    })
}
