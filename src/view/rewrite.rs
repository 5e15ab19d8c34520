//! Nested model reference rewriting
//!
//! Depth-first over the [`TypeExpr`] tree. A `Model` leaf whose schema has a
//! view under one of the candidate names is replaced by that view; composite
//! nodes are rebuilt from their rewritten arguments. One pass per field, so a
//! self-referencing schema is substituted at most once per build.

use std::sync::Arc;

use crate::schema::Schema;
use crate::types::TypeExpr;

/// View resolution used while rewriting
pub trait ViewLookup {
    /// View `view` attached to `schema` or one of its structural ancestors
    fn find_view(&self, schema: &str, view: &str) -> Option<Arc<Schema>>;
}

/// Rewrite `ty`, trying `view` first and then each of `ancestors` in order
#[must_use]
pub fn rewrite(ty: &TypeExpr, view: &str, ancestors: &[String], lookup: &dyn ViewLookup) -> TypeExpr {
    match ty {
        TypeExpr::Model(name) => std::iter::once(view)
            .chain(ancestors.iter().map(String::as_str))
            .find_map(|candidate| lookup.find_view(name, candidate))
            .map_or_else(|| ty.clone(), |found| TypeExpr::Model(found.name().to_string())),
        TypeExpr::List(inner) => TypeExpr::List(Box::new(rewrite(inner, view, ancestors, lookup))),
        TypeExpr::Set(inner) => TypeExpr::Set(Box::new(rewrite(inner, view, ancestors, lookup))),
        TypeExpr::Map(inner) => TypeExpr::Map(Box::new(rewrite(inner, view, ancestors, lookup))),
        TypeExpr::Optional(inner) => {
            TypeExpr::Optional(Box::new(rewrite(inner, view, ancestors, lookup)))
        }
        TypeExpr::Tuple(members) => TypeExpr::Tuple(
            members
                .iter()
                .map(|member| rewrite(member, view, ancestors, lookup))
                .collect(),
        ),
        TypeExpr::Union(members) => TypeExpr::Union(
            members
                .iter()
                .map(|member| rewrite(member, view, ancestors, lookup))
                .collect(),
        ),
        TypeExpr::Any | TypeExpr::Bool | TypeExpr::Int | TypeExpr::Float | TypeExpr::Str => {
            ty.clone()
        }
    }
}
