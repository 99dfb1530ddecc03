//! Substitution and scope conversion with depth-bounded widening
//!
//! Every recursive walk here carries a depth budget. When it runs out the
//! remaining structure is replaced by `Any`, which is what keeps
//! self-referential generics and cyclic containers finite.

use super::{ArrayType, Elems, HashType, Type, UnionBuilder};
use crate::ids::{ContainerId, ModId};
use crate::name::Name;
use std::collections::BTreeMap;

pub type Subst = BTreeMap<Name, Type>;

/// Replace type variables; unbound variables become `Any`
pub fn substitute(ty: &Type, subst: &Subst, depth: usize) -> Type {
    map_bounded(ty, depth, &|name, remaining| match subst.get(name) {
        Some(bound) => truncate(bound, remaining),
        None => Type::Any,
    })
}

/// Cut structure nested deeper than `depth`
pub fn truncate(ty: &Type, depth: usize) -> Type {
    map_bounded(ty, depth, &|name, _| Type::Var(name.clone()))
}

fn map_bounded(ty: &Type, depth: usize, var: &dyn Fn(&Name, usize) -> Type) -> Type {
    if depth == 0 {
        return Type::Any;
    }
    let inner = depth - 1;
    match ty {
        Type::Var(name) => var(name, depth),
        Type::Instance(m, args) if !args.is_empty() => Type::Instance(
            *m,
            args.iter().map(|a| map_bounded(a, inner, var)).collect(),
        ),
        Type::Array(a) => Type::Array(Box::new(ArrayType {
            base: a.base,
            elems: match &a.elems {
                Elems::Tuple(ts) => {
                    Elems::Tuple(ts.iter().map(|t| map_bounded(t, inner, var)).collect())
                }
                Elems::Seq(t) => Elems::Seq(map_bounded(t, inner, var)),
            },
        })),
        Type::Hash(h) => rebuild_hash(
            h.base,
            h.pairs
                .iter()
                .map(|(k, v)| (map_bounded(k, inner, var), map_bounded(v, inner, var)))
                .collect(),
        ),
        Type::Record(fields) => Type::Record(
            fields
                .iter()
                .map(|(n, t)| (n.clone(), map_bounded(t, inner, var)))
                .collect(),
        ),
        Type::Union(_) => Type::union_all(ty.members().iter().map(|m| map_bounded(m, depth, var))),
        other => other.clone(),
    }
}

/// Keys may collide after mapping, so pairs are renormalized
fn rebuild_hash(base: ModId, pairs: Vec<(Type, Type)>) -> Type {
    let mut builder = UnionBuilder::new();
    builder.add(Type::Hash(Box::new(HashType { base, pairs })));
    builder.build()
}

/// Current contents of a scope-local container
#[derive(Debug, Clone)]
pub struct ContainerShape {
    pub base: ModId,
    pub kind: ShapeKind,
}

#[derive(Debug, Clone)]
pub enum ShapeKind {
    /// Literal positions plus everything added afterwards
    Array { tuple: Vec<Type>, extra: Type },
    /// Literal symbol-keyed fields plus everything stored afterwards
    Hash {
        fields: Vec<(Type, Type)>,
        extra_key: Type,
        extra_value: Type,
    },
}

/// Read access to scope-local containers
pub trait ContainerView {
    fn container_shape(&self, id: ContainerId) -> Option<ContainerShape>;
}

/// Convert scope-local containers into their structural form
pub fn globalize<V: ContainerView + ?Sized>(ty: &Type, view: &V, depth: usize) -> Type {
    if depth == 0 {
        return Type::Any;
    }
    let inner = depth - 1;
    match ty {
        Type::Local(id) => match view.container_shape(*id) {
            None => Type::Any,
            Some(shape) => match shape.kind {
                ShapeKind::Array { tuple, extra } => {
                    let tuple: Vec<Type> = tuple.iter().map(|t| globalize(t, view, inner)).collect();
                    let extra = globalize(&extra, view, inner);
                    let elems = if extra.is_bot() {
                        Elems::Tuple(tuple)
                    } else {
                        Elems::Seq(Type::union_all(tuple.into_iter().chain(Some(extra))))
                    };
                    Type::Array(Box::new(ArrayType {
                        base: shape.base,
                        elems,
                    }))
                }
                ShapeKind::Hash {
                    fields,
                    extra_key,
                    extra_value,
                } => {
                    let mut pairs: Vec<(Type, Type)> = fields
                        .iter()
                        .map(|(k, v)| (globalize(k, view, inner), globalize(v, view, inner)))
                        .collect();
                    let extra_key = globalize(&extra_key, view, inner);
                    if !extra_key.is_bot() {
                        pairs.push((extra_key, globalize(&extra_value, view, inner)));
                    }
                    rebuild_hash(shape.base, pairs)
                }
            },
        },
        Type::Instance(m, args) if !args.is_empty() => Type::Instance(
            *m,
            args.iter().map(|a| globalize(a, view, inner)).collect(),
        ),
        Type::Array(a) => Type::Array(Box::new(ArrayType {
            base: a.base,
            elems: match &a.elems {
                Elems::Tuple(ts) => {
                    Elems::Tuple(ts.iter().map(|t| globalize(t, view, inner)).collect())
                }
                Elems::Seq(t) => Elems::Seq(globalize(t, view, inner)),
            },
        })),
        Type::Hash(h) => rebuild_hash(
            h.base,
            h.pairs
                .iter()
                .map(|(k, v)| (globalize(k, view, inner), globalize(v, view, inner)))
                .collect(),
        ),
        Type::Record(fields) => Type::Record(
            fields
                .iter()
                .map(|(n, t)| (n.clone(), globalize(t, view, inner)))
                .collect(),
        ),
        Type::Union(_) => Type::union_all(ty.members().iter().map(|m| globalize(m, view, depth))),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_substitute_binds_vars() {
        let mut subst = Subst::new();
        subst.insert(Name::new("T"), Type::integer());
        let ty = Type::array_of(Type::Var(Name::new("T")));
        assert_eq!(substitute(&ty, &subst, 5), Type::array_of(Type::integer()));
    }

    #[test]
    fn test_unbound_var_is_any() {
        let ty = Type::Var(Name::new("U"));
        assert_eq!(substitute(&ty, &Subst::new(), 5), Type::Any);
    }

    #[test]
    fn test_depth_cutoff() {
        let ty = Type::array_of(Type::array_of(Type::array_of(Type::integer())));
        assert_eq!(
            truncate(&ty, 2),
            Type::array_of(Type::array_of(Type::Any))
        );
    }

    struct Cyclic(HashMap<ContainerId, ContainerShape>);

    impl ContainerView for Cyclic {
        fn container_shape(&self, id: ContainerId) -> Option<ContainerShape> {
            self.0.get(&id).cloned()
        }
    }

    #[test]
    fn test_globalize_self_containing_array() {
        let id = ContainerId(0);
        let mut map = HashMap::new();
        map.insert(
            id,
            ContainerShape {
                base: ModId::ARRAY,
                kind: ShapeKind::Array {
                    tuple: vec![Type::integer()],
                    extra: Type::Local(id),
                },
            },
        );
        let view = Cyclic(map);
        let ty = globalize(&Type::Local(id), &view, 4);
        assert!(ty.depth() <= 5);
        assert!(ty.mentions_any());
    }
}
