//! Type lattice
//!
//! Types are immutable values ordered structurally, so unions can be kept
//! in a canonical sorted form:
//! - `Any` absorbs everything, `Bot` is the identity of union
//! - a union with one member collapses to that member, an empty one to `Bot`
//! - arrays and hashes inside a union are merged element-wise per base class
//!   instead of being kept as opaque alternatives

pub mod consistency;
pub mod display;
pub mod sig;
pub mod subst;
pub mod union;

use crate::ids::{ContainerId, ModId, ProcId};
use crate::name::Name;
use serde::{Deserialize, Serialize};

pub use consistency::{consistent, Hierarchy};
pub use display::TypeNames;
pub use sig::{sig_to_type, BlockSig, MethodSig, SigKeyword, SigResolver, SigType};
pub use subst::{globalize, substitute, truncate, ContainerShape, ContainerView, ShapeKind, Subst};
pub use union::UnionBuilder;

/// Value of a literal type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LitValue {
    Int(i64),
    Str(String),
}

impl LitValue {
    /// The nominal class of the literal
    pub fn base(&self) -> ModId {
        match self {
            LitValue::Int(_) => ModId::INTEGER,
            LitValue::Str(_) => ModId::STRING,
        }
    }
}

/// Element layout of an array type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Elems {
    /// Fixed positions, as produced by an array literal
    Tuple(Vec<Type>),
    /// Homogeneous sequence
    Seq(Type),
}

impl Elems {
    /// Union of every element
    pub fn squash(&self) -> Type {
        match self {
            Elems::Tuple(types) => Type::union_all(types.iter().cloned()),
            Elems::Seq(ty) => ty.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArrayType {
    pub base: ModId,
    pub elems: Elems,
}

/// Key/value pairs, sorted by key with unique keys
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HashType {
    pub base: ModId,
    pub pairs: Vec<(Type, Type)>,
}

impl HashType {
    pub fn key_type(&self) -> Type {
        Type::union_all(self.pairs.iter().map(|(k, _)| k.clone()))
    }

    pub fn value_type(&self) -> Type {
        Type::union_all(self.pairs.iter().map(|(_, v)| v.clone()))
    }

    /// Value stored under a literal symbol key
    pub fn field(&self, name: &Name) -> Option<&Type> {
        self.pairs.iter().find_map(|(k, v)| match k {
            Type::Symbol(Some(s)) if s == name => Some(v),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    Any,
    Bot,
    Instance(ModId, Vec<Type>),
    Singleton(ModId),
    Array(Box<ArrayType>),
    Hash(Box<HashType>),
    Record(Vec<(Name, Type)>),
    /// A symbol, optionally a specific literal one
    Symbol(Option<Name>),
    Literal(LitValue),
    Proc(ProcId),
    Var(Name),
    /// Scope-local mutable container; never stored outside its scope
    Local(ContainerId),
    Union(Box<Union>),
}

/// Canonical union: sorted unique members plus per-base container accumulators
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Union {
    pub(crate) members: Vec<Type>,
    pub(crate) arrays: Vec<ArrayType>,
    pub(crate) hashes: Vec<HashType>,
}

impl Type {
    pub fn instance(module: ModId) -> Type {
        Type::Instance(module, Vec::new())
    }

    pub fn nil() -> Type {
        Type::instance(ModId::NIL_CLASS)
    }

    pub fn true_() -> Type {
        Type::instance(ModId::TRUE_CLASS)
    }

    pub fn false_() -> Type {
        Type::instance(ModId::FALSE_CLASS)
    }

    pub fn bool() -> Type {
        Type::true_().union(&Type::false_())
    }

    pub fn integer() -> Type {
        Type::instance(ModId::INTEGER)
    }

    pub fn float() -> Type {
        Type::instance(ModId::FLOAT)
    }

    pub fn string() -> Type {
        Type::instance(ModId::STRING)
    }

    pub fn symbol(name: &str) -> Type {
        Type::Symbol(Some(Name::new(name)))
    }

    pub fn array_of(elem: Type) -> Type {
        Type::Array(Box::new(ArrayType {
            base: ModId::ARRAY,
            elems: Elems::Seq(elem),
        }))
    }

    pub fn tuple(elems: Vec<Type>) -> Type {
        Type::Array(Box::new(ArrayType {
            base: ModId::ARRAY,
            elems: Elems::Tuple(elems),
        }))
    }

    pub fn hash_of(key: Type, value: Type) -> Type {
        let mut builder = UnionBuilder::new();
        builder.add(Type::Hash(Box::new(HashType {
            base: ModId::HASH,
            pairs: vec![(key, value)],
        })));
        builder.build()
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Any)
    }

    pub fn is_bot(&self) -> bool {
        matches!(self, Type::Bot)
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Type::Instance(m, _) if *m == ModId::NIL_CLASS)
    }

    /// Join of two types
    pub fn union(&self, other: &Type) -> Type {
        let mut builder = UnionBuilder::new();
        builder.add(self.clone());
        builder.add(other.clone());
        builder.build()
    }

    pub fn union_all<I: IntoIterator<Item = Type>>(types: I) -> Type {
        let mut builder = UnionBuilder::new();
        for ty in types {
            builder.add(ty);
        }
        builder.build()
    }

    /// The alternatives of this type: union members (containers included),
    /// nothing for `Bot`, the type itself otherwise
    pub fn members(&self) -> Vec<Type> {
        match self {
            Type::Bot => Vec::new(),
            Type::Union(u) => u
                .members
                .iter()
                .cloned()
                .chain(u.arrays.iter().map(|a| Type::Array(Box::new(a.clone()))))
                .chain(u.hashes.iter().map(|h| Type::Hash(Box::new(h.clone()))))
                .collect(),
            other => vec![other.clone()],
        }
    }

    /// Nesting depth of type arguments and container elements
    pub fn depth(&self) -> usize {
        match self {
            Type::Instance(_, args) => 1 + args.iter().map(Type::depth).max().unwrap_or(0),
            Type::Array(a) => {
                1 + match &a.elems {
                    Elems::Tuple(ts) => ts.iter().map(Type::depth).max().unwrap_or(0),
                    Elems::Seq(t) => t.depth(),
                }
            }
            Type::Hash(h) => {
                1 + h
                    .pairs
                    .iter()
                    .map(|(k, v)| k.depth().max(v.depth()))
                    .max()
                    .unwrap_or(0)
            }
            Type::Record(fields) => 1 + fields.iter().map(|(_, t)| t.depth()).max().unwrap_or(0),
            Type::Union(_) => self.members().iter().map(Type::depth).max().unwrap_or(0),
            _ => 1,
        }
    }

    /// Whether `Any` occurs anywhere inside
    pub fn mentions_any(&self) -> bool {
        match self {
            Type::Any => true,
            Type::Instance(_, args) => args.iter().any(Type::mentions_any),
            Type::Array(a) => match &a.elems {
                Elems::Tuple(ts) => ts.iter().any(Type::mentions_any),
                Elems::Seq(t) => t.mentions_any(),
            },
            Type::Hash(h) => h.pairs.iter().any(|(k, v)| k.mentions_any() || v.mentions_any()),
            Type::Record(fields) => fields.iter().any(|(_, t)| t.mentions_any()),
            Type::Union(_) => self.members().iter().any(Type::mentions_any),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members_of_union() {
        let t = Type::integer().union(&Type::string()).union(&Type::array_of(Type::nil()));
        let members = t.members();
        assert_eq!(members.len(), 3);
        assert!(members.contains(&Type::integer()));
        assert!(members.contains(&Type::array_of(Type::nil())));
        assert!(Type::Bot.members().is_empty());
    }

    #[test]
    fn test_depth() {
        let nested = Type::array_of(Type::array_of(Type::integer()));
        assert_eq!(nested.depth(), 3);
        assert_eq!(Type::integer().depth(), 1);
    }

    #[test]
    fn test_hash_field_lookup() {
        let h = HashType {
            base: ModId::HASH,
            pairs: vec![(Type::symbol("a"), Type::integer())],
        };
        assert_eq!(h.field(&Name::new("a")), Some(&Type::integer()));
        assert_eq!(h.key_type(), Type::symbol("a"));
    }
}
