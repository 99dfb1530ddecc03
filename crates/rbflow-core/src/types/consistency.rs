//! One-directional compatibility of an actual type against a formal one
//!
//! Used when checking arguments against declared signatures. Type variables
//! on the formal side unify by accumulating the actual type into the
//! substitution.

use super::{Elems, Subst, Type};
use crate::ids::ModId;

/// Ancestry queries needed by [`consistent`]
pub trait Hierarchy {
    /// `sub` equals `sup` or has it among its ancestors (mixins included)
    fn is_subclass_of(&self, sub: ModId, sup: ModId) -> bool;
}

pub fn consistent<H: Hierarchy + ?Sized>(
    actual: &Type,
    formal: &Type,
    subst: &mut Subst,
    h: &H,
) -> bool {
    match (actual, formal) {
        (_, Type::Any) | (Type::Any, _) | (Type::Bot, _) => true,
        (_, Type::Var(name)) => {
            let merged = match subst.get(name) {
                Some(prev) => prev.union(actual),
                None => actual.clone(),
            };
            subst.insert(name.clone(), merged);
            true
        }
        (Type::Union(_), _) => actual
            .members()
            .iter()
            .all(|member| consistent(member, formal, subst, h)),
        (_, Type::Union(_)) => {
            for member in formal.members() {
                let mut trial = subst.clone();
                if consistent(actual, &member, &mut trial, h) {
                    *subst = trial;
                    return true;
                }
            }
            false
        }
        // unresolved containers are checked after globalization
        (Type::Local(_), _) => true,
        (Type::Literal(a), Type::Literal(b)) => a == b,
        (Type::Literal(lit), _) => consistent(&Type::instance(lit.base()), formal, subst, h),
        (Type::Instance(a, a_args), Type::Instance(f, f_args)) => {
            h.is_subclass_of(*a, *f)
                && (f_args.is_empty()
                    || a_args.is_empty()
                    || (a_args.len() == f_args.len()
                        && a_args
                            .iter()
                            .zip(f_args)
                            .all(|(x, y)| consistent(x, y, subst, h))))
        }
        (Type::Array(a), Type::Instance(f, f_args)) => {
            h.is_subclass_of(a.base, *f)
                && match f_args.as_slice() {
                    [elem] => consistent(&a.elems.squash(), elem, subst, h),
                    _ => true,
                }
        }
        (Type::Array(a), Type::Array(f)) => {
            h.is_subclass_of(a.base, f.base)
                && match (&a.elems, &f.elems) {
                    (Elems::Tuple(x), Elems::Tuple(y)) => {
                        x.len() == y.len()
                            && x.iter().zip(y).all(|(p, q)| consistent(p, q, subst, h))
                    }
                    (Elems::Seq(_), Elems::Tuple(_)) => false,
                    (elems, Elems::Seq(e)) => consistent(&elems.squash(), e, subst, h),
                }
        }
        (Type::Hash(a), Type::Instance(f, f_args)) => {
            h.is_subclass_of(a.base, *f)
                && match f_args.as_slice() {
                    [k, v] => {
                        consistent(&a.key_type(), k, subst, h)
                            && consistent(&a.value_type(), v, subst, h)
                    }
                    _ => true,
                }
        }
        (Type::Hash(a), Type::Hash(f)) => {
            h.is_subclass_of(a.base, f.base)
                && consistent(&a.key_type(), &f.key_type(), subst, h)
                && consistent(&a.value_type(), &f.value_type(), subst, h)
        }
        (Type::Hash(a), Type::Record(fields)) => fields.iter().all(|(name, ty)| {
            a.field(name)
                .map(|actual_field| consistent(actual_field, ty, subst, h))
                .unwrap_or(false)
        }),
        (Type::Record(a), Type::Record(f)) => {
            a.len() == f.len()
                && a.iter()
                    .zip(f)
                    .all(|((an, at), (fname, ft))| an == fname && consistent(at, ft, subst, h))
        }
        (Type::Record(_), Type::Instance(f, _)) => h.is_subclass_of(ModId::HASH, *f),
        (Type::Singleton(a), Type::Singleton(f)) => h.is_subclass_of(*a, *f),
        (Type::Singleton(_), Type::Instance(f, _)) => h.is_subclass_of(ModId::CLASS, *f),
        (Type::Symbol(_), Type::Symbol(None)) => true,
        (Type::Symbol(a), Type::Symbol(b)) => a == b,
        (Type::Symbol(_), Type::Instance(f, _)) => h.is_subclass_of(ModId::SYMBOL, *f),
        (Type::Proc(_), Type::Instance(f, _)) => h.is_subclass_of(ModId::PROC, *f),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Name;

    /// Integer < Numeric < Object, String < Object
    struct Tiny;

    impl Hierarchy for Tiny {
        fn is_subclass_of(&self, sub: ModId, sup: ModId) -> bool {
            sub == sup
                || sup == ModId::OBJECT
                || (sub == ModId::INTEGER && sup == ModId::NUMERIC)
                || (sub == ModId::FLOAT && sup == ModId::NUMERIC)
        }
    }

    fn check(actual: &Type, formal: &Type) -> bool {
        consistent(actual, formal, &mut Subst::new(), &Tiny)
    }

    #[test]
    fn test_any_matches_both_ways() {
        assert!(check(&Type::Any, &Type::integer()));
        assert!(check(&Type::string(), &Type::Any));
    }

    #[test]
    fn test_subclass_instance() {
        assert!(check(&Type::integer(), &Type::instance(ModId::NUMERIC)));
        assert!(!check(&Type::string(), &Type::instance(ModId::NUMERIC)));
    }

    #[test]
    fn test_union_actual_distributes() {
        let both = Type::integer().union(&Type::float());
        assert!(check(&both, &Type::instance(ModId::NUMERIC)));
        let mixed = Type::integer().union(&Type::string());
        assert!(!check(&mixed, &Type::instance(ModId::NUMERIC)));
    }

    #[test]
    fn test_union_formal_needs_one_member() {
        let formal = Type::integer().union(&Type::nil());
        assert!(check(&Type::nil(), &formal));
        assert!(!check(&Type::string(), &formal));
    }

    #[test]
    fn test_var_accumulates() {
        let mut subst = Subst::new();
        let formal = Type::array_of(Type::Var(Name::new("T")));
        let actual = Type::tuple(vec![Type::integer(), Type::string()]);
        assert!(consistent(&actual, &formal, &mut subst, &Tiny));
        assert_eq!(
            subst.get("T"),
            Some(&Type::integer().union(&Type::string()))
        );
    }

    #[test]
    fn test_literal_against_base() {
        let lit = Type::Literal(super::super::LitValue::Int(3));
        assert!(check(&lit, &Type::integer()));
        assert!(!check(&lit, &Type::string()));
    }

    #[test]
    fn test_record_against_hash_literal() {
        let formal = Type::Record(vec![(Name::new("id"), Type::integer())]);
        assert!(check(&Type::hash_of(Type::symbol("id"), Type::integer()), &formal));
        assert!(!check(&Type::hash_of(Type::symbol("name"), Type::integer()), &formal));
    }
}
