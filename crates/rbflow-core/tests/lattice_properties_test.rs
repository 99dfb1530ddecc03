use proptest::prelude::*;
use rbflow_core::types::{substitute, truncate, Subst};
use rbflow_core::{ModId, Type};

fn atom() -> impl Strategy<Value = Type> {
    prop_oneof![
        Just(Type::nil()),
        Just(Type::true_()),
        Just(Type::false_()),
        Just(Type::integer()),
        Just(Type::float()),
        Just(Type::string()),
        Just(Type::Symbol(None)),
        Just(Type::instance(ModId::PROC)),
        Just(Type::Singleton(ModId::OBJECT)),
        "[a-c]".prop_map(|s| Type::symbol(&s)),
    ]
}

fn ty() -> impl Strategy<Value = Type> {
    let leaf = prop_oneof![8 => atom(), 1 => Just(Type::Any), 1 => Just(Type::Bot)];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(Type::array_of),
            (inner.clone(), inner).prop_map(|(a, b)| a.union(&b)),
        ]
    })
}

proptest! {
    #[test]
    fn test_union_is_idempotent(a in ty()) {
        prop_assert_eq!(a.union(&a), a.union(&Type::Bot));
    }

    #[test]
    fn test_union_is_commutative(a in ty(), b in ty()) {
        prop_assert_eq!(a.union(&b), b.union(&a));
    }

    #[test]
    fn test_union_is_associative(a in ty(), b in ty(), c in ty()) {
        prop_assert_eq!(a.union(&b).union(&c), a.union(&b.union(&c)));
    }

    #[test]
    fn test_any_absorbs(a in ty()) {
        prop_assert_eq!(a.union(&Type::Any), Type::Any);
    }

    #[test]
    fn test_union_contains_members(a in ty(), b in ty()) {
        let joined = a.union(&b);
        for member in a.members() {
            prop_assert_eq!(joined.union(&member), joined.clone());
        }
    }

    #[test]
    fn test_truncate_keeps_shallow_types(a in ty()) {
        prop_assume!(a.depth() <= 3);
        prop_assert_eq!(truncate(&a, 3), a);
    }

    #[test]
    fn test_truncate_is_idempotent(a in ty(), depth in 1usize..4) {
        let once = truncate(&a, depth);
        prop_assert_eq!(truncate(&once, depth), once);
    }

    #[test]
    fn test_substitution_without_vars_is_identity(a in ty()) {
        let bounded = truncate(&a, 5);
        prop_assert_eq!(substitute(&bounded, &Subst::new(), 5), bounded);
    }
}
