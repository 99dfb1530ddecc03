//! Union normalization

use super::{ArrayType, Elems, HashType, Type, Union};
use crate::ids::ModId;
use std::collections::{BTreeMap, BTreeSet};

/// Accumulates types into a canonical union
#[derive(Debug, Default)]
pub struct UnionBuilder {
    any: bool,
    members: BTreeSet<Type>,
    arrays: BTreeMap<ModId, Elems>,
    hashes: BTreeMap<ModId, BTreeMap<Type, Type>>,
}

impl UnionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, ty: Type) {
        if self.any {
            return;
        }
        match ty {
            Type::Any => {
                self.any = true;
                self.members.clear();
                self.arrays.clear();
                self.hashes.clear();
            }
            Type::Bot => {}
            Type::Union(u) => {
                let Union {
                    members,
                    arrays,
                    hashes,
                } = *u;
                for member in members {
                    self.add(member);
                }
                for array in arrays {
                    self.add_array(array);
                }
                for hash in hashes {
                    self.add_hash(hash);
                }
            }
            Type::Array(a) => self.add_array(*a),
            Type::Hash(h) => self.add_hash(*h),
            other => {
                self.members.insert(other);
            }
        }
    }

    fn add_array(&mut self, array: ArrayType) {
        let merged = match self.arrays.remove(&array.base) {
            Some(prev) => merge_elems(prev, array.elems),
            None => array.elems,
        };
        self.arrays.insert(array.base, merged);
    }

    fn add_hash(&mut self, hash: HashType) {
        let entry = self.hashes.entry(hash.base).or_default();
        for (key, value) in hash.pairs {
            let merged = match entry.remove(&key) {
                Some(prev) => prev.union(&value),
                None => value,
            };
            entry.insert(key, merged);
        }
    }

    pub fn build(self) -> Type {
        if self.any {
            return Type::Any;
        }
        let mut members: Vec<Type> = self.members.into_iter().collect();
        let mut arrays: Vec<ArrayType> = self
            .arrays
            .into_iter()
            .map(|(base, elems)| ArrayType { base, elems })
            .collect();
        let mut hashes: Vec<HashType> = self
            .hashes
            .into_iter()
            .map(|(base, pairs)| HashType {
                base,
                pairs: pairs.into_iter().collect(),
            })
            .collect();

        match members.len() + arrays.len() + hashes.len() {
            0 => Type::Bot,
            1 => {
                if let Some(only) = members.pop() {
                    only
                } else if let Some(only) = arrays.pop() {
                    Type::Array(Box::new(only))
                } else if let Some(only) = hashes.pop() {
                    Type::Hash(Box::new(only))
                } else {
                    Type::Bot
                }
            }
            _ => Type::Union(Box::new(Union {
                members,
                arrays,
                hashes,
            })),
        }
    }
}

/// Tuples of equal length merge position-wise; anything else widens to a
/// homogeneous sequence
fn merge_elems(a: Elems, b: Elems) -> Elems {
    match (a, b) {
        (Elems::Tuple(x), Elems::Tuple(y)) if x.len() == y.len() => {
            Elems::Tuple(x.into_iter().zip(y).map(|(p, q)| p.union(&q)).collect())
        }
        (a, b) => Elems::Seq(a.squash().union(&b.squash())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotent() {
        let t = Type::integer();
        assert_eq!(t.union(&t), t);
    }

    #[test]
    fn test_any_absorbs_and_bot_is_identity() {
        assert_eq!(Type::integer().union(&Type::Any), Type::Any);
        assert_eq!(Type::Bot.union(&Type::string()), Type::string());
        assert_eq!(Type::union_all(Vec::new()), Type::Bot);
    }

    #[test]
    fn test_single_member_collapses() {
        let u = Type::union_all(vec![Type::integer(), Type::integer(), Type::Bot]);
        assert_eq!(u, Type::integer());
    }

    #[test]
    fn test_arrays_merge_elementwise() {
        let a = Type::tuple(vec![Type::integer(), Type::string()]);
        let b = Type::tuple(vec![Type::nil(), Type::string()]);
        let merged = a.union(&b);
        assert_eq!(
            merged,
            Type::tuple(vec![Type::integer().union(&Type::nil()), Type::string()])
        );
    }

    #[test]
    fn test_tuples_of_different_length_widen() {
        let a = Type::tuple(vec![Type::integer()]);
        let b = Type::tuple(vec![Type::string(), Type::string()]);
        assert_eq!(
            a.union(&b),
            Type::array_of(Type::integer().union(&Type::string()))
        );
    }

    #[test]
    fn test_hashes_merge_per_key() {
        let a = Type::hash_of(Type::symbol("a"), Type::integer());
        let b = Type::hash_of(Type::symbol("a"), Type::string());
        let merged = a.union(&b);
        match merged {
            Type::Hash(h) => {
                assert_eq!(h.pairs.len(), 1);
                assert_eq!(h.pairs[0].1, Type::integer().union(&Type::string()));
            }
            other => panic!("expected hash, got {:?}", other),
        }
    }
}
