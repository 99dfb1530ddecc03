//! Local environment threaded through installation

use crate::entity::CRef;
use crate::ids::{ModId, VertexId};
use crate::name::Name;
use indexmap::IndexMap;
use std::rc::Rc;

/// The method a node is installed inside of
#[derive(Debug, Clone)]
pub(crate) struct MethodCtx {
    pub owner: ModId,
    pub singleton: bool,
    pub name: Name,
    pub ret: VertexId,
    pub block: VertexId,
    /// Positional formals, forwarded by a bare `super`
    pub formals: Vec<VertexId>,
}

#[derive(Debug, Clone)]
pub(crate) struct LocalEnv {
    pub cref: Rc<CRef>,
    pub self_vtx: VertexId,
    /// Current vertex of each local variable
    pub vars: IndexMap<Name, VertexId>,
    pub method: Option<MethodCtx>,
}

impl LocalEnv {
    pub fn new(cref: Rc<CRef>, self_vtx: VertexId) -> Self {
        Self {
            cref,
            self_vtx,
            vars: IndexMap::new(),
            method: None,
        }
    }

    /// Namespace and side instance variables belong to
    pub fn ivar_scope(&self) -> (ModId, bool) {
        match &self.method {
            Some(m) => (m.owner, m.singleton),
            None if self.cref.outer.is_none() => (ModId::OBJECT, false),
            None => (self.cref.module, true),
        }
    }
}

/// Variable bindings a subtree changed: a new vertex, or `None` when the
/// binding went away
pub(crate) type Effects = Vec<(Name, Option<VertexId>)>;

pub(crate) fn effects_between(
    before: &IndexMap<Name, VertexId>,
    after: &IndexMap<Name, VertexId>,
) -> Effects {
    let mut effects: Effects = after
        .iter()
        .filter(|(name, v)| before.get(*name) != Some(*v))
        .map(|(name, v)| (name.clone(), Some(*v)))
        .collect();
    effects.extend(
        before
            .keys()
            .filter(|name| !after.contains_key(*name))
            .map(|name| (name.clone(), None)),
    );
    effects
}

pub(crate) fn replay(vars: &mut IndexMap<Name, VertexId>, effects: &Effects) {
    for (name, v) in effects {
        match v {
            Some(v) => {
                vars.insert(name.clone(), *v);
            }
            None => {
                vars.shift_remove(name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    #[test]
    fn test_effects_replay_reproduces_bindings() {
        let mut graph = Graph::new();
        let (a, b, c) = (graph.new_vertex("a"), graph.new_vertex("b"), graph.new_vertex("c"));
        let mut before = IndexMap::new();
        before.insert(Name::new("x"), a);
        before.insert(Name::new("tmp"), b);
        let mut after = IndexMap::new();
        after.insert(Name::new("x"), c);
        after.insert(Name::new("y"), b);

        let effects = effects_between(&before, &after);
        let mut replayed = before.clone();
        replay(&mut replayed, &effects);
        assert_eq!(replayed.get("x"), Some(&c));
        assert_eq!(replayed.get("y"), Some(&b));
        assert!(!replayed.contains_key("tmp"));
    }

    #[test]
    fn test_ivar_scope() {
        let mut graph = Graph::new();
        let top = LocalEnv::new(CRef::top(), graph.new_vertex("self"));
        assert_eq!(top.ivar_scope(), (ModId::OBJECT, false));
        let class_body = LocalEnv::new(CRef::top().push(ModId::STRING, false), graph.new_vertex("self"));
        assert_eq!(class_body.ivar_scope(), (ModId::STRING, true));
    }
}
