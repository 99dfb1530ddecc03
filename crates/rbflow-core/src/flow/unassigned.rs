//! Reads of local variables that may run before any assignment

use super::cfg::{BasicBlock, CfgBuilder, CfgEvent};
use super::worklist::{ForwardAnalysis, WorklistSolver};
use crate::ast::{Node, NodeId};
use crate::name::Name;
use std::collections::{BTreeSet, HashSet};

/// Fact: the locals that are unassigned on at least one path
struct MaybeUnassigned {
    scope_vars: BTreeSet<Name>,
}

impl ForwardAnalysis for MaybeUnassigned {
    type Fact = BTreeSet<Name>;

    fn initial_fact(&self) -> Self::Fact {
        self.scope_vars.clone()
    }

    fn bottom(&self) -> Self::Fact {
        BTreeSet::new()
    }

    fn join(&self, facts: &[Self::Fact]) -> Self::Fact {
        facts.iter().flatten().cloned().collect()
    }

    fn transfer(&self, block: &BasicBlock, input: &Self::Fact) -> Self::Fact {
        let mut fact = input.clone();
        for event in &block.events {
            if let CfgEvent::Write(name) = event {
                fact.remove(name);
            }
        }
        fact
    }
}

/// Ids of every local read, in any scope below `root`, that may observe
/// the variable before it is assigned
pub fn maybe_unassigned(root: &Node) -> HashSet<NodeId> {
    let mut flagged = HashSet::new();
    let mut scopes = vec![root];
    while let Some(scope) = scopes.pop() {
        let (cfg, params, nested) = CfgBuilder::build(scope);
        scopes.extend(nested);

        let mut scope_vars: BTreeSet<Name> = scope.modified_vars().into_iter().collect();
        for p in &params {
            scope_vars.remove(p);
        }
        if scope_vars.is_empty() {
            continue;
        }
        let analysis = MaybeUnassigned { scope_vars };
        let result = WorklistSolver::solve(&analysis, &cfg);

        for (id, block) in &cfg.blocks {
            let Some(mut fact) = result.in_facts.get(id).cloned() else {
                continue;
            };
            for event in &block.events {
                match event {
                    CfgEvent::Write(name) => {
                        fact.remove(name);
                    }
                    CfgEvent::Read { node, name } => {
                        if fact.contains(name) {
                            flagged.insert(*node);
                        }
                    }
                }
            }
        }
    }
    flagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::ast::{NodeKind, Params, SyntaxTree};

    fn flagged_names(tree: &SyntaxTree) -> Vec<(u32, String)> {
        let ids = maybe_unassigned(tree.root());
        let mut out: Vec<(u32, String)> = tree
            .root()
            .preorder()
            .into_iter()
            .filter(|n| ids.contains(&n.id))
            .filter_map(|n| match &n.kind {
                NodeKind::LocalRead(name) => Some((n.id.0, name.to_string())),
                _ => None,
            })
            .collect();
        out.sort();
        out
    }

    #[test]
    fn test_assigned_in_one_branch() {
        // if c; x = 1; end; x
        let tree = SyntaxTree::new(stmts(vec![
            lasgn("c", true_()),
            if_(lvar("c"), lasgn("x", int(1)), None),
            lvar("x"),
        ]));
        let flagged = flagged_names(&tree);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].1, "x");
    }

    #[test]
    fn test_assigned_in_both_branches() {
        let tree = SyntaxTree::new(stmts(vec![
            if_(true_(), lasgn("x", int(1)), Some(lasgn("x", int(2)))),
            lvar("x"),
        ]));
        assert!(flagged_names(&tree).is_empty());
    }

    #[test]
    fn test_loop_carried_read() {
        // while c; y = x; x = 1; end
        let tree = SyntaxTree::new(while_(
            true_(),
            stmts(vec![lasgn("y", lvar("x")), lasgn("x", int(1))]),
        ));
        let flagged = flagged_names(&tree);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].1, "x");
    }

    #[test]
    fn test_params_are_assigned() {
        let tree = SyntaxTree::new(def(
            "m",
            Params::required(&["a"]),
            vec![lvar("a"), lasgn("b", lvar("a")), lvar("b")],
        ));
        assert!(flagged_names(&tree).is_empty());
    }

    #[test]
    fn test_nested_method_scope_is_separate() {
        // x = 1; def m; x; end  -- the inner x is a different variable
        let tree = SyntaxTree::new(stmts(vec![
            lasgn("x", int(1)),
            def("m", Params::default(), vec![lvar("x")]),
        ]));
        // never assigned in its own scope, so it is not a scope variable at all
        assert!(flagged_names(&tree).is_empty());
    }
}
