//! One analysis session: the environment plus the installed tree
//!
//! An edit runs as: define the new tree, diff it against the installed one,
//! install it (adopting unchanged subtrees), drain the driver, withdraw and
//! retract the old tree, re-derive everything downstream of what was
//! retracted, drain again, then free the retired vertices. A
//! cancelled pass keeps its place and finishes on [`Session::resume`].

use crate::ast::{Node, NodeId, Pos, SyntaxTree};
use crate::config::AnalysisConfig;
use crate::diagnostics::Diagnostic;
use crate::driver::CancellationToken;
use crate::entity::EntityTable;
use crate::error::{CoreError, Result};
use crate::genv::Genv;
use crate::graph::Graph;
use crate::ids::{BoxId, ModId, VertexId};
use crate::install::{
    free_vertices, retract, undefine, Definer, Differ, InstalledTree, Installer, NodeState, Phase,
    ReuseMap,
};
use crate::signatures::SignatureTable;
use crate::summary::{self, ProgramSummary};
use crate::types::Type;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Extra delete-and-rederive rounds allowed for edges dropped while the
/// retired tree settles
const MAX_REDERIVE_ROUNDS: usize = 8;

/// Counters of the last completed edit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateStats {
    pub generation: u32,
    /// Nodes whose graph objects were adopted from the previous tree
    pub reused: usize,
    pub installed: usize,
    pub torn_down: usize,
    pub boxes_run: usize,
}

/// Graph objects held by one node's subtree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reachable {
    pub vertices: Vec<VertexId>,
    pub boxes: Vec<BoxId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Draining after the new tree went in
    SettleNew,
    /// Draining after the old tree came out
    SettleRetired,
}

#[derive(Debug)]
struct Pending {
    step: Step,
    retired: Option<InstalledTree>,
    deferred: Vec<VertexId>,
    stats: UpdateStats,
    rederive_rounds: usize,
}

pub struct Session {
    genv: Genv,
    current: Option<InstalledTree>,
    pending: Option<Pending>,
    generation: u32,
    token: CancellationToken,
    top_self: VertexId,
    stats: UpdateStats,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl Session {
    pub fn new(config: AnalysisConfig) -> Self {
        let mut genv = Genv::new(config);
        let top_self = genv.graph.new_source(Type::instance(ModId::OBJECT), "main");
        Self {
            genv,
            current: None,
            pending: None,
            generation: 0,
            token: CancellationToken::new(),
            top_self,
            stats: UpdateStats::default(),
        }
    }

    /// Replace the analyzed program with `tree`.
    ///
    /// A pass interrupted earlier is finished first, still subject to the
    /// cancellation token. On an unsupported construct nothing changes and
    /// the previous tree stays installed.
    #[instrument(skip_all, fields(nodes = tree.len(), generation = self.generation + 1))]
    pub fn update(&mut self, tree: SyntaxTree) -> Result<UpdateStats> {
        if self.pending.is_some() {
            self.settle()?;
        }
        let generation = self.generation + 1;
        let mut next = InstalledTree::new(tree, generation);
        let facts = Definer::new(&mut self.genv, generation, &mut next.states).run(next.tree.root())?;
        self.generation = generation;

        let mut retired = self.current.take();
        let reuse = match &retired {
            Some(old) => Differ {
                new_unassigned: &next.unassigned,
                old_unassigned: &old.unassigned,
            }
            .diff(next.tree.root(), old.tree.root()),
            None => ReuseMap::new(),
        };

        let mut no_states: Vec<NodeState> = Vec::new();
        let old_states: &mut [NodeState] = match &mut retired {
            Some(old) => &mut old.states,
            None => &mut no_states,
        };
        let mut installer = Installer::new(
            &mut self.genv,
            &mut next.states,
            old_states,
            &reuse,
            &next.unassigned,
        );
        installer.run(next.tree.root(), self.top_self);
        let stats = UpdateStats {
            generation,
            reused: installer.reused,
            installed: installer.installed,
            torn_down: 0,
            boxes_run: 0,
        };
        debug!(
            facts,
            reused = stats.reused,
            installed = stats.installed,
            "tree installed"
        );

        self.current = Some(next);
        self.pending = Some(Pending {
            step: Step::SettleNew,
            retired,
            deferred: Vec::new(),
            stats,
            rederive_rounds: 0,
        });
        self.settle()
    }

    /// Finish a pass interrupted by cancellation or timeout. Clears the
    /// cancellation request.
    pub fn resume(&mut self) -> Result<UpdateStats> {
        self.token.reset();
        self.settle()
    }

    /// Whether an interrupted pass is waiting for [`Session::resume`]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn settle(&mut self) -> Result<UpdateStats> {
        let Some(mut pending) = self.pending.take() else {
            return Ok(self.stats);
        };
        let deadline = self.genv.config.timeout().map(|t| Instant::now() + t);
        loop {
            match self.genv.run_all(&self.token, deadline) {
                Ok(run) => pending.stats.boxes_run += run.boxes_run,
                Err(err) => {
                    if let CoreError::Cancelled { processed } = &err {
                        pending.stats.boxes_run += processed;
                    }
                    self.pending = Some(pending);
                    return Err(err);
                }
            }
            match pending.step {
                Step::SettleNew => {
                    if let Some(old) = pending.retired.as_mut() {
                        self.genv.track_removals();
                        undefine(&mut self.genv, &mut old.states);
                        let retracted = retract(&mut self.genv, old);
                        pending.deferred = retracted.deferred;
                        pending.stats.torn_down = retracted.torn_down;
                        self.genv.rederive(retracted.frontier);
                    }
                    pending.step = Step::SettleRetired;
                }
                Step::SettleRetired => {
                    // reruns that dropped edges may have left cyclic support
                    let frontier = self.genv.take_frontier();
                    if !frontier.is_empty() && pending.rederive_rounds < MAX_REDERIVE_ROUNDS {
                        pending.rederive_rounds += 1;
                        self.genv.rederive(frontier);
                        continue;
                    }
                    self.genv.stop_tracking();
                    free_vertices(&mut self.genv, std::mem::take(&mut pending.deferred));
                    self.stats = pending.stats;
                    info!(
                        generation = self.stats.generation,
                        reused = self.stats.reused,
                        installed = self.stats.installed,
                        torn_down = self.stats.torn_down,
                        boxes_run = self.stats.boxes_run,
                        live_vertices = self.genv.graph.live_count(),
                        "update complete"
                    );
                    return Ok(self.stats);
                }
            }
        }
    }

    /// Load a declared-signature batch and propagate its effect
    pub fn load_signatures(&mut self, table: &SignatureTable) -> Result<()> {
        self.genv.load_signatures(table)?;
        if self.pending.is_none() {
            self.pending = Some(Pending {
                step: Step::SettleRetired,
                retired: None,
                deferred: Vec::new(),
                stats: UpdateStats {
                    generation: self.generation,
                    ..UpdateStats::default()
                },
                rederive_rounds: 0,
            });
        }
        self.settle().map(|_| ())
    }

    pub fn summary(&self) -> ProgramSummary {
        summary::build(&self.genv)
    }

    /// Diagnostics of every box of the installed tree, in pre-order of the
    /// nodes that own them
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let Some(current) = &self.current else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for node in current.tree.root().preorder() {
            let Some(state) = current.state(node.id) else {
                continue;
            };
            for id in &state.graph.owned.boxes {
                let Some(data) = self.genv.boxes.get(*id) else {
                    continue;
                };
                out.extend(data.diagnostics().iter().map(|d| Diagnostic {
                    node: node.id,
                    span: node.span,
                    kind: d.kind,
                    provenance: data.kind.provenance(),
                    message: d.message.clone(),
                }));
            }
        }
        out
    }

    pub fn tree(&self) -> Option<&SyntaxTree> {
        self.current.as_ref().map(|c| &c.tree)
    }

    /// Innermost node covering `pos`
    pub fn node_at(&self, pos: Pos) -> Option<&Node> {
        self.tree()?.node_at(pos)
    }

    /// Converged type of a node's value
    pub fn node_type(&self, id: NodeId) -> Option<Type> {
        let ret = self.current.as_ref()?.state(id)?.graph.ret?;
        Some(self.genv.vertex_type(ret))
    }

    /// Printable type of the innermost node at `pos`
    pub fn hover(&self, pos: Pos) -> Option<String> {
        let node = self.node_at(pos)?;
        let ret = self.current.as_ref()?.state(node.id)?.graph.ret?;
        Some(self.genv.show_vertex(ret))
    }

    pub fn phase(&self, id: NodeId) -> Option<Phase> {
        Some(self.current.as_ref()?.state(id)?.phase)
    }

    /// Vertices and boxes held by the subtree at `id`
    pub fn reachable(&self, id: NodeId) -> Option<Reachable> {
        let current = self.current.as_ref()?;
        let node = current.tree.find(id)?;
        let mut reachable = Reachable::default();
        current.held_by(&self.genv, node, &mut reachable.vertices, &mut reachable.boxes);
        Some(reachable)
    }

    pub fn is_box_live(&self, id: BoxId) -> bool {
        self.genv.boxes.contains(id)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn stats(&self) -> UpdateStats {
        self.stats
    }

    pub fn config(&self) -> &AnalysisConfig {
        self.genv.config()
    }

    pub fn genv(&self) -> &Genv {
        &self.genv
    }

    pub fn graph(&self) -> &Graph {
        self.genv.graph()
    }

    pub fn entities(&self) -> &EntityTable {
        self.genv.entities()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::ast::Params;

    #[test]
    fn test_first_update_installs_everything() {
        let mut session = Session::default();
        let tree = SyntaxTree::new(stmts(vec![lasgn("x", int(1)), lvar("x")]));
        let len = tree.len();
        let stats = session.update(tree).unwrap();
        assert_eq!(stats.generation, 1);
        assert_eq!(stats.installed, len);
        assert_eq!(stats.reused, 0);
        assert_eq!(session.node_type(NodeId(3)), Some(Type::integer()));
    }

    #[test]
    fn test_identical_update_reuses_everything() {
        let mut session = Session::default();
        let make = || {
            SyntaxTree::new(stmts(vec![def(
                "id",
                Params::required(&["v"]),
                vec![lvar("v")],
            )]))
        };
        session.update(make()).unwrap();
        let live = session.graph().live_count();
        let stats = session.update(make()).unwrap();
        assert_eq!(stats.installed, 0);
        assert_eq!(stats.torn_down, 0);
        assert_eq!(session.graph().live_count(), live);
        assert_eq!(session.phase(NodeId(1)), Some(Phase::Reused));
    }

    #[test]
    fn test_unsupported_keeps_previous_tree() {
        let mut session = Session::default();
        session
            .update(SyntaxTree::new(stmts(vec![lasgn("x", int(1))])))
            .unwrap();
        let err = session
            .update(SyntaxTree::new(stmts(vec![yield_(vec![])])))
            .unwrap_err();
        assert!(matches!(err, CoreError::Unsupported { .. }));
        assert_eq!(session.stats().generation, 1);
        assert_eq!(session.node_type(NodeId(2)), Some(Type::integer()));
    }
}
