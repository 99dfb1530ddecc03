//! Installing syntax trees into the global environment
//!
//! A tree moves through `define` (static facts into the entity tables),
//! `install` (vertices, edges and boxes into the graph) and, once replaced,
//! `undefine` and a two-phase `uninstall`. Between trees, [`diff`] decides
//! which nodes keep their graph objects.

mod define;
pub(crate) mod diff;
mod lenv;
mod nodes;

use crate::ast::{Node, NodeId, SyntaxTree};
use crate::entity::Origin;
use crate::genv::{Genv, StaticFact};
use crate::graph::Target;
use crate::ids::{BoxId, ContainerId, MethodDefId, ProcId, VertexId};
use crate::name::Name;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

pub(crate) use define::Definer;
pub(crate) use diff::{Differ, Match, ReuseMap};
pub(crate) use nodes::Installer;

use lenv::Effects;

/// Lifecycle of one node's analysis state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Unbound,
    Defined,
    Installed,
    /// Graph objects adopted from the previous tree
    Reused,
    TornDown,
}

/// Scope objects a node creates that its descendants may point at. When a
/// node is reinstalled around reused children, these carry over.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ScopeKey {
    SelfVertex,
    Method,
    Proc,
    RestContainer,
    RestSource,
    KwrestKey,
    KwrestContainer,
    KwrestSource,
    Loop(Name),
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Slot {
    Vertex(VertexId),
    Method(MethodDefId),
    Proc(ProcId),
    Container(ContainerId),
}

/// Graph objects a node owns outright
#[derive(Debug, Default)]
pub(crate) struct Owned {
    pub vertices: Vec<VertexId>,
    pub edges: Vec<(VertexId, Target)>,
    pub boxes: Vec<BoxId>,
    pub method_defs: Vec<MethodDefId>,
    pub containers: Vec<ContainerId>,
}

impl Owned {
    fn is_empty(&self) -> bool {
        self.vertices.is_empty()
            && self.edges.is_empty()
            && self.boxes.is_empty()
            && self.method_defs.is_empty()
            && self.containers.is_empty()
    }
}

/// The part of a node's state that moves to its successor on reuse
#[derive(Debug, Default)]
pub(crate) struct GraphState {
    pub ret: Option<VertexId>,
    pub owned: Owned,
    pub slots: IndexMap<ScopeKey, Slot>,
    pub effects: Effects,
}

#[derive(Debug, Default)]
pub(crate) struct NodeState {
    pub phase: Phase,
    pub facts: Vec<(Origin, StaticFact)>,
    /// Namespace a class, module or constant write refers to
    pub module: Option<crate::ids::ModId>,
    pub graph: GraphState,
}

/// A tree together with the analysis state of each of its nodes
#[derive(Debug)]
pub(crate) struct InstalledTree {
    pub tree: SyntaxTree,
    pub generation: u32,
    pub states: Vec<NodeState>,
    pub unassigned: HashSet<NodeId>,
}

impl InstalledTree {
    pub fn new(tree: SyntaxTree, generation: u32) -> Self {
        let unassigned = crate::flow::maybe_unassigned(tree.root());
        let states = (0..tree.len()).map(|_| NodeState::default()).collect();
        Self {
            tree,
            generation,
            states,
            unassigned,
        }
    }

    pub fn state(&self, id: NodeId) -> Option<&NodeState> {
        self.states.get(id.index())
    }

    /// Vertices and boxes held by the subtree at `node`
    pub fn held_by(
        &self,
        genv: &Genv,
        node: &Node,
        vertices: &mut Vec<VertexId>,
        boxes: &mut Vec<BoxId>,
    ) {
        for n in node.preorder() {
            let Some(state) = self.state(n.id) else {
                continue;
            };
            let graph = &state.graph;
            vertices.extend(graph.ret);
            vertices.extend(graph.owned.vertices.iter().copied());
            boxes.extend(graph.owned.boxes.iter().copied());
            for slot in graph.slots.values() {
                match slot {
                    Slot::Vertex(v) => vertices.push(*v),
                    Slot::Method(id) => {
                        if let Some(def) = genv.method_defs.get(*id) {
                            vertices.extend(def.vertices());
                        }
                    }
                    Slot::Proc(id) => {
                        if let Some(data) = genv.procs.get(*id) {
                            vertices.extend(data.params.iter().copied());
                            vertices.push(data.ret);
                        }
                    }
                    Slot::Container(_) => {}
                }
            }
        }
        vertices.sort();
        vertices.dedup();
    }
}

/// Withdraw every static fact of a tree
pub(crate) fn undefine(genv: &mut Genv, states: &mut [NodeState]) {
    for state in states.iter_mut() {
        for (origin, fact) in state.facts.drain(..) {
            genv.apply_fact(origin, &fact, false);
        }
    }
}

/// What tearing down a tree leaves for the later phases
#[derive(Debug, Default)]
pub(crate) struct Retracted {
    /// Vertices to free once the driver has settled
    pub deferred: Vec<VertexId>,
    /// Surviving vertices that lost an inbound edge
    pub frontier: Vec<VertexId>,
    pub torn_down: usize,
}

/// First uninstall phase: retract edges, boxes, methods and closures of
/// every node not adopted by the next tree
pub(crate) fn retract(genv: &mut Genv, tree: &mut InstalledTree) -> Retracted {
    let mut out = Retracted::default();
    for node in tree.tree.root().preorder() {
        let Some(state) = tree.states.get_mut(node.id.index()) else {
            continue;
        };
        if state.phase == Phase::Reused {
            continue;
        }
        let graph = std::mem::take(&mut state.graph);
        if graph.ret.is_some() || !graph.owned.is_empty() || !graph.slots.is_empty() {
            out.torn_down += 1;
        }
        release_owned(genv, graph.owned, &mut out);
        release_slots(genv, graph.slots, &mut out.deferred);
        state.phase = Phase::TornDown;
    }
    debug!(
        generation = tree.generation,
        torn_down = out.torn_down,
        deferred = out.deferred.len(),
        frontier = out.frontier.len(),
        "tree retracted"
    );
    out
}

fn release_owned(genv: &mut Genv, owned: Owned, out: &mut Retracted) {
    for id in owned.boxes {
        out.frontier.extend(genv.box_targets(id));
        out.deferred.extend(genv.destroy_box(id));
    }
    for (from, to) in owned.edges {
        if genv.graph.remove_edge(from, to) {
            if let Target::Vertex(v) = to {
                out.frontier.push(v);
            }
        }
    }
    for id in owned.method_defs {
        genv.remove_method_def(id);
    }
    for id in owned.containers {
        genv.containers.remove(id);
    }
    out.deferred.extend(owned.vertices);
}

fn release_slots(genv: &mut Genv, slots: IndexMap<ScopeKey, Slot>, deferred: &mut Vec<VertexId>) {
    for slot in slots.into_values() {
        match slot {
            Slot::Vertex(v) => deferred.push(v),
            Slot::Method(id) => {
                if let Some(def) = genv.method_defs.get(id) {
                    deferred.extend(def.vertices());
                }
                genv.remove_method_def(id);
            }
            Slot::Proc(id) => {
                if let Some(data) = genv.procs.remove(id) {
                    deferred.extend(data.params);
                    deferred.push(data.ret);
                }
            }
            Slot::Container(id) => {
                genv.containers.remove(id);
            }
        }
    }
}

/// Second uninstall phase
pub(crate) fn free_vertices(genv: &mut Genv, vertices: Vec<VertexId>) {
    for v in vertices {
        if genv.graph.is_live(v) {
            genv.graph.free_vertex(v);
        }
    }
}
