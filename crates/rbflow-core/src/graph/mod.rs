//! Type-flow graph
//!
//! Vertices accumulate types; sources inject fixed types and accept no
//! inbound edges. Every type held by a vertex remembers which upstream
//! vertices contributed it, so removal can be propagated precisely:
//! - adding an edge forwards the source's current types, and each vertex
//!   forwards only the types that were new to it
//! - removing an edge withdraws one contribution per type, and a vertex
//!   forwards the removal only for types left with no contributor
//! - types kept alive solely by a cycle of vertices are found afterwards and
//!   retracted (delete, then re-derive from outside support)

use crate::arena::Arena;
use crate::ids::{BoxId, VertexId};
use crate::types::Type;
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashSet, VecDeque};
use tracing::{trace, warn};

/// Edge endpoint: another vertex or a box that reruns when inputs change
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Target {
    Vertex(VertexId),
    Box(BoxId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexKind {
    Vertex,
    Source,
}

#[derive(Debug)]
struct VertexData {
    kind: VertexKind,
    label: &'static str,
    types: IndexMap<Type, IndexSet<VertexId>>,
    /// Successor with the number of owners holding the edge
    next: IndexMap<Target, u32>,
    inbound: IndexSet<VertexId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delta {
    Add,
    Remove,
}

struct Pending {
    from: VertexId,
    to: Target,
    types: Vec<Type>,
    delta: Delta,
}

/// Counters for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub edges_added: usize,
    pub edges_removed: usize,
    pub cyclic_retractions: usize,
}

#[derive(Debug, Default)]
pub struct Graph {
    vertices: Arena<VertexId, VertexData>,
    notified: Vec<BoxId>,
    stats: GraphStats,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_vertex(&mut self, label: &'static str) -> VertexId {
        self.vertices.alloc(VertexData {
            kind: VertexKind::Vertex,
            label,
            types: IndexMap::new(),
            next: IndexMap::new(),
            inbound: IndexSet::new(),
        })
    }

    /// Immutable vertex holding `types`; unions are split into members
    pub fn new_source(&mut self, ty: Type, label: &'static str) -> VertexId {
        let id = self.vertices.next_id();
        let mut types = IndexMap::new();
        for member in ty.members() {
            types.insert(member, IndexSet::from([id]));
        }
        self.vertices.alloc(VertexData {
            kind: VertexKind::Source,
            label,
            types,
            next: IndexMap::new(),
            inbound: IndexSet::new(),
        })
    }

    pub fn is_live(&self, v: VertexId) -> bool {
        self.vertices.contains(v)
    }

    pub fn kind(&self, v: VertexId) -> Option<VertexKind> {
        self.vertices.get(v).map(|d| d.kind)
    }

    pub fn label(&self, v: VertexId) -> &'static str {
        self.vertices.get(v).map(|d| d.label).unwrap_or("freed")
    }

    pub fn live_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn stats(&self) -> GraphStats {
        self.stats
    }

    pub fn types(&self, v: VertexId) -> impl Iterator<Item = &Type> {
        self.vertices
            .get(v)
            .into_iter()
            .flat_map(|d| d.types.keys())
    }

    pub fn holds(&self, v: VertexId, ty: &Type) -> bool {
        self.vertices
            .get(v)
            .is_some_and(|d| d.types.contains_key(ty))
    }

    /// Union of everything the vertex currently holds
    pub fn union_of(&self, v: VertexId) -> Type {
        Type::union_all(self.types(v).cloned())
    }

    /// Number of distinct contributors currently keeping `ty` alive at `v`
    pub fn contributor_count(&self, v: VertexId, ty: &Type) -> usize {
        self.vertices
            .get(v)
            .and_then(|d| d.types.get(ty))
            .map_or(0, IndexSet::len)
    }

    pub fn successors(&self, v: VertexId) -> Vec<Target> {
        self.vertices
            .get(v)
            .map(|d| d.next.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn has_edge(&self, from: VertexId, to: Target) -> bool {
        self.vertices
            .get(from)
            .is_some_and(|d| d.next.contains_key(&to))
    }

    /// Boxes whose inputs changed since the last drain
    pub fn drain_notified(&mut self) -> Vec<BoxId> {
        std::mem::take(&mut self.notified)
    }

    /// Add one ownership of an edge. Returns true only when the edge did
    /// not exist before; a repeated add just bumps its owner count.
    pub fn add_edge(&mut self, from: VertexId, to: Target) -> bool {
        if let Target::Vertex(v) = to {
            match self.vertices.get(v) {
                None => return false,
                Some(d) if d.kind == VertexKind::Source => {
                    warn!(from = %from, to = %v, "rejected edge into a source vertex");
                    return false;
                }
                Some(_) => {}
            }
        }
        let Some(src) = self.vertices.get_mut(from) else {
            return false;
        };
        if let Some(owners) = src.next.get_mut(&to) {
            *owners += 1;
            return false;
        }
        src.next.insert(to, 1);
        let types: Vec<Type> = src.types.keys().cloned().collect();
        self.stats.edges_added += 1;
        if let Target::Vertex(v) = to {
            if let Some(dst) = self.vertices.get_mut(v) {
                dst.inbound.insert(from);
            }
            if !types.is_empty() {
                self.propagate(vec![Pending {
                    from,
                    to,
                    types,
                    delta: Delta::Add,
                }]);
            }
        }
        true
    }

    /// Drop one ownership of an edge; the edge goes away with its last owner
    pub fn remove_edge(&mut self, from: VertexId, to: Target) -> bool {
        self.drop_edge(from, to, false)
    }

    fn drop_edge(&mut self, from: VertexId, to: Target, force: bool) -> bool {
        let Some(src) = self.vertices.get_mut(from) else {
            return false;
        };
        match src.next.get_mut(&to) {
            None => return false,
            Some(owners) if *owners > 1 && !force => {
                *owners -= 1;
                return false;
            }
            Some(_) => {
                src.next.shift_remove(&to);
            }
        }
        let types: Vec<Type> = src.types.keys().cloned().collect();
        self.stats.edges_removed += 1;
        match to {
            Target::Box(b) => {
                if !types.is_empty() {
                    self.notified.push(b);
                }
            }
            Target::Vertex(v) => {
                if let Some(dst) = self.vertices.get_mut(v) {
                    dst.inbound.shift_remove(&from);
                }
                if !types.is_empty() {
                    self.propagate(vec![Pending {
                        from,
                        to,
                        types,
                        delta: Delta::Remove,
                    }]);
                }
            }
        }
        true
    }

    /// Drop a vertex; any edge still attached is detached first
    pub fn free_vertex(&mut self, v: VertexId) {
        let Some(data) = self.vertices.get(v) else {
            return;
        };
        let next: Vec<Target> = data.next.keys().copied().collect();
        let inbound: Vec<VertexId> = data.inbound.iter().copied().collect();
        if !next.is_empty() || !inbound.is_empty() {
            warn!(
                vertex = %v,
                label = data.label,
                outgoing = next.len(),
                incoming = inbound.len(),
                "freeing vertex with live edges"
            );
        }
        self.detach(v);
        self.vertices.remove(v);
    }

    /// Remove every edge touching `v` regardless of owner counts
    fn detach(&mut self, v: VertexId) {
        let Some(data) = self.vertices.get(v) else {
            return;
        };
        let next: Vec<Target> = data.next.keys().copied().collect();
        let inbound: Vec<VertexId> = data.inbound.iter().copied().collect();
        for from in inbound {
            self.drop_edge(from, Target::Vertex(v), true);
        }
        for to in next {
            self.drop_edge(v, to, true);
        }
    }

    fn propagate(&mut self, initial: Vec<Pending>) {
        let mut queue: VecDeque<Pending> = initial.into();
        let mut suspects: IndexSet<(VertexId, Type)> = IndexSet::new();
        while let Some(p) = queue.pop_front() {
            let v = match p.to {
                Target::Box(b) => {
                    self.notified.push(b);
                    continue;
                }
                Target::Vertex(v) => v,
            };
            let Some(data) = self.vertices.get_mut(v) else {
                continue;
            };
            let mut changed = Vec::new();
            for ty in p.types {
                match p.delta {
                    Delta::Add => {
                        let contributors = data.types.entry(ty.clone()).or_default();
                        let fresh = contributors.is_empty();
                        contributors.insert(p.from);
                        if fresh {
                            changed.push(ty);
                        }
                    }
                    Delta::Remove => {
                        if let Some(contributors) = data.types.get_mut(&ty) {
                            contributors.shift_remove(&p.from);
                            if contributors.is_empty() {
                                data.types.shift_remove(&ty);
                                changed.push(ty);
                            } else {
                                suspects.insert((v, ty));
                            }
                        }
                    }
                }
            }
            if changed.is_empty() {
                continue;
            }
            trace!(vertex = %v, label = data.label, count = changed.len(), delta = ?p.delta, "propagate");
            for target in data.next.keys() {
                queue.push_back(Pending {
                    from: v,
                    to: *target,
                    types: changed.clone(),
                    delta: p.delta,
                });
            }
        }
        if !suspects.is_empty() {
            self.retract_unsupported(suspects);
        }
    }

    /// Vertices downstream of `start` (inclusive) that hold `ty`
    fn region(&self, start: VertexId, ty: &Type) -> IndexSet<VertexId> {
        let mut region = IndexSet::new();
        let mut stack = vec![start];
        while let Some(v) = stack.pop() {
            if !self.holds(v, ty) || !region.insert(v) {
                continue;
            }
            if let Some(data) = self.vertices.get(v) {
                stack.extend(data.next.keys().filter_map(|t| match t {
                    Target::Vertex(w) => Some(*w),
                    Target::Box(_) => None,
                }));
            }
        }
        region
    }

    /// A vertex that lost a contribution but still holds the type may only
    /// be fed by its own downstream cycle. Find the part of its region with
    /// no support from outside and retract the type there.
    fn retract_unsupported(&mut self, suspects: IndexSet<(VertexId, Type)>) {
        let mut pending = Vec::new();
        for (start, ty) in suspects {
            if !self.holds(start, &ty) {
                continue;
            }
            let region = self.region(start, &ty);
            let mut supported: HashSet<VertexId> = HashSet::new();
            let mut grew = true;
            while grew {
                grew = false;
                for &v in &region {
                    if supported.contains(&v) {
                        continue;
                    }
                    let backed = self
                        .vertices
                        .get(v)
                        .and_then(|d| d.types.get(&ty))
                        .is_some_and(|cs| {
                            cs.iter()
                                .any(|c| !region.contains(c) || supported.contains(c))
                        });
                    if backed {
                        supported.insert(v);
                        grew = true;
                    }
                }
            }
            let doomed: IndexSet<VertexId> = region
                .into_iter()
                .filter(|v| !supported.contains(v))
                .collect();
            if doomed.is_empty() {
                continue;
            }
            trace!(start = %start, count = doomed.len(), "retracting cyclic support");
            self.stats.cyclic_retractions += 1;
            for &v in &doomed {
                if let Some(data) = self.vertices.get_mut(v) {
                    data.types.shift_remove(&ty);
                }
            }
            for &v in &doomed {
                for target in self.successors(v) {
                    match target {
                        Target::Vertex(w) if doomed.contains(&w) => {}
                        _ => pending.push(Pending {
                            from: v,
                            to: target,
                            types: vec![ty.clone()],
                            delta: Delta::Remove,
                        }),
                    }
                }
            }
        }
        if !pending.is_empty() {
            self.propagate(pending);
        }
    }

    /// Structural check used by tests and debug assertions: every edge has
    /// both endpoints, and every contributor is a live upstream neighbour
    pub fn check_integrity(&self) -> Result<(), String> {
        for (id, data) in self.vertices.iter() {
            for target in data.next.keys() {
                if let Target::Vertex(w) = target {
                    let Some(dst) = self.vertices.get(*w) else {
                        return Err(format!("{id} has an edge to freed {w}"));
                    };
                    if !dst.inbound.contains(&id) {
                        return Err(format!("{w} is missing inbound {id}"));
                    }
                }
            }
            for (ty, contributors) in &data.types {
                for c in contributors {
                    let ok = *c == id
                        || self
                            .vertices
                            .get(*c)
                            .is_some_and(|d| {
                                d.next.contains_key(&Target::Vertex(id)) && d.types.contains_key(ty)
                            });
                    if !ok {
                        return Err(format!("{id} holds {ty:?} from stale contributor {c}"));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(graph: &mut Graph) -> VertexId {
        graph.new_vertex("test")
    }

    #[test]
    fn test_add_edge_forwards_existing_types() {
        let mut g = Graph::new();
        let src = g.new_source(Type::integer(), "lit");
        let a = v(&mut g);
        let b = v(&mut g);
        g.add_edge(a, Target::Vertex(b));
        g.add_edge(src, Target::Vertex(a));
        assert_eq!(g.union_of(b), Type::integer());
    }

    #[test]
    fn test_source_rejects_inbound() {
        let mut g = Graph::new();
        let src = g.new_source(Type::integer(), "lit");
        let a = v(&mut g);
        assert!(!g.add_edge(a, Target::Vertex(src)));
    }

    #[test]
    fn test_removal_waits_for_last_contributor() {
        let mut g = Graph::new();
        let s1 = g.new_source(Type::integer(), "one");
        let s2 = g.new_source(Type::integer(), "two");
        let a = v(&mut g);
        let b = v(&mut g);
        g.add_edge(s1, Target::Vertex(a));
        g.add_edge(s2, Target::Vertex(a));
        g.add_edge(a, Target::Vertex(b));
        assert_eq!(g.contributor_count(a, &Type::integer()), 2);

        g.remove_edge(s1, Target::Vertex(a));
        assert_eq!(g.union_of(b), Type::integer());
        g.remove_edge(s2, Target::Vertex(a));
        assert_eq!(g.union_of(a), Type::Bot);
        assert_eq!(g.union_of(b), Type::Bot);
        g.check_integrity().unwrap();
    }

    #[test]
    fn test_cycle_reaches_fixpoint() {
        let mut g = Graph::new();
        let src = g.new_source(Type::string(), "lit");
        let a = v(&mut g);
        let b = v(&mut g);
        g.add_edge(a, Target::Vertex(b));
        g.add_edge(b, Target::Vertex(a));
        g.add_edge(src, Target::Vertex(a));
        assert_eq!(g.union_of(a), Type::string());
        assert_eq!(g.union_of(b), Type::string());
    }

    #[test]
    fn test_cycle_does_not_keep_retracted_type() {
        let mut g = Graph::new();
        let src = g.new_source(Type::integer(), "lit");
        let a = v(&mut g);
        let b = v(&mut g);
        let out = v(&mut g);
        g.add_edge(src, Target::Vertex(a));
        g.add_edge(a, Target::Vertex(b));
        g.add_edge(b, Target::Vertex(a));
        g.add_edge(b, Target::Vertex(out));

        g.remove_edge(src, Target::Vertex(a));
        assert_eq!(g.union_of(a), Type::Bot);
        assert_eq!(g.union_of(b), Type::Bot);
        assert_eq!(g.union_of(out), Type::Bot);
        assert!(g.stats().cyclic_retractions > 0);
        g.check_integrity().unwrap();
    }

    #[test]
    fn test_cycle_keeps_type_with_outside_support() {
        let mut g = Graph::new();
        let s1 = g.new_source(Type::integer(), "one");
        let s2 = g.new_source(Type::integer(), "two");
        let a = v(&mut g);
        let b = v(&mut g);
        g.add_edge(s1, Target::Vertex(a));
        g.add_edge(s2, Target::Vertex(b));
        g.add_edge(a, Target::Vertex(b));
        g.add_edge(b, Target::Vertex(a));

        g.remove_edge(s1, Target::Vertex(a));
        assert_eq!(g.union_of(a), Type::integer());
        assert_eq!(g.union_of(b), Type::integer());
        g.check_integrity().unwrap();
    }

    #[test]
    fn test_box_targets_are_notified() {
        let mut g = Graph::new();
        let src = g.new_source(Type::integer(), "lit");
        let a = v(&mut g);
        g.add_edge(a, Target::Box(BoxId(3)));
        assert!(g.drain_notified().is_empty());
        g.add_edge(src, Target::Vertex(a));
        assert_eq!(g.drain_notified(), vec![BoxId(3)]);
    }

    #[test]
    fn test_shared_edge_survives_one_owner() {
        let mut g = Graph::new();
        let src = g.new_source(Type::integer(), "lit");
        let a = v(&mut g);
        assert!(g.add_edge(src, Target::Vertex(a)));
        assert!(!g.add_edge(src, Target::Vertex(a)));
        assert!(!g.remove_edge(src, Target::Vertex(a)));
        assert_eq!(g.union_of(a), Type::integer());
        assert!(g.remove_edge(src, Target::Vertex(a)));
        assert_eq!(g.union_of(a), Type::Bot);
    }

    #[test]
    fn test_free_vertex_detaches_edges() {
        let mut g = Graph::new();
        let src = g.new_source(Type::integer(), "lit");
        let a = v(&mut g);
        let b = v(&mut g);
        g.add_edge(src, Target::Vertex(a));
        g.add_edge(a, Target::Vertex(b));
        g.free_vertex(a);
        assert!(!g.is_live(a));
        assert_eq!(g.union_of(b), Type::Bot);
        g.check_integrity().unwrap();
    }
}
