//! The global environment of one analysis session
//!
//! Everything the engine mutates lives here: the flow graph, entity tables,
//! boxes and the run queue, plus the arenas for inferred method records,
//! block closures and scope-local containers. One `Genv` belongs to exactly
//! one session.

use crate::arena::Arena;
use crate::boxes::{self, BoxData, BoxKind, MutationRegistry, Plan, PlanSource};
use crate::config::AnalysisConfig;
use crate::entity::core::{core_table, declare_object, CORE_BATCH};
use crate::entity::{ConstRef, EntityTable, ModuleKind, Origin};
use crate::error::Result;
use crate::graph::{Graph, Target};
use crate::ids::{BoxId, ContainerId, MethodDefId, ModId, ProcId, VertexId};
use crate::name::Name;
use crate::signatures::SignatureTable;
use crate::types::{
    globalize, sig_to_type, ContainerShape, ContainerView, ShapeKind, Type, TypeNames,
};
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info, trace};

/// Index key under which a box waits for entity changes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum DepKey {
    Method(Name),
    Const(Name),
    Ivar(Name),
    Gvar(Name),
}

impl DepKey {
    /// Whether a change to the class hierarchy can alter this lookup
    fn follows_hierarchy(&self) -> bool {
        !matches!(self, DepKey::Gvar(_))
    }
}

/// A static fact contributed by a syntax node during `define`
#[derive(Debug, Clone)]
pub(crate) enum StaticFact {
    ModuleDef { module: ModId, kind: ModuleKind },
    Superclass { module: ModId, reference: ConstRef },
    Include { module: ModId, refs: Vec<ConstRef> },
    ConstDef { owner: ModId, name: Name },
    IvarDef { owner: ModId, singleton: bool, name: Name },
    GvarDef { name: Name },
}

/// Inferred method record: formal vertices plus the return vertex
#[derive(Debug, Clone)]
pub(crate) struct MethodDef {
    pub owner: ModId,
    pub singleton: bool,
    pub name: Name,
    pub required: Vec<VertexId>,
    pub optional: Vec<VertexId>,
    /// Element vertex of the rest parameter
    pub rest: Option<VertexId>,
    /// Keyword vertex and whether the keyword is required
    pub keywords: IndexMap<Name, (VertexId, bool)>,
    /// Value vertex of the keyword-rest parameter
    pub kwrest: Option<VertexId>,
    pub block: VertexId,
    pub ret: VertexId,
}

impl MethodDef {
    pub fn accepts_positional(&self, count: usize) -> bool {
        count >= self.required.len()
            && (self.rest.is_some() || count <= self.required.len() + self.optional.len())
    }

    /// Every formal, block and return vertex of the definition
    pub fn vertices(&self) -> Vec<VertexId> {
        self.required
            .iter()
            .chain(&self.optional)
            .copied()
            .chain(self.rest)
            .chain(self.keywords.values().map(|(v, _)| *v))
            .chain(self.kwrest)
            .chain([self.block, self.ret])
            .collect()
    }

    pub fn positional(&self, index: usize) -> Option<VertexId> {
        let optional_end = self.required.len() + self.optional.len();
        if index < self.required.len() {
            self.required.get(index).copied()
        } else if index < optional_end {
            self.optional.get(index - self.required.len()).copied()
        } else {
            self.rest
        }
    }
}

/// A block closure: parameter vertices and the value of its body
#[derive(Debug, Clone)]
pub(crate) struct ProcData {
    pub params: Vec<VertexId>,
    pub ret: VertexId,
}

#[derive(Debug, Clone)]
pub(crate) enum ContainerKind {
    /// Element vertices of the literal plus everything added later
    Array {
        elems: Vec<VertexId>,
        extra: VertexId,
    },
    /// Symbol-keyed literal fields plus everything stored later
    Hash {
        fields: Vec<(Type, VertexId)>,
        extra_key: VertexId,
        extra_value: VertexId,
    },
}

/// A scope-local mutable array or hash, keyed by its allocation site
#[derive(Debug, Clone)]
pub(crate) struct Container {
    pub base: ModId,
    pub kind: ContainerKind,
}

impl Container {
    /// Every vertex whose contents shape this container
    pub fn vertices(&self) -> Vec<VertexId> {
        match &self.kind {
            ContainerKind::Array { elems, extra } => {
                elems.iter().copied().chain(Some(*extra)).collect()
            }
            ContainerKind::Hash {
                fields,
                extra_key,
                extra_value,
            } => fields
                .iter()
                .map(|(_, v)| *v)
                .chain([*extra_key, *extra_value])
                .collect(),
        }
    }

    /// Vertices allocated for the container itself rather than borrowed
    /// from literal elements
    pub fn own_vertices(&self) -> Vec<VertexId> {
        match &self.kind {
            ContainerKind::Array { extra, .. } => vec![*extra],
            ContainerKind::Hash {
                extra_key,
                extra_value,
                ..
            } => vec![*extra_key, *extra_value],
        }
    }
}

/// Counters for one driver pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub boxes_run: usize,
    pub max_queue_len: usize,
}

pub struct Genv {
    pub(crate) config: AnalysisConfig,
    pub(crate) graph: Graph,
    pub(crate) entities: EntityTable,
    pub(crate) boxes: Arena<BoxId, BoxData>,
    pub(crate) method_defs: Arena<MethodDefId, MethodDef>,
    pub(crate) procs: Arena<ProcId, ProcData>,
    pub(crate) containers: Arena<ContainerId, Container>,
    pub(crate) mutations: MutationRegistry,
    queue: VecDeque<BoxId>,
    queued: HashSet<BoxId>,
    dependents: HashMap<DepKey, IndexSet<BoxId>>,
    next_batch: u32,
    /// Targets of edges dropped by box reruns, collected while a replaced
    /// tree is being retired
    frontier: Option<Vec<VertexId>>,
}

impl Genv {
    /// Environment with the core library loaded
    pub fn new(config: AnalysisConfig) -> Self {
        let mut genv = Self {
            config,
            graph: Graph::new(),
            entities: EntityTable::new(),
            boxes: Arena::default(),
            method_defs: Arena::default(),
            procs: Arena::default(),
            containers: Arena::default(),
            mutations: MutationRegistry::new(),
            queue: VecDeque::new(),
            queued: HashSet::new(),
            dependents: HashMap::new(),
            next_batch: CORE_BATCH,
            frontier: None,
        };
        declare_object(&mut genv.entities);
        // the core table is static and valid; a failure here is a bug in it
        if let Err(err) = genv.load_signatures(&core_table()) {
            tracing::error!(%err, "core library failed to load");
        }
        genv
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn entities(&self) -> &EntityTable {
        &self.entities
    }

    // ---- run queue -------------------------------------------------------

    /// Queue a box; a no-op when it is already waiting
    pub(crate) fn add_run(&mut self, id: BoxId) {
        if self.queued.insert(id) {
            self.queue.push_back(id);
        }
    }

    pub(crate) fn pop_run(&mut self) -> Option<BoxId> {
        let id = self.queue.pop_front()?;
        self.queued.remove(&id);
        Some(id)
    }

    /// Put a popped box back at the head of the queue
    pub(crate) fn push_front_run(&mut self, id: BoxId) {
        if self.queued.insert(id) {
            self.queue.push_front(id);
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    // ---- dependents ------------------------------------------------------

    fn register_dependent(&mut self, id: BoxId, keys: &[DepKey]) {
        for key in keys {
            self.dependents.entry(key.clone()).or_default().insert(id);
        }
    }

    fn unregister_dependent(&mut self, id: BoxId, keys: &[DepKey]) {
        for key in keys {
            if let Some(set) = self.dependents.get_mut(key) {
                set.shift_remove(&id);
                if set.is_empty() {
                    self.dependents.remove(key);
                }
            }
        }
    }

    pub(crate) fn touch(&mut self, key: &DepKey) {
        let waiting: Vec<BoxId> = self
            .dependents
            .get(key)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        trace!(?key, count = waiting.len(), "requeue dependents");
        for id in waiting {
            self.add_run(id);
        }
    }

    /// Requeue every lookup that walks ancestors
    pub(crate) fn touch_hierarchy(&mut self) {
        let waiting: Vec<BoxId> = self
            .dependents
            .iter()
            .filter(|(key, _)| key.follows_hierarchy())
            .flat_map(|(_, set)| set.iter().copied())
            .collect();
        debug!(count = waiting.len(), "hierarchy changed");
        for id in waiting {
            self.add_run(id);
        }
    }

    // ---- static facts ----------------------------------------------------

    /// Add or withdraw one contribution of `origin`
    pub(crate) fn apply_fact(&mut self, origin: Origin, fact: &StaticFact, add: bool) {
        match fact {
            StaticFact::ModuleDef { module, kind } => {
                let mut renamed = None;
                if let Some(m) = self.entities.module_mut(*module) {
                    let set = match kind {
                        ModuleKind::Class => &mut m.class_defs,
                        ModuleKind::Module => &mut m.module_defs,
                    };
                    toggle(set, origin, add);
                    renamed = Some(m.name.clone());
                }
                if let Some(name) = renamed {
                    self.touch(&DepKey::Const(name));
                }
                self.touch_hierarchy();
            }
            StaticFact::Superclass { module, reference } => {
                if let Some(m) = self.entities.module_mut(*module) {
                    if add {
                        m.superclass_refs.insert(origin, reference.clone());
                    } else {
                        m.superclass_refs.shift_remove(&origin);
                    }
                }
                self.touch_hierarchy();
            }
            StaticFact::Include { module, refs } => {
                if let Some(m) = self.entities.module_mut(*module) {
                    if add {
                        m.includes
                            .entry(origin)
                            .or_default()
                            .extend(refs.iter().cloned());
                    } else {
                        m.includes.shift_remove(&origin);
                    }
                }
                self.touch_hierarchy();
            }
            StaticFact::ConstDef { owner, name } => {
                if let Some(value) = self.entities.ensure_const(&mut self.graph, *owner, name) {
                    toggle(&mut value.defs, origin, add);
                }
                self.touch(&DepKey::Const(name.clone()));
            }
            StaticFact::IvarDef {
                owner,
                singleton,
                name,
            } => {
                if let Some(value) =
                    self.entities
                        .ensure_ivar(&mut self.graph, *owner, *singleton, name)
                {
                    toggle(&mut value.defs, origin, add);
                }
                self.touch(&DepKey::Ivar(name.clone()));
            }
            StaticFact::GvarDef { name } => {
                let value = self.entities.ensure_global(&mut self.graph, name);
                toggle(&mut value.defs, origin, add);
                self.touch(&DepKey::Gvar(name.clone()));
            }
        }
    }

    // ---- declarations ----------------------------------------------------

    /// Load a signature table as a new declaration batch
    pub fn load_signatures(&mut self, table: &SignatureTable) -> Result<()> {
        table.validate()?;
        let batch = self.next_batch;
        self.next_batch += 1;
        let origin = Origin::Decl(batch);
        let depth = self.config.max_type_depth;

        for decl in &table.modules {
            let id = self.entities.ensure_path(&decl.path);
            if let Some(m) = self.entities.module_mut(id) {
                m.builtin |= batch == CORE_BATCH;
                m.decl_kinds.insert(origin, decl.kind);
                if let Some(sup) = &decl.superclass {
                    m.declared_superclass.insert(origin, sup.clone());
                }
                if !decl.includes.is_empty() {
                    m.declared_includes.insert(origin, decl.includes.clone());
                }
                if !decl.type_params.is_empty() {
                    m.type_params = decl.type_params.clone();
                }
            }
        }
        for alias in &table.aliases {
            self.entities
                .aliases
                .insert(alias.name.clone(), alias.ty.clone());
        }
        for decl in &table.methods {
            let owner = self.entities.ensure_path(&decl.path);
            if let Some(entry) = self.entities.method_entry(owner, decl.singleton, &decl.name) {
                entry
                    .decls
                    .entry(origin)
                    .or_default()
                    .extend(decl.overloads.iter().cloned());
            }
            self.touch(&DepKey::Method(decl.name.clone()));
        }
        for decl in &table.constants {
            let owner = self.entities.ensure_path(&decl.path);
            let ty = sig_to_type(&decl.ty, &self.entities, &Type::Singleton(owner), depth);
            let source = self.graph.new_source(ty, "const-decl");
            if let Some(value) = self.entities.ensure_const(&mut self.graph, owner, &decl.name) {
                value.decls.insert(origin, source);
                let target = value.decl_vertex;
                self.graph.add_edge(source, Target::Vertex(target));
            }
            self.touch(&DepKey::Const(decl.name.clone()));
        }
        for decl in &table.ivars {
            let owner = self.entities.ensure_path(&decl.path);
            let self_type = if decl.singleton {
                Type::Singleton(owner)
            } else {
                Type::instance(owner)
            };
            let ty = sig_to_type(&decl.ty, &self.entities, &self_type, depth);
            let source = self.graph.new_source(ty, "ivar-decl");
            if let Some(value) =
                self.entities
                    .ensure_ivar(&mut self.graph, owner, decl.singleton, &decl.name)
            {
                value.decls.insert(origin, source);
                let target = value.decl_vertex;
                self.graph.add_edge(source, Target::Vertex(target));
            }
            self.touch(&DepKey::Ivar(decl.name.clone()));
        }
        for decl in &table.globals {
            let ty = sig_to_type(&decl.ty, &self.entities, &Type::instance(ModId::OBJECT), depth);
            let source = self.graph.new_source(ty, "gvar-decl");
            let value = self.entities.ensure_global(&mut self.graph, &decl.name);
            value.decls.insert(origin, source);
            let target = value.decl_vertex;
            self.graph.add_edge(source, Target::Vertex(target));
            self.touch(&DepKey::Gvar(decl.name.clone()));
        }
        self.touch_hierarchy();
        if batch == CORE_BATCH {
            debug!(entries = table.len(), "core library loaded");
        } else {
            info!(batch, entries = table.len(), "signatures loaded");
        }
        Ok(())
    }

    // ---- inferred methods, procs, containers -----------------------------

    pub(crate) fn add_method_def(&mut self, def: MethodDef) -> MethodDefId {
        let (owner, singleton, name) = (def.owner, def.singleton, def.name.clone());
        let id = self.method_defs.alloc(def);
        if let Some(entry) = self.entities.method_entry(owner, singleton, &name) {
            entry.defs.insert(id);
        }
        self.touch(&DepKey::Method(name));
        id
    }

    pub(crate) fn remove_method_def(&mut self, id: MethodDefId) {
        let Some(def) = self.method_defs.remove(id) else {
            return;
        };
        if let Some(entry) = self.entities.method_entry(def.owner, def.singleton, &def.name) {
            entry.defs.shift_remove(&id);
        }
        self.touch(&DepKey::Method(def.name));
    }

    pub(crate) fn add_proc(&mut self, data: ProcData) -> ProcId {
        self.procs.alloc(data)
    }

    pub(crate) fn add_container(&mut self, container: Container) -> ContainerId {
        self.containers.alloc(container)
    }

    /// Vertices of every container reachable inside `ty`, for watch edges
    pub(crate) fn container_vertices(&self, ty: &Type, out: &mut Vec<VertexId>) {
        let mut seen = HashSet::new();
        self.collect_container_vertices(ty, self.config.max_type_depth, &mut seen, out);
    }

    fn collect_container_vertices(
        &self,
        ty: &Type,
        depth: usize,
        seen: &mut HashSet<ContainerId>,
        out: &mut Vec<VertexId>,
    ) {
        if depth == 0 {
            return;
        }
        let Type::Local(id) = ty else {
            return;
        };
        if !seen.insert(*id) {
            return;
        }
        let Some(container) = self.containers.get(*id) else {
            return;
        };
        for v in container.vertices() {
            out.push(v);
            for inner in self.graph.types(v) {
                self.collect_container_vertices(inner, depth - 1, seen, out);
            }
        }
    }

    /// Structural form of a vertex's contents
    pub fn vertex_type(&self, v: VertexId) -> Type {
        globalize(&self.graph.union_of(v), self, self.config.max_type_depth)
    }

    /// Printable form of a vertex's contents; empty shows as `untyped`
    pub fn show_vertex(&self, v: VertexId) -> String {
        let ty = self.vertex_type(v);
        if ty.is_bot() {
            return "untyped".to_string();
        }
        ty.display(&self.entities).to_string()
    }

    pub fn show_type(&self, ty: &Type) -> String {
        globalize(ty, self, self.config.max_type_depth)
            .display(&self.entities)
            .to_string()
    }

    // ---- boxes -----------------------------------------------------------

    /// Register a box, wire its inputs and queue its first run
    pub(crate) fn new_box(&mut self, kind: BoxKind, output: VertexId) -> BoxId {
        let keys = kind.dep_keys();
        let inputs = kind.inputs();
        let id = self.boxes.alloc(BoxData::new(kind, output, inputs.clone()));
        for input in inputs {
            self.graph.add_edge(input, Target::Box(id));
        }
        self.register_dependent(id, &keys);
        self.add_run(id);
        id
    }

    /// Retract everything a box owns. Container vertices it allocated are
    /// returned so they can be freed once no other box points at them.
    pub(crate) fn destroy_box(&mut self, id: BoxId) -> Vec<VertexId> {
        let Some(data) = self.boxes.remove(id) else {
            return Vec::new();
        };
        self.unregister_dependent(id, &data.kind.dep_keys());
        for input in &data.inputs {
            self.graph.remove_edge(*input, Target::Box(id));
        }
        for (from, to) in &data.edges {
            self.graph.remove_edge(*from, *to);
        }
        for source in data.sources.values() {
            self.graph.free_vertex(*source);
        }
        let mut deferred = Vec::new();
        for container in data.locals.iter().flatten() {
            if let Some(c) = self.containers.remove(*container) {
                deferred.extend(c.own_vertices());
            }
        }
        deferred
    }

    /// Vertices a box currently routes types into
    pub(crate) fn box_targets(&self, id: BoxId) -> Vec<VertexId> {
        let Some(data) = self.boxes.get(id) else {
            return Vec::new();
        };
        data.edges
            .iter()
            .filter_map(|(_, to)| match to {
                Target::Vertex(v) => Some(*v),
                Target::Box(_) => None,
            })
            .chain(std::iter::once(data.output))
            .collect()
    }

    pub(crate) fn track_removals(&mut self) {
        self.frontier.get_or_insert_with(Vec::new);
    }

    pub(crate) fn take_frontier(&mut self) -> Vec<VertexId> {
        self.frontier.as_mut().map(std::mem::take).unwrap_or_default()
    }

    pub(crate) fn stop_tracking(&mut self) {
        self.frontier = None;
    }

    /// Delete and re-derive everything downstream of `seeds`.
    ///
    /// A box result feeds the graph through a box-owned source, so a type
    /// that circulates through a box looks externally supported to the
    /// graph. Every box reached from the seeds drops what it owns and is
    /// queued to run again; whatever still has real support comes back on
    /// the next drain. Returns the number of boxes reset.
    pub(crate) fn rederive(&mut self, seeds: Vec<VertexId>) -> usize {
        let mut seen: HashSet<VertexId> = HashSet::new();
        let mut reached: IndexSet<BoxId> = IndexSet::new();
        let mut stack = seeds;
        while let Some(v) = stack.pop() {
            if !self.graph.is_live(v) || !seen.insert(v) {
                continue;
            }
            for target in self.graph.successors(v) {
                match target {
                    Target::Vertex(w) => stack.push(w),
                    Target::Box(b) => {
                        if reached.insert(b) {
                            stack.extend(self.box_targets(b));
                        }
                    }
                }
            }
        }
        if reached.is_empty() {
            return 0;
        }
        let tracked = self.frontier.take();
        for &id in &reached {
            self.commit(id, Plan::default());
        }
        self.frontier = tracked;
        for &id in &reached {
            self.add_run(id);
        }
        debug!(region = seen.len(), boxes = reached.len(), "rederive");
        reached.len()
    }

    pub(crate) fn run_box(&mut self, id: BoxId) {
        let Some(data) = self.boxes.get(id) else {
            return;
        };
        let plan = boxes::plan(self, id, data);
        self.commit(id, plan);
    }

    /// Install the planned edges: new ones first, then drop the ones the
    /// plan no longer contains, so unchanged results cause no traffic
    fn commit(&mut self, id: BoxId, plan: Plan) {
        let Some(mut data) = self.boxes.take(id) else {
            return;
        };
        let Plan {
            mut edges,
            diagnostics,
        } = plan;

        let mut extra = Vec::new();
        for (source, _) in edges.iter_mut() {
            if let PlanSource::Localized(ty) = source {
                let local = self.localize(&mut data, ty, &mut extra);
                *source = PlanSource::Type(local);
            }
        }
        edges.extend(extra);

        let mut old_sources = std::mem::take(&mut data.sources);
        let mut sources: IndexMap<Type, VertexId> = IndexMap::new();
        let mut wanted: IndexSet<(VertexId, Target)> = IndexSet::new();
        for (source, target) in edges {
            let from = match source {
                PlanSource::Vertex(v) => v,
                PlanSource::Type(ty) | PlanSource::Localized(ty) => {
                    if ty.is_bot() {
                        continue;
                    }
                    match sources.get(&ty) {
                        Some(v) => *v,
                        None => {
                            let v = match old_sources.shift_remove(&ty) {
                                Some(v) => v,
                                None => self.graph.new_source(ty.clone(), "box-result"),
                            };
                            sources.insert(ty, v);
                            v
                        }
                    }
                }
            };
            wanted.insert((from, target));
        }

        for edge in &wanted {
            if !data.edges.contains(edge) {
                self.graph.add_edge(edge.0, edge.1);
            }
        }
        for edge in &data.edges {
            if !wanted.contains(edge) {
                self.graph.remove_edge(edge.0, edge.1);
                if let (Some(frontier), Target::Vertex(v)) = (self.frontier.as_mut(), edge.1) {
                    frontier.push(v);
                }
            }
        }
        for (_, v) in old_sources {
            self.graph.free_vertex(v);
        }
        data.edges = wanted;
        data.sources = sources;
        data.diagnostics = diagnostics;
        data.runs += 1;
        trace!(box_id = %id, kind = data.kind.label(), edges = data.edges.len(), "box run");
        self.boxes.restore(id, data);

        for notified in self.graph.drain_notified() {
            self.add_run(notified);
        }
    }

    /// Re-home a structural array or hash into a container owned by the
    /// box, so later mutation through the result is tracked
    fn localize(
        &mut self,
        data: &mut BoxData,
        ty: &Type,
        edges: &mut Vec<(PlanSource, Target)>,
    ) -> Type {
        let (slot, base) = match ty {
            Type::Array(a) => (0, a.base),
            Type::Hash(h) => (1, h.base),
            other => return other.clone(),
        };
        let existing = data.locals[slot].filter(|c| self.containers.contains(*c));
        let id = match existing {
            Some(c) => c,
            None => {
                let kind = if slot == 0 {
                    ContainerKind::Array {
                        elems: Vec::new(),
                        extra: self.graph.new_vertex("local-array"),
                    }
                } else {
                    ContainerKind::Hash {
                        fields: Vec::new(),
                        extra_key: self.graph.new_vertex("local-hash-key"),
                        extra_value: self.graph.new_vertex("local-hash-value"),
                    }
                };
                let c = self.containers.alloc(Container { base, kind });
                data.locals[slot] = Some(c);
                c
            }
        };
        if let Some(container) = self.containers.get(id) {
            match (&container.kind, ty) {
                (ContainerKind::Array { extra, .. }, Type::Array(a)) => {
                    edges.push((PlanSource::Type(a.elems.squash()), Target::Vertex(*extra)));
                }
                (
                    ContainerKind::Hash {
                        extra_key,
                        extra_value,
                        ..
                    },
                    Type::Hash(h),
                ) => {
                    edges.push((PlanSource::Type(h.key_type()), Target::Vertex(*extra_key)));
                    edges.push((PlanSource::Type(h.value_type()), Target::Vertex(*extra_value)));
                }
                _ => {}
            }
        }
        Type::Local(id)
    }
}

fn toggle(set: &mut IndexSet<Origin>, origin: Origin, add: bool) {
    if add {
        set.insert(origin);
    } else {
        set.shift_remove(&origin);
    }
}

impl ContainerView for Genv {
    fn container_shape(&self, id: ContainerId) -> Option<ContainerShape> {
        let container = self.containers.get(id)?;
        let kind = match &container.kind {
            ContainerKind::Array { elems, extra } => ShapeKind::Array {
                tuple: elems.iter().map(|v| self.graph.union_of(*v)).collect(),
                extra: self.graph.union_of(*extra),
            },
            ContainerKind::Hash {
                fields,
                extra_key,
                extra_value,
            } => ShapeKind::Hash {
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.clone(), self.graph.union_of(*v)))
                    .collect(),
                extra_key: self.graph.union_of(*extra_key),
                extra_value: self.graph.union_of(*extra_value),
            },
        };
        Some(ContainerShape {
            base: container.base,
            kind,
        })
    }
}

impl TypeNames for Genv {
    fn module_name(&self, id: ModId) -> String {
        self.entities.qualified_name(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::path;

    fn genv() -> Genv {
        Genv::new(AnalysisConfig::default())
    }

    #[test]
    fn test_core_ids_are_reserved() {
        let g = genv();
        assert_eq!(g.entities.lookup_path(&path(&["BasicObject"])), Some(ModId::BASIC_OBJECT));
        assert_eq!(g.entities.lookup_path(&path(&["Kernel"])), Some(ModId::KERNEL));
        assert_eq!(g.entities.lookup_path(&path(&["Integer"])), Some(ModId::INTEGER));
        assert_eq!(g.entities.lookup_path(&path(&["Hash"])), Some(ModId::HASH));
        assert_eq!(g.entities.lookup_path(&path(&["Enumerable"])), Some(ModId::ENUMERABLE));
    }

    #[test]
    fn test_core_hierarchy() {
        let g = genv();
        let ancestors = g.entities.ancestors(ModId::INTEGER);
        assert_eq!(
            ancestors,
            vec![
                ModId::INTEGER,
                ModId::NUMERIC,
                ModId::COMPARABLE,
                ModId::OBJECT,
                ModId::KERNEL,
                ModId::BASIC_OBJECT
            ]
        );
        assert!(g.entities.resolve_method(ModId::INTEGER, false, "+").is_some());
        assert!(g.entities.resolve_method(ModId::INTEGER, false, "puts").is_some());
        let new = g.entities.resolve_method(ModId::STRING, true, "new").unwrap();
        assert_eq!(new.owner, ModId::CLASS);
    }

    #[test]
    fn test_queue_deduplicates() {
        let mut g = genv();
        let out = g.graph.new_vertex("out");
        let id = g.new_box(BoxKind::UnknownCall { name: Name::new("send") }, out);
        g.add_run(id);
        assert_eq!(g.queue_len(), 1);
        assert_eq!(g.pop_run(), Some(id));
        assert_eq!(g.pop_run(), None);
    }

    #[test]
    fn test_rerun_with_same_result_keeps_edges() {
        let mut g = genv();
        let out = g.graph.new_vertex("out");
        let id = g.new_box(BoxKind::UnknownCall { name: Name::new("send") }, out);
        g.run_box(id);
        let added = g.graph.stats().edges_added;
        g.run_box(id);
        assert_eq!(g.graph.stats().edges_added, added);
        assert_eq!(g.graph.union_of(out), Type::Any);
        assert!(g.destroy_box(id).is_empty());
        assert_eq!(g.graph.union_of(out), Type::Bot);
        g.graph.check_integrity().unwrap();
    }

    #[test]
    fn test_declared_constant_loads_into_decl_vertex() {
        let mut g = genv();
        let table = SignatureTable::new()
            .class("Config", None)
            .constant("Config", "LIMIT", crate::types::SigType::named("Integer"));
        g.load_signatures(&table).unwrap();
        let config = g.entities.lookup_path(&path(&["Config"])).unwrap();
        let value = g.entities.const_value(config, "LIMIT").unwrap();
        assert_eq!(value.read_vertex(), Some(value.decl_vertex));
        assert_eq!(g.graph.union_of(value.decl_vertex), Type::integer());
    }
}
