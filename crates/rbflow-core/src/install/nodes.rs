//! The `install` walk: vertices, edges and boxes for each node
//!
//! Local variables are tracked in SSA form: every write rebinds the name to
//! the vertex of its value, branches merge through fresh vertices, and
//! loops get one vertex per reassigned variable that receives both the
//! entry value and the value at the end of the body.

use super::define::{attr_names, ATTR_METHODS};
use super::lenv::{effects_between, replay, LocalEnv, MethodCtx};
use super::{GraphState, Match, NodeState, Owned, Phase, ReuseMap, ScopeKey, Slot};
use crate::ast::{CallNode, DefNode, HashPair, Node, NodeId, NodeKind};
use crate::boxes::{is_reflective, Args, BoxKind, CallMode, CallSite};
use crate::entity::CRef;
use crate::genv::{Container, ContainerKind, Genv, MethodDef, ProcData};
use crate::graph::Target;
use crate::ids::{ContainerId, MethodDefId, ModId, ProcId, VertexId};
use crate::name::Name;
use crate::types::Type;
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::trace;

/// Scratch state of the node being installed
#[derive(Default)]
struct NodeCx {
    owned: Owned,
    slots: IndexMap<ScopeKey, Slot>,
    /// Scope objects of the node this one replaces, not yet claimed
    inherited: IndexMap<ScopeKey, Slot>,
}

pub(crate) struct Installer<'a> {
    genv: &'a mut Genv,
    states: &'a mut [NodeState],
    old_states: &'a mut [NodeState],
    reuse: &'a ReuseMap,
    unassigned: &'a HashSet<NodeId>,
    pub installed: usize,
    pub reused: usize,
}

impl<'a> Installer<'a> {
    pub fn new(
        genv: &'a mut Genv,
        states: &'a mut [NodeState],
        old_states: &'a mut [NodeState],
        reuse: &'a ReuseMap,
        unassigned: &'a HashSet<NodeId>,
    ) -> Self {
        Self {
            genv,
            states,
            old_states,
            reuse,
            unassigned,
            installed: 0,
            reused: 0,
        }
    }

    /// Install a whole tree whose top-level `self` is `top_self`
    pub fn run(&mut self, root: &Node, top_self: VertexId) -> VertexId {
        let mut env = LocalEnv::new(CRef::top(), top_self);
        self.install(root, &mut env)
    }

    fn install(&mut self, node: &Node, env: &mut LocalEnv) -> VertexId {
        let prior = self.reuse.get(&node.id).copied();
        if let Some((old, Match::Full)) = prior {
            if let Some(ret) = self.adopt(node, old, env) {
                return ret;
            }
        }
        let shell = match prior {
            Some((old, Match::Shell)) => Some(old),
            _ => None,
        };
        let inherited = shell
            .and_then(|old| self.old_states.get_mut(old.index()))
            .map(|state| std::mem::take(&mut state.graph.slots))
            .unwrap_or_default();

        let before = env.vars.clone();
        let mut cx = NodeCx {
            inherited,
            ..NodeCx::default()
        };
        let ret = self.install_kind(node, env, &mut cx);

        if let Some(old) = shell.and_then(|old| self.old_states.get_mut(old.index())) {
            old.graph.slots.extend(cx.inherited.drain(..));
        }
        let effects = effects_between(&before, &env.vars);
        if let Some(state) = self.states.get_mut(node.id.index()) {
            state.graph = GraphState {
                ret: Some(ret),
                owned: cx.owned,
                slots: cx.slots,
                effects,
            };
            state.phase = Phase::Installed;
        }
        self.installed += 1;
        ret
    }

    /// Take over the graph objects of an identical subtree of the previous
    /// tree. Ids are pre-order, so both subtrees number their nodes the
    /// same way relative to their roots.
    fn adopt(&mut self, node: &Node, old_root: NodeId, env: &mut LocalEnv) -> Option<VertexId> {
        let ret = self.old_states.get(old_root.index())?.graph.ret?;
        let mut count = 0;
        for n in node.preorder() {
            let old_id = (old_root.0 + (n.id.0 - node.id.0)) as usize;
            let graph = match self.old_states.get_mut(old_id) {
                Some(old) => {
                    old.phase = Phase::Reused;
                    std::mem::take(&mut old.graph)
                }
                None => GraphState::default(),
            };
            if let Some(state) = self.states.get_mut(n.id.index()) {
                state.graph = graph;
                state.phase = Phase::Reused;
            }
            count += 1;
        }
        if let Some(state) = self.states.get(node.id.index()) {
            replay(&mut env.vars, &state.graph.effects);
        }
        trace!(node = %node.id, from = %old_root, count, "subtree reused");
        self.reused += count;
        Some(ret)
    }

    // ---- graph helpers -----------------------------------------------------

    fn vertex(&mut self, cx: &mut NodeCx, label: &'static str) -> VertexId {
        let v = self.genv.graph.new_vertex(label);
        cx.owned.vertices.push(v);
        v
    }

    fn source(&mut self, cx: &mut NodeCx, ty: Type, label: &'static str) -> VertexId {
        let v = self.genv.graph.new_source(ty, label);
        cx.owned.vertices.push(v);
        v
    }

    fn edge(&mut self, cx: &mut NodeCx, from: VertexId, to: VertexId) {
        if from == to {
            return;
        }
        let target = Target::Vertex(to);
        self.genv.graph.add_edge(from, target);
        cx.owned.edges.push((from, target));
    }

    fn boxed(&mut self, cx: &mut NodeCx, kind: BoxKind, label: &'static str) -> VertexId {
        let out = self.vertex(cx, label);
        let id = self.genv.new_box(kind, out);
        cx.owned.boxes.push(id);
        out
    }

    /// Route a value into a vertex outside the current scope
    fn escape_into(&mut self, cx: &mut NodeCx, value: VertexId, target: VertexId) {
        let out = self.boxed(cx, BoxKind::Escape { input: value }, "escape");
        self.edge(cx, out, target);
    }

    /// An inherited scope object, if it is still alive
    fn claim(&mut self, cx: &mut NodeCx, key: &ScopeKey) -> Option<Slot> {
        let slot = cx.inherited.shift_remove(key)?;
        let live = match slot {
            Slot::Vertex(v) => self.genv.graph.is_live(v),
            Slot::Method(id) => self.genv.method_defs.contains(id),
            Slot::Proc(id) => self.genv.procs.contains(id),
            Slot::Container(id) => self.genv.containers.contains(id),
        };
        if live {
            Some(slot)
        } else {
            cx.inherited.insert(key.clone(), slot);
            None
        }
    }

    fn slot_vertex(&mut self, cx: &mut NodeCx, key: ScopeKey, label: &'static str) -> VertexId {
        let v = match self.claim(cx, &key) {
            Some(Slot::Vertex(v)) => v,
            _ => self.genv.graph.new_vertex(label),
        };
        cx.slots.insert(key, Slot::Vertex(v));
        v
    }

    fn slot_source(&mut self, cx: &mut NodeCx, key: ScopeKey, ty: Type, label: &'static str) -> VertexId {
        let v = match self.claim(cx, &key) {
            Some(Slot::Vertex(v)) if self.genv.graph.holds(v, &ty) => v,
            Some(other) => {
                cx.inherited.insert(key.clone(), other);
                self.genv.graph.new_source(ty, label)
            }
            None => self.genv.graph.new_source(ty, label),
        };
        cx.slots.insert(key, Slot::Vertex(v));
        v
    }

    fn slot_container(&mut self, cx: &mut NodeCx, key: ScopeKey, container: Container) -> ContainerId {
        let id = match self.claim(cx, &key) {
            Some(Slot::Container(id)) => id,
            _ => self.genv.add_container(container),
        };
        cx.slots.insert(key, Slot::Container(id));
        id
    }

    fn proc_of(&self, block: &Node) -> Option<ProcId> {
        match self.states.get(block.id.index())?.graph.slots.get(&ScopeKey::Proc)? {
            Slot::Proc(id) => Some(*id),
            _ => None,
        }
    }

    fn node_module(&self, node: &Node, env: &LocalEnv) -> ModId {
        self.states
            .get(node.id.index())
            .and_then(|s| s.module)
            .unwrap_or(env.cref.module)
    }

    // ---- node kinds --------------------------------------------------------

    fn install_kind(&mut self, node: &Node, env: &mut LocalEnv, cx: &mut NodeCx) -> VertexId {
        match &node.kind {
            NodeKind::Statements(nodes) => {
                let mut last = None;
                for n in nodes {
                    last = Some(self.install(n, env));
                }
                match last {
                    Some(v) => v,
                    None => self.source(cx, Type::nil(), "nil"),
                }
            }
            NodeKind::Nil => self.source(cx, Type::nil(), "nil"),
            NodeKind::True => self.source(cx, Type::true_(), "true"),
            NodeKind::False => self.source(cx, Type::false_(), "false"),
            NodeKind::SelfRef => env.self_vtx,
            NodeKind::Integer(_) => self.source(cx, Type::integer(), "int"),
            NodeKind::Float(_) => self.source(cx, Type::float(), "float"),
            NodeKind::Str(_) => self.source(cx, Type::string(), "str"),
            NodeKind::Sym(name) => self.source(cx, Type::Symbol(Some(name.clone())), "sym"),
            NodeKind::Array(elems) => self.install_array(elems, env, cx),
            NodeKind::Hash(pairs) => self.install_hash(pairs, env, cx),
            NodeKind::LocalRead(name) => {
                let out = self.vertex(cx, "lvar");
                let bound = env.vars.get(name).copied();
                if let Some(v) = bound {
                    self.edge(cx, v, out);
                }
                if bound.is_none() || self.unassigned.contains(&node.id) {
                    let nil = self.source(cx, Type::nil(), "unassigned");
                    self.edge(cx, nil, out);
                }
                out
            }
            NodeKind::LocalWrite { name, value } => {
                let v = self.install(value, env);
                env.vars.insert(name.clone(), v);
                v
            }
            NodeKind::IvarRead(name) => {
                let (owner, singleton) = env.ivar_scope();
                let kind = BoxKind::IvarRead {
                    owner,
                    singleton,
                    name: name.clone(),
                };
                self.boxed(cx, kind, "ivar")
            }
            NodeKind::IvarWrite { name, value } => {
                let v = self.install(value, env);
                let (owner, singleton) = env.ivar_scope();
                let genv = &mut *self.genv;
                let target = genv
                    .entities
                    .ensure_ivar(&mut genv.graph, owner, singleton, name)
                    .map(|e| e.def_vertex);
                if let Some(target) = target {
                    self.escape_into(cx, v, target);
                }
                v
            }
            NodeKind::GvarRead(name) => {
                self.boxed(cx, BoxKind::GvarRead { name: name.clone() }, "gvar")
            }
            NodeKind::GvarWrite { name, value } => {
                let v = self.install(value, env);
                let genv = &mut *self.genv;
                let target = genv.entities.ensure_global(&mut genv.graph, name).def_vertex;
                self.escape_into(cx, v, target);
                v
            }
            NodeKind::Const(path) => {
                let kind = BoxKind::ConstRead {
                    cref: env.cref.clone(),
                    path: path.clone(),
                };
                self.boxed(cx, kind, "const")
            }
            NodeKind::ConstWrite { path, value } => {
                let v = self.install(value, env);
                let owner = self.node_module(node, env);
                if let Some(name) = path.last() {
                    let genv = &mut *self.genv;
                    let target = genv
                        .entities
                        .ensure_const(&mut genv.graph, owner, name)
                        .map(|e| e.def_vertex);
                    if let Some(target) = target {
                        self.escape_into(cx, v, target);
                    }
                }
                v
            }
            NodeKind::Call(call) => self.install_call(call, env, cx),
            NodeKind::Super { args, block } => {
                self.install_super(args.as_deref(), block.as_deref(), env, cx)
            }
            NodeKind::Yield(args) => {
                let args: Args = args.iter().map(|a| self.install(a, env)).collect();
                match env.method.as_ref().map(|m| m.block) {
                    Some(block) => self.boxed(cx, BoxKind::Yield { block, args }, "yield"),
                    None => self.source(cx, Type::Any, "yield"),
                }
            }
            NodeKind::Block { params, body } => self.install_block(params, body, env, cx),
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.install(cond, env);
                let base = env.vars.clone();
                let then_ret = match then_branch {
                    Some(t) => self.install(t, env),
                    None => self.source(cx, Type::nil(), "nil"),
                };
                let then_vars = std::mem::replace(&mut env.vars, base);
                let else_ret = match else_branch {
                    Some(e) => self.install(e, env),
                    None => self.source(cx, Type::nil(), "nil"),
                };
                let else_vars = std::mem::take(&mut env.vars);
                env.vars = self.merge(cx, then_vars, else_vars);
                let out = self.vertex(cx, "if");
                self.edge(cx, then_ret, out);
                self.edge(cx, else_ret, out);
                out
            }
            NodeKind::While { cond, body } => {
                let mut loops = Vec::new();
                for name in node.modified_vars() {
                    let lv = self.slot_vertex(cx, ScopeKey::Loop(name.clone()), "loop");
                    if let Some(cur) = env.vars.get(&name).copied() {
                        self.edge(cx, cur, lv);
                    }
                    env.vars.insert(name.clone(), lv);
                    loops.push((name, lv));
                }
                self.install(cond, env);
                let exit_vars = env.vars.clone();
                self.install(body, env);
                self.back_edges(cx, &loops, env);
                env.vars = exit_vars;
                self.source(cx, Type::nil(), "while")
            }
            NodeKind::And(lhs, rhs) | NodeKind::Or(lhs, rhs) => {
                let l = self.install(lhs, env);
                let base = env.vars.clone();
                let r = self.install(rhs, env);
                let after = std::mem::take(&mut env.vars);
                env.vars = self.merge(cx, base, after);
                let out = self.vertex(cx, "logical");
                self.edge(cx, l, out);
                self.edge(cx, r, out);
                out
            }
            NodeKind::Return(value) => {
                let v = match value {
                    Some(value) => self.install(value, env),
                    None => self.source(cx, Type::nil(), "nil"),
                };
                if let Some(ret) = env.method.as_ref().map(|m| m.ret) {
                    self.escape_into(cx, v, ret);
                }
                v
            }
            NodeKind::Class { body, .. } | NodeKind::Module { body, .. } => {
                let module = self.node_module(node, env);
                self.install_namespace(module, false, body, env, cx)
            }
            NodeKind::SingletonClass { body } => {
                let module = self.node_module(node, env);
                self.install_namespace(module, true, body, env, cx)
            }
            NodeKind::Def(def) => self.install_def(def, env, cx),
            NodeKind::Unknown { children, .. } => {
                for child in children {
                    self.install(child, env);
                }
                self.source(cx, Type::Any, "unknown")
            }
        }
    }

    /// Join two variable maps at a control-flow merge
    fn merge(
        &mut self,
        cx: &mut NodeCx,
        left: IndexMap<Name, VertexId>,
        right: IndexMap<Name, VertexId>,
    ) -> IndexMap<Name, VertexId> {
        let mut merged = IndexMap::new();
        for (name, l) in &left {
            match right.get(name).copied() {
                Some(r) if r != *l => {
                    let phi = self.vertex(cx, "phi");
                    self.edge(cx, *l, phi);
                    self.edge(cx, r, phi);
                    merged.insert(name.clone(), phi);
                }
                _ => {
                    merged.insert(name.clone(), *l);
                }
            }
        }
        for (name, r) in right {
            merged.entry(name).or_insert(r);
        }
        merged
    }

    /// Feed the value each loop variable has at the end of the body back
    /// into its loop vertex
    fn back_edges(&mut self, cx: &mut NodeCx, loops: &[(Name, VertexId)], env: &LocalEnv) {
        for (name, lv) in loops {
            if let Some(cur) = env.vars.get(name).copied() {
                self.edge(cx, cur, *lv);
            }
        }
    }

    fn install_array(&mut self, elems: &[Node], env: &mut LocalEnv, cx: &mut NodeCx) -> VertexId {
        let elems: Vec<VertexId> = elems.iter().map(|e| self.install(e, env)).collect();
        let extra = self.vertex(cx, "array-extra");
        let id = self.genv.add_container(Container {
            base: ModId::ARRAY,
            kind: ContainerKind::Array { elems, extra },
        });
        cx.owned.containers.push(id);
        self.source(cx, Type::Local(id), "array")
    }

    fn install_hash(&mut self, pairs: &[HashPair], env: &mut LocalEnv, cx: &mut NodeCx) -> VertexId {
        let extra_key = self.vertex(cx, "hash-key");
        let extra_value = self.vertex(cx, "hash-value");
        let mut fields = Vec::new();
        for pair in pairs {
            let k = self.install(&pair.key, env);
            let v = self.install(&pair.value, env);
            match &pair.key.kind {
                NodeKind::Sym(name) => fields.push((Type::Symbol(Some(name.clone())), v)),
                _ => {
                    self.edge(cx, k, extra_key);
                    self.edge(cx, v, extra_value);
                }
            }
        }
        let id = self.genv.add_container(Container {
            base: ModId::HASH,
            kind: ContainerKind::Hash {
                fields,
                extra_key,
                extra_value,
            },
        });
        cx.owned.containers.push(id);
        self.source(cx, Type::Local(id), "hash")
    }

    fn install_call(&mut self, call: &CallNode, env: &mut LocalEnv, cx: &mut NodeCx) -> VertexId {
        let recv = match &call.recv {
            Some(r) => self.install(r, env),
            None => env.self_vtx,
        };
        let args: Args = call.args.iter().map(|a| self.install(a, env)).collect();
        let kwargs: Vec<(Name, VertexId)> = call
            .kwargs
            .iter()
            .map(|kw| (kw.name.clone(), self.install(&kw.value, env)))
            .collect();
        let block = match &call.block {
            Some(b) => {
                self.install(b, env);
                self.proc_of(b)
            }
            None => None,
        };

        if call.recv.is_none() && env.method.is_none() && ATTR_METHODS.contains(&call.name.as_str()) {
            self.install_attrs(call, env, cx);
        }
        if is_reflective(call.name.as_str()) {
            let kind = BoxKind::UnknownCall {
                name: call.name.clone(),
            };
            return self.boxed(cx, kind, "unknown-call");
        }
        let site = CallSite {
            recv,
            name: call.name.clone(),
            args,
            kwargs,
            block,
            mode: CallMode::Normal,
        };
        self.boxed(cx, BoxKind::Call(site), "call")
    }

    fn install_super(
        &mut self,
        args: Option<&[Node]>,
        block: Option<&Node>,
        env: &mut LocalEnv,
        cx: &mut NodeCx,
    ) -> VertexId {
        let args: Option<Args> = args.map(|args| args.iter().map(|a| self.install(a, env)).collect());
        let block = match block {
            Some(b) => {
                self.install(b, env);
                self.proc_of(b)
            }
            None => None,
        };
        let Some(ctx) = env.method.clone() else {
            return self.source(cx, Type::Any, "super");
        };
        // bare `super` forwards the positional formals
        let args = args.unwrap_or_else(|| ctx.formals.iter().copied().collect());
        let site = CallSite {
            recv: env.self_vtx,
            name: ctx.name.clone(),
            args,
            kwargs: Vec::new(),
            block,
            mode: CallMode::Super {
                owner: ctx.owner,
                singleton: ctx.singleton,
            },
        };
        self.boxed(cx, BoxKind::Call(site), "super")
    }

    fn install_block(&mut self, params: &[Name], body: &Node, env: &mut LocalEnv, cx: &mut NodeCx) -> VertexId {
        let proc_id = match self.claim(cx, &ScopeKey::Proc) {
            Some(Slot::Proc(id)) => id,
            _ => {
                let graph = &mut self.genv.graph;
                let params = params.iter().map(|_| graph.new_vertex("block-param")).collect();
                let ret = graph.new_vertex("block-ret");
                self.genv.add_proc(ProcData { params, ret })
            }
        };
        cx.slots.insert(ScopeKey::Proc, Slot::Proc(proc_id));
        let Some(data) = self.genv.procs.get(proc_id).cloned() else {
            return self.source(cx, Type::Any, "block");
        };

        let outer = env.vars.clone();
        // outer variables the body reassigns see every iteration
        let mut loops = Vec::new();
        for name in body.modified_vars() {
            if params.contains(&name) {
                continue;
            }
            let Some(cur) = outer.get(&name).copied() else {
                continue;
            };
            let lv = self.slot_vertex(cx, ScopeKey::Loop(name.clone()), "block-loop");
            self.edge(cx, cur, lv);
            env.vars.insert(name.clone(), lv);
            loops.push((name, lv));
        }
        for (p, v) in params.iter().zip(&data.params) {
            env.vars.insert(p.clone(), *v);
        }

        let body_ret = self.install(body, env);
        self.edge(cx, body_ret, data.ret);
        self.back_edges(cx, &loops, env);

        // block-local names go away; reassigned outer names keep their loop vertex
        let mut after = outer;
        for (name, lv) in loops {
            after.insert(name, lv);
        }
        env.vars = after;
        self.source(cx, Type::Proc(proc_id), "block")
    }

    fn install_namespace(
        &mut self,
        module: ModId,
        singleton: bool,
        body: &Node,
        env: &mut LocalEnv,
        cx: &mut NodeCx,
    ) -> VertexId {
        let self_vtx = self.slot_source(cx, ScopeKey::SelfVertex, Type::Singleton(module), "self");
        let mut inner = LocalEnv::new(env.cref.push(module, singleton), self_vtx);
        self.install(body, &mut inner)
    }

    fn new_method_def(&mut self, owner: ModId, singleton: bool, def: &DefNode) -> MethodDefId {
        let graph = &mut self.genv.graph;
        let params = &def.params;
        let required = params
            .required
            .iter()
            .map(|_| graph.new_vertex("param"))
            .collect();
        let optional = params
            .optional
            .iter()
            .map(|_| graph.new_vertex("opt-param"))
            .collect();
        let rest = params.rest.as_ref().map(|_| graph.new_vertex("rest-param"));
        let keywords = params
            .keywords
            .iter()
            .map(|k| (k.name.clone(), (graph.new_vertex("kw-param"), k.default.is_none())))
            .collect();
        let kwrest = params.kwrest.as_ref().map(|_| graph.new_vertex("kwrest-param"));
        let block = graph.new_vertex("block-param");
        let ret = graph.new_vertex("ret");
        self.genv.add_method_def(MethodDef {
            owner,
            singleton,
            name: def.name.clone(),
            required,
            optional,
            rest,
            keywords,
            kwrest,
            block,
            ret,
        })
    }

    fn install_def(&mut self, def: &DefNode, env: &mut LocalEnv, cx: &mut NodeCx) -> VertexId {
        let owner = env.cref.module;
        let singleton = def.singleton || env.cref.singleton;
        let def_id = match self.claim(cx, &ScopeKey::Method) {
            Some(Slot::Method(id)) => id,
            _ => self.new_method_def(owner, singleton, def),
        };
        cx.slots.insert(ScopeKey::Method, Slot::Method(def_id));
        let Some(record) = self.genv.method_defs.get(def_id).cloned() else {
            return self.source(cx, Type::Any, "def");
        };

        let self_ty = if singleton {
            Type::Singleton(owner)
        } else {
            Type::instance(owner)
        };
        let self_vtx = self.slot_source(cx, ScopeKey::SelfVertex, self_ty, "self");
        let mut inner = LocalEnv::new(env.cref.clone(), self_vtx);
        inner.method = Some(MethodCtx {
            owner,
            singleton,
            name: def.name.clone(),
            ret: record.ret,
            block: record.block,
            formals: record
                .required
                .iter()
                .chain(&record.optional)
                .copied()
                .collect(),
        });

        let params = &def.params;
        for (name, v) in params.required.iter().zip(&record.required) {
            inner.vars.insert(name.clone(), *v);
        }
        for ((name, default), v) in params.optional.iter().zip(&record.optional) {
            let d = self.install(default, &mut inner);
            self.edge(cx, d, *v);
            inner.vars.insert(name.clone(), *v);
        }
        if let (Some(name), Some(rest)) = (&params.rest, record.rest) {
            let container = Container {
                base: ModId::ARRAY,
                kind: ContainerKind::Array {
                    elems: Vec::new(),
                    extra: rest,
                },
            };
            let id = self.slot_container(cx, ScopeKey::RestContainer, container);
            let src = self.slot_source(cx, ScopeKey::RestSource, Type::Local(id), "rest");
            inner.vars.insert(name.clone(), src);
        }
        for kw in &params.keywords {
            let Some(&(v, _)) = record.keywords.get(&kw.name) else {
                continue;
            };
            if let Some(default) = &kw.default {
                let d = self.install(default, &mut inner);
                self.edge(cx, d, v);
            }
            inner.vars.insert(kw.name.clone(), v);
        }
        if let (Some(name), Some(kwrest)) = (&params.kwrest, record.kwrest) {
            let key = self.slot_source(cx, ScopeKey::KwrestKey, Type::Symbol(None), "kwrest-key");
            let container = Container {
                base: ModId::HASH,
                kind: ContainerKind::Hash {
                    fields: Vec::new(),
                    extra_key: key,
                    extra_value: kwrest,
                },
            };
            let id = self.slot_container(cx, ScopeKey::KwrestContainer, container);
            let src = self.slot_source(cx, ScopeKey::KwrestSource, Type::Local(id), "kwrest");
            inner.vars.insert(name.clone(), src);
        }
        if let Some(name) = &params.block {
            inner.vars.insert(name.clone(), record.block);
        }

        let body_ret = self.install(&def.body, &mut inner);
        self.escape_into(cx, body_ret, record.ret);
        let site = BoxKind::MethodDefSite {
            def: def_id,
            name: def.name.clone(),
        };
        self.boxed(cx, site, "def-site");
        self.source(cx, Type::Symbol(Some(def.name.clone())), "def")
    }

    /// Accessor methods generated by `attr_reader`, `attr_writer` and
    /// `attr_accessor`
    fn install_attrs(&mut self, call: &CallNode, env: &LocalEnv, cx: &mut NodeCx) {
        let owner = env.cref.module;
        let singleton = env.cref.singleton;
        let (reader, writer) = match call.name.as_str() {
            "attr_reader" => (true, false),
            "attr_writer" => (false, true),
            _ => (true, true),
        };
        for attr in attr_names(call) {
            let ivar = Name::ivar_for(attr.as_str());
            if reader {
                let ret = self.vertex(cx, "attr-ret");
                let block = self.vertex(cx, "attr-block");
                let id = self.genv.add_method_def(MethodDef {
                    owner,
                    singleton,
                    name: attr.clone(),
                    required: Vec::new(),
                    optional: Vec::new(),
                    rest: None,
                    keywords: IndexMap::new(),
                    kwrest: None,
                    block,
                    ret,
                });
                cx.owned.method_defs.push(id);
                let read = BoxKind::IvarRead {
                    owner,
                    singleton,
                    name: ivar.clone(),
                };
                let value = self.boxed(cx, read, "attr-read");
                self.edge(cx, value, ret);
            }
            if writer {
                let param = self.vertex(cx, "attr-param");
                let ret = self.vertex(cx, "attr-ret");
                let block = self.vertex(cx, "attr-block");
                let id = self.genv.add_method_def(MethodDef {
                    owner,
                    singleton,
                    name: Name::setter_for(attr.as_str()),
                    required: vec![param],
                    optional: Vec::new(),
                    rest: None,
                    keywords: IndexMap::new(),
                    kwrest: None,
                    block,
                    ret,
                });
                cx.owned.method_defs.push(id);
                self.edge(cx, param, ret);
                let genv = &mut *self.genv;
                let target = genv
                    .entities
                    .ensure_ivar(&mut genv.graph, owner, singleton, &ivar)
                    .map(|e| e.def_vertex);
                if let Some(target) = target {
                    self.escape_into(cx, param, target);
                }
            }
        }
    }
}
