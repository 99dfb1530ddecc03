//! Demand-recomputed resolution units
//!
//! A box captures a fixed set of input vertices when it is created. Running
//! it is a pure function of the current contents of those inputs and of the
//! entity tables: it produces a [`Plan`], the full set of edges and
//! diagnostics the box should own right now. The environment commits the
//! plan by diffing it against what the box owned before.

mod call;
mod mutations;
mod read;
mod sites;

use crate::ast::ConstPath;
use crate::diagnostics::{BoxDiagnostic, DiagnosticKind, Provenance};
use crate::entity::CRef;
use crate::genv::{DepKey, Genv};
use crate::graph::Target;
use crate::ids::{BoxId, ContainerId, MethodDefId, ModId, ProcId, VertexId};
use crate::name::Name;
use crate::types::{globalize, Subst, Type};
use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use std::rc::Rc;

pub(crate) use mutations::MutationRegistry;
pub(crate) use sites::is_reflective;

pub(crate) type Args = SmallVec<[VertexId; 4]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallMode {
    Normal,
    /// `super` from a method of `owner`; lookup starts above it
    Super { owner: ModId, singleton: bool },
}

#[derive(Debug, Clone)]
pub(crate) struct CallSite {
    pub recv: VertexId,
    pub name: Name,
    pub args: Args,
    pub kwargs: Vec<(Name, VertexId)>,
    pub block: Option<ProcId>,
    pub mode: CallMode,
}

#[derive(Debug, Clone)]
pub(crate) enum BoxKind {
    Call(CallSite),
    Yield {
        block: VertexId,
        args: Args,
    },
    ConstRead {
        cref: Rc<CRef>,
        path: ConstPath,
    },
    IvarRead {
        owner: ModId,
        singleton: bool,
        name: Name,
    },
    GvarRead {
        name: Name,
    },
    /// Checks an inferred body against a declaration of the same method
    MethodDefSite {
        def: MethodDefId,
        name: Name,
    },
    /// Converts scope-local containers before a value leaves its scope
    Escape {
        input: VertexId,
    },
    /// Reflective dispatch; always `untyped`
    UnknownCall {
        name: Name,
    },
}

impl BoxKind {
    pub fn label(&self) -> &'static str {
        match self {
            BoxKind::Call(site) if matches!(site.mode, CallMode::Super { .. }) => "super",
            BoxKind::Call(_) => "call",
            BoxKind::Yield { .. } => "yield",
            BoxKind::ConstRead { .. } => "const-read",
            BoxKind::IvarRead { .. } => "ivar-read",
            BoxKind::GvarRead { .. } => "gvar-read",
            BoxKind::MethodDefSite { .. } => "def-site",
            BoxKind::Escape { .. } => "escape",
            BoxKind::UnknownCall { .. } => "unknown-call",
        }
    }

    pub fn provenance(&self) -> Provenance {
        match self {
            BoxKind::Call(_) => Provenance::CallSite,
            BoxKind::Yield { .. } => Provenance::Yield,
            BoxKind::ConstRead { .. } => Provenance::ConstantRead,
            BoxKind::IvarRead { .. } | BoxKind::GvarRead { .. } => Provenance::VariableRead,
            BoxKind::MethodDefSite { .. } | BoxKind::Escape { .. } => Provenance::MethodDefinition,
            BoxKind::UnknownCall { .. } => Provenance::UnknownCall,
        }
    }

    /// Entity keys whose changes can alter this box's resolution
    pub(crate) fn dep_keys(&self) -> Vec<DepKey> {
        match self {
            BoxKind::Call(site) => {
                let mut keys = vec![DepKey::Method(site.name.clone())];
                if site.name == "new" && site.mode == CallMode::Normal {
                    keys.push(DepKey::Method(Name::new("initialize")));
                }
                keys
            }
            BoxKind::ConstRead { path, .. } => path
                .segments
                .iter()
                .map(|seg| DepKey::Const(seg.clone()))
                .collect(),
            BoxKind::IvarRead { name, .. } => vec![DepKey::Ivar(name.clone())],
            BoxKind::GvarRead { name } => vec![DepKey::Gvar(name.clone())],
            BoxKind::MethodDefSite { name, .. } => vec![DepKey::Method(name.clone())],
            BoxKind::Yield { .. } | BoxKind::Escape { .. } | BoxKind::UnknownCall { .. } => {
                Vec::new()
            }
        }
    }

    /// Vertices whose changes rerun the box
    pub(crate) fn inputs(&self) -> Vec<VertexId> {
        match self {
            BoxKind::Call(site) => std::iter::once(site.recv)
                .chain(site.args.iter().copied())
                .chain(site.kwargs.iter().map(|(_, v)| *v))
                .collect(),
            BoxKind::Yield { block, .. } => vec![*block],
            BoxKind::Escape { input } => vec![*input],
            BoxKind::ConstRead { .. }
            | BoxKind::IvarRead { .. }
            | BoxKind::GvarRead { .. }
            | BoxKind::MethodDefSite { .. }
            | BoxKind::UnknownCall { .. } => Vec::new(),
        }
    }
}

/// Live state of one box
#[derive(Debug)]
pub(crate) struct BoxData {
    pub kind: BoxKind,
    pub output: VertexId,
    pub(crate) inputs: Vec<VertexId>,
    /// Edges installed by the last run
    pub(crate) edges: IndexSet<(VertexId, Target)>,
    /// Sources injecting computed result types, reused while the type stays
    pub(crate) sources: IndexMap<Type, VertexId>,
    /// Containers holding localized results: `[array, hash]`
    pub(crate) locals: [Option<ContainerId>; 2],
    pub(crate) diagnostics: Vec<BoxDiagnostic>,
    pub(crate) runs: usize,
}

impl BoxData {
    pub(crate) fn new(kind: BoxKind, output: VertexId, inputs: Vec<VertexId>) -> Self {
        Self {
            kind,
            output,
            inputs,
            edges: IndexSet::new(),
            sources: IndexMap::new(),
            locals: [None, None],
            diagnostics: Vec::new(),
            runs: 0,
        }
    }

    pub fn diagnostics(&self) -> &[BoxDiagnostic] {
        &self.diagnostics
    }
}

/// Where a planned edge starts
#[derive(Debug, Clone)]
pub(crate) enum PlanSource {
    Vertex(VertexId),
    /// A box-owned source holding this type
    Type(Type),
    /// Like `Type`, but arrays and hashes are re-homed into a box-owned
    /// container first
    Localized(Type),
}

/// Everything a box should own after its current run
#[derive(Debug, Default)]
pub(crate) struct Plan {
    pub edges: Vec<(PlanSource, Target)>,
    pub diagnostics: Vec<BoxDiagnostic>,
}

impl Plan {
    pub fn flow(&mut self, from: VertexId, to: VertexId) {
        if from != to {
            self.edges.push((PlanSource::Vertex(from), Target::Vertex(to)));
        }
    }

    pub fn inject(&mut self, ty: Type, to: VertexId) {
        if !ty.is_bot() {
            self.edges.push((PlanSource::Type(ty), Target::Vertex(to)));
        }
    }

    /// Inject a result that may carry containers into the caller's scope
    pub fn inject_localized(&mut self, ty: Type, to: VertexId) {
        for member in ty.members() {
            let source = match member {
                Type::Array(_) | Type::Hash(_) => PlanSource::Localized(member),
                other => PlanSource::Type(other),
            };
            self.edges.push((source, Target::Vertex(to)));
        }
    }

    /// Rerun `id` whenever `v` changes
    pub fn watch(&mut self, v: VertexId, id: BoxId) {
        self.edges.push((PlanSource::Vertex(v), Target::Box(id)));
    }

    pub fn report(&mut self, kind: DiagnosticKind, message: String) {
        let diag = BoxDiagnostic { kind, message };
        if !self.diagnostics.contains(&diag) {
            self.diagnostics.push(diag);
        }
    }
}

/// How a method call sees one member of its receiver's type set
#[derive(Debug, Clone)]
pub(crate) struct Receiver {
    pub module: ModId,
    pub singleton: bool,
    /// Stand-in for `self` in declared signatures
    pub self_type: Type,
    /// Bindings of the namespace's type parameters
    pub subst: Subst,
    pub container: Option<ContainerId>,
    pub proc_id: Option<ProcId>,
}

impl Receiver {
    fn plain(module: ModId, singleton: bool) -> Self {
        let self_type = if singleton {
            Type::Singleton(module)
        } else {
            Type::instance(module)
        };
        Self {
            module,
            singleton,
            self_type,
            subst: Subst::new(),
            container: None,
            proc_id: None,
        }
    }
}

/// `None` means the member is unconstrained and dispatch yields `Any`
pub(crate) fn receiver_of(genv: &Genv, ty: &Type) -> Option<Receiver> {
    let params = |module: ModId| -> Vec<Name> {
        genv.entities
            .module(module)
            .map(|m| m.type_params().to_vec())
            .unwrap_or_default()
    };
    let bind = |module: ModId, args: Vec<Type>| -> Subst {
        params(module).into_iter().zip(args).collect()
    };
    let mut recv = match ty {
        Type::Any | Type::Bot | Type::Var(_) | Type::Union(_) => return None,
        Type::Instance(m, args) => {
            let mut r = Receiver::plain(*m, false);
            r.subst = bind(*m, args.clone());
            r
        }
        Type::Singleton(m) => Receiver::plain(*m, true),
        Type::Array(a) => {
            let mut r = Receiver::plain(a.base, false);
            r.subst = bind(a.base, vec![a.elems.squash()]);
            r
        }
        Type::Hash(h) => {
            let mut r = Receiver::plain(h.base, false);
            r.subst = bind(h.base, vec![h.key_type(), h.value_type()]);
            r
        }
        Type::Record(fields) => {
            let mut r = Receiver::plain(ModId::HASH, false);
            let value = Type::union_all(fields.iter().map(|(_, t)| t.clone()));
            r.subst = bind(ModId::HASH, vec![Type::Symbol(None), value]);
            r
        }
        Type::Symbol(_) => Receiver::plain(ModId::SYMBOL, false),
        Type::Literal(lit) => Receiver::plain(lit.base(), false),
        Type::Proc(pid) => {
            let mut r = Receiver::plain(ModId::PROC, false);
            r.proc_id = Some(*pid);
            r
        }
        Type::Local(cid) => {
            let shape = globalize(ty, genv, genv.config.max_type_depth);
            let mut r = receiver_of(genv, &shape)?;
            r.container = Some(*cid);
            r
        }
    };
    recv.self_type = ty.clone();
    Some(recv)
}

/// Compute what box `id` should currently own
pub(crate) fn plan(genv: &Genv, id: BoxId, data: &BoxData) -> Plan {
    let mut plan = Plan::default();
    let out = data.output;
    match &data.kind {
        BoxKind::Call(site) => call::plan_call(genv, id, site, out, &mut plan),
        BoxKind::Yield { block, args } => sites::plan_yield(genv, *block, args, out, &mut plan),
        BoxKind::ConstRead { cref, path } => read::plan_const(genv, cref, path, out, &mut plan),
        BoxKind::IvarRead {
            owner,
            singleton,
            name,
        } => read::plan_ivar(genv, *owner, *singleton, name, out, &mut plan),
        BoxKind::GvarRead { name } => read::plan_gvar(genv, name, out, &mut plan),
        BoxKind::MethodDefSite { def, .. } => sites::plan_def_site(genv, id, *def, &mut plan),
        BoxKind::Escape { input } => sites::plan_escape(genv, id, *input, out, &mut plan),
        BoxKind::UnknownCall { name } => sites::plan_unknown(genv, name, out, &mut plan),
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;

    #[test]
    fn test_receiver_binds_type_params() {
        let genv = Genv::new(AnalysisConfig::default());
        let recv = receiver_of(&genv, &Type::hash_of(Type::symbol("a"), Type::integer())).unwrap();
        assert_eq!(recv.module, ModId::HASH);
        assert_eq!(recv.subst.get("K"), Some(&Type::symbol("a")));
        assert_eq!(recv.subst.get("V"), Some(&Type::integer()));
        assert!(receiver_of(&genv, &Type::Any).is_none());
    }

    #[test]
    fn test_singleton_receiver() {
        let genv = Genv::new(AnalysisConfig::default());
        let recv = receiver_of(&genv, &Type::Singleton(ModId::STRING)).unwrap();
        assert!(recv.singleton);
        assert_eq!(recv.self_type, Type::Singleton(ModId::STRING));
    }

    #[test]
    fn test_plan_report_deduplicates() {
        let mut plan = Plan::default();
        plan.report(DiagnosticKind::UndefinedMethod, "x".into());
        plan.report(DiagnosticKind::UndefinedMethod, "x".into());
        assert_eq!(plan.diagnostics.len(), 1);
    }
}
