//! Method call resolution

use super::{receiver_of, CallMode, CallSite, Plan, Receiver};
use crate::diagnostics::DiagnosticKind;
use crate::entity::{MethodHit, ModuleKind};
use crate::genv::{Genv, MethodDef, ProcData};
use crate::ids::{BoxId, ModId, ProcId, VertexId};
use crate::name::Name;
use crate::types::{consistent, sig_to_type, substitute, MethodSig, SigType, Subst, Type};
use tracing::trace;

pub(super) fn plan_call(genv: &Genv, id: BoxId, site: &CallSite, out: VertexId, plan: &mut Plan) {
    match site.mode {
        CallMode::Super { owner, singleton } => {
            let recv = Receiver::plain(owner, singleton);
            match genv.entities.resolve_super(owner, singleton, &site.name) {
                Some(hit) => apply_hit(genv, id, site, &recv, hit, Some(out), plan),
                None => {
                    plan.report(
                        DiagnosticKind::UndefinedMethod,
                        format!(
                            "super: no superclass method `{}' for {}",
                            site.name,
                            genv.show_type(&recv.self_type)
                        ),
                    );
                    plan.inject(Type::Any, out);
                }
            }
        }
        CallMode::Normal => {
            let members: Vec<Type> = genv.graph.types(site.recv).cloned().collect();
            for ty in members {
                match receiver_of(genv, &ty) {
                    Some(recv) => dispatch(genv, id, site, &recv, out, plan),
                    None => plan.inject(Type::Any, out),
                }
            }
        }
    }
}

fn dispatch(genv: &Genv, id: BoxId, site: &CallSite, recv: &Receiver, out: VertexId, plan: &mut Plan) {
    if let Some(cid) = recv.container {
        let container = genv
            .containers
            .get(cid)
            .filter(|_| genv.mutations.handles(&site.name));
        if let Some(container) = container {
            genv.mutations
                .wire(&container.kind, &site.name, &site.args, plan);
        }
        let mut watched = Vec::new();
        genv.container_vertices(&recv.self_type, &mut watched);
        for v in watched {
            plan.watch(v, id);
        }
    }
    if let Some(pid) = recv.proc_id.filter(|_| site.name == "call") {
        if let Some(data) = genv.procs.get(pid) {
            wire_proc(&site.args, data, out, plan);
            return;
        }
    }
    let Some(hit) = genv
        .entities
        .resolve_method(recv.module, recv.singleton, &site.name)
    else {
        plan.report(
            DiagnosticKind::UndefinedMethod,
            format!(
                "undefined method `{}' for {}",
                site.name,
                genv.show_type(&recv.self_type)
            ),
        );
        plan.inject(Type::Any, out);
        return;
    };
    if is_instantiation(genv, recv, &hit, &site.name) {
        instantiate(genv, id, site, recv.module, out, plan);
        return;
    }
    apply_hit(genv, id, site, recv, hit, Some(out), plan);
}

/// `C.new` reaching the generic `Class#new`
fn is_instantiation(genv: &Genv, recv: &Receiver, hit: &MethodHit<'_>, name: &Name) -> bool {
    recv.singleton
        && name == "new"
        && hit.owner == ModId::CLASS
        && !hit.singleton
        && genv.entities.kind(recv.module) == Some(ModuleKind::Class)
}

fn instantiate(genv: &Genv, id: BoxId, site: &CallSite, class: ModId, out: VertexId, plan: &mut Plan) {
    let instance = Receiver::plain(class, false);
    plan.inject(instance.self_type.clone(), out);
    if let Some(init) = genv.entities.resolve_method(class, false, "initialize") {
        apply_hit(genv, id, site, &instance, init, None, plan);
    }
}

fn wire_proc(args: &[VertexId], data: &ProcData, out: VertexId, plan: &mut Plan) {
    for (arg, param) in args.iter().zip(&data.params) {
        plan.flow(*arg, *param);
    }
    plan.flow(data.ret, out);
}

/// Wire one resolved method. `out` is `None` when the result is discarded,
/// as for `initialize` behind `new`.
fn apply_hit(
    genv: &Genv,
    id: BoxId,
    site: &CallSite,
    recv: &Receiver,
    hit: MethodHit<'_>,
    out: Option<VertexId>,
    plan: &mut Plan,
) {
    let label = method_label(genv, hit.owner, hit.singleton, &site.name);
    if hit.entity.is_declared() {
        let overloads: Vec<&MethodSig> = hit.entity.overloads().collect();
        check_declared(genv, id, site, recv, &overloads, &label, out, plan);
        return;
    }
    for def_id in hit.entity.defs() {
        if let Some(def) = genv.method_defs.get(def_id) {
            wire_inferred(site, def, &label, out, plan);
        }
    }
}

pub(crate) fn method_label(genv: &Genv, owner: ModId, singleton: bool, name: &Name) -> String {
    let sep = if singleton { "." } else { "#" };
    format!("{}{sep}{name}", genv.entities.qualified_name(owner))
}

fn wire_inferred(site: &CallSite, def: &MethodDef, label: &str, out: Option<VertexId>, plan: &mut Plan) {
    if let Some(problem) = arity_problem(def, site) {
        plan.report(DiagnosticKind::ArgumentMismatch, format!("{problem} for {label}"));
        if let Some(out) = out {
            plan.inject(Type::Any, out);
        }
        return;
    }
    for (i, arg) in site.args.iter().enumerate() {
        if let Some(formal) = def.positional(i) {
            plan.flow(*arg, formal);
        }
    }
    for (name, value) in &site.kwargs {
        match def.keywords.get(name) {
            Some((formal, _)) => plan.flow(*value, *formal),
            None => {
                if let Some(kwrest) = def.kwrest {
                    plan.flow(*value, kwrest);
                }
            }
        }
    }
    if let Some(pid) = site.block {
        plan.inject(Type::Proc(pid), def.block);
    }
    if let Some(out) = out {
        plan.flow(def.ret, out);
    }
}

fn arity_problem(def: &MethodDef, site: &CallSite) -> Option<String> {
    let given = site.args.len();
    if !def.accepts_positional(given) {
        let required = def.required.len();
        let expected = if def.rest.is_some() {
            format!("{required}+")
        } else if def.optional.is_empty() {
            required.to_string()
        } else {
            format!("{required}..{}", required + def.optional.len())
        };
        return Some(format!(
            "wrong number of arguments (given {given}, expected {expected})"
        ));
    }
    if let Some((name, _)) = site
        .kwargs
        .iter()
        .find(|(name, _)| def.kwrest.is_none() && !def.keywords.contains_key(name))
    {
        return Some(format!("unknown keyword: :{name}"));
    }
    def.keywords
        .iter()
        .find(|(name, (_, required))| *required && !site.kwargs.iter().any(|(n, _)| n == *name))
        .map(|(name, _)| format!("missing keyword: :{name}"))
}

#[allow(clippy::too_many_arguments)]
fn check_declared(
    genv: &Genv,
    id: BoxId,
    site: &CallSite,
    recv: &Receiver,
    overloads: &[&MethodSig],
    label: &str,
    out: Option<VertexId>,
    plan: &mut Plan,
) {
    let args: Vec<Type> = site.args.iter().map(|v| genv.vertex_type(*v)).collect();
    let kwargs: Vec<(Name, Type)> = site
        .kwargs
        .iter()
        .map(|(name, v)| (name.clone(), genv.vertex_type(*v)))
        .collect();
    let has_block = site.block.is_some();

    let mut matches = Vec::new();
    match match_overload(genv, recv, overloads, &args, &kwargs, has_block) {
        Some(found) => matches.push(found),
        None => {
            if let Some(combos) = split_unions(&args, genv.config.max_overload_combinations) {
                for combo in combos {
                    match match_overload(genv, recv, overloads, &combo, &kwargs, has_block) {
                        Some(found) => matches.push(found),
                        None => {
                            matches.clear();
                            break;
                        }
                    }
                }
            }
        }
    }

    if matches.is_empty() {
        let shown: Vec<String> = args.iter().map(|a| genv.show_type(a)).collect();
        plan.report(
            DiagnosticKind::ArgumentMismatch,
            format!("no overload of {label} accepts ({})", shown.join(", ")),
        );
        if let Some(out) = out {
            plan.inject(Type::Any, out);
        }
        return;
    }

    for (sig, mut subst) in matches {
        trace!(method = label, %sig, "overload selected");
        if let (Some(block_sig), Some(pid)) = (&sig.block, site.block) {
            bind_block(genv, id, recv, block_sig, pid, &mut subst, plan);
        }
        if let Some(out) = out {
            let ty = bind_result(genv, &sig.ret, recv, &subst);
            plan.inject_localized(ty, out);
        }
    }
}

/// Feed declared block parameter types into the closure and bind type
/// variables from what the closure returns
fn bind_block(
    genv: &Genv,
    id: BoxId,
    recv: &Receiver,
    block_sig: &crate::types::BlockSig,
    pid: ProcId,
    subst: &mut Subst,
    plan: &mut Plan,
) {
    let Some(data) = genv.procs.get(pid) else {
        return;
    };
    for (i, param) in data.params.iter().enumerate() {
        let ty = match block_sig.params.get(i) {
            Some(formal) => bind_result(genv, formal, recv, subst),
            None => Type::nil(),
        };
        plan.inject(ty, *param);
    }
    let returned = genv.vertex_type(data.ret);
    let formal = sig_to_type(
        &block_sig.ret,
        &genv.entities,
        &recv.self_type,
        genv.config.max_type_depth,
    );
    consistent(&returned, &formal, subst, &genv.entities);
    plan.watch(data.ret, id);
}

/// First overload, in declaration order, that accepts the arguments
fn match_overload<'a>(
    genv: &Genv,
    recv: &Receiver,
    overloads: &[&'a MethodSig],
    args: &[Type],
    kwargs: &[(Name, Type)],
    has_block: bool,
) -> Option<(&'a MethodSig, Subst)> {
    let depth = genv.config.max_type_depth;
    let formal = |sig: &SigType| sig_to_type(sig, &genv.entities, &recv.self_type, depth);
    'overloads: for sig in overloads {
        if !sig.accepts_positional(args.len()) {
            continue;
        }
        if sig.block.as_ref().is_some_and(|b| b.required) && !has_block {
            continue;
        }
        if sig
            .keywords
            .iter()
            .any(|k| k.required && !kwargs.iter().any(|(n, _)| *n == k.name))
        {
            continue;
        }
        let mut subst = Subst::new();
        for (i, actual) in args.iter().enumerate() {
            let Some(expected) = sig.positional(i) else {
                continue 'overloads;
            };
            if !consistent(actual, &formal(expected), &mut subst, &genv.entities) {
                continue 'overloads;
            }
        }
        for (name, actual) in kwargs {
            let Some(keyword) = sig.keywords.iter().find(|k| k.name == *name) else {
                continue 'overloads;
            };
            if !consistent(actual, &formal(&keyword.ty), &mut subst, &genv.entities) {
                continue 'overloads;
            }
        }
        return Some((*sig, subst));
    }
    None
}

/// Every combination of union members across the arguments, or `None`
/// when there is nothing to split or the product exceeds `bound`
fn split_unions(args: &[Type], bound: usize) -> Option<Vec<Vec<Type>>> {
    if !args.iter().any(|a| matches!(a, Type::Union(_))) {
        return None;
    }
    let mut combos: Vec<Vec<Type>> = vec![Vec::new()];
    for arg in args {
        let members = match arg.members() {
            m if m.is_empty() => vec![arg.clone()],
            m => m,
        };
        if combos.len() * members.len() > bound {
            return None;
        }
        combos = combos
            .into_iter()
            .flat_map(|prefix| {
                members.iter().map(move |m| {
                    let mut next = prefix.clone();
                    next.push(m.clone());
                    next
                })
            })
            .collect();
    }
    Some(combos)
}

/// Declared type with method variables from `subst` and namespace
/// parameters from the receiver
fn bind_result(genv: &Genv, sig: &SigType, recv: &Receiver, subst: &Subst) -> Type {
    let depth = genv.config.max_type_depth;
    let ty = sig_to_type(sig, &genv.entities, &recv.self_type, depth);
    let mut full = subst.clone();
    for (name, bound) in &recv.subst {
        full.insert(name.clone(), bound.clone());
    }
    substitute(&ty, &full, depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_unions_enumerates_members() {
        let args = vec![Type::integer().union(&Type::string()), Type::float()];
        let combos = split_unions(&args, 32).unwrap();
        assert_eq!(combos.len(), 2);
        assert!(combos.iter().all(|c| c[1] == Type::float()));
    }

    #[test]
    fn test_split_unions_respects_bound() {
        let wide = Type::union_all([Type::integer(), Type::string(), Type::float(), Type::nil()]);
        let args = vec![wide.clone(), wide.clone(), wide];
        assert!(split_unions(&args, 32).is_none());
        assert!(split_unions(&[Type::integer()], 32).is_none());
    }
}
