//! Yield, method definition, escape and reflective call sites

use super::Plan;
use crate::diagnostics::DiagnosticKind;
use crate::genv::Genv;
use crate::ids::{BoxId, MethodDefId, VertexId};
use crate::name::Name;
use crate::types::{consistent, sig_to_type, substitute, SigType, Subst, Type};

/// Calls dispatched through reflection; analyzed as `untyped`
pub(crate) const REFLECTIVE_METHODS: &[&str] = &[
    "send",
    "__send__",
    "public_send",
    "instance_variable_get",
    "instance_variable_set",
    "method_missing",
    "define_method",
    "instance_eval",
    "instance_exec",
    "class_eval",
    "module_eval",
    "eval",
    "method",
];

pub(crate) fn is_reflective(name: &str) -> bool {
    REFLECTIVE_METHODS.contains(&name)
}

pub(super) fn plan_yield(genv: &Genv, block: VertexId, args: &[VertexId], out: VertexId, plan: &mut Plan) {
    let members: Vec<Type> = genv.graph.types(block).cloned().collect();
    for member in members {
        match member {
            Type::Proc(pid) => {
                let Some(data) = genv.procs.get(pid) else {
                    continue;
                };
                for (i, param) in data.params.iter().enumerate() {
                    match args.get(i) {
                        Some(arg) => plan.flow(*arg, *param),
                        None => plan.inject(Type::nil(), *param),
                    }
                }
                plan.flow(data.ret, out);
            }
            Type::Any => plan.inject(Type::Any, out),
            _ => {}
        }
    }
}

/// Seed an inferred body with its declared parameter types and check the
/// inferred return type against the declaration
pub(super) fn plan_def_site(genv: &Genv, id: BoxId, def_id: MethodDefId, plan: &mut Plan) {
    let Some(def) = genv.method_defs.get(def_id) else {
        return;
    };
    let Some(sig) = genv
        .entities
        .module(def.owner)
        .and_then(|m| m.method(def.singleton, &def.name))
        .and_then(|e| e.overloads().next())
    else {
        return;
    };
    let depth = genv.config.max_type_depth;
    let self_type = if def.singleton {
        Type::Singleton(def.owner)
    } else {
        Type::instance(def.owner)
    };
    let declared = |ty: &SigType| {
        substitute(
            &sig_to_type(ty, &genv.entities, &self_type, depth),
            &Subst::new(),
            depth,
        )
    };

    let positional = def.required.iter().chain(&def.optional);
    for (i, formal) in positional.enumerate() {
        if let Some(ty) = sig.positional(i) {
            plan.inject(declared(ty), *formal);
        }
    }
    if let (Some(rest), Some(ty)) = (def.rest, &sig.rest) {
        plan.inject(declared(ty), rest);
    }
    for keyword in &sig.keywords {
        if let Some((formal, _)) = def.keywords.get(&keyword.name) {
            plan.inject(declared(&keyword.ty), *formal);
        }
    }

    plan.watch(def.ret, id);
    let actual = genv.vertex_type(def.ret);
    let expected = sig_to_type(&sig.ret, &genv.entities, &self_type, depth);
    if !actual.is_bot() && !consistent(&actual, &expected, &mut Subst::new(), &genv.entities) {
        plan.report(
            DiagnosticKind::ReturnMismatch,
            format!(
                "{} returns {} but is declared to return {}",
                super::call::method_label(genv, def.owner, def.singleton, &def.name),
                genv.show_type(&actual),
                genv.show_type(&expected)
            ),
        );
    }
}

pub(super) fn plan_escape(genv: &Genv, id: BoxId, input: VertexId, out: VertexId, plan: &mut Plan) {
    for member in genv.vertex_type(input).members() {
        plan.inject(member, out);
    }
    let mut watched = Vec::new();
    for ty in genv.graph.types(input) {
        genv.container_vertices(ty, &mut watched);
    }
    for v in watched {
        plan.watch(v, id);
    }
}

pub(super) fn plan_unknown(genv: &Genv, name: &Name, out: VertexId, plan: &mut Plan) {
    plan.inject(Type::Any, out);
    if genv.config.report_reflective_calls {
        plan.report(
            DiagnosticKind::ReflectiveCall,
            format!("`{name}' dispatches reflectively; its result is untyped"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflective_names() {
        assert!(is_reflective("send"));
        assert!(is_reflective("instance_variable_get"));
        assert!(!is_reflective("puts"));
    }
}
