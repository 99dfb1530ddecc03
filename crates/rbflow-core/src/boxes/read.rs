//! Constant and variable read sites

use super::Plan;
use crate::ast::ConstPath;
use crate::diagnostics::DiagnosticKind;
use crate::entity::{CRef, ConstResolution};
use crate::genv::Genv;
use crate::ids::{ModId, VertexId};
use crate::name::Name;
use crate::types::Type;

pub(super) fn plan_const(genv: &Genv, cref: &CRef, path: &ConstPath, out: VertexId, plan: &mut Plan) {
    match genv.entities.resolve_const(cref, path) {
        ConstResolution::Module(m) => plan.inject(Type::Singleton(m), out),
        ConstResolution::Value { owner, name } => {
            match genv
                .entities
                .const_value(owner, &name)
                .and_then(|v| v.read_vertex())
            {
                Some(v) => plan.flow(v, out),
                None => plan.inject(Type::Any, out),
            }
        }
        ConstResolution::Missing => {
            plan.report(
                DiagnosticKind::UndefinedConstant,
                format!("uninitialized constant {path}"),
            );
            plan.inject(Type::Any, out);
        }
    }
}

pub(super) fn plan_ivar(
    genv: &Genv,
    owner: ModId,
    singleton: bool,
    name: &Name,
    out: VertexId,
    plan: &mut Plan,
) {
    match genv
        .entities
        .resolve_ivar(owner, singleton, name)
        .and_then(|v| v.read_vertex())
    {
        Some(v) => plan.flow(v, out),
        None => {
            plan.report(
                DiagnosticKind::UndefinedVariable,
                format!(
                    "instance variable {name} is never assigned in {}",
                    genv.entities.qualified_name(owner)
                ),
            );
            plan.inject(Type::Any, out);
        }
    }
}

pub(super) fn plan_gvar(genv: &Genv, name: &Name, out: VertexId, plan: &mut Plan) {
    match genv.entities.global(name).and_then(|v| v.read_vertex()) {
        Some(v) => plan.flow(v, out),
        None => {
            plan.report(
                DiagnosticKind::UndefinedVariable,
                format!("global variable {name} is never assigned"),
            );
            plan.inject(Type::Any, out);
        }
    }
}
