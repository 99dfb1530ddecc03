//! Array mutation handlers

use super::MutationHandler;
use crate::boxes::Plan;
use crate::genv::ContainerKind;
use crate::ids::VertexId;

fn wire_all(container: &ContainerKind, args: &[VertexId], plan: &mut Plan) {
    if let ContainerKind::Array { extra, .. } = container {
        for arg in args {
            plan.flow(*arg, *extra);
        }
    }
}

/// Handler for `array << element`
pub(crate) struct ShovelMutation;

impl MutationHandler for ShovelMutation {
    fn method_name(&self) -> &'static str {
        "<<"
    }

    fn applies_to(&self, container: &ContainerKind, method: &str) -> bool {
        method == "<<" && matches!(container, ContainerKind::Array { .. })
    }

    fn wire(&self, container: &ContainerKind, args: &[VertexId], plan: &mut Plan) {
        wire_all(container, &args[..args.len().min(1)], plan);
    }
}

/// Handler for `array.push(a, b, ...)`
pub(crate) struct PushMutation;

impl MutationHandler for PushMutation {
    fn method_name(&self) -> &'static str {
        "push"
    }

    fn applies_to(&self, container: &ContainerKind, method: &str) -> bool {
        method == "push" && matches!(container, ContainerKind::Array { .. })
    }

    fn wire(&self, container: &ContainerKind, args: &[VertexId], plan: &mut Plan) {
        wire_all(container, args, plan);
    }
}

/// Handler for `array.append(a, b, ...)`
pub(crate) struct AppendMutation;

impl MutationHandler for AppendMutation {
    fn method_name(&self) -> &'static str {
        "append"
    }

    fn applies_to(&self, container: &ContainerKind, method: &str) -> bool {
        method == "append" && matches!(container, ContainerKind::Array { .. })
    }

    fn wire(&self, container: &ContainerKind, args: &[VertexId], plan: &mut Plan) {
        wire_all(container, args, plan);
    }
}

/// Handler for `array.unshift(a, b, ...)`
pub(crate) struct UnshiftMutation;

impl MutationHandler for UnshiftMutation {
    fn method_name(&self) -> &'static str {
        "unshift"
    }

    fn applies_to(&self, container: &ContainerKind, method: &str) -> bool {
        method == "unshift" && matches!(container, ContainerKind::Array { .. })
    }

    fn wire(&self, container: &ContainerKind, args: &[VertexId], plan: &mut Plan) {
        wire_all(container, args, plan);
    }
}

/// Handler for `array.insert(index, a, b, ...)`
pub(crate) struct InsertMutation;

impl MutationHandler for InsertMutation {
    fn method_name(&self) -> &'static str {
        "insert"
    }

    fn applies_to(&self, container: &ContainerKind, method: &str) -> bool {
        method == "insert" && matches!(container, ContainerKind::Array { .. })
    }

    fn wire(&self, container: &ContainerKind, args: &[VertexId], plan: &mut Plan) {
        // first argument is the position
        wire_all(container, args.get(1..).unwrap_or_default(), plan);
    }
}

/// Handler for `array[index] = value`
pub(crate) struct ArrayIndexSetMutation;

impl MutationHandler for ArrayIndexSetMutation {
    fn method_name(&self) -> &'static str {
        "[]="
    }

    fn applies_to(&self, container: &ContainerKind, method: &str) -> bool {
        method == "[]=" && matches!(container, ContainerKind::Array { .. })
    }

    fn wire(&self, container: &ContainerKind, args: &[VertexId], plan: &mut Plan) {
        if args.len() >= 2 {
            wire_all(container, &args[args.len() - 1..], plan);
        }
    }
}
