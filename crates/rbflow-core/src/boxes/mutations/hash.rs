//! Hash mutation handlers

use super::MutationHandler;
use crate::boxes::Plan;
use crate::genv::ContainerKind;
use crate::ids::VertexId;

fn wire_pair(container: &ContainerKind, args: &[VertexId], plan: &mut Plan) {
    if let (
        ContainerKind::Hash {
            extra_key,
            extra_value,
            ..
        },
        [key, value, ..],
    ) = (container, args)
    {
        plan.flow(*key, *extra_key);
        plan.flow(*value, *extra_value);
    }
}

/// Handler for `hash[key] = value`
pub(crate) struct HashIndexSetMutation;

impl MutationHandler for HashIndexSetMutation {
    fn method_name(&self) -> &'static str {
        "[]="
    }

    fn applies_to(&self, container: &ContainerKind, method: &str) -> bool {
        method == "[]=" && matches!(container, ContainerKind::Hash { .. })
    }

    fn wire(&self, container: &ContainerKind, args: &[VertexId], plan: &mut Plan) {
        wire_pair(container, args, plan);
    }
}

/// Handler for `hash.store(key, value)`
pub(crate) struct StoreMutation;

impl MutationHandler for StoreMutation {
    fn method_name(&self) -> &'static str {
        "store"
    }

    fn applies_to(&self, container: &ContainerKind, method: &str) -> bool {
        method == "store" && matches!(container, ContainerKind::Hash { .. })
    }

    fn wire(&self, container: &ContainerKind, args: &[VertexId], plan: &mut Plan) {
        wire_pair(container, args, plan);
    }
}
