//! In-place container mutation
//!
//! Each mutating builtin (`<<`, `push`, `[]=`, ...) has a handler that
//! wires the call's arguments into the element vertices of the receiver's
//! scope-local container, so the container's type grows with every write.

mod array;
mod hash;

use super::Plan;
use crate::genv::ContainerKind;
use crate::ids::VertexId;

pub(crate) use array::*;
pub(crate) use hash::*;

pub(crate) trait MutationHandler {
    /// The method name this handler responds to
    fn method_name(&self) -> &'static str;

    fn applies_to(&self, container: &ContainerKind, method: &str) -> bool;

    /// Add the edges from arguments into element vertices
    fn wire(&self, container: &ContainerKind, args: &[VertexId], plan: &mut Plan);
}

/// Registry of all mutation handlers
pub(crate) struct MutationRegistry {
    handlers: Vec<Box<dyn MutationHandler>>,
}

impl MutationRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            handlers: Vec::new(),
        };

        registry.register(Box::new(ShovelMutation));
        registry.register(Box::new(PushMutation));
        registry.register(Box::new(AppendMutation));
        registry.register(Box::new(UnshiftMutation));
        registry.register(Box::new(InsertMutation));
        registry.register(Box::new(ArrayIndexSetMutation));

        registry.register(Box::new(HashIndexSetMutation));
        registry.register(Box::new(StoreMutation));

        registry
    }

    pub fn register(&mut self, handler: Box<dyn MutationHandler>) {
        self.handlers.push(handler);
    }

    /// Apply the first matching handler; false when none applies
    pub fn wire(
        &self,
        container: &ContainerKind,
        method: &str,
        args: &[VertexId],
        plan: &mut Plan,
    ) -> bool {
        match self
            .handlers
            .iter()
            .find(|h| h.applies_to(container, method))
        {
            Some(handler) => {
                handler.wire(container, args, plan);
                true
            }
            None => false,
        }
    }

    pub fn handles(&self, method: &str) -> bool {
        self.handlers.iter().any(|h| h.method_name() == method)
    }
}

impl Default for MutationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MutationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|h| h.method_name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::PlanSource;
    use crate::graph::{Graph, Target};

    fn array(graph: &mut Graph) -> ContainerKind {
        ContainerKind::Array {
            elems: vec![graph.new_vertex("elem")],
            extra: graph.new_vertex("extra"),
        }
    }

    fn targets(plan: &Plan) -> Vec<(VertexId, Target)> {
        plan.edges
            .iter()
            .filter_map(|(s, t)| match s {
                PlanSource::Vertex(v) => Some((*v, *t)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_push_wires_every_argument() {
        let mut graph = Graph::new();
        let container = array(&mut graph);
        let ContainerKind::Array { extra, .. } = &container else {
            unreachable!()
        };
        let a = graph.new_vertex("a");
        let b = graph.new_vertex("b");
        let mut plan = Plan::default();
        assert!(MutationRegistry::new().wire(&container, "push", &[a, b], &mut plan));
        assert_eq!(
            targets(&plan),
            vec![(a, Target::Vertex(*extra)), (b, Target::Vertex(*extra))]
        );
    }

    #[test]
    fn test_index_set_dispatches_on_container_kind() {
        let mut graph = Graph::new();
        let (k, v) = (graph.new_vertex("k"), graph.new_vertex("v"));
        let hash = ContainerKind::Hash {
            fields: Vec::new(),
            extra_key: graph.new_vertex("key"),
            extra_value: graph.new_vertex("value"),
        };
        let mut plan = Plan::default();
        let registry = MutationRegistry::new();
        assert!(registry.wire(&hash, "[]=", &[k, v], &mut plan));
        assert_eq!(plan.edges.len(), 2);

        let array = array(&mut graph);
        let mut plan = Plan::default();
        assert!(registry.wire(&array, "[]=", &[k, v], &mut plan));
        assert_eq!(targets(&plan).len(), 1);
        assert_eq!(targets(&plan)[0].0, v);
    }

    #[test]
    fn test_non_mutating_method_is_ignored() {
        let mut graph = Graph::new();
        let container = array(&mut graph);
        let mut plan = Plan::default();
        let registry = MutationRegistry::new();
        assert!(!registry.wire(&container, "size", &[], &mut plan));
        assert!(!registry.handles("size"));
        assert!(registry.handles("<<"));
    }
}
