//! Namespace hierarchy as a graph
//!
//! Nodes are qualified namespace names; edges point from a class to its
//! superclass and from a namespace to each module it includes. Builtin
//! parents that the summary does not list still get a node.

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rbflow_core::entity::ModuleKind;
use rbflow_core::ProgramSummary;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Superclass,
    Include,
}

#[derive(Debug, Default)]
pub struct HierarchyGraph {
    graph: DiGraph<String, Relation>,
    index: IndexMap<String, NodeIndex>,
}

impl HierarchyGraph {
    pub fn from_summary(summary: &ProgramSummary) -> Self {
        let mut hierarchy = Self::default();
        for module in &summary.modules {
            let node = hierarchy.node(&module.name);
            if let Some(sup) = &module.superclass {
                let parent = hierarchy.node(sup);
                hierarchy.graph.add_edge(node, parent, Relation::Superclass);
            }
            for inc in &module.includes {
                let target = hierarchy.node(inc);
                hierarchy.graph.add_edge(node, target, Relation::Include);
            }
        }
        hierarchy
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(idx) = self.index.get(name) {
            return *idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
        idx
    }

    pub fn graph(&self) -> &DiGraph<String, Relation> {
        &self.graph
    }

    pub fn superclass(&self, name: &str) -> Option<&str> {
        let idx = *self.index.get(name)?;
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .find(|e| *e.weight() == Relation::Superclass)
            .map(|e| self.graph[e.target()].as_str())
    }

    /// Number of superclass links from `name` up to the root of its chain
    pub fn depth(&self, name: &str) -> usize {
        let mut depth = 0;
        let mut current = name;
        while let Some(parent) = self.superclass(current) {
            depth += 1;
            // a superclass chain cannot be longer than the node count
            if depth > self.graph.node_count() {
                break;
            }
            current = parent;
        }
        depth
    }

    /// Namespaces that include `module`
    pub fn includers(&self, module: &str) -> Vec<&str> {
        let Some(idx) = self.index.get(module) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(*idx, Direction::Incoming)
            .filter(|e| *e.weight() == Relation::Include)
            .map(|e| self.graph[e.source()].as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyMetrics {
    pub classes: usize,
    pub modules: usize,
    pub include_edges: usize,
    /// Longest superclass chain among the program's classes
    pub max_inheritance_depth: usize,
    pub deepest_class: Option<String>,
}

impl HierarchyMetrics {
    pub fn from_summary(summary: &ProgramSummary) -> Self {
        let hierarchy = HierarchyGraph::from_summary(summary);
        let mut metrics = Self {
            include_edges: hierarchy
                .graph()
                .edge_weights()
                .filter(|r| **r == Relation::Include)
                .count(),
            ..Self::default()
        };
        for module in &summary.modules {
            match module.kind {
                ModuleKind::Module => metrics.modules += 1,
                ModuleKind::Class => {
                    metrics.classes += 1;
                    let depth = hierarchy.depth(&module.name);
                    if depth > metrics.max_inheritance_depth {
                        metrics.max_inheritance_depth = depth;
                        metrics.deepest_class = Some(module.name.clone());
                    }
                }
            }
        }
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbflow_core::ModuleSummary;

    fn class(name: &str, superclass: Option<&str>, includes: &[&str]) -> ModuleSummary {
        ModuleSummary {
            name: name.to_string(),
            kind: ModuleKind::Class,
            superclass: superclass.map(str::to_string),
            includes: includes.iter().map(|s| s.to_string()).collect(),
            constants: Vec::new(),
            ivars: Vec::new(),
            methods: Vec::new(),
        }
    }

    #[test]
    fn test_depth_follows_superclass_chain() {
        let summary = ProgramSummary {
            modules: vec![
                class("A", Some("Object"), &[]),
                class("B", Some("A"), &["Comparable"]),
                class("C", Some("B"), &[]),
            ],
            globals: Vec::new(),
        };
        let hierarchy = HierarchyGraph::from_summary(&summary);
        assert_eq!(hierarchy.depth("C"), 3);
        assert_eq!(hierarchy.superclass("B"), Some("A"));
        assert_eq!(hierarchy.includers("Comparable"), vec!["B"]);

        let metrics = HierarchyMetrics::from_summary(&summary);
        assert_eq!(metrics.classes, 3);
        assert_eq!(metrics.include_edges, 1);
        assert_eq!(metrics.max_inheritance_depth, 3);
        assert_eq!(metrics.deepest_class.as_deref(), Some("C"));
    }
}
