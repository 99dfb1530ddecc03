//! The `define` walk: static facts a tree contributes before any wiring

use super::NodeState;
use crate::ast::{CallNode, ConstPath, Node, NodeId, NodeKind};
use crate::entity::{CRef, ConstRef, ModuleKind, Origin};
use crate::error::{CoreError, Result};
use crate::genv::{Genv, StaticFact};
use crate::ids::ModId;
use crate::name::Name;
use std::rc::Rc;
use tracing::debug;

pub(crate) const ATTR_METHODS: [&str; 3] = ["attr_reader", "attr_writer", "attr_accessor"];

/// Lexical context of the walk
#[derive(Clone)]
struct Scope {
    cref: Rc<CRef>,
    in_def: bool,
    /// Where instance variables written here live
    ivar_owner: (ModId, bool),
}

pub(crate) struct Definer<'a> {
    genv: &'a mut Genv,
    generation: u32,
    states: &'a mut [NodeState],
    applied: Vec<(NodeId, Origin, StaticFact)>,
}

impl<'a> Definer<'a> {
    pub fn new(genv: &'a mut Genv, generation: u32, states: &'a mut [NodeState]) -> Self {
        Self {
            genv,
            generation,
            states,
            applied: Vec::new(),
        }
    }

    /// Register every static fact of the tree. On an unsupported construct
    /// the facts applied so far are withdrawn again and the tables are left
    /// as they were.
    pub fn run(mut self, root: &Node) -> Result<usize> {
        let scope = Scope {
            cref: CRef::top(),
            in_def: false,
            ivar_owner: (ModId::OBJECT, false),
        };
        if let Err(err) = self.define(root, &scope) {
            debug!(%err, facts = self.applied.len(), "define failed, rolling back");
            for (node, origin, fact) in self.applied.drain(..).rev() {
                self.genv.apply_fact(origin, &fact, false);
                if let Some(state) = self.states.get_mut(node.index()) {
                    state.facts.clear();
                    state.module = None;
                }
            }
            return Err(err);
        }
        for state in self.states.iter_mut() {
            state.phase = super::Phase::Defined;
        }
        Ok(self.applied.len())
    }

    fn fact(&mut self, node: NodeId, fact: StaticFact) {
        let origin = Origin::Node {
            tree: self.generation,
            node,
        };
        self.genv.apply_fact(origin, &fact, true);
        if let Some(state) = self.states.get_mut(node.index()) {
            state.facts.push((origin, fact.clone()));
        }
        self.applied.push((node, origin, fact));
    }

    fn set_module(&mut self, node: NodeId, module: ModId) {
        if let Some(state) = self.states.get_mut(node.index()) {
            state.module = Some(module);
        }
    }

    /// Namespace a class or module header opens, created if missing
    fn namespace(&mut self, scope: &Scope, path: &ConstPath, construct: &'static str) -> Result<ModId> {
        let Some((last, prefix)) = path.segments.split_last() else {
            return Err(CoreError::unsupported(construct, "empty namespace path"));
        };
        let parent = self.owner_of(scope, path.absolute, prefix);
        Ok(self.genv.entities.ensure_child(parent, last))
    }

    /// Namespace named by the leading segments of a path
    fn owner_of(&mut self, scope: &Scope, absolute: bool, prefix: &[Name]) -> ModId {
        let base = if absolute {
            ModId::OBJECT
        } else {
            scope.cref.module
        };
        if prefix.is_empty() {
            return base;
        }
        let prefix_path = ConstPath {
            absolute,
            segments: prefix.to_vec(),
        };
        match self.genv.entities.resolve_lexical(&scope.cref, &prefix_path) {
            Some(m) => m,
            None => prefix
                .iter()
                .fold(base, |parent, seg| self.genv.entities.ensure_child(parent, seg)),
        }
    }

    fn define(&mut self, node: &Node, scope: &Scope) -> Result<()> {
        match &node.kind {
            NodeKind::Class {
                path,
                superclass,
                body,
            } => {
                let module = self.namespace(scope, path, "class")?;
                self.fact(
                    node.id,
                    StaticFact::ModuleDef {
                        module,
                        kind: ModuleKind::Class,
                    },
                );
                if let Some(sup) = superclass {
                    self.fact(
                        node.id,
                        StaticFact::Superclass {
                            module,
                            reference: ConstRef {
                                cref: Rc::clone(&scope.cref),
                                path: sup.clone(),
                            },
                        },
                    );
                }
                self.set_module(node.id, module);
                self.define(body, &Self::namespace_scope(scope, module, false))
            }
            NodeKind::Module { path, body } => {
                let module = self.namespace(scope, path, "module")?;
                self.fact(
                    node.id,
                    StaticFact::ModuleDef {
                        module,
                        kind: ModuleKind::Module,
                    },
                );
                self.set_module(node.id, module);
                self.define(body, &Self::namespace_scope(scope, module, false))
            }
            NodeKind::SingletonClass { body } => {
                if scope.in_def {
                    return Err(CoreError::unsupported(
                        "singleton_class",
                        "`class << self` inside a method body",
                    ));
                }
                let module = scope.cref.module;
                self.set_module(node.id, module);
                self.define(body, &Self::namespace_scope(scope, module, true))
            }
            NodeKind::Def(def) => {
                let owner = scope.cref.module;
                let singleton = def.singleton || scope.cref.singleton;
                let inner = Scope {
                    cref: Rc::clone(&scope.cref),
                    in_def: true,
                    ivar_owner: (owner, singleton),
                };
                self.define_children(node, &inner)
            }
            NodeKind::Super { args, block } => {
                if !scope.in_def {
                    return Err(CoreError::unsupported(
                        "super",
                        "used outside of a method body",
                    ));
                }
                for arg in args.iter().flatten() {
                    self.define(arg, scope)?;
                }
                match block {
                    Some(block) => self.define_block(block, scope),
                    None => Ok(()),
                }
            }
            NodeKind::Yield(_) if !scope.in_def => Err(CoreError::unsupported(
                "yield",
                "used outside of a method body",
            )),
            NodeKind::Block { .. } => Err(CoreError::unsupported(
                "block",
                "a block may only appear as the block of a call",
            )),
            NodeKind::Call(call) => {
                self.call_facts(node.id, call, scope);
                for child in call.recv.iter().chain(&call.args) {
                    self.define(child, scope)?;
                }
                for kw in &call.kwargs {
                    self.define(&kw.value, scope)?;
                }
                match &call.block {
                    Some(block) => self.define_block(block, scope),
                    None => Ok(()),
                }
            }
            NodeKind::ConstWrite { path, value } => {
                let Some((last, prefix)) = path.segments.split_last() else {
                    return Err(CoreError::unsupported(
                        "const_write",
                        "empty constant path",
                    ));
                };
                let owner = self.owner_of(scope, path.absolute, prefix);
                self.set_module(node.id, owner);
                self.fact(
                    node.id,
                    StaticFact::ConstDef {
                        owner,
                        name: last.clone(),
                    },
                );
                self.define(value, scope)
            }
            NodeKind::IvarWrite { name, value } => {
                let (owner, singleton) = scope.ivar_owner;
                self.fact(
                    node.id,
                    StaticFact::IvarDef {
                        owner,
                        singleton,
                        name: name.clone(),
                    },
                );
                self.define(value, scope)
            }
            NodeKind::GvarWrite { name, value } => {
                self.fact(node.id, StaticFact::GvarDef { name: name.clone() });
                self.define(value, scope)
            }
            _ => self.define_children(node, scope),
        }
    }

    fn define_children(&mut self, node: &Node, scope: &Scope) -> Result<()> {
        for child in node.children() {
            self.define(child, scope)?;
        }
        Ok(())
    }

    fn define_block(&mut self, block: &Node, scope: &Scope) -> Result<()> {
        match &block.kind {
            NodeKind::Block { body, .. } => self.define(body, scope),
            _ => Err(CoreError::unsupported(
                "block",
                format!("expected a block node, found `{}`", block.kind_name()),
            )),
        }
    }

    fn namespace_scope(scope: &Scope, module: ModId, singleton: bool) -> Scope {
        Scope {
            cref: scope.cref.push(module, singleton),
            in_def: false,
            ivar_owner: (module, true),
        }
    }

    /// `include` and `attr_*` in a class body
    fn call_facts(&mut self, node: NodeId, call: &CallNode, scope: &Scope) {
        if call.recv.is_some() || scope.in_def || scope.cref.outer.is_none() {
            return;
        }
        let module = scope.cref.module;
        match call.name.as_str() {
            "include" => {
                let refs: Vec<ConstRef> = call
                    .args
                    .iter()
                    .filter_map(|arg| match &arg.kind {
                        NodeKind::Const(path) => Some(ConstRef {
                            cref: Rc::clone(&scope.cref),
                            path: path.clone(),
                        }),
                        _ => None,
                    })
                    .collect();
                if !refs.is_empty() && !scope.cref.singleton {
                    self.fact(node, StaticFact::Include { module, refs });
                }
            }
            "attr_writer" | "attr_accessor" => {
                for attr in attr_names(call) {
                    self.fact(
                        node,
                        StaticFact::IvarDef {
                            owner: module,
                            singleton: scope.cref.singleton,
                            name: Name::ivar_for(attr.as_str()),
                        },
                    );
                }
            }
            _ => {}
        }
    }
}

/// Attribute names of an `attr_*` call; non-literal arguments are skipped
pub(crate) fn attr_names(call: &CallNode) -> impl Iterator<Item = &Name> {
    call.args.iter().filter_map(|arg| match &arg.kind {
        NodeKind::Sym(name) => Some(name),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::ast::SyntaxTree;
    use crate::config::AnalysisConfig;

    fn states_for(tree: &SyntaxTree) -> Vec<NodeState> {
        (0..tree.len()).map(|_| NodeState::default()).collect()
    }

    #[test]
    fn test_nested_class_lands_in_module() {
        let mut genv = Genv::new(AnalysisConfig::default());
        let tree = SyntaxTree::new(module("Outer", vec![class("Inner", None, vec![])]));
        let mut states = states_for(&tree);
        Definer::new(&mut genv, 1, &mut states)
            .run(tree.root())
            .unwrap();
        let inner = genv
            .entities
            .lookup_path(&crate::name::path(&["Outer", "Inner"]))
            .unwrap();
        assert_eq!(genv.entities.kind(inner), Some(ModuleKind::Class));
        assert!(states.iter().all(|s| s.phase == super::super::Phase::Defined));
    }

    #[test]
    fn test_unsupported_rolls_back() {
        let mut genv = Genv::new(AnalysisConfig::default());
        let tree = SyntaxTree::new(stmts(vec![
            class("Kept", None, vec![]),
            super_(Some(vec![])),
        ]));
        let mut states = states_for(&tree);
        let err = Definer::new(&mut genv, 1, &mut states)
            .run(tree.root())
            .unwrap_err();
        assert!(matches!(err, CoreError::Unsupported { construct: "super", .. }));
        assert!(genv.entities.lookup_path(&crate::name::path(&["Kept"])).is_none());
        assert!(states.iter().all(|s| s.facts.is_empty()));
    }

    #[test]
    fn test_yield_outside_method() {
        let mut genv = Genv::new(AnalysisConfig::default());
        let tree = SyntaxTree::new(yield_(vec![]));
        let mut states = states_for(&tree);
        let err = Definer::new(&mut genv, 1, &mut states)
            .run(tree.root())
            .unwrap_err();
        assert!(matches!(err, CoreError::Unsupported { construct: "yield", .. }));
    }

    #[test]
    fn test_attr_writer_defines_ivar() {
        let mut genv = Genv::new(AnalysisConfig::default());
        let tree = SyntaxTree::new(class(
            "Point",
            None,
            vec![fcall("attr_accessor", vec![sym("x")])],
        ));
        let mut states = states_for(&tree);
        Definer::new(&mut genv, 1, &mut states)
            .run(tree.root())
            .unwrap();
        let point = genv.entities.lookup_path(&crate::name::path(&["Point"])).unwrap();
        assert!(genv.entities.resolve_ivar(point, false, "@x").is_some());
    }
}
