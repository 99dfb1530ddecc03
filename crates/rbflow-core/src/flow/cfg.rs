//! Control flow graph of one local-variable scope

use crate::ast::{Node, NodeId, NodeKind};
use crate::name::Name;
use std::collections::{HashMap, HashSet};

/// Unique identifier for a basic block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

/// A local-variable event inside a basic block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CfgEvent {
    Write(Name),
    Read { node: NodeId, name: Name },
}

/// A basic block in the CFG
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub events: Vec<CfgEvent>,
    pub predecessors: Vec<BlockId>,
    pub successors: Vec<BlockId>,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            events: Vec::new(),
            predecessors: Vec::new(),
            successors: Vec::new(),
        }
    }
}

/// Control Flow Graph
#[derive(Debug)]
pub struct Cfg {
    pub blocks: HashMap<BlockId, BasicBlock>,
    pub entry: BlockId,
    pub exit: BlockId,
    next_block_id: usize,
}

impl Cfg {
    pub fn new() -> Self {
        let mut cfg = Self {
            blocks: HashMap::new(),
            entry: BlockId(0),
            exit: BlockId(0),
            next_block_id: 0,
        };
        cfg.entry = cfg.new_block();
        cfg.exit = cfg.new_block();
        cfg
    }

    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        self.blocks.insert(id, BasicBlock::new(id));
        id
    }

    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        if let Some(block) = self.blocks.get_mut(&from) {
            if !block.successors.contains(&to) {
                block.successors.push(to);
            }
        }
        if let Some(block) = self.blocks.get_mut(&to) {
            if !block.predecessors.contains(&from) {
                block.predecessors.push(from);
            }
        }
    }

    pub fn add_event(&mut self, block: BlockId, event: CfgEvent) {
        if let Some(b) = self.blocks.get_mut(&block) {
            b.events.push(event);
        }
    }

    /// Reachable blocks in reverse postorder
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        let mut visited = HashSet::new();
        let mut postorder = Vec::new();
        // explicit stack; deeply nested bodies must not overflow
        let mut stack = vec![(self.entry, 0usize)];
        visited.insert(self.entry);
        while let Some((block, next)) = stack.pop() {
            let succs = self
                .blocks
                .get(&block)
                .map(|b| b.successors.as_slice())
                .unwrap_or_default();
            match succs.get(next) {
                Some(&succ) => {
                    stack.push((block, next + 1));
                    if visited.insert(succ) {
                        stack.push((succ, 0));
                    }
                }
                None => postorder.push(block),
            }
        }
        postorder.reverse();
        postorder
    }
}

impl Default for Cfg {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the CFG of one scope. Nested method, class and module bodies are
/// collected instead of entered; each is a scope of its own.
pub struct CfgBuilder<'a> {
    cfg: Cfg,
    current: BlockId,
    nested: Vec<&'a Node>,
}

impl<'a> CfgBuilder<'a> {
    /// CFG of the scope opened by `scope` (or the top level when `scope`
    /// opens none), the names bound on entry, and the nested scopes found
    pub fn build(scope: &'a Node) -> (Cfg, Vec<Name>, Vec<&'a Node>) {
        let cfg = Cfg::new();
        let entry = cfg.entry;
        let mut builder = Self {
            cfg,
            current: entry,
            nested: Vec::new(),
        };
        let mut params = Vec::new();
        if let NodeKind::Def(def) = &scope.kind {
            let p = &def.params;
            params.extend(p.required.iter().cloned());
            params.extend(p.optional.iter().map(|(n, _)| n.clone()));
            params.extend(p.rest.iter().cloned());
            params.extend(p.keywords.iter().map(|k| k.name.clone()));
            params.extend(p.kwrest.iter().cloned());
            params.extend(p.block.iter().cloned());
            for name in &params {
                builder.cfg.add_event(entry, CfgEvent::Write(name.clone()));
            }
        }
        if scope.opens_scope() {
            for child in scope.children() {
                builder.visit(child);
            }
        } else {
            builder.visit(scope);
        }
        let exit = builder.cfg.exit;
        builder.cfg.add_edge(builder.current, exit);
        (builder.cfg, params, builder.nested)
    }

    fn goto_new(&mut self, from: BlockId) -> BlockId {
        let block = self.cfg.new_block();
        self.cfg.add_edge(from, block);
        self.current = block;
        block
    }

    fn join(&mut self, from: &[BlockId]) {
        let join = self.cfg.new_block();
        for &b in from {
            self.cfg.add_edge(b, join);
        }
        self.current = join;
    }

    fn visit(&mut self, node: &'a Node) {
        if node.opens_scope() {
            self.nested.push(node);
            return;
        }
        match &node.kind {
            NodeKind::LocalRead(name) => self.cfg.add_event(
                self.current,
                CfgEvent::Read {
                    node: node.id,
                    name: name.clone(),
                },
            ),
            NodeKind::LocalWrite { name, value } => {
                self.visit(value);
                self.cfg.add_event(self.current, CfgEvent::Write(name.clone()));
            }
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.visit(cond);
                let split = self.current;
                self.goto_new(split);
                if let Some(t) = then_branch {
                    self.visit(t);
                }
                let then_end = self.current;
                self.goto_new(split);
                if let Some(e) = else_branch {
                    self.visit(e);
                }
                let else_end = self.current;
                self.join(&[then_end, else_end]);
            }
            NodeKind::And(lhs, rhs) | NodeKind::Or(lhs, rhs) => {
                self.visit(lhs);
                let split = self.current;
                self.goto_new(split);
                self.visit(rhs);
                let rhs_end = self.current;
                self.join(&[split, rhs_end]);
            }
            NodeKind::While { cond, body } => {
                let before = self.current;
                let header = self.goto_new(before);
                self.visit(cond);
                let header_end = self.current;
                self.goto_new(header_end);
                self.visit(body);
                self.cfg.add_edge(self.current, header);
                self.goto_new(header_end);
            }
            NodeKind::Block { params, body } => {
                // runs zero or more times
                let before = self.current;
                let entry = self.goto_new(before);
                for p in params {
                    self.cfg.add_event(entry, CfgEvent::Write(p.clone()));
                }
                self.visit(body);
                let end = self.current;
                self.cfg.add_edge(end, entry);
                self.join(&[before, end]);
            }
            NodeKind::Return(value) => {
                if let Some(v) = value {
                    self.visit(v);
                }
                let exit = self.cfg.exit;
                self.cfg.add_edge(self.current, exit);
                // code after a return is unreachable
                self.current = self.cfg.new_block();
            }
            _ => {
                for child in node.children() {
                    self.visit(child);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::ast::Params;

    #[test]
    fn test_if_creates_diamond() {
        let node = if_(lvar("c"), lasgn("x", int(1)), Some(lasgn("x", int(2))));
        let (cfg, params, nested) = CfgBuilder::build(&node);
        assert!(params.is_empty());
        assert!(nested.is_empty());
        let rpo = cfg.reverse_postorder();
        assert_eq!(rpo.first(), Some(&cfg.entry));
        assert_eq!(rpo.last(), Some(&cfg.exit));
        let joins = cfg
            .blocks
            .values()
            .filter(|b| b.predecessors.len() == 2)
            .count();
        assert_eq!(joins, 1);
    }

    #[test]
    fn test_while_has_back_edge() {
        let node = while_(lvar("c"), lasgn("x", int(1)));
        let (cfg, _, _) = CfgBuilder::build(&node);
        let has_back_edge = cfg.blocks.values().any(|b| {
            b.successors
                .iter()
                .any(|s| cfg.blocks[s].successors.contains(&b.id) && *s != b.id)
        });
        assert!(has_back_edge);
    }

    #[test]
    fn test_nested_scopes_are_collected() {
        let node = stmts(vec![
            def("m", Params::required(&["a"]), vec![lvar("a")]),
            class("Foo", None, vec![]),
        ]);
        let (_, _, nested) = CfgBuilder::build(&node);
        assert_eq!(nested.len(), 2);
        let (cfg, params, _) = CfgBuilder::build(nested[0]);
        assert_eq!(params, vec![Name::new("a")]);
        assert!(cfg.blocks[&cfg.entry]
            .events
            .contains(&CfgEvent::Write(Name::new("a"))));
    }
}
