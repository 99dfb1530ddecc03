//! Syntax tree consumed by `define` and `install`
//!
//! The tree is produced by an external parser (or the builders in
//! [`build`]) and may be deserialized from JSON. Node ids are assigned in
//! pre-order by [`SyntaxTree::new`], so every subtree occupies a contiguous
//! id range.

pub mod build;

use crate::error::Result;
use crate::name::Name;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 1-based line, 0-based column
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Half-open source range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, pos: Pos) -> bool {
        self.start <= pos && pos < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    fn extent(&self) -> (u32, u32) {
        (
            self.end.line.saturating_sub(self.start.line),
            self.end.column.saturating_sub(self.start.column),
        )
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// A static constant reference such as `A::B` or `::C`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstPath {
    #[serde(default)]
    pub absolute: bool,
    pub segments: Vec<Name>,
}

impl ConstPath {
    /// Parse `"A::B"`; a leading `::` makes the path absolute
    pub fn parse(s: &str) -> Self {
        let absolute = s.starts_with("::");
        let segments = s
            .trim_start_matches("::")
            .split("::")
            .filter(|seg| !seg.is_empty())
            .map(Name::new)
            .collect();
        Self { absolute, segments }
    }

    pub fn last(&self) -> Option<&Name> {
        self.segments.last()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for ConstPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            f.write_str("::")?;
        }
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("::")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordParam {
    pub name: Name,
    #[serde(default)]
    pub default: Option<Node>,
}

/// Formal parameter list of a method definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub required: Vec<Name>,
    pub optional: Vec<(Name, Node)>,
    pub rest: Option<Name>,
    pub keywords: Vec<KeywordParam>,
    pub kwrest: Option<Name>,
    pub block: Option<Name>,
}

impl Params {
    pub fn required(names: &[&str]) -> Self {
        Self {
            required: names.iter().map(|n| Name::new(n)).collect(),
            ..Default::default()
        }
    }

    pub fn with_optional(mut self, name: &str, default: Node) -> Self {
        self.optional.push((Name::new(name), default));
        self
    }

    pub fn with_rest(mut self, name: &str) -> Self {
        self.rest = Some(Name::new(name));
        self
    }

    pub fn with_keyword(mut self, name: &str, default: Option<Node>) -> Self {
        self.keywords.push(KeywordParam {
            name: Name::new(name),
            default,
        });
        self
    }

    pub fn with_kwrest(mut self, name: &str) -> Self {
        self.kwrest = Some(Name::new(name));
        self
    }

    pub fn with_block(mut self, name: &str) -> Self {
        self.block = Some(Name::new(name));
        self
    }

    /// Same names in the same slots; default expressions are compared as
    /// child nodes, not here
    pub fn same_shape(&self, other: &Params) -> bool {
        self.required == other.required
            && self.optional.len() == other.optional.len()
            && self
                .optional
                .iter()
                .zip(&other.optional)
                .all(|((a, _), (b, _))| a == b)
            && self.rest == other.rest
            && self.keywords.len() == other.keywords.len()
            && self
                .keywords
                .iter()
                .zip(&other.keywords)
                .all(|(a, b)| a.name == b.name && a.default.is_some() == b.default.is_some())
            && self.kwrest == other.kwrest
            && self.block == other.block
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashPair {
    pub key: Node,
    pub value: Node,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordArg {
    pub name: Name,
    pub value: Node,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallNode {
    #[serde(default)]
    pub recv: Option<Node>,
    pub name: Name,
    #[serde(default)]
    pub args: Vec<Node>,
    #[serde(default)]
    pub kwargs: Vec<KeywordArg>,
    /// Always a [`NodeKind::Block`] node when present
    #[serde(default)]
    pub block: Option<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefNode {
    #[serde(default)]
    pub singleton: bool,
    pub name: Name,
    #[serde(default)]
    pub params: Params,
    pub body: Node,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Statements(Vec<Node>),
    Nil,
    True,
    False,
    #[serde(rename = "self")]
    SelfRef,
    Integer(i64),
    Float(f64),
    Str(String),
    Sym(Name),
    Array(Vec<Node>),
    Hash(Vec<HashPair>),
    LocalRead(Name),
    LocalWrite {
        name: Name,
        value: Box<Node>,
    },
    IvarRead(Name),
    IvarWrite {
        name: Name,
        value: Box<Node>,
    },
    GvarRead(Name),
    GvarWrite {
        name: Name,
        value: Box<Node>,
    },
    Const(ConstPath),
    ConstWrite {
        path: ConstPath,
        value: Box<Node>,
    },
    Call(Box<CallNode>),
    /// `super` with `args: None` forwards the enclosing method's arguments
    Super {
        #[serde(default)]
        args: Option<Vec<Node>>,
        #[serde(default)]
        block: Option<Box<Node>>,
    },
    Yield(Vec<Node>),
    Block {
        #[serde(default)]
        params: Vec<Name>,
        body: Box<Node>,
    },
    If {
        cond: Box<Node>,
        #[serde(default)]
        then_branch: Option<Box<Node>>,
        #[serde(default)]
        else_branch: Option<Box<Node>>,
    },
    While {
        cond: Box<Node>,
        body: Box<Node>,
    },
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Return(Option<Box<Node>>),
    Class {
        path: ConstPath,
        #[serde(default)]
        superclass: Option<ConstPath>,
        body: Box<Node>,
    },
    Module {
        path: ConstPath,
        body: Box<Node>,
    },
    /// `class << self`
    SingletonClass {
        body: Box<Node>,
    },
    Def(Box<DefNode>),
    /// Anything the front end could not map; evaluates to `untyped`
    Unknown {
        label: String,
        #[serde(default)]
        children: Vec<Node>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    #[serde(skip)]
    pub id: NodeId,
    #[serde(default)]
    pub span: Span,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            id: NodeId::default(),
            span: Span::default(),
            kind,
        }
    }

    /// Attach a source range, `(line, column)` pairs
    pub fn at(mut self, start: (u32, u32), end: (u32, u32)) -> Self {
        self.span = Span::new(Pos::new(start.0, start.1), Pos::new(end.0, end.1));
        self
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Statements(_) => "statements",
            NodeKind::Nil => "nil",
            NodeKind::True => "true",
            NodeKind::False => "false",
            NodeKind::SelfRef => "self",
            NodeKind::Integer(_) => "integer",
            NodeKind::Float(_) => "float",
            NodeKind::Str(_) => "string",
            NodeKind::Sym(_) => "symbol",
            NodeKind::Array(_) => "array",
            NodeKind::Hash(_) => "hash",
            NodeKind::LocalRead(_) => "local_read",
            NodeKind::LocalWrite { .. } => "local_write",
            NodeKind::IvarRead(_) => "ivar_read",
            NodeKind::IvarWrite { .. } => "ivar_write",
            NodeKind::GvarRead(_) => "gvar_read",
            NodeKind::GvarWrite { .. } => "gvar_write",
            NodeKind::Const(_) => "const",
            NodeKind::ConstWrite { .. } => "const_write",
            NodeKind::Call(_) => "call",
            NodeKind::Super { .. } => "super",
            NodeKind::Yield(_) => "yield",
            NodeKind::Block { .. } => "block",
            NodeKind::If { .. } => "if",
            NodeKind::While { .. } => "while",
            NodeKind::And(..) => "and",
            NodeKind::Or(..) => "or",
            NodeKind::Return(_) => "return",
            NodeKind::Class { .. } => "class",
            NodeKind::Module { .. } => "module",
            NodeKind::SingletonClass { .. } => "singleton_class",
            NodeKind::Def(_) => "def",
            NodeKind::Unknown { .. } => "unknown",
        }
    }

    /// Child nodes in canonical order; ids, diffing and installation all
    /// follow this order
    pub fn children(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        match &self.kind {
            NodeKind::Statements(nodes) | NodeKind::Array(nodes) | NodeKind::Yield(nodes) => {
                out.extend(nodes.iter())
            }
            NodeKind::Hash(pairs) => {
                for pair in pairs {
                    out.push(&pair.key);
                    out.push(&pair.value);
                }
            }
            NodeKind::LocalWrite { value, .. }
            | NodeKind::IvarWrite { value, .. }
            | NodeKind::GvarWrite { value, .. }
            | NodeKind::ConstWrite { value, .. } => out.push(value.as_ref()),
            NodeKind::Call(call) => {
                out.extend(call.recv.as_ref());
                out.extend(call.args.iter());
                out.extend(call.kwargs.iter().map(|kw| &kw.value));
                out.extend(call.block.as_ref());
            }
            NodeKind::Super { args, block } => {
                if let Some(args) = args {
                    out.extend(args.iter());
                }
                out.extend(block.as_deref());
            }
            NodeKind::Block { body, .. }
            | NodeKind::Class { body, .. }
            | NodeKind::Module { body, .. }
            | NodeKind::SingletonClass { body } => out.push(body.as_ref()),
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                out.push(cond.as_ref());
                out.extend(then_branch.as_deref());
                out.extend(else_branch.as_deref());
            }
            NodeKind::While { cond, body } => {
                out.push(cond.as_ref());
                out.push(body.as_ref());
            }
            NodeKind::And(l, r) | NodeKind::Or(l, r) => {
                out.push(l.as_ref());
                out.push(r.as_ref());
            }
            NodeKind::Return(value) => out.extend(value.as_deref()),
            NodeKind::Def(def) => {
                out.extend(def.params.optional.iter().map(|(_, n)| n));
                out.extend(def.params.keywords.iter().filter_map(|k| k.default.as_ref()));
                out.push(&def.body);
            }
            NodeKind::Unknown { children, .. } => out.extend(children.iter()),
            NodeKind::Nil
            | NodeKind::True
            | NodeKind::False
            | NodeKind::SelfRef
            | NodeKind::Integer(_)
            | NodeKind::Float(_)
            | NodeKind::Str(_)
            | NodeKind::Sym(_)
            | NodeKind::LocalRead(_)
            | NodeKind::IvarRead(_)
            | NodeKind::GvarRead(_)
            | NodeKind::Const(_) => {}
        }
        out
    }

    fn children_mut(&mut self) -> Vec<&mut Node> {
        let mut out: Vec<&mut Node> = Vec::new();
        match &mut self.kind {
            NodeKind::Statements(nodes) | NodeKind::Array(nodes) | NodeKind::Yield(nodes) => {
                out.extend(nodes.iter_mut())
            }
            NodeKind::Hash(pairs) => {
                for pair in pairs.iter_mut() {
                    out.push(&mut pair.key);
                    out.push(&mut pair.value);
                }
            }
            NodeKind::LocalWrite { value, .. }
            | NodeKind::IvarWrite { value, .. }
            | NodeKind::GvarWrite { value, .. }
            | NodeKind::ConstWrite { value, .. } => out.push(value.as_mut()),
            NodeKind::Call(call) => {
                let call = call.as_mut();
                out.extend(call.recv.as_mut());
                out.extend(call.args.iter_mut());
                out.extend(call.kwargs.iter_mut().map(|kw| &mut kw.value));
                out.extend(call.block.as_mut());
            }
            NodeKind::Super { args, block } => {
                if let Some(args) = args {
                    out.extend(args.iter_mut());
                }
                out.extend(block.as_deref_mut());
            }
            NodeKind::Block { body, .. }
            | NodeKind::Class { body, .. }
            | NodeKind::Module { body, .. }
            | NodeKind::SingletonClass { body } => out.push(body.as_mut()),
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                out.push(cond.as_mut());
                out.extend(then_branch.as_deref_mut());
                out.extend(else_branch.as_deref_mut());
            }
            NodeKind::While { cond, body } => {
                out.push(cond.as_mut());
                out.push(body.as_mut());
            }
            NodeKind::And(l, r) | NodeKind::Or(l, r) => {
                out.push(l.as_mut());
                out.push(r.as_mut());
            }
            NodeKind::Return(value) => out.extend(value.as_deref_mut()),
            NodeKind::Def(def) => {
                let def = def.as_mut();
                out.extend(def.params.optional.iter_mut().map(|(_, n)| n));
                out.extend(
                    def.params
                        .keywords
                        .iter_mut()
                        .filter_map(|k| k.default.as_mut()),
                );
                out.push(&mut def.body);
            }
            NodeKind::Unknown { children, .. } => out.extend(children.iter_mut()),
            NodeKind::Nil
            | NodeKind::True
            | NodeKind::False
            | NodeKind::SelfRef
            | NodeKind::Integer(_)
            | NodeKind::Float(_)
            | NodeKind::Str(_)
            | NodeKind::Sym(_)
            | NodeKind::LocalRead(_)
            | NodeKind::IvarRead(_)
            | NodeKind::GvarRead(_)
            | NodeKind::Const(_) => {}
        }
        out
    }

    /// Compare scalar fields and child shape, ignoring spans and child contents
    pub fn same_attrs(&self, other: &Node) -> bool {
        use NodeKind::*;
        match (&self.kind, &other.kind) {
            (Statements(a), Statements(b)) | (Array(a), Array(b)) | (Yield(a), Yield(b)) => {
                a.len() == b.len()
            }
            (Nil, Nil) | (True, True) | (False, False) | (SelfRef, SelfRef) => true,
            (Integer(a), Integer(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Str(a), Str(b)) => a == b,
            (Sym(a), Sym(b)) => a == b,
            (Hash(a), Hash(b)) => a.len() == b.len(),
            (LocalRead(a), LocalRead(b))
            | (IvarRead(a), IvarRead(b))
            | (GvarRead(a), GvarRead(b)) => a == b,
            (LocalWrite { name: a, .. }, LocalWrite { name: b, .. })
            | (IvarWrite { name: a, .. }, IvarWrite { name: b, .. })
            | (GvarWrite { name: a, .. }, GvarWrite { name: b, .. }) => a == b,
            (Const(a), Const(b)) => a == b,
            (ConstWrite { path: a, .. }, ConstWrite { path: b, .. }) => a == b,
            (Call(a), Call(b)) => {
                a.name == b.name
                    && a.recv.is_some() == b.recv.is_some()
                    && a.args.len() == b.args.len()
                    && a.kwargs.len() == b.kwargs.len()
                    && a.kwargs.iter().zip(&b.kwargs).all(|(x, y)| x.name == y.name)
                    && a.block.is_some() == b.block.is_some()
            }
            (
                Super {
                    args: a,
                    block: ab,
                },
                Super {
                    args: b,
                    block: bb,
                },
            ) => a.as_ref().map(Vec::len) == b.as_ref().map(Vec::len) && ab.is_some() == bb.is_some(),
            (Block { params: a, .. }, Block { params: b, .. }) => a == b,
            (
                If {
                    then_branch: at,
                    else_branch: ae,
                    ..
                },
                If {
                    then_branch: bt,
                    else_branch: be,
                    ..
                },
            ) => at.is_some() == bt.is_some() && ae.is_some() == be.is_some(),
            (While { .. }, While { .. }) | (And(..), And(..)) | (Or(..), Or(..)) => true,
            (Return(a), Return(b)) => a.is_some() == b.is_some(),
            (
                Class {
                    path: a,
                    superclass: asup,
                    ..
                },
                Class {
                    path: b,
                    superclass: bsup,
                    ..
                },
            ) => a == b && asup == bsup,
            (Module { path: a, .. }, Module { path: b, .. }) => a == b,
            (SingletonClass { .. }, SingletonClass { .. }) => true,
            (Def(a), Def(b)) => {
                a.singleton == b.singleton && a.name == b.name && a.params.same_shape(&b.params)
            }
            (
                Unknown {
                    label: a,
                    children: ac,
                },
                Unknown {
                    label: b,
                    children: bc,
                },
            ) => a == b && ac.len() == bc.len(),
            _ => false,
        }
    }

    pub fn subtree_size(&self) -> usize {
        1 + self
            .children()
            .into_iter()
            .map(Node::subtree_size)
            .sum::<usize>()
    }

    /// Nodes of this subtree in pre-order
    pub fn preorder(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            let mut children = node.children();
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Local variables assigned in this subtree, excluding nested method,
    /// class and module bodies which open their own scope
    pub fn modified_vars(&self) -> IndexSet<Name> {
        let mut vars = IndexSet::new();
        collect_modified(self, &mut vars);
        vars
    }

    pub fn opens_scope(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Def(_)
                | NodeKind::Class { .. }
                | NodeKind::Module { .. }
                | NodeKind::SingletonClass { .. }
        )
    }
}

fn collect_modified(node: &Node, vars: &mut IndexSet<Name>) {
    if let NodeKind::LocalWrite { name, .. } = &node.kind {
        vars.insert(name.clone());
    }
    for child in node.children() {
        if !child.opens_scope() {
            collect_modified(child, vars);
        }
    }
}

/// A syntax tree with assigned node ids
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    root: Node,
    len: usize,
}

impl SyntaxTree {
    pub fn new(mut root: Node) -> Self {
        let mut next = 0u32;
        assign_ids(&mut root, &mut next);
        Self {
            root,
            len: next as usize,
        }
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let root: Node = serde_json::from_str(s)?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn find(&self, id: NodeId) -> Option<&Node> {
        let mut node = &self.root;
        if id.index() >= self.len {
            return None;
        }
        // pre-order ids: descend into the child whose range covers `id`
        loop {
            if node.id == id {
                return Some(node);
            }
            let mut next = None;
            for child in node.children() {
                if child.id <= id {
                    next = Some(child);
                } else {
                    break;
                }
            }
            node = next?;
        }
    }

    /// Innermost node whose span covers `pos`
    pub fn node_at(&self, pos: Pos) -> Option<&Node> {
        self.root
            .preorder()
            .into_iter()
            .filter(|n| n.span.contains(pos))
            .min_by(|a, b| {
                a.span
                    .extent()
                    .cmp(&b.span.extent())
                    .then_with(|| b.id.cmp(&a.id))
            })
    }
}

fn assign_ids(node: &mut Node, next: &mut u32) {
    node.id = NodeId(*next);
    *next += 1;
    for child in node.children_mut() {
        assign_ids(child, next);
    }
}
