//! Programmatic tree construction
//!
//! Used by tests, demos and front ends that lower their own parse trees.

use super::{CallNode, ConstPath, DefNode, HashPair, KeywordArg, Node, NodeKind, Params};
use crate::name::Name;

pub fn node(kind: NodeKind) -> Node {
    Node::new(kind)
}

pub fn stmts(nodes: Vec<Node>) -> Node {
    node(NodeKind::Statements(nodes))
}

pub fn nil() -> Node {
    node(NodeKind::Nil)
}

pub fn true_() -> Node {
    node(NodeKind::True)
}

pub fn false_() -> Node {
    node(NodeKind::False)
}

pub fn self_() -> Node {
    node(NodeKind::SelfRef)
}

pub fn int(value: i64) -> Node {
    node(NodeKind::Integer(value))
}

pub fn float(value: f64) -> Node {
    node(NodeKind::Float(value))
}

pub fn string(value: &str) -> Node {
    node(NodeKind::Str(value.to_string()))
}

pub fn sym(value: &str) -> Node {
    node(NodeKind::Sym(Name::new(value)))
}

pub fn array(elems: Vec<Node>) -> Node {
    node(NodeKind::Array(elems))
}

pub fn hash(pairs: Vec<(Node, Node)>) -> Node {
    node(NodeKind::Hash(
        pairs
            .into_iter()
            .map(|(key, value)| HashPair { key, value })
            .collect(),
    ))
}

pub fn lvar(name: &str) -> Node {
    node(NodeKind::LocalRead(Name::new(name)))
}

pub fn lasgn(name: &str, value: Node) -> Node {
    node(NodeKind::LocalWrite {
        name: Name::new(name),
        value: Box::new(value),
    })
}

pub fn ivar(name: &str) -> Node {
    node(NodeKind::IvarRead(Name::new(name)))
}

pub fn iasgn(name: &str, value: Node) -> Node {
    node(NodeKind::IvarWrite {
        name: Name::new(name),
        value: Box::new(value),
    })
}

pub fn gvar(name: &str) -> Node {
    node(NodeKind::GvarRead(Name::new(name)))
}

pub fn gasgn(name: &str, value: Node) -> Node {
    node(NodeKind::GvarWrite {
        name: Name::new(name),
        value: Box::new(value),
    })
}

/// Constant reference; `"A::B"` is split into segments
pub fn konst(path: &str) -> Node {
    node(NodeKind::Const(ConstPath::parse(path)))
}

pub fn casgn(path: &str, value: Node) -> Node {
    node(NodeKind::ConstWrite {
        path: ConstPath::parse(path),
        value: Box::new(value),
    })
}

fn call_node(
    recv: Option<Node>,
    name: &str,
    args: Vec<Node>,
    kwargs: Vec<(&str, Node)>,
    block: Option<Node>,
) -> Node {
    node(NodeKind::Call(Box::new(CallNode {
        recv,
        name: Name::new(name),
        args,
        kwargs: kwargs
            .into_iter()
            .map(|(name, value)| KeywordArg {
                name: Name::new(name),
                value,
            })
            .collect(),
        block,
    })))
}

pub fn call(recv: Node, name: &str, args: Vec<Node>) -> Node {
    call_node(Some(recv), name, args, Vec::new(), None)
}

/// Receiverless call such as `puts(x)`
pub fn fcall(name: &str, args: Vec<Node>) -> Node {
    call_node(None, name, args, Vec::new(), None)
}

pub fn call_kw(recv: Option<Node>, name: &str, args: Vec<Node>, kwargs: Vec<(&str, Node)>) -> Node {
    call_node(recv, name, args, kwargs, None)
}

pub fn call_with_block(recv: Option<Node>, name: &str, args: Vec<Node>, block: Node) -> Node {
    call_node(recv, name, args, Vec::new(), Some(block))
}

pub fn block(params: &[&str], body: Vec<Node>) -> Node {
    node(NodeKind::Block {
        params: params.iter().map(|p| Name::new(p)).collect(),
        body: Box::new(stmts(body)),
    })
}

pub fn super_(args: Option<Vec<Node>>) -> Node {
    node(NodeKind::Super { args, block: None })
}

pub fn yield_(args: Vec<Node>) -> Node {
    node(NodeKind::Yield(args))
}

pub fn if_(cond: Node, then_branch: Node, else_branch: Option<Node>) -> Node {
    node(NodeKind::If {
        cond: Box::new(cond),
        then_branch: Some(Box::new(then_branch)),
        else_branch: else_branch.map(Box::new),
    })
}

pub fn while_(cond: Node, body: Node) -> Node {
    node(NodeKind::While {
        cond: Box::new(cond),
        body: Box::new(body),
    })
}

pub fn and(l: Node, r: Node) -> Node {
    node(NodeKind::And(Box::new(l), Box::new(r)))
}

pub fn or(l: Node, r: Node) -> Node {
    node(NodeKind::Or(Box::new(l), Box::new(r)))
}

pub fn ret(value: Option<Node>) -> Node {
    node(NodeKind::Return(value.map(Box::new)))
}

pub fn class(path: &str, superclass: Option<&str>, body: Vec<Node>) -> Node {
    node(NodeKind::Class {
        path: ConstPath::parse(path),
        superclass: superclass.map(ConstPath::parse),
        body: Box::new(stmts(body)),
    })
}

pub fn module(path: &str, body: Vec<Node>) -> Node {
    node(NodeKind::Module {
        path: ConstPath::parse(path),
        body: Box::new(stmts(body)),
    })
}

/// `class << self ... end`
pub fn sclass(body: Vec<Node>) -> Node {
    node(NodeKind::SingletonClass {
        body: Box::new(stmts(body)),
    })
}

pub fn def(name: &str, params: Params, body: Vec<Node>) -> Node {
    node(NodeKind::Def(Box::new(DefNode {
        singleton: false,
        name: Name::new(name),
        params,
        body: stmts(body),
    })))
}

/// `def self.name`
pub fn sdef(name: &str, params: Params, body: Vec<Node>) -> Node {
    node(NodeKind::Def(Box::new(DefNode {
        singleton: true,
        name: Name::new(name),
        params,
        body: stmts(body),
    })))
}

pub fn unknown(label: &str, children: Vec<Node>) -> Node {
    node(NodeKind::Unknown {
        label: label.to_string(),
        children,
    })
}
