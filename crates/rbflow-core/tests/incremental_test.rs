use rbflow_core::ast::build::*;
use rbflow_core::ast::Params;
use rbflow_core::{ModId, Node, NodeId, Phase, Session, SyntaxTree, Type};

fn program_returning(value: Node) -> SyntaxTree {
    SyntaxTree::new(stmts(vec![
        class("A", None, vec![def("m", Params::default(), vec![value])]),
        lasgn("r", call(call(konst("A"), "new", vec![]), "m", vec![])),
        lvar("r"),
    ]))
}

fn fresh(tree: SyntaxTree) -> Session {
    let mut session = Session::default();
    session.update(tree).unwrap();
    session
}

/// Converged type of every node, in pre-order
fn all_types(session: &Session) -> Vec<Option<Type>> {
    let tree = session.tree().unwrap();
    (0..tree.len())
        .map(|i| session.node_type(NodeId(i as u32)))
        .collect()
}

#[test]
fn test_body_edit_leaves_no_residue() {
    let mut session = fresh(program_returning(int(1)));
    assert_eq!(session.node_type(NodeId(0)), Some(Type::integer()));

    session.update(program_returning(string("one"))).unwrap();
    assert_eq!(session.node_type(NodeId(0)), Some(Type::string()));
    let summary = session.summary();
    let m = summary.module("A").unwrap().method(false, "m").unwrap();
    assert_eq!(m.signatures.len(), 1);
    assert_eq!(m.signatures[0].ret, "String");
    session.graph().check_integrity().unwrap();
}

#[test]
fn test_edit_matches_fresh_analysis() {
    let before = SyntaxTree::new(stmts(vec![
        def("f", Params::required(&["x"]), vec![lvar("x")]),
        fcall("f", vec![int(1)]),
        lasgn("a", array(vec![int(1)])),
        call(lvar("a"), "push", vec![float(1.5)]),
        casgn("NAME", string("n")),
    ]));
    let after = || {
        SyntaxTree::new(stmts(vec![
            def("f", Params::required(&["x"]), vec![lvar("x")]),
            fcall("f", vec![string("s")]),
            lasgn("a", array(vec![int(1)])),
            call(lvar("a"), "push", vec![sym("k")]),
            casgn("NAME", int(2)),
        ]))
    };

    let mut edited = fresh(before);
    edited.update(after()).unwrap();
    let reference = fresh(after());

    assert_eq!(all_types(&edited), all_types(&reference));
    assert_eq!(edited.summary(), reference.summary());
    assert_eq!(edited.diagnostics(), reference.diagnostics());
    edited.graph().check_integrity().unwrap();
}

#[test]
fn test_removed_subtree_is_torn_down() {
    let mut session = fresh(SyntaxTree::new(stmts(vec![
        def("old", Params::required(&["a"]), vec![lvar("a")]),
        fcall("old", vec![int(1)]),
    ])));
    let held = session.reachable(NodeId(0)).unwrap();
    assert!(!held.vertices.is_empty());
    assert!(!held.boxes.is_empty());

    let stats = session
        .update(SyntaxTree::new(stmts(vec![
            def("new", Params::required(&["b"]), vec![lvar("b")]),
            fcall("new", vec![int(1)]),
        ])))
        .unwrap();
    assert!(stats.torn_down > 0);
    for v in &held.vertices {
        assert!(!session.graph().is_live(*v), "{v} survived");
    }
    for b in &held.boxes {
        assert!(!session.is_box_live(*b), "{b} survived");
    }
    let object = session.entities().module(ModId::OBJECT).unwrap();
    assert!(object.method(false, "old").map_or(true, |m| m.is_empty()));
    session.graph().check_integrity().unwrap();
}

#[test]
fn test_reverting_an_edit_restores_the_graph_size() {
    let mut session = fresh(program_returning(int(1)));
    let live = session.graph().live_count();
    session.update(program_returning(string("one"))).unwrap();
    session.update(program_returning(int(1))).unwrap();
    assert_eq!(session.graph().live_count(), live);
    assert_eq!(session.node_type(NodeId(0)), Some(Type::integer()));
}

#[test]
fn test_later_siblings_are_reinstalled() {
    let make = |b: i64| {
        SyntaxTree::new(stmts(vec![
            lasgn("a", int(1)),
            lasgn("b", int(b)),
            lasgn("c", int(3)),
        ]))
    };
    let mut session = fresh(make(2));
    let stats = session.update(make(5)).unwrap();

    // ids: 0 root, 1-2 `a = 1`, 3-4 `b = _`, 5-6 `c = 3`
    assert_eq!(session.phase(NodeId(1)), Some(Phase::Reused));
    assert_eq!(session.phase(NodeId(2)), Some(Phase::Reused));
    assert_eq!(session.phase(NodeId(3)), Some(Phase::Installed));
    assert_eq!(session.phase(NodeId(5)), Some(Phase::Installed));
    assert_eq!(stats.reused, 2);
    assert_eq!(session.node_type(NodeId(0)), Some(Type::integer()));
}

#[test]
fn test_shell_match_keeps_method_identity() {
    let mut session = fresh(program_returning(int(1)));
    // ids: 0 root, 1 class, 2 class body, 3 def
    let before = session.reachable(NodeId(3)).unwrap();
    session.update(program_returning(string("one"))).unwrap();
    let after = session.reachable(NodeId(3)).unwrap();
    // formals and return vertex carry over to the reinstalled def
    assert!(after.vertices.iter().any(|v| before.vertices.contains(v)));
    let summary = session.summary();
    let m = summary.module("A").unwrap().method(false, "m").unwrap();
    assert_eq!(m.signatures.len(), 1);
    assert_eq!(session.phase(NodeId(3)), Some(Phase::Installed));
}

/// `def f(n); if n then f(n) else <value> end; end; f(1)`
fn recursive_program(value: Node) -> SyntaxTree {
    SyntaxTree::new(stmts(vec![
        def(
            "f",
            Params::required(&["n"]),
            vec![if_(
                lvar("n"),
                fcall("f", vec![lvar("n")]),
                Some(value),
            )],
        ),
        fcall("f", vec![int(1)]),
    ]))
}

#[test]
fn test_recursive_method_drops_old_return_type() {
    let mut edited = fresh(recursive_program(int(1)));
    assert_eq!(edited.node_type(NodeId(0)), Some(Type::integer()));

    edited.update(recursive_program(string("x"))).unwrap();
    let reference = fresh(recursive_program(string("x")));

    assert_eq!(edited.node_type(NodeId(0)), Some(Type::string()));
    assert_eq!(all_types(&edited), all_types(&reference));
    assert_eq!(edited.summary(), reference.summary());
    edited.graph().check_integrity().unwrap();
}

#[test]
fn test_self_call_only_body_converges_to_nothing() {
    let before = SyntaxTree::new(stmts(vec![
        def(
            "f",
            Params::required(&["n"]),
            vec![if_(lvar("n"), int(1), Some(fcall("f", vec![lvar("n")])))],
        ),
        fcall("f", vec![int(1)]),
    ]));
    let after = || {
        SyntaxTree::new(stmts(vec![
            def("f", Params::required(&["n"]), vec![fcall("f", vec![lvar("n")])]),
            fcall("f", vec![int(1)]),
        ]))
    };

    let mut edited = fresh(before);
    edited.update(after()).unwrap();
    let reference = fresh(after());

    assert_eq!(edited.node_type(NodeId(0)), Some(Type::Bot));
    assert_eq!(all_types(&edited), all_types(&reference));
    edited.graph().check_integrity().unwrap();
}

#[test]
fn test_mutual_recursion_edit_matches_fresh_analysis() {
    let program = |value: Node| {
        SyntaxTree::new(stmts(vec![
            def(
                "f",
                Params::required(&["n"]),
                vec![if_(lvar("n"), value, Some(fcall("g", vec![lvar("n")])))],
            ),
            def("g", Params::required(&["n"]), vec![fcall("f", vec![lvar("n")])]),
            fcall("g", vec![int(1)]),
        ]))
    };

    let mut edited = fresh(program(int(1)));
    edited.update(program(string("x"))).unwrap();
    let reference = fresh(program(string("x")));

    assert_eq!(edited.node_type(NodeId(0)), Some(Type::string()));
    assert_eq!(all_types(&edited), all_types(&reference));
    assert_eq!(edited.summary(), reference.summary());
    assert_eq!(edited.diagnostics(), reference.diagnostics());
    edited.graph().check_integrity().unwrap();
}
