use rbflow_core::ast::build::*;
use rbflow_core::ast::Params;
use rbflow_core::{
    AnalysisConfig, CoreError, DiagnosticKind, MethodSig, Node, NodeId, Pos, Provenance, Session,
    SigType, SignatureTable, SummaryKind, SyntaxTree, Type,
};

fn analyze(program: Vec<Node>) -> Session {
    let mut session = Session::default();
    session.update(SyntaxTree::new(stmts(program))).unwrap();
    session
}

/// Value of the last top-level statement
fn result_type(session: &Session) -> Type {
    session.node_type(NodeId(0)).unwrap()
}

/// Id of the last node of the given kind in pre-order
fn last_of(session: &Session, kind: &str) -> NodeId {
    session
        .tree()
        .unwrap()
        .root()
        .preorder()
        .into_iter()
        .filter(|n| n.kind_name() == kind)
        .last()
        .map(|n| n.id)
        .unwrap()
}

#[test]
fn test_inherited_method_result_is_not_a_union() {
    let session = analyze(vec![
        class("A", None, vec![def("m", Params::default(), vec![int(1)])]),
        class("B", Some("A"), vec![]),
        call(call(konst("B"), "new", vec![]), "m", vec![]),
    ]);
    assert_eq!(result_type(&session), Type::integer());
    assert!(session.diagnostics().is_empty());
}

#[test]
fn test_shared_definition_joins_argument_types() {
    let session = analyze(vec![
        def("f", Params::required(&["x"]), vec![lvar("x")]),
        fcall("f", vec![int(1)]),
        fcall("f", vec![string("a")]),
    ]);
    let both = Type::integer().union(&Type::string());
    assert_eq!(result_type(&session), both);

    let summary = session.summary();
    let f = summary.module("Object").unwrap().method(false, "f").unwrap();
    assert_eq!(f.kind, SummaryKind::Inferred);
    assert_eq!(f.signatures.len(), 1);
    assert_eq!(f.signatures[0].required, vec!["Integer | String".to_string()]);
    assert_eq!(f.signatures[0].ret, "Integer | String");
}

#[test]
fn test_declared_signature_wins_over_inference() {
    let mut session = Session::default();
    let table = SignatureTable::new().class("Greeter", None).method(
        "Greeter",
        "greet",
        MethodSig::new(vec![], SigType::named("String")),
    );
    session.load_signatures(&table).unwrap();
    session
        .update(SyntaxTree::new(stmts(vec![
            class("Greeter", None, vec![def("greet", Params::default(), vec![int(1)])]),
            call(call(konst("Greeter"), "new", vec![]), "greet", vec![]),
        ])))
        .unwrap();

    assert_eq!(result_type(&session), Type::string());
    let mismatches: Vec<_> = session
        .diagnostics()
        .into_iter()
        .filter(|d| d.kind == DiagnosticKind::ReturnMismatch)
        .collect();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].provenance, Provenance::MethodDefinition);

    let summary = session.summary();
    let greet = summary.module("Greeter").unwrap().method(false, "greet").unwrap();
    assert_eq!(greet.kind, SummaryKind::Declared);
    assert_eq!(greet.signatures[0].to_string(), "() -> String");
}

#[test]
fn test_attr_accessor_reads_what_was_written() {
    let session = analyze(vec![
        class(
            "Point",
            None,
            vec![
                fcall("attr_accessor", vec![sym("x")]),
                def(
                    "initialize",
                    Params::required(&["v"]),
                    vec![iasgn("@x", lvar("v"))],
                ),
            ],
        ),
        lasgn("p", call(konst("Point"), "new", vec![int(3)])),
        call(lvar("p"), "x=", vec![string("s")]),
        call(lvar("p"), "x", vec![]),
    ]);
    assert_eq!(result_type(&session), Type::integer().union(&Type::string()));

    let summary = session.summary();
    let point = summary.module("Point").unwrap();
    assert!(point.method(false, "x").is_some());
    assert!(point.method(false, "x=").is_some());
    assert_eq!(point.ivars.len(), 1);
    assert_eq!(point.ivars[0].name, "@x");
}

#[test]
fn test_constant_read_sees_assigned_value() {
    let session = analyze(vec![casgn("LIMIT", int(10)), konst("LIMIT")]);
    assert_eq!(result_type(&session), Type::integer());
}

#[test]
fn test_undefined_constant_is_untyped() {
    let session = analyze(vec![konst("Missing")]);
    assert_eq!(result_type(&session), Type::Any);
    let diagnostics = session.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::UndefinedConstant);
    assert_eq!(diagnostics[0].provenance, Provenance::ConstantRead);
}

#[test]
fn test_yield_feeds_block_parameters() {
    let session = analyze(vec![
        def("run", Params::default(), vec![yield_(vec![int(1)])]),
        call_with_block(
            None,
            "run",
            vec![],
            block(&["v"], vec![call(lvar("v"), "to_s", vec![])]),
        ),
    ]);
    assert_eq!(result_type(&session), Type::string());
    let v = last_of(&session, "local_read");
    assert_eq!(session.node_type(v), Some(Type::integer()));
}

#[test]
fn test_array_push_widens_elements() {
    let session = analyze(vec![
        lasgn("a", array(vec![int(1)])),
        call(lvar("a"), "<<", vec![string("s")]),
        lvar("a"),
    ]);
    assert_eq!(
        result_type(&session),
        Type::array_of(Type::integer().union(&Type::string()))
    );
}

#[test]
fn test_hash_store_is_visible_in_the_literal() {
    let session = analyze(vec![
        lasgn("h", hash(vec![(sym("a"), int(1))])),
        call(lvar("h"), "[]=", vec![string("k"), string("v")]),
        lvar("h"),
    ]);
    let shown = session.genv().show_type(&result_type(&session));
    assert!(shown.contains("String"), "{shown}");
}

#[test]
fn test_include_exposes_module_methods() {
    let session = analyze(vec![
        module("Greeting", vec![def("hi", Params::default(), vec![string("x")])]),
        class("Person", None, vec![fcall("include", vec![konst("Greeting")])]),
        call(call(konst("Person"), "new", vec![]), "hi", vec![]),
    ]);
    assert_eq!(result_type(&session), Type::string());
    let summary = session.summary();
    assert_eq!(
        summary.module("Person").unwrap().includes,
        vec!["Greeting".to_string()]
    );
}

#[test]
fn test_bare_super_forwards_arguments() {
    let session = analyze(vec![
        class("A", None, vec![def("m", Params::required(&["x"]), vec![lvar("x")])]),
        class(
            "B",
            Some("A"),
            vec![def("m", Params::required(&["x"]), vec![super_(None)])],
        ),
        call(call(konst("B"), "new", vec![]), "m", vec![int(1)]),
    ]);
    assert_eq!(result_type(&session), Type::integer());
}

#[test]
fn test_unknown_and_reflective_calls_are_untyped() {
    let mut session = Session::new(AnalysisConfig {
        report_reflective_calls: true,
        ..AnalysisConfig::default()
    });
    session
        .update(SyntaxTree::new(stmts(vec![
            unknown("heredoc", vec![]),
            call(int(1), "send", vec![sym("+"), int(2)]),
        ])))
        .unwrap();
    assert_eq!(session.node_type(NodeId(1)), Some(Type::Any));
    assert_eq!(result_type(&session), Type::Any);
    let diagnostics = session.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::ReflectiveCall);
    assert_eq!(diagnostics[0].provenance, Provenance::UnknownCall);
}

#[test]
fn test_diagnostics_follow_source_order() {
    let session = analyze(vec![
        call(int(1), "frobnicate", vec![]),
        konst("Missing"),
        gvar("$never"),
    ]);
    let kinds: Vec<DiagnosticKind> = session.diagnostics().iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        vec![
            DiagnosticKind::UndefinedMethod,
            DiagnosticKind::UndefinedConstant,
            DiagnosticKind::UndefinedVariable,
        ]
    );
    let first = &session.diagnostics()[0];
    assert_eq!(first.node, NodeId(1));
    assert_eq!(first.provenance, Provenance::CallSite);
}

#[test]
fn test_maybe_unassigned_local_reads_nil() {
    let session = analyze(vec![
        if_(true_(), lasgn("x", int(1)), None),
        lvar("x"),
    ]);
    assert_eq!(result_type(&session), Type::integer().union(&Type::nil()));
}

#[test]
fn test_loop_assignment_reaches_later_reads() {
    let session = analyze(vec![
        lasgn("x", int(1)),
        while_(true_(), lasgn("x", string("s"))),
        lvar("x"),
    ]);
    assert_eq!(result_type(&session), Type::integer().union(&Type::string()));
}

#[test]
fn test_keyword_parameters_in_summary() {
    let session = analyze(vec![
        def(
            "greet",
            Params::required(&["name"]).with_keyword("greeting", Some(string("hi"))),
            vec![lvar("greeting")],
        ),
        fcall("greet", vec![int(1)]),
    ]);
    let summary = session.summary();
    let greet = summary.module("Object").unwrap().method(false, "greet").unwrap();
    assert_eq!(
        greet.signatures[0].to_string(),
        "(Integer, ?greeting: String) -> String"
    );
}

#[test]
fn test_hover_reports_innermost_node() {
    let tree = SyntaxTree::new(stmts(vec![
        lasgn("x", int(1).at((1, 4), (1, 5))).at((1, 0), (1, 5))
    ]));
    let mut session = Session::default();
    session.update(tree).unwrap();
    assert_eq!(session.node_at(Pos::new(1, 4)).map(|n| n.id), Some(NodeId(2)));
    assert_eq!(session.hover(Pos::new(1, 4)).as_deref(), Some("Integer"));
    assert!(session.hover(Pos::new(9, 0)).is_none());
}

#[test]
fn test_singleton_class_inside_method_is_unsupported() {
    let mut session = Session::default();
    let err = session
        .update(SyntaxTree::new(def(
            "m",
            Params::default(),
            vec![sclass(vec![])],
        )))
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Unsupported {
            construct: "singleton_class",
            ..
        }
    ));
    assert!(session.tree().is_none());
}
