use rbflow_core::ast::build::*;
use rbflow_core::ast::Params;
use rbflow_core::{AnalysisConfig, CoreError, NodeId, Session, SyntaxTree};
use std::io::Write;

fn program() -> SyntaxTree {
    SyntaxTree::new(stmts(vec![
        def("twice", Params::required(&["x"]), vec![call(lvar("x"), "+", vec![lvar("x")])]),
        lasgn("a", fcall("twice", vec![int(2)])),
        lasgn("b", fcall("twice", vec![float(0.5)])),
        array(vec![lvar("a"), lvar("b")]),
    ]))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn test_cancelled_update_resumes_to_the_same_result() {
    init_tracing();
    let reference = {
        let mut session = Session::default();
        session.update(program()).unwrap();
        session
    };

    let mut session = Session::default();
    session.cancellation_token().cancel();
    let err = session.update(program()).unwrap_err();
    assert!(matches!(err, CoreError::Cancelled { .. }));
    assert!(err.is_resumable());
    assert!(session.is_pending());

    let stats = session.resume().unwrap();
    assert!(!session.is_pending());
    assert_eq!(stats.generation, 1);
    assert_eq!(session.node_type(NodeId(0)), reference.node_type(NodeId(0)));
    assert_eq!(session.summary(), reference.summary());
    assert_eq!(session.diagnostics(), reference.diagnostics());
}

#[test]
fn test_pending_pass_finishes_before_the_next_edit() {
    let mut session = Session::default();
    session.cancellation_token().cancel();
    assert!(session.update(program()).is_err());
    assert!(session.update(program()).is_err());

    let token = session.cancellation_token();
    session.resume().unwrap();
    assert!(!token.is_cancelled());
    let stats = session.update(program()).unwrap();
    assert_eq!(stats.generation, 2);
    assert_eq!(stats.installed, 0);
}

#[test]
fn test_zero_timeout_interrupts_every_pass() {
    let mut session = Session::new(AnalysisConfig {
        timeout_ms: Some(0),
        ..AnalysisConfig::default()
    });
    let err = session.update(program()).unwrap_err();
    assert!(matches!(err, CoreError::Cancelled { processed: 0 }));
    assert!(session.is_pending());
}

#[test]
fn test_config_from_toml_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "max_type_depth = 3").unwrap();
    writeln!(file, "report_reflective_calls = true").unwrap();

    let config = AnalysisConfig::from_file(file.path()).unwrap();
    assert_eq!(config.max_type_depth, 3);
    assert!(config.report_reflective_calls);
    assert_eq!(config.cancel_check_interval, 64);

    let session = Session::new(config.clone());
    assert_eq!(session.config(), &config);
}

#[test]
fn test_config_from_json_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"{{"timeout_ms": 250, "max_overload_combinations": 4}}"#).unwrap();

    let config = AnalysisConfig::from_file(file.path()).unwrap();
    assert_eq!(config.timeout_ms, Some(250));
    assert_eq!(config.max_overload_combinations, 4);
    assert_eq!(config.max_type_depth, 5);
}

#[test]
fn test_config_from_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = AnalysisConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, CoreError::Io(_)));
}
