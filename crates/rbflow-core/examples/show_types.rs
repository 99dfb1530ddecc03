//! Demo: Show inferred types for a small program, then again after an edit

use rbflow_core::ast::build::*;
use rbflow_core::ast::Params;
use rbflow_core::{Node, Session, SyntaxTree};

fn program(area_scale: Node) -> SyntaxTree {
    SyntaxTree::new(stmts(vec![
        class(
            "Shape",
            None,
            vec![
                fcall("attr_reader", vec![sym("name")]),
                def(
                    "initialize",
                    Params::required(&["name"]),
                    vec![iasgn("@name", lvar("name"))],
                ),
                def("area", Params::default(), vec![int(0)]),
            ],
        ),
        class(
            "Square",
            Some("Shape"),
            vec![def(
                "area",
                Params::required(&["side"]),
                vec![call(call(lvar("side"), "*", vec![lvar("side")]), "*", vec![area_scale])],
            )],
        ),
        lasgn("sq", call(konst("Square"), "new", vec![string("unit")])),
        lasgn("tags", array(vec![sym("flat")])),
        call(lvar("tags"), "<<", vec![string("four-sided")]),
        call(lvar("sq"), "area", vec![int(3)]),
    ]))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut session = Session::default();

    println!("=== Inferred program summary ===\n");
    let stats = session.update(program(int(1)))?;
    println!("{}", session.summary().to_json()?);
    println!("{}", serde_json::to_string(&stats)?);

    println!("\n=== After editing the scale to a float ===\n");
    let stats = session.update(program(float(1.5)))?;
    println!("{}", session.summary().to_json()?);
    println!("{}", serde_json::to_string(&stats)?);

    for diagnostic in session.diagnostics() {
        println!("{diagnostic}");
    }
    Ok(())
}
