//! # rbflow-core
//!
//! Demand-driven, incremental type inference for a Ruby-like language.
//!
//! A [`Session`] holds the whole analysis state. Each [`Session::update`]
//! installs a new syntax tree, adopts the flow-graph objects of subtrees that
//! did not change, runs the demand boxes to a fixpoint and tears down what
//! the previous tree left behind.
//!
//! ## Modules
//!
//! - **[`types`]** - the type lattice, unions and declared signatures
//! - **[`graph`]** - the counted flow graph with cyclic retraction
//! - **[`entity`]** - namespaces, methods, constants and variables
//! - **[`genv`]** - the global environment and demand boxes
//! - **[`driver`]** - the fixpoint driver and cancellation
//! - **[`session`]** - the install/diff/uninstall protocol
//!
//! ## Quick Start
//!
//! ```rust
//! use rbflow_core::ast::build::*;
//! use rbflow_core::{Session, SyntaxTree};
//!
//! let mut session = Session::default();
//! let tree = SyntaxTree::new(stmts(vec![lasgn("x", int(1)), lvar("x")]));
//! session.update(tree).unwrap();
//! assert!(session.diagnostics().is_empty());
//! ```

mod arena;
mod boxes;
mod install;

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod entity;
pub mod error;
pub mod flow;
pub mod genv;
pub mod graph;
pub mod ids;
pub mod name;
pub mod session;
pub mod signatures;
pub mod summary;
pub mod types;

pub use ast::{Node, NodeId, NodeKind, Pos, Span, SyntaxTree};
pub use config::AnalysisConfig;
pub use diagnostics::{filter_by, Diagnostic, DiagnosticKind, Provenance};
pub use driver::CancellationToken;
pub use error::{CoreError, Result};
pub use genv::{Genv, RunStats};
pub use ids::{BoxId, ModId, VertexId};
pub use install::Phase;
pub use name::Name;
pub use session::{Reachable, Session, UpdateStats};
pub use signatures::SignatureTable;
pub use summary::{
    KeywordSummary, MethodSummary, ModuleSummary, ProgramSummary, SignatureSummary, SummaryKind,
    VariableSummary,
};
pub use types::{BlockSig, MethodSig, SigKeyword, SigType, Type};
