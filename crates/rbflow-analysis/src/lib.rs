//! # rbflow Analysis
//!
//! Metrics over what an rbflow session exports: how much of the program's
//! signature surface is typed, which diagnostics it raised and what shape
//! its namespace hierarchy has.
//!
//! ## Modules
//!
//! - **[`coverage`]** - typed vs `untyped` slots, declared vs inferred methods
//! - **[`diagnostics`]** - diagnostic counts per kind and provenance
//! - **[`hierarchy`]** - superclass and include graph
//! - **[`report`]** - the combined, serializable report
//!
//! ## Quick Start
//!
//! ```rust
//! use rbflow_analysis::prelude::*;
//! use rbflow_core::ast::build::*;
//! use rbflow_core::{Session, SyntaxTree};
//!
//! let mut session = Session::default();
//! session.update(SyntaxTree::new(stmts(vec![int(1)]))).unwrap();
//! let report = Analyzer::new().analyze(&session).unwrap();
//! assert_eq!(report.diagnostics.total, 0);
//! ```

pub mod coverage;
pub mod diagnostics;
pub mod hierarchy;
pub mod report;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::coverage::{MethodCounts, TypeCoverage};
    pub use crate::diagnostics::DiagnosticCounts;
    pub use crate::hierarchy::{HierarchyGraph, HierarchyMetrics, Relation};
    pub use crate::report::{AnalysisReport, Analyzer};
}

pub use coverage::{MethodCounts, TypeCoverage};
pub use diagnostics::DiagnosticCounts;
pub use hierarchy::{HierarchyGraph, HierarchyMetrics};
pub use report::{AnalysisReport, Analyzer};
