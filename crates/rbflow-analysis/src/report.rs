//! Combined analysis report

use crate::coverage::{MethodCounts, TypeCoverage};
use crate::diagnostics::DiagnosticCounts;
use crate::hierarchy::HierarchyMetrics;
use anyhow::{Context, Result};
use rbflow_core::{Diagnostic, ProgramSummary, Session, UpdateStats};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub type_coverage: TypeCoverage,
    pub methods: MethodCounts,
    pub diagnostics: DiagnosticCounts,
    pub hierarchy: HierarchyMetrics,
    /// Counters of the edit that produced the analyzed state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<LastUpdate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastUpdate {
    pub generation: u32,
    pub reused: usize,
    pub installed: usize,
    pub torn_down: usize,
    pub boxes_run: usize,
}

impl From<UpdateStats> for LastUpdate {
    fn from(stats: UpdateStats) -> Self {
        Self {
            generation: stats.generation,
            reused: stats.reused,
            installed: stats.installed,
            torn_down: stats.torn_down,
            boxes_run: stats.boxes_run,
        }
    }
}

impl AnalysisReport {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize analysis report")
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("failed to parse analysis report")
    }
}

/// Computes [`AnalysisReport`]s
#[derive(Debug, Clone)]
pub struct Analyzer {
    include_update_stats: bool,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            include_update_stats: true,
        }
    }

    /// Leave the per-edit counters out, for reports compared across sessions
    pub fn without_update_stats(mut self) -> Self {
        self.include_update_stats = false;
        self
    }

    pub fn analyze(&self, session: &Session) -> Result<AnalysisReport> {
        if session.is_pending() {
            anyhow::bail!("session has an interrupted pass; resume it before analyzing");
        }
        let mut report = self.analyze_parts(&session.summary(), &session.diagnostics());
        if self.include_update_stats {
            report.last_update = Some(session.stats().into());
        }
        Ok(report)
    }

    pub fn analyze_parts(&self, summary: &ProgramSummary, diagnostics: &[Diagnostic]) -> AnalysisReport {
        let report = AnalysisReport {
            type_coverage: TypeCoverage::from_summary(summary),
            methods: MethodCounts::from_summary(summary),
            diagnostics: DiagnosticCounts::from_diagnostics(diagnostics),
            hierarchy: HierarchyMetrics::from_summary(summary),
            last_update: None,
        };
        debug!(
            coverage = report.type_coverage.coverage_percentage,
            methods = report.methods.total(),
            diagnostics = report.diagnostics.total,
            "analysis report computed"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json_round_trip() {
        let report = Analyzer::new().analyze_parts(&ProgramSummary::default(), &[]);
        let json = report.to_json().unwrap();
        assert_eq!(AnalysisReport::from_json(&json).unwrap(), report);
        assert!(!json.contains("last_update"));
    }
}
