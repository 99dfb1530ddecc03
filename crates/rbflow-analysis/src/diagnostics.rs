//! Diagnostic counts

use indexmap::IndexMap;
use rbflow_core::Diagnostic;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticCounts {
    pub total: usize,
    /// Keyed by the kind's snake_case name, in order of first appearance
    pub by_kind: IndexMap<String, usize>,
    pub by_provenance: IndexMap<String, usize>,
}

impl DiagnosticCounts {
    pub fn from_diagnostics(diagnostics: &[Diagnostic]) -> Self {
        let mut counts = Self::default();
        for d in diagnostics {
            counts.total += 1;
            *counts.by_kind.entry(d.kind.as_str().to_string()).or_default() += 1;
            let provenance = serde_json::to_value(d.provenance)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| format!("{:?}", d.provenance));
            *counts.by_provenance.entry(provenance).or_default() += 1;
        }
        counts
    }

    pub fn count(&self, kind: &str) -> usize {
        self.by_kind.get(kind).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbflow_core::{DiagnosticKind, NodeId, Provenance, Span};

    fn diagnostic(kind: DiagnosticKind, provenance: Provenance) -> Diagnostic {
        Diagnostic {
            node: NodeId(1),
            span: Span::default(),
            kind,
            provenance,
            message: "m".to_string(),
        }
    }

    #[test]
    fn test_counts_group_by_kind_and_provenance() {
        let diagnostics = vec![
            diagnostic(DiagnosticKind::UndefinedMethod, Provenance::CallSite),
            diagnostic(DiagnosticKind::ArgumentMismatch, Provenance::CallSite),
            diagnostic(DiagnosticKind::UndefinedMethod, Provenance::Yield),
        ];
        let counts = DiagnosticCounts::from_diagnostics(&diagnostics);
        assert_eq!(counts.total, 3);
        assert_eq!(counts.count("undefined_method"), 2);
        assert_eq!(counts.count("return_mismatch"), 0);
        assert_eq!(counts.by_provenance.get("call_site"), Some(&2));
        assert_eq!(
            counts.by_kind.keys().collect::<Vec<_>>(),
            vec!["undefined_method", "argument_mismatch"]
        );
    }
}
