//! Type coverage of the exported signature surface

use rbflow_core::{ProgramSummary, SummaryKind};
use serde::{Deserialize, Serialize};

const UNTYPED: &str = "untyped";

/// Typed vs `untyped` slots across method signatures and variables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeCoverage {
    pub total_slots: usize,
    /// Slots whose type is not `untyped` at the top level
    pub typed_slots: usize,
    /// Typed slots that still mention `untyped` somewhere inside,
    /// such as `Array[untyped]`
    pub partially_typed_slots: usize,
    pub coverage_percentage: f64,
}

impl TypeCoverage {
    pub fn from_summary(summary: &ProgramSummary) -> Self {
        let mut coverage = Self::default();
        for module in &summary.modules {
            for method in &module.methods {
                for sig in &method.signatures {
                    sig.types().for_each(|ty| coverage.add(ty));
                }
            }
            for var in module.constants.iter().chain(&module.ivars) {
                coverage.add(&var.ty);
            }
        }
        for var in &summary.globals {
            coverage.add(&var.ty);
        }
        coverage.finish();
        coverage
    }

    pub fn add(&mut self, ty: &str) {
        self.total_slots += 1;
        if ty.trim() == UNTYPED {
            return;
        }
        self.typed_slots += 1;
        if ty.contains(UNTYPED) {
            self.partially_typed_slots += 1;
        }
    }

    pub fn finish(&mut self) {
        self.coverage_percentage = if self.total_slots > 0 {
            (self.typed_slots as f64 / self.total_slots as f64) * 100.0
        } else {
            100.0
        };
    }
}

/// Methods by where their signatures come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodCounts {
    pub declared: usize,
    pub inferred: usize,
    /// Inferred methods with more than one live definition
    pub redefined: usize,
}

impl MethodCounts {
    pub fn from_summary(summary: &ProgramSummary) -> Self {
        let mut counts = Self::default();
        for method in summary.modules.iter().flat_map(|m| &m.methods) {
            match method.kind {
                SummaryKind::Declared => counts.declared += 1,
                SummaryKind::Inferred => {
                    counts.inferred += 1;
                    if method.signatures.len() > 1 {
                        counts.redefined += 1;
                    }
                }
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.declared + self.inferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untyped_slots_lower_coverage() {
        let mut coverage = TypeCoverage::default();
        coverage.add("Integer");
        coverage.add("untyped");
        coverage.add("Array[untyped]");
        coverage.add("String | nil");
        coverage.finish();
        assert_eq!(coverage.total_slots, 4);
        assert_eq!(coverage.typed_slots, 3);
        assert_eq!(coverage.partially_typed_slots, 1);
        assert!((coverage.coverage_percentage - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_program_is_fully_covered() {
        let coverage = TypeCoverage::from_summary(&ProgramSummary::default());
        assert_eq!(coverage.total_slots, 0);
        assert!((coverage.coverage_percentage - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_method_counts_of_empty_summary() {
        let counts = MethodCounts::from_summary(&ProgramSummary::default());
        assert_eq!(counts.total(), 0);
    }
}
