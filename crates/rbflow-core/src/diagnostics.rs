//! Non-fatal findings surfaced to tooling

use crate::ast::{NodeId, Span};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UndefinedMethod,
    UndefinedConstant,
    UndefinedVariable,
    /// Arity, keyword or type mismatch against a signature
    ArgumentMismatch,
    /// Inferred return type disagrees with the declared one
    ReturnMismatch,
    /// Dispatch through reflection, analyzed as `untyped`
    ReflectiveCall,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::UndefinedMethod => "undefined_method",
            DiagnosticKind::UndefinedConstant => "undefined_constant",
            DiagnosticKind::UndefinedVariable => "undefined_variable",
            DiagnosticKind::ArgumentMismatch => "argument_mismatch",
            DiagnosticKind::ReturnMismatch => "return_mismatch",
            DiagnosticKind::ReflectiveCall => "reflective_call",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which kind of resolution unit produced a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    CallSite,
    ConstantRead,
    VariableRead,
    MethodDefinition,
    Yield,
    UnknownCall,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub node: NodeId,
    pub span: Span,
    pub kind: DiagnosticKind,
    pub provenance: Provenance,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.span, self.message, self.kind)
    }
}

/// A diagnostic held by a box before it is attributed to a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BoxDiagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Keep only diagnostics matching `keep`, preserving order
pub fn filter_by<'a>(
    diagnostics: &'a [Diagnostic],
    keep: impl Fn(&Diagnostic) -> bool + 'a,
) -> impl Iterator<Item = &'a Diagnostic> + 'a {
    diagnostics.iter().filter(move |d| keep(d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Pos;

    fn diag(kind: DiagnosticKind, provenance: Provenance) -> Diagnostic {
        Diagnostic {
            node: NodeId(3),
            span: Span::new(Pos::new(2, 4), Pos::new(2, 9)),
            kind,
            provenance,
            message: "undefined method `frob' for Integer".to_string(),
        }
    }

    #[test]
    fn test_display_includes_kind() {
        let d = diag(DiagnosticKind::UndefinedMethod, Provenance::CallSite);
        let text = d.to_string();
        assert!(text.contains("frob"));
        assert!(text.ends_with("[undefined_method]"));
    }

    #[test]
    fn test_filter_by_provenance() {
        let all = vec![
            diag(DiagnosticKind::UndefinedMethod, Provenance::CallSite),
            diag(DiagnosticKind::UndefinedConstant, Provenance::ConstantRead),
        ];
        let reads: Vec<_> = filter_by(&all, |d| d.provenance == Provenance::ConstantRead).collect();
        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0].kind, DiagnosticKind::UndefinedConstant);
    }
}
