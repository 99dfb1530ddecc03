//! Error types for the engine
//!
//! Only programming errors (unsupported constructs), cancellation and input
//! loading failures surface as `Err`. Resolution failures, arity mismatches
//! and truncated expansions are recovered locally and reported as
//! [`crate::Diagnostic`] values instead.

use thiserror::Error;

/// Errors raised by the engine
#[derive(Debug, Error)]
pub enum CoreError {
    /// A syntax construct the installer cannot wire; aborts the current pass
    #[error("unsupported construct `{construct}`: {detail}")]
    Unsupported {
        construct: &'static str,
        detail: String,
    },

    /// The driver observed a cancellation request or an expired deadline
    #[error("analysis pass cancelled after {processed} box runs")]
    Cancelled { processed: usize },

    /// A declared signature could not be loaded
    #[error("invalid signature for {target}: {detail}")]
    InvalidSignature { target: String, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CoreError {
    pub(crate) fn unsupported(construct: &'static str, detail: impl Into<String>) -> Self {
        CoreError::Unsupported {
            construct,
            detail: detail.into(),
        }
    }

    /// Whether a later `Session::resume` can finish the interrupted pass
    pub fn is_resumable(&self) -> bool {
        matches!(self, CoreError::Cancelled { .. })
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_message() {
        let err = CoreError::unsupported("super", "used outside of a method body");
        assert_eq!(
            err.to_string(),
            "unsupported construct `super`: used outside of a method body"
        );
        assert!(!err.is_resumable());
    }

    #[test]
    fn test_cancelled_is_resumable() {
        let err = CoreError::Cancelled { processed: 12 };
        assert!(err.is_resumable());
        assert!(err.to_string().contains("12"));
    }
}
