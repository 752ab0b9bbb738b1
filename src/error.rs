//! Config-error taxonomy for the rule language.
//!
//! Everything else the engine meets (empty snapshots, missing history,
//! zero matches) is a normal outcome and never surfaces as an error.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("line {line}: malformed rule `{text}`: {reason}")]
    Malformed {
        line: usize,
        text: String,
        reason: &'static str,
    },

    #[error("line {line}: invalid regex `{pattern}`: {message}")]
    InvalidRegex {
        line: usize,
        pattern: String,
        message: String,
    },

    #[error("line {line}: duplicate group key `{key}`")]
    DuplicateGroup { line: usize, key: String },
}

impl RuleError {
    /// 1-based source line the error points at.
    pub fn line(&self) -> usize {
        match self {
            RuleError::Malformed { line, .. }
            | RuleError::InvalidRegex { line, .. }
            | RuleError::DuplicateGroup { line, .. } => *line,
        }
    }
}
