//! Error types for the reshape transform.

use thiserror::Error;

/// Errors that abort a whole reshape. There is no per-row recovery: the first
/// error wins and no records are returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// Header is missing required columns, the CSV cannot be parsed, or the
    /// bytes are not UTF-8.
    #[error("Malformed input: {message}")]
    MalformedInput { message: String },

    /// A numeric column held a value that is not an integer.
    #[error("Type conversion failed at line {line}: column '{column}' value {value:?} {reason}")]
    TypeConversion {
        line: u64,
        column: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl TransformError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    pub(crate) fn type_conversion(
        line: u64,
        column: &'static str,
        value: &str,
        reason: &'static str,
    ) -> Self {
        Self::TypeConversion {
            line,
            column,
            value: value.to_string(),
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;
