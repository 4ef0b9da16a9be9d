//! Error types for template ingestion and raw-transaction decoding.

use thiserror::Error;

/// Failure while ingesting a getblocktemplate response.
///
/// Ingestion stops at the first failure and the template's state is
/// unspecified afterwards; callers must discard it rather than retry on the
/// same value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A required field is absent.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// A field has the wrong JSON type or shape (bad hex, wrong length).
    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    /// A structurally valid value is outside its permitted range.
    #[error("field '{field}' value out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },

    /// The server declared a mandatory (`!`-prefixed) rule this client does
    /// not understand; the template is unusable.
    #[error("unsupported mandatory rule '{0}'")]
    UnsupportedRule(String),
}

impl TemplateError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> TemplateError {
        TemplateError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Failure while decoding a raw serialized transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// Input ended before the structure was complete.
    #[error("transaction data truncated at byte {0}")]
    Truncated(usize),

    /// A CompactSize length was not minimally encoded.
    #[error("non-canonical compact size at byte {0}")]
    NonCanonicalVarint(usize),

    /// The segwit marker byte was not followed by the 0x01 flag.
    #[error("invalid segwit marker/flag")]
    InvalidMarker,

    /// Bytes remain after the complete transaction structure.
    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),
}
