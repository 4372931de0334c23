//! Parse failures for hlld responses.

use thiserror::Error;

/// Errors produced while decoding hlld responses.
///
/// Every variant carries the offending input verbatim so a failure can be
/// diagnosed from logs alone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A block response did not open with the expected start marker.
    #[error("expected block start {expected:?}, got {found:?}")]
    BadBlockStart { expected: String, found: String },
    /// A `list` line did not match `<name> <eps> <precision> <bytes> <size>`.
    #[error("malformed list line {0:?}")]
    MalformedListLine(String),
    /// An `info` block lacked a required field.
    #[error("info block missing field {0:?}")]
    MissingField(&'static str),
    /// An `info` field failed numeric conversion.
    #[error("invalid value {value:?} for field {field:?}")]
    InvalidFieldValue { field: &'static str, value: String },
}
