use thiserror::Error;

/// Errors that can occur while building, signing, or transmitting a document.
///
/// Transport-level failures (`Transport`) mean the remote outcome is unknown
/// and the record must keep its prior state; definitive authority rejections
/// are not errors at all but failed [`SubmissionOutcome`]s.
///
/// [`SubmissionOutcome`]: crate::core::types::SubmissionOutcome
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CpeError {
    /// One or more validation rules failed before any bytes left the process.
    #[error("validation failed: {0}")]
    Validation(String),

    /// XML generation or parsing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Keystore or signature computation failure.
    #[error("signing error: {0}")]
    Signing(String),

    /// Network or HTTP-layer failure with no usable response. The remote
    /// outcome is unknown; never fold this into a rejection.
    #[error("transport error: {0}")]
    Transport(String),

    /// Filesystem persistence of a document or receipt failed.
    #[error("artifact error: {0}")]
    Artifact(String),

    /// The record is already being transmitted by another worker.
    #[error("record in flight: {0}")]
    InFlight(String),
}

impl From<std::io::Error> for CpeError {
    fn from(err: std::io::Error) -> Self {
        Self::Artifact(err.to_string())
    }
}

/// A single validation finding with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dot-separated path to the invalid field (e.g. "buyer.doc_number").
    pub field: String,
    /// Human-readable description.
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
