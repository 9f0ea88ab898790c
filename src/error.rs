//! Error types for the edgequake-vlm-extract library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] is **fatal**: the client cannot be built at all
//!   (invalid endpoint configuration, TLS backend unavailable). Returned as
//!   `Err(ExtractError)` from constructors.
//!
//! * [`ExtractionFailure`] is **per call**: one extraction did not produce a
//!   value. Returned by [`crate::client::ExtractionService::try_invoke`] and
//!   swallowed (after logging) by [`crate::client::ExtractionService::invoke`],
//!   which hands the pipeline an empty map instead.

use thiserror::Error;

/// Maximum number of response-body bytes kept in a [`ExtractionFailure::Protocol`].
pub(crate) const MAX_BODY_EXCERPT: usize = 512;

/// All fatal errors returned by the edgequake-vlm-extract library.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The underlying HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Why a single extraction call produced no value.
///
/// Every variant collapses to the same pipeline-visible outcome (an empty
/// map), but keeping them apart lets callers and tests see which layer broke.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// The request was rejected before any network I/O.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An input image could not be PNG-encoded.
    #[error("Image {index} could not be encoded: {detail}")]
    Encode { index: usize, detail: String },

    /// Connection, DNS or TLS failure; no HTTP response was received.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request did not complete within the deadline.
    #[error("Request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The endpoint answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Protocol { status: u16, body: String },

    /// The outer response body is not JSON or lacks `choices[0].message.content`.
    #[error("Malformed response envelope: {0}")]
    Envelope(String),

    /// The model reply is not a JSON object.
    #[error("Model reply is not valid JSON: {0}")]
    Content(String),
}

impl ExtractionFailure {
    /// Stable, log-friendly label for the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionFailure::InvalidRequest(_) => "invalid_request",
            ExtractionFailure::Encode { .. } => "encode",
            ExtractionFailure::Transport(_) => "transport",
            ExtractionFailure::Timeout { .. } => "timeout",
            ExtractionFailure::Protocol { .. } => "protocol",
            ExtractionFailure::Envelope(_) => "envelope",
            ExtractionFailure::Content(_) => "content",
        }
    }

    /// Whether sending the same request again could plausibly succeed.
    ///
    /// Transport hiccups, timeouts, HTTP 429 and 5xx are transient. Other 4xx
    /// codes (bad key, bad payload) and decoding failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExtractionFailure::Transport(_) | ExtractionFailure::Timeout { .. } => true,
            ExtractionFailure::Protocol { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Build a [`ExtractionFailure::Protocol`], truncating long bodies.
    pub(crate) fn protocol(status: u16, body: &str) -> Self {
        let body = if body.len() > MAX_BODY_EXCERPT {
            let mut end = MAX_BODY_EXCERPT;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}\u{2026}", &body[..end])
        } else {
            body.to_string()
        };
        ExtractionFailure::Protocol { status, body }
    }
}
