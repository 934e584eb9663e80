//! Error types for the cf2lc library.
//!
//! Two distinct error types reflect two distinct layers:
//!
//! * [`StageError`] — a single pipeline stage failed (the host page could not
//!   be read, the generation endpoint answered badly, the model's reply did
//!   not parse or validate). Each variant names exactly one failure mode so
//!   tests and retry logic can match on it.
//!
//! * [`Cf2LcError`] — what callers of the top-level `convert*` functions see.
//!   Every stage failure is caught once at the orchestrator boundary and
//!   wrapped into [`Cf2LcError::ConversionFailed`], whose message is always
//!   `Failed to convert problem: {cause}`. The original [`StageError`] stays
//!   reachable through [`std::error::Error::source`].

use std::path::PathBuf;
use thiserror::Error;

/// A failure inside one stage of the extract → prompt → generate → parse pipeline.
#[derive(Debug, Error)]
pub enum StageError {
    // ── Host page ─────────────────────────────────────────────────────────
    /// The host page could not be reached or the extraction routine could not run.
    #[error("Could not read the problem page: {detail}")]
    HostPage { detail: String },

    // ── Generation endpoint ───────────────────────────────────────────────
    /// The endpoint answered with a non-success HTTP status.
    #[error("Gemini API error: {status} - {body}")]
    UpstreamHttp { status: u16, body: String },

    /// The endpoint answered 2xx but the body lacks `candidates[0].content.parts[0].text`.
    #[error("Invalid response from Gemini API: {detail}")]
    UpstreamShape { detail: String },

    /// A single request attempt exceeded its timeout, or the overall deadline expired.
    #[error("Gemini API call timed out after {secs}s")]
    UpstreamTimeout { secs: u64 },

    /// Connection-level failure (DNS, TLS, reset) before any status was received.
    #[error("Transport error talking to Gemini API: {detail}")]
    Transport { detail: String },

    // ── Model output ──────────────────────────────────────────────────────
    /// The model's reply is not valid JSON once code fences are stripped.
    #[error("Model response is not valid JSON: {source}")]
    MalformedResponse {
        #[source]
        source: serde_json::Error,
    },

    /// The reply is valid JSON but required fields are missing, empty, or mistyped.
    #[error("Invalid LeetCode format structure: missing or invalid field(s): {}", .fields.join(", "))]
    IncompleteRecord { fields: Vec<String> },
}

impl StageError {
    /// Whether a fresh attempt at the same request could plausibly succeed.
    ///
    /// Only transport-level trouble qualifies: connection failures, timeouts,
    /// HTTP 429 and 5xx. A well-formed answer with the wrong shape, or a reply
    /// that fails to parse, is not retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            StageError::Transport { .. } | StageError::UpstreamTimeout { .. } => true,
            StageError::UpstreamHttp { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            StageError::UpstreamHttp { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// All errors returned by the cf2lc top-level API.
#[derive(Debug, Error)]
pub enum Cf2LcError {
    /// Extraction produced no text (the page has no problem statement).
    #[error("No problem text provided")]
    EmptyInput,

    /// A pipeline stage failed; the cause is preserved as the error source.
    #[error("Failed to convert problem: {cause}")]
    ConversionFailed {
        #[source]
        cause: StageError,
    },

    /// Neither an API key nor a pre-built backend was configured.
    #[error("No Gemini API key configured.\n{hint}")]
    MissingCredential { hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not create or write the exported record.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Cf2LcError {
    /// The stage failure behind a [`Cf2LcError::ConversionFailed`], if that is what this is.
    pub fn stage_error(&self) -> Option<&StageError> {
        match self {
            Cf2LcError::ConversionFailed { cause } => Some(cause),
            _ => None,
        }
    }
}

impl From<StageError> for Cf2LcError {
    fn from(cause: StageError) -> Self {
        Cf2LcError::ConversionFailed { cause }
    }
}
