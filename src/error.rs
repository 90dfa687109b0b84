//! Error types for the vdbrpc client.

use thiserror::Error;

/// Top-level error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed arguments, rejected before any transport call.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// The exchange could not complete at the attempted size.
    ///
    /// This is the only failure the batch executor reacts to by splitting.
    #[error("oversized exchange: {}", .0.message())]
    Oversized(tonic::Status),

    /// Any other transport or network failure.
    #[error("transport error: {}: {}", .0.code(), .0.message())]
    Transport(tonic::Status),

    /// A well-formed response carrying a non-zero application status.
    #[error("server error (code={code}): {message}")]
    Server { code: i32, message: String },

    /// A record could not be decoded from its wire form.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Rehydrated records could not be paired with their slim-pass scores.
    #[error("rehydration error: {0}")]
    Rehydration(#[from] RehydrationError),

    /// Client configuration is unusable.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// True for the oversized/reset failure signature.
    pub fn is_oversized(&self) -> bool {
        matches!(self, Error::Oversized(_))
    }
}

/// Errors raised while converting wire documents into records.
#[derive(Error, Debug)]
pub enum CodecError {
    /// A string field carried bytes that are not UTF-8.
    #[error("field {field} is not valid UTF-8")]
    InvalidUtf8 { field: String },

    /// A JSON field could not be parsed.
    #[error("field {field} holds malformed JSON: {reason}")]
    InvalidJson { field: String, reason: String },
}

/// Errors from the merge step of the search enricher.
#[derive(Error, Debug)]
pub enum RehydrationError {
    /// The rehydrate pass returned a different number of records than ids requested.
    #[error("probe {probe}: requested {expected} records, got {got}")]
    CountMismatch {
        probe: usize,
        expected: usize,
        got: usize,
    },

    /// A slim-pass id had no counterpart among the rehydrated records.
    #[error("probe {probe}: id {id} missing from rehydrated records")]
    MissingId { probe: usize, id: String },

    /// A slim-pass hit came back without a score.
    #[error("probe {probe}: slim hit {id} has no score")]
    MissingScore { probe: usize, id: String },

    /// The two phases disagree on the number of probes.
    #[error("slim pass returned {slim} probes, rehydrate pass {rehydrated}")]
    ProbeMismatch { slim: usize, rehydrated: usize },
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
