use std::io;
use std::time::Duration;

use thiserror::Error;

/// Failures while synthesizing a payload. These abort the whole run.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload size must be a positive number of MB, got {0}")]
    InvalidSize(u32),

    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failures inside a single candidate run.
///
/// These never escape a [`Candidate`](crate::candidate::Candidate); the runner
/// turns them into `CandidateResult::Failure` using the `Display` text.
#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("{name} executable not found")]
    ExecutableNotFound { name: String },

    #[error("{name} timed out after {} seconds", .timeout.as_secs_f64())]
    Timeout { name: String, timeout: Duration },

    #[error("failed to spawn {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed waiting on {name}: {source}")]
    Wait {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("{name} requires a payload file but none was provided")]
    MissingFile { name: String },

    #[error("JSON processing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{name} panicked: {message}")]
    Panicked { name: String, message: String },
}

/// Errors that terminate a benchmark run.
#[derive(Debug, Error)]
pub enum SuiteError {
    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("temporary payload file error: {0}")]
    TempFile(#[source] io::Error),

    #[error("candidate name {0:?} is already registered")]
    DuplicateCandidate(String),

    #[error("search probe could not parse the generated payload: {0}")]
    SearchParse(#[source] serde_json::Error),
}
