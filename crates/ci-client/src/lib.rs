//! ConfInsights Client - typed access to the conformance-checking backend
//!
//! [`BackendClient`] wraps every backend operation: saving credentials,
//! uploading a log, committing the column mapping and running analyses.
//! Long-running analyses go through [`JobPoller`], which starts a job and
//! polls its result endpoint until it answers, the attempt ceiling is hit,
//! or the caller cancels.

pub mod client;
pub mod poller;

pub use client::{BackendClient, ClientConfig, UploadOutcome};
pub use poller::{JobPoller, PollConfig};
pub use tokio_util::sync::CancellationToken;

use ci_protocol::{AnalysisFamily, ProtocolError};

/// Errors from one-shot backend calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// Errors from starting or polling an analysis job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("no result after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("could not start job: {message}")]
    StartFailure { status: Option<u16>, message: String },

    #[error("cancelled")]
    Cancelled,

    #[error("unreadable result: {0}")]
    Decode(String),

    #[error("job belongs to {handle}, not {requested}")]
    FamilyMismatch {
        handle: AnalysisFamily,
        requested: AnalysisFamily,
    },

    #[error("no {0} job yet: start the computation first")]
    NoJob(AnalysisFamily),

    #[error("{0} results are fetched directly, there is no job to start")]
    Synchronous(AnalysisFamily),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
