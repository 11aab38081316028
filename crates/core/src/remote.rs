//! Boundary to the remote video-generation service.
//!
//! The scheduler only talks to the remote API through [`RemoteJobClient`].
//! Implementations decode the service's raw status strings into
//! [`RemoteStatus`] once, at the `poll` boundary, so nothing downstream
//! matches on strings.

use std::path::Path;

use async_trait::async_trait;

/// Outcome of one status query for a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    /// Still queued or generating on the remote side.
    Processing,
    /// Generation finished; the artifact can be resolved from `artifact_ref`.
    Success { artifact_ref: String },
    /// The remote reports the job as failed.
    Failure { reason: String },
}

impl RemoteStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

/// Errors surfaced by a [`RemoteJobClient`].
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Reading the input image or writing the artifact failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request never got a response (network, DNS, TLS, timeout).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote returned a non-2xx status code.
    #[error("API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The remote answered 2xx but refused the request in its payload.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// A 2xx response was missing a field the contract requires.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Client for the remote job API.
///
/// Every call may fail; the scheduler treats any error as terminal for the
/// job concerned and never retries.
#[async_trait]
pub trait RemoteJobClient: Send + Sync {
    /// Create a remote job and return its remote id.
    async fn submit(&self, image: &Path, prompt: &str, model: &str) -> Result<String, RemoteError>;

    /// Query the current status of a remote job.
    async fn poll(&self, remote_job_id: &str) -> Result<RemoteStatus, RemoteError>;

    /// Turn an artifact reference into a downloadable URL.
    async fn resolve(&self, artifact_ref: &str) -> Result<String, RemoteError>;

    /// Download `url` to `destination`, creating missing parent directories.
    ///
    /// Returns the number of bytes written.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_processing_is_non_terminal() {
        assert!(!RemoteStatus::Processing.is_terminal());
        assert!(RemoteStatus::Success {
            artifact_ref: "f".into()
        }
        .is_terminal());
        assert!(RemoteStatus::Failure { reason: "r".into() }.is_terminal());
    }

    #[test]
    fn api_error_display_carries_status_and_body() {
        let err = RemoteError::Api {
            status: 401,
            body: "invalid api key".into(),
        };
        assert_eq!(err.to_string(), "API error (401): invalid api key");
    }
}
