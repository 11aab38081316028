use framecast_core::remote::RemoteError;

/// Errors from the MiniMax REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum MiniMaxError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// MiniMax returned a non-2xx status code.
    #[error("MiniMax API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response whose `base_resp.status_code` was non-zero.
    #[error("MiniMax rejected the request ({code}): {message}")]
    Rejected { code: i64, message: String },

    /// A 2xx response missing a required field or not valid JSON.
    #[error("Malformed MiniMax response: {0}")]
    Malformed(String),

    /// Reading the image or writing the video failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MiniMaxError> for RemoteError {
    fn from(err: MiniMaxError) -> Self {
        match err {
            MiniMaxError::Request(e) => RemoteError::Transport(e.to_string()),
            MiniMaxError::ApiError { status, body } => RemoteError::Api { status, body },
            e @ MiniMaxError::Rejected { .. } => RemoteError::Rejected(e.to_string()),
            MiniMaxError::Malformed(msg) => RemoteError::MalformedResponse(msg),
            MiniMaxError::Io(e) => RemoteError::Io(e),
        }
    }
}
