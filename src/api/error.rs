use std::time::Duration;

/// Errors surfaced by [`super::ApiClient`].
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Non-success HTTP response from the backend.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Network failure before a response arrived.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The session is gone and a token refresh did not bring it back.
    #[error("session expired, please log in again")]
    Unauthorized,

    #[error("response parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// True when the caller should bounce the user back to the login page.
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}
