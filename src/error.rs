use thiserror::Error;

// Side-channel failures, logged and dropped, never seen by the client
#[derive(Debug, Error)]
pub enum HippoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Webhook delivery failed with status: {0}")]
    Delivery(reqwest::StatusCode),

    #[error("Webhook transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // drain worker gone or saturated
    #[error("Notification worker unavailable: {0}")]
    Worker(String),
}

impl HippoError {
    // Both a bad status and an unreachable endpoint count as a failed delivery
    pub fn is_delivery(&self) -> bool {
        matches!(self, HippoError::Delivery(_) | HippoError::Transport(_))
    }
}
