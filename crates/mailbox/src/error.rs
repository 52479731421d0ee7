//! Error types for mailbox access

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailboxError {
    #[error("Mailbox API key is not configured")]
    MissingApiKey,

    #[error("Mailbox API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("No email arrived in inbox {inbox_id} within {timeout_ms} ms")]
    NoEmail { inbox_id: String, timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type MailboxResult<T> = Result<T, MailboxError>;
