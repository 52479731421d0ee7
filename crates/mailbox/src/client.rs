//! MailSlurp HTTP client

use std::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{MailboxError, MailboxResult};

const DEFAULT_BASE_URL: &str = "https://api.mailslurp.com";

/// Slack added on top of a server-side wait so the HTTP request outlives it
const REQUEST_SLACK: Duration = Duration::from_secs(5);

/// A disposable inbox
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inbox {
    pub id: String,
    pub email_address: String,
}

/// A received email
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
}

impl Email {
    /// Body text, empty when the message has none
    pub fn body_text(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }
}

/// Client for the MailSlurp inbox API
pub struct MailSlurpClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl MailSlurpClient {
    /// Create a client against the public MailSlurp API
    pub fn new(api_key: impl Into<String>) -> MailboxResult<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom endpoint
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> MailboxResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(MailboxError::MissingApiKey);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create a new inbox
    pub async fn create_inbox(&self) -> MailboxResult<Inbox> {
        info!("Creating inbox");
        let resp = self
            .http
            .post(format!("{}/inboxes", self.base_url))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        let inbox: Inbox = Self::check(resp).await?.json().await?;
        info!("Inbox created: {}", inbox.email_address);
        Ok(inbox)
    }

    /// Block until the newest unread email lands in the inbox
    pub async fn wait_for_latest_email(&self, inbox_id: &str, timeout: Duration) -> MailboxResult<Email> {
        info!("Waiting for email in inbox {}", inbox_id);
        let timeout_ms = timeout.as_millis() as u64;

        let resp = self
            .http
            .get(format!("{}/waitForLatestEmail", self.base_url))
            .header("x-api-key", &self.api_key)
            .query(&[
                ("inboxId", inbox_id.to_string()),
                ("timeout", timeout_ms.to_string()),
                ("unreadOnly", "true".to_string()),
            ])
            .timeout(timeout + REQUEST_SLACK)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MailboxError::NoEmail { inbox_id: inbox_id.to_string(), timeout_ms }
                } else {
                    MailboxError::Http(e)
                }
            })?;

        if resp.status() == reqwest::StatusCode::REQUEST_TIMEOUT {
            return Err(MailboxError::NoEmail { inbox_id: inbox_id.to_string(), timeout_ms });
        }

        let email: Email = Self::check(resp).await?.json().await?;
        info!("Email received: {}", email.subject.as_deref().unwrap_or("<no subject>"));
        Ok(email)
    }

    async fn check(resp: reqwest::Response) -> MailboxResult<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        error!("Mailbox API error {}: {}", status, body);
        Err(MailboxError::Api { status: status.as_u16(), body })
    }
}
