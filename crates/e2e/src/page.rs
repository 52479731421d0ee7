//! Browser page abstraction used by the page objects

use std::time::Duration;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;

/// Page load states understood by `wait_for_load_state`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Load,
    DomContentLoaded,
    NetworkIdle,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::Load => "load",
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::NetworkIdle => "networkidle",
        }
    }
}

/// A single browser page.
///
/// Selectors follow Playwright locator syntax and resolve to their first
/// match. Operations that wait return `E2eError::Timeout` when the wait
/// runs out; every other failure is an `E2eError::Playwright`.
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate to a URL, relative to the configured base URL
    async fn goto(&self, url: &str) -> E2eResult<()>;

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()>;

    async fn click(&self, selector: &str) -> E2eResult<()>;

    /// Wait until the element is visible
    async fn wait_for_visible(&self, selector: &str, timeout: Duration) -> E2eResult<()>;

    /// Visibility right now, without waiting
    async fn is_visible(&self, selector: &str) -> E2eResult<bool>;

    async fn is_disabled(&self, selector: &str) -> E2eResult<bool>;

    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>>;

    /// Text of every element matching the selector
    async fn all_text_contents(&self, selector: &str) -> E2eResult<Vec<String>>;

    async fn input_value(&self, selector: &str) -> E2eResult<String>;

    /// HTML5 constraint-validation message of an input
    async fn validation_message(&self, selector: &str) -> E2eResult<String>;

    /// Wait until the current URL matches `pattern`
    async fn wait_for_url(&self, pattern: &Regex, timeout: Duration) -> E2eResult<()>;

    async fn url(&self) -> E2eResult<String>;

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> E2eResult<()>;

    /// Fixed pause (use sparingly)
    async fn wait_for_timeout(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
