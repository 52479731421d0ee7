//! Suite configuration
//!
//! Loaded from YAML, with defaults for anything left out and environment
//! variable overrides applied on top (`ENV`, `BASE_URL`, `BROWSER`,
//! `MAILSLURP_API_KEY`).

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::confirm::ConfirmationConfig;
use crate::error::{E2eError, E2eResult};
use crate::pages::{ForgotPasswordSelectors, LoginSelectors};
use crate::playwright::Browser;

/// Top-level configuration for the suite
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Active environment, a key of `environments`
    pub environment: String,

    /// Base URL per environment
    pub environments: BTreeMap<String, String>,

    /// Overrides the environment lookup when set
    pub base_url: Option<String>,

    pub browser: Browser,

    pub wait: WaitTimes,

    pub retry: RetryConfig,

    pub urls: UrlPatterns,

    pub login_selectors: LoginSelectors,

    pub forgot_password_selectors: ForgotPasswordSelectors,

    pub mailbox: MailboxConfig,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        let mut environments = BTreeMap::new();
        environments.insert("staging".to_string(), "http://127.0.0.1:3000".to_string());

        Self {
            environment: "staging".to_string(),
            environments,
            base_url: None,
            browser: Browser::default(),
            wait: WaitTimes::default(),
            retry: RetryConfig::default(),
            urls: UrlPatterns::default(),
            login_selectors: LoginSelectors::default(),
            forgot_password_selectors: ForgotPasswordSelectors::default(),
            mailbox: MailboxConfig::default(),
        }
    }
}

/// Standard wait durations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitTimes {
    pub short_ms: u64,
    pub medium_ms: u64,
    pub long_ms: u64,
}

impl Default for WaitTimes {
    fn default() -> Self {
        Self {
            short_ms: 5_000,
            medium_ms: 10_000,
            long_ms: 30_000,
        }
    }
}

impl WaitTimes {
    pub fn short(&self) -> Duration {
        Duration::from_millis(self.short_ms)
    }

    pub fn medium(&self) -> Duration {
        Duration::from_millis(self.medium_ms)
    }

    pub fn long(&self) -> Duration {
        Duration::from_millis(self.long_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,

    /// Pause after a success toast before re-reading the URL
    pub grace_period_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            grace_period_ms: 1_000,
        }
    }
}

/// URL fragments that identify pages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlPatterns {
    pub dashboard: String,
    pub login_page: String,
}

impl Default for UrlPatterns {
    fn default() -> Self {
        Self {
            dashboard: "/dashboard".to_string(),
            login_page: "/login".to_string(),
        }
    }
}

impl UrlPatterns {
    /// Raw pattern for the dashboard, without the leading slash
    pub fn dashboard_pattern(&self) -> String {
        strip_leading_slash(&self.dashboard)
    }

    pub fn login_pattern(&self) -> String {
        strip_leading_slash(&self.login_page)
    }

    pub fn dashboard_regex(&self) -> E2eResult<Regex> {
        compile(&self.dashboard_pattern())
    }

    pub fn login_regex(&self) -> E2eResult<Regex> {
        compile(&self.login_pattern())
    }
}

fn strip_leading_slash(pattern: &str) -> String {
    pattern.strip_prefix('/').unwrap_or(pattern).to_string()
}

/// Compile a raw URL pattern
pub fn compile(pattern: &str) -> E2eResult<Regex> {
    Regex::new(pattern).map_err(|source| E2eError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    pub api_key: Option<String>,

    /// Alternative API endpoint (for a local mock)
    pub base_url: Option<String>,

    /// Pre-provisioned inbox that receives reset emails
    pub email_address: Option<String>,
    pub inbox_id: Option<String>,
}

impl SuiteConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> E2eResult<Self> {
        let config = if path.exists() {
            debug!("Loading suite config from {}", path.display());
            let content = std::fs::read_to_string(path)?;
            Self::from_yaml(&content)?
        } else {
            debug!("No suite config at {}, using defaults", path.display());
            Self::default()
        };
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> E2eResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> E2eResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env) = lookup("ENV") {
            self.environment = env;
        }
        if let Some(url) = lookup("BASE_URL") {
            self.base_url = Some(url);
        }
        if let Some(browser) = lookup("BROWSER") {
            self.browser = browser.parse()?;
        }
        if let Some(key) = lookup("MAILSLURP_API_KEY") {
            self.mailbox.api_key = Some(key);
        }
        Ok(())
    }

    /// Base URL for the active environment
    pub fn resolve_base_url(&self) -> E2eResult<String> {
        if let Some(url) = &self.base_url {
            return Ok(url.clone());
        }
        let url = self.environments.get(&self.environment).cloned().ok_or_else(|| {
            E2eError::InvalidConfig(format!("no base URL for environment '{}'", self.environment))
        })?;
        info!("Running tests in {} environment at {}", self.environment, url);
        Ok(url)
    }

    /// Settings for confirming a login via the dashboard redirect
    pub fn login_confirmation(&self) -> ConfirmationConfig {
        ConfirmationConfig {
            max_retries: self.retry.max_retries,
            race_timeout: self.wait.short(),
            grace_period: Duration::from_millis(self.retry.grace_period_ms),
            success_pattern: self.urls.dashboard_pattern(),
        }
    }
}
