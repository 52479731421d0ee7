//! Login page

use std::fmt;
use std::time::Duration;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SuiteConfig;
use crate::confirm::{ConfirmationProbe, EventSink, OutcomeConfirmer, TracingSink};
use crate::error::{E2eError, E2eResult};
use crate::page::Page;
use crate::pages::mask;

/// Toasts animate in; give them this long before reading
const TOAST_DELAY: Duration = Duration::from_millis(1000);

/// Locators for the login form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginSelectors {
    pub username: String,
    pub password: String,
    pub submit: String,
    pub username_error: String,
    pub password_error: String,
    /// Any form-level validation message
    pub form_errors: String,
    pub success_toast: String,
    pub error_toast: String,
    pub remember_me: String,
    pub forgot_password_link: String,
}

impl Default for LoginSelectors {
    fn default() -> Self {
        Self {
            username: "[data-testid='username-input'], input[placeholder='Input your username']".to_string(),
            password: "[data-testid='password-input'], input[placeholder='Input your password']".to_string(),
            submit: "[data-testid='login-button'], button[type='submit']".to_string(),
            username_error: "[data-testid='username-error-message']".to_string(),
            password_error: "[data-testid='password-error-message']".to_string(),
            form_errors: "[data-testid$='error-message']".to_string(),
            success_toast: "#login-success-toast, div.chakra-toast div.chakra-alert--success".to_string(),
            error_toast: "#login-error-toast, div.chakra-toast div.chakra-alert--error".to_string(),
            remember_me: "[data-testid='remember-me'], input[name='remember_me']".to_string(),
            forgot_password_link: "[data-testid='forgot-password'], a:has-text('Forgot password?')".to_string(),
        }
    }
}

/// Login form input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    Username,
    Password,
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormField::Username => f.write_str("username"),
            FormField::Password => f.write_str("password"),
        }
    }
}

/// What happened when the form was submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginSubmission {
    /// Submit stayed disabled, nothing was sent
    ButtonDisabled,
    /// Clicked once without waiting for an outcome
    Submitted,
    /// Redirect to the dashboard was confirmed
    Confirmed,
}

/// Drives the login submit button for [`OutcomeConfirmer`]
pub struct LoginConfirmationProbe<'a> {
    page: &'a dyn Page,
    selectors: &'a LoginSelectors,
}

impl<'a> LoginConfirmationProbe<'a> {
    pub fn new(page: &'a dyn Page, selectors: &'a LoginSelectors) -> Self {
        Self { page, selectors }
    }
}

#[async_trait]
impl<'a> ConfirmationProbe for LoginConfirmationProbe<'a> {
    async fn is_signal_visible(&self, timeout: Duration) -> bool {
        self.page.wait_for_visible(&self.selectors.success_toast, timeout).await.is_ok()
    }

    async fn wait_for_url_match(&self, pattern: &Regex, timeout: Duration) -> E2eResult<()> {
        self.page.wait_for_url(pattern, timeout).await
    }

    async fn current_url(&self) -> E2eResult<String> {
        self.page.url().await
    }

    async fn trigger_action(&self) -> E2eResult<()> {
        // Already navigated away: the race decides from the URL
        if !self.page.is_visible(&self.selectors.submit).await? {
            debug!("[Login] Submit button gone, not clicking");
            return Ok(());
        }
        info!("[Login] Clicking login button");
        self.page.click(&self.selectors.submit).await
    }

    async fn delay(&self, duration: Duration) {
        self.page.wait_for_timeout(duration).await;
    }
}

/// Login page object
pub struct LoginPage<'a> {
    page: &'a dyn Page,
    config: &'a SuiteConfig,
    sink: &'a dyn EventSink,
}

impl<'a> LoginPage<'a> {
    pub fn new(page: &'a dyn Page, config: &'a SuiteConfig) -> Self {
        Self { page, config, sink: &TracingSink }
    }

    /// Send confirmation events somewhere other than `tracing`
    pub fn with_sink(mut self, sink: &'a dyn EventSink) -> Self {
        self.sink = sink;
        self
    }

    fn selectors(&self) -> &'a LoginSelectors {
        &self.config.login_selectors
    }

    /// Open the login page, retrying until the form shows up
    pub async fn goto(&self) -> E2eResult<()> {
        let max = self.config.retry.max_retries.max(1);

        for attempt in 1..=max {
            match self.load().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("Retry loading login page {}/{}: {}", attempt, max, e);
                    if attempt < max {
                        self.page.wait_for_timeout(self.config.wait.medium()).await;
                    }
                }
            }
        }

        Err(E2eError::PageLoad { page: "login".to_string(), attempts: max })
    }

    async fn load(&self) -> E2eResult<()> {
        self.page.goto("/").await?;
        self.wait_for_form().await
    }

    async fn wait_for_form(&self) -> E2eResult<()> {
        let medium = self.config.wait.medium();
        let s = self.selectors();
        self.page.wait_for_visible(&s.username, medium).await?;
        self.page.wait_for_visible(&s.password, medium).await?;
        self.page.wait_for_visible(&s.submit, medium).await
    }

    /// Fill the form and submit it.
    ///
    /// For positive logins the submit click is confirmed by the dashboard
    /// redirect; running out of attempts is an error that carries the
    /// attempt count. Negative logins click once and return.
    pub async fn login_with_credentials(
        &self,
        username: &str,
        password: &str,
        negative: bool,
    ) -> E2eResult<LoginSubmission> {
        info!("[Login] Logging in as '{}' with password {}", username, mask(password));
        let s = self.selectors();

        self.wait_for_form().await?;
        self.page.fill(&s.username, username).await?;
        self.page.fill(&s.password, password).await?;

        if self.page.is_disabled(&s.submit).await? {
            info!("[Login] Login button disabled, form is incomplete or invalid");
            return Ok(LoginSubmission::ButtonDisabled);
        }

        if negative {
            self.page.click(&s.submit).await?;
            return Ok(LoginSubmission::Submitted);
        }

        let probe = LoginConfirmationProbe::new(self.page, s);
        let confirmer = OutcomeConfirmer::new(&probe, self.sink, self.config.login_confirmation())?;

        if confirmer.confirm().await {
            info!("[Login] Redirected to dashboard");
            Ok(LoginSubmission::Confirmed)
        } else {
            Err(E2eError::LoginNotConfirmed { attempts: confirmer.max_retries() })
        }
    }

    /// Check that an empty field is rejected.
    ///
    /// Passes when the field's validation message appears, or when it does
    /// not but the submit button is disabled.
    pub async fn verify_empty_field_validation(&self, field: FormField) -> E2eResult<bool> {
        let s = self.selectors();
        let selector = match field {
            FormField::Username => &s.username_error,
            FormField::Password => &s.password_error,
        };

        match self.page.wait_for_visible(selector, self.config.wait.short()).await {
            Ok(()) => {
                let text = self.page.text_content(selector).await?.unwrap_or_default();
                info!("[Validation] Message for {}: \"{}\"", field, text);
                Ok(true)
            }
            Err(e) if e.is_timeout() => {
                info!("[Validation] No message shown for {}", field);
                self.page.is_disabled(&s.submit).await
            }
            Err(e) => Err(e),
        }
    }

    /// Fill the form leaving `field` empty, then check validation
    pub async fn fill_and_validate_empty_field(
        &self,
        field: FormField,
        username: &str,
        password: &str,
    ) -> E2eResult<bool> {
        info!("[Validation] Testing empty {}", field);
        let s = self.selectors();
        let username = if field == FormField::Username { "" } else { username };
        let password = if field == FormField::Password { "" } else { password };

        self.page.fill(&s.username, username).await?;
        self.page.fill(&s.password, password).await?;

        self.verify_empty_field_validation(field).await
    }

    /// Text of the success toast, if one is showing
    pub async fn popup_success_text(&self) -> E2eResult<Option<String>> {
        self.page.wait_for_timeout(TOAST_DELAY).await;
        let s = self.selectors();

        if self.page.is_visible(&s.success_toast).await.unwrap_or(false) {
            let text = self.page.text_content(&s.success_toast).await?;
            info!("[Success Toast] {:?}", text);
            return Ok(text);
        }

        debug!("[Success Toast] None visible");
        Ok(None)
    }

    /// Text of the error toast, or of the form validation messages
    pub async fn popup_error_text(&self) -> E2eResult<Option<String>> {
        self.page.wait_for_timeout(TOAST_DELAY).await;
        let s = self.selectors();

        if self.page.is_visible(&s.error_toast).await.unwrap_or(false) {
            let text = self.page.text_content(&s.error_toast).await?;
            info!("[Error Toast] {:?}", text);
            return Ok(text);
        }

        let form_errors = self.page.all_text_contents(&s.form_errors).await?;
        if !form_errors.is_empty() {
            let text = form_errors.join(", ");
            info!("[Error Form] {}", text);
            return Ok(Some(text));
        }

        warn!("[Error Toast] No error message visible");
        Ok(None)
    }
}
