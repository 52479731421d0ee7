//! Forgot-password and reset-password pages

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::SuiteConfig;
use crate::error::{E2eError, E2eResult};
use crate::page::Page;
use crate::pages::mask;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordSelectors {
    /// "Forgot password?" link on the login page
    pub entry_link: String,
    pub page_title: String,
    pub email_input: String,
    pub email_error: String,
    pub submit: String,
    pub back_to_login: String,
    pub success_toast: String,
    pub error_toast: String,
    pub reset_title: String,
    pub new_password: String,
    pub confirm_password: String,
    pub reset_button: String,
}

impl Default for ForgotPasswordSelectors {
    fn default() -> Self {
        Self {
            entry_link: "text=Forgot password?".to_string(),
            page_title: "h2:has-text(\"Forgot Your Password?\")".to_string(),
            email_input: "input[name=\"email\"][type=\"email\"]".to_string(),
            email_error: ".chakra-form__error-message".to_string(),
            submit: "button[type=\"submit\"]".to_string(),
            back_to_login: "a:has-text(\"Back to Login\")".to_string(),
            success_toast: "xpath=(//div[@data-status='success'])[2]".to_string(),
            error_toast: "xpath=//div[normalize-space(text())='data not found']".to_string(),
            reset_title: "h2:has-text(\"Reset Password\")".to_string(),
            new_password: "xpath=(//input[@placeholder='Input your password'])[1]".to_string(),
            confirm_password: "xpath=(//input[@placeholder='Input your password'])[2]".to_string(),
            reset_button: "xpath=//button[normalize-space(text())='Reset Password']".to_string(),
        }
    }
}

/// Verdict of a client-side validation check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailValidation {
    pub is_valid: bool,
    pub message: String,
}

impl EmailValidation {
    fn new(is_valid: bool, message: impl Into<String>) -> Self {
        Self { is_valid, message: message.into() }
    }
}

/// Result of submitting the reset request form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetOutcome {
    /// The form was not submitted; this is the validation verdict instead
    Validation(EmailValidation),
    /// Success toast text (empty when none appeared)
    Success(String),
    /// Error toast text (empty when none appeared)
    Error(String),
}

pub struct ForgotPasswordPage<'a> {
    page: &'a dyn Page,
    config: &'a SuiteConfig,
}

impl<'a> ForgotPasswordPage<'a> {
    pub fn new(page: &'a dyn Page, config: &'a SuiteConfig) -> Self {
        Self { page, config }
    }

    fn selectors(&self) -> &'a ForgotPasswordSelectors {
        &self.config.forgot_password_selectors
    }

    /// Reach the page through the link on the login page
    pub async fn goto(&self) -> E2eResult<()> {
        let max = self.config.retry.max_retries.max(1);

        for attempt in 1..=max {
            match self.load().await {
                Ok(()) => {
                    info!("Navigated to forgot password page");
                    return Ok(());
                }
                Err(e) => {
                    warn!("Retry loading forgot password page {}/{}: {}", attempt, max, e);
                    if attempt < max {
                        self.page.wait_for_timeout(self.config.wait.medium()).await;
                    }
                }
            }
        }

        Err(E2eError::PageLoad { page: "forgot password".to_string(), attempts: max })
    }

    async fn load(&self) -> E2eResult<()> {
        let medium = self.config.wait.medium();
        let s = self.selectors();

        self.page.goto(&self.config.urls.login_page).await?;
        self.page.wait_for_visible(&s.entry_link, medium).await?;
        self.page.click(&s.entry_link).await?;

        self.page.wait_for_visible(&s.page_title, medium).await?;
        self.page.wait_for_visible(&s.email_input, medium).await?;
        self.page.wait_for_visible(&s.submit, medium).await
    }

    pub async fn fill_email(&self, email: &str) -> E2eResult<()> {
        let s = self.selectors();
        self.page.wait_for_visible(&s.email_input, self.config.wait.medium()).await?;
        self.page.fill(&s.email_input, email).await
    }

    /// Click submit; `false` when the button is disabled
    pub async fn click_submit(&self) -> E2eResult<bool> {
        let s = self.selectors();
        self.page.wait_for_visible(&s.submit, self.config.wait.medium()).await?;

        if self.page.is_disabled(&s.submit).await? {
            info!("Submit button is disabled, likely due to validation issues");
            return Ok(false);
        }

        self.page.click(&s.submit).await?;
        Ok(true)
    }

    pub async fn go_back_to_login(&self) -> E2eResult<()> {
        let s = self.selectors();
        self.page.wait_for_visible(&s.back_to_login, self.config.wait.medium()).await?;
        self.page.click(&s.back_to_login).await
    }

    /// Submit must be disabled for an empty email and enabled otherwise
    pub async fn verify_email_validation(&self) -> EmailValidation {
        match self.check_email_validation().await {
            Ok(verdict) => verdict,
            Err(e) => {
                error!("Error during email validation check: {}", e);
                EmailValidation::new(false, format!("Error in validation: {}", e))
            }
        }
    }

    async fn check_email_validation(&self) -> E2eResult<EmailValidation> {
        let s = self.selectors();
        let value = self.page.input_value(&s.email_input).await?;
        let empty = value.trim().is_empty();
        let disabled = self.page.is_disabled(&s.submit).await?;

        info!("Email field empty: {}, value: \"{}\", submit disabled: {}", empty, value, disabled);

        Ok(match (empty, disabled) {
            (true, true) => EmailValidation::new(true, "Valid: Button disabled for empty email field"),
            (true, false) => EmailValidation::new(false, "Invalid: Button should be disabled for empty email field"),
            (false, false) => EmailValidation::new(true, "Valid: Button enabled for filled email field"),
            (false, true) => EmailValidation::new(false, "Invalid: Button should be enabled for filled email field"),
        })
    }

    /// Fill `email` and judge the browser's format validation
    pub async fn verify_email_format(&self, email: &str) -> E2eResult<EmailValidation> {
        self.fill_email(email).await?;
        let s = self.selectors();

        let verdict = async {
            let disabled = self.page.is_disabled(&s.submit).await?;
            let message = self.page.validation_message(&s.email_input).await?;
            info!("Email: \"{}\", submit disabled: {}, validation: \"{}\"", email, disabled, message);

            let verdict = if email.trim().is_empty() {
                if disabled {
                    EmailValidation::new(true, "Valid: Button disabled for empty email")
                } else {
                    EmailValidation::new(false, "Invalid: Button should be disabled for empty email")
                }
            } else if !message.is_empty() {
                EmailValidation::new(true, format!("Valid: HTML5 validation detected - \"{}\"", message))
            } else if !disabled {
                EmailValidation::new(true, "Valid: Button enabled for valid email format")
            } else {
                EmailValidation::new(false, "Invalid: Button should be enabled for valid email format")
            };
            Ok::<_, E2eError>(verdict)
        }
        .await;

        Ok(verdict.unwrap_or_else(|e| {
            error!("Error checking email format validation: {}", e);
            EmailValidation::new(false, format!("Error in format validation: {}", e))
        }))
    }

    /// Success toast text, if one appears within the medium wait
    pub async fn success_message(&self) -> E2eResult<Option<String>> {
        self.toast_text(&self.selectors().success_toast, "success").await
    }

    /// Error toast text, if one appears within the medium wait
    pub async fn error_message(&self) -> E2eResult<Option<String>> {
        self.toast_text(&self.selectors().error_toast, "error").await
    }

    async fn toast_text(&self, selector: &str, kind: &str) -> E2eResult<Option<String>> {
        match self.page.wait_for_visible(selector, self.config.wait.medium()).await {
            Ok(()) => {
                let text = self.page.text_content(selector).await?.unwrap_or_default();
                if text.is_empty() {
                    warn!("Empty {} toast text", kind);
                }
                info!("Forgot password {} toast: \"{}\"", kind, text);
                Ok(Some(text))
            }
            Err(e) if e.is_timeout() => {
                warn!("No {} toast appeared", kind);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Fill the email, submit, and read the response toast
    pub async fn request_password_reset(&self, email: &str, expect_error: bool) -> E2eResult<ResetOutcome> {
        self.fill_email(email).await?;

        if email.trim().is_empty() {
            return Ok(ResetOutcome::Validation(self.verify_email_validation().await));
        }

        if !self.click_submit().await? {
            return Ok(ResetOutcome::Validation(EmailValidation::new(
                false,
                "Submit button is disabled but email is filled",
            )));
        }

        if expect_error {
            let message = self.error_message().await?.unwrap_or_default();
            Ok(ResetOutcome::Error(message))
        } else {
            let message = self.success_message().await?.unwrap_or_default();
            Ok(ResetOutcome::Success(message))
        }
    }

    /// Wait for every element of the reset-password form
    pub async fn verify_reset_form(&self) -> E2eResult<()> {
        let medium = self.config.wait.medium();
        let s = self.selectors();
        self.page.wait_for_visible(&s.reset_title, medium).await?;
        self.page.wait_for_visible(&s.new_password, medium).await?;
        self.page.wait_for_visible(&s.confirm_password, medium).await?;
        self.page.wait_for_visible(&s.reset_button, medium).await
    }

    pub async fn submit_new_password(&self, password: &str) -> E2eResult<()> {
        info!("Submitting new password {}", mask(password));
        let s = self.selectors();
        self.page.fill(&s.new_password, password).await?;
        self.page.fill(&s.confirm_password, password).await?;
        self.page.click(&s.reset_button).await
    }
}
