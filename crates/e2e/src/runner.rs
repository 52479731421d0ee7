//! Test runner that maps cases onto page objects, one browser session each

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;
use authflow_mailbox::{extract_reset_password_link, MailSlurpClient};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::cases::{CaseFlow, Credentials, LoginExpectation, Severity, TestCase};
use crate::config::SuiteConfig;
use crate::error::{E2eError, E2eResult};
use crate::fake::FakeData;
use crate::page::{LoadState, Page};
use crate::pages::{mask, ForgotPasswordPage, FormField, LoginPage, LoginSubmission, ResetOutcome};
use crate::playwright::{PlaywrightConfig, PlaywrightSession};

/// Result of one step within a case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Result of running a single case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: String,
    pub scenario: String,
    pub severity: Severity,
    pub story: Option<String>,
    pub success: bool,
    pub skipped: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
}

impl TestResult {
    fn for_case(case: &TestCase) -> Self {
        Self {
            id: case.id.clone(),
            scenario: case.scenario.clone(),
            severity: case.severity,
            story: case.story.clone(),
            success: false,
            skipped: false,
            duration_ms: 0,
            steps: vec![],
            error: None,
        }
    }

    fn skipped(case: &TestCase, reason: &str) -> Self {
        Self {
            skipped: true,
            error: Some(reason.to_string()),
            ..Self::for_case(case)
        }
    }

    fn failed(case: &TestCase, error: &E2eError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::for_case(case)
        }
    }
}

/// Result of running all cases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    fn from_results(results: Vec<TestResult>, duration_ms: u64) -> Self {
        let skipped = results.iter().filter(|r| r.skipped).count();
        let passed = results.iter().filter(|r| !r.skipped && r.success).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed - skipped,
            skipped,
            duration_ms,
            results,
        }
    }
}

const NO_MAILBOX: &str = "email-testing API key not configured";

#[derive(Default)]
struct StepLog {
    steps: Vec<StepResult>,
}

impl StepLog {
    async fn run<T, F>(&mut self, name: impl Into<String>, fut: F) -> E2eResult<T>
    where
        F: Future<Output = E2eResult<T>>,
    {
        let name = name.into();
        debug!("Step: {}", name);
        let start = Instant::now();
        let result = fut.await;
        self.push(name, start, result.as_ref().err());
        result
    }

    fn check(&mut self, name: impl Into<String>, result: E2eResult<()>) -> E2eResult<()> {
        self.push(name.into(), Instant::now(), result.as_ref().err());
        result
    }

    fn push(&mut self, name: String, start: Instant, error: Option<&E2eError>) {
        self.steps.push(StepResult {
            name,
            success: error.is_none(),
            duration_ms: start.elapsed().as_millis() as u64,
            error: error.map(|e| e.to_string()),
        });
    }
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> E2eResult<()> {
    if condition {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(message()))
    }
}

fn ensure_contains(actual: &str, expected: &str) -> E2eResult<()> {
    ensure(actual.contains(expected), || {
        format!("expected \"{}\" to contain \"{}\"", actual, expected)
    })
}

/// Drives one case against an open page
pub struct CaseExecutor<'a> {
    page: &'a dyn Page,
    suite: &'a SuiteConfig,
    mailbox: Option<&'a MailSlurpClient>,
}

impl<'a> CaseExecutor<'a> {
    pub fn new(page: &'a dyn Page, suite: &'a SuiteConfig) -> Self {
        Self { page, suite, mailbox: None }
    }

    pub fn with_mailbox(mut self, mailbox: Option<&'a MailSlurpClient>) -> Self {
        self.mailbox = mailbox;
        self
    }

    /// Run `case`, recording every step; never fails, errors land in the result
    pub async fn execute(&self, case: &TestCase) -> TestResult {
        if case.flow.needs_mailbox() && self.mailbox.is_none() {
            warn!("Skipping {}: {}", case.id, NO_MAILBOX);
            return TestResult::skipped(case, NO_MAILBOX);
        }

        info!("[{}] {}", case.id, case.scenario);
        let start = Instant::now();
        let mut steps = StepLog::default();
        let outcome = self.run_flow(&case.flow, &mut steps).await;

        TestResult {
            success: outcome.is_ok(),
            duration_ms: start.elapsed().as_millis() as u64,
            steps: steps.steps,
            error: outcome.err().map(|e| e.to_string()),
            ..TestResult::for_case(case)
        }
    }

    async fn run_flow(&self, flow: &CaseFlow, steps: &mut StepLog) -> E2eResult<()> {
        match flow {
            CaseFlow::Login { credentials, expect } => self.login(credentials, expect, steps).await,
            CaseFlow::EmptyField { credentials, field } => self.empty_field(credentials, *field, steps).await,
            CaseFlow::ResetRequest { email, expect_error, message } => {
                self.reset_request(email.as_deref(), *expect_error, message, steps).await
            }
            CaseFlow::EmptyEmail => self.empty_email(steps).await,
            CaseFlow::EmailFormat { email } => self.email_format(email, steps).await,
            CaseFlow::BackToLogin => self.back_to_login(steps).await,
            CaseFlow::ResetLink { email_address, inbox_id } => {
                self.reset_link(email_address.as_deref(), inbox_id.as_deref(), steps).await
            }
        }
    }

    async fn login(
        &self,
        credentials: &Credentials,
        expect: &LoginExpectation,
        steps: &mut StepLog,
    ) -> E2eResult<()> {
        let login = LoginPage::new(self.page, self.suite);
        let medium = self.suite.wait.medium();
        let Credentials { username, password } = credentials;
        let fill_step = format!("Fill credentials: {} / {}", username, mask(password));

        steps.run("Open login page", login.goto()).await?;

        match expect {
            LoginExpectation::Success { message } => {
                let submission = steps.run(fill_step, login.login_with_credentials(username, password, false)).await?;
                steps.check(
                    "Login submitted",
                    ensure(submission == LoginSubmission::Confirmed, || {
                        format!("login was not submitted ({:?})", submission)
                    }),
                )?;

                let dashboard = self.suite.urls.dashboard_regex()?;
                steps.run("Verify dashboard URL", self.page.wait_for_url(&dashboard, medium)).await?;

                let toast = steps.run("Read success toast", login.popup_success_text()).await?;
                match toast {
                    Some(text) => steps.check("Verify success message", ensure_contains(&text, message)),
                    None => {
                        info!("[Validation] No success toast, dashboard URL confirmed");
                        Ok(())
                    }
                }
            }
            LoginExpectation::Rejected { message } => {
                steps.run(fill_step, login.login_with_credentials(username, password, true)).await?;

                let login_page = self.suite.urls.login_regex()?;
                steps.run("Verify still on login page", self.page.wait_for_url(&login_page, medium)).await?;

                let text = steps.run("Read error message", login.popup_error_text()).await?;
                let expected = message.split(',').next().unwrap_or_default().trim();
                info!("[Validation] Expected error \"{}\", got {:?}", expected, text);
                steps.check("Verify error message", ensure_contains(&text.unwrap_or_default(), expected))
            }
        }
    }

    async fn empty_field(&self, credentials: &Credentials, field: FormField, steps: &mut StepLog) -> E2eResult<()> {
        let login = LoginPage::new(self.page, self.suite);
        steps.run("Open login page", login.goto()).await?;

        let valid = steps
            .run(
                format!("Leave {} empty", field),
                login.fill_and_validate_empty_field(field, &credentials.username, &credentials.password),
            )
            .await?;
        steps.check(
            format!("Verify empty {} is rejected", field),
            ensure(valid, || format!("empty {} was accepted", field)),
        )
    }

    async fn open_forgot_password(&self, steps: &mut StepLog) -> E2eResult<ForgotPasswordPage<'a>> {
        let forgot = ForgotPasswordPage::new(self.page, self.suite);
        steps.run("Open forgot password page", forgot.goto()).await?;
        Ok(forgot)
    }

    async fn reset_request(
        &self,
        email: Option<&str>,
        expect_error: bool,
        message: &str,
        steps: &mut StepLog,
    ) -> E2eResult<()> {
        let forgot = self.open_forgot_password(steps).await?;
        let email = email.map(str::to_string).unwrap_or_else(FakeData::email);

        let outcome = steps
            .run(format!("Submit email: {}", email), forgot.request_password_reset(&email, expect_error))
            .await?;

        let verdict = match outcome {
            ResetOutcome::Success(text) => ensure(!expect_error, || format!("unexpected success: \"{}\"", text))
                .and_then(|()| ensure_contains(&text, message)),
            ResetOutcome::Error(text) => ensure(expect_error, || format!("unexpected error: \"{}\"", text))
                .and_then(|()| ensure_contains(&text, message)),
            ResetOutcome::Validation(validation) => {
                info!("[Validation] {}", validation.message);
                ensure(validation.is_valid, || validation.message.clone())
            }
        };
        steps.check("Verify reset response", verdict)
    }

    async fn empty_email(&self, steps: &mut StepLog) -> E2eResult<()> {
        let forgot = self.open_forgot_password(steps).await?;
        steps.run("Clear email", forgot.fill_email("")).await?;

        let validation = forgot.verify_email_validation().await;
        info!("[Validation] {}", validation.message);
        steps.check("Verify submit is disabled", ensure(validation.is_valid, || validation.message.clone()))
    }

    async fn email_format(&self, email: &str, steps: &mut StepLog) -> E2eResult<()> {
        let forgot = self.open_forgot_password(steps).await?;
        let validation = steps.run(format!("Fill email: {}", email), forgot.verify_email_format(email)).await?;
        info!("[Format Validation] {}", validation.message);
        steps.check("Verify format validation", ensure(validation.is_valid, || validation.message.clone()))
    }

    async fn back_to_login(&self, steps: &mut StepLog) -> E2eResult<()> {
        let forgot = self.open_forgot_password(steps).await?;
        steps.run("Click Back to Login", forgot.go_back_to_login()).await?;

        let login_page = self.suite.urls.login_regex()?;
        steps
            .run("Verify login page URL", self.page.wait_for_url(&login_page, self.suite.wait.medium()))
            .await
    }

    async fn reset_link(
        &self,
        email_address: Option<&str>,
        inbox_id: Option<&str>,
        steps: &mut StepLog,
    ) -> E2eResult<()> {
        let client = self.mailbox.ok_or_else(|| E2eError::InvalidConfig(NO_MAILBOX.to_string()))?;
        let wait = &self.suite.wait;

        let configured = &self.suite.mailbox;
        let address = email_address.or(configured.email_address.as_deref());
        let inbox = inbox_id.or(configured.inbox_id.as_deref());
        let (address, inbox) = match (address, inbox) {
            (Some(address), Some(inbox)) => (address.to_string(), inbox.to_string()),
            _ => {
                let created = steps
                    .run("Create inbox", async { client.create_inbox().await.map_err(E2eError::from) })
                    .await?;
                (created.email_address, created.id)
            }
        };
        info!("[Mailbox] Using {} (inbox {})", address, inbox);

        let forgot = self.open_forgot_password(steps).await?;
        steps.run(format!("Fill email: {}", address), forgot.fill_email(&address)).await?;
        let submitted = steps.run("Submit reset request", forgot.click_submit()).await?;
        steps.check("Verify request was sent", ensure(submitted, || "submit button disabled".to_string()))?;

        steps.run("Read success toast", self.poll_success_toast(&forgot)).await?;
        self.page.wait_for_timeout(wait.medium()).await;

        let email = steps
            .run("Wait for reset email", async {
                client.wait_for_latest_email(&inbox, wait.long()).await.map_err(E2eError::from)
            })
            .await?;
        info!("[Mailbox] Received email with subject {:?}", email.subject);
        steps.check(
            "Verify email subject",
            ensure(email.subject.as_deref().is_some_and(|s| !s.is_empty()), || "email has no subject".to_string()),
        )?;

        let link = extract_reset_password_link(email.body_text());
        steps.check("Extract reset link", ensure(link.is_some(), || "no reset link in email body".to_string()))?;
        let link = link.unwrap_or_default();
        info!("[Mailbox] Reset link: {}", link);

        self.page.wait_for_timeout(wait.short()).await;
        steps.run("Open reset link", self.page.goto(&link)).await?;
        steps
            .run("Wait for network idle", self.page.wait_for_load_state(LoadState::NetworkIdle, wait.long()))
            .await?;
        steps.run("Verify reset form", forgot.verify_reset_form()).await
    }

    /// The toast sometimes lags the request; give it a few tries
    async fn poll_success_toast(&self, forgot: &ForgotPasswordPage<'_>) -> E2eResult<Option<String>> {
        let max = self.suite.retry.max_retries.max(1);

        for attempt in 1..=max {
            match forgot.success_message().await? {
                Some(text) if !text.is_empty() => return Ok(Some(text)),
                _ => {
                    warn!("Attempt {}/{} failed to read success message", attempt, max);
                    if attempt < max {
                        self.page.wait_for_timeout(self.suite.wait.short()).await;
                    }
                }
            }
        }
        Ok(None)
    }
}

/// Main E2E test runner
pub struct TestRunner {
    suite: SuiteConfig,

    /// Template for every session; the base URL comes from `suite`
    playwright_config: PlaywrightConfig,

    cases_dir: PathBuf,

    output_dir: PathBuf,
}

impl TestRunner {
    /// Create a new test runner with default configuration
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    /// Create a test runner with custom configuration
    pub fn with_config(config: RunnerConfig) -> Self {
        Self {
            suite: config.suite,
            playwright_config: config.playwright,
            cases_dir: config.cases_dir,
            output_dir: config.output_dir,
        }
    }

    pub fn suite(&self) -> &SuiteConfig {
        &self.suite
    }

    pub fn cases_dir(&self) -> &Path {
        &self.cases_dir
    }

    /// Run all cases in the cases directory
    pub async fn run_all(&self) -> E2eResult<TestSuiteResult> {
        let cases = TestCase::load_all(&self.cases_dir)?;
        self.run_cases(&cases).await
    }

    /// Run cases matching a tag
    pub async fn run_tagged(&self, tag: &str) -> E2eResult<TestSuiteResult> {
        let cases = TestCase::load_all(&self.cases_dir)?;
        let filtered: Vec<TestCase> = TestCase::filter_by_tag(&cases, tag).into_iter().cloned().collect();
        self.run_cases(&filtered).await
    }

    /// Run a specific case by id
    pub async fn run_case(&self, id: &str) -> E2eResult<TestResult> {
        let cases = TestCase::load_all(&self.cases_dir)?;
        let case = TestCase::find(&cases, id)?;
        PlaywrightSession::check_playwright_installed(&self.playwright_config.node_modules).await?;
        let playwright = self.session_config()?;
        let mailbox = self.mailbox_client()?;
        Ok(self.run_in_session(&playwright, mailbox.as_ref(), case).await)
    }

    /// Run a list of cases, each in a fresh browser session
    pub async fn run_cases(&self, cases: &[TestCase]) -> E2eResult<TestSuiteResult> {
        let start = Instant::now();
        PlaywrightSession::check_playwright_installed(&self.playwright_config.node_modules).await?;
        let playwright = self.session_config()?;
        let mailbox = self.mailbox_client()?;
        let mut results = Vec::with_capacity(cases.len());

        info!("Running {} test(s)...", cases.len());

        for case in cases {
            let result = self.run_in_session(&playwright, mailbox.as_ref(), case).await;
            if result.skipped {
                info!("- {} skipped", result.id);
            } else if result.success {
                info!("✓ {} ({} ms)", result.id, result.duration_ms);
            } else {
                error!("✗ {} - {}", result.id, result.error.as_deref().unwrap_or("unknown error"));
            }
            results.push(result);
        }

        let suite = TestSuiteResult::from_results(results, start.elapsed().as_millis() as u64);

        info!("");
        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            suite.passed, suite.failed, suite.skipped, suite.duration_ms
        );

        Ok(suite)
    }

    async fn run_in_session(
        &self,
        playwright: &PlaywrightConfig,
        mailbox: Option<&MailSlurpClient>,
        case: &TestCase,
    ) -> TestResult {
        if case.flow.needs_mailbox() && mailbox.is_none() {
            warn!("Skipping {}: {}", case.id, NO_MAILBOX);
            return TestResult::skipped(case, NO_MAILBOX);
        }

        let session = match PlaywrightSession::launch(playwright).await {
            Ok(session) => session,
            Err(e) => {
                error!("Failed to start browser for {}: {}", case.id, e);
                return TestResult::failed(case, &e);
            }
        };

        let result = CaseExecutor::new(&session, &self.suite)
            .with_mailbox(mailbox)
            .execute(case)
            .await;

        if let Err(e) = session.close().await {
            warn!("Failed to close browser session for {}: {}", case.id, e);
        }
        result
    }

    fn session_config(&self) -> E2eResult<PlaywrightConfig> {
        Ok(PlaywrightConfig {
            base_url: self.suite.resolve_base_url()?,
            browser: self.suite.browser,
            ..self.playwright_config.clone()
        })
    }

    fn mailbox_client(&self) -> E2eResult<Option<MailSlurpClient>> {
        let config = &self.suite.mailbox;
        let Some(key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            return Ok(None);
        };
        let client = match &config.base_url {
            Some(url) => MailSlurpClient::with_base_url(key, url.as_str())?,
            None => MailSlurpClient::new(key)?,
        };
        Ok(Some(client))
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub suite: SuiteConfig,
    pub playwright: PlaywrightConfig,
    pub cases_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            suite: SuiteConfig::default(),
            playwright: PlaywrightConfig::default(),
            cases_dir: PathBuf::from("tests/cases"),
            output_dir: PathBuf::from("test-results"),
        }
    }
}
