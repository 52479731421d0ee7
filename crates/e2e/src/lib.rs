//! Authflow E2E Test Framework
//!
//! This crate drives login and password-recovery flows in a real browser:
//! - Controls Playwright through a long-lived Node bridge process
//! - Confirms UI outcomes with a bounded race between a success toast and
//!   a URL redirect, re-triggering the action on inconclusive attempts
//! - Parses declarative YAML test cases
//! - Follows reset-password emails through an email-testing API
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── PlaywrightSession::launch() -> impl Page             │
//! │    ├── CaseExecutor::execute(case: TestCase) -> TestResult  │
//! │    └── write_results() -> test-results.json                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Page objects (LoginPage, ForgotPasswordPage)               │
//! │    └── OutcomeConfirmer                                     │
//! │          ├── trigger_action()                               │
//! │          └── race_wait: success signal | URL match | timeout│
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestCase (YAML)                                            │
//! │    ├── id, scenario, tags, severity, story                  │
//! │    └── flow: login | empty_field | reset_request | ...      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod cases;
pub mod config;
pub mod confirm;
pub mod error;
pub mod fake;
pub mod page;
pub mod pages;
pub mod playwright;
pub mod runner;

pub use cases::{CaseFlow, TestCase};
pub use config::SuiteConfig;
pub use confirm::{ConfirmationConfig, ConfirmationProbe, OutcomeConfirmer, RaceOutcome};
pub use error::{E2eError, E2eResult};
pub use page::Page;
pub use playwright::{PlaywrightConfig, PlaywrightSession};
pub use runner::{CaseExecutor, RunnerConfig, TestRunner};
