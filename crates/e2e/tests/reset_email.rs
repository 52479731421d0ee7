//! Reset-link flow with a mock email-testing API

mod common;

use std::time::Duration;
use authflow_e2e::{CaseExecutor, SuiteConfig, TestCase};
use authflow_mailbox::MailSlurpClient;
use common::FakePage;
use httpmock::prelude::*;
use serde_json::json;

const RESET_URL: &str = "http://app.test/reset-password?token=abc";

fn fast_config() -> SuiteConfig {
    let mut config = SuiteConfig::default();
    config.wait.short_ms = 100;
    config.wait.medium_ms = 1_000;
    config.wait.long_ms = 3_000;
    config.mailbox.email_address = Some("admin@example.com".to_string());
    config.mailbox.inbox_id = Some("inbox-1".to_string());
    config
}

fn reset_app(page: &FakePage, config: &SuiteConfig) {
    let s = config.forgot_password_selectors.clone();

    let link = s.entry_link.clone();
    page.on("goto:/login", Duration::ZERO, move |state| state.show(&link));

    let (title, email, submit) = (s.page_title.clone(), s.email_input.clone(), s.submit.clone());
    page.on(&format!("click:{}", s.entry_link), Duration::from_millis(50), move |state| {
        state.navigate("/forgot-password");
        state.show(&title);
        state.show(&email);
        state.show(&submit);
    });

    let toast = s.success_toast.clone();
    page.on(&format!("click:{}", s.submit), Duration::from_millis(100), move |state| {
        state.show_text(&toast, "Reset password link has been sent to your email");
    });

    page.on(&format!("goto:{}", RESET_URL), Duration::from_millis(100), move |state| {
        for selector in [&s.reset_title, &s.new_password, &s.confirm_password, &s.reset_button] {
            state.show(selector);
        }
    });
}

fn reset_link_case() -> TestCase {
    TestCase::from_yaml("id: FP-E001\nflow: { action: reset_link }\n").unwrap().remove(0)
}

#[tokio::test]
async fn reset_email_link_opens_reset_form() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/waitForLatestEmail")
                .query_param("inboxId", "inbox-1")
                .query_param("unreadOnly", "true");
            then.status(200).json_body(json!({
                "id": "email-1",
                "subject": "Reset your password",
                "body": format!("<p>Click <a href=\"{}\">here</a> to reset.</p>", RESET_URL),
            }));
        })
        .await;

    let config = fast_config();
    let page = FakePage::new();
    reset_app(&page, &config);
    let client = MailSlurpClient::with_base_url("test-key", server.base_url()).unwrap();

    let result = CaseExecutor::new(&page, &config)
        .with_mailbox(Some(&client))
        .execute(&reset_link_case())
        .await;

    mock.assert_async().await;
    assert!(result.success, "{:?}", result.error);
    assert!(result.steps.iter().any(|s| s.name == "Verify reset form" && s.success));
    assert_eq!(page.count(&format!("goto:{}", RESET_URL)), 1);
}

#[tokio::test]
async fn email_without_link_fails_the_case() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/waitForLatestEmail");
            then.status(200).json_body(json!({
                "id": "email-2",
                "subject": "Welcome",
                "body": "Thanks for signing up",
            }));
        })
        .await;

    let config = fast_config();
    let page = FakePage::new();
    reset_app(&page, &config);
    let client = MailSlurpClient::with_base_url("test-key", server.base_url()).unwrap();

    let result = CaseExecutor::new(&page, &config)
        .with_mailbox(Some(&client))
        .execute(&reset_link_case())
        .await;

    assert!(!result.success);
    let last = result.steps.last().unwrap();
    assert_eq!(last.name, "Extract reset link");
    assert!(!last.success);
    assert_eq!(page.count(&format!("goto:{}", RESET_URL)), 0);
}
