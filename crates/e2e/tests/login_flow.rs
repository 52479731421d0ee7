//! Login page flows against an in-memory page

mod common;

use std::time::Duration;
use authflow_e2e::confirm::{ConfirmationEvent, RecordingSink};
use authflow_e2e::pages::{FormField, LoginPage, LoginSelectors, LoginSubmission};
use authflow_e2e::{E2eError, SuiteConfig};
use common::FakePage;

fn login_form(page: &FakePage, s: &LoginSelectors) {
    let (username, password, submit) = (s.username.clone(), s.password.clone(), s.submit.clone());
    page.on("goto:/", Duration::ZERO, move |state| {
        state.navigate("/login");
        state.show(&username);
        state.show(&password);
        state.show(&submit);
    });
}

/// Clicking submit lands on the dashboard `delay` later
fn redirects_after(page: &FakePage, s: &LoginSelectors, delay: Duration) {
    let (submit, toast) = (s.submit.clone(), s.success_toast.clone());
    page.on(&format!("click:{}", s.submit), delay, move |state| {
        state.navigate("/dashboard");
        state.hide(&submit);
        state.show_text(&toast, "Login successful");
    });
}

fn config_with_retries(max_retries: u32) -> SuiteConfig {
    let mut config = SuiteConfig::default();
    config.retry.max_retries = max_retries;
    config
}

#[tokio::test(start_paused = true)]
async fn redirect_confirms_with_a_single_click() {
    let config = SuiteConfig::default();
    let s = &config.login_selectors;
    let page = FakePage::new();
    login_form(&page, s);
    redirects_after(&page, s, Duration::from_millis(500));

    let login = LoginPage::new(&page, &config);
    login.goto().await.unwrap();
    let submission = login.login_with_credentials("superadmin", "secret", false).await.unwrap();

    assert_eq!(submission, LoginSubmission::Confirmed);
    assert_eq!(page.count(&format!("click:{}", s.submit)), 1);
    assert!(page.url_now().ends_with("/dashboard"));

    let toast = login.popup_success_text().await.unwrap();
    assert_eq!(toast.as_deref(), Some("Login successful"));
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_report_the_attempt_count() {
    let config = config_with_retries(2);
    let s = &config.login_selectors;
    let page = FakePage::new();
    login_form(&page, s);

    let login = LoginPage::new(&page, &config);
    login.goto().await.unwrap();
    let err = login.login_with_credentials("superadmin", "secret", false).await.unwrap_err();

    assert!(matches!(err, E2eError::LoginNotConfirmed { attempts: 2 }));
    assert!(err.to_string().contains("2 attempts"));
    assert_eq!(page.count(&format!("click:{}", s.submit)), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_redirect_is_caught_by_the_second_attempt() {
    let config = SuiteConfig::default();
    let s = &config.login_selectors;
    let page = FakePage::new();
    login_form(&page, s);
    // Longer than one race window
    redirects_after(&page, s, Duration::from_secs(7));

    let login = LoginPage::new(&page, &config);
    login.goto().await.unwrap();
    let submission = login.login_with_credentials("superadmin", "secret", false).await.unwrap();

    assert_eq!(submission, LoginSubmission::Confirmed);
    assert_eq!(page.count(&format!("click:{}", s.submit)), 2);
}

#[tokio::test(start_paused = true)]
async fn toast_without_redirect_is_retried_then_fails() {
    let config = config_with_retries(3);
    let s = &config.login_selectors;
    let page = FakePage::new();
    login_form(&page, s);
    let toast = s.success_toast.clone();
    page.on(&format!("click:{}", s.submit), Duration::from_millis(200), move |state| {
        state.show_text(&toast, "Login successful");
    });

    let sink = RecordingSink::new();
    let login = LoginPage::new(&page, &config).with_sink(&sink);
    login.goto().await.unwrap();
    let err = login.login_with_credentials("superadmin", "secret", false).await.unwrap_err();

    assert!(matches!(err, E2eError::LoginNotConfirmed { attempts: 3 }));
    assert_eq!(page.count(&format!("click:{}", s.submit)), 3);

    let events = sink.events();
    let without_redirect = events
        .iter()
        .filter(|e| matches!(e, ConfirmationEvent::SignalWithoutRedirect { .. }))
        .count();
    assert_eq!(without_redirect, 3);
    assert_eq!(events.last(), Some(&ConfirmationEvent::Exhausted { attempts: 3 }));
}

#[tokio::test(start_paused = true)]
async fn disabled_button_is_reported_without_clicking() {
    let config = SuiteConfig::default();
    let s = &config.login_selectors;
    let page = FakePage::new();
    login_form(&page, s);
    let submit = s.submit.clone();
    page.with_state(|state| state.set_disabled(&submit, true));

    let login = LoginPage::new(&page, &config);
    login.goto().await.unwrap();
    let submission = login.login_with_credentials("", "", false).await.unwrap();

    assert_eq!(submission, LoginSubmission::ButtonDisabled);
    assert_eq!(page.count(&format!("click:{}", s.submit)), 0);
}

#[tokio::test(start_paused = true)]
async fn negative_login_clicks_once_and_reads_the_error() {
    let config = SuiteConfig::default();
    let s = &config.login_selectors;
    let page = FakePage::new();
    login_form(&page, s);
    let error_toast = s.error_toast.clone();
    page.on(&format!("click:{}", s.submit), Duration::from_millis(300), move |state| {
        state.show_text(&error_toast, "Invalid username or password");
    });

    let login = LoginPage::new(&page, &config);
    login.goto().await.unwrap();
    let submission = login.login_with_credentials("nobody", "wrong", true).await.unwrap();
    assert_eq!(submission, LoginSubmission::Submitted);

    let text = login.popup_error_text().await.unwrap();
    assert_eq!(text.as_deref(), Some("Invalid username or password"));
    assert_eq!(page.count(&format!("click:{}", s.submit)), 1);
}

#[tokio::test(start_paused = true)]
async fn error_text_falls_back_to_form_messages() {
    let config = SuiteConfig::default();
    let s = &config.login_selectors;
    let page = FakePage::new();
    let form_errors = s.form_errors.clone();
    page.with_state(|state| {
        state.lists.insert(
            form_errors,
            vec!["Username is required".to_string(), "Password is required".to_string()],
        );
    });

    let login = LoginPage::new(&page, &config);
    let text = login.popup_error_text().await.unwrap();
    assert_eq!(text.as_deref(), Some("Username is required, Password is required"));
    assert_eq!(login.popup_success_text().await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn empty_field_passes_on_validation_message() {
    let config = SuiteConfig::default();
    let s = &config.login_selectors;
    let page = FakePage::new();
    login_form(&page, s);
    let (username, error) = (s.username.clone(), s.username_error.clone());
    page.on(&format!("fill:{}", s.username), Duration::ZERO, move |state| {
        if state.value(&username).is_empty() {
            state.show_text(&error, "Username is required");
        }
    });

    let login = LoginPage::new(&page, &config);
    login.goto().await.unwrap();
    let valid = login
        .fill_and_validate_empty_field(FormField::Username, "superadmin", "secret")
        .await
        .unwrap();
    assert!(valid);
}

#[tokio::test(start_paused = true)]
async fn empty_field_falls_back_to_disabled_button() {
    let config = SuiteConfig::default();
    let s = &config.login_selectors;
    let page = FakePage::new();
    login_form(&page, s);
    let (password, submit) = (s.password.clone(), s.submit.clone());
    page.on(&format!("fill:{}", s.password), Duration::ZERO, move |state| {
        let empty = state.value(&password).is_empty();
        state.set_disabled(&submit, empty);
    });

    let login = LoginPage::new(&page, &config);
    login.goto().await.unwrap();
    assert!(login
        .fill_and_validate_empty_field(FormField::Password, "superadmin", "secret")
        .await
        .unwrap());
}

#[tokio::test(start_paused = true)]
async fn empty_field_fails_when_nothing_rejects_it() {
    let config = SuiteConfig::default();
    let page = FakePage::new();
    login_form(&page, &config.login_selectors);

    let login = LoginPage::new(&page, &config);
    login.goto().await.unwrap();
    assert!(!login
        .fill_and_validate_empty_field(FormField::Password, "superadmin", "secret")
        .await
        .unwrap());
}

#[tokio::test(start_paused = true)]
async fn goto_gives_up_after_max_retries() {
    let config = config_with_retries(2);
    // Form never renders
    let page = FakePage::new();

    let err = LoginPage::new(&page, &config).goto().await.unwrap_err();
    assert!(matches!(err, E2eError::PageLoad { attempts: 2, .. }));
    assert_eq!(page.count("goto:/"), 2);
}

#[tokio::test(start_paused = true)]
async fn retry_does_not_click_once_the_form_has_gone() {
    let config = SuiteConfig::default();
    let s = &config.login_selectors;
    let page = FakePage::new();
    login_form(&page, s);

    // Interstitial page outlives the first race window, dashboard lands in the second
    let submit = s.submit.clone();
    page.on(&format!("click:{}", s.submit), Duration::from_secs(3), move |state| {
        state.hide(&submit);
        state.navigate("/loading");
    });
    page.on(&format!("click:{}", s.submit), Duration::from_secs(8), |state| {
        state.navigate("/dashboard");
    });

    let sink = RecordingSink::new();
    let login = LoginPage::new(&page, &config).with_sink(&sink);
    login.goto().await.unwrap();
    let submission = login.login_with_credentials("superadmin", "secret", false).await.unwrap();

    assert_eq!(submission, LoginSubmission::Confirmed);
    assert_eq!(page.count(&format!("click:{}", s.submit)), 1);
    assert!(page.url_now().ends_with("/dashboard"));

    let events = sink.events();
    assert!(!events.iter().any(|e| matches!(e, ConfirmationEvent::AttemptFailed { .. })));
    assert_eq!(events.last(), Some(&ConfirmationEvent::Confirmed { attempts: 2 }));
}
