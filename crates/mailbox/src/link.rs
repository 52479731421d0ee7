//! Reset-link extraction from email bodies

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

static RESET_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(https?://[^\s"']+(?:reset[-_]password|forgot[-_]password)[^\s"']*)"#)
        .expect("reset link pattern is valid")
});

/// Find the first password-reset URL in an email body.
///
/// Matches `http(s)` URLs whose path contains `reset-password`,
/// `reset_password`, `forgot-password` or `forgot_password` in any case. The
/// URL ends at whitespace or a quote, so links inside `href="..."` attributes
/// come out without the closing quote.
pub fn extract_reset_password_link(body: &str) -> Option<String> {
    match RESET_LINK.captures(body).and_then(|c| c.get(1)) {
        Some(m) => {
            info!("Reset password link found: {}", m.as_str());
            Some(m.as_str().to_string())
        }
        None => {
            warn!("No reset password link in email body");
            None
        }
    }
}
