//! Page objects for the authentication screens

pub mod forgot_password;
pub mod login;

pub use forgot_password::{EmailValidation, ForgotPasswordPage, ForgotPasswordSelectors, ResetOutcome};
pub use login::{FormField, LoginConfirmationProbe, LoginPage, LoginSelectors, LoginSubmission};

/// Password as it may appear in logs
pub(crate) fn mask(secret: &str) -> &'static str {
    if secret.is_empty() {
        "[empty]"
    } else {
        "******"
    }
}
