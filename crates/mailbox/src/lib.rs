//! Email-testing support for the AuthFlow suite
//!
//! Wraps the MailSlurp HTTP API (disposable inboxes, wait-for-latest-email)
//! and extracts password-reset links from received message bodies.

pub mod client;
pub mod error;
pub mod link;

pub use client::{Email, Inbox, MailSlurpClient};
pub use error::{MailboxError, MailboxResult};
pub use link::extract_reset_password_link;
