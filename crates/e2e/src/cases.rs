//! Declarative YAML test cases
//!
//! A case file holds either a single case or a list of them. Each case names
//! the flow it drives and the outcome it expects; the runner maps flows onto
//! page objects.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::pages::FormField;

/// One test case parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    /// Unique id, e.g. `TC-LOGIN-001`
    pub id: String,

    /// Human-readable scenario
    #[serde(default)]
    pub scenario: String,

    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub severity: Severity,

    /// Feature story this case belongs to
    #[serde(default)]
    pub story: Option<String>,

    pub flow: CaseFlow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Blocker,
    Critical,
    #[default]
    Normal,
    Minor,
    Trivial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Expected result of a login attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LoginExpectation {
    /// Lands on the dashboard; `message` is matched against the toast
    Success { message: String },
    /// Stays on the login page showing `message`
    Rejected { message: String },
}

/// The flow a case drives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CaseFlow {
    /// Submit the login form
    Login {
        credentials: Credentials,
        expect: LoginExpectation,
    },

    /// Leave one login field empty
    EmptyField {
        credentials: Credentials,
        field: FormField,
    },

    /// Request a reset link; a missing email uses a random unregistered one
    ResetRequest {
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        expect_error: bool,
        #[serde(default)]
        message: String,
    },

    /// Submit must stay disabled with an empty email
    EmptyEmail,

    /// Browser validation of a malformed email
    EmailFormat { email: String },

    /// "Back to Login" returns to the login form
    BackToLogin,

    /// Full reset: request, receive the email, follow its link
    ResetLink {
        #[serde(default)]
        email_address: Option<String>,
        #[serde(default)]
        inbox_id: Option<String>,
    },
}

impl CaseFlow {
    /// Whether this flow needs the email-testing API
    pub fn needs_mailbox(&self) -> bool {
        matches!(self, CaseFlow::ResetLink { .. })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CaseDocument {
    Many(Vec<TestCase>),
    One(Box<TestCase>),
}

impl TestCase {
    /// Parse one or more cases from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Vec<Self>> {
        let doc: CaseDocument = serde_yaml::from_str(yaml).map_err(E2eError::from)?;
        Ok(match doc {
            CaseDocument::Many(cases) => cases,
            CaseDocument::One(case) => vec![*case],
        })
    }

    /// Parse cases from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Vec<Self>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::CaseParse(format!("{}: {}", path.display(), e)))
    }

    /// Load every case under a directory, sorted by path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut cases = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let loaded = Self::from_file(entry.path())?;
            debug!("Loaded {} case(s) from {}", loaded.len(), entry.path().display());
            cases.extend(loaded);
        }

        Ok(cases)
    }

    /// Filter cases by tag
    pub fn filter_by_tag<'a>(cases: &'a [Self], tag: &str) -> Vec<&'a Self> {
        cases.iter().filter(|c| c.tags.iter().any(|t| t == tag)).collect()
    }

    /// Look a case up by id
    pub fn find<'a>(cases: &'a [Self], id: &str) -> E2eResult<&'a Self> {
        cases
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| E2eError::CaseNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_login_case() {
        let yaml = r#"
id: TC-LOGIN-001
scenario: Login with valid credentials
tags: [smoke, login]
severity: critical
story: Login
flow:
  action: login
  credentials:
    username: admin
    password: secret
  expect:
    result: success
    message: Login successful
"#;
        let cases = TestCase::from_yaml(yaml).unwrap();
        assert_eq!(cases.len(), 1);
        let case = &cases[0];
        assert_eq!(case.severity, Severity::Critical);
        assert_eq!(
            case.flow,
            CaseFlow::Login {
                credentials: Credentials { username: "admin".into(), password: "secret".into() },
                expect: LoginExpectation::Success { message: "Login successful".into() },
            }
        );
    }

    #[test]
    fn parse_case_list_with_defaults() {
        let yaml = r#"
- id: TC-FP-002
  flow:
    action: empty_email
- id: TC-FP-003
  tags: [negative]
  flow:
    action: reset_request
    expect_error: true
    message: data not found
- id: TC-LOGIN-004
  flow:
    action: empty_field
    credentials: { username: admin }
    field: password
"#;
        let cases = TestCase::from_yaml(yaml).unwrap();
        assert_eq!(cases.len(), 3);
        assert_eq!(cases[0].severity, Severity::Normal);
        assert!(cases[0].tags.is_empty());
        assert_eq!(
            cases[1].flow,
            CaseFlow::ResetRequest { email: None, expect_error: true, message: "data not found".into() }
        );
        assert!(matches!(
            &cases[2].flow,
            CaseFlow::EmptyField { field: FormField::Password, credentials } if credentials.password.is_empty()
        ));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let yaml = "id: x\nflow:\n  action: teleport\n";
        assert!(TestCase::from_yaml(yaml).is_err());
    }

    #[test]
    fn filter_and_find() {
        let yaml = r#"
- id: a
  tags: [smoke]
  flow: { action: back_to_login }
- id: b
  tags: [mail]
  flow: { action: reset_link }
"#;
        let cases = TestCase::from_yaml(yaml).unwrap();
        let smoke = TestCase::filter_by_tag(&cases, "smoke");
        assert_eq!(smoke.len(), 1);
        assert_eq!(smoke[0].id, "a");

        assert!(TestCase::find(&cases, "b").unwrap().flow.needs_mailbox());
        assert!(matches!(TestCase::find(&cases, "zzz"), Err(E2eError::CaseNotFound(_))));
    }

    #[test]
    fn load_all_walks_nested_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("auth");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("a.yaml"), "id: one\nflow: { action: empty_email }\n").unwrap();
        std::fs::write(
            nested.join("b.yml"),
            "- id: two\n  flow: { action: back_to_login }\n- id: three\n  flow: { action: empty_email }\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not yaml").unwrap();

        let cases = TestCase::load_all(dir.path()).unwrap();
        let ids: Vec<&str> = cases.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["one", "two", "three"]);
    }

    #[test]
    fn bad_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.yaml"), "id: [").unwrap();
        let err = TestCase::load_all(dir.path()).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }
}
