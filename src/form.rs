//! Session form
//!
//! Collects a display name and email and turns them into a [`Session`]. Only
//! the checks a browser form performs natively are applied: both fields are
//! required and the email must be a syntactically valid address.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::FormError;
use crate::types::Session;

/// WHATWG "valid e-mail address" production
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("invalid email pattern")
});

/// Check an email address the way an `<input type="email">` does
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Form state before submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionForm {
    name: String,
    email: String,
}

impl SessionForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Validate the fields and build a session
    pub fn submit(&self) -> Result<Session, FormError> {
        if self.name.is_empty() {
            return Err(FormError::MissingName);
        }

        // Email inputs strip surrounding whitespace before validating
        let email = self.email.trim();
        if email.is_empty() {
            return Err(FormError::MissingEmail);
        }
        if !is_valid_email(email) {
            return Err(FormError::InvalidEmail(email.to_string()));
        }

        Ok(Session::new(self.name.clone(), email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_builds_session() {
        let form = SessionForm::with_values("Ana", "a@x.com");
        let session = form.submit().unwrap();

        assert_eq!(session, Session::new("Ana", "a@x.com"));
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            SessionForm::with_values("", "a@x.com").submit(),
            Err(FormError::MissingName)
        );
        assert_eq!(
            SessionForm::with_values("Ana", "").submit(),
            Err(FormError::MissingEmail)
        );
        assert_eq!(
            SessionForm::with_values("Ana", "   ").submit(),
            Err(FormError::MissingEmail)
        );
    }

    #[test]
    fn test_email_whitespace_is_trimmed() {
        let session = SessionForm::with_values("Ana", "  a@x.com ").submit().unwrap();
        assert_eq!(session.email, "a@x.com");
    }

    #[test]
    fn test_name_is_kept_verbatim() {
        let session = SessionForm::with_values(" Ana María ", "a@x.com").submit().unwrap();
        assert_eq!(session.name, " Ana María ");
    }

    #[test]
    fn test_email_pattern_compiles() {
        assert!(EMAIL_PATTERN.as_str().starts_with('^'));
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(is_valid_email("user@localhost"));

        assert!(!is_valid_email("plainaddress"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("a@"));
        assert!(!is_valid_email("a@-x.com"));
        assert!(!is_valid_email("a b@x.com"));
    }

    #[test]
    fn test_invalid_email_is_reported() {
        let mut form = SessionForm::new();
        form.set_name("Ana");
        form.set_email("not-an-email");

        assert_eq!(
            form.submit(),
            Err(FormError::InvalidEmail("not-an-email".to_string()))
        );
    }
}
