//! Request-scoped validation error accumulator.
//!
//! Handlers receive a [`FormErrors`] through its extractor impl, already
//! seeded with any errors carried over a redirect, add their own entries,
//! and hand the bag back inside the rendered view or attach it to a
//! redirect for the next hop.

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use validator::ValidationErrors;

/// Key of the form-level summary entry.
pub const SUMMARY: &str = "";

/// Mapping from field name to an ordered list of messages.
///
/// The empty field name holds form-level (summary) errors.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    /// Attach a message to a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Attach a form-level message.
    pub fn add_summary(&mut self, message: impl Into<String>) {
        self.add(SUMMARY, message);
    }

    /// Attach a message both to a field and to the summary.
    pub fn add_summary_for(&mut self, field: &str, message: &str) {
        self.add_summary(message);
        self.add(field, message);
    }

    /// Additive union: entries for an already-present field are
    /// appended, never replaced.
    pub fn merge(&mut self, other: FormErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// Messages attached to a field.
    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut bag = FormErrors::new();
        for (field, issues) in errors.field_errors() {
            for issue in issues.iter() {
                bag.add(field.to_string(), issue.to_string());
            }
        }
        bag
    }
}

impl<S> FromRequestParts<S> for FormErrors
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<FormErrors>().cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_add_and_field_order() {
        let mut errors = FormErrors::new();
        errors.add("email", "first");
        errors.add("email", "second");

        assert_eq!(errors.field("email"), ["first", "second"]);
        assert!(errors.field("password").is_empty());
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_summary_for_field_adds_both() {
        let mut errors = FormErrors::new();
        errors.add_summary_for("password", "Wrong password.");

        assert_eq!(errors.field(SUMMARY), ["Wrong password."]);
        assert_eq!(errors.field("password"), ["Wrong password."]);
    }

    #[test]
    fn test_merge_is_additive() {
        let mut left = FormErrors::new();
        left.add("email", "bad");

        let mut right = FormErrors::new();
        right.add("email", "worse");
        right.add("password", "short");

        left.merge(right);
        assert_eq!(left.field("email"), ["bad", "worse"]);
        assert_eq!(left.field("password"), ["short"]);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut errors = FormErrors::new();
        errors.add("Email", "bad");

        let value = serde_json::to_value(&errors).unwrap();
        assert_eq!(value, serde_json::json!({"Email": ["bad"]}));

        let back: FormErrors = serde_json::from_value(value).unwrap();
        assert_eq!(back, errors);
    }

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 1, message = "Please enter an email address."))]
        email: String,
    }

    #[test]
    fn test_from_validation_errors() {
        let probe = Probe { email: String::new() };
        let errors: FormErrors = probe.validate().unwrap_err().into();

        assert_eq!(errors.field("email"), ["Please enter an email address."]);
    }
}
