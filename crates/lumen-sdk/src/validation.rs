//! Per-field form validation results

use crate::derive::parse_amount_strict;
use crate::error::{Result, SdkError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field path, e.g. `items[2].amount` or `tax_rate`
    pub field: String,
    pub message: String,
}

/// Errors collected while validating a form, in field order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&FieldError> {
        self.0.iter().find(|e| e.field == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// `Ok` when empty, otherwise a validation error for the first field
    pub fn into_result(self) -> Result<()> {
        match self.0.into_iter().next() {
            None => Ok(()),
            Some(first) => Err(SdkError::Validation {
                field: first.field,
                message: first.message,
            }),
        }
    }

    /// Require a well-formed, non-negative amount
    pub(crate) fn check_amount(&mut self, field: impl Into<String>, raw: &str) {
        match parse_amount_strict(raw) {
            None if raw.trim().is_empty() => self.push(field, "amount is required"),
            None => self.push(field, format!("{:?} is not a valid amount", raw)),
            Some(v) if v.is_sign_negative() && !v.is_zero() => {
                self.push(field, "amount cannot be negative")
            }
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_checks() {
        let mut errors = FieldErrors::new();
        errors.check_amount("a", "₹1,200.00");
        errors.check_amount("b", "");
        errors.check_amount("c", "12.3.4");
        errors.check_amount("d", "-5");
        assert_eq!(errors.len(), 3);
        assert!(errors.get("a").is_none());
        assert_eq!(errors.get("b").unwrap().message, "amount is required");
    }

    #[test]
    fn test_into_result_reports_first_field() {
        let mut errors = FieldErrors::new();
        assert!(errors.clone().into_result().is_ok());
        errors.push("tax_rate", "not a number");
        errors.push("items[0].amount", "not a number");
        match errors.into_result() {
            Err(SdkError::Validation { field, .. }) => assert_eq!(field, "tax_rate"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
