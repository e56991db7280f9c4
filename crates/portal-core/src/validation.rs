//! Minimal form checks run before any request leaves the portal.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub fn validate_login(email: &str, password: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::new("Email is required"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {}
        _ => return Err(ValidationError::new("Invalid email format")),
    }
    if password.is_empty() {
        return Err(ValidationError::new("Password is required"));
    }
    Ok(())
}

/// Parses a required, non-negative amount typed into a form field.
pub fn parse_amount(field: &str, raw: &str) -> Result<f64, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::new(format!("{field} is required")));
    }
    match raw.replace(',', "").parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(ValidationError::new(format!("{field} must be a number"))),
    }
}

/// Like [`parse_amount`] but an empty field means "not given".
pub fn parse_optional_amount(field: &str, raw: &str) -> Result<Option<f64>, ValidationError> {
    if raw.trim().is_empty() {
        Ok(None)
    } else {
        parse_amount(field, raw).map(Some)
    }
}

pub fn parse_days(field: &str, raw: &str) -> Result<f64, ValidationError> {
    parse_amount(field, raw)
}

pub fn parse_id(field: &str, raw: &str) -> Result<i64, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::new(format!("{field} is required")));
    }
    raw.parse::<i64>()
        .map_err(|_| ValidationError::new(format!("{field} must be a number")))
}

pub fn require(field: &str, raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        Err(ValidationError::new(format!("{field} is required")))
    } else {
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_requires_an_at_sign() {
        assert_eq!(
            validate_login("ada.example.com", "secret").unwrap_err().message,
            "Invalid email format"
        );
        assert_eq!(
            validate_login("@example.com", "secret").unwrap_err().message,
            "Invalid email format"
        );
        assert_eq!(validate_login("", "secret").unwrap_err().message, "Email is required");
        assert_eq!(
            validate_login("ada@example.com", "").unwrap_err().message,
            "Password is required"
        );
        assert!(validate_login(" ada@example.com ", "secret").is_ok());
    }

    #[test]
    fn amounts_must_be_numeric() {
        assert_eq!(parse_amount("Daily rate", "850").unwrap(), 850.0);
        assert_eq!(parse_amount("Daily rate", "1,250.5").unwrap(), 1250.5);
        assert_eq!(
            parse_amount("Daily rate", "abc").unwrap_err().message,
            "Daily rate must be a number"
        );
        assert_eq!(
            parse_amount("Daily rate", "-3").unwrap_err().message,
            "Daily rate must be a number"
        );
        assert_eq!(
            parse_amount("Daily rate", "  ").unwrap_err().message,
            "Daily rate is required"
        );
        assert_eq!(parse_optional_amount("Daily rate", "").unwrap(), None);
    }

    #[test]
    fn ids_and_required_text() {
        assert_eq!(parse_id("Specialist", "42").unwrap(), 42);
        assert!(parse_id("Specialist", "x").is_err());
        assert_eq!(require("Reason", "  sick leave ").unwrap(), "sick leave");
        assert!(require("Reason", "").is_err());
    }
}
