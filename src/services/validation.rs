//! Input validation helpers shared by the resource services

use regex::Regex;

use crate::error::{AppError, AppResult};

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$";
const PHONE_PATTERN: &str = r"^\+?[0-9][0-9 \-]{5,19}$";

/// Minimum length of a chosen password
pub const MIN_PASSWORD_LEN: usize = 6;

fn matches(pattern: &str, value: &str) -> AppResult<bool> {
    let regex = Regex::new(pattern)
        .map_err(|e| AppError::internal_error(&format!("Invalid validation pattern: {}", e)))?;
    Ok(regex.is_match(value))
}

/// Trimmed, lowercased email, or a validation error
pub fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    if !matches(EMAIL_PATTERN, &email)? {
        return Err(AppError::Validation(format!("Invalid email address: '{}'", email)));
    }
    Ok(email)
}

pub fn normalize_phone(phone: &str) -> AppResult<String> {
    let phone = phone.trim().to_string();
    if !matches(PHONE_PATTERN, &phone)? {
        return Err(AppError::Validation(format!("Invalid phone number: '{}'", phone)));
    }
    Ok(phone)
}

/// Trimmed value; empty input is rejected with `"{field} is required"`
pub fn required(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert_eq!(normalize_email(" Pastor@Church.org ").unwrap(), "pastor@church.org");
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("a@b").is_err());
    }

    #[test]
    fn test_phone() {
        assert_eq!(normalize_phone(" +250 788 123 456").unwrap(), "+250 788 123 456");
        assert!(normalize_phone("12").is_err());
        assert!(normalize_phone("call me").is_err());
    }

    #[test]
    fn test_required_and_password() {
        assert!(required("Name", "   ").is_err());
        assert_eq!(required("Name", " Ruth ").unwrap(), "Ruth");
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }
}
