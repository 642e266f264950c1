//! Payload field rules.

use regex::Regex;

use super::{code::CODE_LENGTH, AuthError};

pub const PASSWORD_MIN_LEN: usize = 12;
pub const PASSWORD_MAX_LEN: usize = 128;
pub const EMAIL_MAX_LEN: usize = 254;
const PASSWORD_SYMBOLS: &[char] = &['!', '£', '$', '%', '&', '?', '^', '*', '@', '#'];

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// # Errors
/// `Validation` unless the name is 3-16 alphanumerics starting with a letter.
pub fn username(value: &str) -> Result<(), AuthError> {
    let valid = Regex::new(r"^[A-Za-z][A-Za-z0-9]{2,15}$").is_ok_and(|regex| regex.is_match(value));
    if valid {
        Ok(())
    } else {
        Err(AuthError::Validation(
            "Username must be 3-16 alphanumeric characters and not start with a digit".into(),
        ))
    }
}

/// Expects already-normalized input.
///
/// # Errors
/// `Validation` on a malformed or overlong address.
pub fn email(value: &str) -> Result<(), AuthError> {
    let valid = value.len() <= EMAIL_MAX_LEN
        && Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(value));
    if valid {
        Ok(())
    } else {
        Err(AuthError::Validation("Invalid email".into()))
    }
}

/// # Errors
/// `Validation` when the length is out of range or no symbol is present.
pub fn password(value: &str) -> Result<(), AuthError> {
    let len = value.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err(AuthError::Validation(format!(
            "Password must be between {PASSWORD_MIN_LEN} and {PASSWORD_MAX_LEN} characters"
        )));
    }
    if !value.contains(PASSWORD_SYMBOLS) {
        return Err(AuthError::Validation(
            "Password must contain at least one of !£$%&?^*@#".into(),
        ));
    }
    Ok(())
}

/// Expects already-normalized input.
///
/// # Errors
/// `Validation` unless the code is exactly six ASCII characters.
pub fn code(value: &str) -> Result<(), AuthError> {
    if value.len() == CODE_LENGTH && value.is_ascii() {
        Ok(())
    } else {
        Err(AuthError::Validation(format!(
            "Code must be {CODE_LENGTH} characters"
        )))
    }
}
