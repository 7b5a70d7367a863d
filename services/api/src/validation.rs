//! Account field checks

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::error::ApiError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("{field} must be between {min} and {max} characters long")]
    Length {
        field: &'static str,
        min: usize,
        max: usize,
    },

    #[error("{field} has an invalid format")]
    Format { field: &'static str },

    #[error("password must mix upper and lower case letters, digits and symbols")]
    WeakPassword,
}

impl From<FieldError> for ApiError {
    fn from(err: FieldError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

static USERNAME: OnceLock<Option<Regex>> = OnceLock::new();
static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
static PHONE: OnceLock<Option<Regex>> = OnceLock::new();

fn matches(cell: &'static OnceLock<Option<Regex>>, pattern: &str, value: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(value))
}

fn length(field: &'static str, value: &str, min: usize, max: usize) -> Result<(), FieldError> {
    let len = value.chars().count();
    if len == 0 {
        return Err(FieldError::Missing { field });
    }
    if len < min || len > max {
        return Err(FieldError::Length { field, min, max });
    }
    Ok(())
}

/// 3 to 32 characters of `[A-Za-z0-9_]`
pub fn validate_username(username: &str) -> Result<(), FieldError> {
    length("username", username, 3, 32)?;
    if !matches(&USERNAME, r"^[A-Za-z0-9_]+$", username) {
        return Err(FieldError::Format { field: "username" });
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), FieldError> {
    length("email", email, 3, 254)?;
    if !matches(&EMAIL, r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]+$", email) {
        return Err(FieldError::Format { field: "email" });
    }
    Ok(())
}

/// Optional leading `+`, then 10 to 15 digits
pub fn validate_phone(phone: &str) -> Result<(), FieldError> {
    if !matches(&PHONE, r"^\+?[0-9]{10,15}$", phone) {
        return Err(FieldError::Format { field: "phone" });
    }
    Ok(())
}

/// 8 to 128 characters with at least one of each class
pub fn validate_password(password: &str) -> Result<(), FieldError> {
    length("password", password, 8, 128)?;

    let classes: [fn(char) -> bool; 4] = [
        |c| c.is_ascii_uppercase(),
        |c| c.is_ascii_lowercase(),
        |c| c.is_ascii_digit(),
        |c| !c.is_alphanumeric(),
    ];
    if classes.iter().all(|class| password.chars().any(class)) {
        Ok(())
    } else {
        Err(FieldError::WeakPassword)
    }
}
