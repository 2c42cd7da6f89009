use std::fmt;

use crate::domain::GuestInfo;
use crate::error::AppError;

pub const GUEST_NAME_MAX_LEN: usize = 100;
pub const GUEST_EMAIL_MAX_LEN: usize = 254;
pub const GUEST_PHONE_MAX_LEN: usize = 20;
pub const SPECIAL_REQUESTS_MAX_LEN: usize = 1000;
pub const GATEWAY_REF_MAX_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::Validation(e.to_string())
    }
}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_email(field: &'static str, value: &str) -> ValidationResult {
    validate_max_len(field, value, GUEST_EMAIL_MAX_LEN)?;
    let valid = value.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !value.chars().any(char::is_whitespace)
    });
    if !valid {
        return Err(ValidationError::new(field, "must be a valid email address"));
    }

    Ok(())
}

pub fn validate_phone(field: &'static str, value: &str) -> ValidationResult {
    validate_max_len(field, value, GUEST_PHONE_MAX_LEN)?;
    let digits = value.chars().filter(char::is_ascii_digit).count();
    let allowed = value
        .chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, '+' | '-' | ' ' | '(' | ')'));
    if !allowed || digits < 7 {
        return Err(ValidationError::new(field, "must be a valid phone number"));
    }

    Ok(())
}

/// Gateway order/payment ids and signatures: non-empty, short, printable ASCII.
pub fn validate_gateway_ref(field: &'static str, value: &str) -> ValidationResult {
    validate_required(field, value)?;
    validate_max_len(field, value, GATEWAY_REF_MAX_LEN)?;
    if !value.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return Err(ValidationError::new(
            field,
            "must contain only letters, digits and underscores",
        ));
    }

    Ok(())
}

/// Trims guest contact fields, drops empty ones and checks the rest.
pub fn clean_guest_info(guest: GuestInfo) -> Result<GuestInfo, ValidationError> {
    fn clean(value: Option<String>) -> Option<String> {
        value.map(|v| sanitize_string(&v)).filter(|v| !v.is_empty())
    }

    let guest = GuestInfo {
        guest_name: clean(guest.guest_name),
        guest_email: clean(guest.guest_email),
        guest_phone: clean(guest.guest_phone),
        special_requests: guest
            .special_requests
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
    };

    if let Some(name) = &guest.guest_name {
        validate_max_len("guest_name", name, GUEST_NAME_MAX_LEN)?;
    }
    if let Some(email) = &guest.guest_email {
        validate_email("guest_email", email)?;
    }
    if let Some(phone) = &guest.guest_phone {
        validate_phone("guest_phone", phone)?;
    }
    if let Some(requests) = &guest.special_requests {
        validate_max_len("special_requests", requests, SPECIAL_REQUESTS_MAX_LEN)?;
    }

    Ok(guest)
}
