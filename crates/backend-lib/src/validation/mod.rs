// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Request validation module.

use std::sync::LazyLock;

use labpass_common::{Course, KEYNOTE, TALK_ENTRY, TALK_LAB};
use regex::Regex;
use thiserror::Error;

use crate::error::AppError;

// Common validation constants
const MAX_ID_NUM_LENGTH: usize = 16;
const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 64;
const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_SUBJECT_LENGTH: usize = 255;

// Regex patterns for validation
static LAB_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{2,32}$").expect("lab name pattern"));
static CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{6}$").expect("code pattern"));
static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("username pattern"));

/// Possible validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid lab name: {0}")]
    InvalidLabName(String),

    #[error("Lab name is reserved: {0}")]
    ReservedLabName(String),

    #[error("ID Numbers do not match.")]
    IdNumberMismatch,

    #[error("Invalid ID Number.")]
    InvalidIdNumber,

    #[error("Please select a course.")]
    MissingCourse,

    #[error("Invalid code: {0}")]
    InvalidCode(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Invalid subject")]
    InvalidSubject,
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::ReservedLabName(name) => AppError::ReservedLab(name),
            other => AppError::InvalidInput(other.to_string()),
        }
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Canonical (trimmed, uppercased) form of a lab identifier
pub fn canonical_lab_name(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Validate a lab identifier for the catalog and return its canonical form
pub fn validate_lab_name(raw: &str) -> ValidationResult<String> {
    let name = canonical_lab_name(raw);
    if name == KEYNOTE || name == TALK_LAB || name == TALK_ENTRY.to_uppercase() {
        return Err(ValidationError::ReservedLabName(name));
    }
    if !LAB_NAME_REGEX.is_match(&name) {
        return Err(ValidationError::InvalidLabName(
            "Lab name must be 2 to 32 letters or digits".to_string(),
        ));
    }
    Ok(name)
}

/// Validate the two ID number fields of the registration form
pub fn validate_id_number<'a>(id_num: &'a str, confirm: &str) -> ValidationResult<&'a str> {
    if id_num != confirm {
        return Err(ValidationError::IdNumberMismatch);
    }
    if id_num.is_empty()
        || id_num.len() > MAX_ID_NUM_LENGTH
        || !id_num.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ValidationError::InvalidIdNumber);
    }
    Ok(id_num)
}

pub fn validate_course(course: Course) -> ValidationResult<Course> {
    if course == Course::Unset {
        return Err(ValidationError::MissingCourse);
    }
    Ok(course)
}

/// A submitted code must be exactly six digits, with nothing around them
pub fn validate_code(code: &str) -> ValidationResult<&str> {
    if !CODE_REGEX.is_match(code) {
        return Err(ValidationError::InvalidCode(
            "Code must be six digits".to_string(),
        ));
    }
    Ok(code)
}

pub fn validate_username(username: &str) -> ValidationResult<&str> {
    if username.len() < MIN_USERNAME_LENGTH || username.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::InvalidUsername(format!(
            "Username must be between {MIN_USERNAME_LENGTH} and {MAX_USERNAME_LENGTH} characters"
        )));
    }
    if !USERNAME_REGEX.is_match(username) {
        return Err(ValidationError::InvalidUsername(
            "Username may only contain letters, digits, dots, dashes and underscores".to_string(),
        ));
    }
    Ok(username)
}

pub fn validate_password(password: &str) -> ValidationResult<&str> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(password)
}

pub fn validate_subject(subject: &str) -> ValidationResult<&str> {
    if subject.trim().is_empty() || subject.len() > MAX_SUBJECT_LENGTH {
        return Err(ValidationError::InvalidSubject);
    }
    Ok(subject)
}
