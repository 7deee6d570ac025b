//! Input validation for users and bookings.
//!
//! Every write path runs these checks before touching the store. Errors
//! carry the offending field so the API can report field-level details.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::auth::{validate_password, PasswordError};

/// Maximum email length.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length of a first or last name.
pub const MAX_NAME_LENGTH: usize = 50;

/// Maximum booking title length.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum booking description length.
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;

/// Maximum length of a lab key.
pub const MAX_RESOURCE_LENGTH: usize = 64;

/// A single field-level validation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("email is required")]
    EmailEmpty,

    #[error("email must be at most {MAX_EMAIL_LENGTH} characters")]
    EmailTooLong,

    #[error("invalid email format")]
    EmailInvalidFormat,

    #[error("first name is required")]
    FirstNameEmpty,

    #[error("first name must be at most {MAX_NAME_LENGTH} characters")]
    FirstNameTooLong,

    #[error("last name is required")]
    LastNameEmpty,

    #[error("last name must be at most {MAX_NAME_LENGTH} characters")]
    LastNameTooLong,

    #[error("{0}")]
    Password(PasswordError),

    #[error("title is required")]
    TitleEmpty,

    #[error("title must be at most {MAX_TITLE_LENGTH} characters")]
    TitleTooLong,

    #[error("description must be at most {MAX_DESCRIPTION_LENGTH} characters")]
    DescriptionTooLong,

    #[error("resource must not be empty")]
    ResourceEmpty,

    #[error("resource must be at most {MAX_RESOURCE_LENGTH} characters")]
    ResourceTooLong,
}

impl ValidationError {
    /// Name of the request field this error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::EmailEmpty
            | ValidationError::EmailTooLong
            | ValidationError::EmailInvalidFormat => "email",
            ValidationError::FirstNameEmpty | ValidationError::FirstNameTooLong => "firstName",
            ValidationError::LastNameEmpty | ValidationError::LastNameTooLong => "lastName",
            ValidationError::Password(_) => "password",
            ValidationError::TitleEmpty | ValidationError::TitleTooLong => "title",
            ValidationError::DescriptionTooLong => "description",
            ValidationError::ResourceEmpty | ValidationError::ResourceTooLong => "resource",
        }
    }
}

/// All validation failures found for one input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the error of a single check, if any.
    pub fn check(&mut self, result: Result<(), ValidationError>) {
        if let Err(e) = result {
            self.0.push(e);
        }
    }

    /// Whether no error was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the recorded errors.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// Whether an error for the given field was recorded.
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field() == field)
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Group messages by field name.
    pub fn field_map(&self) -> HashMap<String, Vec<String>> {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for e in &self.0 {
            map.entry(e.field().to_string())
                .or_default()
                .push(e.to_string());
        }
        map
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(e: ValidationError) -> Self {
        Self(vec![e])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Validate an email address.
///
/// Basic format check only: one `@`, non-empty local part, dotted domain,
/// no whitespace.
///
/// # Examples
///
/// ```
/// use labbook::validation::validate_email;
///
/// assert!(validate_email("ada@uni.example").is_ok());
/// assert!(validate_email("invalid").is_err());
/// ```
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::EmailEmpty);
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::EmailTooLong);
    }
    if email.chars().any(|c| c.is_whitespace()) {
        return Err(ValidationError::EmailInvalidFormat);
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::EmailInvalidFormat);
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(ValidationError::EmailInvalidFormat);
    }
    if domain.split('.').any(|p| p.is_empty()) {
        return Err(ValidationError::EmailInvalidFormat);
    }

    Ok(())
}

fn validate_name(
    name: &str,
    empty: ValidationError,
    too_long: ValidationError,
) -> Result<(), ValidationError> {
    let name = name.trim();
    if name.is_empty() || name.chars().any(|c| c.is_control()) {
        return Err(empty);
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(too_long);
    }
    Ok(())
}

/// Validate a first name.
pub fn validate_first_name(name: &str) -> Result<(), ValidationError> {
    validate_name(
        name,
        ValidationError::FirstNameEmpty,
        ValidationError::FirstNameTooLong,
    )
}

/// Validate a last name.
pub fn validate_last_name(name: &str) -> Result<(), ValidationError> {
    validate_name(
        name,
        ValidationError::LastNameEmpty,
        ValidationError::LastNameTooLong,
    )
}

/// Validate all fields of a new account, collecting every failure.
pub fn validate_new_user(
    email: &str,
    password: &str,
    first_name: &str,
    last_name: &str,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check(validate_email(email));
    errors.check(validate_password(password).map_err(ValidationError::Password));
    errors.check(validate_first_name(first_name));
    errors.check(validate_last_name(last_name));
    errors.into_result()
}

/// Validate a booking title.
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::TitleEmpty);
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::TitleTooLong);
    }
    Ok(())
}

/// Validate an optional booking description.
pub fn validate_description(description: Option<&str>) -> Result<(), ValidationError> {
    match description {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LENGTH => {
            Err(ValidationError::DescriptionTooLong)
        }
        _ => Ok(()),
    }
}

/// Validate a lab key.
pub fn validate_resource(resource: &str) -> Result<(), ValidationError> {
    let resource = resource.trim();
    if resource.is_empty() {
        return Err(ValidationError::ResourceEmpty);
    }
    if resource.chars().count() > MAX_RESOURCE_LENGTH {
        return Err(ValidationError::ResourceTooLong);
    }
    Ok(())
}
