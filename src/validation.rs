use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use rocket::form;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use validator::{Validate, ValidationErrors};

use crate::error::AppError;
use crate::response::ApiError;

/// Philippine mobile numbers: `09XXXXXXXXX` or `+639XXXXXXXXX`.
pub static CONTACT_NO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(09\d{9}|\+639\d{9})$").expect("contact number pattern is valid"));

/// Field name to the messages raised against it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn first(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    /// Folds derive-level `validator` failures in, keeping each rule's message.
    /// Fields that already failed an earlier check, such as `require`, keep
    /// only that first message.
    pub fn merge_validator(&mut self, errors: &ValidationErrors) {
        for (field, field_errors) in errors.field_errors() {
            if self.has(&field) {
                continue;
            }
            for error in field_errors {
                let message = error
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("The {} field is invalid.", humanize(&field)));
                self.add(&field, message);
            }
        }
    }

    /// Folds Rocket form parsing failures in.
    pub fn merge_form<'a, 'v: 'a>(&mut self, errors: impl IntoIterator<Item = &'a form::Error<'v>>) {
        for error in errors {
            let field = error
                .name
                .as_ref()
                .map(|name| name.to_string())
                .unwrap_or_else(|| "form".to_string());
            self.add(&field, error.kind.to_string());
        }
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// `birth_date` becomes `birth date` for messages.
pub fn humanize(field: &str) -> String {
    field.replace('_', " ")
}

pub fn require(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, format!("The {} field is required.", humanize(field)));
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidationResponse {
    pub status: String,
    pub errors: FieldErrors,
    /// Index of the earliest registration wizard step holding an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
}

impl ValidationResponse {
    pub fn new(errors: FieldErrors) -> Self {
        Self {
            status: "error".to_string(),
            errors,
            step: None,
        }
    }

    pub fn with_error(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        Self::new(errors)
    }

    pub fn at_step(mut self, step: Option<usize>) -> Self {
        self.step = step;
        self
    }

    pub fn into_custom(self) -> Custom<Json<ValidationResponse>> {
        Custom(Status::UnprocessableEntity, Json(self))
    }
}

impl From<FieldErrors> for Custom<Json<ValidationResponse>> {
    #[instrument(skip_all)]
    fn from(errors: FieldErrors) -> Self {
        tracing::warn!(fields = ?errors.fields().collect::<Vec<_>>(), "Request failed validation");
        ValidationResponse::new(errors).into_custom()
    }
}

pub trait JsonValidateExt<T> {
    fn validate_custom(self) -> Result<T, ApiError>;
}

impl<T: Validate> JsonValidateExt<T> for Json<T> {
    fn validate_custom(self) -> Result<T, ApiError> {
        let inner = self.into_inner();
        if let Err(errors) = inner.validate() {
            let mut field_errors = FieldErrors::new();
            field_errors.merge_validator(&errors);
            return Err(field_errors.into());
        }
        Ok(inner)
    }
}

pub trait AppErrorExt<T> {
    fn validate_custom(self) -> Result<T, ApiError>;
}

impl<T> AppErrorExt<T> for Result<T, AppError> {
    fn validate_custom(self) -> Result<T, ApiError> {
        self.map_err(ApiError::from)
    }
}

pub trait PermissionCheckExt {
    fn validate_custom(self) -> Result<(), ApiError>;
}

impl PermissionCheckExt for Result<(), Status> {
    fn validate_custom(self) -> Result<(), ApiError> {
        self.map_err(ApiError::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "The name field is required."))]
        name: String,
        #[validate(email)]
        email: String,
    }

    #[test]
    fn test_contact_number_formats() {
        assert!(CONTACT_NO.is_match("09171234567"));
        assert!(CONTACT_NO.is_match("+639171234567"));
        assert!(!CONTACT_NO.is_match("9171234567"));
        assert!(!CONTACT_NO.is_match("0917123456"));
        assert!(!CONTACT_NO.is_match("+63917123456"));
        assert!(!CONTACT_NO.is_match("0917-123-4567"));
    }

    #[test]
    fn test_validator_messages_are_merged_per_field() {
        let sample = Sample {
            name: String::new(),
            email: "not-an-email".to_string(),
        };

        let mut errors = FieldErrors::new();
        errors.merge_validator(&sample.validate().unwrap_err());

        assert_eq!(errors.first("name"), Some("The name field is required."));
        assert_eq!(errors.first("email"), Some("The email field is invalid."));
    }

    #[test]
    fn test_required_message_wins_over_format_rules() {
        let sample = Sample {
            name: "Ana".to_string(),
            email: String::new(),
        };

        let mut errors = FieldErrors::new();
        require(&mut errors, "email", &sample.email);
        require(&mut errors, "last_name", "   ");
        errors.merge_validator(&sample.validate().unwrap_err());

        assert_eq!(errors.first("email"), Some("The email field is required."));
        assert_eq!(errors.first("last_name"), Some("The last name field is required."));
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_step_is_omitted_when_absent() {
        let body = serde_json::to_value(ValidationResponse::with_error("name", "bad")).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["errors"]["name"][0], "bad");
        assert!(body.get("step").is_none());
    }
}
