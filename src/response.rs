use rocket::Responder;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::validation::{FieldErrors, ValidationResponse};

/// What the client-side view layer renders: a component name and its props.
#[derive(Debug, Serialize, Deserialize)]
pub struct Page {
    pub component: String,
    pub props: Value,
}

impl Page {
    pub fn new(component: &str, props: Value) -> Json<Page> {
        Json(Page {
            component: component.to_string(),
            props,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

/// Result of a state-changing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub flash: Flash,
    pub redirect_url: Option<String>,
}

impl ActionResponse {
    fn build(kind: FlashKind, message: &str, redirect_url: Option<String>) -> Self {
        Self {
            success: kind != FlashKind::Error,
            flash: Flash {
                kind,
                message: message.to_string(),
            },
            redirect_url,
        }
    }

    pub fn success(message: &str, redirect_url: impl Into<String>) -> Json<Self> {
        Json(Self::build(
            FlashKind::Success,
            message,
            Some(redirect_url.into()),
        ))
    }

    /// The action went through but a side effect did not.
    pub fn warning(message: &str, redirect_url: impl Into<String>) -> Json<Self> {
        Json(Self::build(
            FlashKind::Warning,
            message,
            Some(redirect_url.into()),
        ))
    }

    pub fn error(message: &str, redirect_url: Option<String>) -> Self {
        Self::build(FlashKind::Error, message, redirect_url)
    }
}

/// Every way a handler can fail.
#[derive(Debug, Responder)]
pub enum ApiError {
    Invalid(Custom<Json<ValidationResponse>>),
    Rejected(Custom<Json<ActionResponse>>),
    Failed(Status),
}

impl ApiError {
    /// Guard violations become an error flash sending the client back to `redirect_url`.
    pub fn from_app(err: AppError, redirect_url: Option<String>) -> Self {
        match err {
            AppError::Conflict(ref message) => {
                err.log_and_record("Guarded action refused");
                ApiError::Rejected(Custom(
                    Status::Conflict,
                    Json(ActionResponse::error(message, redirect_url)),
                ))
            }
            AppError::Validation(ref message) => {
                err.log_and_record("Request failed validation");
                ApiError::Invalid(ValidationResponse::with_error("form", message).into_custom())
            }
            other => ApiError::Failed(other.to_status_with_log("Request failed")),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError::from_app(err, None)
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::Invalid(errors.into())
    }
}

impl From<ValidationResponse> for ApiError {
    fn from(response: ValidationResponse) -> Self {
        ApiError::Invalid(response.into_custom())
    }
}

impl From<Status> for ApiError {
    fn from(status: Status) -> Self {
        ApiError::Failed(status)
    }
}

pub trait RedirectOnConflict<T> {
    /// Like `?` on an `AppError`, but a refused action points the client at `redirect_url`.
    fn or_redirect(self, redirect_url: &str) -> Result<T, ApiError>;
}

impl<T> RedirectOnConflict<T> for Result<T, AppError> {
    fn or_redirect(self, redirect_url: &str) -> Result<T, ApiError> {
        self.map_err(|err| ApiError::from_app(err, Some(redirect_url.to_string())))
    }
}
