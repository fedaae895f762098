use rocket::Request;
use rocket::catch;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde_json::{Value, json};
use sqlx::SqlitePool;

use crate::db::{get_session_by_token, get_user};

use super::User;

pub const SESSION_COOKIE: &str = "session_token";

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_span = tracing::info_span!("user_auth_guard");
        let _guard = auth_span.enter();

        let cookies = request.cookies();

        let token = cookies
            .get_private(SESSION_COOKIE)
            .map(|c| c.value().to_string());

        let Some(token) = token else {
            return Outcome::Error((Status::Unauthorized, ()));
        };

        let db = match request.rocket().state::<SqlitePool>() {
            Some(pool) => pool,
            _ => {
                tracing::error!("Database pool not found in managed state");
                return Outcome::Error((Status::InternalServerError, ()));
            }
        };

        match get_session_by_token(db, &token).await {
            Ok(session) => {
                if !session.is_valid() {
                    tracing::warn!(user_id = %session.user_id, "Session token expired");
                    return Outcome::Error((Status::Unauthorized, ()));
                }

                match get_user(db, session.user_id).await {
                    Ok(user) => {
                        tracing::info!(email = %user.email, role = %user.role.as_str(), "User authenticated via session token");
                        Outcome::Success(user)
                    }
                    Err(err) => {
                        tracing::error!(user_id = %session.user_id, error = ?err, "Failed to fetch user for valid session");
                        Outcome::Error((Status::InternalServerError, ()))
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = ?err, "Invalid session token");
                Outcome::Error((Status::Unauthorized, ()))
            }
        }
    }
}

fn error_body(status: Status, error: &str, message: &str) -> Custom<Json<Value>> {
    Custom(
        status,
        Json(json!({
            "error": error,
            "message": message
        })),
    )
}

#[catch(401)]
pub fn unauthorized(_req: &Request) -> Custom<Json<Value>> {
    error_body(
        Status::Unauthorized,
        "Unauthorized",
        "Authentication required",
    )
}

#[catch(403)]
pub fn forbidden(req: &Request) -> Custom<Json<Value>> {
    tracing::warn!(uri = %req.uri(), "Forbidden access attempt");
    error_body(
        Status::Forbidden,
        "Forbidden",
        "You don't have permission to perform this action",
    )
}

#[catch(404)]
pub fn not_found(_req: &Request) -> Custom<Json<Value>> {
    error_body(Status::NotFound, "Not Found", "Resource not found")
}

#[catch(422)]
pub fn unprocessable(_req: &Request) -> Custom<Json<Value>> {
    error_body(
        Status::UnprocessableEntity,
        "Unprocessable Entity",
        "The submitted data could not be understood",
    )
}

#[catch(500)]
pub fn internal_error(_req: &Request) -> Custom<Json<Value>> {
    error_body(
        Status::InternalServerError,
        "Internal Server Error",
        "Internal server error",
    )
}
