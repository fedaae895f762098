use chrono::{Duration, Utc};
use rocket::State;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{get, post};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, Role, SESSION_COOKIE, User, UserSession};
use crate::config::PortalConfig;
use crate::db::{
    EMAIL_TAKEN, authenticate_user, create_user, create_user_session, find_user_by_email,
    invalidate_session,
};
use crate::response::{ActionResponse, ApiError};
use crate::validation::{AppErrorExt, FieldErrors, JsonValidateExt, PermissionCheckExt};

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "The email field must be a valid email address."))]
    email: String,
    #[validate(length(min = 1, message = "The password field is required."))]
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<User>,
    pub error: Option<String>,
    pub redirect_url: Option<String>,
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<PortalConfig>,
) -> Result<Json<LoginResponse>, ApiError> {
    let validated = login.validate_custom()?;

    match authenticate_user(db, &validated.email, &validated.password)
        .await
        .validate_custom()?
    {
        Some(user) => {
            let token = UserSession::generate_token();
            let expires_at = Utc::now() + Duration::hours(config.session_hours);

            create_user_session(db, user.id, &token, expires_at.naive_utc())
                .await
                .validate_custom()?;

            let cookie = Cookie::build((SESSION_COOKIE, token))
                .same_site(SameSite::Lax)
                .http_only(true)
                .max_age(rocket::time::Duration::hours(config.session_hours));
            cookies.add_private(cookie);

            let redirect_url = user.role.home_path().to_string();

            Ok(Json(LoginResponse {
                success: true,
                user: Some(user),
                error: None,
                redirect_url: Some(redirect_url),
            }))
        }
        None => Ok(Json(LoginResponse {
            success: false,
            user: None,
            error: Some("These credentials do not match our records.".to_string()),
            redirect_url: None,
        })),
    }
}

#[get("/me")]
pub async fn api_me(user: User) -> Json<User> {
    Json(user)
}

#[get("/me", rank = 2)]
pub async fn api_me_unauthorized() -> Status {
    Status::Unauthorized
}

#[post("/logout")]
pub async fn api_logout(cookies: &CookieJar<'_>, db: &State<Pool<Sqlite>>) -> Json<ActionResponse> {
    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        if let Err(err) = invalidate_session(db, &token).await {
            err.log_and_record("Invalidating session on logout");
        }
    }

    cookies.remove_private(Cookie::build(SESSION_COOKIE));

    ActionResponse::success("You have been logged out.", "/")
}

#[derive(Deserialize, Validate)]
pub struct StaffRegistrationRequest {
    #[validate(length(min = 1, max = 255, message = "The name field is required."))]
    name: String,
    #[validate(email(message = "The email field must be a valid email address."))]
    email: String,
    #[validate(length(min = 8, message = "The password field must be at least 8 characters."))]
    password: String,
    role: String,
}

/// Admins create staff and admin logins; learners only come in through enrollment.
#[post("/admin/users", data = "<registration>")]
pub async fn api_register_staff(
    registration: Json<StaffRegistrationRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<ActionResponse>>, ApiError> {
    user.require_permission(Permission::RegisterStaff)
        .validate_custom()?;

    let validated = registration.validate_custom()?;

    let mut errors = FieldErrors::new();
    let role = match validated.role.parse::<Role>() {
        Ok(role @ (Role::Staff | Role::Admin)) => Some(role),
        _ => {
            errors.add("role", "The selected role is invalid.");
            None
        }
    };

    if find_user_by_email(db, &validated.email)
        .await
        .validate_custom()?
        .is_some()
    {
        errors.add("email", EMAIL_TAKEN);
    }

    errors.into_result()?;
    let Some(role) = role else {
        return Err(ApiError::Failed(Status::UnprocessableEntity));
    };

    create_user(db, &validated.name, &validated.email, &validated.password, role)
        .await
        .validate_custom()?;

    Ok(Custom(
        Status::Created,
        ActionResponse::success("User registered successfully.", "/admin/dashboard"),
    ))
}
