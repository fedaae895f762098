use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::auth::{DbUser, Role, User};
use crate::config::BootstrapAdmin;
use crate::error::{AppError, is_unique_violation};

pub const EMAIL_TAKEN: &str = "The email has already been taken.";

#[derive(sqlx::FromRow)]
struct DbCredentials {
    id: i64,
    password: String,
}

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>("SELECT id, name, email, role FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn find_user_by_email(pool: &Pool<Sqlite>, email: &str) -> Result<Option<User>, AppError> {
    info!("Finding user by email");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, role FROM users WHERE lower(email) = lower(?)",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

/// Users without a password (fresh applicants) can never authenticate.
#[instrument(skip_all, fields(email))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let credentials = sqlx::query_as::<_, DbCredentials>(
        "SELECT id, password FROM users WHERE lower(email) = lower(?)",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    let Some(credentials) = credentials else {
        return Ok(None);
    };

    if credentials.password.is_empty() {
        return Ok(None);
    }

    match bcrypt::verify(password, &credentials.password) {
        Ok(true) => Ok(Some(get_user(pool, credentials.id).await?)),
        _ => Ok(None),
    }
}

#[instrument(skip(pool, password))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Result<i64, AppError> {
    info!("Creating new user");

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query("INSERT INTO users (name, email, password, role) VALUES (?, ?, ?, ?)")
        .bind(name)
        .bind(email)
        .bind(hashed_password)
        .bind(role.as_str())
        .execute(pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::Validation(EMAIL_TAKEN.to_string())
            } else {
                AppError::Database(err)
            }
        })?;

    Ok(res.last_insert_rowid())
}

/// Inserts a registrant's account. It has no usable password until accepted.
#[instrument(skip(conn))]
pub async fn insert_applicant_user(
    conn: &mut SqliteConnection,
    name: &str,
    email: &str,
) -> Result<i64, AppError> {
    info!("Creating applicant user");
    let res = sqlx::query("INSERT INTO users (name, email, password, role) VALUES (?, ?, '', ?)")
        .bind(name)
        .bind(email)
        .bind(Role::Applicant.as_str())
        .execute(conn)
        .await?;

    Ok(res.last_insert_rowid())
}

/// Sets a new password hash and role in one statement.
#[instrument(skip(conn, password_hash))]
pub async fn set_user_credentials(
    conn: &mut SqliteConnection,
    user_id: i64,
    password_hash: &str,
    role: Role,
) -> Result<(), AppError> {
    info!("Updating user credentials");
    let result = sqlx::query(
        "UPDATE users SET password = ?, role = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(password_hash)
    .bind(role.as_str())
    .bind(user_id)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }

    Ok(())
}

/// Creates the configured admin account unless the email is already registered.
#[instrument(skip_all, fields(email = %admin.email))]
pub async fn ensure_bootstrap_admin(
    pool: &Pool<Sqlite>,
    admin: &BootstrapAdmin,
) -> Result<bool, AppError> {
    if find_user_by_email(pool, &admin.email).await?.is_some() {
        info!("Bootstrap admin already exists");
        return Ok(false);
    }

    create_user(pool, "Administrator", &admin.email, &admin.password, Role::Admin).await?;
    info!("Bootstrap admin created");
    Ok(true)
}
