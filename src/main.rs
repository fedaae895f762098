mod api;
mod auth;
mod config;
mod db;
mod enrollment;
mod error;
mod mail;
mod models;
mod pagination;
mod registration;
mod response;
mod storage;
mod telemetry;
mod validation;
mod wizard;
#[cfg(test)]
mod test;

use std::str::FromStr;
use std::time::Duration;

use rocket::data::ToByteUnit;
use rocket::fs::{FileServer, Options};
use rocket::{Build, Rocket, catchers, routes, tokio};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;
use tracing::{error, info, warn};

use api::{
    about_page, admin_dashboard, api_login, api_logout, api_me, api_me_unauthorized,
    api_register_staff, application_status_update, contact_page, enroll_now_page,
    enrollment_accept, enrollment_reject, enrollment_show, enrollments_index, health, home_page,
    learner_dashboard, programs_page, register_learner, scholarship_apply,
    scholarship_apply_page, scholarship_create_page, scholarship_destroy, scholarship_edit_page,
    scholarship_show, scholarship_store, scholarship_update, scholarships_index, staff_dashboard,
    student_scholarships,
};
use auth::{forbidden, internal_error, not_found, unauthorized, unprocessable};
use config::{PortalConfig, load_environment};
use db::{clean_expired_sessions, ensure_bootstrap_admin};
use error::AppError;
use mail::{LogMailer, MailerHandle};
use storage::UploadStore;
use telemetry::{TelemetryFairing, init_tracing, shutdown_telemetry};

const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
    #[error("Rocket failed: {0}")]
    Rocket(#[from] Box<rocket::Error>),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    if let Err(err) = load_environment() {
        eprintln!("Failed to load environment files: {}", err);
    }

    init_tracing();

    let config = PortalConfig::from_env()?;
    let pool = connect(&config.database_url).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed successfully");

    if let Some(admin) = &config.bootstrap_admin {
        if ensure_bootstrap_admin(&pool, admin).await? {
            info!(email = %admin.email, "Created bootstrap administrator");
        }
    }

    spawn_session_cleanup(pool.clone());

    let mailer = MailerHandle::new(LogMailer::new(config.mail_from.clone()));
    let launched = init_rocket(pool, config, mailer).launch().await;

    shutdown_telemetry();
    launched.map_err(Box::new)?;

    Ok(())
}

async fn connect(database_url: &str) -> Result<SqlitePool, Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    Ok(SqlitePoolOptions::new().connect_with(options).await?)
}

fn spawn_session_cleanup(pool: SqlitePool) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool).await {
                Ok(count) if count > 0 => info!("Cleaned up {} expired sessions", count),
                Ok(_) => {}
                Err(e) => error!("Failed to clean expired sessions: {}", e),
            }

            tokio::time::sleep(SESSION_CLEANUP_INTERVAL).await;
        }
    });
}

pub fn init_rocket(pool: SqlitePool, config: PortalConfig, mailer: MailerHandle) -> Rocket<Build> {
    info!("Starting enrollment portal");

    if !config.upload_dir.exists() {
        warn!(dir = %config.upload_dir.display(), "Upload directory does not exist yet");
    }

    let figment = rocket::Config::figment()
        .merge(("limits.file", 8.mebibytes()))
        .merge(("limits.data-form", 32.mebibytes()));

    let uploads = UploadStore::new(config.upload_dir.clone());
    let storage = FileServer::new(config.upload_dir.clone(), Options::Missing);

    rocket::custom(figment)
        .manage(pool)
        .manage(uploads)
        .manage(mailer)
        .manage(config)
        .mount(
            "/",
            routes![
                home_page,
                about_page,
                programs_page,
                contact_page,
                enroll_now_page,
                health,
                register_learner,
                api_login,
                api_logout,
                api_me,
                api_me_unauthorized,
                api_register_staff,
                admin_dashboard,
                staff_dashboard,
                learner_dashboard,
                scholarships_index,
                scholarship_create_page,
                scholarship_store,
                scholarship_show,
                scholarship_edit_page,
                scholarship_update,
                scholarship_destroy,
                application_status_update,
                student_scholarships,
                scholarship_apply_page,
                scholarship_apply,
            ],
        )
        .mount(
            "/admin",
            routes![
                enrollments_index,
                enrollment_show,
                enrollment_accept,
                enrollment_reject
            ],
        )
        .mount(
            "/staff",
            routes![
                enrollments_index,
                enrollment_show,
                enrollment_accept,
                enrollment_reject
            ],
        )
        .mount("/storage", storage)
        .register(
            "/",
            catchers![unauthorized, forbidden, not_found, unprocessable, internal_error],
        )
        .attach(TelemetryFairing)
}
