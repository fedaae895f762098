use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{info, warn};

pub fn load_environment() -> Result<(), Box<dyn std::error::Error>> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        warn!("Warning: Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}

/// Credentials for the administrator account created on first start.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub mail_from: String,
    pub session_hours: i64,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl PortalConfig {
    pub const DEFAULT_DATABASE_URL: &'static str = "sqlite://portal.db";
    pub const DEFAULT_UPLOAD_DIR: &'static str = "storage/public";
    pub const DEFAULT_MAIL_FROM: &'static str = "registrar@localhost";

    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| Self::DEFAULT_DATABASE_URL.to_string());

        let upload_dir = std::env::var("UPLOAD_DIR")
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .unwrap_or_else(|| Self::DEFAULT_UPLOAD_DIR.to_string());

        let mail_from =
            std::env::var("MAIL_FROM").unwrap_or_else(|_| Self::DEFAULT_MAIL_FROM.to_string());

        let session_hours = match std::env::var("SESSION_HOURS") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .with_context(|| format!("SESSION_HOURS must be an integer, got '{}'", raw))?,
            Err(_) => 1,
        };

        if session_hours < 1 {
            anyhow::bail!("SESSION_HOURS must be at least 1");
        }

        let bootstrap_admin = match (
            std::env::var("PORTAL_ADMIN_EMAIL"),
            std::env::var("PORTAL_ADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
                Some(BootstrapAdmin { email, password })
            }
            (Ok(_), Err(_)) | (Err(_), Ok(_)) => {
                warn!("Both PORTAL_ADMIN_EMAIL and PORTAL_ADMIN_PASSWORD are needed to bootstrap an admin");
                None
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            upload_dir: PathBuf::from(upload_dir),
            mail_from,
            session_hours,
            bootstrap_admin,
        })
    }
}
