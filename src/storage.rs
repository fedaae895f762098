use std::path::PathBuf;

use chrono::Utc;
use rocket::fs::TempFile;
use rocket::http::ContentType;
use rocket::tokio::fs;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::validation::{FieldErrors, humanize};

pub const MAX_UPLOAD_BYTES: u64 = 2 * 1024 * 1024;

pub const THUMBMARK_DIR: &str = "registrations/thumbmarks";
pub const PICTURE_DIR: &str = "registrations/pictures";
pub const SCHOLARSHIP_DOCUMENT_DIR: &str = "scholarship_documents";

/// Which file types a form field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Document,
}

impl UploadKind {
    pub fn extension_for(&self, content_type: &ContentType) -> Option<&'static str> {
        if content_type.is_jpeg() {
            Some("jpg")
        } else if content_type.is_png() {
            Some("png")
        } else if content_type.is_pdf() && *self == UploadKind::Document {
            Some("pdf")
        } else {
            None
        }
    }

    fn allowed(&self) -> &'static str {
        match self {
            UploadKind::Image => "jpg, jpeg, png",
            UploadKind::Document => "pdf, jpg, jpeg, png",
        }
    }
}

/// Records why an uploaded file is unacceptable, if it is.
pub fn check_upload(
    errors: &mut FieldErrors,
    field: &str,
    file: Option<&TempFile<'_>>,
    kind: UploadKind,
    required: bool,
) {
    let Some(file) = file.filter(|f| f.len() > 0) else {
        if required {
            errors.add(field, format!("The {} field is required.", humanize(field)));
        }
        return;
    };

    let extension = file
        .content_type()
        .and_then(|content_type| kind.extension_for(content_type));

    if extension.is_none() {
        errors.add(
            field,
            format!(
                "The {} field must be a file of type: {}.",
                humanize(field),
                kind.allowed()
            ),
        );
    }

    if file.len() > MAX_UPLOAD_BYTES {
        errors.add(
            field,
            format!(
                "The {} field must not be greater than {} kilobytes.",
                humanize(field),
                MAX_UPLOAD_BYTES / 1024
            ),
        );
    }
}

/// Writes uploads below a public root that is served read-only under `/storage/`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Stores a registration image under a random name. Returns the relative path.
    #[instrument(skip(self, file))]
    pub async fn store_anonymous(
        &self,
        file: &mut TempFile<'_>,
        dir: &str,
        kind: UploadKind,
    ) -> Result<String, AppError> {
        let extension = Self::extension(file, kind)?;
        let relative = format!("{}/{}.{}", dir, Uuid::new_v4(), extension);
        self.write(file, &relative).await?;
        Ok(relative)
    }

    /// Stores `<dir>/<timestamp>_<field>_<name>.<ext>`. Returns the relative path.
    #[instrument(skip(self, file))]
    pub async fn store_named(
        &self,
        file: &mut TempFile<'_>,
        dir: &str,
        field: &str,
        kind: UploadKind,
    ) -> Result<String, AppError> {
        let extension = Self::extension(file, kind)?;
        let name = file.name().unwrap_or(field).to_string();
        let relative = format!(
            "{}/{}_{}_{}.{}",
            dir,
            Utc::now().timestamp(),
            field,
            name,
            extension
        );
        self.write(file, &relative).await?;
        Ok(relative)
    }

    /// Best effort; a leftover file is only logged.
    #[instrument(skip(self))]
    pub async fn remove(&self, relative: &str) {
        if let Err(err) = fs::remove_file(self.absolute(relative)).await {
            warn!(path = %relative, error = %err, "Failed to remove stored upload");
        }
    }

    pub async fn remove_all(&self, relatives: &[String]) {
        for relative in relatives {
            self.remove(relative).await;
        }
    }

    fn extension(file: &TempFile<'_>, kind: UploadKind) -> Result<&'static str, AppError> {
        file.content_type()
            .and_then(|content_type| kind.extension_for(content_type))
            .ok_or_else(|| AppError::Validation("Unsupported upload type".to_string()))
    }

    async fn write(&self, file: &mut TempFile<'_>, relative: &str) -> Result<(), AppError> {
        let destination = self.absolute(relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }

        file.copy_to(&destination).await?;
        info!(path = %relative, bytes = file.len(), "Stored upload");
        Ok(())
    }
}
