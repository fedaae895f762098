use rocket::State;
use rocket::form::{Contextual, Form};
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{FromForm, get, post};
use serde::Serialize;
use serde_json::json;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{Permission, User};
use crate::db::{
    ALREADY_APPLIED, applied_scholarship_ids, find_learner_by_user, get_scholarship, has_applied,
    insert_application, list_open_scholarships,
};
use crate::error::AppError;
use crate::models::{DocumentPaths, Learner, Scholarship};
use crate::response::{ActionResponse, ApiError, Page, RedirectOnConflict};
use crate::storage::{SCHOLARSHIP_DOCUMENT_DIR, UploadKind, UploadStore, check_upload};
use crate::validation::{AppErrorExt, FieldErrors, PermissionCheckExt};

use super::today;

const STUDENT_SCHOLARSHIPS_PATH: &str = "/scholarships";

pub const LEARNER_PROFILE_MISSING: &str = "Learner profile not found.";
pub const APPLIED_MESSAGE: &str = "Your scholarship application has been submitted successfully!";

#[derive(Debug, Serialize)]
pub struct OpenScholarship {
    #[serde(flatten)]
    pub scholarship: Scholarship,
    pub already_applied: bool,
}

/// Applying needs a learner profile linked to the logged-in user.
async fn current_learner(db: &Pool<Sqlite>, user: &User) -> Result<Learner, AppError> {
    find_learner_by_user(db, user.id)
        .await?
        .ok_or_else(|| AppError::Conflict(LEARNER_PROFILE_MISSING.to_string()))
}

/// The guards shared by the apply form and the submission.
async fn ensure_can_apply(
    db: &Pool<Sqlite>,
    scholarship: &Scholarship,
    learner: &Learner,
) -> Result<(), AppError> {
    scholarship.ensure_accepting_applications(today())?;

    if has_applied(db, scholarship.scholarship_id, learner.learner_id).await? {
        return Err(AppError::Conflict(ALREADY_APPLIED.to_string()));
    }

    Ok(())
}

#[get("/scholarships")]
#[instrument(skip(db, user))]
pub async fn student_scholarships(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Page>, ApiError> {
    user.require_permission(Permission::ApplyForScholarships)
        .validate_custom()?;

    let applied = match find_learner_by_user(db, user.id).await.validate_custom()? {
        Some(learner) => applied_scholarship_ids(db, learner.learner_id)
            .await
            .validate_custom()?,
        None => Vec::new(),
    };

    let scholarships: Vec<OpenScholarship> = list_open_scholarships(db, today())
        .await
        .validate_custom()?
        .into_iter()
        .map(|scholarship| OpenScholarship {
            already_applied: applied.contains(&scholarship.scholarship_id),
            scholarship,
        })
        .collect();

    Ok(Page::new(
        "Student/Scholarships/Index",
        json!({ "scholarships": scholarships }),
    ))
}

#[get("/scholarships/<scholarship_id>/apply")]
#[instrument(skip(db, user))]
pub async fn scholarship_apply_page(
    scholarship_id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Page>, ApiError> {
    user.require_permission(Permission::ApplyForScholarships)
        .validate_custom()?;

    let learner = current_learner(db, &user)
        .await
        .or_redirect(STUDENT_SCHOLARSHIPS_PATH)?;
    let scholarship = get_scholarship(db, scholarship_id).await.validate_custom()?;

    ensure_can_apply(db, &scholarship, &learner)
        .await
        .or_redirect(STUDENT_SCHOLARSHIPS_PATH)?;

    Ok(Page::new(
        "Student/Scholarships/Apply",
        json!({
            "scholarship": scholarship,
            "learner": learner,
            "email": user.email,
        }),
    ))
}

#[derive(FromForm)]
pub struct ApplicationForm<'r> {
    birth_certificate: Option<TempFile<'r>>,
    transcript_of_records: Option<TempFile<'r>>,
    formal_photo: Option<TempFile<'r>>,
    parent_id: Option<TempFile<'r>>,
    marriage_contract: Option<TempFile<'r>>,
}

impl<'r> ApplicationForm<'r> {
    /// Field name, file, accepted kind and whether the field is required.
    fn documents(&mut self) -> [(&'static str, &mut Option<TempFile<'r>>, UploadKind, bool); 5] {
        [
            ("birth_certificate", &mut self.birth_certificate, UploadKind::Document, true),
            ("transcript_of_records", &mut self.transcript_of_records, UploadKind::Document, true),
            ("formal_photo", &mut self.formal_photo, UploadKind::Image, true),
            ("parent_id", &mut self.parent_id, UploadKind::Document, true),
            ("marriage_contract", &mut self.marriage_contract, UploadKind::Document, false),
        ]
    }
}

#[post("/scholarships/<scholarship_id>/apply", data = "<form>")]
#[instrument(skip(db, store, user, form))]
pub async fn scholarship_apply<'r>(
    scholarship_id: i64,
    form: Form<Contextual<'r, ApplicationForm<'r>>>,
    user: User,
    db: &State<Pool<Sqlite>>,
    store: &State<UploadStore>,
) -> Result<Custom<Json<ActionResponse>>, ApiError> {
    user.require_permission(Permission::ApplyForScholarships)
        .validate_custom()?;

    let learner = current_learner(db, &user)
        .await
        .or_redirect(STUDENT_SCHOLARSHIPS_PATH)?;
    let scholarship = get_scholarship(db, scholarship_id).await.validate_custom()?;

    ensure_can_apply(db, &scholarship, &learner)
        .await
        .or_redirect(STUDENT_SCHOLARSHIPS_PATH)?;

    let Contextual { value, context } = form.into_inner();
    let Some(mut form) = value else {
        let mut errors = FieldErrors::new();
        errors.merge_form(context.errors());
        return Err(errors.into());
    };

    let mut errors = FieldErrors::new();
    for (field, file, kind, required) in form.documents() {
        check_upload(&mut errors, field, file.as_ref(), kind, required);
    }
    errors.into_result()?;

    let dir = format!("{}/{}", SCHOLARSHIP_DOCUMENT_DIR, learner.learner_id);
    let mut documents = DocumentPaths::new();

    for (field, file, kind, _) in form.documents() {
        let Some(file) = file.as_mut().filter(|f| f.len() > 0) else {
            continue;
        };

        match store.store_named(file, &dir, field, kind).await {
            Ok(path) => {
                documents.insert(field.to_string(), path);
            }
            Err(err) => {
                store
                    .remove_all(&documents.into_values().collect::<Vec<_>>())
                    .await;
                return Err(err.into());
            }
        }
    }

    if let Err(err) =
        insert_application(db, scholarship_id, learner.learner_id, &documents).await
    {
        store
            .remove_all(&documents.into_values().collect::<Vec<_>>())
            .await;
        return Err(ApiError::from_app(
            err,
            Some(STUDENT_SCHOLARSHIPS_PATH.to_string()),
        ));
    }

    info!(scholarship_id, learner_id = learner.learner_id, "Scholarship application submitted");

    Ok(Custom(
        Status::Created,
        ActionResponse::success(APPLIED_MESSAGE, STUDENT_SCHOLARSHIPS_PATH),
    ))
}
