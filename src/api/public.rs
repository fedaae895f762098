use rocket::State;
use rocket::get;
use rocket::serde::json::Json;
use serde::Serialize;
use serde_json::json;
use sqlx::{Pool, Sqlite};

use crate::db::{list_classifications, list_disability_types};
use crate::models::{CIVIL_STATUSES, EducationLevel, GENDERS};
use crate::response::{ApiError, Page};
use crate::validation::AppErrorExt;
use crate::wizard::WizardStep;

#[derive(Serialize)]
struct EducationOption {
    value: &'static str,
    label: &'static str,
}

#[get("/")]
pub fn home_page() -> Json<Page> {
    Page::new("Public/Home", json!({}))
}

#[get("/about")]
pub fn about_page() -> Json<Page> {
    Page::new("Public/About", json!({}))
}

#[get("/programs")]
pub fn programs_page() -> Json<Page> {
    Page::new("Public/Programs", json!({}))
}

#[get("/contact")]
pub fn contact_page() -> Json<Page> {
    Page::new("Public/Contact", json!({}))
}

/// The registration wizard with every option list it renders.
#[get("/enrollnow")]
pub async fn enroll_now_page(db: &State<Pool<Sqlite>>) -> Result<Json<Page>, ApiError> {
    let classifications = list_classifications(db).await.validate_custom()?;
    let disability_types = list_disability_types(db).await.validate_custom()?;

    let education_levels: Vec<EducationOption> = EducationLevel::ALL
        .iter()
        .map(|level| EducationOption {
            value: level.as_str(),
            label: level.label(),
        })
        .collect();

    Ok(Page::new(
        "Public/EnrollNow",
        json!({
            "steps": WizardStep::catalogue(),
            "classifications": classifications,
            "disability_types": disability_types,
            "education_levels": education_levels,
            "genders": GENDERS,
            "civil_statuses": CIVIL_STATUSES,
        }),
    ))
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}
