use chrono::NaiveDate;
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{delete, get, post, put};
use serde::Deserialize;
use serde_json::json;
use sqlx::{Pool, Sqlite};
use tracing::instrument;
use validator::Validate;

use crate::auth::{Permission, User};
use crate::db::{
    SCHOLARSHIP_NAME_TAKEN, ScholarshipFields, create_scholarship, decide_application,
    delete_scholarship, get_application_status, get_scholarship, list_applicants,
    list_scholarships, scholarship_name_taken, update_scholarship,
};
use crate::error::AppError;
use crate::models::{ApplicantCounts, ApplicationStatus, ScholarshipStatus};
use crate::pagination::PageRequest;
use crate::response::{ActionResponse, ApiError, Page, RedirectOnConflict};
use crate::registration::optional;
use crate::validation::{AppErrorExt, FieldErrors, JsonValidateExt, PermissionCheckExt, require};

use super::today;

const SCHOLARSHIPS_PATH: &str = "/staff/scholarships";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScholarshipMode {
    Create,
    Update,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ScholarshipRequest {
    #[validate(length(max = 255, message = "The scholarship name field must not be greater than 255 characters."))]
    pub scholarship_name: String,
    #[validate(length(max = 255, message = "The provider field must not be greater than 255 characters."))]
    pub provider: String,
    pub description: Option<String>,
    pub eligibility_criteria: String,
    #[validate(range(min = 1, message = "The available slots field must be at least 1."))]
    pub available_slots: Option<i64>,
    pub application_deadline: String,
    pub status: String,
}

impl ScholarshipRequest {
    /// Cross-field and date rules. Name uniqueness needs the database and is
    /// checked by the caller.
    pub fn check(
        self,
        mode: ScholarshipMode,
        today: NaiveDate,
        errors: &mut FieldErrors,
    ) -> Option<ScholarshipFields> {
        let scholarship_name = self.scholarship_name.trim().to_string();
        let provider = self.provider.trim().to_string();
        let eligibility_criteria = self.eligibility_criteria.trim().to_string();

        require(errors, "scholarship_name", &scholarship_name);
        require(errors, "provider", &provider);
        require(errors, "eligibility_criteria", &eligibility_criteria);

        if self.available_slots.is_none() {
            errors.add("available_slots", "The available slots field is required.");
        }

        let deadline = match self.application_deadline.trim() {
            "" => {
                errors.add(
                    "application_deadline",
                    "The application deadline field is required.",
                );
                None
            }
            raw => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(date) if mode == ScholarshipMode::Create && date <= today => {
                    errors.add(
                        "application_deadline",
                        "The application deadline field must be a date after today.",
                    );
                    None
                }
                Ok(date) => Some(date),
                Err(_) => {
                    errors.add(
                        "application_deadline",
                        "The application deadline field must be a valid date.",
                    );
                    None
                }
            },
        };

        let status = match self.status.parse::<ScholarshipStatus>() {
            Ok(status) => Some(status),
            Err(_) => {
                errors.add("status", "The selected status is invalid.");
                None
            }
        };

        Some(ScholarshipFields {
            scholarship_name,
            provider,
            description: self.description.as_deref().and_then(optional),
            eligibility_criteria,
            available_slots: self.available_slots.filter(|slots| *slots >= 1)?,
            application_deadline: deadline?,
            status: status?,
        })
    }
}

async fn validated_fields(
    db: &Pool<Sqlite>,
    request: Json<ScholarshipRequest>,
    mode: ScholarshipMode,
    except: Option<i64>,
) -> Result<ScholarshipFields, ApiError> {
    let request = request.validate_custom()?;

    let mut errors = FieldErrors::new();
    let fields = request.check(mode, today(), &mut errors);

    if let Some(fields) = &fields {
        if scholarship_name_taken(db, &fields.scholarship_name, except)
            .await
            .validate_custom()?
        {
            errors.add("scholarship_name", SCHOLARSHIP_NAME_TAKEN);
        }
    }

    errors.into_result()?;
    fields.ok_or(ApiError::Failed(Status::UnprocessableEntity))
}

/// A name claimed between the uniqueness check and the write still lands on
/// the `scholarship_name` field.
fn name_taken_on_field(err: AppError) -> ApiError {
    match err {
        AppError::Validation(message) if message == SCHOLARSHIP_NAME_TAKEN => {
            let mut errors = FieldErrors::new();
            errors.add("scholarship_name", message);
            errors.into()
        }
        other => other.into(),
    }
}

fn status_options() -> Vec<&'static str> {
    ScholarshipStatus::ALL.iter().map(|s| s.as_str()).collect()
}

#[get("/staff/scholarships?<search>&<page>")]
#[instrument(skip(db, user))]
pub async fn scholarships_index(
    search: Option<String>,
    page: Option<i64>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Page>, ApiError> {
    user.require_permission(Permission::ManageScholarships)
        .validate_custom()?;

    let search = search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let scholarships = list_scholarships(db, search.as_deref(), PageRequest::new(page))
        .await
        .validate_custom()?;

    Ok(Page::new(
        "Staff/Scholarships/Index",
        json!({
            "scholarships": scholarships,
            "filters": { "search": search },
        }),
    ))
}

#[get("/staff/scholarships/create")]
pub async fn scholarship_create_page(user: User) -> Result<Json<Page>, ApiError> {
    user.require_permission(Permission::ManageScholarships)
        .validate_custom()?;

    Ok(Page::new(
        "Staff/Scholarships/Create",
        json!({ "statuses": status_options() }),
    ))
}

#[post("/staff/scholarships", data = "<request>")]
#[instrument(skip_all)]
pub async fn scholarship_store(
    request: Json<ScholarshipRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<ActionResponse>>, ApiError> {
    user.require_permission(Permission::ManageScholarships)
        .validate_custom()?;

    let fields = validated_fields(db, request, ScholarshipMode::Create, None).await?;
    create_scholarship(db, &fields)
        .await
        .map_err(name_taken_on_field)?;

    Ok(Custom(
        Status::Created,
        ActionResponse::success("Scholarship created successfully.", SCHOLARSHIPS_PATH),
    ))
}

#[get("/staff/scholarships/<scholarship_id>", rank = 2)]
#[instrument(skip(db, user))]
pub async fn scholarship_show(
    scholarship_id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Page>, ApiError> {
    user.require_permission(Permission::ManageScholarships)
        .validate_custom()?;

    let scholarship = get_scholarship(db, scholarship_id).await.validate_custom()?;
    let applicants = list_applicants(db, scholarship_id).await.validate_custom()?;
    let counts = ApplicantCounts::tally(&applicants, scholarship.available_slots);

    Ok(Page::new(
        "Staff/Scholarships/Show",
        json!({
            "scholarship": scholarship,
            "applicants": applicants,
            "counts": counts,
        }),
    ))
}

#[get("/staff/scholarships/<scholarship_id>/edit")]
#[instrument(skip(db, user))]
pub async fn scholarship_edit_page(
    scholarship_id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Page>, ApiError> {
    user.require_permission(Permission::ManageScholarships)
        .validate_custom()?;

    let scholarship = get_scholarship(db, scholarship_id).await.validate_custom()?;

    Ok(Page::new(
        "Staff/Scholarships/Edit",
        json!({
            "scholarship": scholarship,
            "statuses": status_options(),
        }),
    ))
}

#[put("/staff/scholarships/<scholarship_id>", data = "<request>")]
#[instrument(skip(db, user, request))]
pub async fn scholarship_update(
    scholarship_id: i64,
    request: Json<ScholarshipRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ActionResponse>, ApiError> {
    user.require_permission(Permission::ManageScholarships)
        .validate_custom()?;

    get_scholarship(db, scholarship_id).await.validate_custom()?;

    let fields =
        validated_fields(db, request, ScholarshipMode::Update, Some(scholarship_id)).await?;
    update_scholarship(db, scholarship_id, &fields)
        .await
        .map_err(name_taken_on_field)?;

    Ok(ActionResponse::success(
        "Scholarship updated successfully.",
        SCHOLARSHIPS_PATH,
    ))
}

#[delete("/staff/scholarships/<scholarship_id>")]
#[instrument(skip(db, user))]
pub async fn scholarship_destroy(
    scholarship_id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ActionResponse>, ApiError> {
    user.require_permission(Permission::ManageScholarships)
        .validate_custom()?;

    delete_scholarship(db, scholarship_id)
        .await
        .validate_custom()?;

    Ok(ActionResponse::success(
        "Scholarship deleted successfully.",
        SCHOLARSHIPS_PATH,
    ))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ApplicationDecisionRequest {
    pub status: String,
    #[validate(length(max = 500, message = "The remarks field must not be greater than 500 characters."))]
    pub remarks: Option<String>,
}

#[post(
    "/staff/scholarships/<scholarship_id>/applicants/<learner_id>",
    data = "<request>"
)]
#[instrument(skip(db, user, request))]
pub async fn application_status_update(
    scholarship_id: i64,
    learner_id: i64,
    request: Json<ApplicationDecisionRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ActionResponse>, ApiError> {
    user.require_permission(Permission::ProcessApplications)
        .validate_custom()?;

    let request = request.validate_custom()?;

    let target = match request.status.parse::<ApplicationStatus>() {
        Ok(status) if status.is_decision() => status,
        _ => {
            let mut errors = FieldErrors::new();
            errors.add("status", "The selected status is invalid.");
            return Err(errors.into());
        }
    };

    let show_path = format!("{}/{}", SCHOLARSHIPS_PATH, scholarship_id);

    let current = get_application_status(db, scholarship_id, learner_id)
        .await
        .validate_custom()?;
    current.decide(target).or_redirect(&show_path)?;

    let remarks = request.remarks.as_deref().and_then(optional);
    let decided = decide_application(db, scholarship_id, learner_id, target, remarks.as_deref())
        .await
        .validate_custom()?;

    if !decided {
        return Err(ApiError::from_app(
            AppError::Conflict("Application has already been processed.".to_string()),
            Some(show_path),
        ));
    }

    Ok(ActionResponse::success(
        &format!("Application status updated to {}.", target),
        show_path,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(deadline: &str) -> ScholarshipRequest {
        ScholarshipRequest {
            scholarship_name: " Training for Work ".to_string(),
            provider: "TESDA".to_string(),
            description: Some("   ".to_string()),
            eligibility_criteria: "Out-of-school youth".to_string(),
            available_slots: Some(25),
            application_deadline: deadline.to_string(),
            status: "Open".to_string(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_valid_request_is_trimmed() {
        let mut errors = FieldErrors::new();
        let fields = request("2024-07-01")
            .check(ScholarshipMode::Create, today(), &mut errors)
            .unwrap();

        assert!(errors.is_empty());
        assert_eq!(fields.scholarship_name, "Training for Work");
        assert_eq!(fields.description, None);
        assert_eq!(fields.status, ScholarshipStatus::Open);
    }

    #[test]
    fn test_create_requires_future_deadline_but_update_does_not() {
        let mut errors = FieldErrors::new();
        assert!(request("2024-06-01")
            .check(ScholarshipMode::Create, today(), &mut errors)
            .is_none());
        assert_eq!(
            errors.first("application_deadline"),
            Some("The application deadline field must be a date after today.")
        );

        let mut errors = FieldErrors::new();
        assert!(request("2024-01-15")
            .check(ScholarshipMode::Update, today(), &mut errors)
            .is_some());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_missing_fields_and_bad_status_are_reported() {
        let mut errors = FieldErrors::new();
        let fields = ScholarshipRequest {
            status: "Archived".to_string(),
            ..Default::default()
        }
        .check(ScholarshipMode::Create, today(), &mut errors);

        assert!(fields.is_none());
        for field in [
            "scholarship_name",
            "provider",
            "eligibility_criteria",
            "available_slots",
            "application_deadline",
            "status",
        ] {
            assert!(errors.has(field), "missing error for {}", field);
        }
    }

    #[test]
    fn test_zero_slots_fail_the_derive_rules() {
        let request = ScholarshipRequest {
            available_slots: Some(0),
            ..request("2024-07-01")
        };
        assert!(request.validate().is_err());
    }
}
