use rocket::State;
use rocket::http::uri::Origin;
use rocket::serde::json::Json;
use rocket::{get, post};
use serde_json::json;
use sqlx::{Pool, Sqlite};
use tracing::instrument;

use crate::auth::{Permission, User};
use crate::db::{LearnerFilter, get_learner_details, list_learners};
use crate::enrollment::{
    AcceptOutcome, REJECTED_MESSAGE, accept_enrollment, reject_enrollment, status_filter,
};
use crate::mail::MailerHandle;
use crate::pagination::PageRequest;
use crate::response::{ActionResponse, ApiError, Page, RedirectOnConflict};
use crate::validation::{AppErrorExt, PermissionCheckExt};

/// These routes are mounted under both `/admin` and `/staff`. Responses point
/// back into whichever area the request came from, and the admin area is
/// closed to staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReviewArea {
    Admin,
    Staff,
}

impl ReviewArea {
    fn of(origin: &Origin<'_>) -> Self {
        match origin.path().segments().next() {
            Some("staff") => ReviewArea::Staff,
            _ => ReviewArea::Admin,
        }
    }

    fn base(self) -> &'static str {
        match self {
            ReviewArea::Admin => "/admin/enrollments",
            ReviewArea::Staff => "/staff/enrollments",
        }
    }

    fn authorize(self, user: &User) -> Result<(), ApiError> {
        user.require_permission(Permission::ReviewEnrollments)
            .validate_custom()?;
        if self == ReviewArea::Admin {
            user.require_permission(Permission::AccessAdminArea)
                .validate_custom()?;
        }
        Ok(())
    }
}

#[get("/enrollments?<search>&<status>&<page>")]
#[instrument(skip(db, user, origin))]
pub async fn enrollments_index(
    search: Option<String>,
    status: Option<String>,
    page: Option<i64>,
    user: User,
    origin: &Origin<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Page>, ApiError> {
    ReviewArea::of(origin).authorize(&user)?;

    let search = search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let filter = LearnerFilter {
        search: search.clone(),
        status: status_filter(status.as_deref()),
    };

    let learners = list_learners(db, &filter, PageRequest::new(page))
        .await
        .validate_custom()?;

    Ok(Page::new(
        "Admin/Enrollments",
        json!({
            "recentLearners": learners,
            "filters": {
                "search": search,
                "status": filter.status,
            },
        }),
    ))
}

#[get("/enrollments/<learner_id>")]
#[instrument(skip(db, user, origin))]
pub async fn enrollment_show(
    learner_id: i64,
    user: User,
    origin: &Origin<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Page>, ApiError> {
    ReviewArea::of(origin).authorize(&user)?;

    let learner = get_learner_details(db, learner_id)
        .await
        .validate_custom()?;

    Ok(Page::new(
        "Admin/EnrollmentDetails",
        json!({ "learner": learner }),
    ))
}

#[post("/enrollments/<learner_id>/accept")]
#[instrument(skip(db, mailer, user, origin))]
pub async fn enrollment_accept(
    learner_id: i64,
    user: User,
    origin: &Origin<'_>,
    db: &State<Pool<Sqlite>>,
    mailer: &State<MailerHandle>,
) -> Result<Json<ActionResponse>, ApiError> {
    let area = ReviewArea::of(origin);
    area.authorize(&user)?;

    let base = area.base();
    let outcome = accept_enrollment(db, &**mailer.inner(), learner_id)
        .await
        .or_redirect(&format!("{}/{}", base, learner_id))?;

    Ok(match outcome {
        AcceptOutcome::MailSent => ActionResponse::success(outcome.message(), base),
        AcceptOutcome::MailFailed => ActionResponse::warning(outcome.message(), base),
    })
}

#[post("/enrollments/<learner_id>/reject")]
#[instrument(skip(db, user, origin))]
pub async fn enrollment_reject(
    learner_id: i64,
    user: User,
    origin: &Origin<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ActionResponse>, ApiError> {
    let area = ReviewArea::of(origin);
    area.authorize(&user)?;

    let base = area.base();
    reject_enrollment(db, learner_id)
        .await
        .or_redirect(&format!("{}/{}", base, learner_id))?;

    Ok(ActionResponse::success(REJECTED_MESSAGE, base))
}
