use rocket::State;
use rocket::get;
use rocket::serde::json::Json;
use serde_json::json;
use sqlx::{Pool, Sqlite};
use tracing::instrument;

use crate::auth::{Permission, User};
use crate::db::{
    LearnerFilter, enrollment_counts, find_learner_by_user, list_learner_applications,
    list_learners, recent_applications, scholarship_counts, top_courses,
};
use crate::pagination::PageRequest;
use crate::response::{ApiError, Page};
use crate::validation::{AppErrorExt, PermissionCheckExt};

const RECENT_LIMIT: i64 = 5;

#[get("/admin/dashboard")]
#[instrument(skip(db, user))]
pub async fn admin_dashboard(user: User, db: &State<Pool<Sqlite>>) -> Result<Json<Page>, ApiError> {
    user.require_permission(Permission::ViewAdminDashboard)
        .validate_custom()?;

    let counts = enrollment_counts(db).await.validate_custom()?;
    let recent = list_learners(
        db,
        &LearnerFilter::default(),
        PageRequest {
            page: 1,
            per_page: RECENT_LIMIT,
        },
    )
    .await
    .validate_custom()?;
    let courses = top_courses(db, RECENT_LIMIT).await.validate_custom()?;
    let scholarships = scholarship_counts(db).await.validate_custom()?;

    Ok(Page::new(
        "Admin/Dashboard",
        json!({
            "counts": counts,
            "recentLearners": recent.data,
            "topCourses": courses,
            "scholarships": scholarships,
        }),
    ))
}

#[get("/staff/dashboard")]
#[instrument(skip(db, user))]
pub async fn staff_dashboard(user: User, db: &State<Pool<Sqlite>>) -> Result<Json<Page>, ApiError> {
    user.require_permission(Permission::ViewStaffDashboard)
        .validate_custom()?;

    let counts = enrollment_counts(db).await.validate_custom()?;
    let scholarships = scholarship_counts(db).await.validate_custom()?;
    let applications = recent_applications(db, RECENT_LIMIT)
        .await
        .validate_custom()?;

    Ok(Page::new(
        "Staff/Dashboard",
        json!({
            "counts": counts,
            "scholarships": scholarships,
            "recentApplications": applications,
        }),
    ))
}

/// A learner's own view: enrollment status and scholarship applications.
#[get("/dashboard")]
#[instrument(skip(db, user))]
pub async fn learner_dashboard(user: User, db: &State<Pool<Sqlite>>) -> Result<Json<Page>, ApiError> {
    user.require_permission(Permission::ViewOwnProfile)
        .validate_custom()?;

    let learner = find_learner_by_user(db, user.id).await.validate_custom()?;
    let applications = match &learner {
        Some(learner) => list_learner_applications(db, learner.learner_id)
            .await
            .validate_custom()?,
        None => Vec::new(),
    };

    Ok(Page::new(
        "Dashboard",
        json!({
            "user": user,
            "enrollmentStatus": learner.as_ref().map(|l| l.enrollment_status),
            "learner": learner,
            "applications": applications,
        }),
    ))
}
