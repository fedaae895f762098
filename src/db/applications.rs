use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::{AppError, is_unique_violation};
use crate::models::{
    Applicant, ApplicationStatus, DbApplicant, DbScholarshipApplication, DocumentPaths,
    ScholarshipApplication,
};

pub const ALREADY_APPLIED: &str = "You have already applied for this scholarship.";

#[instrument(skip(pool))]
pub async fn list_applicants(
    pool: &Pool<Sqlite>,
    scholarship_id: i64,
) -> Result<Vec<Applicant>, AppError> {
    info!("Listing scholarship applicants");
    let rows = sqlx::query_as::<_, DbApplicant>(
        "SELECT l.learner_id, l.first_name, l.last_name, u.email AS email, ss.status, \
         ss.application_date, ss.date_processed, ss.remarks, ss.documents \
         FROM student_scholarships ss \
         JOIN learners l ON l.learner_id = ss.learner_id \
         LEFT JOIN users u ON u.id = l.user_id \
         WHERE ss.scholarship_id = ? \
         ORDER BY ss.application_date ASC, ss.id ASC",
    )
    .bind(scholarship_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Applicant::try_from).collect()
}

#[instrument(skip(pool))]
pub async fn has_applied(
    pool: &Pool<Sqlite>,
    scholarship_id: i64,
    learner_id: i64,
) -> Result<bool, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM student_scholarships WHERE scholarship_id = ? AND learner_id = ?",
    )
    .bind(scholarship_id)
    .bind(learner_id)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

#[instrument(skip(pool))]
pub async fn applied_scholarship_ids(
    pool: &Pool<Sqlite>,
    learner_id: i64,
) -> Result<Vec<i64>, AppError> {
    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT scholarship_id FROM student_scholarships WHERE learner_id = ?",
    )
    .bind(learner_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// A second application for the same pair fails on the unique key.
#[instrument(skip(pool, documents))]
pub async fn insert_application(
    pool: &Pool<Sqlite>,
    scholarship_id: i64,
    learner_id: i64,
    documents: &DocumentPaths,
) -> Result<i64, AppError> {
    info!("Storing scholarship application");
    let documents = serde_json::to_string(documents)?;
    let now = Utc::now().naive_utc();

    let res = sqlx::query(
        "INSERT INTO student_scholarships \
         (scholarship_id, learner_id, status, application_date, documents) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(scholarship_id)
    .bind(learner_id)
    .bind(ApplicationStatus::Pending.as_str())
    .bind(now)
    .bind(documents)
    .execute(pool)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            AppError::Conflict(ALREADY_APPLIED.to_string())
        } else {
            AppError::Database(err)
        }
    })?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn get_application_status(
    pool: &Pool<Sqlite>,
    scholarship_id: i64,
    learner_id: i64,
) -> Result<ApplicationStatus, AppError> {
    let status: Option<String> = sqlx::query_scalar(
        "SELECT status FROM student_scholarships WHERE scholarship_id = ? AND learner_id = ?",
    )
    .bind(scholarship_id)
    .bind(learner_id)
    .fetch_optional(pool)
    .await?;

    match status {
        Some(status) => status
            .parse()
            .map_err(|e: anyhow::Error| AppError::Internal(e.to_string())),
        None => Err(AppError::NotFound(format!(
            "No application from learner {} for scholarship {}",
            learner_id, scholarship_id
        ))),
    }
}

/// Records a decision on a pending application. Returns false when it was
/// decided in the meantime.
#[instrument(skip(pool, remarks))]
pub async fn decide_application(
    pool: &Pool<Sqlite>,
    scholarship_id: i64,
    learner_id: i64,
    status: ApplicationStatus,
    remarks: Option<&str>,
) -> Result<bool, AppError> {
    info!("Recording application decision");
    let now = Utc::now().naive_utc();

    let result = sqlx::query(
        "UPDATE student_scholarships \
         SET status = ?, remarks = ?, date_processed = ?, updated_at = CURRENT_TIMESTAMP \
         WHERE scholarship_id = ? AND learner_id = ? AND status = ?",
    )
    .bind(status.as_str())
    .bind(remarks)
    .bind(now)
    .bind(scholarship_id)
    .bind(learner_id)
    .bind(ApplicationStatus::Pending.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[instrument(skip(pool))]
pub async fn list_learner_applications(
    pool: &Pool<Sqlite>,
    learner_id: i64,
) -> Result<Vec<ScholarshipApplication>, AppError> {
    info!("Listing a learner's applications");
    let rows = sqlx::query_as::<_, DbScholarshipApplication>(
        "SELECT ss.id, ss.scholarship_id, s.scholarship_name, s.provider, ss.status, \
         ss.application_date, ss.date_processed, ss.remarks \
         FROM student_scholarships ss \
         JOIN scholarships s ON s.scholarship_id = ss.scholarship_id \
         WHERE ss.learner_id = ? \
         ORDER BY ss.application_date DESC, ss.id DESC",
    )
    .bind(learner_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(ScholarshipApplication::try_from).collect()
}
