use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{ApplicationStatus, EnrollmentStatus, ScholarshipStatus};

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct EnrollmentCounts {
    pub total: i64,
    pub pending: i64,
    pub accepted: i64,
    pub rejected: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CourseCount {
    pub course_qualification: String,
    pub learners: i64,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct ScholarshipCounts {
    pub open_scholarships: i64,
    pub pending_applications: i64,
    pub approved_applications: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct RecentApplication {
    pub scholarship_id: i64,
    pub scholarship_name: String,
    pub learner_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub status: String,
    pub application_date: NaiveDateTime,
}

#[derive(sqlx::FromRow)]
struct StatusCount {
    status: String,
    count: i64,
}

#[instrument(skip(pool))]
pub async fn enrollment_counts(pool: &Pool<Sqlite>) -> Result<EnrollmentCounts, AppError> {
    info!("Counting learners by enrollment status");
    let rows = sqlx::query_as::<_, StatusCount>(
        "SELECT enrollment_status AS status, COUNT(*) AS count FROM learners GROUP BY enrollment_status",
    )
    .fetch_all(pool)
    .await?;

    let mut counts = EnrollmentCounts::default();
    for row in rows {
        counts.total += row.count;
        match row.status.parse::<EnrollmentStatus>() {
            Ok(EnrollmentStatus::Pending) => counts.pending = row.count,
            Ok(EnrollmentStatus::Accepted) => counts.accepted = row.count,
            Ok(EnrollmentStatus::Rejected) => counts.rejected = row.count,
            Err(_) => {}
        }
    }

    Ok(counts)
}

#[instrument(skip(pool))]
pub async fn top_courses(pool: &Pool<Sqlite>, limit: i64) -> Result<Vec<CourseCount>, AppError> {
    info!("Counting learners per course");
    let rows = sqlx::query_as::<_, CourseCount>(
        "SELECT course_qualification, COUNT(DISTINCT learner_id) AS learners \
         FROM course_enrollments GROUP BY course_qualification \
         ORDER BY learners DESC, course_qualification ASC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn scholarship_counts(pool: &Pool<Sqlite>) -> Result<ScholarshipCounts, AppError> {
    info!("Counting scholarships and applications");
    let open_scholarships: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM scholarships WHERE status = ?")
            .bind(ScholarshipStatus::Open.as_str())
            .fetch_one(pool)
            .await?;

    let rows = sqlx::query_as::<_, StatusCount>(
        "SELECT status, COUNT(*) AS count FROM student_scholarships GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    let mut counts = ScholarshipCounts {
        open_scholarships,
        ..Default::default()
    };
    for row in rows {
        match row.status.parse::<ApplicationStatus>() {
            Ok(ApplicationStatus::Pending) => counts.pending_applications = row.count,
            Ok(ApplicationStatus::Approved) => counts.approved_applications = row.count,
            _ => {}
        }
    }

    Ok(counts)
}

#[instrument(skip(pool))]
pub async fn recent_applications(
    pool: &Pool<Sqlite>,
    limit: i64,
) -> Result<Vec<RecentApplication>, AppError> {
    info!("Listing recent scholarship applications");
    let rows = sqlx::query_as::<_, RecentApplication>(
        "SELECT ss.scholarship_id, s.scholarship_name, l.learner_id, l.first_name, l.last_name, \
         ss.status, ss.application_date \
         FROM student_scholarships ss \
         JOIN scholarships s ON s.scholarship_id = ss.scholarship_id \
         JOIN learners l ON l.learner_id = ss.learner_id \
         ORDER BY ss.application_date DESC, ss.id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
