use std::collections::BTreeMap;

use anyhow::Error;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::AppError;

use super::{ApplicationStatus, NOT_AVAILABLE, ScholarshipStatus};

/// Uploaded document field name to its stored relative path.
pub type DocumentPaths = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize)]
pub struct Scholarship {
    pub scholarship_id: i64,
    pub scholarship_name: String,
    pub provider: String,
    pub description: Option<String>,
    pub eligibility_criteria: String,
    pub available_slots: i64,
    pub application_deadline: NaiveDate,
    pub status: ScholarshipStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Scholarship {
    /// The deadline date itself is already closed.
    pub fn accepts_applications(&self, today: NaiveDate) -> bool {
        self.status == ScholarshipStatus::Open && self.application_deadline > today
    }

    pub fn ensure_accepting_applications(&self, today: NaiveDate) -> Result<(), AppError> {
        if self.accepts_applications(today) {
            Ok(())
        } else {
            Err(AppError::Conflict(
                "This scholarship is no longer accepting applications.".to_string(),
            ))
        }
    }
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbScholarship {
    pub scholarship_id: i64,
    pub scholarship_name: String,
    pub provider: String,
    pub description: Option<String>,
    pub eligibility_criteria: String,
    pub available_slots: i64,
    pub application_deadline: NaiveDate,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<DbScholarship> for Scholarship {
    type Error = AppError;

    fn try_from(db: DbScholarship) -> Result<Self, Self::Error> {
        let status = db.status.parse().map_err(|e: Error| {
            AppError::Internal(format!("Scholarship {}: {}", db.scholarship_id, e))
        })?;

        Ok(Self {
            scholarship_id: db.scholarship_id,
            scholarship_name: db.scholarship_name,
            provider: db.provider,
            description: db.description,
            eligibility_criteria: db.eligibility_criteria,
            available_slots: db.available_slots,
            application_deadline: db.application_deadline,
            status,
            created_at: db.created_at,
            updated_at: db.updated_at,
        })
    }
}

/// A learner who applied for a scholarship, as staff see them.
#[derive(Debug, Clone, Serialize)]
pub struct Applicant {
    pub learner_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub status: ApplicationStatus,
    pub application_date: NaiveDateTime,
    pub date_processed: Option<NaiveDateTime>,
    pub remarks: Option<String>,
    pub documents: DocumentPaths,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbApplicant {
    pub learner_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub status: String,
    pub application_date: NaiveDateTime,
    pub date_processed: Option<NaiveDateTime>,
    pub remarks: Option<String>,
    pub documents: String,
}

impl TryFrom<DbApplicant> for Applicant {
    type Error = AppError;

    fn try_from(db: DbApplicant) -> Result<Self, Self::Error> {
        let status = db.status.parse().map_err(|e: Error| {
            AppError::Internal(format!("Application of learner {}: {}", db.learner_id, e))
        })?;

        Ok(Self {
            learner_id: db.learner_id,
            first_name: db.first_name,
            last_name: db.last_name,
            email: db.email.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            status,
            application_date: db.application_date,
            date_processed: db.date_processed,
            remarks: db.remarks,
            documents: serde_json::from_str(&db.documents)?,
        })
    }
}

/// An application from the learner's side.
#[derive(Debug, Clone, Serialize)]
pub struct ScholarshipApplication {
    pub id: i64,
    pub scholarship_id: i64,
    pub scholarship_name: String,
    pub provider: String,
    pub status: ApplicationStatus,
    pub application_date: NaiveDateTime,
    pub date_processed: Option<NaiveDateTime>,
    pub remarks: Option<String>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbScholarshipApplication {
    pub id: i64,
    pub scholarship_id: i64,
    pub scholarship_name: String,
    pub provider: String,
    pub status: String,
    pub application_date: NaiveDateTime,
    pub date_processed: Option<NaiveDateTime>,
    pub remarks: Option<String>,
}

impl TryFrom<DbScholarshipApplication> for ScholarshipApplication {
    type Error = AppError;

    fn try_from(db: DbScholarshipApplication) -> Result<Self, Self::Error> {
        let status = db.status.parse().map_err(|e: Error| {
            AppError::Internal(format!("Application {}: {}", db.id, e))
        })?;

        Ok(Self {
            id: db.id,
            scholarship_id: db.scholarship_id,
            scholarship_name: db.scholarship_name,
            provider: db.provider,
            status,
            application_date: db.application_date,
            date_processed: db.date_processed,
            remarks: db.remarks,
        })
    }
}

/// Applicant counts shown next to a scholarship. Slots are not enforced.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ApplicantCounts {
    pub total: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub remaining_slots: i64,
}

impl ApplicantCounts {
    pub fn tally(applicants: &[Applicant], available_slots: i64) -> Self {
        let mut counts = ApplicantCounts {
            total: applicants.len() as i64,
            ..Default::default()
        };

        for applicant in applicants {
            match applicant.status {
                ApplicationStatus::Pending => counts.pending += 1,
                ApplicationStatus::Approved => counts.approved += 1,
                ApplicationStatus::Rejected => counts.rejected += 1,
            }
        }

        counts.remaining_slots = (available_slots - counts.approved).max(0);
        counts
    }
}
