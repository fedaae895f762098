use std::fmt;
use std::str::FromStr;

use anyhow::Error;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::auth::User;
use crate::error::AppError;

use super::EnrollmentStatus;

pub const NOT_AVAILABLE: &str = "N/A";

pub const GENDERS: [&str; 2] = ["Male", "Female"];

pub const CIVIL_STATUSES: [&str; 4] = [
    "Single",
    "Married",
    "Widowed/Divorced/Annulled",
    "Common Law/Live-in",
];

/// Highest educational attainment, one per learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EducationLevel {
    NoGradeCompleted,
    ElementaryUndergraduate,
    ElementaryGraduate,
    JuniorHighK12,
    SeniorHighK12,
    HighSchoolUndergraduate,
    HighSchoolGraduate,
    PostSecondaryUndergraduate,
    PostSecondaryGraduate,
    CollegeUndergraduate,
    CollegeGraduate,
    Masteral,
    Doctorate,
}

impl EducationLevel {
    pub const ALL: [EducationLevel; 13] = [
        EducationLevel::NoGradeCompleted,
        EducationLevel::ElementaryUndergraduate,
        EducationLevel::ElementaryGraduate,
        EducationLevel::JuniorHighK12,
        EducationLevel::SeniorHighK12,
        EducationLevel::HighSchoolUndergraduate,
        EducationLevel::HighSchoolGraduate,
        EducationLevel::PostSecondaryUndergraduate,
        EducationLevel::PostSecondaryGraduate,
        EducationLevel::CollegeUndergraduate,
        EducationLevel::CollegeGraduate,
        EducationLevel::Masteral,
        EducationLevel::Doctorate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EducationLevel::NoGradeCompleted => "no_grade_completed",
            EducationLevel::ElementaryUndergraduate => "elementary_undergraduate",
            EducationLevel::ElementaryGraduate => "elementary_graduate",
            EducationLevel::JuniorHighK12 => "junior_high_k12",
            EducationLevel::SeniorHighK12 => "senior_high_k12",
            EducationLevel::HighSchoolUndergraduate => "high_school_undergraduate",
            EducationLevel::HighSchoolGraduate => "high_school_graduate",
            EducationLevel::PostSecondaryUndergraduate => {
                "post_secondary_non_tertiary_technical_vocational_undergraduate"
            }
            EducationLevel::PostSecondaryGraduate => {
                "post_secondary_non_tertiary_technical_vocational_course_graduate"
            }
            EducationLevel::CollegeUndergraduate => "college_undergraduate",
            EducationLevel::CollegeGraduate => "college_graduate",
            EducationLevel::Masteral => "masteral",
            EducationLevel::Doctorate => "doctorate",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EducationLevel::NoGradeCompleted => "No Grade Completed",
            EducationLevel::ElementaryUndergraduate => "Elementary Undergraduate",
            EducationLevel::ElementaryGraduate => "Elementary Graduate",
            EducationLevel::JuniorHighK12 => "Junior High (K-12)",
            EducationLevel::SeniorHighK12 => "Senior High (K-12)",
            EducationLevel::HighSchoolUndergraduate => "High School Undergraduate",
            EducationLevel::HighSchoolGraduate => "High School Graduate",
            EducationLevel::PostSecondaryUndergraduate => {
                "Post-Secondary Non-Tertiary Technical Vocational Undergraduate"
            }
            EducationLevel::PostSecondaryGraduate => {
                "Post-Secondary Non-Tertiary Technical Vocational Course Graduate"
            }
            EducationLevel::CollegeUndergraduate => "College Undergraduate",
            EducationLevel::CollegeGraduate => "College Graduate",
            EducationLevel::Masteral => "Masteral",
            EducationLevel::Doctorate => "Doctorate",
        }
    }
}

impl FromStr for EducationLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EducationLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| Error::msg(format!("Unknown education level: {}", s)))
    }
}

impl fmt::Display for EducationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Classification {
    pub id: i64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub type_name: String,
}

impl Classification {
    pub const OTHERS: &'static str = "Others";

    pub fn is_others(&self) -> bool {
        self.type_name == Self::OTHERS
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DisabilityType {
    pub id: i64,
    pub name: String,
}

/// Row of the enrollment review list.
#[derive(Debug, Serialize)]
pub struct LearnerSummary {
    pub learner_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub contact_no: String,
    pub course_qualification: String,
    pub created_at: DateTime<Utc>,
    pub enrollment_status: EnrollmentStatus,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbLearnerSummary {
    pub learner_id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub contact_no: Option<String>,
    pub course_qualification: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub enrollment_status: Option<String>,
}

impl From<DbLearnerSummary> for LearnerSummary {
    fn from(db: DbLearnerSummary) -> Self {
        Self {
            learner_id: db.learner_id.unwrap_or_default(),
            first_name: db.first_name.unwrap_or_default(),
            last_name: db.last_name.unwrap_or_default(),
            email: db.email.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            contact_no: db.contact_no.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            course_qualification: db
                .course_qualification
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            created_at: db
                .created_at
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
                .unwrap_or_else(Utc::now),
            enrollment_status: db
                .enrollment_status
                .and_then(|s| s.parse().ok())
                .unwrap_or(EnrollmentStatus::Pending),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Learner {
    pub learner_id: i64,
    pub user_id: Option<i64>,
    pub entry_date: NaiveDate,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub extension_name: Option<String>,
    pub gender: String,
    pub civil_status: String,
    pub birth_date: NaiveDate,
    pub age: i64,
    pub birthplace_city_municipality: Option<String>,
    pub birthplace_province: Option<String>,
    pub birthplace_region: Option<String>,
    pub nationality: String,
    pub employment_status: Option<String>,
    pub employment_type: Option<String>,
    pub parent_guardian_name: String,
    pub parent_guardian_mailing_address: String,
    pub enrollment_status: EnrollmentStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Learner {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbLearner {
    pub learner_id: i64,
    pub user_id: Option<i64>,
    pub entry_date: NaiveDate,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub extension_name: Option<String>,
    pub gender: String,
    pub civil_status: String,
    pub birth_date: NaiveDate,
    pub age: i64,
    pub birthplace_city_municipality: Option<String>,
    pub birthplace_province: Option<String>,
    pub birthplace_region: Option<String>,
    pub nationality: String,
    pub employment_status: Option<String>,
    pub employment_type: Option<String>,
    pub parent_guardian_name: String,
    pub parent_guardian_mailing_address: String,
    pub enrollment_status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<DbLearner> for Learner {
    type Error = AppError;

    fn try_from(db: DbLearner) -> Result<Self, Self::Error> {
        let enrollment_status = db.enrollment_status.parse().map_err(|e: Error| {
            AppError::Internal(format!("Learner {}: {}", db.learner_id, e))
        })?;

        Ok(Self {
            learner_id: db.learner_id,
            user_id: db.user_id,
            entry_date: db.entry_date,
            last_name: db.last_name,
            first_name: db.first_name,
            middle_name: db.middle_name,
            extension_name: db.extension_name,
            gender: db.gender,
            civil_status: db.civil_status,
            birth_date: db.birth_date,
            age: db.age,
            birthplace_city_municipality: db.birthplace_city_municipality,
            birthplace_province: db.birthplace_province,
            birthplace_region: db.birthplace_region,
            nationality: db.nationality,
            employment_status: db.employment_status,
            employment_type: db.employment_type,
            parent_guardian_name: db.parent_guardian_name,
            parent_guardian_mailing_address: db.parent_guardian_mailing_address,
            enrollment_status,
            created_at: db.created_at,
            updated_at: db.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LearnerAddress {
    pub number_street: String,
    pub barangay: String,
    pub city_municipality: String,
    pub district: Option<String>,
    pub province: String,
    pub region: String,
    pub email_address: String,
    pub facebook_account: Option<String>,
    pub contact_no: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EducationalAttainment {
    pub level: String,
    pub label: String,
}

impl From<EducationLevel> for EducationalAttainment {
    fn from(level: EducationLevel) -> Self {
        Self {
            level: level.as_str().to_string(),
            label: level.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LearnerClassification {
    pub classification_id: i64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub type_name: String,
    pub other_classification_details: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LearnerDisability {
    pub id: i64,
    pub disability_type_id: i64,
    pub name: String,
    pub cause_of_disability: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CourseEnrollment {
    pub enrollment_id: i64,
    pub learner_id: i64,
    pub course_qualification: String,
    pub scholarship_package: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PrivacyConsent {
    pub consent_given: bool,
    pub date_agreed: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RegistrationSignature {
    pub applicant_signature_printed_name: String,
    pub date_accomplished: NaiveDate,
    pub thumbmark_image_path: String,
    pub picture_image_path: String,
}

/// A learner with every related record, for the review detail page.
#[derive(Debug, Serialize)]
pub struct LearnerDetails {
    #[serde(flatten)]
    pub learner: Learner,
    pub user: Option<User>,
    pub address: Option<LearnerAddress>,
    pub educational_attainment: Option<EducationalAttainment>,
    pub classifications: Vec<LearnerClassification>,
    pub disabilities: Vec<LearnerDisability>,
    pub course_enrollments: Vec<CourseEnrollment>,
    pub privacy_consent: Option<PrivacyConsent>,
    pub registration_signature: Option<RegistrationSignature>,
}
