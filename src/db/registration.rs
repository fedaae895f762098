use chrono::NaiveDate;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::{AppError, is_unique_violation};
use crate::models::EnrollmentStatus;
use crate::registration::NewRegistration;

use super::{EMAIL_TAKEN, insert_applicant_user};

/// Where the two registration images were stored, relative to the upload root.
#[derive(Debug, Clone)]
pub struct RegistrationImages {
    pub thumbmark_image_path: String,
    pub picture_image_path: String,
}

/// Writes the applicant user, the pending learner and every sub-record in one
/// transaction. Returns the new learner id.
#[instrument(skip_all, fields(email = %registration.input.email))]
pub async fn insert_registration(
    pool: &Pool<Sqlite>,
    registration: &NewRegistration,
    images: &RegistrationImages,
    today: NaiveDate,
) -> Result<i64, AppError> {
    info!("Persisting learner registration");
    let input = &registration.input;
    let mut tx = pool.begin().await?;

    let user_id = insert_applicant_user(&mut tx, &registration.full_name(), &input.email)
        .await
        .map_err(|err| match err {
            AppError::Database(db_err) if is_unique_violation(&db_err) => {
                AppError::Validation(EMAIL_TAKEN.to_string())
            }
            other => other,
        })?;

    let learner_id = sqlx::query(
        "INSERT INTO learners (user_id, entry_date, last_name, first_name, middle_name, \
         extension_name, gender, civil_status, birth_date, age, birthplace_city_municipality, \
         birthplace_province, birthplace_region, nationality, employment_status, employment_type, \
         parent_guardian_name, parent_guardian_mailing_address, enrollment_status) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(today)
    .bind(&input.last_name)
    .bind(&input.first_name)
    .bind(&input.middle_name)
    .bind(&input.extension_name)
    .bind(&input.gender)
    .bind(&input.civil_status)
    .bind(registration.birth_date)
    .bind(registration.age)
    .bind(&input.birthplace_city_municipality)
    .bind(&input.birthplace_province)
    .bind(&input.birthplace_region)
    .bind(&input.nationality)
    .bind(&input.employment_status)
    .bind(&input.employment_type)
    .bind(&input.parent_guardian_name)
    .bind(&input.parent_guardian_mailing_address)
    .bind(EnrollmentStatus::Pending.as_str())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    sqlx::query(
        "INSERT INTO learner_addresses (learner_id, number_street, barangay, city_municipality, \
         district, province, region, email_address, facebook_account, contact_no) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(learner_id)
    .bind(&input.number_street)
    .bind(&input.barangay)
    .bind(&input.city_municipality)
    .bind(&input.district)
    .bind(&input.province)
    .bind(&input.region)
    .bind(&input.email)
    .bind(&input.facebook_account)
    .bind(&input.contact_no)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO educational_attainments (learner_id, level) VALUES (?, ?)")
        .bind(learner_id)
        .bind(registration.education.as_str())
        .execute(&mut *tx)
        .await?;

    for (classification_id, details) in &registration.classifications {
        sqlx::query(
            "INSERT INTO learner_classifications \
             (learner_id, classification_id, other_classification_details) VALUES (?, ?, ?)",
        )
        .bind(learner_id)
        .bind(classification_id)
        .bind(details)
        .execute(&mut *tx)
        .await?;
    }

    for (disability_type_id, cause) in &registration.disabilities {
        sqlx::query(
            "INSERT INTO learner_disabilities (learner_id, disability_type_id, cause_of_disability) \
             VALUES (?, ?, ?)",
        )
        .bind(learner_id)
        .bind(disability_type_id)
        .bind(cause)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        "INSERT INTO course_enrollments (learner_id, course_qualification, scholarship_package) \
         VALUES (?, ?, ?)",
    )
    .bind(learner_id)
    .bind(&input.course_qualification)
    .bind(&input.scholarship_package)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO privacy_consents (learner_id, consent_given, date_agreed) VALUES (?, ?, ?)",
    )
    .bind(learner_id)
    .bind(input.consent_given)
    .bind(today)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO registration_signatures (learner_id, applicant_signature_printed_name, \
         date_accomplished, thumbmark_image_path, picture_image_path) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(learner_id)
    .bind(registration.full_name())
    .bind(today)
    .bind(&images.thumbmark_image_path)
    .bind(&images.picture_image_path)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(learner_id, user_id, "Learner registration stored");
    Ok(learner_id)
}
