use sqlx::{Pool, QueryBuilder, Sqlite, SqliteConnection};
use tracing::{info, instrument, warn};

use crate::auth::{DbUser, User};
use crate::error::AppError;
use crate::models::{
    Classification, CourseEnrollment, DbLearner, DbLearnerSummary, DisabilityType,
    EducationLevel, EducationalAttainment, EnrollmentStatus, Learner, LearnerAddress,
    LearnerClassification, LearnerDetails, LearnerDisability, LearnerSummary, PrivacyConsent,
    RegistrationSignature,
};
use crate::pagination::{PageRequest, Paginated};

const LEARNER_COLUMNS: &str = "learner_id, user_id, entry_date, last_name, first_name, \
    middle_name, extension_name, gender, civil_status, birth_date, age, \
    birthplace_city_municipality, birthplace_province, birthplace_region, nationality, \
    employment_status, employment_type, parent_guardian_name, parent_guardian_mailing_address, \
    enrollment_status, created_at, updated_at";

/// Filters of the enrollment review list. Both apply together.
#[derive(Debug, Clone, Default)]
pub struct LearnerFilter {
    pub search: Option<String>,
    pub status: Option<EnrollmentStatus>,
}

fn push_learner_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &LearnerFilter) {
    builder.push(" WHERE 1 = 1");

    if let Some(search) = &filter.search {
        builder
            .push(" AND (instr(lower(l.first_name), lower(")
            .push_bind(search.clone())
            .push(")) > 0 OR instr(lower(l.last_name), lower(")
            .push_bind(search.clone())
            .push(")) > 0 OR instr(lower(COALESCE(u.email, '')), lower(")
            .push_bind(search.clone())
            .push(")) > 0)");
    }

    if let Some(status) = filter.status {
        builder
            .push(" AND l.enrollment_status = ")
            .push_bind(status.as_str());
    }
}

#[instrument(skip(pool))]
pub async fn list_learners(
    pool: &Pool<Sqlite>,
    filter: &LearnerFilter,
    page: PageRequest,
) -> Result<Paginated<LearnerSummary>, AppError> {
    info!("Listing learners for enrollment review");

    let mut count = QueryBuilder::<Sqlite>::new(
        "SELECT COUNT(*) FROM learners l LEFT JOIN users u ON u.id = l.user_id",
    );
    push_learner_filters(&mut count, filter);
    let total = count.build_query_scalar::<i64>().fetch_one(pool).await?;

    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT l.learner_id, l.first_name, l.last_name, u.email AS email, \
         a.contact_no AS contact_no, \
         (SELECT ce.course_qualification FROM course_enrollments ce \
          WHERE ce.learner_id = l.learner_id ORDER BY ce.enrollment_id LIMIT 1) AS course_qualification, \
         l.created_at, l.enrollment_status \
         FROM learners l \
         LEFT JOIN users u ON u.id = l.user_id \
         LEFT JOIN learner_addresses a ON a.learner_id = l.learner_id",
    );
    push_learner_filters(&mut query, filter);
    query
        .push(" ORDER BY l.created_at DESC, l.learner_id DESC LIMIT ")
        .push_bind(page.per_page)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows = query
        .build_query_as::<DbLearnerSummary>()
        .fetch_all(pool)
        .await?;

    let learners = rows.into_iter().map(LearnerSummary::from).collect();

    Ok(Paginated::new(learners, page, total))
}

#[instrument(skip(pool))]
pub async fn get_learner(pool: &Pool<Sqlite>, learner_id: i64) -> Result<Learner, AppError> {
    info!("Fetching learner");
    let row = sqlx::query_as::<_, DbLearner>(&format!(
        "SELECT {} FROM learners WHERE learner_id = ?",
        LEARNER_COLUMNS
    ))
    .bind(learner_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(learner) => Learner::try_from(learner),
        None => Err(AppError::NotFound(format!("Learner {} not found", learner_id))),
    }
}

/// The learner profile linked to a login, if the user registered through the form.
#[instrument(skip(pool))]
pub async fn find_learner_by_user(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Option<Learner>, AppError> {
    info!("Finding learner by user");
    let row = sqlx::query_as::<_, DbLearner>(&format!(
        "SELECT {} FROM learners WHERE user_id = ?",
        LEARNER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.map(Learner::try_from).transpose()
}

#[instrument(skip(pool))]
pub async fn get_learner_details(
    pool: &Pool<Sqlite>,
    learner_id: i64,
) -> Result<LearnerDetails, AppError> {
    info!("Fetching learner with related records");
    let learner = get_learner(pool, learner_id).await?;

    let user = match learner.user_id {
        Some(user_id) => sqlx::query_as::<_, DbUser>(
            "SELECT id, name, email, role FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .map(User::from),
        None => None,
    };

    let address = sqlx::query_as::<_, LearnerAddress>(
        "SELECT number_street, barangay, city_municipality, district, province, region, \
         email_address, facebook_account, contact_no \
         FROM learner_addresses WHERE learner_id = ?",
    )
    .bind(learner_id)
    .fetch_optional(pool)
    .await?;

    let level: Option<String> =
        sqlx::query_scalar("SELECT level FROM educational_attainments WHERE learner_id = ?")
            .bind(learner_id)
            .fetch_optional(pool)
            .await?;

    let educational_attainment = match level {
        Some(level) => match level.parse::<EducationLevel>() {
            Ok(level) => Some(EducationalAttainment::from(level)),
            Err(err) => {
                warn!(learner_id, error = %err, "Stored education level is not recognised");
                None
            }
        },
        None => None,
    };

    let classifications = sqlx::query_as::<_, LearnerClassification>(
        "SELECT lc.classification_id, c.type, lc.other_classification_details \
         FROM learner_classifications lc \
         JOIN classifications c ON c.id = lc.classification_id \
         WHERE lc.learner_id = ? ORDER BY lc.classification_id",
    )
    .bind(learner_id)
    .fetch_all(pool)
    .await?;

    let disabilities = sqlx::query_as::<_, LearnerDisability>(
        "SELECT ld.id, ld.disability_type_id, dt.name, ld.cause_of_disability \
         FROM learner_disabilities ld \
         JOIN disability_types dt ON dt.id = ld.disability_type_id \
         WHERE ld.learner_id = ? ORDER BY ld.id",
    )
    .bind(learner_id)
    .fetch_all(pool)
    .await?;

    let course_enrollments = sqlx::query_as::<_, CourseEnrollment>(
        "SELECT enrollment_id, learner_id, course_qualification, scholarship_package, created_at \
         FROM course_enrollments WHERE learner_id = ? ORDER BY enrollment_id",
    )
    .bind(learner_id)
    .fetch_all(pool)
    .await?;

    let privacy_consent = sqlx::query_as::<_, PrivacyConsent>(
        "SELECT consent_given, date_agreed FROM privacy_consents WHERE learner_id = ?",
    )
    .bind(learner_id)
    .fetch_optional(pool)
    .await?;

    let registration_signature = sqlx::query_as::<_, RegistrationSignature>(
        "SELECT applicant_signature_printed_name, date_accomplished, thumbmark_image_path, \
         picture_image_path FROM registration_signatures WHERE learner_id = ?",
    )
    .bind(learner_id)
    .fetch_optional(pool)
    .await?;

    Ok(LearnerDetails {
        learner,
        user,
        address,
        educational_attainment,
        classifications,
        disabilities,
        course_enrollments,
        privacy_consent,
        registration_signature,
    })
}

/// Moves a pending learner to `target`. Returns false when the learner was no
/// longer pending, so a concurrent reviewer loses cleanly.
#[instrument(skip(conn))]
pub async fn set_enrollment_status(
    conn: &mut SqliteConnection,
    learner_id: i64,
    target: EnrollmentStatus,
) -> Result<bool, AppError> {
    info!("Updating enrollment status");
    let result = sqlx::query(
        "UPDATE learners SET enrollment_status = ?, updated_at = CURRENT_TIMESTAMP \
         WHERE learner_id = ? AND enrollment_status = 'pending'",
    )
    .bind(target.as_str())
    .bind(learner_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[instrument(skip(pool))]
pub async fn list_classifications(pool: &Pool<Sqlite>) -> Result<Vec<Classification>, AppError> {
    info!("Listing classifications");
    let rows = sqlx::query_as::<_, Classification>("SELECT id, type FROM classifications ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn list_disability_types(pool: &Pool<Sqlite>) -> Result<Vec<DisabilityType>, AppError> {
    info!("Listing disability types");
    let rows =
        sqlx::query_as::<_, DisabilityType>("SELECT id, name FROM disability_types ORDER BY id")
            .fetch_all(pool)
            .await?;

    Ok(rows)
}
