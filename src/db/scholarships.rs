use chrono::NaiveDate;
use sqlx::{Pool, QueryBuilder, Sqlite};
use tracing::{info, instrument};

use crate::error::{AppError, is_unique_violation};
use crate::models::{DbScholarship, Scholarship, ScholarshipStatus};
use crate::pagination::{PageRequest, Paginated};

pub const SCHOLARSHIP_NAME_TAKEN: &str = "The scholarship name has already been taken.";

const SCHOLARSHIP_COLUMNS: &str = "scholarship_id, scholarship_name, provider, description, \
    eligibility_criteria, available_slots, application_deadline, status, created_at, updated_at";

/// Validated values for creating or updating a scholarship.
#[derive(Debug, Clone)]
pub struct ScholarshipFields {
    pub scholarship_name: String,
    pub provider: String,
    pub description: Option<String>,
    pub eligibility_criteria: String,
    pub available_slots: i64,
    pub application_deadline: NaiveDate,
    pub status: ScholarshipStatus,
}

fn push_search(builder: &mut QueryBuilder<'_, Sqlite>, search: Option<&str>) {
    if let Some(search) = search {
        builder
            .push(" WHERE instr(lower(scholarship_name), lower(")
            .push_bind(search.to_string())
            .push(")) > 0 OR instr(lower(provider), lower(")
            .push_bind(search.to_string())
            .push(")) > 0");
    }
}

#[instrument(skip(pool))]
pub async fn list_scholarships(
    pool: &Pool<Sqlite>,
    search: Option<&str>,
    page: PageRequest,
) -> Result<Paginated<Scholarship>, AppError> {
    info!("Listing scholarships");

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM scholarships");
    push_search(&mut count, search);
    let total = count.build_query_scalar::<i64>().fetch_one(pool).await?;

    let mut query =
        QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM scholarships", SCHOLARSHIP_COLUMNS));
    push_search(&mut query, search);
    query
        .push(" ORDER BY created_at DESC, scholarship_id DESC LIMIT ")
        .push_bind(page.per_page)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows = query.build_query_as::<DbScholarship>().fetch_all(pool).await?;
    let scholarships = rows
        .into_iter()
        .map(Scholarship::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Paginated::new(scholarships, page, total))
}

/// Scholarships a learner may apply to on `today`, soonest deadline first.
#[instrument(skip(pool))]
pub async fn list_open_scholarships(
    pool: &Pool<Sqlite>,
    today: NaiveDate,
) -> Result<Vec<Scholarship>, AppError> {
    info!("Listing open scholarships");
    let rows = sqlx::query_as::<_, DbScholarship>(&format!(
        "SELECT {} FROM scholarships WHERE status = ? AND application_deadline > ? \
         ORDER BY application_deadline ASC, scholarship_id ASC",
        SCHOLARSHIP_COLUMNS
    ))
    .bind(ScholarshipStatus::Open.as_str())
    .bind(today)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Scholarship::try_from).collect()
}

#[instrument(skip(pool))]
pub async fn get_scholarship(
    pool: &Pool<Sqlite>,
    scholarship_id: i64,
) -> Result<Scholarship, AppError> {
    info!("Fetching scholarship");
    let row = sqlx::query_as::<_, DbScholarship>(&format!(
        "SELECT {} FROM scholarships WHERE scholarship_id = ?",
        SCHOLARSHIP_COLUMNS
    ))
    .bind(scholarship_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(scholarship) => Scholarship::try_from(scholarship),
        None => Err(AppError::NotFound(format!(
            "Scholarship {} not found",
            scholarship_id
        ))),
    }
}

/// Whether another scholarship already uses `name`. `except` is the one being edited.
#[instrument(skip(pool))]
pub async fn scholarship_name_taken(
    pool: &Pool<Sqlite>,
    name: &str,
    except: Option<i64>,
) -> Result<bool, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM scholarships WHERE scholarship_name = ? AND scholarship_id != ?",
    )
    .bind(name)
    .bind(except.unwrap_or(-1))
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

fn name_conflict(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Validation(SCHOLARSHIP_NAME_TAKEN.to_string())
    } else {
        AppError::Database(err)
    }
}

#[instrument(skip(pool))]
pub async fn create_scholarship(
    pool: &Pool<Sqlite>,
    fields: &ScholarshipFields,
) -> Result<i64, AppError> {
    info!("Creating scholarship");
    let res = sqlx::query(
        "INSERT INTO scholarships (scholarship_name, provider, description, eligibility_criteria, \
         available_slots, application_deadline, status) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&fields.scholarship_name)
    .bind(&fields.provider)
    .bind(&fields.description)
    .bind(&fields.eligibility_criteria)
    .bind(fields.available_slots)
    .bind(fields.application_deadline)
    .bind(fields.status.as_str())
    .execute(pool)
    .await
    .map_err(name_conflict)?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn update_scholarship(
    pool: &Pool<Sqlite>,
    scholarship_id: i64,
    fields: &ScholarshipFields,
) -> Result<(), AppError> {
    info!("Updating scholarship");
    let result = sqlx::query(
        "UPDATE scholarships SET scholarship_name = ?, provider = ?, description = ?, \
         eligibility_criteria = ?, available_slots = ?, application_deadline = ?, status = ?, \
         updated_at = CURRENT_TIMESTAMP WHERE scholarship_id = ?",
    )
    .bind(&fields.scholarship_name)
    .bind(&fields.provider)
    .bind(&fields.description)
    .bind(&fields.eligibility_criteria)
    .bind(fields.available_slots)
    .bind(fields.application_deadline)
    .bind(fields.status.as_str())
    .bind(scholarship_id)
    .execute(pool)
    .await
    .map_err(name_conflict)?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Scholarship {} not found",
            scholarship_id
        )));
    }

    Ok(())
}

/// Applications go with it through the cascading foreign key.
#[instrument(skip(pool))]
pub async fn delete_scholarship(pool: &Pool<Sqlite>, scholarship_id: i64) -> Result<(), AppError> {
    info!("Deleting scholarship");
    let result = sqlx::query("DELETE FROM scholarships WHERE scholarship_id = ?")
        .bind(scholarship_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Scholarship {} not found",
            scholarship_id
        )));
    }

    Ok(())
}
