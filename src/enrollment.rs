use rand::{Rng, distr::Alphanumeric};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::auth::Role;
use crate::db::{get_learner, get_user, set_enrollment_status, set_user_credentials};
use crate::error::AppError;
use crate::mail::{EnrollmentAcceptedMail, Mailer};
use crate::models::{EnrollmentDecision, EnrollmentStatus};

pub const CREDENTIAL_LENGTH: usize = 10;

pub const ALREADY_PROCESSED: &str = "Enrollment has already been processed.";
pub const NO_USER: &str = "No associated user found for this learner.";
pub const ACCEPTED_MESSAGE: &str = "Learner accepted and email sent with credentials.";
pub const ACCEPTED_MAIL_FAILED_MESSAGE: &str =
    "Learner accepted, but email sending failed. Please check mail configuration.";
pub const REJECTED_MESSAGE: &str = "Learner enrollment rejected.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    MailSent,
    MailFailed,
}

impl AcceptOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            AcceptOutcome::MailSent => ACCEPTED_MESSAGE,
            AcceptOutcome::MailFailed => ACCEPTED_MAIL_FAILED_MESSAGE,
        }
    }
}

pub fn generate_credential() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CREDENTIAL_LENGTH)
        .map(char::from)
        .collect()
}

/// Provisions the learner's login and mails the new credential.
///
/// The password, role and status are written in one transaction and the
/// status write only applies while the learner is still pending. The mail is
/// sent after commit; a failed send leaves the acceptance in place.
#[instrument(skip(pool, mailer))]
pub async fn accept_enrollment(
    pool: &Pool<Sqlite>,
    mailer: &dyn Mailer,
    learner_id: i64,
) -> Result<AcceptOutcome, AppError> {
    let learner = get_learner(pool, learner_id).await?;
    let target = learner.enrollment_status.apply(EnrollmentDecision::Accept)?;

    let Some(user_id) = learner.user_id else {
        return Err(AppError::Conflict(NO_USER.to_string()));
    };

    let user = match get_user(pool, user_id).await {
        Ok(user) => user,
        Err(AppError::NotFound(_)) => return Err(AppError::Conflict(NO_USER.to_string())),
        Err(err) => return Err(err),
    };

    let credential = generate_credential();
    let password_hash = bcrypt::hash(&credential, bcrypt::DEFAULT_COST)?;

    let mut tx = pool.begin().await?;

    if !set_enrollment_status(&mut tx, learner_id, target).await? {
        return Err(AppError::Conflict(ALREADY_PROCESSED.to_string()));
    }

    set_user_credentials(&mut tx, user.id, &password_hash, Role::Learner).await?;

    tx.commit().await?;
    info!(learner_id, user_id = user.id, "Learner accepted");

    let mail = EnrollmentAcceptedMail {
        to: user.email.clone(),
        name: learner.full_name(),
        username: user.email.clone(),
        password: credential,
    };

    match mailer.send_enrollment_accepted(&mail).await {
        Ok(()) => Ok(AcceptOutcome::MailSent),
        Err(err) => {
            err.log_and_record("Sending enrollment accepted mail");
            warn!(learner_id, "Acceptance kept although the credentials mail failed");
            Ok(AcceptOutcome::MailFailed)
        }
    }
}

#[instrument(skip(pool))]
pub async fn reject_enrollment(pool: &Pool<Sqlite>, learner_id: i64) -> Result<(), AppError> {
    let learner = get_learner(pool, learner_id).await?;
    let target = learner.enrollment_status.apply(EnrollmentDecision::Reject)?;

    let mut conn = pool.acquire().await?;
    if !set_enrollment_status(&mut conn, learner_id, target).await? {
        return Err(AppError::Conflict(ALREADY_PROCESSED.to_string()));
    }

    info!(learner_id, "Learner rejected");
    Ok(())
}

/// Parses the `status` filter of the review list; unknown values mean no filter.
pub fn status_filter(raw: Option<&str>) -> Option<EnrollmentStatus> {
    raw.and_then(|value| value.parse().ok())
}
