use chrono::{NaiveDate, Utc};

mod auth;
mod dashboard;
mod enrollments;
mod public;
mod registration;
mod scholarships;
mod student;

pub use auth::*;
pub use dashboard::*;
pub use enrollments::*;
pub use public::*;
pub use registration::*;
pub use scholarships::*;
pub use student::*;

/// Calendar date used for deadline and birth date checks.
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}
