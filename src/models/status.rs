use std::fmt;
use std::str::FromStr;

use anyhow::Error;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Gate on whether a learner gets portal access. Decisions are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentDecision {
    Accept,
    Reject,
}

impl EnrollmentStatus {
    pub const ALL: [EnrollmentStatus; 3] = [
        EnrollmentStatus::Pending,
        EnrollmentStatus::Accepted,
        EnrollmentStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "pending",
            EnrollmentStatus::Accepted => "accepted",
            EnrollmentStatus::Rejected => "rejected",
        }
    }

    pub fn apply(self, decision: EnrollmentDecision) -> Result<EnrollmentStatus, AppError> {
        if self != EnrollmentStatus::Pending {
            return Err(AppError::Conflict(
                "Enrollment has already been processed.".to_string(),
            ));
        }

        Ok(match decision {
            EnrollmentDecision::Accept => EnrollmentStatus::Accepted,
            EnrollmentDecision::Reject => EnrollmentStatus::Rejected,
        })
    }
}

impl FromStr for EnrollmentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EnrollmentStatus::Pending),
            "accepted" => Ok(EnrollmentStatus::Accepted),
            "rejected" => Ok(EnrollmentStatus::Rejected),
            _ => Err(Error::msg(format!("Unknown enrollment status: {}", s))),
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per learner, per scholarship. Starts Pending and is decided once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "Pending",
            ApplicationStatus::Approved => "Approved",
            ApplicationStatus::Rejected => "Rejected",
        }
    }

    pub fn is_decision(&self) -> bool {
        matches!(self, ApplicationStatus::Approved | ApplicationStatus::Rejected)
    }

    pub fn decide(self, target: ApplicationStatus) -> Result<ApplicationStatus, AppError> {
        if !target.is_decision() {
            return Err(AppError::Validation(
                "The selected status is invalid.".to_string(),
            ));
        }

        if self != ApplicationStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Application has already been {}.",
                self.as_str().to_lowercase()
            )));
        }

        Ok(target)
    }
}

impl FromStr for ApplicationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ApplicationStatus::Pending),
            "Approved" => Ok(ApplicationStatus::Approved),
            "Rejected" => Ok(ApplicationStatus::Rejected),
            _ => Err(Error::msg(format!("Unknown application status: {}", s))),
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScholarshipStatus {
    Open,
    Closed,
    Ongoing,
}

impl ScholarshipStatus {
    pub const ALL: [ScholarshipStatus; 3] = [
        ScholarshipStatus::Open,
        ScholarshipStatus::Closed,
        ScholarshipStatus::Ongoing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScholarshipStatus::Open => "Open",
            ScholarshipStatus::Closed => "Closed",
            ScholarshipStatus::Ongoing => "Ongoing",
        }
    }
}

impl FromStr for ScholarshipStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(ScholarshipStatus::Open),
            "Closed" => Ok(ScholarshipStatus::Closed),
            "Ongoing" => Ok(ScholarshipStatus::Ongoing),
            _ => Err(Error::msg(format!("Unknown scholarship status: {}", s))),
        }
    }
}

impl fmt::Display for ScholarshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
