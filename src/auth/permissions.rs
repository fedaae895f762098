use anyhow::Error;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewOwnProfile,
    ViewOwnDashboard,
    ApplyForScholarships,

    ReviewEnrollments,
    ManageScholarships,
    ProcessApplications,
    ViewStaffDashboard,

    AccessAdminArea,
    ViewAdminDashboard,
    RegisterStaff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Applicant,
    Learner,
    Staff,
    Admin,
}

static APPLICANT_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewOwnProfile);

    permissions
});

static LEARNER_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(APPLICANT_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ViewOwnDashboard);
    permissions.insert(Permission::ApplyForScholarships);

    permissions
});

static STAFF_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(APPLICANT_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ViewOwnDashboard);
    permissions.insert(Permission::ReviewEnrollments);
    permissions.insert(Permission::ManageScholarships);
    permissions.insert(Permission::ProcessApplications);
    permissions.insert(Permission::ViewStaffDashboard);

    permissions
});

static ADMIN_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(STAFF_PERMISSIONS.iter().copied());

    permissions.insert(Permission::AccessAdminArea);
    permissions.insert(Permission::ViewAdminDashboard);
    permissions.insert(Permission::RegisterStaff);

    permissions
});

impl Role {
    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Applicant => &APPLICANT_PERMISSIONS,
            Role::Learner => &LEARNER_PERMISSIONS,
            Role::Staff => &STAFF_PERMISSIONS,
            Role::Admin => &ADMIN_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Applicant => "applicant",
            Role::Learner => "learner",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }

    /// Landing page after a successful login.
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Admin => "/admin/dashboard",
            Role::Staff => "/staff/dashboard",
            Role::Learner | Role::Applicant => "/dashboard",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "applicant" => Ok(Role::Applicant),
            "learner" => Ok(Role::Learner),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            _ => Err(Error::msg(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
