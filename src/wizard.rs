use serde::Serialize;

use crate::validation::FieldErrors;

/// Steps of the public registration form, in the order they are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WizardStep {
    PersonalInfo,
    ContactAndAddress,
    Education,
    ClassAndDisability,
    CourseAndScholarship,
    ConsentAndUploads,
    ReviewAndSubmit,
}

#[derive(Debug, Serialize)]
pub struct StepDescriptor {
    pub index: usize,
    pub title: &'static str,
    pub fields: &'static [&'static str],
}

impl WizardStep {
    pub const ALL: [WizardStep; 7] = [
        WizardStep::PersonalInfo,
        WizardStep::ContactAndAddress,
        WizardStep::Education,
        WizardStep::ClassAndDisability,
        WizardStep::CourseAndScholarship,
        WizardStep::ConsentAndUploads,
        WizardStep::ReviewAndSubmit,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn title(&self) -> &'static str {
        match self {
            WizardStep::PersonalInfo => "Personal Info",
            WizardStep::ContactAndAddress => "Contact & Address",
            WizardStep::Education => "Education",
            WizardStep::ClassAndDisability => "Class & Disability",
            WizardStep::CourseAndScholarship => "Course & Scholarship",
            WizardStep::ConsentAndUploads => "Consent & Uploads",
            WizardStep::ReviewAndSubmit => "Review & Submit",
        }
    }

    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            WizardStep::PersonalInfo => &[
                "last_name",
                "first_name",
                "middle_name",
                "extension_name",
                "gender",
                "civil_status",
                "birth_date",
                "age",
                "birthplace_city_municipality",
                "birthplace_province",
                "birthplace_region",
                "email",
                "nationality",
                "employment_status",
                "employment_type",
            ],
            WizardStep::ContactAndAddress => &[
                "number_street",
                "city_municipality",
                "barangay",
                "district",
                "province",
                "region",
                "contact_no",
                "facebook_account",
                "parent_guardian_name",
                "parent_guardian_mailing_address",
            ],
            WizardStep::Education => &["educational_attainment"],
            WizardStep::ClassAndDisability => &[
                "classifications",
                "other_classification_details",
                "disability_types",
                "cause_of_disability",
            ],
            WizardStep::CourseAndScholarship => &["course_qualification", "scholarship_package"],
            WizardStep::ConsentAndUploads => &["consent_given", "thumbmark_image", "picture_image"],
            WizardStep::ReviewAndSubmit => &[],
        }
    }

    /// Indexed names such as `classifications[0]` belong to their base field.
    pub fn for_field(field: &str) -> Option<WizardStep> {
        let base = field.split(['[', '.']).next().unwrap_or(field);
        Self::ALL
            .into_iter()
            .find(|step| step.fields().contains(&base))
    }

    pub fn earliest_with_error(errors: &FieldErrors) -> Option<WizardStep> {
        errors.fields().filter_map(Self::for_field).min()
    }

    pub fn catalogue() -> Vec<StepDescriptor> {
        Self::ALL
            .iter()
            .map(|step| StepDescriptor {
                index: step.index(),
                title: step.title(),
                fields: step.fields(),
            })
            .collect()
    }
}
