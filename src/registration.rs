use chrono::NaiveDate;
use validator::Validate;

use crate::models::{CIVIL_STATUSES, Classification, DisabilityType, EducationLevel, GENDERS};
use crate::validation::{CONTACT_NO, FieldErrors, require};

/// Text fields of the public registration form after trimming.
#[derive(Debug, Clone, Default, Validate)]
pub struct RegistrationInput {
    #[validate(length(max = 255, message = "The last name field must not be greater than 255 characters."))]
    pub last_name: String,
    #[validate(length(max = 255, message = "The first name field must not be greater than 255 characters."))]
    pub first_name: String,
    #[validate(length(max = 255, message = "The middle name field must not be greater than 255 characters."))]
    pub middle_name: Option<String>,
    #[validate(length(max = 50, message = "The extension name field must not be greater than 50 characters."))]
    pub extension_name: Option<String>,
    pub gender: String,
    pub civil_status: String,
    pub birth_date: String,
    #[validate(range(min = 1, max = 120, message = "The age field must be between 1 and 120."))]
    pub age: Option<i64>,
    pub birthplace_city_municipality: Option<String>,
    pub birthplace_province: Option<String>,
    pub birthplace_region: Option<String>,
    #[validate(email(message = "The email field must be a valid email address."))]
    pub email: String,
    pub nationality: String,
    pub employment_status: Option<String>,
    pub employment_type: Option<String>,

    pub number_street: String,
    pub city_municipality: String,
    pub barangay: String,
    pub district: Option<String>,
    pub province: String,
    pub region: String,
    pub contact_no: String,
    pub facebook_account: Option<String>,
    pub parent_guardian_name: String,
    pub parent_guardian_mailing_address: String,

    pub educational_attainment: String,

    pub classifications: Vec<i64>,
    pub other_classification_details: Option<String>,
    pub disability_types: Vec<i64>,
    pub cause_of_disability: Option<String>,

    #[validate(length(max = 255, message = "The course qualification field must not be greater than 255 characters."))]
    pub course_qualification: String,
    pub scholarship_package: Option<String>,

    pub consent_given: bool,
}

/// Turns blank optional text into `None`.
pub fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// A registration that passed every field rule, with typed values.
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub input: RegistrationInput,
    pub birth_date: NaiveDate,
    pub age: i64,
    pub education: EducationLevel,
    /// Classification id with the free-text detail for "Others".
    pub classifications: Vec<(i64, Option<String>)>,
    pub disabilities: Vec<(i64, Option<String>)>,
}

impl NewRegistration {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.input.first_name, self.input.last_name)
    }
}

const REQUIRED_TEXT: [&str; 16] = [
    "last_name",
    "first_name",
    "gender",
    "civil_status",
    "birth_date",
    "email",
    "nationality",
    "number_street",
    "city_municipality",
    "barangay",
    "province",
    "region",
    "contact_no",
    "parent_guardian_name",
    "parent_guardian_mailing_address",
    "course_qualification",
];

impl RegistrationInput {
    fn text(&self, field: &str) -> &str {
        match field {
            "last_name" => &self.last_name,
            "first_name" => &self.first_name,
            "gender" => &self.gender,
            "civil_status" => &self.civil_status,
            "birth_date" => &self.birth_date,
            "email" => &self.email,
            "nationality" => &self.nationality,
            "number_street" => &self.number_street,
            "city_municipality" => &self.city_municipality,
            "barangay" => &self.barangay,
            "province" => &self.province,
            "region" => &self.region,
            "contact_no" => &self.contact_no,
            "parent_guardian_name" => &self.parent_guardian_name,
            "parent_guardian_mailing_address" => &self.parent_guardian_mailing_address,
            "course_qualification" => &self.course_qualification,
            "educational_attainment" => &self.educational_attainment,
            _ => "",
        }
    }

    /// Checks every rule that needs no database access beyond the reference lists.
    /// Upload and email-uniqueness checks are added by the caller into `errors`.
    pub fn check(
        self,
        classifications: &[Classification],
        disability_types: &[DisabilityType],
        today: NaiveDate,
        errors: &mut FieldErrors,
    ) -> Option<NewRegistration> {
        for field in REQUIRED_TEXT {
            require(errors, field, self.text(field));
        }

        if let Err(validation) = self.validate() {
            errors.merge_validator(&validation);
        }

        if !self.gender.is_empty() && !GENDERS.contains(&self.gender.as_str()) {
            errors.add("gender", "The selected gender is invalid.");
        }

        if !self.civil_status.is_empty() && !CIVIL_STATUSES.contains(&self.civil_status.as_str()) {
            errors.add("civil_status", "The selected civil status is invalid.");
        }

        let birth_date = if self.birth_date.is_empty() {
            None
        } else {
            match NaiveDate::parse_from_str(&self.birth_date, "%Y-%m-%d") {
                Ok(date) if date > today => {
                    errors.add(
                        "birth_date",
                        "The birth date field must be a date before or equal to today.",
                    );
                    None
                }
                Ok(date) => Some(date),
                Err(_) => {
                    errors.add("birth_date", "The birth date field must be a valid date.");
                    None
                }
            }
        };

        if self.age.is_none() {
            errors.add("age", "The age field is required.");
        }

        if !self.contact_no.is_empty() && !CONTACT_NO.is_match(&self.contact_no) {
            errors.add(
                "contact_no",
                "The contact no field must be a valid Philippine mobile number.",
            );
        }

        let education = match self.educational_attainment.parse::<EducationLevel>() {
            Ok(level) => Some(level),
            Err(_) if self.educational_attainment.is_empty() => {
                errors.add(
                    "educational_attainment",
                    "Please select your highest educational attainment.",
                );
                None
            }
            Err(_) => {
                errors.add(
                    "educational_attainment",
                    "The selected educational attainment is invalid.",
                );
                None
            }
        };

        let mut wants_other_details = false;
        for (index, id) in self.classifications.iter().enumerate() {
            match classifications.iter().find(|c| c.id == *id) {
                Some(classification) => wants_other_details |= classification.is_others(),
                None => errors.add(
                    &format!("classifications.{}", index),
                    "The selected classification is invalid.",
                ),
            }
        }

        if wants_other_details && self.other_classification_details.is_none() {
            errors.add(
                "other_classification_details",
                "Please specify other classification details.",
            );
        }

        for (index, id) in self.disability_types.iter().enumerate() {
            if !disability_types.iter().any(|d| d.id == *id) {
                errors.add(
                    &format!("disability_types.{}", index),
                    "The selected disability type is invalid.",
                );
            }
        }

        if !self.disability_types.is_empty() && self.cause_of_disability.is_none() {
            errors.add(
                "cause_of_disability",
                "Please specify the cause of disability.",
            );
        }

        if !self.consent_given {
            errors.add("consent_given", "The consent given field must be accepted.");
        }

        let (Some(birth_date), Some(age), Some(education)) = (birth_date, self.age, education)
        else {
            return None;
        };

        if !errors.is_empty() {
            return None;
        }

        let others_id = classifications.iter().find(|c| c.is_others()).map(|c| c.id);
        let classification_rows = dedup(&self.classifications)
            .into_iter()
            .map(|id| {
                let details = if Some(id) == others_id {
                    self.other_classification_details.clone()
                } else {
                    None
                };
                (id, details)
            })
            .collect();

        let disability_rows = dedup(&self.disability_types)
            .into_iter()
            .map(|id| (id, self.cause_of_disability.clone()))
            .collect();

        Some(NewRegistration {
            input: self,
            birth_date,
            age,
            education,
            classifications: classification_rows,
            disabilities: disability_rows,
        })
    }
}

fn dedup(ids: &[i64]) -> Vec<i64> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(*id);
        }
    }
    unique
}
