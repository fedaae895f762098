use rocket::State;
use rocket::form::{Contextual, Form};
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{FromForm, post};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::db::{
    EMAIL_TAKEN, RegistrationImages, find_user_by_email, insert_registration,
    list_classifications, list_disability_types,
};
use crate::error::AppError;
use crate::registration::{RegistrationInput, optional};
use crate::response::{ActionResponse, ApiError};
use crate::storage::{PICTURE_DIR, THUMBMARK_DIR, UploadKind, UploadStore, check_upload};
use crate::validation::{AppErrorExt, FieldErrors, ValidationResponse};
use crate::wizard::WizardStep;

use super::today;

pub const REGISTERED_MESSAGE: &str =
    "Registration submitted successfully! We will review your application and contact you via email.";

/// Multipart body of the public registration wizard. Text fields default to
/// empty so missing values surface as field errors, not parse failures.
#[derive(FromForm)]
pub struct RegistrationForm<'r> {
    #[field(default = String::new())]
    last_name: String,
    #[field(default = String::new())]
    first_name: String,
    #[field(default = String::new())]
    middle_name: String,
    #[field(default = String::new())]
    extension_name: String,
    #[field(default = String::new())]
    gender: String,
    #[field(default = String::new())]
    civil_status: String,
    #[field(default = String::new())]
    birth_date: String,
    age: Option<i64>,
    #[field(default = String::new())]
    birthplace_city_municipality: String,
    #[field(default = String::new())]
    birthplace_province: String,
    #[field(default = String::new())]
    birthplace_region: String,
    #[field(default = String::new())]
    email: String,
    #[field(default = String::new())]
    nationality: String,
    #[field(default = String::new())]
    employment_status: String,
    #[field(default = String::new())]
    employment_type: String,

    #[field(default = String::new())]
    number_street: String,
    #[field(default = String::new())]
    city_municipality: String,
    #[field(default = String::new())]
    barangay: String,
    #[field(default = String::new())]
    district: String,
    #[field(default = String::new())]
    province: String,
    #[field(default = String::new())]
    region: String,
    #[field(default = String::new())]
    contact_no: String,
    #[field(default = String::new())]
    facebook_account: String,
    #[field(default = String::new())]
    parent_guardian_name: String,
    #[field(default = String::new())]
    parent_guardian_mailing_address: String,

    #[field(default = String::new())]
    educational_attainment: String,

    #[field(default = Vec::new())]
    classifications: Vec<i64>,
    #[field(default = String::new())]
    other_classification_details: String,
    #[field(default = Vec::new())]
    disability_types: Vec<i64>,
    #[field(default = String::new())]
    cause_of_disability: String,

    #[field(default = String::new())]
    course_qualification: String,
    #[field(default = String::new())]
    scholarship_package: String,

    #[field(default = false)]
    consent_given: bool,
    thumbmark_image: Option<TempFile<'r>>,
    picture_image: Option<TempFile<'r>>,
}

impl RegistrationForm<'_> {
    fn input(&self) -> RegistrationInput {
        let text = |value: &String| value.trim().to_string();

        RegistrationInput {
            last_name: text(&self.last_name),
            first_name: text(&self.first_name),
            middle_name: optional(&self.middle_name),
            extension_name: optional(&self.extension_name),
            gender: text(&self.gender),
            civil_status: text(&self.civil_status),
            birth_date: text(&self.birth_date),
            age: self.age,
            birthplace_city_municipality: optional(&self.birthplace_city_municipality),
            birthplace_province: optional(&self.birthplace_province),
            birthplace_region: optional(&self.birthplace_region),
            email: text(&self.email),
            nationality: text(&self.nationality),
            employment_status: optional(&self.employment_status),
            employment_type: optional(&self.employment_type),
            number_street: text(&self.number_street),
            city_municipality: text(&self.city_municipality),
            barangay: text(&self.barangay),
            district: optional(&self.district),
            province: text(&self.province),
            region: text(&self.region),
            contact_no: text(&self.contact_no),
            facebook_account: optional(&self.facebook_account),
            parent_guardian_name: text(&self.parent_guardian_name),
            parent_guardian_mailing_address: text(&self.parent_guardian_mailing_address),
            educational_attainment: text(&self.educational_attainment),
            classifications: self.classifications.clone(),
            other_classification_details: optional(&self.other_classification_details),
            disability_types: self.disability_types.clone(),
            cause_of_disability: optional(&self.cause_of_disability),
            course_qualification: text(&self.course_qualification),
            scholarship_package: optional(&self.scholarship_package),
            consent_given: self.consent_given,
        }
    }
}

fn wizard_errors(errors: FieldErrors) -> ApiError {
    let step = WizardStep::earliest_with_error(&errors).map(|step| step.index());
    ValidationResponse::new(errors).at_step(step).into()
}

#[post("/register/learner", data = "<form>")]
#[instrument(skip_all)]
pub async fn register_learner<'r>(
    form: Form<Contextual<'r, RegistrationForm<'r>>>,
    db: &State<Pool<Sqlite>>,
    store: &State<UploadStore>,
) -> Result<Custom<Json<ActionResponse>>, ApiError> {
    let Contextual { value, context } = form.into_inner();

    let Some(mut form) = value else {
        let mut errors = FieldErrors::new();
        errors.merge_form(context.errors());
        return Err(wizard_errors(errors));
    };

    let classifications = list_classifications(db).await.validate_custom()?;
    let disability_types = list_disability_types(db).await.validate_custom()?;

    let mut errors = FieldErrors::new();
    let registration = form
        .input()
        .check(&classifications, &disability_types, today(), &mut errors);

    check_upload(
        &mut errors,
        "thumbmark_image",
        form.thumbmark_image.as_ref(),
        UploadKind::Image,
        true,
    );
    check_upload(
        &mut errors,
        "picture_image",
        form.picture_image.as_ref(),
        UploadKind::Image,
        true,
    );

    if !errors.has("email")
        && !form.email.trim().is_empty()
        && find_user_by_email(db, form.email.trim())
            .await
            .validate_custom()?
            .is_some()
    {
        errors.add("email", EMAIL_TAKEN);
    }

    let (Some(registration), Some(thumbmark), Some(picture)) = (
        registration.filter(|_| errors.is_empty()),
        form.thumbmark_image.as_mut(),
        form.picture_image.as_mut(),
    ) else {
        return Err(wizard_errors(errors));
    };

    let thumbmark_image_path = store
        .store_anonymous(thumbmark, THUMBMARK_DIR, UploadKind::Image)
        .await
        .validate_custom()?;

    let picture_image_path = match store
        .store_anonymous(picture, PICTURE_DIR, UploadKind::Image)
        .await
    {
        Ok(path) => path,
        Err(err) => {
            store.remove(&thumbmark_image_path).await;
            return Err(err.into());
        }
    };

    let images = RegistrationImages {
        thumbmark_image_path,
        picture_image_path,
    };

    match insert_registration(db, &registration, &images, today()).await {
        Ok(learner_id) => {
            info!(learner_id, "New learner registered");
            Ok(Custom(
                Status::Created,
                ActionResponse::success(REGISTERED_MESSAGE, "/enrollnow"),
            ))
        }
        Err(err) => {
            store
                .remove_all(&[images.thumbmark_image_path, images.picture_image_path])
                .await;

            match err {
                AppError::Validation(message) if message == EMAIL_TAKEN => {
                    let mut errors = FieldErrors::new();
                    errors.add("email", message);
                    Err(wizard_errors(errors))
                }
                other => Err(other.into()),
            }
        }
    }
}
