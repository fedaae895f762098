#[cfg(test)]
pub mod test_db {
    use crate::auth::Role;
    use crate::db::{
        RegistrationImages, ScholarshipFields, create_scholarship, create_user,
        insert_registration, list_classifications, list_disability_types, set_enrollment_status,
    };
    use crate::error::AppError;
    use crate::models::{EnrollmentStatus, ScholarshipStatus};
    use crate::registration::RegistrationInput;
    use crate::validation::FieldErrors;
    use chrono::{Duration, NaiveDate, Utc};
    use sqlx::{Pool, Sqlite, sqlite::SqlitePoolOptions};
    use std::collections::HashMap;
    use std::sync::Once;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        learners: Vec<TestLearner>,
        scholarships: Vec<TestScholarship>,
    }

    pub struct TestUser {
        pub name: String,
        pub email: String,
        pub role: Role,
        pub password: String,
    }

    pub struct TestLearner {
        pub first_name: String,
        pub last_name: String,
        pub email: String,
        pub course: String,
        pub status: EnrollmentStatus,
        pub linked_user: bool,
    }

    pub struct TestScholarship {
        pub name: String,
        pub provider: String,
        pub status: ScholarshipStatus,
        pub deadline: NaiveDate,
    }

    /// A registration form that passes every rule.
    pub fn registration_input(first_name: &str, last_name: &str, email: &str) -> RegistrationInput {
        RegistrationInput {
            last_name: last_name.to_string(),
            first_name: first_name.to_string(),
            gender: "Female".to_string(),
            civil_status: "Single".to_string(),
            birth_date: "2001-03-09".to_string(),
            age: Some(24),
            email: email.to_string(),
            nationality: "Filipino".to_string(),
            number_street: "45 Mabini St".to_string(),
            city_municipality: "Ormoc City".to_string(),
            barangay: "Cogon".to_string(),
            province: "Leyte".to_string(),
            region: "VIII".to_string(),
            contact_no: "09181234567".to_string(),
            parent_guardian_name: "Rosa Santos".to_string(),
            parent_guardian_mailing_address: "45 Mabini St".to_string(),
            educational_attainment: "senior_high_k12".to_string(),
            course_qualification: "Cookery NC II".to_string(),
            consent_given: true,
            ..Default::default()
        }
    }

    pub fn days_from_today(days: i64) -> NaiveDate {
        Utc::now().date_naive() + Duration::days(days)
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        fn user(mut self, email: &str, role: Role, password: &str) -> Self {
            self.users.push(TestUser {
                name: email.split('@').next().unwrap_or(email).to_string(),
                email: email.to_string(),
                role,
                password: password.to_string(),
            });
            self
        }

        pub fn admin(self, email: &str) -> Self {
            self.user(email, Role::Admin, STANDARD_PASSWORD)
        }

        pub fn staff(self, email: &str) -> Self {
            self.user(email, Role::Staff, STANDARD_PASSWORD)
        }

        pub fn user_with_password(self, email: &str, role: Role, password: &str) -> Self {
            self.user(email, role, password)
        }

        /// A registered learner whose applicant user is linked by email.
        pub fn learner(
            mut self,
            first_name: &str,
            last_name: &str,
            email: &str,
            status: EnrollmentStatus,
        ) -> Self {
            self.learners.push(TestLearner {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                email: email.to_string(),
                course: "Cookery NC II".to_string(),
                status,
                linked_user: true,
            });
            self
        }

        pub fn learner_in_course(mut self, first_name: &str, last_name: &str, email: &str, course: &str) -> Self {
            self.learners.push(TestLearner {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                email: email.to_string(),
                course: course.to_string(),
                status: EnrollmentStatus::Pending,
                linked_user: true,
            });
            self
        }

        /// A pending learner whose user record has gone away.
        pub fn orphan_learner(mut self, first_name: &str, last_name: &str, email: &str) -> Self {
            self.learners.push(TestLearner {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                email: email.to_string(),
                course: "Cookery NC II".to_string(),
                status: EnrollmentStatus::Pending,
                linked_user: false,
            });
            self
        }

        pub fn scholarship(
            mut self,
            name: &str,
            status: ScholarshipStatus,
            deadline: NaiveDate,
        ) -> Self {
            self.scholarships.push(TestScholarship {
                name: name.to_string(),
                provider: "TESDA".to_string(),
                status,
                deadline,
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder()
                    .parse_filters("debug")
                    .is_test(true)
                    .try_init();
            });

            // One connection keeps every query on the same in-memory database.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();
            let mut learner_id_map: HashMap<String, i64> = HashMap::new();
            let mut scholarship_id_map: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let user_id =
                    create_user(&pool, &user.name, &user.email, &user.password, user.role).await?;
                user_id_map.insert(user.email.clone(), user_id);
            }

            let classifications = list_classifications(&pool).await?;
            let disability_types = list_disability_types(&pool).await?;
            let today = Utc::now().date_naive();

            for learner in &self.learners {
                let mut input =
                    registration_input(&learner.first_name, &learner.last_name, &learner.email);
                input.course_qualification = learner.course.clone();

                let mut errors = FieldErrors::new();
                let registration = input
                    .check(&classifications, &disability_types, today, &mut errors)
                    .ok_or_else(|| {
                        AppError::Internal(format!("Invalid test learner: {:?}", errors))
                    })?;

                let images = RegistrationImages {
                    thumbmark_image_path: "registrations/thumbmarks/test.png".to_string(),
                    picture_image_path: "registrations/pictures/test.png".to_string(),
                };

                let learner_id = insert_registration(&pool, &registration, &images, today).await?;

                if learner.status != EnrollmentStatus::Pending {
                    let mut conn = pool.acquire().await?;
                    set_enrollment_status(&mut conn, learner_id, learner.status).await?;
                }

                if learner.linked_user {
                    let user_id: i64 =
                        sqlx::query_scalar("SELECT user_id FROM learners WHERE learner_id = ?")
                            .bind(learner_id)
                            .fetch_one(&pool)
                            .await?;
                    user_id_map.insert(learner.email.clone(), user_id);
                } else {
                    sqlx::query("UPDATE learners SET user_id = NULL WHERE learner_id = ?")
                        .bind(learner_id)
                        .execute(&pool)
                        .await?;
                }

                learner_id_map.insert(learner.email.clone(), learner_id);
            }

            for scholarship in &self.scholarships {
                let fields = ScholarshipFields {
                    scholarship_name: scholarship.name.clone(),
                    provider: scholarship.provider.clone(),
                    description: None,
                    eligibility_criteria: "Registered learners".to_string(),
                    available_slots: 10,
                    application_deadline: scholarship.deadline,
                    status: scholarship.status,
                };
                let scholarship_id = create_scholarship(&pool, &fields).await?;
                scholarship_id_map.insert(scholarship.name.clone(), scholarship_id);
            }

            Ok(TestDb {
                pool,
                user_id_map,
                learner_id_map,
                scholarship_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub learner_id_map: HashMap<String, i64>,
        pub scholarship_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, email: &str) -> Option<i64> {
            self.user_id_map.get(email).copied()
        }

        pub fn learner_id(&self, email: &str) -> Option<i64> {
            self.learner_id_map.get(email).copied()
        }

        pub fn scholarship_id(&self, name: &str) -> Option<i64> {
            self.scholarship_id_map.get(name).copied()
        }

        pub async fn enrollment_status(&self, learner_id: i64) -> String {
            sqlx::query_scalar("SELECT enrollment_status FROM learners WHERE learner_id = ?")
                .bind(learner_id)
                .fetch_one(&self.pool)
                .await
                .expect("Learner should exist")
        }

        /// Role and password hash of a user.
        pub async fn credentials(&self, user_id: i64) -> (String, String) {
            sqlx::query_as("SELECT role, password FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .expect("User should exist")
        }

        /// Lets a learner log in with the standard password without going through acceptance.
        pub async fn grant_login(&self, email: &str) {
            let hash = bcrypt::hash(STANDARD_PASSWORD, 4).expect("Failed to hash password");
            sqlx::query("UPDATE users SET password = ?, role = 'learner' WHERE email = ?")
                .bind(hash)
                .bind(email)
                .execute(&self.pool)
                .await
                .expect("Failed to grant login");
        }
    }
}

#[cfg(test)]
pub mod test_utils {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::{Value, json};
    use uuid::Uuid;

    use crate::config::PortalConfig;
    use crate::error::AppError;
    use crate::init_rocket;
    use crate::mail::{EnrollmentAcceptedMail, Mailer, MailerHandle};

    pub use super::test_db::{
        STANDARD_PASSWORD, TestDb, TestDbBuilder, days_from_today, registration_input,
    };

    /// Keeps every mail it is asked to send.
    #[derive(Clone, Default)]
    pub struct RecordingMailer {
        pub sent: Arc<Mutex<Vec<EnrollmentAcceptedMail>>>,
    }

    impl RecordingMailer {
        pub fn sent(&self) -> Vec<EnrollmentAcceptedMail> {
            self.sent.lock().expect("mailer lock poisoned").clone()
        }
    }

    #[rocket::async_trait]
    impl Mailer for RecordingMailer {
        async fn send_enrollment_accepted(
            &self,
            mail: &EnrollmentAcceptedMail,
        ) -> Result<(), AppError> {
            self.sent
                .lock()
                .expect("mailer lock poisoned")
                .push(mail.clone());
            Ok(())
        }
    }

    /// Counts attempts and always fails.
    #[derive(Clone, Default)]
    pub struct FailingMailer {
        pub attempts: Arc<Mutex<usize>>,
    }

    #[rocket::async_trait]
    impl Mailer for FailingMailer {
        async fn send_enrollment_accepted(
            &self,
            _mail: &EnrollmentAcceptedMail,
        ) -> Result<(), AppError> {
            *self.attempts.lock().expect("mailer lock poisoned") += 1;
            Err(AppError::ExternalService(
                "SMTP connection refused".to_string(),
            ))
        }
    }

    pub fn test_config() -> PortalConfig {
        let upload_dir: PathBuf =
            std::env::temp_dir().join(format!("enrollment-portal-test-{}", Uuid::new_v4()));

        PortalConfig {
            database_url: "sqlite::memory:".to_string(),
            upload_dir,
            mail_from: "registrar@test.local".to_string(),
            session_hours: 1,
            bootstrap_admin: None,
        }
    }

    pub async fn setup_test_client_with_config(
        test_db: &TestDb,
        config: PortalConfig,
        mailer: MailerHandle,
    ) -> Client {
        let rocket = init_rocket(test_db.pool.clone(), config, mailer);
        Client::tracked(rocket)
            .await
            .expect("valid rocket instance")
    }

    pub async fn setup_test_client_with_mailer(
        test_db: &TestDb,
        mailer: MailerHandle,
    ) -> (Client, PortalConfig) {
        let config = test_config();
        let client = setup_test_client_with_config(test_db, config.clone(), mailer).await;

        (client, config)
    }

    pub async fn setup_test_client(test_db: &TestDb) -> (Client, RecordingMailer) {
        let mailer = RecordingMailer::default();
        let (client, _) =
            setup_test_client_with_mailer(test_db, MailerHandle::new(mailer.clone())).await;
        (client, mailer)
    }

    pub async fn login_test_user(client: &Client, email: &str, password: &str) -> Value {
        let response = client
            .post("/login")
            .header(ContentType::JSON)
            .body(json!({ "email": email, "password": password }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        response
            .into_json::<Value>()
            .await
            .expect("login response should be JSON")
    }

    pub async fn login_as(client: &Client, email: &str) {
        let body = login_test_user(client, email, STANDARD_PASSWORD).await;
        assert_eq!(body["success"], true, "login failed for {}", email);
    }

    pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    pub const PDF: &[u8] = b"%PDF-1.4\n%%EOF\n";

    const BOUNDARY: &str = "X-PORTAL-TEST-BOUNDARY";

    /// Hand-built `multipart/form-data` body.
    #[derive(Default)]
    pub struct Multipart {
        body: Vec<u8>,
    }

    impl Multipart {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn text(mut self, name: &str, value: &str) -> Self {
            self.body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
            self
        }

        pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
            self.body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    BOUNDARY, name, filename, content_type
                )
                .as_bytes(),
            );
            self.body.extend_from_slice(bytes);
            self.body.extend_from_slice(b"\r\n");
            self
        }

        pub fn finish(mut self) -> (ContentType, Vec<u8>) {
            self.body
                .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
            let content_type =
                ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY));
            (content_type, self.body)
        }
    }

    const REGISTRATION_TEXT: [(&str, &str); 19] = [
        ("last_name", "Reyes"),
        ("first_name", "Ana"),
        ("gender", "Female"),
        ("civil_status", "Single"),
        ("birth_date", "2002-05-14"),
        ("age", "23"),
        ("nationality", "Filipino"),
        ("number_street", "8 Burgos St"),
        ("city_municipality", "Palo"),
        ("barangay", "San Joaquin"),
        ("province", "Leyte"),
        ("region", "VIII"),
        ("contact_no", "+639171234567"),
        ("parent_guardian_name", "Lorna Reyes"),
        ("parent_guardian_mailing_address", "8 Burgos St, Palo"),
        ("educational_attainment", "high_school_graduate"),
        ("classifications[]", "22"),
        ("consent_given", "true"),
        ("scholarship_package", "TWSP"),
    ];

    /// Every registration field filled in with valid values, images included.
    pub fn registration_form(email: &str, course: &str) -> Multipart {
        registration_form_where(email, course, &[], &[])
    }

    /// The valid registration with `skip` fields left out and `overrides` replacing values.
    pub fn registration_form_where(
        email: &str,
        course: &str,
        skip: &[&str],
        overrides: &[(&str, &str)],
    ) -> Multipart {
        let mut fields: Vec<(String, String)> = REGISTRATION_TEXT
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        fields.push(("email".to_string(), email.to_string()));
        fields.push(("course_qualification".to_string(), course.to_string()));

        for (name, value) in overrides {
            match fields.iter_mut().find(|(field, _)| field == name) {
                Some(field) => field.1 = value.to_string(),
                None => fields.push((name.to_string(), value.to_string())),
            }
        }

        let mut form = Multipart::new();
        for (name, value) in fields.iter().filter(|(name, _)| !skip.contains(&name.as_str())) {
            form = form.text(name, value);
        }

        for image in ["thumbmark_image", "picture_image"] {
            if !skip.contains(&image) {
                form = form.file(image, "photo.png", "image/png", PNG);
            }
        }

        form
    }
}
