#[cfg(test)]
mod tests {
    use rocket::http::Status;
    use rocket::local::asynchronous::Client;
    use serde_json::Value;

    use crate::api::{APPLIED_MESSAGE, LEARNER_PROFILE_MISSING};
    use crate::auth::Role;
    use crate::db::{ALREADY_APPLIED, insert_application, list_applicants};
    use crate::mail::MailerHandle;
    use crate::models::{ApplicationStatus, DocumentPaths, EnrollmentStatus, ScholarshipStatus};
    use crate::test::test_utils::{
        Multipart, PDF, PNG, RecordingMailer, STANDARD_PASSWORD, TestDb, TestDbBuilder,
        days_from_today, login_as, setup_test_client, setup_test_client_with_mailer,
    };

    const CLOSED_MESSAGE: &str = "This scholarship is no longer accepting applications.";

    fn documents() -> Multipart {
        Multipart::new()
            .file("birth_certificate", "psa.pdf", "application/pdf", PDF)
            .file("transcript_of_records", "tor.pdf", "application/pdf", PDF)
            .file("formal_photo", "photo.png", "image/png", PNG)
            .file("parent_id", "id.pdf", "application/pdf", PDF)
    }

    async fn apply(client: &Client, scholarship_id: i64, form: Multipart) -> (Status, Value) {
        let (content_type, body) = form.finish();
        let response = client
            .post(format!("/scholarships/{}/apply", scholarship_id))
            .header(content_type)
            .body(body)
            .dispatch()
            .await;

        let status = response.status();
        (status, response.into_json().await.unwrap_or(Value::Null))
    }

    async fn accepted_learner_db() -> TestDb {
        let test_db = TestDbBuilder::new()
            .learner("Ana", "Reyes", "ana@mail.ph", EnrollmentStatus::Accepted)
            .scholarship("TWSP", ScholarshipStatus::Open, days_from_today(20))
            .scholarship("PESFA", ScholarshipStatus::Open, days_from_today(5))
            .scholarship("Closed Grant", ScholarshipStatus::Closed, days_from_today(20))
            .scholarship("Lapsed Grant", ScholarshipStatus::Open, days_from_today(-1))
            .scholarship("Due Today", ScholarshipStatus::Open, days_from_today(0))
            .build()
            .await
            .expect("Failed to build test database");
        test_db.grant_login("ana@mail.ph").await;
        test_db
    }

    #[rocket::async_test]
    async fn test_learner_sees_only_open_scholarships() {
        let test_db = accepted_learner_db().await;
        insert_application(
            &test_db.pool,
            test_db.scholarship_id("TWSP").unwrap(),
            test_db.learner_id("ana@mail.ph").unwrap(),
            &DocumentPaths::new(),
        )
        .await
        .unwrap();

        let (client, _) = setup_test_client(&test_db).await;
        login_as(&client, "ana@mail.ph").await;

        let response = client.get("/scholarships").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let page: Value = response.into_json().await.unwrap();
        assert_eq!(page["component"], "Student/Scholarships/Index");

        let scholarships = page["props"]["scholarships"].as_array().unwrap();
        let listed: Vec<(&str, bool)> = scholarships
            .iter()
            .map(|s| {
                (
                    s["scholarship_name"].as_str().unwrap(),
                    s["already_applied"].as_bool().unwrap(),
                )
            })
            .collect();
        assert_eq!(listed, vec![("PESFA", false), ("TWSP", true)]);
    }

    #[rocket::async_test]
    async fn test_apply_stores_documents_and_creates_pending_application() {
        let test_db = accepted_learner_db().await;
        let scholarship_id = test_db.scholarship_id("TWSP").unwrap();
        let learner_id = test_db.learner_id("ana@mail.ph").unwrap();

        let (client, config) =
            setup_test_client_with_mailer(&test_db, MailerHandle::new(RecordingMailer::default()))
                .await;
        login_as(&client, "ana@mail.ph").await;

        let response = client
            .get(format!("/scholarships/{}/apply", scholarship_id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let page: Value = response.into_json().await.unwrap();
        assert_eq!(page["component"], "Student/Scholarships/Apply");
        assert_eq!(page["props"]["email"], "ana@mail.ph");
        assert_eq!(page["props"]["learner"]["learner_id"], learner_id);

        let (status, body) = apply(&client, scholarship_id, documents()).await;
        assert_eq!(status, Status::Created);
        assert_eq!(body["flash"]["message"], APPLIED_MESSAGE);
        assert_eq!(body["redirect_url"], "/scholarships");

        let applicants = list_applicants(&test_db.pool, scholarship_id).await.unwrap();
        assert_eq!(applicants.len(), 1);
        assert_eq!(applicants[0].learner_id, learner_id);
        assert_eq!(applicants[0].status, ApplicationStatus::Pending);

        let documents = &applicants[0].documents;
        assert_eq!(documents.len(), 4);
        assert!(!documents.contains_key("marriage_contract"));

        let photo = documents.get("formal_photo").unwrap();
        assert!(photo.starts_with(&format!("scholarship_documents/{}/", learner_id)));
        assert!(photo.ends_with("_formal_photo_photo.png"));
        for path in documents.values() {
            assert!(config.upload_dir.join(path).exists(), "{} was not stored", path);
        }

        let (status, body) = apply(&client, scholarship_id, self::documents()).await;
        assert_eq!(status, Status::Conflict);
        assert_eq!(body["flash"]["message"], ALREADY_APPLIED);
        assert_eq!(
            list_applicants(&test_db.pool, scholarship_id).await.unwrap().len(),
            1
        );
    }

    #[rocket::async_test]
    async fn test_closed_and_lapsed_scholarships_refuse_applications() {
        let test_db = accepted_learner_db().await;
        let (client, _) = setup_test_client(&test_db).await;
        login_as(&client, "ana@mail.ph").await;

        for name in ["Closed Grant", "Lapsed Grant", "Due Today"] {
            let scholarship_id = test_db.scholarship_id(name).unwrap();

            let (status, body) = apply(&client, scholarship_id, documents()).await;
            assert_eq!(status, Status::Conflict, "{} accepted an application", name);
            assert_eq!(body["flash"]["message"], CLOSED_MESSAGE);
            assert_eq!(body["redirect_url"], "/scholarships");

            let response = client
                .get(format!("/scholarships/{}/apply", scholarship_id))
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::Conflict);
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM student_scholarships")
            .fetch_one(&test_db.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[rocket::async_test]
    async fn test_required_documents_are_checked() {
        let test_db = accepted_learner_db().await;
        let scholarship_id = test_db.scholarship_id("TWSP").unwrap();
        let (client, _) = setup_test_client(&test_db).await;
        login_as(&client, "ana@mail.ph").await;

        let form = Multipart::new()
            .file("birth_certificate", "psa.pdf", "application/pdf", PDF)
            .file("transcript_of_records", "tor.pdf", "application/pdf", PDF)
            .file("formal_photo", "photo.pdf", "application/pdf", PDF);
        let (status, body) = apply(&client, scholarship_id, form).await;

        assert_eq!(status, Status::UnprocessableEntity);
        assert_eq!(body["errors"]["parent_id"][0], "The parent id field is required.");
        assert_eq!(
            body["errors"]["formal_photo"][0],
            "The formal photo field must be a file of type: jpg, jpeg, png."
        );
        assert!(body["errors"].get("marriage_contract").is_none());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM student_scholarships")
            .fetch_one(&test_db.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[rocket::async_test]
    async fn test_learner_login_without_profile_cannot_apply() {
        let test_db = TestDbBuilder::new()
            .user_with_password("solo@mail.ph", Role::Learner, STANDARD_PASSWORD)
            .scholarship("TWSP", ScholarshipStatus::Open, days_from_today(20))
            .build()
            .await
            .expect("Failed to build test database");
        let scholarship_id = test_db.scholarship_id("TWSP").unwrap();

        let (client, _) = setup_test_client(&test_db).await;
        login_as(&client, "solo@mail.ph").await;

        let response = client.get("/scholarships").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let page: Value = response.into_json().await.unwrap();
        assert_eq!(page["props"]["scholarships"][0]["already_applied"], false);

        let (status, body) = apply(&client, scholarship_id, documents()).await;
        assert_eq!(status, Status::Conflict);
        assert_eq!(body["flash"]["message"], LEARNER_PROFILE_MISSING);
    }

    #[rocket::async_test]
    async fn test_learner_dashboard_shows_applications() {
        let test_db = accepted_learner_db().await;
        let scholarship_id = test_db.scholarship_id("PESFA").unwrap();
        insert_application(
            &test_db.pool,
            scholarship_id,
            test_db.learner_id("ana@mail.ph").unwrap(),
            &DocumentPaths::new(),
        )
        .await
        .unwrap();

        let (client, _) = setup_test_client(&test_db).await;
        login_as(&client, "ana@mail.ph").await;

        let response = client.get("/dashboard").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let page: Value = response.into_json().await.unwrap();
        assert_eq!(page["props"]["enrollmentStatus"], "accepted");
        assert_eq!(page["props"]["user"]["email"], "ana@mail.ph");
        let applications = page["props"]["applications"].as_array().unwrap();
        assert_eq!(applications.len(), 1);
        assert_eq!(applications[0]["scholarship_name"], "PESFA");
        assert_eq!(applications[0]["status"], "Pending");
    }
}
