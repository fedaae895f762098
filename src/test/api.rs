#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Cookie, Status};
    use serde_json::{Value, json};

    use crate::api::LoginResponse;
    use crate::auth::{Role, SESSION_COOKIE, User};
    use crate::models::EnrollmentStatus;
    use crate::test::test_utils::{
        STANDARD_PASSWORD, TestDbBuilder, login_as, login_test_user, setup_test_client,
    };

    #[rocket::async_test]
    async fn test_login_api() {
        let test_db = TestDbBuilder::new()
            .admin("admin@center.ph")
            .staff("staff@center.ph")
            .build()
            .await
            .expect("Failed to build test database");
        let (client, _) = setup_test_client(&test_db).await;

        let response = client
            .post("/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": "staff@center.ph",
                    "password": STANDARD_PASSWORD
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        assert!(response.cookies().get_private(SESSION_COOKIE).is_some());

        let body = response.into_string().await.unwrap();
        let login_response: LoginResponse = serde_json::from_str(&body).unwrap();

        assert!(login_response.success);
        assert_eq!(login_response.user.unwrap().role, Role::Staff);
        assert_eq!(login_response.redirect_url.as_deref(), Some("/staff/dashboard"));

        let response = client
            .post("/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": "staff@center.ph",
                    "password": "wrong_password"
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);

        let login_response: LoginResponse = response.into_json().await.unwrap();
        assert!(!login_response.success);
        assert!(login_response.user.is_none());
        assert_eq!(
            login_response.error.as_deref(),
            Some("These credentials do not match our records.")
        );
    }

    #[rocket::async_test]
    async fn test_login_redirects_by_role() {
        let test_db = TestDbBuilder::new()
            .admin("admin@center.ph")
            .learner("Ana", "Reyes", "ana@mail.ph", EnrollmentStatus::Accepted)
            .build()
            .await
            .expect("Failed to build test database");
        test_db.grant_login("ana@mail.ph").await;

        let (client, _) = setup_test_client(&test_db).await;
        let body = login_test_user(&client, "admin@center.ph", STANDARD_PASSWORD).await;
        assert_eq!(body["redirect_url"], "/admin/dashboard");

        let (client, _) = setup_test_client(&test_db).await;
        let body = login_test_user(&client, "ana@mail.ph", STANDARD_PASSWORD).await;
        assert_eq!(body["redirect_url"], "/dashboard");
        assert_eq!(body["user"]["role"], "learner");
    }

    #[rocket::async_test]
    async fn test_login_rejects_malformed_email() {
        let test_db = TestDbBuilder::new()
            .build()
            .await
            .expect("Failed to build test database");
        let (client, _) = setup_test_client(&test_db).await;

        let response = client
            .post("/login")
            .header(ContentType::JSON)
            .body(json!({ "email": "not-an-email", "password": "x" }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::UnprocessableEntity);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(
            body["errors"]["email"][0],
            "The email field must be a valid email address."
        );
    }

    #[rocket::async_test]
    async fn test_applicant_cannot_log_in_before_acceptance() {
        let test_db = TestDbBuilder::new()
            .learner("Ana", "Reyes", "ana@mail.ph", EnrollmentStatus::Pending)
            .build()
            .await
            .expect("Failed to build test database");
        let (client, _) = setup_test_client(&test_db).await;

        let body = login_test_user(&client, "ana@mail.ph", "anything").await;
        assert_eq!(body["success"], false);
    }

    #[rocket::async_test]
    async fn test_me_requires_a_session() {
        let test_db = TestDbBuilder::new()
            .staff("staff@center.ph")
            .build()
            .await
            .expect("Failed to build test database");
        let (client, _) = setup_test_client(&test_db).await;

        let response = client.get("/me").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);

        login_as(&client, "staff@center.ph").await;

        let response = client.get("/me").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let user: User = response.into_json().await.unwrap();
        assert_eq!(user.email, "staff@center.ph");
        assert_eq!(user.role, Role::Staff);
    }

    #[rocket::async_test]
    async fn test_logout_ends_the_session() {
        let test_db = TestDbBuilder::new()
            .staff("staff@center.ph")
            .build()
            .await
            .expect("Failed to build test database");
        let (client, _) = setup_test_client(&test_db).await;

        login_as(&client, "staff@center.ph").await;

        let response = client.post("/logout").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["redirect_url"], "/");

        let response = client.get("/me").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_sessions")
            .fetch_one(&test_db.pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[rocket::async_test]
    async fn test_forged_session_cookie_is_rejected() {
        let test_db = TestDbBuilder::new()
            .build()
            .await
            .expect("Failed to build test database");
        let (client, _) = setup_test_client(&test_db).await;

        let response = client
            .get("/me")
            .private_cookie(Cookie::new(SESSION_COOKIE, "not-a-real-token"))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn test_only_admins_register_staff() {
        let test_db = TestDbBuilder::new()
            .admin("admin@center.ph")
            .staff("staff@center.ph")
            .build()
            .await
            .expect("Failed to build test database");

        let new_staff = json!({
            "name": "Registrar Two",
            "email": "registrar2@center.ph",
            "password": "long-enough-password",
            "role": "staff"
        })
        .to_string();

        let (client, _) = setup_test_client(&test_db).await;
        login_as(&client, "staff@center.ph").await;
        let response = client
            .post("/admin/users")
            .header(ContentType::JSON)
            .body(new_staff.clone())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let (client, _) = setup_test_client(&test_db).await;
        login_as(&client, "admin@center.ph").await;
        let response = client
            .post("/admin/users")
            .header(ContentType::JSON)
            .body(new_staff.clone())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);

        let response = client
            .post("/admin/users")
            .header(ContentType::JSON)
            .body(new_staff)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["errors"]["email"][0], "The email has already been taken.");

        let (client, _) = setup_test_client(&test_db).await;
        let body = login_test_user(&client, "registrar2@center.ph", "long-enough-password").await;
        assert_eq!(body["success"], true);
        assert_eq!(body["redirect_url"], "/staff/dashboard");
    }

    #[rocket::async_test]
    async fn test_register_staff_refuses_learner_role() {
        let test_db = TestDbBuilder::new()
            .admin("admin@center.ph")
            .build()
            .await
            .expect("Failed to build test database");
        let (client, _) = setup_test_client(&test_db).await;
        login_as(&client, "admin@center.ph").await;

        let response = client
            .post("/admin/users")
            .header(ContentType::JSON)
            .body(
                json!({
                    "name": "Someone",
                    "email": "someone@center.ph",
                    "password": "long-enough-password",
                    "role": "learner"
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::UnprocessableEntity);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["errors"]["role"][0], "The selected role is invalid.");
    }

    #[rocket::async_test]
    async fn test_role_guards_on_portal_pages() {
        let test_db = TestDbBuilder::new()
            .staff("staff@center.ph")
            .learner("Ana", "Reyes", "ana@mail.ph", EnrollmentStatus::Accepted)
            .build()
            .await
            .expect("Failed to build test database");
        test_db.grant_login("ana@mail.ph").await;

        let (client, _) = setup_test_client(&test_db).await;
        for path in ["/admin/enrollments", "/staff/scholarships", "/dashboard"] {
            let response = client.get(path).dispatch().await;
            assert_eq!(response.status(), Status::Unauthorized, "{} needs a login", path);
        }

        login_as(&client, "ana@mail.ph").await;
        for path in ["/admin/enrollments", "/staff/scholarships", "/staff/dashboard"] {
            let response = client.get(path).dispatch().await;
            assert_eq!(response.status(), Status::Forbidden, "learner reached {}", path);
        }

        let (client, _) = setup_test_client(&test_db).await;
        login_as(&client, "staff@center.ph").await;
        assert_eq!(
            client.get("/admin/dashboard").dispatch().await.status(),
            Status::Forbidden
        );
        assert_eq!(
            client.get("/scholarships").dispatch().await.status(),
            Status::Forbidden
        );
        assert_eq!(
            client.get("/staff/enrollments").dispatch().await.status(),
            Status::Ok
        );

        let learner_id = test_db.learner_id("ana@mail.ph").unwrap();
        for path in [
            "/admin/enrollments".to_string(),
            format!("/admin/enrollments/{}", learner_id),
        ] {
            let response = client.get(path.clone()).dispatch().await;
            assert_eq!(response.status(), Status::Forbidden, "staff reached {}", path);
        }
        for action in ["accept", "reject"] {
            let response = client
                .post(format!("/admin/enrollments/{}/{}", learner_id, action))
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::Forbidden, "staff could {}", action);
        }
        assert_eq!(test_db.enrollment_status(learner_id).await, "accepted");
    }
}
