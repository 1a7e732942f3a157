//! Session-to-user resolution through the wired provider
//!
//! Covers role and profile lookups end to end: the merged user seen by the
//! provider and by `GET /auth/session`, degraded resolution, and lookup order.

mod common;

use common::{TestApp, UserFixture, PASSWORD};
use itckids_auth::{
    resolve_user, AuthBackend, MockBackend, ProfileTables, ResolvedUser, Role,
};
use serde_json::json;

mod test_full_resolution {
    use super::*;

    #[tokio::test]
    async fn test_student_with_profile_is_merged() {
        let app = TestApp::new().await;
        let student = UserFixture::student(&app.backend, "hana@itc.example", "7");

        assert!(app.provider.login(&student.email, PASSWORD).await);

        let user = app.provider.current_user().expect("student resolved");
        assert!(user.is_student());
        assert_eq!(user.id(), student.id);

        let merged = user.merged();
        assert_eq!(merged["id"], json!(student.id.to_string()));
        assert_eq!(merged["email"], "hana@itc.example");
        assert_eq!(merged["role"], "student");
        assert_eq!(merged["grade"], "7");
        assert_eq!(merged["school"], "Minato Elementary");
    }

    #[tokio::test]
    async fn test_student_merged_view_is_exactly_identity_role_and_row() {
        let app = TestApp::new().await;
        let id = app.backend.add_user("u1@itc.example", PASSWORD);
        app.backend
            .insert_row("user_roles", json!({ "id": id, "role": "student" }));
        app.backend
            .insert_row("students", json!({ "id": id, "grade": "7" }));

        assert!(app.provider.login("u1@itc.example", PASSWORD).await);

        let merged = app.provider.current_user().unwrap().merged();
        assert_eq!(
            serde_json::Value::Object(merged),
            json!({
                "id": id.to_string(),
                "email": "u1@itc.example",
                "role": "student",
                "grade": "7"
            })
        );
    }

    #[tokio::test]
    async fn test_session_endpoint_hides_user_from_other_callers() {
        let app = TestApp::new().await;
        let admin = UserFixture::admin(&app.backend, "kenji@itc.example");
        app.login_token(&admin.email).await;

        let body = app.session_via_http(None).await;
        assert_eq!(body["is_loading"], false);
        assert_eq!(body["is_authenticated"], false);
        assert!(body["user"].is_null());
    }

    #[tokio::test]
    async fn test_session_endpoint_serves_merged_user() {
        let app = TestApp::new().await;
        let admin = UserFixture::admin(&app.backend, "kenji@itc.example");

        let token = app.login_token(&admin.email).await;

        let body = app.session_via_http(Some(&token)).await;
        assert_eq!(body["is_loading"], false);
        assert_eq!(body["is_authenticated"], true);
        assert_eq!(body["user"]["role"], "admin");
        assert_eq!(body["user"]["department"], "Programs");
        assert_eq!(body["user"]["email"], "kenji@itc.example");
    }

    #[tokio::test]
    async fn test_profile_fields_take_precedence_over_role_record() {
        let app = TestApp::new().await;
        let id = app.backend.add_user("dup@itc.example", PASSWORD);
        app.backend.insert_row(
            "user_roles",
            json!({ "id": id, "role": "student", "phone": "from-role" }),
        );
        app.backend
            .insert_row("students", json!({ "id": id, "phone": "from-profile" }));

        assert!(app.provider.login("dup@itc.example", PASSWORD).await);

        let merged = app.provider.current_user().unwrap().merged();
        assert_eq!(merged["phone"], "from-profile");
    }
}

mod test_degraded_resolution {
    use super::*;

    #[tokio::test]
    async fn test_missing_role_row_yields_identity_only() {
        let app = TestApp::new().await;
        let user = UserFixture::without_role(&app.backend, "new@itc.example");

        let token = app.login_token(&user.email).await;

        let resolved = app.provider.current_user().expect("identity still present");
        assert!(matches!(resolved, ResolvedUser::Unknown { .. }));
        assert!(resolved.role().is_none());
        assert!(app.provider.is_authenticated());

        let body = app.session_via_http(Some(&token)).await;
        assert_eq!(body["user"]["email"], "new@itc.example");
        assert!(body["user"].get("role").is_none());
    }

    #[tokio::test]
    async fn test_role_lookup_failure_yields_identity_only() {
        let app = TestApp::new().await;
        let student = UserFixture::student(&app.backend, "hana@itc.example", "5");
        app.backend.fail_table("user_roles");

        assert!(app.provider.login(&student.email, PASSWORD).await);

        let resolved = app.provider.current_user().unwrap();
        assert!(resolved.role().is_none());
        assert!(app
            .backend
            .recorded_lookups()
            .iter()
            .all(|table| table == "user_roles"));
    }

    #[tokio::test]
    async fn test_missing_profile_keeps_role() {
        let app = TestApp::new().await;
        let admin = UserFixture::without_profile(&app.backend, "fresh@itc.example", "admin");

        assert!(app.provider.login(&admin.email, PASSWORD).await);

        let resolved = app.provider.current_user().unwrap();
        assert!(resolved.is_admin());
        assert!(!resolved.has_profile());
        assert_eq!(resolved.merged()["role"], "admin");
    }

    #[tokio::test]
    async fn test_non_profile_roles_skip_profile_lookup() {
        let backend = MockBackend::new();
        let parent = UserFixture::without_profile(&backend, "parent@itc.example", "parent");
        let session = backend
            .sign_in_with_password(&parent.email, PASSWORD)
            .await
            .unwrap()
            .unwrap();
        backend.reset_lookups();

        let resolved = resolve_user(&backend, &ProfileTables::default(), Some(&session))
            .await
            .unwrap();

        assert_eq!(resolved.role(), Some(&Role::Parent));
        assert_eq!(backend.recorded_lookups(), vec!["user_roles"]);
    }
}

mod test_configuration {
    use super::*;

    #[tokio::test]
    async fn test_custom_table_names_are_used() {
        let backend = MockBackend::new();
        let tables = ProfileTables {
            roles: "profiles_role".to_string(),
            admins: "staff".to_string(),
            students: "kids".to_string(),
        };
        let id = backend.add_user("kid@itc.example", PASSWORD);
        backend.insert_row("profiles_role", json!({ "id": id, "role": "student" }));
        backend.insert_row("kids", json!({ "id": id, "grade": 3 }));

        let app = TestApp::with_backend(backend, tables).await;
        assert!(app.provider.login("kid@itc.example", PASSWORD).await);

        let merged = app.provider.current_user().unwrap().merged();
        assert_eq!(merged["grade"], "3");
        assert!(app
            .backend
            .recorded_lookups()
            .iter()
            .all(|table| table == "profiles_role" || table == "kids"));
    }

    #[tokio::test]
    async fn test_no_session_resolves_to_none() {
        let backend = MockBackend::new();
        let resolved = resolve_user(&backend, &ProfileTables::default(), None).await;

        assert!(resolved.is_none());
        assert!(backend.recorded_lookups().is_empty());
    }
}
