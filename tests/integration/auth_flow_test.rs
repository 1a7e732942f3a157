//! Login, logout, and session-change flows
//!
//! Drives the provider and the HTTP surface together against the mock
//! backend, including changes that originate in the backend itself.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use common::{TestApp, UserFixture, PASSWORD};
use itckids_auth::{AuthBackend, AuthProvider, AuthState, MockBackend, ProfileTables};

/// Wait until the provider reaches a state matching `predicate`
async fn wait_for_state(provider: &AuthProvider, predicate: impl FnMut(&AuthState) -> bool) {
    let mut rx = provider.watch();
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for auth state")
        .expect("auth state channel closed");
}

mod test_login {
    use super::*;

    #[tokio::test]
    async fn test_rejected_credentials_return_false() {
        let app = TestApp::new().await;
        UserFixture::student(&app.backend, "hana@itc.example", "7");

        assert!(!app.provider.login("bad@x.com", "wrong").await);
        assert!(app.provider.current_user().is_none());
        assert!(!app.provider.is_authenticated());
        assert!(!app.provider.is_loading());
    }

    #[tokio::test]
    async fn test_wrong_password_over_http_is_unauthorized() {
        let app = TestApp::new().await;
        let student = UserFixture::student(&app.backend, "hana@itc.example", "7");

        let (status, body) = app.login_via_http(&student.email, "not-the-password").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");

        let session = app.session_via_http(None).await;
        assert!(session["user"].is_null());
    }

    #[tokio::test]
    async fn test_backend_failure_returns_false() {
        let app = TestApp::new().await;
        let student = UserFixture::student(&app.backend, "hana@itc.example", "7");
        app.backend.set_auth_unavailable(true);

        assert!(!app.provider.login(&student.email, PASSWORD).await);
        assert!(app.provider.current_user().is_none());
    }

    #[tokio::test]
    async fn test_login_resolves_before_returning() {
        let app = TestApp::new().await;
        let admin = UserFixture::admin(&app.backend, "kenji@itc.example");

        assert!(app.provider.login(&admin.email, PASSWORD).await);

        // No waiting: the resolved user is visible as soon as login returns
        let user = app.provider.current_user().unwrap();
        assert!(user.is_admin());
        assert_eq!(user.display_name(), "Kenji Mori");
    }
}

mod test_logout {
    use super::*;

    #[tokio::test]
    async fn test_logout_after_admin_session_clears_user() {
        let app = TestApp::new().await;
        let admin = UserFixture::admin(&app.backend, "kenji@itc.example");
        assert!(app.provider.login(&admin.email, PASSWORD).await);
        assert!(app.provider.is_authenticated());

        app.provider.logout().await;

        assert!(app.provider.current_user().is_none());
        assert!(!app.provider.is_authenticated());
        assert!(app.backend.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_over_http() {
        let app = TestApp::new().await;
        let student = UserFixture::student(&app.backend, "hana@itc.example", "7");
        let token = app.login_token(&student.email).await;

        let (status, _) = app.send(Method::POST, "/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let session = app.session_via_http(Some(&token)).await;
        assert_eq!(session["is_authenticated"], false);
        assert!(session["user"].is_null());
    }

    #[tokio::test]
    async fn test_logout_without_credentials_keeps_session() {
        let app = TestApp::new().await;
        let admin = UserFixture::admin(&app.backend, "kenji@itc.example");
        let token = app.login_token(&admin.email).await;

        let (status, body) = app.send(Method::POST, "/auth/logout", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "NOT_AUTHENTICATED");

        let (status, _) = app
            .send(Method::POST, "/auth/logout", Some("mock-access-guess"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        assert!(app.provider.is_authenticated());
        let session = app.session_via_http(Some(&token)).await;
        assert_eq!(session["user"]["email"], "kenji@itc.example");
    }

    #[tokio::test]
    async fn test_logout_when_signed_out_is_harmless() {
        let app = TestApp::new().await;

        app.provider.logout().await;

        assert!(app.provider.current_user().is_none());
        assert!(!app.provider.is_loading());
    }
}

mod test_session_changes {
    use super::*;

    #[tokio::test]
    async fn test_initial_session_is_resolved_on_init() {
        let backend = MockBackend::new();
        let student = UserFixture::student(&backend, "hana@itc.example", "7");
        backend
            .sign_in_with_password(&student.email, PASSWORD)
            .await
            .unwrap();

        let provider = AuthProvider::new(Arc::new(backend), ProfileTables::default());
        assert!(provider.is_loading());

        let _subscription = provider.init().await;

        assert!(!provider.is_loading());
        assert_eq!(provider.current_user().unwrap().id(), student.id);
    }

    #[tokio::test]
    async fn test_backend_sign_out_is_followed() {
        let app = TestApp::new().await;
        let student = UserFixture::student(&app.backend, "hana@itc.example", "7");
        assert!(app.provider.login(&student.email, PASSWORD).await);

        // Session ends outside the provider, e.g. revoked elsewhere
        app.backend.sign_out().await.unwrap();

        wait_for_state(&app.provider, |state| matches!(state, AuthState::Anonymous)).await;
        assert!(app.provider.current_user().is_none());
    }

    #[tokio::test]
    async fn test_token_refresh_keeps_user() {
        let app = TestApp::new().await;
        let student = UserFixture::student(&app.backend, "hana@itc.example", "7");
        assert!(app.provider.login(&student.email, PASSWORD).await);
        app.backend.reset_lookups();

        let refreshed = app.backend.emit_token_refresh().expect("active session");
        assert_eq!(refreshed.user.id, student.id);

        tokio::time::timeout(Duration::from_secs(2), async {
            while app.backend.recorded_lookups().len() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("refresh event was not processed");

        let user = app.provider.current_user().unwrap();
        assert!(user.is_student());
        assert_eq!(user.merged()["grade"], "7");
    }

    #[tokio::test]
    async fn test_teardown_stops_following_changes() {
        let mut app = TestApp::new().await;
        let student = UserFixture::student(&app.backend, "hana@itc.example", "7");
        assert!(app.provider.login(&student.email, PASSWORD).await);

        app.teardown();
        app.backend.sign_out().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Still holding the last resolved user until refreshed explicitly
        assert!(app.provider.is_authenticated());

        app.provider.refresh_user().await;
        assert!(!app.provider.is_authenticated());
    }
}
