//! Common test utilities and fixtures for integration tests
//!
//! - `TestApp`: mock backend, initialized auth provider, and router
//! - User fixtures for each role with and without profile rows
//! - A JSON request helper for driving the router

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use itckids_auth::{AuthProvider, AuthSubscription, MockBackend, ProfileTables};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct-horse";

/// Fully wired application over an in-memory backend
#[allow(dead_code)]
pub struct TestApp {
    pub backend: MockBackend,
    pub provider: AuthProvider,
    pub router: Router,
    subscription: Option<AuthSubscription>,
}

#[allow(dead_code)]
impl TestApp {
    /// Build and initialize with the default table names
    pub async fn new() -> Self {
        Self::with_backend(MockBackend::new(), ProfileTables::default()).await
    }

    pub async fn with_backend(backend: MockBackend, tables: ProfileTables) -> Self {
        let provider = AuthProvider::new(Arc::new(backend.clone()), tables);
        let subscription = provider.init().await;
        let router = itckids_app::create_app(provider.clone());

        Self {
            backend,
            provider,
            router,
            subscription: Some(subscription),
        }
    }

    /// Stop listening for session changes
    pub fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.teardown();
        }
    }

    /// Send a request through the router; returns status and JSON body
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn login_via_http(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    /// Log in over HTTP and return the bearer token
    pub async fn login_token(&self, email: &str) -> String {
        let (status, body) = self.login_via_http(email, PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["access_token"]
            .as_str()
            .expect("login response carries an access token")
            .to_string()
    }

    pub async fn session_via_http(&self, token: Option<&str>) -> Value {
        let (status, body) = self.send(Method::GET, "/auth/session", token, None).await;
        assert_eq!(status, StatusCode::OK);
        body
    }
}

/// A seeded user with its credentials
#[allow(dead_code)]
pub struct UserFixture {
    pub id: Uuid,
    pub email: String,
}

#[allow(dead_code)]
impl UserFixture {
    fn register(backend: &MockBackend, email: &str) -> Self {
        let id = backend.add_user(email, PASSWORD);
        Self {
            id,
            email: email.to_string(),
        }
    }

    /// Student with a role row and a profile row
    pub fn student(backend: &MockBackend, email: &str, grade: &str) -> Self {
        let user = Self::register(backend, email);
        backend.insert_row("user_roles", json!({ "id": user.id, "role": "student" }));
        backend.insert_row(
            "students",
            json!({ "id": user.id, "grade": grade, "full_name": "Hana Sato", "school": "Minato Elementary" }),
        );
        user
    }

    /// Admin with a role row and a profile row
    pub fn admin(backend: &MockBackend, email: &str) -> Self {
        let user = Self::register(backend, email);
        backend.insert_row("user_roles", json!({ "id": user.id, "role": "admin" }));
        backend.insert_row(
            "admins",
            json!({ "id": user.id, "full_name": "Kenji Mori", "department": "Programs" }),
        );
        user
    }

    /// Role row present, profile row not yet created
    pub fn without_profile(backend: &MockBackend, email: &str, role: &str) -> Self {
        let user = Self::register(backend, email);
        backend.insert_row("user_roles", json!({ "id": user.id, "role": role }));
        user
    }

    /// Authenticated identity with no role row at all
    pub fn without_role(backend: &MockBackend, email: &str) -> Self {
        Self::register(backend, email)
    }
}
