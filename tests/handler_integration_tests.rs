use access_portal::{
    AppConfig, AppState, InMemoryRepository, create_router,
    models::{LoginResponse, PermissionEntry, PrincipalSnapshot, UsersResponse},
};
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

// --- Test Harness ---

struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    async fn spawn() -> Self {
        let state =
            AppState::new(AppConfig::default(), Arc::new(InMemoryRepository::new())).unwrap();
        state
            .registry
            .bootstrap_superuser("admin@x.com", "secret1")
            .await
            .unwrap();
        TestApp {
            router: create_router(state.clone()),
            state,
        }
    }

    async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
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
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    async fn login(&self, email: &str, password: &str) -> LoginResponse {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        serde_json::from_value(body).unwrap()
    }

    async fn admin_token(&self) -> String {
        self.login("admin@x.com", "secret1").await.tokens.access
    }

    async fn create_user(&self, admin: &str, email: &str) -> Uuid {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/admin/users",
                Some(admin),
                Some(json!({ "email": email, "password": "abc123" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["principal"]["id"].as_str().unwrap().parse().unwrap()
    }
}

// --- Public Routes ---

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::spawn().await;
    let (status, _) = app.request(Method::GET, "/health", None, None).await;
    assert!(status.is_success());
}

#[tokio::test]
async fn test_login_success_returns_snapshot_and_pair() {
    let app = TestApp::spawn().await;

    let response = app.login("admin@x.com", "secret1").await;

    assert_eq!(response.message, "Login successful");
    assert_eq!(response.user.email, "admin@x.com");
    assert!(response.user.is_superuser);
    assert!(!response.tokens.access.is_empty());
    assert!(!response.tokens.refresh.is_empty());
}

#[tokio::test]
async fn test_login_accepts_username_alias() {
    let app = TestApp::spawn().await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "username": "admin@x.com", "password": "secret1" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_failure_is_401_invalid_credentials() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "email": "admin@x.com", "password": "wrong1" })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");
}

// --- Authenticated Routes ---

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = TestApp::spawn().await;

    for uri in ["/api/me", "/api/me/permissions", "/api/admin/users"] {
        let (status, body) = app.request(Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["kind"], "authentication_error");
    }
}

#[tokio::test]
async fn test_me_permissions_reflects_latest_writes() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let user_id = app.create_user(&admin, "u@x.com").await;
    let user = app.login("u@x.com", "abc123").await;
    assert!(user.user.permissions.is_empty());

    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/admin/users/{user_id}/permissions"),
            Some(&admin),
            Some(json!({ "page": "clients", "can_view": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(
            Method::GET,
            "/api/me/permissions",
            Some(&user.tokens.access),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let snapshot: PrincipalSnapshot = serde_json::from_value(body["user"].clone()).unwrap();
    assert_eq!(snapshot.permissions.len(), 1);
    assert!(snapshot.permissions[0].can_view);
    assert!(!snapshot.permissions[0].can_edit);
}

#[tokio::test]
async fn test_own_permissions_route_is_owner_only() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let alice_id = app.create_user(&admin, "alice@x.com").await;
    let bob_id = app.create_user(&admin, "bob@x.com").await;
    let alice = app.login("alice@x.com", "abc123").await.tokens.access;

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/principals/{alice_id}/permissions"),
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let entries: Vec<PermissionEntry> = serde_json::from_value(body).unwrap();
    assert!(entries.is_empty());

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/principals/{bob_id}/permissions"),
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "authorization_error");
}

// --- Admin Routes ---

#[tokio::test]
async fn test_admin_routes_forbid_regular_users_without_401() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    app.create_user(&admin, "u@x.com").await;
    let user = app.login("u@x.com", "abc123").await.tokens.access;

    let (status, body) = app
        .request(Method::GET, "/api/admin/users", Some(&user), None)
        .await;

    // Forbidden, not unauthenticated: the client must not log the caller out
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "superuser privileges required");
}

#[tokio::test]
async fn test_create_user_validation_errors() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    app.create_user(&admin, "dup@x.com").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/admin/users",
            Some(&admin),
            Some(json!({ "email": "dup@x.com", "password": "abc123" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "email in use");
    assert_eq!(body["kind"], "validation_error");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/admin/users",
            Some(&admin),
            Some(json!({ "email": "short@x.com", "password": "abc" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "password must be at least 6 characters");
}

#[tokio::test]
async fn test_set_permissions_invalid_page_is_400() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let user_id = app.create_user(&admin, "u@x.com").await;

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/admin/users/{user_id}/permissions"),
            Some(&admin),
            Some(json!({ "page": "warehouse", "can_view": true })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid page");
}

#[tokio::test]
async fn test_delete_user_then_listing_and_404() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let user_id = app.create_user(&admin, "u@x.com").await;
    let uri = format!("/api/admin/users/{user_id}");

    let (status, body) = app.request(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User deleted successfully");

    let (_, body) = app
        .request(Method::GET, "/api/admin/users", Some(&admin), None)
        .await;
    let listing: UsersResponse = serde_json::from_value(body).unwrap();
    assert_eq!(listing.users.len(), 1);
    assert_eq!(listing.users[0].principal.email, "admin@x.com");

    let (status, body) = app.request(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found");
}

#[tokio::test]
async fn test_deactivation_revokes_outstanding_tokens() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let user_id = app.create_user(&admin, "u@x.com").await;
    let user = app.login("u@x.com", "abc123").await.tokens.access;

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/admin/users/{user_id}/active"),
            Some(&admin),
            Some(json!({ "is_active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);

    let (status, _) = app.request(Method::GET, "/api/me", Some(&user), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "email": "u@x.com", "password": "abc123" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = TestApp::spawn().await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.headers().contains_key("x-request-id"));
    // The state handle stays usable alongside the router
    assert!(app.state.config.db_url.is_none());
}
