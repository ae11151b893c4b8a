use access_portal::{
    AccessError, AppConfig, AppState, InMemoryRepository,
    auth::{AuthPrincipal, CredentialHasher, TokenIssuer, TokenKind},
    models::Principal,
};
use axum::{
    extract::FromRequestParts,
    http::{Method, Request, Uri, header, request::Parts},
};
use std::sync::Arc;
use uuid::Uuid;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

fn create_app_state() -> AppState {
    let config = AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };
    AppState::new(config, Arc::new(InMemoryRepository::new())).unwrap()
}

async fn seed_admin(state: &AppState) -> Principal {
    state
        .registry
        .bootstrap_superuser("admin@x.com", "secret1")
        .await
        .unwrap()
}

async fn seed_user(state: &AppState, email: &str) -> Principal {
    let admin = AuthPrincipal::from(&seed_admin(state).await);
    state
        .registry
        .create_principal(&admin, email, "abc123")
        .await
        .unwrap()
}

/// Helper to get the mutable Parts struct from a generated Request
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn bearer_parts(token: &str) -> Parts {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    parts
}

// --- Extractor Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let state = create_app_state();
    let user = seed_user(&state, "u@x.com").await;
    let credential = state.tokens.issue(user.id).unwrap();

    let mut parts = bearer_parts(&credential.access);
    let auth_principal = AuthPrincipal::from_request_parts(&mut parts, &state).await;

    let principal = auth_principal.unwrap();
    assert_eq!(principal.id, user.id);
    assert_eq!(principal.email, "u@x.com");
    assert!(!principal.is_superuser);
    // The resolved identity is cached for the rest of the request
    assert_eq!(parts.extensions.get::<AuthPrincipal>(), Some(&principal));
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let state = create_app_state();
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let auth_principal = AuthPrincipal::from_request_parts(&mut parts, &state).await;

    assert_eq!(
        auth_principal.unwrap_err(),
        AccessError::authentication("missing bearer token")
    );
}

#[tokio::test]
async fn test_auth_failure_with_non_bearer_scheme() {
    let state = create_app_state();
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_static("Basic YWRtaW46c2VjcmV0"),
    );

    let auth_principal = AuthPrincipal::from_request_parts(&mut parts, &state).await;

    assert!(matches!(
        auth_principal,
        Err(AccessError::Authentication(_))
    ));
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    let state = create_app_state();
    let user = seed_user(&state, "u@x.com").await;
    // Well past the default validation leeway
    let token = state.tokens.sign(user.id, TokenKind::Access, -120).unwrap();

    let mut parts = bearer_parts(&token);
    let auth_principal = AuthPrincipal::from_request_parts(&mut parts, &state).await;

    assert_eq!(
        auth_principal.unwrap_err(),
        AccessError::authentication("token expired")
    );
}

#[tokio::test]
async fn test_auth_failure_with_refresh_token() {
    let state = create_app_state();
    let user = seed_user(&state, "u@x.com").await;
    let credential = state.tokens.issue(user.id).unwrap();

    let mut parts = bearer_parts(&credential.refresh);
    let auth_principal = AuthPrincipal::from_request_parts(&mut parts, &state).await;

    assert_eq!(
        auth_principal.unwrap_err(),
        AccessError::authentication("not an access token")
    );
}

#[tokio::test]
async fn test_auth_failure_with_foreign_signature() {
    let state = create_app_state();
    let user = seed_user(&state, "u@x.com").await;
    let forged = TokenIssuer::new("some-other-secret", 300, 600)
        .issue(user.id)
        .unwrap();

    let mut parts = bearer_parts(&forged.access);
    let auth_principal = AuthPrincipal::from_request_parts(&mut parts, &state).await;

    assert_eq!(
        auth_principal.unwrap_err(),
        AccessError::authentication("invalid token")
    );
}

#[tokio::test]
async fn test_auth_failure_for_deleted_principal() {
    let state = create_app_state();
    let user = seed_user(&state, "u@x.com").await;
    let credential = state.tokens.issue(user.id).unwrap();
    let admin = AuthPrincipal::from(&seed_admin(&state).await);
    state.registry.delete_principal(&admin, user.id).await.unwrap();

    let mut parts = bearer_parts(&credential.access);
    let auth_principal = AuthPrincipal::from_request_parts(&mut parts, &state).await;

    assert_eq!(
        auth_principal.unwrap_err(),
        AccessError::authentication("account unavailable")
    );
}

#[tokio::test]
async fn test_auth_failure_for_deactivated_principal() {
    let state = create_app_state();
    let user = seed_user(&state, "u@x.com").await;
    let credential = state.tokens.issue(user.id).unwrap();
    let admin = AuthPrincipal::from(&seed_admin(&state).await);
    state
        .registry
        .set_active(&admin, user.id, false)
        .await
        .unwrap();

    let mut parts = bearer_parts(&credential.access);
    let auth_principal = AuthPrincipal::from_request_parts(&mut parts, &state).await;

    assert!(matches!(
        auth_principal,
        Err(AccessError::Authentication(_))
    ));
}

#[tokio::test]
async fn test_auth_failure_for_unknown_subject() {
    let state = create_app_state();
    let credential = state.tokens.issue(Uuid::new_v4()).unwrap();

    let mut parts = bearer_parts(&credential.access);
    let auth_principal = AuthPrincipal::from_request_parts(&mut parts, &state).await;

    assert!(auth_principal.is_err());
}

// --- Token and Hash Tests ---

#[test]
fn test_issued_pair_tokens_are_distinct() {
    let issuer = TokenIssuer::new(TEST_JWT_SECRET, 300, 86_400);
    let id = Uuid::new_v4();

    let first = issuer.issue(id).unwrap();
    let second = issuer.issue(id).unwrap();

    assert_ne!(first.access, first.refresh);
    assert_ne!(first.access, second.access);
    assert_eq!(issuer.verify_access(&first.access).unwrap().sub, id);
}

#[test]
fn test_credential_hasher_round_trip() {
    let hasher = CredentialHasher::new(1024, 1).unwrap();
    let hash = hasher.hash("secret1").unwrap();

    assert!(hash.starts_with("$argon2id$"));
    assert!(hasher.verify(&hash, "secret1"));
    assert!(!hasher.verify(&hash, "secret2"));
    assert!(!hasher.verify("not-a-phc-string", "secret1"));
}

#[test]
fn test_credential_hasher_salts_every_hash() {
    let hasher = CredentialHasher::new(1024, 1).unwrap();
    assert_ne!(
        hasher.hash("secret1").unwrap(),
        hasher.hash("secret1").unwrap()
    );
}
