use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Server half: the authentication service and the Permission Registry over HTTP.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod registry;
pub mod repository;

// Client half: session, identity, gate, interceptor, console and user view.
pub mod client;

// Routing segregated by access level (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthPrincipal;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::{CredentialHasher, TokenIssuer};
pub use config::{AppConfig, ClientConfig};
pub use error::{AccessError, AccessResult};
pub use registry::PermissionRegistry;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every handler and wire model, served at `/api-docs/openapi.json`
/// and browsable through Swagger UI.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::get_me, handlers::get_me_permissions,
        handlers::get_own_permissions, handlers::list_users, handlers::create_user,
        handlers::delete_user, handlers::set_user_permissions, handlers::set_user_active
    ),
    components(
        schemas(
            models::PageKey, models::PermissionFlags, models::PermissionEntry, models::Principal,
            models::PrincipalSnapshot, models::PrincipalWithPermissions, models::SessionCredential,
            models::LoginRequest, models::LoginResponse, models::MeResponse, models::UsersResponse,
            models::CreatePrincipalRequest, models::CreatePrincipalResponse,
            models::SetPermissionsRequest, models::SetActiveRequest, models::MessageResponse,
        )
    ),
    tags(
        (name = "access-portal", description = "Authentication and page permission API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, cloneable container shared by every request: the registry (repository and
/// password hasher behind it), the token issuer and the loaded configuration.
#[derive(Clone)]
pub struct AppState {
    pub registry: PermissionRegistry,
    pub tokens: TokenIssuer,
    pub config: AppConfig,
}

impl AppState {
    /// Wires the state from a configuration and an already-built repository.
    pub fn new(config: AppConfig, repo: RepositoryState) -> AccessResult<Self> {
        let hasher = CredentialHasher::from_config(&config)?;
        Ok(Self {
            registry: PermissionRegistry::new(repo, hasher),
            tokens: TokenIssuer::from_config(&config),
            config,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for PermissionRegistry {
    fn from_ref(app_state: &AppState) -> PermissionRegistry {
        app_state.registry.clone()
    }
}

impl FromRef<AppState> for TokenIssuer {
    fn from_ref(app_state: &AppState) -> TokenIssuer {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Guards the authenticated and admin routers. Extracting `AuthPrincipal` verifies the
/// bearer token and rejects with 401 before any handler runs; the resolved identity is
/// left in the request extensions so handlers do not resolve it a second time.
async fn auth_middleware(_caller: AuthPrincipal, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies the scoped auth middleware and the global
/// observability layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .nest(
            "/api/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the request id, so every log line of a
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
