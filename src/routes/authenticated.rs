use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Self-service routes for any principal holding a valid access token. Handlers receive
/// the `AuthPrincipal` resolved by the middleware and only ever read the caller's own data.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/me
        .route("/api/me", get(handlers::get_me))
        // GET /api/me/permissions
        // Current identity snapshot, used to rebuild the client's Identity Context.
        .route("/api/me/permissions", get(handlers::get_me_permissions))
        // GET /api/principals/{id}/permissions
        // Own entries only; any other id answers 403.
        .route(
            "/api/principals/{id}/permissions",
            get(handlers::get_own_permissions),
        )
}
