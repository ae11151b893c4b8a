use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// The Administrator Console's contract with the Permission Registry. Nested under
/// `/api/admin`. A non-superuser caller gets 403 from the registry, which the client treats
/// as an inline error rather than a session loss.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /users lists every principal with its entries.
        // POST /users creates a principal.
        .route(
            "/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        // DELETE /users/{id} cascades to the principal's entries.
        .route("/users/{id}", axum::routing::delete(handlers::delete_user))
        // PUT /users/{id}/permissions replaces one page entry wholesale.
        .route(
            "/users/{id}/permissions",
            put(handlers::set_user_permissions),
        )
        // PUT /users/{id}/active deactivates or reactivates an account.
        .route("/users/{id}/active", put(handlers::set_user_active))
}
