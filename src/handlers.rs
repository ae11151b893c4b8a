use crate::{
    AppState,
    auth::AuthPrincipal,
    error::{AccessError, AccessResult},
    models::{
        CreatePrincipalRequest, CreatePrincipalResponse, LoginForm, LoginRequest, LoginResponse,
        MeResponse, MessageResponse, PermissionEntry, Principal, SetActiveRequest,
        SetPermissionsRequest, UsersResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

// --- Public ---

/// login
///
/// [Public Route] The authentication service. Verifies the email/password pair and returns
/// the identity snapshot together with a fresh access/refresh pair.
///
/// Credentials are never logged; a failed attempt only records that it failed.
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(form): Json<LoginForm>,
) -> AccessResult<Json<LoginResponse>> {
    let payload = LoginRequest::from(form);
    let principal = state
        .registry
        .verify_credentials(&payload.email, &payload.password)
        .await
        .inspect_err(|e| {
            if matches!(e, AccessError::InvalidCredentials) {
                tracing::info!("login rejected");
            }
        })?;

    let tokens = state.tokens.issue(principal.id)?;
    let user = state.registry.snapshot(&principal).await?;
    tracing::info!(
        principal_id = %principal.id,
        is_superuser = principal.is_superuser,
        "login successful"
    );

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        user,
        tokens,
    }))
}

// --- Authenticated ---

/// get_me
///
/// [Authenticated Route] The caller's own account record.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Profile", body = Principal),
        (status = 401, description = "Session expired")
    )
)]
pub async fn get_me(
    caller: AuthPrincipal,
    State(state): State<AppState>,
) -> AccessResult<Json<Principal>> {
    state
        .registry
        .find_principal(caller.id)
        .await?
        .map(Json)
        .ok_or_else(|| AccessError::authentication("account unavailable"))
}

/// get_me_permissions
///
/// [Authenticated Route] Rebuilds the identity snapshot with the caller's current
/// entries. The User View uses it to refresh the Identity Context after login.
#[utoipa::path(
    get,
    path = "/api/me/permissions",
    responses(
        (status = 200, description = "Current identity", body = MeResponse),
        (status = 401, description = "Session expired")
    )
)]
pub async fn get_me_permissions(
    caller: AuthPrincipal,
    State(state): State<AppState>,
) -> AccessResult<Json<MeResponse>> {
    let principal = state
        .registry
        .find_principal(caller.id)
        .await?
        .ok_or_else(|| AccessError::authentication("account unavailable"))?;
    let user = state.registry.snapshot(&principal).await?;
    Ok(Json(MeResponse { user }))
}

/// get_own_permissions
///
/// [Authenticated Route] Entries of one principal, readable only by that principal.
#[utoipa::path(
    get,
    path = "/api/principals/{id}/permissions",
    params(("id" = Uuid, Path, description = "Principal ID")),
    responses(
        (status = 200, description = "Entries", body = [PermissionEntry]),
        (status = 403, description = "Not the owner")
    )
)]
pub async fn get_own_permissions(
    caller: AuthPrincipal,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AccessResult<Json<Vec<PermissionEntry>>> {
    Ok(Json(state.registry.get_own_permissions(&caller, id).await?))
}

// --- Admin ---

/// list_users
///
/// [Admin Route] Every principal with its permission entries.
#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
        (status = 200, description = "All principals", body = UsersResponse),
        (status = 403, description = "Not a superuser")
    )
)]
pub async fn list_users(
    caller: AuthPrincipal,
    State(state): State<AppState>,
) -> AccessResult<Json<UsersResponse>> {
    let users = state.registry.list_principals_with_permissions(&caller).await?;
    Ok(Json(UsersResponse { users }))
}

/// create_user
///
/// [Admin Route] Creates a principal. Returns 201 with the new record.
#[utoipa::path(
    post,
    path = "/api/admin/users",
    request_body = CreatePrincipalRequest,
    responses(
        (status = 201, description = "Created", body = CreatePrincipalResponse),
        (status = 400, description = "Email in use or password too short"),
        (status = 403, description = "Not a superuser")
    )
)]
pub async fn create_user(
    caller: AuthPrincipal,
    State(state): State<AppState>,
    Json(payload): Json<CreatePrincipalRequest>,
) -> AccessResult<(StatusCode, Json<CreatePrincipalResponse>)> {
    let principal = state
        .registry
        .create_principal(&caller, &payload.email, &payload.password)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatePrincipalResponse {
            message: "User created successfully".to_string(),
            principal,
        }),
    ))
}

/// delete_user
///
/// [Admin Route] Deletes a principal and, with it, all of its entries.
#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "Principal ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    caller: AuthPrincipal,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AccessResult<Json<MessageResponse>> {
    state.registry.delete_principal(&caller, id).await?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

/// set_user_permissions
///
/// [Admin Route] Replaces one `(principal, page)` entry wholesale.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/permissions",
    params(("id" = Uuid, Path, description = "Principal ID")),
    request_body = SetPermissionsRequest,
    responses(
        (status = 200, description = "Stored entry", body = PermissionEntry),
        (status = 400, description = "Invalid page or unknown principal")
    )
)]
pub async fn set_user_permissions(
    caller: AuthPrincipal,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetPermissionsRequest>,
) -> AccessResult<Json<PermissionEntry>> {
    let entry = state
        .registry
        .set_permissions(&caller, id, &payload.page, payload.flags())
        .await?;
    Ok(Json(entry))
}

/// set_user_active
///
/// [Admin Route] Activates or deactivates a principal.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/active",
    params(("id" = Uuid, Path, description = "Principal ID")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Updated", body = Principal),
        (status = 404, description = "Not Found")
    )
)]
pub async fn set_user_active(
    caller: AuthPrincipal,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetActiveRequest>,
) -> AccessResult<Json<Principal>> {
    let principal = state
        .registry
        .set_active(&caller, id, payload.is_active)
        .await?;
    Ok(Json(principal))
}
