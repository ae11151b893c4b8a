use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::models::{
    CreatePrincipalRequest, CreatePrincipalResponse, LoginRequest, LoginResponse, MeResponse,
    MessageResponse, PageKey, PermissionEntry, PermissionFlags, Principal, SetActiveRequest,
    SetPermissionsRequest, UsersResponse,
};

use super::{
    context::SessionContext,
    error::{ClientError, TransportError},
    transport::{ApiRequest, ApiResponse, Transport},
};

/// ApiClient
///
/// The request interceptor. Every protected call goes through `call`, which attaches the
/// bearer token and is the single place an authentication failure is turned into a
/// cleared session. Views only ever see the resulting `ClientError`.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    context: Arc<SessionContext>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, context: Arc<SessionContext>) -> Self {
        Self { transport, context }
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    // --- Anonymous ---

    /// login
    ///
    /// The one call made without a session. A 401 here means the credentials were wrong,
    /// not that a session expired, so nothing is cleared.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let body = serde_json::to_value(LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })
        .map_err(malformed)?;
        let response = self
            .transport
            .send(ApiRequest::new(Method::POST, "/api/login").json(body))
            .await?;

        if response.status == StatusCode::UNAUTHORIZED {
            let message = response
                .message()
                .unwrap_or_else(|| "Invalid credentials".to_string());
            return Err(ClientError::InvalidCredentials(message));
        }
        decode(classify(response)?)
    }

    // --- Authenticated ---

    pub async fn me(&self) -> Result<Principal, ClientError> {
        self.get("/api/me").await
    }

    /// The caller's identity snapshot, permissions included.
    pub async fn me_permissions(&self) -> Result<MeResponse, ClientError> {
        self.get("/api/me/permissions").await
    }

    pub async fn own_permissions(&self, id: Uuid) -> Result<Vec<PermissionEntry>, ClientError> {
        self.get(&format!("/api/principals/{id}/permissions")).await
    }

    // --- Superuser ---

    pub async fn list_users(&self) -> Result<UsersResponse, ClientError> {
        self.get("/api/admin/users").await
    }

    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
    ) -> Result<CreatePrincipalResponse, ClientError> {
        let body = serde_json::to_value(CreatePrincipalRequest {
            email: email.to_string(),
            password: password.to_string(),
        })
        .map_err(malformed)?;
        self.call(Method::POST, "/api/admin/users", Some(body)).await
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<MessageResponse, ClientError> {
        self.call(Method::DELETE, &format!("/api/admin/users/{id}"), None)
            .await
    }

    pub async fn set_permissions(
        &self,
        id: Uuid,
        page: PageKey,
        flags: PermissionFlags,
    ) -> Result<PermissionEntry, ClientError> {
        let body = serde_json::to_value(SetPermissionsRequest::new(page, flags)).map_err(malformed)?;
        self.call(
            Method::PUT,
            &format!("/api/admin/users/{id}/permissions"),
            Some(body),
        )
        .await
    }

    pub async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Principal, ClientError> {
        let body = serde_json::to_value(SetActiveRequest { is_active }).map_err(malformed)?;
        self.call(
            Method::PUT,
            &format!("/api/admin/users/{id}/active"),
            Some(body),
        )
        .await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.call(Method::GET, path, None).await
    }

    /// call
    ///
    /// Sends a protected request under the current session epoch.
    ///
    /// - No stored token: the session is treated as expired without touching the network.
    /// - The session ended while the request was in flight: the response is dropped.
    /// - 401: the session that issued the request is torn down and the caller gets
    ///   `SessionExpired`; a newer session is left alone.
    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        let epoch = self.context.epoch();
        let Some(token) = self.context.credential().map(|credential| credential.access) else {
            self.context.expire(epoch);
            return Err(ClientError::SessionExpired);
        };

        let mut request = ApiRequest::new(method, path).bearer(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        let result = self.transport.send(request).await;

        if self.context.epoch() != epoch {
            tracing::debug!(path, "dropping a response from an ended session");
            return Err(ClientError::Superseded);
        }
        let response = result?;

        if response.status == StatusCode::UNAUTHORIZED {
            tracing::info!(path, "request rejected as unauthenticated");
            self.context.expire(epoch);
            return Err(ClientError::SessionExpired);
        }
        decode(classify(response)?)
    }
}

/// Maps a non-success status to the error kind a view acts on.
fn classify(response: ApiResponse) -> Result<ApiResponse, ClientError> {
    if response.status.is_success() {
        return Ok(response);
    }
    let message = response
        .message()
        .unwrap_or_else(|| response.status.to_string());
    Err(match response.status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ClientError::Validation(message),
        StatusCode::FORBIDDEN => ClientError::Authorization(message),
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::UNAUTHORIZED => ClientError::SessionExpired,
        status => TransportError::UnexpectedStatus {
            status: status.as_u16(),
            message,
        }
        .into(),
    })
}

fn decode<T: DeserializeOwned>(response: ApiResponse) -> Result<T, ClientError> {
    let body = if response.body.is_null() {
        json!({})
    } else {
        response.body
    };
    serde_json::from_value(body).map_err(malformed)
}

fn malformed(e: serde_json::Error) -> ClientError {
    TransportError::Malformed(e.to_string()).into()
}
