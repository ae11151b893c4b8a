use std::sync::Arc;

use super::{
    api::ApiClient,
    context::SessionContext,
    error::ClientError,
    gate::{AccessGate, Route},
    pending::PendingFlag,
};

/// AuthFlow
///
/// Login, logout and session resume. Login is the only path that establishes a session;
/// a failed attempt leaves every piece of client state exactly as it was.
///
/// Login and resume share one pending flag: while either is in flight, another attempt
/// returns `ClientError::Busy` without being sent.
#[derive(Clone)]
pub struct AuthFlow {
    api: ApiClient,
    pending: PendingFlag,
}

impl AuthFlow {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            pending: PendingFlag::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_pending()
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        self.api.context()
    }

    /// login
    ///
    /// On success the pair is persisted, the identity published, and the caller is routed
    /// to its landing page: the admin console for superusers, the dashboard otherwise.
    pub async fn login(&self, email: &str, password: &str) -> Result<Route, ClientError> {
        let Some(_pending) = self.pending.begin() else {
            tracing::debug!("login rejected; another attempt is pending");
            return Err(ClientError::Busy);
        };
        let response = self.api.login(email, password).await.inspect_err(|e| {
            tracing::info!(error = %e, "login failed");
        })?;

        self.context().establish(&response.tokens, response.user.clone())?;
        let landing = Route::landing_for(&response.user);
        tracing::info!(
            principal_id = %response.user.id,
            landing = %landing.path(),
            "logged in"
        );
        Ok(landing)
    }

    /// Explicit logout. Idempotent; always lands on the login screen.
    pub fn logout(&self) -> Route {
        self.context().teardown();
        tracing::info!("logged out");
        Route::Login
    }

    /// resume
    ///
    /// Rebuilds the identity from a credential pair left in storage by an earlier run.
    /// Returns `Ok(false)` when there is nothing to resume. A rejected token clears the
    /// pair through the interceptor and reports `SessionExpired`.
    pub async fn resume(&self) -> Result<bool, ClientError> {
        let Some(_pending) = self.pending.begin() else {
            return Err(ClientError::Busy);
        };
        let context = self.context();
        if !context.has_session() {
            return Ok(false);
        }
        let epoch = context.epoch();
        let me = self.api.me_permissions().await?;
        Ok(context.refresh_identity(me.user, epoch))
    }

    /// Resolves a requested route against the current identity.
    pub fn navigate(&self, requested: Route) -> Route {
        AccessGate::navigate(self.context(), requested)
    }
}
