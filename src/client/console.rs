use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::models::{PageKey, PermissionFlags, PrincipalWithPermissions};

use super::{
    api::ApiClient,
    error::ClientError,
    gate::{AccessGate, Destination, GateDecision, Route},
    outcome::ViewOutcome,
    pending::{Pending, PendingFlag},
    user_view::PagePermissions,
};

/// Banner shown above the principal table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleStatus {
    Success(String),
    Error(String),
}

#[derive(Default)]
struct ConsoleState {
    principals: Vec<PrincipalWithPermissions>,
    status: Option<ConsoleStatus>,
    // Session epoch the listing was read under.
    loaded_at: Option<u64>,
}

impl ConsoleState {
    fn clear(&mut self) {
        self.principals.clear();
        self.status = None;
        self.loaded_at = None;
    }
}

/// AdminConsole
///
/// The superuser's screen over the Permission Registry. Holds no state of its own beyond
/// the last listing: every successful mutation (and every `NotFound`) is followed by a
/// full re-read, so the table always reflects the registry.
///
/// The listing belongs to the session it was read under. Once that session ends, by
/// logout, expiry or a new login, the console reports no principals and no status.
///
/// One action at a time. While an exchange is pending, further actions return
/// `ViewOutcome::Busy` without being sent.
pub struct AdminConsole {
    api: ApiClient,
    state: Mutex<ConsoleState>,
    pending: PendingFlag,
}

impl AdminConsole {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: Mutex::new(ConsoleState::default()),
            pending: PendingFlag::new(),
        }
    }

    /// open
    ///
    /// Gate check for the console, then the initial listing.
    pub async fn open(&self) -> ViewOutcome {
        let context = self.api.context();
        match AccessGate::check(context.current().as_ref(), Destination::AdminConsole) {
            GateDecision::Allow => self.refresh().await,
            GateDecision::RedirectLogin => {
                self.state().clear();
                ViewOutcome::Redirect {
                    to: Route::Login,
                    message: context.take_notice(),
                }
            }
            GateDecision::RedirectUnauthorized => {
                self.state().clear();
                ViewOutcome::Redirect {
                    to: Route::Unauthorized,
                    message: None,
                }
            }
        }
    }

    pub async fn refresh(&self) -> ViewOutcome {
        let Some(_pending) = self.begin() else {
            return ViewOutcome::Busy;
        };
        match self.reload().await {
            Ok(()) => ViewOutcome::Success("Users loaded".to_string()),
            Err(e) => self.fail(e),
        }
    }

    pub async fn create_principal(&self, email: &str, password: &str) -> ViewOutcome {
        let Some(_pending) = self.begin() else {
            return ViewOutcome::Busy;
        };
        let result = self
            .api
            .create_user(email, password)
            .await
            .map(|created| created.message);
        self.settle(result).await
    }

    pub async fn delete_principal(&self, id: Uuid) -> ViewOutcome {
        let Some(_pending) = self.begin() else {
            return ViewOutcome::Busy;
        };
        let result = self.api.delete_user(id).await.map(|deleted| deleted.message);
        self.settle(result).await
    }

    /// save_permissions
    ///
    /// Replaces all four flags of one (principal, page) entry.
    pub async fn save_permissions(
        &self,
        id: Uuid,
        page: PageKey,
        flags: PermissionFlags,
    ) -> ViewOutcome {
        let Some(_pending) = self.begin() else {
            return ViewOutcome::Busy;
        };
        let result = self
            .api
            .set_permissions(id, page, flags)
            .await
            .map(|_| format!("Permissions saved for {}", page.label()));
        self.settle(result).await
    }

    pub async fn set_active(&self, id: Uuid, is_active: bool) -> ViewOutcome {
        let Some(_pending) = self.begin() else {
            return ViewOutcome::Busy;
        };
        let result = self.api.set_active(id, is_active).await.map(|principal| {
            if principal.is_active {
                format!("{} activated", principal.email)
            } else {
                format!("{} deactivated", principal.email)
            }
        });
        self.settle(result).await
    }

    pub fn principals(&self) -> Vec<PrincipalWithPermissions> {
        self.state().principals.clone()
    }

    /// Editor view of one listed principal's entries.
    pub fn permissions_of(&self, id: Uuid) -> Option<PagePermissions> {
        self.state()
            .principals
            .iter()
            .find(|row| row.principal.id == id)
            .map(|row| PagePermissions::from_entries(&row.permissions))
    }

    pub fn status(&self) -> Option<ConsoleStatus> {
        self.state().status.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_pending()
    }

    fn begin(&self) -> Option<Pending<'_>> {
        let pending = self.pending.begin();
        if pending.is_none() {
            tracing::debug!("console action rejected; another is pending");
        }
        pending
    }

    async fn reload(&self) -> Result<(), ClientError> {
        let epoch = self.api.context().epoch();
        let listing = self.api.list_users().await?;
        let mut state = self.state();
        state.principals = listing.users;
        state.loaded_at = Some(epoch);
        Ok(())
    }

    /// Turns a mutation result into the screen's outcome, re-reading the listing where the
    /// registry may have changed underneath the table.
    async fn settle(&self, result: Result<String, ClientError>) -> ViewOutcome {
        match result {
            Ok(message) => match self.reload().await {
                Ok(()) => {
                    self.state().status = Some(ConsoleStatus::Success(message.clone()));
                    ViewOutcome::Success(message)
                }
                Err(e) => self.fail(e),
            },
            Err(ClientError::NotFound(message)) => {
                if let Err(e) = self.reload().await {
                    return self.fail(e);
                }
                self.state().status = Some(ConsoleStatus::Error(message.clone()));
                ViewOutcome::InlineError(message)
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&self, error: ClientError) -> ViewOutcome {
        let outcome = ViewOutcome::from(&error);
        let mut state = self.state();
        match &outcome {
            ViewOutcome::Redirect { .. } => state.clear(),
            ViewOutcome::InlineError(message) => {
                state.status = Some(ConsoleStatus::Error(message.clone()));
            }
            _ => {}
        }
        outcome
    }

    /// The console state, emptied first if the session it was loaded under has ended.
    fn state(&self) -> MutexGuard<'_, ConsoleState> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state
            .loaded_at
            .is_some_and(|epoch| epoch != self.api.context().epoch())
        {
            state.clear();
        }
        state
    }
}
