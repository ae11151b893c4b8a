use std::collections::BTreeMap;

use crate::models::{PageAction, PageKey, PermissionEntry, PermissionFlags};

use super::{
    api::ApiClient,
    error::ClientError,
    gate::{AccessGate, Destination, GateDecision, Route},
    outcome::ViewOutcome,
    pending::PendingFlag,
};

/// PagePermissions
///
/// One principal's entries keyed by page. A page without an entry reads as
/// `PermissionFlags::NONE`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagePermissions {
    pages: BTreeMap<PageKey, PermissionFlags>,
}

impl PagePermissions {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a PermissionEntry>) -> Self {
        let pages = entries
            .into_iter()
            .map(|entry| (entry.page, entry.flags()))
            .collect();
        Self { pages }
    }

    pub fn flags(&self, page: PageKey) -> PermissionFlags {
        self.pages.get(&page).copied().unwrap_or(PermissionFlags::NONE)
    }

    pub fn can(&self, page: PageKey, action: PageAction) -> bool {
        self.flags(page).allows(action)
    }

    /// Pages with `can_view`, in display order.
    pub fn visible_pages(&self) -> Vec<PageKey> {
        PageKey::ALL
            .into_iter()
            .filter(|page| self.can(*page, PageAction::View))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// UserView
///
/// The signed-in user's own dashboard. Reads only the caller's own entries; pages use
/// `permissions()` to decide which of their controls to offer.
#[derive(Clone)]
pub struct UserView {
    api: ApiClient,
    pending: PendingFlag,
}

impl UserView {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            pending: PendingFlag::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_pending()
    }

    /// load
    ///
    /// Gate check for the dashboard, then a fresh identity snapshot from the server so
    /// permission changes made by an administrator since login become visible.
    pub async fn load(&self) -> ViewOutcome {
        let context = self.api.context();
        match AccessGate::check(context.current().as_ref(), Destination::Dashboard) {
            GateDecision::Allow => {}
            GateDecision::RedirectLogin => {
                return ViewOutcome::Redirect {
                    to: Route::Login,
                    message: context.take_notice(),
                };
            }
            GateDecision::RedirectUnauthorized => {
                return ViewOutcome::Redirect {
                    to: Route::Unauthorized,
                    message: None,
                };
            }
        }

        let Some(_pending) = self.pending.begin() else {
            return ViewOutcome::Busy;
        };
        let epoch = context.epoch();
        match self.api.me_permissions().await {
            Ok(me) => {
                if context.refresh_identity(me.user, epoch) {
                    ViewOutcome::Success("Permissions loaded".to_string())
                } else {
                    ViewOutcome::Discarded
                }
            }
            Err(e) => ViewOutcome::from(&e),
        }
    }

    /// The caller's entries straight from the registry.
    pub async fn own_permissions(&self) -> Result<Vec<PermissionEntry>, ClientError> {
        let Some(principal) = self.api.context().current() else {
            return Err(ClientError::SessionExpired);
        };
        self.api.own_permissions(principal.id).await
    }

    /// Permissions from the identity snapshot; empty when signed out.
    pub fn permissions(&self) -> PagePermissions {
        self.api
            .context()
            .current()
            .map(|principal| PagePermissions::from_entries(&principal.permissions))
            .unwrap_or_default()
    }

    pub fn accessible_pages(&self) -> Vec<PageKey> {
        self.permissions().visible_pages()
    }

    /// open_page
    ///
    /// Route admission through the gate, then the page's own `can_view` check. A page the
    /// caller holds no view flag for is refused as unauthorized.
    pub fn open_page(&self, page: PageKey) -> Route {
        match AccessGate::navigate(self.api.context(), Route::Page(page)) {
            Route::Page(page) if self.permissions().can(page, PageAction::View) => Route::Page(page),
            Route::Page(_) => Route::Unauthorized,
            other => other,
        }
    }
}
