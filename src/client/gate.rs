use crate::models::{PageKey, PrincipalSnapshot};

use super::context::SessionContext;

/// Guarded destinations: everything behind the login screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    AdminConsole,
    Dashboard,
    Page(PageKey),
}

impl Destination {
    pub fn requires_superuser(self) -> bool {
        matches!(self, Destination::AdminConsole)
    }

    pub fn route(self) -> Route {
        match self {
            Destination::AdminConsole => Route::AdminConsole,
            Destination::Dashboard => Route::Dashboard,
            Destination::Page(page) => Route::Page(page),
        }
    }
}

/// Every navigation target the client knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Unauthorized,
    AdminConsole,
    Dashboard,
    Page(PageKey),
    NotFound,
}

impl Route {
    /// parse
    ///
    /// `/` lands on the login screen; `/admin`, `/dashboard` and `/<page_key>` are the
    /// guarded destinations; anything else is `NotFound`.
    pub fn parse(path: &str) -> Route {
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" | "/login" => Route::Login,
            "/unauthorized" => Route::Unauthorized,
            "/admin" => Route::AdminConsole,
            "/dashboard" => Route::Dashboard,
            other => other
                .strip_prefix('/')
                .and_then(|key| key.parse::<PageKey>().ok())
                .map(Route::Page)
                .unwrap_or(Route::NotFound),
        }
    }

    pub fn path(self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Unauthorized => "/unauthorized".to_string(),
            Route::AdminConsole => "/admin".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::Page(page) => page.path(),
            Route::NotFound => "/404".to_string(),
        }
    }

    pub fn destination(self) -> Option<Destination> {
        match self {
            Route::AdminConsole => Some(Destination::AdminConsole),
            Route::Dashboard => Some(Destination::Dashboard),
            Route::Page(page) => Some(Destination::Page(page)),
            Route::Login | Route::Unauthorized | Route::NotFound => None,
        }
    }

    /// Where a freshly authenticated principal lands.
    pub fn landing_for(principal: &PrincipalSnapshot) -> Route {
        if principal.is_superuser {
            Route::AdminConsole
        } else {
            Route::Dashboard
        }
    }
}

/// Who is asking, as far as the gate cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Anonymous,
    AuthenticatedUser,
    AuthenticatedSuperuser,
}

impl GateState {
    pub fn of(identity: Option<&PrincipalSnapshot>) -> GateState {
        match identity {
            None => GateState::Anonymous,
            Some(principal) if principal.is_superuser => GateState::AuthenticatedSuperuser,
            Some(_) => GateState::AuthenticatedUser,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    RedirectLogin,
    RedirectUnauthorized,
}

/// AccessGate
///
/// Route admission only: logged in or not, superuser or not. Per-page view/edit/create/
/// delete flags are not consulted here; each page reads them itself through
/// `PagePermissions`.
pub struct AccessGate;

impl AccessGate {
    /// Pure decision from the identity and the destination's superuser requirement.
    pub fn check_requirement(
        identity: Option<&PrincipalSnapshot>,
        requires_superuser: bool,
    ) -> GateDecision {
        match (GateState::of(identity), requires_superuser) {
            (GateState::Anonymous, _) => GateDecision::RedirectLogin,
            (GateState::AuthenticatedUser, true) => GateDecision::RedirectUnauthorized,
            _ => GateDecision::Allow,
        }
    }

    pub fn check(identity: Option<&PrincipalSnapshot>, destination: Destination) -> GateDecision {
        Self::check_requirement(identity, destination.requires_superuser())
    }

    /// navigate
    ///
    /// Resolves a requested route against the current session: guarded routes go through
    /// the gate, public ones pass unchanged.
    pub fn navigate(context: &SessionContext, requested: Route) -> Route {
        let Some(destination) = requested.destination() else {
            return requested;
        };
        let identity = context.current();
        match Self::check(identity.as_ref(), destination) {
            GateDecision::Allow => requested,
            GateDecision::RedirectLogin => {
                tracing::debug!(route = %requested.path(), "redirecting anonymous caller to login");
                Route::Login
            }
            GateDecision::RedirectUnauthorized => {
                tracing::debug!(route = %requested.path(), "superuser route refused");
                Route::Unauthorized
            }
        }
    }
}
