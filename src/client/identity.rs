use std::sync::{PoisonError, RwLock};

use crate::models::PrincipalSnapshot;

/// IdentityContext
///
/// Read model of the authenticated principal. It never calls the network; login and the
/// User View's permission fetch fill it, logout and session expiry empty it.
#[derive(Debug, Default)]
pub struct IdentityContext {
    current: RwLock<Option<PrincipalSnapshot>>,
}

impl IdentityContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn establish(&self, principal: PrincipalSnapshot) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(principal);
    }

    pub fn current(&self) -> Option<PrincipalSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_established(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn teardown(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
