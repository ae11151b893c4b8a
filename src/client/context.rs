use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::models::{PrincipalSnapshot, SessionCredential};

use super::{
    identity::IdentityContext,
    session::{SessionStore, StoredPair},
    storage::{CredentialStorage, MemoryStorage, StorageError},
};

pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please log in again.";

/// SessionContext
///
/// Owns the Session Store and the Identity Context and is the only place that changes
/// them, so the two are always set and cleared together. Constructed once, shared by `Arc`
/// with the interceptor and the views.
///
/// Every establish/teardown bumps the session *epoch*. A request remembers the epoch it
/// started under; if the epoch has moved by the time the response arrives, the response
/// belongs to a session that no longer exists and is dropped.
pub struct SessionContext {
    session: SessionStore,
    identity: IdentityContext,
    lifecycle: Mutex<Lifecycle>,
}

#[derive(Default)]
struct Lifecycle {
    epoch: u64,
    notice: Option<String>,
}

impl SessionContext {
    pub fn new(storage: Arc<dyn CredentialStorage>) -> Self {
        Self {
            session: SessionStore::new(storage),
            identity: IdentityContext::new(),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn identity(&self) -> &IdentityContext {
        &self.identity
    }

    pub fn current(&self) -> Option<PrincipalSnapshot> {
        self.identity.current()
    }

    /// credential
    ///
    /// The stored pair. A half-present pair ends the session on sight, so the identity
    /// never outlives the credential it was published for.
    pub fn credential(&self) -> Option<SessionCredential> {
        let mut lifecycle = self.lifecycle();
        match self.session.stored() {
            StoredPair::Complete(credential) => Some(credential),
            StoredPair::Absent => None,
            StoredPair::Partial => {
                tracing::warn!("discarding a half-present credential pair");
                self.end(&mut lifecycle);
                None
            }
        }
    }

    pub fn has_session(&self) -> bool {
        self.credential().is_some()
    }

    pub fn epoch(&self) -> u64 {
        self.lifecycle().epoch
    }

    /// establish
    ///
    /// Starts a session: persists the pair, then publishes the identity. If the pair cannot
    /// be persisted nothing is published and any previous session is gone.
    pub fn establish(
        &self,
        credential: &SessionCredential,
        principal: PrincipalSnapshot,
    ) -> Result<(), StorageError> {
        let mut lifecycle = self.lifecycle();
        lifecycle.epoch += 1;
        lifecycle.notice = None;

        if let Err(e) = self.session.set_session(credential) {
            self.session.clear_session();
            self.identity.teardown();
            return Err(e);
        }
        tracing::debug!(principal_id = %principal.id, epoch = lifecycle.epoch, "session established");
        self.identity.establish(principal);
        Ok(())
    }

    /// refresh_identity
    ///
    /// Replaces the identity snapshot within the running session (fresh permissions, or a
    /// session resumed from storage). Ignored when the session it was fetched under has
    /// ended in the meantime or no credential pair is stored.
    pub fn refresh_identity(&self, principal: PrincipalSnapshot, fetched_at: u64) -> bool {
        let lifecycle = self.lifecycle();
        if lifecycle.epoch != fetched_at || !self.session.has_session() {
            return false;
        }
        self.identity.establish(principal);
        true
    }

    /// Explicit logout. Idempotent.
    pub fn teardown(&self) {
        let mut lifecycle = self.lifecycle();
        self.end(&mut lifecycle);
    }

    /// expire
    ///
    /// Implicit logout after an authentication failure observed by a request started at
    /// `observed_at`. A stale failure from an earlier session leaves the current one alone.
    /// The session-expired notice is only raised if there was a session to lose.
    pub fn expire(&self, observed_at: u64) -> bool {
        let mut lifecycle = self.lifecycle();
        if lifecycle.epoch != observed_at {
            return false;
        }
        let had_session =
            self.identity.is_established() || self.session.stored() != StoredPair::Absent;
        self.end(&mut lifecycle);
        if had_session {
            tracing::info!("session expired; credentials cleared");
            lifecycle.notice = Some(SESSION_EXPIRED_MESSAGE.to_string());
        }
        true
    }

    /// One-shot message for the login screen (e.g. the session-expired notice).
    pub fn take_notice(&self) -> Option<String> {
        self.lifecycle().notice.take()
    }

    fn end(&self, lifecycle: &mut Lifecycle) {
        lifecycle.epoch += 1;
        self.session.clear_session();
        self.identity.teardown();
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
