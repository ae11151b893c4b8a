use std::sync::Arc;

use crate::models::SessionCredential;

use super::storage::{CredentialStorage, StorageError};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// What storage currently holds for the pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredPair {
    Complete(SessionCredential),
    /// One half without the other (an interrupted write from an older build, a
    /// hand-edited file). Counts as no session; `SessionContext` clears it.
    Partial,
    Absent,
}

/// SessionStore
///
/// Sole owner of the bearer pair. Both tokens are written and removed together. Reads
/// never mutate storage: a half-present pair reads as no session, and repairing it is
/// left to `SessionContext`, which also resets the identity and epoch.
pub struct SessionStore {
    storage: Arc<dyn CredentialStorage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn CredentialStorage>) -> Self {
        Self { storage }
    }

    /// Persists both tokens, replacing any previous pair.
    pub fn set_session(&self, credential: &SessionCredential) -> Result<(), StorageError> {
        self.storage.set_all(&[
            (ACCESS_TOKEN_KEY, credential.access.as_str()),
            (REFRESH_TOKEN_KEY, credential.refresh.as_str()),
        ])
    }

    /// An unreadable store reads as `Absent`.
    pub fn stored(&self) -> StoredPair {
        match (self.read(ACCESS_TOKEN_KEY), self.read(REFRESH_TOKEN_KEY)) {
            (Some(access), Some(refresh)) => {
                StoredPair::Complete(SessionCredential { access, refresh })
            }
            (None, None) => StoredPair::Absent,
            _ => StoredPair::Partial,
        }
    }

    /// The stored pair, or `None` when either half is missing or storage is unreadable.
    pub fn credential(&self) -> Option<SessionCredential> {
        match self.stored() {
            StoredPair::Complete(credential) => Some(credential),
            StoredPair::Partial | StoredPair::Absent => None,
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.credential().map(|credential| credential.access)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.credential().map(|credential| credential.refresh)
    }

    /// `Authorization` header value for the current access token.
    pub fn bearer_header(&self) -> Option<String> {
        self.access_token().map(|token| format!("Bearer {token}"))
    }

    pub fn has_session(&self) -> bool {
        self.credential().is_some()
    }

    /// Removes both tokens. Idempotent; a storage failure is logged because there is no
    /// caller that could do anything better with it.
    pub fn clear_session(&self) {
        if let Err(e) = self
            .storage
            .remove_all(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY])
        {
            tracing::error!(error = %e, "failed to clear the stored credential pair");
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value.filter(|token| !token.is_empty()),
            Err(e) => {
                tracing::error!(error = %e, key, "failed to read the credential store");
                None
            }
        }
    }
}
