use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    auth::{AuthPrincipal, CredentialHasher},
    error::{AccessError, AccessResult},
    models::{
        PageKey, PermissionEntry, PermissionFlags, Principal, PrincipalRecord, PrincipalSnapshot,
        PrincipalWithPermissions,
    },
    repository::RepositoryState,
};

pub const MIN_PASSWORD_LEN: usize = 6;

/// PermissionRegistry
///
/// The authoritative `(principal, page) -> flags` mapping plus the principal lifecycle.
/// Every operation takes the calling principal and enforces the rules itself, so a route
/// wired to the wrong router still cannot escalate:
///
/// - administration (listing, creating, deleting, permission writes) is superuser-only,
/// - a principal may read only its own entries,
/// - there is no cache; every read goes to the repository, so a write is visible to the
///   next read from any session.
#[derive(Clone)]
pub struct PermissionRegistry {
    repo: RepositoryState,
    hasher: CredentialHasher,
}

impl PermissionRegistry {
    pub fn new(repo: RepositoryState, hasher: CredentialHasher) -> Self {
        Self { repo, hasher }
    }

    pub async fn find_principal(&self, id: Uuid) -> AccessResult<Option<Principal>> {
        Ok(self.repo.find_principal(id).await?)
    }

    /// list_principals_with_permissions
    ///
    /// Every principal with its entries, in the repository's stable order.
    pub async fn list_principals_with_permissions(
        &self,
        caller: &AuthPrincipal,
    ) -> AccessResult<Vec<PrincipalWithPermissions>> {
        require_superuser(caller)?;

        let principals = self.repo.list_principals().await?;
        let mut by_principal: HashMap<Uuid, Vec<PermissionEntry>> = HashMap::new();
        for entry in self.repo.all_permissions().await? {
            by_principal.entry(entry.principal_id).or_default().push(entry);
        }

        Ok(principals
            .into_iter()
            .map(|principal| {
                let mut permissions = by_principal.remove(&principal.id).unwrap_or_default();
                permissions.sort_by_key(|entry| entry.page);
                PrincipalWithPermissions {
                    principal,
                    permissions,
                }
            })
            .collect())
    }

    /// create_principal
    ///
    /// Creates a regular (non-superuser) active principal with no permission entries.
    pub async fn create_principal(
        &self,
        caller: &AuthPrincipal,
        email: &str,
        password: &str,
    ) -> AccessResult<Principal> {
        require_superuser(caller)?;
        let principal = self.insert(email, password, false).await?;
        tracing::info!(
            admin_id = %caller.id,
            principal_id = %principal.id,
            "principal created"
        );
        Ok(principal)
    }

    /// delete_principal
    ///
    /// Removes the principal; its entries are removed with it.
    pub async fn delete_principal(&self, caller: &AuthPrincipal, id: Uuid) -> AccessResult<()> {
        require_superuser(caller)?;
        if !self.repo.delete_principal(id).await? {
            return Err(AccessError::not_found("User not found"));
        }
        tracing::info!(admin_id = %caller.id, principal_id = %id, "principal deleted");
        Ok(())
    }

    /// set_permissions
    ///
    /// Upserts the entry for `(principal_id, page)`, replacing all four flags.
    pub async fn set_permissions(
        &self,
        caller: &AuthPrincipal,
        principal_id: Uuid,
        page: &str,
        flags: PermissionFlags,
    ) -> AccessResult<PermissionEntry> {
        require_superuser(caller)?;
        if page.is_empty() {
            return Err(AccessError::validation("Page is required"));
        }
        let page: PageKey = page.parse()?;

        if self.repo.find_principal(principal_id).await?.is_none() {
            return Err(AccessError::validation("unknown principal"));
        }
        // The principal can still vanish between the check and the write; the repository
        // reports that as `MissingPrincipal`, which maps to the same validation error.
        let entry = self
            .repo
            .upsert_permission(PermissionEntry::new(principal_id, page, flags))
            .await?;

        tracing::info!(
            admin_id = %caller.id,
            principal_id = %principal_id,
            page = %page,
            can_view = flags.can_view,
            can_edit = flags.can_edit,
            can_create = flags.can_create,
            can_delete = flags.can_delete,
            "permissions updated"
        );
        Ok(entry)
    }

    /// set_active
    ///
    /// Activates or deactivates a principal. Deactivated principals cannot log in and
    /// their outstanding tokens stop working on the next request.
    pub async fn set_active(
        &self,
        caller: &AuthPrincipal,
        principal_id: Uuid,
        is_active: bool,
    ) -> AccessResult<Principal> {
        require_superuser(caller)?;
        let principal = self
            .repo
            .set_active(principal_id, is_active)
            .await?
            .ok_or_else(|| AccessError::not_found("User not found"))?;
        tracing::info!(
            admin_id = %caller.id,
            principal_id = %principal_id,
            is_active,
            "principal activation changed"
        );
        Ok(principal)
    }

    /// get_own_permissions
    ///
    /// Self-service read. Pages without an entry are absent, which means no access.
    pub async fn get_own_permissions(
        &self,
        caller: &AuthPrincipal,
        principal_id: Uuid,
    ) -> AccessResult<Vec<PermissionEntry>> {
        if caller.id != principal_id {
            return Err(AccessError::authorization(
                "permissions can only be read by their owner",
            ));
        }
        Ok(self.repo.permissions_for(principal_id).await?)
    }

    /// Builds the identity snapshot handed to the client at login and on refresh.
    pub async fn snapshot(&self, principal: &Principal) -> AccessResult<PrincipalSnapshot> {
        Ok(PrincipalSnapshot {
            id: principal.id,
            email: principal.email.clone(),
            is_superuser: principal.is_superuser,
            permissions: self.repo.permissions_for(principal.id).await?,
        })
    }

    /// verify_credentials
    ///
    /// The authentication service's check. Unknown email, wrong password and inactive
    /// account all produce the same `InvalidCredentials`.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> AccessResult<Principal> {
        let email = normalize_email(email);
        let record = self
            .repo
            .find_credentials(&email)
            .await?
            .ok_or(AccessError::InvalidCredentials)?;

        if !record.principal.is_active || !self.hasher.verify(&record.password_hash, password) {
            return Err(AccessError::InvalidCredentials);
        }
        Ok(record.principal)
    }

    /// bootstrap_superuser
    ///
    /// Seeds the first administrator from configuration. Returns the existing principal
    /// untouched if the email is already registered.
    pub async fn bootstrap_superuser(&self, email: &str, password: &str) -> AccessResult<Principal> {
        if let Some(existing) = self.repo.find_credentials(&normalize_email(email)).await? {
            return Ok(existing.principal);
        }
        let principal = self.insert(email, password, true).await?;
        tracing::info!(principal_id = %principal.id, "bootstrap superuser created");
        Ok(principal)
    }

    async fn insert(&self, email: &str, password: &str, is_superuser: bool) -> AccessResult<Principal> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AccessError::validation("Email and password are required"));
        }
        if !email.contains('@') {
            return Err(AccessError::validation("invalid email"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AccessError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let record = PrincipalRecord {
            principal: Principal {
                id: Uuid::new_v4(),
                email,
                is_active: true,
                is_superuser,
                date_joined: Utc::now(),
            },
            password_hash: self.hasher.hash(password)?,
        };
        Ok(self.repo.insert_principal(record).await?)
    }
}

fn require_superuser(caller: &AuthPrincipal) -> AccessResult<()> {
    if caller.is_superuser {
        Ok(())
    } else {
        tracing::warn!(principal_id = %caller.id, "superuser-only operation refused");
        Err(AccessError::authorization("superuser privileges required"))
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
