use crate::{
    error::{RepoResult, RepositoryError},
    models::{PageKey, PermissionEntry, Principal, PrincipalRecord},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock},
};
use uuid::Uuid;

/// Repository Trait
///
/// The persistence contract behind the Permission Registry. Handlers never talk to it
/// directly; they go through `PermissionRegistry`, which adds the authorization and
/// validation rules. Both implementations guarantee:
///
/// - emails are unique (`RepositoryError::Conflict` on a duplicate),
/// - at most one entry per `(principal, page)` (writes are upserts),
/// - deleting a principal deletes its entries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Principals ---
    // Stable order: join date, then id.
    async fn list_principals(&self) -> RepoResult<Vec<Principal>>;
    async fn find_principal(&self, id: Uuid) -> RepoResult<Option<Principal>>;
    // Lookup used only by credential verification; the hash never leaves the registry.
    async fn find_credentials(&self, email: &str) -> RepoResult<Option<PrincipalRecord>>;
    async fn insert_principal(&self, record: PrincipalRecord) -> RepoResult<Principal>;
    // Returns false when nothing was deleted.
    async fn delete_principal(&self, id: Uuid) -> RepoResult<bool>;
    async fn set_active(&self, id: Uuid, is_active: bool) -> RepoResult<Option<Principal>>;

    // --- Permissions ---
    // Wholesale upsert of all four flags. `MissingPrincipal` if the principal is gone.
    async fn upsert_permission(&self, entry: PermissionEntry) -> RepoResult<PermissionEntry>;
    // Entries of one principal, in page display order.
    async fn permissions_for(&self, principal_id: Uuid) -> RepoResult<Vec<PermissionEntry>>;
    async fn all_permissions(&self) -> RepoResult<Vec<PermissionEntry>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres ---

const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. Constraint violations are mapped onto the
/// repository error variants so the registry can report them as validation errors.
pub struct PostgresRepository {
    pool: PgPool,
}

#[derive(FromRow)]
struct PrincipalRow {
    id: Uuid,
    email: String,
    password_hash: String,
    is_active: bool,
    is_superuser: bool,
    date_joined: DateTime<Utc>,
}

impl PrincipalRow {
    fn into_record(self) -> PrincipalRecord {
        PrincipalRecord {
            principal: Principal {
                id: self.id,
                email: self.email,
                is_active: self.is_active,
                is_superuser: self.is_superuser,
                date_joined: self.date_joined,
            },
            password_hash: self.password_hash,
        }
    }
}

#[derive(FromRow)]
struct PermissionRow {
    principal_id: Uuid,
    page: String,
    can_view: bool,
    can_edit: bool,
    can_create: bool,
    can_delete: bool,
}

impl TryFrom<PermissionRow> for PermissionEntry {
    type Error = RepositoryError;

    fn try_from(row: PermissionRow) -> Result<Self, Self::Error> {
        let page = row
            .page
            .parse::<PageKey>()
            .map_err(|_| RepositoryError::Malformed(format!("unknown page key {:?}", row.page)))?;
        Ok(PermissionEntry {
            principal_id: row.principal_id,
            page,
            can_view: row.can_view,
            can_edit: row.can_edit,
            can_create: row.can_create,
            can_delete: row.can_delete,
        })
    }
}

fn into_entries(rows: Vec<PermissionRow>) -> RepoResult<Vec<PermissionEntry>> {
    let mut entries = rows
        .into_iter()
        .map(PermissionEntry::try_from)
        .collect::<RepoResult<Vec<_>>>()?;
    // Display order is defined by the enum, not by the text column.
    entries.sort_by_key(|entry| (entry.principal_id, entry.page));
    Ok(entries)
}

const PRINCIPAL_COLUMNS: &str = "id, email, password_hash, is_active, is_superuser, date_joined";
const PERMISSION_COLUMNS: &str = "principal_id, page, can_view, can_edit, can_create, can_delete";

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled schema. Every statement is `IF NOT EXISTS`, so this is safe to
    /// run on every startup.
    pub async fn ensure_schema(&self) -> RepoResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_principals(&self) -> RepoResult<Vec<Principal>> {
        let rows = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM principals ORDER BY date_joined ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|row| row.into_record().principal).collect())
    }

    async fn find_principal(&self, id: Uuid) -> RepoResult<Option<Principal>> {
        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| row.into_record().principal))
    }

    async fn find_credentials(&self, email: &str) -> RepoResult<Option<PrincipalRecord>> {
        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(PrincipalRow::into_record))
    }

    /// insert_principal
    ///
    /// Relies on the `UNIQUE (email)` constraint rather than a read-then-write check, so
    /// two concurrent creations of the same email cannot both succeed.
    async fn insert_principal(&self, record: PrincipalRecord) -> RepoResult<Principal> {
        let PrincipalRecord {
            principal,
            password_hash,
        } = record;
        let result = sqlx::query_as::<_, PrincipalRow>(&format!(
            "INSERT INTO principals ({PRINCIPAL_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {PRINCIPAL_COLUMNS}"
        ))
        .bind(principal.id)
        .bind(&principal.email)
        .bind(password_hash)
        .bind(principal.is_active)
        .bind(principal.is_superuser)
        .bind(principal.date_joined)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row.into_record().principal),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(RepositoryError::Conflict(principal.email))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// delete_principal
    ///
    /// Entries go with the principal through `ON DELETE CASCADE`.
    async fn delete_principal(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM principals WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> RepoResult<Option<Principal>> {
        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "UPDATE principals SET is_active = $2 WHERE id = $1 RETURNING {PRINCIPAL_COLUMNS}"
        ))
        .bind(id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| row.into_record().principal))
    }

    /// upsert_permission
    ///
    /// `ON CONFLICT ... DO UPDATE` replaces all four flags, never a subset. A foreign key
    /// violation means the principal was deleted in the meantime.
    async fn upsert_permission(&self, entry: PermissionEntry) -> RepoResult<PermissionEntry> {
        let result = sqlx::query_as::<_, PermissionRow>(&format!(
            "INSERT INTO page_permissions ({PERMISSION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (principal_id, page) DO UPDATE SET \
                 can_view = EXCLUDED.can_view, \
                 can_edit = EXCLUDED.can_edit, \
                 can_create = EXCLUDED.can_create, \
                 can_delete = EXCLUDED.can_delete \
             RETURNING {PERMISSION_COLUMNS}"
        ))
        .bind(entry.principal_id)
        .bind(entry.page.as_str())
        .bind(entry.can_view)
        .bind(entry.can_edit)
        .bind(entry.can_create)
        .bind(entry.can_delete)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => PermissionEntry::try_from(row),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(RepositoryError::MissingPrincipal(entry.principal_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn permissions_for(&self, principal_id: Uuid) -> RepoResult<Vec<PermissionEntry>> {
        let rows = sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM page_permissions WHERE principal_id = $1"
        ))
        .bind(principal_id)
        .fetch_all(&self.pool)
        .await?;
        into_entries(rows)
    }

    async fn all_permissions(&self) -> RepoResult<Vec<PermissionEntry>> {
        let rows = sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM page_permissions"
        ))
        .fetch_all(&self.pool)
        .await?;
        into_entries(rows)
    }
}

// --- In-Memory ---

/// InMemoryRepository
///
/// `Repository` kept in process memory. Used by the test suites and by `Env::Local` when
/// no `DATABASE_URL` is configured. Principals keep insertion order; entries are keyed by
/// `(principal, page)`, which makes duplicates unrepresentable.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    principals: Vec<PrincipalRecord>,
    permissions: BTreeMap<(Uuid, PageKey), PermissionEntry>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_principals(&self) -> RepoResult<Vec<Principal>> {
        Ok(self
            .read()
            .principals
            .iter()
            .map(|record| record.principal.clone())
            .collect())
    }

    async fn find_principal(&self, id: Uuid) -> RepoResult<Option<Principal>> {
        Ok(self
            .read()
            .principals
            .iter()
            .find(|record| record.principal.id == id)
            .map(|record| record.principal.clone()))
    }

    async fn find_credentials(&self, email: &str) -> RepoResult<Option<PrincipalRecord>> {
        Ok(self
            .read()
            .principals
            .iter()
            .find(|record| record.principal.email == email)
            .cloned())
    }

    async fn insert_principal(&self, record: PrincipalRecord) -> RepoResult<Principal> {
        let mut tables = self.write();
        if tables
            .principals
            .iter()
            .any(|existing| existing.principal.email == record.principal.email)
        {
            return Err(RepositoryError::Conflict(record.principal.email));
        }
        let principal = record.principal.clone();
        tables.principals.push(record);
        Ok(principal)
    }

    async fn delete_principal(&self, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.write();
        let before = tables.principals.len();
        tables.principals.retain(|record| record.principal.id != id);
        let deleted = tables.principals.len() != before;
        if deleted {
            tables.permissions.retain(|(principal_id, _), _| *principal_id != id);
        }
        Ok(deleted)
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> RepoResult<Option<Principal>> {
        let mut tables = self.write();
        Ok(tables
            .principals
            .iter_mut()
            .find(|record| record.principal.id == id)
            .map(|record| {
                record.principal.is_active = is_active;
                record.principal.clone()
            }))
    }

    async fn upsert_permission(&self, entry: PermissionEntry) -> RepoResult<PermissionEntry> {
        let mut tables = self.write();
        if !tables
            .principals
            .iter()
            .any(|record| record.principal.id == entry.principal_id)
        {
            return Err(RepositoryError::MissingPrincipal(entry.principal_id));
        }
        tables
            .permissions
            .insert((entry.principal_id, entry.page), entry);
        Ok(entry)
    }

    async fn permissions_for(&self, principal_id: Uuid) -> RepoResult<Vec<PermissionEntry>> {
        Ok(self
            .read()
            .permissions
            .range((principal_id, PageKey::ALL[0])..=(principal_id, PageKey::ALL[9]))
            .map(|(_, entry)| *entry)
            .collect())
    }

    async fn all_permissions(&self) -> RepoResult<Vec<PermissionEntry>> {
        Ok(self.read().permissions.values().copied().collect())
    }
}
