use access_portal::{
    models::{PageKey, PermissionEntry, PermissionFlags, Principal, PrincipalRecord},
    repository::{InMemoryRepository, PostgresRepository, Repository},
};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Data Helpers ---

fn record(email: &str) -> PrincipalRecord {
    PrincipalRecord {
        principal: Principal {
            id: Uuid::new_v4(),
            email: email.to_string(),
            is_active: true,
            is_superuser: false,
            date_joined: Utc::now(),
        },
        password_hash: "$argon2id$v=19$m=1024,t=1,p=1$c2FsdA$aGFzaA".to_string(),
    }
}

/// The behaviour both implementations must share.
async fn exercise_repository(repo: &dyn Repository, tag: &str) {
    let email = format!("{tag}@repo.test");
    let alice = repo.insert_principal(record(&email)).await.unwrap();

    // Unique email
    assert!(repo.insert_principal(record(&email)).await.is_err());

    // Credentials lookup returns the hash, plain lookups do not need it
    let found = repo.find_credentials(&email).await.unwrap().unwrap();
    assert_eq!(found.principal.id, alice.id);
    assert!(found.password_hash.starts_with("$argon2id$"));
    assert_eq!(repo.find_principal(alice.id).await.unwrap(), Some(alice.clone()));

    // Upsert replaces the entry for (principal, page)
    repo.upsert_permission(PermissionEntry::new(
        alice.id,
        PageKey::Suppliers,
        PermissionFlags::ALL,
    ))
    .await
    .unwrap();
    repo.upsert_permission(PermissionEntry::new(
        alice.id,
        PageKey::Suppliers,
        PermissionFlags::view_only(),
    ))
    .await
    .unwrap();
    repo.upsert_permission(PermissionEntry::new(
        alice.id,
        PageKey::ProductsList,
        PermissionFlags::NONE,
    ))
    .await
    .unwrap();
    let entries = repo.permissions_for(alice.id).await.unwrap();
    assert_eq!(
        entries,
        vec![
            PermissionEntry::new(alice.id, PageKey::ProductsList, PermissionFlags::NONE),
            PermissionEntry::new(alice.id, PageKey::Suppliers, PermissionFlags::view_only()),
        ]
    );

    // Writes for a missing principal are refused
    assert!(
        repo.upsert_permission(PermissionEntry::new(
            Uuid::new_v4(),
            PageKey::Clients,
            PermissionFlags::ALL,
        ))
        .await
        .is_err()
    );

    // Activation flag
    let inactive = repo.set_active(alice.id, false).await.unwrap().unwrap();
    assert!(!inactive.is_active);
    assert!(repo.set_active(Uuid::new_v4(), false).await.unwrap().is_none());

    // Delete cascades
    assert!(repo.delete_principal(alice.id).await.unwrap());
    assert!(!repo.delete_principal(alice.id).await.unwrap());
    assert!(repo.permissions_for(alice.id).await.unwrap().is_empty());
    assert!(
        repo.all_permissions()
            .await
            .unwrap()
            .iter()
            .all(|entry| entry.principal_id != alice.id)
    );
}

#[tokio::test]
async fn test_in_memory_repository_contract() {
    let repo = InMemoryRepository::new();
    exercise_repository(&repo, "memory").await;
}

#[tokio::test]
async fn test_in_memory_listing_keeps_join_order() {
    let repo = InMemoryRepository::new();
    let first = repo.insert_principal(record("first@x.com")).await.unwrap();
    let second = repo.insert_principal(record("second@x.com")).await.unwrap();

    let ids: Vec<Uuid> = repo
        .list_principals()
        .await
        .unwrap()
        .into_iter()
        .map(|principal| principal.id)
        .collect();

    assert_eq!(ids, vec![first.id, second.id]);
}

#[tokio::test]
#[ignore = "requires a Postgres instance in DATABASE_URL"]
async fn test_postgres_repository_contract() {
    dotenv::dotenv().ok();
    let db_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set to run integration tests");
    let pool = PgPool::connect(&db_url)
        .await
        .expect("Failed to connect to database for integration tests.");
    let repo = PostgresRepository::new(pool);
    repo.ensure_schema().await.expect("Failed to apply schema");

    exercise_repository(&repo, &format!("pg-{}", Uuid::new_v4())).await;
}
