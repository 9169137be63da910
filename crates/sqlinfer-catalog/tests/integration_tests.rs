//! Integration tests for catalog adapters
//!
//! Tests requiring a live database are marked with `#[ignore]` and can be run
//! with `cargo test -- --ignored`.
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all non-ignored tests (no database required)
//! cargo test -p sqlinfer-catalog --test integration_tests
//!
//! # Run PostgreSQL integration tests
//! PGHOST=localhost \
//! PGPORT=5432 \
//! PGDATABASE=mydb \
//! PGUSER=user \
//! PGPASSWORD=pass \
//! cargo test -p sqlinfer-catalog --features postgres --test integration_tests -- --ignored
//! ```

mod fixtures;

use sqlinfer_catalog::{CatalogAdapter, FetchError, MockAdapter, MockAdapterBuilder};
use sqlinfer_core::{DataKind, DataRequests, LoadedData, QualifiedName};
use std::sync::Arc;

// =============================================================================
// Helper Functions
// =============================================================================

/// Check if PostgreSQL credentials are available
fn has_postgres_credentials() -> bool {
    std::env::var("PGHOST").is_ok()
}

fn fixture_adapter() -> MockAdapter {
    MockAdapter::from_data(fixtures::catalog())
}

fn names(loaded: &[LoadedData]) -> Vec<String> {
    loaded.iter().map(|record| record.name().to_string()).collect()
}

// =============================================================================
// Mock Adapter Tests
// =============================================================================

#[tokio::test]
async fn test_load_all_covers_the_search_path() {
    let adapter = fixture_adapter();
    let loaded = adapter.load_all().await.unwrap();

    // billing and audit are not on the default search path
    let loaded_names = names(&loaded);
    assert!(loaded_names.contains(&"public.users".to_string()));
    assert!(loaded_names.contains(&"pg_catalog.sum".to_string()));
    assert!(!loaded_names.contains(&"audit.users".to_string()));
    assert!(!loaded_names.contains(&"billing.address".to_string()));
}

#[tokio::test]
async fn test_load_selected_by_kind() {
    let adapter = fixture_adapter();

    let mut requests = DataRequests::new();
    requests.add_table(QualifiedName::unqualified("users"));
    requests.add_table(QualifiedName::unqualified("active_users"));
    requests.add_function(QualifiedName::unqualified("lower"));
    requests.add_named_type(QualifiedName::unqualified("account_state"));
    requests.add_named_type(QualifiedName::qualified("billing", "address"));

    let loaded = adapter.load_selected(&requests).await.unwrap();
    let kinds: Vec<DataKind> = loaded.iter().map(LoadedData::kind).collect();

    assert_eq!(
        names(&loaded),
        vec![
            "public.users",
            "public.active_users",
            "pg_catalog.lower",
            "pg_catalog.lower",
            "public.account_state",
            "billing.address",
        ]
    );
    assert_eq!(
        kinds,
        vec![
            DataKind::Table,
            DataKind::Table,
            DataKind::Function,
            DataKind::Function,
            DataKind::Enum,
            DataKind::Composite,
        ]
    );
}

#[tokio::test]
async fn test_views_carry_their_sql() {
    let adapter = fixture_adapter();
    let mut requests = DataRequests::new();
    requests.add_table(QualifiedName::unqualified("active_users"));

    let loaded = adapter.load_selected(&requests).await.unwrap();
    match &loaded[..] {
        [LoadedData::View { source, .. }] => assert!(source.starts_with("SELECT id, email")),
        other => panic!("Expected one view, got {:?}", other),
    }
}

#[tokio::test]
async fn test_search_path_order() {
    let adapter = fixture_adapter().with_search_path(vec!["audit".into(), "public".into()]);
    let mut requests = DataRequests::new();
    requests.add_table(QualifiedName::unqualified("users"));

    let loaded = adapter.load_selected(&requests).await.unwrap();
    assert_eq!(names(&loaded), vec!["audit.users"]);
}

#[tokio::test]
async fn test_error_propagation() {
    let adapter = MockAdapterBuilder::new()
        .with_data(fixtures::users_table())
        .with_error("users", FetchError::QueryError("canceling statement".into()))
        .build();

    let mut requests = DataRequests::new();
    requests.add_table(QualifiedName::unqualified("users"));

    let error = adapter.load_selected(&requests).await.unwrap_err();
    assert_eq!(error.to_string(), "Query failed: canceling statement");
}

#[tokio::test]
async fn test_adapter_as_trait_object() {
    let adapters: Vec<Arc<dyn CatalogAdapter>> = vec![
        Arc::new(fixture_adapter()),
        Arc::new(MockAdapter::new().with_name("Empty")),
    ];

    let mut totals = Vec::new();
    for adapter in &adapters {
        adapter.test_connection().await.unwrap();
        totals.push((adapter.name(), adapter.load_all().await.unwrap().len()));
    }

    assert_eq!(totals[1], ("Empty", 0));
    assert!(totals[0].1 > 0);
}

#[tokio::test]
async fn test_concurrent_loads_share_the_request_log() {
    let adapter = fixture_adapter().with_latency(5);

    let mut handles = Vec::new();
    for table in ["users", "accounts", "active_users"] {
        let adapter = adapter.clone();
        handles.push(tokio::spawn(async move {
            let mut requests = DataRequests::new();
            requests.add_table(QualifiedName::unqualified(table));
            adapter.load_selected(&requests).await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().len(), 1);
    }
    assert_eq!(adapter.requests().await.len(), 3);
}

#[tokio::test]
async fn test_postgres_without_feature_or_server_fails_cleanly() {
    // Either the feature is off (ConfigError) or nothing listens on port 1
    let result = sqlinfer_catalog::PostgresAdapter::connect("127.0.0.1", 1, "db", "u", "p").await;
    assert!(matches!(
        result,
        Err(FetchError::ConfigError(_)) | Err(FetchError::AuthenticationError(_))
    ));
}

// =============================================================================
// PostgreSQL Integration Tests (require a database)
// =============================================================================

#[cfg(feature = "postgres")]
async fn postgres_adapter() -> sqlinfer_catalog::PostgresAdapter {
    let host = std::env::var("PGHOST").expect("PGHOST must be set");
    let port: u16 = std::env::var("PGPORT")
        .unwrap_or_else(|_| "5432".to_string())
        .parse()
        .expect("Invalid port");
    let database = std::env::var("PGDATABASE").unwrap_or_else(|_| "postgres".to_string());
    let user = std::env::var("PGUSER").unwrap_or_else(|_| "postgres".to_string());
    let password = std::env::var("PGPASSWORD").unwrap_or_default();

    sqlinfer_catalog::PostgresAdapter::connect(&host, port, &database, &user, &password)
        .await
        .expect("Failed to create PostgreSQL adapter")
}

#[tokio::test]
#[ignore]
async fn test_postgres_connection() {
    if !has_postgres_credentials() {
        eprintln!("Skipping PostgreSQL test: set PGHOST, PGPORT, PGDATABASE, PGUSER, and PGPASSWORD");
        return;
    }

    #[cfg(feature = "postgres")]
    {
        let adapter = postgres_adapter().await;
        adapter.test_connection().await.expect("Connection test failed");
    }

    #[cfg(not(feature = "postgres"))]
    {
        eprintln!("PostgreSQL feature not enabled. Rebuild with --features postgres");
    }
}

#[tokio::test]
#[ignore]
async fn test_postgres_loads_builtin_functions() {
    if !has_postgres_credentials() {
        return;
    }

    #[cfg(feature = "postgres")]
    {
        let adapter = postgres_adapter().await;

        let mut requests = DataRequests::new();
        requests.add_function(QualifiedName::unqualified("lower"));
        requests.add_function(QualifiedName::unqualified("count"));
        requests.add_table(QualifiedName::unqualified("pg_class"));

        let loaded = adapter.load_selected(&requests).await.expect("Failed to load");

        assert!(loaded.iter().any(|record| matches!(
            record,
            LoadedData::Function { name, args, .. } if name.name == "lower" && args == &["text"]
        )));
        assert!(loaded.iter().any(|record| matches!(
            record,
            LoadedData::Function { name, is_aggregate: true, .. } if name.name == "count"
        )));
        assert!(loaded.iter().any(|record| matches!(
            record,
            LoadedData::Table { name, columns } if name.name == "pg_class" && !columns.is_empty()
        )));
    }
}
