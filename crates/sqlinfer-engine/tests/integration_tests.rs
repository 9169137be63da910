//! End to end resolution tests: SQL text in, concrete types out
//!
//! Synchronous tests resolve against a fully loaded store; async tests go
//! through a [`Session`] so catalog loading is exercised as well.

mod fixtures;

use pretty_assertions::assert_eq;
use sqlinfer_core::{
    ErrorCode, LoadedQueryInterface, QualifiedName, QueryInterface, ResolveMode,
    Type, TypeKind,
};
use sqlinfer_engine::{resolve, BatchQuery, LoadError, Session};
use sqlinfer_sql::{parse, to_positional, to_query_interface};
use std::sync::Arc;

// =============================================================================
// Helper Functions
// =============================================================================

fn extract(sql: &str) -> QueryInterface {
    let statement = parse(sql).unwrap_or_else(|e| panic!("{}: {}", sql, e));
    to_query_interface(&statement, &[])
}

fn strict(sql: &str) -> Result<LoadedQueryInterface, LoadError> {
    resolve(&fixtures::store(), &extract(sql), ResolveMode::Strict)
}

fn lenient(sql: &str) -> Result<LoadedQueryInterface, LoadError> {
    resolve(&fixtures::store(), &extract(sql), ResolveMode::Lenient)
}

fn result<'a>(loaded: &'a LoadedQueryInterface, name: &str) -> &'a Type {
    &loaded
        .result(name)
        .unwrap_or_else(|| panic!("no result {} in {:?}", name, loaded.results))
        .ty
}

fn has_key(value: &serde_json::Value, key: &str) -> bool {
    match value {
        serde_json::Value::Object(map) => {
            map.contains_key(key) || map.values().any(|inner| has_key(inner, key))
        }
        serde_json::Value::Array(items) => items.iter().any(|inner| has_key(inner, key)),
        _ => false,
    }
}

fn session() -> (Session, sqlinfer_catalog::MockAdapter) {
    let adapter = fixtures::adapter();
    (Session::new(Arc::new(adapter.clone())), adapter)
}

// =============================================================================
// Core Properties
// =============================================================================

#[test]
fn test_round_trip_example() {
    let loaded = strict("SELECT id, state FROM accounts WHERE id = $id").unwrap();

    assert_eq!(loaded.params.len(), 1);
    assert_eq!(loaded.params[0].name, "id");
    assert_eq!(loaded.params[0].ty.kind, TypeKind::Number);
    assert!(!loaded.params[0].ty.nullable);

    let names: Vec<&str> = loaded.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["id", "state"]);
    assert_eq!(result(&loaded, "id").kind, TypeKind::Number);
    assert_eq!(
        result(&loaded, "state").kind,
        TypeKind::Union {
            items: vec![Type::literal("Active"), Type::literal("Closed")]
        }
    );
    assert!(!result(&loaded, "state").nullable);
}

#[test]
fn test_resolution_is_idempotent_and_concrete() {
    let queries = [
        "SELECT id, state FROM accounts WHERE id = $id",
        "SELECT u.*, o.total FROM users u LEFT JOIN orders o ON o.user_id = u.id",
        "SELECT COALESCE(name, nickname) AS display, lower(email) FROM users WHERE id = ANY($ids)",
        "INSERT INTO pairs (a, b) VALUES $$rows(a, b) RETURNING a",
        "SELECT id, name FROM t_view_view",
    ];
    let store = fixtures::store();

    for sql in queries {
        let qi = extract(sql);
        let first = resolve(&store, &qi, ResolveMode::Strict).unwrap();
        let second = resolve(&store, &qi, ResolveMode::Strict).unwrap();
        assert_eq!(first, second, "{}", sql);

        let json = serde_json::to_value(&first).unwrap();
        assert!(!has_key(&json, "load"), "deferred type escaped in {}", sql);
    }
}

#[test]
fn test_param_merge_is_a_union() {
    let loaded = strict("SELECT id FROM users WHERE name = $value OR id = $value").unwrap();

    assert_eq!(loaded.params.len(), 1);
    let param = &loaded.params[0];
    assert_eq!(param.spans.len(), 2);
    match &param.ty.kind {
        TypeKind::Union { items } => {
            assert_eq!(items.len(), 2);
            assert!(items.iter().any(|item| item.kind == TypeKind::String));
            assert!(items.iter().any(|item| item.kind == TypeKind::Number));
        }
        other => panic!("Expected union, got {:?}", other),
    }
    // name is nullable, id is not
    assert!(param.ty.nullable);
}

#[test]
fn test_optional_filter_param_takes_the_column_type() {
    let loaded =
        strict("SELECT id FROM users WHERE ($name IS NULL OR name = $name)").unwrap();

    let param = loaded.param("name").unwrap();
    assert_eq!(param.spans.len(), 2);
    assert_eq!(param.ty.kind, TypeKind::String);
    assert!(param.ty.nullable);
}

#[test]
fn test_ambiguity_detection() {
    let error = strict("SELECT id FROM a JOIN b ON a.x = b.x").unwrap_err();
    assert_eq!(error.code, ErrorCode::AmbiguousColumn);
    assert_eq!(error.candidates, vec!["a", "b"]);

    let loaded = strict("SELECT a.id FROM a JOIN b ON a.x = b.x").unwrap();
    assert_eq!(loaded.results[0].ty.kind, TypeKind::Number);
}

#[test]
fn test_schema_qualified_column_of_unqualified_table() {
    let loaded = strict("SELECT public.users.id FROM users WHERE public.users.name = $name").unwrap();
    assert_eq!(result(&loaded, "id").kind, TypeKind::Number);
    assert_eq!(loaded.param("name").unwrap().ty.kind, TypeKind::String);

    assert!(strict("SELECT billing.users.id FROM users").is_err());
    assert!(strict("SELECT public.users.id FROM users u").is_err());
}

#[test]
fn test_operator_nullability_propagation() {
    let loaded = strict("SELECT quantity + 1 AS next, id + 1 AS next_id FROM orders").unwrap();

    assert_eq!(result(&loaded, "next").kind, TypeKind::Number);
    assert!(result(&loaded, "next").nullable);
    assert_eq!(result(&loaded, "next_id").kind, TypeKind::BigInt);
    assert!(!result(&loaded, "next_id").nullable);
}

#[test]
fn test_coalesce_nullability() {
    let loaded = strict("SELECT COALESCE(name, 'anonymous') AS display FROM users").unwrap();
    assert_eq!(result(&loaded, "display").kind, TypeKind::String);
    assert!(!result(&loaded, "display").nullable);

    let loaded = strict("SELECT COALESCE(name, nickname) AS display FROM users").unwrap();
    assert_eq!(result(&loaded, "display").kind, TypeKind::String);
    assert!(result(&loaded, "display").nullable);
}

#[test]
fn test_spread_parameter_example() {
    let sql = "INSERT INTO pairs (a, b) VALUES $$rows(a, b)";
    let loaded = strict(sql).unwrap();

    let rows = loaded.param("rows").unwrap();
    assert!(rows.spread);
    match &rows.ty.kind {
        TypeKind::ObjectLiteral { items } => {
            assert_eq!(items[0].name, "a");
            assert_eq!(items[0].ty.kind, TypeKind::Number);
            assert_eq!(items[1].ty.kind, TypeKind::String);
        }
        other => panic!("Expected object literal, got {:?}", other),
    }

    let query = to_positional(
        sql,
        &loaded.params,
        &serde_json::json!({ "rows": [{ "a": 1, "b": 2 }, { "a": 3, "b": 4 }] }),
    )
    .unwrap();
    assert_eq!(query.sql, "INSERT INTO pairs (a, b) VALUES ($1,$2),($3,$4)");
    assert_eq!(
        query.values,
        vec![
            serde_json::json!(1),
            serde_json::json!(2),
            serde_json::json!(3),
            serde_json::json!(4)
        ]
    );
}

#[test]
fn test_splicing_params_of_nested_queries() {
    let sql = "SELECT id FROM users WHERE id IN \
               (SELECT owner_id FROM accounts WHERE state = $state) AND name = $name";
    let loaded = strict(sql).unwrap();
    assert!(loaded.param("state").is_some());

    let query = to_positional(
        sql,
        &loaded.params,
        &serde_json::json!({ "state": "open", "name": "x" }),
    )
    .unwrap();
    assert_eq!(
        query.sql,
        "SELECT id FROM users WHERE id IN \
         (SELECT owner_id FROM accounts WHERE state = $1) AND name = $2"
    );
    assert_eq!(
        query.values,
        vec![serde_json::json!("open"), serde_json::json!("x")]
    );
}

// =============================================================================
// Sources and Scopes
// =============================================================================

#[test]
fn test_outer_join_nullability() {
    let loaded = strict(
        "SELECT u.id, o.id AS order_id FROM users u LEFT JOIN orders o ON o.user_id = u.id",
    )
    .unwrap();
    assert!(!result(&loaded, "id").nullable);
    assert_eq!(result(&loaded, "order_id").kind, TypeKind::BigInt);
    assert!(result(&loaded, "order_id").nullable);
}

#[test]
fn test_star_expands_views() {
    let loaded = strict("SELECT * FROM t_view").unwrap();
    let names: Vec<&str> = loaded.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["id", "name"]);
}

#[test]
fn test_correlated_scalar_subquery() {
    let loaded = strict(
        "SELECT u.id, (SELECT count(*) FROM accounts a WHERE a.owner_id = u.id) AS account_count \
         FROM users u",
    )
    .unwrap();
    assert_eq!(result(&loaded, "account_count").kind, TypeKind::BigInt);
}

#[test]
fn test_nested_params_are_merged_in_order() {
    let loaded = strict(
        "SELECT id FROM users \
         WHERE id IN (SELECT owner_id FROM accounts WHERE state = $state) AND email = $email",
    )
    .unwrap();

    let names: Vec<&str> = loaded.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["state", "email"]);
    assert!(matches!(loaded.params[0].ty.kind, TypeKind::Union { .. }));
    assert_eq!(loaded.params[1].ty.kind, TypeKind::String);
}

#[test]
fn test_cte_params_and_results() {
    let loaded = strict(
        "WITH big AS (SELECT id, quantity FROM orders WHERE quantity > $min) \
         SELECT b.id FROM big b",
    )
    .unwrap();
    assert_eq!(result(&loaded, "id").kind, TypeKind::BigInt);
    assert_eq!(loaded.param("min").unwrap().ty.kind, TypeKind::Number);
}

#[test]
fn test_unnest_source() {
    let loaded = strict("SELECT tag FROM users, unnest(tags) AS tag").unwrap();
    assert_eq!(result(&loaded, "tag").kind, TypeKind::String);
}

#[test]
fn test_insert_on_conflict() {
    let loaded = strict(
        "INSERT INTO users (id, email) VALUES ($id, $email) \
         ON CONFLICT (id) DO UPDATE SET email = excluded.email RETURNING id",
    )
    .unwrap();

    assert_eq!(loaded.param("id").unwrap().ty.kind, TypeKind::Number);
    assert_eq!(loaded.param("email").unwrap().ty.kind, TypeKind::String);
    let names: Vec<&str> = loaded.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["id"]);
    assert_eq!(result(&loaded, "id").kind, TypeKind::Number);
}

#[test]
fn test_required_param_is_not_nullable() {
    let loaded = strict("SELECT id FROM users WHERE name = $name!").unwrap();
    let param = loaded.param("name").unwrap();
    assert!(param.required);
    assert_eq!(param.ty.kind, TypeKind::String);
    assert!(!param.ty.nullable);
}

// =============================================================================
// Catalog Types and Functions
// =============================================================================

#[test]
fn test_composite_access() {
    let loaded = strict("SELECT (billing_address).city AS city FROM accounts").unwrap();
    assert_eq!(result(&loaded, "city").kind, TypeKind::String);
    // the composite column itself is nullable
    assert!(result(&loaded, "city").nullable);

    let error = strict("SELECT (billing_address).street FROM accounts").unwrap_err();
    assert_eq!(error.code, ErrorCode::MissingCompositeField);

    let error = strict("SELECT (owner_id).street FROM accounts").unwrap_err();
    assert_eq!(error.code, ErrorCode::CompositeAccessOnNonComposite);
}

#[test]
fn test_named_type_cast() {
    let loaded = strict("SELECT $state::account_state AS state").unwrap();
    assert!(matches!(result(&loaded, "state").kind, TypeKind::Union { .. }));
    assert!(matches!(loaded.params[0].ty.kind, TypeKind::Union { .. }));

    let error = strict("SELECT $mood::mood").unwrap_err();
    assert_eq!(error.code, ErrorCode::UnknownPostgresType);
}

#[test]
fn test_function_overloads() {
    let loaded = strict("SELECT lower(email) AS e, lower(name) AS n FROM users").unwrap();
    assert_eq!(result(&loaded, "e").kind, TypeKind::String);
    assert!(!result(&loaded, "e").nullable);
    assert!(result(&loaded, "n").nullable);

    let error = strict("SELECT nope(id) FROM users").unwrap_err();
    assert_eq!(error.code, ErrorCode::FunctionNotFound);

    let error = strict("SELECT account_label(id, id) FROM accounts").unwrap_err();
    assert_eq!(error.code, ErrorCode::NoMatchingFunction);
    assert_eq!(
        error.candidates,
        vec!["account_label(account_state, integer) -> text"]
    );
}

#[test]
fn test_function_argument_types_params() {
    let loaded = strict("SELECT account_label($state, id) AS label FROM accounts").unwrap();
    assert_eq!(result(&loaded, "label").kind, TypeKind::String);
    assert_eq!(
        loaded.param("state").unwrap().ty.kind,
        TypeKind::Union {
            items: vec![Type::literal("Active"), Type::literal("Closed")]
        }
    );
}

#[test]
fn test_aggregates() {
    let loaded = strict(
        "SELECT total_quantity(quantity) AS q, collect_ids(user_id) AS ids FROM orders",
    )
    .unwrap();
    assert_eq!(result(&loaded, "q").kind, TypeKind::BigInt);
    // an aggregate declared to return an array yields its item type
    assert_eq!(result(&loaded, "ids").kind, TypeKind::Number);
    assert!(result(&loaded, "ids").nullable);
}

// =============================================================================
// Views
// =============================================================================

#[test]
fn test_view_cycle_is_reported() {
    let error = strict("SELECT id FROM loop_a").unwrap_err();
    assert_eq!(error.code, ErrorCode::ViewCycle);
    assert!(error.candidates.contains(&"public.loop_a".to_string()));

    // not a lookup failure, lenient mode still reports it
    let error = lenient("SELECT id FROM loop_a").unwrap_err();
    assert_eq!(error.code, ErrorCode::ViewCycle);
}

#[test]
fn test_unparsable_view() {
    let error = strict("SELECT id FROM broken_view").unwrap_err();
    assert_eq!(error.code, ErrorCode::ViewParseError);

    let loaded = lenient("SELECT id FROM broken_view").unwrap();
    assert_eq!(result(&loaded, "id").kind, TypeKind::String);
    assert!(result(&loaded, "id").nullable);
}

// =============================================================================
// Modes
// =============================================================================

#[test]
fn test_lenient_mode_drops_unresolved_sources() {
    let sql = "SELECT u.id, g.id AS ghost_id FROM users u JOIN ghosts g ON g.user_id = u.id";

    let error = strict(sql).unwrap_err();
    assert_eq!(error.code, ErrorCode::TableNotFound);
    assert!(error.span.is_some());

    let loaded = lenient(sql).unwrap();
    assert_eq!(result(&loaded, "id").kind, TypeKind::Number);
    assert!(result(&loaded, "ghost_id").is_unknown());
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_view_transitivity() {
    let (mut session, _) = session();

    let direct = session.infer("SELECT id, name FROM t").await.unwrap();
    let one_level = session.infer("SELECT id, name FROM t_view").await.unwrap();
    let two_levels = session.infer("SELECT id, name FROM t_view_view").await.unwrap();

    assert_eq!(direct.results, one_level.results);
    assert_eq!(direct.results, two_levels.results);
    // inferred from the view SQL, not the catalog's all-nullable view columns
    assert!(!two_levels.results[0].ty.nullable);
}

#[tokio::test]
async fn test_session_loads_types_of_columns() {
    let (mut session, adapter) = session();

    let loaded = session
        .infer("SELECT state, billing_address FROM accounts")
        .await
        .unwrap();

    assert!(matches!(result(&loaded, "state").kind, TypeKind::Union { .. }));
    assert!(matches!(
        result(&loaded, "billing_address").kind,
        TypeKind::Composite { .. }
    ));
    assert!(session
        .store()
        .find_enum(&QualifiedName::unqualified("account_state"))
        .is_some());
    // the table, then its column types
    assert_eq!(adapter.requests().await.len(), 2);
}

#[tokio::test]
async fn test_session_batch_report() {
    let (mut session, adapter) = session();
    let queries = vec![
        BatchQuery::new("accounts.sql", "SELECT id, state FROM accounts WHERE id = $id"),
        BatchQuery::new("ambiguous.sql", "SELECT id FROM a JOIN b ON a.x = b.x"),
        BatchQuery::new("orders.sql", "SELECT quantity FROM orders"),
    ];

    let outcome = session.infer_batch(&queries).await.unwrap();
    assert_eq!(outcome.resolved_count(), 2);
    assert!(outcome.report.has_errors());
    assert_eq!(
        outcome.report.queries[1].diagnostics[0].code,
        ErrorCode::AmbiguousColumn
    );

    let json = outcome.report.to_json().unwrap();
    assert!(json.contains("\"AMBIGUOUS_COLUMN\""));

    // one round for the tables, one for the enum and composite they use
    assert_eq!(adapter.requests().await.len(), 2);
}

#[tokio::test]
async fn test_catalog_failure_aborts() {
    let adapter = fixtures::adapter().with_connection_failure();
    let mut session = Session::new(Arc::new(adapter));

    let error = session.infer("SELECT id FROM users").await.unwrap_err();
    assert!(matches!(error, sqlinfer_engine::EngineError::Fetch(_)));
}
