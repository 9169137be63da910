//! Test fixtures for catalog adapter integration tests
//!
//! A small application schema spread over two schemas, in the record shapes
//! the PostgreSQL adapter returns.

use sqlinfer_core::{LoadedAttribute, LoadedColumn, LoadedData, QualifiedName};

/// `public.users`
pub fn users_table() -> LoadedData {
    LoadedData::Table {
        name: QualifiedName::qualified("public", "users"),
        columns: vec![
            LoadedColumn::new("id", "integer", false).with_comment("Primary key"),
            LoadedColumn::new("email", "text", false),
            LoadedColumn::new("name", "text", true),
            LoadedColumn::new("created_at", "timestamp with time zone", false),
        ],
    }
}

/// `public.accounts`, with an enum column
pub fn accounts_table() -> LoadedData {
    LoadedData::Table {
        name: QualifiedName::qualified("public", "accounts"),
        columns: vec![
            LoadedColumn::new("id", "integer", false),
            LoadedColumn::new("owner_id", "integer", false),
            LoadedColumn::new("state", "account_state", false),
            LoadedColumn::new("billing_address", "billing.address", true),
        ],
    }
}

/// `audit.users`, shadowed by `public.users` on the default search path
pub fn audit_users_table() -> LoadedData {
    LoadedData::Table {
        name: QualifiedName::qualified("audit", "users"),
        columns: vec![LoadedColumn::new("event_id", "bigint", false)],
    }
}

pub fn active_users_view() -> LoadedData {
    LoadedData::View {
        name: QualifiedName::qualified("public", "active_users"),
        source: "SELECT id, email FROM users WHERE name IS NOT NULL".to_string(),
        columns: vec![
            LoadedColumn::new("id", "integer", true),
            LoadedColumn::new("email", "text", true),
        ],
    }
}

pub fn account_state_enum() -> LoadedData {
    LoadedData::Enum {
        name: QualifiedName::qualified("public", "account_state"),
        variants: vec!["Active".to_string(), "Closed".to_string()],
    }
}

pub fn address_composite() -> LoadedData {
    LoadedData::Composite {
        name: QualifiedName::qualified("billing", "address"),
        attributes: vec![
            LoadedAttribute::new("city", "text", true),
            LoadedAttribute::new("zip", "character varying", true),
        ],
    }
}

/// Two overloads of `lower` and one aggregate
pub fn functions() -> Vec<LoadedData> {
    vec![
        LoadedData::Function {
            name: QualifiedName::qualified("pg_catalog", "lower"),
            args: vec!["text".to_string()],
            returns: "text".to_string(),
            is_aggregate: false,
        },
        LoadedData::Function {
            name: QualifiedName::qualified("pg_catalog", "lower"),
            args: vec!["anyrange".to_string()],
            returns: "anyelement".to_string(),
            is_aggregate: false,
        },
        LoadedData::Function {
            name: QualifiedName::qualified("pg_catalog", "sum"),
            args: vec!["integer".to_string()],
            returns: "bigint".to_string(),
            is_aggregate: true,
        },
    ]
}

/// The whole catalog
pub fn catalog() -> Vec<LoadedData> {
    let mut data = vec![
        users_table(),
        accounts_table(),
        audit_users_table(),
        active_users_view(),
        account_state_enum(),
        address_composite(),
    ];
    data.extend(functions());
    data
}
