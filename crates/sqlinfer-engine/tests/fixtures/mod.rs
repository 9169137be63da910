//! Catalog fixtures for resolution tests
//!
//! An accounts/users/orders schema with an enum, a composite in a second
//! schema, a chain of views, a view cycle, an unparsable view and a few
//! function overloads.

#![allow(dead_code)]

use sqlinfer_catalog::MockAdapter;
use sqlinfer_core::{LoadedAttribute, LoadedColumn, LoadedData, QualifiedName};
use sqlinfer_engine::LoadedStore;

fn table(name: &str, columns: Vec<LoadedColumn>) -> LoadedData {
    LoadedData::Table {
        name: QualifiedName::qualified("public", name),
        columns,
    }
}

fn view(name: &str, source: &str, columns: &[&str]) -> LoadedData {
    LoadedData::View {
        name: QualifiedName::qualified("public", name),
        source: source.to_string(),
        // PostgreSQL reports every view column as nullable
        columns: columns
            .iter()
            .map(|column| LoadedColumn::new(*column, "text", true))
            .collect(),
    }
}

fn function(name: &str, args: &[&str], returns: &str, is_aggregate: bool) -> LoadedData {
    LoadedData::Function {
        name: QualifiedName::qualified("public", name),
        args: args.iter().map(|arg| arg.to_string()).collect(),
        returns: returns.to_string(),
        is_aggregate,
    }
}

pub fn tables() -> Vec<LoadedData> {
    vec![
        table(
            "accounts",
            vec![
                LoadedColumn::new("id", "integer", false),
                LoadedColumn::new("owner_id", "integer", false),
                LoadedColumn::new("state", "account_state", false),
                LoadedColumn::new("billing_address", "billing.address", true),
            ],
        ),
        table(
            "users",
            vec![
                LoadedColumn::new("id", "integer", false).with_comment("Primary key"),
                LoadedColumn::new("email", "text", false),
                LoadedColumn::new("name", "text", true),
                LoadedColumn::new("nickname", "text", true),
                LoadedColumn::new("tags", "text[]", true),
            ],
        ),
        table(
            "orders",
            vec![
                LoadedColumn::new("id", "bigint", false),
                LoadedColumn::new("user_id", "integer", false),
                LoadedColumn::new("quantity", "integer", true),
                LoadedColumn::new("total", "numeric(10,2)", true),
            ],
        ),
        table(
            "a",
            vec![
                LoadedColumn::new("id", "integer", false),
                LoadedColumn::new("x", "integer", false),
            ],
        ),
        table(
            "b",
            vec![
                LoadedColumn::new("id", "integer", false),
                LoadedColumn::new("x", "integer", false),
            ],
        ),
        table(
            "t",
            vec![
                LoadedColumn::new("id", "integer", false),
                LoadedColumn::new("name", "character varying(80)", true),
            ],
        ),
        table(
            "pairs",
            vec![
                LoadedColumn::new("a", "integer", false),
                LoadedColumn::new("b", "text", false),
            ],
        ),
    ]
}

pub fn views() -> Vec<LoadedData> {
    vec![
        view("t_view", "SELECT id, name FROM t", &["id", "name"]),
        view("t_view_view", "SELECT id, name FROM t_view", &["id", "name"]),
        view("loop_a", "SELECT id FROM loop_b", &["id"]),
        view("loop_b", "SELECT id FROM loop_a", &["id"]),
        view("broken_view", "SELEC id FROM t", &["id"]),
    ]
}

pub fn types() -> Vec<LoadedData> {
    vec![
        LoadedData::Enum {
            name: QualifiedName::qualified("public", "account_state"),
            variants: vec!["Active".to_string(), "Closed".to_string()],
        },
        LoadedData::Composite {
            name: QualifiedName::qualified("billing", "address"),
            attributes: vec![
                LoadedAttribute::new("city", "text", false),
                LoadedAttribute::new("zip", "varchar", true),
            ],
        },
    ]
}

pub fn functions() -> Vec<LoadedData> {
    vec![
        function("lower", &["text"], "text", false),
        function("lower", &["anyrange"], "anyelement", false),
        function("account_label", &["account_state", "integer"], "text", false),
        function("total_quantity", &["integer"], "bigint", true),
        function("collect_ids", &["integer"], "integer[]", true),
    ]
}

/// The whole catalog
pub fn catalog() -> Vec<LoadedData> {
    let mut data = tables();
    data.extend(views());
    data.extend(types());
    data.extend(functions());
    data
}

/// A store with the whole catalog already loaded
pub fn store() -> LoadedStore {
    LoadedStore::from_data(catalog())
}

/// An adapter serving the whole catalog
pub fn adapter() -> MockAdapter {
    MockAdapter::from_data(catalog())
}
