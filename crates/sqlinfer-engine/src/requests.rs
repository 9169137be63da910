//! Catalog requests derivable from a query interface
//!
//! Walks every source and every deferred type of a [`QueryInterface`],
//! nested queries included, and collects the tables, functions and user
//! defined types the resolver will need.

use sqlinfer_core::{pg_types, DataRequests, Load, QualifiedName, QueryInterface, Source, TypeOrLoad};

/// Collect the catalog objects `qi` depends on
pub fn extract_data_requests(qi: &QueryInterface) -> DataRequests {
    let mut requests = DataRequests::new();
    collect_query(qi, &mut requests);
    requests
}

/// Request the enum or composite behind a postgres type name, unless it is built in
pub fn request_pg_type(raw: &str, requests: &mut DataRequests) {
    if raw.trim().is_empty() || pg_types::is_builtin(raw) {
        return;
    }
    let parsed = pg_types::normalize(raw);
    requests.add_named_type(QualifiedName::new(parsed.schema.as_deref(), parsed.name));
}

fn collect_query(qi: &QueryInterface, requests: &mut DataRequests) {
    for source in &qi.sources {
        match source {
            Source::Table { schema, table, .. } => {
                requests.add_table(QualifiedName::new(schema.as_deref(), table.clone()));
            }
            Source::Query { query, .. } => collect_query(query, requests),
            Source::Values { types, .. } => {
                for ty in types {
                    collect_type(ty, requests);
                }
            }
        }
    }

    for param in &qi.params {
        collect_type(&param.ty, requests);
    }
    for result in &qi.results {
        collect_type(&result.ty, requests);
    }
}

fn collect_type(ty: &TypeOrLoad, requests: &mut DataRequests) {
    let TypeOrLoad::Load(load) = ty else {
        return;
    };

    match load {
        Load::Column { .. } | Load::Star { .. } => {}
        Load::Record { schema, name, .. } | Load::Named { schema, name, .. } => {
            requests.add_named_type(QualifiedName::new(schema.as_deref(), name.clone()));
        }
        Load::Function {
            schema, name, args, ..
        }
        | Load::FunctionArgument {
            schema, name, args, ..
        } => {
            requests.add_function(QualifiedName::new(schema.as_deref(), name.clone()));
            for arg in args {
                collect_type(arg, requests);
            }
        }
        Load::Operator { left, right, .. } => {
            collect_type(left, requests);
            collect_type(right, requests);
        }
        Load::ColumnCast { column, value } => {
            collect_type(column, requests);
            collect_type(value, requests);
        }
        Load::Array { items: value, .. }
        | Load::ArrayItem { value }
        | Load::CompositeAccess { value, .. }
        | Load::Optional { value }
        | Load::AsArray { value, .. } => collect_type(value, requests),
        Load::Union { items } | Load::Coalesce { items } => {
            for item in items {
                collect_type(item, requests);
            }
        }
        Load::ObjectLiteral { items, .. } => {
            for item in items {
                collect_type(&item.ty, requests);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn requests_for(sql: &str) -> DataRequests {
        let statement = sqlinfer_sql::parse(sql).unwrap();
        extract_data_requests(&sqlinfer_sql::to_query_interface(&statement, &[]))
    }

    #[test]
    fn test_tables_and_functions() {
        let requests = requests_for("SELECT lower(u.email) FROM users u JOIN app.accounts a ON a.owner_id = u.id");
        assert_eq!(
            requests.tables,
            vec![
                QualifiedName::unqualified("users"),
                QualifiedName::qualified("app", "accounts"),
            ]
        );
        assert_eq!(requests.functions, vec![QualifiedName::unqualified("lower")]);
        assert!(requests.enums.is_empty());
    }

    #[test]
    fn test_nested_queries_are_walked() {
        let requests = requests_for(
            "WITH recent AS (SELECT id FROM orders) \
             SELECT id FROM users WHERE id IN (SELECT owner_id FROM accounts)",
        );
        assert_eq!(requests.tables.len(), 3);
        assert!(requests.tables.contains(&QualifiedName::unqualified("orders")));
        assert!(requests.tables.contains(&QualifiedName::unqualified("accounts")));
    }

    #[test]
    fn test_user_types_request_enum_and_composite() {
        let requests = requests_for("SELECT $state::account_state");
        assert_eq!(requests.enums, vec![QualifiedName::unqualified("account_state")]);
        assert_eq!(requests.composites, vec![QualifiedName::unqualified("account_state")]);
        assert!(requests.tables.is_empty());
    }

    #[test]
    fn test_pg_type_requests_skip_builtins() {
        let mut requests = DataRequests::new();
        request_pg_type("integer", &mut requests);
        request_pg_type("_text", &mut requests);
        request_pg_type("timestamp with time zone", &mut requests);
        assert!(requests.is_empty());

        request_pg_type("billing.address", &mut requests);
        request_pg_type("_account_state", &mut requests);
        assert_eq!(
            requests.composites,
            vec![
                QualifiedName::qualified("billing", "address"),
                QualifiedName::unqualified("account_state"),
            ]
        );
    }
}
