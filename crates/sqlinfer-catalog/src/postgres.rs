//! PostgreSQL catalog adapter using pg_catalog
//!
//! This adapter queries PostgreSQL's system catalogs for everything the
//! resolution engine needs to type a query:
//! - table, view and materialized view columns (with comments and view SQL)
//! - enum labels, in declaration order
//! - standalone composite types and their attributes
//! - function and aggregate signatures
//!
//! Type names are reported with `format_type`, so user types outside the
//! search path come back schema-qualified (`billing.address`).
//!
//! ## Usage
//!
//! ```rust,ignore
//! // Using direct credentials
//! let adapter = PostgresAdapter::connect(
//!     "localhost",
//!     5432,
//!     "mydb",
//!     "username",
//!     "password"
//! ).await?;
//!
//! // Using connection string
//! let adapter = PostgresAdapter::from_connection_string(
//!     "host=localhost port=5432 dbname=mydb user=username password=password"
//! ).await?;
//!
//! let everything = adapter.load_all().await?;
//! ```
//!
//! Reference: https://www.postgresql.org/docs/current/catalogs.html

use crate::adapter::{CatalogAdapter, FetchError};
use sqlinfer_core::{CatalogConfig, DataRequests, LoadedAttribute, LoadedColumn, LoadedData, QualifiedName};

#[cfg(feature = "postgres")]
use tokio_postgres::{config::Host, types::FromSql, Client, Config as PgConfig, NoTls, Row};

#[cfg(feature = "postgres")]
use postgres_native_tls::MakeTlsConnector;

#[cfg(feature = "postgres")]
use native_tls::TlsConnector;

#[cfg(not(feature = "postgres"))]
const NOT_COMPILED: &str =
    "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres";

/// Columns of tables, views, materialized views and foreign tables.
///
/// `$1` restricts the schemas, `$2` the relation names (NULL for all).
#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
const RELATIONS_SQL: &str = r#"
    SELECT
        n.nspname::text AS schema,
        c.relname::text AS name,
        c.relkind::text AS kind,
        a.attname::text AS column_name,
        a.attnotnull AS not_null,
        pg_catalog.format_type(a.atttypid, NULL) AS pg_type,
        pg_catalog.col_description(c.oid, a.attnum) AS comment,
        CASE WHEN c.relkind IN ('v', 'm') THEN pg_catalog.pg_get_viewdef(c.oid) END AS definition
    FROM pg_catalog.pg_class c
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    JOIN pg_catalog.pg_attribute a
      ON a.attrelid = c.oid AND a.attnum > 0 AND NOT a.attisdropped
    WHERE c.relkind IN ('r', 'p', 'v', 'm', 'f')
      AND n.nspname::text = ANY($1::text[])
      AND ($2::text[] IS NULL OR c.relname::text = ANY($2::text[]))
    ORDER BY n.nspname, c.relname, a.attnum
"#;

#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
const ENUMS_SQL: &str = r#"
    SELECT
        n.nspname::text AS schema,
        t.typname::text AS name,
        e.enumlabel::text AS label
    FROM pg_catalog.pg_type t
    JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace
    JOIN pg_catalog.pg_enum e ON e.enumtypid = t.oid
    WHERE n.nspname::text = ANY($1::text[])
      AND ($2::text[] IS NULL OR t.typname::text = ANY($2::text[]))
    ORDER BY n.nspname, t.typname, e.enumsortorder
"#;

/// Standalone composite types only; table row types are loaded as tables
#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
const COMPOSITES_SQL: &str = r#"
    SELECT
        n.nspname::text AS schema,
        t.typname::text AS name,
        a.attname::text AS attribute,
        pg_catalog.format_type(a.atttypid, NULL) AS pg_type,
        a.attnotnull AS not_null
    FROM pg_catalog.pg_type t
    JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace
    JOIN pg_catalog.pg_class c ON c.oid = t.typrelid AND c.relkind = 'c'
    JOIN pg_catalog.pg_attribute a
      ON a.attrelid = c.oid AND a.attnum > 0 AND NOT a.attisdropped
    WHERE n.nspname::text = ANY($1::text[])
      AND ($2::text[] IS NULL OR t.typname::text = ANY($2::text[]))
    ORDER BY n.nspname, t.typname, a.attnum
"#;

#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
const FUNCTIONS_SQL: &str = r#"
    SELECT
        n.nspname::text AS schema,
        p.proname::text AS name,
        ARRAY(
            SELECT pg_catalog.format_type(arg.oid, NULL)
            FROM unnest(p.proargtypes::oid[]) WITH ORDINALITY AS arg(oid, position)
            ORDER BY arg.position
        ) AS args,
        pg_catalog.format_type(p.prorettype, NULL) AS returns,
        p.prokind = 'a' AS is_aggregate
    FROM pg_catalog.pg_proc p
    JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace
    WHERE p.prokind IN ('f', 'a', 'w')
      AND n.nspname::text = ANY($1::text[])
      AND ($2::text[] IS NULL OR p.proname::text = ANY($2::text[]))
    ORDER BY n.nspname, p.proname, p.oid
"#;

/// PostgreSQL catalog adapter
///
/// Connects to a PostgreSQL database and introspects the schemas of its
/// search path. It supports both plain and TLS connections.
pub struct PostgresAdapter {
    /// PostgreSQL client (only available with postgres feature)
    #[cfg(feature = "postgres")]
    client: Client,

    /// Connection host
    host: String,

    /// Connection port
    port: u16,

    /// Database name
    database: String,

    /// Schemas searched, in order, for unqualified names
    search_path: Vec<String>,
}

impl PostgresAdapter {
    /// Create a new PostgreSQL adapter with direct credentials
    ///
    /// For TLS connections, use `connect_with_tls` instead.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let adapter = PostgresAdapter::connect(
    ///     "localhost", 5432, "mydb", "postgres", "password"
    /// ).await?;
    /// ```
    pub async fn connect(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let conn_str = format!(
            "host={} port={} dbname={} user={} password={}",
            host.into(),
            port,
            database.into(),
            user.into(),
            password.into()
        );
        Self::from_connection_string(&conn_str).await
    }

    /// Create a PostgreSQL adapter over TLS with direct credentials
    pub async fn connect_with_tls(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let conn_str = format!(
            "host={} port={} dbname={} user={} password={}",
            host.into(),
            port,
            database.into(),
            user.into(),
            password.into()
        );
        Self::from_connection_string_with_tls(&conn_str).await
    }

    /// Create an adapter from the `[catalog]` section of the configuration
    pub async fn from_config(config: &CatalogConfig) -> Result<Self, FetchError> {
        if config.tls {
            Self::from_connection_string_with_tls(&config.connection).await
        } else {
            Self::from_connection_string(&config.connection).await
        }
    }

    /// Create adapter from a PostgreSQL connection string
    ///
    /// Accepts both the key/value format
    /// (`host=localhost port=5432 dbname=mydb user=postgres password=secret`)
    /// and `postgres://` URLs.
    #[cfg(feature = "postgres")]
    pub async fn from_connection_string(conn_str: &str) -> Result<Self, FetchError> {
        let (host, port, database) = connection_info(conn_str)?;

        let (client, connection) = tokio_postgres::connect(conn_str, NoTls)
            .await
            .map_err(|e| FetchError::AuthenticationError(format!(
                "Failed to connect to PostgreSQL at {}:{}: {}",
                host, port, e
            )))?;

        spawn_connection(connection, host.clone(), port);
        Ok(Self::with_client(client, host, port, database))
    }

    /// Create adapter without postgres feature (returns error)
    #[cfg(not(feature = "postgres"))]
    pub async fn from_connection_string(_conn_str: &str) -> Result<Self, FetchError> {
        Err(FetchError::ConfigError(NOT_COMPILED.to_string()))
    }

    /// Create adapter from a PostgreSQL connection string with TLS
    ///
    /// The `sslmode` setting is ignored, TLS is always used.
    #[cfg(feature = "postgres")]
    pub async fn from_connection_string_with_tls(conn_str: &str) -> Result<Self, FetchError> {
        let (host, port, database) = connection_info(conn_str)?;

        let connector = TlsConnector::builder()
            .build()
            .map_err(|e| FetchError::ConfigError(format!(
                "Failed to create TLS connector: {}", e
            )))?;
        let tls = MakeTlsConnector::new(connector);

        let (client, connection) = tokio_postgres::connect(conn_str, tls)
            .await
            .map_err(|e| FetchError::AuthenticationError(format!(
                "Failed to connect to PostgreSQL at {}:{} with TLS: {}",
                host, port, e
            )))?;

        spawn_connection(connection, host.clone(), port);
        Ok(Self::with_client(client, host, port, database))
    }

    /// Create adapter without postgres feature (returns error)
    #[cfg(not(feature = "postgres"))]
    pub async fn from_connection_string_with_tls(_conn_str: &str) -> Result<Self, FetchError> {
        Err(FetchError::ConfigError(NOT_COMPILED.to_string()))
    }

    #[cfg(feature = "postgres")]
    fn with_client(client: Client, host: String, port: u16, database: String) -> Self {
        Self {
            client,
            host,
            port,
            database,
            search_path: default_search_path(),
        }
    }

    /// Replace the schemas searched for unqualified names
    pub fn with_search_path(mut self, search_path: Vec<String>) -> Self {
        self.search_path = search_path;
        self
    }

    /// Get the connection host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Get the connection port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the database name
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Get the search path
    pub fn search_path(&self) -> &[String] {
        &self.search_path
    }

    /// Run the four catalog queries concurrently.
    ///
    /// `names` of `None` loads every object in `schemas`.
    #[cfg(feature = "postgres")]
    async fn load(
        &self,
        schemas: &[String],
        names: Option<&DataRequests>,
    ) -> Result<Vec<LoadedData>, FetchError> {
        let tables = names.map(|r| plain_names(&r.tables));
        let enums = names.map(|r| plain_names(&r.enums));
        let composites = names.map(|r| plain_names(&r.composites));
        let functions = names.map(|r| plain_names(&r.functions));

        let (relation_rows, enum_rows, composite_rows, function_rows) = tokio::try_join!(
            self.query(RELATIONS_SQL, schemas, tables.as_deref()),
            self.query(ENUMS_SQL, schemas, enums.as_deref()),
            self.query(COMPOSITES_SQL, schemas, composites.as_deref()),
            self.query(FUNCTIONS_SQL, schemas, functions.as_deref()),
        )?;

        tracing::debug!(
            relations = relation_rows.len(),
            enums = enum_rows.len(),
            composites = composite_rows.len(),
            functions = function_rows.len(),
            "catalog rows fetched"
        );

        let mut loaded = relations_from_rows(
            relation_rows.iter().map(RelationRow::from_row).collect::<Result<_, _>>()?,
        );
        loaded.extend(enums_from_rows(
            enum_rows.iter().map(EnumRow::from_row).collect::<Result<_, _>>()?,
        ));
        loaded.extend(composites_from_rows(
            composite_rows.iter().map(AttributeRow::from_row).collect::<Result<_, _>>()?,
        ));
        loaded.extend(
            function_rows
                .iter()
                .map(FunctionRow::from_row)
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .map(FunctionRow::into_loaded),
        );
        Ok(loaded)
    }

    #[cfg(feature = "postgres")]
    async fn query(
        &self,
        sql: &str,
        schemas: &[String],
        names: Option<&[String]>,
    ) -> Result<Vec<Row>, FetchError> {
        // An empty name list matches nothing; skip the round trip
        if names.is_some_and(|n| n.is_empty()) {
            return Ok(Vec::new());
        }

        tracing::trace!(schemas = ?schemas, names = ?names, "catalog query");
        self.client
            .query(sql, &[&schemas, &names])
            .await
            .map_err(|e| {
                let err_str = e.to_string();
                if err_str.contains("permission denied") {
                    FetchError::PermissionDenied(err_str)
                } else {
                    FetchError::QueryError(err_str)
                }
            })
    }
}

#[async_trait::async_trait]
impl CatalogAdapter for PostgresAdapter {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    #[cfg(feature = "postgres")]
    async fn load_all(&self) -> Result<Vec<LoadedData>, FetchError> {
        let loaded = self.load(&self.search_path, None).await?;
        tracing::debug!(records = loaded.len(), database = %self.database, "loaded full catalog");
        Ok(loaded)
    }

    #[cfg(not(feature = "postgres"))]
    async fn load_all(&self) -> Result<Vec<LoadedData>, FetchError> {
        Err(FetchError::ConfigError(NOT_COMPILED.to_string()))
    }

    #[cfg(feature = "postgres")]
    async fn load_selected(&self, requests: &DataRequests) -> Result<Vec<LoadedData>, FetchError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let schemas = requested_schemas(requests, &self.search_path);
        let candidates = self.load(&schemas, Some(requests)).await?;
        let selected = crate::adapter::select_requested(&candidates, requests, &self.search_path);

        tracing::debug!(
            requested = requests.len(),
            loaded = selected.len(),
            "loaded selected catalog objects"
        );
        Ok(selected)
    }

    #[cfg(not(feature = "postgres"))]
    async fn load_selected(&self, _requests: &DataRequests) -> Result<Vec<LoadedData>, FetchError> {
        Err(FetchError::ConfigError(NOT_COMPILED.to_string()))
    }

    #[cfg(feature = "postgres")]
    async fn test_connection(&self) -> Result<(), FetchError> {
        self.client
            .query("SELECT 1", &[])
            .await
            .map_err(|e| FetchError::QueryError(format!("Connection test failed: {}", e)))?;
        Ok(())
    }

    #[cfg(not(feature = "postgres"))]
    async fn test_connection(&self) -> Result<(), FetchError> {
        Err(FetchError::ConfigError(NOT_COMPILED.to_string()))
    }
}

#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
fn default_search_path() -> Vec<String> {
    vec!["public".to_string(), "pg_catalog".to_string()]
}

/// Extract host, port and database name for logging and accessors
#[cfg(feature = "postgres")]
fn connection_info(conn_str: &str) -> Result<(String, u16, String), FetchError> {
    let config: PgConfig = conn_str
        .parse()
        .map_err(|e| FetchError::ConfigError(format!("Invalid connection string: {}", e)))?;

    let host = match config.get_hosts().first() {
        Some(Host::Tcp(host)) => host.clone(),
        #[cfg(unix)]
        Some(Host::Unix(path)) => path.display().to_string(),
        None => "localhost".to_string(),
    };
    let port = config.get_ports().first().copied().unwrap_or(5432);
    let database = config.get_dbname().unwrap_or("postgres").to_string();

    Ok((host, port, database))
}

/// Drive the connection in the background until the client is dropped
#[cfg(feature = "postgres")]
fn spawn_connection<F>(connection: F, host: String, port: u16)
where
    F: std::future::Future<Output = Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::warn!(%host, port, error = %e, "PostgreSQL connection error");
        }
    });
}

#[cfg(feature = "postgres")]
fn column<'a, T: FromSql<'a>>(row: &'a Row, name: &str) -> Result<T, FetchError> {
    row.try_get(name)
        .map_err(|e| FetchError::InvalidResponse(format!("column {}: {}", name, e)))
}

#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
fn plain_names(names: &[QualifiedName]) -> Vec<String> {
    let mut plain: Vec<String> = names.iter().map(|n| n.name.clone()).collect();
    plain.sort();
    plain.dedup();
    plain
}

/// Schemas worth querying: the search path plus any explicitly qualified ones
#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
fn requested_schemas(requests: &DataRequests, search_path: &[String]) -> Vec<String> {
    let mut schemas = search_path.to_vec();
    for key in requests.keys() {
        if let Some(schema) = key.name.schema {
            if !schemas.contains(&schema) {
                schemas.push(schema);
            }
        }
    }
    schemas
}

/// One column of a relation, as returned by [`RELATIONS_SQL`]
#[derive(Debug, Clone)]
#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
struct RelationRow {
    schema: String,
    name: String,
    kind: String,
    column: String,
    not_null: bool,
    pg_type: String,
    comment: Option<String>,
    definition: Option<String>,
}

#[derive(Debug, Clone)]
#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
struct EnumRow {
    schema: String,
    name: String,
    label: String,
}

#[derive(Debug, Clone)]
#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
struct AttributeRow {
    schema: String,
    name: String,
    attribute: String,
    pg_type: String,
    not_null: bool,
}

#[derive(Debug, Clone)]
#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
struct FunctionRow {
    schema: String,
    name: String,
    args: Vec<String>,
    returns: String,
    is_aggregate: bool,
}

#[cfg(feature = "postgres")]
impl RelationRow {
    fn from_row(row: &Row) -> Result<Self, FetchError> {
        Ok(Self {
            schema: column(row, "schema")?,
            name: column(row, "name")?,
            kind: column(row, "kind")?,
            column: column(row, "column_name")?,
            not_null: column(row, "not_null")?,
            pg_type: column(row, "pg_type")?,
            comment: column(row, "comment")?,
            definition: column(row, "definition")?,
        })
    }
}

#[cfg(feature = "postgres")]
impl EnumRow {
    fn from_row(row: &Row) -> Result<Self, FetchError> {
        Ok(Self {
            schema: column(row, "schema")?,
            name: column(row, "name")?,
            label: column(row, "label")?,
        })
    }
}

#[cfg(feature = "postgres")]
impl AttributeRow {
    fn from_row(row: &Row) -> Result<Self, FetchError> {
        Ok(Self {
            schema: column(row, "schema")?,
            name: column(row, "name")?,
            attribute: column(row, "attribute")?,
            pg_type: column(row, "pg_type")?,
            not_null: column(row, "not_null")?,
        })
    }
}

#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
impl FunctionRow {
    #[cfg(feature = "postgres")]
    fn from_row(row: &Row) -> Result<Self, FetchError> {
        Ok(Self {
            schema: column(row, "schema")?,
            name: column(row, "name")?,
            args: column(row, "args")?,
            returns: column(row, "returns")?,
            is_aggregate: column(row, "is_aggregate")?,
        })
    }

    fn into_loaded(self) -> LoadedData {
        LoadedData::Function {
            name: QualifiedName::qualified(self.schema, self.name),
            args: self.args,
            returns: self.returns,
            is_aggregate: self.is_aggregate,
        }
    }
}

/// Group per-column rows (ordered by relation) into tables and views
#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
fn relations_from_rows(rows: Vec<RelationRow>) -> Vec<LoadedData> {
    let mut loaded: Vec<LoadedData> = Vec::new();
    let mut current: Option<(RelationRow, Vec<LoadedColumn>)> = None;

    for row in rows {
        let mut column = LoadedColumn::new(row.column.clone(), row.pg_type.clone(), !row.not_null);
        if let Some(comment) = &row.comment {
            column = column.with_comment(comment.clone());
        }

        match &mut current {
            Some((head, columns)) if head.schema == row.schema && head.name == row.name => {
                columns.push(column);
            }
            _ => {
                if let Some((head, columns)) = current.take() {
                    loaded.push(relation(head, columns));
                }
                current = Some((row, vec![column]));
            }
        }
    }

    if let Some((head, columns)) = current {
        loaded.push(relation(head, columns));
    }
    loaded
}

#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
fn relation(head: RelationRow, columns: Vec<LoadedColumn>) -> LoadedData {
    let name = QualifiedName::qualified(head.schema, head.name);
    match head.definition {
        Some(definition) if matches!(head.kind.as_str(), "v" | "m") => LoadedData::View {
            name,
            source: definition.trim().to_string(),
            columns,
        },
        _ => LoadedData::Table { name, columns },
    }
}

/// Group enum labels (ordered by sort order) into one record per enum
#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
fn enums_from_rows(rows: Vec<EnumRow>) -> Vec<LoadedData> {
    let mut loaded: Vec<LoadedData> = Vec::new();

    for row in rows {
        let name = QualifiedName::qualified(row.schema, row.name);
        match loaded.last_mut() {
            Some(LoadedData::Enum { name: last, variants }) if *last == name => {
                variants.push(row.label);
            }
            _ => loaded.push(LoadedData::Enum {
                name,
                variants: vec![row.label],
            }),
        }
    }

    loaded
}

#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
fn composites_from_rows(rows: Vec<AttributeRow>) -> Vec<LoadedData> {
    let mut loaded: Vec<LoadedData> = Vec::new();

    for row in rows {
        let name = QualifiedName::qualified(row.schema, row.name);
        let attribute = LoadedAttribute::new(row.attribute, row.pg_type, !row.not_null);
        match loaded.last_mut() {
            Some(LoadedData::Composite { name: last, attributes }) if *last == name => {
                attributes.push(attribute);
            }
            _ => loaded.push(LoadedData::Composite {
                name,
                attributes: vec![attribute],
            }),
        }
    }

    loaded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relation_row(name: &str, kind: &str, column: &str, definition: Option<&str>) -> RelationRow {
        RelationRow {
            schema: "public".into(),
            name: name.into(),
            kind: kind.into(),
            column: column.into(),
            not_null: column == "id",
            pg_type: "integer".into(),
            comment: (column == "id").then(|| "primary key".to_string()),
            definition: definition.map(str::to_string),
        }
    }

    #[test]
    fn test_relations_are_grouped() {
        let loaded = relations_from_rows(vec![
            relation_row("accounts", "r", "id", None),
            relation_row("accounts", "r", "owner_id", None),
            relation_row("active_accounts", "v", "id", Some(" SELECT id FROM accounts;")),
        ]);

        assert_eq!(loaded.len(), 2);
        match &loaded[0] {
            LoadedData::Table { name, columns } => {
                assert_eq!(name.to_string(), "public.accounts");
                assert_eq!(columns.len(), 2);
                assert!(!columns[0].nullable);
                assert_eq!(columns[0].comment.as_deref(), Some("primary key"));
                assert!(columns[1].nullable);
            }
            other => panic!("Expected table, got {:?}", other),
        }
        match &loaded[1] {
            LoadedData::View { source, columns, .. } => {
                assert_eq!(source, "SELECT id FROM accounts;");
                assert_eq!(columns.len(), 1);
            }
            other => panic!("Expected view, got {:?}", other),
        }
    }

    #[test]
    fn test_enum_labels_keep_their_order() {
        let row = |name: &str, label: &str| EnumRow {
            schema: "public".into(),
            name: name.into(),
            label: label.into(),
        };
        let loaded = enums_from_rows(vec![
            row("account_state", "Active"),
            row("account_state", "Closed"),
            row("priority", "low"),
        ]);

        assert_eq!(
            loaded[0],
            LoadedData::Enum {
                name: QualifiedName::qualified("public", "account_state"),
                variants: vec!["Active".into(), "Closed".into()],
            }
        );
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_composites_are_grouped() {
        let row = |attribute: &str, pg_type: &str| AttributeRow {
            schema: "billing".into(),
            name: "address".into(),
            attribute: attribute.into(),
            pg_type: pg_type.into(),
            not_null: false,
        };
        let loaded = composites_from_rows(vec![row("city", "text"), row("zip", "character varying")]);

        match &loaded[..] {
            [LoadedData::Composite { name, attributes }] => {
                assert_eq!(name.schema.as_deref(), Some("billing"));
                assert_eq!(attributes[1].pg_type, "character varying");
                assert!(attributes[0].nullable);
            }
            other => panic!("Expected one composite, got {:?}", other),
        }
    }

    #[test]
    fn test_function_rows() {
        let loaded = FunctionRow {
            schema: "pg_catalog".into(),
            name: "sum".into(),
            args: vec!["integer".into()],
            returns: "bigint".into(),
            is_aggregate: true,
        }
        .into_loaded();

        assert!(matches!(loaded, LoadedData::Function { is_aggregate: true, .. }));
        assert_eq!(loaded.name().to_string(), "pg_catalog.sum");
    }

    #[test]
    fn test_requested_schemas_include_qualified_names() {
        let mut requests = DataRequests::new();
        requests.add_table(QualifiedName::qualified("billing", "invoices"));
        requests.add_table(QualifiedName::unqualified("users"));

        let schemas = requested_schemas(&requests, &default_search_path());
        assert_eq!(schemas, vec!["public", "pg_catalog", "billing"]);

        assert_eq!(
            plain_names(&[
                QualifiedName::unqualified("users"),
                QualifiedName::qualified("audit", "users"),
            ]),
            vec!["users"]
        );
    }
}
