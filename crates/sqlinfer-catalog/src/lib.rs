//! Catalog client boundary
//!
//! Adapters that introspect a database's catalog and return schema facts as
//! [`sqlinfer_core::LoadedData`] records: table and view columns, enum labels,
//! composite attributes and function signatures.
//!
//! ## Features
//!
//! - `postgres` - PostgreSQL support (pg_catalog introspection)
//!
//! Without a feature, only the in-memory [`MockAdapter`] is usable.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqlinfer_catalog::{CatalogAdapter, PostgresAdapter};
//!
//! let adapter = PostgresAdapter::from_connection_string("host=localhost dbname=app").await?;
//! let mut requests = DataRequests::new();
//! requests.add_table(QualifiedName::unqualified("accounts"));
//! let loaded = adapter.load_selected(&requests).await?;
//! ```

pub mod adapter;
pub mod mock;
pub mod postgres;

pub use adapter::{select_requested, CatalogAdapter, FetchError};
pub use mock::{MockAdapter, MockAdapterBuilder};
pub use postgres::PostgresAdapter;
