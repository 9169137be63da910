//! Catalog adapter trait for fetching schema metadata

use sqlinfer_core::{DataKey, DataRequests, LoadedData};

/// Errors that can occur when querying the catalog
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Trait for catalog clients that load schema facts
///
/// Both loading methods return records in the [`LoadedData`] shapes. Functions
/// yield one record per overload.
#[async_trait::async_trait]
pub trait CatalogAdapter: Send + Sync {
    /// Get the adapter name (e.g., "PostgreSQL")
    fn name(&self) -> &'static str;

    /// Introspect every table, view, enum, composite and function in the
    /// adapter's search path
    async fn load_all(&self) -> Result<Vec<LoadedData>, FetchError>;

    /// Introspect only the requested names.
    ///
    /// Qualified names are loaded from their schema. Unqualified names are
    /// resolved through the search path: the first schema containing the name
    /// wins. Names that do not exist are silently absent from the result.
    async fn load_selected(&self, requests: &DataRequests) -> Result<Vec<LoadedData>, FetchError>;

    /// Test the connection to the catalog
    async fn test_connection(&self) -> Result<(), FetchError>;
}

/// Pick the records satisfying `requests` out of `available`, resolving
/// unqualified names through `search_path`.
pub fn select_requested(
    available: &[LoadedData],
    requests: &DataRequests,
    search_path: &[String],
) -> Vec<LoadedData> {
    let mut selected: Vec<LoadedData> = Vec::new();

    for key in requests.keys() {
        for record in matching(available, &key, search_path) {
            if !selected.contains(record) {
                selected.push(record.clone());
            }
        }
    }

    selected
}

fn matching<'a>(
    available: &'a [LoadedData],
    key: &DataKey,
    search_path: &[String],
) -> Vec<&'a LoadedData> {
    let candidates: Vec<&LoadedData> = available
        .iter()
        .filter(|record| record.kind() == key.kind && key.name.matches(record.name()))
        .collect();

    if key.name.schema.is_some() {
        return candidates;
    }

    for schema in search_path {
        let in_schema: Vec<&LoadedData> = candidates
            .iter()
            .copied()
            .filter(|record| {
                record
                    .name()
                    .schema
                    .as_deref()
                    .is_some_and(|s| s.eq_ignore_ascii_case(schema))
            })
            .collect();
        if !in_schema.is_empty() {
            return in_schema;
        }
    }

    Vec::new()
}
