//! Mock catalog adapter for testing
//!
//! This adapter serves predefined [`LoadedData`] records without connecting to
//! any database. It's useful for:
//! - Unit testing the loading fixed point and the resolver
//! - Checking which names a loading session actually requested
//! - Simulating catalog failures and latency
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sqlinfer_catalog::{CatalogAdapter, MockAdapter};
//! use sqlinfer_core::{LoadedColumn, LoadedData, QualifiedName};
//!
//! let adapter = MockAdapter::new();
//! adapter.add_data(LoadedData::Table {
//!     name: QualifiedName::qualified("public", "users"),
//!     columns: vec![LoadedColumn::new("id", "int4", false)],
//! }).await;
//!
//! let everything = adapter.load_all().await?;
//! ```
//!
//! ## Simulating Failures
//!
//! ```rust,ignore
//! // Simulate connection failure
//! let adapter = MockAdapter::new().with_connection_failure();
//! assert!(adapter.test_connection().await.is_err());
//!
//! // Simulate network latency
//! let adapter = MockAdapter::new().with_latency(100); // 100ms delay
//! ```

use crate::adapter::{select_requested, CatalogAdapter, FetchError};
use sqlinfer_core::{DataRequests, LoadedData};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Mock catalog adapter for testing
///
/// Records are shared between clones, so a test can keep a handle to inspect
/// the request log after handing the adapter to the engine.
pub struct MockAdapter {
    /// Catalog contents
    data: Arc<RwLock<Vec<LoadedData>>>,

    /// Errors to return when a name is requested, keyed by lowercase name
    errors: Arc<RwLock<HashMap<String, FetchError>>>,

    /// Every `load_selected` call, in order
    requests: Arc<RwLock<Vec<DataRequests>>>,

    /// Schemas searched, in order, for unqualified names
    search_path: Vec<String>,

    /// Simulate connection failure
    fail_connection: bool,

    /// Simulate query latency (milliseconds)
    latency_ms: u64,

    /// Name to return from name() method
    adapter_name: &'static str,
}

impl MockAdapter {
    /// Create a new mock adapter with an empty catalog
    pub fn new() -> Self {
        Self::from_data(Vec::new())
    }

    /// Create a mock adapter serving `data`
    pub fn from_data(data: Vec<LoadedData>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            errors: Arc::new(RwLock::new(HashMap::new())),
            requests: Arc::new(RwLock::new(Vec::new())),
            search_path: vec!["public".to_string(), "pg_catalog".to_string()],
            fail_connection: false,
            latency_ms: 0,
            adapter_name: "Mock",
        }
    }

    /// Add a record to the catalog
    pub async fn add_data(&self, record: LoadedData) {
        self.data.write().await.push(record);
    }

    /// Fail any load that requests `name`
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// adapter.add_error_for_name(
    ///     "restricted",
    ///     FetchError::PermissionDenied("Access denied".to_string())
    /// ).await;
    /// ```
    pub async fn add_error_for_name(&self, name: &str, error: FetchError) {
        self.errors.write().await.insert(name.to_lowercase(), error);
    }

    /// Configure to fail all connection tests and loads
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Configure simulated latency for all operations
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Set a custom adapter name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.adapter_name = name;
        self
    }

    /// Replace the schemas searched for unqualified names
    pub fn with_search_path(mut self, search_path: Vec<String>) -> Self {
        self.search_path = search_path;
        self
    }

    /// Get the number of records in the catalog
    pub async fn data_count(&self) -> usize {
        self.data.read().await.len()
    }

    /// Requests received by `load_selected`, in order
    pub async fn requests(&self) -> Vec<DataRequests> {
        self.requests.read().await.clone()
    }

    /// Clear the catalog, the configured errors and the request log
    pub async fn clear(&self) {
        self.data.write().await.clear();
        self.errors.write().await.clear();
        self.requests.write().await.clear();
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
    }

    fn check_connection(&self) -> Result<(), FetchError> {
        if self.fail_connection {
            Err(FetchError::NetworkError(
                "Simulated connection failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockAdapter {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            errors: Arc::clone(&self.errors),
            requests: Arc::clone(&self.requests),
            search_path: self.search_path.clone(),
            fail_connection: self.fail_connection,
            latency_ms: self.latency_ms,
            adapter_name: self.adapter_name,
        }
    }
}

#[async_trait::async_trait]
impl CatalogAdapter for MockAdapter {
    fn name(&self) -> &'static str {
        self.adapter_name
    }

    async fn load_all(&self) -> Result<Vec<LoadedData>, FetchError> {
        self.simulate_latency().await;
        self.check_connection()?;

        let data = self.data.read().await;
        Ok(data
            .iter()
            .filter(|record| {
                record.name().schema.as_ref().map_or(true, |schema| {
                    self.search_path.iter().any(|s| s.eq_ignore_ascii_case(schema))
                })
            })
            .cloned()
            .collect())
    }

    async fn load_selected(&self, requests: &DataRequests) -> Result<Vec<LoadedData>, FetchError> {
        self.simulate_latency().await;
        self.check_connection()?;
        self.requests.write().await.push(requests.clone());

        let errors = self.errors.read().await;
        if let Some(error) = requests
            .keys()
            .iter()
            .find_map(|key| errors.get(&key.name.name.to_lowercase()))
        {
            return Err(error.clone());
        }

        let data = self.data.read().await;
        Ok(select_requested(&data, requests, &self.search_path))
    }

    async fn test_connection(&self) -> Result<(), FetchError> {
        self.simulate_latency().await;
        self.check_connection()
    }
}

/// Builder for creating MockAdapter with many records
///
/// # Example
///
/// ```rust,ignore
/// let adapter = MockAdapterBuilder::new()
///     .with_table("public", "users", vec![LoadedColumn::new("id", "int4", false)])
///     .with_enum("public", "account_state", &["Active", "Closed"])
///     .with_latency(10)
///     .build();
/// ```
pub struct MockAdapterBuilder {
    data: Vec<LoadedData>,
    errors: HashMap<String, FetchError>,
    search_path: Option<Vec<String>>,
    fail_connection: bool,
    latency_ms: u64,
    adapter_name: &'static str,
}

impl MockAdapterBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            errors: HashMap::new(),
            search_path: None,
            fail_connection: false,
            latency_ms: 0,
            adapter_name: "Mock",
        }
    }

    /// Add any record
    pub fn with_data(mut self, record: LoadedData) -> Self {
        self.data.push(record);
        self
    }

    /// Add a table
    pub fn with_table(
        self,
        schema: &str,
        name: &str,
        columns: Vec<sqlinfer_core::LoadedColumn>,
    ) -> Self {
        self.with_data(LoadedData::Table {
            name: sqlinfer_core::QualifiedName::qualified(schema, name),
            columns,
        })
    }

    /// Add an enum with its labels in order
    pub fn with_enum(self, schema: &str, name: &str, variants: &[&str]) -> Self {
        self.with_data(LoadedData::Enum {
            name: sqlinfer_core::QualifiedName::qualified(schema, name),
            variants: variants.iter().map(|v| v.to_string()).collect(),
        })
    }

    /// Fail any load that requests `name`
    pub fn with_error(mut self, name: &str, error: FetchError) -> Self {
        self.errors.insert(name.to_lowercase(), error);
        self
    }

    /// Configure to fail connection tests and loads
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Configure simulated latency
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Set a custom adapter name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.adapter_name = name;
        self
    }

    /// Replace the search path
    pub fn with_search_path(mut self, search_path: Vec<String>) -> Self {
        self.search_path = Some(search_path);
        self
    }

    /// Build the mock adapter
    pub fn build(self) -> MockAdapter {
        let mut adapter = MockAdapter::from_data(self.data);
        adapter.errors = Arc::new(RwLock::new(self.errors));
        if let Some(search_path) = self.search_path {
            adapter.search_path = search_path;
        }
        adapter.fail_connection = self.fail_connection;
        adapter.latency_ms = self.latency_ms;
        adapter.adapter_name = self.adapter_name;
        adapter
    }
}

impl Default for MockAdapterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
