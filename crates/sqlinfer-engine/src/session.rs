//! Inference session
//!
//! Owns the catalog adapter and the append-only store, so consecutive
//! queries only ever fetch what earlier ones have not.

use crate::batch::{resolve_batch, BatchOutcome, BatchQuery};
use crate::error::EngineError;
use crate::loader::load_data;
use crate::requests::extract_data_requests;
use crate::resolver::resolve;
use crate::store::LoadedStore;
use sqlinfer_catalog::CatalogAdapter;
use sqlinfer_core::{Config, LoadedQueryInterface, QueryInterface, ResolveMode};
use std::sync::Arc;

/// Parse, extract, load and resolve against one catalog
pub struct Session {
    adapter: Arc<dyn CatalogAdapter>,
    store: LoadedStore,
    mode: ResolveMode,
}

impl Session {
    pub fn new(adapter: Arc<dyn CatalogAdapter>) -> Self {
        Self {
            adapter,
            store: LoadedStore::default(),
            mode: ResolveMode::default(),
        }
    }

    /// Take the search path and mode from configuration
    pub fn from_config(adapter: Arc<dyn CatalogAdapter>, config: &Config) -> Self {
        Self {
            adapter,
            store: LoadedStore::new(config.search_path.clone()),
            mode: config.mode,
        }
    }

    pub fn with_mode(mut self, mode: ResolveMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ResolveMode {
        self.mode
    }

    pub fn store(&self) -> &LoadedStore {
        &self.store
    }

    /// Extract the schema independent interface of `sql`
    pub fn extract(&self, sql: &str) -> Result<QueryInterface, EngineError> {
        let statement = sqlinfer_sql::parse(sql)?;
        Ok(sqlinfer_sql::to_query_interface(&statement, &[]))
    }

    /// Type a single query
    pub async fn infer(&mut self, sql: &str) -> Result<LoadedQueryInterface, EngineError> {
        let qi = self.extract(sql)?;
        self.load_and_resolve(&qi).await
    }

    /// Type an already extracted interface
    pub async fn load_and_resolve(
        &mut self,
        qi: &QueryInterface,
    ) -> Result<LoadedQueryInterface, EngineError> {
        let requests = extract_data_requests(qi);
        load_data(self.adapter.as_ref(), &mut self.store, &requests).await?;
        Ok(resolve(&self.store, qi, self.mode)?)
    }

    /// Type many queries with one catalog load
    pub async fn infer_batch(&mut self, queries: &[BatchQuery]) -> Result<BatchOutcome, EngineError> {
        resolve_batch(self.adapter.as_ref(), &mut self.store, queries, self.mode).await
    }
}
