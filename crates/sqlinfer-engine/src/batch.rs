//! Batch resolution of many queries against one session store
//!
//! Every query is parsed and extracted first, the union of their catalog
//! requests is loaded in one diff, and each query is then resolved on its
//! own. Failures are per query: they become diagnostics in the [`Report`]
//! instead of aborting the batch. Only a catalog failure aborts.

use crate::error::EngineError;
use crate::loader::load_for_queries;
use crate::resolver::Resolver;
use crate::store::LoadedStore;
use serde::{Deserialize, Serialize};
use sqlinfer_catalog::CatalogAdapter;
use sqlinfer_core::{LoadedQueryInterface, QueryInterface, Report, ResolveMode};

/// One named query of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchQuery {
    /// Caller supplied name, usually a file path
    pub name: String,

    pub sql: String,
}

impl BatchQuery {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// Resolved interfaces in batch order, plus the diagnostics report
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// `None` for queries that failed to parse or resolve
    pub interfaces: Vec<Option<LoadedQueryInterface>>,

    pub report: Report,
}

impl BatchOutcome {
    pub fn resolved_count(&self) -> usize {
        self.interfaces.iter().filter(|qi| qi.is_some()).count()
    }
}

/// Parse, load and resolve a batch
pub async fn resolve_batch(
    adapter: &dyn CatalogAdapter,
    store: &mut LoadedStore,
    queries: &[BatchQuery],
    mode: ResolveMode,
) -> Result<BatchOutcome, EngineError> {
    let mut extracted: Vec<Result<QueryInterface, EngineError>> = Vec::with_capacity(queries.len());
    for query in queries {
        extracted.push(
            sqlinfer_sql::parse(&query.sql)
                .map(|statement| sqlinfer_sql::to_query_interface(&statement, &[]))
                .map_err(EngineError::from),
        );
    }

    let added = load_for_queries(adapter, store, extracted.iter().filter_map(|qi| qi.as_ref().ok())).await?;
    tracing::debug!(queries = queries.len(), added = added.len(), "batch catalog load finished");

    let mut resolver = Resolver::new(store, mode);
    let mut report = Report::new();
    let mut interfaces = Vec::with_capacity(queries.len());

    for (query, qi) in queries.iter().zip(extracted) {
        let resolved = qi.and_then(|qi| resolver.resolve(&qi).map_err(EngineError::from));
        match resolved {
            Ok(loaded) => {
                report.add_query(query.name.clone(), Vec::new());
                interfaces.push(Some(loaded));
            }
            Err(error) => {
                tracing::debug!(query = %query.name, error = %error, "query failed");
                report.add_query(query.name.clone(), vec![error.to_diagnostic(&query.sql)]);
                interfaces.push(None);
            }
        }
    }

    Ok(BatchOutcome { interfaces, report })
}
