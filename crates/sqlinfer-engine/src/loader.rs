//! Diff based catalog loading
//!
//! Only names the store has neither loaded nor attempted are sent to the
//! catalog. Loaded records can reveal more dependencies (a column of an enum
//! type, the tables a view selects from), so loading repeats until a round
//! produces no new requests.

use crate::error::EngineError;
use crate::requests::{extract_data_requests, request_pg_type};
use crate::store::LoadedStore;
use sqlinfer_catalog::CatalogAdapter;
use sqlinfer_core::{DataRequests, LoadedData};

/// Load everything `requests` needs, transitively. Returns the newly added records.
pub async fn load_data(
    adapter: &dyn CatalogAdapter,
    store: &mut LoadedStore,
    requests: &DataRequests,
) -> Result<Vec<LoadedData>, EngineError> {
    let mut pending = store.missing(requests);
    let mut added = Vec::new();
    let mut round = 0;

    while !pending.is_empty() {
        round += 1;
        tracing::debug!(
            adapter = adapter.name(),
            round,
            tables = pending.tables.len(),
            functions = pending.functions.len(),
            enums = pending.enums.len(),
            composites = pending.composites.len(),
            "loading catalog data"
        );

        store.mark_attempted(&pending);
        let loaded = adapter.load_selected(&pending).await?;
        let new_records = store.extend(loaded);

        let mut follow_up = DataRequests::new();
        for record in &new_records {
            follow_up.extend(dependencies(record));
        }

        tracing::trace!(round, added = new_records.len(), "catalog round finished");
        added.extend(new_records);
        pending = store.missing(&follow_up);
    }

    Ok(added)
}

/// Load the requests of a batch of interfaces with a single diff
pub async fn load_for_queries<'q>(
    adapter: &dyn CatalogAdapter,
    store: &mut LoadedStore,
    queries: impl IntoIterator<Item = &'q sqlinfer_core::QueryInterface>,
) -> Result<Vec<LoadedData>, EngineError> {
    let mut requests = DataRequests::new();
    for qi in queries {
        requests.extend(extract_data_requests(qi));
    }
    load_data(adapter, store, &requests).await
}

/// Catalog objects a loaded record refers to
pub fn dependencies(record: &LoadedData) -> DataRequests {
    let mut requests = DataRequests::new();
    match record {
        LoadedData::Table { columns, .. } => {
            for column in columns {
                request_pg_type(&column.pg_type, &mut requests);
            }
        }
        LoadedData::View {
            name,
            source,
            columns,
        } => {
            for column in columns {
                request_pg_type(&column.pg_type, &mut requests);
            }
            match sqlinfer_sql::parse(source) {
                Ok(statement) => {
                    let qi = sqlinfer_sql::to_query_interface(&statement, &[]);
                    requests.extend(extract_data_requests(&qi));
                }
                Err(error) => {
                    tracing::warn!(view = %name, error = %error, "skipping dependencies of unparsable view");
                }
            }
        }
        LoadedData::Composite { attributes, .. } => {
            for attribute in attributes {
                request_pg_type(&attribute.pg_type, &mut requests);
            }
        }
        LoadedData::Function { args, returns, .. } => {
            for arg in args {
                request_pg_type(arg, &mut requests);
            }
            request_pg_type(returns, &mut requests);
        }
        LoadedData::Enum { .. } => {}
    }
    requests
}
