//! Append-only session store of loaded catalog data
//!
//! One store is shared by every query of a session. Records are only ever
//! added; the set of attempted requests makes repeated loads of names the
//! catalog does not have a no-op.

use sqlinfer_core::{
    DataKey, DataKind, DataRequests, LoadedAttribute, LoadedData, QualifiedName,
};
use std::collections::{HashMap, HashSet};

/// Loaded catalog records plus the requests already sent for them
#[derive(Debug, Clone)]
pub struct LoadedStore {
    data: Vec<LoadedData>,

    /// Positions in `data` by kind and name; overloads share a key
    by_key: HashMap<DataKey, Vec<usize>>,

    /// Schemas searched, in order, for unqualified names
    search_path: Vec<String>,

    attempted: HashSet<DataKey>,
}

impl Default for LoadedStore {
    fn default() -> Self {
        Self::new(vec!["public".to_string(), "pg_catalog".to_string()])
    }
}

impl LoadedStore {
    /// Create an empty store
    pub fn new(search_path: Vec<String>) -> Self {
        Self {
            data: Vec::new(),
            by_key: HashMap::new(),
            search_path,
            attempted: HashSet::new(),
        }
    }

    /// Create a store over already loaded records, with the default search path
    pub fn from_data(data: Vec<LoadedData>) -> Self {
        let mut store = Self::default();
        store.extend(data);
        store
    }

    pub fn with_search_path(mut self, search_path: Vec<String>) -> Self {
        self.search_path = search_path;
        self
    }

    pub fn search_path(&self) -> &[String] {
        &self.search_path
    }

    pub fn data(&self) -> &[LoadedData] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append records, skipping exact duplicates. Returns the records that were new.
    pub fn extend(&mut self, records: Vec<LoadedData>) -> Vec<LoadedData> {
        let mut added = Vec::new();
        for record in records {
            let positions = self.by_key.entry(record.key()).or_default();
            if positions.iter().any(|&index| self.data[index] == record) {
                continue;
            }
            positions.push(self.data.len());
            self.data.push(record.clone());
            added.push(record);
        }
        added
    }

    /// Remember that `requests` were sent, whatever the catalog answered
    pub fn mark_attempted(&mut self, requests: &DataRequests) {
        self.attempted.extend(requests.keys());
    }

    pub fn was_attempted(&self, key: &DataKey) -> bool {
        self.attempted.contains(key)
    }

    /// The part of `requests` neither loaded nor attempted yet
    pub fn missing(&self, requests: &DataRequests) -> DataRequests {
        let mut missing = requests.clone();
        missing.retain(|key| !self.attempted.contains(key) && !self.satisfies(key));
        missing
    }

    fn satisfies(&self, key: &DataKey) -> bool {
        match key.kind {
            DataKind::Table => self.find_table(&key.name).is_some(),
            DataKind::Function => !self.functions(&key.name).is_empty(),
            // Either kind answers a user defined type name
            DataKind::Enum | DataKind::Composite => {
                self.find_enum(&key.name).is_some() || self.find_composite(&key.name).is_some()
            }
        }
    }

    /// Records of `kind` named `name`. Unqualified names take the first
    /// search path schema that has any.
    fn lookup(&self, kind: DataKind, name: &QualifiedName) -> Vec<&LoadedData> {
        let candidates = self
            .data
            .iter()
            .filter(|record| record.kind() == kind && name.matches(record.name()));

        if name.schema.is_some() {
            return candidates.collect();
        }

        let candidates: Vec<&LoadedData> = candidates.collect();
        for schema in &self.search_path {
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

    /// A table or view
    pub fn find_table(&self, name: &QualifiedName) -> Option<&LoadedData> {
        self.lookup(DataKind::Table, name).into_iter().next()
    }

    /// Every overload of a function
    pub fn functions(&self, name: &QualifiedName) -> Vec<&LoadedData> {
        self.lookup(DataKind::Function, name)
    }

    pub fn find_enum(&self, name: &QualifiedName) -> Option<(&QualifiedName, &[String])> {
        self.lookup(DataKind::Enum, name)
            .into_iter()
            .find_map(|record| match record {
                LoadedData::Enum { name, variants } => Some((name, variants.as_slice())),
                _ => None,
            })
    }

    pub fn find_composite(
        &self,
        name: &QualifiedName,
    ) -> Option<(&QualifiedName, &[LoadedAttribute])> {
        self.lookup(DataKind::Composite, name)
            .into_iter()
            .find_map(|record| match record {
                LoadedData::Composite { name, attributes } => Some((name, attributes.as_slice())),
                _ => None,
            })
    }
}
