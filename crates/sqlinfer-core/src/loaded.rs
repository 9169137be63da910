//! Catalog metadata records and the requests that fetch them

use serde::{Deserialize, Serialize};
use std::fmt;

/// A possibly schema-qualified catalog name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Schema name; `None` means "search the configured search path"
    pub schema: Option<String>,

    pub name: String,
}

impl QualifiedName {
    pub fn new(schema: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.map(str::to_string),
            name: name.into(),
        }
    }

    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    pub fn unqualified(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Does a loaded (fully qualified) name satisfy this, possibly unqualified, name?
    pub fn matches(&self, loaded: &QualifiedName) -> bool {
        if !self.name.eq_ignore_ascii_case(&loaded.name) {
            return false;
        }
        match (&self.schema, &loaded.schema) {
            (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual),
            _ => true,
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A column of a table or view as stored in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedColumn {
    pub name: String,
    pub nullable: bool,

    /// Postgres type name as reported by the catalog (`int4`, `_text`, `account_state`)
    pub pg_type: String,

    pub comment: Option<String>,
}

impl LoadedColumn {
    pub fn new(name: impl Into<String>, pg_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            nullable,
            pg_type: pg_type.into(),
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// An attribute of a composite type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedAttribute {
    pub name: String,
    pub pg_type: String,
    pub nullable: bool,
}

impl LoadedAttribute {
    pub fn new(name: impl Into<String>, pg_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            pg_type: pg_type.into(),
            nullable,
        }
    }
}

/// Schema facts fetched from the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LoadedData {
    Table {
        name: QualifiedName,
        columns: Vec<LoadedColumn>,
    },

    /// A view; its columns are inferred from `source` when it is first used
    View {
        name: QualifiedName,
        source: String,

        /// Columns as reported by the catalog, used when `source` cannot be typed
        columns: Vec<LoadedColumn>,
    },

    Enum {
        name: QualifiedName,
        variants: Vec<String>,
    },

    Composite {
        name: QualifiedName,
        attributes: Vec<LoadedAttribute>,
    },

    /// One overload of a function
    Function {
        name: QualifiedName,
        args: Vec<String>,
        returns: String,
        is_aggregate: bool,
    },
}

impl LoadedData {
    pub fn name(&self) -> &QualifiedName {
        match self {
            LoadedData::Table { name, .. }
            | LoadedData::View { name, .. }
            | LoadedData::Enum { name, .. }
            | LoadedData::Composite { name, .. }
            | LoadedData::Function { name, .. } => name,
        }
    }

    pub fn kind(&self) -> DataKind {
        match self {
            LoadedData::Table { .. } | LoadedData::View { .. } => DataKind::Table,
            LoadedData::Function { .. } => DataKind::Function,
            LoadedData::Enum { .. } => DataKind::Enum,
            LoadedData::Composite { .. } => DataKind::Composite,
        }
    }

    pub fn key(&self) -> DataKey {
        DataKey {
            kind: self.kind(),
            name: self.name().clone(),
        }
    }
}

/// Kinds of catalog objects, as grouped when loading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Table,
    Function,
    Enum,
    Composite,
}

/// Identity of a catalog object in a loading session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataKey {
    pub kind: DataKind,
    pub name: QualifiedName,
}

impl DataKey {
    pub fn new(kind: DataKind, name: QualifiedName) -> Self {
        Self { kind, name }
    }
}

/// Qualified names a query needs from the catalog, grouped by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRequests {
    pub tables: Vec<QualifiedName>,
    pub functions: Vec<QualifiedName>,
    pub enums: Vec<QualifiedName>,
    pub composites: Vec<QualifiedName>,
}

impl DataRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.functions.is_empty()
            && self.enums.is_empty()
            && self.composites.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len() + self.functions.len() + self.enums.len() + self.composites.len()
    }

    fn push_unique(list: &mut Vec<QualifiedName>, name: QualifiedName) {
        if !list.contains(&name) {
            list.push(name);
        }
    }

    pub fn add_table(&mut self, name: QualifiedName) {
        Self::push_unique(&mut self.tables, name);
    }

    pub fn add_function(&mut self, name: QualifiedName) {
        Self::push_unique(&mut self.functions, name);
    }

    /// A user defined type name may be an enum or a composite; request both
    pub fn add_named_type(&mut self, name: QualifiedName) {
        Self::push_unique(&mut self.enums, name.clone());
        Self::push_unique(&mut self.composites, name);
    }

    /// Merge another set of requests into this one
    pub fn extend(&mut self, other: DataRequests) {
        for name in other.tables {
            self.add_table(name);
        }
        for name in other.functions {
            self.add_function(name);
        }
        for name in other.enums {
            Self::push_unique(&mut self.enums, name);
        }
        for name in other.composites {
            Self::push_unique(&mut self.composites, name);
        }
    }

    /// All requests as keys
    pub fn keys(&self) -> Vec<DataKey> {
        let groups = [
            (DataKind::Table, &self.tables),
            (DataKind::Function, &self.functions),
            (DataKind::Enum, &self.enums),
            (DataKind::Composite, &self.composites),
        ];
        groups
            .into_iter()
            .flat_map(|(kind, names)| names.iter().map(move |name| DataKey::new(kind, name.clone())))
            .collect()
    }

    /// Keep only the requests accepted by `keep`
    pub fn retain(&mut self, mut keep: impl FnMut(&DataKey) -> bool) {
        self.tables
            .retain(|name| keep(&DataKey::new(DataKind::Table, name.clone())));
        self.functions
            .retain(|name| keep(&DataKey::new(DataKind::Function, name.clone())));
        self.enums
            .retain(|name| keep(&DataKey::new(DataKind::Enum, name.clone())));
        self.composites
            .retain(|name| keep(&DataKey::new(DataKind::Composite, name.clone())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_name_matching() {
        let wanted = QualifiedName::unqualified("Accounts");
        assert!(wanted.matches(&QualifiedName::qualified("public", "accounts")));

        let wanted = QualifiedName::qualified("billing", "accounts");
        assert!(!wanted.matches(&QualifiedName::qualified("public", "accounts")));
        assert_eq!(wanted.to_string(), "billing.accounts");
    }

    #[test]
    fn requests_deduplicate() {
        let mut requests = DataRequests::new();
        requests.add_table(QualifiedName::unqualified("users"));
        requests.add_table(QualifiedName::unqualified("users"));
        requests.add_named_type(QualifiedName::unqualified("state"));

        assert_eq!(requests.tables.len(), 1);
        assert_eq!(requests.len(), 3);
        assert_eq!(requests.keys().len(), 3);

        requests.retain(|key| key.kind != DataKind::Enum);
        assert!(requests.enums.is_empty());
        assert_eq!(requests.composites.len(), 1);
    }

    #[test]
    fn loaded_data_keys() {
        let view = LoadedData::View {
            name: QualifiedName::qualified("public", "active_users"),
            source: "SELECT id FROM users".into(),
            columns: vec![],
        };
        assert_eq!(view.kind(), DataKind::Table);
        assert_eq!(view.key().name.name, "active_users");
    }
}
