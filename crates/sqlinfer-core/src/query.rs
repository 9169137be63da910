//! Query interfaces: the typed shape of a statement before and after resolution

use crate::types::{Span, Type, TypeOrLoad};
use serde::{Deserialize, Serialize};

/// A named parameter of a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name without the leading `$`/`$$`
    pub name: String,

    /// Inferred type; for spread params, the type of one element
    #[serde(rename = "type")]
    pub ty: TypeOrLoad,

    /// Every occurrence in the SQL text, ordered by position
    pub spans: Vec<Span>,

    /// Declared with `!`: null is rejected
    pub required: bool,

    /// Declared with `$$`: expands into a list of placeholders
    pub spread: bool,

    /// Fields picked from each spread element, e.g. `$$rows(name, email)`
    pub pick: Vec<String>,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: impl Into<TypeOrLoad>, span: Span) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            spans: vec![span],
            required: false,
            spread: false,
            pick: Vec::new(),
        }
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_spread(mut self, spread: bool) -> Self {
        self.spread = spread;
        self
    }

    pub fn with_pick(mut self, pick: Vec<String>) -> Self {
        self.pick = pick;
        self
    }

    /// Position of the first occurrence
    pub fn first_position(&self) -> usize {
        self.spans.first().map(|span| span.start).unwrap_or(0)
    }

    fn merge(&mut self, other: Param) {
        let ty = std::mem::replace(&mut self.ty, TypeOrLoad::Type(Type::unknown()));
        self.ty = TypeOrLoad::union(vec![ty, other.ty]);
        self.spans.extend(other.spans);
        self.spans.sort_by_key(|span| span.start);
        self.spans.dedup();
        self.required |= other.required;
        self.spread |= other.spread;
        if self.pick.is_empty() {
            self.pick = other.pick;
        }
    }
}

/// An output column of a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultColumn {
    /// Alias or the default name derived from the expression
    pub name: String,

    /// Inferred type; `Load::Star` expands into many columns on resolution
    #[serde(rename = "type")]
    pub ty: TypeOrLoad,

    pub span: Span,
}

impl ResultColumn {
    pub fn new(name: impl Into<String>, ty: impl Into<TypeOrLoad>, span: Span) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            span,
        }
    }
}

/// Something a query can select columns from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum Source {
    /// A catalog table or view
    Table {
        schema: Option<String>,
        table: String,
        alias: Option<String>,

        /// False for tables only used for filtering (EXISTS, USING, UPDATE ... FROM)
        is_result: bool,
        span: Span,
    },

    /// A named subquery or CTE
    Query {
        name: String,
        query: Box<QueryInterface>,
        is_result: bool,
    },

    /// A `VALUES` list with optional declared column names
    Values {
        name: String,
        columns: Option<Vec<String>>,
        types: Vec<TypeOrLoad>,
        is_result: bool,
    },
}

impl Source {
    /// The name columns of this source are qualified with
    pub fn name(&self) -> &str {
        match self {
            Source::Table { table, alias, .. } => alias.as_deref().unwrap_or(table),
            Source::Query { name, .. } | Source::Values { name, .. } => name,
        }
    }

    pub fn is_result(&self) -> bool {
        match self {
            Source::Table { is_result, .. }
            | Source::Query { is_result, .. }
            | Source::Values { is_result, .. } => *is_result,
        }
    }

    pub fn set_result(&mut self, value: bool) {
        match self {
            Source::Table { is_result, .. }
            | Source::Query { is_result, .. }
            | Source::Values { is_result, .. } => *is_result = value,
        }
    }

    /// Rename a named query or values source (used when a CTE is aliased)
    pub fn renamed(mut self, new_name: impl Into<String>) -> Self {
        match &mut self {
            Source::Table { alias, .. } => *alias = Some(new_name.into()),
            Source::Query { name, .. } | Source::Values { name, .. } => *name = new_name.into(),
        }
        self
    }

    /// True for named queries and values lists, which shadow catalog tables
    pub fn is_named_query(&self) -> bool {
        !matches!(self, Source::Table { .. })
    }
}

/// Schema independent shape of a query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryInterface {
    pub sources: Vec<Source>,
    pub params: Vec<Param>,
    pub results: Vec<ResultColumn>,

    /// Sources on the optional side of an outer join
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nullable_sources: Vec<String>,
}

impl QueryInterface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a param, merging it with an existing param of the same name
    pub fn add_param(&mut self, param: Param) {
        match self.params.iter_mut().find(|p| p.name == param.name) {
            Some(existing) => existing.merge(param),
            None => self.params.push(param),
        }
        self.params.sort_by_key(Param::first_position);
    }

    /// Params of this query and of every nested query, merged by name
    pub fn all_params(&self) -> Vec<Param> {
        let mut merged = QueryInterface::default();
        self.collect_params(&mut merged);
        merged.params
    }

    fn collect_params(&self, into: &mut QueryInterface) {
        for param in &self.params {
            into.add_param(param.clone());
        }
        for source in &self.sources {
            if let Source::Query { query, .. } = source {
                query.collect_params(into);
            }
        }
    }

    pub fn add_source(&mut self, source: Source) {
        self.sources.push(source);
    }

    /// Mark the columns of a source as nullable
    pub fn set_nullable(&mut self, name: &str) {
        if !self.is_nullable(name) {
            self.nullable_sources.push(name.to_string());
        }
    }

    pub fn is_nullable(&self, name: &str) -> bool {
        self.nullable_sources
            .iter()
            .any(|source| source.eq_ignore_ascii_case(name))
    }

    /// Find a source by the name it is referenced with
    pub fn find_source(&self, name: &str) -> Option<&Source> {
        self.sources
            .iter()
            .find(|source| source.name().eq_ignore_ascii_case(name))
    }
}

/// A parameter with a concrete type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedParam {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    pub spans: Vec<Span>,
    pub required: bool,
    pub spread: bool,
    pub pick: Vec<String>,
}

impl LoadedParam {
    pub fn first_position(&self) -> usize {
        self.spans.first().map(|span| span.start).unwrap_or(0)
    }

    /// Merge another resolved occurrence of the same name
    pub fn merge(&mut self, other: LoadedParam) {
        let ty = std::mem::replace(&mut self.ty, Type::unknown());
        self.ty = Type::union_of(vec![ty, other.ty]);
        self.spans.extend(other.spans);
        self.spans.sort_by_key(|span| span.start);
        self.spans.dedup();
        self.required |= other.required;
        self.spread |= other.spread;
        if self.pick.is_empty() {
            self.pick = other.pick;
        }
    }
}

/// A result column with a concrete type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedResult {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

impl LoadedResult {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Fully concrete, schema resolved shape of a query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadedQueryInterface {
    pub params: Vec<LoadedParam>,
    pub results: Vec<LoadedResult>,
}

impl LoadedQueryInterface {
    /// Add a resolved param, merging by name and keeping first-occurrence order
    pub fn add_param(&mut self, param: LoadedParam) {
        match self.params.iter_mut().find(|p| p.name == param.name) {
            Some(existing) => existing.merge(param),
            None => self.params.push(param),
        }
        self.params.sort_by_key(LoadedParam::first_position);
    }

    pub fn param(&self, name: &str) -> Option<&LoadedParam> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn result(&self, name: &str) -> Option<&LoadedResult> {
        self.results.iter().find(|r| r.name == name)
    }
}
