//! Resolution engine
//!
//! Rewrites every deferred [`Load`] of a [`QueryInterface`] into a concrete
//! [`Type`] using the records of a [`LoadedStore`]. Sources are resolved
//! first, into a scope of named column lists; result columns and
//! parameters are then looked up against that scope, falling back to the
//! enclosing scope for correlated references.
//!
//! Views are typed by running their SQL through the extractor and this same
//! resolver the first time they are referenced.

use crate::error::LoadError;
use crate::store::LoadedStore;
use sqlinfer_core::{
    pg_types, Attribute, ErrorCode, Load, LoadedColumn, LoadedData, LoadedParam,
    LoadedQueryInterface, LoadedResult, QualifiedName, QueryInterface, ResolveMode, Source,
    Span, Type, TypeKind, TypeOrLoad,
};
use sqlinfer_sql::{functions, operators};
use std::collections::HashMap;

/// Composite attributes may themselves be composites; bound the nesting
const MAX_TYPE_DEPTH: usize = 16;

/// Resolve `qi` against the store
pub fn resolve(
    store: &LoadedStore,
    qi: &QueryInterface,
    mode: ResolveMode,
) -> Result<LoadedQueryInterface, LoadError> {
    Resolver::new(store, mode).resolve(qi)
}

/// Where a column reference appears
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// A result column: join-only sources are not visible
    Result,

    /// Anything else: result sources first, then the rest
    Other,
}

/// One resolved source
#[derive(Debug, Clone)]
struct ScopeSource {
    name: String,

    /// Catalog name, for `schema.table.column` references
    table: Option<QualifiedName>,

    is_result: bool,

    columns: Vec<LoadedResult>,
}

impl ScopeSource {
    fn column(&self, name: &str) -> Option<&LoadedResult> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    fn matches(&self, schema: Option<&str>, table: &str) -> bool {
        if !self.name.eq_ignore_ascii_case(table) {
            return false;
        }
        match (schema, &self.table) {
            (None, _) => true,
            (Some(schema), Some(name)) => name
                .schema
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(schema)),
            (Some(_), None) => false,
        }
    }
}

/// Resolved sources of one query level
#[derive(Debug)]
struct Scope<'p> {
    sources: Vec<ScopeSource>,
    parent: Option<&'p Scope<'p>>,
}

/// A column lookup that failed in one scope
enum Miss {
    NotFound(Vec<String>),
    Ambiguous(Vec<String>),
}

impl<'p> Scope<'p> {
    fn new(parent: Option<&'p Scope<'p>>) -> Self {
        Self {
            sources: Vec::new(),
            parent,
        }
    }

    /// Find a column in this scope only
    fn find(
        &self,
        schema: Option<&str>,
        table: Option<&str>,
        column: &str,
        position: Position,
    ) -> Result<Type, Miss> {
        let hits: Vec<(&ScopeSource, &LoadedResult)> = match table {
            Some(table) => self
                .sources
                .iter()
                .filter(|source| source.matches(schema, table))
                .filter_map(|source| source.column(column).map(|found| (source, found)))
                .collect(),
            None => {
                let from_results: Vec<_> = self
                    .sources
                    .iter()
                    .filter(|source| source.is_result)
                    .filter_map(|source| source.column(column).map(|found| (source, found)))
                    .collect();
                if from_results.is_empty() && position == Position::Other {
                    self.sources
                        .iter()
                        .filter(|source| !source.is_result)
                        .filter_map(|source| source.column(column).map(|found| (source, found)))
                        .collect()
                } else {
                    from_results
                }
            }
        };

        match hits.as_slice() {
            [(_, found)] => Ok(found.ty.clone()),
            [] => Err(Miss::NotFound(
                self.sources.iter().map(|source| source.name.clone()).collect(),
            )),
            many => Err(Miss::Ambiguous(
                many.iter().map(|(source, _)| source.name.clone()).collect(),
            )),
        }
    }

    /// Find a column here, then in the enclosing scopes
    fn lookup(
        &self,
        schema: Option<&str>,
        table: Option<&str>,
        column: &str,
        position: Position,
        span: Span,
    ) -> Result<Type, LoadError> {
        let reference = match table {
            Some(table) => format!("{}.{}", table, column),
            None => column.to_string(),
        };

        let mut candidates = Vec::new();
        let mut scope = Some(self);
        let mut position = position;
        while let Some(current) = scope {
            match current.find(schema, table, column, position) {
                Ok(ty) => return Ok(ty),
                Err(Miss::Ambiguous(sources)) => {
                    return Err(LoadError::new(
                        ErrorCode::AmbiguousColumn,
                        format!(
                            "Column \"{}\" is ambiguous, it exists in {}",
                            reference,
                            sources.join(", ")
                        ),
                    )
                    .with_span(span)
                    .with_candidates(sources));
                }
                Err(Miss::NotFound(sources)) => {
                    for source in sources {
                        if !candidates.contains(&source) {
                            candidates.push(source);
                        }
                    }
                }
            }
            // Correlated references may name any source of an enclosing query
            position = Position::Other;
            scope = current.parent;
        }

        let message = if candidates.is_empty() {
            format!("Column \"{}\" not found, the query has no sources", reference)
        } else {
            format!(
                "Column \"{}\" not found in {}",
                reference,
                candidates.join(", ")
            )
        };
        Err(LoadError::new(ErrorCode::ColumnNotFound, message)
            .with_span(span)
            .with_candidates(candidates))
    }
}

/// Resolves query interfaces against one store; memoises view columns
pub struct Resolver<'s> {
    store: &'s LoadedStore,
    mode: ResolveMode,

    views: HashMap<QualifiedName, Vec<LoadedResult>>,

    /// Views being resolved, innermost last
    resolving: Vec<QualifiedName>,
}

impl<'s> Resolver<'s> {
    pub fn new(store: &'s LoadedStore, mode: ResolveMode) -> Self {
        Self {
            store,
            mode,
            views: HashMap::new(),
            resolving: Vec::new(),
        }
    }

    pub fn mode(&self) -> ResolveMode {
        self.mode
    }

    /// Resolve a top level query interface
    pub fn resolve(&mut self, qi: &QueryInterface) -> Result<LoadedQueryInterface, LoadError> {
        self.resolve_query(qi, None)
    }

    /// Lenient mode turns lookups that found nothing into `Unknown`
    fn recover(&self, error: LoadError) -> Result<Type, LoadError> {
        if self.mode == ResolveMode::Lenient && error.is_not_found() {
            tracing::debug!(code = %error.code, message = %error.message, "unresolved, using unknown");
            return Ok(Type::unknown());
        }
        Err(error)
    }

    fn resolve_query(
        &mut self,
        qi: &QueryInterface,
        parent: Option<&Scope<'_>>,
    ) -> Result<LoadedQueryInterface, LoadError> {
        let mut scope = Scope::new(parent);
        let mut nested_params = Vec::new();

        // Tables first, so subqueries and function sources can refer to any of them
        for source in &qi.sources {
            if let Source::Table {
                schema,
                table,
                is_result,
                span,
                ..
            } = source
            {
                let name = QualifiedName::new(schema.as_deref(), table.clone());
                if let Some(columns) = self.table_columns(&name, *span)? {
                    // Qualified with the schema the search path found it in
                    let table = match self.store.find_table(&name) {
                        Some(record) => record.name().clone(),
                        None => name,
                    };
                    scope.sources.push(ScopeSource {
                        name: source.name().to_string(),
                        table: Some(table),
                        is_result: *is_result,
                        columns,
                    });
                }
            }
        }

        for source in &qi.sources {
            match source {
                Source::Table { .. } => {}
                Source::Query {
                    name,
                    query,
                    is_result,
                } => {
                    let resolved = self.resolve_query(query, Some(&scope))?;
                    nested_params.extend(resolved.params);
                    scope.sources.push(ScopeSource {
                        name: name.clone(),
                        table: None,
                        is_result: *is_result,
                        columns: resolved.results,
                    });
                }
                Source::Values {
                    name,
                    columns,
                    types,
                    is_result,
                } => {
                    let mut resolved = Vec::with_capacity(types.len());
                    for (index, ty) in types.iter().enumerate() {
                        let column = columns
                            .as_ref()
                            .and_then(|columns| columns.get(index).cloned())
                            .unwrap_or_else(|| format!("column{}", index + 1));
                        let ty = self.resolve_type(ty, &scope, Position::Other, 0)?;
                        resolved.push(LoadedResult::new(column, ty));
                    }
                    scope.sources.push(ScopeSource {
                        name: name.clone(),
                        table: None,
                        is_result: *is_result,
                        columns: resolved,
                    });
                }
            }
        }

        for source in &mut scope.sources {
            if qi.is_nullable(&source.name) {
                for column in &mut source.columns {
                    column.ty.nullable = true;
                }
            }
        }

        let mut loaded = LoadedQueryInterface::default();

        for result in &qi.results {
            match &result.ty {
                TypeOrLoad::Load(Load::Star {
                    schema,
                    table,
                    span,
                }) => loaded
                    .results
                    .extend(self.expand_star(&scope, schema.as_deref(), table.as_deref(), *span)?),
                ty => {
                    let ty = self.resolve_type(ty, &scope, Position::Result, 0)?;
                    loaded.results.push(LoadedResult::new(result.name.clone(), ty));
                }
            }
        }

        for param in &qi.params {
            let mut ty = self.resolve_type(&param.ty, &scope, Position::Other, 0)?;
            if param.required {
                ty.nullable = false;
            }
            loaded.add_param(LoadedParam {
                name: param.name.clone(),
                ty,
                spans: param.spans.clone(),
                required: param.required,
                spread: param.spread,
                pick: param.pick.clone(),
            });
        }

        for param in nested_params {
            loaded.add_param(param);
        }

        Ok(loaded)
    }

    /// Columns of a table or view; `None` when lenient mode drops it
    fn table_columns(
        &mut self,
        name: &QualifiedName,
        span: Span,
    ) -> Result<Option<Vec<LoadedResult>>, LoadError> {
        let store = self.store;
        match store.find_table(name) {
            Some(LoadedData::Table { columns, .. }) => Ok(Some(self.catalog_columns(columns)?)),
            // Errors inside the view point at the reference to it
            Some(LoadedData::View {
                name,
                source,
                columns,
            }) => self
                .view_columns(name, source, columns)
                .map(Some)
                .map_err(|error| error.with_span(span)),
            _ => {
                let error = LoadError::new(
                    ErrorCode::TableNotFound,
                    format!("Table \"{}\" not found in database", name),
                )
                .with_span(span);
                if self.mode == ResolveMode::Lenient {
                    tracing::debug!(table = %name, "dropping unresolved source");
                    return Ok(None);
                }
                Err(error)
            }
        }
    }

    fn catalog_columns(&self, columns: &[LoadedColumn]) -> Result<Vec<LoadedResult>, LoadError> {
        columns
            .iter()
            .map(|column| {
                let ty = self.pg_type(&column.pg_type, 0)?.with_nullable(column.nullable);
                Ok(LoadedResult::new(column.name.clone(), ty))
            })
            .collect()
    }

    /// Type a view from its SQL, memoised by qualified name
    fn view_columns(
        &mut self,
        name: &QualifiedName,
        source: &str,
        columns: &[LoadedColumn],
    ) -> Result<Vec<LoadedResult>, LoadError> {
        if let Some(resolved) = self.views.get(name) {
            return Ok(resolved.clone());
        }

        if self.resolving.contains(name) {
            let mut chain: Vec<String> = self.resolving.iter().map(|view| view.to_string()).collect();
            chain.push(name.to_string());
            return Err(LoadError::new(
                ErrorCode::ViewCycle,
                format!("View \"{}\" depends on itself: {}", name, chain.join(" -> ")),
            )
            .with_candidates(chain));
        }

        let statement = match sqlinfer_sql::parse(source) {
            Ok(statement) => statement,
            Err(error) => {
                if self.mode == ResolveMode::Lenient {
                    tracing::warn!(view = %name, error = %error, "using catalog columns for unparsable view");
                    let fallback = self.catalog_columns(columns)?;
                    self.views.insert(name.clone(), fallback.clone());
                    return Ok(fallback);
                }
                return Err(LoadError::new(
                    ErrorCode::ViewParseError,
                    format!("Could not parse view \"{}\": {}", name, error),
                ));
            }
        };

        tracing::trace!(view = %name, "resolving view");
        let qi = sqlinfer_sql::to_query_interface(&statement, &[]);

        self.resolving.push(name.clone());
        let resolved = self.resolve_query(&qi, None);
        self.resolving.pop();

        let results = resolved?.results;
        self.views.insert(name.clone(), results.clone());
        Ok(results)
    }

    fn expand_star(
        &self,
        scope: &Scope<'_>,
        schema: Option<&str>,
        table: Option<&str>,
        span: Span,
    ) -> Result<Vec<LoadedResult>, LoadError> {
        let sources: Vec<&ScopeSource> = match table {
            Some(table) => scope
                .sources
                .iter()
                .filter(|source| source.matches(schema, table))
                .collect(),
            None => scope.sources.iter().filter(|source| source.is_result).collect(),
        };

        if let (Some(table), true) = (table, sources.is_empty()) {
            let error = LoadError::new(
                ErrorCode::TableNotFound,
                format!("Source \"{}\" for \"{}.*\" not found", table, table),
            )
            .with_span(span)
            .with_candidates(scope.sources.iter().map(|s| s.name.clone()).collect());
            if self.mode == ResolveMode::Lenient {
                tracing::debug!(table, "dropping star of unresolved source");
                return Ok(Vec::new());
            }
            return Err(error);
        }

        Ok(sources
            .into_iter()
            .flat_map(|source| source.columns.iter().cloned())
            .collect())
    }

    /// Rewrite a possibly deferred type into a concrete one
    fn resolve_type(
        &self,
        ty: &TypeOrLoad,
        scope: &Scope<'_>,
        position: Position,
        depth: usize,
    ) -> Result<Type, LoadError> {
        let load = match ty {
            TypeOrLoad::Type(ty) => return Ok(ty.clone()),
            TypeOrLoad::Load(load) => load,
        };

        match load {
            Load::Column {
                schema,
                table,
                column,
                span,
            } => scope
                .lookup(schema.as_deref(), table.as_deref(), column, position, *span)
                .or_else(|error| self.recover(error)),

            Load::Record { schema, name, .. } => {
                let name = QualifiedName::new(schema.as_deref(), name.clone());
                Ok(self.named_type(&name, depth)?.unwrap_or_else(Type::unknown))
            }

            Load::Named {
                schema,
                name,
                nullable,
                span,
            } => {
                let qualified = QualifiedName::new(schema.as_deref(), name.clone());
                match self.named_type(&qualified, depth)? {
                    Some(ty) => Ok(ty.with_nullable(*nullable)),
                    None => self.recover(
                        LoadError::new(
                            ErrorCode::UnknownPostgresType,
                            format!("Type \"{}\" is not a built in, enum or composite type", qualified),
                        )
                        .with_span(*span),
                    ),
                }
            }

            Load::Function {
                schema,
                name,
                args,
                span,
            } => {
                let args = self.resolve_all(args, scope, position, depth)?;
                let name = QualifiedName::new(schema.as_deref(), name.clone());
                self.function(&name, &args, None, *span)
                    .or_else(|error| self.recover(error))
            }

            Load::FunctionArgument {
                schema,
                name,
                args,
                index,
                span,
            } => {
                let args = self.resolve_all(args, scope, position, depth)?;
                let name = QualifiedName::new(schema.as_deref(), name.clone());
                self.function(&name, &args, Some(*index), *span)
                    .or_else(|error| self.recover(error))
            }

            Load::Operator {
                left,
                right,
                available,
                part,
                ..
            } => {
                let left = self.resolve_type(left, scope, position, depth)?;
                let right = self.resolve_type(right, scope, position, depth)?;
                Ok(operators::resolve_part(available, &left, &right, *part))
            }

            Load::Array { items, nullable } => {
                let items = self.resolve_type(items, scope, position, depth)?;
                Ok(Type::array(items).with_nullable(*nullable))
            }

            Load::AsArray { value, nullable } => {
                let value = self.resolve_type(value, scope, position, depth)?;
                Ok(Type::array(value).with_nullable(*nullable))
            }

            Load::ArrayItem { value } => {
                let value = self.resolve_type(value, scope, position, depth)?;
                Ok(match value.kind {
                    TypeKind::Array { items } => *items,
                    TypeKind::Json => Type::json(),
                    _ => Type::unknown(),
                })
            }

            Load::CompositeAccess { value, name, span } => {
                let value = self.resolve_type(value, scope, position, depth)?;
                self.composite_field(value, name, *span)
            }

            Load::Union { items } => Ok(Type::union_of(self.resolve_all(items, scope, position, depth)?)),

            Load::Coalesce { items } => {
                Ok(functions::coalesce(self.resolve_all(items, scope, position, depth)?))
            }

            Load::ObjectLiteral { items, nullable } => {
                let mut attributes = Vec::with_capacity(items.len());
                for item in items {
                    let ty = self.resolve_type(&item.ty, scope, position, depth)?;
                    attributes.push(Attribute::new(item.name.clone(), ty));
                }
                Ok(Type::object_literal(attributes).with_nullable(*nullable))
            }

            Load::Optional { value } => {
                Ok(Type::optional(self.resolve_type(value, scope, position, depth)?))
            }

            Load::ColumnCast { column, value } => {
                let column = self.resolve_type(column, scope, position, depth)?;
                let value = self.resolve_type(value, scope, position, depth)?;
                Ok(value.with_nullable(column.nullable))
            }

            Load::Star { .. } => {
                debug_assert!(false, "star outside of a result column");
                Ok(Type::unknown())
            }
        }
    }

    fn resolve_all(
        &self,
        items: &[TypeOrLoad],
        scope: &Scope<'_>,
        position: Position,
        depth: usize,
    ) -> Result<Vec<Type>, LoadError> {
        items
            .iter()
            .map(|item| self.resolve_type(item, scope, position, depth))
            .collect()
    }

    /// A built in type, or the enum or composite the catalog reported
    fn pg_type(&self, raw: &str, depth: usize) -> Result<Type, LoadError> {
        if let Some(ty) = pg_types::lookup(raw) {
            return Ok(ty);
        }

        let parsed = pg_types::normalize(raw);
        let name = QualifiedName::new(parsed.schema.as_deref(), parsed.name);
        let Some(mut ty) = self.named_type(&name, depth)? else {
            tracing::debug!(pg_type = raw, "catalog type is neither built in nor loaded");
            return Ok(Type::unknown().with_postgres(raw.to_string()));
        };

        for _ in 0..parsed.dimensions {
            let postgres = ty.postgres.as_ref().map(|name| format!("_{}", name));
            ty = Type::array(ty);
            ty.postgres = postgres;
        }
        Ok(ty)
    }

    /// An enum as a union of its labels, else a composite; `None` when neither is loaded
    fn named_type(&self, name: &QualifiedName, depth: usize) -> Result<Option<Type>, LoadError> {
        if let Some((found, variants)) = self.store.find_enum(name) {
            let labels = variants.iter().map(Type::literal).collect();
            return Ok(Some(Type::union_of(labels).with_postgres(found.name.clone())));
        }

        if let Some((found, attributes)) = self.store.find_composite(name) {
            if depth >= MAX_TYPE_DEPTH {
                return Err(LoadError::new(
                    ErrorCode::UnknownPostgresType,
                    format!("Composite type \"{}\" nests too deeply", found),
                ));
            }
            let mut resolved = Vec::with_capacity(attributes.len());
            for attribute in attributes {
                let ty = self
                    .pg_type(&attribute.pg_type, depth + 1)?
                    .with_nullable(attribute.nullable);
                resolved.push(Attribute::new(attribute.name.clone(), ty));
            }
            return Ok(Some(
                Type::composite(found.name.clone(), resolved).with_postgres(found.name.clone()),
            ));
        }

        Ok(None)
    }

    /// Match `args` against the loaded overloads. `index` selects an
    /// argument type instead of the return type.
    fn function(
        &self,
        name: &QualifiedName,
        args: &[Type],
        index: Option<usize>,
        span: Span,
    ) -> Result<Type, LoadError> {
        let overloads = self.store.functions(name);
        if overloads.is_empty() {
            return Err(LoadError::new(
                ErrorCode::FunctionNotFound,
                format!("Function \"{}\" not found", name),
            )
            .with_span(span));
        }

        let mut variants = Vec::with_capacity(overloads.len());
        for overload in overloads {
            let LoadedData::Function {
                args: declared,
                returns,
                is_aggregate,
                ..
            } = overload
            else {
                continue;
            };
            variants.push(format!("{}({}) -> {}", name.name, declared.join(", "), returns));

            if declared.len() != args.len() {
                continue;
            }
            let declared_types = declared
                .iter()
                .map(|arg| self.pg_type(arg, 0))
                .collect::<Result<Vec<Type>, LoadError>>()?;
            if !declared_types
                .iter()
                .zip(args)
                .all(|(declared, actual)| declared.matches(actual))
            {
                continue;
            }

            if let Some(index) = index {
                return Ok(declared_types.get(index).cloned().unwrap_or_else(Type::unknown));
            }

            let mut result = self.pg_type(returns, 0)?;

            // Polymorphic result: the type of the first polymorphic argument
            if result.is_any() {
                if let Some(actual) = declared_types
                    .iter()
                    .zip(args)
                    .find(|(declared, actual)| declared.is_any() && !actual.is_any())
                    .map(|(_, actual)| actual.clone())
                {
                    result = actual;
                }
            }

            if *is_aggregate {
                if let TypeKind::Array { items } = result.kind {
                    result = *items;
                }
                return Ok(result.with_nullable(true));
            }

            let nullable = result.nullable || args.iter().any(|arg| arg.nullable);
            return Ok(result.with_nullable(nullable));
        }

        let actual: Vec<String> = args.iter().map(Type::to_string).collect();
        Err(LoadError::new(
            ErrorCode::NoMatchingFunction,
            format!(
                "No variant of \"{}\" accepts ({})",
                name,
                actual.join(", ")
            ),
        )
        .with_span(span)
        .with_candidates(variants))
    }

    fn composite_field(&self, value: Type, field: &str, span: Span) -> Result<Type, LoadError> {
        match value.kind {
            TypeKind::Composite { name, attributes } => attributes
                .into_iter()
                .find(|attribute| attribute.name.eq_ignore_ascii_case(field))
                .map(|attribute| {
                    let nullable = attribute.ty.nullable || value.nullable;
                    attribute.ty.with_nullable(nullable)
                })
                .ok_or_else(|| {
                    LoadError::new(
                        ErrorCode::MissingCompositeField,
                        format!("Composite type \"{}\" has no field \"{}\"", name, field),
                    )
                    .with_span(span)
                }),
            TypeKind::Unknown if self.mode == ResolveMode::Lenient => Ok(Type::unknown()),
            _ => Err(LoadError::new(
                ErrorCode::CompositeAccessOnNonComposite,
                format!("Cannot access field \"{}\" of non composite type {}", field, value),
            )
            .with_span(span)),
        }
    }
}
