//! Static type extraction
//!
//! Walks a parsed statement and produces its [`QueryInterface`]: the sources
//! it reads from, its parameters and its result columns. Anything that depends
//! on the database schema is left as a deferred [`Load`] for the resolution
//! engine; everything else is typed here.
//!
//! Subqueries keep their own scope. Each one becomes a nested
//! [`Source::Query`] that does not contribute result columns, and the engine
//! merges its params into the enclosing query once resolved.

use crate::ast::{
    Assignment, ConflictAction, CteBody, CurrentKind, DataType, Delete, Distinct, Expr,
    FunctionCall, Ident, Insert, InsertSource, IsTest, JoinConstraint, JoinKind, Literal,
    ObjectName, ParamRef, QuantifiedTarget, Query, SelectClause, SelectItem, SetExpr, Statement,
    TableAlias, TableFactor, TableWithJoins, Update, Values, WindowSpec, With,
};
use crate::functions::{self, BuiltinCall};
use crate::operators;
use sqlinfer_core::{
    pg_types, Load, LoadAttribute, OperatorPart, Param, QueryInterface, ResultColumn, Source,
    Span, Type, TypeKind, TypeOrLoad,
};

/// Name given to result columns PostgreSQL cannot name
pub const UNNAMED_COLUMN: &str = "?column?";

/// Extract the interface of a statement.
///
/// `parent_sources` are named queries (CTEs) visible from an enclosing
/// statement; a `FROM` reference to one of them uses it instead of a table.
pub fn to_query_interface(statement: &Statement, parent_sources: &[Source]) -> QueryInterface {
    let mut extractor = Extractor::new(parent_sources);
    extractor.extract_statement(statement);
    let (qi, _) = extractor.finish();

    tracing::debug!(
        sources = qi.sources.len(),
        params = qi.params.len(),
        results = qi.results.len(),
        "extracted query interface"
    );
    qi
}

/// A CTE defined at the current level
struct NamedQuery {
    source: Source,
    used: bool,
}

struct Extractor<'p> {
    qi: QueryInterface,

    /// Named queries visible from enclosing scopes
    parent: &'p [Source],

    ctes: Vec<NamedQuery>,

    /// Parent named queries referenced from this scope
    used_parent: Vec<String>,

    /// Expected types of the select list (`INSERT INTO t (a, b) SELECT ...`)
    expected_results: Vec<TypeOrLoad>,
}

impl<'p> Extractor<'p> {
    fn new(parent: &'p [Source]) -> Self {
        Self {
            qi: QueryInterface::new(),
            parent,
            ctes: Vec::new(),
            used_parent: Vec::new(),
            expected_results: Vec::new(),
        }
    }

    /// Unreferenced CTEs still carry params, so they are kept as filtering
    /// sources
    fn finish(mut self) -> (QueryInterface, Vec<String>) {
        for cte in self.ctes.drain(..) {
            if !cte.used {
                let mut source = cte.source;
                source.set_result(false);
                self.qi.add_source(source);
            }
        }
        (self.qi, self.used_parent)
    }

    fn extract_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Query(query) => self.extract_query(query),
            Statement::Insert(insert) => self.extract_insert(insert),
            Statement::Update(update) => self.extract_update(update),
            Statement::Delete(delete) => self.extract_delete(delete),
            Statement::Transaction(_) => {}
        }
    }

    // ---- scopes ----

    /// Named queries a nested scope can see: own CTEs shadow the parent's
    fn visible_named(&self) -> Vec<Source> {
        let mut visible: Vec<Source> = self.ctes.iter().map(|cte| cte.source.clone()).collect();
        for source in self.parent {
            if !visible
                .iter()
                .any(|own| own.name().eq_ignore_ascii_case(source.name()))
            {
                visible.push(source.clone());
            }
        }
        visible
    }

    /// Look up a CTE by name and mark it referenced
    fn use_named(&mut self, name: &str) -> Option<Source> {
        if let Some(cte) = self
            .ctes
            .iter_mut()
            .find(|cte| cte.source.name().eq_ignore_ascii_case(name))
        {
            cte.used = true;
            return Some(cte.source.clone());
        }

        let found = self
            .parent
            .iter()
            .find(|source| source.is_named_query() && source.name().eq_ignore_ascii_case(name))
            .cloned();
        if found.is_some() {
            self.mark_used(name);
        }
        found
    }

    fn mark_used(&mut self, name: &str) {
        match self
            .ctes
            .iter_mut()
            .find(|cte| cte.source.name().eq_ignore_ascii_case(name))
        {
            Some(cte) => cte.used = true,
            None => {
                if !self.used_parent.iter().any(|used| used == name) {
                    self.used_parent.push(name.to_string());
                }
            }
        }
    }

    /// Run an extraction in a fresh scope that sees `visible`
    fn scoped<F>(&mut self, visible: &[Source], expected: Vec<TypeOrLoad>, extract: F) -> QueryInterface
    where
        F: FnOnce(&mut Extractor<'_>),
    {
        let mut inner = Extractor::new(visible);
        inner.expected_results = expected;
        extract(&mut inner);
        let (qi, used) = inner.finish();
        for name in used {
            self.mark_used(&name);
        }
        qi
    }

    fn nested_query(&mut self, query: &Query, expected: Vec<TypeOrLoad>) -> QueryInterface {
        let visible = self.visible_named();
        self.scoped(&visible, expected, |inner| inner.extract_query(query))
    }

    fn synthetic_name(&self, kind: &str) -> String {
        format!("#{}{}", kind, self.qi.sources.len() + 1)
    }

    /// Add a subquery that only filters or feeds values; returns its name
    fn add_subquery(&mut self, qi: QueryInterface) -> String {
        let name = self.synthetic_name("subquery");
        self.qi.add_source(Source::Query {
            name: name.clone(),
            query: Box::new(qi),
            is_result: false,
        });
        name
    }

    /// Add a subquery used as a value; returns the type of its first column
    fn add_value_subquery(&mut self, qi: QueryInterface, span: Span) -> TypeOrLoad {
        let first = qi
            .results
            .first()
            .filter(|first| first.name != "*")
            .map(|first| first.name.clone());
        let name = self.add_subquery(qi);
        match first {
            Some(column) => Load::Column {
                schema: None,
                table: Some(name),
                column,
                span,
            }
            .into(),
            None => Type::unknown().into(),
        }
    }

    // ---- queries ----

    fn extract_with(&mut self, with: &With) {
        for cte in &with.ctes {
            let name = cte.name.value.clone();
            let source = match &cte.body {
                CteBody::Values(values) => {
                    let types = self.values_types(values);
                    Source::Values {
                        name,
                        columns: (!cte.columns.is_empty()).then(|| idents(&cte.columns)),
                        types,
                        is_result: true,
                    }
                }
                CteBody::Query(query) => {
                    let mut qi = self.cte_query(&name, query, with.recursive, &cte.columns);
                    rename_results(&mut qi, &cte.columns);
                    Source::Query {
                        name,
                        query: Box::new(qi),
                        is_result: true,
                    }
                }
                CteBody::Insert(insert) => {
                    let visible = self.visible_named();
                    let mut qi = self.scoped(&visible, vec![], |inner| inner.extract_insert(insert));
                    rename_results(&mut qi, &cte.columns);
                    Source::Query {
                        name,
                        query: Box::new(qi),
                        is_result: true,
                    }
                }
                CteBody::Update(update) => {
                    let visible = self.visible_named();
                    let mut qi = self.scoped(&visible, vec![], |inner| inner.extract_update(update));
                    rename_results(&mut qi, &cte.columns);
                    Source::Query {
                        name,
                        query: Box::new(qi),
                        is_result: true,
                    }
                }
                CteBody::Delete(delete) => {
                    let visible = self.visible_named();
                    let mut qi = self.scoped(&visible, vec![], |inner| inner.extract_delete(delete));
                    rename_results(&mut qi, &cte.columns);
                    Source::Query {
                        name,
                        query: Box::new(qi),
                        is_result: true,
                    }
                }
            };
            self.ctes.push(NamedQuery {
                source,
                used: false,
            });
        }
    }

    /// A recursive CTE refers to itself; its non-recursive branch gives the
    /// provisional columns for that reference
    fn cte_query(&mut self, name: &str, query: &Query, recursive: bool, columns: &[Ident]) -> QueryInterface {
        let mut visible = self.visible_named();

        if recursive && matches!(query.body, SetExpr::Operation { .. }) {
            let mut provisional =
                self.scoped(&visible, vec![], |inner| inner.extract_set_expr(query.body.leftmost()));
            rename_results(&mut provisional, columns);
            visible.retain(|source| !source.name().eq_ignore_ascii_case(name));
            visible.insert(
                0,
                Source::Query {
                    name: name.to_string(),
                    query: Box::new(provisional),
                    is_result: true,
                },
            );
        }

        self.scoped(&visible, vec![], |inner| inner.extract_query(query))
    }

    fn extract_query(&mut self, query: &Query) {
        if let Some(with) = &query.with {
            self.extract_with(with);
        }

        self.extract_set_expr(&query.body);

        for item in &query.order_by {
            self.infer_expr(&item.expr, None);
        }
        if let Some(limit) = &query.limit {
            self.infer_expr(limit, Some(Type::number().into()));
        }
        if let Some(offset) = &query.offset {
            self.infer_expr(offset, Some(Type::number().into()));
        }
    }

    fn extract_set_expr(&mut self, body: &SetExpr) {
        match body {
            SetExpr::Select(select) => {
                for clause in &select.clauses {
                    if let SelectClause::From(from) = clause {
                        for table in from {
                            self.extract_from(table, true);
                        }
                    }
                }

                if let Some(Distinct::On(exprs)) = &select.distinct {
                    for expr in exprs {
                        self.infer_expr(expr, None);
                    }
                }

                for item in &select.items {
                    self.add_result(item);
                }

                for clause in &select.clauses {
                    match clause {
                        SelectClause::From(_) => {}
                        SelectClause::Where(expr) | SelectClause::Having(expr) => {
                            self.infer_expr(expr, Some(Type::boolean().into()));
                        }
                        SelectClause::GroupBy(exprs) => {
                            for expr in exprs {
                                self.infer_expr(expr, None);
                            }
                        }
                        SelectClause::Window(windows) => {
                            for window in windows {
                                self.infer_window(&window.spec);
                            }
                        }
                    }
                }
            }
            SetExpr::Values(values) => {
                let types = self.values_types(values);
                for (index, ty) in types.into_iter().enumerate() {
                    self.qi.results.push(ResultColumn::new(
                        format!("column{}", index + 1),
                        ty,
                        values.span,
                    ));
                }
            }
            SetExpr::Nested(query) => self.extract_query(query),
            SetExpr::Operation { left, right, .. } => {
                self.extract_set_expr(left);
                let visible = self.visible_named();
                let branch = self.scoped(&visible, vec![], |inner| inner.extract_set_expr(right));
                self.add_subquery(branch);
            }
        }
    }

    /// Column types of a `VALUES` list: the union over rows
    fn values_types(&mut self, values: &Values) -> Vec<TypeOrLoad> {
        let width = values.rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut columns: Vec<Vec<TypeOrLoad>> = vec![Vec::new(); width];

        for row in &values.rows {
            let refs: Vec<&Expr> = row.iter().collect();
            let types = self.infer_related(&refs, None);
            for (index, ty) in types.into_iter().enumerate() {
                columns[index].push(ty);
            }
        }

        columns.into_iter().map(TypeOrLoad::union).collect()
    }

    fn add_result(&mut self, item: &SelectItem) {
        match item {
            SelectItem::Wildcard { qualifier, span } => {
                let ty = Load::Star {
                    schema: qualifier
                        .as_ref()
                        .and_then(|q| q.schema_str().map(str::to_string)),
                    table: qualifier.as_ref().map(|q| q.name_str().to_string()),
                    span: *span,
                };
                self.qi.results.push(ResultColumn::new("*", ty, *span));
            }
            SelectItem::Expr { expr, alias, span } => {
                let expected = self.expected_results.get(self.qi.results.len()).cloned();
                let ty = self.infer_expr(expr, expected);
                let name = alias
                    .as_ref()
                    .map(|alias| alias.value.clone())
                    .unwrap_or_else(|| result_name(expr));
                self.qi.results.push(ResultColumn::new(name, ty, *span));
            }
        }
    }

    // ---- FROM ----

    fn extract_from(&mut self, table: &TableWithJoins, is_result: bool) {
        let start = self.qi.sources.len();
        self.extract_table_factor(&table.relation, is_result);

        for join in &table.joins {
            let left_end = self.qi.sources.len();
            self.extract_table_factor(&join.relation, is_result);
            let right_end = self.qi.sources.len();

            if matches!(join.kind, JoinKind::Left | JoinKind::Full) {
                self.mark_nullable(left_end..right_end);
            }
            if matches!(join.kind, JoinKind::Right | JoinKind::Full) {
                self.mark_nullable(start..left_end);
            }

            if let JoinConstraint::On(expr) = &join.constraint {
                self.infer_expr(expr, Some(Type::boolean().into()));
            }
        }
    }

    fn mark_nullable(&mut self, range: std::ops::Range<usize>) {
        let names: Vec<String> = self.qi.sources[range]
            .iter()
            .filter(|source| source.is_result())
            .map(|source| source.name().to_string())
            .collect();
        for name in names {
            self.qi.set_nullable(&name);
        }
    }

    fn extract_table_factor(&mut self, factor: &TableFactor, is_result: bool) {
        match factor {
            TableFactor::Table { name, alias, span } => {
                if name.schema.is_none() {
                    if let Some(named) = self.use_named(name.name_str()) {
                        let mut source = match alias {
                            Some(alias) => with_column_aliases(named.renamed(alias.name.value.clone()), &alias.columns),
                            None => named,
                        };
                        source.set_result(is_result);
                        self.qi.add_source(source);
                        return;
                    }
                }
                self.qi.add_source(Source::Table {
                    schema: name.schema_str().map(str::to_string),
                    table: name.name_str().to_string(),
                    alias: alias.as_ref().map(|alias| alias.name.value.clone()),
                    is_result,
                    span: *span,
                });
            }
            TableFactor::Derived {
                subquery, alias, ..
            } => {
                let mut qi = self.nested_query(subquery, vec![]);
                let name = match alias {
                    Some(alias) => {
                        rename_results(&mut qi, &alias.columns);
                        alias.name.value.clone()
                    }
                    None => self.synthetic_name("subquery"),
                };
                self.qi.add_source(Source::Query {
                    name,
                    query: Box::new(qi),
                    is_result,
                });
            }
            TableFactor::Function { call, alias, .. } => {
                let ty = if is_unnest(call) {
                    let array = self.infer_expr(&call.args[0], None);
                    array_item(array)
                } else {
                    self.infer_function(call, None)
                };
                let name = alias
                    .as_ref()
                    .map(|alias| alias.name.value.clone())
                    .unwrap_or_else(|| call.name.name_str().to_string());
                let columns = match alias {
                    Some(TableAlias { columns, .. }) if !columns.is_empty() => idents(columns),
                    _ => vec![name.clone()],
                };
                self.qi.add_source(Source::Values {
                    name,
                    columns: Some(columns),
                    types: vec![ty],
                    is_result,
                });
            }
            TableFactor::Nested { table, .. } => self.extract_from(table, is_result),
        }
    }

    // ---- data modification ----

    fn target_source(&self, table: &ObjectName, alias: Option<&Ident>, span: Span) -> Source {
        Source::Table {
            schema: table.schema_str().map(str::to_string),
            table: table.name_str().to_string(),
            alias: alias.map(|alias| alias.value.clone()),
            is_result: true,
            span,
        }
    }

    fn extract_insert(&mut self, insert: &Insert) {
        if let Some(with) = &insert.with {
            self.extract_with(with);
        }

        let target = self.target_source(&insert.table, insert.alias.as_ref(), insert.table.span);
        let target_name = target.name().to_string();
        self.qi.add_source(target);

        let columns: Vec<TypeOrLoad> = insert
            .columns
            .iter()
            .map(|column| target_column(&target_name, column))
            .collect();

        match &insert.source {
            InsertSource::Values(values) => {
                for row in &values.rows {
                    for (index, expr) in row.iter().enumerate() {
                        let expected = columns
                            .get(index)
                            .cloned()
                            .unwrap_or_else(|| Type::unknown().into());
                        self.infer_expr(expr, Some(expected));
                    }
                }
            }
            InsertSource::Param(param) => {
                let pick = if param.pick.is_empty() {
                    idents(&insert.columns)
                } else {
                    idents(&param.pick)
                };
                let items: Vec<LoadAttribute> = pick
                    .iter()
                    .enumerate()
                    .map(|(index, field)| {
                        let ty = columns.get(index).cloned().unwrap_or_else(|| {
                            target_column(&target_name, &Ident::new(field.clone(), param.span))
                        });
                        LoadAttribute::new(field.clone(), ty)
                    })
                    .collect();
                let ty: TypeOrLoad = if items.is_empty() {
                    Type::unknown().into()
                } else {
                    Load::ObjectLiteral {
                        items,
                        nullable: false,
                    }
                    .into()
                };
                self.register_param(param, ty, pick);
            }
            InsertSource::Query(query) => {
                let qi = self.nested_query(query, columns.clone());
                self.add_subquery(qi);
            }
            InsertSource::DefaultValues => {}
        }

        if let Some(on_conflict) = &insert.on_conflict {
            self.qi.add_source(Source::Table {
                schema: insert.table.schema_str().map(str::to_string),
                table: insert.table.name_str().to_string(),
                alias: Some("excluded".to_string()),
                is_result: false,
                span: on_conflict.span,
            });

            if let ConflictAction::Update {
                assignments,
                selection,
            } = &on_conflict.action
            {
                self.extract_assignments(assignments, &target_name);
                if let Some(selection) = selection {
                    self.infer_expr(selection, Some(Type::boolean().into()));
                }
            }
        }

        for item in &insert.returning {
            self.add_result(item);
        }
    }

    fn extract_update(&mut self, update: &Update) {
        if let Some(with) = &update.with {
            self.extract_with(with);
        }

        let target = self.target_source(&update.table, update.alias.as_ref(), update.table.span);
        let target_name = target.name().to_string();
        self.qi.add_source(target);

        for table in &update.from {
            self.extract_from(table, false);
        }

        self.extract_assignments(&update.assignments, &target_name);

        if let Some(selection) = &update.selection {
            self.infer_expr(selection, Some(Type::boolean().into()));
        }
        for item in &update.returning {
            self.add_result(item);
        }
    }

    fn extract_delete(&mut self, delete: &Delete) {
        if let Some(with) = &delete.with {
            self.extract_with(with);
        }

        let target = self.target_source(&delete.table, delete.alias.as_ref(), delete.table.span);
        self.qi.add_source(target);

        for table in &delete.using {
            self.extract_from(table, false);
        }

        if let Some(selection) = &delete.selection {
            self.infer_expr(selection, Some(Type::boolean().into()));
        }
        for item in &delete.returning {
            self.add_result(item);
        }
    }

    /// `SET col = value` expects the column's type; `(a, b) = (x, y)` pairs up
    fn extract_assignments(&mut self, assignments: &[Assignment], target: &str) {
        for assignment in assignments {
            let expected: Vec<TypeOrLoad> = assignment
                .columns
                .iter()
                .map(|column| target_column(target, column))
                .collect();

            if let [single] = expected.as_slice() {
                self.infer_expr(&assignment.value, Some(single.clone()));
                continue;
            }

            match assignment.value.unnested() {
                Expr::Row { elements, .. } => {
                    for (index, element) in elements.iter().enumerate() {
                        self.infer_expr(element, expected.get(index).cloned());
                    }
                }
                Expr::Subquery { query, .. } => {
                    let qi = self.nested_query(query, expected);
                    self.add_subquery(qi);
                }
                other => {
                    self.infer_expr(other, None);
                }
            }
        }
    }

    // ---- params ----

    fn register_param(&mut self, param: &ParamRef, ty: TypeOrLoad, pick: Vec<String>) {
        self.qi.add_param(
            Param::new(param.name.clone(), ty, param.span)
                .with_required(param.required)
                .with_spread(param.spread)
                .with_pick(pick),
        );
    }

    /// Type a group of expressions that must share a type (comparison
    /// operands, `IN` lists, `COALESCE` arguments): params take `expected`,
    /// or else the type of the first non-param expression
    fn infer_related(&mut self, exprs: &[&Expr], expected: Option<TypeOrLoad>) -> Vec<TypeOrLoad> {
        let mut types: Vec<Option<TypeOrLoad>> = vec![None; exprs.len()];

        for (index, expr) in exprs.iter().enumerate() {
            if !is_param(expr) {
                types[index] = Some(self.infer_expr(expr, expected.clone()));
            }
        }

        let shared = expected
            .or_else(|| types.iter().flatten().next().cloned())
            .unwrap_or_else(|| Type::unknown().into());

        for (index, expr) in exprs.iter().enumerate() {
            if is_param(expr) {
                types[index] = Some(self.infer_expr(expr, Some(shared.clone())));
            }
        }

        types.into_iter().flatten().collect()
    }

    // ---- expressions ----

    /// Infer the type of an expression. `expected` is the type a parameter in
    /// this position takes.
    fn infer_expr(&mut self, expr: &Expr, expected: Option<TypeOrLoad>) -> TypeOrLoad {
        match expr {
            Expr::Literal { value, .. } => literal_type(value).into(),
            Expr::Column {
                schema,
                table,
                column,
                span,
            } => Load::Column {
                schema: schema.as_ref().map(|s| s.value.clone()),
                table: table.as_ref().map(|t| t.value.clone()),
                column: column.value.clone(),
                span: *span,
            }
            .into(),
            Expr::Param(param) => {
                let ty = expected.unwrap_or_else(|| Type::unknown().into());
                self.register_param(param, ty.clone(), idents(&param.pick));
                ty
            }
            Expr::Unary { op, expr: operand, .. } => match op.op.as_str() {
                "NOT" => {
                    self.infer_expr(operand, Some(Type::boolean().into()));
                    Type::boolean().into()
                }
                "|/" | "||/" | "!!" => {
                    self.infer_expr(operand, Some(Type::number().into()));
                    Type::number().into()
                }
                _ => self.infer_expr(operand, expected),
            },
            Expr::Binary {
                left,
                op,
                right,
                span,
            } => self.infer_binary(left, &op.op, right, *span),
            Expr::Is {
                expr: operand,
                test,
                ..
            } => {
                match test {
                    IsTest::DistinctFrom(other) => {
                        self.infer_related(&[operand.as_ref(), other.as_ref()], None);
                    }
                    IsTest::True | IsTest::False | IsTest::Unknown => {
                        self.infer_expr(operand, Some(Type::boolean().into()));
                    }
                    IsTest::Null => {
                        self.infer_expr(operand, None);
                    }
                }
                Type::boolean().into()
            }
            Expr::Between {
                expr: operand,
                low,
                high,
                ..
            } => {
                self.infer_related(&[operand.as_ref(), low.as_ref(), high.as_ref()], None);
                Type::boolean().into()
            }
            Expr::InList {
                expr: operand,
                list,
                ..
            } => {
                let mut all: Vec<&Expr> = vec![operand.as_ref()];
                all.extend(list.iter());
                self.infer_related(&all, None);
                Type::boolean().into()
            }
            Expr::InSubquery {
                expr: operand,
                subquery,
                span,
                ..
            } => {
                let qi = self.nested_query(subquery, vec![]);
                let first = self.add_value_subquery(qi, *span);
                let expected = is_param(operand).then_some(first);
                self.infer_expr(operand, expected);
                Type::boolean().into()
            }
            Expr::InParam {
                expr: operand,
                param,
                ..
            } => {
                let element = self.infer_expr(operand, None);
                self.register_param(param, element, idents(&param.pick));
                Type::boolean().into()
            }
            Expr::Like {
                expr: operand,
                pattern,
                escape,
                ..
            } => {
                self.infer_expr(operand, Some(Type::string().into()));
                self.infer_expr(pattern, Some(Type::string().into()));
                if let Some(escape) = escape {
                    self.infer_expr(escape, Some(Type::string().into()));
                }
                Type::boolean().into()
            }
            Expr::Quantified { left, right, span, .. } => {
                match right {
                    QuantifiedTarget::Subquery(query) => {
                        let qi = self.nested_query(query, vec![]);
                        let first = self.add_value_subquery(qi, *span);
                        let expected = is_param(left).then_some(first);
                        self.infer_expr(left, expected);
                    }
                    QuantifiedTarget::Expr(array) => {
                        if is_param(array) {
                            let element = self.infer_expr(left, None);
                            self.infer_expr(array, Some(array_of(element)));
                        } else {
                            let array = self.infer_expr(array, None);
                            self.infer_expr(left, Some(array_item(array)));
                        }
                    }
                }
                Type::boolean().into()
            }
            Expr::Cast {
                expr: inner,
                data_type,
                span,
            } => self.infer_cast(inner, data_type, *span),
            Expr::TypedString { data_type, span, .. } => cast_target(data_type, *span),
            Expr::Function(call) => self.infer_function(call, expected),
            Expr::Case {
                operand,
                whens,
                else_result,
                ..
            } => {
                match operand {
                    Some(operand) => {
                        let mut all: Vec<&Expr> = vec![operand.as_ref()];
                        all.extend(whens.iter().map(|(when, _)| when));
                        self.infer_related(&all, None);
                    }
                    None => {
                        for (when, _) in whens {
                            self.infer_expr(when, Some(Type::boolean().into()));
                        }
                    }
                }

                let mut branches: Vec<&Expr> = whens.iter().map(|(_, then)| then).collect();
                if let Some(else_result) = else_result {
                    branches.push(else_result.as_ref());
                }
                let mut types = self.infer_related(&branches, expected);
                if else_result.is_none() {
                    types.push(Type::null().into());
                }
                TypeOrLoad::union(types)
            }
            Expr::Exists { subquery, .. } => {
                let qi = self.nested_query(subquery, vec![]);
                self.add_subquery(qi);
                Type::boolean().into()
            }
            Expr::Subquery { query, span } => {
                let qi = self.nested_query(query, expected.into_iter().collect());
                let first = self.add_value_subquery(qi, *span);
                // No row means null
                TypeOrLoad::union(vec![first, Type::null().into()])
            }
            Expr::Array { elements, .. } => {
                let refs: Vec<&Expr> = elements.iter().collect();
                let item_expected = expected.map(array_item);
                let types = self.infer_related(&refs, item_expected);
                if types.is_empty() {
                    return Type::array(Type::unknown()).into();
                }
                array_of(TypeOrLoad::union(types))
            }
            Expr::ArraySubquery { query, span } => {
                let qi = self.nested_query(query, vec![]);
                let first = self.add_value_subquery(qi, *span);
                Load::AsArray {
                    value: Box::new(first),
                    nullable: false,
                }
                .into()
            }
            Expr::Row { elements, .. } => {
                let items: Vec<LoadAttribute> = elements
                    .iter()
                    .enumerate()
                    .map(|(index, element)| {
                        LoadAttribute::new(format!("f{}", index + 1), self.infer_expr(element, None))
                    })
                    .collect();
                Load::ObjectLiteral {
                    items,
                    nullable: false,
                }
                .into()
            }
            Expr::Nested { expr: inner, .. } => self.infer_expr(inner, expected),
            Expr::Subscript {
                expr: inner,
                lower,
                upper,
                slice,
                ..
            } => {
                for bound in [lower, upper].into_iter().flatten() {
                    self.infer_expr(bound, Some(Type::number().into()));
                }
                let array = self.infer_expr(inner, None);
                if *slice {
                    return array;
                }
                // Out of range subscripts are null
                TypeOrLoad::union(vec![array_item(array), Type::null().into()])
            }
            Expr::FieldAccess {
                expr: inner,
                field,
                span,
            } => {
                let value = self.infer_expr(inner, None);
                if let TypeOrLoad::Type(Type {
                    kind: TypeKind::Composite { attributes, .. },
                    ..
                }) = &value
                {
                    if let Some(attribute) = attributes.iter().find(|a| a.name == field.value) {
                        return attribute.ty.clone().into();
                    }
                }
                Load::CompositeAccess {
                    value: Box::new(value),
                    name: field.value.clone(),
                    span: *span,
                }
                .into()
            }
            Expr::Extract { expr: inner, .. } => {
                self.infer_expr(inner, Some(Type::date().into()));
                Type::number().with_postgres("numeric").into()
            }
            Expr::Current { kind, .. } => current_type(*kind).into(),
            Expr::Default { .. } => Type::unknown().into(),
        }
    }

    fn infer_binary(&mut self, left: &Expr, op: &str, right: &Expr, span: Span) -> TypeOrLoad {
        match op {
            "AND" | "OR" => {
                self.infer_expr(left, Some(Type::boolean().into()));
                self.infer_expr(right, Some(Type::boolean().into()));
                Type::boolean().into()
            }
            "AT TIME ZONE" => {
                self.infer_expr(left, None);
                self.infer_expr(right, Some(Type::string().into()));
                Type::date().with_postgres("timestamp").into()
            }
            _ if operators::is_comparison(op) => {
                self.infer_related(&[left, right], None);
                Type::boolean().into()
            }
            _ => self.infer_operator(left, op, right, span),
        }
    }

    /// Symbolic operators: a param operand takes the matching overload's
    /// operand type, the result is the overload's result
    fn infer_operator(&mut self, left: &Expr, op: &str, right: &Expr, span: Span) -> TypeOrLoad {
        let available = operators::variants(op);
        if available.is_empty() {
            tracing::trace!(op, "no overloads for operator");
            self.infer_expr(left, None);
            self.infer_expr(right, None);
            return Type::unknown().into();
        }

        let left_param = is_param(left);
        let right_param = is_param(right);
        let left_ty = if left_param {
            Type::unknown().into()
        } else {
            self.infer_expr(left, None)
        };
        let right_ty = if right_param {
            Type::unknown().into()
        } else {
            self.infer_expr(right, None)
        };

        if left_param {
            let ty = operator_part(op, &available, &left_ty, &right_ty, OperatorPart::Left, span);
            self.infer_expr(left, Some(ty));
        }
        if right_param {
            let ty = operator_part(op, &available, &left_ty, &right_ty, OperatorPart::Right, span);
            self.infer_expr(right, Some(ty));
        }

        operator_part(op, &available, &left_ty, &right_ty, OperatorPart::Result, span)
    }

    fn infer_cast(&mut self, inner: &Expr, data_type: &DataType, span: Span) -> TypeOrLoad {
        let target = cast_target(data_type, span);

        match inner.unnested() {
            Expr::Row { elements, .. } if target.is_deferred() => {
                for element in elements {
                    self.infer_expr(element, None);
                }
                return Load::Record {
                    schema: data_type.schema.clone(),
                    name: data_type.name.clone(),
                    span,
                }
                .into();
            }
            Expr::Literal {
                value: Literal::Null,
                ..
            } => return TypeOrLoad::union(vec![target, Type::null().into()]),
            param if is_param(param) => {
                self.infer_expr(param, Some(target.clone()));
                return target;
            }
            _ => {}
        }

        match (self.infer_expr(inner, None), target) {
            (TypeOrLoad::Type(value), TypeOrLoad::Type(cast)) => {
                cast.with_nullable(value.nullable).into()
            }
            (column, value) => Load::ColumnCast {
                column: Box::new(column),
                value: Box::new(value),
            }
            .into(),
        }
    }

    fn infer_window(&mut self, spec: &WindowSpec) {
        for expr in &spec.partition_by {
            self.infer_expr(expr, None);
        }
        for item in &spec.order_by {
            self.infer_expr(&item.expr, None);
        }
    }

    /// Builtins are typed here; every other function is a catalog lookup
    fn infer_function(&mut self, call: &FunctionCall, expected: Option<TypeOrLoad>) -> TypeOrLoad {
        let name = call.name.name_str().to_string();
        let schema = call.name.schema_str().map(str::to_string);
        let builtin_scope = schema.as_deref().map_or(true, |s| s == "pg_catalog");

        for item in &call.order_by {
            self.infer_expr(&item.expr, None);
        }
        if let Some(filter) = &call.filter {
            self.infer_expr(filter, Some(Type::boolean().into()));
        }
        if let Some(over) = &call.over {
            self.infer_window(over);
        }

        if builtin_scope && functions::COALESCE_LIKE.contains(&name.as_str()) {
            let refs: Vec<&Expr> = call.args.iter().collect();
            let args = self.infer_related(&refs, expected);
            return functions::builtin(BuiltinCall {
                name: &name,
                args,
                literals: Vec::new(),
                star: call.star,
            })
            .unwrap_or_else(|| Type::unknown().into());
        }

        // Param arguments are typed from the matched signature
        let args: Vec<TypeOrLoad> = call
            .args
            .iter()
            .map(|arg| {
                if is_param(arg) {
                    Type::any().into()
                } else {
                    self.infer_expr(arg, None)
                }
            })
            .collect();

        if builtin_scope {
            let literals = call.args.iter().map(string_literal).collect();
            if let Some(ty) = functions::builtin(BuiltinCall {
                name: &name,
                args: args.clone(),
                literals,
                star: call.star,
            }) {
                for arg in call.args.iter().filter(|arg| is_param(arg)) {
                    self.infer_expr(arg, None);
                }
                return ty;
            }
        }

        for (index, arg) in call.args.iter().enumerate() {
            if is_param(arg) {
                let ty = Load::FunctionArgument {
                    schema: schema.clone(),
                    name: name.clone(),
                    args: args.clone(),
                    index,
                    span: call.span,
                };
                self.infer_expr(arg, Some(ty.into()));
            }
        }

        Load::Function {
            schema,
            name,
            args,
            span: call.span,
        }
        .into()
    }
}

fn idents(idents: &[Ident]) -> Vec<String> {
    idents.iter().map(|ident| ident.value.clone()).collect()
}

fn is_param(expr: &Expr) -> bool {
    matches!(expr.unnested(), Expr::Param(_))
}

fn is_unnest(call: &FunctionCall) -> bool {
    call.name.schema.is_none() && call.name.name_str() == "unnest" && call.args.len() == 1
}

fn string_literal(expr: &Expr) -> Option<String> {
    match expr.unnested() {
        Expr::Literal {
            value: Literal::String(value),
            ..
        } => Some(value.clone()),
        _ => None,
    }
}

fn target_column(target: &str, column: &Ident) -> TypeOrLoad {
    Load::Column {
        schema: None,
        table: Some(target.to_string()),
        column: column.value.clone(),
        span: column.span,
    }
    .into()
}

/// `CTE (a, b)` and `AS alias (a, b)` rename result columns by position
fn rename_results(qi: &mut QueryInterface, columns: &[Ident]) {
    for (result, column) in qi.results.iter_mut().zip(columns) {
        if result.name != "*" {
            result.name = column.value.clone();
        }
    }
}

fn with_column_aliases(source: Source, columns: &[Ident]) -> Source {
    if columns.is_empty() {
        return source;
    }
    match source {
        Source::Query {
            name,
            mut query,
            is_result,
        } => {
            rename_results(&mut query, columns);
            Source::Query {
                name,
                query,
                is_result,
            }
        }
        Source::Values {
            name,
            types,
            is_result,
            ..
        } => Source::Values {
            name,
            columns: Some(idents(columns)),
            types,
            is_result,
        },
        table => table,
    }
}

fn literal_type(literal: &Literal) -> Type {
    match literal {
        Literal::Number(text) => match text.parse::<i64>() {
            Ok(value) if i32::try_from(value).is_ok() => Type::number().with_postgres("int4"),
            Ok(_) => Type::big_int().with_postgres("int8"),
            Err(_) => Type::string().with_postgres("numeric"),
        },
        Literal::String(_) => Type::string().with_postgres("text"),
        Literal::Boolean(_) => Type::boolean().with_postgres("bool"),
        Literal::Null => Type::null(),
    }
}

fn current_type(kind: CurrentKind) -> Type {
    match kind {
        CurrentKind::Date => Type::date().with_postgres("date"),
        CurrentKind::Time => Type::string().with_postgres("timetz"),
        CurrentKind::Timestamp => Type::date().with_postgres("timestamptz"),
        CurrentKind::LocalTime => Type::string().with_postgres("time"),
        CurrentKind::LocalTimestamp => Type::date().with_postgres("timestamp"),
        CurrentKind::User => Type::string().with_postgres("name"),
    }
}

/// Built-in types are concrete; anything else is an enum or composite to
/// look up
fn cast_target(data_type: &DataType, span: Span) -> TypeOrLoad {
    if let Some(ty) = pg_types::lookup(&data_type.pg_name()) {
        return ty.into();
    }

    let mut ty: TypeOrLoad = Load::Named {
        schema: data_type.schema.clone(),
        name: data_type.name.clone(),
        nullable: false,
        span,
    }
    .into();
    for _ in 0..data_type.array_dims {
        ty = Load::Array {
            items: Box::new(ty),
            nullable: false,
        }
        .into();
    }
    ty
}

fn array_of(item: TypeOrLoad) -> TypeOrLoad {
    match item {
        TypeOrLoad::Type(item) => Type::array(item).into(),
        deferred => Load::Array {
            items: Box::new(deferred),
            nullable: false,
        }
        .into(),
    }
}

fn array_item(array: TypeOrLoad) -> TypeOrLoad {
    match array {
        TypeOrLoad::Type(Type {
            kind: TypeKind::Array { items },
            ..
        }) => (*items).into(),
        TypeOrLoad::Type(Type {
            kind: TypeKind::Json,
            ..
        }) => Type::json().into(),
        TypeOrLoad::Type(_) => Type::unknown().into(),
        deferred => Load::ArrayItem {
            value: Box::new(deferred),
        }
        .into(),
    }
}

fn operator_part(
    op: &str,
    available: &[sqlinfer_core::OperatorVariant],
    left: &TypeOrLoad,
    right: &TypeOrLoad,
    part: OperatorPart,
    span: Span,
) -> TypeOrLoad {
    match (left, right) {
        (TypeOrLoad::Type(left), TypeOrLoad::Type(right)) => {
            operators::resolve_part(available, left, right, part).into()
        }
        _ => Load::Operator {
            op: op.to_string(),
            left: Box::new(left.clone()),
            right: Box::new(right.clone()),
            available: available.to_vec(),
            part,
            span,
        }
        .into(),
    }
}

/// The column name PostgreSQL gives an unaliased select item
pub fn result_name(expr: &Expr) -> String {
    match expr {
        Expr::Column { column, .. } => column.value.clone(),
        Expr::Function(call) => call.name.name.value.clone(),
        Expr::Cast {
            expr: inner,
            data_type,
            ..
        } => match result_name(inner) {
            name if name == UNNAMED_COLUMN => type_name(data_type),
            name => name,
        },
        Expr::TypedString { data_type, .. } => type_name(data_type),
        Expr::Literal {
            value: Literal::Boolean(_),
            ..
        } => "bool".to_string(),
        Expr::Row { .. } => "row".to_string(),
        Expr::Exists { .. } => "exists".to_string(),
        Expr::Array { .. } | Expr::ArraySubquery { .. } => "array".to_string(),
        Expr::Case { .. } => "case".to_string(),
        Expr::Subquery { query, .. } => match query.body.leftmost() {
            SetExpr::Select(select) => match select.items.first() {
                Some(SelectItem::Expr {
                    alias: Some(alias), ..
                }) => alias.value.clone(),
                Some(SelectItem::Expr { expr, .. }) => result_name(expr),
                _ => UNNAMED_COLUMN.to_string(),
            },
            _ => UNNAMED_COLUMN.to_string(),
        },
        Expr::Nested { expr: inner, .. } | Expr::Subscript { expr: inner, .. } => {
            result_name(inner)
        }
        Expr::FieldAccess { field, .. } => field.value.clone(),
        Expr::Extract { .. } => "extract".to_string(),
        Expr::Current { kind, .. } => match kind {
            CurrentKind::Date => "current_date",
            CurrentKind::Time => "current_time",
            CurrentKind::Timestamp => "current_timestamp",
            CurrentKind::LocalTime => "localtime",
            CurrentKind::LocalTimestamp => "localtimestamp",
            CurrentKind::User => "current_user",
        }
        .to_string(),
        _ => UNNAMED_COLUMN.to_string(),
    }
}

fn type_name(data_type: &DataType) -> String {
    pg_types::canonical_name(&data_type.name)
        .map(str::to_string)
        .unwrap_or_else(|| data_type.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn extract(sql: &str) -> QueryInterface {
        let statement = parse(sql).unwrap();
        to_query_interface(&statement, &[])
    }

    fn column(table: Option<&str>, name: &str) -> (Option<String>, String) {
        (table.map(str::to_string), name.to_string())
    }

    fn as_column(ty: &TypeOrLoad) -> (Option<String>, String) {
        match ty {
            TypeOrLoad::Load(Load::Column { table, column, .. }) => (table.clone(), column.clone()),
            other => panic!("Expected column load, got {:?}", other),
        }
    }

    fn concrete(ty: &TypeOrLoad) -> &Type {
        ty.as_type()
            .unwrap_or_else(|| panic!("Expected concrete type, got {:?}", ty))
    }

    #[test]
    fn select_columns_and_param() {
        let qi = extract("SELECT id, name AS n FROM users u WHERE u.id = $id");

        assert_eq!(qi.sources.len(), 1);
        assert_eq!(qi.sources[0].name(), "u");
        assert!(qi.sources[0].is_result());

        let names: Vec<_> = qi.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["id", "n"]);
        assert_eq!(as_column(&qi.results[0].ty), column(None, "id"));

        assert_eq!(qi.params.len(), 1);
        assert_eq!(qi.params[0].name, "id");
        assert_eq!(as_column(&qi.params[0].ty), column(Some("u"), "id"));
    }

    #[test]
    fn wildcards_are_stars() {
        let qi = extract("SELECT *, u.* FROM users u");
        assert!(matches!(
            &qi.results[0].ty,
            TypeOrLoad::Load(Load::Star { table: None, .. })
        ));
        assert!(matches!(
            &qi.results[1].ty,
            TypeOrLoad::Load(Load::Star { table: Some(t), .. }) if t == "u"
        ));
    }

    #[test]
    fn literal_types() {
        let qi = extract("SELECT 1, 3000000000, 1.5, 'a', true, NULL");
        let kinds: Vec<_> = qi
            .results
            .iter()
            .map(|r| concrete(&r.ty).kind.clone())
            .collect();
        assert_eq!(
            kinds,
            vec![
                TypeKind::Number,
                TypeKind::BigInt,
                TypeKind::String,
                TypeKind::String,
                TypeKind::Boolean,
                TypeKind::Null,
            ]
        );
        assert_eq!(qi.results[4].name, "bool");
        assert_eq!(qi.results[0].name, UNNAMED_COLUMN);
    }

    #[test]
    fn result_names() {
        let qi = extract(
            "SELECT count(*), name::text, 1::int, (SELECT title FROM posts), current_date, (u.address).city FROM users u",
        );
        let names: Vec<_> = qi.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["count", "name", "int4", "title", "current_date", "city"]
        );
    }

    #[test]
    fn params_typed_by_operators() {
        let qi = extract("SELECT $a + 1 AS total");
        assert_eq!(concrete(&qi.params[0].ty).kind, TypeKind::Number);
        assert_eq!(concrete(&qi.results[0].ty).kind, TypeKind::Number);

        let qi = extract("SELECT price * $factor FROM items");
        assert!(matches!(
            &qi.params[0].ty,
            TypeOrLoad::Load(Load::Operator {
                part: OperatorPart::Right,
                ..
            })
        ));
        assert!(matches!(
            &qi.results[0].ty,
            TypeOrLoad::Load(Load::Operator {
                part: OperatorPart::Result,
                ..
            })
        ));
    }

    #[test]
    fn params_in_predicates() {
        let qi = extract(
            "SELECT id FROM users WHERE active = $active AND name LIKE $pattern AND id IN ($a, $b) LIMIT $limit",
        );
        let names: Vec<_> = qi.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["active", "pattern", "a", "b", "limit"]);

        assert_eq!(as_column(&qi.params[0].ty), column(None, "active"));
        assert_eq!(concrete(&qi.params[1].ty).kind, TypeKind::String);
        assert_eq!(as_column(&qi.params[3].ty), column(None, "id"));
        assert_eq!(concrete(&qi.params[4].ty).kind, TypeKind::Number);
    }

    #[test]
    fn repeated_param_merges() {
        let qi = extract("SELECT id FROM users WHERE id = $id OR parent_id = $id");
        assert_eq!(qi.params.len(), 1);
        assert_eq!(qi.params[0].spans.len(), 2);
    }

    #[test]
    fn required_and_spread_params() {
        let qi = extract("SELECT id FROM users WHERE name = $name! AND id IN $$ids");
        assert!(qi.params[0].required);
        assert!(qi.params[1].spread);
        assert_eq!(as_column(&qi.params[1].ty), column(None, "id"));
    }

    #[test]
    fn function_params_use_the_signature() {
        let qi = extract("SELECT lower($name)");
        assert!(matches!(
            &qi.params[0].ty,
            TypeOrLoad::Load(Load::FunctionArgument { index: 0, .. })
        ));
        assert!(matches!(
            &qi.results[0].ty,
            TypeOrLoad::Load(Load::Function { name, .. }) if name == "lower"
        ));
    }

    #[test]
    fn coalesce_param_takes_the_other_argument() {
        let qi = extract("SELECT coalesce($x, 0) AS x");
        assert_eq!(concrete(&qi.params[0].ty).kind, TypeKind::Number);
        assert_eq!(concrete(&qi.results[0].ty).kind, TypeKind::Number);
    }

    #[test]
    fn cast_params_and_values() {
        let qi = extract("SELECT $x::int4 AS x, NULL::text AS t, id::text AS s FROM users");
        assert_eq!(concrete(&qi.params[0].ty).kind, TypeKind::Number);
        assert!(concrete(&qi.results[1].ty).nullable);
        assert!(matches!(
            &qi.results[2].ty,
            TypeOrLoad::Load(Load::ColumnCast { .. })
        ));

        let qi = extract("SELECT 'a'::mood AS m");
        assert!(matches!(
            &qi.results[0].ty,
            TypeOrLoad::Load(Load::ColumnCast { value, .. })
                if matches!(**value, TypeOrLoad::Load(Load::Named { .. }))
        ));
    }

    #[test]
    fn subqueries_get_their_own_scope() {
        let qi = extract(
            "SELECT id, (SELECT count(*) FROM orders o WHERE o.user_id = u.id AND o.total > $min) AS orders
             FROM users u
             WHERE EXISTS (SELECT 1 FROM bans b WHERE b.user_id = u.id)",
        );

        assert_eq!(qi.sources.len(), 3);
        assert!(qi.sources[0].is_result());
        assert!(!qi.sources[1].is_result());
        assert!(!qi.sources[2].is_result());

        // Params of a subquery belong to its own interface
        assert!(qi.params.is_empty());
        match &qi.sources[1] {
            Source::Query { query, .. } => assert_eq!(query.params[0].name, "min"),
            other => panic!("Expected nested query, got {:?}", other),
        }

        assert!(matches!(&qi.results[1].ty, TypeOrLoad::Load(Load::Union { .. })));
    }

    #[test]
    fn ctes_are_named_queries() {
        let qi = extract(
            "WITH active (uid) AS (SELECT id FROM users WHERE active = $active)
             SELECT a.uid FROM active a",
        );
        assert_eq!(qi.sources.len(), 1);
        match &qi.sources[0] {
            Source::Query {
                name,
                query,
                is_result,
            } => {
                assert_eq!(name, "a");
                assert!(*is_result);
                assert_eq!(query.results[0].name, "uid");
                assert_eq!(query.params[0].name, "active");
            }
            other => panic!("Expected named query, got {:?}", other),
        }
    }

    #[test]
    fn unreferenced_cte_keeps_its_params() {
        let qi = extract(
            "WITH archived AS (DELETE FROM posts WHERE id = $id RETURNING id)
             SELECT 1 AS one",
        );
        assert_eq!(qi.sources.len(), 1);
        assert!(!qi.sources[0].is_result());
        assert_eq!(qi.sources[0].name(), "archived");
    }

    #[test]
    fn cte_used_in_subquery_is_not_duplicated() {
        let qi = extract(
            "WITH ids AS (SELECT id FROM users)
             SELECT name FROM accounts WHERE user_id IN (SELECT id FROM ids)",
        );
        assert!(qi.sources.iter().all(|source| source.name() != "ids"));
    }

    #[test]
    fn recursive_cte_sees_itself() {
        let qi = extract(
            "WITH RECURSIVE tree (id, depth) AS (
                SELECT id, 0 FROM nodes WHERE parent_id IS NULL
                UNION ALL
                SELECT n.id, t.depth + 1 FROM nodes n JOIN tree t ON n.parent_id = t.id
             )
             SELECT id, depth FROM tree",
        );
        let Source::Query { query, .. } = &qi.sources[0] else {
            panic!("Expected named query");
        };
        let Source::Query { query: branch, .. } = &query.sources[1] else {
            panic!("Expected recursive branch");
        };
        assert!(branch
            .sources
            .iter()
            .any(|source| source.name() == "t" && source.is_named_query()));
    }

    #[test]
    fn outer_joins_are_nullable() {
        let qi = extract(
            "SELECT u.id, p.title FROM users u LEFT JOIN posts p ON p.user_id = u.id RIGHT JOIN teams t ON t.id = u.team_id",
        );
        assert!(qi.is_nullable("p"));
        assert!(qi.is_nullable("u"));
        assert!(!qi.is_nullable("t"));
    }

    #[test]
    fn from_functions_and_values() {
        let qi = extract(
            "SELECT tag, v.n FROM posts p, unnest(p.tags) AS tag, (VALUES (1), (2)) AS v (n)",
        );
        match &qi.sources[1] {
            Source::Values { name, types, .. } => {
                assert_eq!(name, "tag");
                assert!(matches!(&types[0], TypeOrLoad::Load(Load::ArrayItem { .. })));
            }
            other => panic!("Expected values source, got {:?}", other),
        }
        match &qi.sources[2] {
            Source::Query { query, .. } => assert_eq!(query.results[0].name, "n"),
            other => panic!("Expected derived query, got {:?}", other),
        }
    }

    #[test]
    fn insert_values_take_column_types() {
        let qi = extract("INSERT INTO users (name, email) VALUES ($name, $email) RETURNING id");
        assert_eq!(as_column(&qi.params[0].ty), column(Some("users"), "name"));
        assert_eq!(as_column(&qi.params[1].ty), column(Some("users"), "email"));
        assert_eq!(qi.results[0].name, "id");
    }

    #[test]
    fn insert_spread_rows() {
        let qi = extract("INSERT INTO t (a, b) VALUES $$rows(a, b)");
        let param = &qi.params[0];
        assert!(param.spread);
        assert_eq!(param.pick, vec!["a", "b"]);
        match &param.ty {
            TypeOrLoad::Load(Load::ObjectLiteral { items, .. }) => {
                assert_eq!(items.len(), 2);
                assert_eq!(as_column(&items[1].ty), column(Some("t"), "b"));
            }
            other => panic!("Expected object literal, got {:?}", other),
        }
    }

    #[test]
    fn insert_on_conflict_uses_excluded() {
        let qi = extract(
            "INSERT INTO counters (key, hits) VALUES ($key, 1)
             ON CONFLICT (key) DO UPDATE SET hits = counters.hits + excluded.hits",
        );
        assert!(qi
            .sources
            .iter()
            .any(|source| source.name() == "excluded" && !source.is_result()));
    }

    #[test]
    fn update_and_delete() {
        let qi = extract(
            "UPDATE users u SET name = $name, (a, b) = ($a, $b) FROM teams t WHERE t.id = u.team_id RETURNING u.id",
        );
        assert!(qi.sources[0].is_result());
        assert!(!qi.sources[1].is_result());
        assert_eq!(as_column(&qi.params[0].ty), column(Some("u"), "name"));
        assert_eq!(as_column(&qi.params[2].ty), column(Some("u"), "b"));

        let qi = extract("DELETE FROM posts USING users WHERE users.id = posts.user_id AND users.name = $name");
        assert_eq!(qi.sources.len(), 2);
        assert!(!qi.sources[1].is_result());
        assert!(qi.results.is_empty());
    }

    #[test]
    fn set_operations_take_the_first_branch() {
        let qi = extract("SELECT id FROM a UNION SELECT id FROM b WHERE x = $x");
        assert_eq!(qi.results.len(), 1);
        assert_eq!(qi.sources.len(), 2);
        assert!(!qi.sources[1].is_result());
    }

    #[test]
    fn any_array_param() {
        let qi = extract("SELECT id FROM users WHERE id = ANY($ids)");
        assert!(matches!(&qi.params[0].ty, TypeOrLoad::Load(Load::Array { .. })));
    }

    #[test]
    fn transactions_are_empty() {
        let qi = extract("BEGIN");
        assert_eq!(qi, QueryInterface::default());
    }
}
