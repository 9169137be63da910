//! Query grammar: `WITH`, set operations, `SELECT`, `FROM` and `VALUES`

use super::dml::{delete, insert, update};
use super::expr::{expr, function_call, window_spec};
use super::{alias, ident, ident_list, object_name, order_by, select_item};
use crate::ast::{
    Cte, CteBody, Distinct, Expr, Join, JoinConstraint, JoinKind, Locking, NamedWindow, Query,
    Select, SelectClause, SetExpr, SetOperator, TableAlias, TableFactor, TableWithJoins, Values,
    With,
};
use crate::combinator::{Cursor, PResult};

/// `[WITH ...] body [ORDER BY] [LIMIT] [OFFSET] [FETCH] [FOR UPDATE ...]`
pub fn query(c: &mut Cursor) -> PResult<Query> {
    c.nested(query_inner)
}

fn query_inner(c: &mut Cursor) -> PResult<Query> {
    let start = c.begin();
    let with = c.optional(with_clause);
    let body = set_expr(c)?;
    let order_by = c.optional(order_by).unwrap_or_default();

    let mut limit = None;
    let mut offset = None;
    for _ in 0..3 {
        if limit.is_none() {
            if let Ok(value) = c.attempt(limit_clause) {
                limit = value;
                continue;
            }
        }
        if offset.is_none() {
            if let Ok(value) = c.attempt(offset_clause) {
                offset = Some(value);
                continue;
            }
        }
        break;
    }

    let locking = c.star(locking_clause);

    Ok(Query {
        with,
        body,
        order_by,
        limit,
        offset,
        locking,
        span: c.span_from(start),
    })
}

/// `LIMIT n`, `LIMIT ALL` or `FETCH FIRST n ROWS ONLY`
fn limit_clause(c: &mut Cursor) -> PResult<Option<Expr>> {
    if c.keyword("LIMIT").is_ok() {
        if c.keyword("ALL").is_ok() {
            return Ok(None);
        }
        return expr(c).map(Some);
    }

    c.keyword("FETCH")?;
    c.one_of_keywords(&["FIRST", "NEXT"])?;
    let count = c.optional(expr);
    c.one_of_keywords(&["ROWS", "ROW"])?;
    c.one_of_keywords(&["ONLY"])
        .or_else(|_| c.keywords(&["WITH", "TIES"]).map(|span| ("WITH TIES", span)))?;
    Ok(count)
}

fn offset_clause(c: &mut Cursor) -> PResult<Expr> {
    c.keyword("OFFSET")?;
    let value = expr(c)?;
    let _ = c.one_of_keywords(&["ROWS", "ROW"]);
    Ok(value)
}

fn locking_clause(c: &mut Cursor) -> PResult<Locking> {
    let start = c.begin();
    c.keyword("FOR")?;
    let strength = if c.keyword("UPDATE").is_ok() {
        "UPDATE"
    } else if c.keywords(&["NO", "KEY", "UPDATE"]).is_ok() {
        "NO KEY UPDATE"
    } else if c.keyword("SHARE").is_ok() {
        "SHARE"
    } else {
        c.keywords(&["KEY", "SHARE"])?;
        "KEY SHARE"
    };
    let of = c
        .attempt(|c| {
            c.keyword("OF")?;
            c.separated(",", object_name)
        })
        .unwrap_or_default();
    let _ = c.keyword("NOWAIT").or_else(|_| c.keywords(&["SKIP", "LOCKED"]));
    Ok(Locking {
        strength: strength.to_string(),
        of,
        span: c.span_from(start),
    })
}

/// `UNION`/`EXCEPT` over `INTERSECT`, which binds tighter
fn set_expr(c: &mut Cursor) -> PResult<SetExpr> {
    let start = c.begin();
    let mut left = intersect_expr(c)?;
    loop {
        let step = c.attempt(|c| {
            let (kw, _) = c.one_of_keywords(&["UNION", "EXCEPT"])?;
            let all = set_quantifier(c);
            let right = intersect_expr(c)?;
            Ok((kw, all, right))
        });
        let Ok((kw, all, right)) = step else {
            break;
        };
        left = SetExpr::Operation {
            op: if kw == "UNION" {
                SetOperator::Union
            } else {
                SetOperator::Except
            },
            all,
            left: Box::new(left),
            right: Box::new(right),
            span: c.span_from(start),
        };
    }
    Ok(left)
}

fn intersect_expr(c: &mut Cursor) -> PResult<SetExpr> {
    let start = c.begin();
    let mut left = set_term(c)?;
    loop {
        let step = c.attempt(|c| {
            c.keyword("INTERSECT")?;
            let all = set_quantifier(c);
            set_term(c).map(|right| (all, right))
        });
        let Ok((all, right)) = step else {
            break;
        };
        left = SetExpr::Operation {
            op: SetOperator::Intersect,
            all,
            left: Box::new(left),
            right: Box::new(right),
            span: c.span_from(start),
        };
    }
    Ok(left)
}

fn set_quantifier(c: &mut Cursor) -> bool {
    match c.one_of_keywords(&["ALL", "DISTINCT"]) {
        Ok((kw, _)) => kw == "ALL",
        Err(_) => false,
    }
}

fn set_term(c: &mut Cursor) -> PResult<SetExpr> {
    if let Ok(select) = c.attempt(select) {
        return Ok(SetExpr::Select(Box::new(select)));
    }
    if let Ok(values) = c.attempt(values) {
        return Ok(SetExpr::Values(values));
    }
    c.punct("(")?;
    let nested = query(c)?;
    c.punct(")")?;
    Ok(SetExpr::Nested(Box::new(nested)))
}

/// `VALUES (a, b), (c, d)`
pub fn values(c: &mut Cursor) -> PResult<Values> {
    let start = c.begin();
    c.keyword("VALUES")?;
    let rows = c.separated(",", |c| {
        c.punct("(")?;
        let row = c.separated(",", expr)?;
        c.punct(")")?;
        Ok(row)
    })?;
    Ok(Values {
        rows,
        span: c.span_from(start),
    })
}

fn select(c: &mut Cursor) -> PResult<Select> {
    let start = c.begin();
    c.keyword("SELECT")?;

    let distinct = if c.keyword("ALL").is_ok() {
        Some(Distinct::All)
    } else if c.keyword("DISTINCT").is_ok() {
        let on = c.attempt(|c| {
            c.keyword("ON")?;
            c.punct("(")?;
            let exprs = c.separated(",", expr)?;
            c.punct(")")?;
            Ok(exprs)
        });
        Some(match on {
            Ok(exprs) => Distinct::On(exprs),
            Err(_) => Distinct::Distinct,
        })
    } else {
        None
    };

    let items = c
        .optional(|c| c.separated(",", select_item))
        .unwrap_or_default();

    let mut clauses = Vec::new();
    if c.keyword("FROM").is_ok() {
        clauses.push(SelectClause::From(from_list(c)?));
    }
    if c.keyword("WHERE").is_ok() {
        clauses.push(SelectClause::Where(expr(c)?));
    }
    if c.keywords(&["GROUP", "BY"]).is_ok() {
        let _ = set_quantifier(c);
        clauses.push(SelectClause::GroupBy(c.separated(",", group_item)?));
    }
    if c.keyword("HAVING").is_ok() {
        clauses.push(SelectClause::Having(expr(c)?));
    }
    if c.keyword("WINDOW").is_ok() {
        let windows = c.separated(",", |c| {
            let name = ident(c)?;
            c.keyword("AS")?;
            c.punct("(")?;
            let spec = window_spec(c)?;
            c.punct(")")?;
            Ok(NamedWindow { name, spec })
        })?;
        clauses.push(SelectClause::Window(windows));
    }

    Ok(Select {
        distinct,
        items,
        clauses,
        span: c.span_from(start),
    })
}

/// A grouping element; `()` is the empty grouping set
fn group_item(c: &mut Cursor) -> PResult<Expr> {
    let start = c.begin();
    if c.attempt(|c| {
        c.punct("(")?;
        c.punct(")")
    })
    .is_ok()
    {
        return Ok(Expr::Row {
            elements: Vec::new(),
            span: c.span_from(start),
        });
    }
    expr(c)
}

/// Comma separated `FROM` items
pub(crate) fn from_list(c: &mut Cursor) -> PResult<Vec<TableWithJoins>> {
    c.separated(",", table_with_joins)
}

fn table_with_joins(c: &mut Cursor) -> PResult<TableWithJoins> {
    let relation = table_factor(c)?;
    let joins = c.star(join);
    Ok(TableWithJoins { relation, joins })
}

fn join_kind(c: &mut Cursor) -> PResult<JoinKind> {
    if c.keywords(&["CROSS", "JOIN"]).is_ok() {
        return Ok(JoinKind::Cross);
    }
    for (kw, kind) in [
        ("LEFT", JoinKind::Left),
        ("RIGHT", JoinKind::Right),
        ("FULL", JoinKind::Full),
    ] {
        let matched = c.attempt(|c| {
            c.keyword(kw)?;
            let _ = c.keyword("OUTER");
            c.keyword("JOIN")
        });
        if matched.is_ok() {
            return Ok(kind);
        }
    }
    let _ = c.keyword("INNER");
    c.keyword("JOIN")?;
    Ok(JoinKind::Inner)
}

fn join(c: &mut Cursor) -> PResult<Join> {
    let start = c.begin();
    let natural = c.keyword("NATURAL").is_ok();
    let kind = join_kind(c)?;
    let relation = table_factor(c)?;

    let constraint = if natural {
        JoinConstraint::Natural
    } else if kind == JoinKind::Cross {
        JoinConstraint::None
    } else if c.keyword("ON").is_ok() {
        JoinConstraint::On(expr(c)?)
    } else if c.keyword("USING").is_ok() {
        JoinConstraint::Using(ident_list(c)?)
    } else {
        JoinConstraint::None
    };

    Ok(Join {
        kind,
        relation,
        constraint,
        span: c.span_from(start),
    })
}

/// `[AS] name [(col, ...)]`
fn table_alias(c: &mut Cursor) -> PResult<TableAlias> {
    let name = alias(c)?;
    let columns = c.optional(ident_list).unwrap_or_default();
    Ok(TableAlias { name, columns })
}

fn table_factor(c: &mut Cursor) -> PResult<TableFactor> {
    let start = c.begin();
    let lateral = c.keyword("LATERAL").is_ok();

    let derived = c.attempt(|c| {
        c.punct("(")?;
        let subquery = query(c)?;
        c.punct(")")?;
        Ok(subquery)
    });
    if let Ok(subquery) = derived {
        let alias = c.optional(table_alias);
        return Ok(TableFactor::Derived {
            lateral,
            subquery: Box::new(subquery),
            alias,
            span: c.span_from(start),
        });
    }

    if let Ok(call) = c.attempt(function_call) {
        let _ = c.keywords(&["WITH", "ORDINALITY"]);
        let alias = c.optional(table_alias);
        return Ok(TableFactor::Function {
            lateral,
            call,
            alias,
            span: c.span_from(start),
        });
    }

    if lateral {
        return c.fail("subquery or function");
    }

    let nested = c.attempt(|c| {
        c.punct("(")?;
        let table = table_with_joins(c)?;
        c.punct(")")?;
        Ok(table)
    });
    if let Ok(table) = nested {
        let alias = c.optional(table_alias);
        return Ok(TableFactor::Nested {
            table: Box::new(table),
            alias,
            span: c.span_from(start),
        });
    }

    let _ = c.keyword("ONLY");
    let name = object_name(c)?;
    let _ = c.punct("*");
    let alias = c.optional(table_alias);
    Ok(TableFactor::Table {
        name,
        alias,
        span: c.span_from(start),
    })
}

/// `WITH [RECURSIVE] name [(cols)] AS [[NOT] MATERIALIZED] (body), ...`
pub fn with_clause(c: &mut Cursor) -> PResult<With> {
    let start = c.begin();
    c.keyword("WITH")?;
    let recursive = c.keyword("RECURSIVE").is_ok();
    let ctes = c.separated(",", cte)?;
    Ok(With {
        recursive,
        ctes,
        span: c.span_from(start),
    })
}

fn cte(c: &mut Cursor) -> PResult<Cte> {
    let start = c.begin();
    let name = ident(c)?;
    let columns = c.optional(ident_list).unwrap_or_default();
    c.keyword("AS")?;
    let _ = c.keywords(&["NOT", "MATERIALIZED"]).or_else(|_| c.keyword("MATERIALIZED"));
    c.punct("(")?;
    let body = cte_body(c)?;
    c.punct(")")?;
    Ok(Cte {
        name,
        columns,
        body,
        span: c.span_from(start),
    })
}

fn cte_body(c: &mut Cursor) -> PResult<CteBody> {
    if let Ok(insert) = c.attempt(insert) {
        return Ok(CteBody::Insert(Box::new(insert)));
    }
    if let Ok(update) = c.attempt(update) {
        return Ok(CteBody::Update(Box::new(update)));
    }
    if let Ok(delete) = c.attempt(delete) {
        return Ok(CteBody::Delete(Box::new(delete)));
    }

    let body = query(c)?;
    let bare = body.with.is_none()
        && body.order_by.is_empty()
        && body.limit.is_none()
        && body.offset.is_none();
    match body.body {
        SetExpr::Values(values) if bare => Ok(CteBody::Values(values)),
        _ => Ok(CteBody::Query(Box::new(body))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_query(sql: &str) -> Query {
        let mut c = Cursor::new(sql);
        let parsed = query(&mut c).unwrap();
        assert!(c.at_end(), "trailing input in {:?}", sql);
        parsed
    }

    fn as_select(query: &Query) -> &Select {
        match &query.body {
            SetExpr::Select(select) => select,
            other => panic!("Expected select, got {:?}", other),
        }
    }

    #[test]
    fn select_clauses_in_order() {
        let parsed = parse_query(
            "SELECT DISTINCT ON (a) a, b AS total FROM t WHERE a > 1 GROUP BY a HAVING count(*) > 1 ORDER BY a DESC LIMIT 10 OFFSET 5",
        );
        let select = as_select(&parsed);
        assert!(matches!(select.distinct, Some(Distinct::On(_))));
        assert_eq!(select.items.len(), 2);
        assert_eq!(select.clauses.len(), 4);
        assert!(parsed.order_by[0].descending);
        assert!(parsed.limit.is_some());
        assert!(parsed.offset.is_some());
    }

    #[test]
    fn joins() {
        let parsed = parse_query(
            "SELECT * FROM a JOIN b ON a.x = b.x LEFT OUTER JOIN c USING (id) CROSS JOIN d NATURAL JOIN e",
        );
        let from = as_select(&parsed).from();
        let kinds: Vec<JoinKind> = from[0].joins.iter().map(|join| join.kind).collect();
        assert_eq!(
            kinds,
            vec![
                JoinKind::Inner,
                JoinKind::Left,
                JoinKind::Cross,
                JoinKind::Inner
            ]
        );
        assert!(matches!(from[0].joins[3].constraint, JoinConstraint::Natural));
    }

    #[test]
    fn from_items() {
        let parsed = parse_query(
            "SELECT * FROM public.users u, (SELECT 1) AS sub(x), LATERAL unnest(u.tags) AS tag, generate_series(1, 3) g",
        );
        let from = as_select(&parsed).from();
        assert_eq!(from.len(), 4);
        assert!(matches!(from[0].relation, TableFactor::Table { .. }));
        assert!(matches!(from[1].relation, TableFactor::Derived { .. }));
        assert!(matches!(
            from[2].relation,
            TableFactor::Function { lateral: true, .. }
        ));
        assert!(matches!(from[3].relation, TableFactor::Function { .. }));
    }

    #[test]
    fn set_operations() {
        let parsed = parse_query("SELECT 1 UNION ALL SELECT 2 INTERSECT SELECT 3");
        match parsed.body {
            SetExpr::Operation { op, all, right, .. } => {
                assert_eq!(op, SetOperator::Union);
                assert!(all);
                assert!(matches!(
                    *right,
                    SetExpr::Operation {
                        op: SetOperator::Intersect,
                        ..
                    }
                ));
            }
            other => panic!("Expected set operation, got {:?}", other),
        }
    }

    #[test]
    fn ctes() {
        let parsed = parse_query(
            "WITH RECURSIVE v(a, b) AS (VALUES (1, 2)), q AS MATERIALIZED (SELECT a FROM v) SELECT * FROM q",
        );
        let with = parsed.with.unwrap();
        assert!(with.recursive);
        assert_eq!(with.ctes.len(), 2);
        assert!(matches!(with.ctes[0].body, CteBody::Values(_)));
        assert_eq!(with.ctes[0].columns.len(), 2);
        assert!(matches!(with.ctes[1].body, CteBody::Query(_)));
    }

    #[test]
    fn locking_and_fetch() {
        let parsed = parse_query("SELECT id FROM t FETCH FIRST 5 ROWS ONLY FOR UPDATE SKIP LOCKED");
        assert!(parsed.limit.is_some());
        assert_eq!(parsed.locking[0].strength, "UPDATE");
    }
}
