//! Statement grammar: `INSERT`, `UPDATE`, `DELETE` and transaction control

use super::expr::expr;
use super::query::{from_list, query, values, with_clause};
use super::{alias, ident, ident_list, object_name, param_ref, returning};
use crate::ast::{
    Assignment, ConflictAction, ConflictTarget, Delete, Expr, Ident, Insert, InsertSource,
    OnConflict, Statement, Transaction, TransactionKind, Update, With,
};
use crate::combinator::{Cursor, PResult};

/// Any supported statement
pub fn statement(c: &mut Cursor) -> PResult<Statement> {
    if let Ok(transaction) = c.attempt(transaction) {
        return Ok(Statement::Transaction(transaction));
    }

    let start = c.begin();
    let with = c.optional(with_clause);

    if c.peek_keyword("INSERT") {
        return insert_body(c, start, with).map(|insert| Statement::Insert(Box::new(insert)));
    }
    if c.peek_keyword("UPDATE") {
        return update_body(c, start, with).map(|update| Statement::Update(Box::new(update)));
    }
    if c.peek_keyword("DELETE") {
        return delete_body(c, start, with).map(|delete| Statement::Delete(Box::new(delete)));
    }

    // The WITH clause is part of the query node
    c.reset(start);
    query(c).map(|query| Statement::Query(Box::new(query)))
}

/// `[WITH ...] INSERT INTO ...`
pub fn insert(c: &mut Cursor) -> PResult<Insert> {
    let start = c.begin();
    let with = c.optional(with_clause);
    insert_body(c, start, with)
}

/// `[WITH ...] UPDATE ...`
pub fn update(c: &mut Cursor) -> PResult<Update> {
    let start = c.begin();
    let with = c.optional(with_clause);
    update_body(c, start, with)
}

/// `[WITH ...] DELETE FROM ...`
pub fn delete(c: &mut Cursor) -> PResult<Delete> {
    let start = c.begin();
    let with = c.optional(with_clause);
    delete_body(c, start, with)
}

fn insert_body(c: &mut Cursor, start: usize, with: Option<With>) -> PResult<Insert> {
    c.keywords(&["INSERT", "INTO"])?;
    let table = object_name(c)?;
    let alias = c
        .attempt(|c| {
            c.keyword("AS")?;
            ident(c)
        })
        .ok();
    let columns = c.optional(ident_list).unwrap_or_default();

    let source = insert_source(c)?;
    let on_conflict = c.optional(on_conflict);
    let returning = returning(c)?;

    Ok(Insert {
        with,
        table,
        alias,
        columns,
        source,
        on_conflict,
        returning,
        span: c.span_from(start),
    })
}

fn insert_source(c: &mut Cursor) -> PResult<InsertSource> {
    if c.keywords(&["DEFAULT", "VALUES"]).is_ok() {
        return Ok(InsertSource::DefaultValues);
    }

    let spread = c.attempt(|c| {
        c.keyword("VALUES")?;
        let param = param_ref(c)?;
        if param.spread {
            Ok(param)
        } else {
            c.fail("spread parameter")
        }
    });
    if let Ok(param) = spread {
        return Ok(InsertSource::Param(param));
    }

    // Plain VALUES lists keep their own node; anything longer is a query
    let rows = c.attempt(|c| {
        let rows = values(c)?;
        let done = c.peek_keyword("ON")
            || c.peek_keyword("RETURNING")
            || c.peek_punct(")")
            || c.peek_punct(";")
            || c.at_end();
        if done {
            Ok(rows)
        } else {
            c.fail("ON CONFLICT or RETURNING")
        }
    });
    if let Ok(rows) = rows {
        return Ok(InsertSource::Values(rows));
    }

    query(c).map(|query| InsertSource::Query(Box::new(query)))
}

fn on_conflict(c: &mut Cursor) -> PResult<OnConflict> {
    let start = c.begin();
    c.keywords(&["ON", "CONFLICT"])?;

    let target = if let Ok(columns) = c.attempt(ident_list) {
        let _ = c.attempt(|c| {
            c.keyword("WHERE")?;
            expr(c)
        });
        Some(ConflictTarget::Columns(columns))
    } else if c.keywords(&["ON", "CONSTRAINT"]).is_ok() {
        Some(ConflictTarget::Constraint(ident(c)?))
    } else {
        None
    };

    c.keyword("DO")?;
    let action = if c.keyword("NOTHING").is_ok() {
        ConflictAction::Nothing
    } else {
        c.keywords(&["UPDATE", "SET"])?;
        let assignments = c.separated(",", assignment)?;
        let selection = where_clause(c)?;
        ConflictAction::Update {
            assignments,
            selection,
        }
    };

    Ok(OnConflict {
        target,
        action,
        span: c.span_from(start),
    })
}

/// `col = value`, `(a, b) = (x, y)` or `(a, b) = ROW(x, y)`
fn assignment(c: &mut Cursor) -> PResult<Assignment> {
    let start = c.begin();
    let columns = match c.attempt(ident_list) {
        Ok(columns) => columns,
        Err(_) => vec![assignment_target(c)?],
    };
    c.symbol("=")?;
    let value = expr(c)?;
    Ok(Assignment {
        columns,
        value,
        span: c.span_from(start),
    })
}

/// A target column; a `table.` qualifier is allowed and dropped
fn assignment_target(c: &mut Cursor) -> PResult<Ident> {
    let first = ident(c)?;
    let qualified = c.attempt(|c| {
        c.punct(".")?;
        ident(c)
    });
    Ok(qualified.unwrap_or(first))
}

fn where_clause(c: &mut Cursor) -> PResult<Option<Expr>> {
    if c.keyword("WHERE").is_err() {
        return Ok(None);
    }
    expr(c).map(Some)
}

/// Table alias for `UPDATE`/`DELETE`: never a keyword that starts the next clause
fn target_alias(c: &mut Cursor, next: &'static str) -> Option<Ident> {
    c.attempt(|c| {
        let name = alias(c)?;
        if name.quoted || !name.value.eq_ignore_ascii_case(next) {
            Ok(name)
        } else {
            c.fail("alias")
        }
    })
    .ok()
}

fn update_body(c: &mut Cursor, start: usize, with: Option<With>) -> PResult<Update> {
    c.keyword("UPDATE")?;
    let _ = c.keyword("ONLY");
    let table = object_name(c)?;
    let _ = c.punct("*");
    let alias = target_alias(c, "set");
    c.keyword("SET")?;
    let assignments = c.separated(",", assignment)?;
    let from = if c.keyword("FROM").is_ok() {
        from_list(c)?
    } else {
        Vec::new()
    };
    let selection = where_clause(c)?;
    let returning = returning(c)?;

    Ok(Update {
        with,
        table,
        alias,
        assignments,
        from,
        selection,
        returning,
        span: c.span_from(start),
    })
}

fn delete_body(c: &mut Cursor, start: usize, with: Option<With>) -> PResult<Delete> {
    c.keywords(&["DELETE", "FROM"])?;
    let _ = c.keyword("ONLY");
    let table = object_name(c)?;
    let _ = c.punct("*");
    let alias = target_alias(c, "using");
    let using = if c.keyword("USING").is_ok() {
        from_list(c)?
    } else {
        Vec::new()
    };
    let selection = where_clause(c)?;
    let returning = returning(c)?;

    Ok(Delete {
        with,
        table,
        alias,
        using,
        selection,
        returning,
        span: c.span_from(start),
    })
}

/// `BEGIN`, `COMMIT`, `ROLLBACK [TO SAVEPOINT name]`, `SAVEPOINT name`, `RELEASE name`
pub fn transaction(c: &mut Cursor) -> PResult<Transaction> {
    let start = c.begin();
    let kind = if c.keyword("BEGIN").is_ok() || c.keywords(&["START", "TRANSACTION"]).is_ok() {
        let _ = c.one_of_keywords(&["TRANSACTION", "WORK"]);
        transaction_modes(c);
        TransactionKind::Begin
    } else if c.keyword("COMMIT").is_ok() || c.keyword("END").is_ok() {
        let _ = c.one_of_keywords(&["TRANSACTION", "WORK"]);
        TransactionKind::Commit
    } else if c.keyword("ROLLBACK").is_ok() || c.keyword("ABORT").is_ok() {
        let _ = c.one_of_keywords(&["TRANSACTION", "WORK"]);
        let savepoint = c
            .attempt(|c| {
                c.keyword("TO")?;
                let _ = c.keyword("SAVEPOINT");
                ident(c)
            })
            .ok();
        TransactionKind::Rollback { savepoint }
    } else if c.keyword("SAVEPOINT").is_ok() {
        TransactionKind::Savepoint(ident(c)?)
    } else if c.keyword("RELEASE").is_ok() {
        let _ = c.keyword("SAVEPOINT");
        TransactionKind::Release(ident(c)?)
    } else {
        return c.fail("statement");
    };

    Ok(Transaction {
        kind,
        span: c.span_from(start),
    })
}

/// `ISOLATION LEVEL ...`, `READ WRITE`, `READ ONLY`, `[NOT] DEFERRABLE`
fn transaction_modes(c: &mut Cursor) {
    loop {
        let matched = c.attempt(|c| {
            if c.keywords(&["ISOLATION", "LEVEL"]).is_ok() {
                let levels: [&[&'static str]; 4] = [
                    &["SERIALIZABLE"],
                    &["REPEATABLE", "READ"],
                    &["READ", "COMMITTED"],
                    &["READ", "UNCOMMITTED"],
                ];
                for level in levels {
                    if c.keywords(level).is_ok() {
                        return Ok(());
                    }
                }
                return c.fail("isolation level");
            }
            if c.keyword("READ").is_ok() {
                return c.one_of_keywords(&["WRITE", "ONLY"]).map(|_| ());
            }
            let _ = c.keyword("NOT");
            c.keyword("DEFERRABLE").map(|_| ())
        });
        if matched.is_err() {
            break;
        }
        let _ = c.punct(",");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(sql: &str) -> Statement {
        let mut c = Cursor::new(sql);
        let parsed = statement(&mut c).unwrap();
        assert!(c.at_end(), "trailing input in {:?}", sql);
        parsed
    }

    #[test]
    fn insert_forms() {
        let Statement::Insert(insert) = parse(
            "INSERT INTO users (name, email) VALUES ($name, $email) ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name RETURNING id",
        ) else {
            panic!("Expected insert");
        };
        assert_eq!(insert.columns.len(), 2);
        assert!(matches!(insert.source, InsertSource::Values(_)));
        assert!(matches!(
            insert.on_conflict.as_ref().map(|conflict| &conflict.action),
            Some(ConflictAction::Update { .. })
        ));
        assert_eq!(insert.returning.len(), 1);

        let Statement::Insert(insert) =
            parse("INSERT INTO users (name, email) VALUES $$rows(name, email)")
        else {
            panic!("Expected insert");
        };
        match &insert.source {
            InsertSource::Param(param) => {
                assert_eq!(param.name, "rows");
                assert_eq!(param.pick.len(), 2);
            }
            other => panic!("Expected spread param, got {:?}", other),
        }

        let Statement::Insert(insert) = parse("INSERT INTO audit SELECT * FROM users")
        else {
            panic!("Expected insert");
        };
        assert!(matches!(insert.source, InsertSource::Query(_)));

        let Statement::Insert(insert) = parse("INSERT INTO audit DEFAULT VALUES") else {
            panic!("Expected insert");
        };
        assert!(matches!(insert.source, InsertSource::DefaultValues));
    }

    #[test]
    fn update_with_alias_and_from() {
        let Statement::Update(update) = parse(
            "UPDATE users u SET (name, email) = ($name, $email), active = true FROM teams t WHERE u.team_id = t.id RETURNING u.id",
        ) else {
            panic!("Expected update");
        };
        assert_eq!(update.alias.as_ref().map(Ident::as_str), Some("u"));
        assert_eq!(update.assignments.len(), 2);
        assert_eq!(update.assignments[0].columns.len(), 2);
        assert_eq!(update.from.len(), 1);
        assert!(update.selection.is_some());

        let Statement::Update(update) = parse("UPDATE users SET name = $name") else {
            panic!("Expected update");
        };
        assert!(update.alias.is_none());
    }

    #[test]
    fn delete_with_using() {
        let Statement::Delete(delete) =
            parse("DELETE FROM users USING teams WHERE users.team_id = teams.id RETURNING *")
        else {
            panic!("Expected delete");
        };
        assert!(delete.alias.is_none());
        assert_eq!(delete.using.len(), 1);
        assert_eq!(delete.returning.len(), 1);
    }

    #[test]
    fn with_prefix_on_dml() {
        let Statement::Delete(delete) =
            parse("WITH old AS (SELECT id FROM users) DELETE FROM users WHERE id IN (SELECT id FROM old)")
        else {
            panic!("Expected delete");
        };
        assert!(delete.with.is_some());

        let Statement::Query(query) = parse("WITH x AS (SELECT 1) SELECT * FROM x") else {
            panic!("Expected query");
        };
        assert!(query.with.is_some());
    }

    #[test]
    fn transactions() {
        let cases = [
            ("BEGIN", TransactionKind::Begin),
            (
                "START TRANSACTION ISOLATION LEVEL SERIALIZABLE",
                TransactionKind::Begin,
            ),
            ("COMMIT", TransactionKind::Commit),
            ("ROLLBACK", TransactionKind::Rollback { savepoint: None }),
        ];
        for (sql, expected) in cases {
            match parse(sql) {
                Statement::Transaction(transaction) => assert_eq!(transaction.kind, expected),
                other => panic!("Expected transaction for {}, got {:?}", sql, other),
            }
        }

        match parse("ROLLBACK TO SAVEPOINT sp1") {
            Statement::Transaction(Transaction {
                kind: TransactionKind::Rollback { savepoint: Some(name) },
                ..
            }) => assert_eq!(name.as_str(), "sp1"),
            other => panic!("Expected rollback to savepoint, got {:?}", other),
        }
    }
}
