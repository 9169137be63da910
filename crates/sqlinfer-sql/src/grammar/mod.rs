//! SQL grammar
//!
//! Recursive descent over [`Cursor`]: each rule is a plain function, ordered
//! alternation goes through [`Cursor::first_of`] (first match wins, so rule
//! order encodes priority), and recursion between rules is ordinary function
//! recursion.

mod dml;
mod expr;
mod query;

pub use dml::{delete, insert, statement, transaction, update};
pub use expr::{data_type, expr};
pub use query::{query, values, with_clause};

use crate::ast::{Ident, ObjectName, OrderByItem, ParamRef, SelectItem};
use crate::combinator::{Cursor, PResult};

pub(crate) fn ident(c: &mut Cursor) -> PResult<Ident> {
    let (value, quoted, span) = c.identifier()?;
    Ok(Ident {
        value,
        quoted,
        span,
    })
}

/// Identifier position where reserved words are allowed
pub(crate) fn label(c: &mut Cursor) -> PResult<Ident> {
    let (value, quoted, span) = c.label()?;
    Ok(Ident {
        value,
        quoted,
        span,
    })
}

/// `name`, `schema.name` or `catalog.schema.name` (the catalog is dropped)
pub(crate) fn object_name(c: &mut Cursor) -> PResult<ObjectName> {
    let start = c.begin();
    let first = ident(c)?;
    let mut parts = vec![first];
    parts.extend(c.star(|c| {
        c.punct(".")?;
        label(c)
    }));
    if parts.len() > 3 {
        return c.fail("object name");
    }

    let name = parts.pop().ok_or(crate::combinator::Fail)?;
    let schema = parts.pop();
    Ok(ObjectName {
        schema,
        name,
        span: c.span_from(start),
    })
}

/// `(a, b, c)`
pub(crate) fn ident_list(c: &mut Cursor) -> PResult<Vec<Ident>> {
    c.punct("(")?;
    let idents = c.separated(",", ident)?;
    c.punct(")")?;
    Ok(idents)
}

/// `$name`, `$name!`, `$$name` or `$$name(a, b)`
pub(crate) fn param_ref(c: &mut Cursor) -> PResult<ParamRef> {
    let (name, spread, required, span) = c.param()?;
    let pick = if spread {
        c.optional(ident_list).unwrap_or_default()
    } else {
        Vec::new()
    };
    Ok(ParamRef {
        name,
        required,
        spread,
        pick,
        span: c.span_from(span.start),
    })
}

/// `expr [ASC | DESC] [NULLS FIRST | LAST]`
pub(crate) fn order_by_item(c: &mut Cursor) -> PResult<OrderByItem> {
    let expr = expr::expr(c)?;
    let descending = match c.one_of_keywords(&["ASC", "DESC"]) {
        Ok((kw, _)) => kw == "DESC",
        Err(_) => false,
    };
    let nulls_first = c
        .attempt(|c| {
            c.keyword("NULLS")?;
            let (kw, _) = c.one_of_keywords(&["FIRST", "LAST"])?;
            Ok(kw == "FIRST")
        })
        .ok();
    Ok(OrderByItem {
        expr,
        descending,
        nulls_first,
    })
}

pub(crate) fn order_by(c: &mut Cursor) -> PResult<Vec<OrderByItem>> {
    c.keywords(&["ORDER", "BY"])?;
    c.separated(",", order_by_item)
}

/// `* | qualifier.* | expr [[AS] alias]`
pub(crate) fn select_item(c: &mut Cursor) -> PResult<SelectItem> {
    let start = c.begin();
    if c.punct("*").is_ok() {
        return Ok(SelectItem::Wildcard {
            qualifier: None,
            span: c.span_from(start),
        });
    }

    let qualified = c.attempt(|c| {
        let name = object_name(c)?;
        c.punct(".")?;
        c.punct("*")?;
        Ok(name)
    });
    if let Ok(qualifier) = qualified {
        return Ok(SelectItem::Wildcard {
            qualifier: Some(qualifier),
            span: c.span_from(start),
        });
    }

    let expr = expr::expr(c)?;
    let alias = c.optional(alias);
    Ok(SelectItem::Expr {
        expr,
        alias,
        span: c.span_from(start),
    })
}

/// `AS label` or a bare, non-reserved identifier
pub(crate) fn alias(c: &mut Cursor) -> PResult<Ident> {
    if c.keyword("AS").is_ok() {
        return label(c);
    }
    ident(c)
}

/// `RETURNING items`, empty when absent
pub(crate) fn returning(c: &mut Cursor) -> PResult<Vec<SelectItem>> {
    if c.keyword("RETURNING").is_err() {
        return Ok(Vec::new());
    }
    c.separated(",", select_item)
}
