//! Positional placeholder splicing
//!
//! Rewrites named parameters into the `$1, $2, ...` placeholders the
//! PostgreSQL wire protocol expects, using the param spans recorded by the
//! extractor, and lays out the runtime values in placeholder order. Params
//! of nested queries must be included: pass [`QueryInterface::all_params`]
//! or the params of a resolved query. A `$name` left without a span is an
//! error rather than text sent to the server.
//!
//! [`QueryInterface::all_params`]: sqlinfer_core::QueryInterface::all_params

use crate::combinator::Cursor;
use serde_json::Value;
use sqlinfer_core::{LoadedParam, Param, Span};
use std::collections::HashMap;
use thiserror::Error;

/// A parameter occurrence that can be spliced
pub trait TemplateParam {
    fn name(&self) -> &str;
    fn spans(&self) -> &[Span];
    fn required(&self) -> bool;
    fn spread(&self) -> bool;
    fn pick(&self) -> &[String];
}

impl TemplateParam for Param {
    fn name(&self) -> &str {
        &self.name
    }
    fn spans(&self) -> &[Span] {
        &self.spans
    }
    fn required(&self) -> bool {
        self.required
    }
    fn spread(&self) -> bool {
        self.spread
    }
    fn pick(&self) -> &[String] {
        &self.pick
    }
}

impl TemplateParam for LoadedParam {
    fn name(&self) -> &str {
        &self.name
    }
    fn spans(&self) -> &[Span] {
        &self.spans
    }
    fn required(&self) -> bool {
        self.required
    }
    fn spread(&self) -> bool {
        self.spread
    }
    fn pick(&self) -> &[String] {
        &self.pick
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    #[error("Missing value for parameter ${0}")]
    MissingValue(String),

    #[error("Parameter ${0} is required but got null")]
    RequiredNull(String),

    #[error("Spread parameter $${0} expects an array")]
    NotAnArray(String),

    #[error("Spread parameter $${0} is empty")]
    EmptySpread(String),

    #[error("Element {index} of $${name} must be an object with fields {fields:?}")]
    NotAnObject {
        name: String,
        index: usize,
        fields: Vec<String>,
    },

    #[error("Parameter ${name} has a span outside the SQL text ({span:?})")]
    InvalidSpan { name: String, span: Span },

    #[error("Parameter ${name} at {position} has no value binding")]
    Unbound { name: String, position: usize },
}

/// SQL with positional placeholders and its values in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct PositionalQuery {
    pub sql: String,
    pub values: Vec<Value>,
}

/// Splice positional placeholders into `sql`.
///
/// `values` is a JSON object keyed by parameter name. Repeated scalar params
/// share one placeholder. Spread params expand to `($1,$2,$3)`, or with a pick
/// list to one tuple per element: `($1,$2),($3,$4)`.
pub fn to_positional<P: TemplateParam>(
    sql: &str,
    params: &[P],
    values: &Value,
) -> Result<PositionalQuery, TemplateError> {
    let mut occurrences: Vec<(Span, &P)> = params
        .iter()
        .flat_map(|param| param.spans().iter().map(move |span| (*span, param)))
        .collect();
    occurrences.sort_by_key(|(span, _)| span.start);
    check_bound(sql, &occurrences)?;

    let mut out = String::with_capacity(sql.len());
    let mut positional = Vec::new();
    let mut rendered: HashMap<&str, String> = HashMap::new();
    let mut last = 0;

    for (span, param) in occurrences {
        let before = sql
            .get(last..span.start)
            .ok_or_else(|| TemplateError::InvalidSpan {
                name: param.name().to_string(),
                span,
            })?;
        out.push_str(before);

        let placeholder = match rendered.get(param.name()) {
            Some(existing) => existing.clone(),
            None => {
                let text = render(param, values, &mut positional)?;
                rendered.insert(param.name(), text.clone());
                text
            }
        };
        out.push_str(&placeholder);
        last = span.end;
    }

    let rest = sql.get(last..).ok_or_else(|| TemplateError::InvalidSpan {
        name: String::new(),
        span: Span::new(last, sql.len()),
    })?;
    out.push_str(rest);

    tracing::trace!(placeholders = positional.len(), "spliced positional placeholders");
    Ok(PositionalQuery {
        sql: out,
        values: positional,
    })
}

/// Every `$name` token outside literals, identifiers and comments must be covered
fn check_bound<P>(sql: &str, occurrences: &[(Span, &P)]) -> Result<(), TemplateError> {
    let mut c = Cursor::new(sql);
    while !c.at_end() {
        if c.string().is_ok() || c.label().is_ok() || c.number().is_ok() {
            continue;
        }
        if let Ok((name, _, _, span)) = c.param() {
            let bound = occurrences
                .binary_search_by_key(&span.start, |(occurrence, _)| occurrence.start)
                .is_ok();
            if !bound {
                return Err(TemplateError::Unbound {
                    name,
                    position: span.start,
                });
            }
            continue;
        }
        let start = c.begin();
        let width = sql[start..].chars().next().map_or(1, char::len_utf8);
        c.reset(start + width);
    }
    Ok(())
}

fn push(positional: &mut Vec<Value>, value: Value) -> String {
    positional.push(value);
    format!("${}", positional.len())
}

fn render<P: TemplateParam>(
    param: &P,
    values: &Value,
    positional: &mut Vec<Value>,
) -> Result<String, TemplateError> {
    let name = param.name();
    let value = values
        .get(name)
        .ok_or_else(|| TemplateError::MissingValue(name.to_string()))?;

    if !param.spread() {
        if value.is_null() && param.required() {
            return Err(TemplateError::RequiredNull(name.to_string()));
        }
        return Ok(push(positional, value.clone()));
    }

    let items = value
        .as_array()
        .ok_or_else(|| TemplateError::NotAnArray(name.to_string()))?;
    if items.is_empty() {
        return Err(TemplateError::EmptySpread(name.to_string()));
    }

    let pick = param.pick();
    if pick.is_empty() {
        let mut placeholders = Vec::with_capacity(items.len());
        for item in items {
            if item.is_null() && param.required() {
                return Err(TemplateError::RequiredNull(name.to_string()));
            }
            placeholders.push(push(positional, item.clone()));
        }
        return Ok(format!("({})", placeholders.join(",")));
    }

    let mut tuples = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let object = item.as_object().ok_or_else(|| TemplateError::NotAnObject {
            name: name.to_string(),
            index,
            fields: pick.to_vec(),
        })?;
        let fields: Vec<String> = pick
            .iter()
            .map(|field| {
                let value = object.get(field).cloned().unwrap_or(Value::Null);
                push(positional, value)
            })
            .collect();
        tuples.push(format!("({})", fields.join(",")));
    }
    Ok(tuples.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::to_query_interface;
    use crate::parser::parse;
    use serde_json::json;

    fn splice(sql: &str, values: Value) -> Result<PositionalQuery, TemplateError> {
        let statement = parse(sql).unwrap();
        let qi = to_query_interface(&statement, &[]);
        to_positional(sql, &qi.all_params(), &values)
    }

    #[test]
    fn spread_rows_with_pick() {
        let query = splice(
            "INSERT INTO t(a,b) VALUES $$rows(a,b)",
            json!({ "rows": [{ "a": 1, "b": 2 }, { "a": 3, "b": 4 }] }),
        )
        .unwrap();
        assert_eq!(query.sql, "INSERT INTO t(a,b) VALUES ($1,$2),($3,$4)");
        assert_eq!(query.values, vec![json!(1), json!(2), json!(3), json!(4)]);
    }

    #[test]
    fn repeated_names_share_a_placeholder() {
        let query = splice(
            "SELECT * FROM users WHERE id = $id OR parent_id = $id AND name = $name",
            json!({ "id": 7, "name": "x" }),
        )
        .unwrap();
        assert_eq!(
            query.sql,
            "SELECT * FROM users WHERE id = $1 OR parent_id = $1 AND name = $2"
        );
        assert_eq!(query.values, vec![json!(7), json!("x")]);
    }

    #[test]
    fn spread_list() {
        let query = splice(
            "SELECT * FROM users WHERE id IN $$ids AND active = $active",
            json!({ "ids": [1, 2, 3], "active": true }),
        )
        .unwrap();
        assert_eq!(
            query.sql,
            "SELECT * FROM users WHERE id IN ($1,$2,$3) AND active = $4"
        );
        assert_eq!(query.values.len(), 4);
    }

    #[test]
    fn errors() {
        let sql = "SELECT * FROM users WHERE id = $id!";
        assert_eq!(
            splice(sql, json!({})),
            Err(TemplateError::MissingValue("id".into()))
        );
        assert_eq!(
            splice(sql, json!({ "id": null })),
            Err(TemplateError::RequiredNull("id".into()))
        );

        let sql = "SELECT * FROM users WHERE id IN $$ids";
        assert_eq!(
            splice(sql, json!({ "ids": 1 })),
            Err(TemplateError::NotAnArray("ids".into()))
        );
        assert_eq!(
            splice(sql, json!({ "ids": [] })),
            Err(TemplateError::EmptySpread("ids".into()))
        );
    }

    #[test]
    fn nullable_params_accept_null() {
        let query = splice("SELECT * FROM users WHERE name = $name", json!({ "name": null })).unwrap();
        assert_eq!(query.values, vec![Value::Null]);
    }

    #[test]
    fn nested_params_are_spliced() {
        let sql = "SELECT id FROM users WHERE id IN \
                   (SELECT owner_id FROM accounts WHERE state = $state) AND name = $name";
        let query = splice(sql, json!({ "state": "open", "name": "x" })).unwrap();
        assert_eq!(
            query.sql,
            "SELECT id FROM users WHERE id IN \
             (SELECT owner_id FROM accounts WHERE state = $1) AND name = $2"
        );
        assert_eq!(query.values, vec![json!("open"), json!("x")]);
    }

    #[test]
    fn top_level_params_alone_leave_nested_ones_unbound() {
        let sql = "SELECT id FROM users WHERE id IN (SELECT owner_id FROM accounts WHERE state = $state)";
        let statement = parse(sql).unwrap();
        let qi = to_query_interface(&statement, &[]);
        assert!(qi.params.is_empty());

        let position = sql.find("$state").unwrap();
        assert_eq!(
            to_positional(sql, &qi.params, &json!({ "state": "open" })),
            Err(TemplateError::Unbound {
                name: "state".into(),
                position
            })
        );
    }

    #[test]
    fn dollar_signs_in_literals_and_names_are_not_params() {
        let sql = "SELECT 'cost $price' AS \"$label\", a$b -- $note\nFROM t WHERE id = $id";
        let query = splice(sql, json!({ "id": 1 })).unwrap();
        assert_eq!(
            query.sql,
            "SELECT 'cost $price' AS \"$label\", a$b -- $note\nFROM t WHERE id = $1"
        );
    }
}
