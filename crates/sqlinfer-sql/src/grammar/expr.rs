//! Expression grammar
//!
//! Binary operators are layered by precedence. [`LEVELS`] lists one entry per
//! level, loosest binding first; operators at one level fold to the left, so
//! `1 - 2 + 2` parses as `(1 - 2) + 2`. Suffix forms (`IS`, `IN`, `BETWEEN`,
//! `LIKE`) share the operand parsed so far and switch to the longer form only
//! when one matches.

use super::query::query;
use super::{ident, label, object_name, order_by, order_by_item, param_ref};
use crate::ast::{
    CurrentKind, DataType, Expr, FunctionCall, Ident, IsTest, LikeKind, Literal, ObjectName,
    Operator, QuantifiedTarget, Quantifier, WindowSpec,
};
use crate::combinator::{is_reserved, Cursor, Fail, PResult, Rule};

enum Level {
    /// Left associative infix operators
    Infix {
        op: Rule<Operator>,
        quantified: bool,
    },

    /// A prefix operator binding looser than the next level (`NOT`)
    Prefix(Rule<Operator>),

    /// Suffix forms applied to the operand of the next level
    Suffix(&'static [Rule<Suffix>]),
}

static LEVELS: &[Level] = &[
    Level::Infix {
        op: or_op,
        quantified: false,
    },
    Level::Infix {
        op: and_op,
        quantified: false,
    },
    Level::Prefix(not_op),
    Level::Suffix(&[is_suffix]),
    Level::Infix {
        op: comparison_op,
        quantified: true,
    },
    Level::Suffix(&[in_suffix, between_suffix, like_suffix]),
    Level::Infix {
        op: other_op,
        quantified: true,
    },
    Level::Infix {
        op: additive_op,
        quantified: false,
    },
    Level::Infix {
        op: multiplicative_op,
        quantified: false,
    },
    Level::Infix {
        op: exponent_op,
        quantified: false,
    },
];

/// Operand of `IS DISTINCT FROM`
const COMPARISON_LEVEL: usize = 4;

/// Operand of `LIKE`, `BETWEEN` bounds and `POSITION(.. IN ..)`
const OTHER_LEVEL: usize = 6;

const COMPARISON_OPERATORS: &[&str] = &["=", "<>", "<", ">", "<=", ">="];
const ADDITIVE_OPERATORS: &[&str] = &["+", "-"];
const MULTIPLICATIVE_OPERATORS: &[&str] = &["*", "/", "%"];
const EXPONENT_OPERATORS: &[&str] = &["^"];
const PREFIX_OPERATORS: &[&str] = &["-", "+", "~", "@", "|/", "||/", "!!"];

/// Suffix forms sharing an already parsed operand
enum Suffix {
    Is {
        negated: bool,
        test: IsTest,
    },
    Between {
        negated: bool,
        symmetric: bool,
        low: Expr,
        high: Expr,
    },
    InList {
        negated: bool,
        list: Vec<Expr>,
    },
    InSubquery {
        negated: bool,
        subquery: Box<crate::ast::Query>,
    },
    InParam {
        negated: bool,
        param: crate::ast::ParamRef,
    },
    Like {
        negated: bool,
        kind: LikeKind,
        pattern: Expr,
        escape: Option<Expr>,
    },
}

impl Suffix {
    fn apply(self, expr: Expr, span: sqlinfer_core::Span) -> Expr {
        let expr = Box::new(expr);
        match self {
            Suffix::Is { negated, test } => Expr::Is {
                expr,
                negated,
                test,
                span,
            },
            Suffix::Between {
                negated,
                symmetric,
                low,
                high,
            } => Expr::Between {
                expr,
                negated,
                symmetric,
                low: Box::new(low),
                high: Box::new(high),
                span,
            },
            Suffix::InList { negated, list } => Expr::InList {
                expr,
                negated,
                list,
                span,
            },
            Suffix::InSubquery { negated, subquery } => Expr::InSubquery {
                expr,
                negated,
                subquery,
                span,
            },
            Suffix::InParam { negated, param } => Expr::InParam {
                expr,
                negated,
                param,
                span,
            },
            Suffix::Like {
                negated,
                kind,
                pattern,
                escape,
            } => Expr::Like {
                expr,
                negated,
                kind,
                pattern: Box::new(pattern),
                escape: escape.map(Box::new),
                span,
            },
        }
    }
}

enum Rhs {
    Expr(Expr),
    Quantified(Quantifier, QuantifiedTarget),
}

/// Any expression
pub fn expr(c: &mut Cursor) -> PResult<Expr> {
    c.nested(|c| level(c, 0))
}

/// An expression binding at least as tightly as `LEVELS[min]`.
///
/// The operand is parsed once, then operators are folded onto it: each round
/// tries the tightest level first, and an infix operator at level `i` takes
/// its right operand from level `i + 1`. Nested parentheses cost a single
/// frame here rather than one per level.
fn level(c: &mut Cursor, min: usize) -> PResult<Expr> {
    let start = c.begin();
    let mut left = operand(c, min)?;

    'fold: loop {
        for index in (min..LEVELS.len()).rev() {
            match &LEVELS[index] {
                Level::Infix {
                    op: op_rule,
                    quantified,
                } => {
                    let step = c.attempt(|c| {
                        let op = op_rule(c)?;
                        if *quantified {
                            if let Some((quantifier, target)) = c.optional(quantified_target) {
                                return Ok((op, Rhs::Quantified(quantifier, target)));
                            }
                        }
                        Ok((op, Rhs::Expr(level(c, index + 1)?)))
                    });
                    let Ok((op, rhs)) = step else {
                        continue;
                    };

                    let span = c.span_from(start);
                    left = match rhs {
                        Rhs::Expr(right) => Expr::Binary {
                            left: Box::new(left),
                            op,
                            right: Box::new(right),
                            span,
                        },
                        Rhs::Quantified(quantifier, right) => Expr::Quantified {
                            left: Box::new(left),
                            op,
                            quantifier,
                            right,
                            span,
                        },
                    };
                    continue 'fold;
                }
                Level::Suffix(switches) => {
                    let before = c.pos();
                    left = c.node_or_switch(left, switches, |expr, suffix, c| {
                        suffix.apply(expr, c.span_from(start))
                    });
                    if c.pos() != before {
                        continue 'fold;
                    }
                }
                Level::Prefix(_) => {}
            }
        }
        return Ok(left);
    }
}

/// The leftmost operand of [`level`]: a prefix operator allowed at `min` or
/// looser applies to everything binding at least as tightly as itself
fn operand(c: &mut Cursor, min: usize) -> PResult<Expr> {
    let prefix = LEVELS
        .iter()
        .enumerate()
        .skip(min)
        .find_map(|(index, level)| match level {
            Level::Prefix(op_rule) => Some((index, *op_rule)),
            _ => None,
        });

    if let Some((index, op_rule)) = prefix {
        let start = c.begin();
        if let Ok(op) = c.attempt(|c| op_rule(c)) {
            let operand = c.nested(|c| level(c, index))?;
            return Ok(Expr::Unary {
                op,
                expr: Box::new(operand),
                span: c.span_from(start),
            });
        }
    }
    unary(c)
}

fn keyword_op(c: &mut Cursor, kw: &'static str) -> PResult<Operator> {
    let span = c.keyword(kw)?;
    Ok(Operator {
        op: kw.to_string(),
        span,
    })
}

fn or_op(c: &mut Cursor) -> PResult<Operator> {
    keyword_op(c, "OR")
}

fn and_op(c: &mut Cursor) -> PResult<Operator> {
    keyword_op(c, "AND")
}

fn not_op(c: &mut Cursor) -> PResult<Operator> {
    keyword_op(c, "NOT")
}

/// An operator token accepted by `allowed`; nothing is consumed otherwise
fn operator_where(
    c: &mut Cursor,
    label: &'static str,
    allowed: impl Fn(&str) -> bool,
) -> PResult<Operator> {
    let saved = c.pos();
    match c.operator_token() {
        Ok((op, span)) if allowed(op.as_str()) => Ok(Operator { op, span }),
        _ => {
            c.reset(saved);
            c.fail(label)
        }
    }
}

fn comparison_op(c: &mut Cursor) -> PResult<Operator> {
    operator_where(c, "comparison operator", |op| COMPARISON_OPERATORS.contains(&op))
}

fn other_op(c: &mut Cursor) -> PResult<Operator> {
    operator_where(c, "operator", |op| {
        !COMPARISON_OPERATORS.contains(&op)
            && !ADDITIVE_OPERATORS.contains(&op)
            && !MULTIPLICATIVE_OPERATORS.contains(&op)
            && !EXPONENT_OPERATORS.contains(&op)
    })
}

fn additive_op(c: &mut Cursor) -> PResult<Operator> {
    operator_where(c, "operator", |op| ADDITIVE_OPERATORS.contains(&op))
}

fn multiplicative_op(c: &mut Cursor) -> PResult<Operator> {
    operator_where(c, "operator", |op| MULTIPLICATIVE_OPERATORS.contains(&op))
}

fn exponent_op(c: &mut Cursor) -> PResult<Operator> {
    operator_where(c, "operator", |op| EXPONENT_OPERATORS.contains(&op))
}

/// `ANY (...)`, `SOME (...)` or `ALL (...)` after an operator
fn quantified_target(c: &mut Cursor) -> PResult<(Quantifier, QuantifiedTarget)> {
    let (kw, _) = c.one_of_keywords(&["ANY", "SOME", "ALL"])?;
    let quantifier = if kw == "ALL" {
        Quantifier::All
    } else {
        Quantifier::Any
    };
    c.punct("(")?;
    if let Some(subquery) = subquery_then_close(c) {
        return Ok((quantifier, QuantifiedTarget::Subquery(Box::new(subquery))));
    }
    let target = QuantifiedTarget::Expr(Box::new(expr(c)?));
    c.punct(")")?;
    Ok((quantifier, target))
}

fn is_suffix(c: &mut Cursor) -> PResult<Suffix> {
    if c.keyword("ISNULL").is_ok() {
        return Ok(Suffix::Is {
            negated: false,
            test: IsTest::Null,
        });
    }
    if c.keyword("NOTNULL").is_ok() {
        return Ok(Suffix::Is {
            negated: true,
            test: IsTest::Null,
        });
    }

    c.keyword("IS")?;
    let negated = c.keyword("NOT").is_ok();
    let test = if c.keyword("NULL").is_ok() {
        IsTest::Null
    } else if c.keyword("TRUE").is_ok() {
        IsTest::True
    } else if c.keyword("FALSE").is_ok() {
        IsTest::False
    } else if c.keyword("UNKNOWN").is_ok() {
        IsTest::Unknown
    } else {
        c.keywords(&["DISTINCT", "FROM"])?;
        IsTest::DistinctFrom(Box::new(level(c, COMPARISON_LEVEL)?))
    };
    Ok(Suffix::Is { negated, test })
}

fn in_suffix(c: &mut Cursor) -> PResult<Suffix> {
    let negated = c.keyword("NOT").is_ok();
    c.keyword("IN")?;

    if let Ok(param) = c.attempt(param_ref) {
        return Ok(Suffix::InParam { negated, param });
    }

    c.punct("(")?;
    if let Some(subquery) = subquery_then_close(c) {
        return Ok(Suffix::InSubquery {
            negated,
            subquery: Box::new(subquery),
        });
    }
    let list = c.separated(",", expr)?;
    c.punct(")")?;
    Ok(Suffix::InList { negated, list })
}

fn between_suffix(c: &mut Cursor) -> PResult<Suffix> {
    let negated = c.keyword("NOT").is_ok();
    c.keyword("BETWEEN")?;
    let symmetric = match c.one_of_keywords(&["SYMMETRIC", "ASYMMETRIC"]) {
        Ok((kw, _)) => kw == "SYMMETRIC",
        Err(_) => false,
    };
    let low = level(c, OTHER_LEVEL)?;
    c.keyword("AND")?;
    let high = level(c, OTHER_LEVEL)?;
    Ok(Suffix::Between {
        negated,
        symmetric,
        low,
        high,
    })
}

fn like_suffix(c: &mut Cursor) -> PResult<Suffix> {
    let negated = c.keyword("NOT").is_ok();
    let kind = if c.keyword("LIKE").is_ok() {
        LikeKind::Like
    } else if c.keyword("ILIKE").is_ok() {
        LikeKind::ILike
    } else {
        c.keywords(&["SIMILAR", "TO"])?;
        LikeKind::SimilarTo
    };
    let pattern = level(c, OTHER_LEVEL)?;
    let escape = c
        .attempt(|c| {
            c.keyword("ESCAPE")?;
            level(c, OTHER_LEVEL)
        })
        .ok();
    Ok(Suffix::Like {
        negated,
        kind,
        pattern,
        escape,
    })
}

fn unary(c: &mut Cursor) -> PResult<Expr> {
    let start = c.begin();
    let prefix = operator_where(c, "expression", |op| PREFIX_OPERATORS.contains(&op));
    match prefix {
        Ok(op) => {
            let operand = c.nested(unary)?;
            Ok(Expr::Unary {
                op,
                expr: Box::new(operand),
                span: c.span_from(start),
            })
        }
        Err(_) => postfix(c),
    }
}

/// `::type`, `[subscript]`, `.field`, `COLLATE name`, `AT TIME ZONE zone`
fn postfix(c: &mut Cursor) -> PResult<Expr> {
    let start = c.begin();
    let mut expr = primary(c)?;

    loop {
        if c.punct("::").is_ok() {
            let data_type = data_type(c)?;
            expr = Expr::Cast {
                expr: Box::new(expr),
                data_type,
                span: c.span_from(start),
            };
            continue;
        }

        if let Ok((lower, upper, slice)) = c.attempt(subscript) {
            expr = Expr::Subscript {
                expr: Box::new(expr),
                lower: lower.map(Box::new),
                upper: upper.map(Box::new),
                slice,
                span: c.span_from(start),
            };
            continue;
        }

        let accessible = matches!(
            expr,
            Expr::Nested { .. } | Expr::FieldAccess { .. } | Expr::Subscript { .. }
        );
        if accessible {
            let field = c.attempt(|c| {
                c.punct(".")?;
                label(c)
            });
            if let Ok(field) = field {
                expr = Expr::FieldAccess {
                    expr: Box::new(expr),
                    field,
                    span: c.span_from(start),
                };
                continue;
            }
        }

        let collate = c.attempt(|c| {
            c.keyword("COLLATE")?;
            object_name(c)
        });
        if collate.is_ok() {
            continue;
        }

        if let Ok(op_span) = c.keywords(&["AT", "TIME", "ZONE"]) {
            let zone = unary(c)?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op: Operator {
                    op: "AT TIME ZONE".to_string(),
                    span: op_span,
                },
                right: Box::new(zone),
                span: c.span_from(start),
            };
            continue;
        }

        return Ok(expr);
    }
}

type Subscript = (Option<Expr>, Option<Expr>, bool);

fn subscript(c: &mut Cursor) -> PResult<Subscript> {
    c.punct("[")?;
    let lower = c.optional(expr);
    let slice = c.punct(":").is_ok();
    let upper = if slice { c.optional(expr) } else { None };
    c.punct("]")?;
    if lower.is_none() && !slice {
        return Err(Fail);
    }
    Ok((lower, upper, slice))
}

fn primary(c: &mut Cursor) -> PResult<Expr> {
    let found = c.first_of(&[
        parenthesized,
        param_expr,
        literal,
        case_expr,
        cast_expr,
        exists_expr,
        array_expr,
        row_expr,
        extract_expr,
        current_expr,
        default_expr,
        special_function,
        typed_string,
        function_expr,
        column_expr,
    ]);
    match found {
        Ok(expr) => Ok(expr),
        Err(_) => c.fail("expression"),
    }
}

/// `(subquery)`, `(expr)` or a row `(a, b)`
fn parenthesized(c: &mut Cursor) -> PResult<Expr> {
    let start = c.begin();
    c.punct("(")?;

    if let Some(subquery) = subquery_then_close(c) {
        return Ok(Expr::Subquery {
            query: Box::new(subquery),
            span: c.span_from(start),
        });
    }

    let mut elements = c.separated(",", expr)?;
    c.punct(")")?;
    let span = c.span_from(start);
    if elements.len() == 1 {
        let inner = elements.remove(0);
        return Ok(Expr::Nested {
            expr: Box::new(inner),
            span,
        });
    }
    Ok(Expr::Row { elements, span })
}

/// A query and the `)` closing it, tried only when a query starts here
fn subquery_then_close(c: &mut Cursor) -> Option<crate::ast::Query> {
    if !c.peek_query() {
        return None;
    }
    c.attempt(|c| {
        let subquery = query(c)?;
        c.punct(")")?;
        Ok(subquery)
    })
    .ok()
}

fn param_expr(c: &mut Cursor) -> PResult<Expr> {
    param_ref(c).map(Expr::Param)
}

fn literal(c: &mut Cursor) -> PResult<Expr> {
    let start = c.begin();
    let value = if let Ok((number, _)) = c.number() {
        Literal::Number(number)
    } else if let Ok((string, _)) = c.string() {
        Literal::String(string)
    } else if c.keyword("TRUE").is_ok() {
        Literal::Boolean(true)
    } else if c.keyword("FALSE").is_ok() {
        Literal::Boolean(false)
    } else if c.keyword("NULL").is_ok() {
        Literal::Null
    } else {
        return c.fail("literal");
    };
    Ok(Expr::Literal {
        value,
        span: c.span_from(start),
    })
}

fn case_expr(c: &mut Cursor) -> PResult<Expr> {
    let start = c.begin();
    c.keyword("CASE")?;
    let operand = if c.peek_keyword("WHEN") {
        None
    } else {
        Some(Box::new(expr(c)?))
    };
    let whens = c.plus(|c| {
        c.keyword("WHEN")?;
        let condition = expr(c)?;
        c.keyword("THEN")?;
        let result = expr(c)?;
        Ok((condition, result))
    })?;
    let else_result = c
        .attempt(|c| {
            c.keyword("ELSE")?;
            expr(c)
        })
        .ok()
        .map(Box::new);
    c.keyword("END")?;
    Ok(Expr::Case {
        operand,
        whens,
        else_result,
        span: c.span_from(start),
    })
}

fn cast_expr(c: &mut Cursor) -> PResult<Expr> {
    let start = c.begin();
    c.keyword("CAST")?;
    c.punct("(")?;
    let inner = expr(c)?;
    c.keyword("AS")?;
    let data_type = data_type(c)?;
    c.punct(")")?;
    Ok(Expr::Cast {
        expr: Box::new(inner),
        data_type,
        span: c.span_from(start),
    })
}

fn exists_expr(c: &mut Cursor) -> PResult<Expr> {
    let start = c.begin();
    c.keyword("EXISTS")?;
    c.punct("(")?;
    let subquery = query(c)?;
    c.punct(")")?;
    Ok(Expr::Exists {
        subquery: Box::new(subquery),
        span: c.span_from(start),
    })
}

/// Elements of `ARRAY[...]`; nested brackets are sub-arrays
fn array_elements(c: &mut Cursor) -> PResult<Expr> {
    let start = c.begin();
    c.punct("[")?;
    let elements = c
        .optional(|c| c.separated(",", array_element))
        .unwrap_or_default();
    c.punct("]")?;
    Ok(Expr::Array {
        elements,
        span: c.span_from(start),
    })
}

fn array_element(c: &mut Cursor) -> PResult<Expr> {
    c.first_of(&[array_elements, expr])
}

fn array_expr(c: &mut Cursor) -> PResult<Expr> {
    let start = c.begin();
    c.keyword("ARRAY")?;
    if let Ok(Expr::Array { elements, .. }) = c.attempt(array_elements) {
        return Ok(Expr::Array {
            elements,
            span: c.span_from(start),
        });
    }
    c.punct("(")?;
    let subquery = query(c)?;
    c.punct(")")?;
    Ok(Expr::ArraySubquery {
        query: Box::new(subquery),
        span: c.span_from(start),
    })
}

fn row_expr(c: &mut Cursor) -> PResult<Expr> {
    let start = c.begin();
    c.keyword("ROW")?;
    c.punct("(")?;
    let elements = c.optional(|c| c.separated(",", expr)).unwrap_or_default();
    c.punct(")")?;
    Ok(Expr::Row {
        elements,
        span: c.span_from(start),
    })
}

fn extract_expr(c: &mut Cursor) -> PResult<Expr> {
    let start = c.begin();
    c.keyword("EXTRACT")?;
    c.punct("(")?;
    let field = match c.string() {
        Ok((field, _)) => field.to_lowercase(),
        Err(_) => label(c)?.value,
    };
    c.keyword("FROM")?;
    let source = expr(c)?;
    c.punct(")")?;
    Ok(Expr::Extract {
        field,
        expr: Box::new(source),
        span: c.span_from(start),
    })
}

fn current_expr(c: &mut Cursor) -> PResult<Expr> {
    let start = c.begin();
    let (kw, _) = c.one_of_keywords(&[
        "CURRENT_DATE",
        "CURRENT_TIMESTAMP",
        "CURRENT_TIME",
        "LOCALTIMESTAMP",
        "LOCALTIME",
        "CURRENT_USER",
        "SESSION_USER",
        "USER",
    ])?;
    let kind = match kw {
        "CURRENT_DATE" => CurrentKind::Date,
        "CURRENT_TIMESTAMP" => CurrentKind::Timestamp,
        "CURRENT_TIME" => CurrentKind::Time,
        "LOCALTIMESTAMP" => CurrentKind::LocalTimestamp,
        "LOCALTIME" => CurrentKind::LocalTime,
        _ => CurrentKind::User,
    };
    // precision, e.g. CURRENT_TIMESTAMP(3)
    let _ = c.attempt(|c| {
        c.punct("(")?;
        c.number()?;
        c.punct(")")
    });
    Ok(Expr::Current {
        kind,
        span: c.span_from(start),
    })
}

fn default_expr(c: &mut Cursor) -> PResult<Expr> {
    let span = c.keyword("DEFAULT")?;
    Ok(Expr::Default { span })
}

/// `DATE '2020-01-01'`, `INTERVAL '1 day'`
fn typed_string(c: &mut Cursor) -> PResult<Expr> {
    let start = c.begin();
    let data_type = data_type(c)?;
    let (value, _) = c.string()?;
    Ok(Expr::TypedString {
        data_type,
        value,
        span: c.span_from(start),
    })
}

fn function_name(c: &mut Cursor) -> PResult<ObjectName> {
    if let Ok(name) = c.attempt(object_name) {
        return Ok(name);
    }
    // reserved words that are also function names
    let start = c.begin();
    let (kw, span) = c.one_of_keywords(&["LEFT", "RIGHT"])?;
    Ok(ObjectName {
        schema: None,
        name: Ident::new(kw.to_lowercase(), span),
        span: c.span_from(start),
    })
}

fn simple_call(
    name: &str,
    name_span: sqlinfer_core::Span,
    args: Vec<Expr>,
    span: sqlinfer_core::Span,
) -> Expr {
    Expr::Function(FunctionCall {
        name: ObjectName {
            schema: None,
            name: Ident::new(name, name_span),
            span: name_span,
        },
        args,
        star: false,
        distinct: false,
        order_by: Vec::new(),
        filter: None,
        over: None,
        span,
    })
}

/// Functions with keyword argument syntax
fn special_function(c: &mut Cursor) -> PResult<Expr> {
    let start = c.begin();
    let (kw, name_span) = c.one_of_keywords(&["SUBSTRING", "POSITION", "TRIM", "OVERLAY"])?;
    c.punct("(")?;

    let (name, args) = match kw {
        "SUBSTRING" => {
            let source = expr(c)?;
            let mut args = vec![source];
            if c.keyword("FROM").is_ok() {
                args.push(expr(c)?);
            }
            if c.keyword("FOR").is_ok() {
                args.push(expr(c)?);
            }
            if args.len() == 1 {
                return Err(Fail);
            }
            ("substring", args)
        }
        "POSITION" => {
            let needle = level(c, OTHER_LEVEL)?;
            c.keyword("IN")?;
            let haystack = expr(c)?;
            ("position", vec![needle, haystack])
        }
        "OVERLAY" => {
            let target = expr(c)?;
            c.keyword("PLACING")?;
            let replacement = expr(c)?;
            c.keyword("FROM")?;
            let mut args = vec![target, replacement, expr(c)?];
            if c.keyword("FOR").is_ok() {
                args.push(expr(c)?);
            }
            ("overlay", args)
        }
        _ => {
            let side = c.one_of_keywords(&["BOTH", "LEADING", "TRAILING"]).ok();
            let name = match side.map(|(kw, _)| kw) {
                Some("LEADING") => "ltrim",
                Some("TRAILING") => "rtrim",
                _ => "btrim",
            };
            let first = c.optional(expr);
            let args = if c.keyword("FROM").is_ok() {
                let source = expr(c)?;
                match first {
                    Some(characters) => vec![source, characters],
                    None => vec![source],
                }
            } else {
                let source = first.ok_or(Fail)?;
                let mut args = vec![source];
                if c.punct(",").is_ok() {
                    args.push(expr(c)?);
                }
                args
            };
            (name, args)
        }
    };

    c.punct(")")?;
    Ok(simple_call(name, name_span, args, c.span_from(start)))
}

fn function_expr(c: &mut Cursor) -> PResult<Expr> {
    function_call(c).map(Expr::Function)
}

/// `name([DISTINCT] args [ORDER BY ...]) [WITHIN GROUP (...)] [FILTER (...)] [OVER ...]`
pub(crate) fn function_call(c: &mut Cursor) -> PResult<FunctionCall> {
    let start = c.begin();
    let name = function_name(c)?;
    c.punct("(")?;

    let distinct = match c.one_of_keywords(&["DISTINCT", "ALL"]) {
        Ok((kw, _)) => kw == "DISTINCT",
        Err(_) => false,
    };
    let star = c.punct("*").is_ok();
    let args = if star {
        Vec::new()
    } else {
        c.optional(|c| c.separated(",", function_arg))
            .unwrap_or_default()
    };
    let mut order = c.optional(order_by).unwrap_or_default();
    c.punct(")")?;

    let within_group = c.attempt(|c| {
        c.keywords(&["WITHIN", "GROUP"])?;
        c.punct("(")?;
        let items = order_by(c)?;
        c.punct(")")?;
        Ok(items)
    });
    if let Ok(items) = within_group {
        order.extend(items);
    }

    let filter = c
        .attempt(|c| {
            c.keyword("FILTER")?;
            c.punct("(")?;
            c.keyword("WHERE")?;
            let condition = expr(c)?;
            c.punct(")")?;
            Ok(condition)
        })
        .ok()
        .map(Box::new);

    let over = c
        .attempt(|c| {
            c.keyword("OVER")?;
            if let Ok(name) = ident(c) {
                return Ok(WindowSpec {
                    name: Some(name),
                    partition_by: Vec::new(),
                    order_by: Vec::new(),
                    frame: None,
                });
            }
            c.punct("(")?;
            let spec = window_spec(c)?;
            c.punct(")")?;
            Ok(spec)
        })
        .ok();

    Ok(FunctionCall {
        name,
        args,
        star,
        distinct,
        order_by: order,
        filter,
        over,
        span: c.span_from(start),
    })
}

/// An argument, skipping `VARIADIC` and named-argument prefixes
fn function_arg(c: &mut Cursor) -> PResult<Expr> {
    let _ = c.keyword("VARIADIC");
    let _ = c.attempt(|c| {
        ident(c)?;
        c.symbol("=>")
    });
    expr(c)
}

/// Contents of `OVER (...)` or `WINDOW w AS (...)`
pub(crate) fn window_spec(c: &mut Cursor) -> PResult<WindowSpec> {
    let name = c
        .attempt(|c| {
            let name = ident(c)?;
            if c.peek_keyword("PARTITION") || c.peek_keyword("ORDER") || c.peek_punct(")") {
                Ok(name)
            } else {
                Err(Fail)
            }
        })
        .ok();
    let partition_by = c
        .attempt(|c| {
            c.keywords(&["PARTITION", "BY"])?;
            c.separated(",", expr)
        })
        .unwrap_or_default();
    let order_by = c
        .attempt(|c| {
            c.keywords(&["ORDER", "BY"])?;
            c.separated(",", order_by_item)
        })
        .unwrap_or_default();
    let frame = c.optional(frame_clause);
    Ok(WindowSpec {
        name,
        partition_by,
        order_by,
        frame,
    })
}

fn frame_clause(c: &mut Cursor) -> PResult<String> {
    let start = c.begin();
    c.one_of_keywords(&["ROWS", "RANGE", "GROUPS"])?;
    if c.keyword("BETWEEN").is_ok() {
        frame_bound(c)?;
        c.keyword("AND")?;
        frame_bound(c)?;
    } else {
        frame_bound(c)?;
    }
    let _ = c.attempt(|c| {
        c.keyword("EXCLUDE")?;
        let excluded = c.keywords(&["CURRENT", "ROW"]).is_ok()
            || c.keyword("GROUP").is_ok()
            || c.keyword("TIES").is_ok()
            || c.keywords(&["NO", "OTHERS"]).is_ok();
        if excluded {
            Ok(())
        } else {
            Err(Fail)
        }
    });
    let span = c.span_from(start);
    Ok(c.src()[span.start..span.end].to_string())
}

fn frame_bound(c: &mut Cursor) -> PResult<()> {
    if c.keywords(&["UNBOUNDED", "PRECEDING"]).is_ok()
        || c.keywords(&["UNBOUNDED", "FOLLOWING"]).is_ok()
        || c.keywords(&["CURRENT", "ROW"]).is_ok()
    {
        return Ok(());
    }
    level(c, OTHER_LEVEL)?;
    c.one_of_keywords(&["PRECEDING", "FOLLOWING"])?;
    Ok(())
}

/// `column`, `table.column`, `schema.table.column`.
///
/// In partial mode a trailing `table.` yields an empty column name.
fn column_expr(c: &mut Cursor) -> PResult<Expr> {
    let start = c.begin();
    let first = ident(c)?;
    let mut parts = vec![first];

    while parts.len() < 3 {
        let dot = c.pos();
        if c.punct(".").is_err() {
            break;
        }
        if c.peek_punct("*") {
            c.reset(dot);
            break;
        }
        let after_dot = c.pos();
        match label(c) {
            // `t. FROM` while typing: the keyword starts the next clause
            Ok(part) if c.is_partial() && !part.quoted && is_reserved(&part.value) => {
                c.reset(after_dot);
                parts.push(Ident::new("", sqlinfer_core::Span::new(after_dot, after_dot)));
                break;
            }
            Ok(part) => parts.push(part),
            Err(_) if c.is_partial() => {
                let end = c.pos();
                parts.push(Ident::new("", sqlinfer_core::Span::new(end, end)));
                break;
            }
            Err(_) => {
                c.reset(dot);
                break;
            }
        }
    }

    let span = c.span_from(start);
    let column = parts.pop().ok_or(Fail)?;
    let table = parts.pop();
    let schema = parts.pop();
    Ok(Expr::Column {
        schema,
        table,
        column,
        span,
    })
}

/// Type name: `int4`, `varchar(255)`, `double precision`, `timestamp with time zone`, `text[]`
pub fn data_type(c: &mut Cursor) -> PResult<DataType> {
    let start = c.begin();
    let first = ident(c)?;
    let (schema, base) = match c.attempt(|c| {
        c.punct(".")?;
        ident(c)
    }) {
        Ok(name) => (Some(first.value), name.value),
        Err(_) => (None, first.value),
    };

    let mut name = base;
    match name.as_str() {
        "double" => {
            if c.keyword("PRECISION").is_ok() {
                name = "double precision".to_string();
            }
        }
        "character" | "char" | "bit" => {
            if c.keyword("VARYING").is_ok() {
                name = format!("{} varying", if name == "bit" { "bit" } else { "character" });
            }
        }
        _ => {}
    }

    let modifiers = c
        .attempt(|c| {
            c.punct("(")?;
            let items = c.separated(",", |c| match c.number() {
                Ok((number, _)) => Ok(number),
                Err(_) => ident(c).map(|ident| ident.value),
            })?;
            c.punct(")")?;
            Ok(items)
        })
        .unwrap_or_default();

    if name == "timestamp" || name == "time" {
        if c.keywords(&["WITH", "TIME", "ZONE"]).is_ok() {
            name.push_str(" with time zone");
        } else if c.keywords(&["WITHOUT", "TIME", "ZONE"]).is_ok() {
            name.push_str(" without time zone");
        }
    }

    let mut array_dims = c
        .star(|c| {
            c.punct("[")?;
            let _ = c.number();
            c.punct("]")
        })
        .len();
    if c.keyword("ARRAY").is_ok() {
        let _ = c.attempt(|c| {
            c.punct("[")?;
            let _ = c.number();
            c.punct("]")
        });
        array_dims += 1;
    }

    Ok(DataType {
        schema,
        name,
        modifiers,
        array_dims,
        span: c.span_from(start),
    })
}
