//! SQL parsing
//!
//! Parses a single statement into an [`ast::Statement`](crate::ast::Statement)
//! and reports syntax errors at the furthest position the grammar reached.

use crate::ast::Statement;
use crate::combinator::{Cursor, MAX_DEPTH};
use crate::grammar;
use sqlinfer_core::{diagnostic::line_column, Diagnostic, ErrorCode, Severity, Span};

/// Parse one SQL statement. A trailing `;` is allowed.
pub fn parse(sql: &str) -> Result<Statement, ParseError> {
    parse_with(Cursor::new(sql))
}

/// Parse while tolerating a known incomplete suffix, such as a dangling
/// comma in a select list or a `table.` with no column name yet.
pub fn parse_partial(sql: &str) -> Result<Statement, ParseError> {
    parse_with(Cursor::new(sql).with_partial(true))
}

fn parse_with(mut cursor: Cursor) -> Result<Statement, ParseError> {
    let parsed = grammar::statement(&mut cursor);

    if let Some(position) = cursor.too_deep() {
        return Err(ParseError::too_deep(cursor.src(), position));
    }

    if let Ok(statement) = parsed {
        let _ = cursor.punct(";");
        if cursor.at_end() {
            tracing::trace!(span = ?statement.span(), "parsed statement");
            return Ok(statement);
        }
        let _ = cursor.fail::<()>("end of input");
    }

    Err(ParseError::at(
        cursor.src(),
        cursor.furthest(),
        cursor.expected(),
    ))
}

/// SQL syntax error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    /// Byte offset of the furthest position the parser reached
    pub position: usize,

    /// 1-indexed line of `position`
    pub line: usize,

    /// 1-indexed column of `position`
    pub column: usize,

    pub message: String,

    /// Tokens that would have been accepted at `position`
    pub expected: Vec<String>,
}

impl ParseError {
    fn at(sql: &str, position: usize, expected: &[&'static str]) -> Self {
        let (line, column) = line_column(sql, position);
        let found = sql
            .get(position..)
            .unwrap_or_default()
            .split_whitespace()
            .next()
            .map(|token| format!("\"{}\"", token))
            .unwrap_or_else(|| "end of input".to_string());

        let message = if expected.is_empty() {
            format!("Unexpected {}", found)
        } else {
            format!("Expected {}, found {}", expected.join(" or "), found)
        };

        Self {
            position,
            line,
            column,
            message,
            expected: expected.iter().map(|label| label.to_string()).collect(),
        }
    }

    fn too_deep(sql: &str, position: usize) -> Self {
        let (line, column) = line_column(sql, position);
        Self {
            position,
            line,
            column,
            message: format!("Nesting exceeds {} levels", MAX_DEPTH),
            expected: Vec::new(),
        }
    }

    /// Span of the offending token, at least one character wide
    pub fn span(&self, sql: &str) -> Span {
        let rest = sql.get(self.position..).unwrap_or_default();
        let len = rest
            .find(char::is_whitespace)
            .unwrap_or(rest.len())
            .max(1);
        Span::new(self.position, self.position + len)
    }

    /// Convert to a diagnostic pointing at the error position
    pub fn to_diagnostic(&self, sql: &str) -> Diagnostic {
        Diagnostic::new(ErrorCode::SqlParseError, Severity::Error, self.message.clone())
            .with_span(sql, self.span(sql))
            .with_candidates(self.expected.clone())
    }
}
