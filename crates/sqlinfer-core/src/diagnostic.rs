//! Error codes and diagnostic reporting
//!
//! IMPORTANT: Error codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use crate::types::Span;
use serde::{Deserialize, Serialize};

/// Error code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Syntax (1xxx)
    /// Malformed SQL
    SqlParseError,

    // Resolution (2xxx)
    /// No source has a column with this name
    ColumnNotFound,

    /// More than one source has a column with this name
    AmbiguousColumn,

    /// No function with this name exists in the catalog
    FunctionNotFound,

    /// Functions with this name exist but none accepts these arguments
    NoMatchingFunction,

    /// A type name is neither built in nor a known enum/composite
    UnknownPostgresType,

    /// Field access on something that is not a composite
    CompositeAccessOnNonComposite,

    /// Field access with a name the composite does not have
    MissingCompositeField,

    /// A table or view is not in the database
    TableNotFound,

    /// A view depends on itself
    ViewCycle,

    /// The SQL of a view could not be parsed
    ViewParseError,

    // Catalog (3xxx)
    /// Catalog query failed
    CatalogError,
}

impl ErrorCode {
    /// Get the error code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SqlParseError => "SQL_PARSE_ERROR",
            Self::ColumnNotFound => "COLUMN_NOT_FOUND",
            Self::AmbiguousColumn => "AMBIGUOUS_COLUMN",
            Self::FunctionNotFound => "FUNCTION_NOT_FOUND",
            Self::NoMatchingFunction => "NO_MATCHING_FUNCTION",
            Self::UnknownPostgresType => "UNKNOWN_POSTGRES_TYPE",
            Self::CompositeAccessOnNonComposite => "COMPOSITE_ACCESS_ON_NON_COMPOSITE",
            Self::MissingCompositeField => "MISSING_COMPOSITE_FIELD",
            Self::TableNotFound => "TABLE_NOT_FOUND",
            Self::ViewCycle => "VIEW_CYCLE",
            Self::ViewParseError => "VIEW_PARSE_ERROR",
            Self::CatalogError => "CATALOG_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - the query was typed, with reduced precision
    Warn,

    /// Error - the query could not be typed
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Line/column position of a span in the SQL text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Start line (1-indexed)
    pub line: usize,

    /// Start column (1-indexed, in characters)
    pub column: usize,

    /// End line (1-indexed)
    pub end_line: usize,

    /// End column (1-indexed, exclusive)
    pub end_column: usize,
}

impl Location {
    /// Compute the location of a byte span within `sql`
    pub fn from_span(sql: &str, span: Span) -> Self {
        let (line, column) = line_column(sql, span.start);
        let (end_line, end_column) = line_column(sql, span.end);
        Self {
            line,
            column,
            end_line,
            end_column,
        }
    }
}

/// 1-indexed line and column of a byte offset
pub fn line_column(sql: &str, offset: usize) -> (usize, usize) {
    let offset = clamp_to_boundary(sql, offset);
    let before = &sql[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = sql[line_start..offset].chars().count() + 1;
    (line, column)
}

fn clamp_to_boundary(sql: &str, offset: usize) -> usize {
    let mut offset = offset.min(sql.len());
    while !sql.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Render the line containing `span` with a `^` marker underneath it
pub fn render_marker(sql: &str, span: Span) -> String {
    let start = clamp_to_boundary(sql, span.start);
    let line_start = sql[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = sql[start..]
        .find('\n')
        .map(|i| start + i)
        .unwrap_or(sql.len());
    let line = &sql[line_start..line_end];

    let end = clamp_to_boundary(sql, span.end.max(span.start)).min(line_end);
    let padding = sql[line_start..start].chars().count();
    let width = sql[start..end].chars().count().max(1);

    format!("{}\n{}{}", line, " ".repeat(padding), "^".repeat(width))
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable error code
    pub code: ErrorCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Byte span in the SQL text
    pub span: Option<Span>,

    /// Line/column of the span (best-effort)
    pub location: Option<Location>,

    /// Candidates considered, e.g. sources for an ambiguous column
    pub candidates: Vec<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: ErrorCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            span: None,
            location: None,
            candidates: Vec::new(),
        }
    }

    /// Attach a span, computing its location within `sql`
    pub fn with_span(mut self, sql: &str, span: Span) -> Self {
        self.location = Some(Location::from_span(sql, span));
        self.span = Some(span);
        self
    }

    /// Set the candidates list
    pub fn with_candidates(mut self, candidates: Vec<String>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Render this diagnostic with a marker under the offending SQL
    pub fn render(&self, sql: &str) -> String {
        let mut out = format!("{}[{}]: {}", self.severity, self.code, self.message);
        if let Some(location) = &self.location {
            out.push_str(&format!(" (line {}, column {})", location.line, location.column));
        }
        if let Some(span) = self.span {
            out.push('\n');
            out.push_str(&render_marker(sql, span));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_stability() {
        assert_eq!(ErrorCode::AmbiguousColumn.as_str(), "AMBIGUOUS_COLUMN");
        assert_eq!(ErrorCode::SqlParseError.as_str(), "SQL_PARSE_ERROR");
        let json = serde_json::to_string(&ErrorCode::CompositeAccessOnNonComposite).unwrap();
        assert_eq!(json, "\"COMPOSITE_ACCESS_ON_NON_COMPOSITE\"");
    }

    #[test]
    fn location_from_span() {
        let sql = "SELECT id\nFROM users\nWHERE nme = 1";
        let offset = sql.find("nme").unwrap();
        let location = Location::from_span(sql, Span::new(offset, offset + 3));
        assert_eq!(location.line, 3);
        assert_eq!(location.column, 7);
        assert_eq!(location.end_column, 10);
    }

    #[test]
    fn marker_rendering() {
        let sql = "SELECT id\nFROM users\nWHERE nme = 1";
        let offset = sql.find("nme").unwrap();
        let marker = render_marker(sql, Span::new(offset, offset + 3));
        assert_eq!(marker, "WHERE nme = 1\n      ^^^");
    }

    #[test]
    fn diagnostic_serialization() {
        let sql = "SELECT id FROM a JOIN b ON a.x = b.x";
        let diag = Diagnostic::new(
            ErrorCode::AmbiguousColumn,
            Severity::Error,
            "Column 'id' is ambiguous",
        )
        .with_span(sql, Span::new(7, 9))
        .with_candidates(vec!["a".into(), "b".into()]);

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("AMBIGUOUS_COLUMN"));
        assert!(json.contains("error"));
        assert!(diag.render(sql).ends_with("       ^^"));
    }
}
