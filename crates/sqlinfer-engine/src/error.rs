//! Resolution and session errors

use sqlinfer_catalog::FetchError;
use sqlinfer_core::{Diagnostic, ErrorCode, Severity, Span};
use sqlinfer_sql::ParseError;

/// Semantically valid SQL that cannot be typed against the loaded catalog
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct LoadError {
    /// Stable error code
    pub code: ErrorCode,

    /// Offending span of the SQL text, when the deferred type carried one
    pub span: Option<Span>,

    pub message: String,

    /// Sources, function variants or fields that were considered
    pub candidates: Vec<String>,
}

impl LoadError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            span: None,
            message: message.into(),
            candidates: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<String>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Lookups that lenient mode replaces with `Unknown`
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::ColumnNotFound
                | ErrorCode::FunctionNotFound
                | ErrorCode::NoMatchingFunction
                | ErrorCode::UnknownPostgresType
                | ErrorCode::TableNotFound
        )
    }

    /// Convert to a diagnostic pointing into `sql`
    pub fn to_diagnostic(&self, sql: &str) -> Diagnostic {
        let diagnostic = Diagnostic::new(self.code, Severity::Error, self.message.clone())
            .with_candidates(self.candidates.clone());
        match self.span {
            Some(span) => diagnostic.with_span(sql, span),
            None => diagnostic,
        }
    }
}

/// Anything that can fail while turning SQL text into a resolved interface
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Catalog error: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

impl EngineError {
    pub fn to_diagnostic(&self, sql: &str) -> Diagnostic {
        match self {
            EngineError::Fetch(error) => {
                Diagnostic::new(ErrorCode::CatalogError, Severity::Error, error.to_string())
            }
            EngineError::Load(error) => error.to_diagnostic(sql),
            EngineError::Parse(error) => error.to_diagnostic(sql),
        }
    }
}
