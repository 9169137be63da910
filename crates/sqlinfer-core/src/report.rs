//! Batch report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use crate::diagnostic::{Diagnostic, Severity};
use serde::{Deserialize, Serialize};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Summary statistics for a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Number of queries in the batch
    pub queries: usize,

    /// Queries that resolved without errors
    pub resolved: usize,

    /// Queries with at least one error
    pub failed: usize,

    /// Total number of diagnostics
    pub total: usize,

    /// Number of errors
    pub errors: usize,

    /// Number of warnings
    pub warnings: usize,
}

/// Diagnostics for one query of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryReport {
    /// Caller-supplied query name (usually a file path)
    pub name: String,

    /// Diagnostics raised while parsing or resolving the query
    pub diagnostics: Vec<Diagnostic>,
}

impl QueryReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}

/// Batch report (report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Summary statistics
    pub summary: ReportSummary,

    /// Per-query diagnostics, in batch order
    pub queries: Vec<QueryReport>,
}

impl Report {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary: ReportSummary::default(),
            queries: Vec::new(),
        }
    }

    /// Record the outcome of one query
    pub fn add_query(&mut self, name: impl Into<String>, diagnostics: Vec<Diagnostic>) {
        let query = QueryReport {
            name: name.into(),
            diagnostics,
        };

        self.summary.queries += 1;
        if query.has_errors() {
            self.summary.failed += 1;
        } else {
            self.summary.resolved += 1;
        }
        for diagnostic in &query.diagnostics {
            match diagnostic.severity {
                Severity::Error => self.summary.errors += 1,
                Severity::Warn => self.summary.warnings += 1,
                Severity::Info => {}
            }
        }
        self.summary.total += query.diagnostics.len();
        self.queries.push(query);
    }

    /// Iterate over every diagnostic in the batch
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.queries.iter().flat_map(|q| q.diagnostics.iter())
    }

    /// Check if the report has any errors
    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::ErrorCode;

    #[test]
    fn empty_report() {
        let report = Report::new();
        assert_eq!(report.version, ReportVersion::CURRENT);
        assert_eq!(report.summary.queries, 0);
        assert!(!report.has_errors());
    }

    #[test]
    fn report_counts_queries() {
        let mut report = Report::new();
        report.add_query("ok.sql", vec![]);
        report.add_query(
            "bad.sql",
            vec![Diagnostic::new(
                ErrorCode::ColumnNotFound,
                Severity::Error,
                "Column 'nme' not found",
            )],
        );

        assert_eq!(report.summary.queries, 2);
        assert_eq!(report.summary.resolved, 1);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.diagnostics().count(), 1);
        assert!(report.has_errors());
    }

    #[test]
    fn report_serialization() {
        let report = Report::new();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"version\""));
        assert!(json.contains("\"queries\""));
    }
}
