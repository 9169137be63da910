//! sqlinfer core
//!
//! Stable domain model shared by the parser, the catalog boundary and the
//! resolution engine. Never rename error codes - they are part of the public API.

pub mod config;
pub mod diagnostic;
pub mod loaded;
pub mod pg_types;
pub mod query;
pub mod report;
pub mod types;

pub use config::{CatalogConfig, Config, ConfigError, ResolveMode};
pub use diagnostic::{render_marker, Diagnostic, ErrorCode, Location, Severity};
pub use loaded::{
    DataKey, DataKind, DataRequests, LoadedAttribute, LoadedColumn, LoadedData, QualifiedName,
};
pub use query::{
    LoadedParam, LoadedQueryInterface, LoadedResult, Param, QueryInterface, ResultColumn, Source,
};
pub use report::{QueryReport, Report, ReportSummary, ReportVersion};
pub use types::{
    Attribute, Load, LoadAttribute, OperatorPart, OperatorVariant, Span, Type, TypeKind,
    TypeOrLoad,
};
