//! SQL parsing and static type extraction
//!
//! This crate handles:
//! - Parsing a single PostgreSQL statement with a hand-written combinator grammar
//! - Partial parsing of statements that are still being typed
//! - Extracting a schema independent [`QueryInterface`](sqlinfer_core::QueryInterface)
//!   from a statement
//! - Operator overloads and builtin functions typed without the catalog
//! - Splicing positional placeholders for named parameters

pub mod ast;
pub mod combinator;
pub mod functions;
pub mod grammar;
pub mod inference;
pub mod operators;
pub mod parser;
pub mod template;

pub use ast::Statement;
pub use inference::{result_name, to_query_interface};
pub use parser::{parse, parse_partial, ParseError};
pub use template::{to_positional, PositionalQuery, TemplateError, TemplateParam};
