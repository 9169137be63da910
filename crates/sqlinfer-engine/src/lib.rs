//! sqlinfer engine - catalog loading and type resolution
//!
//! This crate turns extracted query interfaces into concrete types:
//! - Deriving catalog requests from a [`QueryInterface`](sqlinfer_core::QueryInterface)
//! - Loading only what a session has not loaded yet, transitively
//! - Resolving deferred types in strict or lenient mode
//! - Batch resolution with a diagnostics report

pub mod batch;
pub mod error;
pub mod loader;
pub mod requests;
pub mod resolver;
pub mod session;
pub mod store;

pub use batch::{resolve_batch, BatchOutcome, BatchQuery};
pub use error::{EngineError, LoadError};
pub use loader::{load_data, load_for_queries};
pub use requests::extract_data_requests;
pub use resolver::{resolve, Resolver};
pub use session::Session;
pub use store::LoadedStore;
