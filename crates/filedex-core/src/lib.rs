//! Core types and traits for filedex.
//!
//! This crate provides the fundamental data structures shared by the
//! scanner, the index store and the command-line front end: file records,
//! configuration, error types and result pagination.

mod config;
mod error;
mod page;
mod query;
mod record;

pub use config::{IndexConfig, IndexConfigBuilder, DEFAULT_PAGE_SIZE};
pub use error::{ConfigError, QueryError, ScanError, ScanWarning, WarningKind};
pub use page::{Paginator, ResultPager};
pub use query::validate_query;
pub use record::{FileRecord, RecordId};
