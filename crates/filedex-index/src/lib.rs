//! Persistent file index and path search for filedex.
//!
//! Records produced by `filedex-scan` are stored in a SQLite database with
//! an FTS5 trigram index over their paths, which makes any substring of a
//! path searchable. A rebuild replaces the whole index in one transaction;
//! searches running at the same time see the previous generation until it
//! commits.
//!
//! # Example
//!
//! ```rust,no_run
//! use filedex_core::IndexConfig;
//! use filedex_index::Indexer;
//! use tokio_util::sync::CancellationToken;
//!
//! # fn main() -> Result<(), filedex_index::IndexError> {
//! let indexer = Indexer::open(IndexConfig::default())?;
//! if indexer.is_index_empty()? {
//!     indexer.rebuild_index_from_scan(&CancellationToken::new())?;
//! }
//!
//! let mut pager = indexer.search("report")?;
//! for record in pager.next_page() {
//!     println!("{}", record.path.display());
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod indexer;
mod search;
mod store;

pub use error::{IndexError, Result};
pub use indexer::{Indexer, RebuildOutcome, RebuildReport};
pub use search::SearchEngine;
pub use store::{IndexStore, RebuildCommit};
