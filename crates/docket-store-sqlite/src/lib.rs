//! SQLite backend for the docket game store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Every call is serialised on
//! that thread and multi-step mutations run inside one transaction, which
//! is what makes vote counting, status transitions and weekly points atomic.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
