//! Core types, rules and store-generic operations for the docket game.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! pure rules (lifecycle, majority, scoring, streaks, submission checks)
//! live next to the async operations that apply them through a
//! [`store::GameStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod ballot;
pub mod case;
pub mod clock;
pub mod error;
pub mod keys;
pub mod leaderboard;
pub mod lifecycle;
pub mod rules;
pub mod score;
pub mod seed;
pub mod snapshot;
pub mod store;
pub mod streak;
pub mod submission;

pub use error::{Error, Result};
