//! Shared utilities.
//!
//! Retry/backoff, clock abstraction and process bootstrap helpers.

pub mod bootstrap;
pub mod clock;
pub mod retry;
