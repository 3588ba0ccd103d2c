//! Shared error plumbing used across all nudge crates.

pub mod error;

pub use error::FromMessage;
