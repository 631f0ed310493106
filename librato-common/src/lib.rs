//! Common functionality for the Librato metrics client.
//!
//! This crate holds the small building blocks shared by the other workspace crates: Unix time
//! representations with second and millisecond precision, and the exponential [`RetryBackoff`]
//! used when delivering batches to the metrics backend.

#![warn(missing_docs)]

mod retry;
pub mod time;

pub use crate::retry::*;
pub use crate::time::{UnixMillis, UnixTimestamp};
