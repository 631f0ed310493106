//! A buffering client for the Librato metrics API.
//!
//! Application code records counters and gauges on a [`Librato`] client. Recording is
//! synchronous and never blocks on the network. Measurements are aggregated in memory (see
//! [`librato_metrics`]) and delivered in one request per flush period.
//!
//! # Flush Schedule
//!
//! After [`Librato::init`], flushes happen at multiples of the configured period in Unix time.
//! With the default period of one minute, all clients flush at the start of every minute. A flush
//! that takes longer than one period does not cause a backlog: the next flush happens
//! immediately after, and the schedule then resumes at the next boundary.
//!
//! Flushes never overlap. [`Librato::end`] stops the schedule, waits for a running flush and then
//! flushes the remaining measurements exactly once.
//!
//! # Delivery Outcomes
//!
//! Errors never propagate to the recording call site. Every flush and annotation reports its
//! outcome through [`ClientEvent`]s:
//!
//! ```no_run
//! use librato_client::{ClientEvent, Config, Librato};
//!
//! # async fn run() {
//! let client = Librato::new();
//! let mut events = client.subscribe();
//! client.init(Config::with_credentials("ops@example.com", "token"));
//!
//! while let Ok(event) = events.recv().await {
//!     if let ClientEvent::Error(error) = event {
//!         eprintln!("metrics delivery failed: {error}");
//!     }
//! }
//! # }
//! ```

#![warn(missing_docs)]

mod annotation;
mod client;
mod clock;
mod error;
mod events;
mod pipeline;
mod scheduler;
mod sender;

#[cfg(test)]
mod testutils;

pub use crate::annotation::*;
pub use crate::client::*;
pub use crate::clock::*;
pub use crate::error::*;
pub use crate::events::ClientEvent;
pub use crate::sender::*;

pub(crate) use crate::events::EventPublisher;

pub use librato_common::{UnixMillis, UnixTimestamp};
pub use librato_config::Config;
pub use librato_metrics::{MeasurementOptions, Tags};
