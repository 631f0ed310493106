//! Helpers for testing the Librato metrics client.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output is
//!    captured by the test runner. All logs emitted with [`librato_log`] will show up for test
//!    failures or when run with `--nocapture`.
//!  - To test delivery over HTTP, spawn a [`MockBackend`] and point the client's upstream URL at
//!    [`MockBackend::url`].
//!
//! # Example
//!
//! ```no_run
//! #[test]
//! fn my_test() {
//!     librato_test::setup();
//!
//!     librato_log::debug!("hello, world!");
//! }
//! ```

mod backend;

pub use self::backend::*;

/// Setup the test environment.
///
///  - Initializes logs: The logger captures logs from the calling crate and all crates of this
///    workspace, and mutes all other logs.
pub fn setup() {
    librato_log::init_test!();
}
