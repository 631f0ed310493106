//! Configuration for the Librato metrics client.
//!
//! The configuration is read from a `config.yml` file in a configuration directory, see
//! [`Config::from_path`]. Individual values can be overridden through environment variables,
//! see [`extract_config_env_vars`] and [`Config::apply_override`].
//!
//! # Example
//!
//! ```yaml
//! credentials:
//!   email: ops@example.com
//!   token: 75AFDB82
//! metrics:
//!   period: 60000
//!   source: web-1
//! ```

#![warn(missing_docs)]

mod config;
mod overrides;
mod upstream;

pub use crate::config::*;
pub use crate::overrides::*;
pub use crate::upstream::*;
