//! Command line interface of the Librato metrics client.
//!
//! The binary records a single counter, a set of gauge samples or an annotation and delivers it
//! immediately. It is meant for shell scripts and deployment pipelines:
//!
//! ```text
//! librato increment deploys --tag service=api
//! librato measure build.duration 184.2
//! librato annotate "Deploy API" --description "shipped v2" --stream deployments
//! ```
//!
//! Credentials are read from the `config.yml` file in the folder passed with `--config`, from the
//! `LIBRATO_EMAIL` and `LIBRATO_TOKEN` environment variables, or from the command line, in
//! increasing order of precedence.
//!
//! # Workspace Crates
//!
//!  - `librato`: Main entry point and command line interface.
//!  - [`librato-client`]: The buffering client with aligned periodic delivery.
//!  - [`librato-common`]: Common utilities, such as timestamps and retry backoff.
//!  - [`librato-config`]: Static configuration for the CLI and the client.
//!  - [`librato-log`]: Logging setup and macros.
//!  - [`librato-metrics`]: Counter and gauge collection and aggregation.
//!  - [`librato-test`]: Helpers for testing against a mock metrics API.
//!
//! [`librato-client`]: ../librato_client/index.html
//! [`librato-common`]: ../librato_common/index.html
//! [`librato-config`]: ../librato_config/index.html
//! [`librato-log`]: ../librato_log/index.html
//! [`librato-metrics`]: ../librato_metrics/index.html
//! [`librato-test`]: ../librato_test/index.html

mod cli;
mod cliapp;
mod setup;

use std::process;

pub fn main() {
    let exit_code = match cli::execute() {
        Ok(()) => 0,
        Err(err) => {
            librato_log::ensure_error(&err);
            1
        }
    };

    process::exit(exit_code);
}
