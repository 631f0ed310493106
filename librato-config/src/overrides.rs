use std::env;

/// Raw configuration values from environment variables or command line arguments.
///
/// Values are kept as strings and validated by [`Config::apply_override`](crate::Config::apply_override),
/// which reports the offending field on error.
#[derive(Clone, Debug, Default)]
pub struct OverridableConfig {
    /// The account email used for authentication.
    pub email: Option<String>,
    /// The API token used for authentication.
    pub token: Option<String>,
    /// The base URL of the metrics API.
    pub url: Option<String>,
    /// The flush period in milliseconds.
    pub period: Option<String>,
    /// The default source of all measurements.
    pub source: Option<String>,
    /// The prefix prepended to all metric names.
    pub prefix: Option<String>,
    /// `"true"` to disable all network activity, `"false"` otherwise.
    pub simulate: Option<String>,
}

/// Extracts config overrides from `LIBRATO_*` environment variables.
///
/// Unset variables leave the respective field as `None`.
pub fn extract_config_env_vars() -> OverridableConfig {
    OverridableConfig {
        email: env::var("LIBRATO_EMAIL").ok(),
        token: env::var("LIBRATO_TOKEN").ok(),
        url: env::var("LIBRATO_URL").ok(),
        period: env::var("LIBRATO_PERIOD").ok(),
        source: env::var("LIBRATO_SOURCE").ok(),
        prefix: env::var("LIBRATO_PREFIX").ok(),
        simulate: env::var("LIBRATO_SIMULATE").ok(),
    }
}
