use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::overrides::OverridableConfig;
use crate::upstream::UpstreamUrl;

/// Additional time granted to a request on top of all attempts and their timeouts.
const REQUEST_DEADLINE_SLACK: Duration = Duration::from_secs(3);

type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Defines the source of a config error.
#[derive(Debug)]
enum ConfigErrorSource {
    /// An error occurring independently.
    None,
    /// An error originating from a configuration file.
    File(PathBuf),
    /// An error originating in a field override (an env var, or a CLI parameter).
    FieldOverride(String),
}

/// Indicates config related errors.
#[derive(Debug)]
pub struct ConfigError {
    source: ConfigErrorSource,
    kind: ConfigErrorKind,
    cause: Option<BoxError>,
}

impl ConfigError {
    #[inline]
    fn new(kind: ConfigErrorKind) -> Self {
        Self {
            source: ConfigErrorSource::None,
            kind,
            cause: None,
        }
    }

    #[inline]
    fn wrap<E>(inner: E, kind: ConfigErrorKind) -> Self
    where
        E: Into<BoxError>,
    {
        Self {
            cause: Some(inner.into()),
            ..Self::new(kind)
        }
    }

    #[inline]
    fn for_field<E>(inner: E, field: &'static str) -> Self
    where
        E: Into<BoxError>,
    {
        Self::wrap(inner, ConfigErrorKind::InvalidValue).field(field)
    }

    #[inline]
    fn file(mut self, p: impl AsRef<Path>) -> Self {
        self.source = ConfigErrorSource::File(p.as_ref().to_path_buf());
        self
    }

    #[inline]
    fn field(mut self, name: &'static str) -> Self {
        self.source = ConfigErrorSource::FieldOverride(name.to_owned());
        self
    }

    /// Returns the error kind of the error.
    pub fn kind(&self) -> ConfigErrorKind {
        self.kind
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            ConfigErrorSource::None => fmt::Display::fmt(&self.kind, f),
            ConfigErrorSource::File(file_name) => {
                write!(f, "{} (file {})", self.kind, file_name.display())
            }
            ConfigErrorSource::FieldOverride(name) => write!(f, "{} (field {})", self.kind, name),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

/// Indicates config related errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ConfigErrorKind {
    /// Failed to open the file.
    #[error("could not open config file")]
    CouldNotOpenFile,
    /// Failed to serialize or save a file.
    #[error("could not write config file")]
    CouldNotWriteFile,
    /// Parsing YAML failed.
    #[error("could not parse yaml config file")]
    BadYaml,
    /// Parsing JSON failed.
    #[error("could not parse json config file")]
    BadJson,
    /// Invalid config value.
    #[error("invalid config value")]
    InvalidValue,
}

/// Authentication with the metrics API.
///
/// Both values are required to send data. Empty strings are treated as missing.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(default)]
struct CredentialsConfig {
    /// The email address of the account.
    email: Option<String>,
    /// The API token.
    token: Option<String>,
}

/// Account credentials for the metrics API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// The email address of the account.
    pub email: String,
    /// The API token.
    pub token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("token", &"[redacted]")
            .finish()
    }
}

/// Controls requests to the metrics API.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
struct Http {
    /// The base URL of the metrics API.
    url: UpstreamUrl,
    /// Timeout of a single request attempt in milliseconds.
    timeout: u64,
    /// Number of retries after the first failed attempt.
    ///
    /// Requests are retried on network errors, timeouts and server errors. Client errors are
    /// never retried.
    retry_count: u32,
    /// Maximum delay between two attempts in milliseconds.
    max_retry_interval: u64,
}

impl Default for Http {
    fn default() -> Self {
        Self {
            url: UpstreamUrl::default(),
            timeout: 59_000,
            retry_count: 3,
            max_retry_interval: 960,
        }
    }
}

/// Controls collection and periodic delivery of metrics.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
struct Metrics {
    /// The flush period in milliseconds.
    ///
    /// Flushes are aligned to multiples of this period in Unix time.
    period: u64,
    /// The default source of all measurements that do not specify one.
    source: Option<String>,
    /// A prefix prepended to all metric names.
    prefix: Option<String>,
    /// Disables all network activity.
    simulate: bool,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            period: 60_000,
            source: None,
            prefix: None,
            simulate: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
struct ConfigValues {
    #[serde(default)]
    credentials: CredentialsConfig,
    #[serde(default)]
    http: Http,
    #[serde(default)]
    metrics: Metrics,
    #[serde(default)]
    logging: librato_log::LogConfig,
}

impl ConfigValues {
    /// The basename of the config file.
    const NAME: &'static str = "config.yml";

    /// Loads the config file from the given directory.
    fn load(base: &Path) -> Result<Self, ConfigError> {
        let path = base.join(Self::NAME);

        let f = fs::File::open(&path)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotOpenFile).file(&path))?;

        serde_yaml::from_reader(io::BufReader::new(f))
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml).file(&path))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.metrics.period == 0 {
            return Err(ConfigError::new(ConfigErrorKind::InvalidValue).field("metrics.period"));
        }

        Ok(())
    }
}

/// Config struct.
#[derive(Clone, Default)]
pub struct Config {
    values: ConfigValues,
    path: PathBuf,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field("credentials", &self.credentials())
            .field("http", &self.values.http)
            .field("metrics", &self.values.metrics)
            .finish()
    }
}

impl Config {
    /// Loads a config from a given config folder.
    ///
    /// The folder must contain a `config.yml` file. Missing sections and fields use their
    /// defaults.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = std::env::current_dir()
            .map(|x| x.join(path.as_ref()))
            .unwrap_or_else(|_| path.as_ref().to_path_buf());

        let values = ConfigValues::load(&path)?;
        values.validate().map_err(|e| e.file(&path))?;

        Ok(Config { values, path })
    }

    /// Creates a config from a JSON value.
    ///
    /// This is mostly useful for tests.
    pub fn from_json_value(value: serde_json::Value) -> Result<Config, ConfigError> {
        let values: ConfigValues = serde_json::from_value(value)
            .map_err(|err| ConfigError::wrap(err, ConfigErrorKind::BadJson))?;
        values.validate()?;

        Ok(Config {
            values,
            path: PathBuf::new(),
        })
    }

    /// Creates a default config with the given account credentials.
    pub fn with_credentials(email: impl Into<String>, token: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.values.credentials = CredentialsConfig {
            email: Some(email.into()),
            token: Some(token.into()),
        };
        config
    }

    /// Creates a default config in simulation mode.
    ///
    /// Measurements are collected, but never sent.
    pub fn simulate() -> Self {
        let mut config = Self::default();
        config.values.metrics.simulate = true;
        config
    }

    /// Override configuration with values coming from other sources (e.g. env variables or
    /// command line parameters).
    pub fn apply_override(
        &mut self,
        overrides: OverridableConfig,
    ) -> Result<&mut Self, ConfigError> {
        let credentials = &mut self.values.credentials;
        if let Some(email) = overrides.email {
            credentials.email = Some(email);
        }
        if let Some(token) = overrides.token {
            credentials.token = Some(token);
        }

        let http = &mut self.values.http;
        if let Some(url) = overrides.url {
            http.url = url
                .parse::<UpstreamUrl>()
                .map_err(|err| ConfigError::for_field(err, "url"))?;
        }

        let metrics = &mut self.values.metrics;
        if let Some(period) = overrides.period {
            metrics.period = period
                .parse()
                .map_err(|err| ConfigError::for_field(err, "period"))?;
        }

        if let Some(source) = overrides.source {
            metrics.source = Some(source).filter(|s| !s.is_empty());
        }

        if let Some(prefix) = overrides.prefix {
            metrics.prefix = Some(prefix).filter(|s| !s.is_empty());
        }

        if let Some(simulate) = overrides.simulate {
            match simulate.to_lowercase().as_str() {
                "true" | "1" => metrics.simulate = true,
                "false" | "0" | "" => metrics.simulate = false,
                _ => {
                    return Err(ConfigError::new(ConfigErrorKind::InvalidValue).field("simulate"));
                }
            }
        }

        self.values.validate().map_err(|e| e.field("period"))?;
        Ok(self)
    }

    /// Serializes the effective configuration to YAML with the API token masked.
    pub fn to_redacted_yaml_string(&self) -> Result<String, ConfigError> {
        let mut values = self.values.clone();
        if let Some(ref mut token) = values.credentials.token {
            "[redacted]".clone_into(token);
        }

        serde_yaml::to_string(&values)
            .map_err(|err| ConfigError::wrap(err, ConfigErrorKind::CouldNotWriteFile))
    }

    /// Returns the path of the config folder, empty if the config was not loaded from disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the account credentials, if both email and token are set and non-empty.
    pub fn credentials(&self) -> Option<Credentials> {
        let CredentialsConfig { email, token } = &self.values.credentials;
        match (email.as_deref(), token.as_deref()) {
            (Some(email), Some(token)) if !email.is_empty() && !token.is_empty() => {
                Some(Credentials {
                    email: email.to_owned(),
                    token: token.to_owned(),
                })
            }
            _ => None,
        }
    }

    /// Returns the base URL of the metrics API.
    pub fn upstream(&self) -> &UpstreamUrl {
        &self.values.http.url
    }

    /// Returns the timeout of a single request attempt.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.values.http.timeout)
    }

    /// Returns the number of retries after the first failed attempt.
    pub fn http_retry_count(&self) -> u32 {
        self.values.http.retry_count
    }

    /// Returns the maximum delay between two attempts.
    pub fn http_max_retry_interval(&self) -> Duration {
        Duration::from_millis(self.values.http.max_retry_interval)
    }

    /// Returns the upper bound for sending one request, including all retries.
    ///
    /// This is the attempt timeout multiplied by the number of attempts, plus three seconds.
    pub fn request_deadline(&self) -> Duration {
        let attempts = self.http_retry_count().saturating_add(1);
        self.http_timeout().saturating_mul(attempts) + REQUEST_DEADLINE_SLACK
    }

    /// Returns the flush period.
    pub fn flush_period(&self) -> Duration {
        Duration::from_millis(self.values.metrics.period)
    }

    /// Returns the default source of measurements.
    pub fn source(&self) -> Option<&str> {
        self.values.metrics.source.as_deref()
    }

    /// Returns the prefix prepended to all metric names.
    pub fn prefix(&self) -> Option<&str> {
        self.values.metrics.prefix.as_deref()
    }

    /// Returns `true` if network activity is disabled.
    pub fn simulate_enabled(&self) -> bool {
        self.values.metrics.simulate
    }

    /// Returns logging configuration.
    pub fn logging(&self) -> &librato_log::LogConfig {
        &self.values.logging
    }
}
