//! Layered configuration.
//!
//! Values come from a TOML, YAML or JSON file, then environment variables
//! with a prefix (`FORUMGATE` by default) and `__` between nested keys:
//!
//! ```text
//! FORUMGATE__API__HOST=https://forum.example.org
//! FORUMGATE__SSO__SHARED_SECRET=...
//! FORUMGATE__RETRY__MAX_ATTEMPTS=3
//! ```
//!
//! ```toml
//! [api]
//! host = "https://forum.example.org"
//! api_username = "system"
//! api_key = "..."
//! timeout_secs = 30
//!
//! [sso]
//! shared_secret = "..."
//! provider_url = "https://forum.example.org"
//!
//! [retry]
//! max_attempts = 5
//! backoff_secs = 1
//!
//! [logging]
//! level = "info"
//! structured = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use forumgate_client::{ApiClient, ApiError, Credentials, RetryPolicy};
use forumgate_sso::{SsoConfig, SsoError, SsoProtocol};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "FORUMGATE";

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// A value is present but unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The SSO settings were refused
    #[error("Invalid SSO configuration: {0}")]
    Sso(#[from] SsoError),

    /// The API client could not be created
    #[error("Failed to create API client: {0}")]
    Client(#[from] ApiError),
}

/// Admin API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Forum base URL
    pub host: String,
    /// User the API key acts as
    pub api_username: String,
    /// API key
    #[serde(
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub api_key: SecretString,
    /// Per-call timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// SSO settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsoSettings {
    /// Secret shared with the forum
    #[serde(
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub shared_secret: SecretString,
    /// Forum base URL that serves `/session/sso_provider`
    pub provider_url: String,
}

/// Rate-limit retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per call
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Seconds added to the server's suggested wait
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_level")]
    pub level: String,
    /// JSON output instead of human-readable lines
    #[serde(default)]
    pub structured: bool,
}

/// Complete configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumgateConfig {
    /// Admin API
    pub api: ApiConfig,
    /// SSO handshake
    pub sso: SsoSettings,
    /// Retry policy
    #[serde(default)]
    pub retry: RetryConfig,
    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn serialize_secret<S>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(secret.expose_secret())
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    Ok(SecretString::new(s))
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_secs() -> u64 {
    1
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            structured: false,
        }
    }
}

impl ForumgateConfig {
    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// Environment variables with the `FORUMGATE__` prefix override file
    /// settings, e.g. `FORUMGATE__API__TIMEOUT_SECS=10`.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use forumgate::ForumgateConfig;
    ///
    /// let config = ForumgateConfig::from_file("forumgate.toml").expect("Failed to load config");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist
    /// - The file format is unsupported
    /// - The file contains invalid configuration
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_prefix(path, DEFAULT_ENV_PREFIX)
    }

    /// Load configuration from a file with a custom environment prefix
    ///
    /// # Errors
    ///
    /// Same as [`ForumgateConfig::from_file`].
    pub fn from_file_with_prefix(
        path: impl AsRef<Path>,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        Self::load(file_builder(path.as_ref())?, environment(env_prefix, None))
    }

    /// Load configuration from a file, taking overrides from `vars`
    /// instead of the process environment
    ///
    /// `vars` uses the same names as real variables, e.g.
    /// `("FORUMGATE__API__API_KEY", "...")`.
    ///
    /// # Errors
    ///
    /// Same as [`ForumgateConfig::from_file`].
    pub fn from_file_with_env_vars<I, K, V>(
        path: impl AsRef<Path>,
        env_prefix: &str,
        vars: I,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::load(
            file_builder(path.as_ref())?,
            environment(env_prefix, Some(collect_vars(vars))),
        )
    }

    /// Load configuration from environment variables only
    ///
    /// # Errors
    ///
    /// Returns an error if required values are missing or invalid.
    pub fn from_env(env_prefix: &str) -> Result<Self, ConfigError> {
        Self::load(config::Config::builder(), environment(env_prefix, None))
    }

    /// Load configuration from the given variables only
    ///
    /// # Errors
    ///
    /// Returns an error if required values are missing or invalid.
    pub fn from_env_vars<I, K, V>(env_prefix: &str, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::load(
            config::Config::builder(),
            environment(env_prefix, Some(collect_vars(vars))),
        )
    }

    fn load(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        environment: config::Environment,
    ) -> Result<Self, ConfigError> {
        let settings = builder.add_source(environment).build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration builder
    ///
    /// # Example
    ///
    /// ```rust
    /// use forumgate::ForumgateConfig;
    ///
    /// let config = ForumgateConfig::builder()
    ///     .api("https://forum.example.org", "system", "api-key")
    ///     .sso("shared-secret", "https://forum.example.org")
    ///     .max_attempts(3)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.retry.max_attempts, 3);
    /// ```
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    /// Check values that deserialize fine but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_http_url("api.host", &self.api.host)?;
        parse_http_url("sso.provider_url", &self.sso.provider_url)?;
        if self.api.api_username.trim().is_empty() {
            return Err(ConfigError::Invalid("api.api_username is empty".into()));
        }
        if self.api.api_key.expose_secret().is_empty() {
            return Err(ConfigError::Invalid("api.api_key is empty".into()));
        }
        if self.sso.shared_secret.expose_secret().is_empty() {
            return Err(ConfigError::Invalid("sso.shared_secret is empty".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.api.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("api.timeout_secs must be positive".into()));
        }
        tracing_subscriber::EnvFilter::try_new(&self.logging.level).map_err(|e| {
            ConfigError::Invalid(format!("logging.level '{}': {e}", self.logging.level))
        })?;
        Ok(())
    }

    /// API credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `api.host` is not an HTTP(S) URL.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let host = parse_http_url("api.host", &self.api.host)?;
        let credentials = Credentials::new(
            host,
            self.api.api_username.clone(),
            self.api.api_key.clone(),
        );
        Ok(match self.api.timeout_secs {
            Some(secs) => credentials.with_timeout(Duration::from_secs(secs)),
            None => credentials,
        })
    }

    /// SSO configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `sso.provider_url` is not an
    /// HTTP(S) URL.
    pub fn sso_config(&self) -> Result<SsoConfig, ConfigError> {
        let provider_url = parse_http_url("sso.provider_url", &self.sso.provider_url)?;
        Ok(SsoConfig::from_parts(
            self.sso.shared_secret.clone(),
            provider_url,
        ))
    }

    /// Retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            backoff: Duration::from_secs(self.retry.backoff_secs),
        }
    }

    /// API client over the default transport with this retry policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are invalid or the HTTP client
    /// cannot be built.
    pub fn api_client(&self) -> Result<ApiClient, ConfigError> {
        let executor = forumgate_client::HttpRequestExecutor::new(self.credentials()?)?
            .with_retry_policy(self.retry_policy());
        Ok(ApiClient::from_executor(executor))
    }

    /// SSO protocol with the default login hooks.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider URL or shared secret is unusable.
    pub fn sso_protocol(&self) -> Result<SsoProtocol, ConfigError> {
        Ok(SsoProtocol::new(&self.sso_config()?)?)
    }
}

fn parse_http_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::Invalid(format!("{field} '{value}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Invalid(format!(
            "{field} must use http or https, got '{other}'"
        ))),
    }
}

fn file_builder(
    path: &Path,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    use config::{File, FileFormat};

    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let format = match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => FileFormat::Toml,
        Some("yaml" | "yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        _ => return Err(ConfigError::UnsupportedFormat),
    };
    let file = File::new(path.to_str().ok_or(ConfigError::UnsupportedFormat)?, format);

    Ok(config::Config::builder().add_source(file))
}

/// `PREFIX__SECTION__KEY` variables, read from `vars` or the process
/// environment.
///
/// Values stay strings: secrets and usernames such as `007` must not be
/// reinterpreted as numbers. Numeric and boolean fields are converted during
/// deserialization.
fn environment(
    env_prefix: &str,
    vars: Option<config::Map<String, String>>,
) -> config::Environment {
    config::Environment::with_prefix(env_prefix)
        .prefix_separator("__")
        .separator("__")
        .source(vars)
}

fn collect_vars<I, K, V>(vars: I) -> config::Map<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    vars.into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Configuration builder
#[derive(Debug, Default)]
pub struct ConfigurationBuilder {
    api: Option<ApiConfig>,
    sso: Option<SsoSettings>,
    retry: RetryConfig,
    logging: LoggingConfig,
}

impl ConfigurationBuilder {
    /// Create a new configuration builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the admin API host and credentials
    #[must_use]
    pub fn api(
        mut self,
        host: impl Into<String>,
        api_username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let timeout_secs = self.api.as_ref().and_then(|api| api.timeout_secs);
        self.api = Some(ApiConfig {
            host: host.into(),
            api_username: api_username.into(),
            api_key: SecretString::new(api_key.into()),
            timeout_secs,
        });
        self
    }

    /// Set the per-call timeout. Has no effect before [`Self::api`].
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        if let Some(api) = self.api.as_mut() {
            api.timeout_secs = Some(timeout.as_secs().max(1));
        }
        self
    }

    /// Set the SSO shared secret and provider
    #[must_use]
    pub fn sso(mut self, shared_secret: impl Into<String>, provider_url: impl Into<String>) -> Self {
        self.sso = Some(SsoSettings {
            shared_secret: SecretString::new(shared_secret.into()),
            provider_url: provider_url.into(),
        });
        self
    }

    /// Set the maximum number of attempts per call
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry.max_attempts = max_attempts;
        self
    }

    /// Set the fixed backoff in seconds
    #[must_use]
    pub const fn backoff_secs(mut self, backoff_secs: u64) -> Self {
        self.retry.backoff_secs = backoff_secs;
        self
    }

    /// Set the log filter
    #[must_use]
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.logging.level = level.into();
        self
    }

    /// Enable JSON log output
    #[must_use]
    pub const fn structured_logs(mut self, structured: bool) -> Self {
        self.logging.structured = structured;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the API or SSO section was never
    /// set, or any value fails [`ForumgateConfig::validate`].
    pub fn build(self) -> Result<ForumgateConfig, ConfigError> {
        let config = ForumgateConfig {
            api: self
                .api
                .ok_or_else(|| ConfigError::Invalid("api section is required".into()))?,
            sso: self
                .sso
                .ok_or_else(|| ConfigError::Invalid("sso section is required".into()))?,
            retry: self.retry,
            logging: self.logging,
        };
        config.validate()?;
        Ok(config)
    }
}
