use mk_facts::ExclusionPattern;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Registration endpoint used when nothing else is configured
pub const DEFAULT_REGISTRATION_URI: &str = "http://razor:8026/razor/api/node/register";

/// Configuration for the registration manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrationConfig {
    /// Absolute URI the registration form is posted to
    #[serde(default = "default_uri")]
    pub uri: String,

    /// Fact names matching this regex are never collected or sent
    #[serde(default)]
    pub exclude_pattern: Option<String>,

    /// Number of leading hostname characters dropped to form the node identity
    #[serde(default = "default_identity_prefix_len")]
    pub identity_prefix_len: usize,

    /// Upper bound for one registration exchange, body read included
    #[serde(default = "default_request_timeout", with = "duration_str")]
    pub request_timeout: Duration,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Accept `http://` registration URIs
    #[serde(default = "default_allow_insecure_http")]
    pub allow_insecure_http: bool,
}

fn default_uri() -> String {
    DEFAULT_REGISTRATION_URI.to_owned()
}

fn default_identity_prefix_len() -> usize {
    2
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("mk-agent/", env!("CARGO_PKG_VERSION")).to_owned()
}

fn default_allow_insecure_http() -> bool {
    true
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            exclude_pattern: None,
            identity_prefix_len: default_identity_prefix_len(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            allow_insecure_http: default_allow_insecure_http(),
        }
    }
}

/// Invalid registration configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid registration URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error(transparent)]
    InvalidExclusionPattern(#[from] mk_facts::FactsError),

    #[error("identity_prefix_len must be at least 1")]
    InvalidIdentityPrefixLen,

    #[error("request_timeout must be greater than zero")]
    InvalidRequestTimeout,
}

impl RegistrationConfig {
    /// Check every field without building anything
    ///
    /// # Errors
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_uri()?;
        self.exclusion()?;
        if self.identity_prefix_len == 0 {
            return Err(ConfigError::InvalidIdentityPrefixLen);
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidRequestTimeout);
        }
        Ok(())
    }

    /// Compile the exclusion pattern, if any
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidExclusionPattern` if the regex does not compile.
    pub fn exclusion(&self) -> Result<Option<ExclusionPattern>, ConfigError> {
        self.exclude_pattern
            .as_deref()
            .map(ExclusionPattern::new)
            .transpose()
            .map_err(ConfigError::from)
    }

    fn validate_uri(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidUri {
            uri: self.uri.clone(),
            reason: reason.to_owned(),
        };

        let parsed = url::Url::parse(&self.uri).map_err(|e| invalid(&e.to_string()))?;
        match parsed.scheme() {
            "https" => {}
            "http" if self.allow_insecure_http => {}
            "http" => return Err(invalid("plain http requires allow_insecure_http")),
            other => return Err(invalid(&format!("unsupported scheme '{other}'"))),
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(invalid("missing host"));
        }
        Ok(())
    }
}

/// Durations as humantime strings (`"30s"`, `"1m 30s"`).
///
/// A bare integer is read as whole seconds, so `MK_AGENT__..._TIMEOUT=30`
/// works from the environment.
mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(raw) => humantime::parse_duration(&raw).map_err(de::Error::custom),
        }
    }
}
