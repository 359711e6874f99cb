//! Configuration types for imagen-dispatch

use crate::error::{Error, Result};
use crate::types::{AspectRatio, CredentialId, Style};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Remote service endpoint and per-request timeouts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Service base URL (default: "https://api-key.fusionbrain.ai/")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for the pipeline listing request (default: 25s)
    #[serde(with = "duration_serde", default = "default_list_timeout")]
    pub list_timeout: Duration,

    /// Timeout for the job submission request (default: 45s)
    #[serde(with = "duration_serde", default = "default_run_timeout")]
    pub run_timeout: Duration,

    /// Timeout for each status request (default: 25s)
    #[serde(with = "duration_serde", default = "default_status_timeout")]
    pub status_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            list_timeout: default_list_timeout(),
            run_timeout: default_run_timeout(),
            status_timeout: default_status_timeout(),
        }
    }
}

/// Which entry of the pipeline listing a client binds to
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineSelector {
    /// Required pipeline status (default: "ACTIVE")
    #[serde(default = "default_pipeline_status")]
    pub status: String,

    /// Required pipeline type (default: "TEXT2IMAGE")
    #[serde(default = "default_pipeline_kind")]
    pub kind: String,

    /// Expected generation version (default: 3.1)
    ///
    /// Entries that carry no version field at all are accepted as a fallback
    /// when no entry matches this version exactly.
    #[serde(default = "default_pipeline_version")]
    pub version: Option<f64>,
}

impl Default for PipelineSelector {
    fn default() -> Self {
        Self {
            status: default_pipeline_status(),
            kind: default_pipeline_kind(),
            version: default_pipeline_version(),
        }
    }
}

/// Status polling budget
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Maximum number of status requests per job (default: 30)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between two status requests (default: 7s)
    #[serde(with = "duration_serde", default = "default_poll_delay")]
    pub delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay: default_poll_delay(),
        }
    }
}

/// Defaults applied to requests and prompt limits
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationDefaults {
    /// Default style (default: DEFAULT)
    #[serde(default)]
    pub style: Style,

    /// Default aspect ratio (default: 1:1)
    #[serde(default)]
    pub aspect_ratio: AspectRatio,

    /// Images per job (default: 1)
    #[serde(default = "default_num_images")]
    pub num_images: u32,

    /// Longest prompt the remote accepts, in characters (default: 1000)
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            style: Style::default(),
            aspect_ratio: AspectRatio::default(),
            num_images: default_num_images(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

/// One key/secret pair granting access to the generation service
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Numbering taken from the environment (0 for the unnumbered pair)
    pub id: CredentialId,
    /// API key (sent as `X-Key: Key <api_key>`)
    pub api_key: String,
    /// Secret key (sent as `X-Secret: Secret <secret_key>`)
    pub secret_key: String,
}

impl Credential {
    /// Create a credential
    pub fn new(id: u32, api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            id: CredentialId(id),
            api_key: api_key.into(),
            secret_key: secret_key.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("api_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Main configuration for [`ImageGenerator`](crate::ImageGenerator)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Credentials, in the order they were configured (at least one required)
    #[serde(default)]
    pub credentials: Vec<Credential>,

    /// Remote endpoint settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Pipeline selection rules
    #[serde(default)]
    pub pipeline: PipelineSelector,

    /// Polling budget
    #[serde(default)]
    pub polling: PollConfig,

    /// Request defaults and prompt limits
    #[serde(default)]
    pub defaults: GenerationDefaults,

    /// How long `shutdown()` waits for in-flight jobs (default: 60s)
    #[serde(with = "duration_serde", default = "default_shutdown_grace")]
    pub shutdown_grace: Duration,
}

impl Config {
    /// Default configuration with credentials scanned from the process environment
    ///
    /// Uses the unprefixed `API_KEY_n` / `SECRET_KEY_n` scheme. Load a `.env`
    /// file beforehand (e.g. with `dotenvy`) if the credentials live there.
    pub fn from_env() -> Result<Self> {
        let credentials = CredentialLoader::default().load_from_env();
        let config = Self {
            credentials,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for conditions that make the service impossible to start
    pub fn validate(&self) -> Result<()> {
        if self.credentials.is_empty() {
            return Err(Error::config(
                "no credentials configured (expected API_KEY_1/SECRET_KEY_1, ...)",
                "credentials",
            ));
        }
        for credential in &self.credentials {
            if credential.api_key.trim().is_empty() || credential.secret_key.trim().is_empty() {
                return Err(Error::config(
                    format!("credential {} has an empty key or secret", credential.id),
                    "credentials",
                ));
            }
        }
        self.validate_settings()
    }

    /// Checks everything except the credential list
    pub(crate) fn validate_settings(&self) -> Result<()> {
        if self.polling.max_attempts == 0 {
            return Err(Error::config(
                "max_attempts must be at least 1",
                "polling.max_attempts",
            ));
        }
        if self.defaults.max_prompt_chars == 0 {
            return Err(Error::config(
                "max_prompt_chars must be at least 1",
                "defaults.max_prompt_chars",
            ));
        }
        url::Url::parse(&self.api.base_url).map_err(|e| {
            Error::config(
                format!("invalid base URL '{}': {}", self.api.base_url, e),
                "api.base_url",
            )
        })?;
        Ok(())
    }
}

/// Scans numbered credential pairs out of an environment
///
/// Pairs are read as `{prefix}API_KEY_n` / `{prefix}SECRET_KEY_n` for
/// n = 1, 2, 3, ... and the scan stops at the first index where either half
/// is missing. When not a single numbered pair exists, the unnumbered
/// `{prefix}API_KEY` / `{prefix}SECRET_KEY` pair is used with id 0.
#[derive(Clone, Debug, Default)]
pub struct CredentialLoader {
    prefix: String,
}

impl CredentialLoader {
    /// Loader for variables starting with `prefix` (e.g. `"FUSION_BRAIN_"`)
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Scan the process environment
    pub fn load_from_env(&self) -> Vec<Credential> {
        self.load(|name| std::env::var(name).ok())
    }

    /// Scan an arbitrary variable lookup
    pub fn load<F>(&self, lookup: F) -> Vec<Credential>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: String| lookup(&name).filter(|v| !v.trim().is_empty());

        let mut credentials = Vec::new();
        for n in 1u32.. {
            let api_key = non_empty(format!("{}API_KEY_{}", self.prefix, n));
            let secret_key = non_empty(format!("{}SECRET_KEY_{}", self.prefix, n));
            match (api_key, secret_key) {
                (Some(api_key), Some(secret_key)) => {
                    tracing::info!(credential = n, "loaded credential pair");
                    credentials.push(Credential::new(n, api_key, secret_key));
                }
                _ => break,
            }
        }

        if credentials.is_empty()
            && let (Some(api_key), Some(secret_key)) = (
                non_empty(format!("{}API_KEY", self.prefix)),
                non_empty(format!("{}SECRET_KEY", self.prefix)),
            )
        {
            tracing::info!("loaded unnumbered credential pair");
            credentials.push(Credential::new(0, api_key, secret_key));
        }

        credentials
    }
}

fn default_base_url() -> String {
    "https://api-key.fusionbrain.ai/".to_string()
}

fn default_list_timeout() -> Duration {
    Duration::from_secs(25)
}

fn default_run_timeout() -> Duration {
    Duration::from_secs(45)
}

fn default_status_timeout() -> Duration {
    Duration::from_secs(25)
}

fn default_pipeline_status() -> String {
    "ACTIVE".to_string()
}

fn default_pipeline_kind() -> String {
    "TEXT2IMAGE".to_string()
}

fn default_pipeline_version() -> Option<f64> {
    Some(3.1)
}

fn default_max_attempts() -> u32 {
    30
}

fn default_poll_delay() -> Duration {
    Duration::from_secs(7)
}

fn default_num_images() -> u32 {
    1
}

fn default_max_prompt_chars() -> usize {
    1000
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(60)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
