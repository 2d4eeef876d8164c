//! Gateway configuration.
//!
//! Secrets come from named environment variables and are checked once at
//! startup. Tunables are layered with the `config` crate: built-in defaults,
//! then an optional TOML file, then `PROMPTGATE__SECTION__KEY` environment
//! overrides. The resulting [`GatewayConfig`] is read-only for the life of the
//! process.

use crate::error::ConfigError;
use promptgate_client::{RetryPolicy, DEFAULT_ENDPOINT};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const SCAN_API_KEY_VAR: &str = "PANW_AI_SEC_API_KEY";
pub const SCAN_PROFILE_VAR: &str = "PANW_AI_SEC_PROFILE_NAME";
pub const SCAN_ENDPOINT_VAR: &str = "PANW_AI_SEC_API_ENDPOINT";

/// Prefix for tunable overrides, e.g. `PROMPTGATE__SCAN__MAX_RETRIES=5`.
pub const ENV_PREFIX: &str = "PROMPTGATE";

/// A secret that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// OpenAI-compatible chat completion providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    Perplexity,
}

impl Provider {
    /// Environment variable holding this provider's API key.
    pub fn key_var(self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Perplexity => "PERPLEXITY_API_KEY",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Perplexity => "https://api.perplexity.ai",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-3.5-turbo",
            Provider::Perplexity => "llama-3.1-sonar-small-128k-online",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Perplexity => "perplexity",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "perplexity" => Ok(Provider::Perplexity),
            other => Err(ConfigError::InvalidSetting {
                key: "generation.provider",
                reason: format!("unknown provider `{}` (expected openai or perplexity)", other),
            }),
        }
    }
}

/// Non-secret scan settings as read from file/env.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanTunables {
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for ScanTunables {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 30,
            max_retries: 3,
            backoff_base_ms: 1000,
        }
    }
}

/// Non-secret generation settings as read from file/env.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationTunables {
    pub provider: Provider,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for GenerationTunables {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model: None,
            base_url: None,
            max_tokens: 800,
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

/// Every non-secret setting.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Tunables {
    pub scan: ScanTunables,
    pub generation: GenerationTunables,
}

impl Tunables {
    /// Load defaults, then `file` (if given), then `PROMPTGATE__*` overrides.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_layers(file, override_layer())
    }

    fn load_layers(
        file: Option<&Path>,
        overrides: config::Environment,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder = builder.add_source(overrides);

        Ok(builder.build()?.try_deserialize()?)
    }
}

/// `PROMPTGATE__SECTION__KEY` variables, highest precedence.
fn override_layer() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

/// Resolved scan settings.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub api_key: ApiKey,
    pub profile_name: String,
    pub endpoint: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

/// Resolved generation settings.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub provider: Provider,
    pub api_key: ApiKey,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

/// Process-wide configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub scan: ScanSettings,
    pub generation: GenerationSettings,
}

impl GatewayConfig {
    /// Load from the process environment and an optional TOML file.
    pub fn load(file: Option<&Path>, provider: Option<Provider>) -> Result<Self, ConfigError> {
        let tunables = Tunables::load(file)?;
        Self::resolve(tunables, provider, |name| std::env::var(name).ok())
    }

    /// Combine tunables with secrets from `lookup` and validate the result.
    ///
    /// `provider` overrides the provider chosen by the tunables. Every missing
    /// secret is reported, not just the first.
    pub fn resolve<F>(
        tunables: Tunables,
        provider: Option<Provider>,
        lookup: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = provider.unwrap_or(tunables.generation.provider);
        let secret = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let scan_key = secret(SCAN_API_KEY_VAR);
        let profile = secret(SCAN_PROFILE_VAR);
        let generation_key = secret(provider.key_var());

        let mut missing = Vec::new();
        if scan_key.is_none() {
            missing.push(SCAN_API_KEY_VAR);
        }
        if profile.is_none() {
            missing.push(SCAN_PROFILE_VAR);
        }
        if generation_key.is_none() {
            missing.push(provider.key_var());
        }

        let (scan_key, profile, generation_key) = match (scan_key, profile, generation_key) {
            (Some(k), Some(p), Some(g)) => (k, p, g),
            _ => return Err(ConfigError::MissingVariables(missing)),
        };

        let endpoint = secret(SCAN_ENDPOINT_VAR)
            .or(tunables.scan.endpoint)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        validate_url("scan.endpoint", &endpoint)?;

        if tunables.scan.timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "scan.timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        let generation = tunables.generation;
        let base_url = generation
            .base_url
            .unwrap_or_else(|| provider.default_base_url().to_string());
        validate_url("generation.base_url", &base_url)?;

        if generation.max_tokens == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "generation.max_tokens",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&generation.temperature) {
            return Err(ConfigError::InvalidSetting {
                key: "generation.temperature",
                reason: format!("{} is outside 0.0..=2.0", generation.temperature),
            });
        }
        if generation.timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "generation.timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            scan: ScanSettings {
                api_key: ApiKey::new(scan_key),
                profile_name: profile.trim().to_string(),
                endpoint,
                timeout: Duration::from_secs(tunables.scan.timeout_secs),
                retry: RetryPolicy::new(
                    tunables.scan.max_retries,
                    Duration::from_millis(tunables.scan.backoff_base_ms),
                ),
            },
            generation: GenerationSettings {
                provider,
                api_key: ApiKey::new(generation_key),
                base_url,
                model: generation
                    .model
                    .unwrap_or_else(|| provider.default_model().to_string()),
                max_tokens: generation.max_tokens,
                temperature: generation.temperature,
                timeout: Duration::from_secs(generation.timeout_secs),
            },
        })
    }
}

fn validate_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value).map_err(|e| ConfigError::InvalidSetting {
        key,
        reason: format!("`{}` is not a valid URL: {}", value, e),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::InvalidSetting {
            key,
            reason: format!("unsupported scheme `{}`", scheme),
        }),
    }
}
