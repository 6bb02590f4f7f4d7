//! Configuration loading, validation, and management for TailorTalk.
//!
//! Loads configuration from `~/.tailortalk/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup;
//! the resulting [`AppConfig`] is immutable for the life of the process.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.tailortalk/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the reasoning service (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<u32>,

    /// Control loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Calendar backend settings
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_temperature() -> f32 {
    0.0
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("agent", &self.agent)
            .field("calendar", &self.calendar)
            .field("gateway", &self.gateway)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl std::fmt::Debug for CalendarConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarConfig")
            .field("backend", &self.backend)
            .field("calendar_id", &self.calendar_id)
            .field("timezone", &self.timezone)
            .field("credentials_file", &self.credentials_file)
            .field("access_token", &redact(&self.access_token))
            .field("api_url", &self.api_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Settings for the reasoning/dispatch control loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum reasoning/dispatch rounds before a run fails
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Timeout for one call to the reasoning service
    #[serde(default = "default_reasoning_timeout")]
    pub reasoning_timeout_secs: u64,

    /// Timeout for one tool invocation
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// Replace the built-in system instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

fn default_max_iterations() -> u32 {
    25
}
fn default_reasoning_timeout() -> u64 {
    60
}
fn default_tool_timeout() -> u64 {
    30
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            reasoning_timeout_secs: default_reasoning_timeout(),
            tool_timeout_secs: default_tool_timeout(),
            system_prompt_override: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// `google` or `memory` (no credentials, nothing persisted)
    #[serde(default = "default_calendar_backend")]
    pub backend: String,

    /// Calendar to read and write
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,

    /// IANA timezone all timestamps are normalized to
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Service-account key file
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,

    /// Pre-issued bearer token; skips the service-account exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default = "default_calendar_api_url")]
    pub api_url: String,

    #[serde(default = "default_calendar_timeout")]
    pub timeout_secs: u64,
}

fn default_calendar_backend() -> String {
    "google".into()
}
fn default_calendar_id() -> String {
    "primary".into()
}
fn default_timezone() -> String {
    "Asia/Kolkata".into()
}
fn default_credentials_file() -> PathBuf {
    PathBuf::from("service-account.json")
}
fn default_calendar_api_url() -> String {
    "https://www.googleapis.com/calendar/v3".into()
}
fn default_calendar_timeout() -> u64 {
    30
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            backend: default_calendar_backend(),
            calendar_id: default_calendar_id(),
            timezone: default_timezone(),
            credentials_file: default_credentials_file(),
            access_token: None,
            api_url: default_calendar_api_url(),
            timeout_secs: default_calendar_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Whole-request deadline for `POST /chat`
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// CORS origins allowed to call the API (empty = none)
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            request_timeout_secs: default_request_timeout(),
            allowed_origins: vec![],
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.tailortalk/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment overrides.
    ///
    /// API key lookup order (only when the file sets none):
    /// - `TAILORTALK_API_KEY`
    /// - `GEMINI_API_KEY`
    /// - `GOOGLE_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = ["TAILORTALK_API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY", "OPENAI_API_KEY"]
                .iter()
                .find_map(|key| env(key).filter(|v| !v.is_empty()));
        }

        if let Some(provider) = env("TAILORTALK_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = env("TAILORTALK_MODEL") {
            self.default_model = model;
        }
        if let Some(calendar_id) = env("TAILORTALK_CALENDAR_ID") {
            self.calendar.calendar_id = calendar_id;
        }
        if let Some(path) = env("GOOGLE_APPLICATION_CREDENTIALS") {
            self.calendar.credentials_file = PathBuf::from(path);
        }
        if let Some(token) = env("GOOGLE_CALENDAR_ACCESS_TOKEN") {
            self.calendar.access_token = Some(token);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tailortalk")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        for (name, secs) in [
            ("agent.reasoning_timeout_secs", self.agent.reasoning_timeout_secs),
            ("agent.tool_timeout_secs", self.agent.tool_timeout_secs),
            ("calendar.timeout_secs", self.calendar.timeout_secs),
            ("gateway.request_timeout_secs", self.gateway.request_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::ValidationError(format!("{name} must be at least 1")));
            }
        }

        if !matches!(self.calendar.backend.as_str(), "google" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "calendar.backend must be \"google\" or \"memory\", got \"{}\"",
                self.calendar.backend
            )));
        }

        if self.calendar.calendar_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "calendar.calendar_id must not be empty".into(),
            ));
        }

        if self.calendar.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "calendar.timezone '{}' is not a known IANA timezone",
                self.calendar.timezone
            )));
        }

        Ok(())
    }

    /// API key for the default provider: per-provider entry first, then the root key.
    pub fn provider_api_key(&self) -> Option<String> {
        self.providers
            .get(&self.default_provider)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
    }

    /// Model for the default provider: per-provider entry first, then the root model.
    pub fn provider_model(&self) -> &str {
        self.providers
            .get(&self.default_provider)
            .and_then(|p| p.default_model.as_deref())
            .unwrap_or(&self.default_model)
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider_api_key().is_some()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: None,
            agent: AgentConfig::default(),
            calendar: CalendarConfig::default(),
            gateway: GatewayConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "gemini");
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.agent.max_iterations, 25);
        assert_eq!(config.calendar.timezone, "Asia/Kolkata");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.calendar.calendar_id, config.calendar.calendar_id);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn unknown_timezone_rejected() {
        let mut config = AppConfig::default();
        config.calendar.timezone = "Mars/Olympus_Mons".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus_Mons"));
    }

    #[test]
    fn calendar_backend_must_be_known() {
        let mut config = AppConfig::default();
        config.calendar.backend = "memory".into();
        assert!(config.validate().is_ok());
        config.calendar.backend = "outlook".into();
        assert!(config.validate().unwrap_err().to_string().contains("outlook"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        let config = result.unwrap();
        assert_eq!(config.default_model, "gemini-2.0-flash");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_model = "gemini-1.5-pro"

[calendar]
calendar_id = "team@group.calendar.google.com"

[agent]
max_iterations = 5
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_model, "gemini-1.5-pro");
        assert_eq!(config.calendar.calendar_id, "team@group.calendar.google.com");
        assert_eq!(config.calendar.timezone, "Asia/Kolkata");
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.agent.tool_timeout_secs, 30);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_model = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_fill_missing_key() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(env_from(&[
            ("GOOGLE_API_KEY", "google-key"),
            ("OPENAI_API_KEY", "openai-key"),
            ("TAILORTALK_CALENDAR_ID", "cal-123"),
        ]));
        assert_eq!(config.api_key.as_deref(), Some("google-key"));
        assert_eq!(config.calendar.calendar_id, "cal-123");
    }

    #[test]
    fn env_does_not_replace_configured_key() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env_overrides(env_from(&[("GEMINI_API_KEY", "from-env")]));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn provider_key_prefers_provider_entry() {
        let mut config = AppConfig {
            api_key: Some("root".into()),
            ..AppConfig::default()
        };
        config.providers.insert(
            "gemini".into(),
            ProviderConfig {
                api_key: Some("scoped".into()),
                ..ProviderConfig::default()
            },
        );
        assert_eq!(config.provider_api_key().as_deref(), Some("scoped"));
    }

    #[test]
    fn provider_model_prefers_provider_entry() {
        let mut config = AppConfig::default();
        assert_eq!(config.provider_model(), "gemini-2.0-flash");

        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                default_model: Some("gpt-4o-mini".into()),
                ..ProviderConfig::default()
            },
        );
        // Entries for other providers do not apply.
        assert_eq!(config.provider_model(), "gemini-2.0-flash");

        config.default_provider = "openai".into();
        assert_eq!(config.provider_model(), "gpt-4o-mini");
    }

    #[test]
    fn provider_model_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
default_model = "gemini-2.0-flash"

[providers.gemini]
default_model = "gemini-2.5-pro"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.provider_model(), "gemini-2.5-pro");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("super-secret".into()),
            ..AppConfig::default()
        };
        config.calendar.access_token = Some("ya29.token".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("ya29.token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gemini"));
        assert!(toml_str.contains("Asia/Kolkata"));
    }
}
