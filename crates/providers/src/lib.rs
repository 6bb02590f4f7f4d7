//! Reasoning-service provider implementations for TailorTalk.
//!
//! All providers implement the `tailortalk_core::Provider` trait.
//! [`build_from_config`] picks the endpoint for the configured provider.

pub mod openai_compat;

use std::sync::Arc;
use std::time::Duration;
use tailortalk_core::error::ProviderError;
use tailortalk_core::provider::Provider;

pub use openai_compat::OpenAiCompatProvider;

/// Build the default provider from configuration.
///
/// Fails with [`ProviderError::NotConfigured`] when no API key is available
/// for a provider that needs one.
pub fn build_from_config(
    config: &tailortalk_config::AppConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let name = config.default_provider.as_str();
    let provider_config = config.providers.get(name);

    let base_url = provider_config
        .and_then(|p| p.api_url.clone())
        .or_else(|| default_base_url(name))
        .ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "provider '{name}' has no known endpoint; set providers.{name}.api_url"
            ))
        })?;

    let api_key = match config.provider_api_key() {
        Some(key) => key,
        None if is_local(name) => String::new(),
        None => {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for provider '{name}'"
            )));
        }
    };

    let timeout = Duration::from_secs(config.agent.reasoning_timeout_secs);
    let provider = OpenAiCompatProvider::new(name, base_url, api_key, timeout)?;
    tracing::info!(provider = %name, base_url = %provider.base_url(), "Reasoning provider ready");
    Ok(Arc::new(provider))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "gemini" | "google" => "https://generativelanguage.googleapis.com/v1beta/openai",
        "openai" => "https://api.openai.com/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "ollama" => "http://localhost:11434/v1",
        "vllm" => "http://localhost:8000/v1",
        _ => return None,
    };
    Some(url.into())
}

fn is_local(provider_name: &str) -> bool {
    matches!(provider_name, "ollama" | "vllm")
}
