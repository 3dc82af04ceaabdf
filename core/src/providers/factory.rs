use crate::config::{Config, resolve_api_key_with_fallback};
use crate::providers::OpenAIProvider;
use crate::traits::Provider;
use anyhow::{Result, anyhow};

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

pub fn create_provider(config: &Config) -> Result<Box<dyn Provider>> {
    let provider_name = config.provider.as_deref().unwrap_or("openai");

    match provider_name.to_lowercase().as_str() {
        "openai" => {
            let api_key = config.resolve_api_key()?;
            let mut provider = OpenAIProvider::new(api_key)
                .with_model(config.model.clone())
                .with_temperature(config.temperature);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Box::new(provider))
        }
        "openrouter" => {
            let api_key = resolve_api_key_with_fallback(
                &["OPENROUTER_API_KEY", "EVREN_API_KEY"],
                &config.api_key,
            )?;
            let provider = OpenAIProvider::new(api_key)
                .with_label("openrouter")
                .with_model(config.model.clone())
                .with_temperature(config.temperature)
                .with_base_url(
                    config
                        .base_url
                        .clone()
                        .unwrap_or_else(|| OPENROUTER_BASE_URL.to_string()),
                );
            Ok(Box::new(provider))
        }
        _ => Err(anyhow!(
            "Unknown provider: {}. Available: openai, openrouter",
            provider_name
        )),
    }
}
