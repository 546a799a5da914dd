// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod message;
mod mock;
mod openai;
mod provider;
mod retry;

pub use message::{Message, ToolCallRequest, ToolStatus};
pub use mock::{MockProvider, ScriptedMockProvider};
pub use openai::OpenAiProvider;
pub use provider::{AssistantReply, CompletionRequest, ModelProvider, ToolSchema, Usage};
pub use retry::invoke_with_retry;

use otto_config::{Config, ModelConfig};

/// Resolve the API key for a model config: explicit key, then the configured
/// env var, then the provider's canonical env var.
fn resolve_api_key(cfg: &ModelConfig) -> Option<String> {
    if let Some(key) = &cfg.api_key {
        return Some(key.clone());
    }
    if let Some(var) = &cfg.api_key_env {
        if let Ok(key) = std::env::var(var) {
            return Some(key);
        }
    }
    std::env::var("OPENAI_API_KEY").ok()
}

/// Construct a provider from configuration.
pub fn from_config(cfg: &ModelConfig) -> anyhow::Result<Box<dyn ModelProvider>> {
    match cfg.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::new(
            cfg.name.clone(),
            resolve_api_key(cfg),
            cfg.base_url.clone(),
            cfg.max_tokens,
            cfg.temperature,
            cfg.timeout_secs,
        ))),
        "mock" => Ok(Box::new(MockProvider)),
        other => anyhow::bail!("unknown model provider: {other}"),
    }
}

/// Resolve a `--model` override against the config's named providers.
///
/// Accepts `<key>` (a named provider or a bare model name) or
/// `<key>/<model>` (named provider with a model override).
pub fn resolve_model_from_config(config: &Config, override_str: &str) -> ModelConfig {
    let (provider_key, model_suffix) = match override_str.split_once('/') {
        Some((p, m)) => (p, Some(m)),
        None => (override_str, None),
    };

    // Named custom provider in config.providers takes precedence.
    if let Some(named) = config.providers.get(provider_key) {
        let mut cfg = named.clone();
        if let Some(model) = model_suffix {
            cfg.name = model.to_string();
        }
        return cfg;
    }

    // Otherwise treat the override as a model name on the configured provider.
    let mut cfg = config.model.clone();
    cfg.name = override_str.to_string();
    cfg
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_builds_mock() {
        let cfg = ModelConfig {
            provider: "mock".into(),
            ..Default::default()
        };
        let p = from_config(&cfg).unwrap();
        assert_eq!(p.name(), "mock");
    }

    #[test]
    fn from_config_rejects_unknown_provider() {
        let cfg = ModelConfig {
            provider: "carrier-pigeon".into(),
            ..Default::default()
        };
        assert!(from_config(&cfg).is_err());
    }

    #[test]
    fn resolve_named_provider_override() {
        let mut config = Config::default();
        config.providers.insert(
            "local".into(),
            ModelConfig {
                provider: "openai".into(),
                name: "phi-3".into(),
                base_url: Some("http://127.0.0.1:8080/v1".into()),
                ..Default::default()
            },
        );
        let cfg = resolve_model_from_config(&config, "local");
        assert_eq!(cfg.name, "phi-3");
        assert_eq!(cfg.base_url.as_deref(), Some("http://127.0.0.1:8080/v1"));
    }

    #[test]
    fn resolve_named_provider_with_model_suffix() {
        let mut config = Config::default();
        config.providers.insert(
            "local".into(),
            ModelConfig {
                provider: "openai".into(),
                name: "phi-3".into(),
                ..Default::default()
            },
        );
        let cfg = resolve_model_from_config(&config, "local/llama3.2");
        assert_eq!(cfg.name, "llama3.2");
    }

    #[test]
    fn resolve_bare_model_name_keeps_configured_provider() {
        let config = Config::default();
        let cfg = resolve_model_from_config(&config, "gpt-4o-mini");
        assert_eq!(cfg.provider, "openai");
        assert_eq!(cfg.name, "gpt-4o-mini");
    }
}
