// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM providers for the Continuity memory service.
//!
//! One completion contract ([`LlmClient`]) with three transports: the
//! Claude CLI subprocess, the Anthropic Messages API, and a local Ollama
//! instance. Prompt builders live here too, all prefixed with the internal
//! sentinel.

pub mod anthropic;
pub mod claude_cli;
pub mod mock;
pub mod ollama;
pub mod prompts;

use std::sync::Arc;

use continuity_config::LlmConfig;
use continuity_core::{ContinuityError, LlmClient};

pub use anthropic::AnthropicClient;
pub use claude_cli::ClaudeCliClient;
pub use mock::MockClient;
pub use ollama::OllamaClient;

/// Build an LLM client from the config provider setting.
pub fn build_client(cfg: &LlmConfig) -> Result<Arc<dyn LlmClient>, ContinuityError> {
    match cfg.provider.as_str() {
        "claude-cli" => {
            let model = if cfg.model.is_empty() { "haiku" } else { &cfg.model };
            Ok(Arc::new(ClaudeCliClient::new(model)))
        }
        "anthropic" => {
            let key = cfg
                .anthropic_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| {
                    ContinuityError::Config(
                        "anthropic provider requires ANTHROPIC_API_KEY or config".into(),
                    )
                })?;
            let model = if cfg.model.is_empty() {
                "claude-haiku-4-5-20251001"
            } else {
                &cfg.model
            };
            Ok(Arc::new(AnthropicClient::new(key, model)?))
        }
        "ollama" => {
            let url = if cfg.ollama_url.is_empty() {
                "http://localhost:11434"
            } else {
                &cfg.ollama_url
            };
            let model = if cfg.ollama_model.is_empty() {
                "llama3.2"
            } else {
                &cfg.ollama_model
            };
            Ok(Arc::new(OllamaClient::new(url, model)?))
        }
        other => Err(ContinuityError::Config(format!(
            "unknown LLM provider: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_selects_claude_cli() {
        let cfg = LlmConfig {
            provider: "claude-cli".into(),
            model: "haiku".into(),
            ..Default::default()
        };
        assert!(build_client(&cfg).is_ok());
    }

    #[test]
    fn factory_requires_anthropic_key() {
        let cfg = LlmConfig {
            provider: "anthropic".into(),
            ..Default::default()
        };
        assert!(build_client(&cfg).is_err());

        let cfg = LlmConfig {
            provider: "anthropic".into(),
            anthropic_key: Some("sk-test".into()),
            ..Default::default()
        };
        assert!(build_client(&cfg).is_ok());
    }

    #[test]
    fn factory_selects_ollama_with_defaults() {
        let cfg = LlmConfig {
            provider: "ollama".into(),
            ..Default::default()
        };
        assert!(build_client(&cfg).is_ok());
    }

    #[test]
    fn factory_rejects_unknown_provider() {
        let cfg = LlmConfig {
            provider: "gpt".into(),
            ..Default::default()
        };
        let err = match build_client(&cfg) {
            Ok(_) => panic!("expected build_client to fail for unknown provider"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("unknown LLM provider"));
    }
}
