// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Merge order: compiled defaults, `~/.continuity/config.toml`,
//! `./continuity.toml`, then `CONTINUITY_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ContinuityConfig;

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<ContinuityConfig, figment::Error> {
    let config = Figment::new()
        .merge(Serialized::defaults(ContinuityConfig::default()))
        .merge(Toml::file(
            dirs::home_dir()
                .map(|d| d.join(".continuity/config.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("continuity.toml"))
        .merge(env_provider())
        .extract()?;
    Ok(apply_env_overrides(config))
}

/// Load configuration from inline TOML only (no file lookup, no env).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<ContinuityConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ContinuityConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ContinuityConfig, figment::Error> {
    let config = Figment::new()
        .merge(Serialized::defaults(ContinuityConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()?;
    Ok(apply_env_overrides(config))
}

/// Environment variable provider with explicit section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` so underscore-containing
/// keys stay intact: `CONTINUITY_LLM_OLLAMA_URL` must map to
/// `llm.ollama_url`, not `llm.ollama.url`.
fn env_provider() -> Env {
    Env::prefixed("CONTINUITY_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("database_", "database.", 1)
            .replacen("llm_", "llm.", 1)
            .replacen("hooks_", "hooks.", 1);
        mapped.into()
    })
}

/// Promote well-known environment variables into the config.
///
/// `ANTHROPIC_API_KEY` switches the provider to the direct API path, which
/// keeps extraction working in environments without the CLI installed.
fn apply_env_overrides(mut config: ContinuityConfig) -> ContinuityConfig {
    if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        if !key.is_empty() {
            config.llm.provider = "anthropic".to_string();
            config.llm.anthropic_key = Some(key);
        }
    }
    config
}
