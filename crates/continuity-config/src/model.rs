// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Continuity service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Continuity configuration.
///
/// Loaded from TOML files with environment variable overrides. All sections
/// are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContinuityConfig {
    /// HTTP API server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Persistence settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// LLM provider and embedding settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Hook adapter behavior (consumed by the adapter, not the engine).
    #[serde(default)]
    pub hooks: HooksConfig,
}

/// Loopback HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address. The server is loopback-only by design.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    37777
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Persistence configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. Empty resolves to
    /// `~/.continuity/continuity.db` at runtime.
    #[serde(default)]
    pub path: String,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Dispatch mode: "claude-cli", "anthropic", or "ollama".
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model tag for extraction calls, e.g. "haiku".
    #[serde(default = "default_model")]
    pub model: String,

    /// Model tag for merge reasoning.
    #[serde(default = "default_merge_model")]
    pub merge_model: String,

    /// Ollama base URL for the "ollama" provider and the embedding probe.
    #[serde(default)]
    pub ollama_url: String,

    /// Ollama completion model, e.g. "llama3.2".
    #[serde(default)]
    pub ollama_model: String,

    /// Embedding model tag for the external embedder, e.g. "nomic-embed-text".
    #[serde(default)]
    pub embedding_model: String,

    /// Anthropic API key. `None` requires the environment variable.
    #[serde(default)]
    pub anthropic_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            merge_model: default_merge_model(),
            ollama_url: String::new(),
            ollama_model: String::new(),
            embedding_model: String::new(),
            anthropic_key: None,
        }
    }
}

fn default_provider() -> String {
    "claude-cli".to_string()
}

fn default_model() -> String {
    "haiku".to_string()
}

fn default_merge_model() -> String {
    "sonnet".to_string()
}

/// Hook adapter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HooksConfig {
    /// Whether lifecycle hooks dispatch to the server at all.
    #[serde(default = "default_hooks_enabled")]
    pub enabled: bool,

    /// Per-hook timeout in seconds.
    #[serde(default = "default_hooks_timeout")]
    pub timeout: u64,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            enabled: default_hooks_enabled(),
            timeout: default_hooks_timeout(),
        }
    }
}

fn default_hooks_enabled() -> bool {
    true
}

fn default_hooks_timeout() -> u64 {
    120
}

impl ContinuityConfig {
    /// The `bind:port` listen address.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}
