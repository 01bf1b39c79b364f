// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Continuity memory service.
//!
//! TOML model with strict key checking, layered loading, and environment
//! overrides.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{ContinuityConfig, DatabaseConfig, HooksConfig, LlmConfig, ServerConfig};
