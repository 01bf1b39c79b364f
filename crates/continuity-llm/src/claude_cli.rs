// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM client that shells out to the Claude CLI (`claude -p`).

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use continuity_core::{Completion, ContinuityError, LlmClient};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Completion via the local Claude CLI subprocess.
pub struct ClaudeCliClient {
    model: String,
    timeout: Duration,
}

impl ClaudeCliClient {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Environment for the subprocess with every `CLAUDE_*` variable removed.
/// Leaving them in place re-triggers the host's hooks from inside our own
/// extraction call.
fn filtered_env() -> Vec<(String, String)> {
    std::env::vars()
        .filter(|(key, _)| !key.starts_with("CLAUDE_"))
        .collect()
}

#[async_trait]
impl LlmClient for ClaudeCliClient {
    async fn complete(&self, prompt: &str) -> Result<Completion, ContinuityError> {
        let mut child = Command::new("claude")
            .args(["-p", "--model", &self.model, "--max-turns", "1"])
            .env_clear()
            .envs(filtered_env())
            .kill_on_drop(true)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ContinuityError::Provider {
                message: format!("spawn claude cli: {e}"),
                source: Some(Box::new(e)),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| ContinuityError::Provider {
                    message: format!("write claude cli stdin: {e}"),
                    source: Some(Box::new(e)),
                })?;
            // Close stdin so the CLI sees EOF.
            drop(stdin);
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ContinuityError::Timeout {
                duration: self.timeout,
            })?
            .map_err(|e| ContinuityError::Provider {
                message: format!("claude cli: {e}"),
                source: Some(Box::new(e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ContinuityError::provider(format!(
                "claude cli exited {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(Completion {
            content: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            provider: "claude-cli".to_string(),
            tokens_used: 0,
        })
    }
}
