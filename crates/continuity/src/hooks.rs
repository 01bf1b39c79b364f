// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle-hook adapter.
//!
//! The coding agent invokes `continuity hook <event>` with one JSON object
//! on stdin. The adapter marshals it into API calls against the local
//! server. By contract it never blocks the host: every failure logs to
//! stderr and the process exits 0, and `SessionStart` degrades to an
//! empty-context payload when the server is unreachable.

use std::time::Duration;

use continuity_core::INTERNAL_SENTINEL;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:37777";

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Meta-tools that generate noise, not useful observations.
const SKIP_TOOLS: [&str; 7] = [
    "TodoRead",
    "TodoWrite",
    "Thinking",
    "TaskList",
    "TaskCreate",
    "TaskGet",
    "TaskUpdate",
];

/// Trigger substrings that promote a user prompt into immediate memory
/// capture. Matched case-insensitively.
const SIGNAL_TRIGGERS: [&str; 13] = [
    "remember this",
    "don't forget",
    "always use",
    "never use",
    "always do",
    "never do",
    "architecture decision",
    "we decided",
    "this pattern",
    "the trick",
    "the bug was",
    "root cause",
    "the fix was",
];

/// The JSON the coding agent sends on stdin. Different events populate
/// different subsets; every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub transcript_path: String,
    #[serde(default)]
    pub cwd: String,
    #[serde(default)]
    pub hook_event_name: String,

    // UserPromptSubmit
    #[serde(default)]
    pub prompt: String,

    // PostToolUse
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: serde_json::Value,
    #[serde(default)]
    pub tool_response: serde_json::Value,

    // SessionEnd
    #[serde(default)]
    pub reason: String,
}

impl HookInput {
    /// True if this tool should not be recorded as an observation.
    pub fn should_skip_tool(&self) -> bool {
        SKIP_TOOLS.contains(&self.tool_name.as_str())
    }
}

/// True if the prompt matches any signal trigger phrase.
pub fn has_signal(prompt: &str) -> bool {
    if prompt.is_empty() {
        return false;
    }
    let lower = prompt.to_lowercase();
    SIGNAL_TRIGGERS.iter().any(|t| lower.contains(t))
}

/// True if the prompt originated from the engine's own LLM calls. The
/// sentinel must be a prefix; quoted occurrences elsewhere do not count.
pub fn is_internal_prompt(prompt: &str) -> bool {
    prompt.starts_with(INTERNAL_SENTINEL)
}

/// The stdout payload the coding agent expects from SessionStart.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionStartOutput {
    #[serde(rename = "hookSpecificOutput")]
    pub hook_specific_output: HookSpecificOutput,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HookSpecificOutput {
    #[serde(rename = "hookEventName")]
    pub hook_event_name: String,
    #[serde(rename = "additionalContext")]
    pub additional_context: String,
}

/// Serialize the SessionStart response for stdout.
pub fn session_start_output(context: &str) -> String {
    let output = SessionStartOutput {
        hook_specific_output: HookSpecificOutput {
            hook_event_name: "SessionStart".to_string(),
            additional_context: context.to_string(),
        },
    };
    serde_json::to_string(&output).expect("static output shape")
}

/// HTTP client for the local continuity server. Respects `CONTINUITY_URL`.
pub struct HookClient {
    http: reqwest::Client,
    server_url: String,
}

impl HookClient {
    pub fn new() -> Self {
        let server_url =
            std::env::var("CONTINUITY_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        Self {
            http: reqwest::Client::new(),
            server_url,
        }
    }

    pub async fn healthy(&self) -> bool {
        match self
            .http
            .get(format!("{}/api/health", self.server_url))
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    pub async fn post(
        &self,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<String, String> {
        let mut request = self
            .http
            .post(format!("{}{path}", self.server_url))
            .timeout(HTTP_TIMEOUT);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(|e| format!("POST {path}: {e}"))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| format!("read response {path}: {e}"))?;
        if status.is_client_error() || status.is_server_error() {
            return Err(format!("POST {path}: status {status}: {text}"));
        }
        Ok(text)
    }

    pub async fn get(&self, path: &str) -> Result<String, String> {
        let response = self
            .http
            .get(format!("{}{path}", self.server_url))
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| format!("GET {path}: {e}"))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| format!("read response {path}: {e}"))?;
        if status.is_client_error() || status.is_server_error() {
            return Err(format!("GET {path}: status {status}: {text}"));
        }
        Ok(text)
    }
}

fn log_error(message: impl std::fmt::Display) {
    eprintln!("continuity hook: {message}");
}

/// Read HookInput from stdin and dispatch by event name. Never returns an
/// error: hook failures must not disrupt the host agent.
pub async fn handle(event: &str) {
    let mut raw = String::new();
    let stdin_ok = tokio::io::stdin().read_to_string(&mut raw).await.is_ok();

    let input: Option<HookInput> = if stdin_ok && !raw.trim().is_empty() {
        serde_json::from_str(&raw).ok()
    } else {
        None
    };

    let Some(input) = input else {
        // Stdin may be empty or malformed; degrade gracefully.
        if event == "start" {
            println!("{}", session_start_output(""));
        } else {
            log_error("invalid hook input on stdin");
        }
        return;
    };

    let client = HookClient::new();

    if !client.healthy().await {
        if event == "start" {
            println!("{}", session_start_output(""));
        }
        // Silent exit for other events; the server being down is routine.
        return;
    }

    match event {
        "start" => handle_start(&client, &input).await,
        "submit" => handle_submit(&client, &input).await,
        "tool" => handle_tool(&client, &input).await,
        "stop" => handle_stop(&client, &input).await,
        "end" => handle_end(&client, &input).await,
        other => log_error(format!("unknown hook event: {other}")),
    }
}

async fn handle_start(client: &HookClient, input: &HookInput) {
    let path = if input.session_id.is_empty() {
        "/api/context".to_string()
    } else {
        format!("/api/context?session_id={}", input.session_id)
    };

    let context = match client.get(&path).await {
        Ok(body) => serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("context").and_then(|c| c.as_str()).map(String::from))
            .unwrap_or_default(),
        Err(_) => String::new(), // degrade to empty context
    };

    println!("{}", session_start_output(&context));
}

async fn handle_submit(client: &HookClient, input: &HookInput) {
    // Initialize/resume the session on first user prompt.
    let body = serde_json::json!({
        "session_id": input.session_id,
        "project": input.cwd,
    });
    if let Err(e) = client.post("/api/sessions/init", Some(body)).await {
        log_error(e);
        return;
    }

    // Signal capture: user-flagged knowledge is promoted immediately.
    // Engine-originated prompts are recognized by the sentinel and skipped,
    // otherwise extraction prompts would re-trigger themselves.
    if !is_internal_prompt(&input.prompt) && has_signal(&input.prompt) {
        let body = serde_json::json!({"prompt": input.prompt});
        if let Err(e) = client
            .post(&format!("/api/sessions/{}/signal", input.session_id), Some(body))
            .await
        {
            log_error(e);
        }
    }
}

async fn handle_tool(client: &HookClient, input: &HookInput) {
    if input.should_skip_tool() {
        return;
    }

    let body = serde_json::json!({
        "tool_name": input.tool_name,
        "tool_input": input.tool_input.to_string(),
        "tool_response": input.tool_response.to_string(),
    });

    if let Err(e) = client
        .post(
            &format!("/api/sessions/{}/observations", input.session_id),
            Some(body),
        )
        .await
    {
        log_error(e);
    }
}

async fn handle_stop(client: &HookClient, input: &HookInput) {
    if let Err(e) = client
        .post(&format!("/api/sessions/{}/complete", input.session_id), None)
        .await
    {
        log_error(e);
        return;
    }

    // Completion acknowledged; hand the transcript to extraction.
    if !input.transcript_path.is_empty() {
        let body = serde_json::json!({"transcript_path": input.transcript_path});
        if let Err(e) = client
            .post(&format!("/api/sessions/{}/extract", input.session_id), Some(body))
            .await
        {
            log_error(e);
        }
    }
}

async fn handle_end(client: &HookClient, input: &HookInput) {
    if let Err(e) = client
        .post(&format!("/api/sessions/{}/end", input.session_id), None)
        .await
    {
        log_error(e);
    }
}
