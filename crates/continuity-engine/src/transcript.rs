// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transcript reducer: parses a line-delimited JSONL transcript into typed
//! entries and condenses them for LLM input.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

/// First and last assistant messages keep up to this many bytes.
const FIRST_LAST_ASSISTANT_MAX: usize = 1000;

/// Middle assistant messages are cut to this many bytes.
const MID_ASSISTANT_MAX: usize = 200;

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    User,
    Assistant,
    Other,
}

/// A fully parsed transcript entry.
#[derive(Debug, Clone)]
pub struct ParsedEntry {
    pub kind: EntryKind,
    pub text: String,
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(default, rename = "type")]
    entry_type: String,
    message: Option<RawMessage>,
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    content: serde_json::Value,
}

#[derive(Deserialize)]
struct ContentItem {
    #[serde(default, rename = "type")]
    item_type: String,
    #[serde(default)]
    text: String,
}

fn system_reminder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<system-reminder>[\s\S]*?</system-reminder>").expect("static regex")
    })
}

/// Parse transcript content, one JSON record per line. Malformed lines and
/// entries without usable text are skipped.
pub fn parse_lines(content: &str) -> Vec<ParsedEntry> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            parse_line(line)
        })
        .collect()
}

fn parse_line(line: &str) -> Option<ParsedEntry> {
    let raw: RawEntry = serde_json::from_str(line).ok()?;
    if raw.entry_type.is_empty() {
        return None;
    }
    let message = raw.message?;

    let text = extract_text(&message.content);
    let text = system_reminder_re().replace_all(&text, "");
    let text = text.trim();

    if text.len() < 5 {
        return None;
    }
    // Heuristic JSON blob filter: tool payloads masquerading as messages.
    if text.starts_with('{') {
        return None;
    }

    let kind = match raw.entry_type.as_str() {
        "user" => EntryKind::User,
        "assistant" => EntryKind::Assistant,
        _ => EntryKind::Other,
    };

    Some(ParsedEntry {
        kind,
        text: text.to_string(),
    })
}

/// Message content is either a plain string or an array of typed parts;
/// only `text` parts contribute, joined by newline.
fn extract_text(content: &serde_json::Value) -> String {
    if let Some(s) = content.as_str() {
        return s.to_string();
    }

    if let Some(items) = content.as_array() {
        let texts: Vec<String> = items
            .iter()
            .filter_map(|item| {
                let item: ContentItem = serde_json::from_value(item.clone()).ok()?;
                (item.item_type == "text" && !item.text.is_empty()).then_some(item.text)
            })
            .collect();
        return texts.join("\n");
    }

    String::new()
}

/// Number of user entries.
pub fn count_user_messages(entries: &[ParsedEntry]) -> usize {
    entries.iter().filter(|e| e.kind == EntryKind::User).count()
}

/// Byte-truncate without splitting a UTF-8 code point.
fn truncate_at_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Reduce entries to essential content:
/// every user message verbatim, the first and last assistant messages up to
/// 1000 bytes, middle assistants cut to 200, tool noise already dropped by
/// parsing. Empty input yields an empty string.
pub fn condense(entries: &[ParsedEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let users: Vec<&ParsedEntry> = entries
        .iter()
        .filter(|e| e.kind == EntryKind::User)
        .collect();
    let assistants: Vec<&ParsedEntry> = entries
        .iter()
        .filter(|e| e.kind == EntryKind::Assistant)
        .collect();

    let mut out = String::new();

    for user in &users {
        out.push_str("[USER] ");
        out.push_str(&user.text);
        out.push_str("\n\n");
    }

    for (i, assistant) in assistants.iter().enumerate() {
        out.push_str("[ASSISTANT] ");
        let max = if i == 0 || i == assistants.len() - 1 {
            FIRST_LAST_ASSISTANT_MAX
        } else {
            MID_ASSISTANT_MAX
        };
        if assistant.text.len() > max {
            out.push_str(truncate_at_boundary(&assistant.text, max));
            out.push_str("...");
        } else {
            out.push_str(&assistant.text);
        }
        out.push_str("\n\n");
    }

    out.trim().to_string()
}
