// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Candidate validation: category check, slug sanitization, and content
//! tier caps.

use continuity_core::types::{
    Category, EXTRACTABLE_CATEGORIES, MAX_L0_CHARS, MAX_L1_CHARS, MAX_L2_CHARS, MIN_L1_CHARS,
};
use continuity_core::ContinuityError;
use tracing::debug;

use crate::extractor::MemoryCandidate;

/// A candidate that passed validation, with its category resolved.
#[derive(Debug, Clone)]
pub struct ValidCandidate {
    pub category: Category,
    pub uri_hint: String,
    pub l0: String,
    pub l1: String,
    pub l2: String,
    pub merge_target: String,
}

/// Normalize a URI hint to `[a-z0-9_-]+`.
///
/// Uppercase folds to lowercase; spaces, dots, and slashes collapse to a
/// single hyphen; everything else is dropped; leading/trailing `-_` are
/// trimmed. Returns an empty string when nothing survives.
pub fn sanitize_uri_hint(hint: &str) -> String {
    let hint = hint.trim();
    if hint.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    let mut prev_hyphen = false;
    for c in hint.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_' {
            out.push(c);
            prev_hyphen = c == '-';
        } else if c == ' ' || c == '.' || c == '/' {
            if !prev_hyphen && !out.is_empty() {
                out.push('-');
                prev_hyphen = true;
            }
        }
        // Other chars silently dropped.
    }

    out.trim_matches(['-', '_']).to_string()
}

/// Truncate to `max_len` bytes, backing up to the last word boundary so a
/// word is never cut mid-way. Only boundaries within the final 200 bytes
/// are considered; otherwise the hard cut stands.
pub fn truncate_clean(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = &s[..end];

    if let Some(idx) = truncated.rfind(char::is_whitespace) {
        if idx + 200 > max_len {
            truncated = &truncated[..idx];
        }
    }
    truncated.trim().to_string()
}

/// Check a memory candidate for obvious garbage.
///
/// Returns a sanitized copy, or a validation error if the candidate should
/// be rejected outright. Oversized content tiers are truncated, not
/// rejected.
pub fn validate_candidate(c: &MemoryCandidate) -> Result<ValidCandidate, ContinuityError> {
    let Some(category) = Category::parse(&c.category) else {
        return Err(ContinuityError::Validation(format!(
            "invalid category {:?}",
            c.category
        )));
    };
    if !EXTRACTABLE_CATEGORIES.contains(&category) {
        return Err(ContinuityError::Validation(format!(
            "invalid category {:?}",
            c.category
        )));
    }

    let uri_hint = sanitize_uri_hint(&c.uri_hint);
    if uri_hint.is_empty() {
        return Err(ContinuityError::Validation(
            "empty URI hint after sanitization".into(),
        ));
    }

    let l0 = c.l0.trim().to_string();
    if l0.is_empty() {
        return Err(ContinuityError::Validation("empty L0 abstract".into()));
    }

    let l1 = c.l1.trim().to_string();
    let l2 = c.l2.trim().to_string();

    // L1 is the primary context injection content; reject trivial ones.
    if l1.len() < MIN_L1_CHARS {
        return Err(ContinuityError::Validation(format!(
            "L1 too short ({} chars, min {MIN_L1_CHARS})",
            l1.len()
        )));
    }

    let l0 = cap(l0, MAX_L0_CHARS, &uri_hint, "L0");
    let l1 = cap(l1, MAX_L1_CHARS, &uri_hint, "L1");
    let l2 = cap(l2, MAX_L2_CHARS, &uri_hint, "L2");

    Ok(ValidCandidate {
        category,
        uri_hint,
        l0,
        l1,
        l2,
        merge_target: c.merge_target.trim().to_string(),
    })
}

fn cap(s: String, max: usize, hint: &str, tier: &str) -> String {
    if s.len() > max {
        debug!(uri_hint = hint, tier, from = s.len(), to = max, "truncating content tier");
        truncate_clean(&s, max)
    } else {
        s
    }
}
