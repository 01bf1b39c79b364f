// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt builders for every engine-originated LLM call.
//!
//! Every prompt is prefixed with [`INTERNAL_SENTINEL`] so the hook adapter
//! can recognize internally-generated prompts and never re-capture them as
//! signals. Drift between the builders and the adapter's check re-creates a
//! hook recursion; the tests below pin the prefix.

use continuity_core::INTERNAL_SENTINEL;

/// Prompt for memory extraction from a condensed session transcript.
pub fn extraction_prompt(condensed: &str) -> String {
    format!(
        r#"{INTERNAL_SENTINEL} You are a memory extraction system. Analyze this session transcript and extract structured memories.

TRANSCRIPT:
{condensed}

Extract memories into these categories:
- profile: User identity, skills, coding style (e.g., "Prefers Rust with minimal dependencies")
- preferences: Tools, workflows, changeable choices (e.g., "Uses devbox for development")
- entities: People, projects, services mentioned (e.g., "Project: continuity, a memory service")
- events: Actions with timestamps (e.g., "Deployed v2.1 to production")
- patterns: Reusable techniques, solutions (e.g., "Uses SQLite WAL mode for concurrent reads")
- cases: Problem->solution pairs (e.g., "Fixed: memory leak in worker pool by adding cancellation")

URI scheme: mem://{{owner}}/{{category}}/{{slug}}
- owner is "user" for profile, preferences, entities, events
- owner is "agent" for patterns, cases

Rules:
- Only extract genuinely useful, persistent knowledge
- Skip trivial or session-specific details
- Extract AT MOST 3 memories per session
- l0 should be ~100 tokens (search surface)
- l1 should be ~500 tokens (context injection summary)
- l2 should be full content
- For merge_target, specify an existing URI if this updates known information
- Return ONLY a JSON array, no other text

Return a JSON array:
[{{
  "category": "profile|preferences|entities|events|patterns|cases",
  "uri_hint": "slug-name",
  "l0": "~100 token abstract",
  "l1": "~500 token overview",
  "l2": "full content",
  "merge_target": "mem://... or empty"
}}]

If nothing worth extracting, return: []"#
    )
}

/// Prompt for relational profile extraction, merging into any existing
/// profile text.
pub fn relational_prompt(existing: &str, condensed: &str) -> String {
    let profile_context = if existing.is_empty() {
        "This is the first session - no existing profile.".to_string()
    } else {
        format!("EXISTING PROFILE:\n{existing}")
    };

    format!(
        r#"{INTERNAL_SENTINEL} You are reviewing a session transcript to extract relational signal -
how the user works, communicates, and gives feedback.

{profile_context}

TRANSCRIPT:
{condensed}

Extract ONLY relational signal into these categories:

1. FEEDBACK CALIBRATION
How the user gives feedback. Direct or indirect? Do they say "good" often or only when truly impressed?
Corrections: gentle ("maybe try...") or direct ("no, do X")? Threshold for praise vs criticism.

2. WORKING DYNAMIC
How the user prefers to work with an AI agent. Do they give detailed specs or broad direction?
Do they want to review each step or prefer autonomous execution? Pair-programming vs delegation.

3. CORRECTIONS RECEIVED
Specific corrections the user has given. "Don't add comments unless asked." "Always use devbox."
These are the most valuable signals - they represent learned preferences.

4. EARNED SIGNALS
Trust indicators. What has the user allowed without review? What have they praised?
Complexity level they're comfortable delegating. Areas where autonomy has been earned.

Rules:
- Maximum 300 words total
- No project-specific details (no file paths, no function names)
- Focus on the PERSON, not the code
- Merge with existing profile - don't duplicate, update
- If this session adds no new relational signal, return "NO_UPDATE"

Return the profile as structured text with the 4 section headers."#
    )
}

/// Prompt for promoting a user-flagged signal into a single memory.
pub fn signal_extraction_prompt(prompt: &str) -> String {
    format!(
        r#"{INTERNAL_SENTINEL} The user has explicitly flagged something to remember. Extract it as a single structured memory.

USER MESSAGE:
{prompt}

Categories:
- profile: User identity, skills, coding style
- preferences: Tools, workflows, changeable choices
- entities: People, projects, services
- events: Actions with timestamps
- patterns: Reusable techniques, solutions
- cases: Problem->solution pairs

Rules:
- Extract EXACTLY ONE memory - the thing the user flagged
- Capture the user's intent faithfully; do not editorialize
- l0 should be ~100 tokens (search surface)
- l1 should be ~500 tokens (context injection summary)
- l2 should be full content
- Return ONLY a JSON array with one element, no other text

Return a JSON array:
[{{
  "category": "profile|preferences|entities|events|patterns|cases",
  "uri_hint": "slug-name",
  "l0": "~100 token abstract",
  "l1": "~500 token overview",
  "l2": "full content",
  "merge_target": "mem://... or empty"
}}]"#
    )
}

/// Prompt for decomposing a search query into typed sub-queries.
pub fn search_intent_prompt(query: &str) -> String {
    format!(
        r#"{INTERNAL_SENTINEL} You are a search intent decomposition system. Break the user's query into 1-3 focused sub-queries for searching a memory store.

USER QUERY: {query}

Each sub-query should target a different aspect of the user's intent. Tag each with a type:
- MEMORY: factual recall (what happened, what was decided)
- RESOURCE: tools, services, configurations, entities
- PATTERN: techniques, solutions, approaches, how-to

Rules:
- Maximum 3 sub-queries
- Each sub-query should be a short phrase (3-8 words)
- If the query is already focused, return just 1 sub-query
- Return ONLY a JSON array, no other text

Return a JSON array:
[{{"query": "search phrase", "type": "MEMORY|RESOURCE|PATTERN"}}]"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_prompt_carries_the_sentinel_prefix() {
        let prompts = [
            ("extraction", extraction_prompt("some transcript")),
            ("relational", relational_prompt("", "some transcript")),
            ("signal", signal_extraction_prompt("remember this")),
            ("search_intent", search_intent_prompt("find something")),
        ];
        for (name, prompt) in prompts {
            assert!(
                prompt.starts_with(INTERNAL_SENTINEL),
                "{name} prompt should start with sentinel, got prefix {:?}",
                &prompt[..prompt.len().min(50)]
            );
        }
    }

    #[test]
    fn extraction_prompt_embeds_transcript() {
        let prompt = extraction_prompt("[USER] hello there");
        assert!(prompt.contains("[USER] hello there"));
        assert!(prompt.contains("Return ONLY a JSON array"));
        assert!(prompt.contains("AT MOST 3"));
    }

    #[test]
    fn relational_prompt_varies_with_existing() {
        let fresh = relational_prompt("", "transcript");
        assert!(fresh.contains("no existing profile"));

        let merging = relational_prompt("Existing profile text", "transcript");
        assert!(merging.contains("EXISTING PROFILE:\nExisting profile text"));
        assert!(merging.contains("NO_UPDATE"));
    }

    #[test]
    fn signal_prompt_demands_single_candidate() {
        let prompt = signal_extraction_prompt("always use WAL mode");
        assert!(prompt.contains("EXACTLY ONE"));
        assert!(prompt.contains("always use WAL mode"));
    }
}
