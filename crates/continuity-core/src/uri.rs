// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers for `mem://` URI paths.

/// Scheme prefix for all memory URIs.
pub const MEM_SCHEME: &str = "mem://";

/// Path segments of a `mem://` URI.
///
/// `"mem://user/profile/coding-style"` -> `["user", "profile", "coding-style"]`.
/// Empty segments are dropped.
pub fn segments(uri: &str) -> Vec<&str> {
    let Some(path) = uri.strip_prefix(MEM_SCHEME) else {
        return Vec::new();
    };
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Parent URI, one segment shorter.
///
/// `"mem://user/profile/coding-style"` -> `Some("mem://user/profile")`;
/// top-level URIs have no parent.
pub fn parent_of(uri: &str) -> Option<String> {
    let segs = segments(uri);
    if segs.len() <= 1 {
        return None;
    }
    Some(format!("{}{}", MEM_SCHEME, segs[..segs.len() - 1].join("/")))
}

/// Join segments back into a full URI.
pub fn join(segs: &[&str]) -> String {
    format!("{}{}", MEM_SCHEME, segs.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_of_leaf() {
        assert_eq!(
            segments("mem://user/profile/coding-style"),
            vec!["user", "profile", "coding-style"]
        );
    }

    #[test]
    fn segments_of_root_and_garbage() {
        assert_eq!(segments("mem://user"), vec!["user"]);
        assert!(segments("mem://").is_empty());
        assert!(segments("not-a-uri").is_empty());
    }

    #[test]
    fn parent_chain() {
        assert_eq!(
            parent_of("mem://user/profile/coding-style").as_deref(),
            Some("mem://user/profile")
        );
        assert_eq!(
            parent_of("mem://user/profile").as_deref(),
            Some("mem://user")
        );
        assert_eq!(parent_of("mem://user"), None);
    }

    #[test]
    fn join_roundtrip() {
        let uri = "mem://agent/patterns/wal-mode";
        assert_eq!(join(&segments(uri)), uri);
    }
}
