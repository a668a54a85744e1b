//! Wildcard matching of dotted permission strings against pattern sets.
//!
//! A stored pattern is either a literal permission (`admin.users.ban`) or a
//! wildcard (`admin.*`, or the sole `*`). A wildcard covers its own prefix
//! and every dotted descendant: `admin.*` grants `admin`, `admin.users`,
//! and `admin.users.ban`.

use std::collections::HashSet;

/// Returns true if `perm` matches any pattern in `patterns`.
///
/// Candidates are generated most specific first: the literal string, then
/// each prefix of its dot-segments followed by `.*`, down to the bare `*`.
/// Set membership makes the order irrelevant to the result; it only matters
/// for picking the most specific rule in diagnostics.
pub fn matches(perm: &str, patterns: &HashSet<String>) -> bool {
    if patterns.contains(perm) {
        return true;
    }
    let mut segments: Vec<&str> = perm.split('.').collect();
    segments.push("*");
    while let Some(last) = segments.last_mut() {
        *last = "*";
        if patterns.contains(&segments.join(".")) {
            return true;
        }
        segments.pop();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[&str]) -> HashSet<String> {
        patterns.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_literal_match() {
        let patterns = set(&["chat.send"]);
        assert!(matches("chat.send", &patterns));
        assert!(!matches("chat.recall", &patterns));
    }

    #[test]
    fn test_wildcard_covers_descendants() {
        let patterns = set(&["admin.*"]);
        assert!(matches("admin.users.ban", &patterns));
        assert!(matches("admin.users", &patterns));
    }

    #[test]
    fn test_wildcard_covers_own_prefix() {
        // admin.* also grants the bare "admin" permission.
        let patterns = set(&["admin.*"]);
        assert!(matches("admin", &patterns));
    }

    #[test]
    fn test_bare_star_matches_everything() {
        let patterns = set(&["*"]);
        assert!(matches("anything", &patterns));
        assert!(matches("a.b.c.d", &patterns));
    }

    #[test]
    fn test_no_match_across_siblings() {
        let patterns = set(&["admin.users.*"]);
        assert!(!matches("admin.roles", &patterns));
        assert!(!matches("admin", &patterns));
        assert!(matches("admin.users.ban", &patterns));
    }

    #[test]
    fn test_every_generality_level_is_checked() {
        // Exhaustive over k for a three-segment permission.
        for pattern in ["a.b.c", "a.b.c.*", "a.b.*", "a.*", "*"] {
            let patterns = set(&[pattern]);
            assert!(matches("a.b.c", &patterns), "pattern {pattern} should match");
        }
    }

    #[test]
    fn test_empty_set_never_matches() {
        assert!(!matches("chat.send", &HashSet::new()));
    }
}
