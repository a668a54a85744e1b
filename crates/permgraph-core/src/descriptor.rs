//! Group descriptors: the per-group schema inside a namespace document.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// Character prefixing a permission entry to mark it as a deny rule.
pub const DENY_MARKER: char = '-';

/// Parsed form of one group's node in a namespace document.
///
/// The schema is strict: unknown fields reject the whole descriptor, so a
/// typo in a config file surfaces as a parse error instead of silently
/// granting nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GroupDescriptor {
    /// Granted or revoked permission patterns, in document order. A leading
    /// `-` marks a deny entry.
    pub permissions: Vec<String>,

    /// Inherited groups, each a qualified name (`namespace:key`) or a bare
    /// key resolved within the declaring group's namespace.
    pub inherits: Vec<String>,
}

impl GroupDescriptor {
    /// True if the descriptor carries no rules and no inheritance.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty() && self.inherits.is_empty()
    }
}

/// Split a raw permission entry into its undecorated pattern and whether it
/// is a deny rule.
pub fn split_deny(item: &str) -> (&str, bool) {
    match item.strip_prefix(DENY_MARKER) {
        Some(pattern) => (pattern, true),
        None => (item, false),
    }
}

/// The document node written for a freshly created group.
pub fn empty_descriptor_node() -> Value {
    let mut node = Mapping::new();
    node.insert(
        Value::String("permissions".to_string()),
        Value::Sequence(Vec::new()),
    );
    Value::Mapping(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults_to_empty() {
        let desc: GroupDescriptor = serde_yaml::from_str("{}").unwrap();
        assert!(desc.is_empty());
    }

    #[test]
    fn test_descriptor_parses_both_fields() {
        let desc: GroupDescriptor = serde_yaml::from_str(
            "permissions:\n  - chat.send\n  - -chat.recall\ninherits:\n  - global:anyone\n",
        )
        .unwrap();
        assert_eq!(desc.permissions, vec!["chat.send", "-chat.recall"]);
        assert_eq!(desc.inherits, vec!["global:anyone"]);
        assert!(!desc.is_empty());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result: Result<GroupDescriptor, _> =
            serde_yaml::from_str("permissions: []\npermisions: []\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_split_deny() {
        assert_eq!(split_deny("chat.send"), ("chat.send", false));
        assert_eq!(split_deny("-chat.send"), ("chat.send", true));
    }

    #[test]
    fn test_empty_descriptor_node_round_trips() {
        let node = empty_descriptor_node();
        let desc: GroupDescriptor = serde_yaml::from_value(node).unwrap();
        assert!(desc.is_empty());
    }
}
