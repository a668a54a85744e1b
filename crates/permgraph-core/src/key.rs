//! Group identity: string-or-integer keys and qualified name parsing.
//!
//! Groups in the `group` and `user` namespaces are keyed by platform-native
//! numeric ids; everywhere else keys are symbolic names. Composite
//! cross-adapter ids (e.g. `platform:12345`) stay strings because they do
//! not parse as integers.

use std::fmt;

use serde_yaml::Value;

/// Namespaces whose group keys are coerced to integers when possible.
const NUMERIC_KEY_NAMESPACES: [&str; 2] = ["group", "user"];

/// Key identifying a permission group within its namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// Symbolic name, used by `global` and preset namespaces.
    Name(String),
    /// Platform-native numeric id, used by the `group`/`user` namespaces.
    Id(i64),
}

impl GroupKey {
    /// Parse a raw key in the context of `namespace`.
    ///
    /// Text that parses as an integer becomes [`GroupKey::Id`] for the
    /// `group` and `user` namespaces, and stays a string everywhere else.
    pub fn parse(namespace: &str, raw: &str) -> Self {
        if NUMERIC_KEY_NAMESPACES.contains(&namespace) {
            if let Ok(id) = raw.parse::<i64>() {
                return GroupKey::Id(id);
            }
        }
        GroupKey::Name(raw.to_string())
    }

    /// Convert to a YAML document key.
    pub fn to_value(&self) -> Value {
        match self {
            GroupKey::Name(name) => Value::String(name.clone()),
            GroupKey::Id(id) => Value::Number((*id).into()),
        }
    }

    /// Convert from a YAML document key, if it is a string or integer.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(name) => Some(GroupKey::Name(name.clone())),
            Value::Number(num) => num.as_i64().map(GroupKey::Id),
            _ => None,
        }
    }

    /// The symbolic name, if this is a named key.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            GroupKey::Name(name) => Some(name),
            GroupKey::Id(_) => None,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Name(name) => write!(f, "{}", name),
            GroupKey::Id(id) => write!(f, "{}", id),
        }
    }
}

impl From<&str> for GroupKey {
    fn from(name: &str) -> Self {
        GroupKey::Name(name.to_string())
    }
}

impl From<i64> for GroupKey {
    fn from(id: i64) -> Self {
        GroupKey::Id(id)
    }
}

/// Parse a qualified group name (`namespace:key`, or a bare `key` resolved
/// against `default_namespace`).
pub fn parse_qualified(qualified: &str, default_namespace: &str) -> (String, GroupKey) {
    match qualified.split_once(':') {
        Some((namespace, key)) => (namespace.to_string(), GroupKey::parse(namespace, key)),
        None => (
            default_namespace.to_string(),
            GroupKey::parse(default_namespace, qualified),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_coercion_only_for_platform_namespaces() {
        assert_eq!(GroupKey::parse("user", "123"), GroupKey::Id(123));
        assert_eq!(GroupKey::parse("group", "42"), GroupKey::Id(42));
        assert_eq!(
            GroupKey::parse("global", "123"),
            GroupKey::Name("123".to_string())
        );
    }

    #[test]
    fn test_composite_ids_stay_strings() {
        assert_eq!(
            GroupKey::parse("user", "platform:12345"),
            GroupKey::Name("platform:12345".to_string())
        );
    }

    #[test]
    fn test_parse_qualified_with_namespace() {
        let (ns, key) = parse_qualified("global:anyone", "user");
        assert_eq!(ns, "global");
        assert_eq!(key, GroupKey::Name("anyone".to_string()));
    }

    #[test]
    fn test_parse_qualified_bare_uses_default() {
        let (ns, key) = parse_qualified("anyone", "global");
        assert_eq!(ns, "global");
        assert_eq!(key, GroupKey::Name("anyone".to_string()));

        let (ns, key) = parse_qualified("123", "user");
        assert_eq!(ns, "user");
        assert_eq!(key, GroupKey::Id(123));
    }

    #[test]
    fn test_yaml_value_round_trip() {
        let key = GroupKey::Id(42);
        assert_eq!(GroupKey::from_value(&key.to_value()), Some(key));

        let key = GroupKey::Name("anyone".to_string());
        assert_eq!(GroupKey::from_value(&key.to_value()), Some(key));

        assert_eq!(GroupKey::from_value(&Value::Null), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(GroupKey::Id(7).to_string(), "7");
        assert_eq!(GroupKey::from("admins").to_string(), "admins");
    }
}
