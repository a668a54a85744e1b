//! Settings supplied by the integration layer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Resolver settings.
///
/// Owned by whatever embeds the resolver (bot adapter, service, test
/// harness) and passed to [`Registry::new`](crate::Registry::new). The
/// debug flag only toggles diagnostic logging around checks; it never
/// changes outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding one `<namespace>.yml` document per namespace.
    pub base_dir: PathBuf,

    /// Namespace used when a caller omits one from a qualified name.
    pub default_namespace: String,

    /// Log each step of permission checks at debug level.
    pub debug_check: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("permissions"),
            default_namespace: "global".to_string(),
            debug_check: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.base_dir, PathBuf::from("permissions"));
        assert_eq!(settings.default_namespace, "global");
        assert!(!settings.debug_check);
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let settings: Settings = serde_yaml::from_str("base_dir: /etc/perms\n").unwrap();
        assert_eq!(settings.base_dir, PathBuf::from("/etc/perms"));
        assert_eq!(settings.default_namespace, "global");
    }
}
