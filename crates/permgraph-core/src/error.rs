//! Error types for permission resolution and policy mutation.

use thiserror::Error;

/// Errors surfaced by policy mutation and persistence operations.
///
/// Lookup failures (missing groups, inheritance cycles, malformed
/// descriptors) are deliberately *not* represented here: the resolver
/// degrades those to an empty no-opinion group and logs, so that a broken
/// configuration entry can never take the whole resolver down. This enum
/// covers the conditions a caller must react to.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// Mutation attempted on a read-only namespace (bundled defaults or a
    /// registered preset).
    #[error("namespace '{0}' is not modifiable")]
    Unmodifiable(String),

    /// `add_group` target already exists.
    #[error("group '{0}' already exists")]
    DuplicateGroup(String),

    /// Mutation target group does not exist.
    #[error("group '{0}' not found")]
    GroupNotFound(String),

    /// `remove_group` refused because the descriptor still has contents.
    #[error("group '{0}' is not empty; pass force to remove it anyway")]
    NonEmptyGroup(String),

    /// Permission entry already present in the group.
    #[error("permission entry '{0}' already present")]
    DuplicateItem(String),

    /// Permission entry not present in the group.
    #[error("permission entry '{0}' not found")]
    ItemNotFound(String),

    /// Inheritance edge already present in the group.
    #[error("'{0}' is already inherited")]
    DuplicateInheritance(String),

    /// Inheritance edge not present in the group.
    #[error("'{0}' is not inherited")]
    InheritanceNotFound(String),

    /// Adding the inheritance edge would close a cycle.
    #[error("inheriting '{0}' would create a cycle")]
    InheritanceCycle(String),

    /// A preset namespace tried to register under a reserved name.
    #[error("namespace name '{0}' is reserved")]
    ReservedNamespace(String),

    /// A group descriptor node is not a mapping and cannot be edited.
    #[error("descriptor for '{0}' is malformed")]
    MalformedDescriptor(String),

    /// I/O failure while persisting a namespace document.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization failure while persisting a namespace document.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for policy operations.
pub type PermissionResult<T> = Result<T, PermissionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_the_entity() {
        let err = PermissionError::Unmodifiable("global".to_string());
        assert_eq!(err.to_string(), "namespace 'global' is not modifiable");

        let err = PermissionError::NonEmptyGroup("group:42".to_string());
        assert!(err.to_string().contains("group:42"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = PermissionError::from(io);
        assert!(matches!(err, PermissionError::Io(_)));
    }
}
