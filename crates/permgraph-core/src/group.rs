//! Permission group nodes.
//!
//! Groups live in an arena owned by the [`Registry`](crate::Registry) and
//! reference their ancestors through [`GroupId`] handles, so inheritance
//! edges carry no ownership and cannot form reference cycles. Each group
//! keeps a bounded LRU cache of check results, guarded by a
//! `parking_lot::Mutex` so checks only need a shared borrow of the
//! registry.

use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::key::GroupKey;
use crate::namespace::NamespaceId;

/// Bound on cached check results per group.
pub(crate) const CHECK_CACHE_CAPACITY: usize = 128;

/// Handle to a group in the registry arena.
///
/// Handles are valid until the next [`Registry::reload`](crate::Registry::reload),
/// which discards every group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub(crate) usize);

impl GroupId {
    /// The shared empty sentinel group. It has no rules, no ancestors, and
    /// always answers [`CheckResult::Unknown`]; failed lookups resolve to it.
    pub const EMPTY: GroupId = GroupId(0);

    /// True if this handle is the empty sentinel.
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

/// Tri-state outcome of checking one permission against one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckResult {
    /// The group grants the permission.
    Allow,
    /// The group revokes the permission. Deny is absolute: it outranks any
    /// allow found elsewhere in the same resolution step.
    Deny,
    /// The group has no opinion; resolution moves on.
    Unknown,
}

impl CheckResult {
    /// True for [`Allow`](CheckResult::Allow) and [`Deny`](CheckResult::Deny).
    pub fn is_decisive(&self) -> bool {
        !matches!(self, CheckResult::Unknown)
    }
}

/// One named policy node: its own allow/deny rule sets plus references to
/// inherited ancestor groups.
pub struct PermissionGroup {
    pub(crate) namespace: NamespaceId,
    pub(crate) namespace_name: String,
    pub(crate) key: GroupKey,
    /// Undecorated fully-qualified deny patterns, marker stripped.
    pub(crate) denies: HashSet<String>,
    /// Undecorated fully-qualified allow patterns.
    pub(crate) allows: HashSet<String>,
    /// Ancestor handles, in declaration order.
    pub(crate) inherits: Vec<GroupId>,
    /// Per-node population status doubling as a parent pointer: `Some`
    /// while the group is being populated, holding the group that
    /// triggered the load (itself for a root lookup). A lookup that finds
    /// this set has found a cycle, and the chain of these pointers
    /// reconstructs the cycle's path.
    pub(crate) populating: Option<GroupId>,
    pub(crate) cache: Mutex<LruCache<String, CheckResult>>,
}

impl PermissionGroup {
    pub(crate) fn new(namespace: NamespaceId, namespace_name: String, key: GroupKey) -> Self {
        Self {
            namespace,
            namespace_name,
            key,
            denies: HashSet::new(),
            allows: HashSet::new(),
            inherits: Vec::new(),
            populating: None,
            cache: Mutex::new(new_cache()),
        }
    }

    /// The arena slot 0 sentinel. Never populated, never matched.
    pub(crate) fn sentinel() -> Self {
        Self::new(NamespaceId(usize::MAX), String::new(), GroupKey::Name(String::new()))
    }

    /// `namespace:key` identity, as written in `inherits` lists and logs.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.namespace_name, self.key)
    }

    /// The group's key within its namespace.
    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    /// Own allow patterns (markers stripped, decoration applied).
    pub fn allows(&self) -> &HashSet<String> {
        &self.allows
    }

    /// Own deny patterns (markers stripped, decoration applied).
    pub fn denies(&self) -> &HashSet<String> {
        &self.denies
    }

    /// Ancestor handles in declaration order.
    pub fn inherits(&self) -> &[GroupId] {
        &self.inherits
    }

    pub(crate) fn cached(&self, perm: &str) -> Option<CheckResult> {
        // get marks the entry most recently used.
        self.cache.lock().get(perm).copied()
    }

    pub(crate) fn cache_store(&self, perm: &str, result: CheckResult) {
        // put evicts the least recently used entry once full.
        self.cache.lock().put(perm.to_string(), result);
    }

    pub(crate) fn clear_cache(&self) {
        self.cache.lock().clear();
    }
}

impl fmt::Debug for PermissionGroup {
    // The LRU cache has no Debug impl and is noise here anyway.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionGroup")
            .field("name", &self.qualified_name())
            .field("denies", &self.denies)
            .field("allows", &self.allows)
            .field("inherits", &self.inherits)
            .finish_non_exhaustive()
    }
}

fn new_cache() -> LruCache<String, CheckResult> {
    // CHECK_CACHE_CAPACITY is a non-zero constant.
    let capacity = NonZeroUsize::new(CHECK_CACHE_CAPACITY)
        .unwrap_or(NonZeroUsize::MIN);
    LruCache::new(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_group() -> PermissionGroup {
        PermissionGroup::new(NamespaceId(0), "global".to_string(), GroupKey::from("anyone"))
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(test_group().qualified_name(), "global:anyone");

        let numeric =
            PermissionGroup::new(NamespaceId(1), "user".to_string(), GroupKey::Id(123));
        assert_eq!(numeric.qualified_name(), "user:123");
    }

    #[test]
    fn test_cache_store_and_hit() {
        let group = test_group();
        assert_eq!(group.cached("chat.send"), None);

        group.cache_store("chat.send", CheckResult::Allow);
        assert_eq!(group.cached("chat.send"), Some(CheckResult::Allow));

        group.clear_cache();
        assert_eq!(group.cached("chat.send"), None);
    }

    #[test]
    fn test_cache_evicts_least_recently_used() {
        let group = test_group();
        for i in 0..CHECK_CACHE_CAPACITY {
            group.cache_store(&format!("perm.{i}"), CheckResult::Unknown);
        }
        // Touch the oldest entry so it survives the next eviction.
        assert_eq!(group.cached("perm.0"), Some(CheckResult::Unknown));

        group.cache_store("perm.extra", CheckResult::Deny);
        assert_eq!(group.cached("perm.0"), Some(CheckResult::Unknown));
        assert_eq!(group.cached("perm.1"), None);
        assert_eq!(group.cache.lock().len(), CHECK_CACHE_CAPACITY);
    }

    #[test]
    fn test_check_result_decisive() {
        assert!(CheckResult::Allow.is_decisive());
        assert!(CheckResult::Deny.is_decisive());
        assert!(!CheckResult::Unknown.is_decisive());
    }
}
