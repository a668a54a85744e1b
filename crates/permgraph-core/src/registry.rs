//! The namespace registry: process-wide table of loaded namespaces and the
//! group arena behind every lookup.
//!
//! The registry owns all mutable resolver state as one explicit value with
//! a defined construction/reload/teardown lifecycle. Namespaces are keyed
//! both by name and by normalized backing path, so the same physical file
//! is never loaded twice under different names. Groups live in an arena
//! indexed by [`GroupId`]; slot 0 is the shared empty sentinel that failed
//! lookups resolve to.
//!
//! Population and mutation take `&mut self`, so the transient in-progress
//! marker used for cycle detection is only ever visible within one
//! uninterrupted call chain. Checks take `&self`; per-group result caches
//! use interior mutability.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::{debug, error, warn};

use crate::decorate::decorate_one;
use crate::descriptor::{split_deny, GroupDescriptor};
use crate::error::{PermissionError, PermissionResult};
use crate::group::{CheckResult, GroupId, PermissionGroup};
use crate::key::{parse_qualified, GroupKey};
use crate::namespace::{Namespace, NamespaceId};
use crate::settings::Settings;
use crate::wildcard;

/// Bundled read-only document defining the well-known default global groups.
const BUNDLED_DEFAULTS: &str = include_str!("defaults.yml");

/// Namespaces seeded with an example group when their document is absent.
const SEEDED_NAMESPACES: [&str; 2] = ["group", "user"];

/// A read-only namespace registered by an external component.
///
/// When a preset defines a group whose key matches one of the well-known
/// default global groups, the preset group is automatically appended to
/// that global group's inheritance when it is populated.
#[derive(Debug, Clone)]
pub struct PresetNamespace {
    /// Namespace name. `global` is reserved.
    pub name: String,
    /// Path to the preset document.
    pub path: PathBuf,
    /// Rewrite the preset's permission entries through name decoration,
    /// using the namespace name as the base.
    pub decorate: bool,
}

/// Process-wide permission-policy resolver state.
pub struct Registry {
    settings: Settings,
    presets: Vec<PresetNamespace>,
    namespaces: Vec<Namespace>,
    by_name: HashMap<String, NamespaceId>,
    by_path: HashMap<PathBuf, NamespaceId>,
    groups: Vec<PermissionGroup>,
    preset_ids: Vec<NamespaceId>,
    default_groups: HashSet<String>,
}

impl Registry {
    /// Build a registry and run the bootstrap: merge bundled defaults into
    /// the `global` namespace, load registered presets, and seed the
    /// `global`/`group`/`user` documents on disk where absent.
    pub fn new(settings: Settings, presets: Vec<PresetNamespace>) -> PermissionResult<Self> {
        for preset in &presets {
            if preset.name == "global" {
                return Err(PermissionError::ReservedNamespace(preset.name.clone()));
            }
        }
        let mut registry = Self {
            settings,
            presets,
            namespaces: Vec::new(),
            by_name: HashMap::new(),
            by_path: HashMap::new(),
            groups: vec![PermissionGroup::sentinel()],
            preset_ids: Vec::new(),
            default_groups: HashSet::new(),
        };
        registry.bootstrap();
        Ok(registry)
    }

    /// Resolver settings as supplied at construction.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Resolve a group by namespace name and key, loading lazily.
    ///
    /// Never fails for "not found": the second element reports whether the
    /// group exists, and a failed lookup yields the empty sentinel. With
    /// `required` set, a missing group additionally logs an error naming
    /// the requester.
    pub fn get(
        &mut self,
        namespace: &str,
        key: &GroupKey,
        referer: Option<GroupId>,
        required: bool,
    ) -> (GroupId, bool) {
        let ns = self.get_namespace(namespace, required, None);
        self.get_group(ns, key, referer, required)
    }

    /// Resolve a group by qualified name (`namespace:key`, or a bare key
    /// resolved against [`Settings::default_namespace`](crate::Settings)).
    pub fn get_qualified(&mut self, qualified: &str, required: bool) -> (GroupId, bool) {
        let (ns, key) = parse_qualified(qualified, &self.settings.default_namespace);
        self.get(&ns, &key, None, required)
    }

    /// Return the cached namespace for `name`, or construct one.
    ///
    /// Construction resolves the backing path (the override, or
    /// `<base_dir>/<name>.yml`) and dedupes on it: two names resolving to
    /// the same file share one namespace. Namespaces constructed with a
    /// `path_override` are read-only.
    pub fn get_namespace(
        &mut self,
        name: &str,
        required: bool,
        path_override: Option<PathBuf>,
    ) -> NamespaceId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let modifiable = path_override.is_none();
        let path = path_override
            .unwrap_or_else(|| self.settings.base_dir.join(format!("{name}.yml")));
        let path = normalize_path(&path);
        let id = match self.by_path.get(&path) {
            Some(&id) => id,
            None => {
                let ns = Namespace::load(name, path.clone(), required, modifiable);
                let id = NamespaceId(self.namespaces.len());
                self.namespaces.push(ns);
                self.by_path.insert(path, id);
                id
            }
        };
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Shared access to a loaded namespace.
    pub fn namespace(&self, id: NamespaceId) -> &Namespace {
        &self.namespaces[id.0]
    }

    /// Exclusive access to a loaded namespace, for group add/remove and
    /// explicit saves.
    pub fn namespace_mut(&mut self, id: NamespaceId) -> &mut Namespace {
        &mut self.namespaces[id.0]
    }

    /// Shared access to a materialized group. `None` for the sentinel.
    pub fn group(&self, id: GroupId) -> Option<&PermissionGroup> {
        if id.is_empty() {
            return None;
        }
        self.groups.get(id.0)
    }

    /// `namespace:key` for a handle, or `<empty>` for the sentinel.
    pub fn qualified_name(&self, id: GroupId) -> String {
        match self.group(id) {
            Some(group) => group.qualified_name(),
            None => "<empty>".to_string(),
        }
    }

    /// Drop all namespaces, groups, and caches, then re-run the bootstrap
    /// so documents are re-parsed on next access.
    ///
    /// Refuses and returns false when any loaded modifiable namespace has
    /// unsaved edits, unless `force` is set.
    pub fn reload(&mut self, force: bool) -> bool {
        if !force && self.namespaces.iter().any(Namespace::dirty) {
            return false;
        }
        self.namespaces.clear();
        self.by_name.clear();
        self.by_path.clear();
        self.groups.clear();
        self.groups.push(PermissionGroup::sentinel());
        self.preset_ids.clear();
        self.default_groups.clear();
        self.bootstrap();
        true
    }

    /// Persist every loaded namespace. A failure on one namespace is
    /// logged and does not prevent the others from saving; returns whether
    /// all succeeded. Failed namespaces stay dirty so a later save retries.
    pub fn save_all(&mut self) -> bool {
        debug!("saving permission namespaces");
        let mut all_ok = true;
        for ns in &mut self.namespaces {
            if let Err(err) = ns.save() {
                all_ok = false;
                error!(namespace = ns.name(), %err, "failed to save namespace");
            }
        }
        all_ok
    }

    /// Check one permission against one group: own denies, then own
    /// allows, then ancestors in declaration order. Results are cached per
    /// group in a bounded LRU.
    pub fn check(&self, id: GroupId, perm: &str) -> CheckResult {
        let Some(group) = self.group(id) else {
            return CheckResult::Unknown;
        };
        if let Some(result) = group.cached(perm) {
            return result;
        }
        let result = self.check_uncached(group, perm);
        group.cache_store(perm, result);
        result
    }

    fn check_uncached(&self, group: &PermissionGroup, perm: &str) -> CheckResult {
        if wildcard::matches(perm, &group.denies) {
            return CheckResult::Deny;
        }
        if wildcard::matches(perm, &group.allows) {
            return CheckResult::Allow;
        }

        // An ancestor's allow stays pending: a deny from any later ancestor
        // still overrides it.
        let mut allowed = false;
        for &ancestor in &group.inherits {
            match self.check(ancestor, perm) {
                CheckResult::Deny => return CheckResult::Deny,
                CheckResult::Allow => allowed = true,
                CheckResult::Unknown => {}
            }
        }
        if allowed {
            CheckResult::Allow
        } else {
            CheckResult::Unknown
        }
    }

    pub(crate) fn get_group(
        &mut self,
        ns: NamespaceId,
        key: &GroupKey,
        referer: Option<GroupId>,
        required: bool,
    ) -> (GroupId, bool) {
        if let Some(&id) = self.namespaces[ns.0].groups.get(key) {
            if id.is_empty() {
                return (id, false);
            }
            if self.groups[id.0].populating.is_none() {
                return (id, true);
            }
            // Mid-population hit: the requested group is an ancestor of
            // itself. Drop the cycle-closing edge and degrade to no-opinion.
            self.log_cycle(ns, key, referer);
            return (GroupId::EMPTY, false);
        }
        self.get_group_uncached(ns, key, referer, required)
    }

    fn get_group_uncached(
        &mut self,
        ns: NamespaceId,
        key: &GroupKey,
        referer: Option<GroupId>,
        required: bool,
    ) -> (GroupId, bool) {
        let Some(raw) = self.namespaces[ns.0].raw_descriptor(key).cloned() else {
            if required {
                let target = self.namespaces[ns.0].qualify(key);
                match referer.and_then(|r| self.group(r)) {
                    Some(from) => error!(
                        "permission group {} not found (required from {})",
                        target,
                        from.qualified_name()
                    ),
                    None => error!("permission group {} not found", target),
                }
            }
            self.namespaces[ns.0].groups.insert(key.clone(), GroupId::EMPTY);
            return (GroupId::EMPTY, false);
        };

        let mut desc: GroupDescriptor = match serde_yaml::from_value(raw) {
            Ok(desc) => desc,
            Err(err) => {
                error!(
                    group = %self.namespaces[ns.0].qualify(key),
                    %err,
                    "group descriptor failed schema validation"
                );
                self.namespaces[ns.0].groups.insert(key.clone(), GroupId::EMPTY);
                return (GroupId::EMPTY, false);
            }
        };

        // Default global groups are automatically extended by presets that
        // define the same key.
        if self.namespaces[ns.0].name() == "global" {
            if let Some(name) = key.as_name() {
                if self.default_groups.contains(name) {
                    for &pid in &self.preset_ids {
                        if self.namespaces[pid.0].contains_key(key) {
                            desc.inherits
                                .push(format!("{}:{}", self.namespaces[pid.0].name(), key));
                        }
                    }
                }
            }
        }

        // Register before populating, so self-referential or mutually
        // referential inheritance hits the cycle path instead of recursing.
        let ns_name = self.namespaces[ns.0].name().to_string();
        let id = GroupId(self.groups.len());
        self.groups
            .push(PermissionGroup::new(ns, ns_name.clone(), key.clone()));
        self.namespaces[ns.0].groups.insert(key.clone(), id);

        let decorate_base = self.namespaces[ns.0].auto_decorate().then_some(ns_name);
        self.populate(id, desc, referer, decorate_base);
        (id, true)
    }

    fn populate(
        &mut self,
        id: GroupId,
        desc: GroupDescriptor,
        referer: Option<GroupId>,
        decorate_base: Option<String>,
    ) {
        self.groups[id.0].populating = Some(referer.unwrap_or(id));
        let own_namespace = self.groups[id.0].namespace_name.clone();

        for parent in &desc.inherits {
            let (ns, key) = parse_qualified(parent, &own_namespace);
            let (ancestor, found) = self.get(&ns, &key, Some(id), true);
            if found {
                self.groups[id.0].inherits.push(ancestor);
            }
        }

        for item in &desc.permissions {
            let (pattern, deny) = split_deny(item);
            let pattern = match &decorate_base {
                Some(base) => decorate_one(base, pattern),
                None => pattern.to_string(),
            };
            let group = &mut self.groups[id.0];
            if deny {
                group.denies.insert(pattern);
            } else {
                group.allows.insert(pattern);
            }
        }

        self.groups[id.0].populating = None;
    }

    fn log_cycle(&self, ns: NamespaceId, key: &GroupKey, referer: Option<GroupId>) {
        let here = self.namespaces[ns.0].qualify(key);
        let mut cycle = vec![here.clone()];
        let mut cursor = referer;
        while let Some(id) = cursor {
            let group = &self.groups[id.0];
            if group.namespace == ns && group.key == *key {
                break;
            }
            cycle.push(group.qualified_name());
            let next = group.populating;
            if next == Some(id) {
                // Root lookup points at itself.
                break;
            }
            cursor = next;
        }
        cycle.push(here);
        let path: Vec<&str> = cycle.iter().rev().map(String::as_str).collect();
        error!("inheritance cycle detected: {}", path.join(" -> "));
    }

    /// Add a permission entry to a group (leading `-` marks deny).
    ///
    /// Appends the literal entry to the group's document list and updates
    /// the in-memory rule set. Only this group's own check cache is
    /// cleared; groups inheriting from it keep cached answers until
    /// natural eviction or reload.
    pub fn add_item(&mut self, id: GroupId, item: &str) -> PermissionResult<()> {
        let (ns, key, qualified) = self.group_context(id)?;
        self.ensure_modifiable(ns)?;
        let (pattern, deny) = split_deny(item);
        {
            let group = &self.groups[id.0];
            let target = if deny { &group.denies } else { &group.allows };
            if target.contains(pattern) {
                return Err(PermissionError::DuplicateItem(pattern.to_string()));
            }
        }
        self.namespaces[ns.0].with_descriptor_mut(&key, |map| {
            let entry = map
                .entry(Value::String("permissions".to_string()))
                .or_insert_with(|| Value::Sequence(Vec::new()));
            let Value::Sequence(seq) = entry else {
                return Err(PermissionError::MalformedDescriptor(qualified));
            };
            seq.push(Value::String(item.to_string()));
            Ok(())
        })?;

        let group = &mut self.groups[id.0];
        if deny {
            group.denies.insert(pattern.to_string());
        } else {
            group.allows.insert(pattern.to_string());
        }
        group.clear_cache();
        Ok(())
    }

    /// Remove a permission entry from a group (leading `-` marks deny).
    pub fn remove_item(&mut self, id: GroupId, item: &str) -> PermissionResult<()> {
        let (ns, key, qualified) = self.group_context(id)?;
        self.ensure_modifiable(ns)?;
        let (pattern, deny) = split_deny(item);
        {
            let group = &self.groups[id.0];
            let target = if deny { &group.denies } else { &group.allows };
            if !target.contains(pattern) {
                return Err(PermissionError::ItemNotFound(pattern.to_string()));
            }
        }
        self.namespaces[ns.0].with_descriptor_mut(&key, |map| {
            let removed = match map.get_mut("permissions") {
                Some(Value::Sequence(seq)) => {
                    match seq.iter().position(|v| v.as_str() == Some(item)) {
                        Some(pos) => {
                            seq.remove(pos);
                            true
                        }
                        None => false,
                    }
                }
                _ => false,
            };
            if !removed {
                // The in-memory set had the entry, the document did not.
                warn!(group = %qualified, item, "permission entry missing from document");
            }
            Ok(())
        })?;

        let group = &mut self.groups[id.0];
        if deny {
            group.denies.remove(pattern);
        } else {
            group.allows.remove(pattern);
        }
        group.clear_cache();
        Ok(())
    }

    /// Append `target` to a group's inheritance, in both the live graph
    /// and the document.
    ///
    /// Rejects an edge that would close a cycle, keeping the live graph
    /// acyclic. Documents can still spell out a cycle by hand; those edges
    /// are dropped during population instead.
    pub fn add_inheritance(&mut self, id: GroupId, target: GroupId) -> PermissionResult<()> {
        let (ns, key, qualified) = self.group_context(id)?;
        let (_, _, target_qualified) = self.group_context(target)?;
        self.ensure_modifiable(ns)?;
        if self.groups[id.0].inherits.contains(&target) {
            return Err(PermissionError::DuplicateInheritance(target_qualified));
        }
        if self.inherits_transitively(target, id) {
            return Err(PermissionError::InheritanceCycle(target_qualified));
        }
        self.namespaces[ns.0].with_descriptor_mut(&key, |map| {
            let entry = map
                .entry(Value::String("inherits".to_string()))
                .or_insert_with(|| Value::Sequence(Vec::new()));
            let Value::Sequence(seq) = entry else {
                return Err(PermissionError::MalformedDescriptor(qualified));
            };
            seq.push(Value::String(target_qualified.clone()));
            Ok(())
        })?;

        let group = &mut self.groups[id.0];
        group.inherits.push(target);
        group.clear_cache();
        Ok(())
    }

    /// Remove `target` from a group's inheritance. The document entry is
    /// erased in whichever form it was recorded: the qualified name, or
    /// the bare key when the target shares this group's namespace.
    pub fn remove_inheritance(&mut self, id: GroupId, target: GroupId) -> PermissionResult<()> {
        let (ns, key, _) = self.group_context(id)?;
        let (target_ns, target_key, target_qualified) = self.group_context(target)?;
        self.ensure_modifiable(ns)?;
        let Some(pos) = self.groups[id.0].inherits.iter().position(|&g| g == target) else {
            return Err(PermissionError::InheritanceNotFound(target_qualified));
        };

        let mut candidates = vec![target_qualified];
        if target_ns == ns {
            candidates.push(target_key.to_string());
        }
        self.namespaces[ns.0].with_descriptor_mut(&key, |map| {
            if let Some(Value::Sequence(seq)) = map.get_mut("inherits") {
                for candidate in &candidates {
                    if let Some(doc_pos) = seq
                        .iter()
                        .position(|v| v.as_str() == Some(candidate.as_str()))
                    {
                        seq.remove(doc_pos);
                        break;
                    }
                }
            }
            Ok(())
        })?;

        let group = &mut self.groups[id.0];
        group.inherits.remove(pos);
        group.clear_cache();
        Ok(())
    }

    /// True if `needle` is reachable from `start` through inheritance
    /// edges, counting `start` itself.
    fn inherits_transitively(&self, start: GroupId, needle: GroupId) -> bool {
        let mut stack = vec![start];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == needle {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(group) = self.group(id) {
                stack.extend(group.inherits.iter().copied());
            }
        }
        false
    }

    fn group_context(&self, id: GroupId) -> PermissionResult<(NamespaceId, GroupKey, String)> {
        match self.group(id) {
            Some(group) => Ok((group.namespace, group.key.clone(), group.qualified_name())),
            None => Err(PermissionError::GroupNotFound("<empty>".to_string())),
        }
    }

    fn ensure_modifiable(&self, ns: NamespaceId) -> PermissionResult<()> {
        let namespace = &self.namespaces[ns.0];
        if namespace.modifiable() {
            Ok(())
        } else {
            Err(PermissionError::Unmodifiable(namespace.name().to_string()))
        }
    }

    fn bootstrap(&mut self) {
        let global = self.get_namespace("global", false, None);

        // Merge bundled defaults without overwriting user-defined groups.
        let defaults = match serde_yaml::from_str::<Mapping>(BUNDLED_DEFAULTS) {
            Ok(doc) => doc,
            Err(err) => {
                error!(%err, "bundled defaults document failed to parse");
                Mapping::new()
            }
        };
        for (key, descriptor) in defaults {
            if let Some(name) = key.as_str() {
                self.default_groups.insert(name.to_string());
            }
            self.namespaces[global.0].merge_default(key, descriptor);
        }

        // Presets, re-registered on every reload.
        for preset in self.presets.clone() {
            let id = self.get_namespace(&preset.name, true, Some(preset.path));
            self.namespaces[id.0].set_auto_decorate(preset.decorate);
            self.preset_ids.push(id);
        }

        // Write the merged global document out if it does not exist yet.
        if !self.namespaces[global.0].path().is_some_and(Path::is_file) {
            self.namespaces[global.0].mark_dirty();
            if let Err(err) = self.namespaces[global.0].save() {
                error!(namespace = "global", %err, "failed to seed namespace document");
            }
        }

        // Seed the platform namespaces with one example group.
        for name in SEEDED_NAMESPACES {
            let id = self.get_namespace(name, false, None);
            let ns = &mut self.namespaces[id.0];
            if !ns.path().is_some_and(Path::is_file) {
                if let Err(err) = ns
                    .add_group(&GroupKey::Id(42))
                    .and_then(|_| ns.save())
                {
                    error!(namespace = name, %err, "failed to seed namespace document");
                }
            }
        }
    }
}

/// Canonical form used for the by-path dedup key. Falls back to lexical
/// normalization when the file does not exist yet.
fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}
