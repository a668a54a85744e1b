//! Namespaces: one editable YAML document holding a collection of group
//! descriptors.
//!
//! A namespace is created on first reference and lives until the next full
//! registry reload. Document parse failures degrade to an empty document
//! and are logged; they never abort loading of sibling namespaces. Key
//! order of untouched entries survives edits (`serde_yaml::Mapping` is
//! insertion-ordered); YAML comments do not survive serialization, an
//! accepted loss recorded in DESIGN.md.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::error;

use crate::descriptor::empty_descriptor_node;
use crate::error::{PermissionError, PermissionResult};
use crate::group::GroupId;
use crate::key::GroupKey;

/// Handle to a namespace in the registry arena. Valid until the next
/// [`Registry::reload`](crate::Registry::reload).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceId(pub(crate) usize);

/// A named, independently persisted collection of permission groups.
#[derive(Debug)]
pub struct Namespace {
    name: String,
    path: Option<PathBuf>,
    doc: Mapping,
    /// Materialized groups, keyed by group key. Missing or invalid
    /// descriptors cache the empty sentinel so repeated lookups stay cheap.
    pub(crate) groups: HashMap<GroupKey, GroupId>,
    dirty: bool,
    modifiable: bool,
    auto_decorate: bool,
}

impl Namespace {
    /// Load a namespace document from `path`.
    ///
    /// When `required` is false a missing file is an empty document; any
    /// read or parse failure is logged and degrades to an empty document.
    pub(crate) fn load(name: &str, path: PathBuf, required: bool, modifiable: bool) -> Self {
        let doc = if !required && !path.is_file() {
            Mapping::new()
        } else {
            read_document(name, &path)
        };
        Self {
            name: name.to_string(),
            path: Some(path),
            doc,
            groups: HashMap::new(),
            dirty: false,
            modifiable,
            auto_decorate: false,
        }
    }

    /// Namespace name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing document path, if this namespace is file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// True if in-memory edits have not been written back yet.
    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// False for read-only sources (bundled defaults, registered presets).
    pub fn modifiable(&self) -> bool {
        self.modifiable
    }

    /// Whether permission entries are rewritten through decoration when
    /// groups of this namespace are populated. Set for presets registered
    /// with the auto-decorate flag.
    pub fn auto_decorate(&self) -> bool {
        self.auto_decorate
    }

    pub(crate) fn set_auto_decorate(&mut self, decorate: bool) {
        self.auto_decorate = decorate;
    }

    /// The raw backing document.
    pub fn document(&self) -> &Mapping {
        &self.doc
    }

    /// Raw descriptor node for `key`, if present.
    pub(crate) fn raw_descriptor(&self, key: &GroupKey) -> Option<&Value> {
        self.doc.get(key.to_value())
    }

    pub(crate) fn contains_key(&self, key: &GroupKey) -> bool {
        self.doc.contains_key(key.to_value())
    }

    /// Merge a default descriptor for `key` unless the document already
    /// defines it. Used only for the bundled-defaults merge during
    /// bootstrap, which must not mark the namespace dirty.
    pub(crate) fn merge_default(&mut self, key: Value, descriptor: Value) {
        if !self.doc.contains_key(&key) {
            self.doc.insert(key, descriptor);
        }
    }

    /// Force the document to be written out on the next [`save`](Self::save).
    /// No-op for read-only namespaces, preserving the invariant that they
    /// never become dirty.
    pub(crate) fn mark_dirty(&mut self) {
        if self.modifiable {
            self.dirty = true;
        }
    }

    /// Persist the document if it is modifiable and has unsaved edits.
    ///
    /// `dirty` is cleared only after a successful write, so a failed save
    /// is retried by the next one.
    pub fn save(&mut self) -> PermissionResult<()> {
        if !(self.modifiable && self.dirty) {
            return Ok(());
        }
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_yaml::to_string(&self.doc)?;
        fs::write(path, text)?;
        self.dirty = false;
        Ok(())
    }

    /// Insert an empty descriptor under `key`.
    ///
    /// Evicts any stale materialized group for the key and marks the
    /// namespace dirty.
    pub fn add_group(&mut self, key: &GroupKey) -> PermissionResult<()> {
        if !self.modifiable {
            return Err(PermissionError::Unmodifiable(self.name.clone()));
        }
        if self.contains_key(key) {
            return Err(PermissionError::DuplicateGroup(self.qualify(key)));
        }
        self.doc.insert(key.to_value(), empty_descriptor_node());
        self.groups.remove(key);
        self.dirty = true;
        Ok(())
    }

    /// Delete the descriptor under `key`.
    ///
    /// Refuses with [`PermissionError::NonEmptyGroup`] if the descriptor
    /// still has any non-empty field and `force` is false.
    pub fn remove_group(&mut self, key: &GroupKey, force: bool) -> PermissionResult<()> {
        if !self.modifiable {
            return Err(PermissionError::Unmodifiable(self.name.clone()));
        }
        let Some(node) = self.doc.get(key.to_value()) else {
            return Err(PermissionError::GroupNotFound(self.qualify(key)));
        };
        if !force && descriptor_has_contents(node) {
            return Err(PermissionError::NonEmptyGroup(self.qualify(key)));
        }
        self.doc.remove(key.to_value());
        self.groups.remove(key);
        self.dirty = true;
        Ok(())
    }

    /// Run `mutate` against the descriptor mapping for `key`, marking the
    /// namespace dirty only if the closure succeeds. Failures inside the
    /// mutation leave the dirty flag untouched.
    pub(crate) fn with_descriptor_mut<T>(
        &mut self,
        key: &GroupKey,
        mutate: impl FnOnce(&mut Mapping) -> PermissionResult<T>,
    ) -> PermissionResult<T> {
        if !self.modifiable {
            return Err(PermissionError::Unmodifiable(self.name.clone()));
        }
        let qualified = self.qualify(key);
        let node = self
            .doc
            .get_mut(key.to_value())
            .ok_or_else(|| PermissionError::GroupNotFound(qualified.clone()))?;
        if node.is_null() {
            // A bare `key:` line parses as null; promote it so it can hold fields.
            *node = Value::Mapping(Mapping::new());
        }
        let Value::Mapping(map) = node else {
            return Err(PermissionError::MalformedDescriptor(qualified));
        };
        let out = mutate(map)?;
        self.dirty = true;
        Ok(out)
    }

    pub(crate) fn qualify(&self, key: &GroupKey) -> String {
        format!("{}:{}", self.name, key)
    }
}

fn read_document(name: &str, path: &Path) -> Mapping {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            error!(namespace = name, path = %path.display(), %err, "failed to read namespace document");
            return Mapping::new();
        }
    };
    match serde_yaml::from_str::<Value>(&text) {
        Ok(Value::Mapping(doc)) => doc,
        Ok(_) => {
            error!(namespace = name, path = %path.display(), "namespace document is not a mapping");
            Mapping::new()
        }
        Err(err) => {
            error!(namespace = name, path = %path.display(), %err, "failed to parse namespace document");
            Mapping::new()
        }
    }
}

/// True if any descriptor field holds contents worth protecting from an
/// unforced removal.
fn descriptor_has_contents(node: &Value) -> bool {
    match node {
        Value::Mapping(map) => map.iter().any(|(_, v)| match v {
            Value::Sequence(seq) => !seq.is_empty(),
            Value::Null => false,
            _ => true,
        }),
        Value::Null => false,
        _ => true,
    }
}
