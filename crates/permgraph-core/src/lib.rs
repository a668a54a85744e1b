//! # permgraph
//!
//! Hierarchical permission-policy resolver: given a principal's applicable
//! groups and a dotted permission string, decide ALLOW, DENY, or no
//! opinion by walking a graph of named, inheritable permission groups
//! loaded from editable YAML documents.
//!
//! ## Model
//!
//! - A **namespace** is one YAML document mapping group keys (strings, or
//!   integers for platform-native ids) to group descriptors.
//! - A **permission group** holds allow/deny wildcard rule sets and an
//!   ordered list of inherited groups, possibly across namespaces.
//! - The **registry** owns all loaded namespaces and groups, dedupes
//!   namespaces by backing path, merges bundled defaults into `global`,
//!   and wires in externally registered preset namespaces.
//!
//! Checks consult a group's own deny rules, then its own allow rules, then
//! its ancestors in declaration order; a deny anywhere among ancestors
//! beats an earlier ancestor's allow. Results are cached per group in a
//! bounded LRU.
//!
//! ## Quick start
//!
//! ```no_run
//! use permgraph_core::{GroupKey, Registry, Settings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = Registry::new(Settings::default(), Vec::new())?;
//!
//! let (user, _) = registry.get("user", &GroupKey::Id(123), None, false);
//! let (anyone, _) = registry.get("global", &GroupKey::from("anyone"), None, false);
//!
//! if registry.evaluate([user, anyone], "chat.send") {
//!     // permitted
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Broken configuration never takes the resolver down: parse failures,
//! missing groups, and inheritance cycles degrade to an empty no-opinion
//! group and are logged via `tracing`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decorate;
pub mod descriptor;
pub mod error;
pub mod group;
pub mod key;
pub mod namespace;
pub mod registry;
pub mod resolve;
pub mod settings;
pub mod wildcard;

pub use descriptor::{GroupDescriptor, DENY_MARKER};
pub use error::{PermissionError, PermissionResult};
pub use group::{CheckResult, GroupId, PermissionGroup};
pub use key::{parse_qualified, GroupKey};
pub use namespace::{Namespace, NamespaceId};
pub use registry::{PresetNamespace, Registry};
pub use settings::Settings;
