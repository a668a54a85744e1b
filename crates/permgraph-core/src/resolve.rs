//! Resolution entry point.
//!
//! The adapter layer decides which groups apply to a principal and in what
//! order (the specific user, role groups, catch-all groups, ...); this
//! module evaluates that ordered list. The first group with a decisive
//! answer wins, and no group having an opinion means DENY.

use tracing::debug;

use crate::group::{CheckResult, GroupId};
use crate::registry::Registry;

impl Registry {
    /// Evaluate `perm` against an ordered list of applicable groups.
    ///
    /// Returns true only if some group answers ALLOW before any answers
    /// DENY. With [`Settings::debug_check`](crate::Settings) set, every
    /// step is logged at debug level; the flag never changes the outcome.
    pub fn evaluate<I>(&self, groups: I, perm: &str) -> bool
    where
        I: IntoIterator<Item = GroupId>,
    {
        let trace = self.settings().debug_check;
        if trace {
            debug!("checking {perm}");
        }
        for id in groups {
            let result = self.check(id, perm);
            if trace {
                debug!("got {:?} from {}", result, self.qualified_name(id));
            }
            match result {
                CheckResult::Allow => return true,
                CheckResult::Deny => return false,
                CheckResult::Unknown => {}
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::GroupKey;
    use crate::settings::Settings;
    use std::fs;
    use tempfile::TempDir;

    fn registry_with(doc: &str) -> (TempDir, Registry) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("global.yml"), doc).unwrap();
        let settings = Settings {
            base_dir: dir.path().to_path_buf(),
            ..Settings::default()
        };
        let reg = Registry::new(settings, Vec::new()).unwrap();
        (dir, reg)
    }

    #[test]
    fn test_first_decisive_answer_wins() {
        let (_dir, mut reg) = registry_with(concat!(
            "silent:\n  permissions: []\n",
            "denier:\n  permissions:\n    - -chat.send\n",
            "allower:\n  permissions:\n    - chat.send\n",
        ));
        let (silent, _) = reg.get("global", &GroupKey::from("silent"), None, false);
        let (denier, _) = reg.get("global", &GroupKey::from("denier"), None, false);
        let (allower, _) = reg.get("global", &GroupKey::from("allower"), None, false);

        // A no-opinion group is skipped; the denier decides before the
        // allower is ever consulted.
        assert!(!reg.evaluate([silent, denier, allower], "chat.send"));
        assert!(reg.evaluate([silent, allower, denier], "chat.send"));
    }

    #[test]
    fn test_default_is_deny() {
        let (_dir, mut reg) = registry_with("silent:\n  permissions: []\n");
        let (silent, _) = reg.get("global", &GroupKey::from("silent"), None, false);

        assert!(!reg.evaluate([silent], "chat.send"));
        assert!(!reg.evaluate(Vec::<GroupId>::new(), "chat.send"));
    }

    #[test]
    fn test_sentinel_groups_are_skipped() {
        let (_dir, mut reg) = registry_with("allower:\n  permissions:\n    - chat.send\n");
        let (missing, found) = reg.get("global", &GroupKey::from("missing"), None, false);
        assert!(!found);
        let (allower, _) = reg.get("global", &GroupKey::from("allower"), None, false);

        assert!(reg.evaluate([missing, allower], "chat.send"));
    }
}
