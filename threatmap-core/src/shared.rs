//! Shared-entity detection
//!
//! Proximate targets live in one flat namespace underneath the strict
//! target → capability → requirement tree. A proximate target reached from
//! two or more ultimate targets is "shared": one entity serving several
//! actors.

use std::collections::{BTreeSet, HashMap};

use crate::models::HierarchyStore;

/// Proximate target name → names of the ultimate targets that reference it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedIndex {
    owners: HashMap<String, BTreeSet<String>>,
}

impl SharedIndex {
    /// Ultimate targets referencing `pt`, if any
    pub fn owners(&self, pt: &str) -> Option<&BTreeSet<String>> {
        self.owners.get(pt)
    }

    /// True when at least two distinct ultimate targets reference `pt`
    pub fn is_shared(&self, pt: &str) -> bool {
        self.owners.get(pt).is_some_and(|o| o.len() >= 2)
    }

    /// Names of all shared proximate targets, sorted
    pub fn shared_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .owners
            .iter()
            .filter(|(_, owners)| owners.len() >= 2)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.owners.iter()
    }
}

/// Scans every proximate target reference and records which ultimate
/// targets reach it.
///
/// Several references from the same ultimate target count once.
pub fn detect_shared_entities(store: &HierarchyStore) -> SharedIndex {
    let mut owners: HashMap<String, BTreeSet<String>> = HashMap::new();
    for (ut, _, req) in store.requirements() {
        for pt in &req.proximate_targets {
            owners
                .entry(pt.clone())
                .or_default()
                .insert(ut.name.clone());
        }
    }
    SharedIndex { owners }
}
