use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::names::normalize_name;
use crate::shared::detect_shared_entities;

/// Errors raised by the editing operations on a [`HierarchyStore`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("Name must not be empty")]
    EmptyName,

    #[error("{kind} '{name}' already exists")]
    Duplicate { kind: Level, name: String },

    #[error("{kind} not found: {path}")]
    NotFound { kind: Level, path: String },
}

/// The four levels of the threat decomposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    UltimateTarget,
    Capability,
    Requirement,
    ProximateTarget,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::UltimateTarget => write!(f, "Ultimate target"),
            Level::Capability => write!(f, "Critical capability"),
            Level::Requirement => write!(f, "Critical requirement"),
            Level::ProximateTarget => write!(f, "Proximate target"),
        }
    }
}

/// A critical requirement and the proximate targets that satisfy it.
///
/// Proximate targets are held by name only. The same name under any other
/// requirement is the same entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CriticalRequirement {
    pub name: String,
    #[serde(default)]
    pub proximate_targets: Vec<String>,
}

impl CriticalRequirement {
    pub fn new(name: String) -> Self {
        Self {
            name,
            proximate_targets: Vec::new(),
        }
    }
}

/// A critical capability of an ultimate target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Capability {
    pub name: String,
    #[serde(default)]
    pub requirements: Vec<CriticalRequirement>,
}

impl Capability {
    pub fn new(name: String) -> Self {
        Self {
            name,
            requirements: Vec::new(),
        }
    }

    pub fn requirement(&self, name: &str) -> Option<&CriticalRequirement> {
        self.requirements.iter().find(|r| r.name == name)
    }
}

/// A top-level actor and the root of one subtree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UltimateTarget {
    pub name: String,
    /// Free-text statement of what the actor is trying to achieve
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub objective: String,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

impl UltimateTarget {
    pub fn new(name: String) -> Self {
        Self {
            name,
            objective: String::new(),
            capabilities: Vec::new(),
        }
    }

    pub fn capability(&self, name: &str) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.name == name)
    }
}

/// Location of one proximate target reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferencePath {
    pub target: String,
    pub capability: String,
    pub requirement: String,
}

impl fmt::Display for ReferencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / {}", self.target, self.capability, self.requirement)
    }
}

/// Summary counts for a hierarchy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HierarchyStats {
    pub targets: usize,
    pub capabilities: usize,
    pub requirements: usize,
    pub proximate_targets: usize,
    pub references: usize,
    pub shared_proximate_targets: usize,
}

/// The analyst-edited hierarchy: ultimate target → capability → requirement
/// → proximate target references.
///
/// Targets are kept in insertion order; a target's index is its ordinal for
/// color assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HierarchyStore {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub targets: Vec<UltimateTarget>,
}

fn clean(raw: &str) -> Result<String, HierarchyError> {
    let name = normalize_name(raw);
    if name.is_empty() {
        return Err(HierarchyError::EmptyName);
    }
    Ok(name)
}

fn target_not_found(ut: &str) -> HierarchyError {
    HierarchyError::NotFound {
        kind: Level::UltimateTarget,
        path: ut.to_string(),
    }
}

fn capability_not_found(ut: &str, cap: &str) -> HierarchyError {
    HierarchyError::NotFound {
        kind: Level::Capability,
        path: format!("{} / {}", ut, cap),
    }
}

fn requirement_not_found(ut: &str, cap: &str, req: &str) -> HierarchyError {
    HierarchyError::NotFound {
        kind: Level::Requirement,
        path: format!("{} / {} / {}", ut, cap, req),
    }
}

impl HierarchyStore {
    /// Creates an empty hierarchy
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn get_target(&self, ut: &str) -> Option<&UltimateTarget> {
        let ut = normalize_name(ut);
        self.targets.iter().find(|t| t.name == ut)
    }

    pub fn get_capability(&self, ut: &str, cap: &str) -> Option<&Capability> {
        let cap = normalize_name(cap);
        self.get_target(ut)?.capability(&cap)
    }

    pub fn get_requirement(&self, ut: &str, cap: &str, req: &str) -> Option<&CriticalRequirement> {
        let req = normalize_name(req);
        self.get_capability(ut, cap)?.requirement(&req)
    }

    /// Ordinal position of a target, used for palette lookup
    pub fn target_ordinal(&self, ut: &str) -> Option<usize> {
        let ut = normalize_name(ut);
        self.targets.iter().position(|t| t.name == ut)
    }

    /// Distinct proximate target names in first-seen order
    pub fn proximate_target_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for (_, _, req) in self.requirements() {
            for pt in &req.proximate_targets {
                if seen.insert(pt.as_str()) {
                    names.push(pt.clone());
                }
            }
        }
        names
    }

    /// Every requirement path that references the given proximate target
    pub fn references_to(&self, pt: &str) -> Vec<ReferencePath> {
        let pt = normalize_name(pt);
        self.requirements()
            .filter(|(_, _, req)| req.proximate_targets.contains(&pt))
            .map(|(ut, cap, req)| ReferencePath {
                target: ut.name.clone(),
                capability: cap.name.clone(),
                requirement: req.name.clone(),
            })
            .collect()
    }

    /// Walks every requirement together with its owning target and capability
    pub fn requirements(
        &self,
    ) -> impl Iterator<Item = (&UltimateTarget, &Capability, &CriticalRequirement)> {
        self.targets.iter().flat_map(|ut| {
            ut.capabilities
                .iter()
                .flat_map(move |cap| cap.requirements.iter().map(move |req| (ut, cap, req)))
        })
    }

    pub fn stats(&self) -> HierarchyStats {
        let shared = detect_shared_entities(self);
        HierarchyStats {
            targets: self.targets.len(),
            capabilities: self.targets.iter().map(|t| t.capabilities.len()).sum(),
            requirements: self.requirements().count(),
            proximate_targets: self.proximate_target_names().len(),
            references: self
                .requirements()
                .map(|(_, _, r)| r.proximate_targets.len())
                .sum(),
            shared_proximate_targets: shared.shared_names().len(),
        }
    }

    // =========================================================================
    // Mutable navigation
    // =========================================================================

    fn target_mut(&mut self, ut: &str) -> Result<&mut UltimateTarget, HierarchyError> {
        self.targets
            .iter_mut()
            .find(|t| t.name == ut)
            .ok_or_else(|| target_not_found(ut))
    }

    fn capability_mut(&mut self, ut: &str, cap: &str) -> Result<&mut Capability, HierarchyError> {
        self.target_mut(ut)?
            .capabilities
            .iter_mut()
            .find(|c| c.name == cap)
            .ok_or_else(|| capability_not_found(ut, cap))
    }

    fn requirement_mut(
        &mut self,
        ut: &str,
        cap: &str,
        req: &str,
    ) -> Result<&mut CriticalRequirement, HierarchyError> {
        self.capability_mut(ut, cap)?
            .requirements
            .iter_mut()
            .find(|r| r.name == req)
            .ok_or_else(|| requirement_not_found(ut, cap, req))
    }

    // =========================================================================
    // Ultimate targets
    // =========================================================================

    /// Adds an ultimate target and returns its normalized name
    pub fn add_ultimate_target(&mut self, name: &str) -> Result<String, HierarchyError> {
        let name = clean(name)?;
        if self.targets.iter().any(|t| t.name == name) {
            return Err(HierarchyError::Duplicate {
                kind: Level::UltimateTarget,
                name,
            });
        }
        self.targets.push(UltimateTarget::new(name.clone()));
        Ok(name)
    }

    pub fn rename_ultimate_target(&mut self, ut: &str, new_name: &str) -> Result<String, HierarchyError> {
        let ut = normalize_name(ut);
        let new_name = clean(new_name)?;
        if new_name != ut && self.targets.iter().any(|t| t.name == new_name) {
            return Err(HierarchyError::Duplicate {
                kind: Level::UltimateTarget,
                name: new_name,
            });
        }
        self.target_mut(&ut)?.name = new_name.clone();
        Ok(new_name)
    }

    /// Removes an ultimate target with its whole subtree.
    ///
    /// Proximate targets referenced from other subtrees are unaffected.
    pub fn delete_ultimate_target(&mut self, ut: &str) -> Result<UltimateTarget, HierarchyError> {
        let ut = normalize_name(ut);
        let pos = self
            .targets
            .iter()
            .position(|t| t.name == ut)
            .ok_or_else(|| target_not_found(&ut))?;
        Ok(self.targets.remove(pos))
    }

    pub fn set_objective(&mut self, ut: &str, objective: &str) -> Result<(), HierarchyError> {
        let ut = normalize_name(ut);
        self.target_mut(&ut)?.objective = objective.trim().to_string();
        Ok(())
    }

    // =========================================================================
    // Capabilities
    // =========================================================================

    pub fn add_capability(&mut self, ut: &str, name: &str) -> Result<String, HierarchyError> {
        let ut = normalize_name(ut);
        let name = clean(name)?;
        let target = self.target_mut(&ut)?;
        if target.capabilities.iter().any(|c| c.name == name) {
            return Err(HierarchyError::Duplicate {
                kind: Level::Capability,
                name,
            });
        }
        target.capabilities.push(Capability::new(name.clone()));
        Ok(name)
    }

    pub fn rename_capability(
        &mut self,
        ut: &str,
        cap: &str,
        new_name: &str,
    ) -> Result<String, HierarchyError> {
        let ut = normalize_name(ut);
        let cap = normalize_name(cap);
        let new_name = clean(new_name)?;
        let target = self.target_mut(&ut)?;
        if new_name != cap && target.capabilities.iter().any(|c| c.name == new_name) {
            return Err(HierarchyError::Duplicate {
                kind: Level::Capability,
                name: new_name,
            });
        }
        let capability = target
            .capabilities
            .iter_mut()
            .find(|c| c.name == cap)
            .ok_or_else(|| capability_not_found(&ut, &cap))?;
        capability.name = new_name.clone();
        Ok(new_name)
    }

    pub fn delete_capability(&mut self, ut: &str, cap: &str) -> Result<Capability, HierarchyError> {
        let ut = normalize_name(ut);
        let cap = normalize_name(cap);
        let target = self.target_mut(&ut)?;
        let pos = target
            .capabilities
            .iter()
            .position(|c| c.name == cap)
            .ok_or_else(|| capability_not_found(&ut, &cap))?;
        Ok(target.capabilities.remove(pos))
    }

    // =========================================================================
    // Requirements
    // =========================================================================

    pub fn add_requirement(&mut self, ut: &str, cap: &str, name: &str) -> Result<String, HierarchyError> {
        let ut = normalize_name(ut);
        let cap = normalize_name(cap);
        let name = clean(name)?;
        let capability = self.capability_mut(&ut, &cap)?;
        if capability.requirements.iter().any(|r| r.name == name) {
            return Err(HierarchyError::Duplicate {
                kind: Level::Requirement,
                name,
            });
        }
        capability
            .requirements
            .push(CriticalRequirement::new(name.clone()));
        Ok(name)
    }

    pub fn rename_requirement(
        &mut self,
        ut: &str,
        cap: &str,
        req: &str,
        new_name: &str,
    ) -> Result<String, HierarchyError> {
        let ut = normalize_name(ut);
        let cap = normalize_name(cap);
        let req = normalize_name(req);
        let new_name = clean(new_name)?;
        let capability = self.capability_mut(&ut, &cap)?;
        if new_name != req && capability.requirements.iter().any(|r| r.name == new_name) {
            return Err(HierarchyError::Duplicate {
                kind: Level::Requirement,
                name: new_name,
            });
        }
        let requirement = capability
            .requirements
            .iter_mut()
            .find(|r| r.name == req)
            .ok_or_else(|| requirement_not_found(&ut, &cap, &req))?;
        requirement.name = new_name.clone();
        Ok(new_name)
    }

    /// Removes a requirement and the proximate target references it held.
    ///
    /// A proximate target stays in the hierarchy as long as any other
    /// requirement still references it.
    pub fn delete_requirement(
        &mut self,
        ut: &str,
        cap: &str,
        req: &str,
    ) -> Result<CriticalRequirement, HierarchyError> {
        let ut = normalize_name(ut);
        let cap = normalize_name(cap);
        let req = normalize_name(req);
        let capability = self.capability_mut(&ut, &cap)?;
        let pos = capability
            .requirements
            .iter()
            .position(|r| r.name == req)
            .ok_or_else(|| requirement_not_found(&ut, &cap, &req))?;
        Ok(capability.requirements.remove(pos))
    }

    // =========================================================================
    // Proximate target references
    // =========================================================================

    pub fn add_proximate_target_reference(
        &mut self,
        ut: &str,
        cap: &str,
        req: &str,
        pt: &str,
    ) -> Result<String, HierarchyError> {
        let ut = normalize_name(ut);
        let cap = normalize_name(cap);
        let req = normalize_name(req);
        let pt = clean(pt)?;
        let requirement = self.requirement_mut(&ut, &cap, &req)?;
        if requirement.proximate_targets.contains(&pt) {
            return Err(HierarchyError::Duplicate {
                kind: Level::ProximateTarget,
                name: pt,
            });
        }
        requirement.proximate_targets.push(pt.clone());
        Ok(pt)
    }

    pub fn remove_proximate_target_reference(
        &mut self,
        ut: &str,
        cap: &str,
        req: &str,
        pt: &str,
    ) -> Result<(), HierarchyError> {
        let ut = normalize_name(ut);
        let cap = normalize_name(cap);
        let req = normalize_name(req);
        let pt = normalize_name(pt);
        let requirement = self.requirement_mut(&ut, &cap, &req)?;
        let before = requirement.proximate_targets.len();
        requirement.proximate_targets.retain(|p| *p != pt);
        if requirement.proximate_targets.len() == before {
            return Err(HierarchyError::NotFound {
                kind: Level::ProximateTarget,
                path: format!("{} / {} / {} / {}", ut, cap, req, pt),
            });
        }
        Ok(())
    }

    /// Renames a proximate target everywhere it is referenced.
    ///
    /// Renaming onto an existing proximate target merges the two entities;
    /// a requirement that referenced both keeps a single reference.
    /// Returns the number of requirements touched.
    pub fn rename_proximate_target(&mut self, pt: &str, new_name: &str) -> Result<usize, HierarchyError> {
        let pt = normalize_name(pt);
        let new_name = clean(new_name)?;
        let mut touched = 0;
        for target in &mut self.targets {
            for capability in &mut target.capabilities {
                for requirement in &mut capability.requirements {
                    let Some(pos) = requirement.proximate_targets.iter().position(|p| *p == pt) else {
                        continue;
                    };
                    touched += 1;
                    if new_name != pt && requirement.proximate_targets.contains(&new_name) {
                        requirement.proximate_targets.remove(pos);
                    } else {
                        requirement.proximate_targets[pos] = new_name.clone();
                    }
                }
            }
        }
        if touched == 0 {
            return Err(HierarchyError::NotFound {
                kind: Level::ProximateTarget,
                path: pt,
            });
        }
        Ok(touched)
    }

    /// Re-applies name normalization to every stored name.
    ///
    /// Used on hand-edited input; duplicates created by normalization are
    /// merged at the graph level through the composite keys.
    pub fn normalize_names(&mut self) {
        for target in &mut self.targets {
            target.name = normalize_name(&target.name);
            for capability in &mut target.capabilities {
                capability.name = normalize_name(&capability.name);
                for requirement in &mut capability.requirements {
                    requirement.name = normalize_name(&requirement.name);
                    for pt in &mut requirement.proximate_targets {
                        *pt = normalize_name(pt);
                    }
                }
            }
        }
    }
}
