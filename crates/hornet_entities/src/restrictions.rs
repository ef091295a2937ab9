//! Restriction files.
//!
//! A restrictions file narrows what the fuzzer may touch: whole entity sets
//! can be excluded (or the run limited to an allow-list), and individual
//! properties can be taken out of operand synthesis.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Declarative limits on the fuzzed surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Restrictions {
    /// Entity sets that must not be fuzzed.
    #[serde(default)]
    pub exclude_entity_sets: Vec<String>,
    /// When non-empty, only these entity sets are fuzzed.
    #[serde(default)]
    pub include_entity_sets: Vec<String>,
    /// Per-entity-set property exclusions.
    #[serde(default)]
    pub exclude_properties: HashMap<String, Vec<String>>,
}

impl Restrictions {
    /// Loads restrictions from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let restrictions: Self = serde_yaml::from_str(&raw)?;
        info!(
            excluded_sets = restrictions.exclude_entity_sets.len(),
            included_sets = restrictions.include_entity_sets.len(),
            "loaded restrictions from {}",
            path.as_ref().display()
        );
        Ok(restrictions)
    }

    /// Returns true if the entity set may be fuzzed.
    #[must_use]
    pub fn allows_entity_set(&self, name: &str) -> bool {
        if self.exclude_entity_sets.iter().any(|e| e == name) {
            return false;
        }
        self.include_entity_sets.is_empty() || self.include_entity_sets.iter().any(|e| e == name)
    }

    /// Returns true if the property of the given entity set may be used.
    #[must_use]
    pub fn allows_property(&self, entity_set: &str, property: &str) -> bool {
        self.exclude_properties
            .get(entity_set)
            .map_or(true, |excluded| !excluded.iter().any(|p| p == property))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_everything() {
        let r = Restrictions::default();
        assert!(r.allows_entity_set("Customers"));
        assert!(r.allows_property("Customers", "Name"));
    }

    #[test]
    fn exclusion_wins_over_inclusion() {
        let r: Restrictions = serde_yaml::from_str(
            "exclude_entity_sets: [Audit]\ninclude_entity_sets: [Audit, Customers]\n",
        )
        .unwrap();
        assert!(!r.allows_entity_set("Audit"));
        assert!(r.allows_entity_set("Customers"));
        assert!(!r.allows_entity_set("Orders"));
    }

    #[test]
    fn property_exclusions_are_per_entity_set() {
        let r: Restrictions = serde_yaml::from_str(
            "exclude_properties:\n  Customers: [SecretNote]\n",
        )
        .unwrap();
        assert!(!r.allows_property("Customers", "SecretNote"));
        assert!(r.allows_property("Orders", "SecretNote"));
    }
}
