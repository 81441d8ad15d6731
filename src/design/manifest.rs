//! Condition Manifest
//!
//! The independently loadable record of a generated design: every
//! `TrialCondition` keyed by identifier, plus an audit hash over the sorted
//! generation parameters. The hash is a replay-integrity aid, not a signature.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use super::{ConfigurationKey, TrialCondition};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestParams {
    pub trials: u32,
    /// Sorted, deduplicated
    pub scenarios: Vec<String>,
    pub request_count: usize,
}

impl ManifestParams {
    pub fn new(trials: u32, scenarios: &[String], request_count: usize) -> Self {
        let mut scenarios = scenarios.to_vec();
        scenarios.sort();
        scenarios.dedup();
        Self {
            trials,
            scenarios,
            request_count,
        }
    }

    pub fn audit_hash(&self) -> String {
        let canonical = format!(
            "requests={};scenarios={};trials={}",
            self.request_count,
            self.scenarios.join(","),
            self.trials
        );
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub audit_hash: String,
    pub generated_at: DateTime<Utc>,
    pub params: ManifestParams,
    pub conditions: BTreeMap<String, TrialCondition>,
}

impl Manifest {
    pub fn new(params: ManifestParams, conditions: BTreeMap<String, TrialCondition>) -> Self {
        Self {
            audit_hash: params.audit_hash(),
            generated_at: Utc::now(),
            params,
            conditions,
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        info!("Wrote manifest with {} conditions to {}", self.conditions.len(), path.as_ref().display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let manifest: Manifest = serde_json::from_str(&raw)?;
        if !manifest.verify() {
            warn!(
                "Manifest {} failed its audit check (recorded {}, recomputed {})",
                path.as_ref().display(),
                manifest.audit_hash,
                manifest.params.audit_hash()
            );
        }
        Ok(manifest)
    }

    /// Recomputes the audit hash and checks it against the condition count.
    pub fn verify(&self) -> bool {
        self.audit_hash == self.params.audit_hash()
            && self.params.request_count == self.conditions.len()
    }

    pub fn get(&self, identifier: &str) -> Option<&TrialCondition> {
        self.conditions.get(identifier)
    }

    /// Identifiers grouped by the Bell-test instance they belong to.
    pub fn groupings(&self) -> BTreeMap<ConfigurationKey, Vec<String>> {
        let mut groups: BTreeMap<ConfigurationKey, Vec<String>> = BTreeMap::new();
        for (id, condition) in &self.conditions {
            groups.entry(condition.configuration_key()).or_default().push(id.clone());
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_ignores_scenario_order() {
        let a = ManifestParams::new(4, &["b".into(), "a".into()], 64);
        let b = ManifestParams::new(4, &["a".into(), "b".into(), "a".into()], 64);
        assert_eq!(a.audit_hash(), b.audit_hash());
        assert_eq!(a.audit_hash().len(), 64);
    }

    #[test]
    fn test_hash_sensitive_to_params() {
        let a = ManifestParams::new(4, &["a".into()], 64);
        let b = ManifestParams::new(5, &["a".into()], 64);
        assert_ne!(a.audit_hash(), b.audit_hash());
    }

    #[test]
    fn test_tampered_manifest_fails_verify() {
        let mut manifest = Manifest::new(ManifestParams::new(1, &["a".into()], 0), BTreeMap::new());
        assert!(manifest.verify());
        manifest.params.trials = 2;
        assert!(!manifest.verify());
    }
}
