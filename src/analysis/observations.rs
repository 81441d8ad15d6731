//! Observation Resolution
//!
//! Turns a result set into per-party observations: decode the identifier,
//! find the trial's configuration (manifest first, embedded fields second),
//! resolve the verdict. Every trial that cannot be resolved is dropped and
//! recorded in the `FailureLedger`; nothing here is fatal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::results::{RawVerdict, ResultRecord, ResultSet};
use crate::design::{decode, ConfigurationKey, CrossType, Manifest, MeasurementSetting, Party};
use crate::verdict::{Verdict, VerdictExtractor};

const MAX_EXAMPLES: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Identifier matched no known layout, or lacked a subject
    Decode,
    /// No verdict recoverable from the response
    Parse,
    /// Neither manifest nor record knows the trial's configuration
    MissingCondition,
    /// Oracle reported an error for this request
    Oracle,
    /// Same party, configuration and trial key seen twice
    Duplicate,
    /// Resolved verdict with no partner verdict to pair with
    Unmatched,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialFailure {
    pub identifier: String,
    pub kind: FailureKind,
    pub detail: String,
}

/// Tally of dropped trials, with a bounded list of examples.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureLedger {
    pub counts: BTreeMap<FailureKind, usize>,
    pub examples: Vec<TrialFailure>,
}

impl FailureLedger {
    pub fn record(&mut self, identifier: &str, kind: FailureKind, detail: impl Into<String>) {
        let detail = detail.into();
        debug!("Dropped {} ({:?}): {}", identifier, kind, detail);
        *self.counts.entry(kind).or_insert(0) += 1;
        if self.examples.len() < MAX_EXAMPLES {
            self.examples.push(TrialFailure {
                identifier: identifier.to_string(),
                kind,
                detail,
            });
        }
    }

    /// Add a count without keeping examples.
    pub fn add(&mut self, kind: FailureKind, n: usize) {
        if n > 0 {
            *self.counts.entry(kind).or_insert(0) += n;
        }
    }

    pub fn count(&self, kind: FailureKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn merge(&mut self, other: &FailureLedger) {
        for (kind, n) in &other.counts {
            *self.counts.entry(*kind).or_insert(0) += n;
        }
        let room = MAX_EXAMPLES.saturating_sub(self.examples.len());
        self.examples.extend(other.examples.iter().take(room).cloned());
    }
}

/// One resolved verdict from one party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub key: ConfigurationKey,
    pub setting: MeasurementSetting,
    pub trial_index: u32,
    pub subject: Party,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub observations: Vec<Observation>,
    pub ledger: FailureLedger,
    pub records: usize,
    /// Trials whose configuration came from embedded fields
    pub embedded_fallbacks: usize,
}

pub struct Resolver<'a> {
    extractor: &'a VerdictExtractor,
    manifest: Option<&'a Manifest>,
    source: Option<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(extractor: &'a VerdictExtractor) -> Self {
        Self {
            extractor,
            manifest: None,
            source: None,
        }
    }

    pub fn with_manifest(mut self, manifest: Option<&'a Manifest>) -> Self {
        self.manifest = manifest;
        self
    }

    /// Tag every configuration key with the judgment source.
    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    pub fn resolve(&self, results: &ResultSet) -> Resolution {
        let mut out = Resolution {
            records: results.len(),
            ..Default::default()
        };
        out.ledger.add(FailureKind::Decode, results.anonymous);

        if self.manifest.is_none() {
            warn!("No manifest supplied, falling back to embedded condition fields");
        }

        for (id, record) in &results.records {
            if let Some(obs) = self.resolve_one(id, record, &mut out) {
                out.observations.push(obs);
            }
        }

        info!(
            "Resolved {}/{} records into observations ({} dropped)",
            out.observations.len(),
            out.records,
            out.ledger.total()
        );
        out
    }

    fn resolve_one(&self, id: &str, record: &ResultRecord, out: &mut Resolution) -> Option<Observation> {
        if record.verdict.is_none() && record.response.is_none() {
            let reason = record.error.as_deref().unwrap_or("no verdict or response");
            out.ledger.record(id, FailureKind::Oracle, reason);
            return None;
        }

        let Some(decoded) = decode(id) else {
            out.ledger.record(id, FailureKind::Decode, "no known identifier layout");
            return None;
        };

        let from_manifest = self.manifest.and_then(|m| m.get(id));
        let mut key = match (from_manifest, &record.condition) {
            (Some(condition), _) => condition.configuration_key(),
            (None, Some(embedded)) => {
                out.embedded_fallbacks += 1;
                ConfigurationKey {
                    scenario: embedded.scenario.clone(),
                    frame_a: embedded.frame_a.clone(),
                    frame_b: embedded.frame_b.clone(),
                    cross_type: embedded.cross_type,
                    source: None,
                }
            }
            (None, None) => {
                out.ledger.record(id, FailureKind::MissingCondition, "not in manifest, no embedded condition");
                return None;
            }
        };
        if let Some(ref source) = self.source {
            key.source = Some(source.clone());
        }

        let Some(subject) = decoded.subject.or(from_manifest.map(|c| c.subject)) else {
            out.ledger.record(id, FailureKind::Decode, "no subject token");
            return None;
        };

        let verdict = match self.verdict(record) {
            Ok(v) => v,
            Err(detail) => {
                out.ledger.record(id, FailureKind::Parse, detail);
                return None;
            }
        };

        Some(Observation {
            key,
            setting: decoded.setting,
            trial_index: decoded.trial_index,
            subject,
            verdict,
        })
    }

    fn verdict(&self, record: &ResultRecord) -> std::result::Result<Verdict, String> {
        let verdict = match (&record.verdict, &record.response) {
            (Some(RawVerdict::Signed(n)), _) => Verdict::try_from(*n)?,
            (Some(RawVerdict::Label(label)), _) => self
                .extractor
                .classify_label(label)
                .unwrap_or(Verdict::Unresolved),
            (None, Some(text)) => {
                let extraction = self.extractor.extract(text);
                if let Some(excerpt) = extraction.excerpt {
                    return Err(excerpt);
                }
                extraction.verdict
            }
            (None, None) => Verdict::Unresolved,
        };

        if verdict.is_resolved() {
            Ok(verdict)
        } else {
            Err("unresolved verdict".to_string())
        }
    }
}

/// Cross-model observations: party A as judged by source X, party B by source Y,
/// over the same monodimensional configurations.
pub fn cross_source(
    first: &[Observation],
    second: &[Observation],
    first_label: &str,
    second_label: &str,
) -> Vec<Observation> {
    let source = format!("{}|{}", first_label, second_label);
    let retag = |obs: &Observation| {
        let mut obs = obs.clone();
        obs.key.cross_type = CrossType::CrossModel;
        obs.key.source = Some(source.clone());
        obs
    };

    first
        .iter()
        .filter(|o| o.key.cross_type == CrossType::Mono && o.subject == Party::A)
        .map(retag)
        .chain(
            second
                .iter()
                .filter(|o| o.key.cross_type == CrossType::Mono && o.subject == Party::B)
                .map(retag),
        )
        .collect()
}
