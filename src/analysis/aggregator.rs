//! Correlation Aggregator
//!
//! Two-level indexed table: configuration -> setting -> matched samples.
//! Configurations live in an arena (`keys`), addressed by index; each slot
//! holds the four per-setting sample lists in `MeasurementSetting::ALL` order.
//!
//! Within a setting, party A and party B verdicts are matched on the
//! composite trial key (trial index + setting). Trials without a partner are
//! excluded and counted, never zero-filled.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::debug;

use super::observations::{FailureKind, FailureLedger, Observation};
use crate::design::{Axis, ConfigurationKey, MeasurementSetting, Party};
use crate::verdict::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrialKey {
    pub trial_index: u32,
    pub setting: MeasurementSetting,
}

/// Two matched per-party verdicts for one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationSample {
    pub trial: TrialKey,
    pub a: Verdict,
    pub b: Verdict,
}

impl CorrelationSample {
    pub fn product(&self) -> i8 {
        self.a.sign() * self.b.sign()
    }
}

pub type SettingSamples = [Vec<CorrelationSample>; 4];

/// Per-party verdicts awaiting a partner, keyed by (subject, axis).
#[derive(Default)]
struct PartySlots {
    by_party: BTreeMap<(Party, Axis), BTreeMap<TrialKey, Verdict>>,
}

#[derive(Debug, Clone, Default)]
pub struct CorrelationTable {
    keys: Vec<ConfigurationKey>,
    index: BTreeMap<ConfigurationKey, usize>,
    samples: Vec<SettingSamples>,
    ledger: FailureLedger,
}

impl CorrelationTable {
    pub fn build(observations: &[Observation]) -> Self {
        let mut table = CorrelationTable::default();

        // Sorted arena so indices don't depend on observation order
        let mut keys: Vec<ConfigurationKey> = observations.iter().map(|o| o.key.clone()).collect();
        keys.sort();
        keys.dedup();
        for (i, key) in keys.iter().enumerate() {
            table.index.insert(key.clone(), i);
        }
        table.keys = keys;

        let mut staging: Vec<[PartySlots; 4]> = (0..table.keys.len())
            .map(|_| Default::default())
            .collect();

        for obs in observations {
            if !obs.verdict.is_resolved() {
                continue;
            }
            let slot = table.index[&obs.key];
            let trial = TrialKey {
                trial_index: obs.trial_index,
                setting: obs.setting,
            };
            let axis = obs.setting.axis(obs.subject);
            let party_map = staging[slot][obs.setting.index()]
                .by_party
                .entry((obs.subject, axis))
                .or_default();

            match party_map.entry(trial) {
                Entry::Vacant(e) => {
                    e.insert(obs.verdict);
                }
                Entry::Occupied(_) => {
                    table.ledger.record(
                        &format!("{}#{:03}{}{}", obs.key, obs.trial_index, obs.setting, obs.subject.code()),
                        FailureKind::Duplicate,
                        "repeated trial key, first verdict kept",
                    );
                }
            }
        }

        for (slot, settings) in staging.into_iter().enumerate() {
            let mut matched: SettingSamples = Default::default();
            for setting in MeasurementSetting::ALL {
                let slots = &settings[setting.index()].by_party;
                let empty = BTreeMap::new();
                let a_side = slots.get(&(Party::A, setting.axis(Party::A))).unwrap_or(&empty);
                let b_side = slots.get(&(Party::B, setting.axis(Party::B))).unwrap_or(&empty);

                for (trial, a) in a_side {
                    if let Some(b) = b_side.get(trial) {
                        matched[setting.index()].push(CorrelationSample {
                            trial: *trial,
                            a: *a,
                            b: *b,
                        });
                    }
                }

                let pairs = matched[setting.index()].len();
                let unmatched = (a_side.len() - pairs) + (b_side.len() - pairs);
                table.ledger.add(FailureKind::Unmatched, unmatched);
            }
            debug!(
                "{}: {:?} matched samples per setting",
                table.keys[slot],
                matched.iter().map(Vec::len).collect::<Vec<_>>()
            );
            table.samples.push(matched);
        }

        table
    }

    pub fn keys(&self) -> &[ConfigurationKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn samples(&self, key: &ConfigurationKey, setting: MeasurementSetting) -> &[CorrelationSample] {
        match self.index.get(key) {
            Some(&slot) => &self.samples[slot][setting.index()],
            None => &[],
        }
    }

    /// Pairwise verdict products for one setting, the support of its expectation value.
    pub fn products(&self, key: &ConfigurationKey, setting: MeasurementSetting) -> Vec<i8> {
        self.samples(key, setting).iter().map(CorrelationSample::product).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConfigurationKey, &SettingSamples)> {
        self.keys.iter().zip(self.samples.iter())
    }

    /// Duplicates and unmatched trials seen while building.
    pub fn ledger(&self) -> &FailureLedger {
        &self.ledger
    }
}
