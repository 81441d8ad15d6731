//! Result Format
//!
//! Result files map identifiers to outcomes. Accepted top-level shapes:
//! a JSON list of records (identifier in `identifier`/`custom_id`/`id`), a
//! JSON map keyed by identifier, or JSON Lines of records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::design::{CrossType, Frame};
use crate::error::{BellError, Result};
use crate::oracle::{OracleOutcome, Outcome};

/// Condition fields a result record may carry itself, used when no manifest exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedCondition {
    pub scenario: String,
    pub frame_a: Frame,
    pub frame_b: Frame,
    #[serde(default = "default_cross_type")]
    pub cross_type: CrossType,
}

fn default_cross_type() -> CrossType {
    CrossType::Mono
}

/// A verdict as it appears in a result file: already signed, or a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawVerdict {
    Signed(i64),
    Label(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(default, alias = "custom_id", alias = "id", skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<RawVerdict>,
    /// Raw oracle text, run through the extractor when `verdict` is absent
    #[serde(default, alias = "text", alias = "content", skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<EmbeddedCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResultFileShape {
    List(Vec<ResultRecord>),
    Map(BTreeMap<String, ResultRecord>),
}

/// Identifier -> record. Ordered so every analysis pass sees the same sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSet {
    pub records: BTreeMap<String, ResultRecord>,
    /// List entries that carried no identifier at all
    #[serde(default)]
    pub anonymous: usize,
}

impl ResultSet {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let set = Self::parse(&raw)?;
        info!(
            "Loaded {} result records from {}",
            set.records.len(),
            path.as_ref().display()
        );
        Ok(set)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let shape = match serde_json::from_str::<ResultFileShape>(raw) {
            Ok(shape) => shape,
            Err(json_err) => {
                debug!("Not a single JSON document ({}), trying JSON Lines", json_err);
                let mut records = Vec::new();
                for line in raw.lines().filter(|l| !l.trim().is_empty()) {
                    records.push(serde_json::from_str::<ResultRecord>(line)?);
                }
                ResultFileShape::List(records)
            }
        };

        let set = match shape {
            ResultFileShape::List(list) => Self::from_records(list),
            ResultFileShape::Map(map) => {
                let records = map
                    .into_iter()
                    .map(|(id, mut record)| {
                        record.identifier = Some(id.clone());
                        (id, record)
                    })
                    .collect();
                Self { records, anonymous: 0 }
            }
        };

        if set.records.is_empty() {
            return Err(BellError::NoResults);
        }
        Ok(set)
    }

    pub fn from_records(list: Vec<ResultRecord>) -> Self {
        let mut set = Self::default();
        for record in list {
            match record.identifier.clone() {
                Some(id) => {
                    set.records.entry(id).or_insert(record);
                }
                None => set.anonymous += 1,
            }
        }
        set
    }

    pub fn from_outcomes(outcomes: Vec<OracleOutcome>) -> Self {
        let records = outcomes
            .into_iter()
            .map(|o| {
                let (response, error) = match o.outcome {
                    Outcome::Succeeded(text) => (Some(text), None),
                    Outcome::Failed(reason) => (None, Some(reason)),
                };
                let record = ResultRecord {
                    identifier: Some(o.identifier.clone()),
                    response,
                    error,
                    ..Default::default()
                };
                (o.identifier, record)
            })
            .collect();
        Self { records, anonymous: 0 }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), serde_json::to_string_pretty(&self.records)?)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
