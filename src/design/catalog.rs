//! Scenario Catalog
//!
//! Localized scenario content and axis framings. Translation coverage is
//! partial on purpose: lookups return `None` and the generator skips the
//! combination.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::{Axis, Frame};
use crate::error::Result;

pub const DEFAULT_TEMPLATE: &str = r#"{{axis_framing}}

Scenario:
{{scenario_text}}

Answer with a single JSON object: {"verdict": "{{wrongful}}" or "{{not_wrongful}}", "reason": "<one sentence>"}"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioEntry {
    pub id: String,
    /// language -> tense -> text
    #[serde(default)]
    pub texts: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisFraming {
    pub primary: String,
    pub secondary: String,
}

impl AxisFraming {
    pub fn get(&self, axis: Axis) -> &str {
        match axis {
            Axis::Primary => &self.primary,
            Axis::Secondary => &self.secondary,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioCatalog {
    #[serde(default)]
    pub scenarios: Vec<ScenarioEntry>,
    /// language -> framings
    #[serde(default)]
    pub axes: BTreeMap<String, AxisFraming>,
    /// Handlebars prompt template; `DEFAULT_TEMPLATE` when absent
    #[serde(default)]
    pub template: Option<String>,
}

impl ScenarioCatalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let catalog = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&raw)?,
            _ => serde_yaml::from_str(&raw)?,
        };
        Ok(catalog)
    }

    pub fn template(&self) -> &str {
        self.template.as_deref().unwrap_or(DEFAULT_TEMPLATE)
    }

    pub fn scenario_ids(&self) -> Vec<String> {
        self.scenarios.iter().map(|s| s.id.clone()).collect()
    }

    pub fn scenario_text(&self, scenario: &str, frame: &Frame) -> Option<&str> {
        self.scenarios
            .iter()
            .find(|s| s.id == scenario)?
            .texts
            .get(&frame.language)?
            .get(&frame.tense)
            .map(String::as_str)
    }

    pub fn axis_framing(&self, language: &str, axis: Axis) -> Option<&str> {
        self.axes.get(language).map(|f| f.get(axis))
    }

    /// Every language that appears anywhere in the scenario texts.
    pub fn languages(&self) -> BTreeSet<String> {
        self.scenarios
            .iter()
            .flat_map(|s| s.texts.keys().cloned())
            .collect()
    }

    pub fn tenses(&self) -> BTreeSet<String> {
        self.scenarios
            .iter()
            .flat_map(|s| s.texts.values())
            .flat_map(|by_tense| by_tense.keys().cloned())
            .collect()
    }
}
