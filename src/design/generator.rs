//! Design Generator
//!
//! Enumerates the full trial set: every scenario x configuration x trial
//! index x measurement setting x party becomes one oracle request plus one
//! manifest entry.
//!
//! Configurations come from three sources:
//! - monodimensional: every (language, tense) frame, same frame for both parties
//! - declared cross pairs: cross-lingual (per tense), cross-temporal (per language)
//! - explicit cross-dimensional frame pairs
//!
//! Party A always gets the first element of a pair.

use handlebars::Handlebars;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

use super::catalog::ScenarioCatalog;
use super::identifier::encode;
use super::manifest::{Manifest, ManifestParams};
use super::{Axis, CrossType, Frame, MeasurementSetting, Party, TrialCondition};
use crate::config::{EngineConfig, VerdictLabels};
use crate::error::Result;
use crate::oracle::OracleRequest;

const SALT_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const TEMPLATE_NAME: &str = "prompt";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DesignParams {
    /// Empty means every scenario in the catalog
    #[serde(default)]
    pub scenarios: Vec<String>,
    pub trials: u32,
    /// Empty means every language in the catalog
    #[serde(default)]
    pub languages: Vec<String>,
    /// Empty means every tense in the catalog
    #[serde(default)]
    pub tenses: Vec<String>,
    #[serde(default)]
    pub cross_lingual: Vec<(String, String)>,
    #[serde(default)]
    pub cross_temporal: Vec<(String, String)>,
    #[serde(default)]
    pub cross_dimensional: Vec<(Frame, Frame)>,
    /// Source selector forwarded to the oracle with each request
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub request_count: usize,
    pub configurations: usize,
    pub by_cross_type: BTreeMap<CrossType, usize>,
    /// Scenario/configuration combinations dropped for missing localization
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DesignOutput {
    pub requests: Vec<OracleRequest>,
    pub manifest: Manifest,
    pub summary: GenerationSummary,
}

pub struct DesignGenerator {
    catalog: ScenarioCatalog,
    labels: VerdictLabels,
    salt_len: usize,
    rng: StdRng,
    templates: Handlebars<'static>,
}

impl DesignGenerator {
    pub fn new(catalog: ScenarioCatalog, config: &EngineConfig) -> Result<Self> {
        let mut templates = Handlebars::new();
        templates.register_escape_fn(handlebars::no_escape);
        templates.register_template_string(TEMPLATE_NAME, catalog.template())?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            catalog,
            labels: config.labels.clone(),
            salt_len: config.salt_len,
            rng,
            templates,
        })
    }

    pub fn catalog(&self) -> &ScenarioCatalog {
        &self.catalog
    }

    pub fn generate(&mut self, params: &DesignParams) -> Result<DesignOutput> {
        let scenarios = unique(if params.scenarios.is_empty() {
            self.catalog.scenario_ids()
        } else {
            params.scenarios.clone()
        });
        let configurations = self.configurations(params);

        let mut summary = GenerationSummary::default();
        let mut requests = Vec::new();
        let mut conditions = BTreeMap::new();
        let mut seen = HashSet::new();

        for scenario in &scenarios {
            for (cross_type, frame_a, frame_b) in &configurations {
                if !self.covers(scenario, frame_a) || !self.covers(scenario, frame_b) {
                    debug!("Skipping {} [{}] {} vs {}: no localized content", scenario, cross_type, frame_a, frame_b);
                    summary.skipped.push(format!("{} [{}] {} vs {}", scenario, cross_type, frame_a, frame_b));
                    continue;
                }
                summary.configurations += 1;

                for trial_index in 0..params.trials {
                    for setting in MeasurementSetting::ALL {
                        for subject in Party::BOTH {
                            let mut condition = TrialCondition {
                                scenario: scenario.clone(),
                                frame_a: frame_a.clone(),
                                frame_b: frame_b.clone(),
                                setting,
                                subject,
                                trial_index,
                                cross_type: *cross_type,
                                salt: self.salt(),
                            };
                            let mut identifier = encode(&condition);
                            while seen.contains(&identifier) {
                                condition.salt = self.salt();
                                identifier = encode(&condition);
                            }
                            seen.insert(identifier.clone());

                            let prompt = self.render(&condition)?;
                            requests.push(OracleRequest {
                                identifier: identifier.clone(),
                                prompt,
                                source: params.source.clone(),
                            });
                            *summary.by_cross_type.entry(*cross_type).or_insert(0) += 1;
                            conditions.insert(identifier, condition);
                        }
                    }
                }
            }
        }

        summary.request_count = requests.len();
        let manifest = Manifest::new(
            ManifestParams::new(params.trials, &scenarios, requests.len()),
            conditions,
        );

        info!(
            "Generated {} requests over {} configurations ({} skipped), audit hash {}",
            summary.request_count,
            summary.configurations,
            summary.skipped.len(),
            &manifest.audit_hash[..12]
        );

        Ok(DesignOutput {
            requests,
            manifest,
            summary,
        })
    }

    fn configurations(&self, params: &DesignParams) -> Vec<(CrossType, Frame, Frame)> {
        let languages = unique(if params.languages.is_empty() {
            self.catalog.languages().into_iter().collect()
        } else {
            params.languages.clone()
        });
        let tenses = unique(if params.tenses.is_empty() {
            self.catalog.tenses().into_iter().collect()
        } else {
            params.tenses.clone()
        });

        let mut out = Vec::new();
        for language in &languages {
            for tense in &tenses {
                let frame = Frame::new(language, tense);
                out.push((CrossType::Mono, frame.clone(), frame));
            }
        }
        for (first, second) in &params.cross_lingual {
            for tense in &tenses {
                out.push((CrossType::CrossLingual, Frame::new(first, tense), Frame::new(second, tense)));
            }
        }
        for (first, second) in &params.cross_temporal {
            for language in &languages {
                out.push((CrossType::CrossTemporal, Frame::new(language, first), Frame::new(language, second)));
            }
        }
        for (a, b) in &params.cross_dimensional {
            out.push((CrossType::CrossDimensional, a.clone(), b.clone()));
        }
        // repeated cross pairs collapse here
        unique(out)
    }

    fn covers(&self, scenario: &str, frame: &Frame) -> bool {
        self.catalog.scenario_text(scenario, frame).is_some()
            && self.catalog.axis_framing(&frame.language, Axis::Primary).is_some()
    }

    fn render(&self, condition: &TrialCondition) -> Result<String> {
        let frame = condition.subject_frame();
        let axis = condition.subject_axis();
        let ctx = json!({
            "axis_framing": self.catalog.axis_framing(&frame.language, axis).unwrap_or_default(),
            "scenario_text": self.catalog.scenario_text(&condition.scenario, frame).unwrap_or_default(),
            "axis": axis.name(),
            "language": frame.language,
            "tense": frame.tense,
            "wrongful": self.labels.wrongful,
            "not_wrongful": self.labels.not_wrongful,
        });
        Ok(self.templates.render(TEMPLATE_NAME, &ctx)?)
    }

    fn salt(&mut self) -> String {
        (0..self.salt_len)
            .map(|_| SALT_ALPHABET[self.rng.gen_range(0..SALT_ALPHABET.len())] as char)
            .collect()
    }
}

/// Drops repeats, keeping first-seen order.
fn unique<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::identifier::decode;

    fn catalog() -> ScenarioCatalog {
        serde_yaml::from_str(
            r#"
scenarios:
  - id: lifeboat
    texts:
      en: { present: "You are on a lifeboat.", past: "You were on a lifeboat." }
      fr: { present: "Vous etes sur un canot." }
  - id: ledger
    texts:
      en: { present: "You find an error in the ledger." }
axes:
  en: { primary: "Judge by outcomes.", secondary: "Judge by duties." }
  fr: { primary: "Jugez selon les consequences.", secondary: "Jugez selon les devoirs." }
"#,
        )
        .unwrap()
    }

    fn generator() -> DesignGenerator {
        let config = EngineConfig {
            seed: Some(7),
            ..EngineConfig::default()
        };
        DesignGenerator::new(catalog(), &config).unwrap()
    }

    #[test]
    fn test_mono_request_count() {
        let params = DesignParams {
            scenarios: vec!["lifeboat".into()],
            trials: 3,
            languages: vec!["en".into()],
            tenses: vec!["present".into()],
            ..Default::default()
        };
        let out = generator().generate(&params).unwrap();
        // 3 trials x 4 settings x 2 parties
        assert_eq!(out.requests.len(), 24);
        assert_eq!(out.manifest.conditions.len(), 24);
        assert_eq!(out.summary.configurations, 1);
        assert!(out.manifest.verify());
    }

    #[test]
    fn test_missing_localization_is_skipped() {
        let params = DesignParams {
            trials: 1,
            languages: vec!["en".into(), "fr".into()],
            tenses: vec!["present".into(), "past".into()],
            ..Default::default()
        };
        let out = generator().generate(&params).unwrap();
        // lifeboat: en/present, en/past, fr/present; ledger: en/present
        assert_eq!(out.summary.configurations, 4);
        assert_eq!(out.summary.skipped.len(), 4);
        assert_eq!(out.requests.len(), 4 * 8);
    }

    #[test]
    fn test_cross_pairs_assign_first_to_party_a() {
        let params = DesignParams {
            scenarios: vec!["lifeboat".into()],
            trials: 1,
            languages: vec!["en".into()],
            tenses: vec!["present".into()],
            cross_lingual: vec![("en".into(), "fr".into())],
            cross_temporal: vec![("present".into(), "past".into())],
            ..Default::default()
        };
        let out = generator().generate(&params).unwrap();
        assert_eq!(out.summary.by_cross_type[&CrossType::CrossLingual], 8);
        assert_eq!(out.summary.by_cross_type[&CrossType::CrossTemporal], 8);

        for condition in out.manifest.conditions.values() {
            match condition.cross_type {
                CrossType::CrossLingual => {
                    assert_eq!(condition.frame_a.language, "en");
                    assert_eq!(condition.frame_b.language, "fr");
                }
                CrossType::CrossTemporal => {
                    assert_eq!(condition.frame_a.tense, "present");
                    assert_eq!(condition.frame_b.tense, "past");
                }
                _ => assert_eq!(condition.frame_a, condition.frame_b),
            }
        }
    }

    #[test]
    fn test_identifiers_unique_and_decodable() {
        let params = DesignParams {
            trials: 5,
            languages: vec!["en".into()],
            tenses: vec!["present".into()],
            ..Default::default()
        };
        let out = generator().generate(&params).unwrap();
        let ids: HashSet<_> = out.requests.iter().map(|r| r.identifier.clone()).collect();
        assert_eq!(ids.len(), out.requests.len());

        for (id, condition) in &out.manifest.conditions {
            let decoded = decode(id).unwrap();
            assert_eq!(decoded.trial_index, condition.trial_index);
            assert_eq!(decoded.setting, condition.setting);
            assert_eq!(decoded.subject, Some(condition.subject));
        }
    }

    #[test]
    fn test_prompt_uses_subject_frame_and_axis() {
        let params = DesignParams {
            scenarios: vec!["lifeboat".into()],
            trials: 1,
            languages: vec!["en".into()],
            tenses: vec!["present".into()],
            cross_lingual: vec![("en".into(), "fr".into())],
            ..Default::default()
        };
        let out = generator().generate(&params).unwrap();
        let request = out
            .requests
            .iter()
            .find(|r| {
                let c = &out.manifest.conditions[&r.identifier];
                c.cross_type == CrossType::CrossLingual
                    && c.subject == Party::B
                    && c.setting == MeasurementSetting::PS
            })
            .unwrap();
        assert!(request.prompt.contains("Vous etes sur un canot."));
        assert!(request.prompt.contains("Jugez selon les devoirs."));
        assert!(request.prompt.contains("\"YTA\""));
    }

    #[test]
    fn test_repeated_inputs_do_not_multiply_requests() {
        let params = DesignParams {
            scenarios: vec!["lifeboat".into(), "lifeboat".into()],
            trials: 1,
            languages: vec!["en".into(), "en".into()],
            tenses: vec!["present".into(), "present".into()],
            cross_lingual: vec![("en".into(), "fr".into()), ("en".into(), "fr".into())],
            ..Default::default()
        };
        let out = generator().generate(&params).unwrap();
        // one mono + one cross-lingual configuration, 8 requests each
        assert_eq!(out.summary.configurations, 2);
        assert_eq!(out.requests.len(), 16);
        assert_eq!(out.manifest.params.scenarios, vec!["lifeboat".to_string()]);
        assert!(out.manifest.verify());
    }

    #[test]
    fn test_seeded_salts_reproducible() {
        let params = DesignParams {
            trials: 2,
            languages: vec!["en".into()],
            tenses: vec!["present".into()],
            ..Default::default()
        };
        let a = generator().generate(&params).unwrap();
        let b = generator().generate(&params).unwrap();
        let ids_a: Vec<_> = a.requests.iter().map(|r| &r.identifier).collect();
        let ids_b: Vec<_> = b.requests.iter().map(|r| &r.identifier).collect();
        assert_eq!(ids_a, ids_b);
        assert_eq!(a.manifest.audit_hash, b.manifest.audit_hash);
    }
}
