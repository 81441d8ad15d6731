//! Cross-Source Comparison
//!
//! Per scenario: the average S each source produced, and the spread across
//! sources as (max - min) / |mean|. A low spread means the sources agree.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::Report;
use crate::analysis::chsh::inf_as_null;
use crate::design::CrossType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConsistency {
    pub scenario: String,
    /// source -> mean S over that source's configurations
    pub per_source: BTreeMap<String, f64>,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// (max - min) / |mean|; +inf when the mean is zero
    #[serde(with = "inf_as_null")]
    pub cv: f64,
    pub consistent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceComparison {
    pub sources: Vec<String>,
    pub cv_threshold: f64,
    pub scenarios: Vec<ScenarioConsistency>,
}

impl SourceComparison {
    pub fn consistent_count(&self) -> usize {
        self.scenarios.iter().filter(|s| s.consistent).count()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", "═".repeat(72));
        let _ = writeln!(
            out,
            "CROSS-SOURCE CONSISTENCY  sources: {}  (consistent if CV < {:.2})",
            self.sources.join(", "),
            self.cv_threshold
        );
        let _ = writeln!(out, "{}", "═".repeat(72));

        for s in &self.scenarios {
            let cv = if s.cv.is_finite() { format!("{:.3}", s.cv) } else { "∞".to_string() };
            let _ = writeln!(
                out,
                "{} {:<24} mean S={:+.3} range=[{:+.3}, {:+.3}] CV={}",
                if s.consistent { "✓" } else { "✗" },
                s.scenario,
                s.mean,
                s.min,
                s.max,
                cv
            );
            for (source, avg) in &s.per_source {
                let _ = writeln!(out, "      {:<20} {:+.3}", source, avg);
            }
        }
        let _ = writeln!(
            out,
            "\n{}/{} scenarios consistent",
            self.consistent_count(),
            self.scenarios.len()
        );
        out
    }
}

/// Scenarios seen by fewer than two sources are left out. Cross-model results
/// are excluded since they already mix sources.
pub fn compare_sources(reports: &[Report], cv_threshold: f64) -> SourceComparison {
    // scenario -> source -> (sum S, count)
    let mut sums: BTreeMap<String, BTreeMap<String, (f64, usize)>> = BTreeMap::new();
    let mut sources = Vec::new();

    for (i, report) in reports.iter().enumerate() {
        let fallback = report.source.clone().unwrap_or_else(|| format!("source{}", i + 1));
        for r in report.results.iter().filter(|r| r.key.cross_type != CrossType::CrossModel) {
            let source = r.key.source.clone().unwrap_or_else(|| fallback.clone());
            if !sources.contains(&source) {
                sources.push(source.clone());
            }
            let entry = sums
                .entry(r.key.scenario.clone())
                .or_default()
                .entry(source)
                .or_insert((0.0, 0));
            entry.0 += r.s;
            entry.1 += 1;
        }
    }

    let scenarios = sums
        .into_iter()
        .filter(|(_, by_source)| by_source.len() >= 2)
        .map(|(scenario, by_source)| {
            let per_source: BTreeMap<String, f64> = by_source
                .into_iter()
                .map(|(source, (total, n))| (source, total / n as f64))
                .collect();
            let values: Vec<f64> = per_source.values().copied().collect();
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let cv = if mean.abs() > f64::EPSILON {
                (max - min) / mean.abs()
            } else {
                f64::INFINITY
            };
            ScenarioConsistency {
                scenario,
                per_source,
                mean,
                min,
                max,
                cv,
                consistent: cv < cv_threshold,
            }
        })
        .collect();

    SourceComparison {
        sources,
        cv_threshold,
        scenarios,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ChshCalculator, FailureLedger, SettingStats};
    use crate::design::{ConfigurationKey, Frame};
    use chrono::Utc;

    fn report(source: &str, entries: &[(&str, f64)]) -> Report {
        let calc = ChshCalculator::default();
        let results = entries
            .iter()
            .map(|(scenario, e)| {
                // pp = e, everything else 0 -> S = e
                let stats = SettingStats { n: 10, mean: *e, std_err: 0.1 };
                let zero = SettingStats { n: 10, mean: 0.0, std_err: 0.1 };
                let key = ConfigurationKey {
                    scenario: scenario.to_string(),
                    frame_a: Frame::new("en", "present"),
                    frame_b: Frame::new("en", "present"),
                    cross_type: CrossType::Mono,
                    source: None,
                };
                calc.combine(key, stats, zero, zero, zero)
            })
            .collect();
        Report {
            generated_at: Utc::now(),
            source: Some(source.to_string()),
            classical_bound: 2.0,
            significance_threshold: 3.0,
            records: 0,
            results,
            ordering: Vec::new(),
            interference: Vec::new(),
            failures: FailureLedger::default(),
            summary: Vec::new(),
        }
    }

    #[test]
    fn test_consistency_by_cv() {
        let a = report("a", &[("lifeboat", 1.0), ("ledger", 0.2), ("solo", 0.5)]);
        let b = report("b", &[("lifeboat", 0.9), ("ledger", 0.8)]);
        let cmp = compare_sources(&[a, b], 0.25);

        assert_eq!(cmp.sources, vec!["a", "b"]);
        assert_eq!(cmp.scenarios.len(), 2);

        let ledger = &cmp.scenarios[0];
        assert_eq!(ledger.scenario, "ledger");
        assert!((ledger.cv - 1.2).abs() < 1e-9);
        assert!(!ledger.consistent);

        let lifeboat = &cmp.scenarios[1];
        assert!((lifeboat.mean - 0.95).abs() < 1e-9);
        assert!((lifeboat.cv - 0.1 / 0.95).abs() < 1e-9);
        assert!(lifeboat.consistent);
        assert_eq!(cmp.consistent_count(), 1);
    }

    #[test]
    fn test_zero_mean_is_inconsistent() {
        let a = report("a", &[("x", 0.5)]);
        let b = report("b", &[("x", -0.5)]);
        let cmp = compare_sources(&[a, b], 0.25);
        assert!(cmp.scenarios[0].cv.is_infinite());
        assert!(!cmp.scenarios[0].consistent);
        assert!(cmp.render().contains("CV=∞"));
    }
}
