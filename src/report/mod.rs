//! Report Layer
//!
//! Purely derivational over computed CHSH results: partitions by cross-type
//! and source, ranking, sigma flags, language-pair summaries, and a text
//! rendering. Reports serialize to JSON and load back for cross-source comparison.

pub mod comparison;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

use crate::analysis::chsh::inf_as_null;
use crate::analysis::{Analysis, ChshResult, FailureLedger, InterferenceResult, OrderingResult};
use crate::config::EngineConfig;
use crate::design::{ConfigurationKey, CrossType};
use crate::error::Result;

pub use comparison::{compare_sources, ScenarioConsistency, SourceComparison};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub source: Option<String>,
    pub classical_bound: f64,
    pub significance_threshold: f64,
    pub records: usize,
    pub results: Vec<ChshResult>,
    #[serde(default)]
    pub ordering: Vec<OrderingResult>,
    #[serde(default)]
    pub interference: Vec<InterferenceResult>,
    #[serde(default)]
    pub failures: FailureLedger,
    /// One row per configuration, for downstream tools that skip `results`
    #[serde(default)]
    pub summary: Vec<SummaryRow>,
}

/// The per-configuration line of the structured summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub key: ConfigurationKey,
    pub n: usize,
    pub s: f64,
    #[serde(with = "inf_as_null")]
    pub std_err: f64,
    pub significance: f64,
    pub violation: bool,
    pub flagged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Partition {
    pub cross_type: CrossType,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageStats {
    pub configurations: usize,
    pub mean_s: f64,
    pub violations: usize,
}

/// Significance first, then |S|, then key for a stable order.
pub fn rank(results: &mut [&ChshResult]) {
    results.sort_by(|a, b| {
        b.significance
            .partial_cmp(&a.significance)
            .unwrap_or(Ordering::Equal)
            .then(b.s.abs().partial_cmp(&a.s.abs()).unwrap_or(Ordering::Equal))
            .then_with(|| a.key.cmp(&b.key))
    });
}

impl Report {
    pub fn from_analysis(analysis: Analysis, source: Option<String>, config: &EngineConfig) -> Self {
        let mut report = Self {
            generated_at: Utc::now(),
            source,
            classical_bound: config.classical_bound,
            significance_threshold: config.significance_threshold,
            records: analysis.records,
            results: analysis.results,
            ordering: analysis.ordering,
            interference: analysis.interference,
            failures: analysis.ledger,
            summary: Vec::new(),
        };
        report.summary = report.summary_rows();
        report
    }

    pub fn is_flagged(&self, result: &ChshResult) -> bool {
        result.significance > self.significance_threshold
    }

    pub fn flagged(&self) -> Vec<&ChshResult> {
        let mut out: Vec<&ChshResult> = self.results.iter().filter(|r| self.is_flagged(r)).collect();
        rank(&mut out);
        out
    }

    pub fn summary_rows(&self) -> Vec<SummaryRow> {
        self.results
            .iter()
            .map(|r| SummaryRow {
                key: r.key.clone(),
                n: r.n,
                s: r.s,
                std_err: r.std_err,
                significance: r.significance,
                violation: r.violation,
                flagged: self.is_flagged(r),
            })
            .collect()
    }

    /// Results grouped by (cross-type, source), ranked within each group.
    pub fn partitions(&self) -> BTreeMap<Partition, Vec<&ChshResult>> {
        let mut groups: BTreeMap<Partition, Vec<&ChshResult>> = BTreeMap::new();
        for result in &self.results {
            let partition = Partition {
                cross_type: result.key.cross_type,
                source: result.key.source.clone().or_else(|| self.source.clone()),
            };
            groups.entry(partition).or_default().push(result);
        }
        for group in groups.values_mut() {
            rank(group);
        }
        groups
    }

    /// Keyed by (party A language, party B language).
    pub fn language_summary(&self) -> BTreeMap<(String, String), LanguageStats> {
        let mut sums: BTreeMap<(String, String), (usize, f64, usize)> = BTreeMap::new();
        for r in &self.results {
            let entry = sums
                .entry((r.key.frame_a.language.clone(), r.key.frame_b.language.clone()))
                .or_insert((0, 0.0, 0));
            entry.0 += 1;
            entry.1 += r.s;
            entry.2 += r.violation as usize;
        }
        sums.into_iter()
            .map(|(langs, (n, total, violations))| {
                (
                    langs,
                    LanguageStats {
                        configurations: n,
                        mean_s: total / n as f64,
                        violations,
                    },
                )
            })
            .collect()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let rule = "═".repeat(72);

        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(
            out,
            "CHSH REPORT{}  ({} records, {} configurations, bound {:.1}, flag > {:.1}σ)",
            self.source.as_ref().map(|s| format!(" [{}]", s)).unwrap_or_default(),
            self.records,
            self.results.len(),
            self.classical_bound,
            self.significance_threshold
        );
        let _ = writeln!(out, "{}", rule);

        for (partition, results) in self.partitions() {
            let _ = writeln!(
                out,
                "\n── {}{} ──",
                partition.cross_type,
                partition.source.map(|s| format!(" @{}", s)).unwrap_or_default()
            );
            for r in results {
                let _ = writeln!(
                    out,
                    "{} {:<40} n={:<5} S={:+.3} ± {} σ={:.2}",
                    if self.is_flagged(r) { "⚑" } else if r.violation { "!" } else { " " },
                    format!("{} {} vs {}", r.key.scenario, r.key.frame_a, r.key.frame_b),
                    r.n,
                    r.s,
                    format_err(r.std_err),
                    r.significance
                );
            }
        }

        let languages = self.language_summary();
        if languages.len() > 1 {
            let _ = writeln!(out, "\n── languages ──");
            for ((a, b), stats) in languages {
                let _ = writeln!(
                    out,
                    "  {:>5} vs {:<5} configs={:<4} mean S={:+.3} violations={}",
                    a, b, stats.configurations, stats.mean_s, stats.violations
                );
            }
        }

        let _ = writeln!(out, "\n── dropped trials: {} ──", self.failures.total());
        for (kind, n) in &self.failures.counts {
            let _ = writeln!(out, "  {:?}: {}", kind, n);
        }
        out
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), serde_json::to_string_pretty(self)?)?;
        info!("Wrote report to {}", path.as_ref().display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }
}

fn format_err(se: f64) -> String {
    if se.is_finite() {
        format!("{:.3}", se)
    } else {
        "∞".to_string()
    }
}
