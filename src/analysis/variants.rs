//! Variant Analyses
//!
//! Same matching and variance machinery as the CHSH test, different setting
//! definitions:
//! - ordering (commutator): compare two orderings of one measurement,
//!   by default E(ps) against E(sp)
//! - timing interference: an interleaved setting against the midpoint of two
//!   boundary settings, by default E(ps) against (E(pp) + E(ss)) / 2

use serde::{Deserialize, Serialize};

use super::aggregator::CorrelationTable;
use super::chsh::{inf_as_null, quadrature, sigma, SettingStats};
use crate::design::{ConfigurationKey, MeasurementSetting};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingSpec {
    pub first: MeasurementSetting,
    pub second: MeasurementSetting,
}

impl Default for OrderingSpec {
    fn default() -> Self {
        Self {
            first: MeasurementSetting::PS,
            second: MeasurementSetting::SP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingSpec {
    pub interleaved: MeasurementSetting,
    pub lower: MeasurementSetting,
    pub upper: MeasurementSetting,
}

impl Default for TimingSpec {
    fn default() -> Self {
        Self {
            interleaved: MeasurementSetting::PS,
            lower: MeasurementSetting::PP,
            upper: MeasurementSetting::SS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderingResult {
    pub key: ConfigurationKey,
    pub spec: OrderingSpec,
    pub first: SettingStats,
    pub second: SettingStats,
    /// E(first) - E(second)
    pub delta: f64,
    #[serde(with = "inf_as_null")]
    pub std_err: f64,
    pub significance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterferenceResult {
    pub key: ConfigurationKey,
    pub spec: TimingSpec,
    pub interleaved: SettingStats,
    pub lower: SettingStats,
    pub upper: SettingStats,
    pub midpoint: f64,
    /// E(interleaved) - midpoint
    pub interference: f64,
    #[serde(with = "inf_as_null")]
    pub std_err: f64,
    pub significance: f64,
}

fn stats(table: &CorrelationTable, key: &ConfigurationKey, setting: MeasurementSetting) -> SettingStats {
    SettingStats::from_samples(table.samples(key, setting))
}

pub fn ordering_test(table: &CorrelationTable, spec: OrderingSpec) -> Vec<OrderingResult> {
    table
        .keys()
        .iter()
        .map(|key| {
            let first = stats(table, key, spec.first);
            let second = stats(table, key, spec.second);
            let delta = first.mean - second.mean;
            let std_err = quadrature(&[first.std_err, second.std_err]);
            OrderingResult {
                key: key.clone(),
                spec,
                first,
                second,
                delta,
                std_err,
                significance: sigma(delta.abs(), std_err),
            }
        })
        .collect()
}

pub fn timing_interference(table: &CorrelationTable, spec: TimingSpec) -> Vec<InterferenceResult> {
    table
        .keys()
        .iter()
        .map(|key| {
            let interleaved = stats(table, key, spec.interleaved);
            let lower = stats(table, key, spec.lower);
            let upper = stats(table, key, spec.upper);
            let midpoint = (lower.mean + upper.mean) / 2.0;
            let interference = interleaved.mean - midpoint;
            // midpoint error is half the boundary errors in quadrature
            let std_err = quadrature(&[interleaved.std_err, lower.std_err / 2.0, upper.std_err / 2.0]);
            InterferenceResult {
                key: key.clone(),
                spec,
                interleaved,
                lower,
                upper,
                midpoint,
                interference,
                std_err,
                significance: sigma(interference.abs(), std_err),
            }
        })
        .collect()
}
