//! CHSH Statistic Calculator
//!
//!   S = E(pp) - E(ps) + E(sp) + E(ss)
//!
//! Per setting: sample mean of the verdict products and its standard error
//! (Bessel-corrected variance). Missing data is expressed with sentinels that
//! stay safe in arithmetic rather than errors:
//! - n = 0: mean 0.0, standard error +inf
//! - n = 1: standard error 1.0
//!
//! Significance is (|S| - bound) / se_total, and only when |S| exceeds the
//! bound with a finite, positive aggregate error. Otherwise 0.

use serde::{Deserialize, Serialize};

use super::aggregator::{CorrelationSample, CorrelationTable, SettingSamples};
use crate::design::{ConfigurationKey, MeasurementSetting};

pub const CLASSICAL_BOUND: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettingStats {
    pub n: usize,
    pub mean: f64,
    #[serde(with = "inf_as_null")]
    pub std_err: f64,
}

impl SettingStats {
    pub fn from_values(values: &[f64]) -> Self {
        let n = values.len();
        match n {
            0 => Self {
                n,
                mean: 0.0,
                std_err: f64::INFINITY,
            },
            1 => Self {
                n,
                mean: values[0],
                std_err: 1.0,
            },
            _ => {
                let mean = values.iter().sum::<f64>() / n as f64;
                let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
                Self {
                    n,
                    mean,
                    std_err: (variance / n as f64).sqrt(),
                }
            }
        }
    }

    pub fn from_products(products: &[i8]) -> Self {
        let values: Vec<f64> = products.iter().map(|&p| p as f64).collect();
        Self::from_values(&values)
    }

    pub fn from_samples(samples: &[CorrelationSample]) -> Self {
        let products: Vec<i8> = samples.iter().map(CorrelationSample::product).collect();
        Self::from_products(&products)
    }
}

/// Independent errors combined in quadrature.
pub fn quadrature(errors: &[f64]) -> f64 {
    errors.iter().map(|e| e * e).sum::<f64>().sqrt()
}

/// Sigma for an excess over a reference, 0 when the error carries no information.
pub fn sigma(excess: f64, std_err: f64) -> f64 {
    if std_err.is_finite() && std_err > 0.0 {
        excess / std_err
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChshResult {
    pub key: ConfigurationKey,
    pub pp: SettingStats,
    pub ps: SettingStats,
    pub sp: SettingStats,
    pub ss: SettingStats,
    pub s: f64,
    #[serde(with = "inf_as_null")]
    pub std_err: f64,
    pub violation: bool,
    pub significance: f64,
    /// Matched samples across all four settings
    pub n: usize,
}

impl ChshResult {
    pub fn setting(&self, setting: MeasurementSetting) -> &SettingStats {
        match setting {
            MeasurementSetting::PP => &self.pp,
            MeasurementSetting::PS => &self.ps,
            MeasurementSetting::SP => &self.sp,
            MeasurementSetting::SS => &self.ss,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChshCalculator {
    pub classical_bound: f64,
}

impl Default for ChshCalculator {
    fn default() -> Self {
        Self {
            classical_bound: CLASSICAL_BOUND,
        }
    }
}

impl ChshCalculator {
    pub fn new(classical_bound: f64) -> Self {
        Self { classical_bound }
    }

    pub fn compute(&self, key: &ConfigurationKey, samples: &SettingSamples) -> ChshResult {
        let [pp, ps, sp, ss] = [
            MeasurementSetting::PP,
            MeasurementSetting::PS,
            MeasurementSetting::SP,
            MeasurementSetting::SS,
        ]
        .map(|setting| SettingStats::from_samples(&samples[setting.index()]));

        self.combine(key.clone(), pp, ps, sp, ss)
    }

    pub fn combine(
        &self,
        key: ConfigurationKey,
        pp: SettingStats,
        ps: SettingStats,
        sp: SettingStats,
        ss: SettingStats,
    ) -> ChshResult {
        let s = pp.mean - ps.mean + sp.mean + ss.mean;
        let std_err = quadrature(&[pp.std_err, ps.std_err, sp.std_err, ss.std_err]);
        let violation = s.abs() > self.classical_bound;
        let significance = if violation {
            sigma(s.abs() - self.classical_bound, std_err)
        } else {
            0.0
        };

        ChshResult {
            key,
            pp,
            ps,
            sp,
            ss,
            s,
            std_err,
            violation,
            significance,
            n: pp.n + ps.n + sp.n + ss.n,
        }
    }

    /// One result per configuration, in table order.
    pub fn compute_all(&self, table: &CorrelationTable) -> Vec<ChshResult> {
        table.iter().map(|(key, samples)| self.compute(key, samples)).collect()
    }
}

/// Non-finite floats as JSON `null`, read back as +inf.
pub(crate) mod inf_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}
