//! Analysis Pipeline
//!
//! result set -> observations -> correlation table -> CHSH + variant results.
//! One-shot batch processing over a static snapshot; re-running on the same
//! input yields the same output.

pub mod aggregator;
pub mod chsh;
pub mod observations;
pub mod results;
pub mod variants;

use tracing::{info, warn};

pub use aggregator::{CorrelationSample, CorrelationTable, TrialKey};
pub use chsh::{ChshCalculator, ChshResult, SettingStats};
pub use observations::{cross_source, FailureKind, FailureLedger, Observation, Resolver};
pub use results::{ResultRecord, ResultSet};
pub use variants::{InterferenceResult, OrderingResult, OrderingSpec, TimingSpec};

use crate::error::{BellError, Result};

#[derive(Debug, Clone)]
pub struct Analysis {
    pub results: Vec<ChshResult>,
    pub ordering: Vec<OrderingResult>,
    pub interference: Vec<InterferenceResult>,
    pub ledger: FailureLedger,
    pub records: usize,
}

/// Aggregate and compute everything the report needs from resolved observations.
///
/// `records` is the number of result records the observations came from; it
/// only feeds the structural failure message.
pub fn analyze_observations(
    observations: &[Observation],
    ledger: FailureLedger,
    records: usize,
    calculator: &ChshCalculator,
) -> Result<Analysis> {
    let table = CorrelationTable::build(observations);
    if table.is_empty() {
        warn!("No configuration recovered from {} records", records);
        return Err(BellError::NoConfigurations { records });
    }

    let mut ledger = ledger;
    ledger.merge(table.ledger());

    let results = calculator.compute_all(&table);
    let violations = results.iter().filter(|r| r.violation).count();
    info!(
        "Computed CHSH for {} configurations ({} above the classical bound)",
        results.len(),
        violations
    );

    Ok(Analysis {
        ordering: variants::ordering_test(&table, OrderingSpec::default()),
        interference: variants::timing_interference(&table, TimingSpec::default()),
        results,
        ledger,
        records,
    })
}

/// Resolve a result set (with or without manifest) and analyze it.
pub fn analyze(resolver: &Resolver<'_>, results: &ResultSet, calculator: &ChshCalculator) -> Result<Analysis> {
    if results.is_empty() {
        return Err(BellError::NoResults);
    }
    let resolution = resolver.resolve(results);
    analyze_observations(&resolution.observations, resolution.ledger, resolution.records, calculator)
}
