//! Moral Bell
//!
//! Experiment design and statistical inference for order-dependent structure
//! in how a black-box judgment oracle assigns verdicts:
//! - Layout-tolerant trial identifiers
//! - Verdict extraction from free-text responses
//! - Combinatorial design generation with audit manifests
//! - Correlation aggregation and CHSH statistics with error propagation
//! - Cross-language and cross-source reporting

pub mod analysis;
pub mod config;
pub mod design;
pub mod error;
pub mod oracle;
pub mod report;
pub mod utils;
pub mod verdict;

// Re-exports for convenience
pub use analysis::{ChshCalculator, ChshResult, CorrelationTable, ResultSet, Resolver};
pub use config::EngineConfig;
pub use design::{ConfigurationKey, DesignGenerator, Manifest, TrialCondition};
pub use error::{BellError, Result};
pub use report::Report;
pub use verdict::{Verdict, VerdictExtractor};
