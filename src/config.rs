//! Engine Configuration
//!
//! Loaded from YAML or JSON, then overridden from the environment
//! (a `.env` file is honoured through `dotenv`).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{BellError, Result};

/// The two canonical verdict labels the oracle is asked to answer with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictLabels {
    /// Label meaning "wrongful" (maps to -1)
    pub wrongful: String,
    /// Label meaning "not wrongful" (maps to +1)
    pub not_wrongful: String,
}

impl Default for VerdictLabels {
    fn default() -> Self {
        Self {
            wrongful: "YTA".to_string(),
            not_wrongful: "NTA".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub labels: VerdictLabels,
    /// Classical CHSH bound on |S|
    pub classical_bound: f64,
    /// Sigma above which a result is flagged in reports
    pub significance_threshold: f64,
    /// Cross-source coefficient of variation below which sources agree
    pub consistency_cv: f64,
    /// Max characters kept from an unparseable response
    pub excerpt_chars: usize,
    pub salt_len: usize,
    /// Seed for reproducible identifier salts
    pub seed: Option<u64>,
    pub log_filter: String,
    pub log_dir: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            labels: VerdictLabels::default(),
            classical_bound: 2.0,
            significance_threshold: 3.0,
            consistency_cv: 0.25,
            excerpt_chars: 160,
            salt_len: 6,
            seed: None,
            log_filter: "moral_bell=info".to_string(),
            log_dir: None,
        }
    }
}

impl EngineConfig {
    /// Load from a `.yaml`/`.yml` or `.json` file, then apply env overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: EngineConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&raw)?,
            _ => serde_yaml::from_str(&raw)?,
        };
        config.with_env_overrides().validated()
    }

    /// Defaults plus env overrides, for runs without a config file.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides().validated()
    }

    pub fn with_env_overrides(mut self) -> Self {
        dotenv::dotenv().ok();

        if let Some(v) = env_parse::<f64>("MORAL_BELL_SIGMA") {
            self.significance_threshold = v;
        }
        if let Some(v) = env_parse::<f64>("MORAL_BELL_CV") {
            self.consistency_cv = v;
        }
        if let Some(v) = env_parse::<u64>("MORAL_BELL_SEED") {
            self.seed = Some(v);
        }
        if let Ok(v) = std::env::var("MORAL_BELL_LOG") {
            self.log_filter = v;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.classical_bound > 0.0) {
            return Err(BellError::InvalidConfig("classical_bound must be positive".into()));
        }
        if !(self.significance_threshold > 0.0) {
            return Err(BellError::InvalidConfig("significance_threshold must be positive".into()));
        }
        if !(self.consistency_cv > 0.0) {
            return Err(BellError::InvalidConfig("consistency_cv must be positive".into()));
        }
        if self.salt_len == 0 {
            return Err(BellError::InvalidConfig("salt_len must be at least 1".into()));
        }

        let labels = [&self.labels.wrongful, &self.labels.not_wrongful];
        for label in labels {
            if label.is_empty() || !label.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(BellError::InvalidConfig(format!(
                    "verdict label '{}' must be a single word token",
                    label
                )));
            }
        }
        if self.labels.wrongful.eq_ignore_ascii_case(&self.labels.not_wrongful) {
            return Err(BellError::InvalidConfig("verdict labels must differ".into()));
        }
        Ok(())
    }

    fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
