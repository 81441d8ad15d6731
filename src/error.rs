//! Error Types
//!
//! Only structural failures live here. Anything that goes wrong with a single
//! trial (bad identifier, unparseable response, missing condition) is a
//! `TrialFailure` recorded in the `FailureLedger` instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BellError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("prompt template error: {0}")]
    Template(String),

    #[error("result set contains no records")]
    NoResults,

    #[error("no configuration could be recovered from {records} result records")]
    NoConfigurations { records: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("oracle error: {0}")]
    Oracle(String),
}

impl From<handlebars::TemplateError> for BellError {
    fn from(err: handlebars::TemplateError) -> Self {
        BellError::Template(err.to_string())
    }
}

impl From<handlebars::RenderError> for BellError {
    fn from(err: handlebars::RenderError) -> Self {
        BellError::Template(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BellError>;
