//! Judgment Oracle Contract
//!
//! The service that actually produces verdict text is external. This module
//! only fixes the batch contract (submit, poll, retrieve) and drives it once.
//! Retry, cancellation and timeouts belong to the oracle implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{BellError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub identifier: String,
    pub prompt: String,
    /// Which judgment source should answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchHandle(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    InProgress { completed: usize, total: usize },
    Completed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleOutcome {
    pub identifier: String,
    pub outcome: Outcome,
}

#[async_trait]
pub trait JudgmentOracle: Send + Sync {
    async fn submit(&self, requests: Vec<OracleRequest>) -> Result<BatchHandle>;
    async fn poll(&self, handle: &BatchHandle) -> Result<BatchStatus>;
    async fn retrieve(&self, handle: &BatchHandle) -> Result<Vec<OracleOutcome>>;
}

/// Submit once, wait for a terminal status, retrieve whatever came back.
pub async fn collect_batch(
    oracle: &dyn JudgmentOracle,
    requests: Vec<OracleRequest>,
    poll_interval: Duration,
) -> Result<Vec<OracleOutcome>> {
    let total = requests.len();
    let handle = oracle.submit(requests).await?;
    info!("Submitted batch {} with {} requests", handle.0, total);

    loop {
        match oracle.poll(&handle).await? {
            BatchStatus::Completed => break,
            BatchStatus::Failed(reason) => {
                return Err(BellError::Oracle(format!("batch {} failed: {}", handle.0, reason)));
            }
            BatchStatus::InProgress { completed, total } => {
                debug!("Batch {}: {}/{} complete", handle.0, completed, total);
                tokio::time::sleep(poll_interval).await;
            }
        }
    }

    let outcomes = oracle.retrieve(&handle).await?;
    info!("Retrieved {} outcomes for batch {}", outcomes.len(), handle.0);
    Ok(outcomes)
}

/// Serves previously captured responses by identifier, for offline re-analysis.
pub struct ReplayOracle {
    responses: BTreeMap<String, String>,
    batches: Mutex<HashMap<BatchHandle, Vec<String>>>,
}

impl ReplayOracle {
    pub fn new(responses: BTreeMap<String, String>) -> Self {
        Self {
            responses,
            batches: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl JudgmentOracle for ReplayOracle {
    async fn submit(&self, requests: Vec<OracleRequest>) -> Result<BatchHandle> {
        let handle = BatchHandle(format!("replay_{}", Uuid::new_v4()));
        let ids = requests.into_iter().map(|r| r.identifier).collect();
        self.batches.lock().await.insert(handle.clone(), ids);
        Ok(handle)
    }

    async fn poll(&self, handle: &BatchHandle) -> Result<BatchStatus> {
        if self.batches.lock().await.contains_key(handle) {
            Ok(BatchStatus::Completed)
        } else {
            Err(BellError::Oracle(format!("unknown batch {}", handle.0)))
        }
    }

    /// A batch is served once; its handle is released afterwards.
    async fn retrieve(&self, handle: &BatchHandle) -> Result<Vec<OracleOutcome>> {
        let ids = self
            .batches
            .lock()
            .await
            .remove(handle)
            .ok_or_else(|| BellError::Oracle(format!("unknown batch {}", handle.0)))?;

        Ok(ids
            .into_iter()
            .map(|id| {
                let outcome = match self.responses.get(&id) {
                    Some(text) => Outcome::Succeeded(text.clone()),
                    None => Outcome::Failed("no captured response".to_string()),
                };
                OracleOutcome { identifier: id, outcome }
            })
            .collect())
    }
}
