//! Read-only view for the management API.

use std::collections::BTreeSet;
use std::sync::Arc;

use brvs_rules::RuleEngine;
use brvs_store::{AccountRegistry, VerdictStore};
use brvs_types::{AccountId, TxHash, Verdict};

use crate::admission::AdmissionCache;
use crate::metrics::BrvsMetrics;
use crate::NodeError;

#[derive(Clone)]
pub struct StatusView {
    verdicts: Arc<dyn VerdictStore>,
    registry: Arc<dyn AccountRegistry>,
    admission: Arc<AdmissionCache>,
    engine: Arc<RuleEngine>,
    metrics: Arc<BrvsMetrics>,
}

impl StatusView {
    pub fn new(
        verdicts: Arc<dyn VerdictStore>,
        registry: Arc<dyn AccountRegistry>,
        admission: Arc<AdmissionCache>,
        engine: Arc<RuleEngine>,
        metrics: Arc<BrvsMetrics>,
    ) -> Self {
        Self {
            verdicts,
            registry,
            admission,
            engine,
            metrics,
        }
    }

    pub fn current_verdict(&self, hash: &TxHash) -> Result<Option<Verdict>, NodeError> {
        Ok(self.verdicts.get_verdict(hash)?)
    }

    pub fn is_registered(&self, account: &AccountId) -> Result<bool, NodeError> {
        Ok(self.registry.is_registered(account)?)
    }

    pub async fn locked_accounts(&self) -> Vec<AccountId> {
        self.admission.locked_accounts().await
    }

    pub async fn rule_names(&self) -> BTreeSet<String> {
        self.engine.rule_names().await
    }

    /// Prometheus text exposition of every pipeline metric.
    pub fn metrics_text(&self) -> Result<String, NodeError> {
        self.metrics.encode_text()
    }
}
