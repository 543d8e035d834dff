//! Prometheus metrics for the BRVS pipeline.
//!
//! [`BrvsMetrics`] owns a dedicated [`Registry`]; the status view encodes it
//! into the Prometheus text exposition format for the management API.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

use crate::NodeError;

/// Central collection of pipeline metrics.
pub struct BrvsMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Batches handed to the admission cache.
    pub batches_offered: IntCounter,
    /// Batches emitted for validation (fast path or after a release).
    pub batches_admitted: IntCounter,
    /// Batches held back behind a locked account.
    pub batches_queued: IntCounter,
    pub verdicts_validated: IntCounter,
    pub verdicts_rejected: IntCounter,
    pub verdicts_failed: IntCounter,
    /// Committed blocks fully reacted to and acknowledged.
    pub blocks_processed: IntCounter,
    pub rule_updates_applied: IntCounter,
    pub rule_updates_failed: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub locked_accounts: IntGauge,
    pub queued_batches: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time from admission to submission of a batch, in milliseconds.
    pub validation_time_ms: Histogram,
}

impl BrvsMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| {
            register_int_counter_with_registry!(Opts::new(name, help), registry)
                .unwrap_or_else(|e| panic!("failed to register {name}: {e}"))
        };
        let batches_offered = counter(
            "brvs_batches_offered_total",
            "Batches offered to the admission cache",
        );
        let batches_admitted = counter(
            "brvs_batches_admitted_total",
            "Batches emitted for validation",
        );
        let batches_queued = counter(
            "brvs_batches_queued_total",
            "Batches queued behind a locked account",
        );
        let verdicts_validated = counter(
            "brvs_verdicts_validated_total",
            "Transactions co-signed after passing all rules",
        );
        let verdicts_rejected = counter(
            "brvs_verdicts_rejected_total",
            "Transactions poison-signed after a rule rejection",
        );
        let verdicts_failed = counter(
            "brvs_verdicts_failed_total",
            "Transactions that could not be validated",
        );
        let blocks_processed = counter(
            "brvs_blocks_processed_total",
            "Committed blocks reacted to and acknowledged",
        );
        let rule_updates_applied = counter(
            "brvs_rule_updates_applied_total",
            "Chain-governed rule changes applied",
        );
        let rule_updates_failed = counter(
            "brvs_rule_updates_failed_total",
            "Chain-governed rule bodies that failed to load",
        );

        let locked_accounts = register_int_gauge_with_registry!(
            Opts::new(
                "brvs_locked_accounts",
                "Accounts currently locked by an in-flight batch"
            ),
            registry
        )
        .expect("failed to register locked_accounts gauge");

        let queued_batches = register_int_gauge_with_registry!(
            Opts::new(
                "brvs_queued_batches",
                "Batches waiting in the admission cache"
            ),
            registry
        )
        .expect("failed to register queued_batches gauge");

        // Exponential buckets covering 1 ms to ~16 s.
        let validation_time_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "brvs_validation_time_ms",
                "Rule validation and submission time in milliseconds"
            )
            .buckets(
                prometheus::exponential_buckets(1.0, 2.0, 15)
                    .expect("exponential bucket parameters are valid")
            ),
            registry
        )
        .expect("failed to register validation_time_ms histogram");

        Self {
            registry,
            batches_offered,
            batches_admitted,
            batches_queued,
            verdicts_validated,
            verdicts_rejected,
            verdicts_failed,
            blocks_processed,
            rule_updates_applied,
            rule_updates_failed,
            locked_accounts,
            queued_batches,
            validation_time_ms,
        }
    }

    /// Encode every metric in the Prometheus text format.
    pub fn encode_text(&self) -> Result<String, NodeError> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(|e| NodeError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| NodeError::Metrics(e.to_string()))
    }
}

impl Default for BrvsMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_dump_contains_counters() {
        let metrics = BrvsMetrics::new();
        metrics.verdicts_rejected.inc();
        metrics.locked_accounts.set(3);
        let text = metrics.encode_text().unwrap();
        assert!(text.contains("brvs_verdicts_rejected_total 1"));
        assert!(text.contains("brvs_locked_accounts 3"));
    }
}
