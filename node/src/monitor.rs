//! Chain-governed rule set.
//!
//! A privileged setter account controls which rules are installed in two
//! steps. It first uploads a rule body as an account detail on the rule
//! repository account, keyed by the rule name. It then writes `true` or
//! `false` under the same key on the rule settings account. Only the flag
//! write changes the installed set. Disabling removes the rule, so a later
//! enable always fetches and compiles the repository entry afresh.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use brvs_ledger::{BlockSubscription, LedgerError, LedgerGateway};
use brvs_rules::{compile, RuleEngine};
use brvs_transactions::{Block, Command};
use brvs_types::AccountId;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Instrument};

use crate::metrics::BrvsMetrics;
use crate::tracing_spans::rule_update_span;
use crate::NodeError;

/// Effect of one rule flag on the installed set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleChange {
    Installed,
    Removed,
    /// Enabled while already installed.
    AlreadyInstalled,
    /// Disabled while not installed.
    NotInstalled,
    /// Enabled, but the body could not be fetched or compiled. The installed
    /// set is unchanged.
    LoadFailed(String),
}

/// One applied flag write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleUpdate {
    pub rule: String,
    pub enabled: bool,
    pub change: RuleChange,
}

/// Governance accounts read by the monitor.
#[derive(Clone, Debug)]
pub struct GovernanceAccounts {
    pub setter: AccountId,
    pub settings: AccountId,
    pub repository: AccountId,
}

pub struct RuleMonitor {
    accounts: GovernanceAccounts,
    engine: Arc<RuleEngine>,
    ledger: Arc<dyn LedgerGateway>,
    metrics: Arc<BrvsMetrics>,
    started: AtomicBool,
}

impl RuleMonitor {
    pub fn new(
        accounts: GovernanceAccounts,
        engine: Arc<RuleEngine>,
        ledger: Arc<dyn LedgerGateway>,
        metrics: Arc<BrvsMetrics>,
    ) -> Self {
        Self {
            accounts,
            engine,
            ledger,
            metrics,
            started: AtomicBool::new(false),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Subscribe to committed blocks and spawn the monitor loop.
    ///
    /// Only the first successful call starts anything; later calls return
    /// `Ok(None)`. The subscription exists before this returns, so no block
    /// published afterwards is missed.
    pub async fn start(
        self: &Arc<Self>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<Option<JoinHandle<Result<(), NodeError>>>, NodeError> {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("rule monitor already started");
            return Ok(None);
        }
        let subscription = match self.ledger.subscribe_blocks().await {
            Ok(subscription) => subscription,
            Err(e) => {
                self.started.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };
        info!(setter = %self.accounts.setter, "rule monitor started");
        let monitor = Arc::clone(self);
        Ok(Some(tokio::spawn(monitor.run(subscription, shutdown))))
    }

    async fn run(
        self: Arc<Self>,
        mut subscription: BlockSubscription,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), NodeError> {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("rule monitor shutting down");
                    subscription.close();
                    return Ok(());
                }
                delivery = subscription.recv() => {
                    let Some(delivery) = delivery else {
                        error!("rule monitor block stream closed");
                        return Err(LedgerError::StreamClosed.into());
                    };
                    self.process_block(&delivery.block).await;
                    delivery.ack();
                }
            }
        }
    }

    /// Apply every rule flag the setter wrote in `block`, in block order.
    pub async fn process_block(&self, block: &Block) -> Vec<RuleUpdate> {
        let mut updates = Vec::new();
        for tx in block
            .transactions
            .iter()
            .filter(|tx| tx.creator() == &self.accounts.setter)
        {
            for command in &tx.commands {
                let Command::SetAccountDetail {
                    account_id,
                    key,
                    value,
                } = command
                else {
                    continue;
                };
                if account_id != &self.accounts.settings {
                    continue;
                }
                let Some(enabled) = parse_flag(value) else {
                    warn!(rule = %key, %value, "ignoring non-boolean rule flag");
                    continue;
                };
                let change = self
                    .apply_flag(key, enabled)
                    .instrument(rule_update_span(key, enabled))
                    .await;
                updates.push(RuleUpdate {
                    rule: key.clone(),
                    enabled,
                    change,
                });
            }
        }
        updates
    }

    /// Reconcile one flag against the installed set.
    pub async fn apply_flag(&self, name: &str, enabled: bool) -> RuleChange {
        let installed = self.engine.contains_rule(name).await;
        match (enabled, installed) {
            (true, true) => {
                warn!(rule = name, "rule enabled but already installed");
                RuleChange::AlreadyInstalled
            }
            (false, true) => {
                self.engine.remove_rule(name).await;
                self.metrics.rule_updates_applied.inc();
                info!(rule = name, "rule removed");
                RuleChange::Removed
            }
            (false, false) => {
                warn!(rule = name, "rule disabled but not installed");
                RuleChange::NotInstalled
            }
            (true, false) => match self.load(name).await {
                Ok(()) => {
                    self.metrics.rule_updates_applied.inc();
                    info!(rule = name, "rule installed");
                    RuleChange::Installed
                }
                Err(reason) => {
                    self.metrics.rule_updates_failed.inc();
                    error!(rule = name, %reason, "rule load failed");
                    RuleChange::LoadFailed(reason)
                }
            },
        }
    }

    async fn load(&self, name: &str) -> Result<(), String> {
        let source = self
            .ledger
            .get_account_detail(&self.accounts.repository, Some(&self.accounts.setter), name)
            .await
            .map_err(|e| format!("fetching body: {e}"))?
            .ok_or_else(|| format!("no body uploaded to {}", self.accounts.repository))?;
        let rule = compile(name, &source).map_err(|e| e.to_string())?;
        self.engine.put_rule(name, Arc::new(rule)).await;
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
