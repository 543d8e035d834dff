//! The BRVS service: builds every component from one config and runs the loops.

use std::sync::Arc;

use brvs_ledger::LedgerGateway;
use brvs_rules::{RuleContext, RuleEngine};
use brvs_store::{AccountRegistry, VerdictStore};
use brvs_transactions::TransactionBatch;
use brvs_types::{KeyPair, PublicKey};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::admission::AdmissionCache;
use crate::config::BrvsConfig;
use crate::metrics::BrvsMetrics;
use crate::monitor::{GovernanceAccounts, RuleMonitor};
use crate::orchestrator::{BlockReactor, PendingPoller, ReleaseListener, ReleaseRequests};
use crate::plugin::BlockReaction;
use crate::shutdown::ShutdownController;
use crate::signer::Signer;
use crate::status::StatusView;
use crate::worker::ValidationWorker;
use crate::NodeError;

type TaskResult = (&'static str, Result<(), NodeError>);

/// External services BRVS talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub ledger: Arc<dyn LedgerGateway>,
    pub verdicts: Arc<dyn VerdictStore>,
    pub registry: Arc<dyn AccountRegistry>,
}

pub struct Brvs {
    config: BrvsConfig,
    collaborators: Collaborators,
    brvs_key: PublicKey,
    admission: Arc<AdmissionCache>,
    output: Option<mpsc::Receiver<TransactionBatch>>,
    engine: Arc<RuleEngine>,
    signer: Arc<Signer>,
    monitor: Arc<RuleMonitor>,
    plugins: Vec<Arc<dyn BlockReaction>>,
    metrics: Arc<BrvsMetrics>,
    shutdown: Arc<ShutdownController>,
    tasks: JoinSet<TaskResult>,
    started: bool,
}

impl Brvs {
    pub fn new(config: BrvsConfig, keypair: KeyPair, collaborators: Collaborators) -> Self {
        let metrics = Arc::new(BrvsMetrics::new());
        let brvs_key = keypair.public.clone();
        let (admission, output) = AdmissionCache::new(config.output_channel_capacity);
        let engine = Arc::new(RuleEngine::new(RuleContext {
            ledger: collaborators.ledger.clone(),
            registry: collaborators.registry.clone(),
            brvs_key: brvs_key.clone(),
        }));
        let signer = Arc::new(Signer::new(
            collaborators.ledger.clone(),
            collaborators.verdicts.clone(),
            keypair,
            metrics.clone(),
        ));
        let monitor = Arc::new(RuleMonitor::new(
            GovernanceAccounts {
                setter: config.setter_account.clone(),
                settings: config.rule_settings_account.clone(),
                repository: config.rule_repository_account.clone(),
            },
            engine.clone(),
            collaborators.ledger.clone(),
            metrics.clone(),
        ));
        Self {
            config,
            collaborators,
            brvs_key,
            admission: Arc::new(admission),
            output: Some(output),
            engine,
            signer,
            monitor,
            plugins: Vec::new(),
            metrics,
            shutdown: Arc::new(ShutdownController::new()),
            tasks: JoinSet::new(),
            started: false,
        }
    }

    /// Register a block-reaction plugin. Plugins run in registration order.
    pub fn with_plugin(mut self, plugin: Arc<dyn BlockReaction>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn config(&self) -> &BrvsConfig {
        &self.config
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.brvs_key
    }

    pub fn engine(&self) -> &Arc<RuleEngine> {
        &self.engine
    }

    pub fn admission(&self) -> &Arc<AdmissionCache> {
        &self.admission
    }

    pub fn metrics(&self) -> &Arc<BrvsMetrics> {
        &self.metrics
    }

    pub fn shutdown(&self) -> &Arc<ShutdownController> {
        &self.shutdown
    }

    pub fn status(&self) -> StatusView {
        StatusView::new(
            self.collaborators.verdicts.clone(),
            self.collaborators.registry.clone(),
            self.admission.clone(),
            self.engine.clone(),
            self.metrics.clone(),
        )
    }

    /// Install the configured built-in rules and spawn every loop.
    ///
    /// Block subscriptions and the verdict event subscription are taken
    /// before any loop runs.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        if self.started {
            return Err(NodeError::AlreadyStarted);
        }
        let output = self.output.take().ok_or(NodeError::AlreadyStarted)?;
        self.started = true;

        for rule in &self.config.builtin_rules {
            self.engine.put_rule(rule.name(), rule.build()).await;
            info!(rule = rule.name(), "built-in rule installed");
        }

        let Collaborators {
            ledger,
            verdicts,
            registry,
        } = self.collaborators.clone();

        let blocks = ledger.subscribe_blocks().await?;
        let (releases, release_requests) = ReleaseRequests::channel();
        let release = ReleaseListener::new(
            self.admission.clone(),
            verdicts.clone(),
            self.metrics.clone(),
            release_requests,
        );
        let monitor = self.monitor.start(self.shutdown.subscribe()).await?;
        if let Some(handle) = monitor {
            self.tasks.spawn(async move {
                let result = handle.await.map_err(|e| NodeError::TaskFailed {
                    task: "rule_monitor".into(),
                    reason: e.to_string(),
                });
                ("rule_monitor", result.and_then(|inner| inner))
            });
        }

        let poller = PendingPoller::new(
            ledger.clone(),
            registry,
            verdicts.clone(),
            self.admission.clone(),
            self.metrics.clone(),
            self.brvs_key.clone(),
            self.config.redundancy_factor,
            self.config.pending_poll_interval(),
        );
        let reactor = BlockReactor::new(
            self.admission.clone(),
            verdicts.clone(),
            self.plugins.clone(),
            self.metrics.clone(),
        );
        let worker = ValidationWorker::new(
            self.engine.clone(),
            self.signer.clone(),
            releases,
            verdicts,
            self.metrics.clone(),
            self.config.validation_workers,
        );

        let rx = self.shutdown.subscribe();
        self.tasks
            .spawn(async move { ("release_listener", release.run(rx).await) });
        let rx = self.shutdown.subscribe();
        self.tasks
            .spawn(async move { ("block_reactor", reactor.run(blocks, rx).await) });
        let rx = self.shutdown.subscribe();
        self.tasks
            .spawn(async move { ("validation_worker", worker.run(output, rx).await) });
        let rx = self.shutdown.subscribe();
        self.tasks
            .spawn(async move { ("pending_poller", poller.run(rx).await) });

        info!(
            account = %self.config.brvs_account,
            rules = self.config.builtin_rules.len(),
            plugins = self.plugins.len(),
            "BRVS started"
        );
        Ok(())
    }

    /// Run until SIGINT/SIGTERM or until a loop fails, then stop. A loop
    /// failure is returned after the remaining loops have stopped.
    pub async fn run_until_shutdown(&mut self) -> Result<(), NodeError> {
        let shutdown = self.shutdown.clone();
        let outcome = tokio::select! {
            _ = shutdown.wait_for_signal() => Ok(()),
            failure = self.wait_for_failure() => Err(failure),
        };
        self.stop().await?;
        outcome
    }

    /// Wait until some loop returns an error or panics.
    pub async fn wait_for_failure(&mut self) -> NodeError {
        loop {
            match self.tasks.join_next().await {
                Some(Ok((task, Ok(())))) => info!(task, "task finished"),
                Some(Ok((task, Err(e)))) => {
                    error!(task, error = %e, "task failed");
                    return e;
                }
                Some(Err(e)) => {
                    error!(error = %e, "task panicked");
                    return NodeError::TaskFailed {
                        task: "unknown".into(),
                        reason: e.to_string(),
                    };
                }
                None => std::future::pending::<()>().await,
            }
        }
    }

    /// Signal every loop to stop and wait for them, up to the configured
    /// shutdown timeout.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        info!("BRVS stopping");
        self.shutdown.trigger();

        let timeout = self.config.shutdown_timeout();
        let tasks = &mut self.tasks;
        let wait_all = async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((_, Ok(()))) => {}
                    Ok((task, Err(e))) => warn!(task, error = %e, "task ended with error"),
                    Err(e) => warn!(error = %e, "task panicked"),
                }
            }
        };
        if tokio::time::timeout(timeout, wait_all).await.is_err() {
            warn!(?timeout, "shutdown timeout, aborting remaining tasks");
            self.tasks.abort_all();
            return Err(NodeError::ShutdownTimeout);
        }
        info!("BRVS stopped");
        Ok(())
    }
}
