//! Main orchestration loop.
//!
//! Two periodic cadences (oracle refresh, offer reconciliation) and the
//! account transaction stream are multiplexed through one select loop, so
//! cycles are serialized: a slow cycle swallows its overdue firings instead
//! of overlapping with them.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::config::{Config, SupportedCurrencies};
use crate::feed::PriceFeed;
use crate::ledger::LedgerClient;
use crate::oracle::RateOracle;
use crate::rates::RateTable;
use crate::reconciler::{OfferReconciler, QuotePolicy};
use crate::submitter::OrderSubmitter;
use crate::watcher::TrustlineWatcher;

pub struct Runner {
    config: Config,
    ledger: Arc<LedgerClient>,
    oracle: RateOracle,
    reconciler: OfferReconciler,
    watcher: TrustlineWatcher,
}

impl Runner {
    /// Connect both networks and wire the engine together.
    ///
    /// A connection that cannot be established here is fatal: the error
    /// propagates out of `main` and the supervisor restarts the process.
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let ledger = Arc::new(LedgerClient::connect(&config.ledger_urls).await?);
        let reference =
            Arc::new(LedgerClient::connect(std::slice::from_ref(&config.rate_source_url)).await?);

        let supported = SupportedCurrencies::load(&config.supported_path);
        info!(
            "tracking {} supported currencies from {}",
            supported.supported.len(),
            config.supported_path.display()
        );

        let rates = RateTable::new();
        let feed = PriceFeed::new(&config.feed_url)?;

        let policy = QuotePolicy {
            wall_amount_xrp: config.wall_amount_xrp,
            tolerance_overrides: supported.tolerance_overrides.clone(),
            ..QuotePolicy::default()
        };

        let oracle = RateOracle::new(
            rates.clone(),
            reference,
            feed,
            &config.rate_account,
            supported,
            config.supported_path.clone(),
        );

        let submitter = OrderSubmitter::new(
            Arc::clone(&ledger) as Arc<dyn crate::ledger::LedgerApi>,
            &config.account_address,
            &config.account_seed,
            config.network_id,
            Duration::from_millis(config.pacing_delay_ms),
        );

        let reconciler = OfferReconciler::new(
            Arc::clone(&ledger) as Arc<dyn crate::ledger::LedgerApi>,
            submitter.clone(),
            rates.clone(),
            &config.account_address,
            policy,
        );

        let watcher = TrustlineWatcher::new(
            submitter,
            rates,
            &config.account_address,
            config.wall_amount_xrp,
        );

        Ok(Self {
            config,
            ledger,
            oracle,
            reconciler,
            watcher,
        })
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        // Prime the table and the book before going event-driven.
        self.oracle.refresh().await;
        if let Err(e) = self.reconciler.reconcile().await {
            error!("initial reconciliation failed: {}", e);
        }

        self.ledger
            .subscribe(std::slice::from_ref(&self.config.account_address))
            .await?;
        info!("watching the ledger for offers and trust lines");

        let oracle_period = Duration::from_secs(self.config.oracle_interval_secs);
        let mut oracle_interval = interval_at(Instant::now() + oracle_period, oracle_period);
        oracle_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let reconcile_period = Duration::from_secs(self.config.reconcile_interval_secs);
        let mut reconcile_interval =
            interval_at(Instant::now() + reconcile_period / 2, reconcile_period);
        reconcile_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = oracle_interval.tick() => {
                    self.oracle.refresh().await;
                }
                _ = reconcile_interval.tick() => {
                    if let Err(e) = self.reconciler.reconcile().await {
                        error!("reconciliation cycle failed: {}", e);
                    }
                }
                event = self.ledger.next_transaction() => {
                    match event {
                        Some(event) => {
                            self.watcher
                                .handle_transaction(&event, &mut self.oracle, &self.reconciler)
                                .await;
                        }
                        None => {
                            // Crash-only: connectivity loss is the
                            // supervisor's problem, not ours.
                            error!("ledger transaction stream closed");
                            return Err(anyhow::anyhow!("ledger connection lost"));
                        }
                    }
                }
            }
        }
    }
}
