//! One-shot maintenance operations.
//!
//! Thin wrappers over the same client and submitter the engine uses, picked
//! by the CLI mode argument. No decision logic lives here.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::interval;
use tracing::{info, warn};

use crate::amount::drops_to_xrp;
use crate::config::Config;
use crate::ledger::{LedgerApi, LedgerClient};
use crate::submitter::OrderSubmitter;

/// `asfDefaultRipple` account flag.
const ASF_DEFAULT_RIPPLE: u32 = 8;

/// Balance floor for the refill watchdog, in XRP.
const REFILL_THRESHOLD_XRP: f64 = 1_000_000.0;

const REFILL_INTERVAL_SECS: u64 = 10;

fn submitter_for(config: &Config, ledger: Arc<LedgerClient>) -> OrderSubmitter {
    OrderSubmitter::new(
        ledger as Arc<dyn LedgerApi>,
        &config.account_address,
        &config.account_seed,
        config.network_id,
        Duration::from_millis(config.pacing_delay_ms),
    )
}

/// Enable rippling on the issuing account so issued tokens can move between
/// holders. Run once before the agent goes live.
pub async fn initial_setup(config: &Config) -> anyhow::Result<()> {
    let ledger = Arc::new(LedgerClient::connect(&config.ledger_urls).await?);
    let submitter = submitter_for(config, Arc::clone(&ledger));

    let tx = submitter.account_set(ASF_DEFAULT_RIPPLE);
    let outcome = submitter.submit(tx).await?;
    info!("account flags set: {}", outcome.engine_result);
    Ok(())
}

/// Cancel every resting offer on the agent account, one paced cancel at a
/// time.
pub async fn clear_offers(config: &Config) -> anyhow::Result<()> {
    let ledger = Arc::new(LedgerClient::connect(&config.ledger_urls).await?);
    let submitter = submitter_for(config, Arc::clone(&ledger));

    let offers = ledger.account_offers(&config.account_address).await?;
    info!("cancelling {} resting offers", offers.len());

    for offer in offers {
        submitter.pace().await;
        let tx = submitter.offer_cancel(offer.seq);
        submitter.submit(tx).await.ok();
    }

    info!("done");
    Ok(())
}

/// Balance watchdog: top the account up from the test-network faucet when
/// the XRP balance falls below the floor. Runs until killed.
pub async fn refill_loop(config: &Config) -> anyhow::Result<()> {
    let ledger = Arc::new(LedgerClient::connect(&config.ledger_urls).await?);
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    info!("refill watchdog started");
    let mut ticker = interval(Duration::from_secs(REFILL_INTERVAL_SECS));

    loop {
        ticker.tick().await;

        if !ledger.is_connected().await {
            // Crash-only: let the supervisor bring us back with a fresh
            // connection.
            return Err(anyhow::anyhow!("ledger connection lost"));
        }

        let balance = match ledger.account_balance_drops(&config.account_address).await {
            Ok(drops) => drops_to_xrp(&drops),
            Err(e) => {
                warn!("balance query failed: {}", e);
                continue;
            }
        };

        let Some(balance) = balance else {
            warn!("balance response was not a drops amount");
            continue;
        };

        if balance >= REFILL_THRESHOLD_XRP {
            continue;
        }

        info!("low account balance ({} XRP), requesting refill", balance);
        let response = http
            .post(&config.faucet_url)
            .json(&json!({ "destination": config.account_address }))
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                info!("faucet accepted the refill request");
            }
            Ok(response) => {
                warn!("faucet returned {}", response.status());
            }
            Err(e) => {
                warn!("faucet request failed: {}", e);
            }
        }
    }
}
