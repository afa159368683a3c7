//! Liquidity runner entry point.
//!
//! Modes:
//! - `run` (default): the full agent loop — rate oracle, offer
//!   reconciliation and the trust-line stream.
//! - `setup`: one-shot account flag initialization.
//! - `clear-offers`: cancel every resting offer, then exit.
//! - `refill`: test-network balance watchdog.

use tracing::info;

use liquidity_runner::{ops, Config, Runner};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = Config::from_env()?;
    info!(
        "agent account {} on {}",
        config.account_address, config.ledger_urls[0]
    );

    let mode = std::env::args().nth(1).unwrap_or_else(|| "run".to_string());
    match mode.as_str() {
        "run" => {
            let runner = Runner::start(config).await?;
            runner.run().await
        }
        "setup" => ops::initial_setup(&config).await,
        "clear-offers" => ops::clear_offers(&config).await,
        "refill" => ops::refill_loop(&config).await,
        other => Err(anyhow::anyhow!(
            "unknown mode {:?} (expected run, setup, clear-offers or refill)",
            other
        )),
    }
}
