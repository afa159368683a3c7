//! Runtime configuration: environment parameters and the persisted
//! supported-currency file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Well-known reference account whose trust-line limits seed the rate table.
pub const DEFAULT_RATE_ACCOUNT: &str = "rpXCfDds782Bd6eK9Hsn15RDnGMtxf752m";

const DEFAULT_LEDGER_URLS: &str =
    "ws://127.0.0.1:6006,wss://testnet.xrpl-labs.com,wss://s.altnet.rippletest.net:51233";
const DEFAULT_RATE_SOURCE_URL: &str = "wss://xrplcluster.com";
const DEFAULT_FEED_URL: &str = "https://api.coingecko.com/api/v3/coins/ripple?localization=false&tickers=false&market_data=true&community_data=false&developer_data=false&sparkline=false";
const DEFAULT_FAUCET_URL: &str = "https://faucet.altnet.rippletest.net/accounts";

/// Configuration loaded from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Classic address of the agent account.
    pub account_address: String,
    /// Seed used by the node's sign-and-submit interface.
    pub account_seed: String,
    /// WebSocket endpoints for the agent's network, tried in order.
    pub ledger_urls: Vec<String>,
    /// WebSocket endpoint of the network carrying the reference account.
    pub rate_source_url: String,
    /// Market-data feed endpoint.
    pub feed_url: String,
    /// Test-network faucet endpoint for the refill watchdog.
    pub faucet_url: String,
    /// Reference account whose trust-line limits seed the rate table.
    pub rate_account: String,
    /// Network identifier tag attached to every transaction when present.
    pub network_id: Option<u32>,
    /// Path of the persisted supported-currency file.
    pub supported_path: PathBuf,
    /// Notional of each resting wall, in XRP.
    pub wall_amount_xrp: f64,
    pub oracle_interval_secs: u64,
    pub reconcile_interval_secs: u64,
    /// Fixed delay before each ledger-mutating call, in milliseconds.
    pub pacing_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let account_address = std::env::var("ACCOUNT_ADDRESS")
            .map_err(|_| anyhow::anyhow!("ACCOUNT_ADDRESS environment variable required"))?;
        let account_seed = std::env::var("ACCOUNT_SEED")
            .map_err(|_| anyhow::anyhow!("ACCOUNT_SEED environment variable required"))?;

        let ledger_urls = std::env::var("LEDGER_URLS")
            .unwrap_or_else(|_| DEFAULT_LEDGER_URLS.to_string())
            .split(',')
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect::<Vec<_>>();
        if ledger_urls.is_empty() {
            return Err(anyhow::anyhow!("LEDGER_URLS must name at least one endpoint"));
        }

        let network_id = match std::env::var("NETWORK_ID") {
            Ok(raw) => Some(
                raw.parse::<u32>()
                    .map_err(|e| anyhow::anyhow!("invalid NETWORK_ID {:?}: {}", raw, e))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            account_address,
            account_seed,
            ledger_urls,
            rate_source_url: std::env::var("RATE_SOURCE_URL")
                .unwrap_or_else(|_| DEFAULT_RATE_SOURCE_URL.to_string()),
            feed_url: std::env::var("FEED_URL").unwrap_or_else(|_| DEFAULT_FEED_URL.to_string()),
            faucet_url: std::env::var("FAUCET_URL")
                .unwrap_or_else(|_| DEFAULT_FAUCET_URL.to_string()),
            rate_account: std::env::var("RATE_ACCOUNT")
                .unwrap_or_else(|_| DEFAULT_RATE_ACCOUNT.to_string()),
            network_id,
            supported_path: std::env::var("SUPPORTED_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("supported.json")),
            wall_amount_xrp: env_f64("WALL_AMOUNT_XRP", 100_000.0)?,
            oracle_interval_secs: env_u64("ORACLE_INTERVAL_SECS", 60)?,
            reconcile_interval_secs: env_u64("RECONCILE_INTERVAL_SECS", 60)?,
            pacing_delay_ms: env_u64("PACING_DELAY_MS", 500)?,
        })
    }
}

fn env_f64(name: &str, default: f64) -> anyhow::Result<f64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<f64>()
            .map_err(|e| anyhow::anyhow!("invalid {} {:?}: {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

fn env_u64(name: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|e| anyhow::anyhow!("invalid {} {:?}: {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

/// Persisted supported-currency set.
///
/// Rewritten whenever the effective set changes: it shrinks when feed
/// lookups stop resolving a symbol and grows when an unsupported currency
/// arrives on a new trust line. `tolerance_overrides` widens the deviation
/// band for individual currencies and rides along unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupportedCurrencies {
    pub supported: Vec<String>,
    #[serde(default)]
    pub tolerance_overrides: HashMap<String, f64>,
}

impl SupportedCurrencies {
    /// Load the file, falling back to an empty set when it is missing or
    /// unreadable. A corrupt file is logged, not fatal.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("could not parse {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn store(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn contains(&self, currency: &str) -> bool {
        self.supported.iter().any(|c| c == currency)
    }

    /// Add a currency; returns false when it was already tracked.
    pub fn add(&mut self, currency: &str) -> bool {
        if self.contains(currency) {
            return false;
        }
        self.supported.push(currency.to_string());
        true
    }

    /// Shrink the set to the symbols that resolved this cycle.
    ///
    /// Returns true when the set actually shrank and should be persisted.
    pub fn retain_resolved(&mut self, resolved: &[String]) -> bool {
        let before = self.supported.len();
        self.supported.retain(|c| resolved.contains(c));
        self.supported.len() < before
    }
}
