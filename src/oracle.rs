//! Rate aggregation from the on-ledger reference account and the external
//! price feed.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::SupportedCurrencies;
use crate::currency::normalize_currency_code;
use crate::feed::PriceFeed;
use crate::ledger::LedgerApi;
use crate::rates::RateTable;

/// Merges two rate sources into the shared [`RateTable`].
///
/// Source A reads the reference account's trust-line limits; Source B reads
/// the external market-data feed for the configured supported currencies.
/// Each source fails independently: a dead feed never blocks the on-ledger
/// snapshot and vice versa.
pub struct RateOracle {
    rates: RateTable,
    reference: Arc<dyn LedgerApi>,
    feed: PriceFeed,
    rate_account: String,
    supported: SupportedCurrencies,
    supported_path: PathBuf,
}

impl RateOracle {
    pub fn new(
        rates: RateTable,
        reference: Arc<dyn LedgerApi>,
        feed: PriceFeed,
        rate_account: &str,
        supported: SupportedCurrencies,
        supported_path: PathBuf,
    ) -> Self {
        Self {
            rates,
            reference,
            feed,
            rate_account: rate_account.to_string(),
            supported,
            supported_path,
        }
    }

    /// Handle to the table this oracle writes.
    pub fn rates(&self) -> RateTable {
        self.rates.clone()
    }

    pub fn supported(&self) -> &SupportedCurrencies {
        &self.supported
    }

    /// Refresh both sources. Failures are logged at the source boundary and
    /// leave the previous entries in place.
    pub async fn refresh(&mut self) {
        self.refresh_reference_lines().await;
        self.refresh_feed().await;
    }

    /// Source A: every trust line on the reference account contributes the
    /// absolute value of its declared limit as the currency's rate.
    async fn refresh_reference_lines(&self) {
        let lines = match self.reference.account_lines(&self.rate_account).await {
            Ok(lines) => lines,
            Err(e) => {
                warn!("reference trust-line query failed: {}", e);
                return;
            }
        };

        let mut updated = 0usize;
        for line in &lines {
            let Ok(limit) = line.limit.parse::<f64>() else {
                warn!(
                    "reference line for {} has unparseable limit {:?}",
                    line.currency, line.limit
                );
                continue;
            };
            self.rates.set(&line.currency, limit.abs()).await;
            updated += 1;
        }
        debug!("reference account contributed {} rates", updated);
    }

    /// Source B: look up each supported symbol in the feed document, keyed
    /// by its normalized lowercase form, and store the price under the raw
    /// symbol. Symbols that stop resolving prune themselves from the
    /// persisted supported set.
    async fn refresh_feed(&mut self) {
        let document = match self.feed.fetch().await {
            Ok(document) => document,
            Err(e) => {
                warn!("price feed fetch failed: {}", e);
                return;
            }
        };

        let mut resolved = Vec::new();
        for symbol in self.supported.supported.clone() {
            let normalized = normalize_currency_code(&symbol);
            match document
                .market_data
                .current_price
                .get(&normalized.to_lowercase())
            {
                Some(price) => {
                    self.rates.set(&symbol, *price).await;
                    resolved.push(symbol);
                }
                None => debug!("feed has no price for {} ({})", symbol, normalized),
            }
        }

        if self.supported.retain_resolved(&resolved) {
            info!(
                "supported set shrank to {} currencies",
                self.supported.supported.len()
            );
            self.persist_supported();
        }
    }

    /// Track a currency seen on a new trust line so the next feed pass can
    /// try to resolve it. Returns false when it was already tracked.
    pub fn register_currency(&mut self, currency: &str) -> bool {
        if !self.supported.add(currency) {
            return false;
        }
        self.persist_supported();
        true
    }

    fn persist_supported(&self) {
        if let Err(e) = self.supported.store(&self.supported_path) {
            warn!(
                "could not persist supported currencies to {}: {}",
                self.supported_path.display(),
                e
            );
        }
    }
}
