//! Process-wide latest-rate table.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Shared mapping from currency symbol to its latest oracle rate, expressed
/// as currency units per one unit of the base asset.
///
/// Written by the rate oracle only; readers must tolerate an empty or
/// partially refreshed table. Entries persist until overwritten by a later
/// refresh. A currency absent from the table is never quoted.
#[derive(Clone, Default)]
pub struct RateTable {
    inner: Arc<RwLock<HashMap<String, f64>>>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest rate for a currency.
    ///
    /// Rates must be strictly positive; anything else is dropped so readers
    /// never see a rate they cannot quote against.
    pub async fn set(&self, currency: &str, rate: f64) {
        if !rate.is_finite() || rate <= 0.0 {
            debug!("ignoring non-positive rate {} for {}", rate, currency);
            return;
        }
        self.inner.write().await.insert(currency.to_string(), rate);
    }

    pub async fn get(&self, currency: &str) -> Option<f64> {
        self.inner.read().await.get(currency).copied()
    }

    pub async fn contains(&self, currency: &str) -> bool {
        self.inner.read().await.contains_key(currency)
    }

    /// Snapshot of every quoted currency and its rate.
    pub async fn snapshot(&self) -> Vec<(String, f64)> {
        self.inner
            .read()
            .await
            .iter()
            .map(|(currency, rate)| (currency.clone(), *rate))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_overwrites_and_get_reads_back() {
        let table = RateTable::new();
        table.set("USD", 0.5).await;
        table.set("USD", 0.6).await;
        assert_eq!(table.get("USD").await, Some(0.6));
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn non_positive_rates_are_rejected() {
        let table = RateTable::new();
        table.set("USD", 0.0).await;
        table.set("EUR", -1.0).await;
        table.set("BTC", f64::NAN).await;
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn snapshot_reflects_all_entries() {
        let table = RateTable::new();
        table.set("USD", 0.6).await;
        table.set("BTC", 0.00001).await;
        let mut snapshot = table.snapshot().await;
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            snapshot,
            vec![("BTC".to_string(), 0.00001), ("USD".to_string(), 0.6)]
        );
    }
}
