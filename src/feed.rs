//! External market-data feed client.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{LedgerError, Result};

/// Market-data document for the base asset.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedDocument {
    pub market_data: MarketData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketData {
    /// Current price keyed by lowercase fiat/asset symbol.
    pub current_price: HashMap<String, f64>,
}

/// HTTP client for the reference price feed.
pub struct PriceFeed {
    client: reqwest::Client,
    url: String,
}

impl PriceFeed {
    /// Per-request timeout for individual feed calls.
    const REQUEST_TIMEOUT_SECS: u64 = 10;

    pub fn new(url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LedgerError::Feed(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Fetch the current market-data document for the base asset.
    pub async fn fetch(&self) -> Result<FeedDocument> {
        let response = tokio::time::timeout(
            Duration::from_secs(Self::REQUEST_TIMEOUT_SECS),
            self.client.get(&self.url).send(),
        )
        .await
        .map_err(|_| LedgerError::Timeout(Self::REQUEST_TIMEOUT_SECS))?
        .map_err(|e| LedgerError::Feed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LedgerError::Feed(format!(
                "feed returned {}: {}",
                status, text
            )));
        }

        response
            .json::<FeedDocument>()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))
    }
}
