//! Trust-line stream handling and the welcome-distribution flow.
//!
//! Every streamed transaction on the agent's account passes through here.
//! A successful trust-set that creates a new credit line toward the agent
//! earns the counterparty a rate-sized token transfer; a currency with no
//! known rate gets one on-demand resolution attempt and then a polite
//! on-ledger notice.

use serde_json::Value;
use tracing::{error, info, warn};

use crate::amount::normalize_balance;
use crate::currency::normalize_currency_code;
use crate::oracle::RateOracle;
use crate::rates::RateTable;
use crate::reconciler::OfferReconciler;
use crate::submitter::OrderSubmitter;
use crate::types::TrustlineCreationEvent;

/// Fraction of the quote notional used to size the welcome transfer.
const REWARD_FRACTION: f64 = 0.01;

/// Amount of the issued currency carried by the unsupported-currency notice.
const NOTICE_AMOUNT: &str = "0.000001";

/// Reacts to newly created trust lines on the agent's account.
pub struct TrustlineWatcher {
    submitter: OrderSubmitter,
    rates: RateTable,
    account: String,
    wall_amount_xrp: f64,
}

impl TrustlineWatcher {
    pub fn new(
        submitter: OrderSubmitter,
        rates: RateTable,
        account: &str,
        wall_amount_xrp: f64,
    ) -> Self {
        Self {
            submitter,
            rates,
            account: account.to_string(),
            wall_amount_xrp,
        }
    }

    /// Handle one streamed transaction touching the agent's account.
    ///
    /// Never propagates an error: a failure in here must not take down the
    /// stream subscription.
    pub async fn handle_transaction(
        &self,
        event: &Value,
        oracle: &mut RateOracle,
        reconciler: &OfferReconciler,
    ) {
        if let Err(e) = self.process(event, oracle, reconciler).await {
            error!("error handling streamed transaction: {}", e);
        }
    }

    async fn process(
        &self,
        event: &Value,
        oracle: &mut RateOracle,
        reconciler: &OfferReconciler,
    ) -> anyhow::Result<()> {
        if event.get("engine_result").and_then(Value::as_str) != Some("tesSUCCESS") {
            return Ok(());
        }
        let tx_type = event
            .get("transaction")
            .and_then(|tx| tx.get("TransactionType"))
            .and_then(Value::as_str);
        if tx_type != Some("TrustSet") {
            return Ok(());
        }

        let Some(created) = extract_trustline_creation(event, &self.account) else {
            return Ok(());
        };
        info!(
            "new trust line: {} from {} (limit {})",
            created.currency, created.counterparty, created.limit
        );

        let rate = match self.rates.get(&created.currency).await {
            Some(rate) => Some(rate),
            None => {
                self.resolve_unknown(&created.currency, oracle, reconciler)
                    .await
            }
        };

        match rate {
            Some(rate) => self.send_reward(&created, rate).await,
            None => self.send_unsupported_notice(&created).await,
        }
        Ok(())
    }

    /// Register the currency and run one synchronous refresh-and-reconcile
    /// pass, in case the feed can resolve it on demand.
    async fn resolve_unknown(
        &self,
        currency: &str,
        oracle: &mut RateOracle,
        reconciler: &OfferReconciler,
    ) -> Option<f64> {
        if oracle.register_currency(currency) {
            info!("registered {} from an incoming trust line", currency);
        }
        oracle.refresh().await;
        if let Err(e) = reconciler.reconcile().await {
            warn!("inline reconcile pass failed: {}", e);
        }
        self.rates.get(currency).await
    }

    async fn send_reward(&self, created: &TrustlineCreationEvent, rate: f64) {
        let amount = reward_amount(self.wall_amount_xrp, rate, created.limit);
        if amount <= 0.0 {
            info!(
                "no transfer for {} (declared limit {})",
                created.counterparty, created.limit
            );
            return;
        }

        let value = normalize_balance(amount);
        info!(
            "sending {} {} to {}",
            value, created.currency, created.counterparty
        );
        self.submitter.pace().await;
        let tx = self
            .submitter
            .payment(&created.counterparty, &created.currency, &value, None);
        self.submitter.submit(tx).await.ok();
    }

    async fn send_unsupported_notice(&self, created: &TrustlineCreationEvent) {
        let display = display_name(&created.currency);
        let text = format!(
            "{} is not yet supported by the rate oracle, so no starter balance could be sent.",
            display
        );
        info!("notifying {}: {}", created.counterparty, text);

        self.submitter.pace().await;
        let tx = self.submitter.payment(
            &created.counterparty,
            &created.currency,
            NOTICE_AMOUNT,
            Some(&text),
        );
        self.submitter.submit(tx).await.ok();
    }
}

/// Welcome transfer size: a fixed fraction of the quote notional at the
/// current rate, capped at half the declared trust limit. A non-positive
/// limit earns nothing.
pub fn reward_amount(wall_amount_xrp: f64, rate: f64, trust_limit: f64) -> f64 {
    if trust_limit <= 0.0 {
        return 0.0;
    }
    let target = wall_amount_xrp * REWARD_FRACTION * rate;
    target.min(trust_limit / 2.0)
}

/// Human-readable name for a raw currency code, keeping the raw form
/// alongside when the normalized symbol differs.
fn display_name(raw: &str) -> String {
    let normalized = normalize_currency_code(raw);
    if normalized != raw {
        format!("{} ({})", normalized, raw)
    } else {
        raw.to_string()
    }
}

/// Pull a newly created trust-line entry out of a streamed transaction's
/// effect list. Returns the first creation whose far side is not `account`.
pub fn extract_trustline_creation(event: &Value, account: &str) -> Option<TrustlineCreationEvent> {
    let nodes = event.get("meta")?.get("AffectedNodes")?.as_array()?;

    for node in nodes {
        let Some(created) = node.get("CreatedNode") else {
            continue;
        };
        if created.get("LedgerEntryType").and_then(Value::as_str) != Some("RippleState") {
            continue;
        }
        let Some(fields) = created.get("NewFields") else {
            continue;
        };
        let Some(currency) = fields
            .get("Balance")
            .and_then(|balance| balance.get("currency"))
            .and_then(Value::as_str)
        else {
            continue;
        };

        let high = limit_side(fields.get("HighLimit"));
        let low = limit_side(fields.get("LowLimit"));

        // The counterparty is whichever side of the new entry is not the
        // agent; its limit value is the one that caps the welcome transfer.
        let (counterparty, limit) = match (high, low) {
            (Some((issuer, value)), _) if issuer != account => (issuer, value),
            (_, Some((issuer, value))) if issuer != account => (issuer, value),
            _ => continue,
        };

        return Some(TrustlineCreationEvent {
            currency: currency.to_string(),
            counterparty,
            limit,
        });
    }

    None
}

fn limit_side(limit: Option<&Value>) -> Option<(String, f64)> {
    let limit = limit?;
    let issuer = limit.get("issuer")?.as_str()?;
    let value = limit.get("value")?.as_str()?.parse::<f64>().ok()?;
    Some((issuer.to_string(), value))
}
