//! Offer reconciliation.
//!
//! Each cycle compares the resting offers on the ledger against the latest
//! oracle rates and refreshes, replaces or cancels so that every quoted
//! currency ends up with exactly one sell wall and one buy wall near fair
//! value. Replacement reuses an existing offer's sequence number so the
//! ledger performs an atomic cancel-and-recreate.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::amount::{drops_to_xrp, DROPS_PER_XRP};
use crate::ledger::LedgerApi;
use crate::rates::RateTable;
use crate::submitter::OrderSubmitter;
use crate::types::AccountOffer;

/// Quoting policy for the reconciliation cycle.
#[derive(Debug, Clone)]
pub struct QuotePolicy {
    /// Notional of each resting wall, in XRP.
    pub wall_amount_xrp: f64,
    /// Half-spread applied around the oracle rate.
    pub spread: f64,
    /// Default deviation band, in percent.
    pub tolerance_pct: f64,
    /// Per-currency bands that widen the default.
    pub tolerance_overrides: HashMap<String, f64>,
}

impl Default for QuotePolicy {
    fn default() -> Self {
        Self {
            wall_amount_xrp: 100_000.0,
            spread: 0.005,
            tolerance_pct: 2.0,
            tolerance_overrides: HashMap::new(),
        }
    }
}

impl QuotePolicy {
    fn tolerance_for(&self, currency: &str) -> f64 {
        self.tolerance_overrides
            .get(currency)
            .copied()
            .unwrap_or(self.tolerance_pct)
    }
}

/// Per-currency outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileDecision {
    pub refresh_sell: bool,
    pub refresh_buy: bool,
    /// Sequence to reuse for the new sell offer, consumed from the removal
    /// candidates so it is never cancelled separately.
    pub sell_replace: Option<u32>,
    pub buy_replace: Option<u32>,
    /// Leftover duplicates to cancel, in ledger order.
    pub extra_sell_cancels: Vec<u32>,
    pub extra_buy_cancels: Vec<u32>,
}

impl ReconcileDecision {
    pub fn is_noop(&self) -> bool {
        !self.refresh_sell && !self.refresh_buy
    }
}

/// Effective quality of a resting offer in XRP per currency unit, derived
/// from the ledger's drops-denominated quality field.
fn offer_quality(offer: &AccountOffer) -> Option<f64> {
    offer
        .quality
        .parse::<f64>()
        .ok()
        .map(|q| q / DROPS_PER_XRP as f64)
}

/// Classify the resting offers for one currency against the oracle rate and
/// decide what to refresh, replace or cancel.
///
/// An offer matching neither the sell shape nor the buy shape for this
/// currency is ignored. The first duplicate in ledger order becomes the
/// replace target for its side; the rest become explicit cancels.
pub fn decide_for_currency(
    currency: &str,
    rate: f64,
    offers: &[AccountOffer],
    policy: &QuotePolicy,
) -> ReconcileDecision {
    let mut sell_seqs: Vec<u32> = Vec::new();
    let mut buy_seqs: Vec<u32> = Vec::new();
    let mut sell_within_band = false;
    let mut low_depth = false;

    let target_quality = 1.0 / rate;
    let tolerance = policy.tolerance_for(currency);
    let min_depth_xrp = policy.wall_amount_xrp / 2.0;

    for offer in offers {
        // Sell shape: the offer gives the issued currency and receives XRP.
        if let (Some(gets), Some(pays)) = (offer.taker_gets.as_issued(), offer.taker_pays.as_drops())
        {
            if gets.currency == currency {
                sell_seqs.push(offer.seq);

                if let Some(quality) = offer_quality(offer) {
                    let deviation = (quality * 100.0 / target_quality - 100.0).abs();
                    if deviation <= tolerance {
                        sell_within_band = true;
                    } else {
                        debug!(
                            "{}: sell offer {} deviates {:.2}% from target",
                            currency, offer.seq, deviation
                        );
                    }
                }

                match drops_to_xrp(pays) {
                    Some(xrp) if xrp < min_depth_xrp => {
                        info!("{}: sell depth down to {} XRP", currency, xrp);
                        low_depth = true;
                    }
                    Some(_) => {}
                    None => warn!("{}: sell offer {} has malformed drops", currency, offer.seq),
                }
            }
        }

        // Buy shape: the offer gives XRP and receives the issued currency.
        // Only depth is evaluated on this side.
        if let (Some(pays), Some(gets)) = (offer.taker_pays.as_issued(), offer.taker_gets.as_drops())
        {
            if pays.currency == currency {
                buy_seqs.push(offer.seq);

                match drops_to_xrp(gets) {
                    Some(xrp) if xrp < min_depth_xrp => {
                        info!("{}: buy depth down to {} XRP", currency, xrp);
                        low_depth = true;
                    }
                    Some(_) => {}
                    None => warn!("{}: buy offer {} has malformed drops", currency, offer.seq),
                }
            }
        }
    }

    let refresh = sell_seqs.is_empty()
        || buy_seqs.is_empty()
        || !sell_within_band
        || sell_seqs.len() > 1
        || buy_seqs.len() > 1
        || low_depth;

    if !refresh {
        return ReconcileDecision::default();
    }

    let mut sells = sell_seqs.into_iter();
    let mut buys = buy_seqs.into_iter();
    ReconcileDecision {
        refresh_sell: true,
        refresh_buy: true,
        sell_replace: sells.next(),
        buy_replace: buys.next(),
        extra_sell_cancels: sells.collect(),
        extra_buy_cancels: buys.collect(),
    }
}

/// Drives one reconciliation pass per cycle.
pub struct OfferReconciler {
    ledger: Arc<dyn LedgerApi>,
    submitter: OrderSubmitter,
    rates: RateTable,
    account: String,
    policy: QuotePolicy,
}

impl OfferReconciler {
    pub fn new(
        ledger: Arc<dyn LedgerApi>,
        submitter: OrderSubmitter,
        rates: RateTable,
        account: &str,
        policy: QuotePolicy,
    ) -> Self {
        Self {
            ledger,
            submitter,
            rates,
            account: account.to_string(),
            policy,
        }
    }

    /// Run one pass over every quoted currency.
    ///
    /// The offer list is queried fresh; per-currency failures are logged
    /// and the pass continues with the next currency.
    pub async fn reconcile(&self) -> anyhow::Result<()> {
        let offers = self.ledger.account_offers(&self.account).await?;
        let rates = self.rates.snapshot().await;
        debug!(
            "reconciling {} currencies against {} resting offers",
            rates.len(),
            offers.len()
        );

        for (currency, rate) in rates {
            if let Err(e) = self.reconcile_currency(&currency, rate, &offers).await {
                warn!("reconciliation for {} failed: {}", currency, e);
            }
        }
        Ok(())
    }

    async fn reconcile_currency(
        &self,
        currency: &str,
        rate: f64,
        offers: &[AccountOffer],
    ) -> anyhow::Result<()> {
        let decision = decide_for_currency(currency, rate, offers, &self.policy);
        if decision.is_noop() {
            return Ok(());
        }

        info!("refreshing offers for {} at rate {}", currency, rate);

        if decision.refresh_sell {
            self.submitter.pace().await;
            let tx = self.submitter.sell_offer(
                currency,
                rate * (1.0 - self.policy.spread),
                self.policy.wall_amount_xrp,
                decision.sell_replace,
            )?;
            self.submitter.submit(tx).await.ok();
        }

        if decision.refresh_buy {
            self.submitter.pace().await;
            let tx = self.submitter.buy_offer(
                currency,
                rate * (1.0 + self.policy.spread),
                self.policy.wall_amount_xrp,
                decision.buy_replace,
            )?;
            self.submitter.submit(tx).await.ok();
        }

        for sequence in decision
            .extra_sell_cancels
            .iter()
            .chain(decision.extra_buy_cancels.iter())
        {
            self.submitter.pace().await;
            let tx = self.submitter.offer_cancel(*sequence);
            self.submitter.submit(tx).await.ok();
        }

        Ok(())
    }
}
