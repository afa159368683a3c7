//! Scripted ledger double shared by the integration tests.

// Each test binary uses its own subset of these helpers.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use liquidity_runner::types::{LedgerError, Result};
use liquidity_runner::{
    AccountOffer, IssuedAmount, LedgerApi, OfferAmount, OfferReconciler, OrderSubmitter,
    QuotePolicy, RateTable, SubmitOutcome, TrustLine,
};

/// In-memory ledger that serves scripted snapshots and records every
/// submitted transaction.
#[derive(Default)]
pub struct MockLedger {
    pub offers: Mutex<Vec<AccountOffer>>,
    pub lines: Mutex<Vec<TrustLine>>,
    pub submissions: Mutex<Vec<Value>>,
    /// Engine results handed to successive submissions; once exhausted,
    /// everything succeeds.
    pub outcomes: Mutex<VecDeque<String>>,
    pub fail_lines: Mutex<bool>,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_offers(&self, offers: Vec<AccountOffer>) {
        *self.offers.lock().unwrap() = offers;
    }

    pub fn set_lines(&self, lines: Vec<TrustLine>) {
        *self.lines.lock().unwrap() = lines;
    }

    pub fn fail_lines(&self) {
        *self.fail_lines.lock().unwrap() = true;
    }

    /// Queue an engine result for the next submission.
    pub fn script_outcome(&self, engine_result: &str) {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(engine_result.to_string());
    }

    pub fn submissions(&self) -> Vec<Value> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerApi for MockLedger {
    async fn account_lines(&self, _account: &str) -> Result<Vec<TrustLine>> {
        if *self.fail_lines.lock().unwrap() {
            return Err(LedgerError::Transport("scripted failure".to_string()));
        }
        Ok(self.lines.lock().unwrap().clone())
    }

    async fn account_offers(&self, _account: &str) -> Result<Vec<AccountOffer>> {
        Ok(self.offers.lock().unwrap().clone())
    }

    async fn submit(&self, tx_json: Value, _secret: &str) -> Result<SubmitOutcome> {
        self.submissions.lock().unwrap().push(tx_json);
        let engine_result = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "tesSUCCESS".to_string());
        Ok(SubmitOutcome {
            engine_result,
            engine_result_message: String::new(),
            tx_json: Value::Null,
        })
    }
}

pub const AGENT: &str = "rAgentAccount";

pub fn trust_line(currency: &str, limit: &str) -> TrustLine {
    TrustLine {
        account: "rReference".to_string(),
        currency: currency.to_string(),
        limit: limit.to_string(),
        balance: "0".to_string(),
    }
}

pub fn issued(currency: &str, value: &str) -> OfferAmount {
    OfferAmount::Issued(IssuedAmount {
        currency: currency.to_string(),
        issuer: AGENT.to_string(),
        value: value.to_string(),
    })
}

pub fn drops(xrp: f64) -> OfferAmount {
    OfferAmount::Drops(format!("{}", (xrp * 1_000_000.0) as u64))
}

/// Sell offer resting at the given XRP-per-unit quality.
pub fn sell_offer(seq: u32, currency: &str, quality_xrp: f64, xrp_notional: f64) -> AccountOffer {
    AccountOffer {
        seq,
        flags: 0x0008_0000,
        taker_gets: issued(currency, &format!("{}", xrp_notional / quality_xrp)),
        taker_pays: drops(xrp_notional),
        quality: format!("{}", quality_xrp * 1_000_000.0),
    }
}

pub fn buy_offer(seq: u32, currency: &str, xrp_notional: f64) -> AccountOffer {
    AccountOffer {
        seq,
        flags: 0,
        taker_gets: drops(xrp_notional),
        taker_pays: issued(currency, "60000"),
        quality: "0.0006".to_string(),
    }
}

/// Wire a submitter and reconciler onto the mock with zero pacing so tests
/// run instantly.
pub fn engine(
    ledger: Arc<MockLedger>,
    rates: RateTable,
    wall_amount_xrp: f64,
) -> (OrderSubmitter, OfferReconciler) {
    let submitter = OrderSubmitter::new(
        Arc::clone(&ledger) as Arc<dyn LedgerApi>,
        AGENT,
        "sSecret",
        None,
        Duration::from_millis(0),
    );
    let reconciler = OfferReconciler::new(
        ledger as Arc<dyn LedgerApi>,
        submitter.clone(),
        rates,
        AGENT,
        QuotePolicy {
            wall_amount_xrp,
            ..QuotePolicy::default()
        },
    );
    (submitter, reconciler)
}
