//! Transaction construction and the bounded-retry submission path.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{error, warn};

use crate::amount::{normalize_balance, xrp_to_drops};
use crate::ledger::LedgerApi;
use crate::types::{LedgerError, Result, SubmitOutcome};

/// `tfSell` flag on an offer-create transaction.
const TF_SELL: u32 = 0x0008_0000;

/// Memo type for user-visible notices, hex-encoded alongside the text.
const MEMO_TYPE: &str = "text/plain";

/// Builds transactions and submits them with the engine's retry contract:
/// one attempt, one identical retry, then log and abandon.
#[derive(Clone)]
pub struct OrderSubmitter {
    ledger: Arc<dyn LedgerApi>,
    account: String,
    secret: String,
    network_id: Option<u32>,
    pacing: Duration,
}

impl OrderSubmitter {
    pub fn new(
        ledger: Arc<dyn LedgerApi>,
        account: &str,
        secret: &str,
        network_id: Option<u32>,
        pacing: Duration,
    ) -> Self {
        Self {
            ledger,
            account: account.to_string(),
            secret: secret.to_string(),
            network_id,
            pacing,
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Fixed delay before a ledger-mutating call so consecutive
    /// transactions land in distinct sequence slots.
    pub async fn pace(&self) {
        tokio::time::sleep(self.pacing).await;
    }

    /// Submit a transaction, retrying exactly once on any failure or
    /// non-success outcome. A second failure is logged with the full
    /// payload and abandoned for this cycle.
    pub async fn submit(&self, mut tx_json: Value) -> Result<SubmitOutcome> {
        if let Some(network_id) = self.network_id {
            tx_json["NetworkID"] = json!(network_id);
        }

        match self.ledger.submit(tx_json.clone(), &self.secret).await {
            Ok(outcome) if outcome.is_success() => return Ok(outcome),
            Ok(outcome) => warn!(
                "submission returned {}, retrying once",
                outcome.engine_result
            ),
            Err(e) => warn!("submission failed, retrying once: {}", e),
        }

        match self.ledger.submit(tx_json.clone(), &self.secret).await {
            Ok(outcome) if outcome.is_success() => Ok(outcome),
            Ok(outcome) => {
                error!(
                    "transaction abandoned after retry ({}): {}",
                    outcome.engine_result, tx_json
                );
                Err(LedgerError::SubmitFailed(outcome.engine_result))
            }
            Err(e) => {
                error!("transaction abandoned after retry: {} | {}", e, tx_json);
                Err(e)
            }
        }
    }

    /// Sell offer: give issued currency, receive `wall_xrp` XRP. The rate
    /// is the currency-per-XRP price the caller wants to quote at.
    pub fn sell_offer(
        &self,
        currency: &str,
        rate: f64,
        wall_xrp: f64,
        replace: Option<u32>,
    ) -> anyhow::Result<Value> {
        let value = normalize_balance(wall_xrp * rate);

        let mut tx = json!({
            "TransactionType": "OfferCreate",
            "Account": self.account,
            "TakerGets": {
                "currency": currency,
                "issuer": self.account,
                "value": value,
            },
            "TakerPays": xrp_to_drops(wall_xrp)?,
            "Flags": TF_SELL,
        });
        if let Some(sequence) = replace {
            tx["OfferSequence"] = json!(sequence);
        }
        Ok(tx)
    }

    /// Buy offer: give `wall_xrp` XRP, receive issued currency.
    pub fn buy_offer(
        &self,
        currency: &str,
        rate: f64,
        wall_xrp: f64,
        replace: Option<u32>,
    ) -> anyhow::Result<Value> {
        let value = normalize_balance(wall_xrp * rate);

        let mut tx = json!({
            "TransactionType": "OfferCreate",
            "Account": self.account,
            "TakerPays": {
                "currency": currency,
                "issuer": self.account,
                "value": value,
            },
            "TakerGets": xrp_to_drops(wall_xrp)?,
        });
        if let Some(sequence) = replace {
            tx["OfferSequence"] = json!(sequence);
        }
        Ok(tx)
    }

    pub fn offer_cancel(&self, sequence: u32) -> Value {
        json!({
            "TransactionType": "OfferCancel",
            "Account": self.account,
            "OfferSequence": sequence,
        })
    }

    /// Payment of an issued currency, with an optional user-visible memo.
    /// Memo type and text are uppercase-hex UTF-8.
    pub fn payment(
        &self,
        destination: &str,
        currency: &str,
        value: &str,
        memo: Option<&str>,
    ) -> Value {
        let mut tx = json!({
            "TransactionType": "Payment",
            "Account": self.account,
            "Destination": destination,
            "Amount": {
                "currency": currency,
                "issuer": self.account,
                "value": value,
            },
        });
        if let Some(text) = memo {
            tx["Memos"] = json!([{
                "Memo": {
                    "MemoType": hex::encode_upper(MEMO_TYPE.as_bytes()),
                    "MemoData": hex::encode_upper(text.as_bytes()),
                }
            }]);
        }
        tx
    }

    /// Account-flag transaction used by the one-shot setup operation.
    pub fn account_set(&self, set_flag: u32) -> Value {
        json!({
            "TransactionType": "AccountSet",
            "Account": self.account,
            "SetFlag": set_flag,
        })
    }
}
