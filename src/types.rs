//! Shared data model for ledger queries, submissions and streamed events.
//!
//! Everything crossing the ledger boundary is parsed into these types so the
//! engine never works on raw JSON shapes past the client layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One trust line from an `account_lines` response.
#[derive(Debug, Clone, Deserialize)]
pub struct TrustLine {
    pub account: String,
    pub currency: String,
    /// Limit declared by the queried account, as a decimal string.
    pub limit: String,
    #[serde(default)]
    pub balance: String,
}

/// Amount on one side of an offer: native drops or an issued currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OfferAmount {
    /// XRP, expressed in drops.
    Drops(String),
    /// Issued currency triple.
    Issued(IssuedAmount),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedAmount {
    pub currency: String,
    pub issuer: String,
    pub value: String,
}

impl OfferAmount {
    pub fn as_drops(&self) -> Option<&str> {
        match self {
            OfferAmount::Drops(drops) => Some(drops),
            OfferAmount::Issued(_) => None,
        }
    }

    pub fn as_issued(&self) -> Option<&IssuedAmount> {
        match self {
            OfferAmount::Drops(_) => None,
            OfferAmount::Issued(issued) => Some(issued),
        }
    }
}

/// One resting offer from an `account_offers` response.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountOffer {
    /// Ledger-assigned sequence number, the handle for replace and cancel.
    pub seq: u32,
    #[serde(default)]
    pub flags: u32,
    pub taker_gets: OfferAmount,
    pub taker_pays: OfferAmount,
    /// Exchange rate of the offer: taker_pays units per taker_gets unit.
    pub quality: String,
}

/// Result of a transaction submission, validated at the client boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitOutcome {
    pub engine_result: String,
    #[serde(default)]
    pub engine_result_message: String,
    #[serde(default)]
    pub tx_json: Value,
}

impl SubmitOutcome {
    /// The ledger accepted the transaction; anything else is a failure.
    pub fn is_success(&self) -> bool {
        self.engine_result == "tesSUCCESS"
    }
}

/// A newly created trust line extending credit to the agent, derived from a
/// single streamed transaction's effect list. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustlineCreationEvent {
    /// Currency code in raw ledger form.
    pub currency: String,
    /// The side of the new entry that is not the agent.
    pub counterparty: String,
    /// Trust limit declared by the counterparty.
    pub limit: f64,
}

/// Error types for the ledger and feed boundaries.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("ledger rejected request: {0}")]
    Rpc(String),

    #[error("invalid response format: {0}")]
    InvalidResponse(String),

    #[error("feed request failed: {0}")]
    Feed(String),

    #[error("submission failed after retry: {0}")]
    SubmitFailed(String),
}

/// Result type for ledger and feed operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
