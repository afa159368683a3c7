//! Liquidity runner
//!
//! Unattended liquidity-provisioning agent for the ledger's built-in
//! exchange: derives per-currency rates from an external feed and an
//! on-ledger reference account, keeps two-sided offer walls near fair
//! value, and rewards new trust lines with a rate-sized token transfer.

pub mod amount;
pub mod config;
pub mod currency;
pub mod feed;
pub mod ledger;
pub mod ops;
pub mod oracle;
pub mod rates;
pub mod reconciler;
pub mod runner;
pub mod submitter;
pub mod types;
pub mod watcher;

// Re-export main types for convenience
pub use config::{Config, SupportedCurrencies};
pub use currency::normalize_currency_code;
pub use feed::PriceFeed;
pub use ledger::{LedgerApi, LedgerClient};
pub use oracle::RateOracle;
pub use rates::RateTable;
pub use reconciler::{decide_for_currency, OfferReconciler, QuotePolicy, ReconcileDecision};
pub use runner::Runner;
pub use submitter::OrderSubmitter;
pub use types::{
    AccountOffer, IssuedAmount, LedgerError, OfferAmount, SubmitOutcome, TrustLine,
    TrustlineCreationEvent,
};
pub use watcher::{extract_trustline_creation, reward_amount, TrustlineWatcher};
