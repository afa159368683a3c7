//! Rate oracle refresh against a scripted reference account and a mock feed.

mod support;

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use liquidity_runner::{LedgerApi, PriceFeed, RateOracle, RateTable, SupportedCurrencies};
use support::*;

async fn feed_server(body: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}

fn oracle_with(
    ledger: Arc<MockLedger>,
    rates: RateTable,
    feed_url: &str,
    supported: Vec<&str>,
    supported_path: &std::path::Path,
) -> RateOracle {
    let supported = SupportedCurrencies {
        supported: supported.into_iter().map(String::from).collect(),
        ..SupportedCurrencies::default()
    };
    RateOracle::new(
        rates,
        ledger as Arc<dyn LedgerApi>,
        PriceFeed::new(feed_url).unwrap(),
        "rReference",
        supported,
        supported_path.to_path_buf(),
    )
}

#[tokio::test]
async fn feed_prices_land_under_the_raw_symbol() {
    let server = feed_server(json!({
        "market_data": { "current_price": { "usd": 0.6, "btc": 0.00001 } }
    }))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let rates = RateTable::new();
    let mut oracle = oracle_with(
        MockLedger::new(),
        rates.clone(),
        &format!("{}/feed", server.uri()),
        vec!["USD"],
        &dir.path().join("supported.json"),
    );

    oracle.refresh().await;

    assert_eq!(rates.get("USD").await, Some(0.6));
    // BTC is in the feed but not in the supported set.
    assert_eq!(rates.get("BTC").await, None);
}

#[tokio::test]
async fn hex_symbols_resolve_through_their_normalized_form() {
    let mut bytes = b"USDC".to_vec();
    bytes.resize(20, 0);
    let raw = hex::encode_upper(bytes);

    let server = feed_server(json!({
        "market_data": { "current_price": { "usd": 0.6 } }
    }))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let rates = RateTable::new();
    let mut oracle = oracle_with(
        MockLedger::new(),
        rates.clone(),
        &format!("{}/feed", server.uri()),
        vec![&raw],
        &dir.path().join("supported.json"),
    );

    oracle.refresh().await;

    // The entry is keyed by the raw ledger symbol, not the decoded one.
    assert_eq!(rates.get(&raw).await, Some(0.6));
    assert_eq!(rates.get("USD").await, None);
}

#[tokio::test]
async fn reference_failure_does_not_block_the_feed() {
    let server = feed_server(json!({
        "market_data": { "current_price": { "usd": 0.6 } }
    }))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let ledger = MockLedger::new();
    ledger.fail_lines();

    let rates = RateTable::new();
    let mut oracle = oracle_with(
        ledger,
        rates.clone(),
        &format!("{}/feed", server.uri()),
        vec!["USD"],
        &dir.path().join("supported.json"),
    );

    oracle.refresh().await;

    assert_eq!(rates.get("USD").await, Some(0.6));
}

#[tokio::test]
async fn reference_trust_lines_contribute_absolute_limits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let ledger = MockLedger::new();
    ledger.set_lines(vec![
        trust_line("BTC", "-0.00002"),
        trust_line("ETH", "0.0003"),
    ]);

    let dir = tempfile::tempdir().unwrap();
    let rates = RateTable::new();
    let mut oracle = oracle_with(
        ledger,
        rates.clone(),
        &format!("{}/feed", server.uri()),
        vec![],
        &dir.path().join("supported.json"),
    );

    oracle.refresh().await;

    assert_eq!(rates.get("BTC").await, Some(0.00002));
    assert_eq!(rates.get("ETH").await, Some(0.0003));
}

#[tokio::test]
async fn unresolved_symbols_prune_the_persisted_set() {
    let server = feed_server(json!({
        "market_data": { "current_price": { "usd": 0.6 } }
    }))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let supported_path = dir.path().join("supported.json");

    let rates = RateTable::new();
    let mut oracle = oracle_with(
        MockLedger::new(),
        rates.clone(),
        &format!("{}/feed", server.uri()),
        vec!["USD", "ZZZ"],
        &supported_path,
    );

    oracle.refresh().await;

    assert_eq!(rates.get("USD").await, Some(0.6));
    assert_eq!(rates.get("ZZZ").await, None);

    let stored = SupportedCurrencies::load(&supported_path);
    assert_eq!(stored.supported, vec!["USD"]);
}

#[tokio::test]
async fn a_dead_feed_leaves_the_supported_set_alone() {
    let dir = tempfile::tempdir().unwrap();
    let supported_path = dir.path().join("supported.json");

    let mut oracle = oracle_with(
        MockLedger::new(),
        RateTable::new(),
        "http://127.0.0.1:9/feed",
        vec!["USD", "ZZZ"],
        &supported_path,
    );

    oracle.refresh().await;

    // No feed document means no pruning and nothing persisted.
    assert!(!supported_path.exists());
    assert_eq!(oracle.supported().supported, vec!["USD", "ZZZ"]);
}

#[tokio::test]
async fn feed_entries_overwrite_reference_entries_for_the_same_key() {
    let server = feed_server(json!({
        "market_data": { "current_price": { "usd": 0.6 } }
    }))
    .await;
    let ledger = MockLedger::new();
    ledger.set_lines(vec![trust_line("USD", "0.5")]);

    let dir = tempfile::tempdir().unwrap();
    let rates = RateTable::new();
    let mut oracle = oracle_with(
        ledger,
        rates.clone(),
        &format!("{}/feed", server.uri()),
        vec!["USD"],
        &dir.path().join("supported.json"),
    );

    oracle.refresh().await;

    // Last write within the cycle wins.
    assert_eq!(rates.get("USD").await, Some(0.6));
}
