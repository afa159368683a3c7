//! WebSocket ledger client.
//!
//! One connection carries id-correlated request/response traffic and the
//! account subscription stream. The read and write halves are split so a
//! pending request never blocks inbound stream messages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::types::{AccountOffer, LedgerError, Result, SubmitOutcome, TrustLine};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

type PendingMap = HashMap<u64, oneshot::Sender<Value>>;

/// Ledger operations the engine depends on.
///
/// Implemented by [`LedgerClient`] and by test doubles, so the decision
/// logic can be exercised without a network.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    async fn account_lines(&self, account: &str) -> Result<Vec<TrustLine>>;
    async fn account_offers(&self, account: &str) -> Result<Vec<AccountOffer>>;
    async fn submit(&self, tx_json: Value, secret: &str) -> Result<SubmitOutcome>;
}

/// WebSocket JSON-RPC client for one ledger network.
pub struct LedgerClient {
    endpoint: String,
    ws_sink: Arc<Mutex<WsSink>>,
    pending: Arc<Mutex<PendingMap>>,
    next_id: AtomicU64,
    stream_rx: Mutex<mpsc::Receiver<Value>>,
    connected: Arc<RwLock<bool>>,
}

impl LedgerClient {
    /// Per-request timeout; connection-level timeouts are the transport's
    /// problem.
    const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Connect to the first reachable endpoint in the list.
    ///
    /// The list is the whole retry budget: when every endpoint fails the
    /// error is returned and the caller escalates to process termination.
    pub async fn connect(urls: &[String]) -> Result<Self> {
        let mut last_error = String::from("no endpoints configured");

        for url in urls {
            match connect_async(url.as_str()).await {
                Ok((ws_stream, _)) => {
                    info!("connected to ledger at {}", url);
                    return Ok(Self::from_stream(url, ws_stream));
                }
                Err(e) => {
                    warn!("could not connect to {}: {}", url, e);
                    last_error = format!("{}: {}", url, e);
                }
            }
        }

        Err(LedgerError::Connect(last_error))
    }

    fn from_stream(url: &str, ws_stream: WsStream) -> Self {
        let (ws_sink, ws_reader) = ws_stream.split();
        let ws_sink = Arc::new(Mutex::new(ws_sink));
        let pending: Arc<Mutex<PendingMap>> = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(RwLock::new(true));

        // Streamed events (no id) are handed to the runner over a channel.
        let (stream_tx, stream_rx) = mpsc::channel(1024);

        tokio::spawn(message_handler(
            ws_reader,
            Arc::clone(&ws_sink),
            Arc::clone(&pending),
            stream_tx,
            Arc::clone(&connected),
        ));

        Self {
            endpoint: url.to_string(),
            ws_sink,
            pending,
            next_id: AtomicU64::new(1),
            stream_rx: Mutex::new(stream_rx),
            connected,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    /// Send one command and await its id-correlated reply.
    ///
    /// Replies are validated here: an error status becomes a typed error,
    /// and only the `result` payload escapes to callers.
    pub async fn request(&self, mut command: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        command["id"] = json!(id);

        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id, reply_tx);
        }

        let send_result = {
            let mut sink = self.ws_sink.lock().await;
            sink.send(Message::Text(command.to_string())).await
        };
        if let Err(e) = send_result {
            self.pending.lock().await.remove(&id);
            return Err(LedgerError::Transport(e.to_string()));
        }

        let reply = match tokio::time::timeout(
            Duration::from_secs(Self::REQUEST_TIMEOUT_SECS),
            reply_rx,
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => {
                return Err(LedgerError::Transport("connection closed".to_string()));
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(LedgerError::Timeout(Self::REQUEST_TIMEOUT_SECS));
            }
        };

        match reply.get("status").and_then(Value::as_str) {
            Some("success") => Ok(reply.get("result").cloned().unwrap_or(Value::Null)),
            _ => {
                let message = reply
                    .get("error_message")
                    .or_else(|| reply.get("error"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error");
                Err(LedgerError::Rpc(message.to_string()))
            }
        }
    }

    /// Subscribe to transaction events for the given accounts.
    pub async fn subscribe(&self, accounts: &[String]) -> Result<()> {
        self.request(json!({
            "command": "subscribe",
            "accounts": accounts,
        }))
        .await?;
        info!("subscribed to {} account(s)", accounts.len());
        Ok(())
    }

    /// Receive the next streamed transaction event.
    ///
    /// Returns `None` once the connection is gone; the caller decides how
    /// fatal that is.
    pub async fn next_transaction(&self) -> Option<Value> {
        let mut rx = self.stream_rx.lock().await;
        rx.recv().await
    }

    /// XRP balance of an account, in drops.
    pub async fn account_balance_drops(&self, account: &str) -> Result<String> {
        let result = self
            .request(json!({
                "command": "account_info",
                "account": account,
            }))
            .await?;

        result
            .get("account_data")
            .and_then(|data| data.get("Balance"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                LedgerError::InvalidResponse("account_info response missing Balance".to_string())
            })
    }
}

#[async_trait]
impl LedgerApi for LedgerClient {
    async fn account_lines(&self, account: &str) -> Result<Vec<TrustLine>> {
        let result = self
            .request(json!({
                "command": "account_lines",
                "account": account,
                "limit": 400,
            }))
            .await?;

        let lines = result.get("lines").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(lines)
            .map_err(|e| LedgerError::InvalidResponse(format!("account_lines: {}", e)))
    }

    async fn account_offers(&self, account: &str) -> Result<Vec<AccountOffer>> {
        let result = self
            .request(json!({
                "command": "account_offers",
                "account": account,
                "limit": 400,
            }))
            .await?;

        let offers = result.get("offers").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(offers)
            .map_err(|e| LedgerError::InvalidResponse(format!("account_offers: {}", e)))
    }

    /// Sign-and-submit through the connected node. The node autofills the
    /// sequence and fee fields left unset by the builders.
    async fn submit(&self, tx_json: Value, secret: &str) -> Result<SubmitOutcome> {
        let result = self
            .request(json!({
                "command": "submit",
                "tx_json": tx_json,
                "secret": secret,
            }))
            .await?;

        serde_json::from_value(result)
            .map_err(|e| LedgerError::InvalidResponse(format!("submit: {}", e)))
    }
}

/// Pump the read half: replies go to their waiting request, stream events go
/// to the runner, pings are answered in place.
async fn message_handler(
    mut ws_reader: WsReader,
    ws_sink: Arc<Mutex<WsSink>>,
    pending: Arc<Mutex<PendingMap>>,
    stream_tx: mpsc::Sender<Value>,
    connected: Arc<RwLock<bool>>,
) {
    loop {
        match ws_reader.next().await {
            Some(Ok(Message::Text(text))) => {
                let value: Value = match serde_json::from_str(&text) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!("discarding unparseable ledger message: {}", e);
                        continue;
                    }
                };

                if let Some(id) = value.get("id").and_then(Value::as_u64) {
                    let waiter = pending.lock().await.remove(&id);
                    match waiter {
                        Some(reply_tx) => {
                            let _ = reply_tx.send(value);
                        }
                        None => debug!("reply for unknown request id {}", id),
                    }
                } else if value.get("type").and_then(Value::as_str) == Some("transaction") {
                    if let Err(e) = stream_tx.send(value).await {
                        warn!("transaction stream receiver dropped: {}", e);
                        break;
                    }
                } else {
                    debug!(
                        "ignoring ledger message of type {:?}",
                        value.get("type").and_then(|v| v.as_str())
                    );
                }
            }
            Some(Ok(Message::Ping(payload))) => {
                let mut sink = ws_sink.lock().await;
                if let Err(e) = sink.send(Message::Pong(payload)).await {
                    error!("failed to answer ping: {}", e);
                }
            }
            Some(Ok(Message::Close(_))) => {
                info!("ledger closed the connection");
                break;
            }
            Some(Err(e)) => {
                error!("ledger connection error: {}", e);
                break;
            }
            None => {
                info!("ledger connection ended");
                break;
            }
            _ => {}
        }
    }

    *connected.write().await = false;

    // Wake up anyone still waiting on a reply; dropping the senders turns
    // their awaits into connection-closed errors.
    pending.lock().await.clear();

    warn!("ledger message handler exited");
}
