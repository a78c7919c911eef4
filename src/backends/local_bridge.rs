//! Local bridge reached over a persistent WebSocket.
//!
//! # Responsibilities
//! - Maintain one long-lived connection, opened lazily
//! - Tag outbound requests with their request id and park the caller in a
//!   pending-request table until the matching reply arrives
//! - Reconnect with doubling delay after a drop, up to a bounded attempt count
//! - Answer health probes with a ping/pong round trip
//!
//! # Data Flow
//! ```text
//! query()
//!     → ensure_connected() (connect_async under connect timeout)
//!     → pending.insert(requestId, oneshot)
//!     → outbound channel → supervisor task → socket
//!
//! socket → supervisor task
//!     → {"type":"ai_response"|"error", requestId} → pending.remove → oneshot
//!     → {"type":"pong"} → wake probe waiters
//!     → closed → reject expired waiters → reconnect loop
//! ```
//!
//! # Design Decisions
//! - A single supervisor task owns the socket; callers only see a channel
//! - The per-request timeout is the only cancellation; its guard removes the
//!   pending entry so late replies are dropped
//! - Heartbeats are never correlated with requests
//! - Every attached connection gets a new generation; a supervisor whose
//!   generation is stale exits without touching the pending table

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::time::{timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::backends::{guarded_query, BackendAdapter, BackendError, BackendId, BackendResult, ConnectionKind, HealthStatus};
use crate::config::LocalBridgeConfig;
use crate::health::state::{now_millis, HealthState};
use crate::orchestrator::types::{clamp_confidence, AiRequest, AiResponse, RequestKind};
use crate::resilience::backoff::ReconnectPolicy;
use crate::resilience::CircuitBreaker;

const BACKEND: BackendId = BackendId::LocalBridge;
const DEFAULT_CONFIDENCE: u8 = 80;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Messages sent to the bridge.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Outbound<'a> {
    AiRequest {
        #[serde(rename = "requestId")]
        request_id: &'a str,
        payload: RequestPayload<'a>,
    },
    Ping {
        timestamp: u64,
    },
    Pong,
}

#[derive(Debug, Serialize)]
struct RequestPayload<'a> {
    kind: RequestKind,
    query: &'a str,
    context: &'a Value,
}

/// Messages received from the bridge.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Inbound {
    AiResponse {
        #[serde(rename = "requestId")]
        request_id: String,
        text: String,
        #[serde(default)]
        confidence: Option<f64>,
        #[serde(default)]
        analysis: Option<Value>,
    },
    Error {
        #[serde(rename = "requestId")]
        request_id: String,
        error: String,
    },
    Ping,
    Pong,
    #[serde(other)]
    Unknown,
}

#[derive(Debug)]
struct BridgeReply {
    text: String,
    confidence: Option<f64>,
    analysis: Option<Value>,
}

#[derive(Debug)]
struct PendingRequest {
    token: u64,
    deadline: Instant,
    reply: oneshot::Sender<BackendResult<BridgeReply>>,
}

/// Removes a pending entry when the waiting caller gives up.
struct PendingGuard<'a> {
    pending: &'a DashMap<String, PendingRequest>,
    request_id: &'a str,
    token: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending
            .remove_if(self.request_id, |_, entry| entry.token == self.token);
    }
}

struct BridgeShared {
    url: String,
    request_timeout: Duration,
    connect_timeout: Duration,
    reconnect: ReconnectPolicy,
    breaker: CircuitBreaker,
    health: HealthState,
    pending: DashMap<String, PendingRequest>,
    next_token: AtomicU64,
    generation: AtomicU64,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    connect_lock: tokio::sync::Mutex<()>,
    pong: Notify,
    closed: AtomicBool,
    shutdown: Notify,
}

impl BridgeShared {
    fn outbound(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Message>>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_connected(&self) -> bool {
        self.outbound().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    fn send(&self, message: Message) -> BackendResult<()> {
        let tx = self
            .outbound()
            .clone()
            .ok_or_else(|| BackendError::transport(BACKEND, "bridge not connected"))?;
        tx.send(message)
            .map_err(|_| BackendError::ConnectionLost { backend: BACKEND })
    }

    fn send_json(&self, message: &Outbound<'_>) -> BackendResult<()> {
        let text = serde_json::to_string(message).map_err(|e| BackendError::transport(BACKEND, e.to_string()))?;
        self.send(Message::text(text))
    }

    async fn open_socket(&self) -> BackendResult<WsStream> {
        match timeout(self.connect_timeout, connect_async(self.url.as_str())).await {
            Ok(Ok((stream, _))) => Ok(stream),
            Ok(Err(e)) => Err(BackendError::transport(BACKEND, e.to_string())),
            Err(_) => Err(BackendError::Timeout {
                backend: BACKEND,
                timeout_ms: self.connect_timeout.as_millis() as u64,
            }),
        }
    }

    /// Make sure a connection exists, opening one if needed.
    async fn ensure_connected(self: &Arc<Self>) -> BackendResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BackendError::transport(BACKEND, "bridge adapter closed"));
        }
        if self.is_connected() {
            return Ok(());
        }

        let _guard = self.connect_lock.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        let stream = self.open_socket().await?;
        let (generation, rx) = self.attach();
        tracing::info!(url = %self.url, generation, "Local bridge connected");
        tokio::spawn(supervise(self.clone(), stream, rx, generation));
        Ok(())
    }

    /// Install a fresh outbound channel for a new connection.
    fn attach(&self) -> (u64, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut outbound = self.outbound();
        *outbound = Some(tx);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        drop(outbound);
        self.health.set_available(true);
        (generation, rx)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    fn detach(&self) {
        self.outbound().take();
        self.health.set_available(false);
    }

    /// Route one inbound text frame.
    fn dispatch(&self, text: &str) {
        let inbound = match serde_json::from_str::<Inbound>(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unparseable bridge message");
                return;
            }
        };

        match inbound {
            Inbound::AiResponse {
                request_id,
                text,
                confidence,
                analysis,
            } => self.resolve(
                &request_id,
                Ok(BridgeReply {
                    text,
                    confidence,
                    analysis,
                }),
            ),
            Inbound::Error { request_id, error } => {
                self.resolve(&request_id, Err(BackendError::transport(BACKEND, error)))
            }
            Inbound::Ping => {
                let _ = self.send_json(&Outbound::Pong);
            }
            Inbound::Pong => self.pong.notify_waiters(),
            Inbound::Unknown => tracing::debug!("Ignoring bridge message of unknown type"),
        }
    }

    fn resolve(&self, request_id: &str, result: BackendResult<BridgeReply>) {
        match self.pending.remove(request_id) {
            Some((_, entry)) => {
                let _ = entry.reply.send(result);
            }
            None => tracing::debug!(request_id, "Dropping bridge reply with no waiting request"),
        }
    }

    /// Reject waiters with a connection-lost error.
    ///
    /// With `only_expired`, waiters still inside their deadline are left alone.
    fn reject_pending(&self, only_expired: bool) -> usize {
        let now = Instant::now();
        let doomed: Vec<String> = self
            .pending
            .iter()
            .filter(|entry| !only_expired || entry.deadline <= now)
            .map(|entry| entry.key().clone())
            .collect();

        let mut rejected = 0;
        for request_id in doomed {
            if let Some((_, entry)) = self.pending.remove(&request_id) {
                let _ = entry.reply.send(Err(BackendError::ConnectionLost { backend: BACKEND }));
                rejected += 1;
            }
        }
        rejected
    }

    /// Send a heartbeat and wait for the pong.
    async fn ping(&self, limit: Duration) -> bool {
        let notified = self.pong.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.send_json(&Outbound::Ping { timestamp: now_millis() }).is_err() {
            return false;
        }
        timeout(limit, notified).await.is_ok()
    }
}

/// What the reconnect loop ended with.
enum Reconnect {
    Reconnected {
        stream: WsStream,
        rx: mpsc::UnboundedReceiver<Message>,
        generation: u64,
    },
    /// Another connection was attached meanwhile and has its own supervisor.
    Superseded,
    GaveUp,
}

/// Own one socket, then keep reconnecting until closed or out of attempts.
async fn supervise(
    shared: Arc<BridgeShared>,
    stream: WsStream,
    rx: mpsc::UnboundedReceiver<Message>,
    generation: u64,
) {
    let mut stream = stream;
    let mut rx = rx;
    let mut generation = generation;

    loop {
        run_connection(&shared, stream, &mut rx).await;
        if !shared.is_current(generation) {
            tracing::debug!(generation, "Local bridge supervisor superseded");
            return;
        }
        shared.detach();

        let expired = shared.reject_pending(true);
        if shared.closed.load(Ordering::Acquire) {
            shared.reject_pending(false);
            tracing::info!("Local bridge connection closed");
            return;
        }
        tracing::warn!(url = %shared.url, rejected = expired, "Local bridge disconnected");

        match reconnect(&shared, generation).await {
            Reconnect::Reconnected {
                stream: next_stream,
                rx: next_rx,
                generation: next_generation,
            } => {
                stream = next_stream;
                rx = next_rx;
                generation = next_generation;
            }
            Reconnect::Superseded => {
                tracing::debug!(generation, "Local bridge reconnect handed over to a newer connection");
                return;
            }
            Reconnect::GaveUp => {
                let rejected = shared.reject_pending(false);
                tracing::warn!(rejected, "Local bridge reconnection abandoned");
                return;
            }
        }
    }
}

async fn reconnect(shared: &Arc<BridgeShared>, generation: u64) -> Reconnect {
    let mut attempt = 1;
    while let Some(delay) = shared.reconnect.delay_for(attempt) {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shared.shutdown.notified() => return Reconnect::GaveUp,
        }
        if shared.closed.load(Ordering::Acquire) {
            return Reconnect::GaveUp;
        }

        let _guard = shared.connect_lock.lock().await;
        if !shared.is_current(generation) {
            return Reconnect::Superseded;
        }
        match shared.open_socket().await {
            Ok(stream) => {
                let (generation, rx) = shared.attach();
                tracing::info!(attempt, generation, "Local bridge reconnected");
                return Reconnect::Reconnected { stream, rx, generation };
            }
            Err(e) => {
                tracing::debug!(attempt, error = %e, "Local bridge reconnect failed");
            }
        }
        attempt += 1;
    }

    let _guard = shared.connect_lock.lock().await;
    if shared.is_current(generation) {
        Reconnect::GaveUp
    } else {
        Reconnect::Superseded
    }
}

async fn run_connection(shared: &BridgeShared, stream: WsStream, rx: &mut mpsc::UnboundedReceiver<Message>) {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            outgoing = rx.recv() => match outgoing {
                Some(message) => {
                    if let Err(e) = sink.send(message).await {
                        tracing::debug!(error = %e, "Local bridge write failed");
                        break;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    break;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => shared.dispatch(text.as_str()),
                Some(Ok(Message::Ping(payload))) => {
                    let _ = sink.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "Local bridge read failed");
                    break;
                }
            },
        }
    }
}

/// Adapter for the locally hosted bridge.
pub struct LocalBridgeAdapter {
    shared: Arc<BridgeShared>,
    probe_timeout: Duration,
}

impl LocalBridgeAdapter {
    /// Create the adapter. No connection is made until the first query or probe.
    pub fn new(config: &LocalBridgeConfig) -> Self {
        let shared = BridgeShared {
            url: config.url.clone(),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            reconnect: ReconnectPolicy::new(
                Duration::from_millis(config.reconnect_base_delay_ms),
                Duration::from_millis(config.reconnect_max_delay_ms),
                config.max_reconnect_attempts,
            ),
            breaker: CircuitBreaker::new(BACKEND.as_str(), &config.breaker),
            health: HealthState::new(ConnectionKind::PersistentSocket, false, config.quality),
            pending: DashMap::new(),
            next_token: AtomicU64::new(1),
            generation: AtomicU64::new(0),
            outbound: Mutex::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
            pong: Notify::new(),
            closed: AtomicBool::new(false),
            shutdown: Notify::new(),
        };
        Self {
            shared: Arc::new(shared),
            probe_timeout: config.health.probe_timeout(),
        }
    }

    /// Number of requests waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    async fn call(&self, request: &AiRequest) -> BackendResult<AiResponse> {
        let started = std::time::Instant::now();
        let shared = &self.shared;
        shared.ensure_connected().await?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let token = shared.next_token.fetch_add(1, Ordering::Relaxed);
        match shared.pending.entry(request.request_id.clone()) {
            Entry::Occupied(_) => {
                return Err(BackendError::transport(BACKEND, format!(
                    "request id '{}' is already in flight",
                    request.request_id
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingRequest {
                    token,
                    deadline: Instant::now() + shared.request_timeout,
                    reply: reply_tx,
                });
            }
        }
        let _guard = PendingGuard {
            pending: &shared.pending,
            request_id: &request.request_id,
            token,
        };

        shared.send_json(&Outbound::AiRequest {
            request_id: &request.request_id,
            payload: RequestPayload {
                kind: request.kind,
                query: &request.query_text,
                context: &request.context_payload,
            },
        })?;

        let reply = match timeout(shared.request_timeout, reply_rx).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => return Err(BackendError::ConnectionLost { backend: BACKEND }),
            Err(_) => {
                return Err(BackendError::Timeout {
                    backend: BACKEND,
                    timeout_ms: shared.request_timeout.as_millis() as u64,
                })
            }
        };

        Ok(AiResponse {
            request_id: request.request_id.clone(),
            backend_used: BACKEND,
            text: reply.text,
            confidence: clamp_confidence(reply.confidence, DEFAULT_CONFIDENCE),
            latency_ms: started.elapsed().as_millis() as u64,
            analysis_payload: reply.analysis,
            timestamp: now_millis(),
        })
    }
}

impl std::fmt::Debug for LocalBridgeAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBridgeAdapter")
            .field("url", &self.shared.url)
            .field("connected", &self.shared.is_connected())
            .field("pending", &self.shared.pending.len())
            .finish()
    }
}

#[async_trait]
impl BackendAdapter for LocalBridgeAdapter {
    fn id(&self) -> BackendId {
        BACKEND
    }

    async fn query(&self, request: &AiRequest) -> BackendResult<AiResponse> {
        guarded_query(BACKEND, Some(&self.shared.breaker), &self.shared.health, self.call(request)).await
    }

    fn status(&self) -> HealthStatus {
        self.shared.health.snapshot()
    }

    async fn probe(&self) -> bool {
        let started = std::time::Instant::now();
        let healthy = match self.shared.ensure_connected().await {
            Ok(()) => self.shared.ping(self.probe_timeout).await,
            Err(e) => {
                tracing::debug!(error = %e, "Local bridge probe could not connect");
                false
            }
        };
        self.shared.health.record_probe(healthy, started.elapsed());
        healthy
    }

    fn circuit_breaker(&self) -> Option<&CircuitBreaker> {
        Some(&self.shared.breaker)
    }

    async fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.detach();
        self.shared.shutdown.notify_waiters();
    }
}
