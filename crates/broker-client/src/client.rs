// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `BrokerClient`: connect, register, send typed envelopes, await correlated
//! replies, and reconnect with exponential backoff. Used by both producers
//! and consumers; role is fixed at construction via [`ClientConfig`].

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use coop_broker::envelope::{
    ClarificationInput, ClarificationRequest, ConsumerReply, Envelope, EnvelopeKind, ResponsePayload, Role,
    YapMessage,
};
use coop_broker::wire::{FrameReader, FrameResult, FrameWriter};

use crate::error::ClientError;
use crate::pending::PendingReplies;
use crate::state::{ClientConfig, ClientState};

const HANDSHAKE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Events delivered to the caller via the channel returned from
/// [`BrokerClient::new`].
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Clarification(ClarificationRequest),
    Yap(YapMessage),
    Sync,
    Disconnected,
    MaxReconnectAttemptsReached,
}

pub struct BrokerClient {
    config: ClientConfig,
    state: Mutex<ClientState>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    pending: PendingReplies,
    events_tx: mpsc::UnboundedSender<ClientEvent>,
    shutdown: CancellationToken,
    attempt: AtomicU32,
}

impl BrokerClient {
    pub fn new(config: ClientConfig) -> (std::sync::Arc<Self>, mpsc::UnboundedReceiver<ClientEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let client = std::sync::Arc::new(Self {
            config,
            state: Mutex::new(ClientState::Idle),
            outbound: Mutex::new(None),
            pending: PendingReplies::new(),
            events_tx,
            shutdown: CancellationToken::new(),
            attempt: AtomicU32::new(0),
        });
        (client, events_rx)
    }

    pub fn state(&self) -> ClientState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: ClientState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Open the first connection. Fails with [`ClientError::ConnectionRefused`]
    /// or [`ClientError::RegistrationRejected`]; on success, reconnection on
    /// later disconnect is handled autonomously in the background.
    pub async fn connect(self: &std::sync::Arc<Self>) -> Result<(), ClientError> {
        self.set_state(ClientState::Connecting);
        let stream = self.dial().await?;
        self.handshake_and_spawn(stream).await
    }

    /// Stop reconnecting and tear down the active connection, if any.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn send_clarification(&self, input: ClarificationInput) -> Result<(), ClientError> {
        let data = serde_json::to_value(&input).unwrap_or_default();
        self.enqueue(EnvelopeKind::Clarification, data)
    }

    pub fn send_yap(&self, yap: YapMessage) -> Result<(), ClientError> {
        let data = serde_json::to_value(&yap).unwrap_or_default();
        self.enqueue(EnvelopeKind::Yap, data)
    }

    pub fn send_response(&self, request_id: String, response: String) -> Result<(), ClientError> {
        let reply = ConsumerReply { request_id, response };
        let data = serde_json::to_value(&reply).unwrap_or_default();
        self.enqueue(EnvelopeKind::Response, data)
    }

    /// Await the response to a clarification this client sent. Only
    /// meaningful on a producer-role client.
    pub async fn await_reply(&self, request_id: &str, timeout_ms: u64) -> Result<String, ClientError> {
        let rx = self.pending.register(request_id.to_string());
        match tokio::time::timeout(std::time::Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientError::ConnectionLost),
            Err(_) => {
                self.pending.remove(request_id);
                Err(ClientError::ReplyTimeout)
            }
        }
    }

    fn enqueue(&self, kind: EnvelopeKind, data: serde_json::Value) -> Result<(), ClientError> {
        let guard = self.outbound.lock().unwrap_or_else(|e| e.into_inner());
        let tx = guard.as_ref().ok_or(ClientError::NotConnected)?;
        let env = Envelope::new(kind, self.config.client_id.clone(), self.config.role, data);
        tx.send(env).map_err(|_| ClientError::NotConnected)
    }

    async fn dial(&self) -> Result<TcpStream, ClientError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        TcpStream::connect(&addr)
            .await
            .map_err(|e| ClientError::ConnectionRefused { addr, port: self.config.port, source: e.to_string() })
    }

    /// Register on a freshly dialed stream and, on success, spawn the
    /// writer/heartbeat/reader tasks that own the connection's lifetime.
    async fn handshake_and_spawn(self: &std::sync::Arc<Self>, stream: TcpStream) -> Result<(), ClientError> {
        stream.set_nodelay(true).ok();
        let (read_half, write_half) = stream.into_split();
        let mut reader = FrameReader::new(read_half);
        let mut writer = FrameWriter::new(write_half);

        let register = Envelope::new(EnvelopeKind::Register, self.config.client_id.clone(), self.config.role, serde_json::json!({}));
        writer.write_envelope(&register).await.map_err(|_| ClientError::ConnectionLost)?;

        let ack = tokio::time::timeout(HANDSHAKE_TIMEOUT, reader.next_envelope())
            .await
            .map_err(|_| ClientError::RegistrationRejected("no response from broker".to_string()))?
            .map_err(|_| ClientError::ConnectionLost)?;

        match ack {
            Some(FrameResult::Envelope(env)) if env.kind == EnvelopeKind::Sync => {}
            Some(FrameResult::Envelope(env)) if env.kind == EnvelopeKind::Error => {
                let reason = env.data.get("error").and_then(|v| v.as_str()).unwrap_or("registration rejected");
                return Err(ClientError::RegistrationRejected(reason.to_string()));
            }
            _ => return Err(ClientError::RegistrationRejected("unexpected first reply".to_string())),
        }

        self.attempt.store(0, Ordering::Relaxed);
        self.set_state(ClientState::Connected);
        let _ = self.events_tx.send(ClientEvent::Sync);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        *self.outbound.lock().unwrap_or_else(|e| e.into_inner()) = Some(outbound_tx);

        let conn_cancel = CancellationToken::new();
        spawn_writer(writer, outbound_rx, conn_cancel.clone());
        spawn_heartbeat(self.clone(), conn_cancel.clone());
        spawn_reader(self.clone(), reader, conn_cancel);

        Ok(())
    }

    async fn on_disconnected(self: &std::sync::Arc<Self>) {
        *self.outbound.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.set_state(ClientState::Disconnected);
        self.pending.reject_all(ClientError::ConnectionLost);
        let _ = self.events_tx.send(ClientEvent::Disconnected);

        if self.shutdown.is_cancelled() {
            return;
        }
        let this = self.clone();
        tokio::spawn(async move { this.reconnect_loop().await });
    }

    async fn reconnect_loop(self: std::sync::Arc<Self>) {
        loop {
            if self.shutdown.is_cancelled() {
                return;
            }
            let attempt = self.attempt.load(Ordering::Relaxed);
            if attempt >= self.config.max_reconnect_attempts {
                let _ = self.events_tx.send(ClientEvent::MaxReconnectAttemptsReached);
                return;
            }
            let delay = self.config.backoff_delay(attempt);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.cancelled() => return,
            }
            self.set_state(ClientState::Connecting);
            match self.dial().await {
                Ok(stream) => match self.handshake_and_spawn(stream).await {
                    Ok(()) => return,
                    Err(e) => {
                        tracing::debug!(client_id = self.config.client_id.as_str(), error = %e, "reconnect attempt failed");
                        self.attempt.fetch_add(1, Ordering::Relaxed);
                    }
                },
                Err(e) => {
                    tracing::debug!(client_id = self.config.client_id.as_str(), error = %e, "reconnect dial failed");
                    self.attempt.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}

fn spawn_writer(
    mut writer: FrameWriter<tokio::net::tcp::OwnedWriteHalf>,
    mut outbound_rx: mpsc::UnboundedReceiver<Envelope>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                env = outbound_rx.recv() => {
                    match env {
                        Some(env) => {
                            if writer.write_envelope(&env).await.is_err() {
                                cancel.cancel();
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    });
}

fn spawn_heartbeat(client: std::sync::Arc<BrokerClient>, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(client.config.heartbeat_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if client.enqueue(EnvelopeKind::Heartbeat, serde_json::json!({})).is_err() {
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
                _ = client.shutdown.cancelled() => break,
            }
        }
    });
}

fn spawn_reader(
    client: std::sync::Arc<BrokerClient>,
    mut reader: FrameReader<tokio::net::tcp::OwnedReadHalf>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                frame = reader.next_envelope() => {
                    match frame {
                        Ok(Some(FrameResult::Envelope(env))) => dispatch(&client, env),
                        Ok(Some(FrameResult::Malformed(e))) => {
                            tracing::warn!(error = %e, "malformed envelope from broker");
                        }
                        Ok(None) | Err(_) => break,
                    }
                }
                _ = cancel.cancelled() => break,
                _ = client.shutdown.cancelled() => break,
            }
        }
        cancel.cancel();
        client.on_disconnected().await;
    });
}

fn dispatch(client: &std::sync::Arc<BrokerClient>, env: Envelope) {
    match env.kind {
        EnvelopeKind::Clarification if client.config.role == Role::Consumer => {
            if let Ok(req) = serde_json::from_value::<ClarificationRequest>(env.data) {
                let _ = client.events_tx.send(ClientEvent::Clarification(req));
            }
        }
        EnvelopeKind::Yap if client.config.role == Role::Consumer => {
            if let Ok(yap) = serde_json::from_value::<YapMessage>(env.data) {
                let _ = client.events_tx.send(ClientEvent::Yap(yap));
            }
        }
        EnvelopeKind::Response if client.config.role == Role::Producer => {
            if let Ok(payload) = serde_json::from_value::<ResponsePayload>(env.data) {
                match payload.response {
                    Some(body) => client.pending.resolve(&payload.request_id, Ok(body)),
                    None => client.pending.resolve(&payload.request_id, Err(ClientError::Remote(payload.error.unwrap_or_default()))),
                }
            }
        }
        EnvelopeKind::Error => {
            let reason = env.data.get("error").and_then(|v| v.as_str()).unwrap_or("unknown error");
            tracing::warn!(client_id = client.config.client_id.as_str(), reason, "broker reported an error");
        }
        EnvelopeKind::Sync | EnvelopeKind::Heartbeat | EnvelopeKind::Register => {}
        _ => {
            tracing::debug!(kind = ?env.kind, role = %client.config.role, "unexpected envelope kind for role, ignored");
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
