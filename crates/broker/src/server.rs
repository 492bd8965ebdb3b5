// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP accept loop and per-connection handling. Each connection gets a
//! reader task (this future) and a writer task, joined by an unbounded
//! `mpsc` queue owned by the connection's [`Session`]; registration must be
//! the first line on the wire or the connection is dropped.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::BrokerConfig;
use crate::envelope::{
    ClarificationInput, ConsumerReply, Envelope, EnvelopeKind, Role, YapMessage,
};
use crate::error::BrokerErrorCode;
use crate::monitor;
use crate::registry::Registry;
use crate::router::Router;
use crate::session::Session;
use crate::wire::{FrameReader, FrameResult, FrameWriter};

pub struct Broker {
    config: Arc<BrokerConfig>,
    registry: Arc<Registry>,
    router: Arc<Router>,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(Registry::new());
        let router = Arc::new(Router::new(registry.clone(), config.clone()));
        Self { config, registry, router }
    }

    /// Bind the listening socket without serving. Split out from [`Broker::run`]
    /// so the broker supervisor (`coop`'s launcher) can distinguish a bind
    /// failure, meaning another process already owns the port, from any
    /// other startup error.
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(%addr, "broker listening");
        Ok(listener)
    }

    /// Bind and serve until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener until `shutdown` is cancelled.
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> anyhow::Result<()> {
        let monitor_handle = tokio::spawn(monitor::run(
            self.registry.clone(),
            self.router.clone(),
            self.config.clone(),
            shutdown.clone(),
        ));

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    let registry = self.registry.clone();
                    let router = self.router.clone();
                    let config = self.config.clone();
                    let conn_shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, registry, router, config, conn_shutdown).await {
                            tracing::debug!(%peer, error = %e, "connection closed");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("broker shutting down");
                    break;
                }
            }
        }

        let _ = monitor_handle.await;
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    registry: Arc<Registry>,
    router: Arc<Router>,
    config: Arc<BrokerConfig>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    stream.set_nodelay(true).ok();
    let (read_half, write_half) = stream.into_split();
    let mut reader = FrameReader::new(read_half);

    let first = match reader.next_envelope().await? {
        Some(FrameResult::Envelope(env)) => env,
        Some(FrameResult::Malformed(e)) => {
            let mut writer = FrameWriter::new(write_half);
            let err_env = error_envelope("", Role::Consumer, BrokerErrorCode::WireError, &format!("malformed envelope: {e}"));
            let _ = writer.write_envelope(&err_env).await;
            return Ok(());
        }
        None => return Ok(()),
    };

    if first.kind != EnvelopeKind::Register {
        let mut writer = FrameWriter::new(write_half);
        let err_env = error_envelope(
            &first.client_id,
            first.client_type,
            BrokerErrorCode::RegistrationError,
            "first envelope must be a registration",
        );
        let _ = writer.write_envelope(&err_env).await;
        return Ok(());
    }
    let client_id = first.client_id.clone();
    let role = first.client_type;

    if registry.contains(&client_id).await {
        let mut writer = FrameWriter::new(write_half);
        let err_env =
            error_envelope(&client_id, role, BrokerErrorCode::RegistrationError, "client id already registered");
        let _ = writer.write_envelope(&err_env).await;
        return Ok(());
    }

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Envelope>();
    let session = Session::new(client_id.clone(), role, outbound_tx);
    registry.insert(session.clone()).await;
    tracing::info!(client_id = client_id.as_str(), %role, "client registered");

    let ack = Envelope::new(EnvelopeKind::Sync, client_id.clone(), role, serde_json::json!({"status": "registered"}));
    let _ = session.send(ack);

    let cancel = session.cancel.clone();
    let writer_task = tokio::spawn(async move {
        let mut writer = FrameWriter::new(write_half);
        loop {
            tokio::select! {
                env = outbound_rx.recv() => {
                    match env {
                        Some(env) => {
                            if writer.write_envelope(&env).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
        let _ = writer.into_inner().shutdown().await;
    });

    loop {
        tokio::select! {
            frame = reader.next_envelope() => {
                match frame {
                    Ok(Some(FrameResult::Envelope(env))) => {
                        session.touch();
                        dispatch(&env, &session, &router).await;
                    }
                    Ok(Some(FrameResult::Malformed(e))) => {
                        let err_env = error_envelope(
                            &client_id,
                            role,
                            BrokerErrorCode::WireError,
                            &format!("malformed envelope: {e}"),
                        );
                        let _ = session.send(err_env);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!(client_id = client_id.as_str(), error = %e, "read error");
                        break;
                    }
                }
            }
            _ = session.cancel.cancelled() => break,
            _ = shutdown.cancelled() => break,
        }
    }

    session.cancel.cancel();
    let _ = writer_task.await;
    registry.remove(&client_id).await;
    match role {
        Role::Consumer => router.on_consumer_loss(&client_id).await,
        Role::Producer => router.on_producer_loss(&client_id).await,
    }
    tracing::info!(client_id = client_id.as_str(), "client disconnected");
    Ok(())
}

async fn dispatch(env: &Envelope, session: &Arc<Session>, router: &Arc<Router>) {
    match env.kind {
        EnvelopeKind::Heartbeat => {}
        EnvelopeKind::Register => {
            let _ = session.send(error_envelope(
                &session.client_id,
                session.role,
                BrokerErrorCode::RegistrationError,
                "already registered",
            ));
            session.cancel.cancel();
        }
        EnvelopeKind::Clarification if session.role == Role::Producer => {
            let input: Result<ClarificationInput, _> = serde_json::from_value(env.data.clone());
            match input {
                Ok(input) => {
                    let request_id = input.id.clone();
                    if let Err(err) = router.route_clarification(input, &session.client_id).await {
                        tracing::debug!(
                            client_id = session.client_id.as_str(),
                            request_id = request_id.as_str(),
                            code = %err.code(),
                            "clarification could not be routed"
                        );
                        let payload = crate::envelope::ResponsePayload {
                            request_id,
                            response: None,
                            error: Some(err.to_string()),
                            cli_id: None,
                        };
                        let env = Envelope::new(
                            EnvelopeKind::Response,
                            session.client_id.clone(),
                            session.role,
                            serde_json::to_value(&payload).unwrap_or_default(),
                        );
                        let _ = session.send(env);
                    }
                }
                Err(e) => {
                    let _ = session.send(error_envelope(
                        &session.client_id,
                        session.role,
                        BrokerErrorCode::WireError,
                        &e.to_string(),
                    ));
                }
            }
        }
        EnvelopeKind::Response if session.role == Role::Consumer => {
            let reply: Result<ConsumerReply, _> = serde_json::from_value(env.data.clone());
            match reply {
                Ok(reply) => router.handle_reply(&reply.request_id, reply.response, &session.client_id).await,
                Err(e) => {
                    let _ = session.send(error_envelope(
                        &session.client_id,
                        session.role,
                        BrokerErrorCode::WireError,
                        &e.to_string(),
                    ));
                }
            }
        }
        EnvelopeKind::Yap if session.role == Role::Producer => {
            let yap: Result<YapMessage, _> = serde_json::from_value(env.data.clone());
            match yap {
                Ok(yap) => router.route_yap(yap, &session.client_id).await,
                Err(e) => {
                    let _ = session.send(error_envelope(
                        &session.client_id,
                        session.role,
                        BrokerErrorCode::WireError,
                        &e.to_string(),
                    ));
                }
            }
        }
        _ => {
            tracing::debug!(
                client_id = session.client_id.as_str(),
                kind = ?env.kind,
                role = %session.role,
                "unexpected envelope kind for role, ignored"
            );
        }
    }
}

fn error_envelope(client_id: &str, role: Role, code: BrokerErrorCode, message: &str) -> Envelope {
    tracing::debug!(client_id, %role, %code, error_message = message, "sending error envelope");
    Envelope::new(EnvelopeKind::Error, client_id.to_string(), role, serde_json::json!({"error": message}))
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
