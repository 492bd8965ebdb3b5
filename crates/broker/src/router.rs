// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The router: per-consumer clarification FIFOs with shortest-queue
//! selection, the yap reorder buffer, reply correlation, and the teardown
//! rules that fire on producer/consumer loss.
//!
//! All router state lives under one `tokio::sync::RwLock`, held only for the
//! duration of a single routing decision; no I/O happens while it is held.
//! Outbound envelopes are computed under the lock and sent through session
//! write queues after it is released.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::BrokerConfig;
use crate::envelope::{
    ClarificationInput, ClarificationRequest, ClarificationStatus, Envelope, EnvelopeKind,
    ResponsePayload, Role, YapMessage,
};
use crate::error::{BrokerErrorCode, RouterError};
use crate::registry::Registry;

const MAX_YAP_BUFFER: usize = 50;

/// A yap held in a consumer's reorder buffer, tagged with the producer that
/// sent it so the flushed envelope carries the right source identity.
#[derive(Debug, Clone)]
struct BufferedYap {
    source_client_id: String,
    yap: YapMessage,
}

#[derive(Default)]
struct ConsumerState {
    queue: VecDeque<ClarificationRequest>,
    yap_buffer: Vec<BufferedYap>,
    yap_cancel: Option<CancellationToken>,
}

#[derive(Default)]
struct RouterState {
    consumers: HashMap<String, ConsumerState>,
}

pub struct Router {
    inner: RwLock<RouterState>,
    registry: Arc<Registry>,
    config: Arc<BrokerConfig>,
}

impl Router {
    pub fn new(registry: Arc<Registry>, config: Arc<BrokerConfig>) -> Self {
        Self { inner: RwLock::new(RouterState::default()), registry, config }
    }

    /// Select a target consumer, enqueue `req`, and advance its queue.
    /// Fails with [`RouterError::NoConsumerAvailable`] or
    /// [`RouterError::QueueFull`]; the caller is responsible for turning
    /// that into a `response` envelope back to the source producer.
    pub async fn route_clarification(
        self: &Arc<Self>,
        input: ClarificationInput,
        source_id: &str,
    ) -> Result<(), RouterError> {
        let consumer_id = self.select_consumer().await.ok_or(RouterError::NoConsumerAvailable)?;
        {
            let mut state = self.inner.write().await;
            let entry = state.consumers.entry(consumer_id.clone()).or_default();
            if entry.queue.len() >= self.config.max_clarification_queue {
                return Err(RouterError::QueueFull);
            }
            entry.queue.push_back(ClarificationRequest::from_input(input, source_id.to_string()));
        }
        self.advance(&consumer_id).await;
        Ok(())
    }

    /// Among all live consumer sessions, pick the one with the shortest
    /// current queue length; ties broken by earliest registration.
    async fn select_consumer(&self) -> Option<String> {
        let consumers = self.registry.consumer_sessions().await;
        if consumers.is_empty() {
            return None;
        }
        let state = self.inner.read().await;
        consumers
            .into_iter()
            .map(|(id, registered_at)| {
                let queue_len = state.consumers.get(&id).map(|c| c.queue.len()).unwrap_or(0);
                (queue_len, registered_at, id)
            })
            .min_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)))
            .map(|(_, _, id)| id)
    }

    /// If `consumer_id` has no active request, promote its queue head to
    /// `active` and deliver it. Idempotent when the head is already active.
    pub async fn advance(&self, consumer_id: &str) {
        let promoted = {
            let mut state = self.inner.write().await;
            let Some(entry) = state.consumers.get_mut(consumer_id) else {
                return;
            };
            match entry.queue.front_mut() {
                Some(front) if front.status == ClarificationStatus::Active => return,
                Some(front) => {
                    front.status = ClarificationStatus::Active;
                    Some(front.clone())
                }
                None => None,
            }
        };
        let Some(req) = promoted else {
            return;
        };
        if let Some(session) = self.registry.get(consumer_id).await {
            let data = serde_json::to_value(&req).unwrap_or_default();
            let env = Envelope::new(EnvelopeKind::Clarification, req.source_client_id.clone(), Role::Producer, data);
            let _ = session.send(env);
        }
    }

    /// Locate the active request matching `request_id` in any consumer's
    /// queue, remove it, emit a `response` to its originating producer, then
    /// advance that consumer's queue. Unknown request ids (a late duplicate
    /// reply) are ignored.
    pub async fn handle_reply(&self, request_id: &str, answer: String, from_consumer_id: &str) {
        let found = {
            let mut state = self.inner.write().await;
            let mut found = None;
            for (consumer_id, entry) in state.consumers.iter_mut() {
                if let Some(idx) = entry
                    .queue
                    .iter()
                    .position(|r| r.id == request_id && r.status == ClarificationStatus::Active)
                {
                    if let Some(req) = entry.queue.remove(idx) {
                        found = Some((consumer_id.clone(), req));
                    }
                    break;
                }
            }
            found
        };
        let Some((owning_consumer, req)) = found else {
            return;
        };
        if owning_consumer != from_consumer_id {
            tracing::warn!(
                request_id,
                from_consumer_id,
                owning_consumer = owning_consumer.as_str(),
                "reply arrived on a different connection than the one holding the active request"
            );
        }
        if let Some(session) = self.registry.get(&req.source_client_id).await {
            let payload = ResponsePayload {
                request_id: request_id.to_string(),
                response: Some(answer),
                error: None,
                cli_id: Some(owning_consumer.clone()),
            };
            let env = Envelope::new(
                EnvelopeKind::Response,
                req.source_client_id.clone(),
                Role::Producer,
                serde_json::to_value(&payload).unwrap_or_default(),
            );
            let _ = session.send(env);
        }
        self.advance(&owning_consumer).await;
    }

    /// Fan a yap out to every live consumer's reorder buffer.
    pub async fn route_yap(self: &Arc<Self>, yap: YapMessage, source_id: &str) {
        for consumer_id in self.registry.consumer_ids().await {
            self.clone().enqueue_yap(consumer_id, source_id.to_string(), yap.clone()).await;
        }
    }

    async fn enqueue_yap(self: Arc<Self>, consumer_id: String, source_client_id: String, yap: YapMessage) {
        {
            let mut state = self.inner.write().await;
            let entry = state.consumers.entry(consumer_id.clone()).or_default();
            entry.yap_buffer.push(BufferedYap { source_client_id, yap });
            entry.yap_buffer.sort_by_key(|b| b.yap.timestamp);
            if entry.yap_buffer.len() > MAX_YAP_BUFFER {
                let excess = entry.yap_buffer.len() - MAX_YAP_BUFFER;
                entry.yap_buffer.drain(0..excess);
            }
            if let Some(prev) = entry.yap_cancel.take() {
                prev.cancel();
            }
            entry.yap_cancel = Some(CancellationToken::new());
        }
        let cancel = {
            let state = self.inner.read().await;
            state.consumers.get(&consumer_id).and_then(|c| c.yap_cancel.clone())
        };
        let Some(cancel) = cancel else {
            return;
        };
        let delay = Duration::from_millis(self.config.yap_buffer_ms);
        let router = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => router.flush_yaps(&consumer_id).await,
                _ = cancel.cancelled() => {}
            }
        });
    }

    async fn flush_yaps(&self, consumer_id: &str) {
        let buffered = {
            let mut state = self.inner.write().await;
            let Some(entry) = state.consumers.get_mut(consumer_id) else {
                return;
            };
            entry.yap_cancel = None;
            std::mem::take(&mut entry.yap_buffer)
        };
        let Some(session) = self.registry.get(consumer_id).await else {
            return;
        };
        for buffered_yap in buffered {
            let data = serde_json::to_value(&buffered_yap.yap).unwrap_or_default();
            let env = Envelope::new(EnvelopeKind::Yap, buffered_yap.source_client_id, Role::Producer, data);
            let _ = session.send(env);
        }
    }

    /// A consumer session was lost. Its queue and buffer are discarded and
    /// every pending request is signalled as a timed-out response to its
    /// producer; the router does not redistribute them.
    pub async fn on_consumer_loss(&self, consumer_id: &str) {
        let queue = {
            let mut state = self.inner.write().await;
            state.consumers.remove(consumer_id).map(|entry| entry.queue).unwrap_or_default()
        };
        for req in queue {
            if let Some(session) = self.registry.get(&req.source_client_id).await {
                let payload = ResponsePayload {
                    request_id: req.id.clone(),
                    response: None,
                    error: Some("Consumer disconnected".to_string()),
                    cli_id: None,
                };
                let env = Envelope::new(
                    EnvelopeKind::Response,
                    req.source_client_id.clone(),
                    Role::Producer,
                    serde_json::to_value(&payload).unwrap_or_default(),
                );
                let _ = session.send(env);
            }
        }
    }

    /// A producer session was lost. Every consumer queue is walked; any
    /// request sourced from it (active or merely queued) is turned into a
    /// synthetic terminal `clarification` envelope with `status: "timeout"`
    /// toward its consumer, then removed. Affected consumers are advanced
    /// afterward so the next request, if any, is promoted.
    pub async fn on_producer_loss(&self, producer_id: &str) {
        let mut to_notify: Vec<(String, ClarificationRequest)> = Vec::new();
        let mut affected_consumers = Vec::new();
        {
            let mut state = self.inner.write().await;
            for (consumer_id, entry) in state.consumers.iter_mut() {
                let before = entry.queue.len();
                let mut remaining = VecDeque::with_capacity(before);
                while let Some(mut req) = entry.queue.pop_front() {
                    if req.source_client_id == producer_id {
                        req.status = ClarificationStatus::Timeout;
                        req.response = None;
                        req.reason = Some("Source client disconnected".to_string());
                        to_notify.push((consumer_id.clone(), req));
                    } else {
                        remaining.push_back(req);
                    }
                }
                if remaining.len() != before {
                    affected_consumers.push(consumer_id.clone());
                }
                entry.queue = remaining;
            }
        }
        for (consumer_id, req) in to_notify {
            tracing::debug!(
                producer_id,
                consumer_id = consumer_id.as_str(),
                request_id = req.id.as_str(),
                code = %BrokerErrorCode::SourceDisconnect,
                "notifying consumer of source disconnect"
            );
            if let Some(session) = self.registry.get(&consumer_id).await {
                let data = serde_json::to_value(&req).unwrap_or_default();
                let env = Envelope::new(EnvelopeKind::Clarification, producer_id.to_string(), Role::Producer, data);
                let _ = session.send(env);
            }
        }
        for consumer_id in affected_consumers {
            self.advance(&consumer_id).await;
        }
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
