// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types for the broker protocol: the outer [`Envelope`] and the typed
//! payloads carried in its `data` field.
//!
//! Mirrors the internally-tagged `#[serde(tag = "type")]` enum shape this
//! workspace already uses for its WebSocket and mux event types, adapted to
//! plain newline-delimited JSON over TCP.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One client session's role, fixed at registration. Serialized on the wire
/// as the envelope's `clientType` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "mcp-server")]
    Producer,
    #[serde(rename = "cli")]
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Producer => f.write_str("producer"),
            Role::Consumer => f.write_str("consumer"),
        }
    }
}

/// Envelope kind, the `type` field on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    Register,
    Sync,
    Heartbeat,
    Clarification,
    Yap,
    Response,
    Error,
}

/// The outermost framed message on the wire. One per line, line-feed
/// terminated (see [`crate::wire`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(rename = "clientType")]
    pub client_type: Role,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    pub data: serde_json::Value,
}

impl Envelope {
    /// Build a new envelope, stamping a fresh id and the current wall clock.
    pub fn new(kind: EnvelopeKind, client_id: String, client_type: Role, data: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            client_id,
            client_type,
            timestamp: epoch_ms(),
            sequence: None,
            data,
        }
    }
}

pub fn epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Urgency tag on a clarification request. Opaque to routing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

/// Lifecycle state of a clarification request. Transitions only
/// pending -> active -> (answered | timeout); terminal states are never
/// revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClarificationStatus {
    Pending,
    Active,
    Answered,
    Timeout,
}

/// The producer-submitted fields of a clarification request, as received in
/// a `clarification` envelope's `data` before the router assigns it a status
/// and a home queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationInput {
    pub id: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub urgency: Urgency,
    pub timestamp: i64,
}

/// A clarification request as tracked by the router and delivered to a
/// consumer. `source_client_id` is bookkeeping only; it never appears on the
/// wire. Responses are routed directly to the originating producer's
/// session, recorded here at enqueue time, rather than broadcast to every
/// producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationRequest {
    pub id: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub urgency: Urgency,
    pub timestamp: i64,
    pub status: ClarificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Extra, non-schema field surfaced only on synthetic timeout delivery
    /// (producer disconnected while the request was in flight). Unknown
    /// fields in `data` are preserved and forwarded per the wire contract,
    /// so adding this rather than a new envelope kind is within contract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip)]
    pub source_client_id: String,
}

impl ClarificationRequest {
    pub fn from_input(input: ClarificationInput, source_client_id: String) -> Self {
        Self {
            id: input.id,
            question: input.question,
            context: input.context,
            urgency: input.urgency,
            timestamp: input.timestamp,
            status: ClarificationStatus::Pending,
            response: None,
            reason: None,
            source_client_id,
        }
    }
}

/// A one-way notification. Fanned out to every consumer through the
/// per-consumer reorder buffer (see [`crate::router`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YapMessage {
    pub id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, rename = "task_context", skip_serializing_if = "Option::is_none")]
    pub task_context: Option<serde_json::Value>,
    pub timestamp: i64,
}

/// A response envelope's payload, producer-bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsePayload {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, rename = "cliId", skip_serializing_if = "Option::is_none")]
    pub cli_id: Option<String>,
}

/// A reply envelope's payload, consumer-to-broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerReply {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub response: String,
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
