// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The broker's error taxonomy: one enum, a stable `as_str()`, a `Display`
//! impl, and no string literals scattered at call sites.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrokerErrorCode {
    WireError,
    RegistrationError,
    NoRoute,
    QueueFull,
    SourceDisconnect,
}

impl BrokerErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WireError => "WIRE_ERROR",
            Self::RegistrationError => "REGISTRATION_ERROR",
            Self::NoRoute => "NO_ROUTE",
            Self::QueueFull => "QUEUE_FULL",
            Self::SourceDisconnect => "SOURCE_DISCONNECT",
        }
    }
}

impl fmt::Display for BrokerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a router routing decision. Never propagated to a peer
/// directly; the broker server converts it into a `response` envelope's
/// `error` string.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouterError {
    #[error("No CLI clients available")]
    NoConsumerAvailable,
    #[error("queue full")]
    QueueFull,
}

impl RouterError {
    pub fn code(&self) -> BrokerErrorCode {
        match self {
            Self::NoConsumerAvailable => BrokerErrorCode::NoRoute,
            Self::QueueFull => BrokerErrorCode::QueueFull,
        }
    }
}

/// Failure to hand an envelope to a session's outbound queue.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SendError {
    #[error("not connected")]
    NotConnected,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
