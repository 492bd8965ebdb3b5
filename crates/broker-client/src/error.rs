// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-side error taxonomy: one enum, `thiserror` messages, no scattered
//! string literals.

#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    #[error("could not reach broker at {addr} ({source}); start one with `coop broker --port {port}`")]
    ConnectionRefused { addr: String, port: u16, source: String },
    #[error("not connected")]
    NotConnected,
    #[error("registration rejected: {0}")]
    RegistrationRejected(String),
    #[error("response timeout")]
    ReplyTimeout,
    #[error("connection lost")]
    ConnectionLost,
    #[error("{0}")]
    Remote(String),
}
