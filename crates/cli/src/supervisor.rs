// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The broker supervisor: at producer startup, acquire or spawn exactly one
//! broker. A successful `TcpListener::bind` is treated as the right to own
//! the server loop; losing that race means another process already bound
//! the port, so this process attaches instead. An in-process atomic flag
//! settles the same race between two tasks in this process before either
//! one touches the socket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use coop_broker::{Broker, BrokerConfig};

const PROBE_TIMEOUT: Duration = Duration::from_millis(300);
const SOFT_LOCK_POLL: Duration = Duration::from_millis(25);

/// Cooperative in-process lock: prevents two tasks in the same process from
/// racing to spawn a broker. Across processes the race is resolved by the
/// listen bind itself failing for the second bidder (see [`ensure_broker`]).
static IS_STARTING: AtomicBool = AtomicBool::new(false);

/// Which role this process ended up playing for the broker it is now
/// connected to.
pub enum Ownership {
    /// A broker was already listening; this process must not stop it.
    Attached,
    /// This process bound the port and owns the broker's lifetime.
    Owner(OwnerHandle),
}

/// Handle to an owned, in-process broker. Only an owner may call
/// [`OwnerHandle::stop`]; an attached caller has no handle to begin with.
pub struct OwnerHandle {
    shutdown: CancellationToken,
    task: JoinHandle<anyhow::Result<()>>,
}

impl OwnerHandle {
    /// Cancel the broker's shutdown token and wait for its accept loop to
    /// exit. Safe to call once; subsequent calls on an already-joined
    /// handle would panic on the second `await`, so callers must consume
    /// `self` (enforced by taking it by value).
    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.task.await;
    }
}

/// Probe for a listening broker at `config.host:config.port`; if none
/// answers, bind and spawn one in-process. Returns [`Ownership::Attached`]
/// if another broker (in this process or another) already owns the port.
pub async fn ensure_broker(config: BrokerConfig) -> anyhow::Result<Ownership> {
    if probe(&config).await {
        return Ok(Ownership::Attached);
    }

    // Soft lock: wait out any concurrent spawn attempt already underway in
    // this process rather than racing it on the same bind.
    while IS_STARTING.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
        tokio::time::sleep(SOFT_LOCK_POLL).await;
        if probe(&config).await {
            return Ok(Ownership::Attached);
        }
    }

    let outcome = spawn_owned(config.clone()).await;
    IS_STARTING.store(false, Ordering::Release);

    match outcome {
        Ok(owner) => Ok(Ownership::Owner(owner)),
        Err(bind_err) => {
            // The bind lost a cross-process race to another bidder. Fall
            // back to attaching to whatever now owns the port.
            if probe(&config).await {
                Ok(Ownership::Attached)
            } else {
                Err(bind_err.into())
            }
        }
    }
}

async fn probe(config: &BrokerConfig) -> bool {
    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect((config.host.as_str(), config.port))).await,
        Ok(Ok(_))
    )
}

async fn spawn_owned(config: BrokerConfig) -> std::io::Result<OwnerHandle> {
    let broker = Broker::new(config);
    let listener = broker.bind().await?;
    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());
    let task_shutdown = shutdown.clone();
    let task = tokio::spawn(async move { broker.serve(listener, task_shutdown).await });
    Ok(OwnerHandle { shutdown, task })
}

/// Stop the owned broker on SIGINT/SIGTERM. Installed for every owner, not
/// just the standalone `coop broker` command.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();
        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => tracing::info!("received SIGTERM, stopping owned broker"),
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => tracing::info!("received SIGINT, stopping owned broker"),
            _ = shutdown.cancelled() => {}
        }
        shutdown.cancel();
    });
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
