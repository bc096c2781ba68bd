// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Graceful shutdown coordination.
//!
//! The first stop request wins and is remembered as a [`StopReason`]; every
//! subscriber receives that reason once. Later requests are ignored.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio::sync::broadcast;
use tracing::{info, warn};

// =============================================================================
// StopReason
// =============================================================================

/// Why the process is stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// An operating system signal (`SIGTERM`, `SIGINT`, Ctrl+C).
    Signal(&'static str),
    /// Requested from code.
    Requested,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(name) => write!(f, "received {name}"),
            Self::Requested => f.write_str("requested"),
        }
    }
}

// =============================================================================
// ShutdownCoordinator
// =============================================================================

/// Shared stop switch for the runtime tasks.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    notify: broadcast::Sender<StopReason>,
    reason: Arc<OnceLock<StopReason>>,
}

impl ShutdownCoordinator {
    /// Creates a coordinator that has not stopped yet.
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(1);
        Self {
            notify,
            reason: Arc::new(OnceLock::new()),
        }
    }

    /// Receiver for the stop notification.
    pub fn subscribe(&self) -> broadcast::Receiver<StopReason> {
        self.notify.subscribe()
    }

    /// Future-style handle, see [`ShutdownSignal::wait`].
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.notify.subscribe(),
            reason: Arc::clone(&self.reason),
        }
    }

    /// Stops with [`StopReason::Requested`].
    pub fn initiate_shutdown(&self) {
        self.stop(StopReason::Requested);
    }

    /// Records `reason` and notifies subscribers. Only the first call counts.
    pub fn stop(&self, reason: StopReason) -> bool {
        if self.reason.set(reason).is_err() {
            return false;
        }
        info!(reason = %reason, "Stopping");
        let _ = self.notify.send(reason);
        true
    }

    /// Whether a stop was requested.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.reason.get().is_some()
    }

    /// The recorded stop reason.
    pub fn reason(&self) -> Option<StopReason> {
        self.reason.get().copied()
    }

    /// Resolves on the first OS signal or [`stop`](Self::stop) call.
    pub async fn wait_for_shutdown(&self) -> StopReason {
        let signal = self.shutdown_signal();
        if let Some(reason) = self.reason() {
            return reason;
        }

        tokio::select! {
            name = os_signal() => {
                self.stop(StopReason::Signal(name));
                self.reason().unwrap_or(StopReason::Signal(name))
            }
            reason = signal.wait() => reason,
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn os_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let handlers = signal(SignalKind::terminate()).and_then(|term| {
        signal(SignalKind::interrupt()).map(|int| (term, int))
    });
    match handlers {
        Ok((mut term, mut int)) => tokio::select! {
            _ = term.recv() => "SIGTERM",
            _ = int.recv() => "SIGINT",
        },
        Err(e) => {
            warn!(error = %e, "Signal handlers unavailable, listening for Ctrl+C only");
            ctrl_c().await
        }
    }
}

#[cfg(not(unix))]
async fn os_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    "Ctrl+C"
}

// =============================================================================
// ShutdownSignal
// =============================================================================

/// One-shot view of the coordinator.
pub struct ShutdownSignal {
    receiver: broadcast::Receiver<StopReason>,
    reason: Arc<OnceLock<StopReason>>,
}

impl ShutdownSignal {
    /// Resolves with the stop reason, immediately if already stopped.
    pub async fn wait(mut self) -> StopReason {
        if let Some(reason) = self.reason.get() {
            return *reason;
        }
        match self.receiver.recv().await {
            Ok(reason) => reason,
            Err(_) => self.reason.get().copied().unwrap_or(StopReason::Requested),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_reason_wins() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();
        assert!(coordinator.reason().is_none());

        assert!(coordinator.stop(StopReason::Signal("SIGTERM")));
        assert!(!coordinator.stop(StopReason::Requested));

        assert_eq!(coordinator.reason(), Some(StopReason::Signal("SIGTERM")));
        assert_eq!(rx.recv().await.unwrap(), StopReason::Signal("SIGTERM"));
    }

    #[tokio::test]
    async fn test_requested_stop_ends_wait() {
        let coordinator = ShutdownCoordinator::new();
        let trigger = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.initiate_shutdown();
        });

        let reason = tokio::time::timeout(Duration::from_secs(1), coordinator.wait_for_shutdown())
            .await
            .unwrap();
        assert_eq!(reason, StopReason::Requested);
    }

    #[tokio::test]
    async fn test_signal_after_stop_resolves_immediately() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.initiate_shutdown();

        let reason = tokio::time::timeout(Duration::from_millis(100), coordinator.shutdown_signal().wait())
            .await
            .unwrap();
        assert_eq!(reason, StopReason::Requested);
        assert_eq!(StopReason::Signal("SIGINT").to_string(), "received SIGINT");
    }
}
