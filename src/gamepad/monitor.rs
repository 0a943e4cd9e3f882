//! Per-device connection lifecycle.
//!
//! A small state machine, `Disconnected ↔ Connected`, drives when sampling
//! runs for one device slot. Connecting spawns a fresh sampling session;
//! disconnecting cancels it, waits for the task to finish, then clears the
//! replay cache. Disconnects are a terminal lifecycle event for the
//! session, never an error, and a renewed connect starts from scratch.

use std::sync::Arc;

use statum::{machine, state};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::handle::StreamSet;
use super::sampler::run_sampling_session;
use super::source::{ConnectionSignal, SnapshotSource};

/// Data carried by the connected state: the handles that tear the active
/// sampling session down. `finished` fires when the session task has
/// actually exited, cancellation or not.
#[derive(Debug, Clone)]
pub struct Session {
    cancel: CancellationToken,
    finished: CancellationToken,
}

#[state]
#[derive(Debug, Clone)]
pub enum LinkState {
    Disconnected,
    Connected(Session),
}

#[machine]
pub struct DeviceMonitor<S: LinkState> {
    device_index: usize,
    source: Arc<dyn SnapshotSource>,
    signals: broadcast::Receiver<ConnectionSignal>,
    poll_interval: Duration,
    streams: Arc<StreamSet>,
}

impl DeviceMonitor<Disconnected> {
    pub(crate) fn create(
        device_index: usize,
        source: Arc<dyn SnapshotSource>,
        signals: broadcast::Receiver<ConnectionSignal>,
        poll_interval: Duration,
        streams: Arc<StreamSet>,
    ) -> Self {
        debug!(device = device_index, "device monitor created");
        Self::new(device_index, source, signals, poll_interval, streams)
    }

    /// Block until a connect signal for the managed slot arrives, then
    /// start a sampling session. Returns `None` when the signal source has
    /// shut down for good.
    pub(crate) async fn await_connect(mut self) -> Option<DeviceMonitor<Connected>> {
        loop {
            match self.signals.recv().await {
                Ok(ConnectionSignal::Connected(index)) if index == self.device_index => {
                    let cancel = CancellationToken::new();
                    let finished = CancellationToken::new();
                    tokio::spawn(run_sampling_session(
                        Arc::clone(&self.source),
                        self.device_index,
                        self.poll_interval,
                        Arc::clone(&self.streams),
                        cancel.clone(),
                        finished.clone(),
                    ));
                    info!(device = self.device_index, "device connected");
                    return Some(self.transition_with(Session { cancel, finished }));
                }
                Ok(signal) => {
                    debug!(device = self.device_index, ?signal, "signal ignored");
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(
                        device = self.device_index,
                        missed, "connection signals lagged"
                    );
                }
                Err(RecvError::Closed) => {
                    info!(
                        device = self.device_index,
                        "signal source closed, monitor stopping"
                    );
                    return None;
                }
            }
        }
    }
}

impl DeviceMonitor<Connected> {
    /// Block until the managed slot disconnects, then tear the session
    /// down. Returns `None` when the signal source has shut down (the
    /// session is torn down in that case too).
    pub(crate) async fn await_disconnect(mut self) -> Option<DeviceMonitor<Disconnected>> {
        loop {
            match self.signals.recv().await {
                Ok(ConnectionSignal::Disconnected(index)) if index == self.device_index => {
                    self.end_session().await;
                    info!(
                        device = self.device_index,
                        "device disconnected, session terminated"
                    );
                    return Some(self.transition());
                }
                Ok(ConnectionSignal::Connected(index)) if index == self.device_index => {
                    debug!(
                        device = self.device_index,
                        "duplicate connect while connected, ignored"
                    );
                }
                Ok(signal) => {
                    debug!(device = self.device_index, ?signal, "signal ignored");
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(
                        device = self.device_index,
                        missed, "connection signals lagged"
                    );
                }
                Err(RecvError::Closed) => {
                    self.end_session().await;
                    info!(
                        device = self.device_index,
                        "signal source closed, monitor stopping"
                    );
                    return None;
                }
            }
        }
    }

    async fn end_session(&self) {
        // Clearing the replay cache must come after the old task's last
        // publish and before the next session's first one, so wait for the
        // task to actually exit before touching the cache.
        if let Some(session) = self.get_state_data() {
            session.cancel.cancel();
            session.finished.cancelled().await;
            self.streams.snapshots.clear();
        }
    }
}

/// Drive one device's monitor until the signal source shuts down.
pub(crate) async fn run_monitor_loop(monitor: DeviceMonitor<Disconnected>) {
    let mut monitor = monitor;
    loop {
        let Some(connected) = monitor.await_connect().await else {
            return;
        };
        let Some(next) = connected.await_disconnect().await else {
            return;
        };
        monitor = next;
    }
}
