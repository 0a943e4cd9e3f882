//! Fixed-cadence sampling session.
//!
//! One session task exists per connected device, no matter how many
//! consumers are attached downstream. It publishes the idle snapshot before
//! the first timer tick, then samples the source once per tick in strict
//! order, feeding every deriver and the raw multicast until its
//! cancellation token fires.

use std::sync::Arc;

use chrono::Local;
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::button::ButtonDeriver;
use super::handle::StreamSet;
use super::joystick::JoystickDeriver;
use super::snapshot::{Snapshot, BUTTON_COUNT, JOYSTICK_COUNT};
use super::source::SnapshotSource;

pub(crate) async fn run_sampling_session(
    source: Arc<dyn SnapshotSource>,
    device_index: usize,
    poll_interval: Duration,
    streams: Arc<StreamSet>,
    cancel: CancellationToken,
    finished: CancellationToken,
) {
    // Fires on every exit path, panics included; the monitor waits on it
    // before clearing the replay cache.
    let _finished = finished.drop_guard();

    info!(
        device = device_index,
        interval_ms = poll_interval.as_millis() as u64,
        "sampling session started"
    );

    // Fresh deriver state per session: nothing carries over a reconnect.
    let mut buttons: Vec<ButtonDeriver> = (0..BUTTON_COUNT)
        .map(|i| ButtonDeriver::new(i, &streams.buttons[i]))
        .collect();
    let mut joysticks: Vec<JoystickDeriver> = (0..JOYSTICK_COUNT)
        .map(|i| JoystickDeriver::new(i, &streams.joysticks[i]))
        .collect();

    // The idle snapshot goes out before any timer-driven sample and seeds
    // every deriver's previous value.
    let idle = Snapshot::idle();
    for deriver in &mut buttons {
        deriver.observe(&idle);
    }
    for deriver in &mut joysticks {
        deriver.observe(&idle);
    }
    streams.snapshots.publish(idle);

    let mut ticker = interval(poll_interval);
    let mut ticks: u64 = 0;
    let mut last_stats_time = Local::now();
    let stats_interval = chrono::Duration::seconds(30);

    loop {
        tokio::select! {
            // Cancellation wins over a tick that became ready in the same
            // poll; nothing is published past the disconnect.
            biased;
            _ = cancel.cancelled() => {
                info!(device = device_index, ticks, "sampling session cancelled");
                break;
            }
            _ = ticker.tick() => {
                // A vanished device reads as idle until the disconnect
                // signal tears the session down.
                let snapshot = source
                    .sample(device_index)
                    .unwrap_or_else(Snapshot::idle);

                for deriver in &mut buttons {
                    deriver.observe(&snapshot);
                }
                for deriver in &mut joysticks {
                    deriver.observe(&snapshot);
                }
                streams.snapshots.publish(snapshot);
                ticks += 1;

                let now = Local::now();
                if now - last_stats_time > stats_interval {
                    debug!(
                        device = device_index,
                        ticks,
                        "sampler stats: {:.2} ticks/sec",
                        ticks as f64 / (now - last_stats_time).num_seconds().max(1) as f64
                    );
                    ticks = 0;
                    last_stats_time = now;
                }
            }
        }
    }
}
