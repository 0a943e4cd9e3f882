//! Public facade over one device's derived event streams.
//!
//! All streams are built once at construction and survive reconnects; the
//! sampling sessions behind them come and go with the device. Accessors
//! take integer indices and check them explicitly: an out-of-range index
//! is a caller error reported as [`GamepadError`], never an out-of-bounds
//! lookup.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::Duration;
use tracing::info;

use crate::config::Settings;

use super::button::ButtonStreams;
use super::joystick::{JoystickCoordinates, JoystickDirection, JoystickStreams};
use super::monitor::{run_monitor_loop, DeviceMonitor};
use super::multicast::{Multicast, Replay};
use super::snapshot::{ButtonState, Change, Snapshot, BUTTON_COUNT, JOYSTICK_COUNT};
use super::source::{ConnectionSignal, GilrsSource, SnapshotSource, SourceError};

#[derive(Debug, thiserror::Error)]
pub enum GamepadError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Button index {0} out of range (0..17)")]
    ButtonIndexOutOfRange(usize),

    #[error("Joystick index {0} out of range (0..2)")]
    JoystickIndexOutOfRange(usize),
}

/// The pre-built fan-out set for one device: the raw snapshot multicast
/// plus fixed-size arrays of per-index event senders.
pub(crate) struct StreamSet {
    pub(crate) snapshots: Multicast<Snapshot>,
    pub(crate) buttons: [ButtonStreams; BUTTON_COUNT],
    pub(crate) joysticks: [JoystickStreams; JOYSTICK_COUNT],
}

impl StreamSet {
    fn new(capacity: usize) -> Self {
        Self {
            snapshots: Multicast::new(capacity),
            buttons: std::array::from_fn(|_| ButtonStreams::new(capacity)),
            joysticks: std::array::from_fn(|_| JoystickStreams::new(capacity)),
        }
    }
}

/// Handle for one device slot's event streams.
///
/// Construction spawns the lifecycle monitor task, so it must run inside a
/// tokio runtime. Dropping the handle does not stop the monitor; receivers
/// already handed out keep working.
pub struct GamepadHandle {
    device_index: usize,
    streams: Arc<StreamSet>,
}

impl GamepadHandle {
    /// Build the stream set for `device_index` on top of the gilrs backend.
    ///
    /// Fails when the host has no gamepad capability at all, the only
    /// fatal error in the lifecycle.
    pub fn new(device_index: usize, settings: Settings) -> Result<Self, GamepadError> {
        let source = GilrsSource::new()?;
        let signals = source.signals();
        let handle = Self::with_source(device_index, settings.clone(), Arc::clone(&source) as Arc<dyn SnapshotSource>, signals);
        // Scan only once the monitor holds its receiver; an announcement
        // for an already-plugged-in pad sent to an empty channel is gone
        // for good.
        source.start(settings.pump_interval_ms);
        Ok(handle)
    }

    /// Build the stream set on top of a custom source and signal channel.
    pub fn with_source(
        device_index: usize,
        settings: Settings,
        source: Arc<dyn SnapshotSource>,
        signals: broadcast::Receiver<ConnectionSignal>,
    ) -> Self {
        info!(device = device_index, "building gamepad event streams");
        let streams = Arc::new(StreamSet::new(settings.channel_capacity));
        let monitor = DeviceMonitor::create(
            device_index,
            source,
            signals,
            Duration::from_millis(settings.poll_interval_ms),
            Arc::clone(&streams),
        );
        tokio::spawn(run_monitor_loop(monitor));

        Self {
            device_index,
            streams,
        }
    }

    pub fn device_index(&self) -> usize {
        self.device_index
    }

    /// Up-to-down edges for the button at `index`.
    pub fn button_pressed(
        &self,
        index: usize,
    ) -> Result<broadcast::Receiver<Change<ButtonState>>, GamepadError> {
        Ok(self.button_streams(index)?.pressed.subscribe())
    }

    /// Down-to-up edges for the button at `index`.
    pub fn button_released(
        &self,
        index: usize,
    ) -> Result<broadcast::Receiver<Change<ButtonState>>, GamepadError> {
        Ok(self.button_streams(index)?.released.subscribe())
    }

    /// Analog value changes for the button at `index`.
    pub fn button_changed(
        &self,
        index: usize,
    ) -> Result<broadcast::Receiver<Change<ButtonState>>, GamepadError> {
        Ok(self.button_streams(index)?.changed.subscribe())
    }

    /// Coordinate changes for the joystick at `index`.
    pub fn joystick_moved(
        &self,
        index: usize,
    ) -> Result<broadcast::Receiver<Change<JoystickCoordinates>>, GamepadError> {
        Ok(self.joystick_streams(index)?.moved.subscribe())
    }

    /// Angle changes for the joystick at `index`.
    pub fn joystick_direction(
        &self,
        index: usize,
    ) -> Result<broadcast::Receiver<Change<JoystickDirection>>, GamepadError> {
        Ok(self.joystick_streams(index)?.direction.subscribe())
    }

    /// Every sampled snapshot at the fixed cadence, with the most recent
    /// one replayed to late subscribers.
    pub fn snapshots(&self) -> Replay<Snapshot> {
        self.streams.snapshots.subscribe()
    }

    fn button_streams(&self, index: usize) -> Result<&ButtonStreams, GamepadError> {
        self.streams
            .buttons
            .get(index)
            .ok_or(GamepadError::ButtonIndexOutOfRange(index))
    }

    fn joystick_streams(&self, index: usize) -> Result<&JoystickStreams, GamepadError> {
        self.streams
            .joysticks
            .get(index)
            .ok_or(GamepadError::JoystickIndexOutOfRange(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::broadcast::error::TryRecvError;

    /// Source that serves a fixed list of frames, then keeps repeating the
    /// last one, the way real hardware holds its state between changes.
    struct ScriptedSource {
        frames: Mutex<VecDeque<Snapshot>>,
        held: Mutex<Snapshot>,
    }

    impl ScriptedSource {
        fn new(frames: Vec<Snapshot>) -> Arc<Self> {
            Arc::new(Self {
                frames: Mutex::new(frames.into()),
                held: Mutex::new(Snapshot::idle()),
            })
        }
    }

    impl SnapshotSource for ScriptedSource {
        fn sample(&self, _device_index: usize) -> Option<Snapshot> {
            let mut frames = self.frames.lock().unwrap();
            match frames.pop_front() {
                Some(frame) => {
                    *self.held.lock().unwrap() = frame.clone();
                    Some(frame)
                }
                None => Some(self.held.lock().unwrap().clone()),
            }
        }
    }

    fn frame_with_axes(axes: Vec<f32>) -> Snapshot {
        Snapshot {
            axes,
            ..Snapshot::idle()
        }
    }

    fn frame_with_button(index: usize, state: ButtonState) -> Snapshot {
        let mut snap = Snapshot::idle();
        snap.buttons[index] = state;
        snap
    }

    fn test_handle(
        frames: Vec<Snapshot>,
    ) -> (GamepadHandle, broadcast::Sender<ConnectionSignal>) {
        let (signal_tx, signal_rx) = broadcast::channel(8);
        let source = ScriptedSource::new(frames);
        let handle = GamepadHandle::with_source(0, Settings::default(), source, signal_rx);
        (handle, signal_tx)
    }

    /// Let in-flight publishes settle, then drain until a full poll window
    /// passes with nothing new.
    async fn drain_until_quiet(snapshots: &mut Replay<Snapshot>) {
        loop {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let mut saw_any = false;
            while snapshots.try_recv().is_ok() {
                saw_any = true;
            }
            if !saw_any {
                break;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_snapshot_precedes_first_live_sample() {
        let live = frame_with_axes(vec![0.5, 0.0, 0.0, 0.0]);
        let (handle, signal_tx) = test_handle(vec![live.clone()]);
        let mut snapshots = handle.snapshots();

        signal_tx.send(ConnectionSignal::Connected(0)).unwrap();

        assert_eq!(snapshots.recv().await.unwrap(), Snapshot::idle());
        assert_eq!(snapshots.recv().await.unwrap(), live);
    }

    #[tokio::test(start_paused = true)]
    async fn axis_sequence_yields_one_coordinate_event_and_no_direction() {
        let frames = vec![
            frame_with_axes(vec![0.0, 0.0, 0.0, 0.0]),
            frame_with_axes(vec![0.0, 0.0, 0.0, 0.0]),
            frame_with_axes(vec![1.0, 0.0, 0.0, 0.0]),
        ];
        let (handle, signal_tx) = test_handle(frames);
        let mut moved = handle.joystick_moved(0).unwrap();
        let mut direction = handle.joystick_direction(0).unwrap();
        let mut snapshots = handle.snapshots();

        signal_tx.send(ConnectionSignal::Connected(0)).unwrap();

        // Idle plus the three scripted ticks.
        for _ in 0..4 {
            snapshots.recv().await.unwrap();
        }

        let change = moved.recv().await.unwrap();
        assert_eq!(change.previous, JoystickCoordinates { x: 0.0, y: 0.0 });
        assert_eq!(change.current, JoystickCoordinates { x: 1.0, y: 0.0 });
        assert!(matches!(moved.try_recv(), Err(TryRecvError::Empty)));
        // Angle holds at 0 across the whole sequence (origin reads as 0).
        assert!(matches!(direction.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn button_press_travels_end_to_end() {
        let pressed_state = ButtonState {
            pressed: true,
            touched: true,
            value: 1.0,
        };
        let frames = vec![Snapshot::idle(), frame_with_button(4, pressed_state)];
        let (handle, signal_tx) = test_handle(frames);
        let mut pressed = handle.button_pressed(4).unwrap();
        let mut released = handle.button_released(4).unwrap();

        signal_tx.send(ConnectionSignal::Connected(0)).unwrap();

        let change = pressed.recv().await.unwrap();
        assert!(!change.previous.pressed);
        assert_eq!(change.current, pressed_state);
        assert!(matches!(released.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn late_subscriber_gets_latest_snapshot_without_waiting() {
        let live = frame_with_axes(vec![0.25, 0.0, 0.0, 0.0]);
        let (handle, signal_tx) = test_handle(vec![live.clone()]);
        let mut early = handle.snapshots();

        signal_tx.send(ConnectionSignal::Connected(0)).unwrap();
        assert_eq!(early.recv().await.unwrap(), Snapshot::idle());
        assert_eq!(early.recv().await.unwrap(), live);

        // The replay slot hands the current value over synchronously.
        let mut late = handle.snapshots();
        assert_eq!(late.try_recv().unwrap(), live);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_starts_with_idle_for_everyone() {
        let live = frame_with_axes(vec![0.5, 0.0, 0.0, 0.0]);
        let (handle, signal_tx) = test_handle(vec![live.clone()]);
        let mut snapshots = handle.snapshots();

        signal_tx.send(ConnectionSignal::Connected(0)).unwrap();
        assert_eq!(snapshots.recv().await.unwrap(), Snapshot::idle());
        assert_eq!(snapshots.recv().await.unwrap(), live);

        signal_tx.send(ConnectionSignal::Disconnected(0)).unwrap();
        drain_until_quiet(&mut snapshots).await;

        // While disconnected, a new subscriber has nothing to replay.
        let mut during_gap = handle.snapshots();
        assert!(matches!(during_gap.try_recv(), Err(TryRecvError::Empty)));

        signal_tx.send(ConnectionSignal::Connected(0)).unwrap();
        assert_eq!(snapshots.recv().await.unwrap(), Snapshot::idle());
        assert_eq!(during_gap.recv().await.unwrap(), Snapshot::idle());
        // Live samples only after the idle value.
        assert_eq!(snapshots.recv().await.unwrap(), live);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_announced_right_after_construction_is_not_lost() {
        let (signal_tx, signal_rx) = broadcast::channel(8);
        let source = ScriptedSource::new(vec![]);
        let handle = GamepadHandle::with_source(0, Settings::default(), source, signal_rx);

        // A backend scanning for already-plugged-in pads publishes before
        // the monitor task has ever been polled; the receiver handed over
        // at construction must buffer the signal, not drop it.
        assert_eq!(signal_tx.send(ConnectionSignal::Connected(0)).unwrap(), 1);

        let mut snapshots = handle.snapshots();
        assert_eq!(snapshots.recv().await.unwrap(), Snapshot::idle());
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_reconnect_keeps_the_fresh_idle_in_replay() {
        let live = frame_with_axes(vec![0.5, 0.0, 0.0, 0.0]);
        let (handle, signal_tx) = test_handle(vec![live.clone()]);
        let mut snapshots = handle.snapshots();

        signal_tx.send(ConnectionSignal::Connected(0)).unwrap();
        assert_eq!(snapshots.recv().await.unwrap(), Snapshot::idle());
        assert_eq!(snapshots.recv().await.unwrap(), live);

        // Teardown and reconnect back to back. The old session's exit must
        // not erase what the new session publishes.
        signal_tx.send(ConnectionSignal::Disconnected(0)).unwrap();
        signal_tx.send(ConnectionSignal::Connected(0)).unwrap();

        // The first session only ever emits idle as its opening publish,
        // and that one is consumed above; the next idle seen belongs to
        // the new session.
        loop {
            if snapshots.recv().await.unwrap() == Snapshot::idle() {
                break;
            }
        }

        // From here on the replay slot is never empty again.
        let mut late = handle.snapshots();
        assert!(late.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_session_publishes_nothing_and_reports_exit() {
        use super::super::sampler::run_sampling_session;
        use tokio_util::sync::CancellationToken;

        let streams = Arc::new(StreamSet::new(8));
        let source = ScriptedSource::new(vec![]);
        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();
        tokio::spawn(run_sampling_session(
            source,
            0,
            Duration::from_millis(15),
            Arc::clone(&streams),
            cancel.clone(),
            finished.clone(),
        ));

        let mut snapshots = streams.snapshots.subscribe();
        assert_eq!(snapshots.recv().await.unwrap(), Snapshot::idle());

        cancel.cancel();
        // Anything this receiver picks up beyond the replayed cache was
        // broadcast after the cancellation.
        let mut post = streams.snapshots.subscribe();
        let _ = post.try_recv();

        finished.cancelled().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(matches!(post.try_recv(), Err(TryRecvError::Empty)));

        // The task is gone, so a clear now cannot race one of its publishes.
        streams.snapshots.clear();
        let mut after_clear = streams.snapshots.subscribe();
        assert!(matches!(after_clear.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_stops_emission_until_reconnect() {
        let (handle, signal_tx) = test_handle(vec![]);
        let mut snapshots = handle.snapshots();

        signal_tx.send(ConnectionSignal::Connected(0)).unwrap();
        assert_eq!(snapshots.recv().await.unwrap(), Snapshot::idle());

        signal_tx.send(ConnectionSignal::Disconnected(0)).unwrap();
        drain_until_quiet(&mut snapshots).await;

        // A full second of paused time passes with no session running.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(matches!(snapshots.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn signals_for_other_slots_are_ignored() {
        let (handle, signal_tx) = test_handle(vec![]);
        let mut snapshots = handle.snapshots();

        signal_tx.send(ConnectionSignal::Connected(1)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(matches!(snapshots.try_recv(), Err(TryRecvError::Empty)));

        signal_tx.send(ConnectionSignal::Connected(0)).unwrap();
        assert_eq!(snapshots.recv().await.unwrap(), Snapshot::idle());
    }

    #[tokio::test]
    async fn out_of_range_indices_are_rejected() {
        let (handle, _signal_tx) = test_handle(vec![]);

        assert!(matches!(
            handle.button_pressed(BUTTON_COUNT),
            Err(GamepadError::ButtonIndexOutOfRange(17))
        ));
        assert!(matches!(
            handle.button_released(usize::MAX),
            Err(GamepadError::ButtonIndexOutOfRange(_))
        ));
        assert!(matches!(
            handle.joystick_moved(JOYSTICK_COUNT),
            Err(GamepadError::JoystickIndexOutOfRange(2))
        ));
        assert!(matches!(
            handle.joystick_direction(5),
            Err(GamepadError::JoystickIndexOutOfRange(5))
        ));

        // The top of each valid range is accepted.
        assert!(handle.button_changed(BUTTON_COUNT - 1).is_ok());
        assert!(handle.joystick_moved(JOYSTICK_COUNT - 1).is_ok());
    }
}
