//! Snapshot provider interface and the gilrs production backend.
//!
//! The sampling pipeline only depends on two things from the outside world:
//! a [`SnapshotSource`] it can sample on demand, and a process-wide channel
//! of [`ConnectionSignal`]s telling it when devices at fixed indices appear
//! and vanish. [`GilrsSource`] supplies both on top of gilrs, assigning
//! hardware ids to slots 0..3 in arrival order.

use std::sync::{Arc, Mutex};

use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use tokio::sync::broadcast;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

use super::snapshot::{ButtonState, Snapshot, AXIS_COUNT, BUTTON_COUNT};

/// Upper bound on simultaneously tracked devices.
pub const MAX_DEVICES: usize = 4;

/// Process-wide connect/disconnect notification, tagged with the device
/// slot it concerns. Monitors filter by their own index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionSignal {
    Connected(usize),
    Disconnected(usize),
}

/// On-demand provider of the current raw state for a device slot.
///
/// `sample` is side-effect-free and callable at arbitrary frequency;
/// `None` means no device currently occupies the slot.
pub trait SnapshotSource: Send + Sync {
    fn sample(&self, device_index: usize) -> Option<Snapshot>;
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to initialize gamepad backend: {0}")]
    InitializationError(String),
}

/// Standard controller button register, in snapshot slot order.
const BUTTON_LAYOUT: [Button; BUTTON_COUNT] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::LeftThumb,
    Button::RightThumb,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
    Button::Mode,
];

/// Stick axes in snapshot slot order, two consecutive slots per joystick.
const AXIS_LAYOUT: [Axis; AXIS_COUNT] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::RightStickX,
    Axis::RightStickY,
];

/// gilrs-backed snapshot source with slot assignment.
///
/// A pump task drains gilrs events on a short interval; that both refreshes
/// the cached gamepad state that [`sample`](SnapshotSource::sample) reads
/// and surfaces connect/disconnect transitions as [`ConnectionSignal`]s.
pub struct GilrsSource {
    gilrs: Mutex<Gilrs>,
    slots: Mutex<[Option<GamepadId>; MAX_DEVICES]>,
    signals: broadcast::Sender<ConnectionSignal>,
}

impl GilrsSource {
    /// Initialize the backend without touching the device roster yet.
    ///
    /// Fails when the host exposes no gamepad capability at all; there is
    /// nothing to recover into, so this is the one fatal construction error.
    pub fn new() -> Result<Arc<Self>, SourceError> {
        let gilrs = Gilrs::new().map_err(|e| {
            error!("failed to initialize gilrs: {}", e);
            SourceError::InitializationError(e.to_string())
        })?;
        info!("gilrs backend initialized");

        let (signals, _) = broadcast::channel(16);
        Ok(Arc::new(Self {
            gilrs: Mutex::new(gilrs),
            slots: Mutex::new([None; MAX_DEVICES]),
            signals,
        }))
    }

    /// Announce devices plugged in before startup, then start the pump task.
    ///
    /// A broadcast send with no receivers drops the value, so every
    /// interested party must hold a receiver from [`signals`](Self::signals)
    /// before this runs.
    pub fn start(self: Arc<Self>, pump_interval_ms: u64) {
        self.scan_connected();

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(pump_interval_ms));
            loop {
                ticker.tick().await;
                self.pump();
            }
        });
    }

    /// Subscribe to connect/disconnect signals for all slots.
    pub fn signals(&self) -> broadcast::Receiver<ConnectionSignal> {
        self.signals.subscribe()
    }

    fn scan_connected(&self) {
        let Ok(gilrs) = self.gilrs.lock() else {
            warn!("gilrs lock poisoned during initial scan");
            return;
        };
        let connected: Vec<(GamepadId, String)> = gilrs
            .gamepads()
            .filter(|(_, pad)| pad.is_connected())
            .map(|(id, pad)| (id, pad.name().to_string()))
            .collect();
        drop(gilrs);

        for (id, name) in connected {
            self.attach(id, &name);
        }
    }

    fn pump(&self) {
        // Collect transitions under the gilrs lock, signal after releasing
        // it so slot bookkeeping never holds both locks.
        let mut transitions = Vec::new();
        {
            let Ok(mut gilrs) = self.gilrs.lock() else {
                warn!("gilrs lock poisoned, skipping pump");
                return;
            };
            while let Some(Event { id, event, .. }) = gilrs.next_event() {
                match event {
                    EventType::Connected => {
                        let name = gilrs
                            .connected_gamepad(id)
                            .map(|pad| pad.name().to_string())
                            .unwrap_or_default();
                        transitions.push((id, name, true));
                    }
                    EventType::Disconnected => transitions.push((id, String::new(), false)),
                    _ => {}
                }
            }
        }

        for (id, name, connected) in transitions {
            if connected {
                self.attach(id, &name);
            } else {
                self.detach(id);
            }
        }
    }

    fn attach(&self, id: GamepadId, name: &str) {
        let Ok(mut slots) = self.slots.lock() else {
            warn!("slot table lock poisoned");
            return;
        };
        if let Some(slot) = slots.iter().position(|slot| *slot == Some(id)) {
            drop(slots);
            debug!("gamepad {:?} already at slot {}, re-announcing", id, slot);
            let _ = self.signals.send(ConnectionSignal::Connected(slot));
            return;
        }
        let Some(free) = slots.iter().position(|slot| slot.is_none()) else {
            warn!("no free device slot for gamepad {:?} (\"{}\")", id, name);
            return;
        };
        slots[free] = Some(id);
        drop(slots);

        info!("gamepad {:?} (\"{}\") connected at slot {}", id, name, free);
        let _ = self.signals.send(ConnectionSignal::Connected(free));
    }

    fn detach(&self, id: GamepadId) {
        let Ok(mut slots) = self.slots.lock() else {
            warn!("slot table lock poisoned");
            return;
        };
        let Some(slot) = slots.iter().position(|slot| *slot == Some(id)) else {
            debug!("disconnect for untracked gamepad {:?}", id);
            return;
        };
        slots[slot] = None;
        drop(slots);

        info!("gamepad {:?} disconnected from slot {}", id, slot);
        let _ = self.signals.send(ConnectionSignal::Disconnected(slot));
    }
}

impl SnapshotSource for GilrsSource {
    fn sample(&self, device_index: usize) -> Option<Snapshot> {
        let id = {
            let slots = self.slots.lock().ok()?;
            (*slots.get(device_index)?)?
        };

        let gilrs = self.gilrs.lock().ok()?;
        let pad = gilrs.connected_gamepad(id)?;

        let mut buttons = [ButtonState::default(); BUTTON_COUNT];
        for (slot, button) in BUTTON_LAYOUT.iter().enumerate() {
            let pressed = pad.is_pressed(*button);
            let value = pad
                .button_data(*button)
                .map(|data| data.value())
                .unwrap_or(if pressed { 1.0 } else { 0.0 });
            buttons[slot] = ButtonState {
                pressed,
                touched: pressed || value > 0.0,
                value,
            };
        }

        // gilrs reports sticks up-positive; snapshots carry the raw
        // down-positive convention the joystick deriver inverts back.
        let axes = AXIS_LAYOUT
            .iter()
            .enumerate()
            .map(|(slot, axis)| {
                let raw = pad.value(*axis);
                if slot % 2 == 1 {
                    -raw
                } else {
                    raw
                }
            })
            .collect();

        Some(Snapshot { axes, buttons })
    }
}
