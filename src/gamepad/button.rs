//! Per-button pairwise diffing.
//!
//! One deriver exists per button index and session. It projects each
//! snapshot to the button state at its index, compares it against the state
//! from the previous tick, and emits edge events:
//!
//! - `pressed`: up on the previous tick, down on the current one
//! - `released`: the reverse edge
//! - `changed`: the analog value differs (strict inequality, no epsilon);
//!   independent of the edge predicates, so it can co-occur with either
//!
//! Ticks where the relevant field is unchanged emit nothing, which keeps
//! the streams quiet while sampling runs faster than the hardware changes.

use tokio::sync::broadcast;
use tracing::debug;

use super::snapshot::{ButtonState, Change, Snapshot};

/// Pre-built senders for one button's three event streams.
pub(crate) struct ButtonStreams {
    pub(crate) pressed: broadcast::Sender<Change<ButtonState>>,
    pub(crate) released: broadcast::Sender<Change<ButtonState>>,
    pub(crate) changed: broadcast::Sender<Change<ButtonState>>,
}

impl ButtonStreams {
    pub(crate) fn new(capacity: usize) -> Self {
        let (pressed, _) = broadcast::channel(capacity);
        let (released, _) = broadcast::channel(capacity);
        let (changed, _) = broadcast::channel(capacity);
        Self {
            pressed,
            released,
            changed,
        }
    }
}

/// Pairwise diff state for one button within one sampling session.
pub(crate) struct ButtonDeriver {
    index: usize,
    previous: Option<ButtonState>,
    pressed: broadcast::Sender<Change<ButtonState>>,
    released: broadcast::Sender<Change<ButtonState>>,
    changed: broadcast::Sender<Change<ButtonState>>,
}

impl ButtonDeriver {
    pub(crate) fn new(index: usize, streams: &ButtonStreams) -> Self {
        Self {
            index,
            previous: None,
            pressed: streams.pressed.clone(),
            released: streams.released.clone(),
            changed: streams.changed.clone(),
        }
    }

    /// Diff this tick's state against the previous one and emit the events
    /// whose predicates hold. The first observation of a session only seeds
    /// the previous value.
    pub(crate) fn observe(&mut self, snapshot: &Snapshot) {
        let current = snapshot.buttons[self.index];
        let Some(previous) = self.previous.replace(current) else {
            return;
        };

        let change = Change { previous, current };
        if !previous.pressed && current.pressed {
            debug!(button = self.index, "button pressed");
            let _ = self.pressed.send(change);
        }
        if previous.pressed && !current.pressed {
            debug!(button = self.index, "button released");
            let _ = self.released.send(change);
        }
        if previous.value != current.value {
            debug!(
                button = self.index,
                from = previous.value,
                to = current.value,
                "button value changed"
            );
            let _ = self.changed.send(change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamepad::snapshot::BUTTON_COUNT;
    use tokio::sync::broadcast::error::TryRecvError;

    fn snapshot_with(index: usize, state: ButtonState) -> Snapshot {
        let mut snap = Snapshot::idle();
        snap.buttons[index] = state;
        snap
    }

    fn down(value: f32) -> ButtonState {
        ButtonState {
            pressed: true,
            touched: true,
            value,
        }
    }

    #[test]
    fn pressed_fires_on_up_to_down_edge_only() {
        let streams = ButtonStreams::new(8);
        let mut pressed_rx = streams.pressed.subscribe();
        let mut deriver = ButtonDeriver::new(3, &streams);

        deriver.observe(&Snapshot::idle());
        assert!(matches!(pressed_rx.try_recv(), Err(TryRecvError::Empty)));

        deriver.observe(&snapshot_with(3, down(1.0)));
        let change = pressed_rx.try_recv().unwrap();
        assert!(!change.previous.pressed);
        assert!(change.current.pressed);

        // Held down: no further edge.
        deriver.observe(&snapshot_with(3, down(1.0)));
        assert!(matches!(pressed_rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn released_fires_on_down_to_up_edge_only() {
        let streams = ButtonStreams::new(8);
        let mut released_rx = streams.released.subscribe();
        let mut deriver = ButtonDeriver::new(0, &streams);

        deriver.observe(&snapshot_with(0, down(1.0)));
        deriver.observe(&Snapshot::idle());
        let change = released_rx.try_recv().unwrap();
        assert!(change.previous.pressed);
        assert!(!change.current.pressed);

        deriver.observe(&Snapshot::idle());
        assert!(matches!(released_rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn changed_uses_strict_value_inequality() {
        let streams = ButtonStreams::new(8);
        let mut changed_rx = streams.changed.subscribe();
        let mut deriver = ButtonDeriver::new(6, &streams);

        deriver.observe(&Snapshot::idle());
        deriver.observe(&snapshot_with(
            6,
            ButtonState {
                pressed: false,
                touched: true,
                value: 0.25,
            },
        ));
        let change = changed_rx.try_recv().unwrap();
        assert_eq!(change.previous.value, 0.0);
        assert_eq!(change.current.value, 0.25);

        // Identical value, even with other fields differing, emits nothing.
        deriver.observe(&snapshot_with(
            6,
            ButtonState {
                pressed: true,
                touched: true,
                value: 0.25,
            },
        ));
        assert!(matches!(changed_rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn pressed_and_changed_can_co_occur() {
        let streams = ButtonStreams::new(8);
        let mut pressed_rx = streams.pressed.subscribe();
        let mut changed_rx = streams.changed.subscribe();
        let mut deriver = ButtonDeriver::new(BUTTON_COUNT - 1, &streams);

        deriver.observe(&Snapshot::idle());
        deriver.observe(&snapshot_with(BUTTON_COUNT - 1, down(1.0)));

        assert!(pressed_rx.try_recv().is_ok());
        assert!(changed_rx.try_recv().is_ok());
    }

    #[test]
    fn first_observation_seeds_without_emitting() {
        let streams = ButtonStreams::new(8);
        let mut pressed_rx = streams.pressed.subscribe();
        let mut changed_rx = streams.changed.subscribe();
        let mut deriver = ButtonDeriver::new(1, &streams);

        // A session starting with the button already held produces no edge
        // until the next tick differs.
        deriver.observe(&snapshot_with(1, down(1.0)));
        assert!(matches!(pressed_rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(matches!(changed_rx.try_recv(), Err(TryRecvError::Empty)));
    }
}
