//! Joystick projection and pairwise diffing.
//!
//! Joystick `i` reads axis slots `2i` and `2i + 1` of each snapshot. The
//! second slot arrives in the down-positive raw convention and is
//! sign-inverted here so that "up" is positive. Two sub-streams are derived
//! per joystick:
//!
//! - `moved`: a coordinate pair changed (strict inequality on x or y)
//! - `direction`: the polar angle changed; a magnitude-only change (push
//!   straight out, release straight back) is deliberately silent
//!
//! The fully centered stick is a degenerate direction: `atan2(0, 0)` is 0,
//! so the idle position reads as angle 0 with pressure 0. Downstream code
//! relies on that constant; do not special-case it.

use std::f32::consts::TAU;

use tokio::sync::broadcast;
use tracing::debug;

use super::snapshot::{Change, Snapshot};

/// Raw magnitude at which pressure reads as fully pressed. Square gates
/// never quite reach 1.0 on the diagonal, so anything at or past this
/// threshold is reported as 1.0.
const FULL_PRESSURE_THRESHOLD: f32 = 0.975;

/// Stick position at one tick, up-positive.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct JoystickCoordinates {
    pub x: f32,
    pub y: f32,
}

impl JoystickCoordinates {
    /// Project the axis pair for joystick `index` out of a snapshot,
    /// flipping the second slot's raw down-positive sign.
    pub(crate) fn from_snapshot(snapshot: &Snapshot, index: usize) -> Self {
        Self {
            x: snapshot.axis(2 * index),
            y: -snapshot.axis(2 * index + 1),
        }
    }
}

/// Polar reading of a stick position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JoystickDirection {
    /// Degrees in `[0, 360)`, counterclockwise from positive x.
    pub angle: f32,
    /// Magnitude in `[0, 1]`.
    pub pressure: f32,
}

impl JoystickDirection {
    pub fn from_coordinates(coordinates: JoystickCoordinates) -> Self {
        let radians = (coordinates.y.atan2(coordinates.x) + TAU) % TAU;
        let magnitude = (coordinates.x * coordinates.x + coordinates.y * coordinates.y).sqrt();
        let pressure = if magnitude >= FULL_PRESSURE_THRESHOLD {
            1.0
        } else {
            magnitude
        };
        Self {
            angle: radians.to_degrees(),
            pressure,
        }
    }
}

/// Pre-built senders for one joystick's two event streams.
pub(crate) struct JoystickStreams {
    pub(crate) moved: broadcast::Sender<Change<JoystickCoordinates>>,
    pub(crate) direction: broadcast::Sender<Change<JoystickDirection>>,
}

impl JoystickStreams {
    pub(crate) fn new(capacity: usize) -> Self {
        let (moved, _) = broadcast::channel(capacity);
        let (direction, _) = broadcast::channel(capacity);
        Self { moved, direction }
    }
}

/// Pairwise diff state for one joystick within one sampling session.
pub(crate) struct JoystickDeriver {
    index: usize,
    previous: Option<(JoystickCoordinates, JoystickDirection)>,
    moved: broadcast::Sender<Change<JoystickCoordinates>>,
    direction: broadcast::Sender<Change<JoystickDirection>>,
}

impl JoystickDeriver {
    pub(crate) fn new(index: usize, streams: &JoystickStreams) -> Self {
        Self {
            index,
            previous: None,
            moved: streams.moved.clone(),
            direction: streams.direction.clone(),
        }
    }

    pub(crate) fn observe(&mut self, snapshot: &Snapshot) {
        let coordinates = JoystickCoordinates::from_snapshot(snapshot, self.index);
        let direction = JoystickDirection::from_coordinates(coordinates);
        let Some((prev_coordinates, prev_direction)) =
            self.previous.replace((coordinates, direction))
        else {
            return;
        };

        if coordinates != prev_coordinates {
            debug!(
                joystick = self.index,
                x = coordinates.x,
                y = coordinates.y,
                "joystick moved"
            );
            let _ = self.moved.send(Change {
                previous: prev_coordinates,
                current: coordinates,
            });
        }
        // Angle only: pressure changes along a fixed heading stay silent.
        if direction.angle != prev_direction.angle {
            debug!(
                joystick = self.index,
                angle = direction.angle,
                pressure = direction.pressure,
                "joystick direction changed"
            );
            let _ = self.direction.send(Change {
                previous: prev_direction,
                current: direction,
            });
        }
    }
}
