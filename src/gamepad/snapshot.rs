//! Raw device snapshots and the change-pair type derived from them.
//!
//! A [`Snapshot`] is one owned, immutable full-state reading of a gamepad at
//! one sampling tick: four stick axes plus the fixed 17-button register of
//! the standard controller layout. It is produced once per tick, diffed
//! against its successor, and then discarded; nothing holds a snapshot past
//! the next tick except the one-slot replay cache.

/// Number of buttons in the standard controller register.
pub const BUTTON_COUNT: usize = 17;

/// Number of analog joysticks (each consumes two consecutive axis slots).
pub const JOYSTICK_COUNT: usize = 2;

/// Number of axis slots in an idle snapshot (two per joystick).
pub const AXIS_COUNT: usize = 2 * JOYSTICK_COUNT;

/// State of a single button at one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ButtonState {
    pub pressed: bool,
    pub touched: bool,
    /// Analog press depth in `[0, 1]`; digital buttons report 0.0 or 1.0.
    pub value: f32,
}

/// Full device state at one sampling tick.
///
/// Replaced wholesale every tick, so consumers never observe a partially
/// updated reading.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// Raw axis values; joystick `i` reads slots `2i` and `2i + 1`. The
    /// second slot uses the down-positive raw convention.
    pub axes: Vec<f32>,
    pub buttons: [ButtonState; BUTTON_COUNT],
}

impl Snapshot {
    /// The well-known idle state: all axes centered, all buttons up.
    ///
    /// Published as the immediate value of every new sampling session,
    /// before the first live sample arrives.
    pub fn idle() -> Self {
        Self {
            axes: vec![0.0; AXIS_COUNT],
            buttons: [ButtonState::default(); BUTTON_COUNT],
        }
    }

    /// Axis value at `slot`, reading absent slots as centered.
    pub(crate) fn axis(&self, slot: usize) -> f32 {
        self.axes.get(slot).copied().unwrap_or(0.0)
    }
}

/// A pair of consecutive derived values, emitted when a change predicate
/// holds between them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Change<T> {
    pub previous: T,
    pub current: T,
}
