//! padstream: fixed-cadence gamepad sampling and event derivation.
//!
//! The crate samples a raw device snapshot on a fixed cadence, shares that
//! one sampling stream across any number of consumers, and reduces it into
//! edge-triggered events: button press/release/value-change and joystick
//! coordinate/direction changes.
//!
//! ```rust,no_run
//! use padstream::{GamepadHandle, Settings};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), padstream::GamepadError> {
//! let pad = GamepadHandle::new(0, Settings::default())?;
//! let mut pressed = pad.button_pressed(0)?;
//! while let Ok(change) = pressed.recv().await {
//!     println!("button down, value {}", change.current.value);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod gamepad;

pub use config::Settings;
pub use gamepad::{
    ButtonState, Change, ConnectionSignal, GamepadError, GamepadHandle, GilrsSource,
    JoystickCoordinates, JoystickDirection, Snapshot, SnapshotSource, SourceError, BUTTON_COUNT,
    JOYSTICK_COUNT,
};
