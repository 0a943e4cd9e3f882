//! Gamepad sampling and event derivation.
//!
//! Turns a polled device state into discrete, edge-triggered events:
//!
//! ```text
//! SnapshotSource ──► Sampler ──► Multicast ──► {Button, Joystick} derivers ──► GamepadHandle
//!   (raw state)     (15 ms)     (replay 1)        (pairwise diff)               (facade)
//! ```
//!
//! One sampling session exists per connected device regardless of consumer
//! count; every consumer sees the identical snapshot sequence, and late
//! subscribers are handed the most recent snapshot without triggering an
//! extra sample. Connect/disconnect signals gate when a session runs; a
//! disconnect terminates it, a renewed connect starts a fresh one that
//! leads with the idle snapshot.

pub mod button;
pub mod handle;
pub mod joystick;
pub mod monitor;
pub mod multicast;
pub mod sampler;
pub mod snapshot;
pub mod source;

pub use handle::{GamepadError, GamepadHandle};
pub use joystick::{JoystickCoordinates, JoystickDirection};
pub use multicast::{Multicast, Replay};
pub use snapshot::{ButtonState, Change, Snapshot, AXIS_COUNT, BUTTON_COUNT, JOYSTICK_COUNT};
pub use source::{ConnectionSignal, GilrsSource, SnapshotSource, SourceError, MAX_DEVICES};
