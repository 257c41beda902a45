//! Electrical-signal propagation core for a digital-logic simulator.
//!
//! A [`Signal`] carries a multi-bit value with per-bit high-impedance and
//! drive-strength masks. A [`BusNet`] merges several driver signals sharing
//! one wire into a single resolved value using a commutative, associative
//! five-value algebra (see [`DriveLevel`]), recording per-bit conflicts.
//! Conflicts are not fatal while a propagation step is still converging;
//! the [`BurnDetector`] re-validates them once the external scheduler
//! declares the step settled and only then raises a [`BurnError`].
//! A [`Switch`] bridges two sides of a circuit and reconfigures which
//! drivers share a net as it opens and closes.
//!
//! Everything here is single-threaded and synchronous: observers run inside
//! the `set` call that triggered them, in registration order.

mod level;
mod signal;
mod bus;
mod burn;
mod switch;
mod model;
mod error;

pub use level::{DriveLevel, Levels, ParseLevelsError};
pub use signal::{Observer, Signal, MAX_WIDTH};
pub use bus::BusNet;
pub use burn::{BurnDetector, BurnError, BurnReport};
pub use switch::{Switch, SwitchInput, SwitchKind, Unidirectional};
pub use model::{Model, ModelEvent};
pub use error::WiringError;
