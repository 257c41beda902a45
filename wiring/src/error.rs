use std::fmt::{self, Display};

/// A structural error found while wiring the circuit. These are fatal and
/// immediate: the circuit cannot be simulated until corrected. Run-time
/// electrical conflicts are a different class entirely, see
/// [`BurnError`](crate::BurnError).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WiringError {
    /// A signal's width does not match the net or switch it is wired to.
    WidthMismatch { signal: String, expected: u32, found: u32 },
    /// Neither side of a switch resolves to a mergeable net.
    NoNet { terminal_1: String, terminal_2: String },
}

impl Display for WiringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WiringError::WidthMismatch { signal, expected, found } => {
                write!(f, "signal {signal} has {found} bits, expected {expected}")
            }
            WiringError::NoNet { terminal_1, terminal_2 } => {
                write!(f, "switch between {terminal_1} and {terminal_2} is not connected to any net")
            }
        }
    }
}

impl std::error::Error for WiringError {}
