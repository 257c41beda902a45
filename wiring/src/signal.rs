use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug, Display};
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::{Levels, WiringError};

/// Widest representable signal; the three state masks are packed into `u64`s.
pub const MAX_WIDTH: u32 = 64;

/// Receiver of synchronous signal change notifications.
///
/// Notification happens in registration order, on the simulation thread,
/// inside the `set` call that caused the change. An observer's reaction may
/// itself set other signals, cascading further notifications before the
/// outer call returns; preventing unbounded recursion (combinational
/// feedback) is the scheduler's job, not this crate's.
pub trait Observer {
    fn signal_changed(&self);
}

struct SignalInner {
    name: String,
    width: u32,
    mask: u64,
    value: Cell<u64>,
    high_z: Cell<u64>,
    strong: Cell<u64>,
    constant: Cell<bool>,
    bidirectional: Cell<bool>,
    observers: RefCell<Vec<Weak<dyn Observer>>>,
}

/// A bus value with per-bit level, impedance and drive strength, plus an
/// ordered observer table.
///
/// `Signal` is a cheap handle; clones share the same underlying state, which
/// is how drivers, nets and switches all refer to the same wire. Two handles
/// compare equal iff they share state.
#[derive(Clone)]
pub struct Signal(Rc<SignalInner>);

impl Signal {
    /// Creates a signal driven all-low with strong drive, like a freshly
    /// powered-up output pin.
    pub fn new(name: impl Into<String>, width: u32) -> Signal {
        assert!((1..=MAX_WIDTH).contains(&width), "signal width must be 1..=64");
        let mask = if width == MAX_WIDTH { !0 } else { (1 << width) - 1 };
        Signal(Rc::new(SignalInner {
            name: name.into(),
            width,
            mask,
            value: Cell::new(0),
            high_z: Cell::new(0),
            strong: Cell::new(mask),
            constant: Cell::new(false),
            bidirectional: Cell::new(false),
            observers: RefCell::new(Vec::new()),
        }))
    }

    /// Marks the signal as known to never change after wiring. Constants
    /// enable the switch pass-through shortcut.
    pub fn with_constant(self) -> Signal {
        self.0.constant.set(true);
        self
    }

    /// Marks the signal as a bidirectional, high-impedance-capable terminal.
    pub fn with_bidirectional(self) -> Signal {
        self.0.bidirectional.set(true);
        self
    }

    /// Starts the signal out floating instead of driven low.
    pub fn with_high_z(self) -> Signal {
        self.set_to_high_z();
        self
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn width(&self) -> u32 {
        self.0.width
    }

    pub fn value(&self) -> u64 {
        self.0.value.get()
    }

    pub fn high_z(&self) -> u64 {
        self.0.high_z.get()
    }

    pub fn strong(&self) -> u64 {
        self.0.strong.get()
    }

    pub fn is_constant(&self) -> bool {
        self.0.constant.get()
    }

    pub fn is_bidirectional(&self) -> bool {
        self.0.bidirectional.get()
    }

    /// True if every bit is floating.
    pub fn is_high_z(&self) -> bool {
        self.0.high_z.get() == self.0.mask
    }

    /// Decodes the current state into per-bit levels.
    pub fn levels(&self) -> Levels {
        Levels::from_masks(self.0.width, self.value(), self.high_z(), self.strong())
    }

    /// Two-mask set: every driven bit is driven strongly. This matches the
    /// behavior of an ordinary (non-pull) output stage.
    pub fn set(&self, value: u64, high_z: u64) {
        self.set_with_strength(value, high_z, !high_z);
    }

    /// Full three-mask set. Operands are masked to the signal width, all
    /// three masks are updated before anyone can observe the signal, and
    /// observers are then notified in registration order -- but only if any
    /// mask actually changed.
    pub fn set_with_strength(&self, value: u64, high_z: u64, strong: u64) {
        let inner = &*self.0;
        let value = value & inner.mask;
        let high_z = high_z & inner.mask;
        let strong = strong & inner.mask;
        let changed =
            value != inner.value.get() || high_z != inner.high_z.get() || strong != inner.strong.get();
        inner.value.set(value);
        inner.high_z.set(high_z);
        inner.strong.set(strong);
        if changed {
            trace!(signal = inner.name.as_str(), value, high_z, strong, "signal changed");
            self.notify();
        }
    }

    /// Stops driving every bit.
    pub fn set_to_high_z(&self) {
        self.set_with_strength(0, !0, 0);
    }

    /// Drives the signal to the given per-bit levels. Intended for stimulus
    /// and diagnostics; the levels must be drivable (no `Error`) and match
    /// the signal width.
    pub fn set_levels(&self, levels: &Levels) {
        assert_eq!(levels.len(), self.0.width as usize, "level count must match signal width");
        let (value, high_z, strong) = levels.to_masks().expect("error level cannot be driven");
        self.set_with_strength(value, high_z, strong);
    }

    /// Appends an observer. Dead handles are skipped and pruned lazily.
    pub fn add_observer(&self, observer: Weak<dyn Observer>) {
        self.0.observers.borrow_mut().push(observer);
    }

    /// Fails unless the signal has the expected width. This is the only
    /// immediate, fatal validation in the subsystem; everything electrical
    /// is deferred to the step boundary.
    pub fn check_width(&self, expected: u32) -> Result<(), WiringError> {
        if self.0.width != expected {
            return Err(WiringError::WidthMismatch {
                signal: self.0.name.clone(),
                expected,
                found: self.0.width,
            });
        }
        Ok(())
    }

    fn notify(&self) {
        // snapshot so observers may subscribe or mutate signals mid-walk
        let observers = self.0.observers.borrow().clone();
        let mut dead = false;
        for observer in &observers {
            match observer.upgrade() {
                Some(observer) => observer.signal_changed(),
                None => dead = true,
            }
        }
        if dead {
            self.0.observers.borrow_mut().retain(|observer| observer.strong_count() > 0);
        }
    }
}

impl PartialEq for Signal {
    fn eq(&self, other: &Signal) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Signal {}

impl Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.0.name)
            .field("levels", &self.levels())
            .finish_non_exhaustive()
    }
}

impl Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.0.name, self.levels())
    }
}
