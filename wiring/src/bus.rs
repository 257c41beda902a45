use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::{Rc, Weak};

use indexmap::IndexSet;
use tracing::{debug, trace};

use crate::burn::{BurnDetector, BurnReport};
use crate::{Observer, Signal, WiringError};

/// A net with several drivers, resolved into one common value.
///
/// The net observes every driver and recomputes the merged value whenever
/// any of them changes. A per-bit error mask records where drivers conflict;
/// conflicts are not raised here but handed to the [`BurnDetector`] for
/// re-validation once the propagation step has settled, since transient
/// conflicts are expected while the circuit is still converging.
pub struct BusNet {
    me: Weak<BusNet>,
    drivers: Vec<Signal>,
    output: Signal,
    error: Cell<u64>,
    added_version: Cell<u64>,
    burn_check: bool,
    origins: RefCell<IndexSet<PathBuf>>,
    burn: Rc<BurnDetector>,
}

impl BusNet {
    /// Creates a net merging the given drivers, subscribes to each of them
    /// and computes the initial merged value. All drivers must have the
    /// given width.
    pub fn new(
        name: impl Into<String>,
        width: u32,
        burn: &Rc<BurnDetector>,
        drivers: Vec<Signal>,
    ) -> Result<Rc<BusNet>, WiringError> {
        Self::create(name, width, burn, drivers, true)
    }

    /// Like [`BusNet::new`] but the net never registers with the burn
    /// detector. Used for the internal merge of a bidirectional switch,
    /// where short-circuit detection is still owned by each side's own net.
    pub fn without_burn_check(
        name: impl Into<String>,
        width: u32,
        burn: &Rc<BurnDetector>,
        drivers: Vec<Signal>,
    ) -> Result<Rc<BusNet>, WiringError> {
        Self::create(name, width, burn, drivers, false)
    }

    fn create(
        name: impl Into<String>,
        width: u32,
        burn: &Rc<BurnDetector>,
        drivers: Vec<Signal>,
        burn_check: bool,
    ) -> Result<Rc<BusNet>, WiringError> {
        for driver in &drivers {
            driver.check_width(width)?;
        }
        let net = Rc::new_cyclic(|me| BusNet {
            me: me.clone(),
            drivers,
            output: Signal::new(name, width),
            error: Cell::new(0),
            added_version: Cell::new(u64::MAX),
            burn_check,
            origins: RefCell::new(IndexSet::new()),
            burn: burn.clone(),
        });
        for driver in &net.drivers {
            driver.add_observer(net.me.clone());
        }
        net.update();
        Ok(net)
    }

    /// Records a schematic file this net came from, for burn diagnostics.
    pub fn add_origin(self: Rc<Self>, origin: impl Into<PathBuf>) -> Rc<Self> {
        self.origins.borrow_mut().insert(origin.into());
        self
    }

    /// Recomputes the merged value and conflict mask from all drivers in one
    /// bit-parallel pass, then drives the output signal and, if a conflict
    /// is present, registers for the step-boundary burn check.
    ///
    /// The accumulator starts from all-high-Z (the identity of the merge
    /// algebra); the update formula is relied on bit-exactly, including its
    /// tie-break direction, by the burn test suite.
    pub fn update(&self) {
        let mut v0: u64 = 0;
        let mut z0: u64 = !0;
        let mut s0: u64 = 0;
        let mut e0: u64 = 0;

        for driver in &self.drivers {
            let v1 = driver.value();
            let z1 = driver.high_z();
            let s1 = driver.strong();

            e0 |= (!s0 & !s1 & v0 & !v1 & !z1)
                | (!s0 & !s1 & !v0 & v1 & !z0)
                | (s0 & s1 & !v0 & v1)
                | (s0 & s1 & v0 & !v1);
            v0 = (s1 & v1) | (!s1 & v0) | (v1 & z0);
            s0 |= s1;
            z0 &= z1;
        }

        trace!(net = self.output.name(), value = v0, high_z = z0, strong = s0, error = e0, "net recomputed");
        self.output.set_with_strength(v0, z0, s0);
        self.error.set(e0);

        if self.burn_check {
            self.register_burn_check();
        }
    }

    // at most one registration per step; the version tag makes the dedup O(1)
    fn register_burn_check(&self) {
        if self.error.get() != 0 && self.burn.version() != self.added_version.get() {
            self.added_version.set(self.burn.version());
            debug!(net = self.output.name(), error = self.error.get(), "burn condition recorded");
            self.burn.add_check(self.me.clone());
        }
    }

    /// The resolved net value.
    pub fn output(&self) -> &Signal {
        &self.output
    }

    pub fn drivers(&self) -> &[Signal] {
        &self.drivers
    }

    /// True if any bit is in conflict.
    pub fn is_error(&self) -> bool {
        self.error.get() != 0
    }

    /// Per-bit conflict mask from the last recomputation.
    pub fn error_mask(&self) -> u64 {
        self.error.get()
    }

    /// The first driver known to be a constant, if any. Switches use this to
    /// select the cheap pass-through variant instead of a full merge.
    pub fn search_constant(&self) -> Option<Signal> {
        self.drivers.iter().find(|driver| driver.is_constant()).cloned()
    }

    pub(crate) fn burn_report(&self) -> BurnReport {
        BurnReport {
            net: self.output.name().to_owned(),
            drivers: self.drivers.iter().map(|driver| driver.name().to_owned()).collect(),
            origins: self.origins.borrow().iter().cloned().collect(),
        }
    }
}

impl Observer for BusNet {
    fn signal_changed(&self) {
        self.update();
    }
}

#[cfg(test)]
mod test {
    use super::BusNet;
    use crate::{BurnDetector, Signal, WiringError};
    use std::rc::Rc;

    #[test]
    fn test_strong_beats_high_z() {
        let burn = Rc::new(BurnDetector::new());
        let a = Signal::new("a", 3);
        let b = Signal::new("b", 3).with_high_z();
        let net = BusNet::new("net", 3, &burn, vec![a.clone(), b.clone()]).unwrap();

        a.set_levels(&"111".parse().unwrap());
        assert_eq!(net.output().levels().to_string(), "111");
        assert!(!net.is_error());
    }

    #[test]
    fn test_conflict_sets_error_mask() {
        let burn = Rc::new(BurnDetector::new());
        let a = Signal::new("a", 3).with_high_z();
        let b = Signal::new("b", 3).with_high_z();
        let net = BusNet::new("net", 3, &burn, vec![a.clone(), b.clone()]).unwrap();

        a.set_levels(&"Z1Z".parse().unwrap());
        b.set_levels(&"Z0Z".parse().unwrap());
        assert!(net.is_error());
        assert_eq!(net.error_mask(), 0b010);
    }

    #[test]
    fn test_width_mismatch_is_rejected() {
        let burn = Rc::new(BurnDetector::new());
        let a = Signal::new("a", 3);
        let b = Signal::new("b", 4);
        match BusNet::new("net", 3, &burn, vec![a, b]) {
            Err(WiringError::WidthMismatch { signal, expected, found }) => {
                assert_eq!(signal, "b");
                assert_eq!(expected, 3);
                assert_eq!(found, 4);
            }
            Err(other) => panic!("expected width mismatch, got {other:?}"),
            Ok(_) => panic!("expected width mismatch, got a net"),
        }
    }

    #[test]
    fn test_search_constant() {
        let burn = Rc::new(BurnDetector::new());
        let a = Signal::new("a", 1).with_high_z();
        let k = Signal::new("k", 1).with_constant();
        let net = BusNet::new("net", 1, &burn, vec![a, k.clone()]).unwrap();
        assert_eq!(net.search_constant(), Some(k));
    }
}
