use std::cell::{Cell, RefCell};
use std::fmt::{self, Display};
use std::path::PathBuf;
use std::rc::Weak;

use tracing::debug;

use crate::{BusNet, ModelEvent};

/// Defers conflict reporting until the current propagation step has settled.
///
/// Nets record themselves here when they observe a conflict mid-step;
/// recording is infallible and deduplicated per step through the version
/// counter. At the step boundary every recorded net is re-evaluated, and
/// only conflicts that survived to settlement are promoted to a
/// [`BurnError`] -- a transient conflict while gate outputs are still
/// converging is not a short circuit.
///
/// One detector exists per simulation model; it is passed explicitly to
/// every net and switch that needs it (see [`Model`](crate::Model)).
pub struct BurnDetector {
    pending: RefCell<Vec<Weak<BusNet>>>,
    version: Cell<u64>,
}

impl BurnDetector {
    pub fn new() -> BurnDetector {
        BurnDetector { pending: RefCell::new(Vec::new()), version: Cell::new(0) }
    }

    /// Current step version, used by nets to avoid registering twice within
    /// one step.
    pub fn version(&self) -> u64 {
        self.version.get()
    }

    /// Records a net observed in a burn condition. Always succeeds; the
    /// verdict is deferred to [`BurnDetector::handle_event`].
    pub fn add_check(&self, net: Weak<BusNet>) {
        self.pending.borrow_mut().push(net);
    }

    /// Number of nets awaiting the step-boundary check.
    pub fn pending_checks(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Reacts to a scheduler event. On [`ModelEvent::Step`], re-evaluates
    /// every recorded net; nets still in conflict are collected into the
    /// returned [`BurnError`]. The registry is cleared and the version
    /// advanced whether or not the step fails, so no recorded net is ever
    /// silently dropped and nets may re-register in the next step.
    pub fn handle_event(&self, event: ModelEvent) -> Result<(), BurnError> {
        if event != ModelEvent::Step {
            return Ok(());
        }
        let pending = self.pending.take();
        if pending.is_empty() {
            return Ok(());
        }

        debug!(pending = pending.len(), version = self.version.get(), "step settled, re-checking burn candidates");
        let mut reports = Vec::new();
        for net in pending {
            if let Some(net) = net.upgrade() {
                if net.is_error() {
                    reports.push(net.burn_report());
                }
            }
        }
        self.version.set(self.version.get() + 1);

        if reports.is_empty() { Ok(()) } else { Err(BurnError { reports }) }
    }
}

impl Default for BurnDetector {
    fn default() -> Self {
        BurnDetector::new()
    }
}

/// One net whose conflict survived to the end of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnReport {
    /// Name of the conflicting net.
    pub net: String,
    /// Names of the driver signals merged on the net.
    pub drivers: Vec<String>,
    /// Schematic files the net was built from, if recorded.
    pub origins: Vec<PathBuf>,
}

impl Display for BurnReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net {} (drivers: {})", self.net, self.drivers.join(", "))?;
        if !self.origins.is_empty() {
            write!(f, " from ")?;
            for (index, origin) in self.origins.iter().enumerate() {
                if index != 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", origin.display())?;
            }
        }
        Ok(())
    }
}

/// A short circuit: one or more nets were still in conflict when the
/// propagation step settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnError {
    pub reports: Vec<BurnReport>,
}

impl Display for BurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "burn condition after step settled: ")?;
        for (index, report) in self.reports.iter().enumerate() {
            if index != 0 {
                write!(f, "; ")?;
            }
            write!(f, "{report}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BurnError {}
