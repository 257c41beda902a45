use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::{BusNet, Model, Observer, Signal, WiringError};

/// Forced direction of a switch. `No` means the switch is bidirectional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unidirectional {
    No,
    From1To2,
    From2To1,
}

/// What the wiring pass found connected to one pin of a switch: either a
/// lone driver signal or a whole multi-driver net.
#[derive(Clone)]
pub enum SwitchInput {
    Plain(Signal),
    Net(Rc<BusNet>),
}

impl SwitchInput {
    fn signal(&self) -> &Signal {
        match self {
            SwitchInput::Plain(signal) => signal,
            SwitchInput::Net(net) => net.output(),
        }
    }
}

/// Which behavioral variant a switch selected at wiring time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    PassThrough,
    ForcedBuffer,
    Bidirectional,
}

// The variant is selected once, at wiring time, and never changes; toggling
// the switch only re-propagates through it.
enum SwitchModel {
    /// One side reduced to a constant driver; forward it one way without
    /// building a merge node.
    PassThrough { source: Signal, dest: Signal, open_to_high_z: bool },
    /// One-way driver from a net's resolved value to the opposite terminal.
    ForcedBuffer { source: Signal, dest: Signal, open_to_high_z: bool },
    /// Both sides are genuine nets; closing merges their driver sets through
    /// an internal, burn-exempt net created at model init time.
    Bidirectional {
        side_1: Rc<BusNet>,
        side_2: Rc<BusNet>,
        out_1: Signal,
        out_2: Signal,
        merged: RefCell<Option<Rc<BusNet>>>,
    },
}

impl SwitchModel {
    fn kind(&self) -> SwitchKind {
        match self {
            SwitchModel::PassThrough { .. } => SwitchKind::PassThrough,
            SwitchModel::ForcedBuffer { .. } => SwitchKind::ForcedBuffer,
            SwitchModel::Bidirectional { .. } => SwitchKind::Bidirectional,
        }
    }

    fn propagate(&self, closed: bool) {
        match self {
            SwitchModel::PassThrough { source, dest, open_to_high_z }
            | SwitchModel::ForcedBuffer { source, dest, open_to_high_z } => {
                if closed {
                    dest.set(source.value(), source.high_z());
                } else if *open_to_high_z {
                    dest.set_to_high_z();
                }
            }
            SwitchModel::Bidirectional { out_1, out_2, merged, .. } => {
                let merged = merged.borrow();
                let Some(merged) = &*merged else { return };
                if closed {
                    let value = merged.output().value();
                    let high_z = merged.output().high_z();
                    let strong = merged.output().strong();
                    out_1.set_with_strength(value, high_z, strong);
                    out_2.set_with_strength(value, high_z, strong);
                } else {
                    out_1.set_to_high_z();
                    out_2.set_to_high_z();
                }
            }
        }
    }
}

/// A two-terminal mechanical switch.
///
/// The switch exposes two bidirectional terminal signals. Once both pins are
/// known to be connected ([`Switch::connect`]), it selects one of three
/// behavioral variants based on what is actually on each side; toggling
/// [`Switch::set_closed`] afterwards reconfigures the net topology without
/// any global re-wiring pass.
pub struct Switch {
    me: Weak<Switch>,
    width: u32,
    closed: Cell<bool>,
    unidirectional: Cell<Unidirectional>,
    output_1: Signal,
    output_2: Signal,
    model: RefCell<Option<SwitchModel>>,
}

impl Switch {
    /// Creates a switch with both terminals floating. `connect` must be
    /// called before the switch does anything.
    pub fn new(width: u32, closed: bool, name_1: impl Into<String>, name_2: impl Into<String>) -> Rc<Switch> {
        Rc::new_cyclic(|me| Switch {
            me: me.clone(),
            width,
            closed: Cell::new(closed),
            unidirectional: Cell::new(Unidirectional::No),
            output_1: Signal::new(name_1, width).with_bidirectional().with_high_z(),
            output_2: Signal::new(name_2, width).with_bidirectional().with_high_z(),
            model: RefCell::new(None),
        })
    }

    /// Forces a direction. Must be called before [`Switch::connect`].
    pub fn set_unidirectional(&self, unidirectional: Unidirectional) {
        self.unidirectional.set(unidirectional);
    }

    /// Wires the switch between what was found on each pin and selects the
    /// behavioral variant. An unconnected pin (`None`) leaves the switch
    /// inert, matching a dangling pin in the schematic; two pins with no net
    /// on either side is a circuit-design error.
    pub fn connect(&self, input_1: Option<SwitchInput>, input_2: Option<SwitchInput>) -> Result<(), WiringError> {
        self.connect_with_open_high_z(input_1, input_2, true)
    }

    /// Like [`Switch::connect`], but `open_to_high_z = false` asks the
    /// variants that drive terminal 1 to keep their last value instead of
    /// going high-Z when the switch opens. Composite multi-pole switches
    /// need this for their interior pins.
    pub fn connect_with_open_high_z(
        &self,
        input_1: Option<SwitchInput>,
        input_2: Option<SwitchInput>,
        open_to_high_z: bool,
    ) -> Result<(), WiringError> {
        let (Some(input_1), Some(input_2)) = (input_1, input_2) else {
            return Ok(());
        };
        input_1.signal().check_width(self.width)?;
        input_2.signal().check_width(self.width)?;
        input_1.signal().add_observer(self.me.clone());
        input_2.signal().add_observer(self.me.clone());

        let model = self.select_model(input_1, input_2, open_to_high_z)?;
        debug!(
            switch = self.output_1.name(),
            kind = ?model.kind(),
            "switch variant selected"
        );
        *self.model.borrow_mut() = Some(model);
        Ok(())
    }

    fn select_model(
        &self,
        input_1: SwitchInput,
        input_2: SwitchInput,
        open_to_high_z: bool,
    ) -> Result<SwitchModel, WiringError> {
        match self.unidirectional.get() {
            Unidirectional::From1To2 => {
                return Ok(SwitchModel::ForcedBuffer {
                    source: input_1.signal().clone(),
                    dest: self.output_2.clone(),
                    open_to_high_z: true,
                });
            }
            Unidirectional::From2To1 => {
                return Ok(SwitchModel::ForcedBuffer {
                    source: input_2.signal().clone(),
                    dest: self.output_1.clone(),
                    open_to_high_z,
                });
            }
            Unidirectional::No => {}
        }

        match (input_1, input_2) {
            (SwitchInput::Net(net_1), SwitchInput::Net(net_2)) => {
                // a discoverable constant makes a full merge node unnecessary;
                // once taken, this shortcut is never re-validated against the
                // merge algebra
                if let Some(constant) = net_1.search_constant() {
                    Ok(SwitchModel::PassThrough {
                        source: constant,
                        dest: self.output_2.clone(),
                        open_to_high_z: true,
                    })
                } else if let Some(constant) = net_2.search_constant() {
                    Ok(SwitchModel::PassThrough { source: constant, dest: self.output_1.clone(), open_to_high_z })
                } else {
                    Ok(SwitchModel::Bidirectional {
                        side_1: net_1,
                        side_2: net_2,
                        out_1: self.output_1.clone(),
                        out_2: self.output_2.clone(),
                        merged: RefCell::new(None),
                    })
                }
            }
            (SwitchInput::Net(net_1), SwitchInput::Plain(_)) => Ok(SwitchModel::ForcedBuffer {
                source: net_1.output().clone(),
                dest: self.output_2.clone(),
                open_to_high_z: true,
            }),
            (SwitchInput::Plain(_), SwitchInput::Net(net_2)) => Ok(SwitchModel::ForcedBuffer {
                source: net_2.output().clone(),
                dest: self.output_1.clone(),
                open_to_high_z,
            }),
            (SwitchInput::Plain(_), SwitchInput::Plain(_)) => Err(WiringError::NoNet {
                terminal_1: self.output_1.name().to_owned(),
                terminal_2: self.output_2.name().to_owned(),
            }),
        }
    }

    /// Binds the switch to its model and applies the initial closed state.
    /// For the bidirectional variant this is where the internal burn-exempt
    /// merge net over both sides is created, using the model's burn
    /// detector.
    pub fn init(&self, model: &Model) -> Result<(), WiringError> {
        {
            let guard = self.model.borrow();
            let Some(switch_model) = &*guard else { return Ok(()) };
            if let SwitchModel::Bidirectional { side_1, side_2, merged, .. } = switch_model {
                let name = format!("{}<->{}", self.output_1.name(), self.output_2.name());
                let net = BusNet::without_burn_check(
                    name,
                    self.width,
                    model.burn_detector(),
                    vec![side_1.output().clone(), side_2.output().clone()],
                )?;
                net.output().add_observer(self.me.clone());
                *merged.borrow_mut() = Some(net);
            }
        }
        self.propagate();
        Ok(())
    }

    /// Opens or closes the switch, re-propagating immediately. A switch that
    /// was never fully connected stays inert.
    pub fn set_closed(&self, closed: bool) {
        if self.model.borrow().is_none() || self.closed.get() == closed {
            return;
        }
        trace!(switch = self.output_1.name(), closed, "switch toggled");
        self.closed.set(closed);
        self.propagate();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub fn terminal_1(&self) -> &Signal {
        &self.output_1
    }

    pub fn terminal_2(&self) -> &Signal {
        &self.output_2
    }

    /// The variant selected at wiring time, if the switch was connected.
    pub fn kind(&self) -> Option<SwitchKind> {
        self.model.borrow().as_ref().map(SwitchModel::kind)
    }

    /// The internal merge net of a bidirectional switch, once initialized.
    /// Conflicts between the two sides show up on this net's error mask and
    /// are deliberately exempt from burn checking: short-circuit detection
    /// stays with each side's own net.
    pub fn internal_net(&self) -> Option<Rc<BusNet>> {
        match &*self.model.borrow() {
            Some(SwitchModel::Bidirectional { merged, .. }) => merged.borrow().clone(),
            _ => None,
        }
    }

    fn propagate(&self) {
        if let Some(model) = &*self.model.borrow() {
            model.propagate(self.closed.get());
        }
    }
}

impl Observer for Switch {
    fn signal_changed(&self) {
        self.propagate();
    }
}
