use std::rc::Rc;

use voltnet_wiring::{BusNet, Model, Signal, Switch, SwitchInput, SwitchKind, Unidirectional, WiringError};

fn floating(name: &str, width: u32) -> Signal {
    Signal::new(name, width).with_high_z()
}

/// A net with two plain drivers and no constants.
fn plain_net(model: &Model, name: &str, a: &Signal, b: &Signal, width: u32) -> Rc<BusNet> {
    BusNet::new(name, width, model.burn_detector(), vec![a.clone(), b.clone()]).unwrap()
}

#[test]
fn open_switch_floats_both_terminals() {
    let model = Model::new();
    let a = floating("a", 3);
    let b = floating("b", 3);
    let c = floating("c", 3);
    let d = floating("d", 3);
    let net_1 = plain_net(&model, "net1", &a, &b, 3);
    let net_2 = plain_net(&model, "net2", &c, &d, 3);

    let switch = Switch::new(3, false, "s1", "s2");
    switch.connect(Some(SwitchInput::Net(net_1)), Some(SwitchInput::Net(net_2))).unwrap();
    switch.init(&model).unwrap();

    assert_eq!(switch.kind(), Some(SwitchKind::Bidirectional));
    assert!(switch.terminal_1().is_high_z());
    assert!(switch.terminal_2().is_high_z());
}

#[test]
fn constant_side_selects_pass_through() {
    let model = Model::new();
    // constants come up driving strong low
    let constant = Signal::new("gnd", 3).with_constant();
    let filler = floating("filler", 3);
    let net_1 = BusNet::new("net1", 3, model.burn_detector(), vec![constant, filler]).unwrap();

    let c = floating("c", 3);
    let d = floating("d", 3);
    let net_2 = plain_net(&model, "net2", &c, &d, 3);

    let switch = Switch::new(3, true, "s1", "s2");
    switch.connect(Some(SwitchInput::Net(net_1)), Some(SwitchInput::Net(net_2))).unwrap();
    switch.init(&model).unwrap();

    assert_eq!(switch.kind(), Some(SwitchKind::PassThrough));
    assert!(switch.internal_net().is_none());
    assert_eq!(switch.terminal_2().levels().to_string(), "000");

    switch.set_closed(false);
    assert!(switch.terminal_2().is_high_z());
}

#[test]
fn single_net_side_selects_forced_buffer() {
    let model = Model::new();
    let a = floating("a", 2);
    let b = floating("b", 2);
    let net_1 = plain_net(&model, "net1", &a, &b, 2);
    let lone = floating("lone", 2);

    let switch = Switch::new(2, true, "s1", "s2");
    switch.connect(Some(SwitchInput::Net(net_1)), Some(SwitchInput::Plain(lone))).unwrap();
    switch.init(&model).unwrap();
    assert_eq!(switch.kind(), Some(SwitchKind::ForcedBuffer));

    a.set_levels(&"10".parse().unwrap());
    assert_eq!(switch.terminal_2().levels().to_string(), "10");

    switch.set_closed(false);
    assert!(switch.terminal_2().is_high_z());

    // terminal 1 is never driven by this variant
    assert!(switch.terminal_1().is_high_z());
}

#[test]
fn open_can_keep_last_drive_on_terminal_1() {
    let model = Model::new();
    let lone = floating("lone", 1);
    let a = floating("a", 1);
    let b = floating("b", 1);
    let net_2 = plain_net(&model, "net2", &a, &b, 1);

    let switch = Switch::new(1, true, "s1", "s2");
    switch
        .connect_with_open_high_z(Some(SwitchInput::Plain(lone)), Some(SwitchInput::Net(net_2)), false)
        .unwrap();
    switch.init(&model).unwrap();

    a.set_levels(&"1".parse().unwrap());
    assert_eq!(switch.terminal_1().levels().to_string(), "1");

    switch.set_closed(false);
    assert_eq!(switch.terminal_1().levels().to_string(), "1");
}

#[test]
fn forced_direction_overrides_selection() {
    let model = Model::new();
    let source = floating("source", 1);
    let a = floating("a", 1);
    let b = floating("b", 1);
    let net_2 = plain_net(&model, "net2", &a, &b, 1);

    let switch = Switch::new(1, true, "s1", "s2");
    switch.set_unidirectional(Unidirectional::From1To2);
    switch.connect(Some(SwitchInput::Plain(source.clone())), Some(SwitchInput::Net(net_2))).unwrap();
    switch.init(&model).unwrap();

    assert_eq!(switch.kind(), Some(SwitchKind::ForcedBuffer));
    source.set_levels(&"1".parse().unwrap());
    assert_eq!(switch.terminal_2().levels().to_string(), "1");
    assert!(switch.terminal_1().is_high_z());
}

#[test]
fn two_real_nets_select_bidirectional_merge() {
    let model = Model::new();
    let a = floating("a", 1);
    let b = floating("b", 1);
    let c = floating("c", 1);
    let d = floating("d", 1);
    let net_1 = plain_net(&model, "net1", &a, &b, 1);
    let net_2 = plain_net(&model, "net2", &c, &d, 1);

    let switch = Switch::new(1, false, "s1", "s2");
    switch.connect(Some(SwitchInput::Net(net_1.clone())), Some(SwitchInput::Net(net_2.clone()))).unwrap();
    switch.init(&model).unwrap();
    assert_eq!(switch.kind(), Some(SwitchKind::Bidirectional));

    a.set_levels(&"1".parse().unwrap());
    assert!(switch.terminal_1().is_high_z());

    switch.set_closed(true);
    assert_eq!(switch.terminal_1().levels().to_string(), "1");
    assert_eq!(switch.terminal_2().levels().to_string(), "1");

    switch.set_closed(false);
    assert!(switch.terminal_1().is_high_z());
    assert!(switch.terminal_2().is_high_z());
}

#[test]
fn bridged_conflict_stays_on_internal_net() {
    let model = Model::new();
    let a = floating("a", 1);
    let b = floating("b", 1);
    let c = floating("c", 1);
    let d = floating("d", 1);
    let net_1 = plain_net(&model, "net1", &a, &b, 1);
    let net_2 = plain_net(&model, "net2", &c, &d, 1);

    let switch = Switch::new(1, true, "s1", "s2");
    switch.connect(Some(SwitchInput::Net(net_1.clone())), Some(SwitchInput::Net(net_2.clone()))).unwrap();
    switch.init(&model).unwrap();

    // each side is individually conflict-free, but they disagree
    a.set_levels(&"1".parse().unwrap());
    c.set_levels(&"0".parse().unwrap());
    assert!(!net_1.is_error());
    assert!(!net_2.is_error());

    let internal = switch.internal_net().unwrap();
    assert!(internal.is_error());

    // the internal merge is burn-exempt; the step still settles cleanly
    assert!(model.step_complete().is_ok());
}

#[test]
fn pass_through_conflict_is_caught_by_destination_net() {
    let model = Model::new();
    let constant = Signal::new("gnd", 1).with_constant();
    let filler = floating("filler", 1);
    let net_1 = BusNet::new("net1", 1, model.burn_detector(), vec![constant, filler]).unwrap();

    let switch = Switch::new(1, true, "s1", "s2");

    // realistic wiring: the switch terminal is itself a driver of net2
    let d = floating("d", 1);
    let net_2 = BusNet::new("net2", 1, model.burn_detector(), vec![d.clone(), switch.terminal_2().clone()]).unwrap();

    switch.connect(Some(SwitchInput::Net(net_1)), Some(SwitchInput::Net(net_2.clone()))).unwrap();
    switch.init(&model).unwrap();

    d.set_levels(&"1".parse().unwrap());
    assert!(net_2.is_error());

    // documented limitation of the constant shortcut: the pass-through
    // variant itself never re-validates the constant against the merge
    // algebra -- the conflict only surfaces on the destination net
    assert_eq!(switch.kind(), Some(SwitchKind::PassThrough));
    assert!(switch.internal_net().is_none());

    let error = model.step_complete().unwrap_err();
    assert_eq!(error.reports.len(), 1);
    assert_eq!(error.reports[0].net, "net2");
}

#[test]
fn switch_with_no_net_on_either_side_is_a_wiring_error() {
    let switch = Switch::new(1, false, "s1", "s2");
    let lone_1 = floating("lone1", 1);
    let lone_2 = floating("lone2", 1);

    match switch.connect(Some(SwitchInput::Plain(lone_1)), Some(SwitchInput::Plain(lone_2))) {
        Err(WiringError::NoNet { terminal_1, terminal_2 }) => {
            assert_eq!(terminal_1, "s1");
            assert_eq!(terminal_2, "s2");
        }
        other => panic!("expected a wiring error, got {other:?}"),
    }
}

#[test]
fn dangling_pin_leaves_switch_inert() {
    let model = Model::new();
    let a = floating("a", 1);
    let b = floating("b", 1);
    let net_1 = plain_net(&model, "net1", &a, &b, 1);

    let switch = Switch::new(1, false, "s1", "s2");
    switch.connect(Some(SwitchInput::Net(net_1)), None).unwrap();
    switch.init(&model).unwrap();

    assert_eq!(switch.kind(), None);
    switch.set_closed(true);
    assert!(!switch.is_closed());
    assert!(switch.terminal_2().is_high_z());
}

#[test]
fn mismatched_width_is_rejected_at_connect() {
    let model = Model::new();
    let a = floating("a", 4);
    let b = floating("b", 4);
    let net_1 = plain_net(&model, "net1", &a, &b, 4);
    let lone = floating("lone", 4);

    let switch = Switch::new(2, false, "s1", "s2");
    let result = switch.connect(Some(SwitchInput::Net(net_1)), Some(SwitchInput::Plain(lone)));
    assert!(matches!(result, Err(WiringError::WidthMismatch { expected: 2, found: 4, .. })));
}
