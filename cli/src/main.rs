use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use tracing_tree::HierarchicalLayer;
use voltnet_wiring::{BusNet, Levels, Model, Signal, Switch, SwitchInput};

/// Runs a small demonstration circuit through the net merge core.
#[derive(Parser)]
struct Args {
    /// Circuit to run: "bus" (two drivers on one net) or "switch" (a switch
    /// bridging two nets)
    #[arg(default_value = "bus")]
    scenario: String,
    /// Levels driven by the first driver, MSB first (e.g. "1ZL")
    #[arg(short = 'a', long, default_value = "111")]
    drive_a: String,
    /// Levels driven by the second driver
    #[arg(short = 'b', long, default_value = "ZZZ")]
    drive_b: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(HierarchicalLayer::new(2))
        .init();
    tracing::info!(scenario = args.scenario.as_str(), "voltnet demo starting");

    let Some(drive_a) = parse_drive(&args.drive_a) else { return ExitCode::FAILURE };
    let Some(drive_b) = parse_drive(&args.drive_b) else { return ExitCode::FAILURE };
    if drive_a.len() != drive_b.len() {
        eprintln!("drivers must have the same width, got {} and {}", drive_a.len(), drive_b.len());
        return ExitCode::FAILURE;
    }

    match args.scenario.as_str() {
        "bus" => run_bus(&drive_a, &drive_b),
        "switch" => run_switch(&drive_a, &drive_b),
        other => {
            eprintln!("unknown scenario {other:?}, expected \"bus\" or \"switch\"");
            ExitCode::FAILURE
        }
    }
}

fn parse_drive(text: &str) -> Option<Levels> {
    let levels = match text.parse::<Levels>() {
        Ok(levels) => levels,
        Err(e) => {
            eprintln!("{e}");
            return None;
        }
    };
    if levels.is_empty() || levels.len() > 64 {
        eprintln!("driver width must be 1..=64, got {}", levels.len());
        return None;
    }
    if levels.has_error() {
        eprintln!("the error level X cannot be driven");
        return None;
    }
    Some(levels)
}

fn run_bus(drive_a: &Levels, drive_b: &Levels) -> ExitCode {
    let width = drive_a.len() as u32;
    let model = Model::new();
    let a = Signal::new("a", width).with_high_z();
    let b = Signal::new("b", width).with_high_z();
    let net = match BusNet::new("bus", width, model.burn_detector(), vec![a.clone(), b.clone()]) {
        Ok(net) => net,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    a.set_levels(drive_a);
    b.set_levels(drive_b);
    println!("{} + {} resolves to {}", a, b, net.output().levels());

    finish_step(&model)
}

fn run_switch(drive_a: &Levels, drive_b: &Levels) -> ExitCode {
    let width = drive_a.len() as u32;
    let model = Model::new();
    let a = Signal::new("a", width).with_high_z();
    let b = Signal::new("b", width).with_high_z();
    let c = Signal::new("c", width).with_high_z();
    let d = Signal::new("d", width).with_high_z();

    let wire = |name: &str, drivers: Vec<Signal>| BusNet::new(name, width, model.burn_detector(), drivers);
    let (net_1, net_2) = match (wire("net1", vec![a.clone(), b.clone()]), wire("net2", vec![c.clone(), d.clone()])) {
        (Ok(net_1), Ok(net_2)) => (net_1, net_2),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let switch = Switch::new(width, false, "s1", "s2");
    let wired = switch
        .connect(Some(SwitchInput::Net(net_1)), Some(SwitchInput::Net(net_2)))
        .and_then(|()| switch.init(&model));
    if let Err(e) = wired {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    a.set_levels(drive_a);
    c.set_levels(drive_b);
    println!("open:   {} {}", switch.terminal_1(), switch.terminal_2());
    switch.set_closed(true);
    println!("closed: {} {}", switch.terminal_1(), switch.terminal_2());

    finish_step(&model)
}

fn finish_step(model: &Model) -> ExitCode {
    match model.step_complete() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
