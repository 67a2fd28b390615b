//! Integration tests for the static timing analyzer on clocked designs.

use strobe::{DeviceParams, GateFn, GraphError, LogicValue, Network};

fn gate_params(tcd: f64, tpd: f64) -> DeviceParams {
    DeviceParams {
        tcd,
        tpdr: tpd,
        tpdf: tpd,
        ..Default::default()
    }
}

fn reg_params(tpd: f64, ts: f64, th: f64) -> DeviceParams {
    DeviceParams {
        tcd: 0.2,
        tpdr: tpd,
        tpdf: tpd,
        ts,
        th,
        ..Default::default()
    }
}

/// Register-to-register path: minimum period is clock-to-Q plus the
/// combinational delay plus setup.
#[test]
fn register_to_register_min_period() {
    let mut net = Network::new();
    net.add_dc_source("vd", "d0", LogicValue::One);
    net.add_dc_source("vclk", "clk", LogicValue::Zero);
    net.add_register("r1", "d0", "clk", "q1", reg_params(2.0, 0.5, 0.1));
    net.add_gate("g", GateFn::Nand, &["q1", "q1"], "d1", gate_params(0.5, 3.0));
    net.add_register("r2", "d1", "clk", "q2", reg_params(2.0, 0.5, 0.1));
    net.finalize().unwrap();

    let report = net.analyze_timing().unwrap();
    // 2.0 (clk-to-Q of r1) + 3.0 (NAND) + 0.5 (setup of r2)
    let r2_setup = report
        .setup_checks
        .iter()
        .find(|c| c.device == "r2")
        .unwrap();
    assert_eq!(r2_setup.data_arrival, 5.0);
    assert_eq!(r2_setup.min_period, 5.5);
    assert_eq!(report.min_clock_period, Some(5.5));

    // Fast direct path into r1 violates its hold window? tcd 0 from the
    // source, hold 0.1 -> margin is negative.
    let r1_hold = report
        .hold_checks
        .iter()
        .find(|c| c.device == "r1")
        .unwrap();
    assert!(r1_hold.violated);

    // r2's data contaminates no earlier than r1's tcd plus the gate's tcd.
    let r2_hold = report
        .hold_checks
        .iter()
        .find(|c| c.device == "r2")
        .unwrap();
    assert!((r2_hold.margin - 0.6).abs() < 1e-9);
    assert!(!r2_hold.violated);
}

/// A loop broken only by transparent latches is still combinational and
/// must be reported as a cycle.
#[test]
fn latch_loop_is_combinational_cycle() {
    let mut net = Network::new();
    net.add_dc_source("vg", "en", LogicValue::One);
    net.add_latch("l1", "b", "en", "a", DeviceParams::default());
    net.add_latch("l2", "a", "en", "b", DeviceParams::default());
    net.finalize().unwrap();
    assert!(matches!(
        net.analyze_timing(),
        Err(GraphError::CombinationalCycle(_))
    ));
}

/// A register inside the loop cuts it.
#[test]
fn register_breaks_cycle() {
    let mut net = Network::new();
    net.add_dc_source("vclk", "clk", LogicValue::Zero);
    net.add_register("r", "nq", "clk", "q", reg_params(1.0, 0.5, 0.1));
    net.add_gate("inv", GateFn::Nand, &["q", "q"], "nq", gate_params(0.2, 0.6));
    net.finalize().unwrap();
    let report = net.analyze_timing().unwrap();
    assert!(report.min_clock_period.is_some());
}

/// Timing reports serialize for external tooling.
#[test]
fn report_serializes_to_json() {
    let mut net = Network::new();
    net.add_dc_source("va", "a", LogicValue::One);
    net.add_gate("g", GateFn::Nand, &["a", "a"], "y", gate_params(0.5, 2.0));
    net.finalize().unwrap();
    let report = net.analyze_timing().unwrap();
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("critical_paths"));
    assert!(json.contains("\"sink\":\"y\""));
}
