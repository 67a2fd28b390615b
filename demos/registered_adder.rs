//! Four-bit registered ripple-carry adder example.
//!
//! Two constant operands feed a chain of full adders built from XOR/AND/OR
//! gates; the sum bits are sampled into registers on a free-running clock.
//! The example prints the sum waveform, the run statistics and the static
//! timing report, whose critical path is the carry chain.

use strobe::{
    DeviceParams, GateFn, LogicValue, Network, SimConfig, SimConfigBuilder, SimulationStats, Timer,
};

const WIDTH: usize = 4;
const A: u64 = 0b1011;
const B: u64 = 0b0110;
const CLOCK_PERIOD: f64 = 20.0;
const SIM_TIME: f64 = 100.0;

fn gate_params(tcd: f64, tpd: f64) -> DeviceParams {
    DeviceParams {
        tcd,
        tpdr: tpd,
        tpdf: tpd,
        ..Default::default()
    }
}

fn reg_params() -> DeviceParams {
    DeviceParams {
        tcd: 0.2,
        tpdr: 1.0,
        tpdf: 1.0,
        ts: 0.5,
        th: 0.1,
        ..Default::default()
    }
}

/// One full adder: sum = a ^ b ^ cin, cout = a·b + (a^b)·cin.
fn full_adder(net: &mut Network, bit: usize, a: &str, b: &str, cin: &str, sum: &str, cout: &str) {
    let half = format!("fa{}_half", bit);
    let g1 = format!("fa{}_and1", bit);
    let g2 = format!("fa{}_and2", bit);
    let xor = gate_params(0.3, 1.2);
    let and = gate_params(0.2, 0.8);
    let or = gate_params(0.2, 0.8);
    net.add_gate(&format!("fa{}_x1", bit), GateFn::Xor, &[a, b], &half, xor);
    net.add_gate(&format!("fa{}_x2", bit), GateFn::Xor, &[&half, cin], sum, xor);
    net.add_gate(&format!("fa{}_a1", bit), GateFn::And, &[a, b], &g1, and);
    net.add_gate(&format!("fa{}_a2", bit), GateFn::And, &[&half, cin], &g2, and);
    net.add_gate(&format!("fa{}_or", bit), GateFn::Or, &[&g1, &g2], cout, or);
}

fn build_adder(config: SimConfig) -> Network {
    let mut net = Network::with_config(config);

    for bit in 0..WIDTH {
        net.add_dc_source(
            &format!("va{}", bit),
            &format!("a{}", bit),
            LogicValue::from_bit(A, bit as u32),
        );
        net.add_dc_source(
            &format!("vb{}", bit),
            &format!("b{}", bit),
            LogicValue::from_bit(B, bit as u32),
        );
    }
    net.add_ground("c0");

    for bit in 0..WIDTH {
        full_adder(
            &mut net,
            bit,
            &format!("a{}", bit),
            &format!("b{}", bit),
            &format!("c{}", bit),
            &format!("s{}", bit),
            &format!("c{}", bit + 1),
        );
    }

    // Output registers on a free-running clock.
    let half = CLOCK_PERIOD / 2.0;
    let edges = (SIM_TIME / half) as usize + 1;
    net.add_source(
        "vclk",
        "clk",
        (0..edges)
            .map(|i| (i as f64 * half, LogicValue::from_bool(i % 2 == 1)))
            .collect(),
        DeviceParams::default(),
    );
    for bit in 0..WIDTH {
        net.add_register(
            &format!("r{}", bit),
            &format!("s{}", bit),
            "clk",
            &format!("q{}", bit),
            reg_params(),
        );
    }
    net.add_register("rc", &format!("c{}", WIDTH), "clk", "qc", reg_params());
    net
}

fn main() {
    let config = SimConfigBuilder::new()
        .stop_time(SIM_TIME)
        .log_level("info")
        .build()
        .expect("configuration is valid");
    strobe::init_logging(&config.simulation.log_level);

    let mut net = build_adder(config);
    net.finalize().expect("adder netlist is well formed");
    net.reset().expect("network is finalized");

    let timer = Timer::start();
    net.run_to_stop().expect("run cannot fail on a finalized network");

    println!("==== Registered ripple-carry adder ====");
    println!("{:#06b} + {:#06b}\n", A, B);
    let bus = "qc q3 q2 q1 q0";
    for (time, word) in net.samples(bus).expect("sum bits exist") {
        println!("{:>7.1} ns  {}", time, word);
    }

    if let Some((device, interval)) = net.min_sample_interval() {
        println!(
            "\nTightest data-to-clock interval: {:.2} ns at {}",
            interval, device
        );
    }

    let mut stats = SimulationStats::new().with_name("registered adder");
    stats.kernel = net.stats().clone();
    stats.compute_perf(timer.elapsed_ms());
    println!("\n{}", stats.summary());

    let report = net.analyze_timing().expect("no combinational cycles");
    println!("--- Timing ---");
    for path in report.critical_paths.iter().take(3) {
        println!("{:>6.2} ns  {}", path.delay, path.nodes.join(" -> "));
    }
    if let Some(period) = report.min_clock_period {
        println!("Minimum clock period: {:.2} ns", period);
    }
}
