//! Static timing analysis over a finalized network.
//!
//! Worst-case propagation sums and best-case contamination sums are computed
//! per node by a lazy depth-first walk backwards through drivers:
//!
//! * `tpd_sum(node)` = driver tPD + max over the driver's inputs
//! * `tcd_sum(node)` = driver tCD + min over the driver's inputs
//!
//! Sources and clocked outputs (registers, memories) are path starts; their
//! data-side inputs are not recursed through, which cuts the graph at clock
//! boundaries. A node revisited while still being explored means the
//! combinational graph has a cycle, reported as an error naming the node.
//! Analysis never touches simulation state, so a failed query leaves the
//! network exactly as it was.

use serde::Serialize;
use tracing::debug;

use crate::device::DeviceKind;
use crate::error::GraphError;
use crate::network::{KernelState, Network};
use crate::types::NodeId;

/// Per-node timing memo with predecessor links for path reconstruction.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimingInfo {
    /// Best-case cumulative contamination delay.
    pub tcd_sum: f64,
    /// Input node on the fastest path, if any.
    pub tcd_pred: Option<NodeId>,
    /// Worst-case cumulative propagation delay.
    pub tpd_sum: f64,
    /// Input node on the slowest path, if any.
    pub tpd_pred: Option<NodeId>,
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// One worst-case combinational path, source to sink.
#[derive(Clone, Debug, Serialize)]
pub struct TimingPath {
    /// Total propagation delay to the sink.
    pub delay: f64,
    /// Node names along the slowest path, source first.
    pub nodes: Vec<String>,
    pub sink: String,
}

/// Setup analysis for one clocked input.
#[derive(Clone, Debug, Serialize)]
pub struct SetupCheck {
    pub clock: String,
    pub device: String,
    pub input: String,
    /// Worst-case data arrival after the previous clock edge.
    pub data_arrival: f64,
    pub setup: f64,
    /// Shortest clock period that satisfies setup on this path.
    pub min_period: f64,
}

/// Hold analysis for one clocked input.
#[derive(Clone, Debug, Serialize)]
pub struct HoldCheck {
    pub clock: String,
    pub device: String,
    pub input: String,
    /// Best-case data contamination minus the hold requirement; negative
    /// means the input can change before the hold window closes.
    pub margin: f64,
    pub violated: bool,
}

/// Structured output of [`Network::analyze_timing`].
#[derive(Clone, Debug, Serialize)]
pub struct TimingReport {
    /// Worst paths, slowest first, at most `top_paths` of them.
    pub critical_paths: Vec<TimingPath>,
    pub setup_checks: Vec<SetupCheck>,
    /// Sorted by margin ascending, worst first.
    pub hold_checks: Vec<HoldCheck>,
    /// Largest minimum period among clock-to-clock setup paths, when any
    /// exist. Paths launched from primary inputs do not constrain it.
    pub min_clock_period: Option<f64>,
}

struct TimingAnalyzer<'a> {
    net: &'a Network,
    info: Vec<TimingInfo>,
    marks: Vec<Mark>,
}

impl<'a> TimingAnalyzer<'a> {
    fn new(net: &'a Network) -> Self {
        let n = net.nodes.len();
        TimingAnalyzer {
            net,
            info: vec![TimingInfo::default(); n],
            marks: vec![Mark::Unvisited; n],
        }
    }

    fn info(&mut self, id: NodeId) -> Result<TimingInfo, GraphError> {
        match self.marks[id.0] {
            Mark::Done => return Ok(self.info[id.0]),
            Mark::Visiting => {
                return Err(GraphError::CombinationalCycle(
                    self.net.nodes[id.0].name.clone(),
                ));
            }
            Mark::Unvisited => {}
        }
        self.marks[id.0] = Mark::Visiting;

        let node = &self.net.nodes[id.0];
        let result = match node.drivers.first() {
            None => TimingInfo::default(),
            Some(&drv) => {
                let device = &self.net.devices[drv.0];
                let delay = device.params.max_propagation_delay(node.capacitance);
                match &device.kind {
                    // Path starts: nothing combinational behind them.
                    DeviceKind::Source { .. } => TimingInfo::default(),
                    DeviceKind::Register { .. } | DeviceKind::Memory { .. } => TimingInfo {
                        tcd_sum: device.params.tcd,
                        tcd_pred: None,
                        tpd_sum: delay,
                        tpd_pred: None,
                    },
                    // A latch is combinational through its data input only.
                    DeviceKind::Latch { .. } => {
                        let through = device.inputs.first().copied().into_iter().collect();
                        self.combine(device.params.tcd, delay, through)?
                    }
                    DeviceKind::Gate { .. } | DeviceKind::BusResolver { .. } => {
                        self.combine(device.params.tcd, delay, device.inputs.clone())?
                    }
                }
            }
        };
        self.info[id.0] = result;
        self.marks[id.0] = Mark::Done;
        Ok(result)
    }

    fn combine(
        &mut self,
        tcd: f64,
        tpd: f64,
        inputs: Vec<NodeId>,
    ) -> Result<TimingInfo, GraphError> {
        let mut out = TimingInfo {
            tcd_sum: tcd,
            tcd_pred: None,
            tpd_sum: tpd,
            tpd_pred: None,
        };
        // Strict comparisons: ties keep the earliest input, so reported
        // paths are deterministic regardless of input ordering quirks.
        let mut best_in = f64::INFINITY;
        let mut worst_in = f64::NEG_INFINITY;
        for input in inputs {
            let info = self.info(input)?;
            if info.tcd_sum < best_in {
                best_in = info.tcd_sum;
                out.tcd_pred = Some(input);
            }
            if info.tpd_sum > worst_in {
                worst_in = info.tpd_sum;
                out.tpd_pred = Some(input);
            }
        }
        if best_in.is_finite() {
            out.tcd_sum += best_in;
        }
        if worst_in.is_finite() {
            out.tpd_sum += worst_in;
        }
        Ok(out)
    }

    /// True when the worst-case path into `node` originates at a clocked
    /// output (register or memory), making it a clock-to-clock path.
    fn starts_at_clocked(&self, node: NodeId) -> bool {
        let mut cursor = node;
        while let Some(pred) = self.info[cursor.0].tpd_pred {
            cursor = pred;
        }
        self.net.nodes[cursor.0]
            .drivers
            .first()
            .map_or(false, |d| self.net.devices[d.0].is_clocked())
    }

    fn path_to(&self, sink: NodeId) -> TimingPath {
        let mut names = Vec::new();
        let mut cursor = Some(sink);
        while let Some(id) = cursor {
            names.push(self.net.nodes[id.0].name.clone());
            cursor = self.info[id.0].tpd_pred;
        }
        names.reverse();
        TimingPath {
            delay: self.info[sink.0].tpd_sum,
            sink: self.net.nodes[sink.0].name.clone(),
            nodes: names,
        }
    }

    fn analyze(mut self, top_paths: usize) -> Result<TimingReport, GraphError> {
        let live: Vec<NodeId> = (0..self.net.nodes.len())
            .map(NodeId)
            .filter(|n| !self.net.nodes[n.0].is_merged())
            .collect();
        for &id in &live {
            self.info(id)?;
        }

        let mut sinks = live.clone();
        sinks.sort_by(|a, b| self.info[b.0].tpd_sum.total_cmp(&self.info[a.0].tpd_sum));
        let critical_paths: Vec<TimingPath> = sinks
            .iter()
            .take(top_paths)
            .map(|&s| self.path_to(s))
            .collect();

        // Setup/hold per clocked input: registers sample D, memory write
        // ports sample enable, address and data lines.
        let mut setup_checks = Vec::new();
        let mut hold_checks = Vec::new();
        let mut min_clock_period: Option<f64> = None;
        for device in &self.net.devices {
            let checked: Vec<(NodeId, NodeId)> = match &device.kind {
                DeviceKind::Register { .. } => match (device.inputs.first(), device.inputs.get(1))
                {
                    (Some(&d), Some(&clk)) => vec![(clk, d)],
                    _ => Vec::new(),
                },
                DeviceKind::Memory { ports, .. } => ports
                    .iter()
                    .filter(|p| p.clock.is_some())
                    .flat_map(|p| {
                        let clk = p.clock.unwrap_or(p.enable);
                        std::iter::once(p.enable)
                            .chain(p.addr.iter().copied())
                            .chain(p.data.iter().copied())
                            .map(move |input| (clk, input))
                    })
                    .collect(),
                _ => Vec::new(),
            };
            for (clk, input) in checked {
                let info = self.info[input.0];
                let clock = self.net.nodes[clk.0].name.clone();
                let input_name = self.net.nodes[input.0].name.clone();
                let min_period = info.tpd_sum + device.params.ts;
                // Only clock-to-clock paths constrain the clock period;
                // arrivals from primary inputs are launched once, not per
                // cycle.
                if self.starts_at_clocked(input) {
                    min_clock_period =
                        Some(min_clock_period.map_or(min_period, |m| m.max(min_period)));
                }
                setup_checks.push(SetupCheck {
                    clock: clock.clone(),
                    device: device.name.clone(),
                    input: input_name.clone(),
                    data_arrival: info.tpd_sum,
                    setup: device.params.ts,
                    min_period,
                });
                let margin = info.tcd_sum - device.params.th;
                hold_checks.push(HoldCheck {
                    clock,
                    device: device.name.clone(),
                    input: input_name,
                    margin,
                    violated: margin < 0.0,
                });
            }
        }
        setup_checks.sort_by(|a, b| b.min_period.total_cmp(&a.min_period));
        hold_checks.sort_by(|a, b| a.margin.total_cmp(&b.margin));

        debug!(
            paths = critical_paths.len(),
            setup = setup_checks.len(),
            holds = hold_checks.len(),
            "timing analysis complete"
        );
        Ok(TimingReport {
            critical_paths,
            setup_checks,
            hold_checks,
            min_clock_period,
        })
    }
}

impl Network {
    /// Runs static timing analysis, returning the worst combinational paths
    /// and setup/hold figures for every clocked input.
    pub fn analyze_timing(&self) -> Result<TimingReport, GraphError> {
        if self.state() == KernelState::Unfinalized {
            return Err(GraphError::NotFinalized);
        }
        TimingAnalyzer::new(self).analyze(self.config().kernel.top_paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceParams;
    use crate::logic::LogicValue;
    use crate::table::GateFn;

    fn gate_params(tcd: f64, tpd: f64) -> DeviceParams {
        DeviceParams {
            tcd,
            tpdr: tpd,
            tpdf: tpd,
            ..Default::default()
        }
    }

    #[test]
    fn test_chain_delay_sums() {
        let mut net = Network::new();
        net.add_dc_source("va", "a", LogicValue::One);
        net.add_dc_source("vb", "b", LogicValue::One);
        net.add_gate("g1", GateFn::And, &["a", "b"], "m", gate_params(1.0, 3.0));
        net.add_gate("g2", GateFn::Nand, &["m", "b"], "y", gate_params(1.0, 4.0));
        net.finalize().unwrap();
        let report = net.analyze_timing().unwrap();
        let worst = &report.critical_paths[0];
        assert_eq!(worst.sink, "y");
        assert_eq!(worst.delay, 7.0);
        assert_eq!(worst.nodes, vec!["a", "m", "y"]);
    }

    #[test]
    fn test_cycle_detected() {
        let mut net = Network::new();
        net.add_dc_source("va", "a", LogicValue::One);
        net.add_dc_source("vb", "b", LogicValue::One);
        // Cross-coupled NANDs with no clocked element in the loop.
        net.add_gate("g1", GateFn::Nand, &["a", "q2"], "q1", gate_params(1.0, 2.0));
        net.add_gate("g2", GateFn::Nand, &["b", "q1"], "q2", gate_params(1.0, 2.0));
        net.finalize().unwrap();
        match net.analyze_timing() {
            Err(GraphError::CombinationalCycle(node)) => {
                assert!(node == "q1" || node == "q2");
            }
            other => panic!("expected cycle error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_register_cuts_path() {
        let mut net = Network::new();
        net.add_dc_source("vd", "d", LogicValue::One);
        net.add_dc_source("vc", "clk", LogicValue::Zero);
        let mut reg = gate_params(0.5, 2.0);
        reg.ts = 1.0;
        reg.th = 0.25;
        net.add_register("r", "d", "clk", "q", reg);
        net.add_gate("g", GateFn::And, &["q", "d"], "y", gate_params(1.0, 3.0));
        net.finalize().unwrap();
        let report = net.analyze_timing().unwrap();
        // q starts a path at clock-to-Q delay, independent of d's sources.
        let q_path = report
            .critical_paths
            .iter()
            .find(|p| p.sink == "q")
            .unwrap();
        assert_eq!(q_path.delay, 2.0);
        assert_eq!(q_path.nodes, vec!["q"]);
        let y_path = report
            .critical_paths
            .iter()
            .find(|p| p.sink == "y")
            .unwrap();
        assert_eq!(y_path.delay, 5.0);
    }

    #[test]
    fn test_setup_hold_figures() {
        let mut net = Network::new();
        net.add_dc_source("va", "a", LogicValue::One);
        net.add_dc_source("vb", "b", LogicValue::One);
        net.add_dc_source("vc", "clk", LogicValue::Zero);
        net.add_gate("g", GateFn::And, &["a", "b"], "d", gate_params(1.0, 4.0));
        let mut reg = DeviceParams::default();
        reg.ts = 2.0;
        reg.th = 1.5;
        net.add_register("r", "d", "clk", "q", reg);
        net.finalize().unwrap();
        let report = net.analyze_timing().unwrap();

        assert_eq!(report.setup_checks.len(), 1);
        let setup = &report.setup_checks[0];
        assert_eq!(setup.clock, "clk");
        assert_eq!(setup.data_arrival, 4.0);
        assert_eq!(setup.min_period, 6.0);
        // The data path launches from primary inputs, not a clocked output,
        // so it does not constrain the clock period.
        assert_eq!(report.min_clock_period, None);

        let hold = &report.hold_checks[0];
        // Best-case contamination 1.0 against a 1.5 hold window.
        assert_eq!(hold.margin, -0.5);
        assert!(hold.violated);
    }

    #[test]
    fn test_equal_arrival_keeps_first_input_on_path() {
        let mut net = Network::new();
        net.add_dc_source("va", "a", LogicValue::One);
        net.add_dc_source("vb", "b", LogicValue::One);
        // Both inputs arrive at the same time; the reported worst path must
        // deterministically go through the first one.
        net.add_gate("g", GateFn::And, &["a", "b"], "y", gate_params(1.0, 2.0));
        net.finalize().unwrap();
        let report = net.analyze_timing().unwrap();
        let worst = &report.critical_paths[0];
        assert_eq!(worst.nodes, vec!["a", "y"]);
    }

    #[test]
    fn test_min_period_restricted_to_clocked_origins() {
        let mut net = Network::new();
        net.add_dc_source("va", "a", LogicValue::One);
        net.add_dc_source("vc", "clk", LogicValue::Zero);
        net.add_gate("g", GateFn::Nand, &["a", "a"], "d", gate_params(1.0, 40.0));
        let mut reg = DeviceParams::default();
        reg.ts = 2.0;
        net.add_register("r", "d", "clk", "q", reg);
        net.finalize().unwrap();
        let report = net.analyze_timing().unwrap();
        // The setup check is still reported with its per-path figure, but a
        // slow primary-input path is no reason to slow the clock.
        assert_eq!(report.setup_checks[0].min_period, 42.0);
        assert_eq!(report.min_clock_period, None);
    }

    #[test]
    fn test_analysis_leaves_simulation_untouched() {
        let mut net = Network::new();
        net.add_dc_source("va", "a", LogicValue::One);
        net.add_gate("g1", GateFn::Nand, &["a", "q2"], "q1", gate_params(0.0, 1.0));
        net.add_gate("g2", GateFn::Nand, &["a", "q1"], "q2", gate_params(0.0, 1.0));
        net.finalize().unwrap();
        net.reset().unwrap();
        assert!(net.analyze_timing().is_err());
        // The failed query does not poison the simulation side.
        assert!(net.run(5.0).is_ok());
    }

    #[test]
    fn test_requires_finalize() {
        let net = Network::new();
        assert!(matches!(
            net.analyze_timing(),
            Err(GraphError::NotFinalized)
        ));
    }
}
