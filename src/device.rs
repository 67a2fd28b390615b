//! Devices: gates, latches, registers, memories, bus resolvers, sources.
//!
//! A device owns ordered input and output node references plus a closed set
//! of kind-specific payloads. Evaluation happens through two entry points
//! mirroring the two event kinds: [`Device::contaminate`] reports outputs
//! that may start changing (read-only, called during the contamination half
//! of a batch), and [`Device::propagate`] computes settled output values and
//! updates kind state (edge detection, latched data, memory cells). The
//! network owns all event scheduling; devices only report value changes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::logic::LogicValue;
use crate::node::Node;
use crate::table::{GateFn, LookupTable};
use crate::types::{NodeId, SimTime};

/// Static per-device parameters.
///
/// Delays are in nanoseconds; `tr`/`tf` are drive coefficients multiplied by
/// the output node's load capacitance. `ts`/`th` are the setup and hold
/// windows used by the timing analyzer for clocked devices.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DeviceParams {
    /// Contamination delay.
    pub tcd: f64,
    /// Propagation delay for a rising output.
    pub tpdr: f64,
    /// Propagation delay for a falling output.
    pub tpdf: f64,
    /// Rise drive coefficient (ns per unit load).
    pub tr: f64,
    /// Fall drive coefficient (ns per unit load).
    pub tf: f64,
    /// Input capacitance added to each input node's load.
    pub cin: f64,
    /// Driver output capacitance.
    pub cout: f64,
    /// Relative sizing factor.
    pub size: f64,
    /// Lenient devices suppress events whose value is provably unchanged.
    pub lenient: bool,
    /// Tristate-capable outputs may share a bus with other drivers.
    pub tristate: bool,
    /// Setup time (clocked devices).
    pub ts: f64,
    /// Hold time (clocked devices).
    pub th: f64,
}

impl Default for DeviceParams {
    fn default() -> Self {
        DeviceParams {
            tcd: 0.0,
            tpdr: 0.0,
            tpdf: 0.0,
            tr: 0.0,
            tf: 0.0,
            cin: 0.0,
            cout: 0.0,
            size: 1.0,
            lenient: false,
            tristate: false,
            ts: 0.0,
            th: 0.0,
        }
    }
}

impl DeviceParams {
    /// Propagation delay for committing `value` into a load of `cap`.
    ///
    /// Rising and falling edges use their own delay and drive coefficient;
    /// unknown values pessimistically take the earlier of the two.
    pub fn propagation_delay(&self, value: LogicValue, cap: f64) -> f64 {
        let rise = self.tpdr + self.tr * cap;
        let fall = self.tpdf + self.tf * cap;
        match value {
            LogicValue::One => rise,
            LogicValue::Zero => fall,
            _ => rise.min(fall),
        }
    }

    /// Worst-case propagation delay, used by the timing analyzer.
    pub fn max_propagation_delay(&self, cap: f64) -> f64 {
        (self.tpdr + self.tr * cap).max(self.tpdf + self.tf * cap)
    }
}

/// Direction of a memory port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortKind {
    Read,
    Write,
}

/// One port of a multi-port memory.
///
/// Address and data lines are MSB-first. Read ports drive their data nodes
/// (tristate, gated by `enable` as an output enable); write ports sample
/// their data bus on the rising edge of `clock` while `enable` is high.
#[derive(Clone, Debug)]
pub struct MemoryPort {
    pub kind: PortKind,
    pub enable: NodeId,
    pub clock: Option<NodeId>,
    pub addr: Vec<NodeId>,
    pub data: Vec<NodeId>,
}

/// Kind-specific payload of a device.
#[derive(Clone, Debug)]
pub enum DeviceKind {
    /// Stateless combinational gate driven by a lookup table.
    Gate {
        function: GateFn,
        table: Arc<LookupTable>,
    },
    /// Transparent D-latch: inputs `[d, enable]`, output `[q]`.
    Latch { held: LogicValue, last_enable: LogicValue },
    /// Edge-triggered D-register: inputs `[d, clk]`, output `[q]`.
    Register {
        master: LogicValue,
        last_clk: LogicValue,
        last_d: LogicValue,
        d_changed_at: SimTime,
        /// Minimum observed data-stable-to-clock-edge interval.
        min_sample_interval: f64,
    },
    /// Multi-port memory over one array of 4-valued cells.
    Memory {
        width: usize,
        nlocations: usize,
        cells: Vec<LogicValue>,
        ports: Vec<MemoryPort>,
        port_clks: Vec<LogicValue>,
        /// Initial contents reloaded on reset, one word per location.
        contents: Option<Vec<u64>>,
    },
    /// Bus resolver synthesized at finalize for multi-driven nodes.
    BusResolver { table: Arc<LookupTable> },
    /// Logic voltage source: a DC level or a piecewise waveform.
    Source {
        waveform: Vec<(SimTime, LogicValue)>,
        next: usize,
    },
}

/// A reported output value change; scheduling is the network's job.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutputChange {
    pub node: NodeId,
    pub value: LogicValue,
}

/// A device instance in the network graph.
#[derive(Clone, Debug)]
pub struct Device {
    pub name: String,
    pub inputs: Vec<NodeId>,
    pub outputs: Vec<NodeId>,
    pub params: DeviceParams,
    pub kind: DeviceKind,
}

impl Device {
    /// True when this device's outputs can share a bus with other drivers.
    pub fn is_tristate(&self) -> bool {
        match &self.kind {
            DeviceKind::Gate { function, .. } => {
                function.is_tristate() || self.params.tristate
            }
            DeviceKind::Memory { .. } => true,
            _ => self.params.tristate,
        }
    }

    /// True for devices whose outputs are sampled on a clock and therefore
    /// cut combinational timing paths.
    pub fn is_clocked(&self) -> bool {
        matches!(
            self.kind,
            DeviceKind::Register { .. } | DeviceKind::Memory { .. }
        )
    }

    /// The clock input nodes of this device, if any.
    pub fn clock_inputs(&self) -> Vec<NodeId> {
        match &self.kind {
            DeviceKind::Register { .. } => self.inputs.get(1).copied().into_iter().collect(),
            DeviceKind::Latch { .. } => self.inputs.get(1).copied().into_iter().collect(),
            DeviceKind::Memory { ports, .. } => {
                ports.iter().filter_map(|p| p.clock).collect()
            }
            _ => Vec::new(),
        }
    }

    /// The data input sampled by this device's clock, for setup/hold checks.
    pub fn sampled_input(&self) -> Option<NodeId> {
        match &self.kind {
            DeviceKind::Register { .. } | DeviceKind::Latch { .. } => self.inputs.first().copied(),
            _ => None,
        }
    }

    /// Rewrites every node reference through `f`, used when node merges are
    /// resolved at finalize.
    pub fn remap_nodes(&mut self, f: impl Fn(NodeId) -> NodeId) {
        for n in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            *n = f(*n);
        }
        if let DeviceKind::Memory { ports, .. } = &mut self.kind {
            for port in ports {
                port.enable = f(port.enable);
                if let Some(clk) = port.clock.as_mut() {
                    *clk = f(*clk);
                }
                for n in port.addr.iter_mut().chain(port.data.iter_mut()) {
                    *n = f(*n);
                }
            }
        }
    }

    /// Rewrites output references to `from` so they drive `to` instead.
    /// Input references are untouched, so a device feeding back into its
    /// own input keeps reading the original node.
    pub fn remap_output(&mut self, from: NodeId, to: NodeId) {
        for n in self.outputs.iter_mut() {
            if *n == from {
                *n = to;
            }
        }
        if let DeviceKind::Memory { ports, .. } = &mut self.kind {
            for port in ports.iter_mut().filter(|p| p.kind == PortKind::Read) {
                for n in port.data.iter_mut() {
                    if *n == from {
                        *n = to;
                    }
                }
            }
        }
    }

    fn input_values(&self, nodes: &[Node]) -> Vec<LogicValue> {
        self.inputs.iter().map(|n| nodes[n.0].value).collect()
    }

    /// Contamination-phase evaluation: which outputs may start changing,
    /// and what their eventual value would be. Read-only; kind state (edge
    /// trackers, latched data) is updated only by [`Device::propagate`].
    pub fn contaminate(&self, nodes: &[Node], _now: SimTime) -> Vec<OutputChange> {
        match &self.kind {
            DeviceKind::Gate { table, .. } | DeviceKind::BusResolver { table } => {
                let value = table.lookup(&self.input_values(nodes));
                self.outputs
                    .iter()
                    .map(|&node| OutputChange { node, value })
                    .collect()
            }
            DeviceKind::Latch { held, .. } => {
                let d = nodes[self.inputs[0].0].value;
                let enable = nodes[self.inputs[1].0].value;
                let q = self.outputs[0];
                match enable {
                    // Transparent: output follows the (possibly unknown) input.
                    LogicValue::One => vec![OutputChange { node: q, value: d }],
                    LogicValue::Zero => Vec::new(),
                    // Unknown enable holds only when hold and follow agree.
                    _ => {
                        if *held == d {
                            Vec::new()
                        } else {
                            vec![OutputChange {
                                node: q,
                                value: LogicValue::X,
                            }]
                        }
                    }
                }
            }
            DeviceKind::Register { last_clk, .. } => {
                let d = nodes[self.inputs[0].0].value;
                let clk = nodes[self.inputs[1].0].value;
                let q = self.outputs[0];
                if clk == LogicValue::One && *last_clk == LogicValue::Zero {
                    // Clean edge arriving this timestamp: Q will change to D.
                    vec![OutputChange { node: q, value: d }]
                } else if !clk.is_driven() {
                    // An X-valued clock edge contaminates the output unless
                    // it is provably unchanged (checked leniently upstream).
                    let value = if nodes[q.0].value == d {
                        d
                    } else {
                        LogicValue::X
                    };
                    vec![OutputChange { node: q, value }]
                } else {
                    Vec::new()
                }
            }
            DeviceKind::Memory { .. } => self.memory_outputs(nodes),
            DeviceKind::Source { .. } => Vec::new(),
        }
    }

    /// Propagation-phase evaluation: settled output values. Updates kind
    /// state such as edge trackers, latched data and memory cells.
    pub fn propagate(&mut self, nodes: &[Node], now: SimTime) -> Vec<OutputChange> {
        let q = self.outputs.first().copied();
        match &mut self.kind {
            DeviceKind::Gate { table, .. } | DeviceKind::BusResolver { table } => {
                let value = table.lookup(
                    &self
                        .inputs
                        .iter()
                        .map(|n| nodes[n.0].value)
                        .collect::<Vec<_>>(),
                );
                self.outputs
                    .iter()
                    .map(|&node| OutputChange { node, value })
                    .collect()
            }
            DeviceKind::Latch { held, last_enable } => {
                let d = nodes[self.inputs[0].0].value;
                let enable = nodes[self.inputs[1].0].value;
                let q = self.outputs[0];
                *last_enable = enable;
                match enable {
                    LogicValue::One => {
                        *held = d;
                        vec![OutputChange { node: q, value: d }]
                    }
                    LogicValue::Zero => Vec::new(),
                    _ => {
                        if *held == d {
                            Vec::new()
                        } else {
                            vec![OutputChange {
                                node: q,
                                value: LogicValue::X,
                            }]
                        }
                    }
                }
            }
            DeviceKind::Register {
                master,
                last_clk,
                last_d,
                d_changed_at,
                min_sample_interval,
            } => {
                let d = nodes[self.inputs[0].0].value;
                let clk = nodes[self.inputs[1].0].value;
                let q = match q {
                    Some(q) => q,
                    None => return Vec::new(),
                };
                let mut out = Vec::new();
                if d != *last_d {
                    *last_d = d;
                    *d_changed_at = now;
                }
                if clk != *last_clk {
                    let prev = *last_clk;
                    *last_clk = clk;
                    if clk == LogicValue::One && prev == LogicValue::Zero {
                        // Declared (rising) clock edge: sample D.
                        let interval = now - *d_changed_at;
                        if interval < *min_sample_interval {
                            *min_sample_interval = interval;
                        }
                        *master = d;
                        out.push(OutputChange { node: q, value: d });
                    } else if clk == LogicValue::One {
                        // Edge out of an unknown clock: sampling is suspect.
                        let value = if self.params.lenient && nodes[q.0].value == d {
                            d
                        } else {
                            LogicValue::X
                        };
                        *master = value;
                        out.push(OutputChange { node: q, value });
                    } else if !clk.is_driven() {
                        let value = if self.params.lenient && nodes[q.0].value == d {
                            d
                        } else {
                            LogicValue::X
                        };
                        out.push(OutputChange { node: q, value });
                    }
                    // Falling edge: hold.
                }
                out
            }
            DeviceKind::Memory { .. } => {
                self.memory_propagate(nodes);
                self.memory_outputs(nodes)
            }
            DeviceKind::Source { .. } => Vec::new(),
        }
    }

    /// Clears per-run state and reports the initial events this device
    /// wants posted after a network reset.
    pub fn reset(&mut self) -> Vec<(SimTime, OutputChange)> {
        match &mut self.kind {
            DeviceKind::Gate { .. } | DeviceKind::BusResolver { .. } => Vec::new(),
            DeviceKind::Latch { held, last_enable } => {
                *held = LogicValue::X;
                *last_enable = LogicValue::X;
                Vec::new()
            }
            DeviceKind::Register {
                master,
                last_clk,
                last_d,
                d_changed_at,
                min_sample_interval,
            } => {
                *master = LogicValue::X;
                *last_clk = LogicValue::X;
                *last_d = LogicValue::X;
                *d_changed_at = 0.0;
                *min_sample_interval = f64::INFINITY;
                Vec::new()
            }
            DeviceKind::Memory {
                width,
                nlocations,
                cells,
                contents,
                port_clks,
                ..
            } => {
                cells.clear();
                match contents {
                    Some(words) => {
                        for loc in 0..*nlocations {
                            let word = words.get(loc).copied().unwrap_or(0);
                            for bit in (0..*width).rev() {
                                cells.push(LogicValue::from_bit(word, bit as u32));
                            }
                        }
                    }
                    None => cells.resize(*width * *nlocations, LogicValue::X),
                }
                for clk in port_clks.iter_mut() {
                    *clk = LogicValue::X;
                }
                Vec::new()
            }
            DeviceKind::Source { waveform, next } => {
                *next = 0;
                match waveform.first() {
                    Some(&(time, value)) => {
                        *next = 1;
                        vec![(
                            time,
                            OutputChange {
                                node: self.outputs[0],
                                value,
                            },
                        )]
                    }
                    None => Vec::new(),
                }
            }
        }
    }

    /// For sources: the next waveform transition at or after the current
    /// one, armed by the network each time the previous transition commits.
    pub fn next_source_event(&mut self) -> Option<(SimTime, OutputChange)> {
        if let DeviceKind::Source { waveform, next } = &mut self.kind {
            let node = *self.outputs.first()?;
            if let Some(&(time, value)) = waveform.get(*next) {
                *next += 1;
                return Some((time, OutputChange { node, value }));
            }
        }
        None
    }

    /// The minimum data-to-clock interval a register has observed, if this
    /// device tracks one.
    pub fn min_sample_interval(&self) -> Option<f64> {
        match &self.kind {
            DeviceKind::Register {
                min_sample_interval,
                ..
            } => Some(*min_sample_interval),
            _ => None,
        }
    }

    // --- memory internals ---

    fn resolve_address(nodes: &[Node], addr: &[NodeId], nlocations: usize) -> Option<usize> {
        let mut acc = 0usize;
        for &bit in addr {
            acc = (acc << 1)
                | match nodes[bit.0].value {
                    LogicValue::Zero => 0,
                    LogicValue::One => 1,
                    _ => return None,
                };
        }
        (acc < nlocations).then_some(acc)
    }

    /// Applies any write-port clock edges to the cell array.
    fn memory_propagate(&mut self, nodes: &[Node]) {
        let DeviceKind::Memory {
            width,
            nlocations,
            cells,
            ports,
            port_clks,
            ..
        } = &mut self.kind
        else {
            return;
        };
        for (i, port) in ports.iter().enumerate() {
            if port.kind != PortKind::Write {
                continue;
            }
            let clk = port
                .clock
                .map(|n| nodes[n.0].value)
                .unwrap_or(LogicValue::X);
            let prev = port_clks[i];
            port_clks[i] = clk;
            if !(clk == LogicValue::One && prev == LogicValue::Zero) {
                continue;
            }
            let wen = nodes[port.enable.0].value;
            if wen == LogicValue::Zero {
                continue;
            }
            match Self::resolve_address(nodes, &port.addr, *nlocations) {
                Some(loc) if wen == LogicValue::One => {
                    for (bit, &data) in port.data.iter().enumerate() {
                        cells[loc * *width + bit] = nodes[data.0].value;
                    }
                }
                Some(loc) => {
                    // Unknown write enable on an edge: the addressed word
                    // may or may not have been written.
                    for bit in 0..*width {
                        cells[loc * *width + bit] = LogicValue::X;
                    }
                }
                None => {
                    // An unresolved write address contaminates everything.
                    for cell in cells.iter_mut() {
                        *cell = LogicValue::X;
                    }
                }
            }
        }
    }

    /// Values every read port currently drives.
    fn memory_outputs(&self, nodes: &[Node]) -> Vec<OutputChange> {
        let DeviceKind::Memory {
            width,
            nlocations,
            cells,
            ports,
            ..
        } = &self.kind
        else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for port in ports {
            if port.kind != PortKind::Read {
                continue;
            }
            let oe = nodes[port.enable.0].value;
            let loc = Self::resolve_address(nodes, &port.addr, *nlocations);
            for (bit, &data) in port.data.iter().enumerate() {
                let value = match oe {
                    LogicValue::Zero => LogicValue::Z,
                    LogicValue::One => match loc {
                        Some(loc) => cells[loc * *width + bit],
                        None => LogicValue::X,
                    },
                    _ => LogicValue::X,
                };
                out.push(OutputChange { node: data, value });
            }
        }
        out
    }
}
