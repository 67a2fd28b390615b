//! The network kernel: graph construction, finalization and event-driven
//! simulation.
//!
//! A [`Network`] moves through three states. While unfinalized it accepts
//! construction calls; [`Network::finalize`] resolves node merges, checks
//! drivers, synthesizes bus resolvers for multi-driven nodes and freezes the
//! graph; after that [`Network::reset`] and [`Network::run`] may be called
//! any number of times.
//!
//! Construction calls return `bool` rather than `Result`: a rejected call
//! records a problem message on the network and marks it invalid, and
//! `finalize` refuses an invalid network. This lets a netlist front end
//! drive construction without unwinding on every malformed element.
//!
//! # Batch ordering
//!
//! `run` processes events one timestamp at a time. All value changes at a
//! timestamp are committed first, then every affected device is evaluated in
//! two waves: contamination scheduling for all of them before propagation
//! scheduling for any of them. Devices are visited in id order inside each
//! wave, so a run is a pure function of the finalized graph and the source
//! waveforms.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::device::{Device, DeviceKind, DeviceParams, MemoryPort, OutputChange, PortKind};
use crate::error::{CancelToken, GraphError};
use crate::event::{Event, EventKind};
use crate::history::{History, NO_RECORD};
use crate::logic::{LogicValue, LogicWord};
use crate::node::{resolve, Node};
use crate::queue::EventQueue;
use crate::stats::KernelStats;
use crate::table::{bus_resolution, GateFn};
use crate::types::{DeviceId, NodeId, SimTime};

/// Lifecycle state of a network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelState {
    /// Accepting construction calls.
    Unfinalized,
    /// Finalized and ready to reset/run.
    Idle,
    /// Inside `run`.
    Running,
}

/// Port description used by [`Network::add_memory`].
#[derive(Clone, Debug)]
pub struct PortSpec {
    pub kind: PortKind,
    pub enable: String,
    pub clock: Option<String>,
    /// Address lines, MSB first.
    pub addr: Vec<String>,
    /// Data lines, MSB first.
    pub data: Vec<String>,
}

/// A device/node graph plus its simulation state.
pub struct Network {
    config: SimConfig,
    state: KernelState,
    pub(crate) nodes: Vec<Node>,
    names: HashMap<String, NodeId>,
    pub(crate) devices: Vec<Device>,
    queue: EventQueue,
    history: History,
    time: SimTime,
    problem: Option<String>,
    invalid: bool,
    stats: KernelStats,
}

impl Default for Network {
    fn default() -> Self {
        Network::new()
    }
}

impl Network {
    pub fn new() -> Self {
        Network::with_config(SimConfig::default())
    }

    pub fn with_config(config: SimConfig) -> Self {
        Network {
            config,
            state: KernelState::Unfinalized,
            nodes: Vec::new(),
            names: HashMap::new(),
            devices: Vec::new(),
            queue: EventQueue::new(),
            history: History::new(),
            time: 0.0,
            problem: None,
            invalid: false,
            stats: KernelStats::default(),
        }
    }

    pub fn state(&self) -> KernelState {
        self.state
    }

    /// Current simulated time in nanoseconds.
    pub fn time(&self) -> SimTime {
        self.time
    }

    /// The first construction problem recorded, if any.
    pub fn problem(&self) -> Option<&str> {
        self.problem.as_deref()
    }

    pub fn stats(&self) -> &KernelStats {
        &self.stats
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    // --- construction ---

    /// Looks up or creates the node with this name.
    pub fn node(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.names.get(name) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(name));
        self.names.insert(name.to_string(), id);
        id
    }

    /// The id of an existing node, with merges resolved.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).map(|&id| resolve(&self.nodes, id))
    }

    fn fail(&mut self, msg: String) -> bool {
        warn!(problem = %msg, "construction rejected");
        if self.problem.is_none() {
            self.problem = Some(msg);
        }
        self.invalid = true;
        false
    }

    fn add_device(&mut self, device: Device) -> DeviceId {
        let id = DeviceId(self.devices.len());
        for &n in &device.inputs {
            self.nodes[n.0].add_fanout(id);
        }
        for &n in &device.outputs {
            self.nodes[n.0].add_driver(id);
        }
        self.devices.push(device);
        id
    }

    fn check_mutable(&mut self, what: &str) -> bool {
        if self.state != KernelState::Unfinalized {
            return self.fail(format!("cannot add {} to a finalized network", what));
        }
        true
    }

    /// Adds a combinational gate. `inputs` and `output` are node names;
    /// nodes are created on first use.
    pub fn add_gate(
        &mut self,
        name: &str,
        function: GateFn,
        inputs: &[&str],
        output: &str,
        params: DeviceParams,
    ) -> bool {
        if !self.check_mutable("gate") {
            return false;
        }
        if let Some(arity) = function.fixed_arity() {
            if inputs.len() != arity {
                return self.fail(format!(
                    "gate '{}': {:?} takes exactly {} inputs, got {}",
                    name,
                    function,
                    arity,
                    inputs.len()
                ));
            }
        } else if inputs.len() < 2 {
            return self.fail(format!(
                "gate '{}': {:?} needs at least 2 inputs, got {}",
                name,
                function,
                inputs.len()
            ));
        }
        let table = function.table(inputs.len());
        let inputs: Vec<NodeId> = inputs.iter().map(|n| self.node(n)).collect();
        let output = self.node(output);
        self.add_device(Device {
            name: name.to_string(),
            inputs,
            outputs: vec![output],
            params,
            kind: DeviceKind::Gate { function, table },
        });
        true
    }

    /// Adds a transparent D-latch with inputs `[d, enable]` and output `q`.
    pub fn add_latch(
        &mut self,
        name: &str,
        d: &str,
        enable: &str,
        q: &str,
        params: DeviceParams,
    ) -> bool {
        if !self.check_mutable("latch") {
            return false;
        }
        let inputs = vec![self.node(d), self.node(enable)];
        let q = self.node(q);
        self.add_device(Device {
            name: name.to_string(),
            inputs,
            outputs: vec![q],
            params,
            kind: DeviceKind::Latch {
                held: LogicValue::X,
                last_enable: LogicValue::X,
            },
        });
        true
    }

    /// Adds a rising-edge D-register with inputs `[d, clk]` and output `q`.
    pub fn add_register(
        &mut self,
        name: &str,
        d: &str,
        clk: &str,
        q: &str,
        params: DeviceParams,
    ) -> bool {
        if !self.check_mutable("register") {
            return false;
        }
        let inputs = vec![self.node(d), self.node(clk)];
        let q = self.node(q);
        self.add_device(Device {
            name: name.to_string(),
            inputs,
            outputs: vec![q],
            params,
            kind: DeviceKind::Register {
                master: LogicValue::X,
                last_clk: LogicValue::X,
                last_d: LogicValue::X,
                d_changed_at: 0.0,
                min_sample_interval: f64::INFINITY,
            },
        });
        true
    }

    /// Adds a multi-port memory. `contents`, when given, holds one word per
    /// location and is reloaded on every reset.
    pub fn add_memory(
        &mut self,
        name: &str,
        width: usize,
        nlocations: usize,
        ports: &[PortSpec],
        contents: Option<Vec<u64>>,
        params: DeviceParams,
    ) -> bool {
        if !self.check_mutable("memory") {
            return false;
        }
        if width == 0 || width > 64 {
            return self.fail(format!("memory '{}': width {} out of range", name, width));
        }
        if nlocations == 0 {
            return self.fail(format!("memory '{}': no locations", name));
        }
        if ports.is_empty() {
            return self.fail(format!("memory '{}': no ports", name));
        }
        for (i, port) in ports.iter().enumerate() {
            if port.data.len() != width {
                return self.fail(format!(
                    "memory '{}' port {}: {} data lines for width {}",
                    name,
                    i,
                    port.data.len(),
                    width
                ));
            }
            if (1usize << port.addr.len().min(63)) < nlocations {
                return self.fail(format!(
                    "memory '{}' port {}: {} address lines cannot reach {} locations",
                    name,
                    i,
                    port.addr.len(),
                    nlocations
                ));
            }
            if port.kind == PortKind::Write && port.clock.is_none() {
                return self.fail(format!("memory '{}' port {}: write port has no clock", name, i));
            }
        }
        if let Some(words) = &contents {
            if words.len() > nlocations {
                return self.fail(format!(
                    "memory '{}': {} initial words for {} locations",
                    name,
                    words.len(),
                    nlocations
                ));
            }
        }

        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        let mut built = Vec::new();
        for port in ports {
            let enable = self.node(&port.enable);
            inputs.push(enable);
            let clock = port.clock.as_ref().map(|c| self.node(c));
            if let Some(c) = clock {
                inputs.push(c);
            }
            let addr: Vec<NodeId> = port.addr.iter().map(|n| self.node(n)).collect();
            inputs.extend(&addr);
            let data: Vec<NodeId> = port.data.iter().map(|n| self.node(n)).collect();
            match port.kind {
                PortKind::Read => outputs.extend(&data),
                PortKind::Write => inputs.extend(&data),
            }
            built.push(MemoryPort {
                kind: port.kind,
                enable,
                clock,
                addr,
                data,
            });
        }
        let nports = built.len();
        self.add_device(Device {
            name: name.to_string(),
            inputs,
            outputs,
            params,
            kind: DeviceKind::Memory {
                width,
                nlocations,
                cells: Vec::new(),
                ports: built,
                port_clks: vec![LogicValue::X; nports],
                contents,
            },
        });
        true
    }

    /// Adds a source driving `output` with a piecewise waveform of
    /// `(time, value)` transitions, which must be in increasing time order.
    pub fn add_source(
        &mut self,
        name: &str,
        output: &str,
        waveform: Vec<(SimTime, LogicValue)>,
        params: DeviceParams,
    ) -> bool {
        if !self.check_mutable("source") {
            return false;
        }
        if waveform.is_empty() {
            return self.fail(format!("source '{}': empty waveform", name));
        }
        if waveform.windows(2).any(|w| w[1].0 < w[0].0) {
            return self.fail(format!("source '{}': waveform times not increasing", name));
        }
        if waveform.iter().any(|&(t, _)| !t.is_finite() || t < 0.0) {
            return self.fail(format!("source '{}': bad waveform time", name));
        }
        let output = self.node(output);
        self.add_device(Device {
            name: name.to_string(),
            inputs: Vec::new(),
            outputs: vec![output],
            params,
            kind: DeviceKind::Source { waveform, next: 0 },
        });
        true
    }

    /// Adds a source holding `output` at a fixed level from t=0.
    pub fn add_dc_source(&mut self, name: &str, output: &str, value: LogicValue) -> bool {
        self.add_source(name, output, vec![(0.0, value)], DeviceParams::default())
    }

    /// Ties `output` to ground (a DC zero source).
    pub fn add_ground(&mut self, output: &str) -> bool {
        self.add_dc_source(&format!("{}$gnd", output), output, LogicValue::Zero)
    }

    /// Declares two named nodes electrically identical; `b` is merged into
    /// `a`. Only meaningful before finalize.
    pub fn merge_nodes(&mut self, a: &str, b: &str) -> bool {
        if !self.check_mutable("merge") {
            return false;
        }
        let a = self.node(a);
        let b = self.node(b);
        let ra = resolve(&self.nodes, a);
        let rb = resolve(&self.nodes, b);
        if ra != rb {
            self.nodes[rb.0].merged_into = Some(ra);
        }
        true
    }

    /// Marks a node as allowed to float (Z) with no driver.
    pub fn allow_undriven(&mut self, name: &str) -> bool {
        if !self.check_mutable("undriven flag") {
            return false;
        }
        let id = self.node(name);
        self.nodes[id.0].allow_undriven = true;
        true
    }

    // --- finalize ---

    /// Freezes the graph: resolves merges, verifies drivers, synthesizes bus
    /// resolvers, computes load capacitances and marks clock nodes.
    ///
    /// Idempotent; calling it on an already-finalized network is a no-op.
    pub fn finalize(&mut self) -> Result<(), GraphError> {
        if self.state != KernelState::Unfinalized {
            return Ok(());
        }
        if self.invalid {
            let msg = self.problem.clone().unwrap_or_else(|| "invalid network".into());
            return Err(GraphError::Construction(msg));
        }

        // Resolve merge chains and fold merged nodes into their survivors.
        let map: Vec<NodeId> = (0..self.nodes.len())
            .map(|i| resolve(&self.nodes, NodeId(i)))
            .collect();
        for i in 0..self.nodes.len() {
            let root = map[i];
            if root.0 == i {
                continue;
            }
            let (drivers, fanouts, allow) = {
                let n = &mut self.nodes[i];
                n.merged_into = Some(root);
                (
                    std::mem::take(&mut n.drivers),
                    std::mem::take(&mut n.fanouts),
                    n.allow_undriven,
                )
            };
            let r = &mut self.nodes[root.0];
            for d in drivers {
                r.add_driver(d);
            }
            for d in fanouts {
                r.add_fanout(d);
            }
            r.allow_undriven |= allow;
        }
        for id in self.names.values_mut() {
            *id = map[id.0];
        }
        for device in &mut self.devices {
            device.remap_nodes(|n| map[n.0]);
        }

        // Driver checks and bus synthesis over the pre-synthesis node set.
        let live = self.nodes.len();
        for i in 0..live {
            if self.nodes[i].is_merged() {
                continue;
            }
            let drivers = self.nodes[i].drivers.clone();
            match drivers.len() {
                0 => {
                    let allowed =
                        self.nodes[i].allow_undriven || self.config.kernel.allow_undriven;
                    if !allowed {
                        return Err(GraphError::UndrivenNode(self.nodes[i].name.clone()));
                    }
                }
                1 => {}
                _ => {
                    let hard = drivers
                        .iter()
                        .filter(|d| !self.devices[d.0].is_tristate())
                        .count();
                    if hard >= 2 {
                        return Err(GraphError::DriverConflict(self.nodes[i].name.clone()));
                    }
                    self.synthesize_bus(NodeId(i), &drivers);
                }
            }
        }

        // Load capacitance: the sum of fanout input capacitances.
        for node in &mut self.nodes {
            node.capacitance = 0.0;
        }
        for device in &self.devices {
            for &input in &device.inputs {
                self.nodes[input.0].capacitance += device.params.cin;
            }
        }

        // Clock marking drives the timing analyzer's boundary cut.
        let clocks: Vec<NodeId> = self
            .devices
            .iter()
            .flat_map(|d| d.clock_inputs())
            .collect();
        for c in clocks {
            self.nodes[c.0].is_clock = true;
        }

        self.stats.node_count = self.nodes.iter().filter(|n| !n.is_merged()).count();
        self.stats.device_count = self.devices.len();
        self.state = KernelState::Idle;
        debug!(
            nodes = self.stats.node_count,
            devices = self.stats.device_count,
            "network finalized"
        );
        Ok(())
    }

    /// Rewires each driver of a multi-driven node onto its own branch node
    /// and installs a resolver driving the original node.
    fn synthesize_bus(&mut self, target: NodeId, drivers: &[DeviceId]) {
        let resolver_id = DeviceId(self.devices.len());
        let base = self.nodes[target.0].name.clone();
        let mut branches = Vec::with_capacity(drivers.len());
        for (i, &drv) in drivers.iter().enumerate() {
            let branch = NodeId(self.nodes.len());
            let mut node = Node::new(format!("{}${}", base, i));
            node.drivers.push(drv);
            node.fanouts.push(resolver_id);
            self.nodes.push(node);
            self.names.insert(format!("{}${}", base, i), branch);
            self.devices[drv.0].remap_output(target, branch);
            branches.push(branch);
        }
        debug!(node = %base, drivers = drivers.len(), "synthesized bus resolver");
        self.nodes[target.0].drivers = vec![resolver_id];
        self.devices.push(Device {
            name: format!("{}$bus", base),
            inputs: branches,
            outputs: vec![target],
            params: DeviceParams::default(),
            kind: DeviceKind::BusResolver {
                table: bus_resolution(drivers.len()),
            },
        });
    }

    // --- reset / run ---

    /// Clears all transient state: every node returns to X (Z if undriven),
    /// the queue and history empty, and device reset hooks post their
    /// initial events.
    pub fn reset(&mut self) -> Result<(), GraphError> {
        if self.state == KernelState::Unfinalized {
            return Err(GraphError::NotFinalized);
        }
        self.time = 0.0;
        self.queue.clear();
        self.history.clear();
        let (node_count, device_count) = (self.stats.node_count, self.stats.device_count);
        self.stats = KernelStats {
            node_count,
            device_count,
            ..Default::default()
        };
        for node in &mut self.nodes {
            if node.is_merged() {
                continue;
            }
            let undriven = node.drivers.is_empty();
            node.reset(undriven);
        }
        let mut initial = Vec::new();
        for device in &mut self.devices {
            initial.extend(device.reset());
        }
        for (time, change) in initial {
            self.enqueue_propagation(change.node, time, change.value);
        }
        self.state = KernelState::Idle;
        Ok(())
    }

    /// Runs until the queue drains or `stop_time` passes.
    pub fn run(&mut self, stop_time: SimTime) -> Result<SimTime, GraphError> {
        self.run_with_cancel(stop_time, &CancelToken::new())
    }

    /// Runs until the configured `simulation.stop_time` passes.
    pub fn run_to_stop(&mut self) -> Result<SimTime, GraphError> {
        self.run(self.config.simulation.stop_time)
    }

    /// Like [`Network::run`], polling `cancel` once per processed event.
    /// On cancellation the run stops cleanly after the current timestamp
    /// batch; the network stays consistent and resumable.
    pub fn run_with_cancel(
        &mut self,
        stop_time: SimTime,
        cancel: &CancelToken,
    ) -> Result<SimTime, GraphError> {
        if self.state == KernelState::Unfinalized {
            return Err(GraphError::NotFinalized);
        }
        info!(stop_time, "run started");
        self.state = KernelState::Running;
        let mut cancelled = false;
        while let Some(t) = self.queue.peek_time() {
            if t > stop_time || cancelled {
                break;
            }
            cancelled = self.step_batch(t, cancel);
            self.stats.batches += 1;
        }
        if !cancelled {
            self.time = self.time.max(stop_time);
        }
        self.stats.final_time = self.time;
        self.state = KernelState::Idle;
        info!(time = self.time, cancelled, "run finished");
        Ok(self.time)
    }

    /// Processes every event at timestamp `t`, commits the value changes,
    /// then evaluates affected devices: the contamination wave first, then
    /// the propagation wave. Returns true if cancellation tripped.
    fn step_batch(&mut self, t: SimTime, cancel: &CancelToken) -> bool {
        self.time = t;
        let mut cancelled = false;
        let mut contaminated: Vec<NodeId> = Vec::new();
        let mut committed: Vec<NodeId> = Vec::new();

        while self.queue.peek_time().map_or(false, |pt| pt == t) {
            let event = match self.queue.pop_min() {
                Some(e) => e,
                None => break,
            };
            self.stats.events_processed += 1;
            cancelled |= cancel.is_cancelled();
            let nid = event.node;
            match event.kind {
                EventKind::Contamination => {
                    let node = &mut self.nodes[nid.0];
                    node.pending_contamination = None;
                    if node.value != LogicValue::X {
                        node.value = LogicValue::X;
                        node.last_event_time = t;
                        let head = self.history.append(
                            node.history_head.unwrap_or(NO_RECORD),
                            t,
                            LogicValue::X,
                        );
                        node.history_head = Some(head);
                        contaminated.push(nid);
                    }
                }
                EventKind::Propagation => {
                    let node = &mut self.nodes[nid.0];
                    node.pending_propagation = None;
                    node.last_event_time = t;
                    if node.value != event.value {
                        node.value = event.value;
                        let head = self.history.append(
                            node.history_head.unwrap_or(NO_RECORD),
                            t,
                            event.value,
                        );
                        node.history_head = Some(head);
                        committed.push(nid);
                    }
                    // A committed source transition arms the next one.
                    let drivers = self.nodes[nid.0].drivers.clone();
                    for d in drivers {
                        if let Some((nt, change)) = self.devices[d.0].next_source_event() {
                            self.enqueue_propagation(change.node, nt.max(t), change.value);
                        }
                    }
                }
            }
        }

        // Contamination wave: every device seeing any change this batch.
        let mut wave: Vec<DeviceId> = contaminated
            .iter()
            .chain(committed.iter())
            .flat_map(|n| self.nodes[n.0].fanouts.iter().copied())
            .collect();
        wave.sort_unstable_by_key(|d| d.0);
        wave.dedup();
        for d in wave {
            self.stats.contamination_evals += 1;
            let changes = Device::contaminate(&self.devices[d.0], &self.nodes, t);
            let params = self.devices[d.0].params;
            for change in changes {
                self.schedule_contamination(change, t + params.tcd, params.lenient);
            }
        }

        // Propagation wave: only devices seeing a committed value change.
        let mut wave: Vec<DeviceId> = committed
            .iter()
            .flat_map(|n| self.nodes[n.0].fanouts.iter().copied())
            .collect();
        wave.sort_unstable_by_key(|d| d.0);
        wave.dedup();
        for d in wave {
            self.stats.propagation_evals += 1;
            let changes = Device::propagate(&mut self.devices[d.0], &self.nodes, t);
            let params = self.devices[d.0].params;
            for change in changes {
                let cap = self.nodes[change.node.0].capacitance;
                let tp = t + params.propagation_delay(change.value, cap);
                self.schedule_propagation(change, tp, params.lenient);
            }
        }
        cancelled
    }

    /// Applies the contamination scheduling rules for one reported change.
    ///
    /// Lenient devices suppress the event entirely when the settled (or
    /// already-scheduled) value provably equals the would-be value. An
    /// accepted contamination cancels any pending propagation at or after
    /// its own time, and an earlier pending contamination always wins.
    fn schedule_contamination(&mut self, change: OutputChange, tc: SimTime, lenient: bool) {
        let nid = change.node;
        if lenient {
            let node = &self.nodes[nid.0];
            match node.pending_propagation {
                Some(pid) => {
                    if self.queue.event(pid).value == change.value {
                        return;
                    }
                }
                None => {
                    if node.value == change.value && node.pending_contamination.is_none() {
                        return;
                    }
                }
            }
        }
        if let Some(pid) = self.nodes[nid.0].pending_propagation {
            if self.queue.event(pid).time >= tc {
                self.queue.remove(pid);
                self.nodes[nid.0].pending_propagation = None;
                self.stats.events_superseded += 1;
            }
        }
        match self.nodes[nid.0].pending_contamination {
            Some(cid) => {
                // The earlier contamination stands.
                if self.queue.event(cid).time > tc {
                    let id = self.queue.reschedule(cid, Event::contamination(tc, nid));
                    self.nodes[nid.0].pending_contamination = Some(id);
                }
            }
            None => {
                let id = self.queue.insert(Event::contamination(tc, nid));
                self.nodes[nid.0].pending_contamination = Some(id);
                self.note_scheduled();
            }
        }
    }

    /// Applies the propagation scheduling rules for one reported change.
    ///
    /// A lenient propagation equal to the pending one coalesces (drops);
    /// otherwise the pending propagation is rescheduled. With nothing
    /// pending, a change to the already-settled value is a no-op.
    fn schedule_propagation(&mut self, change: OutputChange, tp: SimTime, lenient: bool) {
        let nid = change.node;
        match self.nodes[nid.0].pending_propagation {
            Some(pid) => {
                if lenient && self.queue.event(pid).value == change.value {
                    self.stats.events_coalesced += 1;
                    return;
                }
                let id = self
                    .queue
                    .reschedule(pid, Event::propagation(tp, nid, change.value));
                self.nodes[nid.0].pending_propagation = Some(id);
            }
            None => {
                let node = &self.nodes[nid.0];
                if node.value == change.value && node.pending_contamination.is_none() {
                    return;
                }
                let id = self.queue.insert(Event::propagation(tp, nid, change.value));
                self.nodes[nid.0].pending_propagation = Some(id);
                self.note_scheduled();
            }
        }
    }

    /// Posts a propagation at an absolute time (reset hooks, sources).
    fn enqueue_propagation(&mut self, node: NodeId, time: SimTime, value: LogicValue) {
        let event = Event::propagation(time, node, value);
        let id = match self.nodes[node.0].pending_propagation {
            Some(pid) => self.queue.reschedule(pid, event),
            None => {
                self.note_scheduled();
                self.queue.insert(event)
            }
        };
        self.nodes[node.0].pending_propagation = Some(id);
    }

    fn note_scheduled(&mut self) {
        self.stats.events_scheduled += 1;
        // +1: the insert completes after this accounting.
        if self.queue.len() + 1 > self.stats.peak_queue_len {
            self.stats.peak_queue_len = self.queue.len() + 1;
        }
    }

    // --- read side ---

    /// The committed value of a named node.
    pub fn node_value(&self, name: &str) -> Result<LogicValue, GraphError> {
        let id = self
            .find_node(name)
            .ok_or_else(|| GraphError::UnknownNode(name.to_string()))?;
        Ok(self.nodes[id.0].value)
    }

    /// The recorded value changes for a node name or a bus expression:
    /// comma- or space-separated node names, MSB first. Each entry is the
    /// time a bit changed plus the full word at that time.
    pub fn samples(&self, expr: &str) -> Result<Vec<(SimTime, LogicWord)>, GraphError> {
        self.samples_since(expr, f64::NEG_INFINITY)
    }

    /// Restartable form of [`Network::samples`]: only changes strictly
    /// after `since` are returned, so a viewer can poll incrementally.
    pub fn samples_since(
        &self,
        expr: &str,
        since: SimTime,
    ) -> Result<Vec<(SimTime, LogicWord)>, GraphError> {
        let names: Vec<&str> = expr
            .split([',', ' '])
            .filter(|s| !s.is_empty())
            .collect();
        if names.is_empty() {
            return Err(GraphError::UnknownNode(expr.to_string()));
        }
        let mut chains = Vec::with_capacity(names.len());
        for name in &names {
            let id = self
                .find_node(name)
                .ok_or_else(|| GraphError::UnknownNode(name.to_string()))?;
            chains.push(self.history.changes(self.nodes[id.0].history_head));
        }

        // Merge the per-bit change lists into one word timeline.
        let mut times: Vec<SimTime> = chains.iter().flatten().map(|&(t, _)| t).collect();
        times.sort_by(|a, b| a.total_cmp(b));
        times.dedup();

        let mut cursors = vec![0usize; chains.len()];
        let mut bits = vec![LogicValue::X; chains.len()];
        let mut out = Vec::new();
        for t in times {
            for (i, chain) in chains.iter().enumerate() {
                while cursors[i] < chain.len() && chain[cursors[i]].0 <= t {
                    bits[i] = chain[cursors[i]].1;
                    cursors[i] += 1;
                }
            }
            if t > since {
                out.push((t, LogicWord(bits.clone())));
            }
        }
        Ok(out)
    }

    /// The smallest data-stable-to-clock-edge interval observed by any
    /// register since the last reset, with the device name. Infinite when
    /// no register has sampled.
    pub fn min_sample_interval(&self) -> Option<(&str, f64)> {
        self.devices
            .iter()
            .filter_map(|d| d.min_sample_interval().map(|m| (d.name.as_str(), m)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LogicValue::*;

    fn and_params(tcd: f64, tpd: f64) -> DeviceParams {
        DeviceParams {
            tcd,
            tpdr: tpd,
            tpdf: tpd,
            ..Default::default()
        }
    }

    #[test]
    fn test_construction_problem_blocks_finalize() {
        let mut net = Network::new();
        assert!(!net.add_gate("bad", GateFn::Mux2, &["a", "b"], "y", Default::default()));
        assert!(net.problem().is_some());
        assert!(matches!(net.finalize(), Err(GraphError::Construction(_))));
    }

    #[test]
    fn test_undriven_node_rejected() {
        let mut net = Network::new();
        net.add_dc_source("va", "a", One);
        net.add_gate("g", GateFn::And, &["a", "b"], "y", Default::default());
        match net.finalize() {
            Err(GraphError::UndrivenNode(name)) => assert_eq!(name, "b"),
            other => panic!("expected undriven error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_undriven_node_allowed_floats_z() {
        let mut net = Network::new();
        net.add_dc_source("va", "a", One);
        net.add_gate("g", GateFn::And, &["a", "b"], "y", Default::default());
        net.allow_undriven("b");
        net.finalize().unwrap();
        net.reset().unwrap();
        assert_eq!(net.node_value("b").unwrap(), Z);
    }

    #[test]
    fn test_two_hard_drivers_conflict() {
        let mut net = Network::new();
        net.add_dc_source("va", "a", One);
        net.add_dc_source("vb", "b", Zero);
        net.add_gate("g1", GateFn::And, &["a", "b"], "y", Default::default());
        net.add_gate("g2", GateFn::Or, &["a", "b"], "y", Default::default());
        assert!(matches!(net.finalize(), Err(GraphError::DriverConflict(_))));
    }

    #[test]
    fn test_merge_folds_into_survivor() {
        let mut net = Network::new();
        net.add_dc_source("va", "a", One);
        net.add_gate("inv", GateFn::Nand, &["b", "b"], "y", Default::default());
        net.merge_nodes("a", "b");
        net.finalize().unwrap();
        assert_eq!(net.find_node("a"), net.find_node("b"));
        net.reset().unwrap();
        net.run(10.0).unwrap();
        assert_eq!(net.node_value("y").unwrap(), Zero);
    }

    #[test]
    fn test_and_gate_settles() {
        let mut net = Network::new();
        net.add_dc_source("va", "a", One);
        net.add_dc_source("vb", "b", One);
        net.add_gate("g", GateFn::And, &["a", "b"], "y", and_params(1.0, 2.0));
        net.finalize().unwrap();
        net.reset().unwrap();
        net.run(100.0).unwrap();
        assert_eq!(net.node_value("y").unwrap(), One);
        assert_eq!(net.time(), 100.0);
    }

    #[test]
    fn test_run_to_stop_uses_configured_horizon() {
        let config = crate::config::SimConfigBuilder::new()
            .stop_time(50.0)
            .build()
            .unwrap();
        let mut net = Network::with_config(config);
        net.add_dc_source("va", "a", One);
        net.finalize().unwrap();
        net.reset().unwrap();
        net.run_to_stop().unwrap();
        assert_eq!(net.time(), 50.0);
    }

    #[test]
    fn test_finalize_idempotent() {
        let mut net = Network::new();
        net.add_dc_source("va", "a", One);
        net.finalize().unwrap();
        net.finalize().unwrap();
        assert_eq!(net.state(), KernelState::Idle);
    }

    #[test]
    fn test_mutation_after_finalize_rejected() {
        let mut net = Network::new();
        net.add_dc_source("va", "a", One);
        net.finalize().unwrap();
        assert!(!net.add_dc_source("vb", "b", Zero));
        assert!(net.problem().is_some());
    }

    #[test]
    fn test_run_before_finalize_errors() {
        let mut net = Network::new();
        assert!(matches!(net.reset(), Err(GraphError::NotFinalized)));
        assert!(matches!(net.run(1.0), Err(GraphError::NotFinalized)));
    }

    #[test]
    fn test_bus_synthesis_renames_branches() {
        let mut net = Network::new();
        net.add_dc_source("ven1", "en1", One);
        net.add_dc_source("ven2", "en2", Zero);
        net.add_dc_source("vd", "d", One);
        net.add_gate("t1", GateFn::TristateBuf, &["en1", "d"], "bus", Default::default());
        net.add_gate("t2", GateFn::TristateBuf, &["en2", "d"], "bus", Default::default());
        net.finalize().unwrap();
        assert!(net.find_node("bus$0").is_some());
        assert!(net.find_node("bus$1").is_some());
        net.reset().unwrap();
        net.run(10.0).unwrap();
        // Z from the disabled buffer resolves away.
        assert_eq!(net.node_value("bus").unwrap(), One);
    }

    #[test]
    fn test_cancel_stops_cleanly() {
        let mut net = Network::new();
        net.add_source(
            "clk",
            "c",
            (0..100).map(|i| (i as f64, LogicValue::from_bool(i % 2 == 1))).collect(),
            Default::default(),
        );
        net.finalize().unwrap();
        net.reset().unwrap();
        let token = CancelToken::new();
        token.cancel();
        let t = net.run_with_cancel(1000.0, &token).unwrap();
        // Stopped after the first batch, well before the stop time.
        assert!(t < 1000.0);
        assert_eq!(net.state(), KernelState::Idle);
        // Resumable.
        net.run(1000.0).unwrap();
        assert_eq!(net.time(), 1000.0);
    }
}
