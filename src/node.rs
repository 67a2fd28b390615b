//! Signal nodes of the device graph.
//!
//! A node is a named 4-valued signal point. It records which devices drive
//! it and which devices it fans out to, the event ids of its pending
//! contamination/propagation, and a merge pointer used to declare nodes
//! equivalent before finalization. Merge chains are resolved union-find
//! style on access; after finalize every live node has zero or one hop.

use crate::logic::LogicValue;
use crate::types::{DeviceId, EventId, NodeId, SimTime};

/// A 4-valued signal point in the network graph.
#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    /// Committed value at the current simulated time.
    pub value: LogicValue,
    /// Total load capacitance seen by the driver, computed at finalize.
    pub capacitance: f64,
    /// Devices whose output drives this node (exactly one after finalize).
    pub drivers: Vec<DeviceId>,
    /// Devices with this node as an input.
    pub fanouts: Vec<DeviceId>,
    /// Pending contamination event, if any.
    pub pending_contamination: Option<EventId>,
    /// Pending propagation event, if any.
    pub pending_propagation: Option<EventId>,
    /// Time of the last committed event on this node.
    pub last_event_time: SimTime,
    /// Set at finalize for nodes feeding register/latch/memory clock pins.
    pub is_clock: bool,
    /// Redirect target when this node was merged into another.
    pub merged_into: Option<NodeId>,
    /// Undriven nodes are tolerated (and float at Z) when flagged.
    pub allow_undriven: bool,
    /// Head of this node's history record chain.
    pub history_head: Option<u32>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            value: LogicValue::X,
            capacitance: 0.0,
            drivers: Vec::new(),
            fanouts: Vec::new(),
            pending_contamination: None,
            pending_propagation: None,
            last_event_time: 0.0,
            is_clock: false,
            merged_into: None,
            allow_undriven: false,
            history_head: None,
        }
    }

    /// True once the node has been merged away into a surviving node.
    pub fn is_merged(&self) -> bool {
        self.merged_into.is_some()
    }

    pub fn add_driver(&mut self, device: DeviceId) {
        if !self.drivers.contains(&device) {
            self.drivers.push(device);
        }
    }

    pub fn add_fanout(&mut self, device: DeviceId) {
        if !self.fanouts.contains(&device) {
            self.fanouts.push(device);
        }
    }

    /// Clears per-run state, keeping the static graph intact.
    pub fn reset(&mut self, undriven: bool) {
        self.value = if undriven {
            LogicValue::Z
        } else {
            LogicValue::X
        };
        self.pending_contamination = None;
        self.pending_propagation = None;
        self.last_event_time = 0.0;
        self.history_head = None;
    }
}

/// Follows merge pointers until the surviving node.
///
/// Chains are short (finalize flattens them to depth one) but construction
/// code may see longer chains, so this always walks to the root.
pub fn resolve(nodes: &[Node], mut id: NodeId) -> NodeId {
    while let Some(next) = nodes[id.0].merged_into {
        id = next;
    }
    id
}
