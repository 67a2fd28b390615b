//! Event records for the discrete-event kernel.
//!
//! Two event kinds drive the simulation. A contamination event marks the
//! instant an output *might* begin changing and pushes the unknown-value
//! wavefront through the graph; a propagation event commits the settled
//! value. At equal timestamps contamination strictly precedes propagation.

use std::cmp::Ordering;

use crate::logic::LogicValue;
use crate::types::{NodeId, SimTime};

/// Kind of a scheduled event. The derived order (`Contamination` first) is
/// the tie-break used by the event queue at equal times.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventKind {
    /// Output may start changing; target node goes to X on arrival.
    Contamination,
    /// Output has settled; target node commits the carried value.
    Propagation,
}

/// A scheduled value change on a node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Event {
    pub time: SimTime,
    pub kind: EventKind,
    pub node: NodeId,
    /// The committed value for propagation events; X for contamination.
    pub value: LogicValue,
}

impl Event {
    pub fn contamination(time: SimTime, node: NodeId) -> Self {
        Event {
            time,
            kind: EventKind::Contamination,
            node,
            value: LogicValue::X,
        }
    }

    pub fn propagation(time: SimTime, node: NodeId, value: LogicValue) -> Self {
        Event {
            time,
            kind: EventKind::Propagation,
            node,
            value,
        }
    }

    /// Queue ordering: by time, then contamination before propagation.
    ///
    /// Times are never NaN, so `total_cmp` gives the plain numeric order.
    pub fn key_cmp(&self, other: &Event) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.kind.cmp(&other.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tiebreak() {
        let c = Event::contamination(5.0, NodeId(0));
        let p = Event::propagation(5.0, NodeId(0), LogicValue::One);
        assert_eq!(c.key_cmp(&p), Ordering::Less);
        assert_eq!(p.key_cmp(&c), Ordering::Greater);
    }

    #[test]
    fn test_time_order() {
        let a = Event::propagation(1.0, NodeId(0), LogicValue::One);
        let b = Event::contamination(2.0, NodeId(1));
        assert_eq!(a.key_cmp(&b), Ordering::Less);
    }
}
