//! Core type definitions for the simulation kernel.
//!
//! All graph entities live in arenas and are addressed by stable integer
//! indices, so identifiers are plain newtypes over `usize`.

use serde::{Deserialize, Serialize};

/// Simulation time in nanoseconds.
///
/// Events and timing analysis share the same timeline. Times are never NaN;
/// the event queue orders them with `f64::total_cmp`.
pub type SimTime = f64;

/// Index of a node in the network's node arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Index of a device in the network's device arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub usize);

/// Index of an event record inside the event queue arena.
///
/// Event slots are recycled through a free-list, so an `EventId` is only
/// meaningful while the event is queued. The network clears its pending
/// references whenever an event fires or is removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventId(pub usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "d{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(NodeId(3).to_string(), "n3");
        assert_eq!(DeviceId(7).to_string(), "d7");
    }

    #[test]
    fn test_id_ordering() {
        assert!(NodeId(1) < NodeId(2));
        assert_eq!(EventId(5), EventId(5));
    }
}
