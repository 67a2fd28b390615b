//! Append-only waveform history.
//!
//! Every committed node change is appended as a fixed-size record into
//! block-paged storage; records never move, so a `u32` index is a stable
//! handle. Each node keeps the index of its most recent record and records
//! chain backwards through `prev`, giving per-node waveform readback without
//! per-node allocation.

use crate::logic::LogicValue;
use crate::types::SimTime;

/// Sentinel for "no previous record".
pub const NO_RECORD: u32 = u32::MAX;

/// Records per page. Pages are never reallocated, only appended.
const PAGE_SIZE: usize = 4096;

/// One committed change on one node.
#[derive(Clone, Copy, Debug)]
pub struct HistoryRecord {
    /// Index of the previous record for the same node, or [`NO_RECORD`].
    pub prev: u32,
    pub time: SimTime,
    /// Float-encoded logic value (NaN = X, +inf = Z).
    value: f32,
}

impl HistoryRecord {
    pub fn value(&self) -> LogicValue {
        LogicValue::from_float(self.value)
    }
}

/// Block-paged storage shared by every node in a network.
#[derive(Debug, Default)]
pub struct History {
    pages: Vec<Vec<HistoryRecord>>,
    len: u32,
}

impl History {
    pub fn new() -> Self {
        History::default()
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.pages.clear();
        self.len = 0;
    }

    /// Appends a record and returns its stable index.
    pub fn append(&mut self, prev: u32, time: SimTime, value: LogicValue) -> u32 {
        if self.len as usize == self.pages.len() * PAGE_SIZE {
            self.pages.push(Vec::with_capacity(PAGE_SIZE));
        }
        let idx = self.len;
        // last page always has room after the check above
        if let Some(page) = self.pages.last_mut() {
            page.push(HistoryRecord {
                prev,
                time,
                value: value.to_float(),
            });
        }
        self.len += 1;
        idx
    }

    pub fn record(&self, idx: u32) -> &HistoryRecord {
        let i = idx as usize;
        &self.pages[i / PAGE_SIZE][i % PAGE_SIZE]
    }

    /// The full change list for the node whose newest record is `head`,
    /// oldest first.
    pub fn changes(&self, head: Option<u32>) -> Vec<(SimTime, LogicValue)> {
        let mut out = Vec::new();
        let mut cursor = head.unwrap_or(NO_RECORD);
        while cursor != NO_RECORD {
            let rec = self.record(cursor);
            out.push((rec.time, rec.value()));
            cursor = rec.prev;
        }
        out.reverse();
        out
    }

    /// The node's value as of `time` (latest record with `time <= t`), given
    /// its newest record index.
    pub fn value_at(&self, head: Option<u32>, time: SimTime) -> Option<LogicValue> {
        let mut cursor = head?;
        loop {
            let rec = self.record(cursor);
            if rec.time <= time {
                return Some(rec.value());
            }
            if rec.prev == NO_RECORD {
                return None;
            }
            cursor = rec.prev;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LogicValue::*;

    #[test]
    fn test_chain_readback() {
        let mut h = History::new();
        let a = h.append(NO_RECORD, 0.0, Zero);
        let b = h.append(a, 5.0, X);
        let c = h.append(b, 7.0, One);
        // Interleave a record from another node.
        let _ = h.append(NO_RECORD, 6.0, Z);
        assert_eq!(
            h.changes(Some(c)),
            vec![(0.0, Zero), (5.0, X), (7.0, One)]
        );
    }

    #[test]
    fn test_value_at() {
        let mut h = History::new();
        let a = h.append(NO_RECORD, 0.0, Zero);
        let b = h.append(a, 10.0, One);
        assert_eq!(h.value_at(Some(b), 0.0), Some(Zero));
        assert_eq!(h.value_at(Some(b), 9.9), Some(Zero));
        assert_eq!(h.value_at(Some(b), 10.0), Some(One));
        assert_eq!(h.value_at(Some(b), -1.0), None);
        assert_eq!(h.value_at(None, 5.0), None);
    }

    #[test]
    fn test_page_boundary() {
        let mut h = History::new();
        let mut head = NO_RECORD;
        for i in 0..(PAGE_SIZE + 10) {
            head = h.append(head, i as f64, if i % 2 == 0 { Zero } else { One });
        }
        let changes = h.changes(Some(head));
        assert_eq!(changes.len(), PAGE_SIZE + 10);
        assert_eq!(changes[0], (0.0, Zero));
        assert_eq!(changes[PAGE_SIZE].0, PAGE_SIZE as f64);
    }

    #[test]
    fn test_unknown_and_z_roundtrip() {
        let mut h = History::new();
        let a = h.append(NO_RECORD, 1.0, X);
        let b = h.append(a, 2.0, Z);
        assert_eq!(h.record(a).value(), X);
        assert_eq!(h.record(b).value(), Z);
    }
}
