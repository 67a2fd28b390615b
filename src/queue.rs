//! Leftist-tree event queue.
//!
//! A merge-based priority queue ordered by (time, kind), with contamination
//! preceding propagation at equal times. Records live in an arena indexed by
//! [`EventId`]; removed slots are recycled through a free-list, so steady-
//! state simulation does not allocate per event.
//!
//! The leftist invariant keeps every node's right spine no longer than its
//! left (`dist` is the null-path length), which bounds merge, insert, pop
//! and interior removal at O(log n).

use crate::event::Event;
use crate::types::{EventId, SimTime};

const NIL: usize = usize::MAX;

#[derive(Clone, Debug)]
struct Slot {
    event: Event,
    parent: usize,
    left: usize,
    right: usize,
    dist: u32,
    queued: bool,
}

/// The event priority queue used by every simulation kernel.
#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    slots: Vec<Slot>,
    free: Vec<usize>,
    root: usize,
    len: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue {
            slots: Vec::new(),
            free: Vec::new(),
            root: NIL,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drops every queued event and recycles all slots.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.root = NIL;
        self.len = 0;
    }

    /// Time of the earliest queued event.
    pub fn peek_time(&self) -> Option<SimTime> {
        if self.root == NIL {
            None
        } else {
            Some(self.slots[self.root].event.time)
        }
    }

    /// The event stored under `id`. Only valid while the id is queued.
    pub fn event(&self, id: EventId) -> &Event {
        debug_assert!(self.slots[id.0].queued);
        &self.slots[id.0].event
    }

    /// Inserts an event, returning the id of its arena slot.
    pub fn insert(&mut self, event: Event) -> EventId {
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Slot {
                    event,
                    parent: NIL,
                    left: NIL,
                    right: NIL,
                    dist: 1,
                    queued: true,
                };
                idx
            }
            None => {
                self.slots.push(Slot {
                    event,
                    parent: NIL,
                    left: NIL,
                    right: NIL,
                    dist: 1,
                    queued: true,
                });
                self.slots.len() - 1
            }
        };
        self.root = self.merge(self.root, idx);
        self.slots[self.root].parent = NIL;
        self.len += 1;
        EventId(idx)
    }

    /// Pops the earliest event.
    pub fn pop_min(&mut self) -> Option<Event> {
        if self.root == NIL {
            return None;
        }
        let idx = self.root;
        let (l, r) = (self.slots[idx].left, self.slots[idx].right);
        self.root = self.merge(l, r);
        if self.root != NIL {
            self.slots[self.root].parent = NIL;
        }
        self.release(idx);
        Some(self.slots[idx].event)
    }

    /// Removes an interior event by id.
    ///
    /// Detaches the record, re-merges its two children into its place, then
    /// walks the ancestor chain restoring the distance invariant so the
    /// right spine stays shortest.
    pub fn remove(&mut self, id: EventId) {
        let idx = id.0;
        debug_assert!(self.slots[idx].queued, "removing an unqueued event");
        let parent = self.slots[idx].parent;
        let (l, r) = (self.slots[idx].left, self.slots[idx].right);
        let sub = self.merge(l, r);

        if parent == NIL {
            self.root = sub;
            if sub != NIL {
                self.slots[sub].parent = NIL;
            }
        } else {
            if self.slots[parent].left == idx {
                self.slots[parent].left = sub;
            } else {
                self.slots[parent].right = sub;
            }
            if sub != NIL {
                self.slots[sub].parent = parent;
            }
            // Re-balance bottom-up; stop once a node's dist settles.
            let mut n = parent;
            while n != NIL {
                let before = self.slots[n].dist;
                self.fix(n);
                if self.slots[n].dist == before {
                    break;
                }
                n = self.slots[n].parent;
            }
        }
        self.release(idx);
    }

    /// Removes `id` and inserts `event` in its place.
    ///
    /// Re-scheduling an already-queued event is always remove-then-insert;
    /// the freed slot is immediately recycled for the replacement.
    pub fn reschedule(&mut self, id: EventId, event: Event) -> EventId {
        self.remove(id);
        self.insert(event)
    }

    fn release(&mut self, idx: usize) {
        self.slots[idx].queued = false;
        self.free.push(idx);
        self.len -= 1;
    }

    fn dist_of(&self, idx: usize) -> u32 {
        if idx == NIL {
            0
        } else {
            self.slots[idx].dist
        }
    }

    /// Restores the leftist shape of a single node: the shorter null-path
    /// goes right, and `dist` is one more than the right child's.
    fn fix(&mut self, idx: usize) {
        let ld = self.dist_of(self.slots[idx].left);
        let rd = self.dist_of(self.slots[idx].right);
        if rd > ld {
            let slot = &mut self.slots[idx];
            std::mem::swap(&mut slot.left, &mut slot.right);
        }
        self.slots[idx].dist = ld.min(rd) + 1;
    }

    fn less(&self, a: usize, b: usize) -> bool {
        self.slots[a]
            .event
            .key_cmp(&self.slots[b].event)
            .is_lt()
    }

    /// Classic leftist merge. The returned root's parent pointer is left for
    /// the caller to set.
    fn merge(&mut self, a: usize, b: usize) -> usize {
        if a == NIL {
            return b;
        }
        if b == NIL {
            return a;
        }
        let (top, bot) = if self.less(a, b) { (a, b) } else { (b, a) };
        let right = self.slots[top].right;
        let merged = self.merge(right, bot);
        self.slots[top].right = merged;
        self.slots[merged].parent = top;
        self.fix(top);
        top
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        fn walk(q: &EventQueue, idx: usize, parent: usize) -> u32 {
            if idx == NIL {
                return 0;
            }
            let slot = &q.slots[idx];
            assert_eq!(slot.parent, parent, "parent link broken at {}", idx);
            for child in [slot.left, slot.right] {
                if child != NIL {
                    assert!(
                        q.slots[idx].event.key_cmp(&q.slots[child].event).is_le(),
                        "heap order broken"
                    );
                }
            }
            let ld = walk(q, slot.left, idx);
            let rd = walk(q, slot.right, idx);
            assert!(ld >= rd, "leftist invariant broken at {}", idx);
            assert_eq!(slot.dist, rd + 1, "dist stale at {}", idx);
            rd + 1
        }
        walk(self, self.root, NIL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, EventKind};
    use crate::logic::LogicValue;
    use crate::types::NodeId;

    fn prop(t: SimTime, n: usize) -> Event {
        Event::propagation(t, NodeId(n), LogicValue::One)
    }

    #[test]
    fn test_insert_pop_order() {
        let mut q = EventQueue::new();
        for &t in &[5.0, 1.0, 9.0, 3.0, 7.0, 2.0] {
            q.insert(prop(t, 0));
            q.check_invariants();
        }
        let mut times = Vec::new();
        while let Some(e) = q.pop_min() {
            times.push(e.time);
        }
        assert_eq!(times, vec![1.0, 2.0, 3.0, 5.0, 7.0, 9.0]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_contamination_before_propagation() {
        let mut q = EventQueue::new();
        q.insert(Event::propagation(4.0, NodeId(1), LogicValue::Zero));
        q.insert(Event::contamination(4.0, NodeId(2)));
        q.insert(Event::propagation(3.0, NodeId(3), LogicValue::One));

        let order: Vec<EventKind> = std::iter::from_fn(|| q.pop_min())
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            order,
            vec![
                EventKind::Propagation,
                EventKind::Contamination,
                EventKind::Propagation
            ]
        );
    }

    #[test]
    fn test_remove_interior() {
        let mut q = EventQueue::new();
        let mut ids = Vec::new();
        for i in 0..20 {
            ids.push(q.insert(prop(i as f64, i)));
        }
        // Remove every third event.
        for (i, id) in ids.iter().enumerate() {
            if i % 3 == 0 {
                q.remove(*id);
                q.check_invariants();
            }
        }
        let times: Vec<f64> = std::iter::from_fn(|| q.pop_min()).map(|e| e.time).collect();
        let expect: Vec<f64> = (0..20).filter(|i| i % 3 != 0).map(|i| i as f64).collect();
        assert_eq!(times, expect);
    }

    #[test]
    fn test_remove_root() {
        let mut q = EventQueue::new();
        let a = q.insert(prop(1.0, 0));
        q.insert(prop(2.0, 1));
        q.remove(a);
        q.check_invariants();
        assert_eq!(q.pop_min().map(|e| e.time), Some(2.0));
    }

    #[test]
    fn test_slot_recycling() {
        let mut q = EventQueue::new();
        let a = q.insert(prop(1.0, 0));
        q.remove(a);
        let b = q.insert(prop(2.0, 1));
        // The freed slot is reused.
        assert_eq!(a.0, b.0);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_reschedule() {
        let mut q = EventQueue::new();
        let id = q.insert(prop(10.0, 0));
        q.insert(prop(5.0, 1));
        let id2 = q.reschedule(id, prop(1.0, 0));
        q.check_invariants();
        assert_eq!(q.event(id2).time, 1.0);
        assert_eq!(q.pop_min().map(|e| e.node), Some(NodeId(0)));
    }

    #[test]
    fn test_interleaved_stress() {
        let mut q = EventQueue::new();
        let mut seed = 0x2545F4914F6CDD1Du64;
        let mut rand = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };
        let mut live = Vec::new();
        for _ in 0..500 {
            let t = (rand() % 1000) as f64;
            live.push((q.insert(prop(t, 0)), t));
            if rand() % 3 == 0 && !live.is_empty() {
                let pick = (rand() as usize) % live.len();
                let (id, _) = live.swap_remove(pick);
                q.remove(id);
            }
        }
        q.check_invariants();
        let mut last = f64::NEG_INFINITY;
        let mut count = 0;
        while let Some(e) = q.pop_min() {
            assert!(e.time >= last);
            last = e.time;
            count += 1;
        }
        assert_eq!(count, live.len());
    }
}
