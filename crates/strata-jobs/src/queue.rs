//! A priority queue scored by distance to a moving viewpoint.
//!
//! The scheduler keeps its jobs in one, and the world keeps the chunks that
//! still need per-tick attention in another.
//!
//! Entries are keyed by `(priority descending, insertion sequence)`, so equal
//! priorities pop in FIFO order and every key is unique without probing. A
//! second index by sequence number lets incremental reprioritization sweep
//! every entry exactly once per pass even as priorities shift under it.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use glam::Vec3;

use crate::priority::{BasePriority, effective_priority};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    priority: Reverse<i64>,
    seq: u64,
}

struct QueuedItem<T> {
    item: T,
    base: BasePriority,
    position: Vec3,
}

/// Items ordered by `(priority descending, insertion order)`.
pub struct PriorityQueue<T> {
    entries: BTreeMap<QueueKey, QueuedItem<T>>,
    /// Current priority of every queued sequence number.
    by_seq: BTreeMap<u64, Reverse<i64>>,
    next_seq: u64,
    viewpoint: Vec3,
    /// First sequence number the next reprioritize pass looks at.
    cursor: u64,
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            by_seq: BTreeMap::new(),
            next_seq: 0,
            viewpoint: Vec3::ZERO,
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn set_viewpoint(&mut self, viewpoint: Vec3) {
        self.viewpoint = viewpoint;
    }

    pub fn push(&mut self, item: T, base: BasePriority, position: Vec3) {
        let priority = Reverse(effective_priority(base, position, self.viewpoint));
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_seq.insert(seq, priority);
        self.entries.insert(QueueKey { priority, seq }, QueuedItem {
            item,
            base,
            position,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn viewpoint(&self) -> Vec3 {
        self.viewpoint
    }

    /// Removes and returns the most urgent item.
    pub fn pop(&mut self) -> Option<T> {
        let (key, entry) = self.entries.pop_first()?;
        self.by_seq.remove(&key.seq);
        Some(entry.item)
    }

    /// Items from most to least urgent.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.entries.values().map(|entry| &entry.item)
    }

    /// The item at `index` in priority order.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.iter().nth(index)
    }

    pub fn any(&self, mut predicate: impl FnMut(&T) -> bool) -> bool {
        self.entries.values().any(|entry| predicate(&entry.item))
    }

    /// Drops every item matching `predicate` and returns how many went.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        let mut removed = Vec::new();
        self.entries.retain(|key, entry| {
            let doomed = predicate(&entry.item);
            if doomed {
                removed.push(key.seq);
            }
            !doomed
        });
        for seq in &removed {
            self.by_seq.remove(seq);
        }
        removed.len()
    }

    /// Recomputes the priority of up to `batch` entries in insertion order,
    /// starting where the previous call stopped, and returns how many were
    /// visited. The cursor wraps to the oldest entry after a short batch.
    pub fn reprioritize(&mut self, batch: usize) -> usize {
        let visit: Vec<(u64, Reverse<i64>)> = self
            .by_seq
            .range(self.cursor..)
            .take(batch)
            .map(|(seq, priority)| (*seq, *priority))
            .collect();

        self.cursor = match visit.last() {
            Some((seq, _)) if visit.len() == batch => seq + 1,
            _ => 0,
        };

        for &(seq, priority) in &visit {
            let Some(entry) = self.entries.remove(&QueueKey { priority, seq }) else {
                continue;
            };
            let priority = Reverse(effective_priority(entry.base, entry.position, self.viewpoint));
            self.by_seq.insert(seq, priority);
            self.entries.insert(QueueKey { priority, seq }, entry);
        }
        visit.len()
    }

    #[cfg(test)]
    fn drain_in_order(&mut self) -> Vec<T> {
        std::iter::from_fn(|| self.pop()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f32) -> Vec3 {
        Vec3::new(x, 0.0, 0.0)
    }

    #[test]
    fn test_nearest_first() {
        let mut queue = PriorityQueue::new();
        queue.push(10, BasePriority::Low, at(10.0));
        queue.push(1, BasePriority::Low, at(1.0));
        queue.push(5, BasePriority::Low, at(5.0));
        assert_eq!(queue.drain_in_order(), vec![1, 5, 10]);
    }

    #[test]
    fn test_ties_pop_fifo() {
        let mut queue = PriorityQueue::new();
        for id in 0..5 {
            queue.push(id, BasePriority::Medium, at(3.0));
        }
        assert_eq!(queue.drain_in_order(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_base_priority_wins() {
        let mut queue = PriorityQueue::new();
        queue.push("low", BasePriority::Low, at(0.0));
        queue.push("high", BasePriority::High, at(400.0));
        assert_eq!(queue.pop(), Some("high"));
    }

    #[test]
    fn test_remove_where() {
        let mut queue = PriorityQueue::new();
        for id in 0..6 {
            queue.push(id, BasePriority::Low, at(id as f32));
        }
        assert_eq!(queue.remove_where(|id| id % 2 == 0), 3);
        assert_eq!(queue.remove_where(|id| *id == 0), 0);
        assert_eq!(queue.drain_in_order(), vec![1, 3, 5]);
    }

    #[test]
    fn test_reprioritize_follows_viewpoint() {
        let mut queue = PriorityQueue::new();
        for id in 0..10 {
            queue.push(id, BasePriority::Low, at(id as f32 * 10.0));
        }
        queue.set_viewpoint(at(90.0));
        // A full sweep in batches of three needs four calls.
        let mut visited = 0;
        for _ in 0..4 {
            visited += queue.reprioritize(3);
        }
        assert_eq!(visited, 10);
        assert_eq!(queue.drain_in_order(), (0..10).rev().collect::<Vec<_>>());
    }

    #[test]
    fn test_reprioritize_converges() {
        let mut queue = PriorityQueue::new();
        for id in 0..20 {
            queue.push(id, BasePriority::Low, at((id * 7 % 13) as f32));
        }
        queue.set_viewpoint(at(6.0));
        for _ in 0..10 {
            queue.reprioritize(4);
        }
        let settled: Vec<_> = queue.entries.keys().copied().collect();
        for _ in 0..10 {
            queue.reprioritize(4);
        }
        let again: Vec<_> = queue.entries.keys().copied().collect();
        assert_eq!(settled, again);
    }

    #[test]
    fn test_reprioritize_wraps_cursor() {
        let mut queue = PriorityQueue::new();
        for id in 0..4 {
            queue.push(id, BasePriority::Low, at(id as f32));
        }
        assert_eq!(queue.reprioritize(3), 3);
        assert_eq!(queue.reprioritize(3), 1);
        assert_eq!(queue.reprioritize(3), 3);
    }

    #[test]
    fn test_reprioritize_empty_queue() {
        let mut queue: PriorityQueue<u32> = PriorityQueue::new();
        assert_eq!(queue.reprioritize(400), 0);
        assert_eq!(queue.len(), 0);
    }
}
