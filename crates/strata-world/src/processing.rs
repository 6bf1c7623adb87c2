//! Chunks that still need per-tick attention, nearest first.
//!
//! Additions land in a small pending buffer behind a light lock, so any
//! thread can add without contending with the main timeline walking the
//! sorted list. [`ProcessingList::flush`] merges the buffer once per tick.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use glam::Vec3;
use strata_jobs::{BasePriority, PriorityQueue};

use crate::chunk::Chunk;
use crate::sync::lock;

pub struct ProcessingList {
    pending: Mutex<Vec<Arc<Chunk>>>,
    sorted: Mutex<PriorityQueue<Arc<Chunk>>>,
    reprioritize_batch: usize,
}

impl ProcessingList {
    pub fn new(reprioritize_batch: usize) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            sorted: Mutex::new(PriorityQueue::new()),
            reprioritize_batch: reprioritize_batch.max(1),
        }
    }

    /// Queues `chunk` for the next flush. Chunks already listed and chunks
    /// being unloaded are ignored.
    pub fn add(&self, chunk: &Arc<Chunk>) {
        if chunk.is_unloading() || chunk.listed.swap(true, Ordering::AcqRel) {
            return;
        }
        lock(&self.pending).push(Arc::clone(chunk));
    }

    /// Takes `chunk` out of both the buffer and the sorted list. Safe to call
    /// for chunks that are not listed.
    pub fn remove(&self, chunk: &Chunk) {
        chunk.listed.store(false, Ordering::Release);
        lock(&self.pending).retain(|c| !std::ptr::eq(Arc::as_ptr(c), chunk));
        lock(&self.sorted).remove_where(|c| std::ptr::eq(Arc::as_ptr(c), chunk));
    }

    /// Merges pending additions into the sorted list, scored against
    /// `viewpoint`.
    pub fn flush(&self, viewpoint: Vec3) -> usize {
        let mut pending = lock(&self.pending);
        let mut sorted = lock(&self.sorted);
        sorted.set_viewpoint(viewpoint);
        let mut merged = 0;
        for chunk in pending.drain(..) {
            // Removed again before the merge.
            if !chunk.listed.load(Ordering::Acquire) {
                continue;
            }
            let position = chunk.coord().origin_position();
            sorted.push(chunk, BasePriority::Low, position);
            merged += 1;
        }
        merged
    }

    /// Re-scores the next batch of listed chunks against `viewpoint`.
    pub fn reprioritize(&self, viewpoint: Vec3) -> usize {
        let mut sorted = lock(&self.sorted);
        sorted.set_viewpoint(viewpoint);
        sorted.reprioritize(self.reprioritize_batch)
    }

    /// Chunks in the sorted list. Pending additions are not counted.
    pub fn len(&self) -> usize {
        lock(&self.sorted).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    /// The chunk at `index` in priority order.
    pub fn get(&self, index: usize) -> Option<Arc<Chunk>> {
        lock(&self.sorted).get(index).cloned()
    }

    /// The sorted list as it is now, most urgent first. The lock is released
    /// before returning, so callers may add and remove while walking it.
    pub fn snapshot(&self) -> Vec<Arc<Chunk>> {
        lock(&self.sorted).iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use strata_voxel::ChunkCoord;

    use super::*;

    fn chunk_at(x: i32) -> Arc<Chunk> {
        let chunk = Arc::new(Chunk::new());
        chunk.assign(ChunkCoord::new(x, 0, 0));
        chunk
    }

    fn xs(list: &ProcessingList) -> Vec<i32> {
        list.snapshot().iter().map(|c| c.coord().x).collect()
    }

    #[test]
    fn test_adds_visible_after_flush() {
        let list = ProcessingList::new(400);
        list.add(&chunk_at(1));
        assert_eq!(list.len(), 0);
        assert_eq!(list.pending_len(), 1);
        assert_eq!(list.flush(Vec3::ZERO), 1);
        assert_eq!(list.len(), 1);
        assert_eq!(list.pending_len(), 0);
    }

    #[test]
    fn test_duplicate_adds_ignored() {
        let list = ProcessingList::new(400);
        let chunk = chunk_at(2);
        list.add(&chunk);
        list.add(&chunk);
        list.flush(Vec3::ZERO);
        list.add(&chunk);
        list.flush(Vec3::ZERO);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_unloading_chunks_not_added() {
        let list = ProcessingList::new(400);
        let chunk = chunk_at(0);
        chunk.mark_for_unload();
        list.add(&chunk);
        list.flush(Vec3::ZERO);
        assert!(list.is_empty());
    }

    #[test]
    fn test_remove_is_idempotent_and_covers_pending() {
        let list = ProcessingList::new(400);
        let listed = chunk_at(1);
        let pending = chunk_at(2);
        list.add(&listed);
        list.flush(Vec3::ZERO);
        list.add(&pending);

        list.remove(&listed);
        list.remove(&pending);
        list.remove(&pending);
        list.flush(Vec3::ZERO);
        assert!(list.is_empty());

        list.add(&pending);
        list.flush(Vec3::ZERO);
        assert_eq!(xs(&list), vec![2]);
    }

    #[test]
    fn test_nearest_first_and_reprioritize() {
        let list = ProcessingList::new(400);
        for x in [3, 0, 6] {
            list.add(&chunk_at(x));
        }
        list.flush(Vec3::ZERO);
        assert_eq!(xs(&list), vec![0, 3, 6]);
        assert_eq!(list.get(1).map(|c| c.coord().x), Some(3));

        list.reprioritize(Vec3::new(6.0 * 16.0, 0.0, 0.0));
        assert_eq!(xs(&list), vec![6, 3, 0]);
    }
}
