//! Chunk lifecycle states.

use std::sync::atomic::{AtomicU8, Ordering};

/// Where a chunk is in its lifecycle, in the order a fresh chunk visits them.
///
/// `Done` returns to `WaitingForMeshUpdate` whenever the chunk needs a new
/// mesh. The two "in flight" states, `BlocksGenerating` and
/// `MeshCalculating`, are only ever entered from the main timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChunkState {
    LoadingFromDisk = 0,
    WaitingToGenerateBlocks = 1,
    BlocksGenerating = 2,
    BlockGenerationComplete = 3,
    WaitingForMeshUpdate = 4,
    MeshCalculating = 5,
    MeshCalculationComplete = 6,
    Done = 7,
}

impl ChunkState {
    pub const ALL: [ChunkState; 8] = [
        ChunkState::LoadingFromDisk,
        ChunkState::WaitingToGenerateBlocks,
        ChunkState::BlocksGenerating,
        ChunkState::BlockGenerationComplete,
        ChunkState::WaitingForMeshUpdate,
        ChunkState::MeshCalculating,
        ChunkState::MeshCalculationComplete,
        ChunkState::Done,
    ];

    fn from_u8(value: u8) -> Self {
        Self::ALL
            .get(value as usize)
            .copied()
            .unwrap_or(ChunkState::LoadingFromDisk)
    }

    /// The grid holds real blocks, loaded or generated.
    pub fn has_block_data(self) -> bool {
        !matches!(
            self,
            ChunkState::LoadingFromDisk
                | ChunkState::WaitingToGenerateBlocks
                | ChunkState::BlocksGenerating
        )
    }

    /// A worker job for the chunk may be queued or running.
    pub fn is_in_flight(self) -> bool {
        matches!(self, ChunkState::BlocksGenerating | ChunkState::MeshCalculating)
    }
}

/// A [`ChunkState`] readable from any thread without the chunk lock.
#[derive(Debug)]
pub(crate) struct AtomicChunkState(AtomicU8);

impl AtomicChunkState {
    pub(crate) fn new(state: ChunkState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> ChunkState {
        ChunkState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: ChunkState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves from `from` to `to`. Fails, changing nothing, if the current
    /// state is not `from`.
    pub(crate) fn transition(&self, from: ChunkState, to: ChunkState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_every_state() {
        let cell = AtomicChunkState::new(ChunkState::LoadingFromDisk);
        for state in ChunkState::ALL {
            cell.store(state);
            assert_eq!(cell.load(), state);
        }
    }

    #[test]
    fn test_transition_requires_expected_state() {
        let cell = AtomicChunkState::new(ChunkState::WaitingToGenerateBlocks);
        assert!(!cell.transition(ChunkState::Done, ChunkState::MeshCalculating));
        assert_eq!(cell.load(), ChunkState::WaitingToGenerateBlocks);
        assert!(cell.transition(
            ChunkState::WaitingToGenerateBlocks,
            ChunkState::BlocksGenerating
        ));
        assert_eq!(cell.load(), ChunkState::BlocksGenerating);
    }

    #[test]
    fn test_block_data_states() {
        let with_data: Vec<_> = ChunkState::ALL
            .into_iter()
            .filter(|s| s.has_block_data())
            .collect();
        assert_eq!(with_data.first(), Some(&ChunkState::BlockGenerationComplete));
        assert_eq!(with_data.len(), 5);
        assert!(ChunkState::MeshCalculating.is_in_flight());
        assert!(!ChunkState::Done.is_in_flight());
    }
}
