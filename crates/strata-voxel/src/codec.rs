//! Run-length binary encoding of a chunk's block kinds.
//!
//! ## Binary Layout
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Format version (`u32`, little-endian, currently 0) |
//! | 4 | 2 | Chunk edge length (`u16`, little-endian) |
//! | 6 | 3×N | N runs of `count: u16 LE` + `block id: u8` |
//!
//! Runs cover all `CHUNK_SIZE³` blocks in storage order (x outermost, z
//! innermost). Bytes after the run that completes the grid are ignored.

use crate::block_type::BlockType;
use crate::coords::{CHUNK_SIZE, CHUNK_VOLUME};
use crate::grid::ChunkGrid;

/// Current format version.
pub const CHUNK_FORMAT_VERSION: u32 = 0;

const HEADER_LEN: usize = 6;
const RUN_LEN: usize = 3;

/// Errors that can occur while decoding a chunk.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChunkCodecError {
    /// The stream was written by an incompatible format version.
    #[error("unsupported chunk format version: {0}")]
    UnsupportedVersion(u32),
    /// The stream was written for a different chunk size.
    #[error("chunk size mismatch: expected {expected}, got {actual}")]
    SizeMismatch {
        /// Edge length this build uses.
        expected: u16,
        /// Edge length stored in the stream.
        actual: u16,
    },
    /// The data ended before the grid was complete.
    #[error("data truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum expected byte count.
        expected: usize,
        /// Actual byte count received.
        actual: usize,
    },
    /// A run references a block id this build does not know.
    #[error("unknown block id: {0}")]
    UnknownBlockType(u8),
    /// The runs describe more blocks than a chunk holds.
    #[error("run length overflow: decoded {actual} blocks, chunk holds {expected}")]
    LengthMismatch {
        /// Blocks per chunk.
        expected: usize,
        /// Blocks described by the runs read so far.
        actual: usize,
    },
}

/// `count` consecutive blocks of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRun {
    pub count: u16,
    pub block_type: BlockType,
}

/// Collapses block kinds into runs capped at `u16::MAX`.
pub fn encode_runs(types: impl IntoIterator<Item = BlockType>) -> Vec<BlockRun> {
    let mut runs: Vec<BlockRun> = Vec::new();
    for ty in types {
        match runs.last_mut() {
            Some(run) if run.block_type == ty && run.count < u16::MAX => run.count += 1,
            _ => runs.push(BlockRun {
                count: 1,
                block_type: ty,
            }),
        }
    }
    runs
}

/// Serializes the kinds of `grid`. Neighbor caches are not stored; they are
/// rebuilt after loading.
pub fn encode_chunk(grid: &ChunkGrid) -> Vec<u8> {
    let runs = encode_runs(grid.types());
    let mut buf = Vec::with_capacity(HEADER_LEN + runs.len() * RUN_LEN);
    buf.extend_from_slice(&CHUNK_FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&(CHUNK_SIZE as u16).to_le_bytes());
    for run in &runs {
        buf.extend_from_slice(&run.count.to_le_bytes());
        buf.push(run.block_type.id());
    }
    buf
}

/// Reads the runs of an encoded chunk after validating its header.
pub fn decode_runs(data: &[u8]) -> Result<Vec<BlockRun>, ChunkCodecError> {
    if data.len() < HEADER_LEN {
        return Err(ChunkCodecError::Truncated {
            expected: HEADER_LEN,
            actual: data.len(),
        });
    }
    let version = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    if version != CHUNK_FORMAT_VERSION {
        return Err(ChunkCodecError::UnsupportedVersion(version));
    }
    let size = u16::from_le_bytes([data[4], data[5]]);
    if size != CHUNK_SIZE as u16 {
        return Err(ChunkCodecError::SizeMismatch {
            expected: CHUNK_SIZE as u16,
            actual: size,
        });
    }

    let mut runs = Vec::new();
    let mut total = 0usize;
    let mut offset = HEADER_LEN;
    while total < CHUNK_VOLUME {
        let Some(bytes) = data.get(offset..offset + RUN_LEN) else {
            return Err(ChunkCodecError::Truncated {
                expected: offset + RUN_LEN,
                actual: data.len(),
            });
        };
        let count = u16::from_le_bytes([bytes[0], bytes[1]]);
        let block_type =
            BlockType::from_id(bytes[2]).ok_or(ChunkCodecError::UnknownBlockType(bytes[2]))?;
        total += count as usize;
        if total > CHUNK_VOLUME {
            return Err(ChunkCodecError::LengthMismatch {
                expected: CHUNK_VOLUME,
                actual: total,
            });
        }
        runs.push(BlockRun { count, block_type });
        offset += RUN_LEN;
    }

    if offset < data.len() {
        tracing::trace!(trailing = data.len() - offset, "ignoring bytes after chunk runs");
    }
    Ok(runs)
}

/// Decodes an encoded chunk into block kinds in storage order.
pub fn decode_chunk(data: &[u8]) -> Result<Vec<BlockType>, ChunkCodecError> {
    let runs = decode_runs(data)?;
    let mut types = Vec::with_capacity(CHUNK_VOLUME);
    for run in runs {
        types.extend(std::iter::repeat_n(run.block_type, run.count as usize));
    }
    Ok(types)
}
