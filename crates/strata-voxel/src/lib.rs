//! Block and chunk data model: block kinds, the immutable definition table,
//! per-block neighbor transparency caches, coordinate spaces, the dense chunk
//! grid, and the run-length chunk encoding used for persistence.

pub mod block;
pub mod block_type;
pub mod codec;
pub mod coords;
pub mod definition;
pub mod face;
pub mod grid;

pub use block::{Block, BlockLight, NeighborOffset};
pub use block_type::BlockType;
pub use codec::{BlockRun, CHUNK_FORMAT_VERSION, ChunkCodecError, decode_chunk, encode_chunk};
pub use coords::{BlockCoord, CHUNK_SIZE, CHUNK_VOLUME, ChunkCoord, LocalCoord};
pub use definition::{BlockDefinition, Hsv, LightEmission, MAX_LIGHT_RADIUS, TextureRule, TextureSlot};
pub use face::Face;
pub use grid::ChunkGrid;
