//! Byte-stream persistence keyed by string ids.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use strata_voxel::ChunkCoord;

use crate::error::StoreError;

/// Id of the world metadata entry.
pub const WORLD_META_ID: &str = "world";

/// Current world metadata version.
pub const WORLD_META_VERSION: u32 = 0;

/// Synchronous put/get of opaque byte blobs.
///
/// Implementations are shared between the background store thread and the
/// main timeline.
pub trait ChunkStore: Send + Sync {
    fn put(&self, id: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// `Ok(None)` when nothing is stored under `id`.
    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Store id of a chunk: `"{x}_{y}_{z}"`.
pub fn chunk_id(coord: ChunkCoord) -> String {
    format!("{}_{}_{}", coord.x, coord.y, coord.z)
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Concurrent map of blobs. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }
}

impl ChunkStore for MemoryStore {
    fn put(&self, id: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.entries.insert(id.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(id).map(|entry| entry.value().clone()))
    }
}

// ---------------------------------------------------------------------------
// Directory store
// ---------------------------------------------------------------------------

/// One `{id}.bin` file per entry inside a save directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.bin"))
    }
}

impl ChunkStore for FileStore {
    fn put(&self, id: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_of(id);
        // Write then rename so a crash never leaves half a chunk behind.
        let staging = path.with_extension("bin.tmp");
        fs::write(&staging, bytes)
            .and_then(|()| fs::rename(&staging, &path))
            .map_err(|source| StoreError::Io { path, source })
    }

    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_of(id);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

// ---------------------------------------------------------------------------
// World metadata
// ---------------------------------------------------------------------------

/// Per-world values that outlive a session.
///
/// Encoded as `version: u32 LE` followed by `seed: i32 LE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldMeta {
    pub seed: i32,
}

impl WorldMeta {
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8);
        bytes.extend_from_slice(&WORLD_META_VERSION.to_le_bytes());
        bytes.extend_from_slice(&self.seed.to_le_bytes());
        bytes
    }

    /// `None` for short data or an unknown version.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let version = u32::from_le_bytes(bytes.get(0..4)?.try_into().ok()?);
        if version != WORLD_META_VERSION {
            return None;
        }
        let seed = i32::from_le_bytes(bytes.get(4..8)?.try_into().ok()?);
        Some(Self { seed })
    }

    /// Reads the stored metadata, falling back to `default_seed` when none
    /// exists or it cannot be read.
    pub fn load_or(store: &dyn ChunkStore, default_seed: i32) -> Self {
        match store.get(WORLD_META_ID) {
            Ok(Some(bytes)) => Self::decode(&bytes).unwrap_or_else(|| {
                tracing::warn!("world metadata unreadable, using configured seed");
                Self { seed: default_seed }
            }),
            Ok(None) => Self { seed: default_seed },
            Err(err) => {
                tracing::error!(error = %err, "failed to read world metadata");
                Self { seed: default_seed }
            }
        }
    }

    pub fn save(&self, store: &dyn ChunkStore) -> Result<(), StoreError> {
        store.put(WORLD_META_ID, &self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_format() {
        assert_eq!(chunk_id(ChunkCoord::new(3, 0, -12)), "3_0_-12");
    }

    #[test]
    fn test_memory_store_put_get() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").ok().flatten(), None);
        store.put("a", &[1, 2, 3]).expect("put");
        assert_eq!(store.get("a").ok().flatten(), Some(vec![1, 2, 3]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path().join("saves")).expect("open");
        assert!(matches!(store.get("0_1_2"), Ok(None)));
        store.put("0_1_2", &[9, 8, 7]).expect("put");
        assert!(dir.path().join("saves").join("0_1_2.bin").exists());
        assert_eq!(store.get("0_1_2").ok().flatten(), Some(vec![9, 8, 7]));

        store.put("0_1_2", &[1]).expect("overwrite");
        assert_eq!(store.get("0_1_2").ok().flatten(), Some(vec![1]));
    }

    #[test]
    fn test_world_meta() {
        let store = MemoryStore::new();
        assert_eq!(WorldMeta::load_or(&store, 42).seed, 42);

        WorldMeta { seed: -7 }.save(&store).expect("save");
        assert_eq!(WorldMeta::load_or(&store, 42).seed, -7);

        store.put(WORLD_META_ID, &[5, 0, 0, 0, 1, 0, 0, 0]).expect("put");
        assert_eq!(WorldMeta::load_or(&store, 42).seed, 42);
    }
}
