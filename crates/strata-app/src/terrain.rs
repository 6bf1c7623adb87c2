//! Demo terrain: fBm hills over simplex noise, caves, ore veins, a sea
//! level and scattered trees.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use noise::{NoiseFn, Simplex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use strata_voxel::{BlockCoord, BlockType, CHUNK_SIZE, CHUNK_VOLUME, ChunkCoord, LocalCoord};
use strata_world::{StructureTemplate, TerrainGenerator, WORLD_HEIGHT, WorldError};

/// Highest block that fills with water.
pub const WATER_LEVEL: i32 = 40;

const BASE_HEIGHT: f64 = 46.0;
const OCTAVES: u32 = 4;
const BASE_FREQUENCY: f64 = 1.0 / 96.0;
const AMPLITUDE: f64 = 22.0;
const LACUNARITY: f64 = 2.0;
const PERSISTENCE: f64 = 0.5;

/// Blocks of dirt (or sand on beaches) above the stone.
const SOIL_DEPTH: i32 = 3;
const CAVE_THRESHOLD: f64 = 0.55;

const MIN_TREE_ALTITUDE: i32 = WATER_LEVEL + 3;
const MAX_TREE_ALTITUDE: i32 = MIN_TREE_ALTITUDE + 30;
const MAX_TREES_PER_CHUNK: u32 = 5;
const CHANCE_OF_NO_TREES: f64 = 0.5;

pub struct DemoTerrain {
    seed: i32,
    height: Simplex,
    caves: Simplex,
    ores: Simplex,
    tree: Arc<StructureTemplate>,
}

impl DemoTerrain {
    pub fn new(seed: i32) -> Result<Self, WorldError> {
        let seed_bits = seed as u32;
        Ok(Self {
            seed,
            height: Simplex::new(seed_bits),
            caves: Simplex::new(seed_bits.wrapping_add(1)),
            ores: Simplex::new(seed_bits.wrapping_add(2)),
            tree: Arc::new(regular_tree()?),
        })
    }

    pub fn seed(&self) -> i32 {
        self.seed
    }

    /// Y of the topmost solid block in the column at `(x, z)`.
    pub fn surface_height(&self, x: i32, z: i32) -> i32 {
        let mut total = 0.0;
        let mut frequency = BASE_FREQUENCY;
        let mut amplitude = AMPLITUDE;
        for _ in 0..OCTAVES {
            total += self.height.get([x as f64 * frequency, z as f64 * frequency]) * amplitude;
            frequency *= LACUNARITY;
            amplitude *= PERSISTENCE;
        }
        // Leave headroom for the tallest tree.
        ((BASE_HEIGHT + total).round() as i32).clamp(1, WORLD_HEIGHT - 8)
    }

    fn is_cave(&self, position: BlockCoord) -> bool {
        let p = [
            position.x as f64 * 0.05,
            position.y as f64 * 0.08,
            position.z as f64 * 0.05,
        ];
        self.caves.get(p) > CAVE_THRESHOLD
    }

    fn block_type(&self, position: BlockCoord, surface: i32) -> BlockType {
        let y = position.y;
        if y == 0 {
            return BlockType::Bedrock;
        }
        if y > surface {
            return if y <= WATER_LEVEL { BlockType::Water } else { BlockType::Air };
        }
        if y > surface - SOIL_DEPTH {
            return if surface <= WATER_LEVEL + 1 { BlockType::Sand } else { BlockType::Dirt };
        }
        if y < surface - SOIL_DEPTH - 1 && self.is_cave(position) {
            return BlockType::Air;
        }
        let vein = self.ores.get([
            position.x as f64 / 8.0,
            position.y as f64 / 8.0,
            position.z as f64 / 8.0,
        ]);
        if vein > 0.75 {
            BlockType::Coal
        } else if vein < -0.8 {
            BlockType::Iron
        } else {
            BlockType::Stone
        }
    }
}

impl TerrainGenerator for DemoTerrain {
    fn generate_blocks(&self, chunk: ChunkCoord) -> Vec<BlockType> {
        let columns = (CHUNK_SIZE * CHUNK_SIZE) as usize;
        let mut surfaces = Vec::with_capacity(columns);
        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                surfaces.push(self.surface_height(chunk.x * CHUNK_SIZE + x, chunk.z * CHUNK_SIZE + z));
            }
        }

        let mut types = vec![BlockType::Air; CHUNK_VOLUME];
        for (index, ty) in types.iter_mut().enumerate() {
            let local = LocalCoord::from_index(index);
            let surface = surfaces[(local.x() * CHUNK_SIZE + local.z()) as usize];
            *ty = self.block_type(local.to_block(chunk), surface);
        }
        types
    }

    fn generate_structures(&self, chunk: ChunkCoord) -> Vec<(LocalCoord, Arc<StructureTemplate>)> {
        let mut rng = chunk_rng(self.seed, chunk);
        if rng.random::<f64>() < CHANCE_OF_NO_TREES {
            return Vec::new();
        }
        let count = rng.random_range(1..=MAX_TREES_PER_CHUNK);
        let mut trees = Vec::new();
        for _ in 0..count {
            let x = chunk.x * CHUNK_SIZE + rng.random_range(0..CHUNK_SIZE);
            let z = chunk.z * CHUNK_SIZE + rng.random_range(0..CHUNK_SIZE);
            let surface = self.surface_height(x, z);
            if !(MIN_TREE_ALTITUDE..=MAX_TREE_ALTITUDE).contains(&surface) {
                continue;
            }
            // Only the chunk holding the ground block plants the tree.
            if let Some(local) = BlockCoord::new(x, surface, z).local_in(chunk) {
                trees.push((local, Arc::clone(&self.tree)));
            }
        }
        trees
    }
}

/// Deterministic RNG for one chunk of one world.
fn chunk_rng(seed: i32, chunk: ChunkCoord) -> ChaCha8Rng {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    chunk.hash(&mut hasher);
    ChaCha8Rng::seed_from_u64(hasher.finish())
}

/// A 5x7x5 tree: a five block trunk under a rounded canopy.
pub fn regular_tree() -> Result<StructureTemplate, WorldError> {
    const SIZE: [u32; 3] = [5, 7, 5];
    let [sx, sy, sz] = SIZE.map(|s| s as i32);
    let mut blocks = vec![BlockType::Air; (sx * sy * sz) as usize];
    let mut put = |x: i32, y: i32, z: i32, ty: BlockType| {
        blocks[((x * sy + y) * sz + z) as usize] = ty;
    };

    for y in 2..=4 {
        for x in 1..=3 {
            for z in 1..=3 {
                put(x, y, z, BlockType::Leaves);
            }
        }
    }
    for (x, z) in [(0, 2), (4, 2), (2, 0), (2, 4)] {
        put(x, 3, z, BlockType::Leaves);
    }
    for (x, z) in [(2, 2), (1, 2), (3, 2), (2, 1), (2, 3)] {
        put(x, 5, z, BlockType::Leaves);
    }
    put(2, 6, 2, BlockType::Leaves);
    for y in 0..5 {
        put(2, y, 2, BlockType::Wood);
    }

    StructureTemplate::new(SIZE, [2, 0, 2], false, blocks)
}
