//! Immutable per-kind block metadata.
//!
//! The table is a `static` built at compile time, indexed by [`BlockType`]
//! discriminant. Nothing mutates it after startup, so every thread may read it
//! without synchronization.

use crate::block_type::BlockType;
use crate::face::Face;

/// Upper bound on the radius a light-emitting block may illuminate, in blocks.
pub const MAX_LIGHT_RADIUS: u8 = 10;

/// Brightest value a light may emit. 255 is reserved for direct sunlight.
pub const MAX_EMITTED_VALUE: u8 = 254;

/// Width and height of the texture atlas, in pixels.
pub const ATLAS_SIZE: f32 = 256.0;

/// Width and height of a single atlas tile, in pixels.
pub const TILE_SIZE: f32 = 16.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Hue, saturation and value packed as bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Hsv {
    pub hue: u8,
    pub saturation: u8,
    pub value: u8,
}

impl Hsv {
    pub const fn new(hue: u8, saturation: u8, value: u8) -> Self {
        Self {
            hue,
            saturation,
            value,
        }
    }
}

/// Light emitted by a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightEmission {
    pub color: Hsv,
    /// Illuminated radius in blocks, never above [`MAX_LIGHT_RADIUS`].
    pub radius: u8,
}

/// Column and row of a tile in the texture atlas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureSlot {
    pub column: u8,
    pub row: u8,
}

impl TextureSlot {
    pub const fn new(column: u8, row: u8) -> Self {
        Self { column, row }
    }

    /// Returns the `(lower, upper)` UV corners of this tile.
    ///
    /// V is flipped so that row 0 sits at the top of the atlas.
    pub fn uv_rect(self) -> ([f32; 2], [f32; 2]) {
        let x = self.column as f32 * TILE_SIZE;
        let y = self.row as f32 * TILE_SIZE;
        let lower = [x / ATLAS_SIZE, 1.0 - y / ATLAS_SIZE];
        let upper = [(x + TILE_SIZE) / ATLAS_SIZE, 1.0 - (y + TILE_SIZE) / ATLAS_SIZE];
        (lower, upper)
    }
}

/// How a block picks its atlas tile for a given face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureRule {
    /// Same tile on every face.
    Uniform(TextureSlot),
    /// Dirt that grows grass when nothing covers it and the sky is open.
    Grass {
        dirt: TextureSlot,
        top: TextureSlot,
        side: TextureSlot,
    },
    /// Bark on the sides, rings on the top and bottom.
    Log {
        bark: TextureSlot,
        rings: TextureSlot,
    },
}

impl TextureRule {
    /// Picks the tile for `face`.
    ///
    /// `covered_above` is true when the face directly above the block is
    /// hidden by a neighbor; `sky_exposed` is true when no opaque block sits
    /// anywhere above it.
    pub fn slot(&self, face: Face, covered_above: bool, sky_exposed: bool) -> TextureSlot {
        match *self {
            TextureRule::Uniform(slot) => slot,
            TextureRule::Grass { dirt, top, side } => {
                let grassy = !covered_above && sky_exposed;
                match face {
                    Face::Top if grassy => top,
                    Face::Top | Face::Bottom => dirt,
                    _ if grassy => side,
                    _ => dirt,
                }
            }
            TextureRule::Log { bark, rings } => match face {
                Face::Top | Face::Bottom => rings,
                _ => bark,
            },
        }
    }
}

/// Everything the engine knows about one block kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockDefinition {
    pub block_type: BlockType,
    /// Entities collide with the block.
    pub solid_to_touch: bool,
    /// Faces between two blocks of this transparent kind are culled.
    pub removes_hidden_faces: bool,
    /// Light and sight pass through the block.
    pub transparent: bool,
    /// Tint applied to light passing through a transparent block.
    pub filter: Hsv,
    pub emission: Option<LightEmission>,
    pub texture: TextureRule,
}

impl BlockDefinition {
    const fn basic(block_type: BlockType, texture: TextureRule) -> Self {
        Self {
            block_type,
            solid_to_touch: true,
            removes_hidden_faces: true,
            transparent: false,
            filter: Hsv::new(0, 0, 0),
            emission: None,
            texture,
        }
    }

    const fn see_through(
        block_type: BlockType,
        slot: TextureSlot,
        solid_to_touch: bool,
        removes_hidden_faces: bool,
        filter: Hsv,
    ) -> Self {
        Self {
            block_type,
            solid_to_touch,
            removes_hidden_faces,
            transparent: true,
            filter,
            emission: None,
            texture: TextureRule::Uniform(slot),
        }
    }

    const fn emitter(block_type: BlockType, slot: TextureSlot, color: Hsv, radius: u8) -> Self {
        let value = if color.value > MAX_EMITTED_VALUE {
            MAX_EMITTED_VALUE
        } else {
            color.value
        };
        let radius = if radius > MAX_LIGHT_RADIUS {
            MAX_LIGHT_RADIUS
        } else {
            radius
        };
        Self {
            emission: Some(LightEmission {
                color: Hsv::new(color.hue, color.saturation, value),
                radius,
            }),
            ..Self::basic(block_type, TextureRule::Uniform(slot))
        }
    }

    /// Air is the only inactive kind: it is never rendered.
    pub fn is_active(&self) -> bool {
        self.block_type != BlockType::Air
    }

    pub fn is_light_emitter(&self) -> bool {
        self.emission
            .is_some_and(|light| light.color.value > 0 && light.radius > 0)
    }

    /// Tile used for `face`. See [`TextureRule::slot`].
    pub fn texture_slot(&self, face: Face, covered_above: bool, sky_exposed: bool) -> TextureSlot {
        self.texture.slot(face, covered_above, sky_exposed)
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

const fn uniform(column: u8, row: u8) -> TextureRule {
    TextureRule::Uniform(TextureSlot::new(column, row))
}

const fn lamp(block_type: BlockType, hue: u8, saturation: u8) -> BlockDefinition {
    BlockDefinition::emitter(block_type, TextureSlot::new(9, 6), Hsv::new(hue, saturation, 254), 10)
}

static DEFINITIONS: [BlockDefinition; BlockType::COUNT] = [
    BlockDefinition::see_through(BlockType::Air, TextureSlot::new(0, 0), false, true, Hsv::new(0, 0, 255)),
    BlockDefinition::basic(
        BlockType::Dirt,
        TextureRule::Grass {
            dirt: TextureSlot::new(2, 0),
            top: TextureSlot::new(0, 0),
            side: TextureSlot::new(3, 0),
        },
    ),
    BlockDefinition::basic(BlockType::Stone, uniform(1, 0)),
    BlockDefinition::basic(BlockType::WoodPlanks, uniform(4, 0)),
    BlockDefinition::see_through(BlockType::Water, TextureSlot::new(0, 15), false, true, Hsv::new(140, 20, 200)),
    BlockDefinition::basic(BlockType::Sand, uniform(2, 1)),
    BlockDefinition::basic(BlockType::Cobble, uniform(0, 1)),
    BlockDefinition::see_through(BlockType::Glass, TextureSlot::new(1, 3), true, true, Hsv::new(120, 20, 200)),
    BlockDefinition::see_through(BlockType::RedGlass, TextureSlot::new(15, 0), true, true, Hsv::new(0, 255, 180)),
    BlockDefinition::see_through(BlockType::BlueGlass, TextureSlot::new(15, 2), true, true, Hsv::new(160, 255, 180)),
    BlockDefinition::see_through(BlockType::GreenGlass, TextureSlot::new(15, 1), true, true, Hsv::new(80, 255, 180)),
    BlockDefinition::see_through(BlockType::YellowGlass, TextureSlot::new(15, 3), true, true, Hsv::new(40, 255, 180)),
    BlockDefinition::see_through(BlockType::PurpleGlass, TextureSlot::new(15, 4), true, true, Hsv::new(180, 255, 180)),
    BlockDefinition::basic(BlockType::Bedrock, uniform(1, 1)),
    BlockDefinition::basic(
        BlockType::Wood,
        TextureRule::Log {
            bark: TextureSlot::new(4, 1),
            rings: TextureSlot::new(5, 1),
        },
    ),
    BlockDefinition::see_through(BlockType::Leaves, TextureSlot::new(4, 3), true, false, Hsv::new(80, 3, 220)),
    BlockDefinition::basic(BlockType::Coal, uniform(2, 2)),
    BlockDefinition::basic(BlockType::Iron, uniform(1, 2)),
    BlockDefinition::emitter(BlockType::Lava, TextureSlot::new(13, 14), Hsv::new(0, 255, 1), 8),
    lamp(BlockType::Lamp, 0, 0),
    lamp(BlockType::RedLamp, 0, 255),
    lamp(BlockType::OrangeLamp, 25, 255),
    lamp(BlockType::YellowLamp, 40, 255),
    lamp(BlockType::GreenLamp, 75, 255),
    lamp(BlockType::AquaLamp, 120, 255),
    lamp(BlockType::BlueLamp, 165, 255),
    lamp(BlockType::PurpleLamp, 185, 255),
    lamp(BlockType::PinkLamp, 205, 255),
];

pub(crate) fn lookup(block_type: BlockType) -> &'static BlockDefinition {
    &DEFINITIONS[block_type as usize]
}
