//! The closed set of block kinds.
//!
//! Discriminants are the on-disk ids written by the chunk codec, so variants
//! must only ever be appended.

use crate::definition::{self, BlockDefinition};

/// Every kind of block the world can contain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum BlockType {
    #[default]
    Air = 0,
    Dirt = 1,
    Stone = 2,
    WoodPlanks = 3,
    Water = 4,
    Sand = 5,
    Cobble = 6,
    Glass = 7,
    RedGlass = 8,
    BlueGlass = 9,
    GreenGlass = 10,
    YellowGlass = 11,
    PurpleGlass = 12,
    Bedrock = 13,
    Wood = 14,
    Leaves = 15,
    Coal = 16,
    Iron = 17,
    Lava = 18,
    Lamp = 19,
    RedLamp = 20,
    OrangeLamp = 21,
    YellowLamp = 22,
    GreenLamp = 23,
    AquaLamp = 24,
    BlueLamp = 25,
    PurpleLamp = 26,
    PinkLamp = 27,
}

impl BlockType {
    /// Number of block kinds.
    pub const COUNT: usize = 28;

    /// All block kinds in id order.
    pub const ALL: [BlockType; Self::COUNT] = [
        Self::Air,
        Self::Dirt,
        Self::Stone,
        Self::WoodPlanks,
        Self::Water,
        Self::Sand,
        Self::Cobble,
        Self::Glass,
        Self::RedGlass,
        Self::BlueGlass,
        Self::GreenGlass,
        Self::YellowGlass,
        Self::PurpleGlass,
        Self::Bedrock,
        Self::Wood,
        Self::Leaves,
        Self::Coal,
        Self::Iron,
        Self::Lava,
        Self::Lamp,
        Self::RedLamp,
        Self::OrangeLamp,
        Self::YellowLamp,
        Self::GreenLamp,
        Self::AquaLamp,
        Self::BlueLamp,
        Self::PurpleLamp,
        Self::PinkLamp,
    ];

    /// Looks up a block kind by its persistent id.
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Persistent id of this block kind.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Immutable definition for this block kind.
    pub fn definition(self) -> &'static BlockDefinition {
        definition::lookup(self)
    }
}
