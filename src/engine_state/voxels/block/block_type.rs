//! # Block Type Module
//!
//! This module defines the built-in block types of the voxel world.
//! It provides functionality for block type identification, conversion, and random generation.

use num_derive::FromPrimitive;
use phf::phf_map;

use super::BlockTypeSize;

/// Enumerates the built-in block types in the voxel world.
///
/// The discriminant is the material byte stored in the octree. The `FromPrimitive`
/// derive allows conversion back from that byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
pub enum BlockType {
    /// An air block, which is non-solid and transparent.
    AIR = 0,

    /// Bedrock-like filler below the surface.
    STONE = 1,

    /// A basic dirt block, used as a common building material.
    DIRT = 2,

    /// A grass block with different textures on top and sides.
    GRASS = 3,

    /// A wooden block with a bark texture on all sides.
    WOOD = 4,

    /// Foliage: see-through, but never hides its neighbours.
    LEAVES = 5,

    /// Beach and desert surface.
    SAND = 6,

    /// Clear glass. Adjacent glass faces are merged away.
    GLASS = 7,

    /// The single translucent liquid.
    WATER = 8,

    /// A light-emitting block.
    GLOWSTONE = 9,

    /// A plain white block, often used for testing.
    WHITE = 10,
}

/// Lookup from the names used in block registry files to block types.
pub static BLOCK_NAMES: phf::Map<&'static str, BlockType> = phf_map! {
    "air" => BlockType::AIR,
    "stone" => BlockType::STONE,
    "dirt" => BlockType::DIRT,
    "grass" => BlockType::GRASS,
    "wood" => BlockType::WOOD,
    "leaves" => BlockType::LEAVES,
    "sand" => BlockType::SAND,
    "glass" => BlockType::GLASS,
    "water" => BlockType::WATER,
    "glowstone" => BlockType::GLOWSTONE,
    "white" => BlockType::WHITE,
};

impl BlockType {
    /// Number of built-in block types.
    pub const COUNT: usize = 11;

    /// Converts a stored material byte to a `BlockType`.
    ///
    /// Returns `None` for materials that have no built-in type (they can still be
    /// described by a custom registry entry).
    pub fn from_material(material: BlockTypeSize) -> Option<Self> {
        num::FromPrimitive::from_u8(material)
    }

    /// Looks a block type up by its registry name.
    pub fn from_name(name: &str) -> Option<Self> {
        BLOCK_NAMES.get(name).copied()
    }

    /// The material byte of this block type.
    pub fn material(self) -> BlockTypeSize {
        self as BlockTypeSize
    }

    /// Generates a random solid terrain block type.
    ///
    /// This is primarily used for testing and procedural generation.
    pub fn get_random_type(rng: &mut fastrand::Rng) -> Self {
        num::FromPrimitive::from_u8(rng.u8(1..5)).unwrap_or(BlockType::STONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_bytes_round_trip_through_from_material() {
        for material in 0..BlockType::COUNT as u8 {
            let block_type = BlockType::from_material(material).expect("built-in material");
            assert_eq!(block_type.material(), material);
        }
        assert_eq!(BlockType::from_material(200), None);
    }

    #[test]
    fn names_resolve_to_block_types() {
        assert_eq!(BlockType::from_name("glass"), Some(BlockType::GLASS));
        assert_eq!(BlockType::from_name("lava"), None);
        assert_eq!(BLOCK_NAMES.len(), BlockType::COUNT);
    }

    #[test]
    fn random_types_are_never_air() {
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..100 {
            assert_ne!(BlockType::get_random_type(&mut rng), BlockType::AIR);
        }
    }
}
