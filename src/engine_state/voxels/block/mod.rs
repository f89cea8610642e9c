//! # Block Module
//!
//! This module provides the block-related data the storage and meshing code needs:
//! block type definitions, block faces, and the material property table consulted
//! by the mesher (transparency and texture indices), the occlusion graph (opacity)
//! and light extraction (emission).

use std::collections::HashMap;

use block_type::BlockType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use block_side::BlockSide;

pub mod block_side;
pub mod block_type;

/// The underlying integer type used to represent block types in memory.
/// This is the material byte stored in the octree.
pub type BlockTypeSize = u8;

/// Material byte of air.
pub const AIR: BlockTypeSize = BlockType::AIR as BlockTypeSize;

/// Maps each built-in block type to its texture indices for each face.
///
/// The outer array is indexed by `BlockType` as a `usize`.
/// The inner array contains 6 texture indices, one for each face in the order:
/// [Front, Back, Bottom, Top, Left, Right]
pub static BLOCK_TYPE_TO_TEXTURE_INDICES: [[u16; 6]; BlockType::COUNT] = [
    [0, 0, 0, 0, 0, 0],       // AIR (never meshed)
    [5, 5, 5, 5, 5, 5],       // STONE
    [1, 1, 1, 1, 1, 1],       // DIRT
    [2, 2, 1, 3, 2, 2],       // GRASS (top: 3, bottom: dirt, sides: 2)
    [0, 0, 0, 0, 0, 0],       // WOOD
    [6, 6, 6, 6, 6, 6],       // LEAVES
    [7, 7, 7, 7, 7, 7],       // SAND
    [8, 8, 8, 8, 8, 8],       // GLASS
    [9, 9, 9, 9, 9, 9],       // WATER
    [10, 10, 10, 10, 10, 10], // GLOWSTONE
    [4, 4, 4, 4, 4, 4],       // WHITE
];

/// Which output bucket a material's faces are routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderClass {
    /// Fully hides whatever is behind it.
    Opaque,
    /// The single-material translucent liquid.
    Water,
    /// Any other see-through material.
    Glass,
}

/// Properties of one material.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockProperties {
    /// Output bucket of the material's faces.
    pub render_class: RenderClass,
    /// Faces against the same material are hidden; faces against any other
    /// see-through material are still drawn.
    #[serde(default)]
    pub self_occlude_only: bool,
    /// Light level emitted; zero for non-emitting materials.
    #[serde(default)]
    pub light_emission: u8,
    /// Texture index per face, in `BlockSide` order.
    pub texture_indices: [u16; 6],
}

impl BlockProperties {
    fn opaque(texture_indices: [u16; 6]) -> Self {
        BlockProperties {
            render_class: RenderClass::Opaque,
            self_occlude_only: false,
            light_emission: 0,
            texture_indices,
        }
    }

    /// Whether this material hides every face behind it.
    pub fn is_opaque(&self) -> bool {
        self.render_class == RenderClass::Opaque
    }
}

/// Errors raised while reading a block registry file.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A name that is not a built-in block.
    #[error("unknown block name `{0}`")]
    UnknownBlock(String),
    /// The file is not valid registry JSON.
    #[error("malformed block registry: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Material property table, indexed by material byte.
///
/// Materials without a built-in `BlockType` default to an opaque block using texture 0.
#[derive(Clone, Debug)]
pub struct BlockRegistry {
    properties: Vec<BlockProperties>,
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockRegistry {
    /// Creates the registry of built-in block types.
    pub fn new() -> Self {
        let mut properties: Vec<BlockProperties> = (0..=BlockTypeSize::MAX as usize)
            .map(|_| BlockProperties::opaque([0; 6]))
            .collect();

        for (material, textures) in BLOCK_TYPE_TO_TEXTURE_INDICES.iter().enumerate() {
            properties[material] = BlockProperties::opaque(*textures);
        }

        let see_through = |render_class, self_occlude_only, block_type: BlockType| BlockProperties {
            render_class,
            self_occlude_only,
            light_emission: 0,
            texture_indices: BLOCK_TYPE_TO_TEXTURE_INDICES[block_type as usize],
        };
        properties[BlockType::AIR as usize] = see_through(RenderClass::Glass, false, BlockType::AIR);
        properties[BlockType::GLASS as usize] = see_through(RenderClass::Glass, true, BlockType::GLASS);
        properties[BlockType::LEAVES as usize] =
            see_through(RenderClass::Glass, false, BlockType::LEAVES);
        properties[BlockType::WATER as usize] = see_through(RenderClass::Water, true, BlockType::WATER);
        properties[BlockType::GLOWSTONE as usize].light_emission = 15;

        BlockRegistry { properties }
    }

    /// Builds a registry from the built-in table overridden by a JSON object mapping
    /// block names to `BlockProperties`.
    ///
    /// ```json
    /// { "glass": { "render_class": "glass", "self_occlude_only": true, "texture_indices": [8,8,8,8,8,8] } }
    /// ```
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let overrides: HashMap<String, BlockProperties> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for (name, properties) in overrides {
            let block_type =
                BlockType::from_name(&name).ok_or_else(|| RegistryError::UnknownBlock(name.clone()))?;
            registry.properties[block_type as usize] = properties;
        }
        Ok(registry)
    }

    /// Properties of a material.
    pub fn properties(&self, material: BlockTypeSize) -> &BlockProperties {
        &self.properties[material as usize]
    }

    /// Whether the material hides what is behind it. Air never does.
    pub fn is_opaque(&self, material: BlockTypeSize) -> bool {
        material != AIR && self.properties(material).is_opaque()
    }

    /// Output bucket of a material.
    pub fn render_class(&self, material: BlockTypeSize) -> RenderClass {
        self.properties(material).render_class
    }

    /// Light emitted by a material, 0 for none.
    pub fn light_emission(&self, material: BlockTypeSize) -> u8 {
        self.properties(material).light_emission
    }

    /// Texture layer for one side of a material.
    pub fn texture_index(&self, material: BlockTypeSize, side: BlockSide) -> u16 {
        self.properties(material).texture_indices[side as usize]
    }

    /// Whether `adjacent` hides the face of `own` that touches it.
    ///
    /// Air hides nothing and opaque materials hide everything. A see-through material
    /// only hides faces of the same material, and only when that material is flagged
    /// `self_occlude_only`.
    pub fn occludes(&self, adjacent: BlockTypeSize, own: BlockTypeSize) -> bool {
        if adjacent == AIR {
            return false;
        }
        if self.is_opaque(adjacent) {
            return true;
        }
        adjacent == own && self.properties(own).self_occlude_only
    }

    /// Whether a voxel of `own` next to `adjacent` needs a face on that side.
    pub fn needs_face(&self, own: BlockTypeSize, adjacent: BlockTypeSize) -> bool {
        own != AIR && !self.occludes(adjacent, own)
    }
}
