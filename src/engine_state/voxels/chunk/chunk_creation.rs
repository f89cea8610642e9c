//! # Chunk Creation Module
//!
//! This module provides the dense material grid a chunk is built from and decompressed
//! into, together with a sequential builder used by terrain generators.
//!
//! ## Layout
//!
//! A `DenseGrid` stores one material byte per voxel, with X varying fastest, then Y,
//! then Z. This is the same order in which `ChunkCreationIterator` expects materials
//! to be pushed, so a generator can simply loop `z`, `y`, `x` from the outside in.
//!
//! The dense grid is the only uncompressed representation of a chunk. It is never
//! stored; it exists while generating, while meshing and while downsampling LODs.

use std::fmt;

use crate::engine_state::voxels::block::{block_type::BlockType, BlockTypeSize, AIR};
use crate::engine_state::voxels::error::GenerationError;

use super::{CHUNK_DIMENSION, CHUNK_SHIFT, CHUNK_SIZE};

/// A fully materialized `S×S×S` material grid.
#[derive(Clone, PartialEq, Eq)]
pub struct DenseGrid {
    materials: Box<[BlockTypeSize]>,
}

impl fmt::Debug for DenseGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let solid = self.materials.iter().filter(|&&m| m != AIR).count();
        f.debug_struct("DenseGrid")
            .field("non_air_voxels", &solid)
            .finish()
    }
}

impl Default for DenseGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl DenseGrid {
    /// Creates a grid filled with air.
    pub fn new() -> Self {
        Self::filled(AIR)
    }

    /// Creates a grid where every voxel has the same material.
    pub fn filled(material: BlockTypeSize) -> Self {
        DenseGrid {
            materials: vec![material; CHUNK_SIZE].into_boxed_slice(),
        }
    }

    /// Wraps a raw material array in `x + S*(y + S*z)` order.
    ///
    /// # Returns
    /// `GenerationError::WrongSize` if the array does not hold exactly `S³` materials.
    pub fn from_materials(materials: Vec<BlockTypeSize>) -> Result<Self, GenerationError> {
        if materials.len() != CHUNK_SIZE {
            return Err(GenerationError::WrongSize {
                expected: CHUNK_SIZE,
                found: materials.len(),
            });
        }
        Ok(DenseGrid {
            materials: materials.into_boxed_slice(),
        })
    }

    /// Linear index of a voxel.
    #[inline]
    pub fn index(x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < CHUNK_DIMENSION && y < CHUNK_DIMENSION && z < CHUNK_DIMENSION);
        x + CHUNK_DIMENSION * (y + CHUNK_DIMENSION * z)
    }

    /// Material at a voxel.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> BlockTypeSize {
        self.materials[Self::index(x, y, z)]
    }

    /// Overwrites one voxel.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, material: BlockTypeSize) {
        self.materials[Self::index(x, y, z)] = material;
    }

    /// Writes `material` into the cube of side `side` whose minimum corner is the origin.
    pub fn fill_cube(
        &mut self,
        origin_x: usize,
        origin_y: usize,
        origin_z: usize,
        side: usize,
        material: BlockTypeSize,
    ) {
        for z in origin_z..origin_z + side {
            for y in origin_y..origin_y + side {
                let row = Self::index(origin_x, y, z);
                self.materials[row..row + side].fill(material);
            }
        }
    }

    /// Raw materials in `x + S*(y + S*z)` order.
    pub fn as_slice(&self) -> &[BlockTypeSize] {
        &self.materials
    }

    /// Number of voxels holding `material`.
    pub fn count(&self, material: BlockTypeSize) -> usize {
        self.materials.iter().filter(|&&m| m == material).count()
    }

    /// Builds the next coarser level of detail from eight neighbouring grids.
    ///
    /// `octants` is indexed by octant (`y<<2 | z<<1 | x`, one bit per axis). Every
    /// 2×2×2 block becomes one voxel: air if at least half of the block is air, and
    /// otherwise the most frequent non-air material (ties go to the lower material byte).
    pub fn downsample(octants: &[DenseGrid; 8]) -> DenseGrid {
        let half = CHUNK_DIMENSION / 2;
        let mut out = DenseGrid::new();

        for z in 0..CHUNK_DIMENSION {
            for y in 0..CHUNK_DIMENSION {
                for x in 0..CHUNK_DIMENSION {
                    let octant = ((y >> (CHUNK_SHIFT - 1)) & 1) << 2
                        | ((z >> (CHUNK_SHIFT - 1)) & 1) << 1
                        | ((x >> (CHUNK_SHIFT - 1)) & 1);
                    let source = &octants[octant];
                    let (sx, sy, sz) = ((x % half) * 2, (y % half) * 2, (z % half) * 2);

                    let mut block = [AIR; 8];
                    for (i, material) in block.iter_mut().enumerate() {
                        *material = source.get(sx + (i & 1), sy + ((i >> 2) & 1), sz + ((i >> 1) & 1));
                    }
                    out.set(x, y, z, Self::dominant_material(&block));
                }
            }
        }

        out
    }

    fn dominant_material(block: &[BlockTypeSize; 8]) -> BlockTypeSize {
        let air = block.iter().filter(|&&m| m == AIR).count();
        if air * 2 >= block.len() {
            return AIR;
        }

        let mut best = AIR;
        let mut best_count = 0;
        for &candidate in block.iter().filter(|&&m| m != AIR) {
            let count = block.iter().filter(|&&m| m == candidate).count();
            if count > best_count || (count == best_count && candidate < best) {
                best = candidate;
                best_count = count;
            }
        }
        best
    }
}

/// A builder for populating a `DenseGrid` one voxel at a time.
///
/// Materials are pushed in generation order: X fastest, then Y, then Z.
pub struct ChunkCreationIterator {
    /// Materials pushed so far
    materials: Vec<BlockTypeSize>,
}

impl Default for ChunkCreationIterator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkCreationIterator {
    /// Creates a new, empty `ChunkCreationIterator`.
    pub fn new() -> Self {
        ChunkCreationIterator {
            materials: Vec::with_capacity(CHUNK_SIZE),
        }
    }

    /// Appends the next voxel.
    ///
    /// # Arguments
    /// * `block_type` - The type of block to add
    pub fn push_block_type(&mut self, block_type: BlockType) {
        self.push_material(block_type.material());
    }

    /// Appends the next voxel by raw material byte.
    pub fn push_material(&mut self, material: BlockTypeSize) {
        self.materials.push(material);
    }

    /// Number of voxels pushed so far.
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Whether every voxel is air.
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Finalizes the grid.
    ///
    /// # Returns
    /// The finished `DenseGrid`, or `GenerationError::WrongSize` if fewer or more than
    /// `S³` voxels were pushed.
    pub fn return_grid(self) -> Result<DenseGrid, GenerationError> {
        DenseGrid::from_materials(self.materials)
    }
}
