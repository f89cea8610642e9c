//! # Terrain Generation
//!
//! Terrain generators produce the raw material grid of a chunk. The engine only needs
//! the `TerrainGenerator` trait; the implementations here are the simple strategies the
//! engine ships with and are selected through `GeneratorKind` in the configuration.
//!
//! Multiple terrain generation strategies are supported:
//! - Perlin noise for natural-looking terrain
//! - Flat ground at a fixed height
//! - Checkerboard pattern for testing
//! - Solid chunks (all blocks filled)
//! - Empty chunks (all blocks air)
//! - Random sparse blocks
//!
//! A chunk at level of detail `L` samples the world every `2^L` voxels, so the same
//! generator serves every LOD. Wrapped in a `DownsamplingGenerator`, a coarse chunk is
//! instead built from the eight finer chunks it covers, which keeps thin features that
//! a strided sample would skip.

use std::sync::Arc;

use cgmath::Point3;
use noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use super::block::block_type::BlockType;
use super::block::BlockTypeSize;
use super::chunk::{ChunkCreationIterator, DenseGrid, CHUNK_DIMENSION};
use super::error::GenerationError;

/// Highest level of detail a generator will sample.
pub const MAX_LOD: u8 = 8;

/// Threshold above which Perlin noise is considered solid for terrain generation.
pub const PERLIN_POSITIVE_THRESHOLD: f64 = 0.2;
/// Threshold below which Perlin noise is considered empty for terrain generation.
pub const PERLIN_NEGATIVE_THRESHOLD: f64 = -0.2;
/// Scaling factor applied to world coordinates when sampling Perlin noise.
pub const PERLIN_SCALE_FACTOR: f64 = 0.02;

/// Supplies the materials of a chunk.
pub trait TerrainGenerator: Send + Sync {
    /// Generates the dense grid of the chunk at `position` and `lod`.
    fn generate(&self, position: Point3<i32>, lod: u8) -> Result<DenseGrid, GenerationError>;
}

/// The generators selectable from the configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    /// Rolling hills from Perlin noise.
    #[default]
    Perlin,
    /// Flat ground at height 0.
    Flat,
    /// Alternating dirt and air.
    Checkerboard,
    /// Everything dirt.
    Solid,
    /// Everything air.
    Empty,
    /// Scattered dirt blocks.
    Random,
}

impl GeneratorKind {
    /// Instantiates the generator.
    ///
    /// # Arguments
    /// * `seed` - Seed for noise and random choices
    pub fn build(self, seed: u32) -> Arc<dyn TerrainGenerator> {
        match self {
            GeneratorKind::Perlin => Arc::new(PerlinGenerator::new(seed)),
            GeneratorKind::Flat => Arc::new(FlatGenerator { height: 0 }),
            GeneratorKind::Checkerboard => Arc::new(CheckerboardGenerator),
            GeneratorKind::Solid => Arc::new(SolidGenerator {
                material: BlockType::DIRT.material(),
            }),
            GeneratorKind::Empty => Arc::new(EmptyGenerator),
            GeneratorKind::Random => Arc::new(RandomGenerator {
                seed,
                sparseness: 0.9,
            }),
        }
    }
}

/// Builds a grid by evaluating `material_at` at every voxel's world coordinate.
fn sample_world(
    position: Point3<i32>,
    lod: u8,
    mut material_at: impl FnMut(Point3<i64>) -> BlockTypeSize,
) -> Result<DenseGrid, GenerationError> {
    if lod > MAX_LOD {
        return Err(GenerationError::UnsupportedLod(lod));
    }
    let dimension = CHUNK_DIMENSION as i64;
    let mut cci = ChunkCreationIterator::new();

    for k in 0..dimension {
        for j in 0..dimension {
            for i in 0..dimension {
                let world = Point3::new(
                    (position.x as i64 * dimension + i) << lod,
                    (position.y as i64 * dimension + j) << lod,
                    (position.z as i64 * dimension + k) << lod,
                );
                cci.push_material(material_at(world));
            }
        }
    }

    cci.return_grid()
}

/// A chunk-specific seed so that random choices do not depend on generation order.
fn chunk_seed(seed: u32, position: Point3<i32>, lod: u8) -> u64 {
    let mut hash = seed as u64 ^ 0x9E37_79B9_7F4A_7C15;
    for value in [position.x as i64, position.y as i64, position.z as i64, lod as i64] {
        hash = (hash ^ value as u64).wrapping_mul(0x0100_0000_01B3);
    }
    hash
}

/// Natural-looking terrain with caves and overhangs, from 3D Perlin noise.
pub struct PerlinGenerator {
    perlin: Perlin,
    seed: u32,
}

impl PerlinGenerator {
    /// Creates a generator whose terrain depends only on `seed`.
    pub fn new(seed: u32) -> Self {
        PerlinGenerator {
            perlin: Perlin::new(seed),
            seed,
        }
    }

    /// Converts world coordinates to Perlin noise sample coordinates.
    fn to_perlin_pos(pos: Point3<i64>, scale_factor: f64) -> [f64; 3] {
        [
            pos.x as f64 * scale_factor,
            pos.y as f64 * scale_factor,
            pos.z as f64 * scale_factor,
        ]
    }
}

impl TerrainGenerator for PerlinGenerator {
    fn generate(&self, position: Point3<i32>, lod: u8) -> Result<DenseGrid, GenerationError> {
        let mut rng = fastrand::Rng::with_seed(chunk_seed(self.seed, position, lod));
        sample_world(position, lod, |world| {
            let sample = self.perlin.get(Self::to_perlin_pos(world, PERLIN_SCALE_FACTOR));
            if !(PERLIN_NEGATIVE_THRESHOLD..=PERLIN_POSITIVE_THRESHOLD).contains(&sample) {
                BlockType::get_random_type(&mut rng).material()
            } else {
                BlockType::AIR.material()
            }
        })
    }
}

/// Flat ground: grass on top, a few layers of dirt, stone below.
pub struct FlatGenerator {
    /// The first air layer.
    pub height: i64,
}

impl TerrainGenerator for FlatGenerator {
    fn generate(&self, position: Point3<i32>, lod: u8) -> Result<DenseGrid, GenerationError> {
        let height = self.height;
        sample_world(position, lod, |world| {
            let block_type = match height - world.y {
                d if d <= 0 => BlockType::AIR,
                1 => BlockType::GRASS,
                2..=3 => BlockType::DIRT,
                _ => BlockType::STONE,
            };
            block_type.material()
        })
    }
}

/// Alternating solid and air voxels in all three directions.
pub struct CheckerboardGenerator;

impl TerrainGenerator for CheckerboardGenerator {
    fn generate(&self, position: Point3<i32>, lod: u8) -> Result<DenseGrid, GenerationError> {
        sample_world(position, lod, |world| {
            let parity = ((world.x >> lod) + (world.y >> lod) + (world.z >> lod)).rem_euclid(2);
            if parity == 0 {
                BlockType::DIRT.material()
            } else {
                BlockType::AIR.material()
            }
        })
    }
}

/// Every voxel has the same material.
pub struct SolidGenerator {
    /// Material of every voxel.
    pub material: BlockTypeSize,
}

impl TerrainGenerator for SolidGenerator {
    fn generate(&self, _position: Point3<i32>, lod: u8) -> Result<DenseGrid, GenerationError> {
        if lod > MAX_LOD {
            return Err(GenerationError::UnsupportedLod(lod));
        }
        Ok(DenseGrid::filled(self.material))
    }
}

/// Nothing but air.
pub struct EmptyGenerator;

impl TerrainGenerator for EmptyGenerator {
    fn generate(&self, _position: Point3<i32>, lod: u8) -> Result<DenseGrid, GenerationError> {
        if lod > MAX_LOD {
            return Err(GenerationError::UnsupportedLod(lod));
        }
        Ok(DenseGrid::new())
    }
}

/// Builds chunks above LOD 0 by downsampling the eight chunks one level finer.
///
/// The finer chunks come from the wrapped generator; LOD 0 is passed straight through.
pub struct DownsamplingGenerator {
    /// Generator for the chunks one level finer.
    pub inner: Arc<dyn TerrainGenerator>,
}

impl TerrainGenerator for DownsamplingGenerator {
    fn generate(&self, position: Point3<i32>, lod: u8) -> Result<DenseGrid, GenerationError> {
        if lod > MAX_LOD {
            return Err(GenerationError::UnsupportedLod(lod));
        }
        if lod == 0 {
            return self.inner.generate(position, lod);
        }

        let mut octants = Vec::with_capacity(8);
        for octant in 0..8 {
            let child = Point3::new(
                position.x * 2 + (octant & 1),
                position.y * 2 + ((octant >> 2) & 1),
                position.z * 2 + ((octant >> 1) & 1),
            );
            octants.push(self.inner.generate(child, lod - 1)?);
        }
        let octants: [DenseGrid; 8] = octants
            .try_into()
            .map_err(|_| GenerationError::UnsupportedLod(lod))?;
        Ok(DenseGrid::downsample(&octants))
    }
}

/// Sparse random dirt blocks.
pub struct RandomGenerator {
    /// Mixed into every chunk's random stream.
    pub seed: u32,
    /// Probability of a voxel being air.
    pub sparseness: f64,
}

impl TerrainGenerator for RandomGenerator {
    fn generate(&self, position: Point3<i32>, lod: u8) -> Result<DenseGrid, GenerationError> {
        let mut rng = fastrand::Rng::with_seed(chunk_seed(self.seed, position, lod));
        sample_world(position, lod, |_| {
            if rng.f64() < self.sparseness {
                BlockType::AIR.material()
            } else {
                BlockType::DIRT.material()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::AIR;

    #[test]
    fn flat_terrain_layers_grass_over_dirt_over_stone() {
        let generator = FlatGenerator { height: 10 };
        let grid = generator.generate(Point3::new(0, 0, 0), 0).expect("generate");
        assert_eq!(grid.get(4, 9, 4), BlockType::GRASS.material());
        assert_eq!(grid.get(4, 8, 4), BlockType::DIRT.material());
        assert_eq!(grid.get(4, 5, 4), BlockType::STONE.material());
        assert_eq!(grid.get(4, 10, 4), AIR);

        let below = generator.generate(Point3::new(0, -1, 0), 0).expect("generate");
        assert_eq!(below.count(BlockType::STONE.material()), below.as_slice().len());
    }

    #[test]
    fn coarser_lods_sample_the_world_at_a_wider_stride() {
        let generator = FlatGenerator { height: 16 };
        let grid = generator.generate(Point3::new(0, 0, 0), 1).expect("generate");
        // Voxel j covers world y = 2j, so the first air voxel is j = 8.
        assert_eq!(grid.get(0, 7, 0), BlockType::DIRT.material());
        assert_eq!(grid.get(0, 8, 0), AIR);
    }

    #[test]
    fn downsampled_lods_drop_half_empty_blocks() {
        let flat: Arc<dyn TerrainGenerator> = Arc::new(FlatGenerator { height: 15 });
        let downsampling = DownsamplingGenerator { inner: Arc::clone(&flat) };

        // Voxel 7 covers y = 14 (grass) and y = 15 (air): half air, so it becomes air,
        // where a strided sample would only see the grass.
        let strided = flat.generate(Point3::new(0, 0, 0), 1).expect("generate");
        let grid = downsampling.generate(Point3::new(0, 0, 0), 1).expect("generate");
        assert_eq!(strided.get(3, 7, 3), BlockType::GRASS.material());
        assert_eq!(grid.get(3, 7, 3), AIR);
        assert_eq!(grid.get(3, 6, 3), BlockType::DIRT.material());
        assert_eq!(grid.get(20, 0, 20), BlockType::STONE.material());

        assert_eq!(
            downsampling.generate(Point3::new(2, -1, 5), 0).expect("generate"),
            flat.generate(Point3::new(2, -1, 5), 0).expect("generate")
        );
        assert!(matches!(
            downsampling.generate(Point3::new(0, 0, 0), MAX_LOD + 1),
            Err(GenerationError::UnsupportedLod(_))
        ));
    }

    #[test]
    fn random_generation_is_deterministic_per_chunk() {
        let generator = RandomGenerator { seed: 9, sparseness: 0.5 };
        let a = generator.generate(Point3::new(1, 2, 3), 0).expect("generate");
        let b = generator.generate(Point3::new(1, 2, 3), 0).expect("generate");
        let c = generator.generate(Point3::new(3, 2, 1), 0).expect("generate");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn every_kind_builds_a_working_generator() {
        for kind in [
            GeneratorKind::Perlin,
            GeneratorKind::Flat,
            GeneratorKind::Checkerboard,
            GeneratorKind::Solid,
            GeneratorKind::Empty,
            GeneratorKind::Random,
        ] {
            let generator = kind.build(1);
            assert!(generator.generate(Point3::new(0, 0, 0), 0).is_ok(), "{kind:?}");
            assert!(matches!(
                generator.generate(Point3::new(0, 0, 0), MAX_LOD + 1),
                Err(GenerationError::UnsupportedLod(_))
            ));
        }
    }
}
