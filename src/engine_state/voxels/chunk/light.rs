//! Light source extraction.
//!
//! Walks a chunk's octree without decompressing it and reports every light-emitting
//! region. Uniform regions are reported once: a homogeneous node becomes one source
//! covering its whole cube, and inside a detail node each uniform 2×2×2 block becomes
//! one source. Only single emitting voxels that share no such block are reported on
//! their own.

use cgmath::Point3;

use crate::engine_state::voxels::block::{BlockRegistry, BlockTypeSize};
use crate::engine_state::voxels::octree::codec::{
    child_origin, child_position, detail_index, ROOT_DEPTH, TAG_DETAIL, TAG_HOMOGENEOUS,
};

/// One light-emitting region of a chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct LightSource {
    /// Center of the region in chunk-local voxel units.
    pub center: Point3<f32>,
    /// Side length of the region in voxels.
    pub size: u32,
    /// Emitting material.
    pub material: BlockTypeSize,
    /// `log2(size)` plus the chunk's level of detail.
    pub strength: u8,
}

impl LightSource {
    fn new(origin: (usize, usize, usize), level: u32, material: BlockTypeSize, lod: u8) -> Self {
        let size = 1u32 << level;
        let half = size as f32 / 2.0;
        LightSource {
            center: Point3::new(
                origin.0 as f32 + half,
                origin.1 as f32 + half,
                origin.2 as f32 + half,
            ),
            size,
            material,
            strength: level as u8 + lod,
        }
    }
}

/// Collects the light sources of an encoded chunk.
pub fn extract_light_sources(buffer: &[u8], lod: u8, registry: &BlockRegistry) -> Vec<LightSource> {
    let mut sources = Vec::new();
    collect(buffer, 0, ROOT_DEPTH, (0, 0, 0), lod, registry, &mut sources);
    sources
}

fn collect(
    buffer: &[u8],
    pos: usize,
    depth: u32,
    origin: (usize, usize, usize),
    lod: u8,
    registry: &BlockRegistry,
    sources: &mut Vec<LightSource>,
) {
    match buffer[pos] {
        TAG_HOMOGENEOUS => {
            let material = buffer[pos + 1];
            if registry.light_emission(material) > 0 {
                sources.push(LightSource::new(origin, depth + 1, material, lod));
            }
        }
        TAG_DETAIL => {
            let material_at = |x: usize, y: usize, z: usize| buffer[pos + 1 + detail_index(x, y, z)];
            for block in 0..8 {
                let (bx, by, bz) = child_origin(block, 1);
                let first = material_at(bx, by, bz);
                let uniform = (1..8).all(|voxel| {
                    let (dx, dy, dz) = child_origin(voxel, 0);
                    material_at(bx + dx, by + dy, bz + dz) == first
                });

                if uniform {
                    if registry.light_emission(first) > 0 {
                        let corner = (origin.0 + bx, origin.1 + by, origin.2 + bz);
                        sources.push(LightSource::new(corner, 1, first, lod));
                    }
                    continue;
                }

                for voxel in 0..8 {
                    let (dx, dy, dz) = child_origin(voxel, 0);
                    let (x, y, z) = (bx + dx, by + dy, bz + dz);
                    let material = material_at(x, y, z);
                    if registry.light_emission(material) > 0 {
                        let corner = (origin.0 + x, origin.1 + y, origin.2 + z);
                        sources.push(LightSource::new(corner, 0, material, lod));
                    }
                }
            }
        }
        _ => {
            for child in 0..8 {
                let (dx, dy, dz) = child_origin(child, depth);
                collect(
                    buffer,
                    child_position(buffer, pos, child),
                    depth - 1,
                    (origin.0 + dx, origin.1 + dy, origin.2 + dz),
                    lod,
                    registry,
                    sources,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::block_type::BlockType;
    use crate::engine_state::voxels::chunk::chunk_creation::DenseGrid;
    use crate::engine_state::voxels::chunk::CHUNK_DIMENSION;
    use crate::engine_state::voxels::octree::codec::compress;

    const GLOW: u8 = BlockType::GLOWSTONE as u8;
    const STONE: u8 = BlockType::STONE as u8;

    #[test]
    fn fully_emitting_chunk_is_a_single_source() {
        let registry = BlockRegistry::new();
        let buffer = compress(&DenseGrid::filled(GLOW));
        let sources = extract_light_sources(&buffer, 2, &registry);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].size, CHUNK_DIMENSION as u32);
        assert_eq!(sources[0].strength, 5 + 2);
        let mid = CHUNK_DIMENSION as f32 / 2.0;
        assert_eq!(sources[0].center, Point3::new(mid, mid, mid));
    }

    #[test]
    fn uniform_blocks_inside_detail_nodes_are_merged() {
        let registry = BlockRegistry::new();
        let mut grid = DenseGrid::filled(STONE);
        grid.fill_cube(2, 0, 0, 2, GLOW);
        grid.set(0, 3, 3, GLOW);
        let sources = extract_light_sources(&compress(&grid), 0, &registry);

        assert_eq!(sources.len(), 2);
        let block = sources.iter().find(|s| s.size == 2).expect("merged block");
        assert_eq!(block.center, Point3::new(3.0, 1.0, 1.0));
        assert_eq!(block.strength, 1);
        let single = sources.iter().find(|s| s.size == 1).expect("single voxel");
        assert_eq!(single.center, Point3::new(0.5, 3.5, 3.5));
        assert_eq!(single.strength, 0);
    }

    #[test]
    fn non_emitting_chunks_have_no_sources() {
        let registry = BlockRegistry::new();
        let buffer = compress(&DenseGrid::filled(STONE));
        assert!(extract_light_sources(&buffer, 0, &registry).is_empty());
    }
}
