//! # Chunk Module
//!
//! This module provides the `Chunk` struct and related functionality for managing
//! 32x32x32 blocks of voxel data.
//!
//! ## Memory Optimization
//!
//! A chunk never keeps a dense per-voxel array. Its voxels live in a sparse octree
//! flattened into a single byte buffer (see `octree`), owned by a `ChunkStore`:
//! - a chunk of one material costs 2 bytes
//! - uniform sub-cubes collapse into a single 2-byte node
//! - only 4×4×4 regions that really mix materials store every voxel (65 bytes)
//!
//! A dense `DenseGrid` is produced only on demand, for meshing and downsampling.
//!
//! ### Performance Characteristics
//! - **Block Lookup**: O(depth) - one node visit per tree level, at most `CHUNK_SHIFT`
//! - **Block Update**: O(depth + buffer length) - the buffer is spliced in place
//! - **Decompression**: O(S³)

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use cgmath::Point3;

use crate::engine_state::rendering::culling::occlusion::OcclusionRecord;

use super::block::block_side::Axis;
use super::block::BlockTypeSize;

pub mod chunk_creation;
pub mod light;
pub mod record;
pub mod store;

pub use chunk_creation::{ChunkCreationIterator, DenseGrid};
pub use store::ChunkStore;

/// Base-2 logarithm of the chunk dimension.
pub const CHUNK_SHIFT: usize = 5;
/// The dimension (width, height, depth) of a chunk in blocks.
pub const CHUNK_DIMENSION: usize = 1 << CHUNK_SHIFT;
/// The number of blocks in a single 2D plane of a chunk (CHUNK_DIMENSION²).
pub const CHUNK_AREA: usize = CHUNK_DIMENSION * CHUNK_DIMENSION;
/// The total number of blocks in a chunk (CHUNK_DIMENSION³).
pub const CHUNK_SIZE: usize = CHUNK_AREA * CHUNK_DIMENSION;

// Mesher columns are packed into one u64 per row.
const _: () = assert!(CHUNK_DIMENSION <= 64);

/// An `S×S` layer of materials, indexed `u + S*v`.
pub type LayerSlice = Vec<BlockTypeSize>;

/// Maps plane coordinates of a layer perpendicular to `axis` to chunk coordinates.
///
/// The in-plane axes are: X layers use `u = z, v = y`; Y layers use `u = x, v = z`;
/// Z layers use `u = x, v = y`.
#[inline]
pub fn layer_voxel(axis: Axis, layer: usize, u: usize, v: usize) -> (usize, usize, usize) {
    match axis {
        Axis::X => (layer, v, u),
        Axis::Y => (u, layer, v),
        Axis::Z => (u, v, layer),
    }
}

/// Splits a world voxel position (at LOD 0) into its chunk position and the voxel
/// coordinates inside that chunk.
pub fn world_to_chunk(world: Point3<i32>) -> (Point3<i32>, (usize, usize, usize)) {
    let dimension = CHUNK_DIMENSION as i32;
    let chunk = Point3::new(
        world.x.div_euclid(dimension),
        world.y.div_euclid(dimension),
        world.z.div_euclid(dimension),
    );
    let local = (
        world.x.rem_euclid(dimension) as usize,
        world.y.rem_euclid(dimension) as usize,
        world.z.rem_euclid(dimension) as usize,
    );
    (chunk, local)
}

/// Represents a 32x32x32 collection of voxel blocks in the world.
///
/// Chunks are the fundamental unit of generation, meshing and storage. Each chunk
/// knows its position and level of detail, owns its material store, and tracks where
/// it is in the pipeline.
#[derive(Debug)]
pub struct Chunk {
    /// The position of this chunk in chunk coordinates (not block coordinates).
    pub position: Point3<i32>,

    /// Level of detail. One voxel covers `2^lod` world units along each axis.
    pub lod: u8,

    /// The encoded voxels.
    pub store: ChunkStore,

    /// Guards generation so that it runs at most once.
    generated: Mutex<bool>,

    meshed: AtomicBool,

    /// Bumped whenever a mesh built from earlier contents becomes outdated.
    mesh_epoch: AtomicU32,

    /// Edited since it was last written to disc.
    dirty: AtomicBool,

    /// Face-pair visibility bits; see `OcclusionRecord`.
    occlusion: AtomicU16,
}

impl Chunk {
    /// Creates a new, ungenerated chunk. Its store reads as all air.
    ///
    /// # Arguments
    /// * `position` - The chunk coordinates of the new chunk
    /// * `lod` - Its level of detail
    pub fn new(position: Point3<i32>, lod: u8) -> Self {
        Chunk {
            position,
            lod,
            store: ChunkStore::new(),
            generated: Mutex::new(false),
            meshed: AtomicBool::new(false),
            mesh_epoch: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
            occlusion: AtomicU16::new(OcclusionRecord::ALL_OPEN.bits()),
        }
    }

    /// Runs `generate` against the store unless the chunk is already generated.
    ///
    /// Concurrent callers wait for the first one; whoever comes later sees the chunk as
    /// generated and does nothing. A failed generation leaves the chunk ungenerated so a
    /// later call can retry.
    ///
    /// # Returns
    /// `Ok(true)` if this call generated the chunk, `Ok(false)` if it already was.
    pub fn generate_with<E>(
        &self,
        generate: impl FnOnce(&ChunkStore) -> Result<(), E>,
    ) -> Result<bool, E> {
        let mut generated = self.generated.lock().unwrap_or_else(PoisonError::into_inner);
        if *generated {
            return Ok(false);
        }
        generate(&self.store)?;
        *generated = true;
        Ok(true)
    }

    /// Whether the store holds loaded or generated materials.
    pub fn is_generated(&self) -> bool {
        *self.generated.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a mesh is built, being built, or cached.
    pub fn is_meshed(&self) -> bool {
        self.meshed.load(Ordering::Acquire)
    }

    /// Sets or clears the meshed flag without touching the epoch.
    pub fn set_meshed(&self, meshed: bool) {
        self.meshed.store(meshed, Ordering::Release);
    }

    /// Current mesh epoch. A mesh is only current if the epoch has not moved since
    /// its builder read the chunk and its neighbours.
    pub fn mesh_epoch(&self) -> u32 {
        self.mesh_epoch.load(Ordering::Acquire)
    }

    /// Outdates any mesh built so far, including ones still being built.
    pub fn invalidate_mesh(&self) {
        self.mesh_epoch.fetch_add(1, Ordering::AcqRel);
        self.set_meshed(false);
    }

    /// Whether the chunk has edits not yet written to disc.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Flags the chunk for the next flush.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Clears the dirty flag, returning whether it was set.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Occlusion record of the current contents.
    pub fn occlusion(&self) -> OcclusionRecord {
        OcclusionRecord::from_bits(self.occlusion.load(Ordering::Acquire))
    }

    /// Replaces the occlusion record.
    pub fn set_occlusion(&self, record: OcclusionRecord) {
        self.occlusion.store(record.bits(), Ordering::Release);
    }

    /// Edits the chunk: writes the material, marks the chunk dirty and un-meshed.
    pub fn edit(&self, x: usize, y: usize, z: usize, material: BlockTypeSize, edit_size: u32) {
        self.store.store_material(x, y, z, material, edit_size);
        self.mark_dirty();
        self.invalidate_mesh();
    }

    /// Axis-aligned bounds of the chunk in world units, as `(min, max)`.
    pub fn world_bounds(&self) -> (Point3<f32>, Point3<f32>) {
        chunk_world_bounds(self.position, self.lod)
    }
}

/// Axis-aligned world bounds of the chunk at `position` and `lod`, as `(min, max)`.
pub fn chunk_world_bounds(position: Point3<i32>, lod: u8) -> (Point3<f32>, Point3<f32>) {
    let extent = ((CHUNK_DIMENSION as i64) << lod) as f32;
    let min = Point3::new(
        position.x as f32 * extent,
        position.y as f32 * extent,
        position.z as f32 * extent,
    );
    let max = Point3::new(min.x + extent, min.y + extent, min.z + extent);
    (min, max)
}
