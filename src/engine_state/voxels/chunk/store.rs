//! The per-chunk material store.
//!
//! Every chunk owns one encoded octree behind its own mutex. All reads and writes of
//! that chunk go through this lock, and nothing else does: chunks never share a lock,
//! so workers touching different chunks never wait on each other.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::engine_state::voxels::block::block_side::BlockSide;
use crate::engine_state::voxels::block::{BlockRegistry, BlockTypeSize, AIR};
use crate::engine_state::voxels::error::ChunkLoadError;
use crate::engine_state::voxels::octree::{self, codec};

use super::chunk_creation::DenseGrid;
use super::light::{extract_light_sources, LightSource};
use super::{layer_voxel, LayerSlice, CHUNK_AREA, CHUNK_DIMENSION};

/// One chunk's encoded octree.
#[derive(Debug)]
pub struct ChunkStore {
    buffer: Mutex<Vec<u8>>,
}

impl Default for ChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStore {
    /// Creates an all-air store.
    pub fn new() -> Self {
        Self::filled(AIR)
    }

    /// Creates a store with every voxel set to `material`.
    pub fn filled(material: BlockTypeSize) -> Self {
        ChunkStore {
            buffer: Mutex::new(codec::homogeneous(material)),
        }
    }

    /// Compresses a dense grid.
    pub fn from_grid(grid: &DenseGrid) -> Self {
        ChunkStore {
            buffer: Mutex::new(octree::compress(grid)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reads one voxel. Coordinates must lie in `[0, S)`.
    pub fn get_material(&self, x: usize, y: usize, z: usize) -> BlockTypeSize {
        octree::get(&self.lock(), x, y, z)
    }

    /// Writes the aligned cube of side `2^edit_size` containing `(x, y, z)`.
    pub fn store_material(&self, x: usize, y: usize, z: usize, material: BlockTypeSize, edit_size: u32) {
        octree::set(&mut self.lock(), x, y, z, material, edit_size);
    }

    /// Materializes the whole chunk into `out`.
    pub fn decompress_into(&self, out: &mut DenseGrid) {
        octree::decompress_into(&self.lock(), out);
    }

    /// Materializes the whole chunk.
    pub fn decompress(&self) -> DenseGrid {
        octree::decompress(&self.lock())
    }

    /// Replaces the contents with the compressed form of `grid`.
    pub fn compress_from(&self, grid: &DenseGrid) {
        let encoded = octree::compress(grid);
        *self.lock() = encoded;
    }

    /// Replaces the contents with a disc linearization.
    ///
    /// On error the current contents are left untouched.
    pub fn load_from_disc(&self, bytes: &[u8]) -> Result<(), ChunkLoadError> {
        let buffer = octree::from_disc(bytes)?;
        *self.lock() = buffer;
        Ok(())
    }

    /// Replaces the contents with an in-memory buffer that has already been validated.
    pub(crate) fn replace_encoded(&self, buffer: Vec<u8>) {
        *self.lock() = buffer;
    }

    /// Disc linearization of the current contents.
    pub fn to_disc_bytes(&self) -> Vec<u8> {
        octree::to_disc(&self.lock())
    }

    /// One light source per homogeneous emitting region.
    pub fn extract_light_sources(&self, lod: u8, registry: &BlockRegistry) -> Vec<LightSource> {
        extract_light_sources(&self.lock(), lod, registry)
    }

    /// The `S×S` boundary layer on `side`, indexed `u + S*v` in the mesher's plane
    /// coordinates for that axis.
    pub fn face_slice(&self, side: BlockSide) -> LayerSlice {
        let layer = if side.is_positive() { CHUNK_DIMENSION - 1 } else { 0 };
        let axis = side.axis();
        let buffer = self.lock();

        let mut slice = vec![AIR; CHUNK_AREA];
        for v in 0..CHUNK_DIMENSION {
            for u in 0..CHUNK_DIMENSION {
                let (x, y, z) = layer_voxel(axis, layer, u, v);
                slice[u + CHUNK_DIMENSION * v] = octree::get(&buffer, x, y, z);
            }
        }
        slice
    }

    /// Size of the encoded octree in bytes.
    pub fn encoded_len(&self) -> usize {
        self.lock().len()
    }

    /// A copy of the encoded octree.
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::block_type::BlockType;

    const STONE: u8 = BlockType::STONE as u8;
    const SAND: u8 = BlockType::SAND as u8;

    #[test]
    fn point_writes_are_visible_to_point_reads_and_decompression() {
        let store = ChunkStore::new();
        store.store_material(3, 4, 5, STONE, 0);
        store.store_material(30, 1, 2, SAND, 1);

        assert_eq!(store.get_material(3, 4, 5), STONE);
        assert_eq!(store.get_material(31, 0, 3), SAND);
        let grid = store.decompress();
        assert_eq!(grid.count(STONE), 1);
        assert_eq!(grid.count(SAND), 8);
    }

    #[test]
    fn disc_bytes_reload_into_an_identical_store() {
        let mut grid = DenseGrid::new();
        grid.fill_cube(0, 0, 0, 8, STONE);
        grid.set(9, 9, 9, SAND);
        let store = ChunkStore::from_grid(&grid);

        let reloaded = ChunkStore::new();
        reloaded.load_from_disc(&store.to_disc_bytes()).expect("valid disc bytes");
        assert_eq!(reloaded.snapshot(), store.snapshot());
    }

    #[test]
    fn failed_loads_leave_the_store_untouched() {
        let store = ChunkStore::filled(STONE);
        assert!(store.load_from_disc(&[9, 9]).is_err());
        assert_eq!(store.snapshot(), codec::homogeneous(STONE));
    }

    #[test]
    fn face_slices_read_the_boundary_layer() {
        let store = ChunkStore::new();
        // +X boundary: u = z, v = y.
        store.store_material(CHUNK_DIMENSION - 1, 2, 7, STONE, 0);
        // -Y boundary: u = x, v = z.
        store.store_material(4, 0, 6, SAND, 0);

        let right = store.face_slice(BlockSide::RIGHT);
        assert_eq!(right[7 + CHUNK_DIMENSION * 2], STONE);
        assert_eq!(right.iter().filter(|&&m| m != AIR).count(), 1);

        let bottom = store.face_slice(BlockSide::BOTTOM);
        assert_eq!(bottom[4 + CHUNK_DIMENSION * 6], SAND);

        assert!(store.face_slice(BlockSide::LEFT).iter().all(|&m| m == AIR));
    }
}
