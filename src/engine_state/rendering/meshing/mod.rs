//! Mesh generation and management for voxel rendering.
//!
//! # Architecture
//! - `mesh/`: the greedy mesher and the packed face format
//! - `MeshManager`: the finished meshes, kept in an LRU cache keyed by chunk position
//!
//! The renderer asks the manager for the meshes of the chunks the visibility pass
//! returned and draws, per side, only the faces that can face the viewer.

use std::num::NonZeroUsize;
use std::sync::Arc;

use cgmath::Point3;
use log::debug;
use lru::LruCache;

mod mesh;

pub use mesh::*;

/// One chunk's share of a frame: its mesh and how many vertices to draw per side.
#[derive(Debug, Clone)]
pub struct ChunkDraw {
    /// Chunk coordinates of the mesh.
    pub position: Point3<i32>,
    /// The cached mesh.
    pub mesh: Arc<Mesh>,
    /// Opaque vertex counts indexed by `BlockSide`; sides facing away are zero.
    pub vertex_counts: [u32; 6],
}

/// Keeps the most recently produced chunk meshes.
///
/// Meshes are shared as `Arc<Mesh>` so the renderer can hold on to one while a worker
/// replaces it.
pub struct MeshManager {
    least_recently_meshed_chunks: LruCache<Point3<i32>, Arc<Mesh>>,
}

impl MeshManager {
    /// Creates a manager holding at most `capacity` meshes (at least one).
    pub fn new(capacity: usize) -> Self {
        MeshManager {
            least_recently_meshed_chunks: LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            ),
        }
    }

    /// Stores the mesh of a chunk, replacing an older one.
    ///
    /// # Returns
    /// The position of the chunk whose mesh was pushed out to make room, if any.
    pub fn insert(&mut self, chunk_position: Point3<i32>, mesh: Mesh) -> Option<Point3<i32>> {
        match self
            .least_recently_meshed_chunks
            .push(chunk_position, Arc::new(mesh))
        {
            Some((evicted, _)) if evicted != chunk_position => {
                debug!("Mesh cache full, dropped mesh of chunk {:?}", evicted);
                Some(evicted)
            }
            _ => None,
        }
    }

    /// The mesh of a chunk, marking it as recently used.
    pub fn get(&mut self, chunk_position: Point3<i32>) -> Option<Arc<Mesh>> {
        self.least_recently_meshed_chunks.get(&chunk_position).cloned()
    }

    /// Checks if a chunk has a mesh, marking it as recently used.
    pub fn is_chunk_meshed(&mut self, chunk_position: Point3<i32>) -> bool {
        let meshed = self.least_recently_meshed_chunks.contains(&chunk_position);
        if meshed {
            self.least_recently_meshed_chunks.promote(&chunk_position);
        }
        meshed
    }

    /// Drops the meshes of unloaded chunks.
    ///
    /// # Returns
    /// How many meshes were removed.
    pub fn unload_chunk_positions(&mut self, chunk_positions: &[Point3<i32>]) -> usize {
        chunk_positions
            .iter()
            .filter(|&&position| self.least_recently_meshed_chunks.pop(&position).is_some())
            .count()
    }

    /// The meshes of the given chunks that are available, in the same order.
    pub fn meshes_for(&mut self, chunk_positions: &[Point3<i32>]) -> Vec<(Point3<i32>, Arc<Mesh>)> {
        chunk_positions
            .iter()
            .filter_map(|&position| self.get(position).map(|mesh| (position, mesh)))
            .collect()
    }

    /// Number of cached meshes.
    pub fn len(&self) -> usize {
        self.least_recently_meshed_chunks.len()
    }

    /// Whether no mesh is cached.
    pub fn is_empty(&self) -> bool {
        self.least_recently_meshed_chunks.is_empty()
    }

    /// Drops every mesh.
    pub fn clear(&mut self) {
        self.least_recently_meshed_chunks.clear();
    }
}
