//! Mesh data structures for voxel rendering.
//!
//! A `Mesh` holds the packed faces of one chunk. Opaque faces are kept per side so the
//! renderer can skip the sides that face away from the viewer; see-through faces are
//! drawn in separate passes and are not split.

use crate::engine_state::voxels::{
    block::{block_side::BlockSide, BlockRegistry, RenderClass},
    chunk::{light::LightSource, DenseGrid},
};

use super::{face::PackedFace, greedy};

/// Vertices the renderer expands each face into (two triangles).
pub const VERTICES_PER_FACE: u32 = 6;

/// The faces of one chunk, bucketed by render class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Opaque faces, indexed by `BlockSide`.
    pub sides: [Vec<PackedFace>; 6],
    /// Water surfaces, drawn after the opaque pass.
    pub water: Vec<PackedFace>,
    /// Glass and other see-through faces.
    pub glass: Vec<PackedFace>,
    /// Light-emitting regions of the chunk, in chunk-local voxel units.
    pub light_sources: Vec<LightSource>,
}

impl Mesh {
    /// An empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Greedy-meshes every side of a chunk.
    ///
    /// # Arguments
    /// * `grid` - The chunk's decompressed materials
    /// * `neighbors` - Boundary layers of the six face-adjacent chunks
    /// * `registry` - Material properties
    pub fn greedy(grid: &DenseGrid, neighbors: &greedy::NeighborSlices, registry: &BlockRegistry) -> Self {
        greedy::greedy_sided(grid, neighbors, registry, &BlockSide::all())
    }

    /// Adds a face to the bucket of its render class.
    pub fn push(&mut self, class: RenderClass, face: PackedFace) {
        match class {
            RenderClass::Opaque => self.sides[face.side() as usize].push(face),
            RenderClass::Water => self.water.push(face),
            RenderClass::Glass => self.glass.push(face),
        }
    }

    /// Opaque faces on one side.
    pub fn side(&self, side: BlockSide) -> &[PackedFace] {
        &self.sides[side as usize]
    }

    /// Raw bytes of one side's faces, ready for upload.
    pub fn side_bytes(&self, side: BlockSide) -> &[u8] {
        bytemuck::cast_slice(self.side(side))
    }

    /// Vertex count of each side's opaque faces, indexed by `BlockSide`.
    pub fn vertex_counts(&self) -> [u32; 6] {
        let mut counts = [0; 6];
        for (count, faces) in counts.iter_mut().zip(self.sides.iter()) {
            *count = faces.len() as u32 * VERTICES_PER_FACE;
        }
        counts
    }

    /// Like `vertex_counts`, but sides missing from `visible_sides` count zero.
    pub fn vertex_counts_for(&self, visible_sides: &[BlockSide]) -> [u32; 6] {
        let mut counts = self.vertex_counts();
        for side in BlockSide::all() {
            if !visible_sides.contains(&side) {
                counts[side as usize] = 0;
            }
        }
        counts
    }

    /// Total number of faces over all buckets.
    pub fn face_count(&self) -> usize {
        self.sides.iter().map(Vec::len).sum::<usize>() + self.water.len() + self.glass.len()
    }

    /// Whether the mesh has no faces at all.
    pub fn is_empty(&self) -> bool {
        self.face_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faces_are_routed_by_render_class_and_side() {
        let mut mesh = Mesh::new();
        mesh.push(RenderClass::Opaque, PackedFace::new((0, 0, 0), 1, 1, BlockSide::TOP, 3));
        mesh.push(RenderClass::Opaque, PackedFace::new((1, 0, 0), 2, 1, BlockSide::TOP, 3));
        mesh.push(RenderClass::Water, PackedFace::new((0, 5, 0), 4, 4, BlockSide::TOP, 9));
        mesh.push(RenderClass::Glass, PackedFace::new((0, 0, 0), 1, 1, BlockSide::LEFT, 7));

        assert_eq!(mesh.vertex_counts(), [0, 0, 0, 12, 0, 0]);
        assert_eq!(mesh.face_count(), 4);
        assert_eq!(mesh.side_bytes(BlockSide::TOP).len(), 16);
        assert!(mesh.side(BlockSide::LEFT).is_empty());
    }

    #[test]
    fn hidden_sides_draw_no_vertices() {
        let mut mesh = Mesh::new();
        mesh.push(RenderClass::Opaque, PackedFace::new((0, 0, 0), 1, 1, BlockSide::TOP, 3));
        mesh.push(RenderClass::Opaque, PackedFace::new((0, 0, 0), 1, 1, BlockSide::LEFT, 3));
        mesh.push(RenderClass::Opaque, PackedFace::new((0, 0, 0), 1, 1, BlockSide::RIGHT, 3));

        // Looking along +X: right faces point away from the camera.
        let visible = BlockSide::get_visible_sides(cgmath::Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(mesh.vertex_counts_for(&visible), [0, 0, 0, 6, 6, 0]);
        assert_eq!(mesh.vertex_counts_for(&BlockSide::all()), mesh.vertex_counts());
    }
}
