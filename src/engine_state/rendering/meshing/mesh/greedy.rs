//! Greedy meshing implementation for voxel rendering.
//!
//! Each side is meshed one layer at a time. A layer becomes a bitmask with one `u64`
//! row per `v` coordinate, where bit `u` says the voxel needs a face on that side. The
//! mask is then covered by rectangles of a single material: start at the lowest set
//! bit, grow along `u`, then grow along `v` while the whole row span stays set, and
//! clear what was taken. Every set bit is consumed exactly once.

use crate::engine_state::voxels::{
    block::{block_side::{Axis, BlockSide}, BlockRegistry, BlockTypeSize, AIR},
    chunk::{layer_voxel, DenseGrid, LayerSlice, CHUNK_AREA, CHUNK_DIMENSION},
};

use super::{face::PackedFace, mesh::Mesh};

/// The boundary layer of each face-adjacent chunk, indexed by the side it touches.
///
/// `neighbors[s]` is the layer of the chunk across side `s` that touches this chunk,
/// in the plane coordinates of `s`'s axis. A missing neighbour reads as air.
pub type NeighborSlices = [Option<LayerSlice>; 6];

/// A rectangle of set bits found in a layer mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rectangle {
    /// Lowest coordinate along the layer's first axis.
    pub u: usize,
    /// Lowest coordinate along the layer's second axis.
    pub v: usize,
    /// Extent along `u`.
    pub width: usize,
    /// Extent along `v`.
    pub height: usize,
    /// Material of every voxel in the rectangle.
    pub material: BlockTypeSize,
}

/// Bits `start..start + width` of a row.
#[inline]
fn span_mask(start: usize, width: usize) -> u64 {
    let bits = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
    bits << start
}

/// Covers every set bit of `rows` with single-material rectangles and clears them.
///
/// # Arguments
/// * `rows` - One bitmask per `v`; bit `u` marks a cell that needs a face
/// * `materials` - The material of each cell, indexed `u + S*v`
/// * `emit` - Called once per rectangle, in scan order
pub fn greedy_rectangles(
    rows: &mut [u64; CHUNK_DIMENSION],
    materials: &[BlockTypeSize],
    mut emit: impl FnMut(Rectangle),
) {
    for v in 0..CHUNK_DIMENSION {
        while rows[v] != 0 {
            let u = rows[v].trailing_zeros() as usize;
            let material = materials[u + CHUNK_DIMENSION * v];

            let mut width = 1;
            while u + width < CHUNK_DIMENSION
                && rows[v] & (1u64 << (u + width)) != 0
                && materials[u + width + CHUNK_DIMENSION * v] == material
            {
                width += 1;
            }

            let span = span_mask(u, width);
            let mut height = 1;
            while v + height < CHUNK_DIMENSION {
                let row = v + height;
                let start = CHUNK_DIMENSION * row + u;
                if rows[row] & span != span
                    || materials[start..start + width].iter().any(|&m| m != material)
                {
                    break;
                }
                height += 1;
            }

            for row in &mut rows[v..v + height] {
                *row &= !span;
            }
            emit(Rectangle {
                u,
                v,
                width,
                height,
                material,
            });
        }
    }
}

/// Copies layer `layer` perpendicular to `axis` into `out`, indexed `u + S*v`.
fn read_layer(grid: &DenseGrid, axis: Axis, layer: usize, out: &mut [BlockTypeSize]) {
    for v in 0..CHUNK_DIMENSION {
        for u in 0..CHUNK_DIMENSION {
            let (x, y, z) = layer_voxel(axis, layer, u, v);
            out[u + CHUNK_DIMENSION * v] = grid.get(x, y, z);
        }
    }
}

/// The layer next to `layer` in the direction of `side`, if it is inside the chunk.
fn adjacent_layer(side: BlockSide, layer: usize) -> Option<usize> {
    if side.is_positive() {
        (layer + 1 < CHUNK_DIMENSION).then_some(layer + 1)
    } else {
        layer.checked_sub(1)
    }
}

/// Meshes the given sides of a chunk.
///
/// # Arguments
/// * `grid` - The chunk's decompressed materials
/// * `neighbors` - Boundary layers of the face-adjacent chunks
/// * `registry` - Decides which faces are hidden and where each face is drawn
/// * `sides` - The sides to produce faces for
pub fn greedy_sided(
    grid: &DenseGrid,
    neighbors: &NeighborSlices,
    registry: &BlockRegistry,
    sides: &[BlockSide],
) -> Mesh {
    let mut mesh = Mesh::new();
    let mut own = vec![AIR; CHUNK_AREA];
    let mut next = vec![AIR; CHUNK_AREA];
    let mut rows = [0u64; CHUNK_DIMENSION];

    for &side in sides {
        let axis = side.axis();
        for layer in 0..CHUNK_DIMENSION {
            read_layer(grid, axis, layer, &mut own);
            let adjacent: &[BlockTypeSize] = match adjacent_layer(side, layer) {
                Some(next_layer) => {
                    read_layer(grid, axis, next_layer, &mut next);
                    &next
                }
                None => match &neighbors[side as usize] {
                    Some(slice) => {
                        debug_assert_eq!(slice.len(), CHUNK_AREA);
                        slice
                    }
                    None => {
                        next.fill(AIR);
                        &next
                    }
                },
            };

            for (v, row) in rows.iter_mut().enumerate() {
                *row = 0;
                for u in 0..CHUNK_DIMENSION {
                    let index = u + CHUNK_DIMENSION * v;
                    if registry.needs_face(own[index], adjacent[index]) {
                        *row |= 1u64 << u;
                    }
                }
            }

            greedy_rectangles(&mut rows, &own, |rect| {
                let face = PackedFace::new(
                    layer_voxel(axis, layer, rect.u, rect.v),
                    rect.width,
                    rect.height,
                    side,
                    registry.texture_index(rect.material, side),
                );
                mesh.push(registry.render_class(rect.material), face);
            });
        }
    }

    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::block_type::BlockType;

    const STONE: u8 = BlockType::STONE as u8;
    const GRASS: u8 = BlockType::GRASS as u8;
    const GLASS: u8 = BlockType::GLASS as u8;
    const WATER: u8 = BlockType::WATER as u8;

    fn no_neighbors() -> NeighborSlices {
        Default::default()
    }

    /// Inverse of `layer_voxel`: `(layer, u, v)`.
    fn plane_coordinates(axis: Axis, (x, y, z): (usize, usize, usize)) -> (usize, usize, usize) {
        match axis {
            Axis::X => (x, z, y),
            Axis::Y => (y, x, z),
            Axis::Z => (z, x, y),
        }
    }

    fn all_faces(mesh: &Mesh) -> Vec<PackedFace> {
        let mut faces: Vec<PackedFace> = mesh.sides.iter().flatten().copied().collect();
        faces.extend(mesh.water.iter().copied());
        faces.extend(mesh.glass.iter().copied());
        faces
    }

    #[test]
    fn adjacent_grass_columns_merge_into_one_top_face() {
        let mut grid = DenseGrid::new();
        for z in 0..4 {
            for x in 0..8 {
                for y in 0..3 {
                    grid.set(x, y, z, GRASS);
                }
            }
        }

        let mesh = Mesh::greedy(&grid, &no_neighbors(), &BlockRegistry::new());
        let top = &mesh.sides[BlockSide::TOP as usize];
        assert_eq!(top.len(), 1);
        assert_eq!((top[0].size1(), top[0].size2()), (8, 4));
        assert_eq!(top[0].position(), (0, 2, 0));
    }

    #[test]
    fn emitted_faces_rasterize_to_the_naive_face_test() {
        let registry = BlockRegistry::new();
        let palette = [AIR, AIR, STONE, STONE, GRASS, GLASS, WATER];
        let mut rng = fastrand::Rng::with_seed(7);
        let mut grid = DenseGrid::new();
        for z in 0..CHUNK_DIMENSION {
            for y in 0..CHUNK_DIMENSION {
                for x in 0..CHUNK_DIMENSION {
                    grid.set(x, y, z, palette[rng.usize(..palette.len())]);
                }
            }
        }

        let mesh = Mesh::greedy(&grid, &no_neighbors(), &registry);
        let mut covered = vec![[false; 6]; grid.as_slice().len()];
        for face in all_faces(&mesh) {
            let side = face.side();
            let axis = side.axis();
            let (layer, u0, v0) = plane_coordinates(axis, face.position());
            for dv in 0..face.size2() {
                for du in 0..face.size1() {
                    let (x, y, z) = layer_voxel(axis, layer, u0 + du, v0 + dv);
                    let cell = &mut covered[DenseGrid::index(x, y, z)][side as usize];
                    assert!(!*cell, "face at {:?} on {:?} emitted twice", (x, y, z), side);
                    *cell = true;
                    assert_eq!(registry.texture_index(grid.get(x, y, z), side) as u32, face.texture_index());
                }
            }
        }

        for z in 0..CHUNK_DIMENSION {
            for y in 0..CHUNK_DIMENSION {
                for x in 0..CHUNK_DIMENSION {
                    for side in BlockSide::all() {
                        let n = side.normal();
                        let (nx, ny, nz) = (x as i32 + n.x, y as i32 + n.y, z as i32 + n.z);
                        let inside = |c: i32| (0..CHUNK_DIMENSION as i32).contains(&c);
                        let adjacent = if inside(nx) && inside(ny) && inside(nz) {
                            grid.get(nx as usize, ny as usize, nz as usize)
                        } else {
                            AIR
                        };
                        assert_eq!(
                            covered[DenseGrid::index(x, y, z)][side as usize],
                            registry.needs_face(grid.get(x, y, z), adjacent),
                            "voxel {:?} side {:?}",
                            (x, y, z),
                            side
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn rectangles_cannot_be_grown_past_unconsumed_cells() {
        let mut rng = fastrand::Rng::with_seed(11);
        let materials: Vec<u8> = (0..CHUNK_AREA).map(|_| rng.u8(1..3)).collect();
        let mut rows = [0u64; CHUNK_DIMENSION];
        for row in rows.iter_mut() {
            *row = (rng.u64(..) | rng.u64(..)) & (u64::MAX >> (64 - CHUNK_DIMENSION));
        }
        let original = rows;
        let set = |u: usize, v: usize| original[v] & (1u64 << u) != 0;

        let mut rectangles = Vec::new();
        greedy_rectangles(&mut rows, &materials, |rect| rectangles.push(rect));
        assert!(rows.iter().all(|&row| row == 0));

        let mut owner = vec![usize::MAX; CHUNK_AREA];
        for (i, rect) in rectangles.iter().enumerate() {
            for v in rect.v..rect.v + rect.height {
                for u in rect.u..rect.u + rect.width {
                    assert!(set(u, v));
                    assert_eq!(owner[u + CHUNK_DIMENSION * v], usize::MAX);
                    assert_eq!(materials[u + CHUNK_DIMENSION * v], rect.material);
                    owner[u + CHUNK_DIMENSION * v] = i;
                }
            }
        }

        let mergeable = |u: usize, v: usize, material: u8| {
            u < CHUNK_DIMENSION && v < CHUNK_DIMENSION && set(u, v) && materials[u + CHUNK_DIMENSION * v] == material
        };
        for (i, rect) in rectangles.iter().enumerate() {
            let right = (rect.u + rect.width, rect.v);
            if mergeable(right.0, right.1, rect.material) {
                assert!(owner[right.0 + CHUNK_DIMENSION * right.1] < i, "rectangle {i} stopped early along u");
            }
            let below = rect.v + rect.height;
            if (rect.u..rect.u + rect.width).all(|u| mergeable(u, below, rect.material)) {
                assert!(
                    (rect.u..rect.u + rect.width).any(|u| owner[u + CHUNK_DIMENSION * below] < i),
                    "rectangle {i} stopped early along v"
                );
            }
        }
    }

    #[test]
    fn full_rows_form_a_single_rectangle() {
        let mut rows = [u64::MAX >> (64 - CHUNK_DIMENSION); CHUNK_DIMENSION];
        let materials = vec![STONE; CHUNK_AREA];
        let mut rectangles = Vec::new();
        greedy_rectangles(&mut rows, &materials, |rect| rectangles.push(rect));
        assert_eq!(
            rectangles,
            vec![Rectangle {
                u: 0,
                v: 0,
                width: CHUNK_DIMENSION,
                height: CHUNK_DIMENSION,
                material: STONE,
            }]
        );
    }

    #[test]
    fn opaque_neighbours_hide_boundary_faces() {
        let registry = BlockRegistry::new();
        let grid = DenseGrid::filled(STONE);

        let open = Mesh::greedy(&grid, &no_neighbors(), &registry);
        assert_eq!(open.vertex_counts(), [6; 6]);

        let mut neighbors = no_neighbors();
        for slice in neighbors.iter_mut() {
            *slice = Some(vec![STONE; CHUNK_AREA]);
        }
        let closed = Mesh::greedy(&grid, &neighbors, &registry);
        assert!(closed.is_empty());
    }

    #[test]
    fn see_through_materials_go_to_their_own_buckets() {
        let registry = BlockRegistry::new();
        let mut grid = DenseGrid::new();
        grid.fill_cube(0, 0, 0, 2, GLASS);
        grid.fill_cube(4, 0, 0, 2, WATER);

        let mesh = Mesh::greedy(&grid, &no_neighbors(), &registry);
        assert!(mesh.sides.iter().all(Vec::is_empty));
        // Identical self-occluding neighbours merge, so each cube shows one face per side.
        assert_eq!(mesh.glass.len(), 6);
        assert_eq!(mesh.water.len(), 6);
    }
}
