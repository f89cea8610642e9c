//! Encoding, lookup and in-place mutation of the flattened octree.
//!
//! A chunk's octree lives in one `Vec<u8>`. Nodes are written depth first and each
//! node is immediately followed by its subtree, so the only references a node needs
//! are the byte offsets of its children:
//!
//! | Node          | Bytes | Layout                                                    |
//! |---------------|-------|-----------------------------------------------------------|
//! | `Homogeneous` | 2     | tag, material                                             |
//! | `Detail`      | 65    | tag, 64 materials indexed `(x&3)<<4 \| (z&3)<<2 \| (y&3)` |
//! | `Splitter`    | 22+   | tag, 7 × 3-byte big-endian child offsets, 8 children      |
//!
//! Child 0 of a splitter always starts right after the 22-byte header; the stored
//! offsets for children 1 to 7 are measured from the splitter's first byte.
//!
//! A node at depth `d` covers a cube of side `2^(d+1)`. The root sits at depth
//! `CHUNK_SHIFT - 1`, splitters only exist at depth 2 or more and detail nodes only at
//! depth 1, so every lookup visits at most `CHUNK_SHIFT` nodes.

use crate::engine_state::voxels::block::BlockTypeSize;
use crate::engine_state::voxels::chunk::chunk_creation::DenseGrid;
use crate::engine_state::voxels::chunk::{CHUNK_DIMENSION, CHUNK_SHIFT};

/// Tag of a node whose whole cube has one material.
pub const TAG_HOMOGENEOUS: u8 = 0;
/// Tag of a 4x4x4 leaf stored voxel by voxel.
pub const TAG_DETAIL: u8 = 1;
/// Tag of an inner node with eight children.
pub const TAG_SPLITTER: u8 = 2;

/// Tag plus material.
pub const HOMOGENEOUS_LEN: usize = 2;
/// Tag plus one byte per voxel.
pub const DETAIL_LEN: usize = 1 + DETAIL_VOXELS;
/// Voxels in a detail leaf.
pub const DETAIL_VOXELS: usize = 64;
/// Tag plus the offsets of children 1 to 7; child 0 follows the header.
pub const SPLITTER_HEADER_LEN: usize = 1 + 7 * OFFSET_LEN;
/// Bytes in a big-endian child offset.
pub const OFFSET_LEN: usize = 3;

/// Depth of detail nodes (a 4×4×4 micro-grid).
pub const DETAIL_DEPTH: u32 = 1;
/// Depth of the root node.
pub const ROOT_DEPTH: u32 = CHUNK_SHIFT as u32 - 1;

/// Octant of `(x, y, z)` inside a splitter at `depth`.
#[inline]
pub fn child_index(x: usize, y: usize, z: usize, depth: u32) -> usize {
    ((y >> depth) & 1) << 2 | ((z >> depth) & 1) << 1 | ((x >> depth) & 1)
}

/// Minimum-corner offset of `child` relative to its parent, for a parent at `depth`.
#[inline]
pub fn child_origin(child: usize, depth: u32) -> (usize, usize, usize) {
    let half = 1 << depth;
    (
        (child & 1) * half,
        ((child >> 2) & 1) * half,
        ((child >> 1) & 1) * half,
    )
}

/// In-memory index of a voxel inside a detail node.
#[inline]
pub fn detail_index(x: usize, y: usize, z: usize) -> usize {
    (x & 3) << 4 | (z & 3) << 2 | (y & 3)
}

pub(crate) fn read_offset(buffer: &[u8], at: usize) -> usize {
    (buffer[at] as usize) << 16 | (buffer[at + 1] as usize) << 8 | buffer[at + 2] as usize
}

pub(crate) fn write_offset(buffer: &mut [u8], at: usize, offset: usize) {
    debug_assert!(offset < 1 << 24);
    buffer[at] = (offset >> 16) as u8;
    buffer[at + 1] = (offset >> 8) as u8;
    buffer[at + 2] = offset as u8;
}

#[inline]
fn offset_slot(splitter: usize, child: usize) -> usize {
    splitter + 1 + OFFSET_LEN * (child - 1)
}

/// Absolute byte position of `child` of the splitter at `splitter`.
pub fn child_position(buffer: &[u8], splitter: usize, child: usize) -> usize {
    if child == 0 {
        splitter + SPLITTER_HEADER_LEN
    } else {
        splitter + read_offset(buffer, offset_slot(splitter, child))
    }
}

/// Encoded length of the node starting at `pos`, including its subtree.
///
/// Only the chain of last children is followed, so this is `O(depth)`.
pub fn node_len(buffer: &[u8], pos: usize) -> usize {
    match buffer[pos] {
        TAG_HOMOGENEOUS => HOMOGENEOUS_LEN,
        TAG_DETAIL => DETAIL_LEN,
        _ => {
            let last = child_position(buffer, pos, 7);
            last - pos + node_len(buffer, last)
        }
    }
}

/// The encoding of a chunk filled with one material.
pub fn homogeneous(material: BlockTypeSize) -> Vec<u8> {
    vec![TAG_HOMOGENEOUS, material]
}

/// Reads the material of one voxel.
///
/// Coordinates must lie in `[0, S)`.
pub fn get(buffer: &[u8], x: usize, y: usize, z: usize) -> BlockTypeSize {
    debug_assert!(x < CHUNK_DIMENSION && y < CHUNK_DIMENSION && z < CHUNK_DIMENSION);
    let mut pos = 0;
    let mut depth = ROOT_DEPTH;
    loop {
        match buffer[pos] {
            TAG_HOMOGENEOUS => return buffer[pos + 1],
            TAG_DETAIL => return buffer[pos + 1 + detail_index(x, y, z)],
            _ => {
                pos = child_position(buffer, pos, child_index(x, y, z, depth));
                depth -= 1;
            }
        }
    }
}

/// Writes `material` over the aligned cube of side `2^edit_size` containing `(x, y, z)`.
///
/// Any subtree fully covered by the edit is replaced by a single homogeneous node without
/// being descended. After the write, every node on the path back to the root is checked
/// and collapsed if it became uniform, so the buffer stays in its canonical form.
pub fn set(buffer: &mut Vec<u8>, x: usize, y: usize, z: usize, material: BlockTypeSize, edit_size: u32) {
    debug_assert!(x < CHUNK_DIMENSION && y < CHUNK_DIMENSION && z < CHUNK_DIMENSION);
    set_node(buffer, 0, ROOT_DEPTH, x, y, z, material, edit_size);
}

/// Returns the change in encoded length of the node at `pos`.
#[allow(clippy::too_many_arguments)]
fn set_node(
    buffer: &mut Vec<u8>,
    pos: usize,
    depth: u32,
    x: usize,
    y: usize,
    z: usize,
    material: BlockTypeSize,
    edit_size: u32,
) -> isize {
    if edit_size > depth {
        if buffer[pos] == TAG_HOMOGENEOUS && buffer[pos + 1] == material {
            return 0;
        }
        let old_len = node_len(buffer, pos);
        buffer.splice(pos..pos + old_len, [TAG_HOMOGENEOUS, material]);
        return HOMOGENEOUS_LEN as isize - old_len as isize;
    }

    match buffer[pos] {
        TAG_HOMOGENEOUS => {
            let old = buffer[pos + 1];
            if old == material {
                return 0;
            }
            let expanded = expand(old, depth);
            let grown = expanded.len() as isize - HOMOGENEOUS_LEN as isize;
            buffer.splice(pos..pos + HOMOGENEOUS_LEN, expanded);
            grown + set_node(buffer, pos, depth, x, y, z, material, edit_size)
        }
        TAG_DETAIL => {
            let side = 1usize << edit_size;
            let mask = !(side - 1);
            let (bx, by, bz) = (x & mask, y & mask, z & mask);
            for dz in 0..side {
                for dy in 0..side {
                    for dx in 0..side {
                        buffer[pos + 1 + detail_index(bx + dx, by + dy, bz + dz)] = material;
                    }
                }
            }

            let payload = &buffer[pos + 1..pos + DETAIL_LEN];
            if payload.iter().all(|&m| m == material) {
                buffer.splice(pos..pos + DETAIL_LEN, [TAG_HOMOGENEOUS, material]);
                return HOMOGENEOUS_LEN as isize - DETAIL_LEN as isize;
            }
            0
        }
        _ => {
            let child = child_index(x, y, z, depth);
            let child_pos = child_position(buffer, pos, child);
            let delta = set_node(buffer, child_pos, depth - 1, x, y, z, material, edit_size);
            if delta != 0 {
                for later in child + 1..8 {
                    let slot = offset_slot(pos, later);
                    let shifted = read_offset(buffer, slot) as isize + delta;
                    write_offset(buffer, slot, shifted as usize);
                }
            }
            delta + try_collapse(buffer, pos)
        }
    }
}

/// The node a homogeneous node turns into before one of its voxels changes.
fn expand(material: BlockTypeSize, depth: u32) -> Vec<u8> {
    if depth <= DETAIL_DEPTH {
        let mut detail = Vec::with_capacity(DETAIL_LEN);
        detail.push(TAG_DETAIL);
        detail.extend(std::iter::repeat(material).take(DETAIL_VOXELS));
        return detail;
    }

    let mut splitter = vec![0u8; SPLITTER_HEADER_LEN + 8 * HOMOGENEOUS_LEN];
    splitter[0] = TAG_SPLITTER;
    for child in 1..8 {
        write_offset(
            &mut splitter,
            offset_slot(0, child),
            SPLITTER_HEADER_LEN + child * HOMOGENEOUS_LEN,
        );
    }
    for child in 0..8 {
        let at = SPLITTER_HEADER_LEN + child * HOMOGENEOUS_LEN;
        splitter[at] = TAG_HOMOGENEOUS;
        splitter[at + 1] = material;
    }
    splitter
}

/// Collapses the splitter at `pos` if all eight children are homogeneous with one material.
fn try_collapse(buffer: &mut Vec<u8>, pos: usize) -> isize {
    let first = pos + SPLITTER_HEADER_LEN;
    if buffer[first] != TAG_HOMOGENEOUS {
        return 0;
    }
    let material = buffer[first + 1];
    for child in 1..8 {
        let at = child_position(buffer, pos, child);
        if buffer[at] != TAG_HOMOGENEOUS || buffer[at + 1] != material {
            return 0;
        }
    }

    let old_len = SPLITTER_HEADER_LEN + 8 * HOMOGENEOUS_LEN;
    buffer.splice(pos..pos + old_len, [TAG_HOMOGENEOUS, material]);
    HOMOGENEOUS_LEN as isize - old_len as isize
}

/// The single material of a cubic region of the grid, if it has only one.
///
/// `depth` follows the node convention: the region's side is `2^(depth+1)`.
pub fn uniform_material(
    grid: &DenseGrid,
    origin_x: usize,
    origin_y: usize,
    origin_z: usize,
    depth: u32,
) -> Option<BlockTypeSize> {
    let side = 1usize << (depth + 1);
    let first = grid.get(origin_x, origin_y, origin_z);
    for z in origin_z..origin_z + side {
        for y in origin_y..origin_y + side {
            let row = DenseGrid::index(origin_x, y, z);
            if grid.as_slice()[row..row + side].iter().any(|&m| m != first) {
                return None;
            }
        }
    }
    Some(first)
}

/// Whether a cubic region of the grid holds a single material.
pub fn is_homogeneous(
    grid: &DenseGrid,
    origin_x: usize,
    origin_y: usize,
    origin_z: usize,
    depth: u32,
) -> bool {
    uniform_material(grid, origin_x, origin_y, origin_z, depth).is_some()
}

/// Encodes a dense grid.
///
/// The result is byte-identical to the buffer obtained by writing the same voxels one by
/// one with `set`, because both produce the canonical (fully collapsed) tree.
pub fn compress(grid: &DenseGrid) -> Vec<u8> {
    let mut out = Vec::new();
    compress_region(grid, 0, 0, 0, ROOT_DEPTH, &mut out);
    out
}

fn compress_region(
    grid: &DenseGrid,
    origin_x: usize,
    origin_y: usize,
    origin_z: usize,
    depth: u32,
    out: &mut Vec<u8>,
) {
    if let Some(material) = uniform_material(grid, origin_x, origin_y, origin_z, depth) {
        out.extend_from_slice(&[TAG_HOMOGENEOUS, material]);
        return;
    }

    if depth <= DETAIL_DEPTH {
        out.push(TAG_DETAIL);
        let start = out.len();
        out.resize(start + DETAIL_VOXELS, 0);
        for z in 0..4 {
            for y in 0..4 {
                for x in 0..4 {
                    out[start + detail_index(x, y, z)] =
                        grid.get(origin_x + x, origin_y + y, origin_z + z);
                }
            }
        }
        return;
    }

    let start = out.len();
    out.push(TAG_SPLITTER);
    out.resize(start + SPLITTER_HEADER_LEN, 0);
    for child in 0..8 {
        if child > 0 {
            let offset = out.len() - start;
            write_offset(out, offset_slot(start, child), offset);
        }
        let (dx, dy, dz) = child_origin(child, depth);
        compress_region(grid, origin_x + dx, origin_y + dy, origin_z + dz, depth - 1, out);
    }
}

/// Materializes the whole tree into `out`.
pub fn decompress_into(buffer: &[u8], out: &mut DenseGrid) {
    decompress_node(buffer, 0, ROOT_DEPTH, 0, 0, 0, out);
}

/// Materializes the whole tree into a fresh grid.
pub fn decompress(buffer: &[u8]) -> DenseGrid {
    let mut grid = DenseGrid::new();
    decompress_into(buffer, &mut grid);
    grid
}

fn decompress_node(
    buffer: &[u8],
    pos: usize,
    depth: u32,
    origin_x: usize,
    origin_y: usize,
    origin_z: usize,
    out: &mut DenseGrid,
) {
    match buffer[pos] {
        TAG_HOMOGENEOUS => {
            out.fill_cube(origin_x, origin_y, origin_z, 1 << (depth + 1), buffer[pos + 1]);
        }
        TAG_DETAIL => {
            for z in 0..4 {
                for y in 0..4 {
                    for x in 0..4 {
                        let material = buffer[pos + 1 + detail_index(x, y, z)];
                        out.set(origin_x + x, origin_y + y, origin_z + z, material);
                    }
                }
            }
        }
        _ => {
            for child in 0..8 {
                let (dx, dy, dz) = child_origin(child, depth);
                decompress_node(
                    buffer,
                    child_position(buffer, pos, child),
                    depth - 1,
                    origin_x + dx,
                    origin_y + dy,
                    origin_z + dz,
                    out,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::block_type::BlockType;
    use crate::engine_state::voxels::block::AIR;

    const STONE: u8 = BlockType::STONE as u8;
    const DIRT: u8 = BlockType::DIRT as u8;

    fn random_grid(rng: &mut fastrand::Rng, palette: &[u8]) -> DenseGrid {
        let mut grid = DenseGrid::new();
        for z in 0..CHUNK_DIMENSION {
            for y in 0..CHUNK_DIMENSION {
                for x in 0..CHUNK_DIMENSION {
                    grid.set(x, y, z, palette[rng.usize(..palette.len())]);
                }
            }
        }
        grid
    }

    /// Air with a few solid blobs, so that every node kind shows up.
    fn blobby_grid(rng: &mut fastrand::Rng) -> DenseGrid {
        let mut grid = DenseGrid::new();
        for _ in 0..6 {
            let side = 1 << rng.usize(0..4);
            let (x, y, z) = (
                rng.usize(..CHUNK_DIMENSION / side) * side,
                rng.usize(..CHUNK_DIMENSION / side) * side,
                rng.usize(..CHUNK_DIMENSION / side) * side,
            );
            grid.fill_cube(x, y, z, side, if rng.bool() { STONE } else { DIRT });
        }
        for _ in 0..20 {
            grid.set(
                rng.usize(..CHUNK_DIMENSION),
                rng.usize(..CHUNK_DIMENSION),
                rng.usize(..CHUNK_DIMENSION),
                STONE,
            );
        }
        grid
    }

    #[test]
    fn compress_then_decompress_returns_the_original_grid() {
        let mut rng = fastrand::Rng::with_seed(11);
        for _ in 0..4 {
            let grid = blobby_grid(&mut rng);
            assert_eq!(decompress(&compress(&grid)), grid);
        }
        let noisy = random_grid(&mut rng, &[AIR, STONE, DIRT]);
        assert_eq!(decompress(&compress(&noisy)), noisy);
    }

    #[test]
    fn get_agrees_with_the_dense_grid() {
        let mut rng = fastrand::Rng::with_seed(3);
        let grid = blobby_grid(&mut rng);
        let buffer = compress(&grid);
        for z in 0..CHUNK_DIMENSION {
            for y in 0..CHUNK_DIMENSION {
                for x in 0..CHUNK_DIMENSION {
                    assert_eq!(get(&buffer, x, y, z), grid.get(x, y, z));
                }
            }
        }
    }

    #[test]
    fn node_len_covers_the_whole_buffer() {
        let mut rng = fastrand::Rng::with_seed(5);
        let buffer = compress(&blobby_grid(&mut rng));
        assert_eq!(node_len(&buffer, 0), buffer.len());
    }

    #[test]
    fn writing_a_uniform_cube_voxel_by_voxel_matches_bulk_compression() {
        let mut buffer = homogeneous(AIR);
        for z in 0..CHUNK_DIMENSION {
            for y in 0..CHUNK_DIMENSION {
                for x in 0..CHUNK_DIMENSION {
                    set(&mut buffer, x, y, z, STONE, 0);
                }
            }
        }
        assert_eq!(buffer, compress(&DenseGrid::filled(STONE)));
        assert_eq!(buffer, vec![TAG_HOMOGENEOUS, STONE]);
    }

    #[test]
    fn incremental_writes_of_any_grid_match_bulk_compression() {
        let mut rng = fastrand::Rng::with_seed(19);
        let grid = blobby_grid(&mut rng);

        let mut buffer = homogeneous(AIR);
        for z in 0..CHUNK_DIMENSION {
            for y in 0..CHUNK_DIMENSION {
                for x in 0..CHUNK_DIMENSION {
                    set(&mut buffer, x, y, z, grid.get(x, y, z), 0);
                }
            }
        }
        assert_eq!(buffer, compress(&grid));
    }

    #[test]
    fn solid_stone_chunk_is_one_node_and_a_corner_edit_stays_logarithmic() {
        let mut buffer = compress(&DenseGrid::filled(STONE));
        assert_eq!(buffer, vec![TAG_HOMOGENEOUS, STONE]);

        set(&mut buffer, 0, 0, 0, AIR, 0);
        // One splitter per level above the detail level, seven homogeneous siblings
        // each, and one detail node at the bottom.
        let splitters = (ROOT_DEPTH - DETAIL_DEPTH) as usize;
        let expected = splitters * (SPLITTER_HEADER_LEN + 7 * HOMOGENEOUS_LEN) + DETAIL_LEN;
        assert_eq!(buffer.len(), expected);
        assert_eq!(get(&buffer, 0, 0, 0), AIR);
        assert_eq!(get(&buffer, 1, 0, 0), STONE);
        assert_eq!(get(&buffer, 31, 31, 31), STONE);

        set(&mut buffer, 0, 0, 0, STONE, 0);
        assert_eq!(buffer, vec![TAG_HOMOGENEOUS, STONE]);
    }

    #[test]
    fn covering_edits_replace_whole_subtrees() {
        let mut rng = fastrand::Rng::with_seed(23);
        let mut grid = random_grid(&mut rng, &[AIR, STONE]);
        let mut buffer = compress(&grid);

        // An 8×8×8 edit at depth 2 replaces that subtree outright.
        set(&mut buffer, 9, 17, 3, DIRT, 3);
        grid.fill_cube(8, 16, 0, 8, DIRT);
        assert_eq!(buffer, compress(&grid));

        // A 2×2×2 edit lands inside a detail node.
        set(&mut buffer, 5, 5, 5, AIR, 1);
        grid.fill_cube(4, 4, 4, 2, AIR);
        assert_eq!(buffer, compress(&grid));

        // A whole-chunk edit collapses everything.
        set(&mut buffer, 0, 0, 0, STONE, CHUNK_SHIFT as u32);
        assert_eq!(buffer, homogeneous(STONE));
    }

    #[test]
    fn homogeneous_regions_are_detected_by_depth() {
        let mut grid = DenseGrid::new();
        grid.fill_cube(0, 0, 0, 4, STONE);
        assert!(is_homogeneous(&grid, 0, 0, 0, 1));
        assert!(!is_homogeneous(&grid, 0, 0, 0, 2));
        assert!(is_homogeneous(&grid, 4, 0, 0, 1));
    }
}
