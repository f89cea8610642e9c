//! Conversion between the in-memory octree and its disc linearization.
//!
//! The two layouts are identical except for the order of the 64 materials inside a
//! detail node: memory uses `(x, z, y)` and disc uses the legacy `(x, y, z)` order.
//! Swapping the two low 2-bit fields of the index converts in either direction.
//!
//! Loading validates the whole tree before anything is handed to a chunk, so a
//! damaged record is reported instead of being read as air.

use log::debug;

use crate::engine_state::voxels::error::ChunkLoadError;

use super::codec::{
    child_position, read_offset, DETAIL_DEPTH, DETAIL_LEN, DETAIL_VOXELS, HOMOGENEOUS_LEN,
    OFFSET_LEN, ROOT_DEPTH, SPLITTER_HEADER_LEN, TAG_DETAIL, TAG_HOMOGENEOUS, TAG_SPLITTER,
};

/// Maps a detail index between the memory and disc orders (self-inverse).
#[inline]
pub fn swap_detail_index(index: usize) -> usize {
    (index & 0x30) | (index & 0x3) << 2 | (index >> 2) & 0x3
}

fn swap_detail_order(payload: &mut [u8]) {
    debug_assert_eq!(payload.len(), DETAIL_VOXELS);
    let mut swapped = [0u8; DETAIL_VOXELS];
    for (index, &material) in payload.iter().enumerate() {
        swapped[swap_detail_index(index)] = material;
    }
    payload.copy_from_slice(&swapped);
}

/// Re-shuffles every detail payload in an already validated buffer.
fn swap_all_details(buffer: &mut [u8], pos: usize) {
    match buffer[pos] {
        TAG_HOMOGENEOUS => {}
        TAG_DETAIL => swap_detail_order(&mut buffer[pos + 1..pos + DETAIL_LEN]),
        _ => {
            for child in 0..8 {
                let at = child_position(buffer, pos, child);
                swap_all_details(buffer, at);
            }
        }
    }
}

/// Produces the disc linearization of an in-memory buffer.
pub fn to_disc(buffer: &[u8]) -> Vec<u8> {
    let mut disc = buffer.to_vec();
    swap_all_details(&mut disc, 0);
    disc
}

/// Validates a disc linearization and converts it to the in-memory layout.
///
/// # Returns
/// The in-memory buffer, or the first structural problem found:
/// an unknown tag, a truncated node, a node at a depth it may not appear at,
/// a child offset that does not match where the previous child ends, or bytes
/// left over after the root.
pub fn from_disc(bytes: &[u8]) -> Result<Vec<u8>, ChunkLoadError> {
    let end = validate_node(bytes, 0, ROOT_DEPTH)?;
    if end != bytes.len() {
        return Err(ChunkLoadError::TrailingBytes(bytes.len() - end));
    }

    let mut buffer = bytes.to_vec();
    swap_all_details(&mut buffer, 0);
    debug!("Loaded octree of {} bytes from disc", buffer.len());
    Ok(buffer)
}

fn require(bytes: &[u8], offset: usize, len: usize) -> Result<(), ChunkLoadError> {
    if offset + len > bytes.len() {
        return Err(ChunkLoadError::Truncated {
            offset,
            needed: offset + len - bytes.len(),
        });
    }
    Ok(())
}

/// Returns the end of the node starting at `pos`.
fn validate_node(bytes: &[u8], pos: usize, depth: u32) -> Result<usize, ChunkLoadError> {
    require(bytes, pos, 1)?;
    let tag = bytes[pos];
    match tag {
        TAG_HOMOGENEOUS => {
            require(bytes, pos, HOMOGENEOUS_LEN)?;
            Ok(pos + HOMOGENEOUS_LEN)
        }
        TAG_DETAIL => {
            if depth > DETAIL_DEPTH {
                return Err(ChunkLoadError::MisplacedNode { tag, depth, offset: pos });
            }
            require(bytes, pos, DETAIL_LEN)?;
            Ok(pos + DETAIL_LEN)
        }
        TAG_SPLITTER => {
            if depth <= DETAIL_DEPTH {
                return Err(ChunkLoadError::MisplacedNode { tag, depth, offset: pos });
            }
            require(bytes, pos, SPLITTER_HEADER_LEN)?;
            let mut end = pos + SPLITTER_HEADER_LEN;
            for child in 0..8 {
                if child > 0 {
                    let stored = read_offset(bytes, pos + 1 + OFFSET_LEN * (child - 1));
                    let expected = end - pos;
                    if stored != expected {
                        return Err(ChunkLoadError::BadOffset {
                            splitter: pos,
                            child,
                            stored,
                            expected,
                        });
                    }
                }
                end = validate_node(bytes, end, depth - 1)?;
            }
            Ok(end)
        }
        _ => Err(ChunkLoadError::InvalidTag { tag, offset: pos }),
    }
}
