//! # Octree Module
//!
//! Chunk voxels are stored as a sparse octree flattened into one byte buffer. There
//! are no heap references between nodes: children are located through byte offsets
//! stored in their parent, which lets the same bytes be written to disc with only a
//! re-shuffle of detail payloads.
//!
//! * `codec`: node layout, point reads and writes, bulk compression and decompression
//! * `disc`: validated conversion to and from the disc linearization

pub mod codec;
pub mod disc;

pub use codec::{compress, decompress, decompress_into, get, is_homogeneous, node_len, set};
pub use disc::{from_disc, to_disc};
