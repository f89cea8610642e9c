//! Mesh generation for voxel rendering.
//!
//! Converts a chunk's decompressed materials into packed faces with greedy meshing,
//! merging coplanar faces of the same material into rectangles.
//!
//! # Architecture
//! - [`Mesh`]: the faces of one chunk, bucketed by render class and side
//! - [`PackedFace`]: one rectangle, packed into two `u32`s
//! - [`greedy_sided`]: the mesher itself

mod face;
mod greedy;
mod mesh;

pub use face::PackedFace;
pub use greedy::{greedy_rectangles, greedy_sided, NeighborSlices, Rectangle};
pub use mesh::*;
