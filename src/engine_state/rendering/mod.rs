//! Rendering-side processing for the voxel engine.
//!
//! Everything here runs without a GPU: meshes are produced as packed faces ready for
//! upload, and culling decides which chunks' meshes would be drawn for a frame.
//!
//! - `meshing`: greedy mesher and the LRU cache of finished meshes
//! - `culling`: frustum planes, occlusion records and the visibility traversal
//! - `tasks`: background mesh generation

pub mod culling;
pub mod meshing;
pub mod tasks;

pub use meshing::MeshManager;
