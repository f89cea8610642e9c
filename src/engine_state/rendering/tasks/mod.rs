//! Background work of the rendering side.
//!
//! Meshing a chunk decompresses it and reads the boundary layers of six neighbours,
//! so it runs on the worker pool rather than on the main thread.
//!
//! # Available Tasks
//! - `ChunkMeshGenerationTask`: greedy-meshes one chunk and refreshes its occlusion record

pub mod chunk_mesh_generation_task;
