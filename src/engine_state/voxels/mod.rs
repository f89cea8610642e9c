//! # Voxel World
//!
//! This module contains the data side of the engine: how voxels are described, stored,
//! generated and persisted.
//!
//! ## Architecture
//!
//! * **Block**: Material ids, block sides and the registry of per-material properties
//! * **Chunk**: A 32x32x32 cube of voxels stored as a flattened octree
//! * **Octree**: The in-memory codec and the self-describing disc format
//! * **World**: The slot table of resident chunks around the viewer
//! * **Services**: Generation, persistence and occlusion shared by the tasks
//! * **Tasks**: Background chunk generation
//!
//! ## Data Flow
//!
//! 1. The engine installs empty chunks for the cube around the viewer
//! 2. Generation tasks load them from disc or run the terrain generator
//! 3. Generated chunks near the viewer are handed to mesh tasks
//! 4. Edits mark chunks dirty; dirty chunks are written back when evicted or flushed
//!
//! ## Thread Safety
//!
//! Each chunk store serializes its own reads and writes. The world grid is only
//! mutated by the main thread; workers clone out the chunks they need.

pub mod block;
pub mod chunk;
pub mod error;
pub mod generator;
pub mod octree;
pub mod services;
pub mod structure;
pub mod tasks;
pub mod world;
