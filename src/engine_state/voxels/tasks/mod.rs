//! # Voxel Task System
//!
//! Tasks related to bringing chunks into existence. They run on the worker pool so the
//! main thread never waits on terrain generation or disc reads.

pub mod chunk_generation_task;
