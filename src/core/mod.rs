//! # Core Module
//!
//! Shared-ownership primitives used by the engine's subsystems.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking
//!
//! The world grid and the mesh cache are held in `MtResource`s: the main thread is
//! the only writer, while worker threads take short read locks to snapshot what
//! they need.

pub mod mt_resource;

pub use mt_resource::MtResource;
