#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Octree Engine
//!
//! The data and visibility core of a voxel renderer: chunks stored as flattened
//! octrees, a bitmask greedy mesher, and chunk-level occlusion culling.
//!
//! ## Key Modules
//!
//! * `core` - Shared-ownership primitives used throughout the engine
//! * `engine_state` - The engine: world grid, tasks, meshing, culling and storage
//!
//! ## Architecture
//!
//! The engine follows a modular architecture with clear separation between:
//! * Voxel data management and persistence
//! * Mesh generation and caching
//! * Visibility culling
//! * Task scheduling and execution
//!
//! ## Usage
//!
//! ```ignore
//! fn main() {
//!     voxel_octree_engine::run();
//! }
//! ```
//!
//! ## Performance Considerations
//!
//! * Chunks compress to a handful of bytes when they are uniform
//! * Meshing works on 64-bit rows, one layer at a time
//! * Generation and meshing run on a pool of worker threads
//! * Only chunks reachable through open faces inside the frustum are drawn

use std::path::Path;

use cgmath::{Deg, Point3};
use log::{error, info};
use web_time::Instant;

use engine_state::{config::EngineConfig, EngineState};

pub mod core;
pub mod engine_state;

/// Configuration file read by `run`, relative to the working directory.
pub const CONFIG_PATH: &str = "voxel_engine.json";

/// Number of frames the headless fly-through lasts.
const FLY_THROUGH_FRAMES: u32 = 240;

/// Sets up `env_logger` the way the binary does: to stdout, filtered by `RUST_LOG`.
pub fn init_logging() {
    let mut log_builder = env_logger::Builder::new();
    let _ = log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .try_init();
}

/// Runs the engine headless: the viewer flies along +X over the terrain while the
/// pipeline generates and meshes the world around it.
pub fn run() {
    init_logging();
    info!("Logger initialized");

    let config = EngineConfig::load_or_default(Path::new(CONFIG_PATH));
    let mut engine_state = match EngineState::new(config) {
        Ok(engine_state) => engine_state,
        Err(err) => {
            error!("Could not start the engine: {}", err);
            return;
        }
    };

    let start = Instant::now();
    let mut drawn_vertices = 0u32;
    for frame in 0..FLY_THROUGH_FRAMES {
        let position = Point3::new(frame as f32 * 2.0, 48.0, 16.0);
        engine_state.update_viewer(position, Deg(0.0), Deg(-15.0));
        engine_state.process_tasks();

        let draws = engine_state.visible_meshes();
        drawn_vertices = draws
            .iter()
            .flat_map(|draw| draw.vertex_counts)
            .sum();
        if frame % 60 == 0 {
            info!(
                "Frame {}: {} visible meshes, {} opaque vertices, {} meshes cached",
                frame,
                draws.len(),
                drawn_vertices,
                engine_state.mesh_manager.get().len()
            );
        }
    }

    engine_state.drain();
    info!(
        "Fly-through finished in {:?}, {} opaque vertices in the last frame",
        start.elapsed(),
        drawn_vertices
    );
    engine_state.shutdown();
}
