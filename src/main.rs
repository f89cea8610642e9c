//! # Voxel Octree Engine Entry Point
//!
//! Runs the headless fly-through from the library's `run()` function. Settings are read
//! from `voxel_engine.json` in the working directory when it exists.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release
//! ```

fn main() {
    voxel_octree_engine::run();
}
