//! # Engine Configuration
//!
//! Every tunable of the engine lives in `EngineConfig`. It is read from a JSON file
//! in which every field is optional; missing fields keep their defaults.
//!
//! ```json
//! {
//!     "horizontal_render_distance": 6,
//!     "generator": "flat",
//!     "connectivity": "flood_fill",
//!     "save_directory": "saves/world1"
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine_state::rendering::culling::occlusion::ConnectivityKind;
use crate::engine_state::voxels::block::RegistryError;
use crate::engine_state::voxels::generator::{GeneratorKind, MAX_LOD};

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("could not read configuration: {0}")]
    Io(#[from] io::Error),

    /// The file is not valid configuration JSON.
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The block registry named by the configuration is invalid.
    #[error("invalid block registry: {0}")]
    Registry(#[from] RegistryError),
}

/// Perspective projection parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Viewport width in pixels.
    pub width: u32,
    /// Viewport height in pixels.
    pub height: u32,
    /// Vertical field of view.
    pub fovy_degrees: f32,
    /// Near plane.
    pub znear: f32,
    /// Far plane.
    pub zfar: f32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        ProjectionConfig {
            width: 1280,
            height: 720,
            fovy_degrees: 70.0,
            znear: 0.1,
            zfar: 1000.0,
        }
    }
}

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Chunks kept on each side of the viewer along X and Z.
    pub horizontal_render_distance: u32,
    /// Chunks kept above and below the viewer.
    pub vertical_render_distance: u32,
    /// Size of the worker pool for generation and meshing.
    pub worker_threads: usize,
    /// How many damping chunks the visibility traversal may cross.
    pub damping_budget: u32,
    /// Where chunk records are persisted. `None` disables persistence.
    pub save_directory: Option<PathBuf>,
    /// Optional JSON file overriding block properties.
    pub block_registry: Option<PathBuf>,
    /// Terrain generator for chunks that were never stored.
    pub generator: GeneratorKind,
    /// Seed for noise and random generators.
    pub seed: u32,
    /// How chunk occlusion records are computed.
    pub connectivity: ConnectivityKind,
    /// Level of detail of the resident world.
    pub lod: u8,
    /// Build chunks above LOD 0 by downsampling finer chunks instead of sampling the
    /// generator at a wider stride.
    pub downsample_lod: bool,
    /// Number of finished chunk meshes kept in memory.
    pub mesh_cache_capacity: usize,
    /// Camera projection.
    pub projection: ProjectionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            horizontal_render_distance: 4,
            vertical_render_distance: 2,
            worker_threads: 4,
            damping_budget: 3,
            save_directory: None,
            block_registry: None,
            generator: GeneratorKind::default(),
            seed: 0,
            connectivity: ConnectivityKind::default(),
            lod: 0,
            downsample_lod: true,
            mesh_cache_capacity: 512,
            projection: ProjectionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::from_json_str(&fs::read_to_string(path)?)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Like `load`, but falls back to the defaults if the file is missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                info!("No configuration at {}, using defaults", path.display());
                Self::default()
            }
            Err(err) => {
                warn!("Ignoring configuration at {}: {}", path.display(), err);
                Self::default()
            }
        }
    }

    /// Number of chunks meshed around the viewer: those within one chunk less than the
    /// render distance. The viewer's layer is meshed even with no vertical distance.
    pub fn meshed_chunk_count(&self) -> usize {
        let horizontal = 2 * (self.horizontal_render_distance as usize).saturating_sub(1) + 1;
        let vertical = 2 * (self.vertical_render_distance as usize).saturating_sub(1) + 1;
        horizontal * horizontal * vertical
    }

    /// Checks the values that would otherwise break the engine at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == 0 {
            return Err(ConfigError::Invalid("worker_threads must be at least 1".into()));
        }
        if self.horizontal_render_distance == 0 {
            return Err(ConfigError::Invalid(
                "horizontal_render_distance must be at least 1".into(),
            ));
        }
        if self.mesh_cache_capacity < self.meshed_chunk_count() {
            return Err(ConfigError::Invalid(format!(
                "mesh_cache_capacity must hold the {} chunks meshed around the viewer",
                self.meshed_chunk_count()
            )));
        }
        if self.lod > MAX_LOD {
            return Err(ConfigError::Invalid(format!("lod must be at most {MAX_LOD}")));
        }

        let projection = &self.projection;
        if projection.width == 0 || projection.height == 0 {
            return Err(ConfigError::Invalid("projection size must be positive".into()));
        }
        if !(projection.fovy_degrees > 0.0 && projection.fovy_degrees < 180.0) {
            return Err(ConfigError::Invalid("fovy_degrees must be in (0, 180)".into()));
        }
        if !(projection.znear > 0.0 && projection.zfar > projection.znear) {
            return Err(ConfigError::Invalid(
                "clip planes must satisfy 0 < znear < zfar".into(),
            ));
        }
        Ok(())
    }
}
