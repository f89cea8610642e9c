//! Shared collaborators used by every chunk task.
//!
//! `ChunkServices` bundles what it takes to bring a chunk to life: the terrain
//! generator, the optional disc storage, the block registry and the connectivity
//! strategy. Workers hold it behind an `Arc`; nothing in it is mutable.

use std::io;
use std::sync::Arc;

use log::{debug, warn};

use crate::engine_state::config::{ConfigError, EngineConfig};
use crate::engine_state::rendering::culling::occlusion::ConnectivityStrategy;

use super::block::BlockRegistry;
use super::chunk::record::ChunkStorage;
use super::chunk::{Chunk, DenseGrid};
use super::error::GenerationError;
use super::generator::{DownsamplingGenerator, TerrainGenerator};

/// What every chunk task needs to load, generate and analyse a chunk.
pub struct ChunkServices {
    /// Produces chunks that were never stored.
    pub generator: Arc<dyn TerrainGenerator>,
    /// Disc storage; `None` keeps the world in memory only.
    pub storage: Option<ChunkStorage>,
    /// Material properties.
    pub registry: Arc<BlockRegistry>,
    /// Computes occlusion records.
    pub connectivity: Arc<dyn ConnectivityStrategy>,
}

impl ChunkServices {
    /// Builds the services described by a configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        let registry = match &config.block_registry {
            Some(path) => BlockRegistry::from_json(&std::fs::read_to_string(path)?)?,
            None => BlockRegistry::new(),
        };
        let mut generator = config.generator.build(config.seed);
        if config.downsample_lod && config.lod > 0 {
            generator = Arc::new(DownsamplingGenerator { inner: generator });
        }
        Ok(ChunkServices {
            generator,
            storage: config.save_directory.clone().map(ChunkStorage::new),
            registry: Arc::new(registry),
            connectivity: config.connectivity.build(),
        })
    }

    /// Loads or generates the chunk unless that has already happened.
    ///
    /// A stored record takes precedence over the generator. A stored record that fails
    /// to load is logged and the chunk is generated from scratch instead.
    ///
    /// # Returns
    /// `Ok(true)` if the chunk was populated by this call.
    pub fn ensure_generated(&self, chunk: &Chunk) -> Result<bool, GenerationError> {
        let populated = chunk.generate_with(|store| -> Result<(), GenerationError> {
            if let Some(buffer) = self.load_stored(chunk) {
                store.replace_encoded(buffer);
                return Ok(());
            }
            let grid = self.generator.generate(chunk.position, chunk.lod)?;
            store.compress_from(&grid);
            Ok(())
        })?;

        if populated {
            self.update_occlusion(chunk, &chunk.store.decompress());
            debug!(
                "Generated chunk {:?} (lod {}, {} bytes)",
                chunk.position,
                chunk.lod,
                chunk.store.encoded_len()
            );
        }
        Ok(populated)
    }

    fn load_stored(&self, chunk: &Chunk) -> Option<Vec<u8>> {
        let storage = self.storage.as_ref()?;
        match storage.load(chunk.position, chunk.lod) {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!(
                    "Discarding stored chunk {:?} (lod {}): {}; regenerating",
                    chunk.position, chunk.lod, err
                );
                None
            }
        }
    }

    /// Recomputes the chunk's occlusion record from its decompressed materials.
    pub fn update_occlusion(&self, chunk: &Chunk, grid: &DenseGrid) {
        chunk.set_occlusion(self.connectivity.compute(grid, &self.registry));
    }

    /// Writes the chunk to disc if it is dirty and persistence is enabled.
    ///
    /// # Returns
    /// `Ok(true)` if a record was written. On error the chunk stays dirty.
    pub fn flush(&self, chunk: &Chunk) -> io::Result<bool> {
        let Some(storage) = &self.storage else {
            return Ok(false);
        };
        if !chunk.take_dirty() {
            return Ok(false);
        }
        if let Err(err) = storage.save(chunk.position, chunk.lod, chunk.store.to_disc_bytes()) {
            chunk.mark_dirty();
            return Err(err);
        }
        Ok(true)
    }
}
