//! # Engine State Module
//!
//! The core engine module that manages the state and functionality of the voxel engine.
//!
//! ## Key Components
//!
//! * `EngineState` - The main state container for the engine
//! * `camera_state` - Handles camera positioning and the viewer's chunk
//! * `config` - The JSON-backed engine configuration
//! * `rendering` - Meshing, the mesh cache and visibility culling
//! * `task_management` - Manages asynchronous tasks and worker threads
//! * `voxels` - Handles voxel data, chunks, storage and world generation
//!
//! ## Architecture
//!
//! `EngineState` is the central coordinator. It owns the camera and the task manager
//! and shares the world grid, the mesh cache and the chunk services with the workers.
//! Whenever the viewer enters a different chunk the pipeline restarts: pending work is
//! dropped and a fresh covering set of generation tasks is published around the viewer.

use std::sync::Arc;

use camera_state::{CameraState, CameraUpdates};
use cgmath::{Deg, Point3, Vector3};
use config::{ConfigError, EngineConfig};
use log::{debug, error, info, warn};
use rendering::{
    culling::visible_set,
    meshing::{ChunkDraw, MeshManager},
    tasks::chunk_mesh_generation_task::ChunkMeshGenerationTask,
};
use task_management::{
    task::{Task, TaskContext},
    TaskManager,
};
use voxels::{
    block::{block_side::BlockSide, BlockTypeSize},
    chunk::{world_to_chunk, Chunk, CHUNK_DIMENSION},
    error::GenerationError,
    services::ChunkServices,
    tasks::chunk_generation_task::ChunkGenerationTask,
    world::{SlotLookup, WorldGrid},
};

use crate::core::MtResource;

pub mod camera_state;
pub mod config;
pub mod rendering;
pub mod task_management;
pub mod voxels;

/// The main state container for the voxel engine
///
/// This struct maintains references to all major subsystems and coordinates
/// their interactions. It handles viewer movement, task management, edits
/// and visibility queries.
///
/// # Examples
///
/// ```ignore
/// let mut engine_state = EngineState::new(EngineConfig::default())?;
/// engine_state.update_viewer(Point3::new(8.0, 40.0, 8.0), Deg(0.0), Deg(-20.0));
/// loop {
///     engine_state.process_tasks();
///     let meshes = engine_state.visible_meshes();
///     // draw meshes...
/// }
/// ```
pub struct EngineState {
    /// Validated configuration the engine was built from.
    pub config: EngineConfig,
    /// The viewer.
    pub camera_state: CameraState,
    /// Worker pool running generation and meshing.
    pub task_manager: TaskManager,
    /// Resident chunks around the viewer
    pub world: MtResource<WorldGrid>,
    /// Finished meshes by chunk position
    pub mesh_manager: MtResource<MeshManager>,
    /// Shared with every task.
    pub services: Arc<ChunkServices>,
    /// Block faces that can currently face the camera
    pub visible_sides: Vec<BlockSide>,
    current_player_chunk_position: Option<Point3<i32>>,
}

impl EngineState {
    /// Creates a new engine from a configuration.
    ///
    /// No chunk is installed until the first call to `update_viewer`.
    ///
    /// # Errors
    /// Fails if the configuration is invalid or its block registry can't be loaded.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let services = ChunkServices::from_config(&config)?;
        Self::with_services(config, services)
    }

    /// Creates a new engine around already built chunk services.
    pub fn with_services(config: EngineConfig, services: ChunkServices) -> Result<Self, ConfigError> {
        config.validate()?;

        let services = Arc::new(services);
        let world = MtResource::new(WorldGrid::new(
            config.horizontal_render_distance,
            config.vertical_render_distance,
            config.lod,
        ));
        let mesh_manager = MtResource::new(MeshManager::new(config.mesh_cache_capacity));
        let context = TaskContext::new(world.clone(), mesh_manager.clone(), Arc::clone(&services));
        let task_manager = TaskManager::new(config.worker_threads, context);
        let camera_state = CameraState::new(&config);

        info!(
            "Engine ready: render distance {}x{}, lod {}, {} workers, persistence {}",
            config.horizontal_render_distance,
            config.vertical_render_distance,
            config.lod,
            config.worker_threads,
            if services.storage.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            config,
            camera_state,
            task_manager,
            world,
            mesh_manager,
            services,
            visible_sides: BlockSide::all().to_vec(),
            current_player_chunk_position: None,
        })
    }

    /// Processes completed and queued tasks
    ///
    /// This method should be called each frame to ensure that asynchronous
    /// tasks like chunk generation are processed.
    pub fn process_tasks(&mut self) {
        self.task_manager.process_completed_tasks();
        self.task_manager.process_queued_tasks();
    }

    /// Blocks until every published task, and everything they spawned, has completed.
    pub fn drain(&mut self) {
        self.task_manager.drain();
    }

    /// Moves and turns the viewer.
    ///
    /// # Returns
    /// `true` if the viewer entered a different chunk and the pipeline was restarted.
    pub fn update_viewer(&mut self, position: Point3<f32>, yaw: Deg<f32>, pitch: Deg<f32>) -> bool {
        let updates = self.camera_state.update(position, yaw, pitch);
        self.visible_sides = self.camera_state.visible_sides();

        match updates {
            Some(CameraUpdates {
                new_chunk_position, ..
            }) if self.current_player_chunk_position != Some(new_chunk_position) => {
                self.restart_pipeline(new_chunk_position);
                true
            }
            _ => false,
        }
    }

    /// The chunk the pipeline is currently centered on.
    pub fn viewer_chunk(&self) -> Option<Point3<i32>> {
        self.current_player_chunk_position
    }

    /// Drops pending work and publishes a fresh covering set around `viewer`.
    fn restart_pipeline(&mut self, viewer: Point3<i32>) {
        let dropped = self.task_manager.clear_queued_tasks();
        self.current_player_chunk_position = Some(viewer);

        let horizontal = self.config.horizontal_render_distance as i32;
        let vertical = self.config.vertical_render_distance as i32;
        let mesh_horizontal = horizontal - 1;
        // With no vertical distance only the viewer's layer is loaded; it is still meshed.
        let mesh_vertical = (vertical - 1).max(0);

        let mut covering = Vec::new();
        let mut evicted = Vec::new();
        {
            let mut world = self.world.get_mut();
            let lod = world.lod();
            for dz in -horizontal..=horizontal {
                for dy in -vertical..=vertical {
                    for dx in -horizontal..=horizontal {
                        let position = viewer + Vector3::new(dx, dy, dz);
                        let chunk = match world.lookup(position) {
                            SlotLookup::Resident(chunk) => chunk,
                            lookup => {
                                if let SlotLookup::Stale(old) = lookup {
                                    warn!(
                                        "Slot of chunk {:?} still holds chunk {:?}; evicting it",
                                        position, old.position
                                    );
                                    evicted.push(old);
                                }
                                let chunk = Arc::new(Chunk::new(position, lod));
                                world.install(Arc::clone(&chunk));
                                chunk
                            }
                        };
                        let mesh_after = dx.abs() <= mesh_horizontal
                            && dz.abs() <= mesh_horizontal
                            && dy.abs() <= mesh_vertical;
                        covering.push((Vector3::new(dx, dy, dz), chunk, mesh_after));
                    }
                }
            }
        }

        self.release(&evicted);

        // Only the inner chunks keep meshes, so the cache never has to push one of them out.
        let outer: Vec<Point3<i32>> = covering
            .iter()
            .filter(|(_, _, mesh_after)| !mesh_after)
            .map(|(_, chunk, _)| {
                chunk.invalidate_mesh();
                chunk.position
            })
            .collect();
        let unloaded = self.mesh_manager.get_mut().unload_chunk_positions(&outer);
        if unloaded > 0 {
            debug!("Dropped {} meshes outside the mesh radius", unloaded);
        }

        // Nearest chunks first.
        covering.sort_by_key(|(offset, _, _)| offset.x * offset.x + offset.y * offset.y + offset.z * offset.z);
        let published = covering.len();
        for (_, chunk, mesh_after) in covering {
            self.task_manager.publish_task(Box::new(ChunkGenerationTask::new(
                chunk,
                Arc::clone(&self.services),
                mesh_after,
            )));
        }

        info!(
            "Viewer entered chunk {:?}: dropped {} queued tasks, evicted {} chunks, published {}",
            viewer,
            dropped,
            evicted.len(),
            published
        );
    }

    /// Writes back and unloads chunks that left the world.
    fn release(&self, chunks: &[Arc<Chunk>]) {
        for chunk in chunks {
            if let Err(err) = self.services.flush(chunk) {
                error!("Failed to write chunk {:?} to disc: {}", chunk.position, err);
            }
        }
        let positions: Vec<Point3<i32>> = chunks.iter().map(|chunk| chunk.position).collect();
        let unloaded = self.mesh_manager.get_mut().unload_chunk_positions(&positions);
        if unloaded > 0 {
            debug!("Unloaded {} meshes of evicted chunks", unloaded);
        }
    }

    /// Splits a world voxel position into the resident chunk holding it and local coordinates.
    fn locate(&self, world_position: Point3<i32>) -> Option<(Arc<Chunk>, (usize, usize, usize))> {
        let world = self.world.get();
        let lod = world.lod();
        let voxel = Point3::new(
            world_position.x >> lod,
            world_position.y >> lod,
            world_position.z >> lod,
        );
        let (chunk_position, local) = world_to_chunk(voxel);
        world.get(chunk_position).map(|chunk| (chunk, local))
    }

    /// Reads the material at a world position.
    ///
    /// # Returns
    /// `None` if the chunk holding it is not resident or not generated yet.
    pub fn get_voxel(&self, world_position: Point3<i32>) -> Option<BlockTypeSize> {
        let (chunk, (x, y, z)) = self.locate(world_position)?;
        if !chunk.is_generated() {
            return None;
        }
        Some(chunk.store.get_material(x, y, z))
    }

    /// Writes `material` over the aligned cube of side `2^edit_size` voxels containing
    /// `world_position`.
    ///
    /// The chunk is generated first if needed so the edit is not overwritten later. Its
    /// occlusion record is refreshed right away and mesh tasks are published for it and
    /// for every neighbour whose boundary the edit touches.
    ///
    /// # Returns
    /// `Ok(false)` if the position lies outside the resident world.
    pub fn set_voxel(
        &mut self,
        world_position: Point3<i32>,
        material: BlockTypeSize,
        edit_size: u32,
    ) -> Result<bool, GenerationError> {
        let Some((chunk, (x, y, z))) = self.locate(world_position) else {
            debug!("Ignoring edit at {:?} outside the resident world", world_position);
            return Ok(false);
        };
        let edit_size = edit_size.min(CHUNK_DIMENSION.trailing_zeros());

        self.services.ensure_generated(&chunk)?;
        chunk.edit(x, y, z, material, edit_size);
        self.services.update_occlusion(&chunk, &chunk.store.decompress());

        let side = 1usize << edit_size;
        let min = (x & !(side - 1), y & !(side - 1), z & !(side - 1));
        let max = (min.0 + side - 1, min.1 + side - 1, min.2 + side - 1);

        let mut remesh = vec![Arc::clone(&chunk)];
        {
            let world = self.world.get();
            for block_side in BlockSide::all() {
                let touches = match block_side {
                    BlockSide::LEFT => min.0 == 0,
                    BlockSide::RIGHT => max.0 == CHUNK_DIMENSION - 1,
                    BlockSide::BOTTOM => min.1 == 0,
                    BlockSide::TOP => max.1 == CHUNK_DIMENSION - 1,
                    BlockSide::BACK => min.2 == 0,
                    BlockSide::FRONT => max.2 == CHUNK_DIMENSION - 1,
                };
                if !touches {
                    continue;
                }
                // Neighbours that were never meshed will read the new boundary when they are.
                if let Some(neighbor) = world.get(block_side.neighbor_of(chunk.position)) {
                    if neighbor.is_meshed() {
                        neighbor.invalidate_mesh();
                        remesh.push(neighbor);
                    }
                }
            }
        }

        debug!(
            "Edited {:?} in chunk {:?}; re-meshing {} chunks",
            world_position,
            chunk.position,
            remesh.len()
        );
        for chunk in remesh {
            let task: Box<dyn Task + Send> = Box::new(ChunkMeshGenerationTask::new(
                chunk,
                self.world.clone(),
                Arc::clone(&self.services),
            ));
            self.task_manager.publish_task(task);
        }
        Ok(true)
    }

    /// Chunk positions visible from the camera, in traversal order.
    pub fn visible_chunks(&self) -> Vec<Point3<i32>> {
        let frustum = self.camera_state.frustum();
        let viewer = self.camera_state.chunk_position();
        visible_set(&self.world.get(), viewer, &frustum, self.config.damping_budget)
    }

    /// The cached meshes of the visible chunks, ready to be drawn.
    ///
    /// Opaque sides that can't face the camera are given a vertex count of zero.
    pub fn visible_meshes(&self) -> Vec<ChunkDraw> {
        let visible = self.visible_chunks();
        self.mesh_manager
            .get_mut()
            .meshes_for(&visible)
            .into_iter()
            .map(|(position, mesh)| ChunkDraw {
                position,
                vertex_counts: mesh.vertex_counts_for(&self.visible_sides),
                mesh,
            })
            .collect()
    }

    /// Writes every dirty resident chunk to disc.
    ///
    /// # Returns
    /// How many chunks were written. Failures are logged and the chunk stays dirty.
    pub fn flush_dirty(&self) -> usize {
        let chunks: Vec<Arc<Chunk>> = self.world.get().iter().cloned().collect();
        let mut written = 0;
        for chunk in chunks {
            match self.services.flush(&chunk) {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(err) => error!("Failed to write chunk {:?} to disc: {}", chunk.position, err),
            }
        }
        if written > 0 {
            info!("Flushed {} dirty chunks", written);
        }
        written
    }

    /// Stops the workers, writes dirty chunks back and unloads the world.
    pub fn shutdown(&mut self) {
        self.task_manager.shutdown();
        self.flush_dirty();
        let unloaded = self.world.get_mut().clear();
        self.mesh_manager.get_mut().clear();
        self.current_player_chunk_position = None;
        info!("Engine stopped, unloaded {} chunks", unloaded.len());
    }
}
