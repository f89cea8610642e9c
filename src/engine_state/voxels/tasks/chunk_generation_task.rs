//! # Chunk Generation Task
//!
//! This module defines the `ChunkGenerationTask` which loads or generates one chunk on
//! a worker thread. It is published for every chunk of the covering set whenever the
//! pipeline restarts.

use std::sync::Arc;

use log::{debug, warn};

use crate::engine_state::{
    rendering::tasks::chunk_mesh_generation_task::ChunkMeshGenerationTask,
    task_management::task::{Task, TaskContext, TaskResult},
    voxels::{chunk::Chunk, error::GenerationError, services::ChunkServices},
};

/// A task that brings a resident chunk's materials into existence.
///
/// This task is responsible for:
/// 1. Loading the chunk from disc, or generating it if it was never stored
/// 2. Computing its occlusion record
/// 3. Scheduling mesh generation for the chunk, if asked to
pub struct ChunkGenerationTask {
    chunk: Arc<Chunk>,
    services: Arc<ChunkServices>,
    /// Whether to mesh the chunk once it is generated.
    mesh_after: bool,
}

impl ChunkGenerationTask {
    /// Creates a new chunk generation task.
    ///
    /// # Arguments
    /// * `chunk` - The chunk to populate; it should already be installed in the world
    /// * `services` - Generator, storage and connectivity strategy
    /// * `mesh_after` - Whether to schedule a mesh task once the chunk is generated
    pub fn new(chunk: Arc<Chunk>, services: Arc<ChunkServices>, mesh_after: bool) -> Self {
        ChunkGenerationTask {
            chunk,
            services,
            mesh_after,
        }
    }
}

impl Task for ChunkGenerationTask {
    fn process(&self) -> Box<dyn TaskResult + Send> {
        Box::new(ChunkGenerationTaskResult {
            chunk: Arc::clone(&self.chunk),
            outcome: self.services.ensure_generated(&self.chunk),
            mesh_after: self.mesh_after,
        })
    }
}

/// The result of a chunk generation task.
pub struct ChunkGenerationTaskResult {
    chunk: Arc<Chunk>,
    /// `Ok(true)` if this task populated the chunk.
    outcome: Result<bool, GenerationError>,
    mesh_after: bool,
}

impl TaskResult for ChunkGenerationTaskResult {
    /// Schedules mesh generation for the chunk if it is still resident and not meshed.
    fn handle_result(self: Box<Self>, context: &TaskContext) -> Vec<Box<dyn Task + Send>> {
        let position = self.chunk.position;
        match self.outcome {
            Ok(true) => debug!("Chunk {:?} ready", position),
            Ok(false) => {}
            Err(err) => {
                warn!("Generation of chunk {:?} failed: {}", position, err);
                return Vec::new();
            }
        }

        if !self.mesh_after || self.chunk.is_meshed() {
            return Vec::new();
        }
        let resident = context
            .world
            .get()
            .get(position)
            .is_some_and(|chunk| Arc::ptr_eq(&chunk, &self.chunk));
        if !resident {
            return Vec::new();
        }

        let mesh_task: Box<dyn Task + Send> = Box::new(ChunkMeshGenerationTask::new(
            self.chunk,
            context.world.clone(),
            Arc::clone(&context.services),
        ));
        vec![mesh_task]
    }
}
