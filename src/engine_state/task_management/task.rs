//! # Task System Core Traits
//!
//! This module defines the fundamental building blocks of the task system,
//! which provides a framework for executing work asynchronously across multiple threads.
//!
//! ## Core Components
//! - `Task`: Represents a unit of work that can be executed asynchronously
//! - `TaskResult`: Represents the result of a completed task
//! - `TaskContext`: The shared engine state results are applied to
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and scheduled via `TaskManager::publish_task()`
//! 2. The task's `process()` method is called on a worker thread
//! 3. The task returns a boxed `TaskResult`
//! 4. The result's `handle_result()` is called on the main thread
//! 5. The result can spawn new tasks or update the shared state
//!
//! ## Idempotence
//! Tasks may be published more than once for the same chunk, since every pipeline
//! restart resubmits a full covering set. A task that finds its work already done
//! returns a result that does nothing.

use std::sync::Arc;

use crate::core::MtResource;
use crate::engine_state::rendering::meshing::MeshManager;
use crate::engine_state::voxels::services::ChunkServices;
use crate::engine_state::voxels::world::WorldGrid;

/// A trait representing a unit of work that can be executed asynchronously.
///
/// Tasks should own (or share through `Arc`) all the data they need.
pub trait Task: Send {
    /// Processes the task and returns a result.
    ///
    /// Runs on a worker thread. Errors are not propagated; they are carried in the
    /// result and reported on the main thread.
    fn process(&self) -> Box<dyn TaskResult + Send>;
}

/// A trait representing the result of processing a `Task`.
pub trait TaskResult: Send {
    /// Handles the result of a completed task on the main thread.
    ///
    /// # Arguments
    /// * `context` - The shared engine state
    ///
    /// # Returns
    /// Follow-up tasks to schedule (can be empty)
    fn handle_result(self: Box<Self>, context: &TaskContext) -> Vec<Box<dyn Task + Send>>;
}

/// Shared state handed to task results and to the tasks they spawn.
#[derive(Clone)]
pub struct TaskContext {
    /// Resident chunks.
    pub world: MtResource<WorldGrid>,
    /// Cache of built meshes.
    pub mesh_manager: MtResource<MeshManager>,
    /// Generation, storage and registry shared by every task.
    pub services: Arc<ChunkServices>,
}

impl TaskContext {
    /// Bundles the shared engine state.
    pub fn new(
        world: MtResource<WorldGrid>,
        mesh_manager: MtResource<MeshManager>,
        services: Arc<ChunkServices>,
    ) -> Self {
        TaskContext {
            world,
            mesh_manager,
            services,
        }
    }
}
