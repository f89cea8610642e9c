//! Task for generating mesh data for chunks in a background thread.
//!
//! Meshing needs the boundary layer of all six face-adjacent chunks. Resident neighbours
//! that are not generated yet are generated on the spot; positions with no resident
//! chunk are generated into a throwaway chunk just to read the layer.

use std::sync::Arc;

use log::{debug, warn};
use web_time::Instant;

use crate::{
    core::MtResource,
    engine_state::{
        rendering::meshing::{Mesh, NeighborSlices},
        task_management::task::{Task, TaskContext, TaskResult},
        voxels::{
            block::block_side::BlockSide, chunk::Chunk, error::MeshError,
            services::ChunkServices, world::WorldGrid,
        },
    },
};

/// A task that meshes one chunk in a background thread.
///
/// This task is responsible for:
/// 1. Checking if the chunk still needs a mesh
/// 2. Making sure the chunk and its six neighbours are generated
/// 3. Greedy-meshing the chunk and refreshing its occlusion record
pub struct ChunkMeshGenerationTask {
    chunk: Arc<Chunk>,
    world: MtResource<WorldGrid>,
    services: Arc<ChunkServices>,
}

impl ChunkMeshGenerationTask {
    /// Creates a new chunk mesh generation task.
    ///
    /// # Arguments
    /// * `chunk` - The chunk that needs mesh generation
    /// * `world` - Where the neighbours are looked up
    /// * `services` - Used to generate missing chunks and compute occlusion
    pub fn new(chunk: Arc<Chunk>, world: MtResource<WorldGrid>, services: Arc<ChunkServices>) -> Self {
        ChunkMeshGenerationTask {
            chunk,
            world,
            services,
        }
    }

    /// Takes the neighbours out of the world under a short read lock.
    fn snapshot_neighbors(&self) -> [Option<Arc<Chunk>>; 6] {
        let world = self.world.get();
        BlockSide::all().map(|side| world.get(side.neighbor_of(self.chunk.position)))
    }

    /// The boundary layer of the chunk across `side`.
    fn neighbor_slice(
        &self,
        side: BlockSide,
        resident: Option<Arc<Chunk>>,
    ) -> Result<Vec<u8>, MeshError> {
        let position = side.neighbor_of(self.chunk.position);
        let neighbor = resident.unwrap_or_else(|| Arc::new(Chunk::new(position, self.chunk.lod)));
        self.services
            .ensure_generated(&neighbor)
            .map_err(|source| MeshError::NeighborGeneration { position, source })?;
        Ok(neighbor.store.face_slice(side.opposite()))
    }

    /// Builds the mesh and returns it with the chunk's mesh epoch at the time its
    /// contents were read.
    fn build_mesh(&self) -> Result<(Mesh, u32), MeshError> {
        self.services.ensure_generated(&self.chunk)?;

        // Marked before anything is read: an edit from here on, to the chunk or to a
        // neighbour's boundary, clears the flag and moves the epoch past this mesh.
        self.chunk.set_meshed(true);
        let epoch = self.chunk.mesh_epoch();

        let mut neighbors: NeighborSlices = Default::default();
        for (side, resident) in BlockSide::all().into_iter().zip(self.snapshot_neighbors()) {
            neighbors[side as usize] = Some(self.neighbor_slice(side, resident)?);
        }

        let grid = self.chunk.store.decompress();
        self.services.update_occlusion(&self.chunk, &grid);
        let mut mesh = Mesh::greedy(&grid, &neighbors, &self.services.registry);
        mesh.light_sources = self
            .chunk
            .store
            .extract_light_sources(self.chunk.lod, &self.services.registry);
        Ok((mesh, epoch))
    }
}

impl Task for ChunkMeshGenerationTask {
    fn process(&self) -> Box<dyn TaskResult + Send> {
        let position = self.chunk.position;
        if self.chunk.is_meshed() {
            return Box::new(ChunkMeshGenerationTaskResult {
                chunk: Arc::clone(&self.chunk),
                outcome: Ok(None),
            });
        }
        let resident = self
            .world
            .get()
            .get(position)
            .is_some_and(|chunk| Arc::ptr_eq(&chunk, &self.chunk));
        if !resident {
            return Box::new(ChunkMeshGenerationTaskResult {
                chunk: Arc::clone(&self.chunk),
                outcome: Err(MeshError::Evicted(position)),
            });
        }

        let start = Instant::now();
        let outcome = self.build_mesh();
        match &outcome {
            Ok((mesh, _)) => debug!(
                "Meshed chunk {:?}: {} faces in {:?}",
                position,
                mesh.face_count(),
                start.elapsed()
            ),
            Err(_) => self.chunk.set_meshed(false),
        }

        Box::new(ChunkMeshGenerationTaskResult {
            chunk: Arc::clone(&self.chunk),
            outcome: outcome.map(Some),
        })
    }
}

/// The result of a chunk mesh generation task.
pub struct ChunkMeshGenerationTaskResult {
    chunk: Arc<Chunk>,
    /// The mesh and the epoch it was built at; `Ok(None)` if the chunk was already meshed.
    outcome: Result<Option<(Mesh, u32)>, MeshError>,
}

impl TaskResult for ChunkMeshGenerationTaskResult {
    /// Stores the mesh, unless the chunk was evicted or edited while it was being meshed.
    ///
    /// A chunk whose mesh is pushed out of the cache is marked un-meshed so the next
    /// pipeline pass meshes it again.
    fn handle_result(self: Box<Self>, context: &TaskContext) -> Vec<Box<dyn Task + Send>> {
        let position = self.chunk.position;
        match self.outcome {
            Ok(Some((mesh, epoch))) => {
                if self.chunk.mesh_epoch() != epoch {
                    debug!("Dropped outdated mesh of chunk {:?}", position);
                    return Vec::new();
                }
                let world = context.world.get();
                let resident = world
                    .get(position)
                    .is_some_and(|chunk| Arc::ptr_eq(&chunk, &self.chunk));
                if !resident {
                    return Vec::new();
                }
                let evicted = context.mesh_manager.get_mut().insert(position, mesh);
                if let Some(chunk) = evicted.and_then(|evicted| world.get(evicted)) {
                    chunk.set_meshed(false);
                }
            }
            Ok(None) => {}
            Err(MeshError::Evicted(_)) => debug!("Skipped meshing evicted chunk {:?}", position),
            Err(err) => warn!("Meshing chunk {:?} aborted: {}", position, err),
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Point3;

    use crate::engine_state::rendering::culling::occlusion::OcclusionRecord;
    use crate::engine_state::rendering::meshing::MeshManager;
    use crate::engine_state::voxels::block::block_type::BlockType;
    use crate::engine_state::voxels::generator::FlatGenerator;
    use crate::engine_state::voxels::services::tests::services_with;

    fn context() -> TaskContext {
        TaskContext::new(
            MtResource::new(WorldGrid::new(1, 1, 0)),
            MtResource::new(MeshManager::new(8)),
            Arc::new(services_with(Arc::new(FlatGenerator { height: 16 }), None)),
        )
    }

    fn install(context: &TaskContext, position: Point3<i32>) -> Arc<Chunk> {
        let chunk = Arc::new(Chunk::new(position, 0));
        context.world.get_mut().install(Arc::clone(&chunk));
        chunk
    }

    fn mesh_task(context: &TaskContext, chunk: &Arc<Chunk>) -> ChunkMeshGenerationTask {
        ChunkMeshGenerationTask::new(
            Arc::clone(chunk),
            context.world.clone(),
            Arc::clone(&context.services),
        )
    }

    #[test]
    fn meshing_generates_neighbours_and_stores_the_mesh() {
        let context = context();
        let chunk = install(&context, Point3::new(0, 0, 0));
        let above = install(&context, Point3::new(0, 1, 0));

        let result = mesh_task(&context, &chunk).process();
        assert!(result.handle_result(&context).is_empty());

        assert!(chunk.is_meshed());
        assert!(above.is_generated());
        let mesh = context
            .mesh_manager
            .get_mut()
            .get(chunk.position)
            .expect("mesh stored");
        // The flat surface at y = 16 is one rectangle; the side walls are hidden by the
        // ground continuing in the neighbours.
        assert_eq!(mesh.side(BlockSide::TOP).len(), 1);
        assert!(mesh.side(BlockSide::LEFT).is_empty());
        assert!(mesh.side(BlockSide::BOTTOM).is_empty());
        assert_eq!(chunk.occlusion(), OcclusionRecord::ALL_OPEN.with_damping(true));
    }

    #[test]
    fn meshes_built_before_an_edit_are_dropped() {
        let context = context();
        let chunk = install(&context, Point3::new(0, 0, 0));

        let outdated = mesh_task(&context, &chunk).process();
        chunk.edit(4, 20, 4, BlockType::STONE.material(), 0);
        let current = mesh_task(&context, &chunk).process();

        current.handle_result(&context);
        outdated.handle_result(&context);

        let mesh = context
            .mesh_manager
            .get_mut()
            .get(chunk.position)
            .expect("mesh stored");
        // The block floating above the ground shows up as an extra top face.
        assert_eq!(mesh.side(BlockSide::TOP).len(), 2);
        assert!(!mesh.side(BlockSide::LEFT).is_empty());
        assert!(chunk.is_meshed());
    }

    #[test]
    fn chunks_pushed_out_of_the_cache_are_meshed_again() {
        let context = TaskContext::new(
            MtResource::new(WorldGrid::new(1, 1, 0)),
            MtResource::new(MeshManager::new(1)),
            Arc::new(services_with(Arc::new(FlatGenerator { height: 16 }), None)),
        );
        let first = install(&context, Point3::new(0, 0, 0));
        let second = install(&context, Point3::new(1, 0, 0));

        mesh_task(&context, &first).process().handle_result(&context);
        assert!(first.is_meshed());
        mesh_task(&context, &second).process().handle_result(&context);

        assert!(!first.is_meshed());
        assert!(second.is_meshed());
        assert!(!context.mesh_manager.get_mut().is_chunk_meshed(first.position));

        mesh_task(&context, &first).process().handle_result(&context);
        assert!(context.mesh_manager.get_mut().is_chunk_meshed(first.position));
    }

    #[test]
    fn meshes_carry_the_light_sources_of_the_chunk() {
        let context = context();
        let chunk = install(&context, Point3::new(0, 0, 0));
        context.services.ensure_generated(&chunk).expect("generated");
        chunk.edit(8, 16, 8, BlockType::GLOWSTONE.material(), 0);

        mesh_task(&context, &chunk).process().handle_result(&context);
        let mesh = context
            .mesh_manager
            .get_mut()
            .get(chunk.position)
            .expect("mesh stored");
        assert_eq!(mesh.light_sources.len(), 1);
        assert_eq!(mesh.light_sources[0].material, BlockType::GLOWSTONE.material());
    }

    #[test]
    fn meshed_or_evicted_chunks_are_skipped() {
        let context = context();
        let chunk = install(&context, Point3::new(0, 0, 0));
        chunk.set_meshed(true);
        mesh_task(&context, &chunk).process().handle_result(&context);
        assert!(context.mesh_manager.get().is_empty());

        let stray = Arc::new(Chunk::new(Point3::new(0, 0, 1), 0));
        mesh_task(&context, &stray).process().handle_result(&context);
        assert!(!stray.is_meshed());
        assert!(context.mesh_manager.get().is_empty());
    }
}
