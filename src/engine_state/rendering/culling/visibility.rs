//! Visible-chunk traversal.
//!
//! Starting at the viewer's chunk, the traversal walks from chunk to chunk through
//! faces the occlusion records leave open. A path never turns back along an axis it
//! already travelled, so it can only move away from the viewer. Chunks outside the
//! frustum are not entered, and every damping chunk on a path uses up one unit of
//! the damping budget.

use bitvec::prelude::*;
use cgmath::Point3;

use crate::engine_state::voxels::block::block_side::BlockSide;
use crate::engine_state::voxels::chunk::chunk_world_bounds;
use crate::engine_state::voxels::world::WorldGrid;

use super::frustum::Frustum;

/// One pending step of the traversal.
struct Step {
    position: Point3<i32>,
    /// Face through which the path entered this chunk; `None` for the viewer's chunk.
    entry: Option<BlockSide>,
    /// Bit `s` is set if the path already moved in direction `s`.
    traveled: u8,
    damping: u32,
}

/// Collects the resident chunks visible from `viewer`.
///
/// # Arguments
/// * `world` - The resident chunks; only these can be visited
/// * `viewer` - The chunk containing the camera. It is always part of the result.
/// * `frustum` - Chunks whose bounds lie entirely outside it are not entered
/// * `damping_budget` - How many damping chunks one path may cross
///
/// # Returns
/// Each visible chunk position exactly once, in visiting order.
pub fn visible_set(
    world: &WorldGrid,
    viewer: Point3<i32>,
    frustum: &Frustum,
    damping_budget: u32,
) -> Vec<Point3<i32>> {
    let lod = world.lod();
    let mut visited = bitvec![0; world.capacity()];
    let mut visible = vec![viewer];
    visited.set(world.slot_index(viewer), true);

    let mut stack = vec![Step {
        position: viewer,
        entry: None,
        traveled: 0,
        damping: 0,
    }];

    while let Some(step) = stack.pop() {
        // The viewer's chunk may be missing while it loads; it then sees everything.
        let record = world.get(step.position).map(|chunk| chunk.occlusion());

        for exit in BlockSide::all() {
            if step.traveled & (1 << exit.opposite() as u8) != 0 {
                continue;
            }
            if let (Some(record), Some(entry)) = (record, step.entry) {
                if !record.is_open(entry, exit) {
                    continue;
                }
            }

            let position = exit.neighbor_of(step.position);
            let Some(neighbor) = world.get(position) else {
                continue;
            };
            let slot = world.slot_index(position);
            if visited[slot] {
                continue;
            }
            let (min, max) = chunk_world_bounds(position, lod);
            if !frustum.intersects_aabb(min, max) {
                continue;
            }
            let damping = step.damping + u32::from(neighbor.occlusion().is_damping());
            if damping > damping_budget {
                continue;
            }

            visited.set(slot, true);
            visible.push(position);
            stack.push(Step {
                position,
                entry: Some(exit.opposite()),
                traveled: step.traveled | (1 << exit as u8),
                damping,
            });
        }
    }

    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    use cgmath::{Deg, Matrix4, SquareMatrix};

    use crate::engine_state::camera_state::camera::{Camera, Projection};
    use crate::engine_state::rendering::culling::occlusion::OcclusionRecord;
    use crate::engine_state::voxels::chunk::Chunk;

    fn filled_world(radius: i32, record: OcclusionRecord) -> WorldGrid {
        let mut world = WorldGrid::new(radius as u32, radius as u32, 0);
        for z in -radius..=radius {
            for y in -radius..=radius {
                for x in -radius..=radius {
                    let chunk = Chunk::new(Point3::new(x, y, z), 0);
                    chunk.set_occlusion(record);
                    world.install(Arc::new(chunk));
                }
            }
        }
        world
    }

    /// A frustum that contains every point.
    fn everything() -> Frustum {
        let mut frustum = Frustum::from_view_projection(Matrix4::identity());
        for plane in frustum.planes.iter_mut() {
            plane.normal = cgmath::Vector3::new(0.0, 0.0, 0.0);
            plane.distance = 1.0;
        }
        frustum
    }

    #[test]
    fn open_worlds_are_fully_visible_without_revisits() {
        let world = filled_world(2, OcclusionRecord::ALL_OPEN);
        let visible = visible_set(&world, Point3::new(0, 0, 0), &everything(), 0);

        let unique: HashSet<_> = visible.iter().copied().collect();
        assert_eq!(unique.len(), visible.len());
        assert_eq!(visible.len(), world.capacity());
        assert_eq!(visible[0], Point3::new(0, 0, 0));
    }

    #[test]
    fn closed_records_stop_the_walk_after_one_step() {
        let world = filled_world(2, OcclusionRecord::CLOSED);
        let visible = visible_set(&world, Point3::new(0, 0, 0), &everything(), 0);
        // The viewer sees its six neighbours; none of them lets the path continue.
        assert_eq!(visible.len(), 7);
    }

    #[test]
    fn damping_chunks_consume_the_budget() {
        let world = filled_world(2, OcclusionRecord::ALL_OPEN.with_damping(true));
        let viewer = Point3::new(0, 0, 0);

        assert_eq!(visible_set(&world, viewer, &everything(), 0), vec![viewer]);

        let one = visible_set(&world, viewer, &everything(), 1);
        assert_eq!(one.len(), 7);
        assert!(visible_set(&world, viewer, &everything(), 2).len() > one.len());
    }

    #[test]
    fn chunks_behind_the_camera_are_culled() {
        let world = filled_world(2, OcclusionRecord::ALL_OPEN);
        // Looking down -Z from the middle of the viewer's chunk.
        let camera = Camera::new((16.0, 16.0, 16.0), Deg(-90.0), Deg(0.0));
        let projection = Projection::new(800, 600, Deg(60.0), 0.1, 1000.0);
        let frustum = Frustum::from_view_projection(projection.calc_matrix() * camera.calc_matrix());

        let visible = visible_set(&world, Point3::new(0, 0, 0), &frustum, 0);
        assert!(visible.contains(&Point3::new(0, 0, -2)));
        assert!(!visible.iter().any(|p| p.z > 0));
        assert!(visible.len() < world.capacity());
    }

    #[test]
    fn missing_chunks_are_not_entered() {
        let mut world = filled_world(1, OcclusionRecord::ALL_OPEN);
        world.evict(Point3::new(1, 0, 0));
        let visible = visible_set(&world, Point3::new(0, 0, 0), &everything(), 0);
        assert!(!visible.contains(&Point3::new(1, 0, 0)));
        assert_eq!(visible.len(), world.capacity() - 1);
    }
}
