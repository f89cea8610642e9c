//! # Camera State Management
//!
//! This module handles all camera-related functionality including:
//! - Camera position and orientation tracking
//! - View and projection matrix calculations
//! - Chunk visibility inputs derived from the camera: the frustum, the viewer's chunk
//!   and the block faces that can face the viewer

use cgmath::{Deg, Point3};

use crate::engine_state::config::EngineConfig;
use crate::engine_state::rendering::culling::frustum::Frustum;

use super::voxels::{block::block_side::BlockSide, chunk::CHUNK_DIMENSION};

/// Camera pose and projection.
pub mod camera;

/// The viewer: camera plus projection.
#[derive(Debug, Clone)]
pub struct CameraState {
    /// The current camera position and orientation
    pub camera: camera::Camera,
    /// Perspective projection
    pub projection: camera::Projection,
    /// Level of detail whose chunk grid `chunk_position` refers to.
    lod: u8,
    last_chunk_position: Option<Point3<i32>>,
}

impl CameraState {
    /// Creates a camera at the origin looking along positive X.
    pub fn new(config: &EngineConfig) -> Self {
        let camera = camera::Camera::new(Point3::new(0.0, 0.0, 0.0), Deg(0.0), Deg(0.0));
        let projection = camera::Projection::new(
            config.projection.width,
            config.projection.height,
            Deg(config.projection.fovy_degrees),
            config.projection.znear,
            config.projection.zfar,
        );
        CameraState {
            camera,
            projection,
            lod: config.lod,
            last_chunk_position: None,
        }
    }

    /// The view frustum of the current camera.
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(self.projection.calc_matrix() * self.camera.calc_matrix())
    }

    /// The chunk containing the camera.
    pub fn chunk_position(&self) -> Point3<i32> {
        let extent = ((CHUNK_DIMENSION as i64) << self.lod) as f32;
        let position = self.camera.position;
        Point3::new(
            (position.x / extent).floor() as i32,
            (position.y / extent).floor() as i32,
            (position.z / extent).floor() as i32,
        )
    }

    /// Block faces that may face the camera given its orientation.
    pub fn visible_sides(&self) -> Vec<BlockSide> {
        BlockSide::get_visible_sides(self.camera.get_view_vec())
    }

    /// Moves and turns the camera.
    ///
    /// # Returns
    /// - `Some(CameraUpdates)` if the camera entered a different chunk (or on the first update)
    /// - `None` otherwise
    pub fn update(&mut self, position: Point3<f32>, yaw: Deg<f32>, pitch: Deg<f32>) -> Option<CameraUpdates> {
        self.camera.position = position;
        self.camera.look(yaw, pitch);

        let new_chunk_position = self.chunk_position();
        if self.last_chunk_position == Some(new_chunk_position) {
            return None;
        }
        self.last_chunk_position = Some(new_chunk_position);
        Some(CameraUpdates {
            new_visible_sides: self.visible_sides(),
            new_chunk_position,
        })
    }
}

/// Represents updates to the camera's state that affect game world interaction.
///
/// This is returned by `CameraState::update()` when the camera crosses a chunk boundary.
#[derive(Debug)]
pub struct CameraUpdates {
    /// Block faces that are currently visible based on camera orientation
    pub new_visible_sides: Vec<BlockSide>,
    /// The current chunk position of the camera in chunk coordinates
    pub new_chunk_position: Point3<i32>,
}
