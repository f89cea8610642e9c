//! # Block Side Module
//!
//! This module defines the six faces of a voxel block (and, by extension, of a chunk).
//! It is shared by the mesher (one face list per side), the occlusion graph (face
//! pairs) and the renderer's per-direction backface culling.

use cgmath::{Point3, Vector3};

/// One of the three coordinate axes.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum Axis {
    /// Left to right.
    X,
    /// Bottom to top.
    Y,
    /// Back to front.
    Z,
}

/// Represents the six possible faces of a voxel block.
///
/// The order is: [FRONT, BACK, BOTTOM, TOP, LEFT, RIGHT]. Opposite faces differ only
/// in the lowest bit of their discriminant.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum BlockSide {
    /// The front face (facing positive Z)
    FRONT = 0,

    /// The back face (facing negative Z)
    BACK = 1,

    /// The bottom face (facing negative Y)
    BOTTOM = 2,

    /// The top face (facing positive Y)
    TOP = 3,

    /// The left face (facing negative X)
    LEFT = 4,

    /// The right face (facing positive X)
    RIGHT = 5,
}

impl BlockSide {
    /// Returns an array containing all six block faces in a consistent order.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::FRONT,
            BlockSide::BACK,
            BlockSide::BOTTOM,
            BlockSide::TOP,
            BlockSide::LEFT,
            BlockSide::RIGHT,
        ]
    }

    /// Converts a side index (`0..6`) back to a side.
    pub fn from_index(index: usize) -> Option<BlockSide> {
        Self::all().get(index).copied()
    }

    /// The face pointing the other way along the same axis.
    pub fn opposite(self) -> BlockSide {
        Self::all()[self as usize ^ 1]
    }

    /// The axis this face is perpendicular to.
    pub fn axis(self) -> Axis {
        match self {
            BlockSide::FRONT | BlockSide::BACK => Axis::Z,
            BlockSide::BOTTOM | BlockSide::TOP => Axis::Y,
            BlockSide::LEFT | BlockSide::RIGHT => Axis::X,
        }
    }

    /// Whether the face normal points along the positive axis direction.
    pub fn is_positive(self) -> bool {
        matches!(self, BlockSide::FRONT | BlockSide::TOP | BlockSide::RIGHT)
    }

    /// Unit offset to the neighbour across this face.
    pub fn normal(self) -> Vector3<i32> {
        match self {
            BlockSide::FRONT => Vector3::new(0, 0, 1),
            BlockSide::BACK => Vector3::new(0, 0, -1),
            BlockSide::BOTTOM => Vector3::new(0, -1, 0),
            BlockSide::TOP => Vector3::new(0, 1, 0),
            BlockSide::LEFT => Vector3::new(-1, 0, 0),
            BlockSide::RIGHT => Vector3::new(1, 0, 0),
        }
    }

    /// The chunk position across this face.
    pub fn neighbor_of(self, position: Point3<i32>) -> Point3<i32> {
        position + self.normal()
    }

    /// Determines which block faces are potentially visible from a given view direction.
    ///
    /// This is used by the renderer for per-direction backface culling: whole per-side
    /// face arrays are skipped when the camera cannot see any face pointing that way.
    /// A face is kept if the view direction is within 135 degrees of the face's
    /// inward direction.
    ///
    /// # Arguments
    /// * `view_vec` - The normalized view direction vector
    pub fn get_visible_sides(view_vec: Vector3<f32>) -> Vec<BlockSide> {
        // The cutoff is 1/√2, which is the cosine of 45 degrees.
        const CUTOFF: f32 = std::f32::consts::FRAC_1_SQRT_2;
        let mut visible_sides = Vec::new();

        if view_vec.z < CUTOFF {
            visible_sides.push(BlockSide::FRONT);
        }
        if view_vec.z > -CUTOFF {
            visible_sides.push(BlockSide::BACK);
        }
        if view_vec.y > -CUTOFF {
            visible_sides.push(BlockSide::BOTTOM);
        }
        if view_vec.y < CUTOFF {
            visible_sides.push(BlockSide::TOP);
        }
        if view_vec.x > -CUTOFF {
            visible_sides.push(BlockSide::LEFT);
        }
        if view_vec.x < CUTOFF {
            visible_sides.push(BlockSide::RIGHT);
        }

        visible_sides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_sides_share_an_axis_and_flip_the_normal() {
        for side in BlockSide::all() {
            let opposite = side.opposite();
            assert_ne!(side, opposite);
            assert_eq!(opposite.opposite(), side);
            assert_eq!(side.axis(), opposite.axis());
            assert_eq!(side.normal(), -opposite.normal());
            assert_ne!(side.is_positive(), opposite.is_positive());
        }
    }

    #[test]
    fn looking_straight_down_hides_bottom_faces() {
        let visible = BlockSide::get_visible_sides(Vector3::new(0.0, -1.0, 0.0));
        assert!(visible.contains(&BlockSide::TOP));
        assert!(!visible.contains(&BlockSide::BOTTOM));
        assert_eq!(visible.len(), 5);
    }
}
