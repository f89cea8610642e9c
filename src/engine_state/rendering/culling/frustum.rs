//! View frustum for chunk culling.
//!
//! The six planes are extracted from the combined `projection * view` matrix. Clip
//! space uses wgpu's depth range (`0 ≤ z ≤ w`), so the near plane is the third row on
//! its own rather than `row3 + row2`.

use cgmath::{InnerSpace, Matrix, Matrix4, Point3, Vector3, Vector4};

/// A plane `normal · p + distance = 0`; points with a positive value are inside.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    /// Unit normal pointing inside.
    pub normal: Vector3<f32>,
    /// Offset of the plane from the origin.
    pub distance: f32,
}

impl Plane {
    fn from_row(row: Vector4<f32>) -> Self {
        let normal = row.truncate();
        let length = normal.magnitude();
        if length > f32::EPSILON {
            Plane {
                normal: normal / length,
                distance: row.w / length,
            }
        } else {
            Plane {
                normal,
                distance: row.w,
            }
        }
    }

    /// Positive inside, negative outside.
    pub fn signed_distance(&self, point: Point3<f32>) -> f32 {
        self.normal.x * point.x + self.normal.y * point.y + self.normal.z * point.z + self.distance
    }

    /// Whether the box lies entirely on the outer side of this plane.
    pub fn is_aabb_outside(&self, min: Point3<f32>, max: Point3<f32>) -> bool {
        // The corner furthest along the normal.
        let p = Point3::new(
            if self.normal.x >= 0.0 { max.x } else { min.x },
            if self.normal.y >= 0.0 { max.y } else { min.y },
            if self.normal.z >= 0.0 { max.z } else { min.z },
        );
        self.signed_distance(p) < 0.0
    }
}

/// Six planes: left, right, bottom, top, near, far.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extracts the planes of a view-projection matrix.
    pub fn from_view_projection(view_projection: Matrix4<f32>) -> Self {
        let r0 = view_projection.row(0);
        let r1 = view_projection.row(1);
        let r2 = view_projection.row(2);
        let r3 = view_projection.row(3);

        Frustum {
            planes: [
                Plane::from_row(r3 + r0),
                Plane::from_row(r3 - r0),
                Plane::from_row(r3 + r1),
                Plane::from_row(r3 - r1),
                Plane::from_row(r2),
                Plane::from_row(r3 - r2),
            ],
        }
    }

    /// `false` only if the box is strictly outside one of the planes.
    pub fn intersects_aabb(&self, min: Point3<f32>, max: Point3<f32>) -> bool {
        !self.planes.iter().any(|plane| plane.is_aabb_outside(min, max))
    }

    /// Whether the point is on the inner side of every plane.
    pub fn contains_point(&self, point: Point3<f32>) -> bool {
        self.planes.iter().all(|plane| plane.signed_distance(point) >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::camera_state::camera::{Camera, Projection};
    use cgmath::Deg;

    fn looking_down_negative_z() -> Frustum {
        let camera = Camera::new((0.0, 0.0, 0.0), Deg(-90.0), Deg(0.0));
        let projection = Projection::new(1, 1, Deg(90.0), 0.1, 100.0);
        Frustum::from_view_projection(projection.calc_matrix() * camera.calc_matrix())
    }

    #[test]
    fn boxes_in_front_of_the_camera_are_kept() {
        let frustum = looking_down_negative_z();
        assert!(frustum.contains_point(Point3::new(0.0, 0.0, -10.0)));
        assert!(frustum.intersects_aabb(Point3::new(-1.0, -1.0, -20.0), Point3::new(1.0, 1.0, -10.0)));
    }

    #[test]
    fn boxes_behind_or_beyond_the_far_plane_are_culled() {
        let frustum = looking_down_negative_z();
        assert!(!frustum.contains_point(Point3::new(0.0, 0.0, 10.0)));
        assert!(!frustum.intersects_aabb(Point3::new(-1.0, -1.0, 5.0), Point3::new(1.0, 1.0, 10.0)));
        assert!(!frustum.intersects_aabb(Point3::new(-1.0, -1.0, -300.0), Point3::new(1.0, 1.0, -200.0)));
        assert!(!frustum.intersects_aabb(Point3::new(50.0, -1.0, -20.0), Point3::new(60.0, 1.0, -10.0)));
    }

    #[test]
    fn boxes_straddling_a_plane_are_kept() {
        let frustum = looking_down_negative_z();
        assert!(frustum.intersects_aabb(Point3::new(-5.0, -5.0, -5.0), Point3::new(5.0, 5.0, 5.0)));
    }
}
