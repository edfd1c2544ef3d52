//! Pose and point types for 3D SLAM.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// A 3D point in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    /// X coordinate in meters
    pub x: f64,
    /// Y coordinate in meters
    pub y: f64,
    /// Z coordinate in meters
    pub z: f64,
}

impl Point3D {
    /// Create a new point.
    #[inline]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Squared distance to another point (avoids sqrt).
    #[inline]
    pub fn distance_squared(&self, other: &Point3D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// View as a nalgebra vector.
    #[inline]
    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

impl From<Vector3<f64>> for Point3D {
    fn from(v: Vector3<f64>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// Rigid 6-DOF pose (rotation + translation).
///
/// Wraps an `Isometry3<f64>`. Composition follows the usual
/// `T_a_c = T_a_b ∘ T_b_c` convention: `a.compose(&b)` applies `b`
/// in the frame of `a`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose3D {
    iso: Isometry3<f64>,
}

impl Pose3D {
    /// Identity pose at origin with no rotation.
    #[inline]
    pub fn identity() -> Self {
        Self {
            iso: Isometry3::identity(),
        }
    }

    /// Create from a translation vector and unit quaternion.
    pub fn new(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self {
            iso: Isometry3::from_parts(Translation3::from(translation), rotation),
        }
    }

    /// Pure translation.
    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self::new(Vector3::new(x, y, z), UnitQuaternion::identity())
    }

    /// Create from position and roll/pitch/yaw in radians.
    pub fn from_xyz_rpy(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::new(
            Vector3::new(x, y, z),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        )
    }

    /// Compose two poses: self ∘ other.
    #[inline]
    pub fn compose(&self, other: &Pose3D) -> Pose3D {
        Pose3D {
            iso: self.iso * other.iso,
        }
    }

    /// Inverse of this pose.
    #[inline]
    pub fn inverse(&self) -> Pose3D {
        Pose3D {
            iso: self.iso.inverse(),
        }
    }

    /// Translation component in meters.
    #[inline]
    pub fn translation(&self) -> Vector3<f64> {
        self.iso.translation.vector
    }

    /// Position of the frame origin.
    #[inline]
    pub fn position(&self) -> Point3D {
        Point3D::from(self.iso.translation.vector)
    }

    /// Rotation component.
    #[inline]
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.iso.rotation
    }

    /// Unit vector along the local +X (forward) axis, in the parent frame.
    pub fn forward_axis(&self) -> Vector3<f64> {
        self.iso.rotation * Vector3::x()
    }
}

impl Default for Pose3D {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_compose_translation_in_rotated_frame() {
        // Facing +Y, stepping 1m forward lands at (0, 1)
        let a = Pose3D::from_xyz_rpy(0.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2);
        let b = Pose3D::from_translation(1.0, 0.0, 0.0);
        let c = a.compose(&b);

        assert_relative_eq!(c.translation().x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(c.translation().y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_roundtrip_is_identity() {
        let p = Pose3D::from_xyz_rpy(1.0, -2.0, 0.5, 0.1, -0.2, 0.3);
        let id = p.compose(&p.inverse());

        assert_relative_eq!(id.translation().norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(id.rotation().angle(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_forward_axis() {
        let p = Pose3D::from_xyz_rpy(0.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2);
        let f = p.forward_axis();
        assert_relative_eq!(f.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(f.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_point_distance() {
        let a = Point3D::new(0.0, 0.0, 0.0);
        let b = Point3D::new(1.0, 2.0, 2.0);
        assert_relative_eq!(a.distance_squared(&b), 9.0);
    }
}
