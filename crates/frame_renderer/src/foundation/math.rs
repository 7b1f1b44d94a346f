//! Math utilities and types
//!
//! Vector, matrix and quaternion aliases plus the handful of projection and
//! axis helpers the front end needs. World space is right-handed with
//! `x` forward, `y` left and `z` up; clip space follows the OpenGL layout.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Three orthonormal basis vectors: forward, left, up.
pub type Axes = [Vec3; 3];

/// Identity basis.
pub const IDENTITY_AXES: Axes = [
    Vec3::new(1.0, 0.0, 0.0),
    Vec3::new(0.0, 1.0, 0.0),
    Vec3::new(0.0, 0.0, 1.0),
];

/// Math constants
pub mod constants {
    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = std::f32::consts::PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / std::f32::consts::PI;
}

/// Rigid placement of an object: an origin and a rotation.
///
/// Lights and sub-models are placed this way; no scale is carried because
/// culling relies on distances being preserved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    /// Translation
    pub origin: Vec3,
    /// Rotation
    pub rotation: Quat,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self {
            origin: Vec3::zeros(),
            rotation: Quat::identity(),
        }
    }
}

impl RigidTransform {
    /// Create a transform from origin and rotation
    pub const fn new(origin: Vec3, rotation: Quat) -> Self {
        Self { origin, rotation }
    }

    /// Local-to-world matrix
    pub fn matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.origin) * self.rotation.to_homogeneous()
    }

    /// World-to-local matrix
    pub fn inverse_matrix(&self) -> Mat4 {
        let inv = self.rotation.inverse();
        inv.to_homogeneous() * Mat4::new_translation(&-self.origin)
    }

    /// Rotated basis vectors
    pub fn axes(&self) -> Axes {
        [
            self.rotation * IDENTITY_AXES[0],
            self.rotation * IDENTITY_AXES[1],
            self.rotation * IDENTITY_AXES[2],
        ]
    }
}

/// Build a local-to-world matrix from an origin and a basis.
pub fn matrix_from_axes(origin: &Vec3, axes: &Axes) -> Mat4 {
    Mat4::new(
        axes[0].x, axes[1].x, axes[2].x, origin.x,
        axes[0].y, axes[1].y, axes[2].y, origin.y,
        axes[0].z, axes[1].z, axes[2].z, origin.z,
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Inverse of a rotation + translation matrix without a general inversion.
pub fn affine_inverse(m: &Mat4) -> Mat4 {
    let rot_t = m.fixed_view::<3, 3>(0, 0).transpose();
    let translation = Vec3::new(m.m14, m.m24, m.m34);
    let t = -(rot_t * translation);
    let mut out = Mat4::identity();
    out.fixed_view_mut::<3, 3>(0, 0).copy_from(&rot_t);
    out.m14 = t.x;
    out.m24 = t.y;
    out.m34 = t.z;
    out
}

/// Converts world axes (x forward, y left, z up) into GL eye axes
/// (x right, y up, looking down -z).
pub fn world_to_gl() -> Mat4 {
    Mat4::new(
        0.0, -1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        -1.0, 0.0, 0.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Right-handed perspective projection from horizontal and vertical fov in degrees.
pub fn perspective_fov_xy(fov_x: f32, fov_y: f32, z_near: f32, z_far: f32) -> Mat4 {
    let width = (fov_x * 0.5 * constants::DEG_TO_RAD).tan();
    let height = (fov_y * 0.5 * constants::DEG_TO_RAD).tan();
    let depth = z_far - z_near;

    Mat4::new(
        1.0 / width, 0.0, 0.0, 0.0,
        0.0, 1.0 / height, 0.0, 0.0,
        0.0, 0.0, -(z_far + z_near) / depth, -2.0 * z_far * z_near / depth,
        0.0, 0.0, -1.0, 0.0,
    )
}

/// Right-handed perspective projection with the far plane at infinity.
pub fn perspective_fov_xy_infinite(fov_x: f32, fov_y: f32, z_near: f32) -> Mat4 {
    let width = (fov_x * 0.5 * constants::DEG_TO_RAD).tan();
    let height = (fov_y * 0.5 * constants::DEG_TO_RAD).tan();

    Mat4::new(
        1.0 / width, 0.0, 0.0, 0.0,
        0.0, 1.0 / height, 0.0, 0.0,
        0.0, 0.0, -1.0, -2.0 * z_near,
        0.0, 0.0, -1.0, 0.0,
    )
}

/// Orthographic projection used by directional lights.
pub fn orthographic(half_width: f32, half_height: f32, z_near: f32, z_far: f32) -> Mat4 {
    let depth = z_far - z_near;
    Mat4::new(
        1.0 / half_width, 0.0, 0.0, 0.0,
        0.0, 1.0 / half_height, 0.0, 0.0,
        0.0, 0.0, -2.0 / depth, -(z_far + z_near) / depth,
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Forward/left/up basis from pitch, yaw and roll in degrees.
pub fn axes_from_angles(pitch: f32, yaw: f32, roll: f32) -> Axes {
    let (sp, cp) = (pitch * constants::DEG_TO_RAD).sin_cos();
    let (sy, cy) = (yaw * constants::DEG_TO_RAD).sin_cos();
    let (sr, cr) = (roll * constants::DEG_TO_RAD).sin_cos();

    let forward = Vec3::new(cp * cy, cp * sy, -sp);
    let right = Vec3::new(
        -sr * sp * cy + cr * sy,
        -sr * sp * sy - cr * cy,
        -sr * cp,
    );
    let up = Vec3::new(cr * sp * cy + sr * sy, cr * sp * sy - sr * cy, cr * cp);

    [forward, -right, up]
}

/// Any unit vector perpendicular to `src`.
pub fn perpendicular_vector(src: &Vec3) -> Vec3 {
    let abs = src.abs();
    let mut axis = Vec3::zeros();
    if abs.x <= abs.y && abs.x <= abs.z {
        axis.x = 1.0;
    } else if abs.y <= abs.z {
        axis.y = 1.0;
    } else {
        axis.z = 1.0;
    }

    let n = src.normalize();
    (axis - n * axis.dot(&n)).normalize()
}

/// Rotate `point` around the unit vector `dir` by `degrees`.
pub fn rotate_point_around_vector(point: &Vec3, dir: &Vec3, degrees: f32) -> Vec3 {
    Unit::try_new(*dir, f32::EPSILON).map_or(*point, |axis| {
        let q = Quat::from_axis_angle(&axis, degrees * constants::DEG_TO_RAD);
        q * *point
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_affine_inverse_matches_general_inverse() {
        let t = RigidTransform::new(
            Vec3::new(10.0, -4.0, 3.0),
            Quat::from_euler_angles(0.3, -0.2, 1.1),
        );
        let m = t.matrix();
        let inv = affine_inverse(&m);
        assert_relative_eq!(inv * m, Mat4::identity(), epsilon = 1e-5);
        assert_relative_eq!(inv, t.inverse_matrix(), epsilon = 1e-5);
    }

    #[test]
    fn test_world_to_gl_maps_forward_to_negative_z() {
        let v = world_to_gl() * Vec4::new(1.0, 0.0, 0.0, 0.0);
        assert_relative_eq!(v, Vec4::new(0.0, 0.0, -1.0, 0.0));
        let left = world_to_gl() * Vec4::new(0.0, 1.0, 0.0, 0.0);
        assert_relative_eq!(left, Vec4::new(-1.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_axes_from_angles_yaw() {
        let axes = axes_from_angles(0.0, 90.0, 0.0);
        assert_relative_eq!(axes[0], Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(axes[1], Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(axes[2], Vec3::new(0.0, 0.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_perpendicular_vector() {
        for v in [Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.3, -2.0, 0.5), Vec3::new(0.0, 0.0, -1.0)] {
            let p = perpendicular_vector(&v);
            assert_relative_eq!(p.dot(&v), 0.0, epsilon = 1e-5);
            assert_relative_eq!(p.norm(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_rotate_point_around_vector() {
        let p = rotate_point_around_vector(&Vec3::new(1.0, 0.0, 0.0), &Vec3::new(0.0, 0.0, 1.0), 90.0);
        assert_relative_eq!(p, Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_perspective_maps_near_plane_to_minus_one() {
        let proj = perspective_fov_xy(90.0, 90.0, 4.0, 1024.0);
        let near = proj * Vec4::new(0.0, 0.0, -4.0, 1.0);
        assert_relative_eq!(near.z / near.w, -1.0, epsilon = 1e-5);
        let far = proj * Vec4::new(0.0, 0.0, -1024.0, 1.0);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-4);
    }
}
