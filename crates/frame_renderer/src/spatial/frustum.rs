//! View frustums
//!
//! A frustum is up to six inward-facing planes. Camera frustums are built
//! either directly from the field of view (first pass, no far plane yet) or
//! extracted from a view-projection matrix once the far clip is known.

use crate::foundation::math::{constants, Axes, Mat4, Vec3, Vec4};
use crate::spatial::Plane;

/// Plane slots of a frustum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum FrustumPlane {
    /// Left side
    Left = 0,
    /// Right side
    Right = 1,
    /// Bottom side
    Bottom = 2,
    /// Top side
    Top = 3,
    /// Near clip
    Near = 4,
    /// Far clip
    Far = 5,
}

/// Number of plane slots
pub const FRUSTUM_PLANES: usize = 6;

/// Set of inward-facing planes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Plane; FRUSTUM_PLANES],
    len: usize,
}

impl Default for Frustum {
    fn default() -> Self {
        Self {
            planes: [Plane::default(); FRUSTUM_PLANES],
            len: 0,
        }
    }
}

impl Frustum {
    /// Frustum from an explicit plane list (at most six are kept)
    pub fn from_planes(planes: &[Plane]) -> Self {
        let mut frustum = Self::default();
        for (slot, plane) in frustum.planes.iter_mut().zip(planes) {
            *slot = *plane;
        }
        frustum.len = planes.len().min(FRUSTUM_PLANES);
        frustum
    }

    /// Four side planes plus a near plane from a camera placement.
    ///
    /// No far plane: this is the frustum used before the far clip distance
    /// is known.
    pub fn from_fov(origin: &Vec3, axes: &Axes, fov_x: f32, fov_y: f32, z_near: f32) -> Self {
        let (xs, xc) = (fov_x * 0.5 * constants::DEG_TO_RAD).sin_cos();
        let (ys, yc) = (fov_y * 0.5 * constants::DEG_TO_RAD).sin_cos();

        let sides = [
            axes[0] * xs - axes[1] * xc,
            axes[0] * xs + axes[1] * xc,
            axes[0] * ys + axes[2] * yc,
            axes[0] * ys - axes[2] * yc,
        ];

        let mut frustum = Self::default();
        for (slot, normal) in frustum.planes.iter_mut().zip(sides) {
            *slot = Plane::through_point(normal, origin);
        }
        let near_point = origin + axes[0] * z_near;
        frustum.planes[FrustumPlane::Near as usize] = Plane::through_point(axes[0], &near_point);
        frustum.len = 5;
        frustum
    }

    /// Extract all six planes from a view-projection matrix.
    ///
    /// Planes are normalized; a degenerate row (the far plane of an
    /// infinite projection) is left unnormalized and never rejects.
    pub fn from_matrix(m: &Mat4) -> Self {
        let row = |i: usize| -> Vec4 { m.row(i).transpose() };
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        let raw = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r3 + r2, r3 - r2];

        let mut frustum = Self::default();
        for (slot, v) in frustum.planes.iter_mut().zip(raw) {
            let mut normal = Vec3::new(v.x, v.y, v.z);
            let mut dist = -v.w;
            let len = normal.norm();
            if len != 0.0 {
                normal /= len;
                dist /= len;
            }
            *slot = Plane::new(normal, dist);
        }
        frustum.len = FRUSTUM_PLANES;
        frustum
    }

    /// Active planes
    pub fn planes(&self) -> &[Plane] {
        &self.planes[..self.len]
    }

    /// Plane in a given slot (inactive slots never reject)
    pub const fn plane(&self, which: FrustumPlane) -> &Plane {
        &self.planes[which as usize]
    }

    /// Replace a plane, activating every slot up to it
    pub fn set_plane(&mut self, which: FrustumPlane, plane: Plane) {
        let index = which as usize;
        self.planes[index] = plane;
        self.len = self.len.max(index + 1);
    }

    /// `true` if the point is on the front side of every plane
    pub fn contains_point(&self, point: &Vec3) -> bool {
        self.planes().iter().all(|p| p.distance_to_point(point) >= 0.0)
    }
}

/// Depth-sliced copies of a camera frustum for parallel shadow splits.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SplitFrustums {
    /// `frustums[0]` is the full frustum, `frustums[1..]` the slices
    pub frustums: Vec<Frustum>,
    /// Far distance of every slice except the last
    pub distances: Vec<f32>,
}

/// Slice `base` along the view axis into `splits + 1` pieces.
///
/// Slice far distances blend a logarithmic and a uniform distribution by
/// `lambda`; consecutive slices overlap by half a percent of the split
/// distance.
pub fn split_frustums(
    base: &Frustum,
    origin: &Vec3,
    forward: &Vec3,
    z_near: f32,
    z_far: f32,
    splits: usize,
    lambda: f32,
) -> SplitFrustums {
    let ratio = z_far / z_near;
    let slices = splits + 1;

    let mut frustums = Vec::with_capacity(slices + 1);
    frustums.push(*base);

    let mut distances = Vec::with_capacity(splits);
    let mut near = *base.plane(FrustumPlane::Near);

    for i in 1..=slices {
        let si = i as f32 / slices as f32;
        let split_far = 1.005 * lambda * (z_near * ratio.powf(si))
            + (1.0 - lambda) * (z_near + (z_far - z_near) * si);

        let far_point = origin + forward * split_far;
        let mut slice = Frustum::from_planes(&base.planes()[..4]);
        slice.set_plane(FrustumPlane::Near, near);
        slice.set_plane(FrustumPlane::Far, Plane::through_point(-forward, &far_point));
        frustums.push(slice);

        if i <= splits {
            distances.push(split_far);
            let next_near = split_far - split_far * 0.005;
            near = Plane::through_point(*forward, &(origin + forward * next_near));
        }
    }

    SplitFrustums { frustums, distances }
}
