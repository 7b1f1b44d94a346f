//! Planes and box-side classification

use crate::foundation::math::Vec3;
use crate::spatial::Aabb;

/// Axis alignment of a plane normal, used to take the fast path in
/// [`Plane::box_side`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneType {
    /// Normal is +/- X
    AxialX,
    /// Normal is +/- Y
    AxialY,
    /// Normal is +/- Z
    AxialZ,
    /// Anything else
    NonAxial,
}

/// Which side of a plane a volume lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneSide {
    /// Entirely on the side the normal points to (or touching it)
    Front,
    /// Entirely behind
    Back,
    /// Straddles the plane
    Cross,
}

/// Plane `dot(normal, p) == dist`.
///
/// The front half-space is `dot(normal, p) >= dist`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Plane normal
    pub normal: Vec3,
    /// Distance from the origin along the normal
    pub dist: f32,
    /// Axis classification
    pub kind: PlaneType,
    /// Bit `i` set when `normal[i] < 0`
    pub signbits: u8,
}

impl Default for Plane {
    /// A plane that never rejects anything.
    fn default() -> Self {
        Self::new(Vec3::zeros(), -f32::MAX)
    }
}

impl Plane {
    /// Create a plane and derive its classification
    pub fn new(normal: Vec3, dist: f32) -> Self {
        let mut plane = Self {
            normal,
            dist,
            kind: PlaneType::NonAxial,
            signbits: 0,
        };
        plane.update_classification();
        plane
    }

    /// Plane through `point` facing along `normal`
    pub fn through_point(normal: Vec3, point: &Vec3) -> Self {
        Self::new(normal, normal.dot(point))
    }

    /// Plane through three points, counter-clockwise winding facing the viewer.
    ///
    /// Returns `None` for degenerate triangles.
    pub fn from_points(a: &Vec3, b: &Vec3, c: &Vec3) -> Option<Self> {
        let normal = (c - a).cross(&(b - a));
        let len = normal.norm();
        if len < f32::EPSILON {
            return None;
        }
        let normal = normal / len;
        Some(Self::new(normal, a.dot(&normal)))
    }

    /// Recompute `kind` and `signbits` after editing the normal
    pub fn update_classification(&mut self) {
        self.kind = if self.normal.x == 1.0 || self.normal.x == -1.0 {
            PlaneType::AxialX
        } else if self.normal.y == 1.0 || self.normal.y == -1.0 {
            PlaneType::AxialY
        } else if self.normal.z == 1.0 || self.normal.z == -1.0 {
            PlaneType::AxialZ
        } else {
            PlaneType::NonAxial
        };

        self.signbits = 0;
        for i in 0..3 {
            if self.normal[i] < 0.0 {
                self.signbits |= 1 << i;
            }
        }
    }

    /// Signed distance from the plane
    pub fn distance_to_point(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) - self.dist
    }

    /// Same plane facing the other way
    pub fn flipped(&self) -> Self {
        Self::new(-self.normal, -self.dist)
    }

    /// Classify a box against the plane.
    pub fn box_side(&self, bounds: &Aabb) -> PlaneSide {
        let axis = match self.kind {
            PlaneType::AxialX => Some(0),
            PlaneType::AxialY => Some(1),
            PlaneType::AxialZ => Some(2),
            PlaneType::NonAxial => None,
        };

        if let Some(axis) = axis {
            let (lo, hi) = if self.normal[axis] > 0.0 {
                (bounds.min[axis], bounds.max[axis])
            } else {
                (-bounds.max[axis], -bounds.min[axis])
            };
            return if self.dist <= lo {
                PlaneSide::Front
            } else if self.dist >= hi {
                PlaneSide::Back
            } else {
                PlaneSide::Cross
            };
        }

        // Nearest and farthest corners along the normal, picked from the signbits.
        let mut far = Vec3::zeros();
        let mut near = Vec3::zeros();
        for i in 0..3 {
            if self.signbits & (1 << i) == 0 {
                far[i] = bounds.max[i];
                near[i] = bounds.min[i];
            } else {
                far[i] = bounds.min[i];
                near[i] = bounds.max[i];
            }
        }
        let dist_far = self.normal.dot(&far);
        let dist_near = self.normal.dot(&near);

        let mut sides = 0;
        if dist_far >= self.dist {
            sides |= 1;
        }
        if dist_near < self.dist {
            sides |= 2;
        }
        match sides {
            1 => PlaneSide::Front,
            2 => PlaneSide::Back,
            _ => PlaneSide::Cross,
        }
    }

    /// Classify a sphere against the plane
    pub fn sphere_side(&self, center: &Vec3, radius: f32) -> PlaneSide {
        let d = self.distance_to_point(center);
        if d < -radius {
            PlaneSide::Back
        } else if d <= radius {
            PlaneSide::Cross
        } else {
            PlaneSide::Front
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box_at(center: Vec3) -> Aabb {
        Aabb::from_center_radius(center, 1.0)
    }

    #[test]
    fn test_plane_classification() {
        let p = Plane::new(Vec3::new(0.0, -1.0, 0.0), 4.0);
        assert_eq!(p.kind, PlaneType::AxialY);
        assert_eq!(p.signbits, 0b010);

        let q = Plane::new(Vec3::new(-0.6, 0.0, -0.8), 0.0);
        assert_eq!(q.kind, PlaneType::NonAxial);
        assert_eq!(q.signbits, 0b101);
    }

    #[test]
    fn test_axial_box_side() {
        let p = Plane::new(Vec3::new(1.0, 0.0, 0.0), 5.0);
        assert_eq!(p.box_side(&unit_box_at(Vec3::new(10.0, 0.0, 0.0))), PlaneSide::Front);
        assert_eq!(p.box_side(&unit_box_at(Vec3::new(0.0, 0.0, 0.0))), PlaneSide::Back);
        assert_eq!(p.box_side(&unit_box_at(Vec3::new(5.0, 0.0, 0.0))), PlaneSide::Cross);

        let n = Plane::new(Vec3::new(-1.0, 0.0, 0.0), -5.0);
        assert_eq!(n.box_side(&unit_box_at(Vec3::new(10.0, 0.0, 0.0))), PlaneSide::Back);
        assert_eq!(n.box_side(&unit_box_at(Vec3::new(0.0, 0.0, 0.0))), PlaneSide::Front);
    }

    #[test]
    fn test_non_axial_box_side_matches_corner_scan() {
        let p = Plane::new(Vec3::new(1.0, 1.0, 0.0).normalize(), 2.0);
        for center in [
            Vec3::new(5.0, 5.0, 0.0),
            Vec3::new(-5.0, -5.0, 3.0),
            Vec3::new(1.4, 1.4, 0.0),
            Vec3::new(0.0, 2.9, -1.0),
        ] {
            let b = unit_box_at(center);
            let dists: Vec<f32> = b.corners().iter().map(|c| p.distance_to_point(c)).collect();
            let expected = if dists.iter().all(|d| *d >= 0.0) {
                PlaneSide::Front
            } else if dists.iter().all(|d| *d < 0.0) {
                PlaneSide::Back
            } else {
                PlaneSide::Cross
            };
            assert_eq!(p.box_side(&b), expected, "center {center:?}");
        }
    }

    #[test]
    fn test_from_points_winding() {
        let p = Plane::from_points(
            &Vec3::new(0.0, 0.0, 0.0),
            &Vec3::new(0.0, 1.0, 0.0),
            &Vec3::new(1.0, 0.0, 0.0),
        )
        .unwrap();
        assert_eq!(p.normal, Vec3::new(0.0, 0.0, 1.0));
        assert!(Plane::from_points(&Vec3::zeros(), &Vec3::zeros(), &Vec3::x()).is_none());
    }

    #[test]
    fn test_default_plane_accepts_everything() {
        let p = Plane::default();
        assert_eq!(p.box_side(&unit_box_at(Vec3::repeat(-1.0e6))), PlaneSide::Front);
    }

    #[test]
    fn test_sphere_side() {
        let p = Plane::new(Vec3::z(), 0.0);
        assert_eq!(p.sphere_side(&Vec3::new(0.0, 0.0, 5.0), 1.0), PlaneSide::Front);
        assert_eq!(p.sphere_side(&Vec3::new(0.0, 0.0, -5.0), 1.0), PlaneSide::Back);
        assert_eq!(p.sphere_side(&Vec3::new(0.0, 0.0, 0.5), 1.0), PlaneSide::Cross);
    }
}
