//! # Culling Engine
//!
//! Pure visibility predicates. Every function here takes its inputs by
//! reference and returns a classification; none of them touch renderer
//! state, so identical inputs always give identical answers.
//!
//! ## Tests
//!
//! - **Box**: [`cull_box`] against an arbitrary plane set
//! - **Sphere**: [`cull_point_and_radius`], used as a cheap pre-filter
//! - **Local box**: [`cull_local_box`], corners transformed to world space first
//! - **Cube sides**: [`cube_side_bits`], which faces of an omni light's
//!   shadow cube a box can touch

use bitflags::bitflags;

use crate::foundation::math::{Mat4, Point3, Vec3};
use crate::spatial::{Aabb, Plane, PlaneSide};

/// Visibility classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullResult {
    /// Entirely inside every plane
    In,
    /// Partially inside
    #[default]
    Clip,
    /// Entirely outside at least one plane
    Out,
}

impl CullResult {
    /// `true` unless the volume was rejected
    pub const fn is_visible(self) -> bool {
        !matches!(self, Self::Out)
    }
}

bitflags! {
    /// Faces of an omni light's shadow cube, in render order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CubeSides: u8 {
        /// Looking down +X
        const POS_X = 1 << 0;
        /// Looking down -X
        const NEG_X = 1 << 1;
        /// Looking down +Y
        const POS_Y = 1 << 2;
        /// Looking down -Y
        const NEG_Y = 1 << 3;
        /// Looking down +Z
        const POS_Z = 1 << 4;
        /// Looking down -Z
        const NEG_Z = 1 << 5;
        /// Render into every face
        const CLIP_ALL = Self::POS_X.bits() | Self::NEG_X.bits() | Self::POS_Y.bits()
            | Self::NEG_Y.bits() | Self::POS_Z.bits() | Self::NEG_Z.bits();
    }
}

/// Face view directions matching the bit order of [`CubeSides`]
const CUBE_FACE_DIRECTIONS: [(CubeSides, Vec3, Vec3, Vec3); 6] = [
    (CubeSides::POS_X, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.0)),
    (CubeSides::NEG_X, Vec3::new(-1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.0)),
    (CubeSides::POS_Y, Vec3::new(0.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0)),
    (CubeSides::NEG_Y, Vec3::new(0.0, -1.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0)),
    (CubeSides::POS_Z, Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)),
    (CubeSides::NEG_Z, Vec3::new(0.0, 0.0, -1.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)),
];

/// Classify a world-space box against a plane set.
///
/// `no_cull` forces [`CullResult::Clip`] so debugging overrides still run
/// every downstream step.
pub fn cull_box(planes: &[Plane], bounds: &Aabb, no_cull: bool) -> CullResult {
    if no_cull {
        return CullResult::Clip;
    }

    let mut any_clip = false;
    for plane in planes {
        match plane.box_side(bounds) {
            PlaneSide::Back => return CullResult::Out,
            PlaneSide::Cross => any_clip = true,
            PlaneSide::Front => {}
        }
    }

    if any_clip {
        CullResult::Clip
    } else {
        CullResult::In
    }
}

/// Classify a sphere against a plane set.
pub fn cull_point_and_radius(planes: &[Plane], origin: &Vec3, radius: f32, no_cull: bool) -> CullResult {
    if no_cull {
        return CullResult::Clip;
    }

    let mut mightbe_clipped = false;
    for plane in planes {
        match plane.sphere_side(origin, radius) {
            PlaneSide::Back => return CullResult::Out,
            PlaneSide::Cross => mightbe_clipped = true,
            PlaneSide::Front => {}
        }
    }

    if mightbe_clipped {
        CullResult::Clip
    } else {
        CullResult::In
    }
}

/// Sphere pre-filter followed by the box test when the sphere straddles.
pub fn cull_sphere_then_box(
    planes: &[Plane],
    origin: &Vec3,
    radius: f32,
    bounds: &Aabb,
    no_cull: bool,
) -> CullResult {
    match cull_point_and_radius(planes, origin, radius, no_cull) {
        CullResult::Clip => cull_box(planes, bounds, no_cull),
        decided => decided,
    }
}

/// Classify a box given in local space, placed in the world by `local_to_world`.
///
/// The eight corners are transformed and tested individually, which is
/// tighter than testing the world-space box around them.
pub fn cull_local_box(planes: &[Plane], local: &Aabb, local_to_world: &Mat4, no_cull: bool) -> CullResult {
    if no_cull {
        return CullResult::Clip;
    }

    let corners = local
        .corners()
        .map(|c| local_to_world.transform_point(&Point3::from(c)).coords);

    let mut any_back = false;
    for plane in planes {
        let mut front = false;
        let mut back = false;
        for corner in &corners {
            if plane.distance_to_point(corner) >= 0.0 {
                front = true;
            } else {
                back = true;
            }
        }

        if !front {
            return CullResult::Out;
        }
        any_back |= back;
    }

    if any_back {
        CullResult::Clip
    } else {
        CullResult::In
    }
}

/// Which faces of an omni light's shadow cube the box can be seen from.
///
/// `light_bounds` is the light's world box. A box outside it touches no
/// face; a box containing the light origin touches all six. When cube-side
/// evaluation is disabled every face is returned.
pub fn cube_side_bits(light_origin: &Vec3, light_bounds: &Aabb, bounds: &Aabb, enabled: bool) -> CubeSides {
    if !bounds.intersects(light_bounds) {
        return CubeSides::empty();
    }
    if !enabled {
        return CubeSides::CLIP_ALL;
    }

    let mut sides = CubeSides::empty();
    for (side, forward, u, v) in CUBE_FACE_DIRECTIONS {
        // 90 degree pyramid with its apex at the light
        let planes = [
            Plane::through_point((forward + u).normalize(), light_origin),
            Plane::through_point((forward - u).normalize(), light_origin),
            Plane::through_point((forward + v).normalize(), light_origin),
            Plane::through_point((forward - v).normalize(), light_origin),
        ];
        if cull_box(&planes, bounds, false) != CullResult::Out {
            sides |= side;
        }
    }
    sides
}
