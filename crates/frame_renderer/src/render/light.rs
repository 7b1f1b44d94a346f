//! Scene lights and their per-frame setup
//!
//! A [`RefLight`] is what game code submits. The renderer wraps it in a
//! [`FrameLight`] that carries everything derived from the placement: the
//! light transform, local and world bounds, the light-space frustum and the
//! view-dependent scissor rectangle.

use bitflags::bitflags;

use crate::foundation::math::{
    affine_inverse, constants, orthographic, perspective_fov_xy, world_to_gl, Axes, Mat4, Quat,
    RigidTransform, Vec3, Vec4,
};
use crate::render::culling::CullResult;
use crate::render::interaction::InteractionSlice;
use crate::render::shader::ShaderHandle;
use crate::render::view::Viewport;
use crate::spatial::{Aabb, Frustum, Plane};

/// Shape of a light's volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LightKind {
    /// Point light with a box-shaped radius
    #[default]
    Omni,
    /// Spot light with a pyramid volume
    Projective,
    /// Sun-like light with a box volume and parallel rays
    Directional,
}

bitflags! {
    /// Per-light behaviour switches
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LightFlags: u32 {
        /// Never casts shadows
        const NO_SHADOWS = 1 << 0;
        /// Shadows only from entities sharing the light's shadow group
        const INVERSE_SHADOWS = 1 << 1;
        /// Already baked into lightmaps or vertex colors
        const NO_RADIOSITY = 1 << 2;
        /// Excluded from occlusion queries
        const NO_OCCLUSION_QUERIES = 1 << 3;
    }
}

/// A light as submitted by game code
#[derive(Debug, Clone, PartialEq)]
pub struct RefLight {
    /// Volume shape
    pub kind: LightKind,
    /// Placement
    pub origin: Vec3,
    /// Offset of the emitting point from `origin`, in light space
    pub center: Vec3,
    /// Orientation of the light volume
    pub rotation: Quat,
    /// Half-size of the volume along each light axis (omni, directional)
    pub radius: Vec3,
    /// Color
    pub color: Vec3,
    /// Intensity multiplier; negative means "use 1"
    pub scale: f32,
    /// Horizontal field of view in degrees (projective)
    pub fov_x: f32,
    /// Vertical field of view in degrees (projective)
    pub fov_y: f32,
    /// Reach of the pyramid (projective)
    pub distance: f32,
    /// Behaviour switches
    pub flags: LightFlags,
    /// Falloff material
    pub attenuation_shader: Option<ShaderHandle>,
}

impl Default for RefLight {
    fn default() -> Self {
        Self {
            kind: LightKind::Omni,
            origin: Vec3::zeros(),
            center: Vec3::zeros(),
            rotation: Quat::identity(),
            radius: Vec3::repeat(100.0),
            color: Vec3::repeat(1.0),
            scale: 1.0,
            fov_x: 90.0,
            fov_y: 90.0,
            distance: 100.0,
            flags: LightFlags::empty(),
            attenuation_shader: None,
        }
    }
}

impl RefLight {
    /// Point light of the given radius
    pub fn omni(origin: Vec3, radius: f32, color: Vec3) -> Self {
        Self {
            origin,
            radius: Vec3::repeat(radius),
            color,
            ..Self::default()
        }
    }

    /// Spot light looking down the rotated +X axis
    pub fn projective(origin: Vec3, rotation: Quat, fov_x: f32, fov_y: f32, distance: f32) -> Self {
        Self {
            kind: LightKind::Projective,
            origin,
            rotation,
            fov_x,
            fov_y,
            distance,
            ..Self::default()
        }
    }

    /// Parallel light filling a box
    pub fn directional(origin: Vec3, rotation: Quat, radius: Vec3) -> Self {
        Self {
            kind: LightKind::Directional,
            origin,
            rotation,
            radius,
            ..Self::default()
        }
    }

    /// `true` when the light cannot light anything
    pub fn is_degenerate(&self) -> bool {
        match self.kind {
            LightKind::Omni | LightKind::Directional => self.radius.x <= 0.0 && self.radius.norm() == 0.0,
            LightKind::Projective => self.distance <= 0.0,
        }
    }

    /// Whether the light may produce shadow interactions
    pub const fn casts_shadows(&self) -> bool {
        !self.flags.contains(LightFlags::NO_SHADOWS)
    }
}

/// Screen-space rectangle touched by a light
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Scissor {
    /// Left edge
    pub x: i32,
    /// Bottom edge
    pub y: i32,
    /// Width
    pub width: i32,
    /// Height
    pub height: i32,
}

impl Scissor {
    /// Whole viewport
    pub const fn full(viewport: &Viewport) -> Self {
        Self {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
        }
    }
}

/// Project a world box into the viewport.
///
/// A corner on or behind the eye plane makes the projection unbounded, so
/// the whole viewport is returned in that case.
pub fn light_scissor(world_bounds: &Aabb, mvp: &Mat4, viewport: &Viewport) -> Scissor {
    if world_bounds.is_empty() {
        return Scissor::full(viewport);
    }

    let mut min = [f32::MAX; 2];
    let mut max = [f32::MIN; 2];
    for corner in world_bounds.corners() {
        let clip = mvp * Vec4::new(corner.x, corner.y, corner.z, 1.0);
        if clip.w <= f32::EPSILON {
            return Scissor::full(viewport);
        }
        let ndc = [clip.x / clip.w, clip.y / clip.w];
        for axis in 0..2 {
            min[axis] = min[axis].min(ndc[axis]);
            max[axis] = max[axis].max(ndc[axis]);
        }
    }

    let to_window = |ndc: f32, origin: i32, size: i32| -> i32 {
        let v = origin as f32 + (ndc.clamp(-1.0, 1.0) + 1.0) * 0.5 * size as f32;
        v.round() as i32
    };
    let x0 = to_window(min[0], viewport.x, viewport.width);
    let x1 = to_window(max[0], viewport.x, viewport.width);
    let y0 = to_window(min[1], viewport.y, viewport.height);
    let y1 = to_window(max[1], viewport.y, viewport.height);

    Scissor { x: x0, y: y0, width: x1 - x0, height: y1 - y0 }
}

/// Six planes bounding an oriented box, inward facing.
fn oriented_box_frustum(origin: &Vec3, axes: &Axes, radius: &Vec3) -> Frustum {
    let mut planes = [Plane::default(); 6];
    for i in 0..3 {
        planes[i * 2] = Plane::through_point(axes[i], &(origin - axes[i] * radius[i]));
        planes[i * 2 + 1] = Plane::through_point(-axes[i], &(origin + axes[i] * radius[i]));
    }
    Frustum::from_planes(&planes)
}

/// A scene light plus everything derived from it for the current view
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLight {
    /// Submitted parameters
    pub light: RefLight,
    /// Index into the world's static lights, `None` for dynamic lights
    pub static_index: Option<usize>,
    /// Camera visibility of the light volume
    pub cull: CullResult,
    /// Volume is outside the camera view but kept to cast shadows
    pub outside_view: bool,
    /// Emitting point in world space
    pub world_origin: Vec3,
    /// Light-to-world
    pub transform: Mat4,
    /// World-to-light
    pub view_matrix: Mat4,
    /// Light projection (projective and directional lights)
    pub projection: Mat4,
    /// Volume in light space
    pub local_bounds: Aabb,
    /// Volume in world space
    pub world_bounds: Aabb,
    /// Light volume planes in world space
    pub frustum: Frustum,
    /// Screen rectangle touched by the light in the current view
    pub scissor: Scissor,
    /// This light's interactions in the frame arena
    pub interactions: InteractionSlice,
    /// Interactions built for this light in the current view
    pub num_interactions: usize,
    /// How many of them only cast shadows
    pub num_shadow_only: usize,
    /// How many of them only receive light
    pub num_light_only: usize,
}

impl FrameLight {
    /// Wrap a light and derive its transform, bounds and frustum
    pub fn new(light: RefLight, static_index: Option<usize>) -> Self {
        let mut frame_light = Self {
            light,
            static_index,
            cull: CullResult::Clip,
            outside_view: false,
            world_origin: Vec3::zeros(),
            transform: Mat4::identity(),
            view_matrix: Mat4::identity(),
            projection: Mat4::identity(),
            local_bounds: Aabb::empty(),
            world_bounds: Aabb::empty(),
            frustum: Frustum::default(),
            scissor: Scissor::default(),
            interactions: InteractionSlice::default(),
            num_interactions: 0,
            num_shadow_only: 0,
            num_light_only: 0,
        };
        frame_light.setup();
        frame_light
    }

    /// Baked into the world
    pub const fn is_static(&self) -> bool {
        self.static_index.is_some()
    }

    /// Recompute every placement-derived field
    pub fn setup(&mut self) {
        let placement = RigidTransform::new(self.light.origin, self.light.rotation);
        self.transform = placement.matrix();
        self.view_matrix = affine_inverse(&self.transform);
        self.world_origin = self.light.origin + self.light.rotation * self.light.center;

        let axes = placement.axes();
        match self.light.kind {
            LightKind::Omni => {
                self.local_bounds = Aabb::new(-self.light.radius, self.light.radius);
                self.projection = Mat4::identity();
                self.frustum = oriented_box_frustum(&self.light.origin, &axes, &self.light.radius);
            }
            LightKind::Directional => {
                let r = self.light.radius;
                self.local_bounds = Aabb::new(-r, r);
                self.projection = orthographic(r.y.max(f32::EPSILON), r.z.max(f32::EPSILON), -r.x, r.x.max(f32::EPSILON));
                self.frustum = oriented_box_frustum(&self.light.origin, &axes, &r);
            }
            LightKind::Projective => {
                let distance = self.light.distance.max(f32::EPSILON);
                let z_near = if distance > 2.0 { 1.0 } else { distance * 0.5 };
                self.projection = perspective_fov_xy(self.light.fov_x, self.light.fov_y, z_near, distance);

                let half_x = (self.light.fov_x * 0.5 * constants::DEG_TO_RAD).tan() * distance;
                let half_y = (self.light.fov_y * 0.5 * constants::DEG_TO_RAD).tan() * distance;
                let mut bounds = Aabb::empty();
                bounds.add_point(&Vec3::zeros());
                for (sy, sz) in [(-1.0, -1.0), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0)] {
                    bounds.add_point(&Vec3::new(distance, sy * half_x, sz * half_y));
                }
                self.local_bounds = bounds;
                self.frustum = Frustum::from_matrix(&(self.projection * world_to_gl() * self.view_matrix));
            }
        }

        self.world_bounds = self.local_bounds.transformed(&self.transform);
    }

    /// Forget the previous view's results
    pub fn reset_interactions(&mut self) {
        self.interactions = InteractionSlice::default();
        self.num_interactions = 0;
        self.num_shadow_only = 0;
        self.num_light_only = 0;
        self.outside_view = false;
    }
}
