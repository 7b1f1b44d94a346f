//! Scene entities

use bitflags::bitflags;

use crate::foundation::math::{matrix_from_axes, Axes, Mat4, Vec3, IDENTITY_AXES};
use crate::render::culling::CullResult;
use crate::render::model::ModelHandle;
use crate::render::shader::ShaderHandle;
use crate::spatial::Aabb;

/// How an entity turns into geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntityKind {
    /// Model referenced by handle
    #[default]
    Model,
    /// Camera-facing quad
    Sprite,
    /// Ground splash
    Splash,
    /// Straight beam between two points
    Beam,
    /// Jagged lightning bolt
    Lightning,
    /// Rail trail core
    RailCore,
    /// Tapered rail trail core
    RailCoreTaper,
    /// Rail trail rings
    RailRings,
    /// Invisible marker telling a portal surface where its camera is
    PortalSurface,
}

impl EntityKind {
    /// Generated geometry that is never culled
    pub const fn is_generated(self) -> bool {
        matches!(
            self,
            Self::Sprite | Self::Splash | Self::Beam | Self::Lightning | Self::RailCore | Self::RailCoreTaper | Self::RailRings
        )
    }
}

bitflags! {
    /// Render effect flags of an entity
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RenderFx: u32 {
        /// Always has some light
        const MINLIGHT = 1 << 0;
        /// Only drawn in portal and mirror views
        const THIRD_PERSON = 1 << 1;
        /// Never drawn in portal and mirror views
        const FIRST_PERSON = 1 << 2;
        /// Depth range hack for view weapons
        const DEPTHHACK = 1 << 3;
        /// Casts no shadows
        const NOSHADOW = 1 << 6;
        /// Lighting sampled at `lighting_origin`
        const LIGHTING_ORIGIN = 1 << 7;
    }
}

/// An entity as submitted by game code
#[derive(Debug, Clone, PartialEq)]
pub struct RefEntity {
    /// Geometry source
    pub kind: EntityKind,
    /// Effect flags
    pub render_fx: RenderFx,
    /// Model for [`EntityKind::Model`]
    pub model: Option<ModelHandle>,
    /// Placement
    pub origin: Vec3,
    /// Previous placement; portal camera position for portal markers
    pub old_origin: Vec3,
    /// Orientation
    pub axis: Axes,
    /// Override material
    pub custom_shader: Option<ShaderHandle>,
    /// Animation frame; rotation speed for portal markers
    pub frame: i32,
    /// Previous animation frame; enables portal camera rotation when non-zero
    pub old_frame: i32,
    /// Skin; rotation offset for portal markers
    pub skin_num: i32,
    /// Sprite radius
    pub radius: f32,
    /// Sprite rotation in degrees
    pub rotation: f32,
    /// Modulation color
    pub shader_rgba: [u8; 4],
}

impl Default for RefEntity {
    fn default() -> Self {
        Self {
            kind: EntityKind::Model,
            render_fx: RenderFx::empty(),
            model: None,
            origin: Vec3::zeros(),
            old_origin: Vec3::zeros(),
            axis: IDENTITY_AXES,
            custom_shader: None,
            frame: 0,
            old_frame: 0,
            skin_num: 0,
            radius: 0.0,
            rotation: 0.0,
            shader_rgba: [255; 4],
        }
    }
}

impl RefEntity {
    /// Model entity
    pub fn model(model: ModelHandle, origin: Vec3, axis: Axes) -> Self {
        Self {
            model: Some(model),
            origin,
            old_origin: origin,
            axis,
            ..Self::default()
        }
    }

    /// Sprite entity
    pub fn sprite(shader: ShaderHandle, origin: Vec3, radius: f32) -> Self {
        Self {
            kind: EntityKind::Sprite,
            custom_shader: Some(shader),
            origin,
            old_origin: origin,
            radius,
            ..Self::default()
        }
    }

    /// Portal marker; `camera` equal to `origin` makes the surface a mirror
    pub fn portal_surface(origin: Vec3, camera: Vec3, camera_axis: Axes) -> Self {
        Self {
            kind: EntityKind::PortalSurface,
            origin,
            old_origin: camera,
            axis: camera_axis,
            ..Self::default()
        }
    }

    /// Local-to-world matrix
    pub fn local_to_world(&self) -> Mat4 {
        matrix_from_axes(&self.origin, &self.axis)
    }

    /// `true` when every placement value is finite
    pub fn is_finite(&self) -> bool {
        self.origin.iter().all(|v| v.is_finite())
            && self.axis.iter().all(|a| a.iter().all(|v| v.is_finite()))
    }
}

/// A scene entity plus the results of culling it in the current view
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEntity {
    /// Submitted parameters
    pub ent: RefEntity,
    /// Model-space bounds
    pub local_bounds: Aabb,
    /// World-space bounds
    pub world_bounds: Aabb,
    /// Camera visibility
    pub cull: CullResult,
    /// Local-to-world
    pub local_to_world: Mat4,
}

impl FrameEntity {
    /// Wrap an entity; bounds are filled in when it is culled
    pub fn new(ent: RefEntity) -> Self {
        let local_to_world = ent.local_to_world();
        Self {
            ent,
            local_bounds: Aabb::empty(),
            world_bounds: Aabb::empty(),
            cull: CullResult::Clip,
            local_to_world,
        }
    }

    /// Set the model-space bounds and derive the world box
    pub fn set_local_bounds(&mut self, bounds: Aabb) {
        self.local_bounds = bounds;
        self.world_bounds = bounds.transformed(&self.local_to_world);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::axes_from_angles;
    use approx::assert_relative_eq;

    #[test]
    fn test_world_bounds_follow_axis() {
        let mut models: slotmap::SlotMap<ModelHandle, ()> = slotmap::SlotMap::with_key();
        let handle = models.insert(());
        let mut ent = FrameEntity::new(RefEntity::model(handle, Vec3::new(100.0, 0.0, 0.0), axes_from_angles(0.0, 90.0, 0.0)));
        ent.set_local_bounds(Aabb::new(Vec3::new(0.0, -1.0, -1.0), Vec3::new(10.0, 1.0, 1.0)));
        assert_relative_eq!(ent.world_bounds.min, Vec3::new(99.0, 0.0, -1.0), epsilon = 1e-4);
        assert_relative_eq!(ent.world_bounds.max, Vec3::new(101.0, 10.0, 1.0), epsilon = 1e-4);
    }

    #[test]
    fn test_generated_kinds() {
        assert!(EntityKind::Beam.is_generated());
        assert!(!EntityKind::Model.is_generated());
        assert!(!EntityKind::PortalSurface.is_generated());
    }

    #[test]
    fn test_non_finite_origin_detected() {
        let ent = RefEntity { origin: Vec3::new(f32::NAN, 0.0, 0.0), ..Default::default() };
        assert!(!ent.is_finite());
        assert!(RefEntity::default().is_finite());
    }
}
