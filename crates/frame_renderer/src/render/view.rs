//! # Views
//!
//! [`RefDef`] is the scene description game code hands to `render_scene`.
//! [`ViewParms`] is the camera state of one view: the top-level view built
//! from the refdef, or a portal/mirror view derived from a surface inside
//! another view. A view lives for exactly one `render_view` call.
//!
//! ## Projection passes
//!
//! The first pass projects with an infinite far plane because the far clip
//! depends on what the view turns out to see. Once every visible bound has
//! been folded into `vis_bounds`, [`ViewParms::set_far_clip`] picks the real
//! distance and the projection and frustum are rebuilt from the final
//! view-projection matrix.

use std::ops::Range;

use bitflags::bitflags;

use crate::core::config::RendererConfig;
use crate::foundation::math::{
    affine_inverse, matrix_from_axes, perspective_fov_xy, perspective_fov_xy_infinite, world_to_gl, Axes, Mat4, Vec3,
    IDENTITY_AXES,
};
use crate::render::{RenderError, RenderResult};
use crate::spatial::{split_frustums, Aabb, Frustum, Plane, SplitFrustums};

/// Portal recursion levels allowed below the top-level view
pub const MAX_PORTAL_DEPTH: u32 = 1;

/// Far clip of views that see nothing, or do not draw the world
pub const DEFAULT_FAR_CLIP: f32 = 2048.0;

/// Pixel rectangle of a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    /// Left edge
    pub x: i32,
    /// Bottom edge
    pub y: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl Viewport {
    /// `true` when the rectangle covers at least one pixel
    pub const fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

bitflags! {
    /// Kind of view
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ViewFlags: u32 {
        /// Rendered through a portal or mirror surface
        const PORTAL = 1 << 0;
        /// Rendered through a mirror; winding is reversed
        const MIRROR = 1 << 1;
    }
}

bitflags! {
    /// Scene description flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RefDefFlags: u32 {
        /// Do not draw the world (menus, model previews)
        const NO_WORLD_MODEL = 1 << 0;
        /// Teleport effect
        const HYPERSPACE = 1 << 2;
        /// Scene is a sky portal
        const SKYBOX_PORTAL = 1 << 3;
        /// Camera is under water
        const UNDERWATER = 1 << 4;
    }
}

/// Position and basis (forward, left, up)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    /// Position
    pub origin: Vec3,
    /// Forward, left, up
    pub axis: Axes,
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            origin: Vec3::zeros(),
            axis: IDENTITY_AXES,
        }
    }
}

impl Orientation {
    /// Placement from an origin and a basis
    pub const fn new(origin: Vec3, axis: Axes) -> Self {
        Self { origin, axis }
    }
}

/// Parts of the frame's scene arrays that belong to one scene
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SceneSlices {
    /// Entities
    pub entities: Range<usize>,
    /// Lights
    pub lights: Range<usize>,
    /// Polygons
    pub polys: Range<usize>,
    /// Polygon buffers
    pub poly_buffers: Range<usize>,
    /// Decal projectors
    pub decal_projectors: Range<usize>,
}

/// Scene description for one `render_scene` call
#[derive(Debug, Clone, PartialEq)]
pub struct RefDef {
    /// Viewport left edge
    pub x: i32,
    /// Viewport bottom edge
    pub y: i32,
    /// Viewport width
    pub width: i32,
    /// Viewport height
    pub height: i32,
    /// Horizontal field of view in degrees
    pub fov_x: f32,
    /// Vertical field of view in degrees
    pub fov_y: f32,
    /// Camera position
    pub view_origin: Vec3,
    /// Camera basis
    pub view_axis: Axes,
    /// Game time in milliseconds, drives portal camera rotation
    pub time: i32,
    /// Scene flags
    pub flags: RefDefFlags,
    /// Filled by `render_scene`
    pub scene: SceneSlices,
}

impl Default for RefDef {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 640,
            height: 480,
            fov_x: 90.0,
            fov_y: 73.74,
            view_origin: Vec3::zeros(),
            view_axis: IDENTITY_AXES,
            time: 0,
            flags: RefDefFlags::empty(),
            scene: SceneSlices::default(),
        }
    }
}

impl RefDef {
    /// Camera at `origin` looking along `axis[0]`
    pub fn new(origin: Vec3, axis: Axes, width: i32, height: i32, fov_x: f32, fov_y: f32) -> Self {
        Self {
            width,
            height,
            fov_x,
            fov_y,
            view_origin: origin,
            view_axis: axis,
            ..Self::default()
        }
    }

    /// Viewport rectangle
    pub const fn viewport(&self) -> Viewport {
        Viewport {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// Camera state of one view
#[derive(Debug, Clone, PartialEq)]
pub struct ViewParms {
    /// Camera placement
    pub orientation: Orientation,
    /// Point used for cluster visibility; the portal marker's position for portal views
    pub pvs_origin: Vec3,
    /// Portal/mirror flags
    pub flags: ViewFlags,
    /// Recursion level, `0` for the top-level view
    pub portal_depth: u32,
    /// Clip plane of portal views; geometry behind it belongs to the other side
    pub portal_plane: Plane,
    /// Pixel rectangle
    pub viewport: Viewport,
    /// Horizontal field of view in degrees
    pub fov_x: f32,
    /// Vertical field of view in degrees
    pub fov_y: f32,
    /// Near clip distance
    pub z_near: f32,
    /// Far clip distance, `0` while the projection is infinite
    pub z_far: f32,
    /// World to GL eye space
    pub view_matrix: Mat4,
    /// Eye to clip space
    pub projection: Mat4,
    /// Window coordinates (pixels, depth in `0..1`) to world space
    pub unprojection: Mat4,
    /// Camera frustum
    pub frustum: Frustum,
    /// Depth slices of the frustum
    pub split: SplitFrustums,
    /// Everything the view found visible so far
    pub vis_bounds: Aabb,
    /// First draw surface count of the view
    pub first_draw_surf: usize,
    /// Draw surfaces added by the view
    pub num_draw_surfs: usize,
    /// First interaction of the view in the frame arena
    pub first_interaction: usize,
    /// Interactions kept by the view
    pub num_interactions: usize,
    /// Scene number within the frame
    pub frame_scene_num: u32,
    /// Frame number
    pub frame_count: u32,
    /// Stamp used to visit each surface once
    pub view_count: u32,
}

impl ViewParms {
    /// Top-level view of a scene description
    pub fn from_refdef(refdef: &RefDef, z_near: f32) -> Self {
        Self {
            orientation: Orientation::new(refdef.view_origin, refdef.view_axis),
            pvs_origin: refdef.view_origin,
            flags: ViewFlags::empty(),
            portal_depth: 0,
            portal_plane: Plane::default(),
            viewport: refdef.viewport(),
            fov_x: refdef.fov_x,
            fov_y: refdef.fov_y,
            z_near,
            z_far: 0.0,
            view_matrix: Mat4::identity(),
            projection: Mat4::identity(),
            unprojection: Mat4::identity(),
            frustum: Frustum::default(),
            split: SplitFrustums::default(),
            vis_bounds: Aabb::empty(),
            first_draw_surf: 0,
            num_draw_surfs: 0,
            first_interaction: 0,
            num_interactions: 0,
            frame_scene_num: 0,
            frame_count: 0,
            view_count: 0,
        }
    }

    /// Rendered through a portal or mirror
    pub const fn is_portal(&self) -> bool {
        self.flags.contains(ViewFlags::PORTAL)
    }

    /// Rendered through a mirror
    pub const fn is_mirror(&self) -> bool {
        self.flags.contains(ViewFlags::MIRROR)
    }

    /// View-projection matrix
    pub fn mvp(&self) -> Mat4 {
        self.projection * self.view_matrix
    }

    /// Range of draw surface counts this view wrote
    pub const fn draw_surf_range(&self) -> Range<usize> {
        self.first_draw_surf..self.first_draw_surf + self.num_draw_surfs
    }

    /// Build the world-to-eye matrix from the camera placement
    pub fn rotate_for_viewer(&mut self) {
        let camera = matrix_from_axes(&self.orientation.origin, &self.orientation.axis);
        self.view_matrix = world_to_gl() * affine_inverse(&camera);
    }

    /// Build the projection.
    ///
    /// A configured far clip overrides and may only push the plane further
    /// out. Without one, `infinite` selects the far-plane-at-infinity
    /// projection used by the first pass.
    pub fn setup_projection(&mut self, config: &RendererConfig, infinite: bool) {
        self.z_near = config.z_near;
        if config.z_far != 0.0 {
            self.z_far = self.z_far.max(config.z_far);
        } else if infinite {
            self.z_far = 0.0;
        }

        self.projection = if self.z_far <= 0.0 || infinite {
            perspective_fov_xy_infinite(self.fov_x, self.fov_y, self.z_near)
        } else {
            perspective_fov_xy(self.fov_x, self.fov_y, self.z_near, self.z_far)
        };
    }

    /// Inverse of the window transform, view-projection included
    pub fn setup_unprojection(&mut self) -> RenderResult<()> {
        let inverse = self.mvp().try_inverse().ok_or(RenderError::SingularMatrix)?;
        let width = self.viewport.width.max(1) as f32;
        let height = self.viewport.height.max(1) as f32;
        let to_ndc = Mat4::new_translation(&Vec3::repeat(-1.0))
            * Mat4::new_nonuniform_scaling(&Vec3::new(2.0 / width, 2.0 / height, 2.0));
        self.unprojection = inverse * to_ndc;
        Ok(())
    }

    /// Side and near planes straight from the field of view
    pub fn setup_frustum(&mut self) {
        self.frustum = Frustum::from_fov(
            &self.orientation.origin,
            &self.orientation.axis,
            self.fov_x,
            self.fov_y,
            self.z_near,
        );
    }

    /// All six planes from the final view-projection matrix
    pub fn setup_frustum_from_mvp(&mut self) {
        self.frustum = Frustum::from_matrix(&self.mvp());
    }

    /// Depth slices of the final frustum
    pub fn setup_split_frustums(&mut self, splits: usize, lambda: f32) {
        self.split = split_frustums(
            &self.frustum,
            &self.orientation.origin,
            &self.orientation.axis[0],
            self.z_near,
            self.z_far,
            splits,
            lambda,
        );
    }

    /// Pick the far clip distance.
    ///
    /// Order: views without the world get [`DEFAULT_FAR_CLIP`]; a configured
    /// `z_far` wins next; otherwise the farthest corner of `vis_bounds`,
    /// pulled in to the opaque depth of the global fog when `wolf_fog` is on.
    pub fn set_far_clip(&mut self, config: &RendererConfig, draws_world: bool, global_fog_depth: Option<f32>) {
        if !draws_world {
            self.z_far = DEFAULT_FAR_CLIP;
            return;
        }
        if config.z_far != 0.0 {
            self.z_far = config.z_far;
            return;
        }
        if self.vis_bounds.is_empty() {
            self.z_far = DEFAULT_FAR_CLIP;
            return;
        }

        let origin = self.orientation.origin;
        let farthest = self
            .vis_bounds
            .corners()
            .iter()
            .map(|corner| (corner - origin).norm_squared())
            .fold(0.0f32, f32::max);
        self.z_far = farthest.sqrt();

        if config.wolf_fog {
            if let Some(depth) = global_fog_depth {
                if depth < self.z_far {
                    self.z_far = depth;
                }
            }
        }

        // A camera inside its own bounds with nothing else visible.
        if self.z_far <= self.z_near {
            self.z_far = DEFAULT_FAR_CLIP;
        }
    }
}
