//! # Portals and Mirrors
//!
//! A draw surface whose material sorts as a portal may open a second view.
//! The surface's plane is matched against the scene's portal marker
//! entities; a marker whose `old_origin` equals its `origin` turns the
//! surface into a mirror, any other marker names the remote camera.
//!
//! Only the top-level view may open a sub-view. A portal view that meets
//! another portal surface is refused and counted.

use crate::foundation::logging::debug;
use crate::foundation::math::{perpendicular_vector, rotate_point_around_vector, Point3, Vec3, Vec4};
use crate::render::context::RendererContext;
use crate::render::draw_surface::{DrawSurf, EntityRef, SurfaceRef};
use crate::render::entity::EntityKind;
use crate::render::stats::Overflow;
use crate::render::view::{Orientation, RefDef, ViewFlags, ViewParms};
use crate::render::RenderResult;
use crate::spatial::{Aabb, Plane};

/// Largest distance between a portal marker and the surface plane
pub const PORTAL_ENTITY_RANGE: f32 = 64.0;

/// Placement of a portal surface and of the camera that looks out of it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalOrientation {
    /// Surface origin and axes; `axis[0]` is the surface normal
    pub surface: Orientation,
    /// Remote camera
    pub camera: Orientation,
    /// Visibility point of the sub-view
    pub pvs_origin: Vec3,
    /// The marker turned the surface into a mirror
    pub is_mirror: bool,
}

/// Carry a point from surface space into camera space
pub fn mirror_point(point: &Vec3, surface: &Orientation, camera: &Orientation) -> Vec3 {
    let local = point - surface.origin;
    let mut transformed = camera.origin;
    for i in 0..3 {
        transformed += camera.axis[i] * local.dot(&surface.axis[i]);
    }
    transformed
}

/// Carry a direction from surface space into camera space
pub fn mirror_vector(vector: &Vec3, surface: &Orientation, camera: &Orientation) -> Vec3 {
    (0..3).fold(Vec3::zeros(), |acc, i| acc + camera.axis[i] * vector.dot(&surface.axis[i]))
}

/// Camera roll of a portal marker, in degrees
fn portal_roll(frame: i32, old_frame: i32, skin_num: i32, time: i32) -> Option<f32> {
    match (old_frame, frame, skin_num) {
        (0, _, 0) => None,
        (0, _, skin) => Some(skin as f32),
        (_, 0, skin) => Some(skin as f32 + (time as f32 * 0.003).sin() * 4.0),
        (_, frame, _) => Some(time as f32 / 1000.0 * frame as f32),
    }
}

impl RendererContext {
    /// Vertices of a draw surface in world space; empty for kinds without
    /// stored geometry
    fn surface_vertices(&self, draw_surf: &DrawSurf) -> (Vec<Vec3>, Vec<[Vec3; 3]>) {
        match draw_surf.surface {
            SurfaceRef::World(index) => {
                let Some(surface) = self.world.as_ref().and_then(|w| w.surfaces.get(index)) else {
                    return (Vec::new(), Vec::new());
                };
                let owner = match draw_surf.entity {
                    EntityRef::World => None,
                    EntityRef::Scene(i) => self.scene.entities.get(i as usize).map(|e| e.local_to_world),
                };
                let place = |v: &Vec3| owner.map_or(*v, |m| m.transform_point(&Point3::from(*v)).coords);
                let verts = surface.vertices.iter().map(place).collect();
                let tris = surface.triangles().map(|tri| tri.map(|v| place(&v))).collect();
                (verts, tris)
            }
            SurfaceRef::Poly(index) => {
                let Some(poly) = self.scene.polys.get(index) else {
                    return (Vec::new(), Vec::new());
                };
                let verts: Vec<Vec3> = self.scene.poly_vertices(poly).iter().map(|v| Vec3::from(v.xyz)).collect();
                let tris = verts.windows(2).skip(1).map(|pair| [verts[0], pair[0], pair[1]]).collect();
                (verts, tris)
            }
            _ => (Vec::new(), Vec::new()),
        }
    }

    /// Plane of a portal surface in world space and in the owner's
    /// untransformed frame
    fn portal_plane(&self, draw_surf: &DrawSurf) -> Option<(Plane, Plane)> {
        let local = match draw_surf.surface {
            SurfaceRef::World(index) => self.world.as_ref()?.surfaces.get(index)?.surface_plane()?,
            SurfaceRef::Poly(index) => {
                let poly = self.scene.polys.get(index)?;
                match self.scene.poly_vertices(poly) {
                    [a, b, c, ..] => Plane::from_points(&Vec3::from(a.xyz), &Vec3::from(b.xyz), &Vec3::from(c.xyz))?,
                    _ => return None,
                }
            }
            _ => return None,
        };

        match draw_surf.entity {
            EntityRef::World => Some((local, local)),
            EntityRef::Scene(i) => {
                let ent = &self.scene.entities.get(i as usize)?.ent;
                let normal = ent.axis[0] * local.normal.x + ent.axis[1] * local.normal.y + ent.axis[2] * local.normal.z;
                let world = Plane::new(normal, local.dist + normal.dot(&ent.origin));
                let original = Plane::new(local.normal, local.dist + local.normal.dot(&ent.origin));
                Some((world, original))
            }
        }
    }

    /// Find the marker entity of a portal surface and derive both placements.
    ///
    /// `None` when the scene holds no marker near the surface plane.
    pub fn portal_orientations(&self, draw_surf: &DrawSurf, refdef: &RefDef) -> Option<PortalOrientation> {
        let (plane, original) = self.portal_plane(draw_surf)?;

        let axis0 = plane.normal;
        let axis1 = perpendicular_vector(&axis0);
        let axis2 = axis0.cross(&axis1);
        let mut surface = Orientation::new(Vec3::zeros(), [axis0, axis1, axis2]);

        let marker = refdef
            .scene
            .entities
            .clone()
            .filter_map(|i| self.scene.entities.get(i))
            .map(|e| &e.ent)
            .filter(|e| e.kind == EntityKind::PortalSurface)
            .find(|e| (e.origin.dot(&original.normal) - original.dist).abs() <= PORTAL_ENTITY_RANGE)?;

        if marker.old_origin == marker.origin {
            surface.origin = plane.normal * plane.dist;
            let camera = Orientation::new(surface.origin, [-axis0, axis1, axis2]);
            return Some(PortalOrientation { surface, camera, pvs_origin: marker.old_origin, is_mirror: true });
        }

        let d = marker.origin.dot(&plane.normal) - plane.dist;
        surface.origin = marker.origin - plane.normal * d;

        let mut camera = Orientation::new(marker.old_origin, [-marker.axis[0], -marker.axis[1], marker.axis[2]]);
        if let Some(roll) = portal_roll(marker.frame, marker.old_frame, marker.skin_num, refdef.time) {
            camera.axis[1] = rotate_point_around_vector(&camera.axis[1], &camera.axis[0], roll);
            camera.axis[2] = camera.axis[0].cross(&camera.axis[1]);
        }

        Some(PortalOrientation { surface, camera, pvs_origin: marker.old_origin, is_mirror: false })
    }

    /// Whether a portal surface cannot contribute to the view.
    ///
    /// Off-screen means every vertex outside one clip plane, every triangle
    /// facing away, or, for portals, the nearest vertex beyond the
    /// material's portal range.
    pub fn surface_is_off_screen(&self, draw_surf: &DrawSurf, view: &ViewParms) -> bool {
        let (verts, tris) = self.surface_vertices(draw_surf);
        if verts.is_empty() {
            return true;
        }

        let mvp = view.mvp();
        let mut point_and = u32::MAX;
        for v in &verts {
            let clip = mvp * Vec4::new(v.x, v.y, v.z, 1.0);
            let mut flags = 0u32;
            for j in 0..3 {
                if clip[j] >= clip.w {
                    flags |= 1 << (2 * j);
                } else if clip[j] <= -clip.w {
                    flags |= 1 << (2 * j + 1);
                }
            }
            point_and &= flags;
        }
        if point_and != 0 {
            return true;
        }

        let origin = view.orientation.origin;
        let all_back_facing = tris.iter().all(|[a, b, c]| {
            Plane::from_points(a, b, c).map_or(true, |plane| (a - origin).dot(&plane.normal) >= 0.0)
        });
        if !tris.is_empty() && all_back_facing {
            return true;
        }

        let shader = self.shaders.get_or_default(draw_surf.shader);
        if shader.is_mirror {
            return false;
        }

        let shortest = verts.iter().map(|v| (v - origin).norm_squared()).fold(f32::MAX, f32::min);
        shortest > shader.portal_range * shader.portal_range
    }

    /// Open the sub-view of a portal surface.
    ///
    /// Returns `true` when a view was rendered through the surface.
    pub(crate) fn mirror_view_by_surface(&mut self, view: &ViewParms, refdef: &RefDef, draw_surf: &DrawSurf) -> RenderResult<bool> {
        if view.is_portal() {
            debug!("recursive mirror/portal found");
            self.stats.overflow.add(Overflow::RefusedPortals, 1);
            return Ok(false);
        }
        if self.config.no_portals || self.surface_is_off_screen(draw_surf, view) {
            return Ok(false);
        }

        let Some(portal) = self.portal_orientations(draw_surf, refdef) else {
            debug!("portal surface without a portal entity");
            self.stats.overflow.add(Overflow::MissingPortalEntities, 1);
            return Ok(false);
        };

        let child = portal_view(view, &portal);
        self.render_view(child, refdef)?;
        Ok(true)
    }
}

/// Camera state of the view seen through a portal
pub fn portal_view(parent: &ViewParms, portal: &PortalOrientation) -> ViewParms {
    let mut child = parent.clone();
    child.flags = ViewFlags::PORTAL;
    if portal.is_mirror {
        child.flags |= ViewFlags::MIRROR;
    }
    child.portal_depth = parent.portal_depth + 1;
    child.vis_bounds = Aabb::empty();
    child.pvs_origin = portal.pvs_origin;

    let origin = &parent.orientation.origin;
    child.orientation.origin = mirror_point(origin, &portal.surface, &portal.camera);
    child.orientation.axis = parent.orientation.axis.map(|axis| mirror_vector(&axis, &portal.surface, &portal.camera));

    let clip_normal = -portal.camera.axis[0];
    child.portal_plane = Plane::new(clip_normal, portal.camera.origin.dot(&clip_normal));
    child
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{RendererConfig, RendererLimits};
    use crate::foundation::math::IDENTITY_AXES;
    use crate::render::backend::RecordingBackEnd;
    use crate::render::draw_surface::LIGHTMAP_NONE;
    use crate::render::entity::RefEntity;
    use crate::render::shader::{Shader, ShaderHandle};
    use crate::render::world::{World, WorldSurface};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn context() -> RendererContext {
        RendererContext::inline(RendererConfig::default(), RendererLimits::default(), RecordingBackEnd::new()).unwrap()
    }

    fn view() -> ViewParms {
        let refdef = RefDef::new(Vec3::zeros(), IDENTITY_AXES, 640, 480, 90.0, 90.0);
        let mut v = ViewParms::from_refdef(&refdef, 4.0);
        v.rotate_for_viewer();
        v.setup_projection(&RendererConfig::default(), true);
        v.setup_frustum();
        v
    }

    /// Wall at `x` facing the origin, normal -X
    fn wall(shader: ShaderHandle, x: f32) -> WorldSurface {
        WorldSurface::face(
            shader,
            vec![
                Vec3::new(x, 10.0, -10.0),
                Vec3::new(x, 10.0, 10.0),
                Vec3::new(x, -10.0, 10.0),
                Vec3::new(x, -10.0, -10.0),
            ],
        )
    }

    fn surf(shader: ShaderHandle) -> DrawSurf {
        DrawSurf {
            entity: EntityRef::World,
            surface: SurfaceRef::World(0),
            shader,
            sort_index: 0,
            lightmap: LIGHTMAP_NONE,
            fog: 0,
        }
    }

    #[test]
    fn test_mirror_point_reflects_across_plane() {
        let surface = Orientation::new(Vec3::new(10.0, 0.0, 0.0), [-Vec3::x(), Vec3::y(), Vec3::z()]);
        let camera = Orientation::new(Vec3::new(10.0, 0.0, 0.0), [Vec3::x(), Vec3::y(), Vec3::z()]);

        // A mirror on the plane x = 10 reflects the viewer at the origin to x = 20.
        let p = mirror_point(&Vec3::zeros(), &surface, &camera);
        assert_relative_eq!(p, Vec3::new(20.0, 0.0, 0.0), epsilon = 1e-5);

        let forward = mirror_vector(&Vec3::x(), &surface, &camera);
        assert_relative_eq!(forward, -Vec3::x(), epsilon = 1e-5);
        let left = mirror_vector(&Vec3::y(), &surface, &camera);
        assert_relative_eq!(left, Vec3::y(), epsilon = 1e-5);
    }

    #[test]
    fn test_portal_roll_rules() {
        assert_eq!(portal_roll(0, 0, 0, 5000), None);
        assert_eq!(portal_roll(0, 0, 30, 5000), Some(30.0));
        assert_relative_eq!(portal_roll(2, 1, 0, 5000).unwrap(), 10.0);
        assert_relative_eq!(portal_roll(0, 1, 5, 0).unwrap(), 5.0);
    }

    #[test]
    fn test_mirror_marker_builds_mirror_orientation() {
        let mut ctx = context();
        let shader = ctx.register_shader(Shader::new("mirror").mirror());
        ctx.load_world(Arc::new(World { surfaces: vec![wall(shader, 100.0)], ..Default::default() })).unwrap();

        let marker = Vec3::new(100.0, 0.0, 0.0);
        ctx.add_ref_entity(RefEntity::portal_surface(marker, marker, IDENTITY_AXES));
        let refdef = RefDef { scene: ctx.scene.pending_slices(), ..RefDef::default() };

        let portal = ctx.portal_orientations(&surf(shader), &refdef).unwrap();
        assert!(portal.is_mirror);
        assert_relative_eq!(portal.surface.axis[0], -Vec3::x(), epsilon = 1e-5);
        assert_relative_eq!(portal.surface.origin, marker, epsilon = 1e-4);
        assert_relative_eq!(portal.camera.axis[0], Vec3::x(), epsilon = 1e-5);

        let child = portal_view(&view(), &portal);
        assert!(child.is_mirror() && child.is_portal());
        assert_eq!(child.portal_depth, 1);
        assert_relative_eq!(child.orientation.origin, Vec3::new(200.0, 0.0, 0.0), epsilon = 1e-3);
        assert_relative_eq!(child.orientation.axis[0], -Vec3::x(), epsilon = 1e-5);
    }

    #[test]
    fn test_far_marker_is_not_matched() {
        let mut ctx = context();
        let shader = ctx.register_shader(Shader::new("portal").portal(256.0));
        ctx.load_world(Arc::new(World { surfaces: vec![wall(shader, 100.0)], ..Default::default() })).unwrap();
        ctx.add_ref_entity(RefEntity::portal_surface(Vec3::new(300.0, 0.0, 0.0), Vec3::zeros(), IDENTITY_AXES));
        let refdef = RefDef { scene: ctx.scene.pending_slices(), ..RefDef::default() };

        assert!(ctx.portal_orientations(&surf(shader), &refdef).is_none());
    }

    #[test]
    fn test_portal_marker_places_remote_camera() {
        let mut ctx = context();
        let shader = ctx.register_shader(Shader::new("portal").portal(256.0));
        ctx.load_world(Arc::new(World { surfaces: vec![wall(shader, 100.0)], ..Default::default() })).unwrap();
        let remote = Vec3::new(-500.0, 40.0, 0.0);
        ctx.add_ref_entity(RefEntity::portal_surface(Vec3::new(110.0, 3.0, 0.0), remote, IDENTITY_AXES));
        let refdef = RefDef { scene: ctx.scene.pending_slices(), ..RefDef::default() };

        let portal = ctx.portal_orientations(&surf(shader), &refdef).unwrap();
        assert!(!portal.is_mirror);
        assert_relative_eq!(portal.surface.origin, Vec3::new(100.0, 3.0, 0.0), epsilon = 1e-4);
        assert_eq!(portal.camera.origin, remote);
        assert_eq!(portal.pvs_origin, remote);
        assert_relative_eq!(portal.camera.axis[0], -Vec3::x(), epsilon = 1e-5);
    }

    #[test]
    fn test_off_screen_rules() {
        let mut ctx = context();
        let portal = ctx.register_shader(Shader::new("portal").portal(256.0));
        let short = ctx.register_shader(Shader::new("short").portal(50.0));
        let mirror = ctx.register_shader(Shader::new("mirror").mirror());
        let mut facing_away = wall(portal, 100.0);
        facing_away.vertices.reverse();
        let world = World {
            surfaces: vec![wall(portal, 100.0), facing_away, wall(portal, -100.0)],
            ..Default::default()
        };
        ctx.load_world(Arc::new(world)).unwrap();
        let v = view();

        assert!(!ctx.surface_is_off_screen(&surf(portal), &v));
        assert!(ctx.surface_is_off_screen(&DrawSurf { surface: SurfaceRef::World(1), ..surf(portal) }, &v));
        assert!(ctx.surface_is_off_screen(&DrawSurf { surface: SurfaceRef::World(2), ..surf(portal) }, &v));
        assert!(ctx.surface_is_off_screen(&surf(short), &v));
        assert!(!ctx.surface_is_off_screen(&surf(mirror), &v));
    }

    #[test]
    fn test_portal_view_refuses_recursion() {
        let mut ctx = context();
        let shader = ctx.register_shader(Shader::new("mirror").mirror());
        ctx.load_world(Arc::new(World { surfaces: vec![wall(shader, 100.0)], ..Default::default() })).unwrap();
        let mut v = view();
        v.flags = ViewFlags::PORTAL;

        let opened = ctx.mirror_view_by_surface(&v, &RefDef::default(), &surf(shader)).unwrap();
        assert!(!opened);
        assert_eq!(ctx.stats.overflow.count(Overflow::RefusedPortals), 1);
    }

    #[test]
    fn test_missing_marker_draws_nothing() {
        let mut ctx = context();
        let shader = ctx.register_shader(Shader::new("mirror").mirror());
        ctx.load_world(Arc::new(World { surfaces: vec![wall(shader, 100.0)], ..Default::default() })).unwrap();

        let opened = ctx.mirror_view_by_surface(&view(), &RefDef::default(), &surf(shader)).unwrap();
        assert!(!opened);
        assert_eq!(ctx.stats.overflow.count(Overflow::MissingPortalEntities), 1);
        assert_eq!(ctx.stats.views, 0);
    }
}
