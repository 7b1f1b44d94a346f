//! # Scene Surface Collector
//!
//! Walks the world, the scene's polygons and its entities for one view and
//! queues a [`DrawSurf`] for everything that survives culling. Visible
//! volumes are folded into the view's `vis_bounds`, which later decides the
//! far clip distance.
//!
//! ## Passes
//!
//! Polygons and world surfaces run in the first pass, before the far clip is
//! known. Entities run after the projection is final. A world surface
//! reachable from several leaves is emitted once per view; its visit stamp
//! is what the light join later uses to find visible surfaces.

use crate::core::config::RendererConfig;
use crate::foundation::math::{affine_inverse, Point3, Vec3};
use crate::render::context::RendererContext;
use crate::render::culling::{cull_box, cull_local_box, cull_point_and_radius, CullResult};
use crate::render::draw_surface::{DrawSurf, DrawSurfaceList, EntityRef, SurfaceRef, LIGHTMAP_NONE};
use crate::render::entity::{EntityKind, FrameEntity, RenderFx};
use crate::render::model::ModelKind;
use crate::render::scene::DecalProjector;
use crate::render::shader::{CullType, Shader, ShaderHandle, ShaderRegistry};
use crate::render::stats::{CullCounters, FrameStats, Overflow};
use crate::render::view::{SceneSlices, ViewParms};
use crate::render::world::{LeafHistory, World, WorldSurface, WorldSurfaceKind, WorldVisState};
use crate::spatial::Plane;

/// Distance a viewer may stand behind a one-sided face before it is culled
pub const FACE_CULL_EPSILON: f32 = 8.0;

/// Queues draw surfaces, resolving sort ranks and counting recycled slots
pub(crate) struct SurfaceSink<'a> {
    pub list: &'a mut DrawSurfaceList,
    pub shaders: &'a ShaderRegistry,
    pub stats: &'a mut FrameStats,
}

impl SurfaceSink<'_> {
    pub fn add(&mut self, entity: EntityRef, surface: SurfaceRef, shader: ShaderHandle, lightmap: i32, fog: usize) {
        let sort_index = self.shaders.get_or_default(shader).sorted_index;
        let recycled = self.list.add(DrawSurf { entity, surface, shader, sort_index, lightmap, fog });
        self.stats.draw_surfs += 1;
        if recycled {
            self.stats.overflow.record(
                Overflow::DrawSurfs,
                format_args!("Draw surface list wrapped at {} entries", self.list.capacity()),
            );
        }
    }
}

/// Face-plane test of a planar surface.
///
/// `view_origin` must be in the same space as `plane`.
fn cull_face(plane: &Plane, shader: &Shader, view_origin: &Vec3, tally: &mut CullCounters) -> CullResult {
    let d = plane.distance_to_point(view_origin);
    let result = match shader.cull_type {
        CullType::TwoSided => CullResult::Clip,
        CullType::FrontSided if d < -FACE_CULL_EPSILON => CullResult::Out,
        CullType::BackSided if d > FACE_CULL_EPSILON => CullResult::Out,
        _ => CullResult::In,
    };
    tally.plane.record(result)
}

/// Full visibility test of a world-space surface
pub(crate) fn cull_world_surface(
    surface: &WorldSurface,
    shader: &Shader,
    view: &ViewParms,
    config: &RendererConfig,
    tally: &mut CullCounters,
) -> CullResult {
    if config.no_cull {
        return CullResult::Clip;
    }

    if surface.kind == WorldSurfaceKind::Face {
        if let Some(plane) = &surface.plane {
            if cull_face(plane, shader, &view.orientation.origin, tally) == CullResult::Out {
                return CullResult::Out;
            }
        }
    }

    let planes = view.frustum.planes();
    let sphere = tally
        .sphere
        .record(cull_point_and_radius(planes, &surface.bounds.center(), surface.bounds.radius(), false));
    if sphere != CullResult::Clip {
        return sphere;
    }
    tally.bounds.record(cull_box(planes, &surface.bounds, false))
}

/// Stamp the leaves whose cluster is potentially visible from the view.
///
/// Without visibility data, or with the camera outside every cluster, all
/// leaves are stamped.
pub(crate) fn mark_leaves(world: &World, vis: &mut WorldVisState, view: &ViewParms, config: &RendererConfig, stamp: u32) {
    let view_cluster = world
        .point_in_leaf(&view.pvs_origin)
        .and_then(|leaf| world.leaves.get(leaf))
        .and_then(|leaf| leaf.cluster);

    for (index, leaf) in world.leaves.iter().enumerate() {
        let visible = match (config.no_vis, &world.vis, view_cluster, leaf.cluster) {
            (true, ..) | (false, None, ..) | (false, Some(_), None, _) => true,
            (false, Some(vis), Some(from), Some(to)) => vis.cluster_visible(from, to),
            (false, Some(_), Some(_), None) => false,
        };
        if visible {
            if let Some(slot) = vis.leaf_vis.get_mut(index) {
                *slot = stamp;
            }
        }
    }
}

impl RendererContext {
    pub(crate) fn sink(&mut self) -> SurfaceSink<'_> {
        SurfaceSink { list: &mut self.draw_surfs, shaders: &self.shaders, stats: &mut self.stats }
    }

    /// Classify the scene's decal projectors against the view
    pub(crate) fn cull_decal_projectors(&mut self, view: &ViewParms, slices: &SceneSlices) {
        let planes = view.frustum.planes();
        let no_cull = self.config.no_cull;
        let Some(projectors) = self.scene.decal_projectors.get_mut(slices.decal_projectors.clone()) else {
            return;
        };
        for projector in projectors {
            projector.cull = self.stats.cull.decals.record(cull_box(planes, &projector.bounds, no_cull));
        }
    }

    /// Mark leaves, cull them and queue every visible world surface
    pub(crate) fn add_world_surfaces(&mut self, view: &mut ViewParms, world: &World, slices: &SceneSlices) {
        if !self.config.draw_world {
            return;
        }
        if self.world_vis.surface_view.len() != world.surfaces.len() {
            self.world_vis = WorldVisState::new(world);
        }

        let projectors: Vec<(usize, DecalProjector)> = slices
            .decal_projectors
            .clone()
            .filter_map(|i| self.scene.decal_projectors.get(i).map(|p| (i, *p)))
            .filter(|(_, p)| p.cull.is_visible())
            .collect();

        if world.leaves.is_empty() {
            let surfaces = world.brush_models.first().map_or(0..world.surfaces.len(), |bm| bm.surfaces());
            for index in surfaces {
                self.add_world_surface(view, world, index, &projectors);
            }
            return;
        }

        self.counters.vis_count += 1;
        let stamp = self.counters.vis_count;
        mark_leaves(world, &mut self.world_vis, view, &self.config, stamp);

        let frame = self.counters.frame_count;
        for (leaf_index, leaf) in world.leaves.iter().enumerate() {
            if self.world_vis.leaf_vis.get(leaf_index) != Some(&stamp) {
                continue;
            }

            let cull = self.stats.cull.leaves.record(cull_box(view.frustum.planes(), &leaf.bounds, self.config.no_cull));
            if let Some(history) = self.world_vis.leaf_history.get_mut(leaf_index) {
                *history = LeafHistory { visible: cull.is_visible(), last_visited_frame: frame };
            }
            if cull == CullResult::Out {
                continue;
            }

            view.vis_bounds.add_bounds(&leaf.bounds);
            for &surface in &leaf.surfaces {
                self.add_world_surface(view, world, surface, &projectors);
            }
        }
    }

    fn add_world_surface(&mut self, view: &mut ViewParms, world: &World, index: usize, projectors: &[(usize, DecalProjector)]) {
        let Some(surface) = world.surfaces.get(index) else {
            return;
        };
        if self.world_vis.surface_view.get(index) == Some(&view.view_count) {
            return;
        }

        let shader = self.shaders.get_or_default(surface.shader);
        if cull_world_surface(surface, shader, view, &self.config, &mut self.stats.cull) == CullResult::Out {
            return;
        }

        if let Some(stamp) = self.world_vis.surface_view.get_mut(index) {
            *stamp = view.view_count;
        }
        if world.leaves.is_empty() {
            view.vis_bounds.add_bounds(&surface.bounds);
        }

        let mut sink = self.sink();
        sink.add(EntityRef::World, SurfaceRef::World(index), surface.shader, surface.lightmap, surface.fog);
        for (projector_index, projector) in projectors {
            if projector.bounds.intersects(&surface.bounds) {
                sink.add(
                    EntityRef::World,
                    SurfaceRef::Decal { surface: index, projector: *projector_index },
                    projector.shader,
                    LIGHTMAP_NONE,
                    surface.fog,
                );
            }
        }
    }

    /// Queue the scene's polygons and polygon buffers without culling
    pub(crate) fn add_polygon_surfaces(&mut self, view: &mut ViewParms, slices: &SceneSlices) {
        if !self.config.draw_polies {
            return;
        }

        let Self { scene, draw_surfs, shaders, stats, .. } = self;
        let mut sink = SurfaceSink { list: draw_surfs, shaders, stats };

        for index in slices.polys.clone() {
            let Some(poly) = scene.polys.get(index) else { continue };
            view.vis_bounds.add_bounds(&poly.bounds);
            sink.add(EntityRef::World, SurfaceRef::Poly(index), poly.shader, LIGHTMAP_NONE, poly.fog);
        }
        for index in slices.poly_buffers.clone() {
            let Some(buffer) = scene.poly_buffers.get(index) else { continue };
            view.vis_bounds.add_bounds(&buffer.bounds);
            sink.add(EntityRef::World, SurfaceRef::PolyBuffer(index), buffer.shader, LIGHTMAP_NONE, buffer.fog);
        }
    }

    /// Cull the scene's entities and queue their surfaces
    pub(crate) fn add_entity_surfaces(&mut self, view: &ViewParms, slices: &SceneSlices) {
        if !self.config.draw_entities {
            return;
        }

        let world = self.world.clone();
        let Self { config, scene, draw_surfs, shaders, models, stats, .. } = self;
        let planes = view.frustum.planes();

        for index in slices.entities.clone() {
            let Some(ent) = scene.entities.get_mut(index) else { continue };
            let owner = EntityRef::Scene(index as u32);

            // View weapons never show up in reflections; bodies only do.
            if ent.ent.render_fx.contains(RenderFx::THIRD_PERSON) && !view.is_portal() {
                continue;
            }
            if ent.ent.render_fx.contains(RenderFx::FIRST_PERSON) && view.is_portal() {
                continue;
            }

            let mut sink = SurfaceSink { list: draw_surfs, shaders, stats };
            match ent.ent.kind {
                EntityKind::PortalSurface => {}
                kind if kind.is_generated() => {
                    let shader = sink.shaders.resolve(ent.ent.custom_shader);
                    sink.add(owner, SurfaceRef::Entity, shader, LIGHTMAP_NONE, 0);
                }
                _ => {
                    let model = ent.ent.model.and_then(|handle| models.get(handle));
                    match model.map(|m| &m.kind) {
                        None | Some(ModelKind::Bad) => {
                            let shader = sink.shaders.default_handle();
                            sink.add(owner, SurfaceRef::Entity, shader, LIGHTMAP_NONE, 0);
                        }
                        Some(ModelKind::Skeleton) => {}
                        Some(ModelKind::Mesh(mesh) | ModelKind::Skeletal(mesh)) => {
                            let frame = usize::try_from(ent.ent.frame).unwrap_or(0);
                            let old_frame = usize::try_from(ent.ent.old_frame).unwrap_or(0);
                            ent.set_local_bounds(mesh.lerped_bounds(frame, old_frame));
                            ent.cull = sink.stats.cull.entities.record(cull_local_box(
                                planes,
                                &ent.local_bounds,
                                &ent.local_to_world,
                                config.no_cull,
                            ));
                            if ent.cull == CullResult::Out {
                                continue;
                            }

                            let fog = world.as_ref().map_or(0, |w| w.fog_for_bounds(&ent.world_bounds));
                            for (k, surface) in mesh.surfaces.iter().enumerate() {
                                let shader = match ent.ent.custom_shader {
                                    Some(custom) => sink.shaders.resolve(Some(custom)),
                                    None => surface.shader,
                                };
                                sink.add(owner, SurfaceRef::Mesh(k), shader, LIGHTMAP_NONE, fog);
                            }
                        }
                        Some(ModelKind::Brush(brush)) => {
                            let Some(world) = world.as_deref() else { continue };
                            let Some(bmodel) = world.brush_models.get(*brush) else { continue };
                            add_brush_entity_surfaces(ent, owner, world, bmodel.surfaces(), bmodel.bounds, view, config, &mut sink);
                        }
                    }
                }
            }
        }
    }

    /// Fold the volumes of lights that will light this view into `vis_bounds`
    pub(crate) fn add_light_bounds_to_vis_bounds(&mut self, view: &mut ViewParms, slices: &SceneSlices) {
        let world = self.world.clone();
        for index in slices.lights.clone() {
            let Some(light) = self.scene.lights.get(index) else { continue };
            if !crate::render::light_interactions::light_enabled(&self.config, light) {
                continue;
            }
            if let (Some(static_index), Some(world)) = (light.static_index, world.as_deref()) {
                if !self.config.no_light_vis_cull && !self.static_light_visible(world, static_index) {
                    continue;
                }
            }
            if cull_box(view.frustum.planes(), &light.world_bounds, self.config.no_cull).is_visible() {
                view.vis_bounds.add_bounds(&light.world_bounds);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn add_brush_entity_surfaces(
    ent: &mut FrameEntity,
    owner: EntityRef,
    world: &World,
    surfaces: std::ops::Range<usize>,
    local_bounds: crate::spatial::Aabb,
    view: &ViewParms,
    config: &RendererConfig,
    sink: &mut SurfaceSink<'_>,
) {
    let planes = view.frustum.planes();
    ent.set_local_bounds(local_bounds);
    ent.cull = sink.stats.cull.entities.record(cull_local_box(planes, &ent.local_bounds, &ent.local_to_world, config.no_cull));
    if ent.cull == CullResult::Out {
        return;
    }

    let world_to_local = affine_inverse(&ent.local_to_world);
    let local_view_origin = world_to_local.transform_point(&Point3::from(view.orientation.origin)).coords;
    let fog = world.fog_for_bounds(&ent.world_bounds);

    for index in surfaces {
        let Some(surface) = world.surfaces.get(index) else { continue };
        let shader = match ent.ent.custom_shader {
            Some(custom) => sink.shaders.resolve(Some(custom)),
            None => surface.shader,
        };

        if !config.no_cull {
            let material = sink.shaders.get_or_default(shader);
            if let (WorldSurfaceKind::Face, Some(plane)) = (surface.kind, &surface.plane) {
                if cull_face(plane, material, &local_view_origin, &mut sink.stats.cull) == CullResult::Out {
                    continue;
                }
            }
            let result = cull_local_box(planes, &surface.bounds, &ent.local_to_world, false);
            if sink.stats.cull.bounds.record(result) == CullResult::Out {
                continue;
            }
        }

        sink.add(owner, SurfaceRef::World(index), shader, surface.lightmap, fog);
    }
}
