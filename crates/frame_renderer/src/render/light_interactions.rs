//! # Light Interaction Join
//!
//! For every light of the view, finds the surfaces it touches and records
//! one [`Interaction`] per pair in the frame's arena. The records of a light
//! form one contiguous slice, sorted by material and then owner.
//!
//! ## Classification
//!
//! - `ShadowOnly`: the light box is outside the camera frustum but the light
//!   still casts shadow maps into it
//! - `LightOnly`: the owning entity is outside the camera frustum, and every
//!   polygon
//! - `Default`: everything else
//!
//! A light left with no interactions, or with only shadow-only ones, is
//! demoted: its slice is released and its cull result becomes `Out`. Its
//! per-kind counts stay behind for inspection.

use crate::core::config::RendererConfig;
use crate::foundation::logging::{debug, trace};
use crate::render::context::RendererContext;
use crate::render::culling::{cube_side_bits, cull_box, CubeSides, CullResult};
use crate::render::draw_surface::{EntityRef, SurfaceRef};
use crate::render::entity::{EntityKind, FrameEntity, RenderFx};
use crate::render::interaction::{Interaction, InteractionArena, InteractionKind, InteractionSlice};
use crate::render::light::{light_scissor, FrameLight, LightFlags, LightKind};
use crate::render::model::{ModelKind, ModelRegistry};
use crate::render::scene::{Poly, Scene};
use crate::render::shader::{ShaderHandle, ShaderRegistry};
use crate::render::stats::{FrameStats, Overflow};
use crate::render::view::{SceneSlices, ViewParms};
use crate::render::world::{World, WorldVisState};
use crate::spatial::Aabb;

/// Whether global switches allow the light at all
pub fn light_enabled(config: &RendererConfig, light: &FrameLight) -> bool {
    if light.is_static() {
        let baked = config.precomputed_lighting || config.vertex_lighting;
        config.static_light && !(baked && light.light.flags.contains(LightFlags::NO_RADIOSITY))
    } else {
        config.dynamic_light
    }
}

impl RendererContext {
    /// Whether any leaf touched by a static light is currently visible.
    ///
    /// With occlusion culling on, a leaf counts when it passed the frustum
    /// test within the last `chc_max_visible_frames` frames; otherwise it
    /// must carry the latest vis stamp. Lights without leaf data pass.
    pub(crate) fn static_light_visible(&self, world: &World, static_index: usize) -> bool {
        let Some(static_light) = world.lights.get(static_index) else {
            return false;
        };
        if static_light.leaves.is_empty() || world.leaves.is_empty() {
            return true;
        }

        let vis = &self.world_vis;
        if self.config.dynamic_bsp_occlusion_culling {
            let frame = self.counters.frame_count;
            static_light
                .leaves
                .iter()
                .filter_map(|&leaf| vis.leaf_history.get(leaf))
                .any(|h| h.visible && frame.saturating_sub(h.last_visited_frame) <= self.config.chc_max_visible_frames)
        } else {
            let stamp = self.counters.vis_count;
            static_light.leaves.iter().any(|&leaf| vis.leaf_vis.get(leaf) == Some(&stamp))
        }
    }

    /// Join every light of the view against the surfaces it touches
    pub(crate) fn build_light_interactions(&mut self, view: &ViewParms, slices: &SceneSlices) {
        let world = self.world.clone();
        for index in slices.lights.clone() {
            self.join_light(view, slices, world.as_deref(), index);
        }
    }

    fn join_light(&mut self, view: &ViewParms, slices: &SceneSlices, world: Option<&World>, index: usize) {
        let Some(light) = self.scene.lights.get(index) else {
            return;
        };
        let enabled = light_enabled(&self.config, light);
        let visible = match (light.static_index, world) {
            (Some(static_index), Some(world)) if enabled && !self.config.no_light_vis_cull => {
                self.static_light_visible(world, static_index)
            }
            _ => true,
        };

        let Self { config, shaders, models, world_vis, scene, interactions, stats, counters, .. } = self;
        let Scene { lights, entities, polys, .. } = scene;
        let Some(light) = lights.get_mut(index) else {
            return;
        };

        light.reset_interactions();
        if !enabled {
            light.cull = CullResult::Out;
            return;
        }
        if !visible {
            stats.pvs_cull_light_out += 1;
            light.cull = CullResult::Out;
            return;
        }

        if !light.is_static() {
            light.setup();
        }

        let mut cull = cull_box(view.frustum.planes(), &light.world_bounds, config.no_cull);
        if cull == CullResult::Out && config.shadows.casts_shadow_maps() && light.light.casts_shadows() {
            light.outside_view = true;
            cull = CullResult::Clip;
        }
        light.cull = stats.cull.lights.record(cull);
        if light.cull == CullResult::Out {
            return;
        }

        if !light.is_static() && !light.world_bounds.intersects(&view.vis_bounds) {
            light.cull = CullResult::Out;
            return;
        }

        light.scissor = light_scissor(&light.world_bounds, &view.mvp(), &view.viewport);
        counters.light_count += 1;

        let start = interactions.len();
        {
            let mut join = LightJoin {
                index,
                light: &*light,
                view,
                config,
                shaders,
                arena: interactions,
                stats,
                stamp: counters.light_count,
            };

            if let Some(world) = world {
                match light.static_index {
                    Some(static_index) => join.static_world_surfaces(world, static_index, world_vis),
                    None => join.dynamic_world_surfaces(world, world_vis),
                }
            }
            if config.draw_entities {
                let first = slices.entities.start;
                if let Some(scene_entities) = entities.get(slices.entities.clone()) {
                    join.entities(scene_entities, first, models, world);
                }
            }
            let first = slices.polys.start;
            if let Some(scene_polys) = polys.get(slices.polys.clone()) {
                join.polys(scene_polys, first);
            }
        }

        let slice = InteractionSlice { start, count: interactions.len() - start };
        let records = interactions.slice_mut(&slice);
        records.sort_by_key(|i| (i.sort_index, i.entity));

        light.interactions = slice;
        light.num_interactions = slice.count;
        light.num_shadow_only = records.iter().filter(|i| i.kind == InteractionKind::ShadowOnly).count();
        light.num_light_only = records.iter().filter(|i| i.kind == InteractionKind::LightOnly).count();

        if light.num_interactions == 0 || light.num_shadow_only == light.num_interactions {
            trace!(
                "Light {} demoted: {} interactions, {} shadow-only",
                index,
                light.num_interactions,
                light.num_shadow_only
            );
            interactions.truncate(start);
            light.interactions = InteractionSlice { start, count: 0 };
            light.cull = CullResult::Out;
            stats.demoted_lights += 1;
            return;
        }

        let count = light.num_interactions as u32;
        if light.is_static() {
            stats.static_lights += 1;
            stats.static_light_interactions += count;
        } else {
            stats.dynamic_lights += 1;
            stats.dynamic_light_interactions += count;
        }
    }
}

/// Join state of one light
struct LightJoin<'a> {
    index: usize,
    light: &'a FrameLight,
    view: &'a ViewParms,
    config: &'a RendererConfig,
    shaders: &'a ShaderRegistry,
    arena: &'a mut InteractionArena,
    stats: &'a mut FrameStats,
    stamp: u32,
}

impl LightJoin<'_> {
    fn add(&mut self, entity: EntityRef, surface: SurfaceRef, shader: ShaderHandle, cube_sides: CubeSides, kind: InteractionKind) {
        let material = self.shaders.get_or_default(shader);
        if !material.affects_lighting() {
            return;
        }

        let kind = if self.light.outside_view { InteractionKind::ShadowOnly } else { kind };
        let interaction = Interaction {
            light: self.index,
            entity,
            surface,
            shader,
            sort_index: material.sorted_index,
            cube_sides,
            kind,
            scissor: self.light.scissor,
        };
        if self.arena.push(interaction).is_none() {
            self.stats.overflow.record(
                Overflow::Interactions,
                format_args!("Interaction arena full at {} records", self.arena.capacity()),
            );
        }
    }

    /// Box overlap, then the light frustum unless disabled
    fn touches(&mut self, bounds: &Aabb) -> bool {
        if !bounds.intersects(&self.light.world_bounds) {
            return false;
        }
        if self.config.no_light_frustums {
            return true;
        }
        let result = cull_box(self.light.frustum.planes(), bounds, false);
        self.stats.cull.light_surfaces.record(result).is_visible()
    }

    fn cube_sides(&self, bounds: &Aabb) -> CubeSides {
        match self.light.light.kind {
            LightKind::Omni => cube_side_bits(
                &self.light.world_origin,
                &self.light.world_bounds,
                bounds,
                !self.config.no_shadow_pyramids,
            ),
            LightKind::Projective | LightKind::Directional => CubeSides::CLIP_ALL,
        }
    }

    fn static_world_surfaces(&mut self, world: &World, static_index: usize, vis: &WorldVisState) {
        let Some(static_light) = world.lights.get(static_index) else {
            return;
        };
        for precached in &static_light.interactions {
            if vis.surface_view.get(precached.surface) != Some(&self.view.view_count) {
                continue;
            }
            let Some(surface) = world.surfaces.get(precached.surface) else {
                continue;
            };
            let sides = if self.config.no_shadow_pyramids { CubeSides::CLIP_ALL } else { precached.cube_sides };
            self.add(EntityRef::World, SurfaceRef::World(precached.surface), surface.shader, sides, precached.kind);
        }
    }

    fn dynamic_world_surfaces(&mut self, world: &World, vis: &mut WorldVisState) {
        for (index, surface) in world.surfaces.iter().enumerate() {
            if vis.surface_view.get(index) != Some(&self.view.view_count) {
                continue;
            }
            match vis.surface_light.get_mut(index) {
                Some(stamp) if *stamp != self.stamp => *stamp = self.stamp,
                _ => continue,
            }
            if !self.touches(&surface.bounds) {
                continue;
            }
            let sides = self.cube_sides(&surface.bounds);
            if sides.is_empty() {
                continue;
            }
            self.add(EntityRef::World, SurfaceRef::World(index), surface.shader, sides, InteractionKind::Default);
        }
    }

    fn entities(&mut self, entities: &[FrameEntity], first: usize, models: &ModelRegistry, world: Option<&World>) {
        for (offset, ent) in entities.iter().enumerate() {
            if ent.ent.render_fx.contains(RenderFx::FIRST_PERSON) && self.view.is_portal() {
                continue;
            }
            if ent.ent.kind == EntityKind::PortalSurface || ent.ent.kind.is_generated() {
                continue;
            }

            let owner = EntityRef::Scene((first + offset) as u32);
            let kind = if ent.cull == CullResult::Out { InteractionKind::LightOnly } else { InteractionKind::Default };
            let custom = ent.ent.custom_shader.map(|h| self.shaders.resolve(Some(h)));

            match ent.ent.model.and_then(|h| models.get(h)).map(|m| &m.kind) {
                Some(ModelKind::Mesh(mesh) | ModelKind::Skeletal(mesh)) => {
                    if !self.touches(&ent.world_bounds) {
                        continue;
                    }
                    let sides = self.cube_sides(&ent.world_bounds);
                    if sides.is_empty() {
                        continue;
                    }
                    for (k, surface) in mesh.surfaces.iter().enumerate() {
                        self.add(owner, SurfaceRef::Mesh(k), custom.unwrap_or(surface.shader), sides, kind);
                    }
                }
                Some(ModelKind::Brush(brush)) => {
                    let Some(world) = world else { continue };
                    let Some(bmodel) = world.brush_models.get(*brush) else { continue };
                    for index in bmodel.surfaces() {
                        let Some(surface) = world.surfaces.get(index) else { continue };
                        let bounds = surface.bounds.transformed(&ent.local_to_world);
                        if !self.touches(&bounds) {
                            continue;
                        }
                        let sides = self.cube_sides(&bounds);
                        if sides.is_empty() {
                            continue;
                        }
                        self.add(owner, SurfaceRef::World(index), custom.unwrap_or(surface.shader), sides, kind);
                    }
                }
                Some(ModelKind::Skeleton | ModelKind::Bad) | None => {}
            }
        }
    }

    fn polys(&mut self, polys: &[Poly], first: usize) {
        for (offset, poly) in polys.iter().enumerate() {
            if !poly.bounds.intersects(&self.light.world_bounds) {
                continue;
            }
            self.add(
                EntityRef::World,
                SurfaceRef::Poly(first + offset),
                poly.shader,
                CubeSides::CLIP_ALL,
                InteractionKind::LightOnly,
            );
        }
    }
}

impl RendererContext {
    /// Log a one-line summary of each light's join, for `developer` runs
    pub(crate) fn log_light_joins(&self, slices: &SceneSlices) {
        if !self.config.developer {
            return;
        }
        for index in slices.lights.clone() {
            if let Some(light) = self.scene.lights.get(index) {
                debug!(
                    "light {index}: cull {:?}, {} interactions ({} shadow-only, {} light-only)",
                    light.cull, light.num_interactions, light.num_shadow_only, light.num_light_only
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{RendererLimits, ShadowMode};
    use crate::foundation::math::{Vec3, IDENTITY_AXES};
    use crate::render::backend::RecordingBackEnd;
    use crate::render::light::RefLight;
    use crate::render::shader::Shader;
    use crate::render::view::RefDef;
    use crate::render::world::{PrecachedInteraction, StaticLight, WorldLeaf, WorldSurface};
    use std::sync::Arc;

    fn context(config: RendererConfig) -> RendererContext {
        RendererContext::inline(config, RendererLimits::default(), RecordingBackEnd::new()).unwrap()
    }

    fn view() -> ViewParms {
        let refdef = RefDef::new(Vec3::zeros(), IDENTITY_AXES, 640, 480, 90.0, 90.0);
        let mut v = ViewParms::from_refdef(&refdef, 4.0);
        v.view_count = 1;
        v.rotate_for_viewer();
        v.setup_projection(&RendererConfig::default(), true);
        v.setup_frustum();
        v.vis_bounds = Aabb::from_center_radius(Vec3::new(200.0, 0.0, 0.0), 300.0);
        v
    }

    /// Wall facing the origin at `x`
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

    fn load(ctx: &mut RendererContext, world: World) {
        ctx.load_world(Arc::new(world)).unwrap();
        for stamp in &mut ctx.world_vis.surface_view {
            *stamp = 1;
        }
    }

    #[test]
    fn test_light_enable_policy() {
        let mut config = RendererConfig::default();
        let dynamic = FrameLight::new(RefLight::omni(Vec3::zeros(), 10.0, Vec3::repeat(1.0)), None);
        let mut baked = FrameLight::new(RefLight::omni(Vec3::zeros(), 10.0, Vec3::repeat(1.0)), Some(0));
        baked.light.flags |= LightFlags::NO_RADIOSITY;

        assert!(light_enabled(&config, &dynamic));
        assert!(light_enabled(&config, &baked));

        config.vertex_lighting = true;
        assert!(!light_enabled(&config, &baked));
        baked.light.flags = LightFlags::empty();
        assert!(light_enabled(&config, &baked));

        config.dynamic_light = false;
        assert!(!light_enabled(&config, &dynamic));
    }

    #[test]
    fn test_dynamic_light_joins_visible_surfaces() {
        let mut ctx = context(RendererConfig::default());
        let stone = ctx.register_shader(Shader::new("stone"));
        let sky = ctx.register_shader(Shader::new("sky").sky());
        load(&mut ctx, World { surfaces: vec![wall(stone, 200.0), wall(sky, 210.0), wall(stone, 900.0)], ..Default::default() });

        ctx.add_dynamic_light(Vec3::new(180.0, 0.0, 0.0), 64.0, 1.0, Vec3::repeat(1.0), None);
        let slices = ctx.scene.pending_slices();
        ctx.build_light_interactions(&view(), &slices);

        let records = ctx.light_interactions(0);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].surface, SurfaceRef::World(0));
        assert_eq!(records[0].kind, InteractionKind::Default);
        assert!(!records[0].cube_sides.is_empty());
        assert_eq!(ctx.stats.dynamic_lights, 1);
        assert_eq!(ctx.stats.dynamic_light_interactions, 1);
        assert_eq!(ctx.counters.light_count, 1);
    }

    #[test]
    fn test_unstamped_surfaces_are_skipped() {
        let mut ctx = context(RendererConfig::default());
        let stone = ctx.register_shader(Shader::new("stone"));
        ctx.load_world(Arc::new(World { surfaces: vec![wall(stone, 200.0)], ..Default::default() })).unwrap();

        ctx.add_dynamic_light(Vec3::new(180.0, 0.0, 0.0), 64.0, 1.0, Vec3::repeat(1.0), None);
        let slices = ctx.scene.pending_slices();
        ctx.build_light_interactions(&view(), &slices);

        assert_eq!(ctx.scene.lights[0].cull, CullResult::Out);
        assert_eq!(ctx.stats.demoted_lights, 1);
        assert_eq!(ctx.num_interactions(), 0);
    }

    #[test]
    fn test_polys_are_light_only() {
        let mut ctx = context(RendererConfig::default());
        let stone = ctx.register_shader(Shader::new("stone"));
        load(&mut ctx, World { surfaces: vec![wall(stone, 200.0)], ..Default::default() });

        let verts: Vec<_> = [[190.0, 0.0, 0.0], [190.0, 5.0, 0.0], [190.0, 5.0, 5.0]]
            .into_iter()
            .map(|xyz| crate::render::commands::PolyVert { xyz, ..Default::default() })
            .collect();
        ctx.add_polys(Some(stone), &verts, 1);
        ctx.add_dynamic_light(Vec3::new(180.0, 0.0, 0.0), 64.0, 1.0, Vec3::repeat(1.0), None);

        let slices = ctx.scene.pending_slices();
        ctx.build_light_interactions(&view(), &slices);

        let records = ctx.light_interactions(0);
        assert_eq!(records.len(), 2);
        let poly = records.iter().find(|i| matches!(i.surface, SurfaceRef::Poly(_))).unwrap();
        assert_eq!(poly.kind, InteractionKind::LightOnly);
        assert_eq!(poly.cube_sides, CubeSides::CLIP_ALL);
        assert_eq!(ctx.scene.lights[0].num_light_only, 1);
    }

    #[test]
    fn test_static_light_rejected_by_leaf_visibility() {
        let mut ctx = context(RendererConfig::default());
        let stone = ctx.register_shader(Shader::new("stone"));
        let leaf = WorldLeaf { cluster: Some(0), bounds: Aabb::from_center_radius(Vec3::new(200.0, 0.0, 0.0), 50.0), surfaces: vec![0] };
        let light = StaticLight {
            light: RefLight::omni(Vec3::new(180.0, 0.0, 0.0), 64.0, Vec3::repeat(1.0)),
            leaves: vec![0],
            interactions: vec![PrecachedInteraction { surface: 0, cube_sides: CubeSides::CLIP_ALL, kind: InteractionKind::Default }],
        };
        load(&mut ctx, World { surfaces: vec![wall(stone, 200.0)], leaves: vec![leaf], lights: vec![light], ..Default::default() });
        ctx.add_world_lights();
        let slices = ctx.scene.pending_slices();
        ctx.counters.vis_count = 1;

        // Leaf never marked.
        ctx.build_light_interactions(&view(), &slices);
        assert_eq!(ctx.stats.pvs_cull_light_out, 1);
        assert_eq!(ctx.scene.lights[0].cull, CullResult::Out);

        ctx.world_vis.leaf_vis[0] = ctx.counters.vis_count;
        ctx.build_light_interactions(&view(), &slices);
        assert_eq!(ctx.stats.static_lights, 1);
        assert_eq!(ctx.light_interactions(0).len(), 1);
    }

    #[test]
    fn test_occlusion_history_window() {
        let config = RendererConfig { dynamic_bsp_occlusion_culling: true, chc_max_visible_frames: 3, ..Default::default() };
        let mut ctx = context(config);
        let leaf = WorldLeaf { cluster: Some(0), bounds: Aabb::from_center_radius(Vec3::zeros(), 50.0), surfaces: vec![] };
        let light = StaticLight { light: RefLight::omni(Vec3::zeros(), 64.0, Vec3::repeat(1.0)), leaves: vec![0], interactions: vec![] };
        ctx.load_world(Arc::new(World { leaves: vec![leaf], lights: vec![light], ..Default::default() })).unwrap();
        let world = ctx.world.clone().unwrap();

        ctx.world_vis.leaf_history[0] = crate::render::world::LeafHistory { visible: true, last_visited_frame: 5 };
        ctx.counters.frame_count = 8;
        assert!(ctx.static_light_visible(&world, 0));
        ctx.counters.frame_count = 9;
        assert!(!ctx.static_light_visible(&world, 0));
    }

    #[test]
    fn test_light_outside_view_is_shadow_only_and_demoted() {
        let config = RendererConfig { shadows: ShadowMode::Esm16, ..Default::default() };
        let mut ctx = context(config);
        let stone = ctx.register_shader(Shader::new("stone"));
        load(&mut ctx, World { surfaces: vec![wall(stone, 200.0)], ..Default::default() });

        // Behind the camera, reaching forward past the wall.
        let mut light = RefLight::omni(Vec3::new(-100.0, 0.0, 0.0), 90.0, Vec3::repeat(1.0));
        light.radius = Vec3::new(400.0, 40.0, 40.0);
        ctx.add_ref_light(light);
        let slices = ctx.scene.pending_slices();

        let mut v = view();
        // Squeeze the frustum so the light box misses it entirely.
        v.frustum = crate::spatial::Frustum::from_fov(&Vec3::new(0.0, 500.0, 0.0), &IDENTITY_AXES, 10.0, 10.0, 4.0);
        ctx.build_light_interactions(&v, &slices);

        let light = &ctx.scene.lights[0];
        assert!(light.outside_view);
        assert_eq!(light.cull, CullResult::Out);
        assert_eq!(light.num_interactions, 1);
        assert_eq!(light.num_shadow_only, 1);
        assert_eq!(ctx.num_interactions(), 0);
        assert_eq!(ctx.stats.interactions(), 0);
        assert_eq!(ctx.stats.demoted_lights, 1);
    }

    #[test]
    fn test_arena_overflow_is_counted() {
        let limits = RendererLimits { max_interactions: 1, ..Default::default() };
        let mut ctx = RendererContext::inline(RendererConfig::default(), limits, RecordingBackEnd::new()).unwrap();
        let stone = ctx.register_shader(Shader::new("stone"));
        load(&mut ctx, World { surfaces: vec![wall(stone, 200.0), wall(stone, 201.0)], ..Default::default() });
        ctx.add_dynamic_light(Vec3::new(180.0, 0.0, 0.0), 64.0, 1.0, Vec3::repeat(1.0), None);

        let slices = ctx.scene.pending_slices();
        ctx.build_light_interactions(&view(), &slices);
        assert_eq!(ctx.num_interactions(), 1);
        assert_eq!(ctx.stats.overflow.count(Overflow::Interactions), 1);
    }
}
