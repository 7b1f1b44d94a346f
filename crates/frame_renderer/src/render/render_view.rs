//! # View Rendering
//!
//! `render_view` runs one view end to end: camera setup, the world and
//! polygon pass, the far clip, the entity pass, the light join, the sort,
//! at most one portal sub-view, and finally the `DRAW_VIEW` command.
//!
//! The view's command is appended after its sub-view returns, so a portal's
//! contents always execute before the surface showing them.

use crate::foundation::logging::trace;
use crate::render::command_buffer::{ViewLight, ViewSnapshot};
use crate::render::context::RendererContext;
use crate::render::culling::CullResult;
use crate::render::shader::SortClass;
use crate::render::stats::Overflow;
use crate::render::view::{RefDef, RefDefFlags, SceneSlices, ViewParms, MAX_PORTAL_DEPTH};
use crate::render::world::World;
use crate::render::{RenderError, RenderResult};

impl RendererContext {
    /// Render one view of a scene.
    ///
    /// Running out of view slots drops the view. Exceeding the portal depth
    /// and meeting a material with a bad sort class are errors.
    pub fn render_view(&mut self, mut view: ViewParms, refdef: &RefDef) -> RenderResult<()> {
        if !view.viewport.is_valid() {
            return Ok(());
        }
        if self.counters.views_in_frame >= self.limits.max_views {
            self.stats.overflow.record(
                Overflow::Views,
                format_args!("Dropping view, reached the limit of {} views", self.limits.max_views),
            );
            return Ok(());
        }
        if view.portal_depth > MAX_PORTAL_DEPTH {
            return Err(RenderError::ViewDepthExceeded { depth: view.portal_depth });
        }

        self.shaders.update_ranks();
        self.counters.views_in_frame += 1;
        self.counters.view_count += 1;
        self.stats.views += 1;
        if view.is_portal() {
            self.stats.portal_views += 1;
        }

        view.view_count = self.counters.view_count;
        view.frame_count = self.counters.frame_count;
        view.frame_scene_num = self.counters.frame_scene_num;
        view.first_draw_surf = self.draw_surfs.count();
        view.first_interaction = self.interactions.len();

        view.rotate_for_viewer();
        view.setup_projection(&self.config, true);
        view.setup_frustum();

        let slices = refdef.scene.clone();
        let world = self.world.clone();
        let draws_world = world.is_some() && !refdef.flags.contains(RefDefFlags::NO_WORLD_MODEL);

        self.cull_decal_projectors(&view, &slices);
        if let (true, Some(world)) = (draws_world, world.as_deref()) {
            self.add_world_surfaces(&mut view, world, &slices);
        }
        self.add_polygon_surfaces(&mut view, &slices);
        self.add_light_bounds_to_vis_bounds(&mut view, &slices);

        view.set_far_clip(&self.config, draws_world, world.as_deref().and_then(World::global_fog_depth));
        view.setup_projection(&self.config, false);
        view.setup_unprojection()?;
        view.setup_frustum_from_mvp();
        view.setup_split_frustums(self.config.parallel_shadow_splits, self.config.parallel_shadow_split_weight);

        self.add_entity_surfaces(&view, &slices);
        self.build_light_interactions(&view, &slices);
        self.log_light_joins(&slices);

        let end = self.draw_surfs.count();
        view.num_draw_surfs = end - view.first_draw_surf;
        view.num_interactions = self.interactions.len() - view.first_interaction;
        self.draw_surfs.sort_range(view.first_draw_surf, end);

        trace!(
            "view {} depth {}: {} draw surfs, {} interactions, far clip {:.1}",
            view.view_count,
            view.portal_depth,
            view.num_draw_surfs,
            view.num_interactions,
            view.z_far
        );

        let snapshot = self.view_snapshot(&view, refdef, &slices);

        // Portal materials sort first; stop at the first one that opens.
        for surf in &snapshot.draw_surfs {
            match self.shaders.get_or_default(surf.shader).sort {
                SortClass::Bad => {
                    let name = self.shaders.get_or_default(surf.shader).name.clone();
                    return Err(RenderError::BadShaderSort(name));
                }
                SortClass::Portal => {
                    if self.mirror_view_by_surface(&view, refdef, surf)? {
                        break;
                    }
                }
                _ => break,
            }
        }

        if !self.commands.current().push_view(snapshot)? {
            self.stats.overflow.record(
                Overflow::CommandBuffer,
                format_args!("Command list full, dropping view {}", view.view_count),
            );
        }
        Ok(())
    }

    /// Copy out everything the back end needs to draw the view
    fn view_snapshot(&self, view: &ViewParms, refdef: &RefDef, slices: &SceneSlices) -> ViewSnapshot {
        let first = view.first_interaction;
        let lights = slices
            .lights
            .clone()
            .filter_map(|i| self.scene.lights.get(i))
            .filter(|light| light.cull != CullResult::Out && !light.interactions.is_empty())
            .map(|light| {
                let start = light.interactions.start.saturating_sub(first);
                ViewLight { light: light.clone(), interactions: start..start + light.interactions.count }
            })
            .collect();

        let range = view.draw_surf_range();
        ViewSnapshot {
            parms: view.clone(),
            refdef: refdef.clone(),
            draw_surfs: self.draw_surfs.view_range(range.start, range.end).copied().collect(),
            interactions: self.interactions.tail(first).to_vec(),
            lights,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{RendererConfig, RendererLimits};
    use crate::foundation::math::{Vec3, IDENTITY_AXES};
    use crate::render::backend::RecordingBackEnd;
    use crate::render::commands::RenderCommand;
    use crate::render::entity::RefEntity;
    use crate::render::shader::Shader;

    fn context(limits: RendererLimits) -> RendererContext {
        RendererContext::inline(RendererConfig::default(), limits, RecordingBackEnd::new()).unwrap()
    }

    fn refdef() -> RefDef {
        RefDef::new(Vec3::zeros(), IDENTITY_AXES, 640, 480, 90.0, 73.74)
    }

    fn draw_views(ctx: &RendererContext) -> usize {
        let mut list = ctx.command_list().clone();
        list.terminate();
        list.commands()
            .filter(|c| matches!(c, Ok(RenderCommand::DrawView(_))))
            .count()
    }

    #[test]
    fn test_invalid_viewport_renders_nothing() {
        let mut ctx = context(RendererLimits::default());
        let refdef = RefDef { width: 0, ..refdef() };
        ctx.render_view(ViewParms::from_refdef(&refdef, 4.0), &refdef).unwrap();
        assert_eq!(ctx.stats.views, 0);
        assert!(!ctx.command_list().has_pending());
    }

    #[test]
    fn test_view_pool_exhaustion_drops_views() {
        let mut ctx = context(RendererLimits { max_views: 2, ..Default::default() });
        let refdef = refdef();
        for _ in 0..3 {
            ctx.render_view(ViewParms::from_refdef(&refdef, 4.0), &refdef).unwrap();
        }
        assert_eq!(ctx.stats.views, 2);
        assert_eq!(ctx.stats.overflow.count(Overflow::Views), 1);
        assert_eq!(draw_views(&ctx), 2);
    }

    #[test]
    fn test_depth_past_limit_is_an_error() {
        let mut ctx = context(RendererLimits::default());
        let refdef = refdef();
        let mut view = ViewParms::from_refdef(&refdef, 4.0);
        view.portal_depth = MAX_PORTAL_DEPTH + 1;
        let result = ctx.render_view(view, &refdef);
        assert!(matches!(result, Err(RenderError::ViewDepthExceeded { depth: 2 })));
    }

    #[test]
    fn test_bad_sort_class_is_an_error() {
        let mut ctx = context(RendererLimits::default());
        let broken = ctx.register_shader(Shader::new("broken").with_sort(SortClass::Bad));
        ctx.add_ref_entity(RefEntity::sprite(broken, Vec3::new(50.0, 0.0, 0.0), 4.0));
        let refdef = RefDef { scene: ctx.scene.pending_slices(), ..refdef() };

        let result = ctx.render_view(ViewParms::from_refdef(&refdef, 4.0), &refdef);
        assert!(matches!(result, Err(RenderError::BadShaderSort(name)) if name == "broken"));
    }

    #[test]
    fn test_snapshot_holds_sorted_surfaces() {
        let mut ctx = context(RendererLimits::default());
        let late = ctx.register_shader(Shader::new("late").with_sort(SortClass::Nearest));
        let early = ctx.register_shader(Shader::new("early"));
        ctx.add_ref_entity(RefEntity::sprite(late, Vec3::new(50.0, 0.0, 0.0), 4.0));
        ctx.add_ref_entity(RefEntity::sprite(early, Vec3::new(60.0, 0.0, 0.0), 4.0));
        let refdef = RefDef { scene: ctx.scene.pending_slices(), ..refdef() };

        ctx.render_view(ViewParms::from_refdef(&refdef, 4.0), &refdef).unwrap();
        let snapshot = ctx.command_list().view(0).unwrap();
        let shaders: Vec<_> = snapshot.draw_surfs.iter().map(|s| s.shader).collect();
        assert_eq!(shaders, vec![early, late]);
        assert_eq!(snapshot.parms.num_draw_surfs, 2);
        assert_eq!(snapshot.parms.z_far, crate::render::view::DEFAULT_FAR_CLIP);
    }

    #[test]
    fn test_shader_registered_between_views_is_ranked() {
        let mut ctx = context(RendererLimits::default());
        let late = ctx.register_shader(Shader::new("late"));
        ctx.add_ref_entity(RefEntity::sprite(late, Vec3::new(50.0, 0.0, 0.0), 4.0));
        let first = RefDef { scene: ctx.scene.pending_slices(), ..refdef() };
        ctx.render_view(ViewParms::from_refdef(&first, 4.0), &first).unwrap();

        let early = ctx.register_shader(Shader::new("early").with_sort(SortClass::EnvironmentFog));
        assert!(ctx.shaders().ranks_stale());
        ctx.clear_scene();
        ctx.add_ref_entity(RefEntity::sprite(late, Vec3::new(50.0, 0.0, 0.0), 4.0));
        ctx.add_ref_entity(RefEntity::sprite(early, Vec3::new(60.0, 0.0, 0.0), 4.0));
        let second = RefDef { scene: ctx.scene.pending_slices(), ..refdef() };
        ctx.render_view(ViewParms::from_refdef(&second, 4.0), &second).unwrap();

        assert!(!ctx.shaders().ranks_stale());
        let snapshot = ctx.command_list().view(1).unwrap();
        let shaders: Vec<_> = snapshot.draw_surfs.iter().map(|s| s.shader).collect();
        assert_eq!(shaders, vec![early, late]);
        assert!(snapshot.draw_surfs[0].sort_index < snapshot.draw_surfs[1].sort_index);
    }
}
