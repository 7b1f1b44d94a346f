//! # Renderer Context
//!
//! One value holds every piece of renderer state: settings, registries,
//! the loaded world, the frame's scene arrays, the draw surface ring, the
//! interaction arena and the two command lists. Pipeline steps are methods
//! on it, split across the `render` modules by concern.
//!
//! Tests build a fresh context per case.

use std::sync::Arc;
use std::time::Instant;

use crate::core::config::{RendererConfig, RendererLimits};
use crate::foundation::logging::info;
use crate::render::backend::{BackEnd, BackEndDriver, CommandQueue};
use crate::render::draw2d::Draw2dState;
use crate::render::draw_surface::DrawSurfaceList;
use crate::render::entity::FrameEntity;
use crate::render::interaction::{Interaction, InteractionArena};
use crate::render::light::FrameLight;
use crate::render::model::{AnimationRegistry, ModelKind, ModelRegistry};
use crate::render::scene::Scene;
use crate::render::shader::ShaderRegistry;
use crate::render::stats::FrameStats;
use crate::render::world::{World, WorldVisState};
use crate::render::RenderResult;

/// Frame and view counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCounters {
    /// Frames begun
    pub frame_count: u32,
    /// Scenes rendered in the current frame
    pub frame_scene_num: u32,
    /// Views rendered in the current frame
    pub views_in_frame: usize,
    /// Views ever rendered; stamps surface visits
    pub view_count: u32,
    /// Leaf markings ever made
    pub vis_count: u32,
    /// Light joins ever run; stamps surface light tests
    pub light_count: u32,
}

/// Settings whose change forces the back end to drain first
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AppliedSettings {
    pub texture_mode: String,
    pub gamma: f32,
}

/// All renderer state
#[derive(Debug)]
pub struct RendererContext {
    pub(crate) config: RendererConfig,
    pub(crate) limits: RendererLimits,
    pub(crate) shaders: ShaderRegistry,
    pub(crate) models: ModelRegistry,
    pub(crate) animations: AnimationRegistry,
    pub(crate) world: Option<Arc<World>>,
    pub(crate) world_vis: WorldVisState,
    pub(crate) scene: Scene,
    pub(crate) draw_surfs: DrawSurfaceList,
    pub(crate) interactions: InteractionArena,
    pub(crate) commands: CommandQueue,
    pub(crate) stats: FrameStats,
    pub(crate) last_stats: FrameStats,
    pub(crate) counters: FrameCounters,
    pub(crate) draw2d: Draw2dState,
    pub(crate) applied: AppliedSettings,
    pub(crate) frame_start: Option<Instant>,
}

impl RendererContext {
    /// Validate the settings and allocate every per-frame array
    pub fn new(config: RendererConfig, limits: RendererLimits, driver: BackEndDriver) -> RenderResult<Self> {
        config.validate()?;
        limits.validate()?;

        info!(
            "Renderer context: {} draw surfs, {} interactions, {} byte command lists",
            limits.max_draw_surfs, limits.max_interactions, limits.max_render_command_bytes
        );

        let applied = AppliedSettings {
            texture_mode: config.texture_mode.clone(),
            gamma: config.gamma,
        };

        Ok(Self {
            shaders: ShaderRegistry::new(),
            models: ModelRegistry::new(),
            animations: AnimationRegistry::new(),
            world: None,
            world_vis: WorldVisState::default(),
            scene: Scene::default(),
            draw_surfs: DrawSurfaceList::with_capacity(limits.max_draw_surfs),
            interactions: InteractionArena::with_capacity(limits.max_interactions),
            commands: CommandQueue::new(limits.max_render_command_bytes, limits.max_2d_poly_verts, driver),
            stats: FrameStats::default(),
            last_stats: FrameStats::default(),
            counters: FrameCounters::default(),
            draw2d: Draw2dState::default(),
            applied,
            frame_start: None,
            config,
            limits,
        })
    }

    /// Context whose back end runs on the caller's thread
    pub fn inline(config: RendererConfig, limits: RendererLimits, backend: impl BackEnd + 'static) -> RenderResult<Self> {
        Self::new(config, limits, BackEndDriver::Inline(Box::new(backend)))
    }

    /// Replace the loaded world.
    ///
    /// Drains the back end first, drops the previous world's brush models
    /// and registers the new ones as `*1`, `*2`, ...
    pub fn load_world(&mut self, world: Arc<World>) -> RenderResult<()> {
        self.issue_pending_render_commands()?;

        self.models.remove_brush_models();
        for index in 1..world.brush_models.len() {
            self.models.register(format!("*{index}"), ModelKind::Brush(index));
        }

        info!(
            "Loaded world '{}': {} surfaces, {} leaves, {} static lights",
            world.name,
            world.surfaces.len(),
            world.leaves.len(),
            world.lights.len()
        );

        self.world_vis = WorldVisState::new(&world);
        self.world = Some(world);
        Ok(())
    }

    /// Per-frame switches
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Mutable switches; capacities cannot change after creation
    pub fn config_mut(&mut self) -> &mut RendererConfig {
        &mut self.config
    }

    /// Capacities
    pub fn limits(&self) -> &RendererLimits {
        &self.limits
    }

    /// Registered shaders
    pub fn shaders(&self) -> &ShaderRegistry {
        &self.shaders
    }

    /// Registered models
    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    /// Registered animations
    pub fn animations(&self) -> &AnimationRegistry {
        &self.animations
    }

    /// Loaded world
    pub fn world(&self) -> Option<&Arc<World>> {
        self.world.as_ref()
    }

    /// Counters of the frame in progress
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Counters of the last finished frame
    pub fn last_stats(&self) -> &FrameStats {
        &self.last_stats
    }

    /// Frame and view counters
    pub fn counters(&self) -> &FrameCounters {
        &self.counters
    }

    /// Entities submitted this frame, with their latest cull results
    pub fn entities(&self) -> &[FrameEntity] {
        &self.scene.entities
    }

    /// Lights submitted this frame, with their latest view results
    pub fn lights(&self) -> &[FrameLight] {
        &self.scene.lights
    }

    /// Interaction records of one light from its latest view
    pub fn light_interactions(&self, light: usize) -> &[Interaction] {
        self.scene
            .lights
            .get(light)
            .map_or(&[], |l| self.interactions.slice(&l.interactions))
    }

    /// Interactions kept this frame across all views
    pub fn num_interactions(&self) -> usize {
        self.interactions.len()
    }

    /// Draw surfaces added this frame across all views
    pub fn num_draw_surfs(&self) -> usize {
        self.draw_surfs.count()
    }

    /// The command list the front end is writing
    pub fn command_list(&self) -> &crate::render::command_buffer::RenderCommandList {
        self.commands.current_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::render::backend::RecordingBackEnd;
    use crate::render::world::BrushModel;
    use crate::render::RenderError;
    use crate::spatial::Aabb;

    #[test]
    fn test_new_rejects_invalid_settings() {
        let limits = RendererLimits { max_draw_surfs: 0, ..Default::default() };
        let result = RendererContext::inline(RendererConfig::default(), limits, RecordingBackEnd::new());
        assert!(matches!(result, Err(RenderError::Config(ConfigError::Invalid(_)))));

        let config = RendererConfig { z_near: -1.0, ..Default::default() };
        let result = RendererContext::inline(config, RendererLimits::default(), RecordingBackEnd::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_world_registers_brush_models() {
        let mut ctx =
            RendererContext::inline(RendererConfig::default(), RendererLimits::default(), RecordingBackEnd::new())
                .unwrap();
        let brush = BrushModel { bounds: Aabb::from_center_radius(Default::default(), 8.0), first_surface: 0, num_surfaces: 0 };
        let world = World { brush_models: vec![brush.clone(), brush.clone(), brush], ..Default::default() };

        ctx.load_world(Arc::new(world.clone())).unwrap();
        assert!(ctx.models().find("*1").is_some());
        assert!(ctx.models().find("*2").is_some());
        assert!(ctx.models().find("*3").is_none());

        // Reloading replaces rather than accumulates.
        ctx.load_world(Arc::new(World { brush_models: world.brush_models[..2].to_vec(), ..Default::default() }))
            .unwrap();
        assert!(ctx.models().find("*2").is_none());
        assert_eq!(ctx.models().len(), 1);
    }
}
