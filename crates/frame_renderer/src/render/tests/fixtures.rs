//! Shared builders for the scenario tests

use std::sync::Arc;

use crate::core::config::{RendererConfig, RendererLimits};
use crate::foundation::math::{Vec3, IDENTITY_AXES};
use crate::render::backend::{RecordedCommand, RecordingBackEnd};
use crate::render::command_buffer::ViewSnapshot;
use crate::render::context::RendererContext;
use crate::render::shader::ShaderHandle;
use crate::render::view::RefDef;
use crate::render::world::{World, WorldSurface};

/// Context with default settings and a recorder attached
pub fn context() -> (RendererContext, RecordingBackEnd) {
    context_with(RendererConfig::default(), RendererLimits::default())
}

pub fn context_with(config: RendererConfig, limits: RendererLimits) -> (RendererContext, RecordingBackEnd) {
    let recorder = RecordingBackEnd::new();
    let ctx = RendererContext::inline(config, limits, recorder.clone()).unwrap();
    (ctx, recorder)
}

/// Camera at the origin looking down +X
pub fn camera() -> RefDef {
    RefDef::new(Vec3::zeros(), IDENTITY_AXES, 640, 480, 90.0, 73.74)
}

/// 20x20 wall at `x` facing the origin
pub fn wall(shader: ShaderHandle, x: f32) -> WorldSurface {
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

/// World made of loose surfaces and nothing else
pub fn world(surfaces: Vec<WorldSurface>) -> Arc<World> {
    Arc::new(World { name: "test".to_string(), surfaces, ..Default::default() })
}

/// Views the back end received, in execution order
pub fn views(recorded: &[RecordedCommand]) -> Vec<&ViewSnapshot> {
    recorded
        .iter()
        .filter_map(|c| match c {
            RecordedCommand::View(view) => Some(view.as_ref()),
            _ => None,
        })
        .collect()
}
