//! # Frame Renderer
//!
//! The front half of a real-time renderer: it takes a frame's scene
//! description and turns it into an ordered stream of render commands that a
//! back end executes later, inline or on its own thread.
//!
//! ## Features
//!
//! - **Culling**: sphere, box and plane tests against view and light frustums
//! - **Light interactions**: per-light lists of lit and shadow-casting surfaces
//! - **Portals and mirrors**: one level of recursive sub-views
//! - **Command stream**: double-buffered byte lists with soft overflow
//! - **2D drawing**: pictures, gradients and polygons with a clip region
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use frame_renderer::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     frame_renderer::foundation::logging::init();
//!
//!     let mut renderer = RendererContext::inline(
//!         RendererConfig::default(),
//!         RendererLimits::default(),
//!         RecordingBackEnd::new(),
//!     )?;
//!     let flare = renderer.register_shader(Shader::new("flare"));
//!
//!     renderer.begin_frame()?;
//!     renderer.clear_scene();
//!     renderer.add_ref_entity(RefEntity::sprite(flare, Vec3::new(64.0, 0.0, 0.0), 8.0));
//!     renderer.add_dynamic_light(Vec3::new(32.0, 0.0, 16.0), 200.0, 1.0, Vec3::new(1.0, 0.9, 0.8), None);
//!     renderer.render_scene(&RefDef::new(Vec3::zeros(), IDENTITY_AXES, 640, 480, 90.0, 73.74))?;
//!     renderer.stretch_pic(Pic::new(0.0, 0.0, 64.0, 64.0), flare)?;
//!     let timings = renderer.end_frame()?;
//!     println!("front end {:.2}ms", timings.front_end_ms);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;
pub mod spatial;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        core::{RendererConfig, RendererLimits, ShadowMode},
        foundation::math::{Axes, Mat4, Vec3, IDENTITY_AXES},
        render::{
            draw2d::Pic, BackEnd, BackEndDriver, CullResult, FrameStats, FrameTimings, LightFlags, PolyVert,
            RecordingBackEnd, RefDef, RefDefFlags, RefEntity, RefLight, RenderCommand, RenderError, RenderResult,
            RendererContext, Shader, ShaderHandle, SortClass, World,
        },
        spatial::{Aabb, Frustum, Plane},
    };
}
