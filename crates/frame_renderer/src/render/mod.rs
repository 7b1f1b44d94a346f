//! # Frame Pipeline
//!
//! Turns one frame's scene description into an ordered command stream.
//!
//! ## Architecture
//!
//! - **Scene data**: shaders, models, the static world, entities, lights,
//!   polygons; registered or submitted through [`RendererContext`]
//! - **Views**: [`RendererContext::render_scene`] builds the top-level view;
//!   each view culls, collects draw surfaces, joins lights against surfaces,
//!   sorts, and may recurse once into a portal or mirror view
//! - **Command lists**: every view ends in a `DRAW_VIEW` command; 2D drawing
//!   and frame control append their own commands
//! - **Back end**: drains a finished list, inline or on a worker thread
//!
//! ## Soft drops
//!
//! Capacity overflows never fail a frame. They drop or recycle the excess,
//! log a warning the first time in a frame, and are counted in
//! [`FrameStats`].

pub mod backend;
pub mod collector;
pub mod command_buffer;
pub mod commands;
pub mod context;
pub mod culling;
pub mod draw2d;
pub mod draw_surface;
pub mod entity;
pub mod frame;
pub mod interaction;
pub mod light;
pub mod light_interactions;
pub mod model;
pub mod portal;
pub mod render_view;
pub mod scene;
pub mod shader;
pub mod stats;
pub mod view;
pub mod world;

#[cfg(test)]
mod tests;

pub use backend::{
    execute_render_commands, BackEnd, BackEndDriver, BackEndReport, CommandQueue, RecordedCommand, RecordingBackEnd,
    ThreadedBackEnd,
};
pub use command_buffer::{RenderCommandList, ViewLight, ViewSnapshot};
pub use commands::{CommandTag, PolyVert, RenderCommand};
pub use context::RendererContext;
pub use culling::{CubeSides, CullResult};
pub use draw_surface::{DrawSurf, EntityRef, SurfaceRef, LIGHTMAP_NONE};
pub use entity::{EntityKind, RefEntity, RenderFx};
pub use frame::FrameTimings;
pub use interaction::{Interaction, InteractionKind};
pub use light::{LightFlags, LightKind, RefLight};
pub use model::{AnimationHandle, ModelHandle, ModelKind};
pub use scene::{Corona, DecalProjector, Poly, PolyBuffer};
pub use shader::{CullType, Shader, ShaderHandle, SortClass};
pub use stats::{FrameStats, Overflow};
pub use view::{RefDef, RefDefFlags, ViewFlags, ViewParms, Viewport};
pub use world::World;

use crate::config::ConfigError;
use thiserror::Error;

/// Errors that stop a frame
///
/// Everything here is a broken invariant. Running out of capacity is not an
/// error; see the module docs.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A single command is larger than a whole command list
    ///
    /// No amount of flushing can make such a command fit, so the caller is
    /// asking for something the list was never sized for.
    #[error("Command of {requested} bytes cannot fit a {capacity} byte command list")]
    CommandTooLarge {
        /// Requested size
        requested: usize,
        /// Size of the list
        capacity: usize,
    },

    /// The back end read a tag that is not part of the protocol
    #[error("Unknown command tag {tag} at byte {offset}")]
    UnknownCommandTag {
        /// Raw tag value
        tag: u32,
        /// Position in the list
        offset: usize,
    },

    /// A command's payload runs past the end of the list
    #[error("Truncated command at byte {offset}")]
    TruncatedCommand {
        /// Position of the missing bytes
        offset: usize,
    },

    /// A draw surface reached the sort with a broken material
    #[error("Shader '{0}' has a bad sort class")]
    BadShaderSort(String),

    /// A view was requested deeper than portal recursion allows
    #[error("View depth {depth} exceeds the portal recursion limit")]
    ViewDepthExceeded {
        /// Requested depth
        depth: u32,
    },

    /// A matrix that must be inverted is singular
    #[error("Singular matrix")]
    SingularMatrix,

    /// Settings were rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The back-end worker thread is gone
    #[error("Render back end disconnected")]
    BackEndDisconnected,
}

/// Result type for frame operations
pub type RenderResult<T> = Result<T, RenderError>;
