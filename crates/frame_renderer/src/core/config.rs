//! # Renderer Configuration
//!
//! Runtime switches and fixed capacities of the frame pipeline. Switches are
//! read every frame; capacities are read once when a
//! [`RendererContext`](crate::render::RendererContext) is created.
//!
//! ## Configuration Categories
//!
//! - **Switches** ([`RendererConfig`]): culling overrides, lighting policy,
//!   shadow mode, clip distances, diagnostics
//! - **Limits** ([`RendererLimits`]): per-frame array sizes and the command
//!   buffer size; every overflow of these is a counted soft drop

use serde::{Deserialize, Serialize};

pub use crate::config::{Config, ConfigError};

/// Shadow technique, ordered from cheapest to most expensive.
///
/// Comparisons are meaningful: code asks "at least blob shadows" with `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum ShadowMode {
    /// No shadows at all
    None,
    /// Projected blob under entities
    #[default]
    Blob,
    /// Exponential shadow maps, 16 bit
    Esm16,
    /// Exponential shadow maps, 32 bit
    Esm32,
    /// Variance shadow maps, 16 bit
    Vsm16,
    /// Variance shadow maps, 32 bit
    Vsm32,
    /// Exponential variance shadow maps, 32 bit; enables cube-side culling
    Evsm32,
}

impl ShadowMode {
    /// Whether lights render real shadow geometry in this mode
    pub fn casts_shadow_maps(self) -> bool {
        self > Self::Blob
    }
}

/// Per-frame switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Force every cull test to report a partial hit
    pub no_cull: bool,
    /// Ignore world visibility data and mark every leaf
    pub no_vis: bool,
    /// Skip the leaf visibility test for static lights
    pub no_light_vis_cull: bool,
    /// Skip light-frustum culling of candidate surfaces
    pub no_light_frustums: bool,
    /// Disable cube-side computation for omni lights
    pub no_shadow_pyramids: bool,
    /// Never recurse into portal or mirror views
    pub no_portals: bool,
    /// Emit entity surfaces
    pub draw_entities: bool,
    /// Emit world surfaces
    pub draw_world: bool,
    /// Emit polygon and polygon-buffer surfaces
    pub draw_polies: bool,
    /// Process static (baked) lights
    pub static_light: bool,
    /// Process dynamic lights
    pub dynamic_light: bool,
    /// Allow dynamic lights to cast shadows
    pub dynamic_light_shadows: bool,
    /// Static lighting is precomputed into lightmaps
    pub precomputed_lighting: bool,
    /// Static lighting is baked into vertex colors
    pub vertex_lighting: bool,
    /// Shadow technique
    pub shadows: ShadowMode,
    /// Use occlusion-query history to reject static lights
    pub dynamic_bsp_occlusion_culling: bool,
    /// Frames a leaf stays "recently visible" for the occlusion heuristic
    pub chc_max_visible_frames: u32,
    /// Near clip distance
    pub z_near: f32,
    /// Far clip override; `0` computes it from the visible bounds
    pub z_far: f32,
    /// Number of extra parallel shadow split frustums
    pub parallel_shadow_splits: usize,
    /// Blend between logarithmic (1.0) and uniform (0.0) split spacing
    pub parallel_shadow_split_weight: f32,
    /// Clamp the far clip to the global fog's opaque depth
    pub wolf_fog: bool,
    /// Performance counter report level, `0` disables it
    pub speeds: u32,
    /// Build command lists but never hand them to the back end
    pub skip_back_end: bool,
    /// Extra developer diagnostics
    pub developer: bool,
    /// Texture filter mode; a change forces a back-end flush
    pub texture_mode: String,
    /// Display gamma; a change forces a back-end flush
    pub gamma: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            no_cull: false,
            no_vis: false,
            no_light_vis_cull: false,
            no_light_frustums: false,
            no_shadow_pyramids: false,
            no_portals: false,
            draw_entities: true,
            draw_world: true,
            draw_polies: true,
            static_light: true,
            dynamic_light: true,
            dynamic_light_shadows: true,
            precomputed_lighting: false,
            vertex_lighting: false,
            shadows: ShadowMode::Blob,
            dynamic_bsp_occlusion_culling: false,
            chc_max_visible_frames: 10,
            z_near: 3.0,
            z_far: 0.0,
            parallel_shadow_splits: 2,
            parallel_shadow_split_weight: 0.9,
            wolf_fog: true,
            speeds: 0,
            skip_back_end: false,
            developer: false,
            texture_mode: "GL_LINEAR_MIPMAP_NEAREST".to_string(),
            gamma: 1.0,
        }
    }
}

impl Config for RendererConfig {}

impl RendererConfig {
    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.z_near.is_nan() || self.z_near <= 0.0 {
            return Err(ConfigError::Invalid(format!("z_near must be positive, got {}", self.z_near)));
        }
        if self.z_far < 0.0 {
            return Err(ConfigError::Invalid(format!("z_far must not be negative, got {}", self.z_far)));
        }
        if !(0.0..=1.0).contains(&self.parallel_shadow_split_weight) {
            return Err(ConfigError::Invalid(format!(
                "parallel_shadow_split_weight must be within 0..=1, got {}",
                self.parallel_shadow_split_weight
            )));
        }
        Ok(())
    }
}

/// Fixed per-frame capacities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererLimits {
    /// Draw surfaces per frame, across all views
    pub max_draw_surfs: usize,
    /// Light interactions per frame, across all views
    pub max_interactions: usize,
    /// Views per frame, portals included
    pub max_views: usize,
    /// Bytes in each of the two command lists
    pub max_render_command_bytes: usize,
    /// Scene entities per frame
    pub max_ref_entities: usize,
    /// Scene lights per frame
    pub max_ref_lights: usize,
    /// Scene polygons per frame
    pub max_polys: usize,
    /// Scene polygon vertices per frame
    pub max_poly_verts: usize,
    /// Polygon buffers per frame
    pub max_poly_buffers: usize,
    /// Coronas per frame
    pub max_coronas: usize,
    /// Decal projectors per frame
    pub max_decal_projectors: usize,
    /// 2D polygon vertices per command list
    pub max_2d_poly_verts: usize,
    /// Render-to-texture targets
    pub max_render_textures: usize,
}

impl Default for RendererLimits {
    fn default() -> Self {
        Self {
            max_draw_surfs: 0x10000,
            max_interactions: 0x10000 * 8,
            max_views: 10,
            max_render_command_bytes: 0x40000 * 8,
            max_ref_entities: 1023,
            max_ref_lights: 1024,
            max_polys: 16384,
            max_poly_verts: 32768,
            max_poly_buffers: 4096,
            max_coronas: 64,
            max_decal_projectors: 32,
            max_2d_poly_verts: 8192,
            max_render_textures: 256,
        }
    }
}

impl Config for RendererLimits {}

impl RendererLimits {
    /// Reject zero capacities
    pub fn validate(&self) -> Result<(), ConfigError> {
        let capacities = [
            ("max_draw_surfs", self.max_draw_surfs),
            ("max_interactions", self.max_interactions),
            ("max_views", self.max_views),
            ("max_render_command_bytes", self.max_render_command_bytes),
            ("max_ref_entities", self.max_ref_entities),
            ("max_ref_lights", self.max_ref_lights),
            ("max_polys", self.max_polys),
            ("max_poly_verts", self.max_poly_verts),
        ];
        for (name, value) in capacities {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }
}
