//! # Scene Submission
//!
//! Game code describes a frame through these calls. Everything submitted
//! lands in frame-scoped arrays owned by [`Scene`]; `clear_scene` marks where
//! the next scene of the same frame starts and `init_next_frame` empties the
//! arrays.
//!
//! Capacity overflows drop the submission and are counted, see
//! [`Overflow`](crate::render::stats::Overflow).

use std::time::Instant;

use crate::foundation::logging::{debug, warn, warn_once};
use crate::foundation::math::Vec3;
use crate::render::commands::PolyVert;
use crate::render::context::RendererContext;
use crate::render::culling::CullResult;
use crate::render::entity::{FrameEntity, RefEntity};
use crate::render::light::{FrameLight, LightFlags, RefLight};
use crate::render::model::{Animation, AnimationHandle, ModelHandle, ModelKind};
use crate::render::shader::{Shader, ShaderHandle};
use crate::render::stats::Overflow;
use crate::render::view::{RefDef, RefDefFlags, SceneSlices, ViewParms};
use crate::render::RenderResult;
use crate::spatial::Aabb;

/// A polygon submitted for the frame; its vertices live in [`Scene::poly_verts`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Poly {
    /// Material
    pub shader: ShaderHandle,
    /// First vertex in the scene's vertex pool
    pub first_vert: usize,
    /// Vertex count
    pub num_verts: usize,
    /// Fog volume number, `0` for none
    pub fog: usize,
    /// World-space bounds of the vertices
    pub bounds: Aabb,
}

/// Indexed triangle batch submitted for the frame
#[derive(Debug, Clone, PartialEq)]
pub struct PolyBuffer {
    /// Material
    pub shader: ShaderHandle,
    /// Vertices
    pub verts: Vec<PolyVert>,
    /// Triangle list into `verts`
    pub indices: Vec<u32>,
    /// Fog volume number, filled in on submission
    pub fog: usize,
    /// World-space bounds, filled in on submission
    pub bounds: Aabb,
}

impl PolyBuffer {
    /// Buffer drawn with `shader`
    pub fn new(shader: ShaderHandle, verts: Vec<PolyVert>, indices: Vec<u32>) -> Self {
        Self { shader, verts, indices, fog: 0, bounds: Aabb::empty() }
    }
}

/// Light flare
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corona {
    /// Position
    pub origin: Vec3,
    /// Color
    pub color: Vec3,
    /// Size multiplier
    pub scale: f32,
    /// Caller's identifier, used to fade between frames
    pub id: i32,
}

/// Volume that projects a decal material onto world surfaces
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecalProjector {
    /// Decal material
    pub shader: ShaderHandle,
    /// Projected volume
    pub bounds: Aabb,
    /// Color modulation
    pub color: [f32; 4],
    /// Visibility in the current view
    pub cull: CullResult,
}

/// Where the current scene starts in each array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SceneMarks {
    /// First entity
    pub entities: usize,
    /// First light
    pub lights: usize,
    /// First polygon
    pub polys: usize,
    /// First polygon buffer
    pub poly_buffers: usize,
    /// First decal projector
    pub decal_projectors: usize,
}

/// Frame-scoped scene arrays
#[derive(Debug, Clone, Default)]
pub struct Scene {
    /// Entities
    pub entities: Vec<FrameEntity>,
    /// Lights
    pub lights: Vec<FrameLight>,
    /// Polygons
    pub polys: Vec<Poly>,
    /// Vertex pool of `polys`
    pub poly_verts: Vec<PolyVert>,
    /// Polygon buffers
    pub poly_buffers: Vec<PolyBuffer>,
    /// Coronas
    pub coronas: Vec<Corona>,
    /// Decal projectors
    pub decal_projectors: Vec<DecalProjector>,
    /// Start of the scene being built
    pub first: SceneMarks,
    non_finite_warned: bool,
}

impl Scene {
    /// Slices from the current marks to the ends of the arrays
    pub fn pending_slices(&self) -> SceneSlices {
        SceneSlices {
            entities: self.first.entities..self.entities.len(),
            lights: self.first.lights..self.lights.len(),
            polys: self.first.polys..self.polys.len(),
            poly_buffers: self.first.poly_buffers..self.poly_buffers.len(),
            decal_projectors: self.first.decal_projectors..self.decal_projectors.len(),
        }
    }

    /// Start a new scene after everything submitted so far
    pub fn mark(&mut self) {
        self.first = SceneMarks {
            entities: self.entities.len(),
            lights: self.lights.len(),
            polys: self.polys.len(),
            poly_buffers: self.poly_buffers.len(),
            decal_projectors: self.decal_projectors.len(),
        };
    }

    /// Vertices of a polygon
    pub fn poly_vertices(&self, poly: &Poly) -> &[PolyVert] {
        let end = (poly.first_vert + poly.num_verts).min(self.poly_verts.len());
        &self.poly_verts[poly.first_vert.min(end)..end]
    }

    /// Empty every array for the next frame
    pub fn clear(&mut self) {
        self.entities.clear();
        self.lights.clear();
        self.polys.clear();
        self.poly_verts.clear();
        self.poly_buffers.clear();
        self.coronas.clear();
        self.decal_projectors.clear();
        self.first = SceneMarks::default();
        self.non_finite_warned = false;
    }
}

fn vert_bounds(verts: &[PolyVert]) -> Aabb {
    let mut bounds = Aabb::empty();
    for v in verts {
        bounds.add_point(&Vec3::from(v.xyz));
    }
    bounds
}

impl RendererContext {
    /// Register a material
    pub fn register_shader(&mut self, shader: Shader) -> ShaderHandle {
        self.shaders.register(shader)
    }

    /// Register a model by name
    pub fn register_model(&mut self, name: impl Into<String>, kind: ModelKind) -> ModelHandle {
        self.models.register(name, kind)
    }

    /// Register a skeletal animation
    pub fn register_animation(&mut self, animation: Animation) -> AnimationHandle {
        self.animations.register(animation)
    }

    /// Start a new scene within the frame
    pub fn clear_scene(&mut self) {
        self.scene.mark();
    }

    fn resolve_submitted_shader(&self, shader: Option<ShaderHandle>, what: &str) -> Option<ShaderHandle> {
        match shader {
            Some(handle) if self.shaders.get(handle).is_some() => Some(handle),
            Some(handle) => {
                warn!("{what} with unknown shader {handle:?} dropped");
                None
            }
            None => {
                warn!("{what} without a shader dropped");
                None
            }
        }
    }

    /// Add an entity to the scene
    pub fn add_ref_entity(&mut self, ent: RefEntity) {
        if self.scene.entities.len() >= self.limits.max_ref_entities {
            self.stats.overflow.record(
                Overflow::Entities,
                format_args!("Dropping ref entities, reached the limit of {}", self.limits.max_ref_entities),
            );
            return;
        }
        if !ent.is_finite() {
            warn_once(
                &mut self.scene.non_finite_warned,
                format_args!("Dropping ref entity with a non-finite placement"),
            );
            return;
        }
        self.scene.entities.push(FrameEntity::new(ent));
    }

    fn push_light(&mut self, light: RefLight, static_index: Option<usize>) {
        if self.scene.lights.len() >= self.limits.max_ref_lights {
            self.stats.overflow.record(
                Overflow::Lights,
                format_args!("Dropping ref lights, reached the limit of {}", self.limits.max_ref_lights),
            );
            return;
        }
        self.scene.lights.push(FrameLight::new(light, static_index));
    }

    /// Add a light to the scene.
    ///
    /// Negative scales mean full intensity; larger ones are clamped to one.
    pub fn add_ref_light(&mut self, mut light: RefLight) {
        if light.is_degenerate() {
            return;
        }

        light.scale = if light.scale < 0.0 { 1.0 } else { light.scale.min(1.0) };

        if !self.config.dynamic_light_shadows && !light.flags.contains(LightFlags::INVERSE_SHADOWS) {
            light.flags |= LightFlags::NO_SHADOWS;
        }

        self.push_light(light, None);
    }

    /// Add a point light of the given radius and intensity
    pub fn add_dynamic_light(&mut self, origin: Vec3, radius: f32, intensity: f32, color: Vec3, attenuation: Option<ShaderHandle>) {
        if intensity <= 0.0 || radius <= 0.0 {
            return;
        }

        let mut light = RefLight::omni(origin, radius, color);
        light.scale = intensity;
        light.attenuation_shader = attenuation;
        if !self.config.dynamic_light_shadows {
            light.flags |= LightFlags::NO_SHADOWS;
        }
        self.push_light(light, None);
    }

    /// Copy the world's baked lights into the scene.
    ///
    /// Lights without precomputed interactions light nothing and are skipped.
    pub fn add_world_lights(&mut self) {
        let Some(world) = self.world.clone() else {
            return;
        };
        for (index, baked) in world.lights.iter().enumerate() {
            if baked.interactions.is_empty() {
                continue;
            }
            self.push_light(baked.light.clone(), Some(index));
        }
    }

    /// Add `num_polys` polygons that share a material.
    ///
    /// `verts` holds the polygons back to back, `verts.len() / num_polys`
    /// vertices each.
    pub fn add_polys(&mut self, shader: Option<ShaderHandle>, verts: &[PolyVert], num_polys: usize) {
        let Some(shader) = self.resolve_submitted_shader(shader, "Polygon") else {
            return;
        };
        if num_polys == 0 || verts.len() < num_polys {
            return;
        }

        let per_poly = verts.len() / num_polys;
        for chunk in verts.chunks_exact(per_poly).take(num_polys) {
            if self.scene.polys.len() >= self.limits.max_polys {
                self.stats.overflow.record(
                    Overflow::Polys,
                    format_args!("Dropping polygons, reached the limit of {}", self.limits.max_polys),
                );
                return;
            }
            if self.scene.poly_verts.len() + chunk.len() > self.limits.max_poly_verts {
                self.stats.overflow.record(
                    Overflow::PolyVerts,
                    format_args!("Dropping polygons, reached the limit of {} vertices", self.limits.max_poly_verts),
                );
                return;
            }

            let bounds = vert_bounds(chunk);
            let fog = self.world.as_ref().map_or(0, |world| world.fog_for_bounds(&bounds));
            self.scene.polys.push(Poly {
                shader,
                first_vert: self.scene.poly_verts.len(),
                num_verts: chunk.len(),
                fog,
                bounds,
            });
            self.scene.poly_verts.extend_from_slice(chunk);
        }
    }

    /// Add an indexed triangle batch
    pub fn add_poly_buffer(&mut self, mut buffer: PolyBuffer) {
        if self.resolve_submitted_shader(Some(buffer.shader), "Polygon buffer").is_none() {
            return;
        }
        if self.scene.poly_buffers.len() >= self.limits.max_poly_buffers {
            self.stats.overflow.record(
                Overflow::PolyBuffers,
                format_args!("Dropping polygon buffers, reached the limit of {}", self.limits.max_poly_buffers),
            );
            return;
        }

        buffer.bounds = vert_bounds(&buffer.verts);
        buffer.fog = self.world.as_ref().map_or(0, |world| world.fog_for_bounds(&buffer.bounds));
        self.scene.poly_buffers.push(buffer);
    }

    /// Add a light flare; invisible ones are ignored
    pub fn add_corona(&mut self, origin: Vec3, color: Vec3, scale: f32, id: i32, visible: bool) {
        if !visible {
            return;
        }
        if self.scene.coronas.len() >= self.limits.max_coronas {
            self.stats.overflow.record(
                Overflow::Coronas,
                format_args!("Dropping coronas, reached the limit of {}", self.limits.max_coronas),
            );
            return;
        }
        self.scene.coronas.push(Corona { origin, color, scale, id });
    }

    /// Queue a decal: `points` outline the decal and are swept along
    /// `direction` for `depth` units.
    pub fn project_decal(&mut self, shader: Option<ShaderHandle>, points: &[Vec3], direction: Vec3, depth: f32, color: [f32; 4]) {
        let Some(shader) = self.resolve_submitted_shader(shader, "Decal") else {
            return;
        };
        if points.len() < 3 || depth <= 0.0 {
            debug!("Ignoring degenerate decal projection");
            return;
        }
        if self.scene.decal_projectors.len() >= self.limits.max_decal_projectors {
            self.stats.overflow.record(
                Overflow::DecalProjectors,
                format_args!("Dropping decal projectors, reached the limit of {}", self.limits.max_decal_projectors),
            );
            return;
        }

        let sweep = direction.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::zeros) * depth;
        let mut bounds = Aabb::empty();
        for p in points {
            bounds.add_point(p);
            bounds.add_point(&(p + sweep));
        }
        self.scene.decal_projectors.push(DecalProjector { shader, bounds, color, cull: CullResult::Clip });
    }

    /// Render everything submitted since the last `clear_scene` from the
    /// refdef's camera.
    pub fn render_scene(&mut self, refdef: &RefDef) -> RenderResult<()> {
        let start = Instant::now();

        if self.world.is_none() && !refdef.flags.contains(RefDefFlags::NO_WORLD_MODEL) {
            debug!("Rendering a world scene before a world was loaded");
        }
        if !refdef.flags.contains(RefDefFlags::NO_WORLD_MODEL) {
            self.add_world_lights();
        }

        let mut refdef = refdef.clone();
        refdef.scene = self.scene.pending_slices();
        self.counters.frame_scene_num += 1;

        let view = ViewParms::from_refdef(&refdef, self.config.z_near);
        let result = self.render_view(view, &refdef);

        // The next scene starts after this one, even when the view failed.
        self.scene.mark();
        self.stats.front_end_ms += start.elapsed().as_secs_f64() * 1000.0;
        result
    }
}
