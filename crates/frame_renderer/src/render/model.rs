//! Model and animation registries
//!
//! Model files are decoded by the asset layer; the renderer keeps the
//! per-frame bounds and the surface list of each model so entities can be
//! culled and emitted without touching vertex data.

use std::collections::HashMap;

use slotmap::SlotMap;

use crate::render::shader::ShaderHandle;
use crate::spatial::Aabb;

slotmap::new_key_type! {
    /// Opaque handle to a registered model
    pub struct ModelHandle;
    /// Opaque handle to a registered skeletal animation
    pub struct AnimationHandle;
}

/// One drawable piece of a mesh model
#[derive(Debug, Clone, PartialEq)]
pub struct MeshSurface {
    /// Material the surface is drawn with
    pub shader: ShaderHandle,
}

/// Frame bounds and surfaces of an animated mesh
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshModel {
    /// Local bounds of every animation frame
    pub frames: Vec<Aabb>,
    /// Drawable surfaces
    pub surfaces: Vec<MeshSurface>,
}

impl MeshModel {
    /// Bounds covering both the current and the previous frame.
    ///
    /// Out-of-range frame numbers fall back to frame zero.
    pub fn lerped_bounds(&self, frame: usize, old_frame: usize) -> Aabb {
        let pick = |f: usize| self.frames.get(f).or_else(|| self.frames.first());
        let mut bounds = Aabb::empty();
        if let Some(b) = pick(frame) {
            bounds.add_bounds(b);
        }
        if let Some(b) = pick(old_frame) {
            bounds.add_bounds(b);
        }
        bounds
    }
}

/// What a model handle refers to
#[derive(Debug, Clone, PartialEq)]
pub enum ModelKind {
    /// Failed to load; drawn as the default shader at the entity origin
    Bad,
    /// Vertex-animated mesh
    Mesh(MeshModel),
    /// Skinned mesh driven by a skeleton
    Skeletal(MeshModel),
    /// Bare skeleton with nothing to draw
    Skeleton,
    /// Sub-model of the loaded world, by brush model index
    Brush(usize),
}

/// A registered model
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Asset name
    pub name: String,
    /// Payload
    pub kind: ModelKind,
}

/// All registered models
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: SlotMap<ModelHandle, Model>,
    by_name: HashMap<String, ModelHandle>,
}

impl ModelRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model, or return the handle already registered under its name
    pub fn register(&mut self, name: impl Into<String>, kind: ModelKind) -> ModelHandle {
        let name = name.into();
        if let Some(handle) = self.by_name.get(&name) {
            return *handle;
        }
        let handle = self.models.insert(Model { name: name.clone(), kind });
        self.by_name.insert(name, handle);
        handle
    }

    /// Look a model up by name
    pub fn find(&self, name: &str) -> Option<ModelHandle> {
        self.by_name.get(name).copied()
    }

    /// Model for a handle
    pub fn get(&self, handle: ModelHandle) -> Option<&Model> {
        self.models.get(handle)
    }

    /// Drop every brush sub-model; they belong to the world being replaced
    pub fn remove_brush_models(&mut self) {
        self.models.retain(|_, model| !matches!(model.kind, ModelKind::Brush(_)));
        let models = &self.models;
        self.by_name.retain(|_, handle| models.contains_key(*handle));
    }

    /// Number of registered models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// `true` when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Skeletal animation metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    /// Asset name
    pub name: String,
    /// Frame count
    pub num_frames: u32,
    /// Playback rate in frames per second
    pub frame_rate: f32,
}

/// All registered animations
#[derive(Debug, Default)]
pub struct AnimationRegistry {
    animations: SlotMap<AnimationHandle, Animation>,
    by_name: HashMap<String, AnimationHandle>,
}

impl AnimationRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an animation, or return the existing handle for its name
    pub fn register(&mut self, animation: Animation) -> AnimationHandle {
        if let Some(handle) = self.by_name.get(&animation.name) {
            return *handle;
        }
        let name = animation.name.clone();
        let handle = self.animations.insert(animation);
        self.by_name.insert(name, handle);
        handle
    }

    /// Animation for a handle
    pub fn get(&self, handle: AnimationHandle) -> Option<&Animation> {
        self.animations.get(handle)
    }

    /// Number of registered animations
    pub fn len(&self) -> usize {
        self.animations.len()
    }

    /// `true` when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    #[test]
    fn test_lerped_bounds_covers_both_frames() {
        let mesh = MeshModel {
            frames: vec![
                Aabb::from_center_radius(Vec3::zeros(), 1.0),
                Aabb::from_center_radius(Vec3::new(10.0, 0.0, 0.0), 1.0),
            ],
            surfaces: Vec::new(),
        };
        let b = mesh.lerped_bounds(1, 0);
        assert_eq!(b.min, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(b.max, Vec3::new(11.0, 1.0, 1.0));

        let fallback = mesh.lerped_bounds(7, 7);
        assert_eq!(fallback, mesh.frames[0]);
    }

    #[test]
    fn test_register_dedups_and_brush_models_are_removed() {
        let mut models = ModelRegistry::new();
        let a = models.register("models/box.md3", ModelKind::Mesh(MeshModel::default()));
        let b = models.register("models/box.md3", ModelKind::Bad);
        assert_eq!(a, b);

        let brush = models.register("*1", ModelKind::Brush(1));
        assert_eq!(models.len(), 2);
        models.remove_brush_models();
        assert!(models.get(brush).is_none());
        assert!(models.find("*1").is_none());
        assert_eq!(models.find("models/box.md3"), Some(a));
    }

    #[test]
    fn test_animation_registry() {
        let mut anims = AnimationRegistry::new();
        let h = anims.register(Animation { name: "run".into(), num_frames: 20, frame_rate: 15.0 });
        assert_eq!(anims.register(Animation { name: "run".into(), num_frames: 1, frame_rate: 1.0 }), h);
        assert_eq!(anims.get(h).map(|a| a.num_frames), Some(20));
    }
}
