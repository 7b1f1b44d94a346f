//! Material registry
//!
//! Shader scripts are parsed elsewhere; the front end only needs the handful
//! of properties that drive sorting, culling and light interaction. Every
//! registered shader gets a dense `sorted_index` so draw surfaces can be
//! ordered by one integer.

use std::collections::HashMap;

use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Opaque handle to a registered shader
    pub struct ShaderHandle;
}

/// Coarse draw order of a material, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SortClass {
    /// Broken material; reaching the sort with one is fatal
    Bad,
    /// Mirrors, portals, viewscreens
    Portal,
    /// Sky drawn under fog
    EnvironmentFog,
    /// Opaque geometry
    Opaque,
    /// Sky drawn without fog
    EnvironmentNoFog,
    /// Scorch marks and the like
    Decal,
    /// Alpha-tested grates and ladders
    SeeThrough,
    /// Banners
    Banner,
    /// Fog volumes
    Fog,
    /// Things in front of water
    Underwater,
    /// Water surfaces
    Water,
    /// Far translucent
    Far,
    /// Medium translucent
    Medium,
    /// Close translucent
    Close,
    /// Regular blending
    Blend0,
    /// Additive effects
    Blend1,
    /// Blend layer 2
    Blend2,
    /// Blend layer 3
    Blend3,
    /// Blend layer 6
    Blend6,
    /// Gun smoke
    AlmostNearest,
    /// Blood blobs
    Nearest,
    /// Full-screen post effects
    PostProcess,
}

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullType {
    /// Cull back faces
    #[default]
    FrontSided,
    /// Cull front faces
    BackSided,
    /// No face culling
    TwoSided,
}

/// Front-end view of a material
#[derive(Debug, Clone, PartialEq)]
pub struct Shader {
    /// Script name
    pub name: String,
    /// Draw order class
    pub sort: SortClass,
    /// Face culling
    pub cull_type: CullType,
    /// Sky materials never interact with lights
    pub is_sky: bool,
    /// Reflective mirror; skips the portal distance fade
    pub is_mirror: bool,
    /// Receives light
    pub interact_light: bool,
    /// Casts no shadows
    pub no_shadows: bool,
    /// Portal surfaces farther than this are treated as off-screen
    pub portal_range: f32,
    /// Dense rank by (`sort`, registration order); assigned by the registry
    pub sorted_index: u32,
    registration: u32,
}

impl Shader {
    /// Opaque, light-interacting, shadow-casting material
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sort: SortClass::Opaque,
            cull_type: CullType::FrontSided,
            is_sky: false,
            is_mirror: false,
            interact_light: true,
            no_shadows: false,
            portal_range: 256.0,
            sorted_index: 0,
            registration: 0,
        }
    }

    /// Set the sort class
    pub fn with_sort(mut self, sort: SortClass) -> Self {
        self.sort = sort;
        self
    }

    /// Set the face culling mode
    pub fn with_cull(mut self, cull_type: CullType) -> Self {
        self.cull_type = cull_type;
        self
    }

    /// Portal material with a fade-out range
    pub fn portal(mut self, range: f32) -> Self {
        self.sort = SortClass::Portal;
        self.portal_range = range;
        self
    }

    /// Mirror material
    pub fn mirror(mut self) -> Self {
        self.sort = SortClass::Portal;
        self.is_mirror = true;
        self
    }

    /// Sky material
    pub fn sky(mut self) -> Self {
        self.sort = SortClass::EnvironmentFog;
        self.is_sky = true;
        self.interact_light = false;
        self.no_shadows = true;
        self
    }

    /// Set light interaction flags
    pub fn with_lighting(mut self, interact_light: bool, no_shadows: bool) -> Self {
        self.interact_light = interact_light;
        self.no_shadows = no_shadows;
        self
    }

    /// Whether a light pass has anything to do with this material
    pub const fn affects_lighting(&self) -> bool {
        !self.is_sky && (self.interact_light || !self.no_shadows)
    }
}

/// Name of the fallback material
pub const DEFAULT_SHADER_NAME: &str = "<default>";

/// All registered shaders
#[derive(Debug)]
pub struct ShaderRegistry {
    shaders: SlotMap<ShaderHandle, Shader>,
    by_name: HashMap<String, ShaderHandle>,
    default: ShaderHandle,
    fallback: Shader,
    next_registration: u32,
    ranks_stale: bool,
}

impl Default for ShaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderRegistry {
    /// Registry holding only the default shader
    pub fn new() -> Self {
        let mut registry = Self {
            shaders: SlotMap::with_key(),
            by_name: HashMap::new(),
            default: ShaderHandle::default(),
            fallback: Shader::new(DEFAULT_SHADER_NAME),
            next_registration: 0,
            ranks_stale: false,
        };
        registry.default = registry.register(Shader::new(DEFAULT_SHADER_NAME));
        registry.update_ranks();
        registry
    }

    /// Register a shader, or return the handle already registered under its name
    pub fn register(&mut self, mut shader: Shader) -> ShaderHandle {
        if let Some(handle) = self.by_name.get(&shader.name) {
            return *handle;
        }

        shader.registration = self.next_registration;
        self.next_registration += 1;

        let name = shader.name.clone();
        let handle = self.shaders.insert(shader);
        self.by_name.insert(name, handle);
        self.ranks_stale = true;

        log::trace!("Registered shader {:?}", handle);
        handle
    }

    /// Look a shader up by name
    pub fn find(&self, name: &str) -> Option<ShaderHandle> {
        self.by_name.get(name).copied()
    }

    /// The fallback shader
    pub const fn default_handle(&self) -> ShaderHandle {
        self.default
    }

    /// Shader for a handle
    pub fn get(&self, handle: ShaderHandle) -> Option<&Shader> {
        self.shaders.get(handle)
    }

    /// Shader for a handle, falling back to the default shader
    pub fn get_or_default(&self, handle: ShaderHandle) -> &Shader {
        self.shaders.get(handle).unwrap_or(&self.fallback)
    }

    /// Resolve a possibly-missing handle, warning when falling back
    pub fn resolve(&self, handle: Option<ShaderHandle>) -> ShaderHandle {
        match handle {
            Some(h) if self.shaders.contains_key(h) => h,
            Some(h) => {
                log::warn!("Unknown shader handle {:?}, using default shader", h);
                self.default
            }
            None => self.default,
        }
    }

    /// Number of registered shaders, default included
    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    /// Never true: the default shader always exists
    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    /// `true` when shaders were registered since the last [`ShaderRegistry::update_ranks`]
    pub const fn ranks_stale(&self) -> bool {
        self.ranks_stale
    }

    /// Reassign `sorted_index` across all shaders if any were registered
    /// since the last call.
    ///
    /// Must run before draw surfaces of a view cache their ranks.
    pub fn update_ranks(&mut self) {
        if !self.ranks_stale {
            return;
        }
        self.resort();
        self.ranks_stale = false;
    }

    fn resort(&mut self) {
        let mut order: Vec<(SortClass, u32, ShaderHandle)> = self
            .shaders
            .iter()
            .map(|(handle, shader)| (shader.sort, shader.registration, handle))
            .collect();
        order.sort_unstable();

        for (rank, (_, _, handle)) in order.into_iter().enumerate() {
            if let Some(shader) = self.shaders.get_mut(handle) {
                shader.sorted_index = rank as u32;
            }
        }
        if let Some(default) = self.shaders.get(self.default) {
            self.fallback = default.clone();
        }
    }
}
