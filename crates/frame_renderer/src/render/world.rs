//! Static world
//!
//! The world is produced by the level loader and shared read-only. Anything
//! that changes per view (visit stamps, leaf visibility history) lives in
//! [`WorldVisState`], owned by the renderer context.

use crate::foundation::math::Vec3;
use crate::render::culling::CubeSides;
use crate::render::interaction::InteractionKind;
use crate::render::light::RefLight;
use crate::render::shader::ShaderHandle;
use crate::spatial::{Aabb, Plane};

/// Geometry class of a world surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorldSurfaceKind {
    /// Planar polygon
    Face,
    /// Curved patch mesh
    Grid,
    /// Arbitrary triangle soup
    Triangles,
    /// Instanced foliage
    Foliage,
}

/// One surface of the world or of a brush sub-model
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSurface {
    /// Geometry class
    pub kind: WorldSurfaceKind,
    /// Material
    pub shader: ShaderHandle,
    /// Lightmap index, or [`LIGHTMAP_NONE`](crate::render::draw_surface::LIGHTMAP_NONE)
    pub lightmap: i32,
    /// Fog volume number, `0` for none
    pub fog: usize,
    /// World-space bounds
    pub bounds: Aabb,
    /// Supporting plane of planar surfaces
    pub plane: Option<Plane>,
    /// Vertex positions
    pub vertices: Vec<Vec3>,
    /// Triangle list into `vertices`
    pub indices: Vec<u32>,
}

impl WorldSurface {
    /// Planar face spanning `vertices` as a triangle fan
    pub fn face(shader: ShaderHandle, vertices: Vec<Vec3>) -> Self {
        let indices = (1..vertices.len().saturating_sub(1) as u32)
            .flat_map(|i| [0, i, i + 1])
            .collect();
        let plane = match vertices.as_slice() {
            [a, b, c, ..] => Plane::from_points(a, b, c),
            _ => None,
        };
        Self {
            kind: WorldSurfaceKind::Face,
            shader,
            lightmap: 0,
            fog: 0,
            bounds: Aabb::from_points(vertices.iter()),
            plane,
            vertices,
            indices,
        }
    }

    /// Triangles of the surface as vertex triples
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            let v = |i: u32| self.vertices.get(i as usize).copied();
            Some([v(tri[0])?, v(tri[1])?, v(tri[2])?])
        })
    }

    /// Plane of the surface: the stored one, else the first triangle's
    pub fn surface_plane(&self) -> Option<Plane> {
        self.plane
            .or_else(|| self.triangles().next().and_then(|[a, b, c]| Plane::from_points(&a, &b, &c)))
    }
}

/// Leaf of the world's spatial partition
#[derive(Debug, Clone, PartialEq)]
pub struct WorldLeaf {
    /// Visibility cluster, `None` for solid or outside leaves
    pub cluster: Option<usize>,
    /// Leaf volume
    pub bounds: Aabb,
    /// Indices of the world surfaces touching the leaf
    pub surfaces: Vec<usize>,
}

/// Fog volume
#[derive(Debug, Clone, PartialEq)]
pub struct FogVolume {
    /// Fogged region
    pub bounds: Aabb,
    /// Distance at which the fog becomes opaque, `0` when it never does
    pub depth_for_opaque: f32,
}

/// Brush sub-model (doors, platforms)
#[derive(Debug, Clone, PartialEq)]
pub struct BrushModel {
    /// Local bounds
    pub bounds: Aabb,
    /// First surface index
    pub first_surface: usize,
    /// Number of surfaces
    pub num_surfaces: usize,
}

impl BrushModel {
    /// Indices of the sub-model's surfaces
    pub const fn surfaces(&self) -> std::ops::Range<usize> {
        self.first_surface..self.first_surface + self.num_surfaces
    }
}

/// Interaction between a static light and a world surface, computed at load time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecachedInteraction {
    /// World surface index
    pub surface: usize,
    /// Shadow cube faces the surface touches
    pub cube_sides: CubeSides,
    /// Pass classification when the surface is visible
    pub kind: InteractionKind,
}

/// A light baked into the world
#[derive(Debug, Clone, PartialEq)]
pub struct StaticLight {
    /// Light parameters
    pub light: RefLight,
    /// Leaves the light volume touches
    pub leaves: Vec<usize>,
    /// Surfaces the light reaches
    pub interactions: Vec<PrecachedInteraction>,
}

/// Cluster-to-cluster potentially visible sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisData {
    /// Number of clusters
    pub num_clusters: usize,
    /// Bytes per cluster row
    pub cluster_bytes: usize,
    /// `num_clusters` rows of bit sets
    pub bits: Vec<u8>,
}

impl VisData {
    /// Visibility where every cluster sees every other
    pub fn all_visible(num_clusters: usize) -> Self {
        let cluster_bytes = num_clusters.div_ceil(8);
        Self {
            num_clusters,
            cluster_bytes,
            bits: vec![0xff; cluster_bytes * num_clusters],
        }
    }

    /// Build from explicit pairs `(from, to)`; visibility is made symmetric
    /// and every cluster sees itself.
    pub fn from_pairs(num_clusters: usize, pairs: &[(usize, usize)]) -> Self {
        let cluster_bytes = num_clusters.div_ceil(8);
        let mut vis = Self {
            num_clusters,
            cluster_bytes,
            bits: vec![0; cluster_bytes * num_clusters],
        };
        for c in 0..num_clusters {
            vis.set(c, c);
        }
        for &(a, b) in pairs {
            vis.set(a, b);
            vis.set(b, a);
        }
        vis
    }

    fn set(&mut self, from: usize, to: usize) {
        if from < self.num_clusters && to < self.num_clusters {
            self.bits[from * self.cluster_bytes + to / 8] |= 1 << (to % 8);
        }
    }

    /// Whether `to` is potentially visible from `from`
    pub fn cluster_visible(&self, from: usize, to: usize) -> bool {
        if from >= self.num_clusters || to >= self.num_clusters {
            return false;
        }
        self.bits
            .get(from * self.cluster_bytes + to / 8)
            .is_some_and(|byte| byte & (1 << (to % 8)) != 0)
    }
}

/// Everything the level loader hands over
#[derive(Debug, Clone, PartialEq, Default)]
pub struct World {
    /// Map name
    pub name: String,
    /// All world and brush-model surfaces
    pub surfaces: Vec<WorldSurface>,
    /// Partition leaves
    pub leaves: Vec<WorldLeaf>,
    /// Fog volumes; fog number `n` is `fogs[n - 1]`
    pub fogs: Vec<FogVolume>,
    /// Fog number of the fog covering the whole map
    pub global_fog: Option<usize>,
    /// Brush sub-models; index 0 is the world itself
    pub brush_models: Vec<BrushModel>,
    /// Baked lights
    pub lights: Vec<StaticLight>,
    /// Potentially visible sets, `None` when the map has none
    pub vis: Option<VisData>,
}

impl World {
    /// Leaf containing a point
    pub fn point_in_leaf(&self, point: &Vec3) -> Option<usize> {
        self.leaves.iter().position(|leaf| leaf.bounds.contains_point(point))
    }

    /// Fog number of the first fog volume overlapping the bounds, `0` for none
    pub fn fog_for_bounds(&self, bounds: &Aabb) -> usize {
        self.fogs
            .iter()
            .position(|fog| {
                (0..3).all(|j| bounds.min[j] < fog.bounds.max[j] && bounds.max[j] > fog.bounds.min[j])
            })
            .map_or(0, |i| i + 1)
    }

    /// Fog volume by fog number
    pub fn fog(&self, fog_num: usize) -> Option<&FogVolume> {
        fog_num.checked_sub(1).and_then(|i| self.fogs.get(i))
    }

    /// Opaque depth of the global fog, if it has one
    pub fn global_fog_depth(&self) -> Option<f32> {
        self.global_fog
            .and_then(|num| self.fog(num))
            .map(|fog| fog.depth_for_opaque)
            .filter(|depth| *depth > 0.0)
    }
}

/// Per-leaf visibility history used by the occlusion heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LeafHistory {
    /// Passed the frustum test in the last view that reached it
    pub visible: bool,
    /// Frame of that view
    pub last_visited_frame: u32,
}

/// Mutable visit state mirroring a [`World`]
#[derive(Debug, Clone, Default)]
pub struct WorldVisState {
    /// View stamp of each surface's last emission
    pub surface_view: Vec<u32>,
    /// Light stamp of each surface's last interaction test
    pub surface_light: Vec<u32>,
    /// Vis stamp of each leaf's last marking
    pub leaf_vis: Vec<u32>,
    /// Occlusion history per leaf
    pub leaf_history: Vec<LeafHistory>,
}

impl WorldVisState {
    /// Fresh state sized for a world
    pub fn new(world: &World) -> Self {
        Self {
            surface_view: vec![0; world.surfaces.len()],
            surface_light: vec![0; world.surfaces.len()],
            leaf_vis: vec![0; world.leaves.len()],
            leaf_history: vec![LeafHistory::default(); world.leaves.len()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_builds_fan_and_plane() {
        let face = WorldSurface::face(
            ShaderHandle::default(),
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
            ],
        );
        assert_eq!(face.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(face.triangles().count(), 2);
        let plane = face.surface_plane().unwrap();
        assert_eq!(plane.normal, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_vis_pairs_are_symmetric() {
        let vis = VisData::from_pairs(10, &[(0, 9)]);
        assert!(vis.cluster_visible(0, 9));
        assert!(vis.cluster_visible(9, 0));
        assert!(vis.cluster_visible(4, 4));
        assert!(!vis.cluster_visible(0, 4));
        assert!(!vis.cluster_visible(0, 12));
        assert!(VisData::all_visible(3).cluster_visible(2, 0));
    }

    #[test]
    fn test_fog_lookup() {
        let world = World {
            fogs: vec![
                FogVolume { bounds: Aabb::new(Vec3::repeat(0.0), Vec3::repeat(10.0)), depth_for_opaque: 0.0 },
                FogVolume { bounds: Aabb::new(Vec3::repeat(-1e4), Vec3::repeat(1e4)), depth_for_opaque: 1500.0 },
            ],
            global_fog: Some(2),
            ..Default::default()
        };
        assert_eq!(world.fog_for_bounds(&Aabb::from_center_radius(Vec3::repeat(5.0), 1.0)), 1);
        assert_eq!(world.fog_for_bounds(&Aabb::from_center_radius(Vec3::repeat(50.0), 1.0)), 2);
        assert_eq!(world.global_fog_depth(), Some(1500.0));
        assert!(world.fog(0).is_none());
    }

    #[test]
    fn test_point_in_leaf() {
        let world = World {
            leaves: vec![
                WorldLeaf { cluster: Some(0), bounds: Aabb::new(Vec3::zeros(), Vec3::repeat(10.0)), surfaces: vec![] },
                WorldLeaf { cluster: Some(1), bounds: Aabb::new(Vec3::repeat(10.5), Vec3::repeat(20.0)), surfaces: vec![] },
            ],
            ..Default::default()
        };
        assert_eq!(world.point_in_leaf(&Vec3::repeat(15.0)), Some(1));
        assert_eq!(world.point_in_leaf(&Vec3::repeat(-5.0)), None);
    }
}
