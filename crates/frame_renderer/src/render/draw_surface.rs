//! Draw surfaces and their ordering
//!
//! A draw surface names one piece of geometry, its owner and its material
//! for a single view. Surfaces of a frame go into a fixed-size ring: once it
//! is full the oldest entries are recycled and the overflow is counted.

use std::cmp::Ordering;

use crate::foundation::collections::RingArray;
use crate::render::shader::ShaderHandle;

/// Lightmap index of surfaces without one
pub const LIGHTMAP_NONE: i32 = -1;

/// Owner of a draw surface.
///
/// The derived order puts the world before every scene entity, and scene
/// entities in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum EntityRef {
    /// The static world
    #[default]
    World,
    /// Index into the frame's entity list
    Scene(u32),
}

/// Geometry of a draw surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceRef {
    /// World or brush-model surface, by index into the world
    World(usize),
    /// Surface of the owning entity's mesh model
    Mesh(usize),
    /// Geometry generated from the entity itself (sprites, beams, null models)
    Entity,
    /// Scene polygon
    Poly(usize),
    /// Scene polygon buffer
    PolyBuffer(usize),
    /// Decal projected onto a world surface
    Decal {
        /// World surface receiving the decal
        surface: usize,
        /// Projector index
        projector: usize,
    },
}

/// One queued (owner, geometry, material) tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawSurf {
    /// Owner
    pub entity: EntityRef,
    /// Geometry
    pub surface: SurfaceRef,
    /// Material
    pub shader: ShaderHandle,
    /// Material sort rank, cached from the shader registry
    pub sort_index: u32,
    /// Lightmap, or [`LIGHTMAP_NONE`]
    pub lightmap: i32,
    /// Fog volume number, `0` for none
    pub fog: usize,
}

impl DrawSurf {
    /// Sort key, most significant first
    pub const fn sort_key(&self) -> (u32, i32, EntityRef, usize) {
        (self.sort_index, self.lightmap, self.entity, self.fog)
    }
}

/// Order two draw surfaces by material rank, lightmap, owner, then fog.
pub fn compare_draw_surfs(a: &DrawSurf, b: &DrawSurf) -> Ordering {
    a.sort_key().cmp(&b.sort_key())
}

/// Frame-wide ring of draw surfaces
#[derive(Debug, Clone)]
pub struct DrawSurfaceList {
    ring: RingArray<DrawSurf>,
}

impl DrawSurfaceList {
    /// Ring with room for `capacity` surfaces
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: RingArray::with_capacity(capacity),
        }
    }

    /// Queue a surface; returns `true` when an older surface was recycled
    pub fn add(&mut self, surf: DrawSurf) -> bool {
        let before = self.ring.overwritten();
        self.ring.push(surf);
        self.ring.overwritten() != before
    }

    /// Total surfaces added this frame, recycled ones included
    pub const fn count(&self) -> usize {
        self.ring.written()
    }

    /// Surfaces lost to recycling this frame
    pub const fn overwritten(&self) -> usize {
        self.ring.overwritten()
    }

    /// Fixed capacity
    pub const fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Surfaces written between two counts that have not been recycled, in
    /// write order
    pub fn view_range(&self, first: usize, end: usize) -> impl Iterator<Item = &DrawSurf> + '_ {
        let (head, tail) = self.ring.range(first, end);
        head.iter().chain(tail)
    }

    /// Sort the surfaces of a view in place
    pub fn sort_range(&mut self, first: usize, end: usize) {
        self.ring.sort_range_by(first, end, compare_draw_surfs);
    }

    /// Drop every surface for the next frame
    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn surf(sort_index: u32, lightmap: i32, entity: EntityRef, fog: usize) -> DrawSurf {
        DrawSurf {
            entity,
            surface: SurfaceRef::Entity,
            shader: ShaderHandle::default(),
            sort_index,
            lightmap,
            fog,
        }
    }

    #[test]
    fn test_world_sorts_before_entities() {
        let world = surf(3, 0, EntityRef::World, 9);
        let ent = surf(3, 0, EntityRef::Scene(0), 0);
        assert_eq!(compare_draw_surfs(&world, &ent), Ordering::Less);
        assert_eq!(compare_draw_surfs(&ent, &world), Ordering::Greater);
        assert_eq!(compare_draw_surfs(&ent, &ent), Ordering::Equal);
    }

    #[test]
    fn test_key_significance() {
        let a = surf(1, 5, EntityRef::Scene(9), 9);
        let b = surf(2, 0, EntityRef::World, 0);
        assert_eq!(compare_draw_surfs(&a, &b), Ordering::Less);

        let c = surf(2, 0, EntityRef::Scene(1), 0);
        let d = surf(2, 1, EntityRef::World, 0);
        assert_eq!(compare_draw_surfs(&c, &d), Ordering::Less);

        let e = surf(2, 1, EntityRef::World, 3);
        assert_eq!(compare_draw_surfs(&d, &e), Ordering::Less);
    }

    #[test]
    fn test_ring_recycles_oldest() {
        let mut shaders: SlotMap<ShaderHandle, ()> = SlotMap::with_key();
        let shader = shaders.insert(());
        let mut list = DrawSurfaceList::with_capacity(2);
        assert!(!list.add(surf(0, 0, EntityRef::World, 0)));
        assert!(!list.add(surf(1, 0, EntityRef::World, 0)));
        assert!(list.add(DrawSurf { shader, ..surf(2, 0, EntityRef::World, 0) }));
        assert_eq!(list.count(), 3);
        assert_eq!(list.overwritten(), 1);

        let all: Vec<_> = list.view_range(0, list.count()).map(|s| s.sort_index).collect();
        assert_eq!(all, vec![1, 2]);
    }

    #[test]
    fn test_later_view_keeps_its_surfaces_after_wrap() {
        let mut list = DrawSurfaceList::with_capacity(4);
        for i in 0..3 {
            list.add(surf(i, 0, EntityRef::World, 0));
        }
        let first = list.count();
        for i in [12, 10, 11] {
            list.add(surf(i, 0, EntityRef::World, 0));
        }
        list.sort_range(first, list.count());

        let second_view: Vec<_> = list.view_range(first, list.count()).map(|s| s.sort_index).collect();
        assert_eq!(second_view, vec![10, 11, 12]);
        let first_view: Vec<_> = list.view_range(0, first).map(|s| s.sort_index).collect();
        assert_eq!(first_view, vec![2]);
    }

    #[test]
    fn test_sort_order_ignores_input_order() {
        let input = vec![
            surf(2, 1, EntityRef::Scene(3), 0),
            surf(0, 0, EntityRef::World, 2),
            surf(2, 1, EntityRef::World, 1),
            surf(1, 7, EntityRef::Scene(0), 0),
            surf(2, 0, EntityRef::Scene(3), 4),
            surf(0, 0, EntityRef::World, 1),
        ];
        let keys = |mut surfs: Vec<DrawSurf>| {
            surfs.sort_unstable_by(compare_draw_surfs);
            surfs.iter().map(DrawSurf::sort_key).collect::<Vec<_>>()
        };

        let forward = keys(input.clone());
        let reversed = keys(input.iter().rev().copied().collect());
        let rotated = keys(input.iter().cycle().skip(4).take(input.len()).copied().collect());
        assert_eq!(forward, reversed);
        assert_eq!(forward, rotated);
        assert!(forward.windows(2).all(|w| w[0] <= w[1]));
    }
}
