//! Light/surface interactions
//!
//! All interactions of a frame live in one arena. A light owns a contiguous
//! [`InteractionSlice`] of it, built while that light is processed, so the
//! arena never needs links between records.

use crate::render::culling::CubeSides;
use crate::render::draw_surface::{EntityRef, SurfaceRef};
use crate::render::light::Scissor;
use crate::render::shader::ShaderHandle;

/// What a light pass does with a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InteractionKind {
    /// Lit and shadow casting
    #[default]
    Default,
    /// Only contributes shadow geometry
    ShadowOnly,
    /// Only receives light
    LightOnly,
}

/// One light touching one surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interaction {
    /// Index of the light in the frame's light list
    pub light: usize,
    /// Owner of the surface
    pub entity: EntityRef,
    /// Surface geometry
    pub surface: SurfaceRef,
    /// Surface material
    pub shader: ShaderHandle,
    /// Material sort rank, cached for sorting
    pub sort_index: u32,
    /// Shadow cube faces the surface must be drawn into
    pub cube_sides: CubeSides,
    /// Pass classification
    pub kind: InteractionKind,
    /// Light scissor at the time of creation
    pub scissor: Scissor,
}

/// Contiguous run of interactions in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InteractionSlice {
    /// First arena index
    pub start: usize,
    /// Number of records
    pub count: usize,
}

impl InteractionSlice {
    /// Arena index range
    pub const fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.count
    }

    /// `true` when the slice holds nothing
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Bounded per-frame storage of interactions.
///
/// Pushing past capacity drops the record and counts it.
#[derive(Debug, Clone)]
pub struct InteractionArena {
    items: Vec<Interaction>,
    capacity: usize,
    dropped: usize,
}

impl InteractionArena {
    /// Arena holding at most `capacity` records
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity.min(4096)),
            capacity,
            dropped: 0,
        }
    }

    /// Append a record; `None` when the arena is full
    pub fn push(&mut self, interaction: Interaction) -> Option<usize> {
        if self.items.len() >= self.capacity {
            self.dropped += 1;
            return None;
        }
        self.items.push(interaction);
        Some(self.items.len() - 1)
    }

    /// Records stored this frame
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Records dropped this frame because the arena was full
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    /// Fixed capacity
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discard every record from `len` on
    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    /// Records of a slice, clamped to what exists
    pub fn slice(&self, slice: &InteractionSlice) -> &[Interaction] {
        let end = slice.range().end.min(self.items.len());
        let start = slice.start.min(end);
        &self.items[start..end]
    }

    /// Mutable records of a slice
    pub fn slice_mut(&mut self, slice: &InteractionSlice) -> &mut [Interaction] {
        let end = slice.range().end.min(self.items.len());
        let start = slice.start.min(end);
        &mut self.items[start..end]
    }

    /// Records from `start` to the current end
    pub fn tail(&self, start: usize) -> &[Interaction] {
        &self.items[start.min(self.items.len())..]
    }

    /// Empty the arena for the next frame
    pub fn clear(&mut self) {
        self.items.clear();
        self.dropped = 0;
    }
}
