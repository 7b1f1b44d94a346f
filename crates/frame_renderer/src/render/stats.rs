//! Per-frame counters
//!
//! Counters are zeroed at every frame boundary after being reported
//! according to the `speeds` level.

use std::fmt;

use crate::foundation::logging::{info, warn_once};
use crate::render::culling::CullResult;

/// In/clip/out tally of one kind of culling test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CullTally {
    /// Fully inside
    pub inside: u32,
    /// Partially inside
    pub clipped: u32,
    /// Rejected
    pub outside: u32,
}

impl CullTally {
    /// Count one result
    pub fn record(&mut self, result: CullResult) -> CullResult {
        match result {
            CullResult::In => self.inside += 1,
            CullResult::Clip => self.clipped += 1,
            CullResult::Out => self.outside += 1,
        }
        result
    }

    /// Tests run
    pub const fn total(&self) -> u32 {
        self.inside + self.clipped + self.outside
    }
}

impl fmt::Display for CullTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.inside, self.clipped, self.outside)
    }
}

/// Culling tallies by category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CullCounters {
    /// Bounding-sphere tests
    pub sphere: CullTally,
    /// Bounding-box tests
    pub bounds: CullTally,
    /// Face-plane tests (clipped counts back faces kept for two-sided shaders)
    pub plane: CullTally,
    /// Leaf box tests
    pub leaves: CullTally,
    /// Entity tests
    pub entities: CullTally,
    /// Light box tests against the camera frustum
    pub lights: CullTally,
    /// Surface tests against light frustums
    pub light_surfaces: CullTally,
    /// Decal projector tests
    pub decals: CullTally,
}

/// Soft-failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Overflow {
    /// Command dropped because the list was full
    CommandBuffer,
    /// Draw surface recycled an older slot
    DrawSurfs,
    /// Interaction dropped
    Interactions,
    /// View refused because the pool was exhausted
    Views,
    /// Entity dropped
    Entities,
    /// Light dropped
    Lights,
    /// Polygon dropped
    Polys,
    /// Polygon dropped because the vertex pool was exhausted
    PolyVerts,
    /// Polygon buffer dropped
    PolyBuffers,
    /// Corona dropped
    Coronas,
    /// Decal projector dropped
    DecalProjectors,
    /// 2D polygon dropped because the vertex arena was exhausted
    Poly2dVerts,
    /// Portal recursion refused
    RefusedPortals,
    /// Portal surface without a matching marker entity
    MissingPortalEntities,
}

impl Overflow {
    /// Number of categories
    pub const COUNT: usize = 14;

    /// Every category
    pub const ALL: [Self; Self::COUNT] = [
        Self::CommandBuffer,
        Self::DrawSurfs,
        Self::Interactions,
        Self::Views,
        Self::Entities,
        Self::Lights,
        Self::Polys,
        Self::PolyVerts,
        Self::PolyBuffers,
        Self::Coronas,
        Self::DecalProjectors,
        Self::Poly2dVerts,
        Self::RefusedPortals,
        Self::MissingPortalEntities,
    ];

    const fn index(self) -> usize {
        self as usize
    }
}

/// Soft-failure counters with one warning latch per category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverflowCounters {
    counts: [u32; Overflow::COUNT],
    warned: [bool; Overflow::COUNT],
}

impl OverflowCounters {
    /// Count one occurrence; the first of the frame is logged
    pub fn record(&mut self, kind: Overflow, message: fmt::Arguments<'_>) {
        let i = kind.index();
        self.counts[i] += 1;
        warn_once(&mut self.warned[i], message);
    }

    /// Add occurrences counted elsewhere, without logging
    pub fn add(&mut self, kind: Overflow, count: u32) {
        self.counts[kind.index()] += count;
    }

    /// Occurrences this frame
    pub const fn count(&self, kind: Overflow) -> u32 {
        self.counts[kind.index()]
    }

    /// `true` when nothing overflowed
    pub fn is_clean(&self) -> bool {
        self.counts.iter().all(|c| *c == 0)
    }

    /// Non-zero categories
    pub fn iter(&self) -> impl Iterator<Item = (Overflow, u32)> + '_ {
        Overflow::ALL
            .into_iter()
            .map(|kind| (kind, self.count(kind)))
            .filter(|(_, count)| *count > 0)
    }
}

/// Counters of one frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameStats {
    /// Culling tallies
    pub cull: CullCounters,
    /// Static lights rejected by leaf visibility
    pub pvs_cull_light_out: u32,
    /// Static lights that reached the interaction join
    pub static_lights: u32,
    /// Dynamic lights that reached the interaction join
    pub dynamic_lights: u32,
    /// Interactions of static lights
    pub static_light_interactions: u32,
    /// Interactions of dynamic lights
    pub dynamic_light_interactions: u32,
    /// Lights demoted after the join
    pub demoted_lights: u32,
    /// Draw surfaces added
    pub draw_surfs: u32,
    /// Views rendered, portals included
    pub views: u32,
    /// Portal and mirror views rendered
    pub portal_views: u32,
    /// Command bytes written before the list was issued
    pub command_bytes: usize,
    /// Soft failures
    pub overflow: OverflowCounters,
    /// Front-end time of the frame
    pub front_end_ms: f64,
    /// Back-end time of the previous list
    pub back_end_ms: f64,
}

impl FrameStats {
    /// Total interactions kept this frame
    pub const fn interactions(&self) -> u32 {
        self.static_light_interactions + self.dynamic_light_interactions
    }

    /// Log the counters selected by `speeds`
    pub fn report(&self, speeds: u32) {
        match speeds {
            0 => {}
            1 => info!(
                "{} views, {} draw surfs, {} lights, {} interactions, {:.2}ms front end, {:.2}ms back end",
                self.views,
                self.draw_surfs,
                self.static_lights + self.dynamic_lights,
                self.interactions(),
                self.front_end_ms,
                self.back_end_ms
            ),
            2 => info!(
                "cull in/clip/out: sphere {} box {} plane {} leaf {} entity {} decal {}",
                self.cull.sphere,
                self.cull.bounds,
                self.cull.plane,
                self.cull.leaves,
                self.cull.entities,
                self.cull.decals
            ),
            3 => info!(
                "lights: {} static ({} pvs out) {} dynamic, {} demoted; interactions {} static {} dynamic; light cull {} surface cull {}",
                self.static_lights,
                self.pvs_cull_light_out,
                self.dynamic_lights,
                self.demoted_lights,
                self.static_light_interactions,
                self.dynamic_light_interactions,
                self.cull.lights,
                self.cull.light_surfaces
            ),
            4 => info!("{} views ({} portal), {} draw surfs", self.views, self.portal_views, self.draw_surfs),
            _ => info!("{} command bytes", self.command_bytes),
        }

        for (kind, count) in self.overflow.iter() {
            info!("overflow {kind:?}: {count}");
        }
    }

    /// Report, zero, and return the finished frame's counters
    pub fn finish_frame(&mut self, speeds: u32) -> FrameStats {
        self.report(speeds);
        std::mem::take(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_records_and_passes_through() {
        let mut tally = CullTally::default();
        assert_eq!(tally.record(CullResult::Out), CullResult::Out);
        tally.record(CullResult::In);
        tally.record(CullResult::In);
        assert_eq!(tally, CullTally { inside: 2, clipped: 0, outside: 1 });
        assert_eq!(tally.total(), 3);
        assert_eq!(tally.to_string(), "2/0/1");
    }

    #[test]
    fn test_overflow_counts_every_occurrence() {
        let mut overflow = OverflowCounters::default();
        assert!(overflow.is_clean());
        for _ in 0..3 {
            overflow.record(Overflow::Polys, format_args!("poly dropped"));
        }
        overflow.add(Overflow::DrawSurfs, 5);
        assert_eq!(overflow.count(Overflow::Polys), 3);
        assert_eq!(overflow.iter().collect::<Vec<_>>(), vec![(Overflow::DrawSurfs, 5), (Overflow::Polys, 3)]);
    }

    #[test]
    fn test_finish_frame_zeroes() {
        let mut stats = FrameStats { views: 2, static_light_interactions: 3, ..Default::default() };
        let last = stats.finish_frame(0);
        assert_eq!(last.views, 2);
        assert_eq!(last.interactions(), 3);
        assert_eq!(stats, FrameStats::default());
    }

    #[test]
    fn test_category_table_is_complete() {
        for (i, kind) in Overflow::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }
}
