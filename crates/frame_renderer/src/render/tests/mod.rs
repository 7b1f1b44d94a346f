//! Whole-frame scenarios driven through the public pipeline

mod fixtures;
mod portals;
