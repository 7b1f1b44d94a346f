//! Geometry primitives
//!
//! Bounding boxes, planes and frustums shared by culling, light setup and
//! portal handling. Everything here is plain value data.

mod bounds;
mod frustum;
mod plane;

pub use bounds::Aabb;
pub use frustum::{split_frustums, Frustum, FrustumPlane, SplitFrustums, FRUSTUM_PLANES};
pub use plane::{Plane, PlaneSide, PlaneType};
