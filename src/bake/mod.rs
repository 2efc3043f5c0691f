//! Deformation baking.
//!
//! # Architecture
//!
//! ```text
//! SkelBaker
//!   ├── SlotMap<SkelCacheKey, SkeletonAnimationCache>   one per skeleton
//!   │      skinning xforms / normal xforms / blend weights / world xform
//!   └── Vec<SkinningComputation>                        one per target
//!          rest data / geom bind / influences / world xforms
//!          ──> blend shapes ──> LBS ──> points, normals, xform, extent
//! ```
//!
//! Each sample runs in three phases: transforms (serial, shares one
//! [`XformCache`](crate::scene::XformCache)), skeleton animation, then target
//! skinning. The last two only read shared state and run in parallel with
//! the `parallel` feature.

pub mod baker;
pub mod blend_shapes;
pub mod extent;
pub mod flags;
pub mod lbs;
pub mod planner;
pub mod skel_cache;
pub mod skinning;
pub mod task;

pub use baker::{BakeResult, DeformedSample, SkelBaker, SkinnedData, TargetBake};
pub use extent::BoundingBox;
pub use flags::{DeformationFlags, DeformationStage};
pub use planner::{SamplePlan, SampleTimeSet, TimeSamplePlanner};
pub use skel_cache::SkeletonAnimationCache;
pub use skinning::SkinningComputation;
pub use task::{Task, TaskState};

use slotmap::new_key_type;

new_key_type! {
    pub struct SkelCacheKey;
}
