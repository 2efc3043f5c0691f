//! Skeletons, skinning targets and the bindings between them.

pub mod mapper;
pub mod skeleton;
pub mod target;

pub use mapper::AnimMapper;
pub use skeleton::{Skeleton, SkeletonQuery, Topology};
pub use target::{
    BlendShape, BlendShapeBinding, InbetweenShape, InfluenceSample, JointInfluences,
    NormalsInterpolation, SkelBinding, SkinningTarget,
};
