#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Offline skeletal deformation baking.
//!
//! Given a scene with skeletons, their animation and the geometry bound to
//! them, [`SkelBaker`] samples the deformation over a time interval and
//! produces deformed points, normals, transforms and extents per sample.
//!
//! ```no_run
//! use skel_bake::{BakeConfig, Interval, SkelBaker, Stage};
//!
//! # fn main() -> skel_bake::Result<()> {
//! let stage = Stage::new();
//! // ... define prims, skeletons, skinning targets and bindings ...
//! let mut baker = SkelBaker::new(&stage, BakeConfig::new(Interval::new(1.0, 24.0)))?;
//! let result = baker.bake(&stage);
//! for target in &result.targets {
//!     println!("{}: {} samples", target.path, target.samples.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod animation;
pub mod bake;
pub mod config;
pub mod errors;
pub mod scene;
pub mod skel;
pub mod time;

pub use animation::{AnimationSource, Attribute, Interpolate, SkelAnimation};
pub use bake::{
    BakeResult, BoundingBox, DeformationFlags, DeformedSample, SkelBaker, SkinnedData, TargetBake,
};
pub use config::{BakeConfig, PlaybackMetadata};
pub use errors::{Result, SkelBakeError};
pub use scene::{LocalTransform, PrimKey, PrimKind, SceneHierarchy, SkelHost, Stage, XformCache};
pub use skel::{
    BlendShape, InbetweenShape, JointInfluences, NormalsInterpolation, SkelBinding, Skeleton,
    SkinningTarget,
};
pub use time::{Interval, TimeCode};
