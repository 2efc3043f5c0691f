//! Time-sampled attributes and skeletal animation sources.

pub mod attribute;
pub mod skel_animation;
pub mod values;

pub use attribute::Attribute;
pub use skel_animation::{AnimationSource, SkelAnimation};
pub use values::Interpolate;
