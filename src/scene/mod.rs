//! Scene model consumed by the baker.
//!
//! - [`SceneHierarchy`] / [`SkelHost`]: the read-only host interface
//! - [`Stage`]: in-memory host implementation
//! - [`Prim`] / [`LocalTransform`]: hierarchy nodes and their transforms
//! - [`XformCache`]: per-time memoized world transforms

pub mod host;
pub mod prim;
pub mod stage;
pub mod transform;
pub mod xform_cache;

pub use host::{SceneHierarchy, SkelHost};
pub use prim::{Prim, PrimKind};
pub use stage::Stage;
pub use transform::LocalTransform;
pub use xform_cache::{TransformCache, XformCache};

use slotmap::new_key_type;

new_key_type! {
    pub struct PrimKey;
}
