use glam::DMat4;

use crate::config::PlaybackMetadata;
use crate::scene::{PrimKey, PrimKind};
use crate::skel::{SkelBinding, Skeleton, SkinningTarget};
use crate::time::TimeCode;

/// Read access to the prim hierarchy and its transforms.
pub trait SceneHierarchy {
    fn parent(&self, prim: PrimKey) -> Option<PrimKey>;

    /// Absolute `/`-separated path, used for filtering and logging.
    fn prim_path(&self, prim: PrimKey) -> String;

    fn kind(&self, prim: PrimKey) -> Option<PrimKind>;

    /// The prim's own transform relative to its parent at `time`.
    fn local_transform(&self, prim: PrimKey, time: TimeCode) -> DMat4;

    fn resets_xform_stack(&self, prim: PrimKey) -> bool;
    fn local_transform_might_vary(&self, prim: PrimKey) -> bool;
    fn local_transform_time_samples(&self, prim: PrimKey) -> Vec<f64>;
    fn is_in_prototype(&self, prim: PrimKey) -> bool;
}

/// Everything the baker reads from the host scene.
///
/// The baker never owns host data; it holds [`PrimKey`] handles and looks
/// skeletons and targets up again on every sample.
pub trait SkelHost: SceneHierarchy + Sync {
    fn skeleton(&self, prim: PrimKey) -> Option<&Skeleton>;
    fn skinning_target(&self, prim: PrimKey) -> Option<&SkinningTarget>;

    /// Resolved skeleton bindings, in discovery order.
    fn bindings(&self) -> &[SkelBinding];

    fn playback_metadata(&self) -> Option<PlaybackMetadata>;
}

/// True when any transform from `prim` up to the first xform-stack reset
/// might change over time.
#[must_use]
pub fn world_transform_might_be_time_varying(scene: &dyn SceneHierarchy, prim: PrimKey) -> bool {
    let mut current = Some(prim);
    while let Some(p) = current {
        if scene.local_transform_might_vary(p) {
            return true;
        }
        if scene.resets_xform_stack(p) {
            break;
        }
        current = scene.parent(p);
    }
    false
}

/// Collects the local transform samples of `prim` and its ancestors up to
/// the first xform-stack reset.
pub fn world_transform_time_samples(scene: &dyn SceneHierarchy, prim: PrimKey, times: &mut Vec<f64>) {
    let mut current = Some(prim);
    while let Some(p) = current {
        times.extend(scene.local_transform_time_samples(p));
        if scene.resets_xform_stack(p) {
            break;
        }
        current = scene.parent(p);
    }
}
