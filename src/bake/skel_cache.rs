//! Per-skeleton cached animation state.

use glam::{DMat3, DMat4};

use crate::bake::flags::DeformationFlags;
use crate::bake::lbs::normal_matrix;
use crate::bake::task::Task;
use crate::errors::Result;
use crate::scene::host::{SkelHost, world_transform_might_be_time_varying, world_transform_time_samples};
use crate::scene::xform_cache::TransformCache;
use crate::scene::PrimKey;
use crate::skel::{Skeleton, SkeletonQuery};
use crate::time::{Interval, TimeCode, insert_times_in_interval};

/// Cached skinning transforms, blend shape weights and world transform of
/// one skeleton, shared by every target it deforms.
///
/// Tasks start active but not required; skinning computations mark the
/// outputs they consume as required when they are created.
#[derive(Debug, Clone)]
pub struct SkeletonAnimationCache {
    query: SkeletonQuery,
    /// Prim whose world transform places the skeleton: the skeleton itself,
    /// or its instance origin when it lives inside a prototype.
    transform_source: PrimKey,

    skinning_xforms: Task<Vec<DMat4>>,
    skinning_normal_xforms: Task<Vec<DMat3>>,
    blend_shape_weights: Task<Vec<f32>>,
    local_to_world: Task<DMat4>,

    /// Sample indices at this skeleton's own planned times; empty means all.
    time_sample_mask: Vec<bool>,
}

impl SkeletonAnimationCache {
    pub fn new(skeleton: &Skeleton, host: &dyn SkelHost, flags: DeformationFlags) -> Result<Self> {
        let query = SkeletonQuery::new(skeleton)?;

        let mut skinning_xforms = Task::new();
        let mut skinning_normal_xforms = Task::new();
        let mut blend_shape_weights = Task::new();
        let mut local_to_world = Task::new();

        if flags.intersects(DeformationFlags::LBS) {
            let can_skin = query.has_mappable_animation() || skeleton.rest_transforms.is_some();
            skinning_xforms.set_active(can_skin, false);
            skinning_normal_xforms.set_active(can_skin && flags.contains(DeformationFlags::NORMALS_LBS), false);

            let varying = skeleton
                .animation
                .as_deref()
                .is_some_and(|anim| anim.joint_transforms_might_vary());
            skinning_xforms.set_might_be_time_varying(varying);
            skinning_normal_xforms.set_might_be_time_varying(varying);
        }

        let transform_source = if host.is_in_prototype(skeleton.prim) {
            skeleton.instance_origin.unwrap_or(skeleton.prim)
        } else {
            skeleton.prim
        };
        local_to_world.set_active(true, false);
        local_to_world.set_might_be_time_varying(world_transform_might_be_time_varying(host, transform_source));

        if flags.intersects(DeformationFlags::BLEND_SHAPES)
            && let Some(anim) = skeleton.animation.as_deref()
            && anim.has_authored_blend_shape_weights()
        {
            blend_shape_weights.set_active(true, false);
            blend_shape_weights.set_might_be_time_varying(anim.blend_weights_might_vary());
        }

        Ok(Self {
            query,
            transform_source,
            skinning_xforms,
            skinning_normal_xforms,
            blend_shape_weights,
            local_to_world,
            time_sample_mask: Vec::new(),
        })
    }

    #[inline]
    #[must_use]
    pub fn prim(&self) -> PrimKey {
        self.query.prim()
    }

    #[inline]
    #[must_use]
    pub fn query(&self) -> &SkeletonQuery {
        &self.query
    }

    // ========================================================================
    // Requirement wiring
    // ========================================================================

    #[must_use]
    pub fn can_compute_skinning_xforms(&self) -> bool {
        self.skinning_xforms.is_active()
    }

    pub fn require_skinning_xforms(&mut self) {
        self.skinning_xforms.set_required(true);
    }

    #[must_use]
    pub fn can_compute_skinning_normal_xforms(&self) -> bool {
        self.skinning_normal_xforms.is_active()
    }

    pub fn require_skinning_normal_xforms(&mut self) {
        self.skinning_normal_xforms.set_required(true);
    }

    #[must_use]
    pub fn can_compute_blend_shape_weights(&self) -> bool {
        self.blend_shape_weights.is_active()
    }

    pub fn require_blend_shape_weights(&mut self) {
        self.blend_shape_weights.set_required(true);
    }

    pub fn require_local_to_world(&mut self) {
        self.local_to_world.set_required(true);
    }

    #[must_use]
    pub fn has_tasks_to_run(&self) -> bool {
        self.skinning_xforms.is_required()
            || self.skinning_normal_xforms.is_required()
            || self.blend_shape_weights.is_required()
            || self.local_to_world.is_required()
    }

    // ========================================================================
    // Time sampling
    // ========================================================================

    /// Appends the times at which this skeleton's required outputs change.
    pub fn extend_time_samples(&self, host: &dyn SkelHost, interval: &Interval, times: &mut Vec<f64>) {
        let Some(skeleton) = host.skeleton(self.prim()) else {
            return;
        };
        let anim = skeleton.animation.as_deref();

        if self.skinning_xforms.is_required()
            && let Some(anim) = anim
        {
            insert_times_in_interval(interval, &anim.joint_transform_time_samples(), times);
        }
        if self.blend_shape_weights.is_required()
            && let Some(anim) = anim
        {
            insert_times_in_interval(interval, &anim.blend_shape_weight_time_samples(), times);
        }
        if self.local_to_world.is_required() {
            let mut xform_times = Vec::new();
            world_transform_time_samples(host, self.transform_source, &mut xform_times);
            insert_times_in_interval(interval, &xform_times, times);
        }
    }

    pub fn set_time_sample_mask(&mut self, mask: Vec<bool>) {
        self.time_sample_mask = mask;
    }

    #[must_use]
    pub fn time_sample_mask(&self) -> &[bool] {
        &self.time_sample_mask
    }

    /// Whether the sample at `index` is one of this skeleton's own times.
    #[must_use]
    pub fn is_keyed_at(&self, index: usize) -> bool {
        self.time_sample_mask.is_empty() || self.time_sample_mask.get(index).copied().unwrap_or(false)
    }

    // ========================================================================
    // Per-sample updates
    // ========================================================================

    /// Refreshes the world transform. Skeletons inside a prototype use
    /// their instance origin's transform.
    pub fn update_transform(&mut self, xform_cache: &mut dyn TransformCache) {
        let source = self.transform_source;
        let time = xform_cache.time();
        self.local_to_world.run(time, |_| Some(xform_cache.local_to_world(source)));
    }

    /// Refreshes skinning transforms and blend shape weights at `time`.
    pub fn update_animation(&mut self, host: &dyn SkelHost, time: TimeCode) {
        let Some(skeleton) = host.skeleton(self.prim()) else {
            log::debug!("Skeleton {} is gone from the host", host.prim_path(self.prim()));
            return;
        };
        let query = &self.query;

        let has_xforms = self.skinning_xforms.run(time, |t| {
            query
                .compute_skinning_transforms(skeleton, t)
                .inspect_err(|e| log::debug!("Skinning transforms unavailable at {t}: {e}"))
                .ok()
        });

        if has_xforms {
            let xforms = self.skinning_xforms.value();
            self.skinning_normal_xforms
                .run(time, |_| xforms.map(|x| x.iter().map(normal_matrix).collect()));
        }

        self.blend_shape_weights.run(time, |t| {
            skeleton
                .animation
                .as_deref()
                .and_then(|anim| anim.blend_shape_weights_at(t))
        });
    }

    // ========================================================================
    // Outputs
    // ========================================================================

    #[must_use]
    pub fn skinning_xforms(&self) -> Option<&[DMat4]> {
        self.skinning_xforms.value().map(Vec::as_slice)
    }

    #[must_use]
    pub fn skinning_normal_xforms(&self) -> Option<&[DMat3]> {
        self.skinning_normal_xforms.value().map(Vec::as_slice)
    }

    /// Weights in the animation's blend shape channel order.
    #[must_use]
    pub fn blend_shape_weights(&self) -> Option<&[f32]> {
        self.blend_shape_weights.value().map(Vec::as_slice)
    }

    #[must_use]
    pub fn local_to_world(&self) -> Option<DMat4> {
        self.local_to_world.value().copied()
    }
}
