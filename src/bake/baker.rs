//! Bake orchestration.

use glam::{DMat4, Vec3};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::bake::SkelCacheKey;
use crate::bake::extent::BoundingBox;
use crate::bake::flags::DeformationFlags;
use crate::bake::lbs::normal_matrix;
use crate::bake::planner::{SampleTimeSet, TimeSamplePlanner};
use crate::bake::skel_cache::SkeletonAnimationCache;
use crate::bake::skinning::SkinningComputation;
use crate::config::BakeConfig;
use crate::errors::{Result, SkelBakeError};
use crate::scene::host::SkelHost;
use crate::scene::xform_cache::{TransformCache, XformCache};
use crate::scene::PrimKey;
use crate::time::TimeCode;

/// Numeric times closer than this address the same sample.
const SAMPLE_TIME_TOLERANCE: f64 = 1e-5;

/// Which buffer [`SkelBaker::apply_skinning`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkinnedData {
    Points,
    Normals,
}

/// One target's outputs at one sample time.
#[derive(Debug, Clone, PartialEq)]
pub struct DeformedSample {
    pub time: TimeCode,
    /// True when `time` is one of the skeleton's own planned times rather
    /// than a time contributed by another skeleton of the bake.
    pub keyed: bool,
    pub points: Option<Vec<Vec3>>,
    pub normals: Option<Vec<Vec3>>,
    pub xform: Option<DMat4>,
    /// Present when points were deformed at this sample.
    pub extent: Option<BoundingBox>,
}

impl DeformedSample {
    fn capture(computation: &SkinningComputation, time: TimeCode, keyed: bool) -> Self {
        let flags = computation.flags();
        Self {
            time,
            keyed,
            points: flags
                .modifies_points()
                .then(|| computation.points().map(<[Vec3]>::to_vec))
                .flatten(),
            normals: flags
                .modifies_normals()
                .then(|| computation.normals().map(<[Vec3]>::to_vec))
                .flatten(),
            xform: flags.modifies_xform().then(|| computation.xform()).flatten(),
            extent: computation
                .has_extent_sample()
                .then(|| computation.extent())
                .flatten(),
        }
    }
}

/// All samples of one target.
#[derive(Debug, Clone)]
pub struct TargetBake {
    pub prim: PrimKey,
    pub path: String,
    pub flags: DeformationFlags,
    pub samples: Vec<DeformedSample>,
}

impl TargetBake {
    /// Union of the per-sample extents.
    #[must_use]
    pub fn combined_extent(&self) -> Option<BoundingBox> {
        self.samples
            .iter()
            .filter_map(|s| s.extent)
            .reduce(|a, b| a.union(&b))
    }
}

#[derive(Debug, Clone)]
pub struct BakeResult {
    pub times: SampleTimeSet,
    pub targets: Vec<TargetBake>,
}

impl BakeResult {
    #[must_use]
    pub fn target(&self, prim: PrimKey) -> Option<&TargetBake> {
        self.targets.iter().find(|t| t.prim == prim)
    }
}

/// Owns every skeleton cache and skinning computation of a bake and drives
/// them sample by sample.
///
/// Construction resolves bindings, drops everything with nothing to do and
/// plans the sample times. Per-sample failures never surface here: they are
/// logged and the affected target keeps its last good outputs.
#[derive(Debug)]
pub struct SkelBaker {
    config: BakeConfig,
    skel_caches: SlotMap<SkelCacheKey, SkeletonAnimationCache>,
    computations: Vec<SkinningComputation>,
    times: SampleTimeSet,
}

impl SkelBaker {
    pub fn new(host: &dyn SkelHost, config: BakeConfig) -> Result<Self> {
        config.validate()?;

        let mut baker = Self {
            config,
            skel_caches: SlotMap::with_key(),
            computations: Vec::new(),
            times: SampleTimeSet::default(),
        };
        baker.create_adapters(host);
        baker.plan_time_samples(host);

        log::debug!(
            "Baking {} targets of {} skeletons over {} samples",
            baker.computations.len(),
            baker.skel_caches.len(),
            baker.times.len()
        );
        Ok(baker)
    }

    fn create_adapters(&mut self, host: &dyn SkelHost) {
        let filter = self.config.target_path.as_deref();
        let mut by_skeleton: FxHashMap<PrimKey, SkelCacheKey> = FxHashMap::default();

        for binding in host.bindings() {
            if binding.targets.is_empty() {
                log::debug!("Binding of {} has no targets", host.prim_path(binding.skeleton));
                continue;
            }

            let targets: SmallVec<[PrimKey; 8]> = binding
                .targets
                .iter()
                .copied()
                .filter(|&t| filter.is_none_or(|path| host.prim_path(t) == path))
                .collect();
            if targets.is_empty() {
                continue;
            }

            let Some(skeleton) = host.skeleton(binding.skeleton) else {
                let err = SkelBakeError::SkeletonNotFound(host.prim_path(binding.skeleton));
                log::warn!("Skipping binding: {err}");
                continue;
            };

            let key = match by_skeleton.get(&binding.skeleton) {
                Some(&key) => key,
                None => match SkeletonAnimationCache::new(skeleton, host, self.config.deformation_flags) {
                    Ok(cache) => {
                        let key = self.skel_caches.insert(cache);
                        by_skeleton.insert(binding.skeleton, key);
                        key
                    }
                    Err(e) => {
                        log::warn!("Skipping skeleton {}: {e}", host.prim_path(binding.skeleton));
                        continue;
                    }
                },
            };

            for target_prim in targets {
                let Some(target) = host.skinning_target(target_prim) else {
                    log::debug!("No skinning data on {}", host.prim_path(target_prim));
                    continue;
                };
                let computation =
                    SkinningComputation::new(target, key, &mut self.skel_caches[key], host, &self.config);
                if computation.has_tasks_to_run() {
                    self.computations.push(computation);
                } else {
                    log::debug!("Nothing to deform on {}", host.prim_path(target_prim));
                }
            }
        }

        self.skel_caches.retain(|_, cache| cache.has_tasks_to_run());
    }

    fn plan_time_samples(&mut self, host: &dyn SkelHost) {
        let interval = self.config.interval;
        let playback_times = self
            .config
            .playback
            .or_else(|| host.playback_metadata())
            .map(|playback| playback.time_codes_in(&interval))
            .unwrap_or_default();

        let mut planner = TimeSamplePlanner::new(interval, playback_times);
        let mut slots: FxHashMap<SkelCacheKey, usize> = FxHashMap::default();

        for (key, cache) in &self.skel_caches {
            let slot = planner.add_skeleton();
            cache.extend_time_samples(host, &interval, planner.candidate_times_mut(slot));
            slots.insert(key, slot);
        }
        for computation in &self.computations {
            if let Some(&slot) = slots.get(&computation.skel_key()) {
                computation.extend_time_samples(host, &interval, planner.candidate_times_mut(slot));
            }
        }

        let mut plan = planner.plan();
        for (key, slot) in slots {
            if let Some(cache) = self.skel_caches.get_mut(key) {
                cache.set_time_sample_mask(std::mem::take(&mut plan.masks[slot]));
            }
        }
        self.times = plan.times;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn config(&self) -> &BakeConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn times(&self) -> &SampleTimeSet {
        &self.times
    }

    /// True when no target has anything to deform.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.computations.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn computations(&self) -> &[SkinningComputation] {
        &self.computations
    }

    #[must_use]
    pub fn computation(&self, prim: PrimKey) -> Option<&SkinningComputation> {
        self.computations.iter().find(|c| c.prim() == prim)
    }

    pub fn skeleton_caches(&self) -> impl Iterator<Item = (SkelCacheKey, &SkeletonAnimationCache)> {
        self.skel_caches.iter()
    }

    #[must_use]
    pub fn skeleton_cache(&self, key: SkelCacheKey) -> Option<&SkeletonAnimationCache> {
        self.skel_caches.get(key)
    }

    /// Index of the planned sample at `time`. A static bake maps every time
    /// onto its single default sample.
    #[must_use]
    pub fn sample_index_for_time(&self, time: f64) -> Option<usize> {
        if self.times.is_static() {
            return Some(0);
        }
        self.times.index_of(time, SAMPLE_TIME_TOLERANCE)
    }

    // ========================================================================
    // Per-sample phases
    // ========================================================================

    // Every adapter is updated at every planned sample, including samples
    // keyed only by another skeleton: outputs must hold the pose at that
    // time. Tasks of inputs that cannot vary still skip the recomputation.

    /// Refreshes world transforms of skeletons, then targets. Runs
    /// serially because every adapter shares `xform_cache`.
    pub fn update_transforms(&mut self, index: usize, xform_cache: &mut dyn TransformCache) {
        let Some(time) = self.times.get(index) else {
            return;
        };
        xform_cache.set_time(time);

        for cache in self.skel_caches.values_mut() {
            cache.update_transform(xform_cache);
        }
        for computation in &mut self.computations {
            computation.update_transform(xform_cache);
        }
    }

    /// Refreshes skinning transforms and blend shape weights of every
    /// skeleton at `index`.
    pub fn update_animation(&mut self, host: &dyn SkelHost, index: usize) {
        let Some(time) = self.times.get(index) else {
            return;
        };
        let run = |cache: &mut SkeletonAnimationCache| cache.update_animation(host, time);

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            let mut caches: Vec<&mut SkeletonAnimationCache> = self.skel_caches.values_mut().collect();
            caches.par_iter_mut().for_each(|cache| run(cache));
        }
        #[cfg(not(feature = "parallel"))]
        self.skel_caches.values_mut().for_each(run);
    }

    /// Deforms every target at `index`.
    pub fn update_skinning(&mut self, host: &dyn SkelHost, index: usize) {
        let Some(time) = self.times.get(index) else {
            return;
        };
        let caches = &self.skel_caches;
        let run = |computation: &mut SkinningComputation| {
            if let Some(cache) = caches.get(computation.skel_key()) {
                computation.update(host, cache, time);
            }
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            self.computations.par_iter_mut().for_each(run);
        }
        #[cfg(not(feature = "parallel"))]
        self.computations.iter_mut().for_each(run);
    }

    /// Runs all three phases at sample `index`.
    pub fn evaluate(&mut self, host: &dyn SkelHost, index: usize) -> bool {
        let Some(time) = self.times.get(index) else {
            return false;
        };
        let mut xform_cache = XformCache::new(host, time);
        self.update_transforms(index, &mut xform_cache);
        self.update_animation(host, index);
        self.update_skinning(host, index);
        true
    }

    /// Evaluates every planned sample in order and collects the outputs.
    pub fn bake(&mut self, host: &dyn SkelHost) -> BakeResult {
        let mut targets: Vec<TargetBake> = self
            .computations
            .iter()
            .map(|c| TargetBake {
                prim: c.prim(),
                path: host.prim_path(c.prim()),
                flags: c.flags(),
                samples: Vec::with_capacity(self.times.len()),
            })
            .collect();

        for index in 0..self.times.len() {
            let Some(time) = self.times.get(index) else {
                continue;
            };
            self.evaluate(host, index);

            for (computation, target) in self.computations.iter().zip(&mut targets) {
                let keyed = self
                    .skel_caches
                    .get(computation.skel_key())
                    .is_some_and(|cache| cache.is_keyed_at(index));
                target
                    .samples
                    .push(DeformedSample::capture(computation, time, keyed));
            }
        }

        BakeResult {
            times: self.times.clone(),
            targets,
        }
    }

    /// Deformed points or normals of `target` at `time`.
    ///
    /// Targets deformed through their transform return `input` carried by
    /// the skinned transform instead. `None` when `time` is not a planned
    /// sample or the target produced nothing.
    pub fn apply_skinning(
        &mut self,
        host: &dyn SkelHost,
        target: PrimKey,
        data: SkinnedData,
        input: &[Vec3],
        time: f64,
    ) -> Option<Vec<Vec3>> {
        let index = self.sample_index_for_time(time)?;
        let position = self.computations.iter().position(|c| c.prim() == target)?;
        self.evaluate(host, index);

        let computation = &self.computations[position];
        let flags = computation.flags();
        match data {
            SkinnedData::Points if flags.modifies_points() => computation.points().map(<[Vec3]>::to_vec),
            SkinnedData::Normals if flags.modifies_normals() => computation.normals().map(<[Vec3]>::to_vec),
            _ if flags.modifies_xform() => {
                let xform = computation.xform()?;
                Some(match data {
                    SkinnedData::Points => input
                        .iter()
                        .map(|p| xform.transform_point3(p.as_dvec3()).as_vec3())
                        .collect(),
                    SkinnedData::Normals => {
                        let normal_xform = normal_matrix(&xform);
                        input
                            .iter()
                            .map(|n| (normal_xform * n.as_dvec3()).normalize_or_zero().as_vec3())
                            .collect()
                    }
                })
            }
            _ => None,
        }
    }
}
