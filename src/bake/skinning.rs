//! Per-target skinning computation.
//!
//! A [`SkinningComputation`] decides once, at setup, which deformation
//! paths its target takes and which inputs it needs. Per sample it refreshes
//! those inputs through [`Task`]s and runs the enabled stages in
//! [`DeformationStage::ORDER`] on a working copy of the rest data. Outputs
//! are only replaced when every enabled stage touching them succeeded, so a
//! failing sample re-exposes the last good (or rest) data.

use std::borrow::Cow;

use glam::{DMat3, DMat4, Vec3};

use crate::bake::SkelCacheKey;
use crate::bake::blend_shapes::{BlendShapeQuery, apply_blend_shape_offsets};
use crate::bake::extent::BoundingBox;
use crate::bake::flags::{DeformationFlags, DeformationStage};
use crate::bake::lbs::{normal_matrix, skin_normals_lbs, skin_points_lbs, skin_transform_lbs};
use crate::bake::skel_cache::SkeletonAnimationCache;
use crate::bake::task::Task;
use crate::config::BakeConfig;
use crate::errors::SkelBakeError;
use crate::scene::host::{SkelHost, world_transform_might_be_time_varying, world_transform_time_samples};
use crate::scene::xform_cache::TransformCache;
use crate::scene::PrimKey;
use crate::skel::{AnimMapper, InfluenceSample, SkinningTarget};
use crate::time::{Interval, TimeCode, insert_times_in_interval};

/// A deformed value plus whether it was produced at the current sample.
#[derive(Debug, Clone)]
struct Output<T> {
    value: Option<T>,
    has_sample_at_current_time: bool,
}

impl<T> Default for Output<T> {
    fn default() -> Self {
        Self {
            value: None,
            has_sample_at_current_time: false,
        }
    }
}

impl<T> Output<T> {
    fn begin_update(&mut self) {
        self.has_sample_at_current_time = false;
    }

    fn commit(&mut self, value: T) {
        self.value = Some(value);
        self.has_sample_at_current_time = true;
    }
}

/// Buffers being deformed during one sample. `None` marks a buffer whose
/// deformation failed (or had no input) at this sample.
#[derive(Debug, Default)]
struct Working {
    points: Option<Vec<Vec3>>,
    normals: Option<Vec<Vec3>>,
    xform: Option<DMat4>,
}

#[derive(Debug, Clone)]
pub struct SkinningComputation {
    prim: PrimKey,
    skel: SkelCacheKey,
    flags: DeformationFlags,
    update_extents: bool,

    // === Setup-time data ===
    /// Skeleton joint order onto the target's; `None` when identical.
    joint_mapper: Option<AnimMapper>,
    /// Animation channel order onto the target's blend shapes.
    blend_shape_mapper: Option<AnimMapper>,
    blend_shape_query: Option<BlendShapeQuery>,
    blend_shape_point_indices: Vec<Vec<u32>>,
    sub_shape_point_offsets: Vec<Vec<Vec3>>,
    sub_shape_normal_offsets: Vec<Vec<Vec3>>,

    // === Inputs ===
    rest_points: Task<Vec<Vec3>>,
    rest_normals: Task<Vec<Vec3>>,
    geom_bind_xform: Task<DMat4>,
    geom_bind_normal_xform: Task<DMat3>,
    joint_influences: Task<InfluenceSample>,
    local_to_world: Task<DMat4>,
    parent_to_world: Task<DMat4>,

    // === Outputs ===
    points: Output<Vec<Vec3>>,
    normals: Output<Vec<Vec3>>,
    xform: Output<DMat4>,
    extent: Output<BoundingBox>,
}

impl SkinningComputation {
    /// Derives the deformation paths of `target` and wires the skeleton
    /// outputs they consume as required on `skel_cache`.
    pub fn new(
        target: &SkinningTarget,
        skel: SkelCacheKey,
        skel_cache: &mut SkeletonAnimationCache,
        host: &dyn SkelHost,
        config: &BakeConfig,
    ) -> Self {
        let prim = target.prim;
        let kind = host.kind(prim).unwrap_or_default();
        let skeleton = host.skeleton(skel_cache.prim());

        let points_attr = target.rest_points();
        let normals_attr = target.rest_normals();

        let mut computation = Self {
            prim,
            skel,
            flags: DeformationFlags::empty(),
            update_extents: config.update_extents,
            joint_mapper: None,
            blend_shape_mapper: None,
            blend_shape_query: None,
            blend_shape_point_indices: Vec::new(),
            sub_shape_point_offsets: Vec::new(),
            sub_shape_normal_offsets: Vec::new(),
            rest_points: Task::new(),
            rest_normals: Task::new(),
            geom_bind_xform: Task::new(),
            geom_bind_normal_xform: Task::new(),
            joint_influences: Task::new(),
            local_to_world: Task::new(),
            parent_to_world: Task::new(),
            points: Output::default(),
            normals: Output::default(),
            xform: Output::default(),
            extent: Output::default(),
        };

        // === Linear blend skinning ===
        let mut flags = DeformationFlags::empty();
        if target.has_joint_influences() && skel_cache.can_compute_skinning_xforms() {
            if target.is_rigidly_deformed() {
                if kind.is_xformable() {
                    flags |= DeformationFlags::XFORM_LBS;
                }
            } else if kind.is_point_based() {
                if points_attr.is_some() {
                    flags |= DeformationFlags::POINTS_LBS;
                }
                if normals_attr.is_some() && skel_cache.can_compute_skinning_normal_xforms() {
                    flags |= DeformationFlags::NORMALS_LBS;
                }
            }
        }

        // === Blend shapes ===
        if skel_cache.can_compute_blend_shape_weights()
            && kind.is_point_based()
            && target.has_blend_shapes()
            && (points_attr.is_some() || normals_attr.is_some())
        {
            let query = BlendShapeQuery::new(&target.blend_shapes);
            if points_attr.is_some() {
                let offsets = query.sub_shape_point_offsets(&target.blend_shapes);
                if offsets.iter().any(|o| !o.is_empty()) {
                    flags |= DeformationFlags::POINTS_BLEND_SHAPES;
                    computation.sub_shape_point_offsets = offsets;
                }
            }
            if normals_attr.is_some() {
                let offsets = query.sub_shape_normal_offsets(&target.blend_shapes);
                if offsets.iter().any(|o| !o.is_empty()) {
                    flags |= DeformationFlags::NORMALS_BLEND_SHAPES;
                    computation.sub_shape_normal_offsets = offsets;
                }
            }
            if flags.intersects(DeformationFlags::BLEND_SHAPES) {
                let channels: Vec<&str> = target.blend_shape_channels().collect();
                let anim_channels = skeleton.map_or(&[][..], |s| s.blend_shape_order());
                computation.blend_shape_mapper = Some(AnimMapper::new(anim_channels, channels.as_slice()));
                computation.blend_shape_point_indices = query.blend_shape_point_indices(&target.blend_shapes);
                computation.blend_shape_query = Some(query);
            }
        }

        flags &= config.deformation_flags;
        computation.flags = flags;

        if flags.is_empty() {
            return computation;
        }

        if flags.intersects(DeformationFlags::LBS)
            && let (Some(skeleton), Some(target_joints)) = (skeleton, target.joints.as_ref())
        {
            let mapper = AnimMapper::new(skeleton.joints.as_slice(), target_joints.as_slice());
            if !mapper.is_identity() {
                computation.joint_mapper = Some(mapper);
            }
        }

        computation.activate_tasks(target, host);

        if flags.intersects(DeformationFlags::LBS) {
            skel_cache.require_skinning_xforms();
            skel_cache.require_local_to_world();
        }
        if flags.contains(DeformationFlags::NORMALS_LBS) {
            skel_cache.require_skinning_normal_xforms();
        }
        if flags.intersects(DeformationFlags::BLEND_SHAPES) {
            skel_cache.require_blend_shape_weights();
        }

        log::trace!(
            "Skinning {} with {:?}",
            host.prim_path(prim),
            computation.flags
        );
        computation
    }

    fn activate_tasks(&mut self, target: &SkinningTarget, host: &dyn SkelHost) {
        let flags = self.flags;

        self.rest_points.set_active(flags.modifies_points(), true);
        self.rest_points.set_might_be_time_varying(
            target.rest_points().is_some_and(|a| a.value_might_be_time_varying()),
        );
        self.rest_normals.set_active(flags.modifies_normals(), true);
        self.rest_normals.set_might_be_time_varying(
            target.rest_normals().is_some_and(|a| a.value_might_be_time_varying()),
        );

        if !flags.intersects(DeformationFlags::LBS) {
            return;
        }

        let bind_varying = target.geom_bind_might_be_time_varying();
        self.geom_bind_xform.set_active(true, true);
        self.geom_bind_xform.set_might_be_time_varying(bind_varying);
        self.geom_bind_normal_xform
            .set_active(flags.contains(DeformationFlags::NORMALS_LBS), true);
        self.geom_bind_normal_xform.set_might_be_time_varying(bind_varying);

        self.joint_influences.set_active(true, true);
        self.joint_influences.set_might_be_time_varying(
            target.influences.as_ref().is_some_and(|i| i.might_be_time_varying()),
        );

        if flags.intersects(DeformationFlags::POINTS_LBS | DeformationFlags::NORMALS_LBS) {
            self.local_to_world.set_active(true, true);
            self.local_to_world
                .set_might_be_time_varying(world_transform_might_be_time_varying(host, self.prim));
        }

        // A prim that resets the xform stack is placed in world space
        // directly, so its parent transform stays identity.
        if flags.contains(DeformationFlags::XFORM_LBS) && !host.resets_xform_stack(self.prim) {
            self.parent_to_world.set_active(true, true);
            self.parent_to_world.set_might_be_time_varying(
                host.parent(self.prim)
                    .is_some_and(|parent| world_transform_might_be_time_varying(host, parent)),
            );
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn prim(&self) -> PrimKey {
        self.prim
    }

    #[inline]
    #[must_use]
    pub fn skel_key(&self) -> SkelCacheKey {
        self.skel
    }

    #[inline]
    #[must_use]
    pub fn flags(&self) -> DeformationFlags {
        self.flags
    }

    #[inline]
    #[must_use]
    pub fn has_tasks_to_run(&self) -> bool {
        !self.flags.is_empty()
    }

    /// Latest deformed points; the rest points until a sample succeeds.
    #[must_use]
    pub fn points(&self) -> Option<&[Vec3]> {
        self.points.value.as_deref()
    }

    #[must_use]
    pub fn normals(&self) -> Option<&[Vec3]> {
        self.normals.value.as_deref()
    }

    #[must_use]
    pub fn xform(&self) -> Option<DMat4> {
        self.xform.value
    }

    #[must_use]
    pub fn extent(&self) -> Option<BoundingBox> {
        self.extent.value
    }

    #[must_use]
    pub fn has_extent_sample(&self) -> bool {
        self.extent.has_sample_at_current_time
    }

    // ========================================================================
    // Time sampling
    // ========================================================================

    /// Appends the times at which this target's required inputs change.
    pub fn extend_time_samples(&self, host: &dyn SkelHost, interval: &Interval, times: &mut Vec<f64>) {
        let Some(target) = host.skinning_target(self.prim) else {
            return;
        };

        if self.rest_points.is_required()
            && let Some(points) = target.rest_points()
        {
            insert_times_in_interval(interval, points.time_samples(), times);
        }
        if self.rest_normals.is_required()
            && let Some(normals) = target.rest_normals()
        {
            insert_times_in_interval(interval, normals.time_samples(), times);
        }
        if self.geom_bind_xform.is_required()
            && let Some(bind) = &target.geom_bind_transform
        {
            insert_times_in_interval(interval, bind.time_samples(), times);
        }
        if self.joint_influences.is_required()
            && let Some(influences) = &target.influences
        {
            insert_times_in_interval(interval, influences.indices.time_samples(), times);
            insert_times_in_interval(interval, influences.weights.time_samples(), times);
        }
        if self.local_to_world.is_required() {
            let mut xform_times = Vec::new();
            world_transform_time_samples(host, self.prim, &mut xform_times);
            insert_times_in_interval(interval, &xform_times, times);
        }
        if self.parent_to_world.is_required()
            && let Some(parent) = host.parent(self.prim)
        {
            let mut xform_times = Vec::new();
            world_transform_time_samples(host, parent, &mut xform_times);
            insert_times_in_interval(interval, &xform_times, times);
        }
    }

    // ========================================================================
    // Per-sample updates
    // ========================================================================

    pub fn update_transform(&mut self, xform_cache: &mut dyn TransformCache) {
        let time = xform_cache.time();
        let prim = self.prim;
        self.local_to_world
            .run(time, |_| Some(xform_cache.local_to_world(prim)));
        self.parent_to_world
            .run(time, |_| Some(xform_cache.parent_to_world(prim)));
    }

    /// Deforms the target at `time` using the skeleton's current outputs.
    pub fn update(&mut self, host: &dyn SkelHost, skel_cache: &SkeletonAnimationCache, time: TimeCode) {
        self.points.begin_update();
        self.normals.begin_update();
        self.xform.begin_update();
        self.extent.begin_update();

        let Some(target) = host.skinning_target(self.prim) else {
            log::debug!("Skinning target {} is gone from the host", host.prim_path(self.prim));
            return;
        };

        self.rest_points
            .run(time, |t| target.rest_points().and_then(|a| a.get(t)));
        self.rest_normals
            .run(time, |t| target.rest_normals().and_then(|a| a.get(t)));

        let mut working = Working {
            points: self.rest_points.value().cloned(),
            normals: self.rest_normals.value().cloned(),
            xform: None,
        };

        for stage in self.flags.stages() {
            match stage {
                DeformationStage::BlendShapes => self.deform_with_blend_shapes(skel_cache, &mut working),
                DeformationStage::Lbs => self.deform_with_lbs(time, target, skel_cache, &mut working),
            }
        }

        self.commit(working);
    }

    fn deform_with_blend_shapes(&self, skel_cache: &SkeletonAnimationCache, working: &mut Working) {
        let resolved = skel_cache
            .blend_shape_weights()
            .zip(self.blend_shape_mapper.as_ref())
            .zip(self.blend_shape_query.as_ref())
            .ok_or(SkelBakeError::MissingValue("blend shape weights"))
            .and_then(|((weights, mapper), query)| {
                let weights = mapper.remap(weights, 0.0)?;
                query.resolve_sub_shape_weights(&weights)
            });

        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                log::debug!("Blend shapes skipped: {e}");
                if self.flags.contains(DeformationFlags::POINTS_BLEND_SHAPES) {
                    working.points = None;
                }
                if self.flags.contains(DeformationFlags::NORMALS_BLEND_SHAPES) {
                    working.normals = None;
                }
                return;
            }
        };

        if self.flags.contains(DeformationFlags::POINTS_BLEND_SHAPES)
            && let Some(points) = working.points.as_mut()
            && let Err(e) = apply_blend_shape_offsets(
                &resolved,
                &self.blend_shape_point_indices,
                &self.sub_shape_point_offsets,
                points,
            )
        {
            log::debug!("Blend shape points skipped: {e}");
            working.points = None;
        }

        if self.flags.contains(DeformationFlags::NORMALS_BLEND_SHAPES)
            && let Some(normals) = working.normals.as_mut()
        {
            match apply_blend_shape_offsets(
                &resolved,
                &self.blend_shape_point_indices,
                &self.sub_shape_normal_offsets,
                normals,
            ) {
                Ok(()) => {
                    for n in normals.iter_mut() {
                        *n = n.normalize_or_zero();
                    }
                }
                Err(e) => {
                    log::debug!("Blend shape normals skipped: {e}");
                    working.normals = None;
                }
            }
        }
    }

    fn deform_with_lbs(
        &mut self,
        time: TimeCode,
        target: &SkinningTarget,
        skel_cache: &SkeletonAnimationCache,
        working: &mut Working,
    ) {
        let flags = self.flags;
        let fail = |working: &mut Working| {
            if flags.contains(DeformationFlags::POINTS_LBS) {
                working.points = None;
            }
            if flags.contains(DeformationFlags::NORMALS_LBS) {
                working.normals = None;
            }
            working.xform = None;
        };

        self.geom_bind_xform
            .run(time, |t| Some(target.geom_bind_transform_at(t)));
        self.geom_bind_normal_xform
            .run(time, |t| Some(normal_matrix(&target.geom_bind_transform_at(t))));
        self.joint_influences.run(time, |t| {
            target.influences.as_ref().and_then(|influences| {
                influences
                    .compute(t)
                    .inspect_err(|e| log::debug!("Joint influences unavailable at {t}: {e}"))
                    .ok()
            })
        });

        let (Some(skel_xforms), Some(skel_to_world), Some(geom_bind), Some(influences)) = (
            skel_cache.skinning_xforms(),
            skel_cache.local_to_world(),
            self.geom_bind_xform.value(),
            self.joint_influences.value(),
        ) else {
            log::debug!("Skinning inputs incomplete at {time}");
            fail(working);
            return;
        };

        let joint_xforms = match remap_joints(self.joint_mapper.as_ref(), skel_xforms, DMat4::IDENTITY) {
            Some(xforms) => xforms,
            None => {
                fail(working);
                return;
            }
        };

        if flags.intersects(DeformationFlags::POINTS_LBS | DeformationFlags::NORMALS_LBS) {
            let Some(local_to_world) = self.local_to_world.value() else {
                fail(working);
                return;
            };
            let skel_to_local = local_to_world.inverse() * skel_to_world;

            if flags.contains(DeformationFlags::POINTS_LBS)
                && let Some(points) = working.points.as_mut()
            {
                match skin_points_lbs(
                    geom_bind,
                    &joint_xforms,
                    &influences.indices,
                    &influences.weights,
                    influences.element_size,
                    points,
                ) {
                    Ok(()) => {
                        for p in points.iter_mut() {
                            *p = skel_to_local.transform_point3(p.as_dvec3()).as_vec3();
                        }
                    }
                    Err(e) => {
                        log::debug!("Point skinning failed at {time}: {e}");
                        working.points = None;
                    }
                }
            }

            if flags.contains(DeformationFlags::NORMALS_LBS)
                && let Some(normals) = working.normals.as_mut()
            {
                let skinned = skel_cache
                    .skinning_normal_xforms()
                    .zip(self.geom_bind_normal_xform.value())
                    .and_then(|(joint_normals, bind_normal)| {
                        let joint_normals =
                            remap_joints(self.joint_mapper.as_ref(), joint_normals, DMat3::IDENTITY)?;
                        skin_normals_lbs(
                            bind_normal,
                            &joint_normals,
                            &influences.indices,
                            &influences.weights,
                            influences.element_size,
                            normals,
                        )
                        .inspect_err(|e| log::debug!("Normal skinning failed at {time}: {e}"))
                        .ok()
                    });

                if skinned.is_some() {
                    let to_local = normal_matrix(&skel_to_local);
                    for n in normals.iter_mut() {
                        *n = (to_local * n.as_dvec3()).normalize_or_zero().as_vec3();
                    }
                } else {
                    working.normals = None;
                }
            }
        }

        if flags.contains(DeformationFlags::XFORM_LBS) {
            let parent_to_world = if self.parent_to_world.is_active() {
                match self.parent_to_world.value() {
                    Some(xform) => *xform,
                    None => {
                        fail(working);
                        return;
                    }
                }
            } else {
                DMat4::IDENTITY
            };

            match skin_transform_lbs(geom_bind, &joint_xforms, &influences.indices, &influences.weights) {
                Ok(skinned) => working.xform = Some(parent_to_world.inverse() * skel_to_world * skinned),
                Err(e) => log::debug!("Transform skinning failed at {time}: {e}"),
            }
        }
    }

    fn commit(&mut self, working: Working) {
        if self.flags.modifies_points() {
            match working.points {
                Some(points) => {
                    if self.update_extents
                        && let Some(extent) = BoundingBox::from_points(&points)
                    {
                        self.extent.commit(extent);
                    }
                    self.points.commit(points);
                }
                None if self.points.value.is_none() => {
                    self.points.value = self.rest_points.value().cloned();
                }
                None => {}
            }
        }

        if self.flags.modifies_normals() {
            match working.normals {
                Some(normals) => self.normals.commit(normals),
                None if self.normals.value.is_none() => {
                    self.normals.value = self.rest_normals.value().cloned();
                }
                None => {}
            }
        }

        if self.flags.modifies_xform()
            && let Some(xform) = working.xform
        {
            self.xform.commit(xform);
        }
    }
}

/// Remaps skeleton-order joint data into the target's order.
fn remap_joints<'a, T: Clone>(mapper: Option<&AnimMapper>, xforms: &'a [T], fill: T) -> Option<Cow<'a, [T]>> {
    match mapper {
        None => Some(Cow::Borrowed(xforms)),
        Some(mapper) => mapper
            .remap(xforms, fill)
            .inspect_err(|e| log::debug!("Joint remap failed: {e}"))
            .ok()
            .map(Cow::Owned),
    }
}
