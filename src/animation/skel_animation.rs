use std::fmt;

use glam::{DMat4, DQuat, Quat, Vec3};

use crate::animation::attribute::Attribute;
use crate::animation::values::Interpolate;
use crate::errors::{Result, SkelBakeError};
use crate::time::{TimeCode, sort_dedup};

/// Source of joint and blend shape animation for a skeleton.
///
/// Arrays are returned in the source's own order ([`joint_order`] and
/// [`blend_shape_order`]); callers remap them onto the skeleton or target
/// order.
///
/// [`joint_order`]: AnimationSource::joint_order
/// [`blend_shape_order`]: AnimationSource::blend_shape_order
pub trait AnimationSource: Send + Sync + fmt::Debug {
    fn joint_order(&self) -> &[String];
    fn blend_shape_order(&self) -> &[String];

    /// Joint-local transforms at `time`, or `None` when not computable.
    fn joint_local_transforms_at(&self, time: TimeCode) -> Option<Vec<DMat4>>;
    fn blend_shape_weights_at(&self, time: TimeCode) -> Option<Vec<f32>>;

    fn joint_transforms_might_vary(&self) -> bool;
    fn blend_weights_might_vary(&self) -> bool;
    fn joint_transform_time_samples(&self) -> Vec<f64>;
    fn blend_shape_weight_time_samples(&self) -> Vec<f64>;
    fn has_authored_blend_shape_weights(&self) -> bool;
}

/// Joint TRS and blend shape weight curves stored as array attributes.
#[derive(Debug, Clone, Default)]
pub struct SkelAnimation {
    pub joints: Vec<String>,
    pub translations: Attribute<Vec<Vec3>>,
    pub rotations: Attribute<Vec<Quat>>,
    pub scales: Attribute<Vec<Vec3>>,
    pub blend_shapes: Vec<String>,
    pub blend_shape_weights: Attribute<Vec<f32>>,
}

impl SkelAnimation {
    #[must_use]
    pub fn new(joints: Vec<String>) -> Self {
        Self {
            joints,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_translations(mut self, translations: Attribute<Vec<Vec3>>) -> Self {
        self.translations = translations;
        self
    }

    #[must_use]
    pub fn with_rotations(mut self, rotations: Attribute<Vec<Quat>>) -> Self {
        self.rotations = rotations;
        self
    }

    #[must_use]
    pub fn with_scales(mut self, scales: Attribute<Vec<Vec3>>) -> Self {
        self.scales = scales;
        self
    }

    #[must_use]
    pub fn with_blend_shapes(mut self, channels: Vec<String>, weights: Attribute<Vec<f32>>) -> Self {
        self.blend_shapes = channels;
        self.blend_shape_weights = weights;
        self
    }

    /// One TRS channel at `time`; `Ok(None)` when it is not authored there.
    fn component<T: Interpolate>(
        &self,
        attr: &Attribute<Vec<T>>,
        time: TimeCode,
        context: &'static str,
    ) -> Result<Option<Vec<T>>> {
        match attr.get(time) {
            Some(values) if values.len() != self.joints.len() => Err(SkelBakeError::SizeMismatch {
                context,
                expected: self.joints.len(),
                actual: values.len(),
            }),
            other => Ok(other),
        }
    }

    fn joint_local_transforms(&self, time: TimeCode) -> Result<Option<Vec<DMat4>>> {
        let translations = self.component(&self.translations, time, "animation translations")?;
        let rotations = self.component(&self.rotations, time, "animation rotations")?;
        let scales = self.component(&self.scales, time, "animation scales")?;

        if translations.is_none() && rotations.is_none() && scales.is_none() {
            return Ok(None);
        }

        let xforms = (0..self.joints.len())
            .map(|i| {
                let t = translations.as_ref().map_or(Vec3::ZERO, |v| v[i]);
                let r = rotations.as_ref().map_or(Quat::IDENTITY, |v| v[i]);
                let s = scales.as_ref().map_or(Vec3::ONE, |v| v[i]);
                let rotation = DQuat::from_xyzw(
                    f64::from(r.x),
                    f64::from(r.y),
                    f64::from(r.z),
                    f64::from(r.w),
                )
                .normalize();
                DMat4::from_scale_rotation_translation(s.as_dvec3(), rotation, t.as_dvec3())
            })
            .collect();
        Ok(Some(xforms))
    }
}

impl AnimationSource for SkelAnimation {
    fn joint_order(&self) -> &[String] {
        &self.joints
    }

    fn blend_shape_order(&self) -> &[String] {
        &self.blend_shapes
    }

    fn joint_local_transforms_at(&self, time: TimeCode) -> Option<Vec<DMat4>> {
        self.joint_local_transforms(time)
            .inspect_err(|e| log::debug!("Joint transforms unavailable at {time}: {e}"))
            .ok()
            .flatten()
    }

    fn blend_shape_weights_at(&self, time: TimeCode) -> Option<Vec<f32>> {
        let weights = self.blend_shape_weights.get(time)?;
        if weights.len() != self.blend_shapes.len() {
            log::debug!(
                "Animation has {} blend shape weights for {} channels",
                weights.len(),
                self.blend_shapes.len()
            );
            return None;
        }
        Some(weights)
    }

    fn joint_transforms_might_vary(&self) -> bool {
        self.translations.value_might_be_time_varying()
            || self.rotations.value_might_be_time_varying()
            || self.scales.value_might_be_time_varying()
    }

    fn blend_weights_might_vary(&self) -> bool {
        self.blend_shape_weights.value_might_be_time_varying()
    }

    fn joint_transform_time_samples(&self) -> Vec<f64> {
        let mut times = Vec::new();
        times.extend_from_slice(self.translations.time_samples());
        times.extend_from_slice(self.rotations.time_samples());
        times.extend_from_slice(self.scales.time_samples());
        sort_dedup(&mut times);
        times
    }

    fn blend_shape_weight_time_samples(&self) -> Vec<f64> {
        self.blend_shape_weights.time_samples().to_vec()
    }

    fn has_authored_blend_shape_weights(&self) -> bool {
        self.blend_shape_weights.has_authored_value()
    }
}
