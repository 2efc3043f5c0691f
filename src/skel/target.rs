use glam::{DMat4, Vec3};

use crate::animation::Attribute;
use crate::errors::{Result, SkelBakeError};
use crate::scene::PrimKey;
use crate::time::TimeCode;

/// How a target's normals are laid out over its topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NormalsInterpolation {
    Constant,
    Uniform,
    #[default]
    Vertex,
    Varying,
    FaceVarying,
}

impl NormalsInterpolation {
    /// Only per-point normals can be deformed alongside the points.
    #[inline]
    #[must_use]
    pub fn is_per_point(self) -> bool {
        matches!(self, Self::Vertex | Self::Varying)
    }
}

/// Joint indices and weights, `element_size` entries per point.
///
/// Rigid influences apply a single set of entries to the whole prim.
#[derive(Debug, Clone)]
pub struct JointInfluences {
    pub indices: Attribute<Vec<i32>>,
    pub weights: Attribute<Vec<f32>>,
    pub element_size: usize,
    pub rigid: bool,
}

/// Influences evaluated at one time, with weights normalized per point.
#[derive(Debug, Clone, PartialEq)]
pub struct InfluenceSample {
    pub indices: Vec<i32>,
    pub weights: Vec<f32>,
    pub element_size: usize,
}

impl JointInfluences {
    /// Per-point influences.
    #[must_use]
    pub fn per_point(indices: Vec<i32>, weights: Vec<f32>, element_size: usize) -> Self {
        Self {
            indices: Attribute::uniform(indices),
            weights: Attribute::uniform(weights),
            element_size,
            rigid: false,
        }
    }

    /// One set of influences for the whole prim.
    #[must_use]
    pub fn rigid(indices: Vec<i32>, weights: Vec<f32>) -> Self {
        let element_size = indices.len();
        Self {
            indices: Attribute::uniform(indices),
            weights: Attribute::uniform(weights),
            element_size,
            rigid: true,
        }
    }

    #[must_use]
    pub fn might_be_time_varying(&self) -> bool {
        self.indices.value_might_be_time_varying() || self.weights.value_might_be_time_varying()
    }

    pub fn compute(&self, time: TimeCode) -> Result<InfluenceSample> {
        let indices = self
            .indices
            .get(time)
            .ok_or(SkelBakeError::MissingValue("joint indices"))?;
        let mut weights = self
            .weights
            .get(time)
            .ok_or(SkelBakeError::MissingValue("joint weights"))?;

        if self.element_size == 0 {
            return Err(SkelBakeError::MalformedInfluences(
                "element size is zero".to_string(),
            ));
        }
        if indices.len() != weights.len() {
            return Err(SkelBakeError::MalformedInfluences(format!(
                "{} indices but {} weights",
                indices.len(),
                weights.len()
            )));
        }
        if indices.len() % self.element_size != 0 {
            return Err(SkelBakeError::MalformedInfluences(format!(
                "{} entries is not a multiple of element size {}",
                indices.len(),
                self.element_size
            )));
        }

        normalize_weights(&mut weights, self.element_size);
        Ok(InfluenceSample {
            indices,
            weights,
            element_size: self.element_size,
        })
    }
}

/// Scales each point's weights to sum to one. All-zero groups stay zero.
pub fn normalize_weights(weights: &mut [f32], element_size: usize) {
    if element_size == 0 {
        return;
    }
    for group in weights.chunks_mut(element_size) {
        let sum: f32 = group.iter().sum();
        if sum.abs() > f32::EPSILON {
            for w in group {
                *w /= sum;
            }
        }
    }
}

/// Offsets reached at a partial channel weight.
#[derive(Debug, Clone, Default)]
pub struct InbetweenShape {
    pub weight: f32,
    pub offsets: Vec<Vec3>,
    pub normal_offsets: Vec<Vec3>,
}

/// Per-point offsets applied by a blend shape channel.
#[derive(Debug, Clone, Default)]
pub struct BlendShape {
    pub offsets: Vec<Vec3>,
    pub normal_offsets: Vec<Vec3>,
    /// Sparse target points; `None` means offsets cover every point.
    pub point_indices: Option<Vec<u32>>,
    pub inbetweens: Vec<InbetweenShape>,
}

/// A blend shape bound to a named channel of the target.
#[derive(Debug, Clone)]
pub struct BlendShapeBinding {
    pub channel: String,
    pub shape: BlendShape,
}

/// Skinning data of one deformable prim.
#[derive(Debug, Clone)]
pub struct SkinningTarget {
    pub prim: PrimKey,
    pub points: Option<Attribute<Vec<Vec3>>>,
    pub normals: Option<Attribute<Vec<Vec3>>>,
    pub normals_interpolation: NormalsInterpolation,
    pub influences: Option<JointInfluences>,
    pub geom_bind_transform: Option<Attribute<DMat4>>,
    /// Target-specific joint order; `None` uses the skeleton's order.
    pub joints: Option<Vec<String>>,
    pub blend_shapes: Vec<BlendShapeBinding>,
}

impl SkinningTarget {
    #[must_use]
    pub fn new(prim: PrimKey) -> Self {
        Self {
            prim,
            points: None,
            normals: None,
            normals_interpolation: NormalsInterpolation::Vertex,
            influences: None,
            geom_bind_transform: None,
            joints: None,
            blend_shapes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_points(mut self, points: Attribute<Vec<Vec3>>) -> Self {
        self.points = Some(points);
        self
    }

    #[must_use]
    pub fn with_normals(mut self, normals: Attribute<Vec<Vec3>>, interpolation: NormalsInterpolation) -> Self {
        self.normals = Some(normals);
        self.normals_interpolation = interpolation;
        self
    }

    #[must_use]
    pub fn with_influences(mut self, influences: JointInfluences) -> Self {
        self.influences = Some(influences);
        self
    }

    #[must_use]
    pub fn with_geom_bind_transform(mut self, xform: Attribute<DMat4>) -> Self {
        self.geom_bind_transform = Some(xform);
        self
    }

    #[must_use]
    pub fn with_joints(mut self, joints: Vec<String>) -> Self {
        self.joints = Some(joints);
        self
    }

    #[must_use]
    pub fn with_blend_shape(mut self, channel: &str, shape: BlendShape) -> Self {
        self.blend_shapes.push(BlendShapeBinding {
            channel: channel.to_string(),
            shape,
        });
        self
    }

    /// Authored rest points, if any.
    #[must_use]
    pub fn rest_points(&self) -> Option<&Attribute<Vec<Vec3>>> {
        self.points.as_ref().filter(|a| a.has_authored_value())
    }

    /// Authored normals laid out per point, if any.
    #[must_use]
    pub fn rest_normals(&self) -> Option<&Attribute<Vec<Vec3>>> {
        self.normals
            .as_ref()
            .filter(|a| a.has_authored_value() && self.normals_interpolation.is_per_point())
    }

    #[must_use]
    pub fn has_joint_influences(&self) -> bool {
        self.influences.is_some()
    }

    #[must_use]
    pub fn is_rigidly_deformed(&self) -> bool {
        self.influences.as_ref().is_some_and(|i| i.rigid)
    }

    #[must_use]
    pub fn has_blend_shapes(&self) -> bool {
        !self.blend_shapes.is_empty()
    }

    /// Geometry-to-skeleton bind transform; identity when unauthored.
    #[must_use]
    pub fn geom_bind_transform_at(&self, time: TimeCode) -> DMat4 {
        self.geom_bind_transform
            .as_ref()
            .and_then(|a| a.get(time))
            .unwrap_or(DMat4::IDENTITY)
    }

    #[must_use]
    pub fn geom_bind_might_be_time_varying(&self) -> bool {
        self.geom_bind_transform
            .as_ref()
            .is_some_and(Attribute::value_might_be_time_varying)
    }

    /// Blend shape channel names, in binding order.
    pub fn blend_shape_channels(&self) -> impl Iterator<Item = &str> {
        self.blend_shapes.iter().map(|b| b.channel.as_str())
    }
}

/// A skeleton and the targets it deforms.
#[derive(Debug, Clone)]
pub struct SkelBinding {
    pub skeleton: PrimKey,
    pub targets: Vec<PrimKey>,
}

impl SkelBinding {
    #[must_use]
    pub fn new(skeleton: PrimKey, targets: Vec<PrimKey>) -> Self {
        Self { skeleton, targets }
    }
}
