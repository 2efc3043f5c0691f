use std::sync::Arc;

use glam::DMat4;

use crate::animation::AnimationSource;
use crate::errors::{Result, SkelBakeError};
use crate::scene::PrimKey;
use crate::skel::mapper::AnimMapper;
use crate::time::TimeCode;

/// Parent indices derived from `/`-separated joint paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    parents: Vec<Option<usize>>,
}

impl Topology {
    /// A joint's parent is the joint whose path is its longest proper
    /// prefix. Joints without one are roots.
    #[must_use]
    pub fn from_joint_paths<S: AsRef<str>>(paths: &[S]) -> Self {
        let lookup: rustc_hash::FxHashMap<&str, usize> = paths
            .iter()
            .enumerate()
            .map(|(i, p)| (p.as_ref(), i))
            .collect();

        let parents = paths
            .iter()
            .map(|path| {
                let mut path = path.as_ref();
                while let Some(split) = path.rfind('/') {
                    path = &path[..split];
                    if let Some(&parent) = lookup.get(path) {
                        return Some(parent);
                    }
                }
                None
            })
            .collect();

        Self { parents }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn parent(&self, joint: usize) -> Option<usize> {
        self.parents.get(joint).copied().flatten()
    }

    /// Every parent must come before its children.
    pub fn validate(&self) -> Result<()> {
        for (joint, parent) in self.parents.iter().enumerate() {
            if let Some(parent) = *parent
                && parent >= joint
            {
                return Err(SkelBakeError::InvalidTopology { joint, parent });
            }
        }
        Ok(())
    }

    /// Concatenates joint-local transforms into skeleton space.
    pub fn concat_joint_transforms(&self, local: &[DMat4]) -> Result<Vec<DMat4>> {
        if local.len() != self.parents.len() {
            return Err(SkelBakeError::SizeMismatch {
                context: "joint local transforms",
                expected: self.parents.len(),
                actual: local.len(),
            });
        }
        let mut skel_space = Vec::with_capacity(local.len());
        for (joint, xform) in local.iter().enumerate() {
            let world = match self.parents[joint] {
                Some(parent) if parent < joint => skel_space[parent] * *xform,
                Some(parent) => return Err(SkelBakeError::InvalidTopology { joint, parent }),
                None => *xform,
            };
            skel_space.push(world);
        }
        Ok(skel_space)
    }
}

/// A skeleton definition as authored on the host.
#[derive(Debug, Clone)]
pub struct Skeleton {
    pub prim: PrimKey,
    /// Joint paths, parents before children.
    pub joints: Vec<String>,
    /// Skeleton-space bind pose of each joint.
    pub bind_transforms: Vec<DMat4>,
    /// Joint-local rest pose, used where animation is missing.
    pub rest_transforms: Option<Vec<DMat4>>,
    pub animation: Option<Arc<dyn AnimationSource>>,
    /// For skeletons inside an instancing prototype, the visible prim whose
    /// world transform stands in for the skeleton's.
    pub instance_origin: Option<PrimKey>,
}

impl Skeleton {
    /// A skeleton whose bind and rest poses are all identity.
    #[must_use]
    pub fn new(prim: PrimKey, joints: Vec<String>) -> Self {
        let count = joints.len();
        Self {
            prim,
            joints,
            bind_transforms: vec![DMat4::IDENTITY; count],
            rest_transforms: Some(vec![DMat4::IDENTITY; count]),
            animation: None,
            instance_origin: None,
        }
    }

    #[must_use]
    pub fn with_bind_transforms(mut self, bind: Vec<DMat4>) -> Self {
        self.bind_transforms = bind;
        self
    }

    #[must_use]
    pub fn with_rest_transforms(mut self, rest: Option<Vec<DMat4>>) -> Self {
        self.rest_transforms = rest;
        self
    }

    #[must_use]
    pub fn with_animation(mut self, animation: Arc<dyn AnimationSource>) -> Self {
        self.animation = Some(animation);
        self
    }

    #[must_use]
    pub fn with_instance_origin(mut self, origin: PrimKey) -> Self {
        self.instance_origin = Some(origin);
        self
    }

    /// Blend shape channel order of the bound animation, if any.
    #[must_use]
    pub fn blend_shape_order(&self) -> &[String] {
        self.animation
            .as_deref()
            .map_or(&[][..], |anim| anim.blend_shape_order())
    }
}

/// Validated, derived view of a [`Skeleton`] used to compute transforms.
///
/// Holds only derived data; the skeleton itself is passed back in on every
/// call so the host stays the single owner.
#[derive(Debug, Clone)]
pub struct SkeletonQuery {
    prim: PrimKey,
    topology: Topology,
    anim_mapper: Option<AnimMapper>,
}

impl SkeletonQuery {
    pub fn new(skeleton: &Skeleton) -> Result<Self> {
        let topology = Topology::from_joint_paths(skeleton.joints.as_slice());
        topology.validate()?;

        if skeleton.bind_transforms.len() != skeleton.joints.len() {
            return Err(SkelBakeError::SizeMismatch {
                context: "bind transforms",
                expected: skeleton.joints.len(),
                actual: skeleton.bind_transforms.len(),
            });
        }

        let anim_mapper = skeleton
            .animation
            .as_deref()
            .map(|anim| AnimMapper::new(anim.joint_order(), skeleton.joints.as_slice()));

        Ok(Self {
            prim: skeleton.prim,
            topology,
            anim_mapper,
        })
    }

    #[inline]
    #[must_use]
    pub fn prim(&self) -> PrimKey {
        self.prim
    }

    #[inline]
    #[must_use]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// True when a bound animation drives at least one joint.
    #[must_use]
    pub fn has_mappable_animation(&self) -> bool {
        self.anim_mapper.as_ref().is_some_and(|m| !m.is_null())
    }

    /// Joint-local transforms at `time`: animation where mapped, rest pose
    /// elsewhere. Falls back to the rest pose entirely when the animation
    /// yields nothing at `time`.
    pub fn compute_joint_local_transforms(&self, skeleton: &Skeleton, time: TimeCode) -> Result<Vec<DMat4>> {
        let rest = skeleton
            .rest_transforms
            .as_deref()
            .filter(|rest| rest.len() == skeleton.joints.len());

        if let (Some(anim), Some(mapper)) = (skeleton.animation.as_deref(), &self.anim_mapper)
            && !mapper.is_null()
            && let Some(anim_xforms) = anim.joint_local_transforms_at(time)
        {
            return match rest {
                Some(rest) => mapper.remap_with_fallback(&anim_xforms, rest),
                None if !mapper.is_sparse() => mapper.remap(&anim_xforms, DMat4::IDENTITY),
                None => Err(SkelBakeError::MissingValue("rest transforms")),
            };
        }

        rest.map(<[DMat4]>::to_vec)
            .ok_or(SkelBakeError::MissingValue("rest transforms"))
    }

    /// Skinning transforms `skel_space * inverse(bind)` at `time`, in
    /// skeleton joint order.
    pub fn compute_skinning_transforms(&self, skeleton: &Skeleton, time: TimeCode) -> Result<Vec<DMat4>> {
        let local = self.compute_joint_local_transforms(skeleton, time)?;
        let skel_space = self.topology.concat_joint_transforms(&local)?;
        Ok(skel_space
            .iter()
            .zip(&skeleton.bind_transforms)
            .map(|(xform, bind)| *xform * bind.inverse())
            .collect())
    }
}
