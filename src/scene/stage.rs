use glam::DMat4;
use slotmap::{SlotMap, SparseSecondaryMap};

use crate::animation::Attribute;
use crate::config::PlaybackMetadata;
use crate::scene::host::{SceneHierarchy, SkelHost};
use crate::scene::prim::{Prim, PrimKind};
use crate::scene::transform::LocalTransform;
use crate::scene::PrimKey;
use crate::skel::{SkelBinding, Skeleton, SkinningTarget};
use crate::time::TimeCode;

/// In-memory scene: a prim hierarchy plus skeleton and skinning components.
///
/// Components are keyed by the prim they are attached to. Bindings are
/// stored already resolved, in the order they were added.
#[derive(Debug, Default)]
pub struct Stage {
    prims: SlotMap<PrimKey, Prim>,
    root_prims: Vec<PrimKey>,

    skeletons: SparseSecondaryMap<PrimKey, Skeleton>,
    targets: SparseSecondaryMap<PrimKey, SkinningTarget>,
    bindings: Vec<SkelBinding>,

    playback: Option<PlaybackMetadata>,
}

impl Stage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    /// Adds a prim under `parent`, or as a root when `parent` is `None`.
    pub fn define_prim(&mut self, parent: Option<PrimKey>, name: &str, kind: PrimKind) -> PrimKey {
        let key = self.prims.insert(Prim::new(name, kind));
        match parent {
            Some(parent_key) if self.prims.contains_key(parent_key) => {
                self.prims[parent_key].children.push(key);
                self.prims[key].parent = Some(parent_key);
            }
            Some(_) => {
                log::warn!("Parent of prim '{name}' does not exist, adding it as a root");
                self.root_prims.push(key);
            }
            None => self.root_prims.push(key),
        }
        key
    }

    #[inline]
    #[must_use]
    pub fn prim(&self, key: PrimKey) -> Option<&Prim> {
        self.prims.get(key)
    }

    #[inline]
    #[must_use]
    pub fn root_prims(&self) -> &[PrimKey] {
        &self.root_prims
    }

    /// Looks a prim up by its absolute path.
    #[must_use]
    pub fn find_prim(&self, path: &str) -> Option<PrimKey> {
        let mut candidates = self.root_prims.as_slice();
        let mut found = None;
        for name in path.split('/').filter(|s| !s.is_empty()) {
            let key = candidates
                .iter()
                .copied()
                .find(|&k| self.prims[k].name == name)?;
            candidates = &self.prims[key].children;
            found = Some(key);
        }
        found
    }

    pub fn set_transform(&mut self, prim: PrimKey, transform: Attribute<LocalTransform>) {
        if let Some(p) = self.prims.get_mut(prim) {
            p.transform = transform;
        }
    }

    pub fn set_resets_xform_stack(&mut self, prim: PrimKey, resets: bool) {
        if let Some(p) = self.prims.get_mut(prim) {
            p.resets_xform_stack = resets;
        }
    }

    /// Marks `prim` and its whole subtree as living under a prototype.
    pub fn mark_prototype(&mut self, prim: PrimKey) {
        let mut stack = vec![prim];
        while let Some(key) = stack.pop() {
            if let Some(p) = self.prims.get_mut(key) {
                p.in_prototype = true;
                stack.extend_from_slice(&p.children);
            }
        }
    }

    // ========================================================================
    // Components
    // ========================================================================

    pub fn add_skeleton(&mut self, skeleton: Skeleton) {
        self.skeletons.insert(skeleton.prim, skeleton);
    }

    pub fn add_skinning_target(&mut self, target: SkinningTarget) {
        self.targets.insert(target.prim, target);
    }

    pub fn add_binding(&mut self, binding: SkelBinding) {
        self.bindings.push(binding);
    }

    pub fn skinning_target_mut(&mut self, prim: PrimKey) -> Option<&mut SkinningTarget> {
        self.targets.get_mut(prim)
    }

    pub fn set_playback_metadata(&mut self, playback: Option<PlaybackMetadata>) {
        self.playback = playback;
    }
}

impl SceneHierarchy for Stage {
    fn parent(&self, prim: PrimKey) -> Option<PrimKey> {
        self.prims.get(prim)?.parent
    }

    fn prim_path(&self, prim: PrimKey) -> String {
        let mut names = Vec::new();
        let mut current = Some(prim);
        while let Some(key) = current {
            let Some(p) = self.prims.get(key) else {
                break;
            };
            names.push(p.name.as_str());
            current = p.parent;
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    fn kind(&self, prim: PrimKey) -> Option<PrimKind> {
        self.prims.get(prim).map(|p| p.kind)
    }

    fn local_transform(&self, prim: PrimKey, time: TimeCode) -> DMat4 {
        self.prims
            .get(prim)
            .and_then(|p| p.transform.get(time))
            .map_or(DMat4::IDENTITY, |t| t.to_mat4())
    }

    fn resets_xform_stack(&self, prim: PrimKey) -> bool {
        self.prims.get(prim).is_some_and(|p| p.resets_xform_stack)
    }

    fn local_transform_might_vary(&self, prim: PrimKey) -> bool {
        self.prims
            .get(prim)
            .is_some_and(|p| p.transform.value_might_be_time_varying())
    }

    fn local_transform_time_samples(&self, prim: PrimKey) -> Vec<f64> {
        self.prims
            .get(prim)
            .map(|p| p.transform.time_samples().to_vec())
            .unwrap_or_default()
    }

    fn is_in_prototype(&self, prim: PrimKey) -> bool {
        self.prims.get(prim).is_some_and(|p| p.in_prototype)
    }
}

impl SkelHost for Stage {
    fn skeleton(&self, prim: PrimKey) -> Option<&Skeleton> {
        self.skeletons.get(prim)
    }

    fn skinning_target(&self, prim: PrimKey) -> Option<&SkinningTarget> {
        self.targets.get(prim)
    }

    fn bindings(&self) -> &[SkelBinding] {
        &self.bindings
    }

    fn playback_metadata(&self) -> Option<PlaybackMetadata> {
        self.playback
    }
}
