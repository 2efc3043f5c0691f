//! World transform cache.
//!
//! Composes world matrices by walking the prim hierarchy and memoizes
//! every matrix it computes for the current time. Changing the time drops
//! the memo. The cache is cheap to clone, so callers that evaluate several
//! times in parallel can hand one copy to each worker.

use std::fmt;

use glam::DMat4;
use rustc_hash::FxHashMap;

use crate::scene::PrimKey;
use crate::scene::host::{SceneHierarchy, world_transform_might_be_time_varying};
use crate::time::TimeCode;

/// World/parent transform queries at a settable time.
pub trait TransformCache {
    fn time(&self) -> TimeCode;
    fn set_time(&mut self, time: TimeCode);

    fn local_to_world(&mut self, prim: PrimKey) -> DMat4;

    /// World transform of the prim's parent, or identity when the prim
    /// resets the xform stack or has no parent.
    fn parent_to_world(&mut self, prim: PrimKey) -> DMat4;

    fn resets_xform_stack(&self, prim: PrimKey) -> bool;

    /// True when the prim's world transform might change over time.
    fn transform_might_be_time_varying(&self, prim: PrimKey) -> bool;
}

/// Memoizing [`TransformCache`] over a [`SceneHierarchy`].
#[derive(Clone)]
pub struct XformCache<'h> {
    scene: &'h dyn SceneHierarchy,
    time: TimeCode,
    world: FxHashMap<PrimKey, DMat4>,
}

impl<'h> XformCache<'h> {
    #[must_use]
    pub fn new(scene: &'h dyn SceneHierarchy, time: TimeCode) -> Self {
        Self {
            scene,
            time,
            world: FxHashMap::default(),
        }
    }

    /// Number of memoized world matrices.
    #[inline]
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.world.len()
    }
}

impl TransformCache for XformCache<'_> {
    #[inline]
    fn time(&self) -> TimeCode {
        self.time
    }

    fn set_time(&mut self, time: TimeCode) {
        if self.time != time {
            self.time = time;
            self.world.clear();
        }
    }

    fn local_to_world(&mut self, prim: PrimKey) -> DMat4 {
        if let Some(world) = self.world.get(&prim) {
            return *world;
        }
        let local = self.scene.local_transform(prim, self.time);
        let world = self.parent_to_world(prim) * local;
        self.world.insert(prim, world);
        world
    }

    fn parent_to_world(&mut self, prim: PrimKey) -> DMat4 {
        if self.resets_xform_stack(prim) {
            return DMat4::IDENTITY;
        }
        match self.scene.parent(prim) {
            Some(parent) => self.local_to_world(parent),
            None => DMat4::IDENTITY,
        }
    }

    #[inline]
    fn resets_xform_stack(&self, prim: PrimKey) -> bool {
        self.scene.resets_xform_stack(prim)
    }

    fn transform_might_be_time_varying(&self, prim: PrimKey) -> bool {
        world_transform_might_be_time_varying(self.scene, prim)
    }
}

impl fmt::Debug for XformCache<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XformCache")
            .field("time", &self.time)
            .field("cached", &self.world.len())
            .finish_non_exhaustive()
    }
}
