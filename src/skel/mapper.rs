use rustc_hash::FxHashMap;

use crate::errors::{Result, SkelBakeError};

/// Remaps arrays from a source name order onto a target name order.
///
/// Used both for animation joints onto skeleton joints and for skeleton
/// joints or blend shape channels onto a target's own order. Target names
/// absent from the source are left unmapped and filled by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimMapper {
    source_len: usize,
    /// For each target slot, the source index it reads from.
    index_map: Vec<Option<usize>>,
    identity: bool,
}

impl AnimMapper {
    #[must_use]
    pub fn new<S: AsRef<str>, T: AsRef<str>>(source: &[S], target: &[T]) -> Self {
        let identity = source.len() == target.len()
            && source.iter().zip(target).all(|(s, t)| s.as_ref() == t.as_ref());

        let index_map = if identity {
            (0..target.len()).map(Some).collect()
        } else {
            let lookup: FxHashMap<&str, usize> = source
                .iter()
                .enumerate()
                .map(|(i, name)| (name.as_ref(), i))
                .collect();
            target
                .iter()
                .map(|name| lookup.get(name.as_ref()).copied())
                .collect()
        };

        Self {
            source_len: source.len(),
            index_map,
            identity,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// True when no target slot maps to any source element.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.index_map.iter().all(Option::is_none)
    }

    /// True when some target slots have no source element.
    #[must_use]
    pub fn is_sparse(&self) -> bool {
        self.index_map.iter().any(Option::is_none)
    }

    /// Remaps `source`, filling unmapped slots with `fill`.
    pub fn remap<T: Clone>(&self, source: &[T], fill: T) -> Result<Vec<T>> {
        self.check_source(source)?;
        if self.identity {
            return Ok(source.to_vec());
        }
        Ok(self
            .index_map
            .iter()
            .map(|slot| slot.map_or_else(|| fill.clone(), |i| source[i].clone()))
            .collect())
    }

    /// Remaps `source`, filling each unmapped slot from the same slot of
    /// `fallback`, which must already be in target order.
    pub fn remap_with_fallback<T: Clone>(&self, source: &[T], fallback: &[T]) -> Result<Vec<T>> {
        self.check_source(source)?;
        if fallback.len() != self.index_map.len() {
            return Err(SkelBakeError::SizeMismatch {
                context: "remap fallback",
                expected: self.index_map.len(),
                actual: fallback.len(),
            });
        }
        Ok(self
            .index_map
            .iter()
            .zip(fallback)
            .map(|(slot, fb)| slot.map_or_else(|| fb.clone(), |i| source[i].clone()))
            .collect())
    }

    fn check_source<T>(&self, source: &[T]) -> Result<()> {
        if source.len() == self.source_len {
            Ok(())
        } else {
            Err(SkelBakeError::SizeMismatch {
                context: "remap source",
                expected: self.source_len,
                actual: source.len(),
            })
        }
    }
}
