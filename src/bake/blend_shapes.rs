//! Blend shape weight resolution and offset application.
//!
//! Every blend shape is flattened into sub-shapes: its primary shape
//! (reached at weight 1) followed by its in-betweens. A channel weight
//! resolves to at most two weighted sub-shapes by interpolating between the
//! bracketing entries of the shape's weight table, where weight 0 is the
//! implicit null shape.

use glam::Vec3;
use smallvec::SmallVec;

use crate::errors::{Result, SkelBakeError};
use crate::skel::{BlendShape, BlendShapeBinding, InbetweenShape};

/// A sub-shape with the weight it contributes at the current sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedSubShape {
    pub blend_shape: usize,
    pub sub_shape: usize,
    pub weight: f32,
}

#[derive(Debug, Clone)]
struct ShapeTable {
    /// `(weight, sub-shape)`, sorted by weight; `None` is the null shape.
    entries: SmallVec<[(f32, Option<usize>); 4]>,
    has_inbetweens: bool,
}

/// Flattened sub-shape layout of a target's blend shapes.
#[derive(Debug, Clone)]
pub struct BlendShapeQuery {
    tables: Vec<ShapeTable>,
    /// Owning blend shape of each sub-shape.
    sub_shape_owner: Vec<usize>,
    /// In-between index of each sub-shape; `None` for primaries.
    sub_shape_inbetween: Vec<Option<usize>>,
}

impl BlendShapeQuery {
    #[must_use]
    pub fn new(bindings: &[BlendShapeBinding]) -> Self {
        let mut tables = Vec::with_capacity(bindings.len());
        let mut sub_shape_owner = Vec::new();
        let mut sub_shape_inbetween = Vec::new();

        for (shape_index, binding) in bindings.iter().enumerate() {
            let primary = sub_shape_owner.len();
            sub_shape_owner.push(shape_index);
            sub_shape_inbetween.push(None);

            let mut entries: SmallVec<[(f32, Option<usize>); 4]> =
                SmallVec::from_slice(&[(0.0, None), (1.0, Some(primary))]);

            for (ib_index, inbetween) in binding.shape.inbetweens.iter().enumerate() {
                let w = inbetween.weight;
                if !w.is_finite() || w == 0.0 || w == 1.0 || entries.iter().any(|e| e.0 == w) {
                    log::warn!(
                        "Ignoring in-between {ib_index} of blend shape '{}' with weight {w}",
                        binding.channel
                    );
                    continue;
                }
                entries.push((w, Some(sub_shape_owner.len())));
                sub_shape_owner.push(shape_index);
                sub_shape_inbetween.push(Some(ib_index));
            }

            entries.sort_by(|a, b| a.0.total_cmp(&b.0));
            let has_inbetweens = entries.len() > 2;
            tables.push(ShapeTable {
                entries,
                has_inbetweens,
            });
        }

        Self {
            tables,
            sub_shape_owner,
            sub_shape_inbetween,
        }
    }

    #[inline]
    #[must_use]
    pub fn num_blend_shapes(&self) -> usize {
        self.tables.len()
    }

    #[inline]
    #[must_use]
    pub fn num_sub_shapes(&self) -> usize {
        self.sub_shape_owner.len()
    }

    /// Point offsets of every sub-shape, in sub-shape order.
    #[must_use]
    pub fn sub_shape_point_offsets(&self, bindings: &[BlendShapeBinding]) -> Vec<Vec<Vec3>> {
        self.collect_sub_shapes(bindings, |shape| &shape.offsets, |ib| &ib.offsets)
    }

    /// Normal offsets of every sub-shape, in sub-shape order.
    #[must_use]
    pub fn sub_shape_normal_offsets(&self, bindings: &[BlendShapeBinding]) -> Vec<Vec<Vec3>> {
        self.collect_sub_shapes(bindings, |shape| &shape.normal_offsets, |ib| &ib.normal_offsets)
    }

    /// Sparse point indices of every blend shape; empty means dense.
    #[must_use]
    pub fn blend_shape_point_indices(&self, bindings: &[BlendShapeBinding]) -> Vec<Vec<u32>> {
        bindings
            .iter()
            .map(|b| b.shape.point_indices.clone().unwrap_or_default())
            .collect()
    }

    fn collect_sub_shapes(
        &self,
        bindings: &[BlendShapeBinding],
        primary: impl Fn(&BlendShape) -> &Vec<Vec3>,
        inbetween: impl Fn(&InbetweenShape) -> &Vec<Vec3>,
    ) -> Vec<Vec<Vec3>> {
        self.sub_shape_owner
            .iter()
            .zip(&self.sub_shape_inbetween)
            .map(|(&owner, ib)| {
                let shape = &bindings[owner].shape;
                match ib {
                    Some(i) => inbetween(&shape.inbetweens[*i]).clone(),
                    None => primary(shape).clone(),
                }
            })
            .collect()
    }

    /// Resolves one weight per blend shape into weighted sub-shapes.
    ///
    /// Weights outside the table extrapolate along the first or last
    /// segment. Zero contributions are dropped.
    pub fn resolve_sub_shape_weights(&self, weights: &[f32]) -> Result<Vec<ResolvedSubShape>> {
        if weights.len() != self.tables.len() {
            return Err(SkelBakeError::SizeMismatch {
                context: "blend shape weights",
                expected: self.tables.len(),
                actual: weights.len(),
            });
        }

        let mut resolved = Vec::with_capacity(weights.len());
        for (shape, (table, &w)) in self.tables.iter().zip(weights).enumerate() {
            if !table.has_inbetweens {
                if let Some((_, Some(sub))) = table.entries.last() {
                    resolved.push(ResolvedSubShape {
                        blend_shape: shape,
                        sub_shape: *sub,
                        weight: w,
                    });
                }
                continue;
            }

            let entries = &table.entries;
            let upper = entries.partition_point(|e| e.0 <= w).clamp(1, entries.len() - 1);
            let (w0, lo) = entries[upper - 1];
            let (w1, hi) = entries[upper];
            let alpha = (w - w0) / (w1 - w0);

            for (sub, weight) in [(lo, 1.0 - alpha), (hi, alpha)] {
                if let Some(sub) = sub
                    && weight != 0.0
                {
                    resolved.push(ResolvedSubShape {
                        blend_shape: shape,
                        sub_shape: sub,
                        weight,
                    });
                }
            }
        }
        Ok(resolved)
    }
}

/// Adds weighted sub-shape offsets to `points`.
///
/// Offsets of a blend shape without point indices must cover every point.
/// On failure `points` is left untouched.
pub fn apply_blend_shape_offsets(
    resolved: &[ResolvedSubShape],
    point_indices: &[Vec<u32>],
    sub_shape_offsets: &[Vec<Vec3>],
    points: &mut [Vec3],
) -> Result<()> {
    let mut deformed = points.to_vec();
    for sub in resolved {
        if sub.weight.abs() < f32::EPSILON {
            continue;
        }
        let Some(offsets) = sub_shape_offsets.get(sub.sub_shape).filter(|o| !o.is_empty()) else {
            continue;
        };
        let indices = point_indices.get(sub.blend_shape).map_or(&[][..], Vec::as_slice);

        if indices.is_empty() {
            if offsets.len() != deformed.len() {
                return Err(SkelBakeError::SizeMismatch {
                    context: "dense blend shape offsets",
                    expected: deformed.len(),
                    actual: offsets.len(),
                });
            }
            for (p, offset) in deformed.iter_mut().zip(offsets) {
                *p += *offset * sub.weight;
            }
        } else {
            if offsets.len() != indices.len() {
                return Err(SkelBakeError::SizeMismatch {
                    context: "sparse blend shape offsets",
                    expected: indices.len(),
                    actual: offsets.len(),
                });
            }
            for (&index, offset) in indices.iter().zip(offsets) {
                let count = deformed.len();
                let p = deformed
                    .get_mut(index as usize)
                    .ok_or(SkelBakeError::PointIndexOutOfRange { index, count })?;
                *p += *offset * sub.weight;
            }
        }
    }
    points.copy_from_slice(&deformed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(inbetweens: Vec<InbetweenShape>) -> BlendShapeBinding {
        BlendShapeBinding {
            channel: "smile".to_string(),
            shape: BlendShape {
                offsets: vec![Vec3::Y],
                inbetweens,
                ..BlendShape::default()
            },
        }
    }

    #[test]
    fn primary_only_passes_weight_through() {
        let query = BlendShapeQuery::new(&[binding(Vec::new())]);
        let resolved = query.resolve_sub_shape_weights(&[0.25]).unwrap();
        assert_eq!(
            resolved,
            vec![ResolvedSubShape {
                blend_shape: 0,
                sub_shape: 0,
                weight: 0.25
            }]
        );
    }

    #[test]
    fn inbetween_splits_weight() {
        let ib = InbetweenShape {
            weight: 0.5,
            offsets: vec![Vec3::X],
            normal_offsets: Vec::new(),
        };
        let query = BlendShapeQuery::new(&[binding(vec![ib])]);
        assert_eq!(query.num_sub_shapes(), 2);

        // 0.75 lies halfway between the in-between (0.5) and the primary (1.0)
        let resolved = query.resolve_sub_shape_weights(&[0.75]).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].sub_shape, 1);
        assert!((resolved[0].weight - 0.5).abs() < 1e-6);
        assert_eq!(resolved[1].sub_shape, 0);
        assert!((resolved[1].weight - 0.5).abs() < 1e-6);

        // below the in-between only it contributes, scaled from the null shape
        let resolved = query.resolve_sub_shape_weights(&[0.25]).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].sub_shape, 1);
        assert!((resolved[0].weight - 0.5).abs() < 1e-6);
    }

    #[test]
    fn sparse_index_out_of_range_fails() {
        let resolved = [ResolvedSubShape {
            blend_shape: 0,
            sub_shape: 0,
            weight: 1.0,
        }];
        let mut points = vec![Vec3::ZERO; 2];
        let result = apply_blend_shape_offsets(&resolved, &[vec![5]], &[vec![Vec3::X]], &mut points);
        assert!(matches!(result, Err(SkelBakeError::PointIndexOutOfRange { index: 5, count: 2 })));
        assert_eq!(points, vec![Vec3::ZERO; 2]);
    }
}
