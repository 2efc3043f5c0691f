//! Linear blend skinning kernels.
//!
//! All kernels take joint transforms already remapped into the target's
//! joint order and influences laid out `element_size` entries per point.
//! A joint index outside the transform set fails the whole call and leaves
//! the output untouched.

use glam::{DMat3, DMat4, DVec3, Vec3};

use crate::errors::{Result, SkelBakeError};

/// Rotation/scale part of `xform`, inverted and transposed, for carrying
/// normals through `xform`.
#[inline]
#[must_use]
pub fn normal_matrix(xform: &DMat4) -> DMat3 {
    DMat3::from_mat4(*xform).inverse().transpose()
}

fn check_layout(indices: &[i32], weights: &[f32], element_size: usize, count: usize) -> Result<()> {
    if indices.len() != weights.len() {
        return Err(SkelBakeError::SizeMismatch {
            context: "joint weights",
            expected: indices.len(),
            actual: weights.len(),
        });
    }
    if element_size == 0 || indices.len() != count * element_size {
        return Err(SkelBakeError::SizeMismatch {
            context: "joint influences",
            expected: count * element_size,
            actual: indices.len(),
        });
    }
    Ok(())
}

#[inline]
fn joint<'a, T>(xforms: &'a [T], index: i32) -> Result<&'a T> {
    usize::try_from(index)
        .ok()
        .and_then(|i| xforms.get(i))
        .ok_or(SkelBakeError::JointIndexOutOfRange {
            index,
            count: xforms.len(),
        })
}

/// Skins `points` in place: `p' = Σ w · J · (B · p)`.
pub fn skin_points_lbs(
    geom_bind: &DMat4,
    joint_xforms: &[DMat4],
    indices: &[i32],
    weights: &[f32],
    element_size: usize,
    points: &mut [Vec3],
) -> Result<()> {
    check_layout(indices, weights, element_size, points.len())?;

    let mut skinned = Vec::with_capacity(points.len());
    for (pi, point) in points.iter().enumerate() {
        let bind_point = geom_bind.transform_point3(point.as_dvec3());
        let mut result = DVec3::ZERO;
        for k in pi * element_size..(pi + 1) * element_size {
            let w = weights[k];
            if w != 0.0 {
                result += joint(joint_xforms, indices[k])?.transform_point3(bind_point) * f64::from(w);
            }
        }
        skinned.push(result.as_vec3());
    }

    points.copy_from_slice(&skinned);
    Ok(())
}

/// Skins `normals` in place with inverse-transpose joint matrices and
/// re-normalizes them.
pub fn skin_normals_lbs(
    geom_bind_normal: &DMat3,
    joint_normal_xforms: &[DMat3],
    indices: &[i32],
    weights: &[f32],
    element_size: usize,
    normals: &mut [Vec3],
) -> Result<()> {
    check_layout(indices, weights, element_size, normals.len())?;

    let mut skinned = Vec::with_capacity(normals.len());
    for (ni, normal) in normals.iter().enumerate() {
        let bind_normal = *geom_bind_normal * normal.as_dvec3();
        let mut result = DVec3::ZERO;
        for k in ni * element_size..(ni + 1) * element_size {
            let w = weights[k];
            if w != 0.0 {
                result += (*joint(joint_normal_xforms, indices[k])? * bind_normal) * f64::from(w);
            }
        }
        skinned.push(result.normalize_or_zero().as_vec3());
    }

    normals.copy_from_slice(&skinned);
    Ok(())
}

/// Skins a whole-prim transform with one set of influences.
///
/// A single full-weight influence composes exactly. Otherwise the bind
/// frame's origin and unit axes are skinned as points and the transform is
/// rebuilt from them.
pub fn skin_transform_lbs(
    geom_bind: &DMat4,
    joint_xforms: &[DMat4],
    indices: &[i32],
    weights: &[f32],
) -> Result<DMat4> {
    check_layout(indices, weights, indices.len().max(1), 1)?;

    if let ([index], [w]) = (indices, weights)
        && (*w - 1.0).abs() < f32::EPSILON
    {
        return Ok(*joint(joint_xforms, *index)? * *geom_bind);
    }

    let origin = geom_bind.w_axis.truncate();
    let frame = [
        origin,
        origin + geom_bind.x_axis.truncate(),
        origin + geom_bind.y_axis.truncate(),
        origin + geom_bind.z_axis.truncate(),
    ];

    let mut skinned = [DVec3::ZERO; 4];
    for (&index, &w) in indices.iter().zip(weights) {
        if w == 0.0 {
            continue;
        }
        let xform = joint(joint_xforms, index)?;
        for (out, p) in skinned.iter_mut().zip(frame) {
            *out += xform.transform_point3(p) * f64::from(w);
        }
    }

    let [o, x, y, z] = skinned;
    Ok(DMat4::from_cols(
        (x - o).extend(0.0),
        (y - o).extend(0.0),
        (z - o).extend(0.0),
        o.extend(1.0),
    ))
}
