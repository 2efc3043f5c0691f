//! End-to-end bake tests
//!
//! Tests for:
//! - Static scenes collapsing to a single default sample
//! - Animated point/normal skinning through a two-joint chain
//! - Blend shapes applied before skinning
//! - Rigid transform skinning, with and without xform-stack resets
//! - Skeletons inside instancing prototypes
//! - Target filtering, flag masking and failure fallback
//! - Config validation and serde

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use glam::{DMat4, DQuat, DVec3, Quat, Vec3};
use skel_bake::bake::SkinnedData;
use skel_bake::{
    Attribute, BakeConfig, BlendShape, DeformationFlags, Interval, JointInfluences, LocalTransform,
    NormalsInterpolation, PlaybackMetadata, PrimKey, PrimKind, SkelAnimation, SkelBakeError, SkelBaker,
    SkelBinding, Skeleton, SkinningTarget, Stage, TimeCode,
};

// ============================================================================
// Helper
// ============================================================================

const EPSILON: f32 = 1e-5;

fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    (a - b).abs().max_element() < EPSILON
}

fn points_approx(a: &[Vec3], b: &[Vec3]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| vec3_approx(*x, *y))
}

fn mat4_approx(a: DMat4, b: DMat4) -> bool {
    a.abs_diff_eq(b, 1e-6)
}

fn joints() -> Vec<String> {
    vec!["root".to_string(), "root/tip".to_string()]
}

fn rot_z() -> DMat4 {
    DMat4::from_quat(DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2))
}

/// Bind and rest both place the tip one unit up the root.
fn two_joint_skeleton(prim: PrimKey) -> Skeleton {
    let tip = DMat4::from_translation(DVec3::Y);
    Skeleton::new(prim, joints())
        .with_bind_transforms(vec![DMat4::IDENTITY, tip])
        .with_rest_transforms(Some(vec![DMat4::IDENTITY, tip]))
}

/// Rest pose at t=1, root turned 90 degrees about Z at t=2.
fn rotating_animation() -> SkelAnimation {
    SkelAnimation::new(joints())
        .with_translations(Attribute::uniform(vec![Vec3::ZERO, Vec3::Y]))
        .with_rotations(Attribute::from_samples([
            (1.0, vec![Quat::IDENTITY, Quat::IDENTITY]),
            (2.0, vec![Quat::from_rotation_z(FRAC_PI_2), Quat::IDENTITY]),
        ]))
}

struct Rig {
    stage: Stage,
    model: PrimKey,
    skel: PrimKey,
    mesh: PrimKey,
}

const REST_POINTS: [Vec3; 2] = [Vec3::X, Vec3::new(0.0, 2.0, 0.0)];

/// `/Model/Skel` driving `/Model/Mesh`: point 0 follows the root, point 1
/// the tip.
fn build_rig(animation: Option<SkelAnimation>) -> Rig {
    let mut stage = Stage::new();
    let model = stage.define_prim(None, "Model", PrimKind::Xform);
    let skel = stage.define_prim(Some(model), "Skel", PrimKind::Skeleton);
    let mesh = stage.define_prim(Some(model), "Mesh", PrimKind::PointBased);

    let mut skeleton = two_joint_skeleton(skel);
    if let Some(animation) = animation {
        skeleton = skeleton.with_animation(Arc::new(animation));
    }
    stage.add_skeleton(skeleton);
    stage.add_skinning_target(
        SkinningTarget::new(mesh)
            .with_points(Attribute::uniform(REST_POINTS.to_vec()))
            .with_normals(Attribute::uniform(vec![Vec3::X, Vec3::Y]), NormalsInterpolation::Vertex)
            .with_influences(JointInfluences::per_point(vec![0, 1], vec![1.0, 1.0], 1)),
    );
    stage.add_binding(SkelBinding::new(skel, vec![mesh]));

    Rig {
        stage,
        model,
        skel,
        mesh,
    }
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn bake(stage: &Stage, config: BakeConfig) -> skel_bake::BakeResult {
    init_logger();
    let mut baker = SkelBaker::new(stage, config).expect("valid config");
    baker.bake(stage)
}

// ============================================================================
// Static Scenes
// ============================================================================

#[test]
fn static_scene_collapses_to_default_sample() {
    let rig = build_rig(None);
    let result = bake(&rig.stage, BakeConfig::new(Interval::new(1.0, 10.0)));

    assert!(result.times.is_static());
    assert_eq!(result.times.times(), &[TimeCode::Default]);

    let target = result.target(rig.mesh).expect("mesh is baked");
    assert_eq!(target.path, "/Model/Mesh");
    assert_eq!(target.samples.len(), 1);
    let points = target.samples[0].points.as_ref().expect("points at default");
    assert!(points_approx(points, &REST_POINTS));
}

#[test]
fn constant_animation_is_static() {
    let animation = SkelAnimation::new(joints())
        .with_translations(Attribute::uniform(vec![Vec3::ZERO, Vec3::Y]))
        .with_rotations(Attribute::uniform(vec![Quat::from_rotation_z(FRAC_PI_2), Quat::IDENTITY]));
    let rig = build_rig(Some(animation));
    let result = bake(&rig.stage, BakeConfig::new(Interval::new(1.0, 10.0)));

    assert!(result.times.is_static());
    let points = result.targets[0].samples[0].points.as_ref().unwrap();
    assert!(points_approx(points, &[Vec3::Y, Vec3::new(-2.0, 0.0, 0.0)]));
}

#[test]
fn binding_without_skeleton_bakes_nothing() {
    let mut stage = Stage::new();
    let not_a_skeleton = stage.define_prim(None, "Empty", PrimKind::Xform);
    let mesh = stage.define_prim(None, "Mesh", PrimKind::PointBased);
    stage.add_skinning_target(
        SkinningTarget::new(mesh)
            .with_points(Attribute::uniform(vec![Vec3::X]))
            .with_influences(JointInfluences::per_point(vec![0], vec![1.0], 1)),
    );
    stage.add_binding(SkelBinding::new(not_a_skeleton, vec![mesh]));

    let mut baker = SkelBaker::new(&stage, BakeConfig::new(Interval::new(0.0, 1.0))).unwrap();
    assert!(baker.is_empty());
    assert!(baker.bake(&stage).targets.is_empty());
}

// ============================================================================
// Linear Blend Skinning
// ============================================================================

#[test]
fn two_joint_rotation_skins_points_and_normals() {
    let rig = build_rig(Some(rotating_animation()));
    let result = bake(&rig.stage, BakeConfig::new(Interval::new(1.0, 2.0)));

    assert_eq!(
        result.times.times(),
        &[TimeCode::Default, TimeCode::Numeric(1.0), TimeCode::Numeric(2.0)]
    );

    let target = result.target(rig.mesh).unwrap();
    assert_eq!(target.flags, DeformationFlags::POINTS_LBS | DeformationFlags::NORMALS_LBS);
    assert_eq!(target.samples.len(), 3);

    let rest = &target.samples[1];
    assert!(rest.keyed);
    assert!(points_approx(rest.points.as_ref().unwrap(), &REST_POINTS));

    let turned = &target.samples[2];
    assert!(points_approx(
        turned.points.as_ref().unwrap(),
        &[Vec3::Y, Vec3::new(-2.0, 0.0, 0.0)]
    ));
    assert!(points_approx(turned.normals.as_ref().unwrap(), &[Vec3::Y, Vec3::NEG_X]));

    let extent = turned.extent.expect("extent follows deformed points");
    assert!(vec3_approx(extent.min, Vec3::new(-2.0, 0.0, 0.0)));
    assert!(vec3_approx(extent.max, Vec3::new(0.0, 1.0, 0.0)));
    assert!(vec3_approx(extent.size(), Vec3::new(2.0, 1.0, 0.0)));
    assert!(vec3_approx(extent.center(), Vec3::new(-1.0, 0.5, 0.0)));

    let combined = target.combined_extent().unwrap();
    assert!(vec3_approx(combined.min, Vec3::new(-2.0, 0.0, 0.0)));
    assert!(vec3_approx(combined.max, Vec3::new(1.0, 2.0, 0.0)));
}

#[test]
fn animated_rotation_leaves_default_sample_at_rest() {
    let mut stage = Stage::new();
    let skel = stage.define_prim(None, "Skel", PrimKind::Skeleton);
    let mesh = stage.define_prim(None, "Mesh", PrimKind::PointBased);
    let joints = vec!["j0".to_string(), "j0/j1".to_string()];
    let animation = SkelAnimation::new(joints.clone()).with_rotations(Attribute::from_samples([
        (0.0, vec![Quat::IDENTITY; 2]),
        (5.0, vec![Quat::from_rotation_z(FRAC_PI_2), Quat::IDENTITY]),
    ]));
    stage.add_skeleton(Skeleton::new(skel, joints).with_animation(Arc::new(animation)));
    stage.add_skinning_target(
        SkinningTarget::new(mesh)
            .with_points(Attribute::uniform(vec![Vec3::X]))
            .with_influences(JointInfluences::per_point(vec![0], vec![1.0], 1)),
    );
    stage.add_binding(SkelBinding::new(skel, vec![mesh]));

    let result = bake(&stage, BakeConfig::new(Interval::new(0.0, 5.0)));
    assert_eq!(
        result.times.times(),
        &[TimeCode::Default, TimeCode::Numeric(0.0), TimeCode::Numeric(5.0)]
    );

    let samples = &result.target(mesh).unwrap().samples;
    assert!(points_approx(samples[0].points.as_ref().unwrap(), &[Vec3::X]));
    assert!(points_approx(samples[1].points.as_ref().unwrap(), &[Vec3::X]));
    assert!(points_approx(samples[2].points.as_ref().unwrap(), &[Vec3::Y]));
}

/// Adds `/<name>/Skel` turning its root about Z at every key of `keys`,
/// driving one point at X in `/<name>/Mesh`.
fn add_keyed_rig(stage: &mut Stage, name: &str, keys: &[(f64, f32)]) -> PrimKey {
    let model = stage.define_prim(None, name, PrimKind::Xform);
    let skel = stage.define_prim(Some(model), "Skel", PrimKind::Skeleton);
    let mesh = stage.define_prim(Some(model), "Mesh", PrimKind::PointBased);
    let animation = SkelAnimation::new(joints()).with_rotations(Attribute::from_samples(
        keys.iter()
            .map(|&(time, angle)| (time, vec![Quat::from_rotation_z(angle), Quat::IDENTITY])),
    ));
    stage.add_skeleton(Skeleton::new(skel, joints()).with_animation(Arc::new(animation)));
    stage.add_skinning_target(
        SkinningTarget::new(mesh)
            .with_points(Attribute::uniform(vec![Vec3::X]))
            .with_influences(JointInfluences::per_point(vec![0], vec![1.0], 1)),
    );
    stage.add_binding(SkelBinding::new(skel, vec![mesh]));
    mesh
}

#[test]
fn skeletons_are_posed_at_each_others_key_times() {
    let mut stage = Stage::new();
    let slow = add_keyed_rig(&mut stage, "Slow", &[(0.0, 0.0), (10.0, FRAC_PI_2)]);
    let fast = add_keyed_rig(&mut stage, "Fast", &[(0.0, 0.0), (5.0, FRAC_PI_2), (10.0, 0.0)]);

    let result = bake(&stage, BakeConfig::new(Interval::new(0.0, 10.0)));
    assert_eq!(
        result.times.times(),
        &[
            TimeCode::Default,
            TimeCode::Numeric(0.0),
            TimeCode::Numeric(5.0),
            TimeCode::Numeric(10.0)
        ]
    );

    // t=5 is keyed only by the fast rig, yet the slow rig is halfway there.
    let halfway = &result.target(slow).unwrap().samples[2];
    assert!(!halfway.keyed);
    let diagonal = Vec3::new(1.0, 1.0, 0.0).normalize();
    assert!(points_approx(halfway.points.as_ref().unwrap(), &[diagonal]));
    assert!(halfway.extent.is_some());

    let peak = &result.target(fast).unwrap().samples[2];
    assert!(peak.keyed);
    assert!(points_approx(peak.points.as_ref().unwrap(), &[Vec3::Y]));

    let slow_end = &result.target(slow).unwrap().samples[3];
    assert!(points_approx(slow_end.points.as_ref().unwrap(), &[Vec3::Y]));
    let fast_end = &result.target(fast).unwrap().samples[3];
    assert!(points_approx(fast_end.points.as_ref().unwrap(), &[Vec3::X]));
}

#[test]
fn apply_skinning_poses_unkeyed_skeleton_times() {
    let mut stage = Stage::new();
    let slow = add_keyed_rig(&mut stage, "Slow", &[(0.0, 0.0), (10.0, FRAC_PI_2)]);
    add_keyed_rig(&mut stage, "Fast", &[(0.0, 0.0), (5.0, FRAC_PI_2), (10.0, 0.0)]);

    let mut baker = SkelBaker::new(&stage, BakeConfig::new(Interval::new(0.0, 10.0))).unwrap();
    let points = baker
        .apply_skinning(&stage, slow, SkinnedData::Points, &[], 5.0)
        .unwrap();
    assert!(points_approx(&points, &[Vec3::new(1.0, 1.0, 0.0).normalize()]));
}

#[test]
fn baking_twice_gives_identical_results() {
    let rig = build_rig(Some(rotating_animation()));
    let config = BakeConfig::new(Interval::new(1.0, 2.0));

    let first = bake(&rig.stage, config.clone());
    let second = bake(&rig.stage, config);

    assert_eq!(first.times, second.times);
    assert_eq!(first.targets[0].samples, second.targets[0].samples);
}

#[test]
fn target_joint_order_is_remapped() {
    let mut rig = build_rig(Some(rotating_animation()));
    let target = rig.stage.skinning_target_mut(rig.mesh).unwrap();
    // Same influences expressed against a reversed joint order.
    target.joints = Some(vec!["root/tip".to_string(), "root".to_string()]);
    target.influences = Some(JointInfluences::per_point(vec![1, 0], vec![1.0, 1.0], 1));

    let result = bake(&rig.stage, BakeConfig::new(Interval::new(1.0, 2.0)));
    let points = result.targets[0].samples[2].points.as_ref().unwrap();
    assert!(points_approx(points, &[Vec3::Y, Vec3::new(-2.0, 0.0, 0.0)]));
}

#[test]
fn model_transform_cancels_in_skel_to_local() {
    let mut rig = build_rig(Some(rotating_animation()));
    rig.stage.set_transform(
        rig.model,
        Attribute::uniform(LocalTransform::from_translation(DVec3::new(5.0, 0.0, 0.0))),
    );

    let result = bake(&rig.stage, BakeConfig::new(Interval::new(1.0, 2.0)));
    let points = result.targets[0].samples[2].points.as_ref().unwrap();
    assert!(points_approx(points, &[Vec3::Y, Vec3::new(-2.0, 0.0, 0.0)]));
}

#[test]
fn flags_mask_deformation_paths() {
    let rig = build_rig(Some(rotating_animation()));
    let config = BakeConfig::new(Interval::new(1.0, 2.0)).with_deformation_flags(DeformationFlags::POINTS_LBS);
    let result = bake(&rig.stage, config);

    let target = &result.targets[0];
    assert_eq!(target.flags, DeformationFlags::POINTS_LBS);
    assert!(target.samples.iter().all(|s| s.normals.is_none()));
    assert!(target.samples[2].points.is_some());
}

#[test]
fn bad_joint_index_keeps_rest_points() {
    let mut rig = build_rig(Some(rotating_animation()));
    rig.stage.skinning_target_mut(rig.mesh).unwrap().influences =
        Some(JointInfluences::per_point(vec![0, 5], vec![1.0, 1.0], 1));

    let result = bake(&rig.stage, BakeConfig::new(Interval::new(1.0, 2.0)));
    let sample = &result.targets[0].samples[2];
    assert!(points_approx(sample.points.as_ref().unwrap(), &REST_POINTS));
    assert_eq!(sample.extent, None);
}

#[test]
fn target_path_filters_targets() {
    let mut rig = build_rig(Some(rotating_animation()));
    let other = rig.stage.define_prim(Some(rig.model), "Other", PrimKind::PointBased);
    rig.stage.add_skinning_target(
        SkinningTarget::new(other)
            .with_points(Attribute::uniform(vec![Vec3::X]))
            .with_influences(JointInfluences::per_point(vec![0], vec![1.0], 1)),
    );
    rig.stage.add_binding(SkelBinding::new(rig.skel, vec![other]));

    let unfiltered = SkelBaker::new(&rig.stage, BakeConfig::new(Interval::new(1.0, 2.0))).unwrap();
    assert_eq!(unfiltered.computations().len(), 2);
    // Both bindings share one skeleton cache.
    assert_eq!(unfiltered.skeleton_caches().count(), 1);

    let config = BakeConfig::new(Interval::new(1.0, 2.0)).with_target_path("/Model/Other");
    let filtered = SkelBaker::new(&rig.stage, config).unwrap();
    assert_eq!(filtered.computations().len(), 1);
    assert!(filtered.computation(other).is_some());
    assert!(filtered.computation(rig.mesh).is_none());
}

// ============================================================================
// Blend Shapes
// ============================================================================

fn blend_rig(animation: SkelAnimation, points: Vec<Vec3>, influences: Option<JointInfluences>, shape: BlendShape) -> Rig {
    blend_rig_with_normals(animation, points, None, influences, shape)
}

fn blend_rig_with_normals(
    animation: SkelAnimation,
    points: Vec<Vec3>,
    normals: Option<Vec<Vec3>>,
    influences: Option<JointInfluences>,
    shape: BlendShape,
) -> Rig {
    let mut stage = Stage::new();
    let model = stage.define_prim(None, "Model", PrimKind::Xform);
    let skel = stage.define_prim(Some(model), "Skel", PrimKind::Skeleton);
    let mesh = stage.define_prim(Some(model), "Mesh", PrimKind::PointBased);

    stage.add_skeleton(two_joint_skeleton(skel).with_animation(Arc::new(animation)));
    let mut target = SkinningTarget::new(mesh)
        .with_points(Attribute::uniform(points))
        .with_blend_shape("up", shape);
    if let Some(normals) = normals {
        target = target.with_normals(Attribute::uniform(normals), NormalsInterpolation::Vertex);
    }
    if let Some(influences) = influences {
        target = target.with_influences(influences);
    }
    stage.add_skinning_target(target);
    stage.add_binding(SkelBinding::new(skel, vec![mesh]));

    Rig {
        stage,
        model,
        skel,
        mesh,
    }
}

#[test]
fn full_weight_blend_shape_adds_offsets() {
    let animation = SkelAnimation::new(joints()).with_blend_shapes(vec!["up".to_string()], Attribute::uniform(vec![1.0]));
    let shape = BlendShape {
        offsets: vec![Vec3::Y, Vec3::Y],
        ..BlendShape::default()
    };
    let rig = blend_rig(animation, vec![Vec3::ZERO, Vec3::X], None, shape);

    let result = bake(&rig.stage, BakeConfig::new(Interval::new(0.0, 10.0)));
    let target = result.target(rig.mesh).unwrap();
    assert_eq!(target.flags, DeformationFlags::POINTS_BLEND_SHAPES);
    let points = target.samples[0].points.as_ref().unwrap();
    assert!(points_approx(points, &[Vec3::Y, Vec3::new(1.0, 1.0, 0.0)]));
}

#[test]
fn sparse_blend_shape_touches_indexed_points_only() {
    let animation = SkelAnimation::new(joints()).with_blend_shapes(vec!["up".to_string()], Attribute::uniform(vec![0.5]));
    let shape = BlendShape {
        offsets: vec![Vec3::Z],
        point_indices: Some(vec![1]),
        ..BlendShape::default()
    };
    let rig = blend_rig(animation, vec![Vec3::ZERO, Vec3::X], None, shape);

    let result = bake(&rig.stage, BakeConfig::new(Interval::new(0.0, 10.0)));
    let points = result.targets[0].samples[0].points.as_ref().unwrap();
    assert!(points_approx(points, &[Vec3::ZERO, Vec3::new(1.0, 0.0, 0.5)]));
}

#[test]
fn animated_blend_weight_follows_playback_frames() {
    let animation = SkelAnimation::new(joints()).with_blend_shapes(
        vec!["up".to_string()],
        Attribute::from_samples([(0.0, vec![0.0]), (10.0, vec![1.0])]),
    );
    let shape = BlendShape {
        offsets: vec![Vec3::Y],
        ..BlendShape::default()
    };
    let mut rig = blend_rig(animation, vec![Vec3::X], None, shape);
    rig.stage
        .set_playback_metadata(Some(PlaybackMetadata::new(0.0, 10.0, 24.0, 24.0)));

    let mut baker = SkelBaker::new(&rig.stage, BakeConfig::new(Interval::new(0.0, 10.0))).unwrap();
    // Default plus every frame from 0 to 10.
    assert_eq!(baker.times().len(), 12);
    assert_eq!(baker.sample_index_for_time(5.0), Some(6));
    assert_eq!(baker.sample_index_for_time(5.5), None);

    let result = baker.bake(&rig.stage);
    let samples = &result.targets[0].samples;
    // No default weight is authored, so the default sample keeps the rest points.
    assert!(points_approx(samples[0].points.as_ref().unwrap(), &[Vec3::X]));
    assert!(points_approx(samples[1].points.as_ref().unwrap(), &[Vec3::X]));
    assert!(points_approx(samples[6].points.as_ref().unwrap(), &[Vec3::new(1.0, 0.5, 0.0)]));
    assert!(points_approx(samples[11].points.as_ref().unwrap(), &[Vec3::new(1.0, 1.0, 0.0)]));

    let points = baker
        .apply_skinning(&rig.stage, rig.mesh, SkinnedData::Points, &[], 5.0)
        .unwrap();
    assert!(points_approx(&points, &[Vec3::new(1.0, 0.5, 0.0)]));
}

#[test]
fn blend_shapes_apply_before_skinning() {
    let animation = SkelAnimation::new(joints())
        .with_translations(Attribute::uniform(vec![Vec3::ZERO, Vec3::Y]))
        .with_rotations(Attribute::uniform(vec![Quat::from_rotation_z(FRAC_PI_2), Quat::IDENTITY]))
        .with_blend_shapes(vec!["up".to_string()], Attribute::uniform(vec![1.0]));
    let shape = BlendShape {
        offsets: vec![Vec3::Y],
        ..BlendShape::default()
    };
    let rig = blend_rig(
        animation,
        vec![Vec3::X],
        Some(JointInfluences::per_point(vec![0], vec![1.0], 1)),
        shape,
    );

    let result = bake(&rig.stage, BakeConfig::new(Interval::new(0.0, 1.0)));
    let target = &result.targets[0];
    assert!(target.flags.contains(DeformationFlags::POINTS_BLEND_SHAPES | DeformationFlags::POINTS_LBS));

    // (1,0,0) + (0,1,0) rotated by 90 degrees. Skinning first would give (0,2,0).
    let points = target.samples[0].points.as_ref().unwrap();
    assert!(points_approx(points, &[Vec3::new(-1.0, 1.0, 0.0)]));
}

#[test]
fn blend_shape_normal_offsets_are_renormalized() {
    let animation = SkelAnimation::new(joints()).with_blend_shapes(vec!["up".to_string()], Attribute::uniform(vec![0.5]));
    let shape = BlendShape {
        offsets: vec![Vec3::Y],
        normal_offsets: vec![Vec3::new(0.0, 2.0, 0.0)],
        ..BlendShape::default()
    };
    let rig = blend_rig_with_normals(animation, vec![Vec3::X], Some(vec![Vec3::X]), None, shape);

    let result = bake(&rig.stage, BakeConfig::new(Interval::new(0.0, 1.0)));
    let target = &result.targets[0];
    assert_eq!(
        target.flags,
        DeformationFlags::POINTS_BLEND_SHAPES | DeformationFlags::NORMALS_BLEND_SHAPES
    );

    // X + 0.5 * 2Y, back to unit length.
    let sample = &target.samples[0];
    assert!(points_approx(sample.points.as_ref().unwrap(), &[Vec3::new(1.0, 0.5, 0.0)]));
    let expected = Vec3::new(1.0, 1.0, 0.0).normalize();
    assert!(points_approx(sample.normals.as_ref().unwrap(), &[expected]));
}

#[test]
fn blend_shape_normals_apply_before_skinning() {
    let animation = SkelAnimation::new(joints())
        .with_translations(Attribute::uniform(vec![Vec3::ZERO, Vec3::Y]))
        .with_rotations(Attribute::uniform(vec![Quat::from_rotation_z(FRAC_PI_2), Quat::IDENTITY]))
        .with_blend_shapes(vec!["up".to_string()], Attribute::uniform(vec![1.0]));
    let shape = BlendShape {
        offsets: vec![Vec3::ZERO],
        normal_offsets: vec![Vec3::Y],
        ..BlendShape::default()
    };
    let rig = blend_rig_with_normals(
        animation,
        vec![Vec3::X],
        Some(vec![Vec3::X]),
        Some(JointInfluences::per_point(vec![0], vec![1.0], 1)),
        shape,
    );

    let result = bake(&rig.stage, BakeConfig::new(Interval::new(0.0, 1.0)));
    let target = &result.targets[0];
    assert!(target.flags.contains(DeformationFlags::NORMALS_BLEND_SHAPES | DeformationFlags::NORMALS_LBS));

    // normalize(X + Y) turned 90 degrees about Z.
    let normals = target.samples[0].normals.as_ref().unwrap();
    assert!(points_approx(normals, &[Vec3::new(-1.0, 1.0, 0.0).normalize()]));
}

// ============================================================================
// Rigid Transforms
// ============================================================================

fn rigid_rig(resets_xform_stack: bool) -> (Stage, PrimKey) {
    let mut rig = build_rig(Some(rotating_animation()));
    rig.stage.set_transform(
        rig.model,
        Attribute::uniform(LocalTransform::from_translation(DVec3::new(5.0, 0.0, 0.0))),
    );
    let prop = rig.stage.define_prim(Some(rig.model), "Prop", PrimKind::Xform);
    rig.stage.set_resets_xform_stack(prop, resets_xform_stack);
    rig.stage
        .add_skinning_target(SkinningTarget::new(prop).with_influences(JointInfluences::rigid(vec![1], vec![1.0])));
    rig.stage.add_binding(SkelBinding::new(rig.skel, vec![prop]));
    (rig.stage, prop)
}

#[test]
fn rigid_target_bakes_local_transform() {
    let (stage, prop) = rigid_rig(false);
    let mut baker = SkelBaker::new(&stage, BakeConfig::new(Interval::new(1.0, 2.0))).unwrap();
    let result = baker.bake(&stage);

    let target = result.target(prop).unwrap();
    assert_eq!(target.flags, DeformationFlags::XFORM_LBS);
    assert!(target.samples.iter().all(|s| s.points.is_none()));

    // Parent and skeleton share the model transform, leaving only the joint.
    let xform = target.samples[2].xform.unwrap();
    assert!(mat4_approx(xform, rot_z()));
    assert!(mat4_approx(target.samples[1].xform.unwrap(), DMat4::IDENTITY));

    let moved = baker
        .apply_skinning(&stage, prop, SkinnedData::Points, &[Vec3::X], 2.0)
        .unwrap();
    assert!(points_approx(&moved, &[Vec3::Y]));
    let normals = baker
        .apply_skinning(&stage, prop, SkinnedData::Normals, &[Vec3::Y], 2.0)
        .unwrap();
    assert!(points_approx(&normals, &[Vec3::NEG_X]));
}

#[test]
fn rigid_target_resetting_xform_stack_keeps_skeleton_transform() {
    let (stage, prop) = rigid_rig(true);
    let result = bake(&stage, BakeConfig::new(Interval::new(1.0, 2.0)));

    let xform = result.target(prop).unwrap().samples[2].xform.unwrap();
    let expected = DMat4::from_translation(DVec3::new(5.0, 0.0, 0.0)) * rot_z();
    assert!(mat4_approx(xform, expected));
}

// ============================================================================
// Instancing
// ============================================================================

/// A skeleton in a prototype posed through its rest pose, placed by an
/// instance at z=3, driving both a mesh and a rigid prop under the instance.
#[test]
fn prototype_skeleton_mixed_targets() {
    let mut stage = Stage::new();
    let proto = stage.define_prim(None, "Prototypes", PrimKind::Scope);
    let skel = stage.define_prim(Some(proto), "Skel", PrimKind::Skeleton);
    stage.mark_prototype(proto);

    let instance = stage.define_prim(None, "Instance", PrimKind::Xform);
    stage.set_transform(
        instance,
        Attribute::uniform(LocalTransform::from_translation(DVec3::new(0.0, 0.0, 3.0))),
    );
    let body = stage.define_prim(Some(instance), "Body", PrimKind::PointBased);
    let prop = stage.define_prim(Some(instance), "Prop", PrimKind::Xform);

    let rest_root = DMat4::from_quat(DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2));
    stage.add_skeleton(
        two_joint_skeleton(skel)
            .with_rest_transforms(Some(vec![rest_root, DMat4::from_translation(DVec3::Y)]))
            .with_instance_origin(instance),
    );
    stage.add_skinning_target(
        SkinningTarget::new(body)
            .with_points(Attribute::uniform(vec![Vec3::X]))
            .with_influences(JointInfluences::per_point(vec![0], vec![1.0], 1)),
    );
    stage.add_skinning_target(SkinningTarget::new(prop).with_influences(JointInfluences::rigid(vec![0], vec![1.0])));
    stage.add_binding(SkelBinding::new(skel, vec![body, prop]));

    let result = bake(&stage, BakeConfig::new(Interval::new(0.0, 1.0)));
    assert!(result.times.is_static());

    // Neither target picks up the instance offset twice.
    let points = result.target(body).unwrap().samples[0].points.as_ref().unwrap();
    assert!(points_approx(points, &[Vec3::Y]));
    let xform = result.target(prop).unwrap().samples[0].xform.unwrap();
    assert!(mat4_approx(xform, rot_z()));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn inverted_interval_is_rejected() {
    let rig = build_rig(None);
    let err = SkelBaker::new(&rig.stage, BakeConfig::new(Interval::new(5.0, 1.0))).unwrap_err();
    assert!(matches!(err, SkelBakeError::InvalidConfig(_)));
}

#[test]
fn config_deserializes_with_defaults() {
    let config: BakeConfig = serde_json::from_str(r#"{ "interval": { "min": 1.0, "max": 10.0 } }"#).unwrap();
    assert_eq!(config.interval, Interval::new(1.0, 10.0));
    assert_eq!(config.deformation_flags, DeformationFlags::all());
    assert!(config.update_extents);
    assert_eq!(config.target_path, None);

    let config = config.with_target_path("/Model/Mesh");
    let json = serde_json::to_string(&config).unwrap();
    let back: BakeConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}
