use std::f32::consts::FRAC_PI_4;
use std::sync::Arc;

use glam::{DMat4, DVec3, Quat, Vec3};
use skel_bake::{
    Attribute, BakeConfig, BlendShape, Interval, JointInfluences, NormalsInterpolation, PlaybackMetadata, PrimKind,
    SkelAnimation, SkelBaker, SkelBinding, Skeleton, SkinningTarget, Stage,
};

/// Bakes a three-joint arm with a bulge blend shape and prints the result.
///
/// Pass a JSON `BakeConfig` path as the first argument to override the
/// default interval and flags.
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => BakeConfig::new(Interval::new(1.0, 24.0)),
    };

    let stage = build_arm();
    let mut baker = SkelBaker::new(&stage, config)?;
    println!(
        "{} targets, {} samples",
        baker.computations().len(),
        baker.times().len()
    );

    let result = baker.bake(&stage);
    for target in &result.targets {
        println!("{} ({:?})", target.path, target.flags);
        for sample in &target.samples {
            let marker = if sample.keyed { '*' } else { ' ' };
            match sample.extent {
                Some(extent) => println!("  {marker}{:>8}  extent {:?} .. {:?}", sample.time, extent.min, extent.max),
                None => println!("  {marker}{:>8}  (no new points)", sample.time),
            }
        }
        if let Some(extent) = target.combined_extent() {
            println!("  overall center {:?} size {:?}", extent.center(), extent.size());
        }
    }
    Ok(())
}

fn arm_joints() -> Vec<String> {
    ["shoulder", "shoulder/elbow", "shoulder/elbow/wrist"]
        .map(String::from)
        .to_vec()
}

fn build_arm() -> Stage {
    let mut stage = Stage::new();
    let root = stage.define_prim(None, "Arm", PrimKind::Xform);
    let skel = stage.define_prim(Some(root), "Skel", PrimKind::Skeleton);
    let mesh = stage.define_prim(Some(root), "Sleeve", PrimKind::PointBased);
    stage.set_playback_metadata(Some(PlaybackMetadata::new(1.0, 24.0, 24.0, 24.0)));

    let segment = DMat4::from_translation(DVec3::X);
    let bind = vec![
        DMat4::IDENTITY,
        segment,
        DMat4::from_translation(DVec3::new(2.0, 0.0, 0.0)),
    ];

    let bend = |angle: f32| vec![Quat::IDENTITY, Quat::from_rotation_z(angle), Quat::from_rotation_z(angle)];
    let animation = SkelAnimation::new(arm_joints())
        .with_translations(Attribute::uniform(vec![Vec3::ZERO, Vec3::X, Vec3::X]))
        .with_rotations(Attribute::from_samples([
            (1.0, bend(0.0)),
            (12.0, bend(FRAC_PI_4)),
            (24.0, bend(0.0)),
        ]))
        .with_blend_shapes(
            vec!["bulge".to_string()],
            Attribute::from_samples([(1.0, vec![0.0]), (12.0, vec![1.0]), (24.0, vec![0.0])]),
        );

    stage.add_skeleton(
        Skeleton::new(skel, arm_joints())
            .with_bind_transforms(bind)
            .with_rest_transforms(Some(vec![DMat4::IDENTITY, segment, segment]))
            .with_animation(Arc::new(animation)),
    );

    // Two rings of points along the arm, each weighted to its nearest joints.
    let points: Vec<Vec3> = (0..=6)
        .flat_map(|i| {
            let x = i as f32 * 0.5;
            [Vec3::new(x, 0.2, 0.0), Vec3::new(x, -0.2, 0.0)]
        })
        .collect();
    let normals: Vec<Vec3> = points.iter().map(|p| Vec3::new(0.0, p.y.signum(), 0.0)).collect();

    let mut indices = Vec::with_capacity(points.len() * 2);
    let mut weights = Vec::with_capacity(points.len() * 2);
    for p in &points {
        let joint = (p.x.floor() as i32).min(2);
        let t = p.x.fract();
        indices.extend([joint, (joint + 1).min(2)]);
        weights.extend([1.0 - t, t]);
    }

    let bulge = BlendShape {
        offsets: vec![Vec3::new(0.0, 0.1, 0.0), Vec3::new(0.0, -0.1, 0.0)],
        point_indices: Some(vec![6, 7]),
        ..BlendShape::default()
    };

    stage.add_skinning_target(
        SkinningTarget::new(mesh)
            .with_points(Attribute::uniform(points))
            .with_normals(Attribute::uniform(normals), NormalsInterpolation::Vertex)
            .with_influences(JointInfluences::per_point(indices, weights, 2))
            .with_blend_shape("bulge", bulge),
    );
    stage.add_binding(SkelBinding::new(skel, vec![mesh]));
    stage
}
