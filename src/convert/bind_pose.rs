use nalgebra::Matrix4;

use crate::math::{Transform, relative_matrix};
use crate::scene::SceneSource;

use super::types::{Armature, BindFrame, BoneNodeMap};

/// Resolve the bind pose of every bone.
///
/// A recorded bind pose wins; otherwise the node's global transform at time
/// zero is used. Locals are then derived from the globals through the
/// armature, so forward kinematics over them reproduces the globals.
pub(super) fn resolve_bind_frame<S: SceneSource + ?Sized>(
    scene: &S,
    armature: &Armature,
    bone_nodes: &BoneNodeMap,
) -> BindFrame {
    let mut fallback_count = 0usize;
    let globals: Vec<Matrix4<f32>> = armature
        .bones()
        .iter()
        .enumerate()
        .map(|(index, bone)| {
            let Some(node) = bone_nodes.node(index) else {
                fallback_count += 1;
                return Matrix4::identity();
            };
            match scene.bind_pose(node) {
                Some(matrix) => matrix,
                None => {
                    log::debug!(
                        "No bind pose recorded for '{}', using its time-zero transform",
                        bone.name
                    );
                    fallback_count += 1;
                    scene.global_transform(node, 0.0)
                }
            }
        })
        .collect();

    if fallback_count > 0 {
        log::warn!(
            "{} of {} bones have no bind pose and fall back to time zero",
            fallback_count,
            armature.len()
        );
    }

    let locals = derive_local_transforms(armature, &globals);
    BindFrame { locals, globals }
}

/// Parent-relative transforms from global matrices; the root keeps its global.
pub(super) fn derive_local_transforms(
    armature: &Armature,
    globals: &[Matrix4<f32>],
) -> Vec<Transform> {
    armature
        .bones()
        .iter()
        .zip(globals)
        .map(|(bone, global)| {
            let Some(parent_index) = bone.parent_index else {
                return Transform::from_matrix(global);
            };
            match relative_matrix(&globals[parent_index], global) {
                Some(local) => Transform::from_matrix(&local),
                None => {
                    log::warn!(
                        "Parent of '{}' has a singular bind matrix; keeping the global transform",
                        bone.name
                    );
                    Transform::from_matrix(global)
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::skeleton::build_armature;
    use crate::math::compute_global_matrices;
    use crate::scene::SceneDump;

    fn max_component_delta(a: &Matrix4<f32>, b: &Matrix4<f32>) -> f32 {
        (a - b).iter().fold(0.0f32, |acc, value| acc.max(value.abs()))
    }

    fn column_major(transform: &Transform) -> Vec<f32> {
        transform.to_matrix().as_slice().to_vec()
    }

    #[test]
    fn given_recorded_bind_pose_when_resolving_then_record_is_preferred() {
        let bind = Transform::new(
            nalgebra::UnitQuaternion::identity(),
            nalgebra::Vector3::new(1.0, 1.0, 1.0),
            nalgebra::Vector3::new(0.0, 5.0, 0.0),
        );
        let scene = SceneDump::from_json(serde_json::json!({
            "nodes": [{
                "name": "Hips",
                "joint": true,
                "bind_pose": column_major(&bind),
                "rest": {"translation": [0.0, 1.0, 0.0]}
            }]
        }))
        .expect("scene should load");
        let (armature, nodes) =
            build_armature(&scene, &scene.skeleton_joints()).expect("armature should build");

        let frame = resolve_bind_frame(&scene, &armature, &nodes);

        assert!((frame.globals[0][(1, 3)] - 5.0).abs() < 1e-6);
        assert!((frame.locals[0].translation.y - 5.0).abs() < 1e-6);
    }

    #[test]
    fn given_missing_bind_pose_when_resolving_then_time_zero_transform_is_used() {
        let scene = SceneDump::from_json(serde_json::json!({
            "nodes": [
                {"name": "Hips", "joint": true, "rest": {"translation": [0.0, 1.0, 0.0]}},
                {
                    "name": "Spine",
                    "parent": 0,
                    "joint": true,
                    "keys": [
                        {"time": 0.0, "translation": [0.0, 0.25, 0.0]},
                        {"time": 1.0, "translation": [0.0, 9.0, 0.0]}
                    ]
                }
            ]
        }))
        .expect("scene should load");
        let (armature, nodes) =
            build_armature(&scene, &scene.skeleton_joints()).expect("armature should build");

        let frame = resolve_bind_frame(&scene, &armature, &nodes);

        assert!((frame.globals[1][(1, 3)] - 1.25).abs() < 1e-6);
        assert!((frame.locals[1].translation.y - 0.25).abs() < 1e-6);
    }

    #[test]
    fn given_bind_frame_when_running_forward_kinematics_then_globals_are_reproduced() {
        let root = Transform::new(
            nalgebra::UnitQuaternion::from_euler_angles(0.2, 0.0, 0.1),
            nalgebra::Vector3::new(1.0, 1.0, 1.0),
            nalgebra::Vector3::new(0.0, 1.0, 0.0),
        );
        let spine = Transform::new(
            nalgebra::UnitQuaternion::from_euler_angles(0.0, 0.4, -0.3),
            nalgebra::Vector3::new(1.0, 1.0, 1.0),
            nalgebra::Vector3::new(0.1, 1.2, 0.3),
        );
        let arm = Transform::new(
            nalgebra::UnitQuaternion::from_euler_angles(-0.5, 0.2, 0.7),
            nalgebra::Vector3::new(1.0, 1.0, 1.0),
            nalgebra::Vector3::new(0.8, 1.9, -0.2),
        );
        let scene = SceneDump::from_json(serde_json::json!({
            "nodes": [
                {"name": "Hips", "joint": true, "bind_pose": column_major(&root)},
                {"name": "Spine", "parent": 0, "joint": true, "bind_pose": column_major(&spine)},
                {"name": "LeftArm", "parent": 1, "joint": true, "bind_pose": column_major(&arm)}
            ]
        }))
        .expect("scene should load");
        let (armature, nodes) =
            build_armature(&scene, &scene.skeleton_joints()).expect("armature should build");

        let frame = resolve_bind_frame(&scene, &armature, &nodes);
        let locals: Vec<Matrix4<f32>> = frame.locals.iter().map(Transform::to_matrix).collect();
        let rebuilt = compute_global_matrices(&locals, &armature.parent_indices());

        for (expected, actual) in frame.globals.iter().zip(&rebuilt) {
            assert!(max_component_delta(expected, actual) < 1e-5);
        }
    }

    #[test]
    fn given_singular_parent_when_deriving_locals_then_global_is_kept() {
        let scene = SceneDump::from_json(serde_json::json!({
            "nodes": [
                {"name": "Hips", "joint": true},
                {"name": "Spine", "parent": 0, "joint": true}
            ]
        }))
        .expect("scene should load");
        let (armature, _) =
            build_armature(&scene, &scene.skeleton_joints()).expect("armature should build");
        let globals = vec![
            Matrix4::zeros(),
            nalgebra::Translation3::new(0.0, 2.0, 0.0).to_homogeneous(),
        ];

        let locals = derive_local_transforms(&armature, &globals);

        assert!((locals[1].translation.y - 2.0).abs() < 1e-6);
    }
}
