use nalgebra::{Matrix4, UnitQuaternion};

use crate::math::{Transform, compute_global_matrices, negate_quaternion};
use crate::scene::{ClipSpan, SceneSource};
use crate::settings::ImportSettings;

use super::types::{AnimationClip, AnimationFrame, Armature, BindFrame, BoneNodeMap};

/// Resolve the double cover of `rotation` against the previous frame.
///
/// The rotation is negated when its vector part points away from the
/// previous one and the raw distance exceeds `flip_ratio` times the distance
/// to the negated sample.
pub fn fix_quaternion_continuity(
    previous: &UnitQuaternion<f32>,
    rotation: &UnitQuaternion<f32>,
    flip_ratio: f32,
) -> UnitQuaternion<f32> {
    if previous.imag().dot(&rotation.imag()) >= 0.0 {
        return *rotation;
    }

    let distance = (previous.coords - rotation.coords).norm();
    let flipped_distance = (previous.coords + rotation.coords).norm();
    if distance > flip_ratio * flipped_distance {
        negate_quaternion(rotation)
    } else {
        *rotation
    }
}

/// Interval splitting `duration` into `steps` equal parts.
///
/// Rounded down until `floor(duration / interval) == steps`, so the stored
/// interval always accounts for every sampled frame.
fn uniform_frame_interval(duration: f64, steps: usize) -> f64 {
    let steps = steps as f64;
    let mut interval = duration / steps;
    while (duration / interval).floor() < steps {
        interval = interval.next_down();
    }
    interval
}

/// Sample a clip at uniform steps and rebuild each frame's globals.
///
/// Produces `clip_frame_count + 1` frames spanning the whole clip. A clip
/// with no positive duration yields a single frame at its start.
pub(super) fn rasterize_clip<S: SceneSource + ?Sized>(
    scene: &S,
    armature: &Armature,
    bone_nodes: &BoneNodeMap,
    bind_frame: &BindFrame,
    clip: &ClipSpan,
    settings: &ImportSettings,
) -> AnimationClip {
    let steps = settings.clip_frame_count;
    let (frame_interval, sample_count) = if clip.duration > 0.0 && steps > 0 {
        (uniform_frame_interval(clip.duration, steps), steps + 1)
    } else if clip.duration > 0.0 {
        log::warn!(
            "Clip frame count is zero, sampling only the start of '{}'",
            clip.name
        );
        (0.0, 1)
    } else {
        log::warn!(
            "Clip '{}' has no positive duration ({}), sampling its start only",
            clip.name,
            clip.duration
        );
        (0.0, 1)
    };

    let parents = armature.parent_indices();
    let mut previous: Vec<UnitQuaternion<f32>> = bind_frame
        .locals
        .iter()
        .map(|local| local.rotation)
        .collect();
    let mut flips = 0usize;
    let mut frames = Vec::with_capacity(sample_count);

    for step in 0..sample_count {
        let time = clip.start + step as f64 * frame_interval;

        let locals: Vec<Transform> = (0..armature.len())
            .map(|bone_index| {
                let mut local = match bone_nodes.node(bone_index) {
                    Some(node) => scene.local_transform(node, time),
                    None => bind_frame.locals[bone_index],
                };
                let fixed = fix_quaternion_continuity(
                    &previous[bone_index],
                    &local.rotation,
                    settings.quaternion_flip_ratio,
                );
                if fixed != local.rotation {
                    flips += 1;
                }
                local.rotation = fixed;
                previous[bone_index] = fixed;
                local
            })
            .collect();

        let local_matrices: Vec<Matrix4<f32>> = locals.iter().map(Transform::to_matrix).collect();
        let globals = compute_global_matrices(&local_matrices, &parents);
        frames.push(AnimationFrame { locals, globals });
    }

    log::debug!(
        "Clip '{}': {} frames every {:.4}s, {} rotation flips fixed",
        clip.name,
        frames.len(),
        frame_interval,
        flips
    );

    AnimationClip {
        name: clip.name.clone(),
        start: clip.start,
        duration: clip.duration,
        frame_interval,
        frames,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::bind_pose::resolve_bind_frame;
    use crate::convert::skeleton::build_armature;
    use crate::scene::{MeshSource, NodeRef, SceneDump, SceneJoint};
    use nalgebra::{Quaternion, Vector3};

    /// One joint whose rotation jumps to the opposite hemisphere halfway.
    struct FlippingJoint;

    impl SceneSource for FlippingJoint {
        fn skeleton_joints(&self) -> Vec<SceneJoint> {
            vec![SceneJoint {
                node: NodeRef(0),
                name: "Hips".to_string(),
            }]
        }

        fn parent_node(&self, _node: NodeRef) -> Option<NodeRef> {
            None
        }

        fn meshes(&self) -> &[MeshSource] {
            &[]
        }

        fn bind_pose(&self, _node: NodeRef) -> Option<Matrix4<f32>> {
            Some(Matrix4::identity())
        }

        fn global_transform(&self, node: NodeRef, time: f64) -> Matrix4<f32> {
            self.local_transform(node, time).to_matrix()
        }

        fn local_transform(&self, _node: NodeRef, time: f64) -> Transform {
            let angle = if time <= 0.5 {
                170.0f32.to_radians()
            } else {
                -170.0f32.to_radians()
            };
            Transform::new(
                UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angle),
                Vector3::new(1.0, 1.0, 1.0),
                Vector3::zeros(),
            )
        }

        fn animation_clips(&self) -> Vec<ClipSpan> {
            vec![ClipSpan {
                name: "Turn".to_string(),
                start: 0.0,
                duration: 1.0,
            }]
        }
    }

    fn rasterize_first_clip<S: SceneSource>(scene: &S, settings: &ImportSettings) -> AnimationClip {
        let (armature, nodes) =
            build_armature(scene, &scene.skeleton_joints()).expect("armature should build");
        let bind_frame = resolve_bind_frame(scene, &armature, &nodes);
        rasterize_clip(
            scene,
            &armature,
            &nodes,
            &bind_frame,
            &scene.animation_clips()[0],
            settings,
        )
    }

    fn two_bone_dump() -> SceneDump {
        SceneDump::from_json(serde_json::json!({
            "nodes": [
                {
                    "name": "Hips",
                    "joint": true,
                    "keys": [
                        {"time": 0.0, "translation": [0.0, 1.0, 0.0]},
                        {"time": 2.0, "translation": [0.0, 3.0, 0.0]}
                    ]
                },
                {"name": "Spine", "parent": 0, "joint": true, "rest": {"translation": [0.0, 0.5, 0.0]}}
            ],
            "clips": [
                {"name": "Walk", "start": 0.0, "duration": 2.0},
                {"name": "Idle", "start": 1.0, "duration": 0.0}
            ]
        }))
        .expect("scene should load")
    }

    #[test]
    fn given_opposite_hemisphere_sample_when_fixing_then_rotation_is_negated() {
        let previous = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 170.0f32.to_radians());
        let raw = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -170.0f32.to_radians());

        let fixed = fix_quaternion_continuity(&previous, &raw, 10.0);

        let raw_distance = (previous.coords - raw.coords).norm();
        let fixed_distance = (previous.coords - fixed.coords).norm();
        assert!(fixed_distance <= raw_distance);
        assert!((fixed.coords + raw.coords).norm() < 1e-6);
    }

    #[test]
    fn given_same_hemisphere_sample_when_fixing_then_rotation_is_kept() {
        let previous = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.3);
        let raw = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.4);

        let fixed = fix_quaternion_continuity(&previous, &raw, 10.0);

        assert_eq!(fixed, raw);
    }

    #[test]
    fn given_moderately_distant_opposite_sample_when_fixing_then_ratio_keeps_it() {
        let previous = UnitQuaternion::new_normalize(Quaternion::new(0.5, 0.5, 0.0, 0.0));
        let raw = UnitQuaternion::new_normalize(Quaternion::new(0.9, -0.1, 0.0, 0.0));

        let fixed = fix_quaternion_continuity(&previous, &raw, 10.0);

        assert_eq!(fixed, raw);
    }

    #[test]
    fn given_rotation_crossing_half_turn_when_rasterizing_then_frames_stay_on_one_hemisphere() {
        let clip = rasterize_first_clip(&FlippingJoint, &ImportSettings::default());

        assert_eq!(clip.frames.len(), 31);
        for pair in clip.frames.windows(2) {
            let a = pair[0].locals[0].rotation;
            let b = pair[1].locals[0].rotation;
            assert!((a.coords - b.coords).norm() < 0.2);
        }
        let last = clip.frames[30].locals[0].rotation;
        assert!(last.coords.z > 0.0);
    }

    #[test]
    fn given_clip_when_rasterizing_then_frames_are_uniform_and_cover_the_duration() {
        let scene = two_bone_dump();
        let settings = ImportSettings {
            clip_frame_count: 4,
            ..ImportSettings::default()
        };

        let clip = rasterize_first_clip(&scene, &settings);

        assert_eq!(clip.name, "Walk");
        assert_eq!(clip.frames.len(), 5);
        assert!((clip.frame_interval - 0.5).abs() < 1e-12);
        assert_eq!(
            clip.frames.len(),
            (clip.duration / clip.frame_interval).floor() as usize + 1
        );
        let last = &clip.frames[4];
        assert!((last.locals[0].translation.y - 3.0).abs() < 1e-5);
    }

    #[test]
    fn given_clip_when_rasterizing_then_globals_follow_the_armature() {
        let scene = two_bone_dump();
        let settings = ImportSettings {
            clip_frame_count: 2,
            ..ImportSettings::default()
        };

        let clip = rasterize_first_clip(&scene, &settings);

        for frame in &clip.frames {
            let expected = frame.globals[0] * frame.locals[1].to_matrix();
            assert!((frame.globals[1] - expected).norm() < 1e-5);
        }
        assert!((clip.frames[1].globals[1][(1, 3)] - 2.5).abs() < 1e-5);
    }

    #[test]
    fn given_non_dyadic_durations_when_computing_interval_then_frame_count_holds() {
        for millis in 1..=20_000u32 {
            let duration = f64::from(millis) / 1000.0;

            let interval = uniform_frame_interval(duration, 30);

            assert_eq!(
                (duration / interval).floor() as usize,
                30,
                "duration {}",
                duration
            );
            assert!(interval <= duration / 30.0);
        }
    }

    #[test]
    fn given_short_clip_when_rasterizing_then_frame_count_matches_interval() {
        let scene = SceneDump::from_json(serde_json::json!({
            "nodes": [{"name": "Hips", "joint": true}],
            "clips": [{"name": "Blink", "start": 0.0, "duration": 0.011}]
        }))
        .expect("scene should load");

        let clip = rasterize_first_clip(&scene, &ImportSettings::default());

        assert_eq!(clip.frames.len(), 31);
        assert_eq!(
            clip.frames.len(),
            (clip.duration / clip.frame_interval).floor() as usize + 1
        );
    }

    #[test]
    fn given_zero_frame_count_when_rasterizing_then_single_frame_is_sampled() {
        let scene = two_bone_dump();
        let settings = ImportSettings {
            clip_frame_count: 0,
            ..ImportSettings::default()
        };

        let clip = rasterize_first_clip(&scene, &settings);

        assert_eq!(clip.frames.len(), 1);
        assert_eq!(clip.frame_interval, 0.0);
    }

    #[test]
    fn given_zero_duration_clip_when_rasterizing_then_single_frame_is_sampled() {
        let scene = two_bone_dump();
        let (armature, nodes) =
            build_armature(&scene, &scene.skeleton_joints()).expect("armature should build");
        let bind_frame = resolve_bind_frame(&scene, &armature, &nodes);

        let clip = rasterize_clip(
            &scene,
            &armature,
            &nodes,
            &bind_frame,
            &scene.animation_clips()[1],
            &ImportSettings::default(),
        );

        assert_eq!(clip.frames.len(), 1);
        assert_eq!(clip.frame_interval, 0.0);
        assert!((clip.frames[0].locals[0].translation.y - 2.0).abs() < 1e-5);
    }

    #[test]
    fn given_shared_armature_when_rasterizing_on_threads_then_results_match() {
        let scene = two_bone_dump();
        let (armature, nodes) =
            build_armature(&scene, &scene.skeleton_joints()).expect("armature should build");
        let bind_frame = resolve_bind_frame(&scene, &armature, &nodes);
        let settings = ImportSettings::default();
        let spans = scene.animation_clips();
        let (scene_ref, armature_ref, nodes_ref, bind_ref, settings_ref) =
            (&scene, &armature, &nodes, &bind_frame, &settings);

        let threaded: Vec<AnimationClip> = std::thread::scope(|scope| {
            let handles: Vec<_> = spans
                .iter()
                .map(|span| {
                    scope.spawn(move || {
                        rasterize_clip(scene_ref, armature_ref, nodes_ref, bind_ref, span, settings_ref)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("rasterizer thread panicked"))
                .collect()
        });

        for (span, clip) in spans.iter().zip(&threaded) {
            let serial = rasterize_clip(&scene, &armature, &nodes, &bind_frame, span, &settings);
            assert_eq!(&serial, clip);
        }
    }
}
