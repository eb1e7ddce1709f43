mod animation;
mod bind_pose;
mod diagnostic;
mod geometry;
mod skeleton;
mod skinning;
mod types;

use crate::error::ImportResult;
use crate::logging::ResultExt;
use crate::scene::SceneSource;
use crate::settings::ImportSettings;

// Re-export public types for callers of this module.
pub use animation::fix_quaternion_continuity;
pub use diagnostic::{
    ClipReport, FailureReport, ImportReport, MeshReport, build_import_report, write_import_report,
};
pub use types::{
    AnimationClip, AnimationFrame, AnimationSet, Armature, BindFrame, BlendInfluences, Bone,
    BoneNodeMap, DEFAULT_TANGENT, DEFAULT_VERTEX_COLOR, ImportedAsset, MAX_BONE_INFLUENCES,
    SkinMesh, SkinVertex,
};

use animation::rasterize_clip;
use bind_pose::resolve_bind_frame;
use geometry::build_skin_mesh;
use skeleton::{assign_mirror_bones, build_armature, reorder_to_reference};

// ─── Public API ───────────────────────────────────────────────────────────────

/// Import the skeleton, skin meshes and clips of a scene.
///
/// Skeleton faults abort the import. A mesh that fails is logged, recorded
/// in [`ImportedAsset::failures`] and skipped; the other meshes and all
/// clips are still produced. With a `reference` armature, bones are
/// reordered to its joint order.
pub fn import_scene<S: SceneSource + ?Sized>(
    scene: &S,
    settings: &ImportSettings,
    reference: Option<&Armature>,
) -> ImportResult<ImportedAsset> {
    let joints = scene.skeleton_joints();
    let (armature, bone_nodes) =
        build_armature(scene, &joints).log_error(Some("Building armature"))?;
    let (mut armature, bone_nodes) = match reference {
        Some(reference) => reorder_to_reference(&armature, &bone_nodes, reference)
            .log_error(Some("Reordering armature"))?,
        None => (armature, bone_nodes),
    };
    if settings.assign_mirror_bones {
        assign_mirror_bones(&mut armature);
    }
    log::info!(
        "Armature built: {} bones, root '{}'",
        armature.len(),
        armature.root().map(|bone| bone.name.as_str()).unwrap_or_default()
    );

    let bind_frame = resolve_bind_frame(scene, &armature, &bone_nodes);

    let mut meshes = Vec::new();
    let mut failures = Vec::new();
    for mesh in scene.meshes() {
        let context = format!("Importing mesh '{}'", mesh.name);
        match build_skin_mesh(mesh, &armature, &bone_nodes, &bind_frame, settings)
            .log_error(Some(&context))
        {
            Ok(skin_mesh) => meshes.push(skin_mesh),
            Err(error) => failures.push(error),
        }
    }

    let mut clips = AnimationSet::new();
    for span in scene.animation_clips() {
        let clip = rasterize_clip(scene, &armature, &bone_nodes, &bind_frame, &span, settings);
        if clips.insert(clip.name.clone(), clip).is_some() {
            log::warn!("Duplicate clip '{}' replaces the earlier take", span.name);
        }
    }

    log::info!(
        "Import finished: {} meshes, {} failed, {} clips",
        meshes.len(),
        failures.len(),
        clips.len()
    );

    Ok(ImportedAsset {
        armature,
        bone_nodes,
        bind_frame,
        meshes,
        clips,
        failures,
    })
}
