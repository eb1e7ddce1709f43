use std::collections::{HashMap, HashSet};

use crate::error::{ImportError, ImportResult};
use crate::scene::{NodeRef, SceneJoint, SceneSource};

use super::types::{Armature, Bone, BoneNodeMap, MIRROR_NAME_PAIRS};

// ─── Armature construction ────────────────────────────────────────────────────

/// Build an armature from joints listed parents-first.
///
/// Each joint's parent is the nearest ancestor node that is itself a joint;
/// non-joint nodes in between (grouping nulls, offsets) are skipped. A parent
/// joint listed after its child breaks the ordering precondition and is
/// reported instead of silently turning the child into a root.
pub(super) fn build_armature<S: SceneSource + ?Sized>(
    scene: &S,
    joints: &[SceneJoint],
) -> ImportResult<(Armature, BoneNodeMap)> {
    let Some(first) = joints.first() else {
        return Err(ImportError::SkeletonIntegrity {
            bone: String::new(),
            reason: "scene has no skeleton joints".to_string(),
        });
    };

    let mut joint_positions = HashMap::<NodeRef, usize>::with_capacity(joints.len());
    let mut names = HashSet::<&str>::with_capacity(joints.len());
    for (position, joint) in joints.iter().enumerate() {
        if joint_positions.insert(joint.node, position).is_some() {
            return Err(ImportError::SkeletonIntegrity {
                bone: joint.name.clone(),
                reason: format!("node {} is listed twice", joint.node.0),
            });
        }
        if !names.insert(joint.name.as_str()) {
            return Err(ImportError::SkeletonIntegrity {
                bone: joint.name.clone(),
                reason: "bone name is not unique".to_string(),
            });
        }
    }

    let mut bones = Vec::<Bone>::with_capacity(joints.len());
    for (index, joint) in joints.iter().enumerate() {
        let parent_index = find_parent_joint(scene, joint, index, &joint_positions)?;

        if parent_index.is_none() && index > 0 {
            return Err(ImportError::SkeletonIntegrity {
                bone: joint.name.clone(),
                reason: format!("second root found; '{}' is already the root", first.name),
            });
        }

        bones.push(Bone {
            name: joint.name.clone(),
            parent_index,
            mirror_bone_index: None,
        });
    }

    let nodes = joints.iter().map(|joint| joint.node).collect();
    log::debug!(
        "Built armature with {} bones rooted at '{}'",
        bones.len(),
        first.name
    );

    Ok((Armature::from_ordered_bones(bones), BoneNodeMap::new(nodes)))
}

fn find_parent_joint<S: SceneSource + ?Sized>(
    scene: &S,
    joint: &SceneJoint,
    index: usize,
    joint_positions: &HashMap<NodeRef, usize>,
) -> ImportResult<Option<usize>> {
    let mut visited = HashSet::<NodeRef>::from([joint.node]);
    let mut current = scene.parent_node(joint.node);

    while let Some(node) = current {
        if !visited.insert(node) {
            return Err(ImportError::SkeletonIntegrity {
                bone: joint.name.clone(),
                reason: format!("parent chain cycles through node {}", node.0),
            });
        }

        if let Some(&position) = joint_positions.get(&node) {
            if position >= index {
                return Err(ImportError::SkeletonIntegrity {
                    bone: joint.name.clone(),
                    reason: format!(
                        "parent joint at position {} is listed after its child at position {}",
                        position, index
                    ),
                });
            }
            return Ok(Some(position));
        }

        current = scene.parent_node(node);
    }

    Ok(None)
}

// ─── Reference reordering ─────────────────────────────────────────────────────

/// Reorder a freshly built armature to follow a reference armature's bone
/// order, so clips from several takes index bones identically.
pub(super) fn reorder_to_reference(
    armature: &Armature,
    bone_nodes: &BoneNodeMap,
    reference: &Armature,
) -> ImportResult<(Armature, BoneNodeMap)> {
    for bone in armature.bones() {
        if reference.find_bone(&bone.name).is_none() {
            return Err(ImportError::ArmatureMismatch {
                bone: bone.name.clone(),
            });
        }
    }

    let mut built_to_reference = vec![0usize; armature.len()];
    let mut source_indices = Vec::<usize>::with_capacity(reference.len());
    for (reference_index, reference_bone) in reference.bones().iter().enumerate() {
        let Some(built_index) = armature.find_bone(&reference_bone.name) else {
            return Err(ImportError::ArmatureMismatch {
                bone: reference_bone.name.clone(),
            });
        };
        built_to_reference[built_index] = reference_index;
        source_indices.push(built_index);
    }

    let mut bones = Vec::<Bone>::with_capacity(reference.len());
    let mut nodes = Vec::<NodeRef>::with_capacity(reference.len());
    for (reference_index, built_index) in source_indices.into_iter().enumerate() {
        let built_bone = &armature.bones()[built_index];
        let parent_index = built_bone
            .parent_index
            .map(|parent| built_to_reference[parent]);

        if parent_index != reference.bones()[reference_index].parent_index {
            return Err(ImportError::ArmatureMismatch {
                bone: built_bone.name.clone(),
            });
        }

        let Some(node) = bone_nodes.node(built_index) else {
            return Err(ImportError::ArmatureMismatch {
                bone: built_bone.name.clone(),
            });
        };

        bones.push(Bone {
            name: built_bone.name.clone(),
            parent_index,
            mirror_bone_index: None,
        });
        nodes.push(node);
    }

    Ok((Armature::from_ordered_bones(bones), BoneNodeMap::new(nodes)))
}

// ─── Mirror bones ─────────────────────────────────────────────────────────────

/// Link bones whose names differ only by a left/right marker.
pub(super) fn assign_mirror_bones(armature: &mut Armature) {
    let mirrors: Vec<Option<usize>> = armature
        .bones()
        .iter()
        .enumerate()
        .map(|(index, bone)| {
            mirrored_name_candidates(&bone.name)
                .into_iter()
                .filter_map(|candidate| armature.find_bone(&candidate))
                .find(|&mirror| mirror != index)
        })
        .collect();

    let linked = mirrors.iter().flatten().count();
    for (bone, mirror) in armature.bones_mut().iter_mut().zip(mirrors) {
        bone.mirror_bone_index = mirror;
    }

    log::debug!("Linked {} mirrored bones", linked);
}

fn mirrored_name_candidates(name: &str) -> Vec<String> {
    MIRROR_NAME_PAIRS
        .iter()
        .flat_map(|(left, right)| {
            [
                name.contains(left).then(|| name.replace(left, right)),
                name.contains(right).then(|| name.replace(right, left)),
            ]
        })
        .flatten()
        .collect()
}
