use std::cmp::Ordering;

use crate::error::{ImportError, ImportResult};
use crate::scene::MeshSource;
use crate::settings::ImportSettings;

use super::types::{BlendInfluences, BoneNodeMap, MAX_BONE_INFLUENCES};

/// Raw (bone index, weight) contribution gathered from a skin cluster.
pub(super) type RawInfluence = (u16, f32);

// ─── Cluster gathering ────────────────────────────────────────────────────────

/// Build bounded, normalized influences for every control point of a mesh.
///
/// A mesh without a skin deformer binds every control point to the root.
pub(super) fn assemble_skin_weights(
    mesh: &MeshSource,
    bone_nodes: &BoneNodeMap,
    settings: &ImportSettings,
) -> ImportResult<Vec<BlendInfluences>> {
    let raw = gather_raw_influences(mesh, bone_nodes)?;

    raw.iter()
        .enumerate()
        .map(|(control_point, influences)| {
            debug_assert!(
                influences.len() <= settings.max_raw_influences,
                "control point {} of '{}' has {} raw influences",
                control_point,
                mesh.name,
                influences.len()
            );
            normalize_influences(influences, settings).map_err(|(retained, total)| {
                ImportError::DegenerateSkinWeights {
                    mesh: mesh.name.clone(),
                    control_point,
                    retained,
                    total,
                }
            })
        })
        .collect()
}

/// Collect every cluster's contributions per control point.
pub(super) fn gather_raw_influences(
    mesh: &MeshSource,
    bone_nodes: &BoneNodeMap,
) -> ImportResult<Vec<Vec<RawInfluence>>> {
    let control_point_count = mesh.control_points.len();
    let mut raw = vec![Vec::<RawInfluence>::new(); control_point_count];

    let deformer = match mesh.skins.as_slice() {
        [] => return Ok(raw),
        [deformer] => deformer,
        deformers => {
            return Err(ImportError::UnsupportedSkinTopology {
                mesh: mesh.name.clone(),
                deformer_count: deformers.len(),
            });
        }
    };

    for (cluster_index, cluster) in deformer.clusters.iter().enumerate() {
        let Some(bone_index) = bone_nodes.bone_index(cluster.bone) else {
            log::warn!(
                "Skipping cluster {} of '{}': node {} is not a bone of the armature",
                cluster_index,
                mesh.name,
                cluster.bone.0
            );
            continue;
        };
        let bone_index = u16::try_from(bone_index).map_err(|_| {
            ImportError::malformed(
                &mesh.name,
                format!("bone index {} does not fit a blend index", bone_index),
            )
        })?;

        if cluster.control_point_indices.len() != cluster.weights.len() {
            return Err(ImportError::malformed(
                &mesh.name,
                format!(
                    "cluster {} has {} control point indices but {} weights",
                    cluster_index,
                    cluster.control_point_indices.len(),
                    cluster.weights.len()
                ),
            ));
        }

        for (&control_point, &weight) in cluster.control_point_indices.iter().zip(&cluster.weights)
        {
            let Some(slot) = raw.get_mut(control_point as usize) else {
                return Err(ImportError::malformed(
                    &mesh.name,
                    format!(
                        "cluster {} references control point {} (control point count: {})",
                        cluster_index, control_point, control_point_count
                    ),
                ));
            };
            if !weight.is_finite() {
                return Err(ImportError::malformed(
                    &mesh.name,
                    format!(
                        "cluster {} has non-finite weight {} on control point {}",
                        cluster_index, weight, control_point
                    ),
                ));
            }
            slot.push((bone_index, weight));
        }
    }

    Ok(raw)
}

// ─── Per-vertex normalization ─────────────────────────────────────────────────

/// Reduce raw contributions to at most four normalized influences.
///
/// - No contribution, or no positive mass: fully bound to bone 0.
/// - Up to four: kept in order, rescaled only when the sum is off by more
///   than `weight_sum_tolerance`.
/// - More than four: the four heaviest are kept and renormalized. When they
///   carry no more than `min_retained_weight_mass` of the total, the
///   `(retained, total)` masses are returned as the error.
pub(super) fn normalize_influences(
    raw: &[RawInfluence],
    settings: &ImportSettings,
) -> Result<BlendInfluences, (f32, f32)> {
    let total: f32 = raw.iter().map(|(_, weight)| weight).sum();
    if raw.is_empty() || total <= 0.0 {
        return Ok(BlendInfluences::root());
    }

    let mut influences = BlendInfluences {
        indices: [0; MAX_BONE_INFLUENCES],
        weights: [0.0; MAX_BONE_INFLUENCES],
    };

    if raw.len() <= MAX_BONE_INFLUENCES {
        let scale = if (total - 1.0).abs() > settings.weight_sum_tolerance {
            1.0 / total
        } else {
            1.0
        };
        for (lane, (bone, weight)) in raw.iter().enumerate() {
            influences.indices[lane] = *bone;
            influences.weights[lane] = weight * scale;
        }
        return Ok(influences);
    }

    let mut sorted = raw.to_vec();
    sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    sorted.truncate(MAX_BONE_INFLUENCES);

    let retained: f32 = sorted.iter().map(|(_, weight)| weight).sum();
    if retained <= settings.min_retained_weight_mass * total {
        return Err((retained, total));
    }

    for (lane, (bone, weight)) in sorted.iter().enumerate() {
        influences.indices[lane] = *bone;
        influences.weights[lane] = weight / retained;
    }

    Ok(influences)
}
