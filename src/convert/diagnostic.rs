use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::error::ImportError;

use super::types::{ImportedAsset, SkinMesh};

// ─── Report structs ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshReport {
    pub name: String,
    pub control_points: usize,
    pub vertices: usize,
    pub seam_duplicates: usize,
    pub triangles: usize,
    /// Highest number of non-zero influence slots on any vertex.
    pub max_influences_used: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipReport {
    pub name: String,
    pub duration: f64,
    pub frame_interval: f64,
    pub frames: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    pub code: &'static str,
    pub asset: String,
    pub message: String,
}

/// Summary of one import, written next to the scene for inspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub bone_count: usize,
    pub root_bone: Option<String>,
    pub mirrored_bones: usize,
    pub meshes: Vec<MeshReport>,
    pub clips: Vec<ClipReport>,
    pub failures: Vec<FailureReport>,
}

// ─── Report builder ───────────────────────────────────────────────────────────

pub fn build_import_report(asset: &ImportedAsset) -> ImportReport {
    ImportReport {
        bone_count: asset.armature.len(),
        root_bone: asset.armature.root().map(|bone| bone.name.clone()),
        mirrored_bones: asset
            .armature
            .bones()
            .iter()
            .filter(|bone| bone.mirror_bone_index.is_some())
            .count(),
        meshes: asset.meshes.iter().map(mesh_report).collect(),
        clips: asset
            .clips
            .values()
            .map(|clip| ClipReport {
                name: clip.name.clone(),
                duration: clip.duration,
                frame_interval: clip.frame_interval,
                frames: clip.frames.len(),
            })
            .collect(),
        failures: asset.failures.iter().map(failure_report).collect(),
    }
}

fn mesh_report(mesh: &SkinMesh) -> MeshReport {
    MeshReport {
        name: mesh.name.clone(),
        control_points: mesh.control_point_count,
        vertices: mesh.vertices.len(),
        seam_duplicates: mesh.seam_duplicate_count(),
        triangles: mesh.indices.len(),
        max_influences_used: mesh
            .vertices
            .iter()
            .map(|vertex| vertex.blend_weights.iter().filter(|&&weight| weight > 0.0).count())
            .max()
            .unwrap_or(0),
    }
}

fn failure_report(error: &ImportError) -> FailureReport {
    FailureReport {
        code: error.code(),
        asset: error.asset().to_string(),
        message: error.to_string(),
    }
}

// ─── Report writer ────────────────────────────────────────────────────────────

pub fn write_import_report(path: &Path, report: &ImportReport) -> Result<()> {
    let content =
        serde_json::to_string_pretty(report).context("failed to serialize import report")?;
    fs::write(path, content)
        .with_context(|| format!("failed to write import report: {}", path.display()))?;
    Ok(())
}
