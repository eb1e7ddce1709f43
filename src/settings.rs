use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Tunables of the import pipeline.
///
/// The weight and flip thresholds are empirical; they are exposed here so
/// content that trips them can be imported with adjusted values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImportSettings {
    /// Uniform steps per clip; a clip stores one frame more than this.
    pub clip_frame_count: usize,
    /// A sampled rotation is negated when its distance to the previous frame
    /// exceeds this multiple of its negated distance.
    pub quaternion_flip_ratio: f32,
    /// Squared distance under which two corner attributes are welded.
    pub seam_epsilon: f32,
    /// Allowed deviation of a weight sum from 1 before it is rescaled.
    pub weight_sum_tolerance: f32,
    /// Share of the raw weight mass the four kept influences must exceed.
    pub min_retained_weight_mass: f32,
    /// Raw influences a control point may receive before truncation.
    pub max_raw_influences: usize,
    /// Link left/right bone pairs after the armature is built.
    pub assign_mirror_bones: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            clip_frame_count: 30,
            quaternion_flip_ratio: 10.0,
            seam_epsilon: 0.0001,
            weight_sum_tolerance: 0.01,
            min_retained_weight_mass: 0.65,
            max_raw_influences: 32,
            assign_mirror_bones: true,
        }
    }
}

/// Save import settings to a JSON file.
pub fn save_import_settings(path: &Path, settings: &ImportSettings) -> Result<()> {
    let content = serde_json::to_string_pretty(settings)
        .context("failed to serialize import settings as JSON")?;
    fs::write(path, content)
        .with_context(|| format!("failed to save import settings: {}", path.display()))?;
    Ok(())
}

/// Load import settings from a JSON file. Missing fields keep their defaults.
pub fn load_import_settings(path: &Path) -> Result<ImportSettings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to load import settings: {}", path.display()))?;
    let settings: ImportSettings =
        serde_json::from_str(&content).context("failed to parse import settings JSON")?;
    Ok(settings)
}
