use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use nalgebra::{Matrix4, Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::{ClipSpan, MeshSource, NodeRef, SceneJoint, SceneSource};
use crate::math::{Transform, negate_quaternion};

/// Serialized TRS: rotation as `[x, y, z, w]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformDump {
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    pub translation: [f32; 3],
}

impl Default for TransformDump {
    fn default() -> Self {
        Self {
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0, 1.0, 1.0],
            translation: [0.0, 0.0, 0.0],
        }
    }
}

impl TransformDump {
    pub fn to_transform(&self) -> Transform {
        let [x, y, z, w] = self.rotation;
        Transform::new(
            UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)),
            Vector3::from(self.scale),
            Vector3::from(self.translation),
        )
    }
}

/// A local transform at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyDump {
    pub time: f64,
    #[serde(flatten)]
    pub transform: TransformDump,
}

/// One scene node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDump {
    pub name: String,
    #[serde(default)]
    pub parent: Option<usize>,
    #[serde(default)]
    pub joint: bool,
    /// Global bind-pose matrix, column-major.
    #[serde(default)]
    pub bind_pose: Option<[f32; 16]>,
    #[serde(default)]
    pub rest: TransformDump,
    /// Keyframes sorted by time; empty means the rest transform is static.
    #[serde(default)]
    pub keys: Vec<KeyDump>,
}

/// Scene description read from JSON, standing in for a format reader.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneDump {
    pub nodes: Vec<NodeDump>,
    #[serde(default)]
    pub meshes: Vec<MeshSource>,
    #[serde(default)]
    pub clips: Vec<ClipSpan>,
}

impl SceneDump {
    /// Parse and validate a dump from a JSON value.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let dump: SceneDump =
            serde_json::from_value(value).context("failed to parse scene dump JSON")?;
        dump.validate()?;
        Ok(dump)
    }

    /// Read and validate a dump from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read scene dump: {}", path.display()))?;
        let dump: SceneDump = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse scene dump: {}", path.display()))?;
        dump.validate()?;
        Ok(dump)
    }

    /// Reject dangling parent links, parent cycles, unsorted keys and
    /// non-finite times.
    pub fn validate(&self) -> Result<()> {
        let node_count = self.nodes.len();
        for (index, node) in self.nodes.iter().enumerate() {
            if let Some(parent) = node.parent
                && parent >= node_count
            {
                bail!(
                    "node {} ('{}') references missing parent {} (node count: {})",
                    index,
                    node.name,
                    parent,
                    node_count
                );
            }
        }

        for (index, node) in self.nodes.iter().enumerate() {
            let mut current = node.parent;
            let mut steps = 0usize;
            while let Some(parent) = current {
                steps += 1;
                if steps > node_count {
                    bail!("node {} ('{}') has a cyclic parent chain", index, node.name);
                }
                current = self.nodes[parent].parent;
            }
        }

        for (index, node) in self.nodes.iter().enumerate() {
            if node.keys.iter().any(|key| !key.time.is_finite()) {
                bail!("node {} ('{}') has a non-finite key time", index, node.name);
            }
            if let Some(pair) = node.keys.windows(2).find(|pair| pair[1].time < pair[0].time) {
                bail!(
                    "node {} ('{}') has keys out of order: {} follows {}",
                    index,
                    node.name,
                    pair[1].time,
                    pair[0].time
                );
            }
        }

        for clip in &self.clips {
            if !clip.start.is_finite() || !clip.duration.is_finite() {
                bail!("clip '{}' has a non-finite time span", clip.name);
            }
        }

        Ok(())
    }

    fn node(&self, node: NodeRef) -> Option<&NodeDump> {
        self.nodes.get(node.0)
    }
}

impl SceneSource for SceneDump {
    fn skeleton_joints(&self) -> Vec<SceneJoint> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.joint)
            .map(|(index, node)| SceneJoint {
                node: NodeRef(index),
                name: node.name.clone(),
            })
            .collect()
    }

    fn parent_node(&self, node: NodeRef) -> Option<NodeRef> {
        self.node(node)?.parent.map(NodeRef)
    }

    fn meshes(&self) -> &[MeshSource] {
        &self.meshes
    }

    fn bind_pose(&self, node: NodeRef) -> Option<Matrix4<f32>> {
        self.node(node)?
            .bind_pose
            .map(|values| Matrix4::from_column_slice(&values))
    }

    fn global_transform(&self, node: NodeRef, time: f64) -> Matrix4<f32> {
        let mut global = self.local_transform(node, time).to_matrix();
        let mut current = self.parent_node(node);
        while let Some(parent) = current {
            global = self.local_transform(parent, time).to_matrix() * global;
            current = self.parent_node(parent);
        }
        global
    }

    fn local_transform(&self, node: NodeRef, time: f64) -> Transform {
        self.node(node)
            .map(|node| sample_keys(node, time))
            .unwrap_or_default()
    }

    fn animation_clips(&self) -> Vec<ClipSpan> {
        self.clips.clone()
    }
}

/// Evaluate a node's keyframes at `time`, clamping outside the key range.
fn sample_keys(node: &NodeDump, time: f64) -> Transform {
    let (Some(first), Some(last)) = (node.keys.first(), node.keys.last()) else {
        return node.rest.to_transform();
    };
    if time <= first.time {
        return first.transform.to_transform();
    }
    if time >= last.time {
        return last.transform.to_transform();
    }

    let next_index = node
        .keys
        .iter()
        .position(|key| key.time > time)
        .unwrap_or(node.keys.len() - 1);
    let before = &node.keys[next_index - 1];
    let after = &node.keys[next_index];
    if time == before.time {
        return before.transform.to_transform();
    }

    let span = after.time - before.time;
    let factor = if span > 0.0 {
        ((time - before.time) / span) as f32
    } else {
        0.0
    };

    let a = before.transform.to_transform();
    let b = after.transform.to_transform();
    // Interpolate on the short arc; the importer handles sign continuity itself.
    let b_rotation = if a.rotation.coords.dot(&b.rotation.coords) < 0.0 {
        negate_quaternion(&b.rotation)
    } else {
        b.rotation
    };

    Transform::new(
        a.rotation.nlerp(&b_rotation, factor),
        a.scale.lerp(&b.scale, factor),
        a.translation.lerp(&b.translation, factor),
    )
}
