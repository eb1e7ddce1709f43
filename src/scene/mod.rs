mod dump;

use std::fmt;

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

use crate::math::Transform;

pub use dump::{KeyDump, NodeDump, SceneDump, TransformDump};

// ─── Node handles ─────────────────────────────────────────────────────────────

/// Opaque handle to a node owned by the scene reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeRef(pub usize);

/// A node flagged by the reader as a skeleton joint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneJoint {
    pub node: NodeRef,
    pub name: String,
}

/// Time span of one animation take, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSpan {
    pub name: String,
    pub start: f64,
    pub duration: f64,
}

// ─── Attribute layers ─────────────────────────────────────────────────────────

/// How attribute elements are assigned to mesh geometry.
///
/// Only `ByControlPoint` and `ByPolygonVertex` can be imported; the other
/// modes exist because readers report them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingMode {
    ByControlPoint,
    ByPolygonVertex,
    ByPolygon,
    ByEdge,
    AllSame,
}

/// How an attribute element is located in the value array.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferenceMode {
    #[default]
    Direct,
    IndexToDirect(Vec<u32>),
}

/// Attribute families carried by a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeKind {
    Normal,
    Uv,
    Tangent,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AttributeKind::Normal => "normal",
            AttributeKind::Uv => "uv",
            AttributeKind::Tangent => "tangent",
        };
        f.write_str(label)
    }
}

/// One attribute layer of a mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeLayer<T> {
    pub mapping: MappingMode,
    #[serde(default)]
    pub reference: ReferenceMode,
    pub values: Vec<T>,
}

impl<T: Copy> AttributeLayer<T> {
    pub fn direct(mapping: MappingMode, values: Vec<T>) -> Self {
        Self {
            mapping,
            reference: ReferenceMode::Direct,
            values,
        }
    }

    /// Value for the `element`-th control point or polygon vertex, going
    /// through the index array when the layer is indexed.
    pub fn element(&self, element: usize) -> Option<T> {
        let value_index = match &self.reference {
            ReferenceMode::Direct => element,
            ReferenceMode::IndexToDirect(indices) => *indices.get(element)? as usize,
        };
        self.values.get(value_index).copied()
    }
}

// ─── Mesh and skin data ───────────────────────────────────────────────────────

/// Control-point weights contributed by one bone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinCluster {
    pub bone: NodeRef,
    pub control_point_indices: Vec<u32>,
    pub weights: Vec<f32>,
}

/// A skin deformer and its clusters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SkinDeformer {
    pub clusters: Vec<SkinCluster>,
}

/// Mesh geometry as the reader exposes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshSource {
    pub name: String,
    pub control_points: Vec<[f32; 3]>,
    /// Polygons as control point indices; corners are numbered in order
    /// across all polygons to address per-polygon-vertex attributes.
    pub polygons: Vec<Vec<u32>>,
    #[serde(default)]
    pub normals: Option<AttributeLayer<[f32; 3]>>,
    #[serde(default)]
    pub uvs: Option<AttributeLayer<[f32; 2]>>,
    #[serde(default)]
    pub tangents: Option<AttributeLayer<[f32; 4]>>,
    #[serde(default)]
    pub skins: Vec<SkinDeformer>,
}

// ─── Reader boundary ──────────────────────────────────────────────────────────

/// Queries the importer issues against a parsed interchange scene.
///
/// Implementations own the parsed scene; the importer never traverses it on
/// its own and only asks for the nodes and evaluations it needs.
pub trait SceneSource {
    /// Skeleton joints in depth-first, parents-first order.
    fn skeleton_joints(&self) -> Vec<SceneJoint>;

    /// Immediate parent of any node, joint or not.
    fn parent_node(&self, node: NodeRef) -> Option<NodeRef>;

    fn meshes(&self) -> &[MeshSource];

    /// Global bind-pose matrix recorded for the node, if any.
    fn bind_pose(&self, node: NodeRef) -> Option<Matrix4<f32>>;

    /// Global transform of the node at `time` seconds.
    fn global_transform(&self, node: NodeRef, time: f64) -> Matrix4<f32>;

    /// Parent-relative transform of the node at `time` seconds.
    fn local_transform(&self, node: NodeRef, time: f64) -> Transform;

    fn animation_clips(&self) -> Vec<ClipSpan>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_indexed_layer_when_reading_element_then_index_array_is_followed() {
        let layer = AttributeLayer {
            mapping: MappingMode::ByPolygonVertex,
            reference: ReferenceMode::IndexToDirect(vec![1, 0, 1]),
            values: vec![[0.0f32, 0.0], [1.0, 1.0]],
        };

        assert_eq!(layer.element(0), Some([1.0, 1.0]));
        assert_eq!(layer.element(1), Some([0.0, 0.0]));
        assert_eq!(layer.element(3), None);
    }

    #[test]
    fn given_index_past_values_when_reading_element_then_none_is_returned() {
        let layer = AttributeLayer {
            mapping: MappingMode::ByControlPoint,
            reference: ReferenceMode::IndexToDirect(vec![5]),
            values: vec![[0.0f32, 1.0, 0.0]],
        };

        assert_eq!(layer.element(0), None);
    }
}
