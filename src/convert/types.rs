use std::collections::{BTreeMap, HashMap};

use nalgebra::Matrix4;
use serde::Serialize;

use crate::error::ImportError;
use crate::math::Transform;
use crate::scene::NodeRef;

// ─── Constants ────────────────────────────────────────────────────────────────

/// Influence slots carried by every skin vertex.
pub const MAX_BONE_INFLUENCES: usize = 4;

/// Packed RGBA written when the source carries no vertex colour.
pub const DEFAULT_VERTEX_COLOR: u32 = 0xFFFF_FFFF;

/// Tangent written when the source carries no tangent layer.
pub const DEFAULT_TANGENT: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

/// Left/right naming pairs used to detect mirrored bones.
pub(super) const MIRROR_NAME_PAIRS: [(&str, &str); 6] = [
    ("Left", "Right"),
    ("left", "right"),
    ("_L", "_R"),
    (".L", ".R"),
    ("L_", "R_"),
    ("_l", "_r"),
];

// ─── Armature ─────────────────────────────────────────────────────────────────

/// A single bone of an [`Armature`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bone {
    pub name: String,
    /// Parent bone index, always smaller than this bone's own index.
    pub parent_index: Option<usize>,
    /// Bone on the opposite side of the body, if one is named that way.
    pub mirror_bone_index: Option<usize>,
}

/// Rooted bone hierarchy in parents-first order.
///
/// Construction goes through the skeleton builder, which guarantees that
/// every parent index is smaller than its child's index and that bone 0 is
/// the only root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Armature {
    bones: Vec<Bone>,
    #[serde(skip)]
    name_to_index: HashMap<String, usize>,
}

impl Armature {
    pub(super) fn from_ordered_bones(bones: Vec<Bone>) -> Self {
        let name_to_index = bones
            .iter()
            .enumerate()
            .map(|(index, bone)| (bone.name.clone(), index))
            .collect();
        Self {
            bones,
            name_to_index,
        }
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn root(&self) -> Option<&Bone> {
        self.bones.first()
    }

    /// Parent indices aligned with the bone order.
    pub fn parent_indices(&self) -> Vec<Option<usize>> {
        self.bones.iter().map(|bone| bone.parent_index).collect()
    }

    pub(super) fn bones_mut(&mut self) -> &mut [Bone] {
        &mut self.bones
    }
}

/// Scene node backing each bone of an armature, aligned by bone index.
///
/// Kept apart from the [`Armature`] because a reference armature can be
/// shared between scenes whose nodes differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoneNodeMap {
    nodes: Vec<NodeRef>,
    node_to_bone: HashMap<NodeRef, usize>,
}

impl BoneNodeMap {
    pub(super) fn new(nodes: Vec<NodeRef>) -> Self {
        let node_to_bone = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (*node, index))
            .collect();
        Self {
            nodes,
            node_to_bone,
        }
    }

    pub fn node(&self, bone_index: usize) -> Option<NodeRef> {
        self.nodes.get(bone_index).copied()
    }

    pub fn nodes(&self) -> &[NodeRef] {
        &self.nodes
    }

    pub fn bone_index(&self, node: NodeRef) -> Option<usize> {
        self.node_to_bone.get(&node).copied()
    }
}

/// Bind pose of an armature, aligned by bone index.
#[derive(Debug, Clone, PartialEq)]
pub struct BindFrame {
    /// Parent-relative transforms.
    pub locals: Vec<Transform>,
    /// Global bind matrices the locals were derived from.
    pub globals: Vec<Matrix4<f32>>,
}

// ─── Skin mesh ────────────────────────────────────────────────────────────────

/// Up to four (bone, weight) influences of one vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BlendInfluences {
    pub indices: [u16; MAX_BONE_INFLUENCES],
    pub weights: [f32; MAX_BONE_INFLUENCES],
}

impl BlendInfluences {
    /// Fully bound to the root bone.
    pub fn root() -> Self {
        Self {
            indices: [0; MAX_BONE_INFLUENCES],
            weights: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

/// GPU-ready skinned vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SkinVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 4],
    pub uv: [f32; 2],
    /// Packed RGBA8.
    pub color: u32,
    pub blend_indices: [u16; MAX_BONE_INFLUENCES],
    pub blend_weights: [f32; MAX_BONE_INFLUENCES],
}

/// Welded, indexed skin mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct SkinMesh {
    pub name: String,
    pub vertices: Vec<SkinVertex>,
    pub indices: Vec<[u32; 3]>,
    pub bone_count: usize,
    /// Global bind-pose matrix per bone.
    pub default_bone_transforms: Vec<Matrix4<f32>>,
    /// Control points in the source mesh, before seam splitting.
    pub control_point_count: usize,
}

impl SkinMesh {
    /// Vertices added on top of the control points to keep seams.
    pub fn seam_duplicate_count(&self) -> usize {
        self.vertices.len().saturating_sub(self.control_point_count)
    }
}

// ─── Animation ────────────────────────────────────────────────────────────────

/// One uniformly spaced sample of every bone.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationFrame {
    pub locals: Vec<Transform>,
    pub globals: Vec<Matrix4<f32>>,
}

/// Time-uniform animation take for one armature.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub start: f64,
    pub duration: f64,
    pub frame_interval: f64,
    pub frames: Vec<AnimationFrame>,
}

/// Clips keyed by take name.
pub type AnimationSet = BTreeMap<String, AnimationClip>;

// ─── Import output ────────────────────────────────────────────────────────────

/// Everything produced by one scene import.
#[derive(Debug, Clone)]
pub struct ImportedAsset {
    pub armature: Armature,
    pub bone_nodes: BoneNodeMap,
    pub bind_frame: BindFrame,
    pub meshes: Vec<SkinMesh>,
    pub clips: AnimationSet,
    /// Meshes that failed; each entry names its mesh.
    pub failures: Vec<ImportError>,
}
