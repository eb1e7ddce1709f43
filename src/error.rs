use thiserror::Error;

use crate::scene::{AttributeKind, MappingMode};

#[derive(Debug, Clone, PartialEq, Error)]
/// Faults raised while importing a skeleton, a mesh or an animation take.
///
/// Every variant names the asset it belongs to so callers can report which
/// armature or mesh failed without tracking it separately.
pub enum ImportError {
    /// The joint list cannot form a rooted, parents-first tree.
    #[error("skeleton integrity fault at bone '{bone}': {reason}")]
    SkeletonIntegrity {
        /// Bone (joint name) where the fault was detected.
        bone: String,
        /// Human readable description of the broken precondition.
        reason: String,
    },

    /// Reordering against a reference armature found no matching bone.
    #[error("armature mismatch: bone '{bone}' has no counterpart in the reference armature")]
    ArmatureMismatch {
        /// Bone name that could not be matched.
        bone: String,
    },

    /// More than one skin deformer is attached to the mesh.
    #[error("mesh '{mesh}' has {deformer_count} skin deformers, only one is supported")]
    UnsupportedSkinTopology {
        /// Mesh name.
        mesh: String,
        /// Number of skin deformers found on the mesh.
        deformer_count: usize,
    },

    /// An attribute layer uses a mapping mode the seam splitter cannot handle.
    #[error("mesh '{mesh}' {layer} layer uses unsupported mapping {mapping:?}")]
    UnsupportedAttributeMapping {
        /// Mesh name.
        mesh: String,
        /// Attribute layer that carries the mapping.
        layer: AttributeKind,
        /// Mapping mode reported by the scene reader.
        mapping: MappingMode,
    },

    /// Truncating to four influences would drop too much weight mass.
    #[error(
        "mesh '{mesh}' control point {control_point}: top four influences keep {retained:.4} of {total:.4} weight mass"
    )]
    DegenerateSkinWeights {
        /// Mesh name.
        mesh: String,
        /// Control point whose influences were rejected.
        control_point: usize,
        /// Unnormalized sum of the four strongest weights.
        retained: f32,
        /// Sum of every raw weight on the control point.
        total: f32,
    },

    /// Mesh data references something outside its own buffers.
    #[error("mesh '{mesh}' is malformed: {reason}")]
    MalformedMesh {
        /// Mesh name.
        mesh: String,
        /// What was out of range or inconsistent.
        reason: String,
    },
}

impl ImportError {
    /// Name of the armature bone or mesh the fault belongs to.
    pub fn asset(&self) -> &str {
        match self {
            ImportError::SkeletonIntegrity { bone, .. } => bone,
            ImportError::ArmatureMismatch { bone } => bone,
            ImportError::UnsupportedSkinTopology { mesh, .. }
            | ImportError::UnsupportedAttributeMapping { mesh, .. }
            | ImportError::DegenerateSkinWeights { mesh, .. }
            | ImportError::MalformedMesh { mesh, .. } => mesh,
        }
    }

    /// Stable upper-snake identifier used in import reports.
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::SkeletonIntegrity { .. } => "SKELETON_INTEGRITY",
            ImportError::ArmatureMismatch { .. } => "ARMATURE_MISMATCH",
            ImportError::UnsupportedSkinTopology { .. } => "UNSUPPORTED_SKIN_TOPOLOGY",
            ImportError::UnsupportedAttributeMapping { .. } => "UNSUPPORTED_ATTRIBUTE_MAPPING",
            ImportError::DegenerateSkinWeights { .. } => "DEGENERATE_SKIN_WEIGHTS",
            ImportError::MalformedMesh { .. } => "MALFORMED_MESH",
        }
    }

    pub(crate) fn malformed(mesh: &str, reason: impl Into<String>) -> Self {
        ImportError::MalformedMesh {
            mesh: mesh.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias for import operations.
pub type ImportResult<T> = std::result::Result<T, ImportError>;
