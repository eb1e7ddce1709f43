use nalgebra::{Matrix3, Matrix4, Rotation3, Translation3, UnitQuaternion, Vector3};

/// Decomposed affine transform: rotation, scale and translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
    pub translation: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            translation: Vector3::zeros(),
        }
    }

    pub fn new(
        rotation: UnitQuaternion<f32>,
        scale: Vector3<f32>,
        translation: Vector3<f32>,
    ) -> Self {
        Self {
            rotation,
            scale,
            translation,
        }
    }

    /// Compose as `T * R * S`.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        let translation_matrix = Translation3::from(self.translation).to_homogeneous();
        let rotation_matrix = self.rotation.to_homogeneous();
        let scale_matrix = Matrix4::new_nonuniform_scaling(&self.scale);
        translation_matrix * rotation_matrix * scale_matrix
    }

    /// Decompose an affine matrix into rotation, scale and translation.
    ///
    /// Scale is taken from the basis column lengths. A mirrored basis is
    /// folded into a negative X scale so the rotation stays proper. Shear is
    /// not representable and is dropped.
    pub fn from_matrix(matrix: &Matrix4<f32>) -> Self {
        let translation = Vector3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)]);

        let basis_x = Vector3::new(matrix[(0, 0)], matrix[(1, 0)], matrix[(2, 0)]);
        let basis_y = Vector3::new(matrix[(0, 1)], matrix[(1, 1)], matrix[(2, 1)]);
        let basis_z = Vector3::new(matrix[(0, 2)], matrix[(1, 2)], matrix[(2, 2)]);

        let mut scale_x = basis_x.norm();
        let scale_y = basis_y.norm();
        let scale_z = basis_z.norm();

        let mut rot_x = if scale_x > 1e-8 {
            basis_x / scale_x
        } else {
            Vector3::x()
        };
        let rot_y = if scale_y > 1e-8 {
            basis_y / scale_y
        } else {
            Vector3::y()
        };
        let rot_z = if scale_z > 1e-8 {
            basis_z / scale_z
        } else {
            Vector3::z()
        };

        if rot_x.cross(&rot_y).dot(&rot_z) < 0.0 {
            scale_x = -scale_x;
            rot_x = -rot_x;
        }

        let rotation_matrix = Matrix3::from_columns(&[rot_x, rot_y, rot_z]);
        let rotation =
            UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation_matrix));

        Self {
            rotation,
            scale: Vector3::new(scale_x, scale_y, scale_z),
            translation,
        }
    }
}

/// Return the opposite-sign quaternion, which encodes the same rotation.
pub fn negate_quaternion(rotation: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
    UnitQuaternion::new_unchecked(-rotation.into_inner())
}

/// Local transform relative to a parent, `inverse(parent_global) * global`.
///
/// Returns `None` when the parent matrix cannot be inverted.
pub fn relative_matrix(parent_global: &Matrix4<f32>, global: &Matrix4<f32>) -> Option<Matrix4<f32>> {
    parent_global.try_inverse().map(|inverse| inverse * global)
}

/// Forward kinematics over parents-first ordered transforms.
///
/// `parents[i]` must be `None` or an index smaller than `i`.
pub fn compute_global_matrices(
    local_matrices: &[Matrix4<f32>],
    parents: &[Option<usize>],
) -> Vec<Matrix4<f32>> {
    let mut globals: Vec<Matrix4<f32>> = Vec::with_capacity(local_matrices.len());

    for (index, local) in local_matrices.iter().enumerate() {
        let global = match parents.get(index).copied().flatten() {
            Some(parent_index) if parent_index < index => globals[parent_index] * local,
            _ => *local,
        };
        globals.push(global);
    }

    globals
}
