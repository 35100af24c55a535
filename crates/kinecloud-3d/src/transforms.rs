use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

/// Error types for the transforms module.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TransformError {
    /// The rotation axis has (near) zero length.
    #[error("cannot compute rotation matrix from a zero vector")]
    ZeroAxis,
}

/// Compute the rotation matrix from an axis and angle.
///
/// # Arguments
///
/// * `axis` - The axis of rotation. It does not need to be normalized.
/// * `angle` - The angle of rotation in radians.
///
/// # Returns
///
/// The row-major rotation matrix.
///
/// Example:
///
/// ```
/// use kinecloud_3d::transforms::axis_angle_to_rotation_matrix;
///
/// let axis = [1.0, 0.0, 0.0];
/// let angle = std::f64::consts::PI / 2.0;
/// let rotation = axis_angle_to_rotation_matrix(&axis, angle).unwrap();
/// assert!((rotation[1][2] + 1.0).abs() < 1e-12);
/// ```
pub fn axis_angle_to_rotation_matrix(
    axis: &[f64; 3],
    angle: f64,
) -> Result<[[f64; 3]; 3], TransformError> {
    let magnitude = (axis[0].powi(2) + axis[1].powi(2) + axis[2].powi(2)).sqrt();
    if magnitude < 1e-10 {
        return Err(TransformError::ZeroAxis);
    }
    let (x, y, z) = (axis[0] / magnitude, axis[1] / magnitude, axis[2] / magnitude);

    let c = angle.cos();
    let s = angle.sin();
    let t = 1.0 - c;

    Ok([
        [c + x * x * t, x * y * t - z * s, x * z * t + y * s],
        [x * y * t + z * s, c + y * y * t, y * z * t - x * s],
        [x * z * t - y * s, y * z * t + x * s, c + z * z * t],
    ])
}

/// Compute the rotation matrix from roll, pitch and yaw angles.
///
/// The rotation is composed as `Rz(yaw) * Ry(pitch) * Rx(roll)`, i.e. fixed
/// axis rotations applied in roll, pitch, yaw order.
pub fn rpy_to_rotation_matrix(rpy: &[f64; 3]) -> [[f64; 3]; 3] {
    let (sr, cr) = rpy[0].sin_cos();
    let (sp, cp) = rpy[1].sin_cos();
    let (sy, cy) = rpy[2].sin_cos();

    [
        [cy * cp, cy * sp * sr - sy * cr, cy * sp * cr + sy * sr],
        [sy * cp, sy * sp * sr + cy * cr, sy * sp * cr - cy * sr],
        [-sp, cp * sr, cp * cr],
    ]
}

/// Recover roll, pitch and yaw from a rotation matrix.
///
/// Inverse of [`rpy_to_rotation_matrix`]. At the pitch singularity (±π/2) the
/// roll is set to zero and the remaining rotation is folded into the yaw.
pub fn rotation_matrix_to_rpy(rotation: &[[f64; 3]; 3]) -> [f64; 3] {
    let sp = (-rotation[2][0]).clamp(-1.0, 1.0);
    let pitch = sp.asin();
    if sp.abs() > 1.0 - 1e-9 {
        let yaw = (-rotation[0][1]).atan2(rotation[1][1]);
        return [0.0, pitch, yaw];
    }
    let roll = rotation[2][1].atan2(rotation[2][2]);
    let yaw = rotation[1][0].atan2(rotation[0][0]);
    [roll, pitch, yaw]
}

/// A rigid transformation made of a rotation followed by a translation.
///
/// Maps a point `p` to `R * p + t`. Composition with [`RigidTransform::compose`]
/// follows the usual matrix order: `a.compose(&b)` applies `b` first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    /// Row-major rotation matrix.
    pub rotation: [[f64; 3]; 3],
    /// Translation vector.
    pub translation: [f64; 3],
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RigidTransform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        translation: [0.0, 0.0, 0.0],
    };

    /// Create a transform from a rotation matrix and a translation.
    pub fn new(rotation: [[f64; 3]; 3], translation: [f64; 3]) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// A pure translation.
    pub fn from_translation(translation: [f64; 3]) -> Self {
        Self {
            rotation: Self::IDENTITY.rotation,
            translation,
        }
    }

    /// A transform from a translation and roll/pitch/yaw angles.
    pub fn from_xyz_rpy(xyz: [f64; 3], rpy: [f64; 3]) -> Self {
        Self {
            rotation: rpy_to_rotation_matrix(&rpy),
            translation: xyz,
        }
    }

    /// A pure rotation about `axis` by `angle` radians.
    pub fn from_axis_angle(axis: &[f64; 3], angle: f64) -> Result<Self, TransformError> {
        Ok(Self {
            rotation: axis_angle_to_rotation_matrix(axis, angle)?,
            translation: [0.0; 3],
        })
    }

    /// The roll/pitch/yaw angles of the rotation part.
    pub fn rpy(&self) -> [f64; 3] {
        rotation_matrix_to_rpy(&self.rotation)
    }

    fn rotation_mat(&self) -> DMat3 {
        DMat3::from_cols_array_2d(&self.rotation).transpose()
    }

    /// Compose two transforms: the result applies `other` first, then `self`.
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        let r_self = self.rotation_mat();
        let rotation = r_self * other.rotation_mat();
        let translation = r_self * DVec3::from_array(other.translation)
            + DVec3::from_array(self.translation);
        RigidTransform {
            rotation: rotation.transpose().to_cols_array_2d(),
            translation: translation.to_array(),
        }
    }

    /// The inverse transform.
    pub fn inverse(&self) -> RigidTransform {
        // R' = R^T, t' = -R^T * t
        let r_inv = self.rotation_mat().transpose();
        let t_inv = -(r_inv * DVec3::from_array(self.translation));
        RigidTransform {
            rotation: r_inv.transpose().to_cols_array_2d(),
            translation: t_inv.to_array(),
        }
    }

    /// Apply the transform to a single point.
    pub fn transform_point(&self, point: &[f64; 3]) -> [f64; 3] {
        (self.rotation_mat() * DVec3::from_array(*point) + DVec3::from_array(self.translation))
            .to_array()
    }

    /// Apply the transform to a set of points, returning a new vector.
    ///
    /// The source points are left untouched.
    pub fn transform_points(&self, src_points: &[[f64; 3]]) -> Vec<[f64; 3]> {
        let r = self.rotation_mat();
        let t = DVec3::from_array(self.translation);
        src_points
            .iter()
            .map(|p| (r * DVec3::from_array(*p) + t).to_array())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_axis_angle_to_rotation_matrix() -> Result<(), Box<dyn std::error::Error>> {
        let axis = [1.0, 0.0, 0.0];
        let angle = std::f64::consts::PI / 2.0;
        let rotation = axis_angle_to_rotation_matrix(&axis, angle)?;
        let expected = [[1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]];
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(rotation[i][j], expected[i][j], epsilon = 1e-12);
            }
        }
        Ok(())
    }

    #[test]
    fn test_axis_angle_zero_axis() {
        let res = axis_angle_to_rotation_matrix(&[0.0, 0.0, 0.0], 1.0);
        assert_eq!(res, Err(TransformError::ZeroAxis));
    }

    #[test]
    fn test_rpy_yaw_only() {
        let rotation = rpy_to_rotation_matrix(&[0.0, 0.0, std::f64::consts::FRAC_PI_2]);
        let t = RigidTransform::new(rotation, [0.0; 3]);
        let p = t.transform_point(&[1.0, 0.0, 0.0]);
        assert_relative_eq!(p[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(p[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(p[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rpy_roundtrip() {
        let rpy = [0.3, -0.4, 1.2];
        let back = rotation_matrix_to_rpy(&rpy_to_rotation_matrix(&rpy));
        for i in 0..3 {
            assert_relative_eq!(back[i], rpy[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_compose_applies_right_first() -> Result<(), Box<dyn std::error::Error>> {
        let rot = RigidTransform::from_axis_angle(&[0.0, 0.0, 1.0], std::f64::consts::FRAC_PI_2)?;
        let shift = RigidTransform::from_translation([1.0, 0.0, 0.0]);
        // shift then rotate: (1,0,0) -> (2,0,0) -> (0,2,0)
        let p = rot.compose(&shift).transform_point(&[1.0, 0.0, 0.0]);
        assert_relative_eq!(p[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(p[1], 2.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_inverse_roundtrip() {
        let t = RigidTransform::from_xyz_rpy([1.0, 2.0, 3.0], [0.1, 0.2, 0.3]);
        let src = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
        let dst = t.transform_points(&src);
        let back = t.inverse().transform_points(&dst);
        for (a, b) in back.iter().zip(src.iter()) {
            for i in 0..3 {
                assert_relative_eq!(a[i], b[i], epsilon = 1e-12);
            }
        }
    }
}
