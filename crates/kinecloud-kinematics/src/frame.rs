use kinecloud_3d::transforms::{RigidTransform, TransformError};
use serde::{Deserialize, Serialize};

/// The kind of motion a joint allows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JointType {
    /// No motion.
    #[default]
    Fixed,
    /// Rotation about the axis within limits.
    Revolute,
    /// Unlimited rotation about the axis.
    Continuous,
    /// Translation along the axis.
    Prismatic,
    /// Six degrees of freedom, not driven by a scalar position.
    Floating,
    /// Motion in a plane, not driven by a scalar position.
    Planar,
}

impl JointType {
    /// Check if the joint is driven by a scalar position.
    pub fn is_movable(self) -> bool {
        matches!(
            self,
            JointType::Revolute | JointType::Continuous | JointType::Prismatic
        )
    }

    /// Check if the joint carries lower and upper position limits.
    pub fn has_position_limits(self) -> bool {
        matches!(self, JointType::Revolute | JointType::Prismatic)
    }
}

/// Joint limits; each bound is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    /// Lower position limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    /// Upper position limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
    /// Maximum effort.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effort: Option<f64>,
    /// Maximum velocity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f64>,
}

/// The joint connecting a frame to its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    /// Unique joint name.
    pub name: String,
    /// Kind of motion.
    pub joint_type: JointType,
    /// Motion axis in the child frame.
    pub axis: [f64; 3],
    /// Optional limits.
    pub limits: Option<JointLimits>,
}

impl Joint {
    /// A fixed joint.
    pub fn fixed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            joint_type: JointType::Fixed,
            axis: [1.0, 0.0, 0.0],
            limits: None,
        }
    }

    /// A joint of the given type moving about or along `axis`.
    pub fn new(name: impl Into<String>, joint_type: JointType, axis: [f64; 3]) -> Self {
        Self {
            name: name.into(),
            joint_type,
            axis,
            limits: None,
        }
    }

    /// Attach limits to the joint.
    pub fn with_limits(mut self, limits: JointLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// The transform produced by the joint at `position`.
    ///
    /// Revolute and continuous joints rotate by `position` radians about the
    /// axis, prismatic joints translate by `position` along the normalized
    /// axis. Other joints yield the identity.
    pub fn motion(&self, position: f64) -> Result<RigidTransform, TransformError> {
        match self.joint_type {
            JointType::Revolute | JointType::Continuous => {
                RigidTransform::from_axis_angle(&self.axis, position)
            }
            JointType::Prismatic => {
                let norm = self.axis.iter().map(|c| c * c).sum::<f64>().sqrt();
                if norm < 1e-10 {
                    return Err(TransformError::ZeroAxis);
                }
                Ok(RigidTransform::from_translation(
                    self.axis.map(|c| c / norm * position),
                ))
            }
            JointType::Fixed | JointType::Floating | JointType::Planar => {
                Ok(RigidTransform::IDENTITY)
            }
        }
    }
}

/// A named coordinate frame placed relative to its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Unique frame name.
    pub name: String,
    /// Parent frame name, `None` for the root.
    pub parent: Option<String>,
    /// Transform from this frame to its parent at joint position zero.
    pub origin: RigidTransform,
    /// Joint connecting the frame to its parent.
    pub joint: Option<Joint>,
}

impl Frame {
    /// A root frame at the world origin.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            origin: RigidTransform::IDENTITY,
            joint: None,
        }
    }

    /// A child frame rigidly placed at `origin` in its parent.
    pub fn child(name: impl Into<String>, parent: impl Into<String>, origin: RigidTransform) -> Self {
        Self {
            name: name.into(),
            parent: Some(parent.into()),
            origin,
            joint: None,
        }
    }

    /// Attach the joint connecting this frame to its parent.
    pub fn with_joint(mut self, joint: Joint) -> Self {
        self.joint = Some(joint);
        self
    }

    /// Check if the frame has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_revolute_motion() -> Result<(), TransformError> {
        let joint = Joint::new("j", JointType::Revolute, [0.0, 0.0, 2.0]);
        let p = joint
            .motion(std::f64::consts::FRAC_PI_2)?
            .transform_point(&[1.0, 0.0, 0.0]);
        assert_relative_eq!(p[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(p[1], 1.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_prismatic_motion() -> Result<(), TransformError> {
        let joint = Joint::new("j", JointType::Prismatic, [0.0, 3.0, 0.0]);
        assert_eq!(joint.motion(0.5)?.translation, [0.0, 0.5, 0.0]);
        let bad = Joint::new("j", JointType::Prismatic, [0.0; 3]);
        assert_eq!(bad.motion(1.0), Err(TransformError::ZeroAxis));
        Ok(())
    }

    #[test]
    fn test_fixed_like_motion_is_identity() -> Result<(), TransformError> {
        for joint_type in [JointType::Fixed, JointType::Floating, JointType::Planar] {
            let joint = Joint::new("j", joint_type, [0.0; 3]);
            assert_eq!(joint.motion(1.0)?, RigidTransform::IDENTITY);
        }
        Ok(())
    }

    #[test]
    fn test_joint_type_serde() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&JointType::Continuous)?, r#""continuous""#);
        let t: JointType = serde_json::from_str(r#""prismatic""#)?;
        assert!(t.is_movable() && t.has_position_limits());
        assert!(!JointType::Continuous.has_position_limits());
        Ok(())
    }
}
