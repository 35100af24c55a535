use std::collections::HashMap;

use kinecloud_3d::transforms::RigidTransform;

use crate::{error::KinematicsError, frame::Frame, tree::KinematicTree};

/// Joint positions keyed by joint name. Missing joints sit at zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointConfiguration {
    positions: HashMap<String, f64>,
}

impl JointConfiguration {
    /// Set the position of a joint.
    pub fn with_position(mut self, joint: impl Into<String>, position: f64) -> Self {
        self.positions.insert(joint.into(), position);
        self
    }

    /// The position of a joint.
    pub fn position(&self, joint: &str) -> f64 {
        self.positions.get(joint).copied().unwrap_or(0.0)
    }

    /// Iterate the explicitly set positions.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.positions.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Independently known world positions of frames, used to validate the
/// resolved transforms.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationReference {
    /// Expected world position of frame origins, keyed by frame name.
    pub positions: HashMap<String, [f64; 3]>,
    /// Largest accepted distance between resolved and expected positions.
    pub tolerance: f64,
}

impl Default for CalibrationReference {
    fn default() -> Self {
        Self {
            positions: HashMap::new(),
            tolerance: 1e-6,
        }
    }
}

/// Computes world transforms of frames by chaining local transforms from the
/// root down to the frame.
#[derive(Debug, Clone)]
pub struct TransformResolver<'a> {
    tree: &'a KinematicTree,
    configuration: JointConfiguration,
}

impl<'a> TransformResolver<'a> {
    /// Create a resolver and run the calibration self-check.
    ///
    /// The check resolves the first non-root frame and compares its world
    /// position with `reference`, when the reference knows that frame.
    ///
    /// # Errors
    ///
    /// * [`KinematicsError::UnknownJoint`] if the configuration names a joint
    ///   the tree does not have.
    /// * [`KinematicsError::CalibrationMismatch`] if the resolved position is
    ///   further than the tolerance from the reference.
    pub fn new(
        tree: &'a KinematicTree,
        configuration: JointConfiguration,
        reference: Option<&CalibrationReference>,
    ) -> Result<Self, KinematicsError> {
        for (joint, _) in configuration.iter() {
            tree.joint_frame(joint)?;
        }
        let resolver = Self {
            tree,
            configuration,
        };
        resolver.calibrate(reference)?;
        Ok(resolver)
    }

    /// The tree this resolver works on.
    pub fn tree(&self) -> &KinematicTree {
        self.tree
    }

    fn calibrate(&self, reference: Option<&CalibrationReference>) -> Result<(), KinematicsError> {
        let Some(frame) = self.tree.calibration_frame() else {
            log::debug!("tree has a single frame, skipping calibration");
            return Ok(());
        };
        let Some((expected, tolerance)) =
            reference.and_then(|r| Some((*r.positions.get(&frame.name)?, r.tolerance)))
        else {
            log::debug!("no reference position for frame {:?}, skipping calibration", frame.name);
            return Ok(());
        };

        let resolved = self.world_transform(&frame.name)?.translation;
        let error = resolved
            .iter()
            .zip(expected.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt();
        if !(error <= tolerance) {
            return Err(KinematicsError::CalibrationMismatch {
                frame: frame.name.clone(),
                resolved,
                expected,
                error,
                tolerance,
            });
        }
        log::debug!("calibration of frame {:?} passed, error {error:e}", frame.name);
        Ok(())
    }

    /// The transform from a frame to its parent at the configured joint
    /// position: the fixed origin followed by the joint motion.
    pub fn local_transform(&self, frame: &Frame) -> Result<RigidTransform, KinematicsError> {
        let Some(joint) = &frame.joint else {
            return Ok(frame.origin);
        };
        let motion = joint
            .motion(self.configuration.position(&joint.name))
            .map_err(|source| KinematicsError::InvalidJointAxis {
                joint: joint.name.clone(),
                source,
            })?;
        Ok(frame.origin.compose(&motion))
    }

    /// The transform mapping coordinates of frame `name` to world coordinates.
    pub fn world_transform(&self, name: &str) -> Result<RigidTransform, KinematicsError> {
        self.tree
            .chain(name)?
            .into_iter()
            .try_fold(RigidTransform::IDENTITY, |world, frame| {
                Ok(world.compose(&self.local_transform(frame)?))
            })
    }

    /// World transforms of every frame, aligned with [`KinematicTree::frames`].
    pub fn world_transforms(&self) -> Result<Vec<RigidTransform>, KinematicsError> {
        self.tree
            .frames()
            .iter()
            .map(|f| self.world_transform(&f.name))
            .collect()
    }
}
