use kinecloud_3d::transforms::TransformError;

/// Broad category of a [`KinematicsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The tree is malformed: cycles, missing parents, root count, bad joints.
    Structural,
    /// A frame or joint name that does not exist was requested.
    Lookup,
    /// The resolved transforms disagree with an external reference.
    Calibration,
}

/// Error types for the kinematics crate.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum KinematicsError {
    /// Two frames share a name.
    #[error("frame {0:?} is defined twice")]
    DuplicateFrame(String),

    /// Two joints share a name.
    #[error("joint {0:?} is defined twice")]
    DuplicateJoint(String),

    /// A frame names a parent that does not exist.
    #[error("frame {frame:?} references unknown parent {parent:?}")]
    MissingParent {
        /// The child frame.
        frame: String,
        /// The missing parent name.
        parent: String,
    },

    /// A joint references a link that does not exist.
    #[error("joint {joint:?} references unknown link {link:?}")]
    UnknownLink {
        /// The joint name.
        joint: String,
        /// The missing link name.
        link: String,
    },

    /// A link is the child of more than one joint.
    #[error("link {0:?} has more than one parent joint")]
    MultipleParents(String),

    /// Every frame has a parent.
    #[error("tree has no root frame")]
    NoRoot,

    /// More than one frame has no parent.
    #[error("tree has several root frames: {0:?}")]
    MultipleRoots(Vec<String>),

    /// Walking up from a frame never reaches the root.
    #[error("parent chain of frame {0:?} does not reach the root")]
    Cycle(String),

    /// A movable joint has a zero length axis.
    #[error("joint {joint:?} has an invalid axis")]
    InvalidJointAxis {
        /// The joint name.
        joint: String,
        /// The underlying transform error.
        #[source]
        source: TransformError,
    },

    /// Geometry is attached to a frame that does not exist.
    #[error("geometry attached to unknown frame {0:?}")]
    UnknownGeometryOwner(String),

    /// No frame with this name.
    #[error("unknown frame {0:?}")]
    UnknownFrame(String),

    /// No joint with this name.
    #[error("unknown joint {0:?}")]
    UnknownJoint(String),

    /// The calibration frame resolved away from its reference position.
    #[error(
        "calibration failed for frame {frame:?}: resolved {resolved:?}, expected {expected:?}, \
         error {error:.6} exceeds tolerance {tolerance}"
    )]
    CalibrationMismatch {
        /// The frame used for calibration.
        frame: String,
        /// Its resolved world position.
        resolved: [f64; 3],
        /// The reference position.
        expected: [f64; 3],
        /// Euclidean distance between both.
        error: f64,
        /// The accepted tolerance.
        tolerance: f64,
    },
}

impl KinematicsError {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KinematicsError::UnknownFrame(_) | KinematicsError::UnknownJoint(_) => ErrorKind::Lookup,
            KinematicsError::CalibrationMismatch { .. } => ErrorKind::Calibration,
            _ => ErrorKind::Structural,
        }
    }
}
