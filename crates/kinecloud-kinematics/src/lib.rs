#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types of the kinematics crate.
pub mod error;

/// Frames and joints.
pub mod frame;

/// World transform resolution and calibration.
pub mod resolver;

/// Serializable structural description of a model.
pub mod structure;

/// The kinematic tree and its geometry ownership table.
pub mod tree;

pub use error::{ErrorKind, KinematicsError};
