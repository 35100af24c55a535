#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use kinecloud_3d as k3d;

#[doc(inline)]
pub use kinecloud_kinematics as kinematics;

/// Pipeline configuration.
pub mod config;

/// Dataset consistency checks.
pub mod diagnostics;

/// Pipeline error types.
pub mod error;

/// Forward generation of labeled clouds and dataset persistence.
pub mod pipeline;

/// Inverse path: per-link surfaces and a structure description from points.
pub mod reassemble;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use pipeline::{generate_labeled_cloud, GeneratedCloud};
