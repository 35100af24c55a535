use kinecloud_3d::{
    io::{label_map::LabelMapError, records::RecordError},
    pointcloud::PointCloudError,
    sampling::SamplingError,
};
use kinecloud_kinematics::KinematicsError;

/// Error types for the pipeline stages.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The kinematic tree is malformed, a name is unknown or calibration failed.
    #[error(transparent)]
    Kinematics(#[from] KinematicsError),

    /// No part produced any sample.
    #[error(transparent)]
    Sampling(#[from] SamplingError),

    /// The assembled cloud is empty.
    #[error(transparent)]
    PointCloud(#[from] PointCloudError),

    /// Failed to read or write point records.
    #[error(transparent)]
    Records(#[from] RecordError),

    /// Failed to read or write the label map.
    #[error(transparent)]
    LabelMap(#[from] LabelMapError),

    /// Failed to parse a configuration.
    #[error("invalid configuration")]
    Config(#[from] serde_json::Error),

    /// Failed to access a file.
    #[error("failed to access file")]
    Io(#[from] std::io::Error),
}
