use std::path::Path;

use kinecloud_3d::{
    assembly::PointCloudAssembler,
    io::{label_map::LabelMap, records},
    pointcloud::LabeledPointCloud,
    sampling::{GeometrySampler, PartGeometry},
};
use kinecloud_kinematics::{
    resolver::{CalibrationReference, JointConfiguration, TransformResolver},
    tree::KinematicTree,
    KinematicsError,
};

use crate::{config::PipelineConfig, error::PipelineError};

/// File name of the point records inside a dataset directory.
pub const CLOUD_FILE: &str = "cloud.bin";

/// File name of the label map inside a dataset directory.
pub const LABEL_MAP_FILE: &str = "labels.json";

/// A labeled cloud together with the names of its labels.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedCloud {
    /// The assembled cloud, normalized when the configuration asks for it.
    pub cloud: LabeledPointCloud,
    /// Label id to part name mapping.
    pub label_map: LabelMap,
}

impl GeneratedCloud {
    /// Write the cloud records and the label map into `dir`.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<(), PipelineError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        records::save_cloud(&self.cloud, dir.join(CLOUD_FILE))?;
        self.label_map.save(dir.join(LABEL_MAP_FILE))?;
        log::info!("saved {} points to {}", self.cloud.len(), dir.display());
        Ok(())
    }

    /// Read a dataset written by [`GeneratedCloud::save`].
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let dir = dir.as_ref();
        Ok(Self {
            cloud: records::load_cloud(dir.join(CLOUD_FILE))?,
            label_map: LabelMap::load(dir.join(LABEL_MAP_FILE))?,
        })
    }
}

/// Resolve every geometry of the tree into world space and sample it.
///
/// Parts are the frames owning geometry, labeled in frame order. A frame
/// owning several meshes contributes all of them under its single label.
///
/// # Errors
///
/// * Structural, lookup and calibration failures of the resolver.
/// * [`kinecloud_3d::sampling::SamplingError::EmptyResult`] if every geometry
///   is degenerate.
pub fn generate_labeled_cloud(
    tree: &KinematicTree,
    joints: JointConfiguration,
    reference: Option<&CalibrationReference>,
    config: &PipelineConfig,
) -> Result<GeneratedCloud, PipelineError> {
    let resolver = TransformResolver::new(tree, joints, reference)?;
    let label_map = tree.label_map();

    let parts = tree
        .geometries()
        .iter()
        .map(|geometry| {
            let label = label_map
                .id(&geometry.owner)
                .ok_or_else(|| KinematicsError::UnknownFrame(geometry.owner.clone()))?;
            Ok::<_, KinematicsError>(PartGeometry {
                label,
                mesh: &geometry.mesh,
                world_transform: resolver.world_transform(&geometry.owner)?,
            })
        })
        .collect::<Result<Vec<_>, KinematicsError>>()?;

    log::debug!(
        "sampling {} geometries of {} parts",
        parts.len(),
        label_map.len()
    );

    let samples = GeometrySampler::new(config.sampler.clone()).sample_parts(&parts)?;
    let cloud = PointCloudAssembler::new(config.normalize).assemble(samples)?;

    log::info!(
        "generated {} points with {} labels",
        cloud.len(),
        label_map.len()
    );

    Ok(GeneratedCloud { cloud, label_map })
}
