use std::path::Path;

use kinecloud_3d::{
    reconstruction::ReconstructionParams, sampling::SamplerConfig, segmentation::SegmenterParams,
};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Parameters of every pipeline stage.
///
/// Missing fields take their default values, so an empty JSON object is a
/// valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Surface sampling.
    pub sampler: SamplerConfig,
    /// Center and scale the generated cloud into the unit ball.
    pub normalize: bool,
    /// Density valley segmentation.
    pub segmenter: SegmenterParams,
    /// Surface reconstruction.
    pub reconstruction: ReconstructionParams,
    /// Directory mesh files are referenced from in reassembled models.
    pub mesh_dir: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            normalize: true,
            segmenter: SegmenterParams::default(),
            reconstruction: ReconstructionParams::default(),
            mesh_dir: "meshes".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinecloud_3d::segmentation::Axis;

    #[test]
    fn test_empty_config_is_default() -> Result<(), PipelineError> {
        assert_eq!(PipelineConfig::from_json("{}")?, PipelineConfig::default());
        Ok(())
    }

    #[test]
    fn test_partial_config() -> Result<(), PipelineError> {
        let config = PipelineConfig::from_json(
            r#"{"sampler": {"samples_per_geometry": 64, "seed": 3}, "segmenter": {"axis": "Y"}}"#,
        )?;
        assert_eq!(config.sampler.samples_per_geometry, 64);
        assert_eq!(config.sampler.seed, 3);
        assert_eq!(config.segmenter.axis, Axis::Y);
        assert_eq!(config.segmenter.num_bins, 100);
        assert!(config.normalize);
        Ok(())
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            PipelineConfig::from_json(r#"{"normalize": 3}"#),
            Err(PipelineError::Config(_))
        ));
    }
}
