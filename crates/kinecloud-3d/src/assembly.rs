use crate::pointcloud::{LabeledPoint, LabeledPointCloud, PointCloudError};

/// Merges per-part samples into a single labeled point cloud.
#[derive(Debug, Clone)]
pub struct PointCloudAssembler {
    normalize: bool,
}

impl Default for PointCloudAssembler {
    fn default() -> Self {
        Self { normalize: true }
    }
}

impl PointCloudAssembler {
    /// Create an assembler, optionally normalizing the merged cloud.
    pub fn new(normalize: bool) -> Self {
        Self { normalize }
    }

    /// Concatenate the samples of every part, in part order.
    ///
    /// When normalization is enabled the cloud is centered and scaled into the
    /// unit ball and the applied parameters are recorded on the cloud.
    ///
    /// # Errors
    ///
    /// Returns [`PointCloudError::EmptyResult`] if no part contributed a point.
    pub fn assemble(
        &self,
        parts: Vec<Vec<LabeledPoint>>,
    ) -> Result<LabeledPointCloud, PointCloudError> {
        let total = parts.iter().map(Vec::len).sum::<usize>();
        if total == 0 {
            return Err(PointCloudError::EmptyResult("assembly"));
        }

        let mut points = Vec::with_capacity(total);
        for part in parts {
            points.extend(part);
        }
        let mut cloud = LabeledPointCloud::new(points);

        if self.normalize {
            let norm = cloud.normalize()?;
            log::debug!(
                "assembled {total} points, centroid {:?}, scale {}",
                norm.centroid,
                norm.scale
            );
        }

        Ok(cloud)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_assemble_concatenates_in_order() -> Result<(), PointCloudError> {
        let parts = vec![
            vec![LabeledPoint::new([0.0, 0.0, 0.0], 0)],
            vec![],
            vec![
                LabeledPoint::new([0.0, 0.0, 2.0], 2),
                LabeledPoint::new([0.0, 0.0, 4.0], 2),
            ],
        ];
        let cloud = PointCloudAssembler::new(false).assemble(parts)?;
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.points()[1].position, [0.0, 0.0, 2.0]);
        assert!(cloud.normalization().is_none());
        Ok(())
    }

    #[test]
    fn test_assemble_normalizes() -> Result<(), PointCloudError> {
        let parts = vec![
            vec![LabeledPoint::new([1.0, 1.0, 1.0], 0)],
            vec![LabeledPoint::new([1.0, 1.0, 5.0], 1)],
        ];
        let cloud = PointCloudAssembler::default().assemble(parts)?;
        let norm = cloud.normalization().copied().ok_or(PointCloudError::EmptyResult("test"))?;
        assert_eq!(norm.centroid, [1.0, 1.0, 3.0]);
        assert_relative_eq!(norm.scale, 2.0);
        assert_relative_eq!(cloud.max_radius(), 1.0);
        assert_eq!(cloud.points()[1].position, [0.0, 0.0, 1.0]);
        Ok(())
    }

    #[test]
    fn test_assemble_empty() {
        let res = PointCloudAssembler::default().assemble(vec![vec![], vec![]]);
        assert_eq!(res, Err(PointCloudError::EmptyResult("assembly")));
    }
}
