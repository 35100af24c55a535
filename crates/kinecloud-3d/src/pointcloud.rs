use std::collections::BTreeMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::mesh::bounds_of;

/// The default point color (white).
pub const DEFAULT_COLOR: [f64; 3] = [1.0, 1.0, 1.0];

/// Error types for the point cloud module.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PointCloudError {
    /// A stage that must produce points produced none.
    #[error("{0} produced an empty point cloud")]
    EmptyResult(&'static str),
}

/// A single point with a color and a part label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledPoint {
    /// Position of the point.
    pub position: [f64; 3],
    /// Color of the point in [0, 1].
    pub color: [f64; 3],
    /// Part label id.
    pub label: u32,
}

impl LabeledPoint {
    /// Create a white point with the given label.
    pub fn new(position: [f64; 3], label: u32) -> Self {
        Self {
            position,
            color: DEFAULT_COLOR,
            label,
        }
    }

    /// Replace the color of the point.
    pub fn with_color(mut self, color: [f64; 3]) -> Self {
        self.color = color;
        self
    }
}

/// Parameters needed to undo a normalization.
///
/// A normalized point `p` maps back to world space as `p * scale + centroid`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    /// Centroid subtracted from every point.
    pub centroid: [f64; 3],
    /// Factor every centered coordinate was divided by.
    pub scale: f64,
}

impl Normalization {
    /// Map a normalized point back to the original coordinates.
    pub fn denormalize_point(&self, point: &[f64; 3]) -> [f64; 3] {
        (DVec3::from_array(*point) * self.scale + DVec3::from_array(self.centroid)).to_array()
    }

    /// Map an original point into normalized coordinates.
    pub fn normalize_point(&self, point: &[f64; 3]) -> [f64; 3] {
        ((DVec3::from_array(*point) - DVec3::from_array(self.centroid)) / self.scale).to_array()
    }
}

/// An ordered sequence of labeled points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledPointCloud {
    // The points of the cloud.
    points: Vec<LabeledPoint>,
    // The normalization applied to the points, if any.
    normalization: Option<Normalization>,
}

impl LabeledPointCloud {
    /// Create a new point cloud from labeled points.
    pub fn new(points: Vec<LabeledPoint>) -> Self {
        Self {
            points,
            normalization: None,
        }
    }

    /// Create an unlabeled cloud (all labels 0, white) from raw positions.
    pub fn from_positions(positions: &[[f64; 3]]) -> Self {
        Self::new(
            positions
                .iter()
                .map(|p| LabeledPoint::new(*p, 0))
                .collect(),
        )
    }

    /// Attach a normalization record, e.g. after loading a persisted cloud.
    pub fn with_normalization(mut self, normalization: Option<Normalization>) -> Self {
        self.normalization = normalization;
        self
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[LabeledPoint] {
        &self.points
    }

    /// Consume the cloud and return its points.
    pub fn into_points(self) -> Vec<LabeledPoint> {
        self.points
    }

    /// The normalization applied to this cloud, if any.
    pub fn normalization(&self) -> Option<&Normalization> {
        self.normalization.as_ref()
    }

    /// Copy the point positions into a new vector.
    pub fn positions(&self) -> Vec<[f64; 3]> {
        self.points.iter().map(|p| p.position).collect()
    }

    /// The distinct labels present, in ascending order.
    pub fn labels(&self) -> Vec<u32> {
        let mut labels = self.points.iter().map(|p| p.label).collect::<Vec<_>>();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    /// Mean position of all points.
    pub fn centroid(&self) -> Option<[f64; 3]> {
        mean_position(self.points.iter().map(|p| &p.position))
    }

    /// Mean position of the points carrying `label`.
    pub fn label_centroid(&self, label: u32) -> Option<[f64; 3]> {
        mean_position(
            self.points
                .iter()
                .filter(|p| p.label == label)
                .map(|p| &p.position),
        )
    }

    /// Largest Euclidean distance of any point from the origin.
    pub fn max_radius(&self) -> f64 {
        self.points
            .iter()
            .map(|p| DVec3::from_array(p.position).length())
            .fold(0.0, f64::max)
    }

    /// Minimum and maximum corners of the bounding box.
    pub fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        bounds_of(&self.positions())
    }

    /// Group point positions by label.
    pub fn split_by_label(&self) -> BTreeMap<u32, Vec<[f64; 3]>> {
        let mut parts: BTreeMap<u32, Vec<[f64; 3]>> = BTreeMap::new();
        for p in &self.points {
            parts.entry(p.label).or_default().push(p.position);
        }
        parts
    }

    /// Replace every label, keeping positions and colors.
    ///
    /// PRECONDITION: `labels` has one entry per point.
    pub fn relabel(&self, labels: &[u32]) -> Self {
        assert_eq!(labels.len(), self.points.len());
        Self {
            points: self
                .points
                .iter()
                .zip(labels)
                .map(|(p, &label)| LabeledPoint { label, ..*p })
                .collect(),
            normalization: self.normalization,
        }
    }

    /// Map the whole cloud back to un-normalized coordinates.
    ///
    /// Returns a clone when no normalization is recorded.
    pub fn denormalized(&self) -> Self {
        let Some(norm) = self.normalization else {
            return self.clone();
        };
        Self {
            points: self
                .points
                .iter()
                .map(|p| LabeledPoint {
                    position: norm.denormalize_point(&p.position),
                    ..*p
                })
                .collect(),
            normalization: None,
        }
    }

    /// Center the cloud on its centroid and scale it into the unit ball.
    ///
    /// When the maximum radius after centering is (near) zero the cloud is
    /// left unscaled and a warning is logged. The applied parameters are
    /// recorded and returned so the operation can be undone later.
    pub fn normalize(&mut self) -> Result<Normalization, PointCloudError> {
        let centroid = self
            .centroid()
            .ok_or(PointCloudError::EmptyResult("normalization"))?;
        let c = DVec3::from_array(centroid);
        for p in self.points.iter_mut() {
            p.position = (DVec3::from_array(p.position) - c).to_array();
        }

        let max_dist = self.max_radius();
        let scale = if max_dist > DEGENERATE_RADIUS {
            for p in self.points.iter_mut() {
                p.position = (DVec3::from_array(p.position) / max_dist).to_array();
            }
            log::debug!("normalized cloud: scale = 1.0/{max_dist:.4}");
            max_dist
        } else {
            log::warn!(
                "degenerate cloud: max radius {max_dist:e} after centering, leaving it unscaled"
            );
            1.0
        };

        let normalization = Normalization { centroid, scale };
        self.normalization = Some(normalization);
        Ok(normalization)
    }
}

/// Radius below which a centered cloud is considered to have no extent.
const DEGENERATE_RADIUS: f64 = 1e-12;

fn mean_position<'a>(positions: impl Iterator<Item = &'a [f64; 3]>) -> Option<[f64; 3]> {
    let (sum, count) = positions.fold((DVec3::ZERO, 0usize), |(sum, n), p| {
        (sum + DVec3::from_array(*p), n + 1)
    });
    (count > 0).then(|| (sum / count as f64).to_array())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pointcloud() {
        let cloud = LabeledPointCloud::new(vec![
            LabeledPoint::new([0.0, 0.0, 0.0], 0),
            LabeledPoint::new([2.0, 0.0, 0.0], 1).with_color([1.0, 0.0, 0.0]),
        ]);
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.labels(), vec![0, 1]);
        assert_eq!(cloud.centroid(), Some([1.0, 0.0, 0.0]));
        assert_eq!(cloud.label_centroid(1), Some([2.0, 0.0, 0.0]));
        assert_eq!(cloud.label_centroid(7), None);
        assert_eq!(cloud.points()[0].color, DEFAULT_COLOR);
    }

    #[test]
    fn test_normalize() -> Result<(), PointCloudError> {
        let mut cloud = LabeledPointCloud::from_positions(&[
            [1.0, 1.0, 1.0],
            [3.0, 1.0, 1.0],
            [2.0, 4.0, 1.0],
            [2.0, 1.0, -3.0],
        ]);
        let norm = cloud.normalize()?;
        let centroid = cloud.centroid().unwrap_or([f64::NAN; 3]);
        for c in centroid {
            assert_relative_eq!(c, 0.0, epsilon = 1e-12);
        }
        assert_relative_eq!(cloud.max_radius(), 1.0, epsilon = 1e-12);
        assert_eq!(cloud.normalization(), Some(&norm));

        let restored = cloud.denormalized();
        assert_relative_eq!(restored.points()[2].position[1], 4.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_normalize_degenerate() -> Result<(), PointCloudError> {
        let mut cloud = LabeledPointCloud::from_positions(&[[2.0, 2.0, 2.0]; 3]);
        let norm = cloud.normalize()?;
        assert_eq!(norm.scale, 1.0);
        assert_eq!(norm.centroid, [2.0, 2.0, 2.0]);
        assert_eq!(cloud.points()[0].position, [0.0, 0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_normalize_empty() {
        let mut cloud = LabeledPointCloud::default();
        assert_eq!(
            cloud.normalize(),
            Err(PointCloudError::EmptyResult("normalization"))
        );
    }

    #[test]
    fn test_split_and_relabel() {
        let cloud = LabeledPointCloud::from_positions(&[[0.0; 3], [1.0; 3], [2.0; 3]]);
        let relabeled = cloud.relabel(&[1, 0, 1]);
        let parts = relabeled.split_by_label();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[&0], vec![[1.0; 3]]);
        assert_eq!(parts[&1], vec![[0.0; 3], [2.0; 3]]);
    }
}
