//! Unsupervised segmentation of a point cloud along one axis.
//!
//! The coordinates along the chosen axis are binned into a histogram. Sparse
//! regions (density valleys) separate parts stacked along the axis, so the
//! histogram is inverted and its significant peaks become the segment
//! boundaries. This is a heuristic that works for parts stacked along the
//! axis with visible gaps; it makes no guarantee for arbitrary shapes.

use serde::{Deserialize, Serialize};

use crate::pointcloud::LabeledPointCloud;

/// Error types for the segmentation module.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SegmentationError {
    /// There are no values to segment.
    #[error("cannot segment an empty point cloud")]
    EmptyCloud,

    /// The histogram resolution is zero.
    #[error("histogram needs at least one bin")]
    ZeroBins,
}

/// A coordinate axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    /// The x axis.
    X,
    /// The y axis.
    Y,
    /// The z axis, vertical in the model convention.
    #[default]
    Z,
}

impl Axis {
    /// Index of the axis in a `[x, y, z]` array.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Parameters of the density valley segmenter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterParams {
    /// Axis the points are projected on.
    pub axis: Axis,
    /// Histogram resolution.
    pub num_bins: usize,
    /// Minimum valley prominence as a fraction of the inverted histogram maximum.
    pub prominence_ratio: f64,
    /// Minimum distance in bins between two accepted valleys.
    pub min_distance: usize,
}

impl Default for SegmenterParams {
    fn default() -> Self {
        Self {
            axis: Axis::Z,
            num_bins: 100,
            prominence_ratio: 0.15,
            min_distance: 5,
        }
    }
}

/// A fixed resolution histogram over `[min, max]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// Number of values per bin.
    pub counts: Vec<usize>,
    /// Lower edge of the first bin.
    pub min: f64,
    /// Width of every bin.
    pub bin_width: f64,
}

impl Histogram {
    /// Bin `values` into `num_bins` equal bins spanning their range.
    ///
    /// The maximum value falls into the last bin. When all values are equal
    /// the range is widened by 0.5 on both sides.
    pub fn new(values: &[f64], num_bins: usize) -> Result<Self, SegmentationError> {
        if num_bins == 0 {
            return Err(SegmentationError::ZeroBins);
        }
        let (mut min, mut max) = value_range(values).ok_or(SegmentationError::EmptyCloud)?;
        if min == max {
            min -= 0.5;
            max += 0.5;
        }
        let bin_width = (max - min) / num_bins as f64;

        let mut counts = vec![0usize; num_bins];
        for v in values {
            let bin = (((v - min) / bin_width) as usize).min(num_bins - 1);
            counts[bin] += 1;
        }

        Ok(Self {
            counts,
            min,
            bin_width,
        })
    }

    /// Center coordinate of bin `i`.
    pub fn bin_center(&self, i: usize) -> f64 {
        self.min + (i as f64 + 0.5) * self.bin_width
    }

    /// The histogram turned upside down: `max - count` for every bin.
    pub fn inverted(&self) -> Vec<f64> {
        let max = self.counts.iter().copied().max().unwrap_or(0);
        self.counts.iter().map(|&c| (max - c) as f64).collect()
    }
}

fn value_range(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

/// Find the indices of the significant peaks of a 1-D signal.
///
/// A peak is a sample strictly greater than its neighbors; a flat top is
/// reported at its middle sample and the two endpoints are never peaks.
/// Peaks closer than `min_distance` samples to a higher peak are dropped
/// first, then peaks with a prominence below `min_prominence` are dropped.
///
/// # Arguments
///
/// * `signal` - The sampled signal.
/// * `min_prominence` - Minimum prominence, inclusive.
/// * `min_distance` - Minimum index distance between kept peaks.
///
/// # Returns
///
/// The peak indices in increasing order.
pub fn find_peaks(signal: &[f64], min_prominence: f64, min_distance: usize) -> Vec<usize> {
    let peaks = local_maxima(signal);
    let peaks = select_by_distance(signal, peaks, min_distance.max(1));
    peaks
        .into_iter()
        .filter(|&p| prominence(signal, p) >= min_prominence)
        .collect()
}

fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }
    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

fn select_by_distance(x: &[f64], peaks: Vec<usize>, distance: usize) -> Vec<usize> {
    let mut keep = vec![true; peaks.len()];
    let mut order = (0..peaks.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]));

    // visit from the highest peak down
    for &i in order.iter().rev() {
        if !keep[i] {
            continue;
        }
        for k in (0..i).rev() {
            if peaks[i] - peaks[k] >= distance {
                break;
            }
            keep[k] = false;
        }
        for k in i + 1..peaks.len() {
            if peaks[k] - peaks[i] >= distance {
                break;
            }
            keep[k] = false;
        }
    }

    peaks
        .into_iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(p))
        .collect()
}

/// Height of a peak above the higher of the lowest points reached on each
/// side before the signal rises above the peak.
fn prominence(x: &[f64], peak: usize) -> f64 {
    let height = x[peak];
    let left_min = x[..=peak]
        .iter()
        .rev()
        .take_while(|&&v| v <= height)
        .fold(height, |m, &v| m.min(v));
    let right_min = x[peak..]
        .iter()
        .take_while(|&&v| v <= height)
        .fold(height, |m, &v| m.min(v));
    height - left_min.max(right_min)
}

/// Boundaries splitting an axis into consecutive segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segmentation {
    /// The axis the boundaries live on.
    pub axis: Axis,
    /// Strictly increasing boundary coordinates.
    pub boundaries: Vec<f64>,
}

impl Segmentation {
    /// Number of segments the boundaries define.
    pub fn num_segments(&self) -> usize {
        self.boundaries.len() + 1
    }

    /// Segment id of a coordinate: the number of boundaries at or below it.
    pub fn segment_of(&self, value: f64) -> u32 {
        self.boundaries.partition_point(|&b| b <= value) as u32
    }

    /// Segment id of every point of a cloud.
    pub fn assign(&self, cloud: &LabeledPointCloud) -> Vec<u32> {
        let axis = self.axis.index();
        cloud
            .points()
            .iter()
            .map(|p| self.segment_of(p.position[axis]))
            .collect()
    }
}

/// Density valley segmenter.
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    params: SegmenterParams,
}

impl Segmenter {
    /// Create a segmenter with the given parameters.
    pub fn new(params: SegmenterParams) -> Self {
        Self { params }
    }

    /// The segmenter parameters.
    pub fn params(&self) -> &SegmenterParams {
        &self.params
    }

    /// Detect segment boundaries from coordinate values along the axis.
    pub fn fit_values(&self, values: &[f64]) -> Result<Segmentation, SegmentationError> {
        let histogram = Histogram::new(values, self.params.num_bins)?;
        let mut segmentation = Segmentation {
            axis: self.params.axis,
            boundaries: Vec::new(),
        };

        if value_range(values).is_some_and(|(lo, hi)| lo == hi) {
            log::warn!(
                "cloud has no extent along {:?}, keeping a single segment",
                self.params.axis
            );
            return Ok(segmentation);
        }

        let inverted = histogram.inverted();
        let max = inverted.iter().copied().fold(0.0, f64::max);
        let peaks = find_peaks(
            &inverted,
            self.params.prominence_ratio * max,
            self.params.min_distance,
        );
        segmentation.boundaries = peaks.iter().map(|&p| histogram.bin_center(p)).collect();

        log::debug!(
            "found {} boundaries along {:?}: {:?}",
            segmentation.boundaries.len(),
            self.params.axis,
            segmentation.boundaries
        );
        Ok(segmentation)
    }

    /// Detect segment boundaries in a cloud.
    pub fn fit(&self, cloud: &LabeledPointCloud) -> Result<Segmentation, SegmentationError> {
        let axis = self.params.axis.index();
        let values = cloud
            .points()
            .iter()
            .map(|p| p.position[axis])
            .collect::<Vec<_>>();
        self.fit_values(&values)
    }

    /// Segment a cloud, replacing its labels with segment ids.
    pub fn segment(
        &self,
        cloud: &LabeledPointCloud,
    ) -> Result<(Segmentation, LabeledPointCloud), SegmentationError> {
        let segmentation = self.fit(cloud)?;
        let labels = segmentation.assign(cloud);
        Ok((segmentation, cloud.relabel(&labels)))
    }
}
