use std::fmt;

use kinecloud_kinematics::{resolver::TransformResolver, KinematicsError};

use crate::pipeline::GeneratedCloud;

/// Extent above which a model most likely uses the wrong unit.
pub const HUGE_EXTENT: f64 = 10.0;

/// Extent below which, on every axis, a model is considered tiny.
pub const TINY_EXTENT: f64 = 0.05;

/// Judgement on the overall size of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleVerdict {
    /// Some extent exceeds [`HUGE_EXTENT`], probably a unit mismatch.
    Huge,
    /// Every extent is below [`TINY_EXTENT`].
    Tiny,
    /// Neither huge nor tiny.
    Reasonable,
}

impl ScaleVerdict {
    /// Classify a bounding box size.
    pub fn from_size(size: [f64; 3]) -> Self {
        if size.iter().any(|&s| s > HUGE_EXTENT) {
            ScaleVerdict::Huge
        } else if size.iter().all(|&s| s < TINY_EXTENT) {
            ScaleVerdict::Tiny
        } else {
            ScaleVerdict::Reasonable
        }
    }
}

/// Expected and recovered position of one labeled part.
#[derive(Debug, Clone, PartialEq)]
pub struct PartDiagnostic {
    /// Label id.
    pub label: u32,
    /// Part name.
    pub name: String,
    /// World position of the part's frame origin.
    pub expected: [f64; 3],
    /// Centroid of the part's points in world units, `None` if it has none.
    pub recovered: Option<[f64; 3]>,
}

impl PartDiagnostic {
    /// Distance between the frame origin and the point centroid.
    pub fn offset(&self) -> Option<f64> {
        self.recovered.map(|r| {
            r.iter()
                .zip(self.expected.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt()
        })
    }
}

/// Consistency report of a generated dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetReport {
    /// One entry per label, in label order.
    pub parts: Vec<PartDiagnostic>,
    /// Bounding box size of the denormalized cloud.
    pub size: [f64; 3],
    /// Scale judgement of `size`.
    pub verdict: ScaleVerdict,
}

/// Compare a generated dataset against the transforms it was built from.
///
/// The cloud is denormalized first so positions are in model units.
pub fn diagnose(
    generated: &GeneratedCloud,
    resolver: &TransformResolver<'_>,
) -> Result<DatasetReport, KinematicsError> {
    let cloud = generated.cloud.denormalized();

    let parts = generated
        .label_map
        .iter()
        .map(|(label, name)| {
            Ok::<_, KinematicsError>(PartDiagnostic {
                label,
                name: name.to_string(),
                expected: resolver.world_transform(name)?.translation,
                recovered: cloud.label_centroid(label),
            })
        })
        .collect::<Result<Vec<_>, KinematicsError>>()?;

    let size = cloud
        .bounds()
        .map(|(min, max)| [max[0] - min[0], max[1] - min[1], max[2] - min[2]])
        .unwrap_or_default();
    let verdict = ScaleVerdict::from_size(size);
    match verdict {
        ScaleVerdict::Huge => log::warn!("model size {size:?} looks huge, check the units"),
        ScaleVerdict::Tiny => log::warn!("model size {size:?} looks tiny"),
        ScaleVerdict::Reasonable => log::debug!("model size {size:?}"),
    }

    Ok(DatasetReport {
        parts,
        size,
        verdict,
    })
}

impl fmt::Display for DatasetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>5}  {:<20} {:>28} {:>28} {:>8}",
            "label", "part", "frame origin", "centroid", "offset"
        )?;
        for part in &self.parts {
            let [ex, ey, ez] = part.expected;
            let recovered = part.recovered.map_or_else(
                || "-".to_string(),
                |[x, y, z]| format!("({x:.3}, {y:.3}, {z:.3})"),
            );
            let offset = part
                .offset()
                .map_or_else(|| "-".to_string(), |o| format!("{o:.3}"));
            writeln!(
                f,
                "{:>5}  {:<20} {:>28} {:>28} {:>8}",
                part.label,
                part.name,
                format!("({ex:.3}, {ey:.3}, {ez:.3})"),
                recovered,
                offset
            )?;
        }
        let [sx, sy, sz] = self.size;
        write!(f, "size ({sx:.3}, {sy:.3}, {sz:.3}): {:?}", self.verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_verdict() {
        assert_eq!(ScaleVerdict::from_size([12.0, 1.0, 1.0]), ScaleVerdict::Huge);
        assert_eq!(ScaleVerdict::from_size([0.01, 0.02, 0.04]), ScaleVerdict::Tiny);
        assert_eq!(ScaleVerdict::from_size([0.01, 0.02, 0.5]), ScaleVerdict::Reasonable);
        assert_eq!(ScaleVerdict::from_size([10.0, 10.0, 10.0]), ScaleVerdict::Reasonable);
    }

    #[test]
    fn test_offset() {
        let part = PartDiagnostic {
            label: 0,
            name: "a".into(),
            expected: [0.0, 0.0, 1.0],
            recovered: Some([3.0, 4.0, 1.0]),
        };
        assert_eq!(part.offset(), Some(5.0));
        let empty = PartDiagnostic {
            recovered: None,
            ..part
        };
        assert_eq!(empty.offset(), None);
    }
}
