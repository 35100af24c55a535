use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::pointcloud::{LabeledPoint, LabeledPointCloud, Normalization};

const RECORD_MAGIC: [u8; 4] = *b"KCLD";
const RECORD_VERSION: u32 = 1;

/// One persisted point: `[x, y, z, r, g, b, label]`.
pub type PointRecord = [f32; 7];

/// Error types for the records module.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Failed to open or create the file.
    #[error("failed to access record file")]
    Io(#[from] std::io::Error),

    /// Failed to encode or decode the records.
    #[error("failed to (de)serialize records: {0}")]
    Bincode(String),

    /// The file does not start with the record magic.
    #[error("not a point record file")]
    BadMagic,

    /// The file was written by an unknown format version.
    #[error("unsupported record version {0}")]
    UnsupportedVersion(u32),

    /// A row carries a label that is not a non-negative integer.
    #[error("row {row} has invalid label {value}")]
    InvalidLabel {
        /// Index of the row.
        row: usize,
        /// The stored label value.
        value: f32,
    },
}

#[derive(bincode::Encode, bincode::Decode)]
struct RecordFile {
    rows: Vec<PointRecord>,
    // centroid and scale
    normalization: Option<([f64; 3], f64)>,
}

/// Flatten a cloud into records.
pub fn to_records(cloud: &LabeledPointCloud) -> Vec<PointRecord> {
    cloud
        .points()
        .iter()
        .map(|p| {
            [
                p.position[0] as f32,
                p.position[1] as f32,
                p.position[2] as f32,
                p.color[0] as f32,
                p.color[1] as f32,
                p.color[2] as f32,
                p.label as f32,
            ]
        })
        .collect()
}

/// Rebuild a cloud from records.
pub fn from_records(rows: &[PointRecord]) -> Result<LabeledPointCloud, RecordError> {
    let points = rows
        .iter()
        .enumerate()
        .map(|(row, r)| {
            let value = r[6];
            if !(value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f32) {
                return Err(RecordError::InvalidLabel { row, value });
            }
            Ok(LabeledPoint {
                position: [r[0] as f64, r[1] as f64, r[2] as f64],
                color: [r[3] as f64, r[4] as f64, r[5] as f64],
                label: value as u32,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(LabeledPointCloud::new(points))
}

/// Write a cloud and its normalization to a file.
pub fn save_cloud(cloud: &LabeledPointCloud, path: impl AsRef<Path>) -> Result<(), RecordError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let config = bincode::config::standard();

    let record = RecordFile {
        rows: to_records(cloud),
        normalization: cloud.normalization().map(|n| (n.centroid, n.scale)),
    };

    bincode::encode_into_std_write(RECORD_MAGIC, &mut writer, config)
        .map_err(|e| RecordError::Bincode(e.to_string()))?;
    bincode::encode_into_std_write(RECORD_VERSION, &mut writer, config)
        .map_err(|e| RecordError::Bincode(e.to_string()))?;
    bincode::encode_into_std_write(&record, &mut writer, config)
        .map_err(|e| RecordError::Bincode(e.to_string()))?;
    writer.flush()?;

    log::debug!("saved {} point records", record.rows.len());
    Ok(())
}

/// Read a cloud written by [`save_cloud`].
///
/// Positions and colors come back at `f32` precision.
pub fn load_cloud(path: impl AsRef<Path>) -> Result<LabeledPointCloud, RecordError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let config = bincode::config::standard();

    let magic: [u8; 4] = bincode::decode_from_std_read(&mut reader, config)
        .map_err(|e| RecordError::Bincode(e.to_string()))?;
    if magic != RECORD_MAGIC {
        return Err(RecordError::BadMagic);
    }
    let version: u32 = bincode::decode_from_std_read(&mut reader, config)
        .map_err(|e| RecordError::Bincode(e.to_string()))?;
    if version != RECORD_VERSION {
        return Err(RecordError::UnsupportedVersion(version));
    }
    let record: RecordFile = bincode::decode_from_std_read(&mut reader, config)
        .map_err(|e| RecordError::Bincode(e.to_string()))?;

    let normalization = record
        .normalization
        .map(|(centroid, scale)| Normalization { centroid, scale });
    Ok(from_records(&record.rows)?.with_normalization(normalization))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cloud() -> LabeledPointCloud {
        LabeledPointCloud::new(vec![
            LabeledPoint::new([0.5, -0.25, 1.0], 0),
            LabeledPoint::new([0.0, 0.75, -1.0], 2).with_color([0.5, 0.25, 0.0]),
        ])
    }

    #[test]
    fn test_records_layout() -> Result<(), RecordError> {
        let rows = to_records(&sample_cloud());
        assert_eq!(rows[1], [0.0, 0.75, -1.0, 0.5, 0.25, 0.0, 2.0]);
        assert_eq!(from_records(&rows)?, sample_cloud());
        Ok(())
    }

    #[test]
    fn test_invalid_label() {
        let res = from_records(&[[0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.5]]);
        assert!(matches!(res, Err(RecordError::InvalidLabel { row: 0, .. })));
        let res = from_records(&[[0.0, 0.0, 0.0, 1.0, 1.0, 1.0, -1.0]]);
        assert!(matches!(res, Err(RecordError::InvalidLabel { .. })));
    }

    #[test]
    fn test_save_load() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("cloud.bin");

        let mut cloud = sample_cloud();
        let norm = cloud.normalize()?;
        save_cloud(&cloud, &path)?;

        let loaded = load_cloud(&path)?;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.normalization(), Some(&norm));
        assert_eq!(loaded.labels(), vec![0, 2]);
        Ok(())
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_save_reports_flush_failure() {
        // small records stay buffered, so the write only fails on flush
        let res = save_cloud(&sample_cloud(), "/dev/full");
        assert!(matches!(res, Err(RecordError::Io(_))));
    }

    #[test]
    fn test_load_rejects_foreign_file() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("junk.bin");
        std::fs::write(&path, b"PLY\0\x01\x02\x03")?;
        assert!(matches!(load_cloud(&path), Err(RecordError::BadMagic)));
        Ok(())
    }
}
