/// Label id to part name mapping.
pub mod label_map;

/// Labeled point cloud records and their binary persistence.
pub mod records;
