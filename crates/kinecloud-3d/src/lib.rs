#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Merging of per-part samples into one normalized cloud.
pub mod assembly;

/// Ball pivoting surface reconstruction.
pub mod ball_pivoting;

/// Reading and writing point records and label maps.
pub mod io;

/// Label propagation from a point cloud onto a mesh.
pub mod label_transfer;

/// Linear algebra utilities.
pub mod linalg;

/// Triangle meshes and mesh cleaning.
pub mod mesh;

/// Nearest neighbor queries.
pub mod neighbors;

/// Normal estimation and orientation.
pub mod normals;

/// Labeled point clouds.
pub mod pointcloud;

/// Surface reconstruction with a primitive fallback.
pub mod reconstruction;

/// Area weighted surface sampling.
pub mod sampling;

/// Density valley segmentation.
pub mod segmentation;

/// Rigid transforms.
pub mod transforms;
