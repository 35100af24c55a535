use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::{mesh::TriangleMesh, neighbors::PointIndex, pointcloud::LabeledPointCloud};

/// Error types for the label transfer module.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LabelTransferError {
    /// There are no labeled points to transfer from.
    #[error("cannot transfer labels from an empty point cloud")]
    EmptyCloud,
}

/// Labels propagated from a point cloud onto a mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTransferResult {
    /// Label of every mesh vertex.
    pub vertex_labels: Vec<u32>,
    /// Label of every mesh face.
    pub face_labels: Vec<u32>,
    /// Face indices grouped by label. Every face appears in exactly one bucket.
    pub buckets: BTreeMap<u32, Vec<usize>>,
}

impl LabelTransferResult {
    /// Build one submesh per label by selecting that label's faces.
    pub fn submeshes(&self, mesh: &TriangleMesh) -> BTreeMap<u32, TriangleMesh> {
        self.buckets
            .iter()
            .map(|(&label, faces)| (label, mesh.submesh(faces)))
            .collect()
    }
}

/// Transfer labels from a cloud to the vertices and faces of a mesh.
///
/// PRECONDITION: the mesh and the cloud are expressed in the same frame.
///
/// Every vertex copies the label of its nearest cloud point. A face whose
/// mesh carries exactly two vertex label values takes the lower value when
/// at most half its vertices have the higher one; otherwise a face takes the
/// most frequent of its three vertex labels, the lowest on ties.
pub fn transfer_labels(
    cloud: &LabeledPointCloud,
    mesh: &TriangleMesh,
) -> Result<LabelTransferResult, LabelTransferError> {
    if cloud.is_empty() {
        return Err(LabelTransferError::EmptyCloud);
    }
    let index = PointIndex::new(&cloud.positions());
    let points = cloud.points();

    let vertex_labels = mesh
        .vertices()
        .par_iter()
        .map(|v| {
            index
                .nearest(v)
                .map(|nn| points[nn.index].label)
                .ok_or(LabelTransferError::EmptyCloud)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut distinct = vertex_labels.clone();
    distinct.sort_unstable();
    distinct.dedup();
    let binary = match distinct.as_slice() {
        [lo, hi] => Some((*lo, *hi)),
        _ => None,
    };

    let face_labels = mesh
        .faces()
        .iter()
        .map(|f| face_label(f.map(|v| vertex_labels[v]), binary))
        .collect::<Vec<_>>();

    let mut buckets: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (fi, &label) in face_labels.iter().enumerate() {
        buckets.entry(label).or_default().push(fi);
    }

    log::debug!(
        "transferred {} labels onto {} vertices and {} faces",
        distinct.len(),
        vertex_labels.len(),
        face_labels.len()
    );

    Ok(LabelTransferResult {
        vertex_labels,
        face_labels,
        buckets,
    })
}

fn face_label(labels: [u32; 3], binary: Option<(u32, u32)>) -> u32 {
    if let Some((lo, hi)) = binary {
        let mean = labels.iter().filter(|&&l| l == hi).count() as f64 / 3.0;
        return if mean <= 0.5 { lo } else { hi };
    }
    let [a, b, c] = labels;
    if a == b || a == c {
        a
    } else if b == c {
        b
    } else {
        a.min(b).min(c)
    }
}
