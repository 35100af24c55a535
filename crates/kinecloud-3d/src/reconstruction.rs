use serde::{Deserialize, Serialize};

use crate::{
    ball_pivoting::{ball_pivoting, BallPivotingError},
    mesh::{bounds_of, TriangleMesh},
    neighbors::PointIndex,
    normals::{estimate_normals, orient_normals},
};

/// Error types for the reconstruction module.
///
/// These never escape [`MeshReconstructor::reconstruct`], which falls back to
/// a bounding box; they are reported by [`MeshReconstructor::try_reconstruct`].
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ReconstructionError {
    /// Not enough points to span a surface.
    #[error("need at least 3 points to reconstruct a surface, got {0}")]
    TooFewPoints(usize),

    /// Some point coordinate is NaN or infinite.
    #[error("point set contains non-finite coordinates")]
    NonFinite,

    /// All points coincide, so no pivoting radius can be derived.
    #[error("mean nearest neighbor spacing is zero")]
    ZeroSpacing,

    /// Ball pivoting failed.
    #[error(transparent)]
    BallPivoting(#[from] BallPivotingError),

    /// No triangle survived reconstruction and cleaning.
    #[error("reconstruction produced no triangles")]
    EmptyMesh,

    /// The configured method does not build surfaces.
    #[error("surface reconstruction is unavailable")]
    Unavailable,
}

/// Strategy used to rebuild a surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconstructionMethod {
    /// Normal estimation followed by multi-radius ball pivoting.
    #[default]
    BallPivoting,
    /// Always emit the bounding box primitive.
    BoundingBox,
}

/// Parameters of the surface reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionParams {
    /// Reconstruction strategy.
    pub method: ReconstructionMethod,
    /// Neighbors used to fit each normal.
    pub normal_neighbors: usize,
    /// Neighbors linked in the orientation graph.
    pub orientation_neighbors: usize,
    /// Ball radii as multiples of the mean nearest neighbor spacing.
    pub radius_factors: Vec<f64>,
    /// Smallest edge length of a fallback box.
    pub min_box_size: f64,
    /// Edge length of the box emitted for a part without points.
    pub empty_box_size: f64,
}

impl Default for ReconstructionParams {
    fn default() -> Self {
        Self {
            method: ReconstructionMethod::BallPivoting,
            normal_neighbors: 30,
            orientation_neighbors: 50,
            radius_factors: vec![1.5, 2.5, 4.0],
            min_box_size: 1e-4,
            empty_box_size: 0.1,
        }
    }
}

/// The surface rebuilt for one part.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconstructedSurface {
    /// A triangle mesh through the input points.
    Mesh(TriangleMesh),
    /// An axis aligned box primitive.
    BoundingBox {
        /// Center of the box.
        center: [f64; 3],
        /// Edge lengths, all strictly positive.
        size: [f64; 3],
    },
}

impl ReconstructedSurface {
    /// Check if the surface is the box primitive.
    pub fn is_fallback(&self) -> bool {
        matches!(self, ReconstructedSurface::BoundingBox { .. })
    }

    /// The surface as a triangle mesh, triangulating the box if needed.
    pub fn to_mesh(&self) -> TriangleMesh {
        match self {
            ReconstructedSurface::Mesh(mesh) => mesh.clone(),
            ReconstructedSurface::BoundingBox { center, size } => {
                TriangleMesh::axis_aligned_box(*center, *size)
            }
        }
    }
}

/// Rebuilds part surfaces from point subsets.
#[derive(Debug, Clone, Default)]
pub struct MeshReconstructor {
    params: ReconstructionParams,
}

impl MeshReconstructor {
    /// Create a reconstructor with the given parameters.
    pub fn new(params: ReconstructionParams) -> Self {
        Self { params }
    }

    /// The reconstruction parameters.
    pub fn params(&self) -> &ReconstructionParams {
        &self.params
    }

    /// Rebuild a surface, never failing.
    ///
    /// Any reconstruction error is logged and replaced by the bounding box of
    /// the points.
    pub fn reconstruct(&self, points: &[[f64; 3]]) -> ReconstructedSurface {
        match self.try_reconstruct(points) {
            Ok(mesh) => ReconstructedSurface::Mesh(mesh),
            Err(err) => {
                log::warn!(
                    "falling back to a bounding box for {} points: {err}",
                    points.len()
                );
                self.bounding_box(points)
            }
        }
    }

    /// Rebuild a cleaned triangle mesh through the points.
    pub fn try_reconstruct(&self, points: &[[f64; 3]]) -> Result<TriangleMesh, ReconstructionError> {
        if self.params.method == ReconstructionMethod::BoundingBox {
            return Err(ReconstructionError::Unavailable);
        }
        if points.len() < 3 {
            return Err(ReconstructionError::TooFewPoints(points.len()));
        }
        if !points.iter().flatten().all(|c| c.is_finite()) {
            return Err(ReconstructionError::NonFinite);
        }

        let spacing = mean_spacing(points);
        if !(spacing > 0.0) {
            return Err(ReconstructionError::ZeroSpacing);
        }
        let radii = self
            .params
            .radius_factors
            .iter()
            .map(|f| f * spacing)
            .collect::<Vec<_>>();

        let mut normals = estimate_normals(points, self.params.normal_neighbors);
        orient_normals(points, &mut normals, self.params.orientation_neighbors);

        let mut mesh = ball_pivoting(points, &normals, &radii)?;
        clean_mesh(&mut mesh);
        if mesh.is_empty() {
            return Err(ReconstructionError::EmptyMesh);
        }

        log::debug!(
            "reconstructed {} triangles from {} points, radii {radii:?}",
            mesh.num_faces(),
            points.len()
        );
        Ok(mesh)
    }

    /// The axis aligned bounding box of the points, with every edge at least
    /// the configured minimum. An empty set gets a small box at the origin.
    pub fn bounding_box(&self, points: &[[f64; 3]]) -> ReconstructedSurface {
        match bounds_of(points) {
            Some((min, max)) => ReconstructedSurface::BoundingBox {
                center: std::array::from_fn(|i| (min[i] + max[i]) / 2.0),
                size: std::array::from_fn(|i| (max[i] - min[i]).max(self.params.min_box_size)),
            },
            None => ReconstructedSurface::BoundingBox {
                center: [0.0; 3],
                size: [self.params.empty_box_size; 3],
            },
        }
    }
}

/// Mean distance from every point to its closest other point.
fn mean_spacing(points: &[[f64; 3]]) -> f64 {
    let index = PointIndex::new(points);
    let total = points
        .iter()
        .filter_map(|p| index.k_nearest(p, 2).get(1).map(|nb| nb.distance))
        .sum::<f64>();
    total / points.len() as f64
}

/// Remove the usual ball pivoting artifacts from a mesh.
pub fn clean_mesh(mesh: &mut TriangleMesh) {
    let duplicated = mesh.remove_duplicated_triangles();
    let degenerate = mesh.remove_degenerate_triangles();
    let merged = mesh.remove_duplicated_vertices();
    let non_manifold = mesh.remove_non_manifold_edges();
    let unreferenced = mesh.remove_unreferenced_vertices();
    log::debug!(
        "cleaned mesh: {duplicated} duplicated, {degenerate} degenerate and {non_manifold} \
         non-manifold triangles, {merged} merged and {unreferenced} unreferenced vertices"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sphere(n: usize) -> Vec<[f64; 3]> {
        let golden = std::f64::consts::PI * (3.0 - 5f64.sqrt());
        (0..n)
            .map(|i| {
                let y = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
                let r = (1.0 - y * y).sqrt();
                let theta = golden * i as f64;
                [r * theta.cos(), y, r * theta.sin()]
            })
            .collect()
    }

    #[test]
    fn test_reconstruct_sphere() {
        let points = sphere(500);
        let surface = MeshReconstructor::default().reconstruct(&points);
        let ReconstructedSurface::Mesh(mesh) = surface else {
            panic!("expected a mesh, got {surface:?}");
        };
        assert!(mesh.num_faces() > 100);
        // vertices are input points, never moved
        for v in mesh.vertices() {
            assert!(points.contains(v));
        }
    }

    #[test]
    fn test_fallback_for_sparse_points() {
        let points = [[0.0, 0.0, 0.0], [1.0, 2.0, 0.0]];
        let surface = MeshReconstructor::default().reconstruct(&points);
        assert_eq!(
            surface,
            ReconstructedSurface::BoundingBox {
                center: [0.5, 1.0, 0.0],
                size: [1.0, 2.0, 1e-4],
            }
        );
        assert!(surface.is_fallback());
        assert_relative_eq!(surface.to_mesh().surface_area(), 2.0 * (2.0 + 1e-4 + 2e-4), epsilon = 1e-9);
    }

    #[test]
    fn test_fallback_for_empty_part() {
        let surface = MeshReconstructor::default().reconstruct(&[]);
        assert_eq!(
            surface,
            ReconstructedSurface::BoundingBox {
                center: [0.0; 3],
                size: [0.1; 3],
            }
        );
    }

    #[test]
    fn test_unavailable_method() {
        let reconstructor = MeshReconstructor::new(ReconstructionParams {
            method: ReconstructionMethod::BoundingBox,
            ..Default::default()
        });
        let points = sphere(50);
        assert_eq!(
            reconstructor.try_reconstruct(&points),
            Err(ReconstructionError::Unavailable)
        );
        assert!(reconstructor.reconstruct(&points).is_fallback());
    }

    #[test]
    fn test_coincident_points() {
        let points = [[1.0, 1.0, 1.0]; 4];
        assert_eq!(
            MeshReconstructor::default().try_reconstruct(&points),
            Err(ReconstructionError::ZeroSpacing)
        );
    }
}
