use glam::DVec3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    mesh::TriangleMesh,
    pointcloud::{LabeledPoint, DEFAULT_COLOR},
    transforms::RigidTransform,
};

/// Error types for the sampling module.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SamplingError {
    /// The geometry cannot be sampled (no vertices, non-finite coordinates or zero area).
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// Every part was skipped or produced no samples.
    #[error("sampling produced no points across {num_parts} parts")]
    EmptyResult {
        /// Number of parts that were given to the sampler.
        num_parts: usize,
    },
}

/// How points are drawn from a geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleMode {
    /// Area weighted random samples on the triangle surfaces.
    #[default]
    Surface,
    /// Every vertex exactly once.
    Vertices,
}

/// Parameters of the geometry sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Number of surface samples drawn from each geometry.
    pub samples_per_geometry: usize,
    /// Seed of the random stream.
    pub seed: u64,
    /// Sampling mode.
    pub mode: SampleMode,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            samples_per_geometry: 2048,
            seed: 0,
            mode: SampleMode::Surface,
        }
    }
}

/// A local-space mesh together with its part label and world placement.
#[derive(Debug, Clone, Copy)]
pub struct PartGeometry<'a> {
    /// Label id of the owning part.
    pub label: u32,
    /// Mesh in the owning frame's local coordinates.
    pub mesh: &'a TriangleMesh,
    /// Transform from the owning frame to world coordinates.
    pub world_transform: RigidTransform,
}

/// Draws labeled samples from part geometries in world space.
#[derive(Debug, Clone, Default)]
pub struct GeometrySampler {
    config: SamplerConfig,
}

impl GeometrySampler {
    /// Create a sampler with the given parameters.
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// The sampler parameters.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Sample a single part.
    ///
    /// `part_index` selects the part's own random stream, so the result does
    /// not depend on which other parts are sampled or in which order.
    pub fn sample_part(
        &self,
        part_index: usize,
        part: &PartGeometry<'_>,
    ) -> Result<Vec<LabeledPoint>, SamplingError> {
        // work on a private copy, the local mesh is never touched
        let world_mesh = part
            .mesh
            .map_vertices(|v| part.world_transform.transform_point(v));

        match self.config.mode {
            SampleMode::Surface => {
                let mut rng = StdRng::seed_from_u64(part_seed(self.config.seed, part_index));
                sample_surface(
                    &world_mesh,
                    self.config.samples_per_geometry,
                    part.label,
                    &mut rng,
                )
            }
            SampleMode::Vertices => sample_vertices(&world_mesh, part.label),
        }
    }

    /// Sample every part in parallel.
    ///
    /// Degenerate parts are skipped with a warning and yield an empty entry,
    /// so the output is index-aligned with `parts`. Fails only when no part
    /// produced any sample.
    pub fn sample_parts(
        &self,
        parts: &[PartGeometry<'_>],
    ) -> Result<Vec<Vec<LabeledPoint>>, SamplingError> {
        let samples = parts
            .par_iter()
            .enumerate()
            .map(|(i, part)| match self.sample_part(i, part) {
                Ok(points) => points,
                Err(err) => {
                    log::warn!("skipping geometry {i} of part {}: {err}", part.label);
                    Vec::new()
                }
            })
            .collect::<Vec<_>>();

        let total = samples.iter().map(Vec::len).sum::<usize>();
        log::debug!("sampled {total} points from {} geometries", parts.len());
        if total == 0 {
            return Err(SamplingError::EmptyResult {
                num_parts: parts.len(),
            });
        }
        Ok(samples)
    }
}

/// Derive an independent seed for the stream of one part (splitmix64).
fn part_seed(seed: u64, part_index: usize) -> u64 {
    let mut z = seed ^ (part_index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn check_vertices(mesh: &TriangleMesh) -> Result<(), SamplingError> {
    if mesh.num_vertices() == 0 {
        return Err(SamplingError::DegenerateGeometry("mesh has no vertices".into()));
    }
    if !mesh.has_finite_vertices() {
        return Err(SamplingError::DegenerateGeometry(
            "mesh has non-finite vertex coordinates".into(),
        ));
    }
    Ok(())
}

/// Draw `num_samples` points uniformly over the surface of a mesh.
///
/// A triangle is chosen with probability proportional to its area, then a
/// point inside it is drawn from two uniform numbers reflected across the
/// diagonal when their sum exceeds one. Colors are interpolated from the
/// vertex colors when the mesh has them, white otherwise.
///
/// # Arguments
///
/// * `mesh` - The mesh to sample, already in the desired coordinates.
/// * `num_samples` - Number of samples to draw.
/// * `label` - Label attached to every sample.
/// * `rng` - Random number generator.
pub fn sample_surface<R: Rng>(
    mesh: &TriangleMesh,
    num_samples: usize,
    label: u32,
    rng: &mut R,
) -> Result<Vec<LabeledPoint>, SamplingError> {
    check_vertices(mesh)?;

    // cumulative area table
    let mut cdf = Vec::with_capacity(mesh.num_faces());
    let mut total = 0.0;
    for face in mesh.faces() {
        total += mesh.face_area(face);
        cdf.push(total);
    }
    if !(total > 0.0) {
        return Err(SamplingError::DegenerateGeometry(format!(
            "mesh with {} faces has zero surface area",
            mesh.num_faces()
        )));
    }

    let vertices = mesh.vertices();
    let colors = mesh.colors();
    let samples = (0..num_samples)
        .map(|_| {
            let r = rng.random::<f64>() * total;
            let fi = cdf.partition_point(|&c| c <= r).min(cdf.len() - 1);
            let face = mesh.faces()[fi];

            let (mut u, mut v) = (rng.random::<f64>(), rng.random::<f64>());
            if u + v > 1.0 {
                u = 1.0 - u;
                v = 1.0 - v;
            }
            let w = 1.0 - u - v;

            let interp = |data: &[[f64; 3]]| {
                let a = DVec3::from_array(data[face[0]]);
                let b = DVec3::from_array(data[face[1]]);
                let c = DVec3::from_array(data[face[2]]);
                (a * w + b * u + c * v).to_array()
            };

            LabeledPoint {
                position: interp(vertices),
                color: colors.map_or(DEFAULT_COLOR, interp),
                label,
            }
        })
        .collect();

    Ok(samples)
}

/// Emit every vertex of a mesh as a labeled point.
pub fn sample_vertices(mesh: &TriangleMesh, label: u32) -> Result<Vec<LabeledPoint>, SamplingError> {
    check_vertices(mesh)?;
    Ok(mesh
        .vertices()
        .iter()
        .enumerate()
        .map(|(i, v)| LabeledPoint {
            position: *v,
            color: mesh.colors().map_or(DEFAULT_COLOR, |c| c[i]),
            label,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box() -> TriangleMesh {
        TriangleMesh::axis_aligned_box([0.0; 3], [1.0; 3])
    }

    #[test]
    fn test_sample_surface_count() -> Result<(), SamplingError> {
        let mut rng = StdRng::seed_from_u64(7);
        for num_samples in [1, 10, 777] {
            let samples = sample_surface(&unit_box(), num_samples, 3, &mut rng)?;
            assert_eq!(samples.len(), num_samples);
            assert!(samples.iter().all(|p| p.label == 3));
        }
        Ok(())
    }

    #[test]
    fn test_samples_lie_on_surface() -> Result<(), SamplingError> {
        let mut rng = StdRng::seed_from_u64(1);
        let samples = sample_surface(&unit_box(), 500, 0, &mut rng)?;
        for p in samples {
            let on_face = p.position.iter().any(|c| (c.abs() - 0.5).abs() < 1e-9);
            let inside = p.position.iter().all(|c| c.abs() <= 0.5 + 1e-9);
            assert!(on_face && inside, "{:?}", p.position);
            assert_eq!(p.color, DEFAULT_COLOR);
        }
        Ok(())
    }

    #[test]
    fn test_sample_surface_interpolates_colors() -> Result<(), Box<dyn std::error::Error>> {
        let mesh = TriangleMesh::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![[0, 1, 2]],
            Some(vec![[1.0, 0.0, 0.0]; 3]),
        )?;
        let mut rng = StdRng::seed_from_u64(0);
        let samples = sample_surface(&mesh, 20, 0, &mut rng)?;
        for p in samples {
            assert_relative_eq!(p.color[0], 1.0, epsilon = 1e-12);
            assert!(p.position[0] + p.position[1] <= 1.0 + 1e-12);
        }
        Ok(())
    }

    #[test]
    fn test_degenerate_geometry() -> Result<(), Box<dyn std::error::Error>> {
        let mut rng = StdRng::seed_from_u64(0);
        let empty = TriangleMesh::default();
        assert!(matches!(
            sample_surface(&empty, 10, 0, &mut rng),
            Err(SamplingError::DegenerateGeometry(_))
        ));

        let flat = TriangleMesh::new(vec![[0.0; 3], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]], vec![[0, 1, 2]], None)?;
        assert!(matches!(
            sample_surface(&flat, 10, 0, &mut rng),
            Err(SamplingError::DegenerateGeometry(_))
        ));

        let nan = TriangleMesh::new(vec![[f64::NAN; 3]], vec![], None)?;
        assert!(matches!(
            sample_vertices(&nan, 0),
            Err(SamplingError::DegenerateGeometry(_))
        ));
        Ok(())
    }

    #[test]
    fn test_sample_parts_is_reproducible_and_transformed() -> Result<(), SamplingError> {
        let mesh = unit_box();
        let parts = [
            PartGeometry {
                label: 0,
                mesh: &mesh,
                world_transform: RigidTransform::IDENTITY,
            },
            PartGeometry {
                label: 1,
                mesh: &mesh,
                world_transform: RigidTransform::from_translation([0.0, 0.0, 10.0]),
            },
        ];
        let sampler = GeometrySampler::new(SamplerConfig {
            samples_per_geometry: 64,
            seed: 42,
            mode: SampleMode::Surface,
        });
        let a = sampler.sample_parts(&parts)?;
        let b = sampler.sample_parts(&parts)?;
        assert_eq!(a, b);
        assert_eq!(a[1].len(), 64);
        assert!(a[1].iter().all(|p| p.position[2] >= 9.5 - 1e-9 && p.label == 1));
        // the local mesh is left untouched
        assert_eq!(mesh, unit_box());
        Ok(())
    }

    #[test]
    fn test_sample_parts_skips_degenerate() -> Result<(), SamplingError> {
        let good = unit_box();
        let bad = TriangleMesh::default();
        let parts = [
            PartGeometry {
                label: 0,
                mesh: &bad,
                world_transform: RigidTransform::IDENTITY,
            },
            PartGeometry {
                label: 1,
                mesh: &good,
                world_transform: RigidTransform::IDENTITY,
            },
        ];
        let sampler = GeometrySampler::new(SamplerConfig {
            samples_per_geometry: 8,
            ..Default::default()
        });
        let samples = sampler.sample_parts(&parts)?;
        assert!(samples[0].is_empty());
        assert_eq!(samples[1].len(), 8);

        let only_bad = [parts[0]];
        assert_eq!(
            sampler.sample_parts(&only_bad),
            Err(SamplingError::EmptyResult { num_parts: 1 })
        );
        Ok(())
    }

    #[test]
    fn test_sample_vertices_mode() -> Result<(), SamplingError> {
        let mesh = unit_box();
        let sampler = GeometrySampler::new(SamplerConfig {
            mode: SampleMode::Vertices,
            ..Default::default()
        });
        let part = PartGeometry {
            label: 2,
            mesh: &mesh,
            world_transform: RigidTransform::from_translation([1.0, 0.0, 0.0]),
        };
        let samples = sampler.sample_part(0, &part)?;
        assert_eq!(samples.len(), 8);
        assert!(samples.iter().all(|p| p.position[0] >= 0.5));
        Ok(())
    }
}
