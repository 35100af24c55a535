use std::collections::BinaryHeap;

use glam::DVec3;
use rayon::prelude::*;

use crate::{linalg, neighbors::PointIndex};

/// Normal used when a neighborhood is too small to fit a plane.
const FALLBACK_NORMAL: DVec3 = DVec3::Z;

/// Estimate a unit normal per point from its local neighborhood.
///
/// The normal is the eigenvector of the smallest eigenvalue of the covariance
/// of the `k` nearest neighbors (the point itself included). The sign is
/// arbitrary; use [`orient_normals`] to make it consistent.
pub fn estimate_normals(points: &[[f64; 3]], k: usize) -> Vec<[f64; 3]> {
    let index = PointIndex::new(points);
    points
        .par_iter()
        .map(|p| {
            let neighborhood = index
                .k_nearest(p, k)
                .iter()
                .map(|n| DVec3::from_array(points[n.index]))
                .collect::<Vec<_>>();
            if neighborhood.len() < 3 {
                return FALLBACK_NORMAL.to_array();
            }
            match linalg::covariance3(&neighborhood) {
                Some((_, cov)) => {
                    let normal = linalg::symmetric_eigen3(&cov).eigenvectors.col(0);
                    if normal.length_squared() > 0.0 {
                        normal.to_array()
                    } else {
                        FALLBACK_NORMAL.to_array()
                    }
                }
                None => FALLBACK_NORMAL.to_array(),
            }
        })
        .collect()
}

// Edge of the neighborhood graph, ordered so the heap pops the lightest first.
#[derive(PartialEq)]
struct GraphEdge {
    weight: f64,
    from: usize,
    to: usize,
}

impl Eq for GraphEdge {}

impl Ord for GraphEdge {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.weight.total_cmp(&self.weight)
    }
}

impl PartialOrd for GraphEdge {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Flip normals so that neighboring normals agree in sign.
///
/// Orientation is propagated along a minimum spanning tree of the `k` nearest
/// neighbor graph weighted by `1 - |n_i · n_j|`, so nearly parallel normals
/// are visited first. Disconnected pieces are handled one after another.
/// Finally, all normals are flipped if most of them point towards the
/// centroid of the set.
///
/// PRECONDITION: `points` and `normals` have the same length.
pub fn orient_normals(points: &[[f64; 3]], normals: &mut [[f64; 3]], k: usize) {
    assert_eq!(points.len(), normals.len());
    let n = points.len();
    if n == 0 {
        return;
    }

    let index = PointIndex::new(points);
    let mut adjacency = vec![Vec::new(); n];
    for (i, p) in points.iter().enumerate() {
        for nb in index.k_nearest(p, k + 1) {
            if nb.index != i {
                adjacency[i].push(nb.index);
                adjacency[nb.index].push(i);
            }
        }
    }

    let weight = |normals: &[[f64; 3]], i: usize, j: usize| {
        1.0 - DVec3::from_array(normals[i])
            .dot(DVec3::from_array(normals[j]))
            .abs()
    };

    // prim's algorithm, restarted on every unvisited component
    let mut visited = vec![false; n];
    let mut heap = BinaryHeap::new();
    for start in 0..n {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        for &j in &adjacency[start] {
            heap.push(GraphEdge {
                weight: weight(&*normals, start, j),
                from: start,
                to: j,
            });
        }

        while let Some(edge) = heap.pop() {
            if visited[edge.to] {
                continue;
            }
            visited[edge.to] = true;

            let parent = DVec3::from_array(normals[edge.from]);
            let child = DVec3::from_array(normals[edge.to]);
            if parent.dot(child) < 0.0 {
                normals[edge.to] = (-child).to_array();
            }

            for &j in &adjacency[edge.to] {
                if !visited[j] {
                    heap.push(GraphEdge {
                        weight: weight(&*normals, edge.to, j),
                        from: edge.to,
                        to: j,
                    });
                }
            }
        }
    }

    let centroid = points.iter().map(|p| DVec3::from_array(*p)).sum::<DVec3>() / n as f64;
    let inward = points
        .iter()
        .zip(normals.iter())
        .filter(|(p, nrm)| DVec3::from_array(**nrm).dot(DVec3::from_array(**p) - centroid) < 0.0)
        .count();
    if 2 * inward > n {
        log::debug!("flipping {n} normals, {inward} pointed inwards");
        for nrm in normals.iter_mut() {
            *nrm = nrm.map(|c| -c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fibonacci_sphere(n: usize, radius: f64) -> Vec<[f64; 3]> {
        let golden = std::f64::consts::PI * (3.0 - 5f64.sqrt());
        (0..n)
            .map(|i| {
                let y = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
                let r = (1.0 - y * y).sqrt();
                let theta = golden * i as f64;
                [radius * r * theta.cos(), radius * y, radius * r * theta.sin()]
            })
            .collect()
    }

    #[test]
    fn test_plane_normals() {
        let points = (0..10)
            .flat_map(|i| (0..10).map(move |j| [i as f64 * 0.1, j as f64 * 0.1, 2.0]))
            .collect::<Vec<_>>();
        let normals = estimate_normals(&points, 8);
        for n in normals {
            assert_relative_eq!(n[2].abs(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_sphere_normals_point_outwards() {
        let points = fibonacci_sphere(400, 1.0);
        let mut normals = estimate_normals(&points, 12);
        orient_normals(&points, &mut normals, 10);
        for (p, n) in points.iter().zip(normals.iter()) {
            let radial = DVec3::from_array(*p).normalize();
            assert!(radial.dot(DVec3::from_array(*n)) > 0.9);
        }
    }

    #[test]
    fn test_orient_empty() {
        let mut normals: Vec<[f64; 3]> = Vec::new();
        orient_normals(&[], &mut normals, 5);
        assert!(normals.is_empty());
    }
}
