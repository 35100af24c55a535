//! Ball pivoting surface reconstruction.
//!
//! A ball of radius `r` is placed on three points so that no other point lies
//! inside it; the three points form a seed triangle. The ball then pivots
//! around each boundary edge of the growing mesh until it touches another
//! point, which closes a new triangle. When no edge can pivot any further a
//! new seed is searched. Running the procedure with increasing radii fills
//! holes left by sparser regions.
//!
//! Points must come with oriented normals: the ball always rolls on the side
//! the normals point to.

use std::collections::{HashMap, HashSet, VecDeque};

use glam::DVec3;

use crate::{
    mesh::{MeshError, TriangleMesh},
    neighbors::PointIndex,
};

/// Relative slack used when testing that a ball is empty.
const EMPTY_BALL_TOLERANCE: f64 = 1e-7;
const ANGLE_TOLERANCE: f64 = 1e-9;

/// Error types for the ball pivoting module.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BallPivotingError {
    /// Points and normals differ in count.
    #[error("got {num_points} points but {num_normals} normals")]
    NormalCountMismatch {
        /// Number of points.
        num_points: usize,
        /// Number of normals.
        num_normals: usize,
    },

    /// A radius is not a positive finite number.
    #[error("invalid ball radius {0}")]
    InvalidRadius(f64),

    /// The triangulation could not be turned into a mesh.
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

// A directed boundary edge `a -> b` of a triangle whose third vertex is
// `opposite`, with the center of the ball resting on that triangle.
#[derive(Debug, Clone, Copy)]
struct FrontEdge {
    a: usize,
    b: usize,
    opposite: usize,
    center: DVec3,
}

fn edge_key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

fn triangle_key(f: [usize; 3]) -> [usize; 3] {
    let mut key = f;
    key.sort_unstable();
    key
}

/// Center of the ball of radius `r` touching `a`, `b` and `c`, on the side of
/// the triangle normal `(b - a) × (c - a)`.
fn ball_center(a: DVec3, b: DVec3, c: DVec3, r: f64) -> Option<DVec3> {
    let ab = b - a;
    let ac = c - a;
    let w = ab.cross(ac);
    let w2 = w.length_squared();
    if w2 <= f64::EPSILON * ab.length_squared() * ac.length_squared() {
        return None;
    }
    let circumcenter =
        a + (w.cross(ab) * ac.length_squared() + ac.cross(w) * ab.length_squared()) / (2.0 * w2);
    let h2 = r * r - (a - circumcenter).length_squared();
    if h2 < 0.0 {
        return None;
    }
    Some(circumcenter + w / w2.sqrt() * h2.sqrt())
}

struct Pivoter<'a> {
    points: Vec<DVec3>,
    normals: Vec<DVec3>,
    index: &'a PointIndex,
    used: Vec<bool>,
    edge_use: HashMap<(usize, usize), u8>,
    triangles: HashSet<[usize; 3]>,
    faces: Vec<[usize; 3]>,
    front: VecDeque<FrontEdge>,
}

impl Pivoter<'_> {
    fn is_empty_ball(&self, center: DVec3, r: f64, f: [usize; 3]) -> bool {
        let inner = r * (1.0 - EMPTY_BALL_TOLERANCE);
        self.index
            .within_radius(&center.to_array(), inner)
            .iter()
            .all(|nb| f.contains(&nb.index))
    }

    fn agrees_with_normals(&self, f: [usize; 3]) -> bool {
        let [a, b, c] = f.map(|i| self.points[i]);
        let n = (b - a).cross(c - a);
        f.iter().all(|&i| n.dot(self.normals[i]) > 0.0)
    }

    fn edge_count(&self, a: usize, b: usize) -> u8 {
        self.edge_use.get(&edge_key(a, b)).copied().unwrap_or(0)
    }

    fn add_triangle(&mut self, f: [usize; 3], center: DVec3) {
        self.triangles.insert(triangle_key(f));
        self.faces.push(f);
        for &v in &f {
            self.used[v] = true;
        }
        for (a, b, opposite) in [(f[0], f[1], f[2]), (f[1], f[2], f[0]), (f[2], f[0], f[1])] {
            let count = self.edge_use.entry(edge_key(a, b)).or_insert(0);
            *count += 1;
            if *count == 1 {
                self.front.push_back(FrontEdge {
                    a,
                    b,
                    opposite,
                    center,
                });
            }
        }
    }

    fn can_add(&self, f: [usize; 3]) -> bool {
        !self.triangles.contains(&triangle_key(f))
            && self.edge_count(f[0], f[1]) < 2
            && self.edge_count(f[1], f[2]) < 2
            && self.edge_count(f[2], f[0]) < 2
    }

    /// Try to build a seed triangle around vertex `i`.
    fn find_seed(&mut self, i: usize, r: f64) -> bool {
        let neighbors = self
            .index
            .within_radius(&self.points[i].to_array(), 2.0 * r)
            .into_iter()
            .map(|nb| nb.index)
            .filter(|&j| j != i && !self.used[j])
            .collect::<Vec<_>>();

        for (n, &j) in neighbors.iter().enumerate() {
            for &k in &neighbors[n + 1..] {
                let (pi, pj, pk) = (self.points[i], self.points[j], self.points[k]);
                let f = if (pj - pi).cross(pk - pi).dot(self.normals[i]) >= 0.0 {
                    [i, j, k]
                } else {
                    [i, k, j]
                };
                if !self.agrees_with_normals(f) || !self.can_add(f) {
                    continue;
                }
                let [a, b, c] = f.map(|v| self.points[v]);
                let Some(center) = ball_center(a, b, c, r) else {
                    continue;
                };
                if self.is_empty_ball(center, r, f) {
                    self.add_triangle(f, center);
                    return true;
                }
            }
        }
        false
    }

    /// Pivot the ball around a front edge and return the triangle it closes.
    fn pivot(&self, edge: &FrontEdge, r: f64) -> Option<([usize; 3], DVec3)> {
        let (pa, pb) = (self.points[edge.a], self.points[edge.b]);
        let mid = (pa + pb) * 0.5;
        let axis = (pb - pa).normalize_or_zero();
        let perp = |v: DVec3| v - axis * v.dot(axis);
        let u0 = perp(edge.center - mid);

        let mut candidates = self
            .index
            .within_radius(&mid.to_array(), 2.0 * r)
            .into_iter()
            .filter(|nb| nb.index != edge.a && nb.index != edge.b && nb.index != edge.opposite)
            .filter_map(|nb| {
                // the new triangle walks the shared edge the other way round
                let f = [edge.b, edge.a, nb.index];
                let center = ball_center(pb, pa, self.points[nb.index], r)?;
                let u1 = perp(center - mid);
                let mut angle = axis.dot(u0.cross(u1)).atan2(u0.dot(u1));
                if angle < -ANGLE_TOLERANCE {
                    angle += std::f64::consts::TAU;
                } else if angle < 0.0 {
                    // co-spherical points sit at zero up to rounding
                    angle = 0.0;
                }
                Some((angle, f, center))
            })
            .collect::<Vec<_>>();
        candidates.sort_by(|x, y| x.0.total_cmp(&y.0));

        candidates.into_iter().find_map(|(_, f, center)| {
            (self.agrees_with_normals(f) && self.can_add(f) && self.is_empty_ball(center, r, f))
                .then_some((f, center))
        })
    }

    fn expand_front(&mut self, r: f64) {
        while let Some(edge) = self.front.pop_front() {
            if self.edge_count(edge.a, edge.b) != 1 {
                continue;
            }
            if let Some((f, center)) = self.pivot(&edge, r) {
                self.add_triangle(f, center);
            }
        }
    }

    /// Put every boundary edge back on the front with a ball of radius `r`.
    fn requeue_boundary(&mut self, r: f64) {
        let mut requeued = Vec::new();
        for f in &self.faces {
            for (a, b, opposite) in [(f[0], f[1], f[2]), (f[1], f[2], f[0]), (f[2], f[0], f[1])] {
                if self.edge_count(a, b) != 1 {
                    continue;
                }
                let (pa, pb, pc) = (self.points[a], self.points[b], self.points[opposite]);
                if let Some(center) = ball_center(pa, pb, pc, r) {
                    requeued.push(FrontEdge {
                        a,
                        b,
                        opposite,
                        center,
                    });
                }
            }
        }
        self.front.extend(requeued);
    }
}

/// Reconstruct a triangle mesh from oriented points with ball pivoting.
///
/// The radii are processed in the given order, so they should be increasing.
/// The output keeps every input point as a vertex, including points no
/// triangle reached; use [`TriangleMesh::remove_unreferenced_vertices`] to drop
/// them.
///
/// # Arguments
///
/// * `points` - The input points.
/// * `normals` - Consistently oriented unit normals, one per point.
/// * `radii` - Ball radii.
pub fn ball_pivoting(
    points: &[[f64; 3]],
    normals: &[[f64; 3]],
    radii: &[f64],
) -> Result<TriangleMesh, BallPivotingError> {
    if points.len() != normals.len() {
        return Err(BallPivotingError::NormalCountMismatch {
            num_points: points.len(),
            num_normals: normals.len(),
        });
    }
    if let Some(&r) = radii.iter().find(|r| !(r.is_finite() && **r > 0.0)) {
        return Err(BallPivotingError::InvalidRadius(r));
    }

    let index = PointIndex::new(points);
    let mut pivoter = Pivoter {
        points: points.iter().map(|p| DVec3::from_array(*p)).collect(),
        normals: normals.iter().map(|n| DVec3::from_array(*n)).collect(),
        index: &index,
        used: vec![false; points.len()],
        edge_use: HashMap::new(),
        triangles: HashSet::new(),
        faces: Vec::new(),
        front: VecDeque::new(),
    };

    for (pass, &r) in radii.iter().enumerate() {
        if pass > 0 {
            pivoter.requeue_boundary(r);
            pivoter.expand_front(r);
        }
        for i in 0..points.len() {
            if pivoter.used[i] {
                continue;
            }
            if pivoter.find_seed(i, r) {
                pivoter.expand_front(r);
            }
        }
        log::debug!(
            "ball pivoting radius {r:.5}: {} triangles",
            pivoter.faces.len()
        );
    }

    Ok(TriangleMesh::new(points.to_vec(), pivoter.faces, None)?)
}
