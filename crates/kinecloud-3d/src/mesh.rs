use std::collections::{HashMap, HashSet};

use glam::DVec3;

/// Error types for the mesh module.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MeshError {
    /// A face references a vertex index outside of the vertex array.
    #[error("face {face} references vertex {vertex} but the mesh has {num_vertices} vertices")]
    InvalidFaceIndex {
        /// Index of the offending face.
        face: usize,
        /// The out of range vertex index.
        vertex: usize,
        /// Number of vertices in the mesh.
        num_vertices: usize,
    },

    /// Per-vertex colors do not match the vertex count.
    #[error("mesh has {num_vertices} vertices but {num_colors} colors")]
    ColorCountMismatch {
        /// Number of vertices in the mesh.
        num_vertices: usize,
        /// Number of colors provided.
        num_colors: usize,
    },
}

/// A triangle mesh with optional per-vertex colors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    // The vertex positions.
    vertices: Vec<[f64; 3]>,
    // The triangles as indices into `vertices`.
    faces: Vec<[usize; 3]>,
    // Optional per-vertex colors in [0, 1].
    colors: Option<Vec<[f64; 3]>>,
}

impl TriangleMesh {
    /// Create a new mesh, validating face indices and color count.
    pub fn new(
        vertices: Vec<[f64; 3]>,
        faces: Vec<[usize; 3]>,
        colors: Option<Vec<[f64; 3]>>,
    ) -> Result<Self, MeshError> {
        if let Some(colors) = &colors {
            if colors.len() != vertices.len() {
                return Err(MeshError::ColorCountMismatch {
                    num_vertices: vertices.len(),
                    num_colors: colors.len(),
                });
            }
        }
        for (face_idx, face) in faces.iter().enumerate() {
            if let Some(&vertex) = face.iter().find(|&&v| v >= vertices.len()) {
                return Err(MeshError::InvalidFaceIndex {
                    face: face_idx,
                    vertex,
                    num_vertices: vertices.len(),
                });
            }
        }
        Ok(Self {
            vertices,
            faces,
            colors,
        })
    }

    /// An axis aligned box centered at `center` with the given edge lengths.
    ///
    /// The 12 triangles are wound counter-clockwise seen from outside.
    pub fn axis_aligned_box(center: [f64; 3], size: [f64; 3]) -> Self {
        let h = [size[0] / 2.0, size[1] / 2.0, size[2] / 2.0];
        let vertices = (0..8)
            .map(|i| {
                let sx = if i & 1 == 0 { -1.0 } else { 1.0 };
                let sy = if i & 2 == 0 { -1.0 } else { 1.0 };
                let sz = if i & 4 == 0 { -1.0 } else { 1.0 };
                [
                    center[0] + sx * h[0],
                    center[1] + sy * h[1],
                    center[2] + sz * h[2],
                ]
            })
            .collect();
        let faces = vec![
            [0, 2, 1],
            [1, 2, 3],
            [4, 5, 6],
            [5, 7, 6],
            [0, 1, 4],
            [1, 5, 4],
            [2, 6, 3],
            [3, 6, 7],
            [0, 4, 2],
            [2, 4, 6],
            [1, 3, 5],
            [3, 7, 5],
        ];
        Self {
            vertices,
            faces,
            colors: None,
        }
    }

    /// Get the number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh has no faces.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Get as reference the vertices of the mesh.
    pub fn vertices(&self) -> &[[f64; 3]] {
        &self.vertices
    }

    /// Get as reference the faces of the mesh.
    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    /// Get as reference the per-vertex colors, if any.
    pub fn colors(&self) -> Option<&[[f64; 3]]> {
        self.colors.as_deref()
    }

    /// Check that every vertex coordinate is finite.
    pub fn has_finite_vertices(&self) -> bool {
        self.vertices.iter().flatten().all(|c| c.is_finite())
    }

    /// Area of a single face.
    pub fn face_area(&self, face: &[usize; 3]) -> f64 {
        let a = DVec3::from_array(self.vertices[face[0]]);
        let b = DVec3::from_array(self.vertices[face[1]]);
        let c = DVec3::from_array(self.vertices[face[2]]);
        0.5 * (b - a).cross(c - a).length()
    }

    /// Total surface area.
    pub fn surface_area(&self) -> f64 {
        self.faces.iter().map(|f| self.face_area(f)).sum()
    }

    /// The minimum and maximum corners of the vertex bounding box.
    pub fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        bounds_of(&self.vertices)
    }

    /// Return a copy of this mesh with `f` applied to every vertex.
    pub fn map_vertices(&self, f: impl Fn(&[f64; 3]) -> [f64; 3]) -> Self {
        Self {
            vertices: self.vertices.iter().map(f).collect(),
            faces: self.faces.clone(),
            colors: self.colors.clone(),
        }
    }

    /// Build a submesh from a subset of faces.
    ///
    /// Vertex positions are copied verbatim; only the vertices referenced by the
    /// selected faces are kept and re-indexed in order of first use.
    pub fn submesh(&self, face_indices: &[usize]) -> Self {
        let mut remap: HashMap<usize, usize> = HashMap::new();
        let mut vertices = Vec::new();
        let mut colors = self.colors.as_ref().map(|_| Vec::new());

        let faces = face_indices
            .iter()
            .map(|&fi| {
                let face = self.faces[fi];
                face.map(|v| {
                    *remap.entry(v).or_insert_with(|| {
                        vertices.push(self.vertices[v]);
                        if let (Some(dst), Some(src)) = (colors.as_mut(), self.colors.as_ref()) {
                            dst.push(src[v]);
                        }
                        vertices.len() - 1
                    })
                })
            })
            .collect();

        Self {
            vertices,
            faces,
            colors,
        }
    }

    /// Remove triangles that use the same three vertices as an earlier one,
    /// regardless of winding.
    pub fn remove_duplicated_triangles(&mut self) -> usize {
        let mut seen = HashSet::new();
        let before = self.faces.len();
        self.faces.retain(|f| {
            let mut key = *f;
            key.sort_unstable();
            seen.insert(key)
        });
        before - self.faces.len()
    }

    /// Remove triangles with repeated vertex indices or zero area.
    pub fn remove_degenerate_triangles(&mut self) -> usize {
        let before = self.faces.len();
        let vertices = &self.vertices;
        self.faces.retain(|f| {
            if f[0] == f[1] || f[1] == f[2] || f[0] == f[2] {
                return false;
            }
            let a = DVec3::from_array(vertices[f[0]]);
            let b = DVec3::from_array(vertices[f[1]]);
            let c = DVec3::from_array(vertices[f[2]]);
            (b - a).cross(c - a).length_squared() > 0.0
        });
        before - self.faces.len()
    }

    /// Merge vertices with bit-identical positions and re-index faces.
    pub fn remove_duplicated_vertices(&mut self) -> usize {
        let mut first_index: HashMap<[u64; 3], usize> = HashMap::new();
        let mut remap = Vec::with_capacity(self.vertices.len());
        let mut vertices = Vec::new();
        let mut colors = self.colors.as_ref().map(|_| Vec::new());

        for (i, v) in self.vertices.iter().enumerate() {
            let key = v.map(|c| (c + 0.0).to_bits());
            let idx = *first_index.entry(key).or_insert_with(|| {
                vertices.push(*v);
                if let (Some(dst), Some(src)) = (colors.as_mut(), self.colors.as_ref()) {
                    dst.push(src[i]);
                }
                vertices.len() - 1
            });
            remap.push(idx);
        }

        let removed = self.vertices.len() - vertices.len();
        for face in self.faces.iter_mut() {
            *face = face.map(|v| remap[v]);
        }
        self.vertices = vertices;
        self.colors = colors;
        removed
    }

    /// Remove triangles so that no edge is shared by more than two triangles.
    ///
    /// Triangles are visited in order and a triangle is dropped when any of its
    /// edges already has two incident triangles.
    pub fn remove_non_manifold_edges(&mut self) -> usize {
        let mut edge_count: HashMap<(usize, usize), usize> = HashMap::new();
        let before = self.faces.len();
        self.faces.retain(|f| {
            let edges = face_edges(f);
            if edges
                .iter()
                .any(|e| edge_count.get(e).copied().unwrap_or(0) >= 2)
            {
                return false;
            }
            for e in edges {
                *edge_count.entry(e).or_insert(0) += 1;
            }
            true
        });
        before - self.faces.len()
    }

    /// Drop vertices that no face references.
    pub fn remove_unreferenced_vertices(&mut self) -> usize {
        let mut used = vec![false; self.vertices.len()];
        for f in &self.faces {
            for &v in f {
                used[v] = true;
            }
        }
        let mut remap = vec![usize::MAX; self.vertices.len()];
        let mut next = 0;
        for (i, &u) in used.iter().enumerate() {
            if u {
                remap[i] = next;
                next += 1;
            }
        }
        let removed = self.vertices.len() - next;
        if removed == 0 {
            return 0;
        }

        let mut keep = used.iter();
        self.vertices.retain(|_| keep.next().copied().unwrap_or(false));
        if let Some(colors) = self.colors.as_mut() {
            let mut keep = used.iter();
            colors.retain(|_| keep.next().copied().unwrap_or(false));
        }
        for face in self.faces.iter_mut() {
            *face = face.map(|v| remap[v]);
        }
        removed
    }
}

/// The undirected edges of a triangle, each stored as `(min, max)`.
pub(crate) fn face_edges(f: &[usize; 3]) -> [(usize, usize); 3] {
    let edge = |a: usize, b: usize| (a.min(b), a.max(b));
    [edge(f[0], f[1]), edge(f[1], f[2]), edge(f[2], f[0])]
}

/// The minimum and maximum corners of a set of points.
pub fn bounds_of(points: &[[f64; 3]]) -> Option<([f64; 3], [f64; 3])> {
    let first = DVec3::from_array(*points.first()?);
    let (min, max) = points
        .iter()
        .map(|p| DVec3::from_array(*p))
        .fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
    Some((min.to_array(), max.to_array()))
}
