use std::num::NonZero;

use kiddo::immutable::float::kdtree::ImmutableKdTree;

/// A neighbor returned by a [`PointIndex`] query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index of the point in the indexed slice.
    pub index: usize,
    /// Euclidean distance to the query.
    pub distance: f64,
}

/// Nearest-neighbor index over a fixed set of 3D points.
pub struct PointIndex {
    // None when built from an empty slice
    tree: Option<ImmutableKdTree<f64, u32, 3, 32>>,
    len: usize,
}

impl PointIndex {
    /// Build the index over `points`. Returned indices refer to this slice.
    pub fn new(points: &[[f64; 3]]) -> Self {
        let tree = (!points.is_empty()).then(|| ImmutableKdTree::new_from_slice(points));
        Self {
            tree,
            len: points.len(),
        }
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the index holds no points.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The closest indexed point to `query`.
    pub fn nearest(&self, query: &[f64; 3]) -> Option<Neighbor> {
        let nn = self
            .tree
            .as_ref()?
            .nearest_one::<kiddo::SquaredEuclidean>(query);
        Some(Neighbor {
            index: nn.item as usize,
            distance: nn.distance.sqrt(),
        })
    }

    /// The `k` closest points, nearest first.
    pub fn k_nearest(&self, query: &[f64; 3], k: usize) -> Vec<Neighbor> {
        let (Some(tree), Some(k)) = (self.tree.as_ref(), NonZero::new(k)) else {
            return Vec::new();
        };
        tree.nearest_n::<kiddo::SquaredEuclidean>(query, k)
            .into_iter()
            .map(|nn| Neighbor {
                index: nn.item as usize,
                distance: nn.distance.sqrt(),
            })
            .collect()
    }

    /// All points within `radius` of `query`, nearest first.
    pub fn within_radius(&self, query: &[f64; 3], radius: f64) -> Vec<Neighbor> {
        let Some(tree) = self.tree.as_ref() else {
            return Vec::new();
        };
        tree.within::<kiddo::SquaredEuclidean>(query, radius * radius)
            .into_iter()
            .map(|nn| Neighbor {
                index: nn.item as usize,
                distance: nn.distance.sqrt(),
            })
            .collect()
    }
}
