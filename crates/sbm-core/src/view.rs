use serde::{Deserialize, Serialize};

/// One adjacency-list entry: the neighbouring vertex and the connecting edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Adjacent {
    /// Vertex at the other end of the edge.
    pub vertex: usize,
    /// Identifier of the edge, stable while the edge exists.
    pub edge: usize,
}

impl Adjacent {
    /// Creates an adjacency entry.
    pub const fn new(vertex: usize, edge: usize) -> Self {
        Self { vertex, edge }
    }
}

/// Traversal contract consumed by the block-model engine.
///
/// Vertices are dense ids `0..num_vertices()`. Edge ids are dense enough to
/// index flat property arrays: every live edge id is below `edge_bound()`.
/// For undirected graphs `out_edges` lists every incident edge once (a
/// self-loop appears a single time) and `in_edges` is empty. For directed
/// graphs a self-loop appears once in each list.
pub trait GraphView: Send + Sync {
    /// Number of vertices.
    fn num_vertices(&self) -> usize;

    /// Number of live edges.
    fn num_edges(&self) -> usize;

    /// Exclusive upper bound on live edge ids.
    fn edge_bound(&self) -> usize;

    /// Returns whether edges are directed.
    fn is_directed(&self) -> bool;

    /// Out-edges of `v` (all incident edges for undirected graphs).
    fn out_edges(&self, v: usize) -> &[Adjacent];

    /// In-edges of `v`; empty for undirected graphs.
    fn in_edges(&self, v: usize) -> &[Adjacent];

    /// Source and target of edge `e`.
    fn endpoints(&self, e: usize) -> (usize, usize);

    /// Iterator over the ids of live edges.
    fn edges(&self) -> Box<dyn Iterator<Item = usize> + '_>;

    /// Integer multiplicity of edge `e`.
    fn edge_weight(&self, _e: usize) -> i64 {
        1
    }

    /// Number of real-valued covariate channels carried by each edge.
    fn num_covariates(&self) -> usize {
        0
    }

    /// Value of covariate `channel` on edge `e`.
    fn edge_covariate(&self, _e: usize, _channel: usize) -> f64 {
        0.0
    }

    /// Number of adjacency entries of `v` across both directions.
    fn total_adjacency(&self, v: usize) -> usize {
        self.out_edges(v).len() + self.in_edges(v).len()
    }
}
