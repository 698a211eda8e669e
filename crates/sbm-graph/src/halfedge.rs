use sbm_core::{GraphView, SbmError};

use crate::multigraph::Multigraph;

/// Graph whose vertices are the half-edges of another graph.
///
/// Every edge `(u, v)` of multiplicity `w` of the original graph becomes `w`
/// edges, each joining a fresh half-edge of `u` to a fresh half-edge of `v`,
/// so every half-edge has exactly one incident edge. `node_index` maps each
/// half-edge back to the vertex it came from.
#[derive(Debug, Clone)]
pub struct HalfEdgeGraph {
    graph: Multigraph,
    node_index: Vec<usize>,
    num_nodes: usize,
}

impl HalfEdgeGraph {
    /// Expanded graph over half-edges.
    pub fn graph(&self) -> &Multigraph {
        &self.graph
    }

    /// Original vertex of each half-edge.
    pub fn node_index(&self) -> &[usize] {
        &self.node_index
    }

    /// Number of vertices of the original graph.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Consumes the expansion, returning the graph and the node map.
    pub fn into_parts(self) -> (Multigraph, Vec<usize>) {
        (self.graph, self.node_index)
    }

    /// Lifts a vertex partition to the half-edges: each half-edge starts in
    /// the block of its vertex.
    pub fn expand_partition(&self, node_blocks: &[usize]) -> Result<Vec<usize>, SbmError> {
        if node_blocks.len() != self.num_nodes {
            return Err(SbmError::config(
                "partition-length",
                "node partition must assign every original vertex",
            )
            .with_context("expected", self.num_nodes)
            .with_context("found", node_blocks.len()));
        }
        Ok(self.node_index.iter().map(|&node| node_blocks[node]).collect())
    }
}

/// Splits every vertex of `graph` into one half-edge per incident edge end.
pub fn split_half_edges(graph: &Multigraph) -> Result<HalfEdgeGraph, SbmError> {
    let mut expanded = Multigraph::new(0, graph.is_directed());
    let mut node_index = Vec::new();
    let channels = graph.num_covariates();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); channels];
    for e in graph.edges() {
        let (u, v) = graph.endpoints(e);
        for _ in 0..graph.edge_weight(e) {
            let hu = expanded.add_vertex();
            node_index.push(u);
            let hv = expanded.add_vertex();
            node_index.push(v);
            expanded.add_edge(hu, hv)?;
            for (channel, column) in values.iter_mut().enumerate() {
                column.push(graph.edge_covariate(e, channel));
            }
        }
    }
    for column in values {
        expanded.add_covariate_channel(column)?;
    }
    log::debug!(
        "split {} vertices into {} half-edges",
        graph.num_vertices(),
        expanded.num_vertices()
    );
    Ok(HalfEdgeGraph {
        graph: expanded,
        node_index,
        num_nodes: graph.num_vertices(),
    })
}
