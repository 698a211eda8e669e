use rand::Rng;

use sbm_core::SbmError;

use crate::multigraph::Multigraph;

/// Graph sampled from a planted partition together with its ground truth.
#[derive(Debug, Clone)]
pub struct PlantedPartition {
    /// Sampled graph.
    pub graph: Multigraph,
    /// Planted block of each vertex.
    pub blocks: Vec<usize>,
}

/// Samples a simple graph where vertices in the same planted block connect
/// with probability `p_in` and vertices in different blocks with `p_out`.
pub fn planted_partition<R: Rng + ?Sized>(
    block_sizes: &[usize],
    p_in: f64,
    p_out: f64,
    directed: bool,
    rng: &mut R,
) -> Result<PlantedPartition, SbmError> {
    for (name, p) in [("p_in", p_in), ("p_out", p_out)] {
        if !(0.0..=1.0).contains(&p) {
            return Err(SbmError::config("probability-range", "edge probability outside [0, 1]")
                .with_context(name, p));
        }
    }
    let blocks: Vec<usize> = block_sizes
        .iter()
        .enumerate()
        .flat_map(|(r, &size)| std::iter::repeat(r).take(size))
        .collect();
    let n = blocks.len();
    if n == 0 {
        return Err(SbmError::graph(
            "empty-graph",
            "planted partition requires at least one vertex",
        ));
    }
    let mut graph = Multigraph::new(n, directed);
    for u in 0..n {
        for v in 0..n {
            if u == v || (!directed && v < u) {
                continue;
            }
            let p = if blocks[u] == blocks[v] { p_in } else { p_out };
            if rng.gen_bool(p) {
                graph.add_edge(u, v)?;
            }
        }
    }
    Ok(PlantedPartition { graph, blocks })
}

/// Samples `num_edges` edges with uniformly random endpoints; self-loops and
/// parallel edges are kept.
pub fn random_multigraph<R: Rng + ?Sized>(
    num_vertices: usize,
    num_edges: usize,
    directed: bool,
    rng: &mut R,
) -> Result<Multigraph, SbmError> {
    if num_vertices == 0 {
        return Err(SbmError::graph(
            "empty-graph",
            "random multigraph requires at least one vertex",
        ));
    }
    let mut graph = Multigraph::new(num_vertices, directed);
    for _ in 0..num_edges {
        let u = rng.gen_range(0..num_vertices);
        let v = rng.gen_range(0..num_vertices);
        graph.add_edge(u, v)?;
    }
    Ok(graph)
}
