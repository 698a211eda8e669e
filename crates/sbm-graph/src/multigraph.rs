use serde::{Deserialize, Serialize};

use sbm_core::{Adjacent, GraphView, SbmError};

/// Immutable-after-construction adjacency multigraph.
///
/// Edges are never removed, so edge ids are the dense range
/// `0..num_edges()`. Parallel edges and self-loops are allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Multigraph {
    directed: bool,
    out_adj: Vec<Vec<Adjacent>>,
    in_adj: Vec<Vec<Adjacent>>,
    endpoints: Vec<(usize, usize)>,
    weights: Option<Vec<i64>>,
    covariates: Vec<Vec<f64>>,
}

impl Multigraph {
    /// Creates a graph with `num_vertices` isolated vertices.
    pub fn new(num_vertices: usize, directed: bool) -> Self {
        Self {
            directed,
            out_adj: vec![Vec::new(); num_vertices],
            in_adj: vec![Vec::new(); num_vertices],
            endpoints: Vec::new(),
            weights: None,
            covariates: Vec::new(),
        }
    }

    /// Builds a graph from an edge list with unit multiplicities.
    pub fn from_edges(
        num_vertices: usize,
        directed: bool,
        edges: &[(usize, usize)],
    ) -> Result<Self, SbmError> {
        let mut graph = Self::new(num_vertices, directed);
        for &(u, v) in edges {
            graph.add_edge(u, v)?;
        }
        Ok(graph)
    }

    /// Appends an isolated vertex and returns its id.
    pub fn add_vertex(&mut self) -> usize {
        self.out_adj.push(Vec::new());
        self.in_adj.push(Vec::new());
        self.out_adj.len() - 1
    }

    /// Adds an edge of multiplicity one.
    pub fn add_edge(&mut self, u: usize, v: usize) -> Result<usize, SbmError> {
        self.add_weighted_edge(u, v, 1)
    }

    /// Adds an edge with an explicit non-negative multiplicity.
    pub fn add_weighted_edge(&mut self, u: usize, v: usize, weight: i64) -> Result<usize, SbmError> {
        let n = self.out_adj.len();
        if u >= n || v >= n {
            return Err(SbmError::graph("unknown-vertex", "edge endpoint does not exist")
                .with_context("source", u)
                .with_context("target", v)
                .with_context("num_vertices", n));
        }
        if weight < 0 {
            return Err(SbmError::graph("negative-weight", "edge multiplicity must be non-negative")
                .with_context("weight", weight));
        }
        if !self.covariates.is_empty() {
            return Err(SbmError::graph(
                "covariates-frozen",
                "edges cannot be added after covariate channels are attached",
            ));
        }
        let e = self.endpoints.len();
        self.endpoints.push((u, v));
        self.out_adj[u].push(Adjacent::new(v, e));
        if self.directed {
            self.in_adj[v].push(Adjacent::new(u, e));
        } else if u != v {
            self.out_adj[v].push(Adjacent::new(u, e));
        }
        if let Some(weights) = self.weights.as_mut() {
            weights.push(weight);
        } else if weight != 1 {
            let mut weights = vec![1; e];
            weights.push(weight);
            self.weights = Some(weights);
        }
        Ok(e)
    }

    /// Attaches a covariate channel holding one value per edge.
    pub fn add_covariate_channel(&mut self, values: Vec<f64>) -> Result<usize, SbmError> {
        if values.len() != self.endpoints.len() {
            return Err(SbmError::graph(
                "covariate-length",
                "covariate channel must hold exactly one value per edge",
            )
            .with_context("values", values.len())
            .with_context("edges", self.endpoints.len()));
        }
        if let Some(bad) = values.iter().position(|x| !x.is_finite()) {
            return Err(SbmError::graph("covariate-not-finite", "covariate values must be finite")
                .with_context("edge", bad));
        }
        self.covariates.push(values);
        Ok(self.covariates.len() - 1)
    }

    /// Returns the covariate values of one channel.
    pub fn covariate_channel(&self, channel: usize) -> Option<&[f64]> {
        self.covariates.get(channel).map(Vec::as_slice)
    }

    /// Returns whether any edge carries a multiplicity other than one.
    pub fn is_weighted(&self) -> bool {
        self.weights.is_some()
    }

    /// Sum of all edge multiplicities.
    pub fn total_weight(&self) -> i64 {
        match &self.weights {
            Some(weights) => weights.iter().sum(),
            None => self.endpoints.len() as i64,
        }
    }

    /// Weighted (in, out) degree; an undirected self-loop counts twice.
    pub fn degree(&self, v: usize) -> (i64, i64) {
        let mut kout = 0;
        for adj in &self.out_adj[v] {
            let w = self.edge_weight(adj.edge);
            kout += if !self.directed && adj.vertex == v { 2 * w } else { w };
        }
        let kin = self.in_adj[v].iter().map(|adj| self.edge_weight(adj.edge)).sum();
        (kin, kout)
    }
}

impl GraphView for Multigraph {
    fn num_vertices(&self) -> usize {
        self.out_adj.len()
    }

    fn num_edges(&self) -> usize {
        self.endpoints.len()
    }

    fn edge_bound(&self) -> usize {
        self.endpoints.len()
    }

    fn is_directed(&self) -> bool {
        self.directed
    }

    fn out_edges(&self, v: usize) -> &[Adjacent] {
        &self.out_adj[v]
    }

    fn in_edges(&self, v: usize) -> &[Adjacent] {
        &self.in_adj[v]
    }

    fn endpoints(&self, e: usize) -> (usize, usize) {
        self.endpoints[e]
    }

    fn edges(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        Box::new(0..self.endpoints.len())
    }

    fn edge_weight(&self, e: usize) -> i64 {
        match &self.weights {
            Some(weights) => weights[e],
            None => 1,
        }
    }

    fn num_covariates(&self) -> usize {
        self.covariates.len()
    }

    fn edge_covariate(&self, e: usize, channel: usize) -> f64 {
        self.covariates[channel][e]
    }
}
