//! Graph-owning wrapper around [`BlockState`].

use std::sync::Arc;

use rand::Rng;

use sbm_core::{GraphView, SbmError};
use sbm_graph::Multigraph;

use crate::config::{BlockStateConfig, EntropyArgs};
use crate::model::PartitionModel;
use crate::state::{BlockState, StateInit};

/// A block state bundled with the graph it describes.
///
/// The graph is shared: [`Self::view_copy`] clones the handle and the
/// mutable state, while [`Self::deep_copy`] also duplicates the graph.
#[derive(Debug, Clone)]
pub struct SbmState {
    graph: Arc<Multigraph>,
    state: BlockState,
}

impl SbmState {
    /// Builds a state over `graph` with partition `b`.
    pub fn new(graph: Arc<Multigraph>, b: Vec<usize>, cfg: BlockStateConfig) -> Result<Self, SbmError> {
        Self::from_init(graph, StateInit::from_partition(b), cfg)
    }

    /// Builds a state from an explicit initial assignment.
    pub fn from_init(graph: Arc<Multigraph>, init: StateInit, cfg: BlockStateConfig) -> Result<Self, SbmError> {
        let state = BlockState::from_init(graph.as_ref(), init, cfg)?;
        Ok(Self { graph, state })
    }

    /// The graph.
    pub fn graph(&self) -> &Multigraph {
        &self.graph
    }

    /// Shared handle to the graph.
    pub fn graph_handle(&self) -> Arc<Multigraph> {
        Arc::clone(&self.graph)
    }

    /// The wrapped state.
    pub fn state(&self) -> &BlockState {
        &self.state
    }

    /// The wrapped state with the graph its operations take.
    pub fn split_mut(&mut self) -> (&Multigraph, &mut BlockState) {
        (&self.graph, &mut self.state)
    }

    /// Copy sharing the graph.
    pub fn view_copy(&self) -> Self {
        self.clone()
    }

    /// Copy owning a separate graph.
    pub fn deep_copy(&self) -> Self {
        Self {
            graph: Arc::new(self.graph.as_ref().clone()),
            state: self.state.deep_copy(),
        }
    }

    /// Restores the partition state from `other`, keeping this graph.
    pub fn deep_assign(&mut self, other: &Self) -> Result<(), SbmError> {
        if other.graph.num_vertices() != self.graph.num_vertices()
            || other.graph.num_edges() != self.graph.num_edges()
        {
            return Err(SbmError::config("graph-mismatch", "cannot assign a state over a different graph")
                .with_context("vertices", self.graph.num_vertices())
                .with_context("other_vertices", other.graph.num_vertices()));
        }
        self.state.deep_assign(&other.state)
    }

    /// Adds a vertex back into block `r`.
    pub fn add_vertex(&mut self, v: usize, r: usize) -> Result<(), SbmError> {
        self.state.add_vertex(self.graph.as_ref(), v, r)
    }

    /// Leaves `v` unassigned.
    pub fn remove_vertex(&mut self, v: usize) -> Result<(), SbmError> {
        self.state.remove_vertex(self.graph.as_ref(), v)
    }

    /// Reassigns every vertex.
    pub fn set_partition(&mut self, b: &[usize]) -> Result<(), SbmError> {
        self.state.set_partition(self.graph.as_ref(), b)
    }

    /// Verifies the edge and node aggregates against a recount.
    pub fn check(&self) -> Result<(), SbmError> {
        self.state.check_edge_counts(self.graph.as_ref())?;
        self.state.check_node_counts()
    }
}

impl PartitionModel for SbmState {
    fn num_vertices(&self) -> usize {
        self.graph.num_vertices()
    }

    fn block_of(&self, v: usize) -> usize {
        self.state.b()[v]
    }

    fn entropy(&self, ea: &EntropyArgs) -> Result<f64, SbmError> {
        self.state.entropy(self.graph.as_ref(), ea, true)
    }

    fn virtual_move(&self, v: usize, r: usize, nr: usize, ea: &EntropyArgs) -> Result<f64, SbmError> {
        self.state.virtual_move(self.graph.as_ref(), v, r, nr, ea)
    }

    fn move_vertex(&mut self, v: usize, nr: usize) -> Result<(), SbmError> {
        self.state.move_vertex(self.graph.as_ref(), v, nr)
    }

    fn sample_block<R: Rng + ?Sized>(&mut self, v: usize, c: f64, d: f64, rng: &mut R) -> Result<usize, SbmError> {
        self.state.sample_block(self.graph.as_ref(), v, c, d, rng)
    }

    fn move_prob(&self, v: usize, r: usize, s: usize, c: f64, d: f64, reverse: bool) -> f64 {
        self.state.get_move_prob(self.graph.as_ref(), v, r, s, c, d, reverse, None)
    }
}
