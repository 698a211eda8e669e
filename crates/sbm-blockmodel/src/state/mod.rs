//! The block state: partition, block multigraph, aggregates and the
//! operations that keep them consistent.

mod checks;
mod coupling;
mod entropy;
mod moves;
mod proposal;
mod virtual_move;

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use sbm_core::{GraphView, SbmError, NULL_GROUP};

use crate::block_graph::BlockGraph;
use crate::config::BlockStateConfig;
use crate::covariates::CovariateModel;
use crate::egroups::EGroups;
use crate::emat::{BlockEdgeIndex, EdgeIndex};
use crate::entries::MoveEntrySet;
use crate::idx_set::IdxSet;
use crate::overlap::OverlapStats;
use crate::partition::PartitionStats;

pub use coupling::Coupling;

/// Initial assignment handed to [`BlockState::from_init`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateInit {
    /// Block of every vertex; [`NULL_GROUP`] leaves a vertex unassigned.
    pub b: Vec<usize>,
    /// Vertex weights, honoured only for weighted states.
    #[serde(default)]
    pub vweight: Option<Vec<i64>>,
    /// Label of every initial block; moves never cross label boundaries.
    #[serde(default)]
    pub bclabel: Option<Vec<usize>>,
    /// Statistics cell of every vertex.
    #[serde(default)]
    pub pclabel: Option<Vec<usize>>,
}

impl StateInit {
    /// Plain assignment with unit weights and a single label.
    pub fn from_partition(b: Vec<usize>) -> Self {
        Self {
            b,
            ..Self::default()
        }
    }
}

/// How edge multiplicities are read from the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WeightMode {
    Unit,
    Weighted,
}

impl WeightMode {
    #[inline]
    pub(crate) fn edge<G: GraphView + ?Sized>(self, g: &G, e: usize) -> i64 {
        match self {
            WeightMode::Unit => 1,
            WeightMode::Weighted => g.edge_weight(e),
        }
    }
}

/// Move-entry scratch behind a lock so that `&self` evaluations can reuse
/// it; clones start with an empty set.
#[derive(Debug)]
pub(crate) struct Scratch(Mutex<MoveEntrySet>);

impl Scratch {
    fn new(directed: bool, channels: usize) -> Self {
        Self(Mutex::new(MoveEntrySet::new(directed, channels)))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, MoveEntrySet> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn take(&mut self) -> MoveEntrySet {
        let inner = self.0.get_mut().unwrap_or_else(PoisonError::into_inner);
        let empty = MoveEntrySet::new(false, 0);
        std::mem::replace(inner, empty)
    }

    pub(crate) fn put(&mut self, entries: MoveEntrySet) {
        *self.0.get_mut().unwrap_or_else(PoisonError::into_inner) = entries;
    }
}

impl Clone for Scratch {
    fn clone(&self) -> Self {
        let guard = self.lock();
        Self::new(guard.is_directed(), guard.channels())
    }
}

/// Stochastic block-model state over a graph supplied by the caller.
///
/// The state owns every aggregate derived from the partition: the block
/// multigraph `bg` with its pair multiplicities, the per-block totals `wr`,
/// `mrp` and `mrm`, the occupied/empty block sets, the partition statistics
/// and, optionally, the coupled parent level. The graph itself is borrowed
/// by each call; callers must pass the graph the state was built over.
///
/// A coupled parent is a full state whose vertices are this level's blocks;
/// its graph is this level's `bg`.
#[derive(Debug, Clone)]
pub struct BlockState {
    pub(crate) cfg: BlockStateConfig,
    pub(crate) directed: bool,
    pub(crate) weights: WeightMode,
    pub(crate) b: Vec<usize>,
    pub(crate) vweight: Vec<i64>,
    pub(crate) degs: Vec<(i64, i64)>,
    pub(crate) bclabel: Vec<usize>,
    pub(crate) pclabel: Vec<usize>,
    pub(crate) bg: BlockGraph,
    pub(crate) emat: EdgeIndex,
    pub(crate) mrp: Vec<i64>,
    pub(crate) mrm: Vec<i64>,
    pub(crate) wr: Vec<i64>,
    pub(crate) candidate_blocks: IdxSet,
    pub(crate) empty_blocks: IdxSet,
    pub(crate) e: i64,
    pub(crate) partition_stats: Vec<PartitionStats>,
    pub(crate) covariates: CovariateModel,
    pub(crate) egroups: Option<EGroups>,
    pub(crate) overlap: Option<OverlapStats>,
    pub(crate) coupling: Option<Box<Coupling>>,
    pub(crate) scratch: Scratch,
}

/// Weighted `(in, out)` degree of `v`; undirected self-loops count twice
/// and in-degrees are zero for undirected graphs.
pub(crate) fn vertex_degree<G: GraphView + ?Sized>(g: &G, v: usize, weights: WeightMode) -> (i64, i64) {
    let mut kout = 0;
    for adj in g.out_edges(v) {
        let w = weights.edge(g, adj.edge);
        kout += if !g.is_directed() && adj.vertex == v { 2 * w } else { w };
    }
    let kin = g.in_edges(v).iter().map(|adj| weights.edge(g, adj.edge)).sum();
    (kin, kout)
}

impl BlockState {
    /// Builds a state over `g` with every vertex placed per `b`.
    pub fn new<G: GraphView + ?Sized>(
        g: &G,
        b: Vec<usize>,
        cfg: BlockStateConfig,
    ) -> Result<Self, SbmError> {
        Self::from_init(g, StateInit::from_partition(b), cfg)
    }

    /// Builds a state from an explicit initial assignment.
    pub fn from_init<G: GraphView + ?Sized>(
        g: &G,
        init: StateInit,
        cfg: BlockStateConfig,
    ) -> Result<Self, SbmError> {
        let mut state = Self::empty(g, &init, cfg)?;
        state.populate(g, &init.b)?;
        debug!(
            "built block state: {} vertices, {} blocks, {} occupied, E = {}",
            g.num_vertices(),
            state.num_blocks(),
            state.candidate_blocks.len(),
            state.e
        );
        Ok(state)
    }

    /// Builds the overlapping variant over a half-edge graph; `node_index`
    /// names the node each half-edge belongs to.
    pub fn new_overlap<G: GraphView + ?Sized>(
        g: &G,
        node_index: Vec<usize>,
        b: Vec<usize>,
        cfg: BlockStateConfig,
    ) -> Result<Self, SbmError> {
        let init = StateInit::from_partition(b);
        let mut state = Self::empty(g, &init, cfg)?;
        let unplaced = vec![NULL_GROUP; g.num_vertices()];
        state.overlap = Some(OverlapStats::new(g, node_index, &unplaced)?);
        state.vweight.iter_mut().for_each(|w| *w = 1);
        state.populate(g, &init.b)?;
        debug!(
            "built overlapping block state: {} half-edges, {} blocks",
            g.num_vertices(),
            state.num_blocks()
        );
        Ok(state)
    }

    fn empty<G: GraphView + ?Sized>(
        g: &G,
        init: &StateInit,
        cfg: BlockStateConfig,
    ) -> Result<Self, SbmError> {
        let n = g.num_vertices();
        if init.b.len() != n {
            return Err(SbmError::config("partition-length", "partition must name one block per vertex")
                .with_context("expected", n)
                .with_context("found", init.b.len()));
        }
        if cfg.rec_types.len() > g.num_covariates() {
            return Err(SbmError::config(
                "covariate-channels",
                "more covariate kinds configured than the graph carries",
            )
            .with_context("configured", cfg.rec_types.len())
            .with_context("available", g.num_covariates()));
        }
        let weights = if cfg.is_weighted {
            WeightMode::Weighted
        } else {
            WeightMode::Unit
        };
        let vweight = match (&init.vweight, weights) {
            (Some(w), WeightMode::Weighted) => {
                if w.len() != n {
                    return Err(SbmError::config("vweight-length", "vertex weights must cover every vertex")
                        .with_context("expected", n)
                        .with_context("found", w.len()));
                }
                if w.iter().any(|&x| x < 0) {
                    return Err(SbmError::config("vweight-negative", "vertex weights must be non-negative"));
                }
                w.clone()
            }
            _ => vec![1; n],
        };
        let pclabel = match &init.pclabel {
            Some(p) if p.len() != n => {
                return Err(SbmError::config("pclabel-length", "statistics labels must cover every vertex")
                    .with_context("expected", n)
                    .with_context("found", p.len()))
            }
            Some(p) => p.clone(),
            None => vec![0; n],
        };
        let num_blocks = init
            .b
            .iter()
            .filter(|&&r| r != NULL_GROUP)
            .map(|&r| r + 1)
            .max()
            .unwrap_or(0);
        let mut bclabel = init.bclabel.clone().unwrap_or_default();
        bclabel.resize(num_blocks.max(bclabel.len()), 0);
        let num_blocks = bclabel.len();

        let degs: Vec<(i64, i64)> = (0..n)
            .into_par_iter()
            .map(|v| vertex_degree(g, v, weights))
            .collect();

        let channels = cfg.rec_types.len();
        let num_cells = pclabel.iter().map(|&c| c + 1).max().unwrap_or(1);
        let directed = g.is_directed();
        let deg_corr = cfg.deg_corr;
        let covariates = CovariateModel::new(cfg.rec_types.clone(), (0..channels).map(|c| cfg.prior(c)).collect());
        let mut empty_blocks = IdxSet::new();
        for r in 0..num_blocks {
            empty_blocks.insert(r);
        }
        Ok(Self {
            directed,
            weights,
            b: vec![NULL_GROUP; n],
            vweight,
            degs,
            bclabel,
            pclabel,
            bg: BlockGraph::new(num_blocks, directed, channels),
            emat: EdgeIndex::new(num_blocks, directed, cfg.use_hash),
            mrp: vec![0; num_blocks],
            mrm: vec![0; num_blocks],
            wr: vec![0; num_blocks],
            candidate_blocks: IdxSet::new(),
            empty_blocks,
            e: 0,
            partition_stats: (0..num_cells)
                .map(|_| PartitionStats::new(directed, deg_corr))
                .collect(),
            covariates,
            egroups: None,
            overlap: None,
            coupling: None,
            scratch: Scratch::new(directed, channels),
            cfg,
        })
    }

    fn populate<G: GraphView + ?Sized>(&mut self, g: &G, b: &[usize]) -> Result<(), SbmError> {
        for (v, &r) in b.iter().enumerate() {
            if r != NULL_GROUP {
                self.add_vertex(g, v, r)?;
            }
        }
        Ok(())
    }

    /// Model flags the state was built with.
    pub fn config(&self) -> &BlockStateConfig {
        &self.cfg
    }

    /// Returns whether the underlying graph is directed.
    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// Returns whether this is the overlapping variant.
    pub fn is_overlap(&self) -> bool {
        self.overlap.is_some()
    }

    /// Current partition; unassigned vertices map to [`NULL_GROUP`].
    pub fn b(&self) -> &[usize] {
        &self.b
    }

    /// Number of allocated block ids, occupied or not.
    pub fn num_blocks(&self) -> usize {
        self.wr.len()
    }

    /// Number of occupied blocks.
    pub fn num_occupied(&self) -> usize {
        self.candidate_blocks.len()
    }

    /// Occupied block ids.
    pub fn candidate_blocks(&self) -> &IdxSet {
        &self.candidate_blocks
    }

    /// Allocated but unoccupied block ids.
    pub fn empty_blocks(&self) -> &IdxSet {
        &self.empty_blocks
    }

    /// The block multigraph.
    pub fn block_graph(&self) -> &BlockGraph {
        &self.bg
    }

    /// Multiplicity of block pair `(r, s)`.
    pub fn mrs(&self, r: usize, s: usize) -> i64 {
        self.emat.get(r, s).map_or(0, |e| self.bg.mrs(e))
    }

    /// Vertex weight of each block.
    pub fn wr(&self) -> &[i64] {
        &self.wr
    }

    /// Out-degree total of each block.
    pub fn mrp(&self) -> &[i64] {
        &self.mrp
    }

    /// In-degree total of each block; equal to `mrp` for undirected graphs.
    pub fn mrm(&self) -> &[i64] {
        if self.directed {
            &self.mrm
        } else {
            &self.mrp
        }
    }

    /// Total edge weight between assigned vertices.
    pub fn num_edges(&self) -> i64 {
        self.e
    }

    /// Total weight of the assigned vertices.
    pub fn total_weight(&self) -> i64 {
        self.partition_stats.iter().map(PartitionStats::n).sum()
    }

    /// Number of occupied blocks summed over statistics cells.
    pub fn actual_b(&self) -> usize {
        self.partition_stats.iter().map(PartitionStats::actual_b).sum()
    }

    /// Label of each block.
    pub fn bclabel(&self) -> &[usize] {
        &self.bclabel
    }

    /// Weight of vertex `v`; half-edges weigh one.
    pub fn node_weight(&self, v: usize) -> i64 {
        if self.overlap.is_some() {
            1
        } else {
            self.vweight[v]
        }
    }

    /// Sets the weight of vertex `v`.
    ///
    /// Only meaningful while `v` is not counted in its block, which is how
    /// the child level toggles its blocks in the parent.
    pub fn set_vertex_weight(&mut self, v: usize, w: i64) {
        self.vweight[v] = w;
    }

    /// Overlap bookkeeping, for the overlapping variant.
    pub fn overlap_stats(&self) -> Option<&OverlapStats> {
        self.overlap.as_ref()
    }

    /// Partition statistics, one per statistics cell.
    pub fn partition_stats(&self) -> &[PartitionStats] {
        &self.partition_stats
    }

    pub(crate) fn cell(&self, v: usize) -> usize {
        self.pclabel[v]
    }

    pub(crate) fn stats_mut(&mut self, v: usize) -> &mut PartitionStats {
        let cell = self.pclabel[v];
        if cell >= self.partition_stats.len() {
            let (directed, deg_corr) = (self.directed, self.cfg.deg_corr);
            self.partition_stats
                .resize_with(cell + 1, || PartitionStats::new(directed, deg_corr));
        }
        &mut self.partition_stats[cell]
    }

    /// Returns whether moving `v` out of `r` would leave `r` empty.
    pub(crate) fn vacates(&self, v: usize, r: usize) -> bool {
        if r == NULL_GROUP {
            return false;
        }
        match &self.overlap {
            Some(ov) => ov.virtual_remove_size(v, r) == 0,
            None => self.vweight[v] > 0 && self.wr[r] == self.vweight[v],
        }
    }

    /// Returns whether `v` is the last vertex of its block.
    pub fn is_last(&self, v: usize) -> bool {
        self.vacates(v, self.b[v])
    }

    /// Allocates `n` empty blocks and returns the first new id.
    pub fn add_block(&mut self, n: usize) -> usize {
        let first = self.num_blocks();
        for _ in 0..n {
            let r = self.bg.add_block();
            self.emat.add_block();
            self.wr.push(0);
            self.mrp.push(0);
            self.mrm.push(0);
            self.bclabel.push(0);
            self.empty_blocks.insert(r);
            if let Some(eg) = self.egroups.as_mut() {
                eg.add_block();
            }
            if let Some(c) = self.coupling.as_deref_mut() {
                c.state.add_vertex_slot();
            }
        }
        trace!("allocated {n} blocks starting at {first}");
        first
    }

    /// Appends an unweighted vertex; used by the child level when it
    /// allocates a block.
    pub(crate) fn add_vertex_slot(&mut self) {
        let hb = match self.candidate_blocks.last() {
            Some(s) => s,
            None if self.num_blocks() == 0 => self.add_block(1),
            None => 0,
        };
        self.b.push(hb);
        self.vweight.push(0);
        self.degs.push((0, 0));
        self.pclabel.push(0);
    }

    /// Block a vertex of `v`'s block may move into: the most recently
    /// emptied block, or a fresh one when none is empty or `force_add` is
    /// set. A fresh block inherits the label and parent block of `b[v]`.
    pub fn get_empty_block(&mut self, v: usize, force_add: bool) -> usize {
        if !force_add {
            if let Some(s) = self.empty_blocks.last() {
                return s;
            }
        }
        let s = self.add_block(1);
        let r = self.b[v];
        if r != NULL_GROUP {
            self.bclabel[s] = self.bclabel[r];
            if let Some(c) = self.coupling.as_deref_mut() {
                let hr = c.state.b[r];
                c.state.b[s] = hr;
            }
        }
        s
    }

    /// Full copy sharing no mutable storage, parent levels included.
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }

    /// Restores this state from `other`, which must describe the same graph.
    pub fn deep_assign(&mut self, other: &Self) -> Result<(), SbmError> {
        if other.b.len() != self.b.len() || other.directed != self.directed || other.cfg != self.cfg {
            return Err(SbmError::config("shape-mismatch", "cannot assign a state of a different shape")
                .with_context("vertices", self.b.len())
                .with_context("other_vertices", other.b.len()));
        }
        self.clone_from(other);
        Ok(())
    }

    pub(crate) fn block_edge(&self, r: usize, s: usize) -> Option<usize> {
        self.emat.get(r, s)
    }
}
