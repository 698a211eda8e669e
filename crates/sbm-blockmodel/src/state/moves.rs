//! Committed mutations: vertex moves, insertions, removals and bulk
//! reassignment.

use log::{debug, trace};

use sbm_core::{GraphView, SbmError, NULL_GROUP};

use super::BlockState;
use crate::emat::BlockEdgeIndex;
use crate::entries::{MoveEntrySet, PairDelta};

impl BlockState {
    /// Returns whether a vertex may move from `r` to `nr` under the block
    /// labels of this level and of every coupled parent.
    pub fn allow_move(&self, r: usize, nr: usize) -> bool {
        if r == NULL_GROUP || nr == NULL_GROUP {
            return true;
        }
        if let Some(c) = self.coupling.as_deref() {
            let (hr, hnr) = (c.state.b[r], c.state.b[nr]);
            if hr != hnr && !c.state.allow_move(hr, hnr) {
                return false;
            }
        }
        self.bclabel[r] == self.bclabel[nr]
    }

    /// Fills `m` with the block-pair changes of moving `v` from `r` to
    /// `nr`; either may be [`NULL_GROUP`].
    pub fn get_move_entries<G: GraphView + ?Sized>(
        &self,
        g: &G,
        v: usize,
        r: usize,
        nr: usize,
        m: &mut MoveEntrySet,
    ) {
        m.set_move(r, nr, self.num_blocks());
        let channels = self.covariates.channels();
        for adj in g.out_edges(v) {
            let w = self.weights.edge(g, adj.edge);
            let u = adj.vertex;
            let (from, to) = if u == v {
                ((r, r), (nr, nr))
            } else {
                let s = self.b[u];
                ((r, s), (nr, s))
            };
            self.record_edge(g, m, adj.edge, from, -w, channels, -1.0);
            self.record_edge(g, m, adj.edge, to, w, channels, 1.0);
        }
        if self.directed {
            for adj in g.in_edges(v) {
                let u = adj.vertex;
                if u == v {
                    continue;
                }
                let w = self.weights.edge(g, adj.edge);
                let s = self.b[u];
                self.record_edge(g, m, adj.edge, (s, r), -w, channels, -1.0);
                self.record_edge(g, m, adj.edge, (s, nr), w, channels, 1.0);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record_edge<G: GraphView + ?Sized>(
        &self,
        g: &G,
        m: &mut MoveEntrySet,
        e: usize,
        (t, u): (usize, usize),
        d: i64,
        channels: usize,
        sign: f64,
    ) {
        let Some(i) = m.insert_delta(t, u, d) else {
            return;
        };
        if channels == 0 {
            return;
        }
        m.add_count(i, sign as i64);
        for c in 0..channels {
            let x = g.edge_covariate(e, c);
            m.add_rec(i, c, sign * x, sign * x * x);
        }
    }

    /// Commits the block-pair changes in `m` to the block multigraph and the
    /// per-block totals, forwarding them to the coupled parent.
    pub fn apply_delta(&mut self, m: &MoveEntrySet) {
        let channels = self.bg.num_channels().min(m.channels());
        let coupled = self.coupling.is_some();
        let mut forwarded = Vec::new();
        for i in 0..m.len() {
            let (t, u) = m.pair(i);
            let (d, dc) = (m.delta(i), m.dcount(i));
            // multiplicity and count can net to zero while the sums shift
            let recs_moved = (0..channels).any(|c| m.drec(i, c) != 0.0 || m.ddrec(i, c) != 0.0);
            if d == 0 && dc == 0 && !recs_moved {
                continue;
            }
            let e = match self.emat.get(t, u) {
                Some(e) => e,
                None => {
                    let e = self.bg.add_edge(t, u);
                    self.emat.put(t, u, e);
                    e
                }
            };
            let before = self.bg.mrs(e);
            let after = self.bg.add_mrs(e, d);
            let count = self.bg.add_bcount(e, dc);
            for c in 0..channels {
                self.bg.add_rec(c, e, m.drec(i, c), m.ddrec(i, c));
            }
            if let Some(eg) = self.egroups.as_mut() {
                eg.update_edge(e, t, u, after);
            }
            if coupled && d != 0 {
                forwarded.push(PairDelta {
                    source: t,
                    target: u,
                    weight: before,
                    delta: d,
                });
            }
            if after == 0 && count == 0 {
                self.bg.remove_edge(e);
                self.emat.remove(t, u);
            }
        }
        for bd in m.block_deltas() {
            self.mrp[bd.block] += bd.dmrp;
            if self.directed {
                self.mrm[bd.block] += bd.dmrm;
            }
        }
        self.e += m.total_delta();
        if forwarded.is_empty() {
            return;
        }
        let (r, nr) = m.move_blocks();
        if let Some(c) = self.coupling.as_deref_mut() {
            c.state.propagate_delta(r, nr, &forwarded);
        }
    }

    /// Applies child-level pair changes, whose endpoints are vertices here.
    pub(crate) fn propagate_delta(&mut self, u: usize, v: usize, pairs: &[PairDelta]) {
        let hb = |x: usize| if x == NULL_GROUP { NULL_GROUP } else { self.b[x] };
        let (r, s) = (hb(u), hb(v));
        let mut m = self.scratch.take();
        m.set_move(r, s, self.num_blocks());
        for pd in pairs {
            m.insert_delta(hb(pd.source), hb(pd.target), pd.delta);
        }
        self.apply_delta(&m);
        self.scratch.put(m);
    }

    /// Takes `v` out of block `r` without touching its edges.
    pub fn remove_partition_node<G: GraphView + ?Sized>(&mut self, g: &G, v: usize, r: usize) {
        let w = self.node_weight(v);
        if let Some(ov) = self.overlap.as_mut() {
            ov.remove_half_edge(g, v, r, &self.b);
            self.wr[r] = ov.block_size(r);
        } else {
            self.wr[r] -= w;
        }
        let deg = self.degs[v];
        self.stats_mut(v).remove_vertex(r, w, deg);
        if self.wr[r] == 0 && self.candidate_blocks.erase(r) {
            self.empty_blocks.insert(r);
            trace!("block {r} vacated");
            if let Some(c) = self.coupling.as_deref_mut() {
                let hr = c.state.b[r];
                c.state.remove_partition_node(&self.bg, r, hr);
                c.state.set_vertex_weight(r, 0);
            }
        }
    }

    /// Places `v` into block `r` without touching its edges.
    pub fn add_partition_node<G: GraphView + ?Sized>(&mut self, g: &G, v: usize, r: usize) {
        let w = self.node_weight(v);
        if let Some(ov) = self.overlap.as_mut() {
            ov.add_half_edge(g, v, r, &self.b);
            self.wr[r] = ov.block_size(r);
        } else {
            self.wr[r] += w;
        }
        let deg = self.degs[v];
        self.stats_mut(v).add_vertex(r, w, deg);
        self.b[v] = r;
        if self.wr[r] > 0 && self.empty_blocks.erase(r) {
            self.candidate_blocks.insert(r);
            trace!("block {r} occupied");
            if let Some(c) = self.coupling.as_deref_mut() {
                let hr = c.state.b[r];
                c.state.set_vertex_weight(r, 1);
                c.state.add_partition_node(&self.bg, r, hr);
            }
        }
    }

    fn check_block(&self, r: usize) -> Result<(), SbmError> {
        if r >= self.num_blocks() {
            return Err(SbmError::config("unknown-block", "block id is not allocated")
                .with_context("block", r)
                .with_context("num_blocks", self.num_blocks()));
        }
        Ok(())
    }

    fn check_vertex(&self, v: usize) -> Result<(), SbmError> {
        if v >= self.b.len() {
            return Err(SbmError::config("unknown-vertex", "vertex id is out of range")
                .with_context("vertex", v)
                .with_context("num_vertices", self.b.len()));
        }
        Ok(())
    }

    /// Moves `v` to `nr` using precomputed entries `m`.
    pub fn move_vertex_entries<G: GraphView + ?Sized>(
        &mut self,
        g: &G,
        v: usize,
        nr: usize,
        m: &MoveEntrySet,
    ) {
        let r = self.b[v];
        if r == nr {
            return;
        }
        self.apply_delta(m);
        if r != NULL_GROUP {
            self.remove_partition_node(g, v, r);
        }
        if nr == NULL_GROUP {
            self.b[v] = NULL_GROUP;
        } else {
            self.add_partition_node(g, v, nr);
        }
    }

    /// Moves vertex `v` to block `nr`.
    ///
    /// A move to the current block is a no-op. Moves between blocks with
    /// different labels, here or in any coupled parent, are rejected.
    pub fn move_vertex<G: GraphView + ?Sized>(&mut self, g: &G, v: usize, nr: usize) -> Result<(), SbmError> {
        self.check_vertex(v)?;
        self.check_block(nr)?;
        let r = self.b[v];
        if r == NULL_GROUP {
            return Err(SbmError::config("vertex-unassigned", "cannot move an unassigned vertex")
                .with_context("vertex", v)
                .with_hint("use add_vertex to place it first"));
        }
        if r == nr {
            return Ok(());
        }
        if !self.allow_move(r, nr) {
            return Err(SbmError::illegal_move(
                "clabel-barrier",
                "cannot move vertex across clabel barriers",
            )
            .with_context("vertex", v)
            .with_context("from", r)
            .with_context("to", nr));
        }
        self.commit(g, v, r, nr);
        Ok(())
    }

    fn commit<G: GraphView + ?Sized>(&mut self, g: &G, v: usize, r: usize, nr: usize) {
        let mut m = self.scratch.take();
        self.get_move_entries(g, v, r, nr, &mut m);
        self.move_vertex_entries(g, v, nr, &m);
        self.scratch.put(m);
    }

    /// Places the unassigned vertex `v` into block `r`.
    pub fn add_vertex<G: GraphView + ?Sized>(&mut self, g: &G, v: usize, r: usize) -> Result<(), SbmError> {
        self.check_vertex(v)?;
        self.check_block(r)?;
        if self.b[v] != NULL_GROUP {
            return Err(SbmError::config("vertex-assigned", "vertex is already placed in a block")
                .with_context("vertex", v)
                .with_context("block", self.b[v]));
        }
        self.commit(g, v, NULL_GROUP, r);
        Ok(())
    }

    /// Removes `v` from its block, leaving it unassigned; edges to
    /// unassigned vertices no longer count.
    pub fn remove_vertex<G: GraphView + ?Sized>(&mut self, g: &G, v: usize) -> Result<(), SbmError> {
        self.check_vertex(v)?;
        let r = self.b[v];
        if r == NULL_GROUP {
            return Ok(());
        }
        self.commit(g, v, r, NULL_GROUP);
        Ok(())
    }

    /// Inserts each `(vertex, block)` pair in order.
    pub fn add_vertices<G: GraphView + ?Sized>(&mut self, g: &G, vs: &[(usize, usize)]) -> Result<(), SbmError> {
        vs.iter().try_for_each(|&(v, r)| self.add_vertex(g, v, r))
    }

    /// Removes each vertex in order.
    pub fn remove_vertices<G: GraphView + ?Sized>(&mut self, g: &G, vs: &[usize]) -> Result<(), SbmError> {
        vs.iter().try_for_each(|&v| self.remove_vertex(g, v))
    }

    /// Reassigns every vertex to `b`, allocating blocks as needed.
    ///
    /// Vertices mapped to [`NULL_GROUP`] become unassigned. Label barriers
    /// are not enforced.
    pub fn set_partition<G: GraphView + ?Sized>(&mut self, g: &G, b: &[usize]) -> Result<(), SbmError> {
        if b.len() != self.b.len() {
            return Err(SbmError::config("partition-length", "partition must name one block per vertex")
                .with_context("expected", self.b.len())
                .with_context("found", b.len()));
        }
        let needed = b.iter().filter(|&&r| r != NULL_GROUP).map(|&r| r + 1).max().unwrap_or(0);
        if needed > self.num_blocks() {
            self.add_block(needed - self.num_blocks());
        }
        let mut moved = 0usize;
        for (v, &nr) in b.iter().enumerate() {
            let r = self.b[v];
            if r != nr {
                self.commit(g, v, r, nr);
                moved += 1;
            }
        }
        debug!("set partition: {moved} vertices reassigned, {} blocks occupied", self.num_occupied());
        Ok(())
    }
}
