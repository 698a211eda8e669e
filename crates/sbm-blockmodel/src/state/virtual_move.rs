//! Entropy change of a hypothetical move, evaluated without mutation.

use sbm_core::{GraphView, SbmError, NULL_GROUP};

use super::BlockState;
use crate::config::EntropyArgs;
use crate::covariates::PairRecords;
use crate::entries::{MoveEntrySet, PairDelta};
use crate::entropy::{edges_dl, eterm, eterm_dense, eterm_exact, parallel_term, vterm, vterm_exact};

type ETerm = fn(usize, usize, i64, bool) -> f64;
type VTerm = fn(i64, i64, i64, bool, bool) -> f64;

pub(super) fn terms(exact: bool) -> (ETerm, VTerm) {
    if exact {
        (eterm_exact, vterm_exact)
    } else {
        (eterm, vterm)
    }
}

pub(super) fn opt(r: usize) -> Option<usize> {
    (r != NULL_GROUP).then_some(r)
}

pub(crate) fn dense_unsupported(overlap: bool) -> SbmError {
    if overlap {
        SbmError::unsupported("dense-overlap", "Dense entropy for overlapping model not implemented!")
    } else {
        SbmError::unsupported("dense-deg-corr", "Dense entropy for degree corrected model not implemented!")
    }
}

impl BlockState {
    /// Entropy change of moving `v` from its current block `r` to `nr`.
    ///
    /// Zero when `r == nr`; `+inf` when a label barrier forbids the move.
    /// Dense evaluation fails for degree-corrected and overlapping states.
    pub fn virtual_move<G: GraphView + ?Sized>(
        &self,
        g: &G,
        v: usize,
        r: usize,
        nr: usize,
        ea: &EntropyArgs,
    ) -> Result<f64, SbmError> {
        let mut m = self.scratch.lock();
        self.virtual_move_entries(g, v, r, nr, ea, &mut m)
    }

    /// As [`Self::virtual_move`], leaving the move's entries in `m` so a
    /// caller can reuse them for the proposal probability and the commit.
    pub fn virtual_move_entries<G: GraphView + ?Sized>(
        &self,
        g: &G,
        v: usize,
        r: usize,
        nr: usize,
        ea: &EntropyArgs,
        m: &mut MoveEntrySet,
    ) -> Result<f64, SbmError> {
        if r == nr || (self.node_weight(v) == 0 && g.total_adjacency(v) == 0) {
            m.set_move(r, nr, self.num_blocks());
            return Ok(0.0);
        }
        if !self.allow_move(r, nr) {
            m.set_move(r, nr, self.num_blocks());
            return Ok(f64::INFINITY);
        }
        self.get_move_entries(g, v, r, nr, m);

        let mut ds = 0.0;
        if ea.adjacency {
            ds += if ea.dense {
                self.dense_move_ds(v, r, nr, ea.multigraph, m)?
            } else {
                self.sparse_move_ds(g, v, r, nr, ea, m)
            };
        }
        if ea.recs {
            ds += self.covariate_ds(m);
        }

        let mut ds_dl = self.get_delta_partition_dl(v, r, nr, ea);
        let w = self.node_weight(v);
        let stats = &self.partition_stats[self.cell(v)];
        if self.cfg.deg_corr && ea.degree_dl {
            ds_dl += stats.delta_deg_dl(opt(r), opt(nr), w, self.degs[v], ea.degree_dl_kind);
        }
        if ea.edges_dl {
            ds_dl += stats.delta_edges_dl(opt(r), opt(nr), w, self.actual_b(), self.e, m.total_delta());
        }

        if let Some(c) = self.coupling.as_deref() {
            let (vacate, occupy) = (self.vacates(v, r), self.occupies(v, nr));
            m.propagated_mut().clear();
            for i in 0..m.len() {
                let d = m.delta(i);
                if d != 0 {
                    let (t, u) = m.pair(i);
                    let pd = PairDelta {
                        source: t,
                        target: u,
                        weight: self.mrs(t, u),
                        delta: d,
                    };
                    m.propagated_mut().push(pd);
                }
            }
            let (dr, dnr) = (-(vacate as i64), occupy as i64);
            ds_dl += c
                .state
                .propagate_entries_ds(r, nr, dr, dnr, m.propagated(), &c.args)?;
        }
        Ok(ds + ea.beta_dl * ds_dl)
    }

    /// Returns whether moving `v` into `nr` would occupy an empty block.
    pub(crate) fn occupies(&self, v: usize, nr: usize) -> bool {
        nr != NULL_GROUP && self.wr[nr] == 0 && self.node_weight(v) > 0
    }

    /// Size of block `s` after moving `v` from `r` to `nr`.
    fn wr_after(&self, v: usize, r: usize, nr: usize, s: usize) -> i64 {
        match &self.overlap {
            Some(ov) if s == r => ov.virtual_remove_size(v, r),
            Some(ov) if s == nr => ov.virtual_add_size(v, nr),
            Some(_) => self.wr[s],
            None if s == r => self.wr[s] - self.vweight[v],
            None if s == nr => self.wr[s] + self.vweight[v],
            None => self.wr[s],
        }
    }

    fn sparse_move_ds<G: GraphView + ?Sized>(
        &self,
        g: &G,
        v: usize,
        r: usize,
        nr: usize,
        ea: &EntropyArgs,
        m: &MoveEntrySet,
    ) -> f64 {
        let (et, vt) = terms(ea.exact);
        let (directed, deg_corr) = (self.directed, self.cfg.deg_corr);
        let mut ds = 0.0;
        for (t, u, d) in m.iter() {
            if d == 0 {
                continue;
            }
            let mrs = self.mrs(t, u);
            ds += et(t, u, mrs + d, directed) - et(t, u, mrs, directed);
        }
        let mrm = self.mrm();
        let mut seen_r = false;
        let mut seen_nr = false;
        for bd in m.block_deltas() {
            let s = bd.block;
            seen_r |= s == r;
            seen_nr |= s == nr;
            let before = vt(self.mrp[s], mrm[s], self.wr[s], deg_corr, directed);
            let after = vt(
                self.mrp[s] + bd.dmrp,
                mrm[s] + bd.dmrm,
                self.wr_after(v, r, nr, s),
                deg_corr,
                directed,
            );
            ds += after - before;
        }
        for (s, seen) in [(r, seen_r), (nr, seen_nr)] {
            if s == NULL_GROUP || seen {
                continue;
            }
            let before = vt(self.mrp[s], mrm[s], self.wr[s], deg_corr, directed);
            let after = vt(self.mrp[s], mrm[s], self.wr_after(v, r, nr, s), deg_corr, directed);
            ds += after - before;
        }
        if !ea.exact {
            let de = m.total_delta() as f64;
            ds += if ea.multigraph { -de } else { de };
        }
        if let Some(ov) = &self.overlap {
            if deg_corr && ea.deg_entropy {
                ds += ov.virtual_move_deg_ds(g, v, r, nr);
            }
            if ea.multigraph {
                ds += ov.virtual_move_parallel_ds(g, v, r, nr, &self.b);
            }
        }
        ds
    }

    /// Dense adjacency delta. Every block pair touching `r` or `nr` is
    /// added to `m` with a zero change so one pass over `m` covers them.
    fn dense_move_ds(&self, v: usize, r: usize, nr: usize, multigraph: bool, m: &mut MoveEntrySet) -> Result<f64, SbmError> {
        if self.overlap.is_some() || self.cfg.deg_corr {
            return Err(dense_unsupported(self.overlap.is_some()));
        }
        let directed = self.directed;
        for s in [r, nr] {
            if s == NULL_GROUP {
                continue;
            }
            for adj in self.bg.out_edges(s).iter().chain(self.bg.in_edges(s)) {
                let (t, u) = self.bg.endpoints(adj.edge);
                m.insert_delta(t, u, 0);
            }
        }
        let ds = m
            .iter()
            .map(|(t, u, d)| {
                let ers = self.mrs(t, u);
                let before = eterm_dense(t, u, ers, self.wr[t], self.wr[u], multigraph, directed);
                let after = eterm_dense(
                    t,
                    u,
                    ers + d,
                    self.wr_after(v, r, nr, t),
                    self.wr_after(v, r, nr, u),
                    multigraph,
                    directed,
                );
                after - before
            })
            .sum();
        Ok(ds)
    }

    fn covariate_ds(&self, m: &MoveEntrySet) -> f64 {
        if !self.covariates.is_active() {
            return 0.0;
        }
        let channels = self.covariates.channels();
        let mut ds = 0.0;
        for i in 0..m.len() {
            let (t, u) = m.pair(i);
            let e = self.block_edge(t, u);
            for c in 0..channels {
                let before = e.map_or_else(PairRecords::default, |e| self.pair_records(e, c));
                ds += self.covariates.pair_delta(c, before, m.dcount(i), m.drec(i, c), m.ddrec(i, c));
            }
        }
        ds
    }

    pub(crate) fn pair_records(&self, e: usize, channel: usize) -> PairRecords {
        PairRecords {
            count: self.bg.bcount(e),
            sum: self.bg.brec(channel, e),
            sum_sq: self.bg.bdrec(channel, e),
        }
    }

    /// Change of the partition description length of moving `v` from `r`
    /// to `nr`, including the induced change at every coupled level.
    ///
    /// A weightless vertex entering from [`NULL_GROUP`] counts as weight
    /// one, which is how a newly occupied child block enters its parent.
    pub fn get_delta_partition_dl(&self, v: usize, r: usize, nr: usize, ea: &EntropyArgs) -> f64 {
        if r == nr {
            return 0.0;
        }
        let w = self.node_weight(v);
        let mut ds = 0.0;
        if ea.partition_dl {
            ds += self.partition_stats[self.cell(v)].delta_partition_dl(opt(r), opt(nr), w);
        }
        let Some(c) = self.coupling.as_deref() else {
            return ds;
        };
        let w = if r == NULL_GROUP && w == 0 { 1 } else { w };
        let vacate = r != NULL_GROUP
            && w > 0
            && match &self.overlap {
                Some(ov) => ov.virtual_remove_size(v, r) == 0,
                None => self.wr[r] == w,
            };
        let occupy = nr != NULL_GROUP && w > 0 && self.wr[nr] == 0;
        let hb = &c.state.b;
        let dl = match (vacate, occupy) {
            (true, true) => c.state.get_delta_partition_dl(r, hb[r], hb[nr], &c.args),
            (true, false) => c.state.get_delta_partition_dl(r, hb[r], NULL_GROUP, &c.args),
            (false, true) => c.state.get_delta_partition_dl(nr, NULL_GROUP, hb[nr], &c.args),
            (false, false) => 0.0,
        };
        ds + c.args.beta_dl * dl
    }

    /// Entropy change at this level, and recursively above, caused by the
    /// child-level pair changes `pairs` of a child move from block `u` to
    /// block `v`. `du` and `dv` are the weight changes of the child blocks,
    /// which are vertices here.
    pub(crate) fn propagate_entries_ds(
        &self,
        u: usize,
        v: usize,
        du: i64,
        dv: i64,
        pairs: &[PairDelta],
        ea: &EntropyArgs,
    ) -> Result<f64, SbmError> {
        if u == v {
            return Ok(0.0);
        }
        let hb = |x: usize| if x == NULL_GROUP { NULL_GROUP } else { self.b[x] };
        let (r, s) = (hb(u), hb(v));
        let wr_after = |x: usize| {
            let mut w = self.wr[x];
            if x == r {
                w += du;
            }
            if x == s {
                w += dv;
            }
            w
        };
        let directed = self.directed;

        let mut m = self.scratch.lock();
        m.set_move(r, s, self.num_blocks());
        for pd in pairs {
            m.insert_delta(hb(pd.source), hb(pd.target), pd.delta);
        }

        let mut ds = 0.0;
        if ea.adjacency {
            if ea.dense {
                if self.cfg.deg_corr {
                    return Err(dense_unsupported(false));
                }
                for (x, dx) in [(r, du), (s, dv)] {
                    if x == NULL_GROUP || dx == 0 {
                        continue;
                    }
                    for adj in self.bg.out_edges(x).iter().chain(self.bg.in_edges(x)) {
                        let (a, b) = self.bg.endpoints(adj.edge);
                        m.insert_delta(a, b, 0);
                    }
                }
                for (t, w, d) in m.iter() {
                    let ers = self.mrs(t, w);
                    ds += eterm_dense(t, w, ers + d, wr_after(t), wr_after(w), ea.multigraph, directed)
                        - eterm_dense(t, w, ers, self.wr[t], self.wr[w], ea.multigraph, directed);
                }
            } else {
                let (et, vt) = terms(ea.exact);
                let deg_corr = self.cfg.deg_corr;
                for (t, w, d) in m.iter() {
                    if d != 0 {
                        let mrs = self.mrs(t, w);
                        ds += et(t, w, mrs + d, directed) - et(t, w, mrs, directed);
                    }
                }
                let mrm = self.mrm();
                let mut touched: Vec<(usize, i64, i64)> = m
                    .block_deltas()
                    .iter()
                    .map(|bd| (bd.block, bd.dmrp, bd.dmrm))
                    .collect();
                for x in [r, s] {
                    if x != NULL_GROUP && !touched.iter().any(|&(y, _, _)| y == x) {
                        touched.push((x, 0, 0));
                    }
                }
                for (x, dp, dm) in touched {
                    ds += vt(self.mrp[x] + dp, mrm[x] + dm, wr_after(x), deg_corr, directed)
                        - vt(self.mrp[x], mrm[x], self.wr[x], deg_corr, directed);
                }
                if ea.multigraph {
                    for pd in pairs {
                        let lp = !directed && pd.source == pd.target;
                        ds += parallel_term(pd.weight + pd.delta, lp) - parallel_term(pd.weight, lp);
                    }
                }
                if !ea.exact {
                    let de = m.total_delta() as f64;
                    ds += if ea.multigraph { -de } else { de };
                }
            }
        }

        let de: i64 = pairs.iter().map(|pd| pd.delta).sum();
        let vacate = r != NULL_GROUP && du != 0 && self.wr[r] > 0 && wr_after(r) == 0;
        let occupy = s != NULL_GROUP && dv != 0 && self.wr[s] == 0 && wr_after(s) > 0;
        let mut dl = 0.0;
        if ea.edges_dl {
            let db = occupy as i64 - vacate as i64;
            if db != 0 || de != 0 {
                let b = self.actual_b();
                let after = (b as i64 + db).max(0) as usize;
                dl += edges_dl(after, self.e + de, directed) - edges_dl(b, self.e, directed);
            }
        }
        if let Some(c) = self.coupling.as_deref() {
            let forwarded: Vec<PairDelta> = m
                .iter()
                .filter(|&(_, _, d)| d != 0)
                .map(|(t, w, d)| PairDelta {
                    source: t,
                    target: w,
                    weight: self.mrs(t, w),
                    delta: d,
                })
                .collect();
            drop(m);
            dl += c.state.propagate_entries_ds(
                r,
                s,
                -(vacate as i64),
                occupy as i64,
                &forwarded,
                &c.args,
            )?;
        }
        Ok(ds + ea.beta_dl * dl)
    }
}
