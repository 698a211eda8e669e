//! Incrementally maintained partition and degree statistics.

use std::collections::HashMap;

use crate::config::DegreeDlKind;
use crate::entropy::{edges_dl, lbinom, lgamma_int, log_q, safelog, xlogx};

const UNMAPPED: usize = usize::MAX;

/// Block sizes and degree histograms of one label cell of the vertices.
///
/// Block ids are global; each cell maps the blocks it has seen to compact
/// local slots on first use. Vertices of weight zero are not counted.
#[derive(Debug, Clone)]
pub struct PartitionStats {
    directed: bool,
    deg_corr: bool,
    n: i64,
    actual_b: usize,
    rmap: Vec<usize>,
    total: Vec<i64>,
    ep: Vec<i64>,
    em: Vec<i64>,
    hist: Vec<HashMap<(i64, i64), i64>>,
}

impl PartitionStats {
    /// Creates empty statistics.
    pub fn new(directed: bool, deg_corr: bool) -> Self {
        Self {
            directed,
            deg_corr,
            n: 0,
            actual_b: 0,
            rmap: Vec::new(),
            total: Vec::new(),
            ep: Vec::new(),
            em: Vec::new(),
            hist: Vec::new(),
        }
    }

    /// Local slot of global block `r`, allocating it on first use.
    pub fn get_r(&mut self, r: usize) -> usize {
        if r >= self.rmap.len() {
            self.rmap.resize(r + 1, UNMAPPED);
        }
        if self.rmap[r] == UNMAPPED {
            self.rmap[r] = self.total.len();
            self.total.push(0);
            self.ep.push(0);
            self.em.push(0);
            self.hist.push(HashMap::new());
        }
        self.rmap[r]
    }

    /// Local slot of global block `r`, if this cell has seen it.
    pub fn find_r(&self, r: usize) -> Option<usize> {
        self.rmap.get(r).copied().filter(|&l| l != UNMAPPED)
    }

    /// Total vertex weight counted by this cell.
    pub fn n(&self) -> i64 {
        self.n
    }

    /// Number of blocks with positive weight in this cell.
    pub fn actual_b(&self) -> usize {
        self.actual_b
    }

    /// Weight of block `r` in this cell.
    pub fn total(&self, r: usize) -> i64 {
        self.find_r(r).map_or(0, |l| self.total[l])
    }

    /// Counts a vertex of weight `w` and degree `(kin, kout)` in block `r`.
    pub fn add_vertex(&mut self, r: usize, w: i64, deg: (i64, i64)) {
        self.change_vertex(r, w, deg);
    }

    /// Removes a vertex previously counted with [`Self::add_vertex`].
    pub fn remove_vertex(&mut self, r: usize, w: i64, deg: (i64, i64)) {
        self.change_vertex(r, -w, deg);
    }

    fn change_vertex(&mut self, r: usize, dw: i64, (kin, kout): (i64, i64)) {
        if dw == 0 {
            return;
        }
        let l = self.get_r(r);
        let before = self.total[l];
        self.total[l] += dw;
        self.n += dw;
        match (before == 0, self.total[l] == 0) {
            (true, false) => self.actual_b += 1,
            (false, true) => self.actual_b -= 1,
            _ => {}
        }
        if self.deg_corr {
            self.ep[l] += kout * dw;
            self.em[l] += kin * dw;
            let count = self.hist[l].entry((kin, kout)).or_insert(0);
            *count += dw;
            if *count == 0 {
                self.hist[l].remove(&(kin, kout));
            }
        }
    }

    /// Description length of the block sizes.
    pub fn partition_dl(&self) -> f64 {
        let mut s = lbinom(self.n - 1, self.actual_b as i64 - 1);
        s += lgamma_int(self.n + 1);
        for &nr in &self.total {
            s -= lgamma_int(nr + 1);
        }
        s + safelog(self.n)
    }

    /// Description length of the degree sequence.
    pub fn deg_dl(&self, kind: DegreeDlKind) -> f64 {
        (0..self.total.len())
            .map(|l| {
                let (t, ep, em) = (self.total[l], self.ep[l], self.em[l]);
                let mut s = self.block_deg_term(kind, t, ep, em);
                for &c in self.hist[l].values() {
                    s -= Self::hist_term(kind, c);
                }
                s
            })
            .sum()
    }

    fn block_deg_term(&self, kind: DegreeDlKind, t: i64, ep: i64, em: i64) -> f64 {
        match kind {
            DegreeDlKind::Entropy => xlogx(t),
            DegreeDlKind::Uniform => {
                let mut s = lbinom(t + ep - 1, ep);
                if self.directed {
                    s += lbinom(t + em - 1, em);
                }
                s
            }
            DegreeDlKind::Distributed => {
                let mut s = log_q(ep, t);
                if self.directed {
                    s += log_q(em, t);
                }
                s + lgamma_int(t + 1)
            }
        }
    }

    fn hist_term(kind: DegreeDlKind, count: i64) -> f64 {
        match kind {
            DegreeDlKind::Entropy => xlogx(count),
            DegreeDlKind::Uniform => 0.0,
            DegreeDlKind::Distributed => lgamma_int(count + 1),
        }
    }

    fn vacates(&self, r: Option<usize>, n: i64) -> bool {
        r.is_some_and(|r| self.total(r) == n)
    }

    fn occupies(&self, nr: Option<usize>) -> bool {
        nr.is_some_and(|nr| self.total(nr) == 0)
    }

    /// Weight a move counts with: zero-weight insertions count as one,
    /// other zero-weight moves are free.
    fn move_weight(r: Option<usize>, w: i64) -> Option<i64> {
        match (w, r) {
            (0, None) => Some(1),
            (0, Some(_)) => None,
            (w, _) => Some(w),
        }
    }

    /// Change of [`Self::partition_dl`] if a vertex of weight `w` moved from
    /// `r` to `nr`; `None` stands for insertion or removal.
    pub fn delta_partition_dl(&self, r: Option<usize>, nr: Option<usize>, w: i64) -> f64 {
        if r == nr {
            return 0.0;
        }
        let Some(n) = Self::move_weight(r, w) else {
            return 0.0;
        };
        let (mut s_b, mut s_a) = (0.0, 0.0);
        if let Some(r) = r {
            let t = self.total(r);
            s_b -= lgamma_int(t + 1);
            s_a -= lgamma_int(t - n + 1);
        }
        if let Some(nr) = nr {
            let t = self.total(nr);
            s_b -= lgamma_int(t + 1);
            s_a -= lgamma_int(t + n + 1);
        }
        let mut dn = 0;
        if r.is_none() {
            dn += n;
        }
        if nr.is_none() {
            dn -= n;
        }
        s_b += lgamma_int(self.n + 1);
        s_a += lgamma_int(self.n + dn + 1);

        let db = self.occupies(nr) as i64 - self.vacates(r, n) as i64;
        let b = self.actual_b as i64;
        if dn != 0 || db != 0 {
            s_b += lbinom(self.n - 1, b - 1);
            s_a += lbinom(self.n - 1 + dn, b + db - 1);
        }
        if dn != 0 {
            s_b += safelog(self.n);
            s_a += safelog(self.n + dn);
        }
        s_a - s_b
    }

    fn deg_term_change(&self, r: usize, d: i64, (kin, kout): (i64, i64), kind: DegreeDlKind) -> f64 {
        let (t, ep, em, c) = match self.find_r(r) {
            Some(l) => (
                self.total[l],
                self.ep[l],
                self.em[l],
                self.hist[l].get(&(kin, kout)).copied().unwrap_or(0),
            ),
            None => (0, 0, 0, 0),
        };
        let before = self.block_deg_term(kind, t, ep, em) - Self::hist_term(kind, c);
        let after = self.block_deg_term(kind, t + d, ep + d * kout, em + d * kin)
            - Self::hist_term(kind, c + d);
        after - before
    }

    /// Change of [`Self::deg_dl`] if a vertex of weight `w` and degree `deg`
    /// moved from `r` to `nr`.
    pub fn delta_deg_dl(
        &self,
        r: Option<usize>,
        nr: Option<usize>,
        w: i64,
        deg: (i64, i64),
        kind: DegreeDlKind,
    ) -> f64 {
        if r == nr || w == 0 {
            return 0.0;
        }
        let mut ds = 0.0;
        if let Some(r) = r {
            ds += self.deg_term_change(r, -w, deg, kind);
        }
        if let Some(nr) = nr {
            ds += self.deg_term_change(nr, w, deg, kind);
        }
        ds
    }

    /// Change of the edge-count description length caused by the move, given
    /// the block count `actual_b` summed over all cells, `e` edges before
    /// the move and a change of `de` edges.
    pub fn delta_edges_dl(
        &self,
        r: Option<usize>,
        nr: Option<usize>,
        w: i64,
        actual_b: usize,
        e: i64,
        de: i64,
    ) -> f64 {
        if r == nr {
            return 0.0;
        }
        let Some(n) = Self::move_weight(r, w) else {
            return 0.0;
        };
        let db = self.occupies(nr) as i64 - self.vacates(r, n) as i64;
        if db == 0 && de == 0 {
            return 0.0;
        }
        let after = (actual_b as i64 + db).max(0) as usize;
        edges_dl(after, e + de, self.directed) - edges_dl(actual_b, e, self.directed)
    }
}
