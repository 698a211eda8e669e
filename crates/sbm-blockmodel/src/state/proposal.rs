//! Block proposals and their probabilities.

use rand::Rng;

use sbm_core::{Adjacent, GraphView, SbmError, NULL_GROUP};

use super::BlockState;
use crate::egroups::EGroups;
use crate::entries::MoveEntrySet;

/// Adjacency entries a proposal for `v` draws its neighbour from.
fn proposal_edges<G: GraphView + ?Sized>(g: &G, v: usize) -> impl Iterator<Item = Adjacent> + '_ {
    g.out_edges(v).iter().chain(g.in_edges(v)).copied()
}

impl BlockState {
    /// Probability of opening a new block given `b` occupied blocks.
    fn new_block_prob(&self, d: f64, b: usize) -> f64 {
        if (b as i64) < self.total_weight() {
            d
        } else {
            0.0
        }
    }

    /// Symmetrised multiplicity between `t` and `s`, as weighted in the
    /// neighbour sampler of `t`.
    fn sampler_weight(&self, t: usize, s: usize) -> i64 {
        if self.directed {
            self.mrs(t, s) + self.mrs(s, t)
        } else if t == s {
            2 * self.mrs(t, t)
        } else {
            self.mrs(t, s)
        }
    }

    fn sampler_weight_delta(&self, m: &MoveEntrySet, t: usize, s: usize) -> i64 {
        if self.directed {
            m.get_delta(t, s) + m.get_delta(s, t)
        } else if t == s {
            2 * m.get_delta(t, t)
        } else {
            m.get_delta(t, s)
        }
    }

    /// Total sampler weight of block `t`.
    fn sampler_total(&self, t: usize) -> i64 {
        if self.directed {
            self.mrp[t] + self.mrm[t]
        } else {
            self.mrp[t]
        }
    }

    fn sampler_total_delta(m: &MoveEntrySet, t: usize) -> i64 {
        m.block_deltas()
            .iter()
            .find(|bd| bd.block == t)
            .map_or(0, |bd| bd.dmrp + bd.dmrm)
    }

    /// Log-probability of proposing block `s` for `v` sitting in `r`.
    ///
    /// With `reverse` set, the probability is evaluated in the state after
    /// `v` moves from `s` to `r`: call it before the commit, with `v` still
    /// in `s`, and pass the entries of that move (they are computed when
    /// `m` is `None`).
    #[allow(clippy::too_many_arguments)]
    pub fn get_move_prob<G: GraphView + ?Sized>(
        &self,
        g: &G,
        v: usize,
        r: usize,
        s: usize,
        c: f64,
        d: f64,
        reverse: bool,
        m: Option<&MoveEntrySet>,
    ) -> f64 {
        if reverse && m.is_none() {
            let mut local = self.scratch.lock();
            self.get_move_entries(g, v, s, r, &mut local);
            return self.move_prob(g, v, r, s, c, d, Some(&local));
        }
        self.move_prob(g, v, r, s, c, d, if reverse { m } else { None })
    }

    /// `post` holds the entries of the pending move when the probability is
    /// taken in the post-move state.
    #[allow(clippy::too_many_arguments)]
    fn move_prob<G: GraphView + ?Sized>(
        &self,
        g: &G,
        v: usize,
        r: usize,
        s: usize,
        c: f64,
        d: f64,
        post: Option<&MoveEntrySet>,
    ) -> f64 {
        let mut b = self.candidate_blocks.len();
        if post.is_some() {
            let vacates = self.vacates(v, s);
            if self.occupies(v, r) {
                b += 1;
            }
            if vacates {
                return self.new_block_prob(d, b - 1).ln();
            }
        } else if self.wr[s] == 0 {
            return self.new_block_prob(d, b).ln();
        }
        let d = self.new_block_prob(d, b);
        let uniform = -(b as f64).ln();
        if c.is_infinite() {
            return (1.0 - d).ln() + uniform;
        }
        let bf = b as f64;
        let p = match &self.overlap {
            Some(ov) => {
                let hs = ov.half_edges(ov.node(v));
                let sum: f64 = hs
                    .iter()
                    .map(|&h| self.neighbour_prob(g, v, h, r, s, c, bf, post))
                    .sum();
                sum / hs.len() as f64
            }
            None => self.neighbour_prob(g, v, v, r, s, c, bf, post),
        };
        (1.0 - d).ln() + p.ln()
    }

    /// Probability that a neighbour drawn through `h` leads the proposal
    /// for `v` to `s`; uniform when `h` has no edges.
    #[allow(clippy::too_many_arguments)]
    fn neighbour_prob<G: GraphView + ?Sized>(
        &self,
        g: &G,
        v: usize,
        h: usize,
        r: usize,
        s: usize,
        c: f64,
        bf: f64,
        post: Option<&MoveEntrySet>,
    ) -> f64 {
        let mut p = 0.0;
        let mut total = 0.0;
        for adj in proposal_edges(g, h) {
            let u = adj.vertex;
            let t = if u == v { r } else { self.b[u] };
            let w = self.weights.edge(g, adj.edge) as f64;
            total += w;
            if t == NULL_GROUP {
                p += w / bf;
                continue;
            }
            let (mut mts, mut et) = (self.sampler_weight(t, s), self.sampler_total(t));
            if let Some(m) = post {
                mts += self.sampler_weight_delta(m, t, s);
                et += Self::sampler_total_delta(m, t);
            }
            let denom = et as f64 + c * bf;
            p += w * if denom > 0.0 { (mts as f64 + c) / denom } else { 1.0 / bf };
        }
        if total > 0.0 {
            p / total
        } else {
            1.0 / bf
        }
    }

    fn pick_neighbour<G: GraphView + ?Sized, R: Rng + ?Sized>(&self, g: &G, v: usize, rng: &mut R) -> Option<Adjacent> {
        let v = match &self.overlap {
            Some(ov) => ov.sample_half_edge(v, rng),
            None => v,
        };
        let total: i64 = proposal_edges(g, v).map(|a| self.weights.edge(g, a.edge)).sum();
        if total <= 0 {
            return None;
        }
        let mut x = rng.gen_range(0..total);
        for adj in proposal_edges(g, v) {
            let w = self.weights.edge(g, adj.edge);
            if x < w {
                return Some(adj);
            }
            x -= w;
        }
        None
    }

    fn sample_occupied<R: Rng + ?Sized>(&mut self, v: usize, rng: &mut R) -> usize {
        match self.candidate_blocks.sample(rng) {
            Some(s) => s,
            None => self.get_empty_block(v, false),
        }
    }

    /// Proposes a block for `v`.
    ///
    /// With probability `d` (while fewer blocks than vertices are occupied)
    /// an empty block is opened. Otherwise, for finite `c`, a neighbour of
    /// `v` is drawn and the proposal follows the block multigraph around its
    /// block, mixed with a uniform draw over occupied blocks in proportion
    /// to `c`; infinite `c` is purely uniform.
    pub fn sample_block<G: GraphView + ?Sized, R: Rng + ?Sized>(
        &mut self,
        g: &G,
        v: usize,
        c: f64,
        d: f64,
        rng: &mut R,
    ) -> Result<usize, SbmError> {
        let r = self.b[v];
        let d = self.new_block_prob(d, self.candidate_blocks.len());
        if d > 0.0 && rng.gen::<f64>() < d {
            let s = self.get_empty_block(v, false);
            if r != NULL_GROUP {
                self.bclabel[s] = self.bclabel[r];
            }
            if let Some(link) = self.coupling.as_deref_mut() {
                link.state.sample_branch(s, r, rng)?;
            }
            return Ok(s);
        }
        if c.is_infinite() {
            return Ok(self.sample_occupied(v, rng));
        }
        let Some(adj) = self.pick_neighbour(g, v, rng) else {
            return Ok(self.sample_occupied(v, rng));
        };
        let t = if adj.vertex == v { r } else { self.b[adj.vertex] };
        if t == NULL_GROUP {
            return Ok(self.sample_occupied(v, rng));
        }
        let bf = self.candidate_blocks.len() as f64;
        let et = self.sampler_total(t) as f64;
        if et + c * bf <= 0.0 {
            return Ok(self.sample_occupied(v, rng));
        }
        let p_rand = c * bf / (et + c * bf);
        if rng.gen::<f64>() < p_rand {
            return Ok(self.sample_occupied(v, rng));
        }
        let bg = &self.bg;
        let egroups = self.egroups.get_or_insert_with(|| EGroups::build(bg));
        match egroups.sample_edge(t, rng) {
            Some(s) => Ok(s),
            None => Ok(self.sample_occupied(v, rng)),
        }
    }

    /// Assigns the weightless vertex `v` to a block: a new one with
    /// probability `1 / (B + 1)`, otherwise a uniformly drawn occupied one.
    /// A new block takes its label from the block of `u` and is itself
    /// placed in the coupled parent.
    pub fn sample_branch<R: Rng + ?Sized>(
        &mut self,
        v: usize,
        u: usize,
        rng: &mut R,
    ) -> Result<usize, SbmError> {
        if self.vweight[v] != 0 {
            return Err(SbmError::invariant("branch-weighted", "only weightless vertices can be branched")
                .with_context("vertex", v)
                .with_context("weight", self.vweight[v]));
        }
        let b = self.candidate_blocks.len();
        let open = b == 0 || rng.gen::<f64>() < 1.0 / (b as f64 + 1.0);
        let s = match self.candidate_blocks.sample(rng) {
            Some(s) if !open => s,
            _ => {
                let s = match self.empty_blocks.last() {
                    Some(s) => s,
                    None => self.add_block(1),
                };
                let hu = if u == NULL_GROUP { NULL_GROUP } else { self.b[u] };
                if hu != NULL_GROUP {
                    self.bclabel[s] = self.bclabel[hu];
                }
                if let Some(link) = self.coupling.as_deref_mut() {
                    link.state.sample_branch(s, hu, rng)?;
                }
                s
            }
        };
        self.b[v] = s;
        Ok(s)
    }
}
