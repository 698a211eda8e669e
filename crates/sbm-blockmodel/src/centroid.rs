//! Centre partition of an ensemble of reference partitions.
//!
//! The entropy is `N` times the summed variation of information between
//! the centre and every reference, so minimising it yields a consensus
//! partition. Block ids range over `0..N`.

use std::collections::HashMap;

use log::debug;
use rand::Rng;
use rayon::prelude::*;

use sbm_core::SbmError;

use crate::config::EntropyArgs;
use crate::entropy::{safelog, xlogx};
use crate::idx_set::IdxSet;
use crate::model::PartitionModel;

/// Contingency counts between the centre and one reference partition.
#[derive(Debug, Clone, Default, PartialEq)]
struct Contingency {
    joint: HashMap<(usize, usize), i64>,
    sizes: HashMap<usize, i64>,
}

impl Contingency {
    fn joint(&self, r: usize, x: usize) -> i64 {
        self.joint.get(&(r, x)).copied().unwrap_or(0)
    }

    fn shift(&mut self, r: usize, x: usize, delta: i64) {
        let m = self.joint.entry((r, x)).or_insert(0);
        *m += delta;
        if *m == 0 {
            self.joint.remove(&(r, x));
        }
    }
}

/// Centre partition state against `M` fixed reference partitions.
#[derive(Debug, Clone)]
pub struct CentroidState {
    b: Vec<usize>,
    refs: Vec<Vec<usize>>,
    tables: Vec<Contingency>,
    wr: Vec<i64>,
    candidate_blocks: IdxSet,
    empty_blocks: IdxSet,
}

impl CentroidState {
    /// Builds the state with centre `b` over the reference partitions
    /// `refs`, each of which must label the same `N` vertices.
    pub fn new(b: Vec<usize>, refs: Vec<Vec<usize>>) -> Result<Self, SbmError> {
        let n = b.len();
        if let Some((i, bad)) = refs.iter().enumerate().find(|(_, x)| x.len() != n) {
            return Err(SbmError::config("reference-length", "reference partition has the wrong length")
                .with_context("reference", i)
                .with_context("expected", n)
                .with_context("actual", bad.len()));
        }
        if let Some((v, &r)) = b.iter().enumerate().find(|(_, &r)| r >= n) {
            return Err(SbmError::config("unknown-block", "centre block id out of range")
                .with_context("vertex", v)
                .with_context("block", r)
                .with_hint("block ids must be below the number of vertices"));
        }

        let mut wr = vec![0i64; n];
        for &r in &b {
            wr[r] += 1;
        }
        let mut candidate_blocks = IdxSet::new();
        let mut empty_blocks = IdxSet::new();
        for (r, &w) in wr.iter().enumerate() {
            if w > 0 {
                candidate_blocks.insert(r);
            } else {
                empty_blocks.insert(r);
            }
        }
        let tables = refs
            .par_iter()
            .map(|x| {
                let mut t = Contingency::default();
                for (v, &s) in x.iter().enumerate() {
                    *t.joint.entry((b[v], s)).or_insert(0) += 1;
                    *t.sizes.entry(s).or_insert(0) += 1;
                }
                t
            })
            .collect();
        debug!(
            "centroid state: {} vertices, {} references, {} occupied blocks",
            n,
            refs.len(),
            candidate_blocks.len()
        );
        Ok(Self {
            b,
            refs,
            tables,
            wr,
            candidate_blocks,
            empty_blocks,
        })
    }

    /// Current centre partition.
    pub fn b(&self) -> &[usize] {
        &self.b
    }

    /// Number of reference partitions.
    pub fn num_references(&self) -> usize {
        self.refs.len()
    }

    /// Size of block `r`.
    pub fn wr(&self, r: usize) -> i64 {
        self.wr[r]
    }

    /// Number of occupied blocks.
    pub fn num_occupied(&self) -> usize {
        self.candidate_blocks.len()
    }

    /// Whether `v` is the only member of its block.
    pub fn is_last(&self, v: usize) -> bool {
        self.wr[self.b[v]] == 1
    }

    /// `N Σ_i VI(b, x_i)` in nats.
    pub fn entropy(&self) -> f64 {
        let sizes: f64 = self.wr.iter().map(|&w| xlogx(w)).sum();
        self.tables
            .par_iter()
            .map(|t| {
                let joint: f64 = t.joint.values().map(|&m| xlogx(m)).sum();
                let marg: f64 = t.sizes.values().map(|&m| xlogx(m)).sum();
                -2.0 * joint + marg + sizes
            })
            .sum()
    }

    /// Mean variation of information per reference.
    pub fn mean_distance(&self) -> f64 {
        if self.refs.is_empty() || self.b.is_empty() {
            return 0.0;
        }
        self.entropy() / (self.refs.len() * self.b.len()) as f64
    }

    /// Entropy change of moving `v` from `r` to `nr`.
    pub fn virtual_move(&self, v: usize, r: usize, nr: usize) -> f64 {
        if r == nr {
            return 0.0;
        }
        let m = self.refs.len() as f64;
        let (wr, wnr) = (self.wr[r], self.wr[nr]);
        let mut ds = m * (xlogx(wr - 1) + xlogx(wnr + 1) - xlogx(wr) - xlogx(wnr));
        ds += self
            .tables
            .par_iter()
            .zip(self.refs.par_iter())
            .map(|(t, x)| {
                let s = x[v];
                let (a, c) = (t.joint(r, s), t.joint(nr, s));
                -2.0 * (xlogx(a - 1) + xlogx(c + 1) - xlogx(a) - xlogx(c))
            })
            .sum::<f64>();
        ds
    }

    /// Moves `v` to block `nr`.
    pub fn move_vertex(&mut self, v: usize, nr: usize) -> Result<(), SbmError> {
        let n = self.b.len();
        if v >= n {
            return Err(SbmError::config("unknown-vertex", "vertex out of range")
                .with_context("vertex", v)
                .with_context("vertices", n));
        }
        if nr >= n {
            return Err(SbmError::config("unknown-block", "block out of range")
                .with_context("block", nr)
                .with_context("blocks", n));
        }
        let r = self.b[v];
        if r == nr {
            return Ok(());
        }
        self.wr[r] -= 1;
        self.wr[nr] += 1;
        for (t, x) in self.tables.iter_mut().zip(&self.refs) {
            let s = x[v];
            t.shift(r, s, -1);
            t.shift(nr, s, 1);
        }
        if self.wr[r] == 0 {
            self.candidate_blocks.erase(r);
            self.empty_blocks.insert(r);
        }
        if self.wr[nr] == 1 {
            self.empty_blocks.erase(nr);
            self.candidate_blocks.insert(nr);
        }
        self.b[v] = nr;
        Ok(())
    }

    /// Proposes a block for `v`: with probability `d` the most recently
    /// emptied block, otherwise a uniformly drawn occupied one.
    pub fn sample_block<R: Rng + ?Sized>(&self, v: usize, d: f64, rng: &mut R) -> usize {
        if d > 0.0 && rng.gen::<f64>() < d {
            if let Some(s) = self.empty_blocks.last() {
                return s;
            }
        }
        self.candidate_blocks.sample(rng).unwrap_or(self.b[v])
    }

    /// Log-probability of proposing `s` for a vertex in `r`; with
    /// `reverse`, of proposing `s` back after the vertex moves from `s`
    /// to `r`, evaluated before the move.
    pub fn get_move_prob(&self, r: usize, s: usize, d: f64, reverse: bool) -> f64 {
        let mut b = self.candidate_blocks.len();
        if reverse {
            if self.wr[s] == 1 {
                return d.ln();
            }
            if self.wr[r] == 0 {
                b += 1;
            }
        } else if self.wr[s] == 0 {
            return d.ln();
        }
        let d = if b == self.b.len() { 0.0 } else { d };
        (1.0 - d).ln() - safelog(b as i64)
    }

    /// Independent copy.
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }

    /// Overwrites the centre partition and its counts with `other`'s.
    pub fn deep_assign(&mut self, other: &Self) -> Result<(), SbmError> {
        if other.b.len() != self.b.len() || other.refs != self.refs {
            return Err(SbmError::config("shape-mismatch", "cannot assign a centroid over different references")
                .with_context("vertices", self.b.len())
                .with_context("other_vertices", other.b.len()));
        }
        self.b.clone_from(&other.b);
        self.tables.clone_from(&other.tables);
        self.wr.clone_from(&other.wr);
        self.candidate_blocks.clone_from(&other.candidate_blocks);
        self.empty_blocks.clone_from(&other.empty_blocks);
        Ok(())
    }
}

impl PartitionModel for CentroidState {
    fn num_vertices(&self) -> usize {
        self.b.len()
    }

    fn block_of(&self, v: usize) -> usize {
        self.b[v]
    }

    fn entropy(&self, _ea: &EntropyArgs) -> Result<f64, SbmError> {
        Ok(CentroidState::entropy(self))
    }

    fn virtual_move(&self, v: usize, r: usize, nr: usize, _ea: &EntropyArgs) -> Result<f64, SbmError> {
        Ok(CentroidState::virtual_move(self, v, r, nr))
    }

    fn move_vertex(&mut self, v: usize, nr: usize) -> Result<(), SbmError> {
        CentroidState::move_vertex(self, v, nr)
    }

    fn sample_block<R: Rng + ?Sized>(&mut self, v: usize, _c: f64, d: f64, rng: &mut R) -> Result<usize, SbmError> {
        Ok(CentroidState::sample_block(self, v, d, rng))
    }

    fn move_prob(&self, _v: usize, r: usize, s: usize, _c: f64, d: f64, reverse: bool) -> f64 {
        self.get_move_prob(r, s, d, reverse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identical_references_have_zero_entropy() {
        let b = vec![0, 0, 1, 1, 2];
        let state = CentroidState::new(b.clone(), vec![b.clone(), vec![3, 3, 0, 0, 1]]).unwrap();
        assert_relative_eq!(state.entropy(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn virtual_move_matches_entropy_difference() {
        let refs = vec![vec![0, 0, 1, 1, 2, 2], vec![0, 1, 0, 1, 0, 1]];
        let mut state = CentroidState::new(vec![0, 0, 0, 1, 1, 1], refs).unwrap();
        let before = state.entropy();
        let ds = state.virtual_move(2, 0, 4);
        state.move_vertex(2, 4).unwrap();
        assert_relative_eq!(state.entropy() - before, ds, epsilon = 1e-9);
        assert_eq!(state.num_occupied(), 3);
    }

    #[test]
    fn rejects_mismatched_reference() {
        let err = CentroidState::new(vec![0, 0], vec![vec![0]]).unwrap_err();
        assert!(err.to_string().contains("reference"));
    }
}
