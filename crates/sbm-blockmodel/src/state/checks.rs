//! Recompute-and-compare verification of the maintained aggregates.

use std::collections::{HashMap, HashSet};

use log::warn;

use sbm_core::{GraphView, SbmError, NULL_GROUP};

use super::BlockState;
use crate::emat::BlockEdgeIndex;

fn violation(code: &str, message: &str) -> SbmError {
    let err = SbmError::invariant(code, message);
    warn!("{err}");
    err
}

/// Recounted covariate records of one block pair.
struct Records {
    count: i64,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl Records {
    fn new(channels: usize) -> Self {
        Self {
            count: 0,
            sum: vec![0.0; channels],
            sum_sq: vec![0.0; channels],
        }
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 * (1.0 + a.abs().max(b.abs()))
}

impl BlockState {
    /// Recomputes the block-pair multiplicities, covariate records and
    /// block degree totals from `g` and the partition and compares them
    /// with the maintained ones, then checks every coupled level the same
    /// way.
    pub fn check_edge_counts<G: GraphView + ?Sized>(&self, g: &G) -> Result<(), SbmError> {
        let directed = self.directed;
        let channels = self.bg.num_channels();
        let mut counts: HashMap<(usize, usize), i64> = HashMap::new();
        let mut records: HashMap<(usize, usize), Records> = HashMap::new();
        let mut mrp = vec![0i64; self.num_blocks()];
        let mut mrm = vec![0i64; self.num_blocks()];
        let mut total = 0;
        for e in g.edges() {
            let (a, b) = g.endpoints(e);
            let (r, s) = (self.b[a], self.b[b]);
            if r == NULL_GROUP || s == NULL_GROUP {
                continue;
            }
            let w = self.weights.edge(g, e);
            let key = if directed || r <= s { (r, s) } else { (s, r) };
            *counts.entry(key).or_insert(0) += w;
            if channels > 0 {
                let recs = records.entry(key).or_insert_with(|| Records::new(channels));
                recs.count += 1;
                for c in 0..channels {
                    let x = g.edge_covariate(e, c);
                    recs.sum[c] += x;
                    recs.sum_sq[c] += x * x;
                }
            }
            mrp[r] += w;
            if directed {
                mrm[s] += w;
            } else {
                mrp[s] += w;
            }
            total += w;
        }

        for e in self.bg.edges() {
            let (r, s) = self.bg.endpoints(e);
            let key = if directed || r <= s { (r, s) } else { (s, r) };
            let expected = counts.remove(&key).unwrap_or(0);
            if self.bg.mrs(e) != expected {
                return Err(violation("mrs-mismatch", "block pair multiplicity differs from recount")
                    .with_context("pair", format!("({r}, {s})"))
                    .with_context("maintained", self.bg.mrs(e))
                    .with_context("recounted", expected));
            }
            if channels > 0 {
                let recs = records.remove(&key).unwrap_or_else(|| Records::new(channels));
                self.check_records(e, (r, s), &recs)?;
            }
            if self.emat.get(r, s) != Some(e) {
                return Err(violation("emat-mismatch", "edge index does not resolve block pair to its edge")
                    .with_context("pair", format!("({r}, {s})"))
                    .with_context("edge", e));
            }
        }
        if let Some((&(r, s), recs)) = records.iter().find(|(_, recs)| recs.count != 0) {
            return Err(violation("records-missing", "recounted covariate records have no block edge")
                .with_context("pair", format!("({r}, {s})"))
                .with_context("recounted", recs.count));
        }
        if let Some((&(r, s), &m)) = counts.iter().find(|&(_, &m)| m != 0) {
            return Err(violation("mrs-missing", "recounted block pair has no block edge")
                .with_context("pair", format!("({r}, {s})"))
                .with_context("recounted", m));
        }
        for r in 0..self.num_blocks() {
            if self.mrp[r] != mrp[r] || (directed && self.mrm[r] != mrm[r]) {
                return Err(violation("degree-total-mismatch", "block degree totals differ from recount")
                    .with_context("block", r)
                    .with_context("mrp", self.mrp[r])
                    .with_context("recounted_mrp", mrp[r]));
            }
        }
        if self.e != total {
            return Err(violation("edge-total-mismatch", "edge total differs from recount")
                .with_context("maintained", self.e)
                .with_context("recounted", total));
        }
        let out: i64 = self.mrp.iter().sum();
        let expected_out = if directed { total } else { 2 * total };
        if out != expected_out || (directed && self.mrm.iter().sum::<i64>() != total) {
            return Err(violation("degree-conservation", "block degree totals do not add up to the edge total")
                .with_context("sum_mrp", out)
                .with_context("edges", total));
        }
        if let Some(eg) = &self.egroups {
            if !eg.is_consistent(&self.bg) {
                return Err(violation("egroups-mismatch", "neighbour samplers disagree with the block graph"));
            }
        }
        match self.coupling.as_deref() {
            Some(c) => c.state.check_edge_counts(&self.bg),
            None => Ok(()),
        }
    }

    fn check_records(&self, e: usize, (r, s): (usize, usize), recs: &Records) -> Result<(), SbmError> {
        if self.bg.bcount(e) != recs.count {
            return Err(violation("bcount-mismatch", "block pair record count differs from recount")
                .with_context("pair", format!("({r}, {s})"))
                .with_context("maintained", self.bg.bcount(e))
                .with_context("recounted", recs.count));
        }
        for c in 0..recs.sum.len() {
            let (sum, sum_sq) = (self.bg.brec(c, e), self.bg.bdrec(c, e));
            if !close(sum, recs.sum[c]) || !close(sum_sq, recs.sum_sq[c]) {
                return Err(violation("brec-mismatch", "block pair covariate sums differ from recount")
                    .with_context("pair", format!("({r}, {s})"))
                    .with_context("channel", c)
                    .with_context("maintained", format!("({sum}, {sum_sq})"))
                    .with_context("recounted", format!("({}, {})", recs.sum[c], recs.sum_sq[c])));
            }
        }
        Ok(())
    }

    /// Recomputes the block sizes and the occupied/empty sets and compares
    /// them with the maintained ones, then checks every coupled level.
    pub fn check_node_counts(&self) -> Result<(), SbmError> {
        let mut wr = vec![0i64; self.num_blocks()];
        match &self.overlap {
            Some(ov) => {
                let mut present = HashSet::new();
                for (v, &r) in self.b.iter().enumerate() {
                    if r != NULL_GROUP && present.insert((ov.node(v), r)) {
                        wr[r] += 1;
                    }
                }
            }
            None => {
                for (v, &r) in self.b.iter().enumerate() {
                    if r != NULL_GROUP {
                        wr[r] += self.vweight[v];
                    }
                }
            }
        }
        for (r, &w) in wr.iter().enumerate() {
            if self.wr[r] != w {
                return Err(violation("wr-mismatch", "block size differs from recount")
                    .with_context("block", r)
                    .with_context("maintained", self.wr[r])
                    .with_context("recounted", w));
            }
            let (occupied, empty) = (self.candidate_blocks.contains(r), self.empty_blocks.contains(r));
            if occupied == empty || occupied != (w > 0) {
                return Err(violation("block-set-mismatch", "block is not in exactly the set its size implies")
                    .with_context("block", r)
                    .with_context("size", w)
                    .with_context("occupied", occupied)
                    .with_context("empty", empty));
            }
        }
        if self.overlap.is_none() && self.total_weight() != wr.iter().sum::<i64>() {
            return Err(violation("weight-conservation", "partition statistics disagree with block sizes")
                .with_context("stats", self.total_weight())
                .with_context("blocks", wr.iter().sum::<i64>()));
        }
        match self.coupling.as_deref() {
            Some(c) => c.state.check_node_counts(),
            None => Ok(()),
        }
    }
}
