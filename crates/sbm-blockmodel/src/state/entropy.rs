//! Full entropy evaluation.

use std::collections::HashMap;

use rayon::prelude::*;

use sbm_core::{GraphView, SbmError};

use super::virtual_move::{dense_unsupported, terms};
use super::BlockState;
use crate::config::EntropyArgs;
use crate::entropy::{edges_dl, eterm_dense, lgamma_int, parallel_term};

impl BlockState {
    /// Entropy of the current state under `ea`.
    ///
    /// With `propagate` set the coupled parent levels contribute their own
    /// entropy to the description-length part.
    pub fn entropy<G: GraphView + ?Sized>(&self, g: &G, ea: &EntropyArgs, propagate: bool) -> Result<f64, SbmError> {
        let mut s = 0.0;
        if ea.adjacency {
            s += if ea.dense {
                if self.overlap.is_some() || self.cfg.deg_corr {
                    return Err(dense_unsupported(self.overlap.is_some()));
                }
                self.dense_entropy(ea.multigraph)
            } else {
                self.sparse_entropy(g, ea)
            };
        }
        if ea.recs {
            s += self.covariate_entropy();
        }

        let mut s_dl = 0.0;
        if ea.partition_dl {
            s_dl += self.partition_stats.iter().map(|ps| ps.partition_dl()).sum::<f64>();
        }
        if self.cfg.deg_corr && ea.degree_dl {
            s_dl += self
                .partition_stats
                .iter()
                .map(|ps| ps.deg_dl(ea.degree_dl_kind))
                .sum::<f64>();
        }
        if ea.edges_dl {
            s_dl += edges_dl(self.actual_b(), self.e, self.directed);
        }
        if propagate {
            if let Some(c) = self.coupling.as_deref() {
                s_dl += c.state.entropy(&self.bg, &c.args, true)?;
            }
        }
        Ok(s + ea.beta_dl * s_dl)
    }

    fn sparse_entropy<G: GraphView + ?Sized>(&self, g: &G, ea: &EntropyArgs) -> f64 {
        let (et, vt) = terms(ea.exact);
        let (directed, deg_corr) = (self.directed, self.cfg.deg_corr);
        let bg = &self.bg;
        let mut s: f64 = (0..bg.edge_bound())
            .into_par_iter()
            .filter(|&e| bg.is_alive(e))
            .map(|e| {
                let (r, t) = bg.endpoints(e);
                et(r, t, bg.mrs(e), directed)
            })
            .sum();
        let mrm = self.mrm();
        s += (0..self.num_blocks())
            .into_par_iter()
            .map(|r| vt(self.mrp[r], mrm[r], self.wr[r], deg_corr, directed))
            .sum::<f64>();
        if !ea.exact {
            let e = self.e as f64;
            s += if ea.multigraph { -e } else { e };
        }
        if deg_corr && ea.deg_entropy {
            s += match &self.overlap {
                Some(ov) => ov.deg_entropy(),
                None => self.deg_entropy(),
            };
        }
        if ea.multigraph {
            s += match &self.overlap {
                Some(ov) => ov.parallel_entropy(),
                None => self.parallel_entropy(g),
            };
        }
        s
    }

    /// `-Σ_v w_v (ln k_in! + ln k_out!)` over every vertex of the graph.
    fn deg_entropy(&self) -> f64 {
        (0..self.degs.len())
            .into_par_iter()
            .map(|v| {
                let (kin, kout) = self.degs[v];
                -(self.vweight[v] as f64) * (lgamma_int(kin + 1) + lgamma_int(kout + 1))
            })
            .sum()
    }

    /// Parallel-edge term over every vertex pair of the graph.
    fn parallel_entropy<G: GraphView + ?Sized>(&self, g: &G) -> f64 {
        let directed = self.directed;
        let weights = self.weights;
        (0..g.num_vertices())
            .into_par_iter()
            .map(|v| {
                let mut counts: HashMap<usize, i64> = HashMap::new();
                for adj in g.out_edges(v) {
                    if !directed && adj.vertex < v {
                        continue;
                    }
                    *counts.entry(adj.vertex).or_insert(0) += weights.edge(g, adj.edge);
                }
                counts
                    .into_iter()
                    .map(|(u, m)| parallel_term(m, !directed && u == v))
                    .sum::<f64>()
            })
            .sum()
    }

    fn dense_entropy(&self, multigraph: bool) -> f64 {
        let bg = &self.bg;
        let directed = self.directed;
        (0..bg.edge_bound())
            .into_par_iter()
            .filter(|&e| bg.is_alive(e))
            .map(|e| {
                let (r, s) = bg.endpoints(e);
                eterm_dense(r, s, bg.mrs(e), self.wr[r], self.wr[s], multigraph, directed)
            })
            .sum()
    }

    fn covariate_entropy(&self) -> f64 {
        if !self.covariates.is_active() {
            return 0.0;
        }
        let bg = &self.bg;
        let channels = self.covariates.channels();
        (0..bg.edge_bound())
            .into_par_iter()
            .filter(|&e| bg.is_alive(e))
            .map(|e| {
                (0..channels)
                    .map(|c| self.covariates.pair_term(c, self.pair_records(e, c)))
                    .sum::<f64>()
            })
            .sum()
    }
}
