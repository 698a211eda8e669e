//! The block multigraph: one vertex per block, one edge per occupied block
//! pair, with the aggregated multiplicity and covariate sums stored as flat
//! per-edge property arrays.

use sbm_core::{Adjacent, GraphView};

/// Block-level multigraph owned by a block state.
///
/// Edge slots are recycled after removal, so edge ids stay below
/// `edge_bound()` and property arrays stay dense.
#[derive(Debug, Clone)]
pub struct BlockGraph {
    directed: bool,
    out_adj: Vec<Vec<Adjacent>>,
    in_adj: Vec<Vec<Adjacent>>,
    endpoints: Vec<(usize, usize)>,
    alive: Vec<bool>,
    free: Vec<usize>,
    num_edges: usize,
    mrs: Vec<i64>,
    bcount: Vec<i64>,
    brec: Vec<Vec<f64>>,
    bdrec: Vec<Vec<f64>>,
}

impl BlockGraph {
    /// Creates a block graph over `num_blocks` blocks with `channels`
    /// covariate channels.
    pub fn new(num_blocks: usize, directed: bool, channels: usize) -> Self {
        Self {
            directed,
            out_adj: vec![Vec::new(); num_blocks],
            in_adj: vec![Vec::new(); num_blocks],
            endpoints: Vec::new(),
            alive: Vec::new(),
            free: Vec::new(),
            num_edges: 0,
            mrs: Vec::new(),
            bcount: Vec::new(),
            brec: vec![Vec::new(); channels],
            bdrec: vec![Vec::new(); channels],
        }
    }

    /// Appends a block vertex.
    pub fn add_block(&mut self) -> usize {
        self.out_adj.push(Vec::new());
        self.in_adj.push(Vec::new());
        self.out_adj.len() - 1
    }

    /// Number of covariate channels stored per edge.
    pub fn num_channels(&self) -> usize {
        self.brec.len()
    }

    /// Creates an empty edge from `r` to `s` and returns its slot.
    pub fn add_edge(&mut self, r: usize, s: usize) -> usize {
        let e = match self.free.pop() {
            Some(e) => {
                self.endpoints[e] = (r, s);
                self.alive[e] = true;
                self.mrs[e] = 0;
                self.bcount[e] = 0;
                for channel in 0..self.brec.len() {
                    self.brec[channel][e] = 0.0;
                    self.bdrec[channel][e] = 0.0;
                }
                e
            }
            None => {
                self.endpoints.push((r, s));
                self.alive.push(true);
                self.mrs.push(0);
                self.bcount.push(0);
                for channel in 0..self.brec.len() {
                    self.brec[channel].push(0.0);
                    self.bdrec[channel].push(0.0);
                }
                self.endpoints.len() - 1
            }
        };
        self.out_adj[r].push(Adjacent::new(s, e));
        if self.directed {
            self.in_adj[s].push(Adjacent::new(r, e));
        } else if r != s {
            self.out_adj[s].push(Adjacent::new(r, e));
        }
        self.num_edges += 1;
        e
    }

    /// Removes edge `e`; its slot is reused by a later insertion.
    pub fn remove_edge(&mut self, e: usize) {
        let (r, s) = self.endpoints[e];
        detach(&mut self.out_adj[r], e);
        if self.directed {
            detach(&mut self.in_adj[s], e);
        } else if r != s {
            detach(&mut self.out_adj[s], e);
        }
        self.alive[e] = false;
        self.mrs[e] = 0;
        self.free.push(e);
        self.num_edges -= 1;
    }

    /// Returns whether slot `e` holds a live edge.
    pub fn is_alive(&self, e: usize) -> bool {
        self.alive.get(e).copied().unwrap_or(false)
    }

    /// Aggregated multiplicity of edge `e`.
    #[inline]
    pub fn mrs(&self, e: usize) -> i64 {
        self.mrs[e]
    }

    /// Number of observed edge records aggregated into edge `e`.
    #[inline]
    pub fn bcount(&self, e: usize) -> i64 {
        self.bcount[e]
    }

    /// Covariate sum of `channel` over edge `e`.
    #[inline]
    pub fn brec(&self, channel: usize, e: usize) -> f64 {
        self.brec[channel][e]
    }

    /// Covariate sum of squares of `channel` over edge `e`.
    #[inline]
    pub fn bdrec(&self, channel: usize, e: usize) -> f64 {
        self.bdrec[channel][e]
    }

    pub(crate) fn add_mrs(&mut self, e: usize, delta: i64) -> i64 {
        self.mrs[e] += delta;
        self.mrs[e]
    }

    pub(crate) fn add_bcount(&mut self, e: usize, delta: i64) -> i64 {
        self.bcount[e] += delta;
        self.bcount[e]
    }

    pub(crate) fn add_rec(&mut self, channel: usize, e: usize, x: f64, x2: f64) {
        self.brec[channel][e] += x;
        self.bdrec[channel][e] += x2;
    }
}

fn detach(list: &mut Vec<Adjacent>, e: usize) {
    if let Some(i) = list.iter().position(|adj| adj.edge == e) {
        list.swap_remove(i);
    }
}

impl GraphView for BlockGraph {
    fn num_vertices(&self) -> usize {
        self.out_adj.len()
    }

    fn num_edges(&self) -> usize {
        self.num_edges
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
        Box::new((0..self.endpoints.len()).filter(move |&e| self.alive[e]))
    }

    fn edge_weight(&self, e: usize) -> i64 {
        self.mrs[e]
    }

    fn num_covariates(&self) -> usize {
        self.brec.len()
    }

    fn edge_covariate(&self, e: usize, channel: usize) -> f64 {
        self.brec[channel][e]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_slots_are_recycled_and_detached() {
        let mut bg = BlockGraph::new(3, false, 1);
        let a = bg.add_edge(0, 1);
        let b = bg.add_edge(1, 1);
        bg.add_mrs(a, 4);
        bg.add_rec(0, a, 2.0, 4.0);
        assert_eq!(bg.out_edges(1).len(), 2);
        bg.remove_edge(a);
        assert_eq!(bg.out_edges(0).len(), 0);
        assert_eq!(bg.out_edges(1), &[Adjacent::new(1, b)]);
        let c = bg.add_edge(2, 0);
        assert_eq!(c, a);
        assert_eq!(bg.mrs(c), 0);
        assert_eq!(bg.brec(0, c), 0.0);
        assert_eq!(bg.edges().count(), 2);
    }
}
