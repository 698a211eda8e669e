//! Bookkeeping of the overlapping variant: half-edges grouped by the node
//! they were split from.

use std::collections::HashMap;

use rand::Rng;

use sbm_core::{GraphView, SbmError, NULL_GROUP};

use crate::entropy::{lgamma_int, parallel_term};

type BundleKey = ((usize, usize), (usize, usize));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct NodeBlock {
    count: i64,
    kin: i64,
    kout: i64,
}

/// Per-node placement of half-edges and the parallel bundles they form.
///
/// A node is present in block `r` while at least one of its half-edges is
/// placed there; the block's size is the number of present nodes. A bundle
/// groups the edges joining node `u` in block `r` to node `w` in block `s`.
#[derive(Debug, Clone)]
pub struct OverlapStats {
    directed: bool,
    node_index: Vec<usize>,
    half_edges: Vec<Vec<usize>>,
    node_blocks: Vec<HashMap<usize, NodeBlock>>,
    block_size: Vec<i64>,
    bundles: HashMap<BundleKey, i64>,
}

/// Weighted `(in, out)` degree of a half-edge; in-degree is zero when
/// undirected.
pub fn half_edge_degree<G: GraphView + ?Sized>(g: &G, v: usize) -> (i64, i64) {
    let kout = g.out_edges(v).iter().map(|a| g.edge_weight(a.edge)).sum();
    let kin = g.in_edges(v).iter().map(|a| g.edge_weight(a.edge)).sum();
    (kin, kout)
}

impl OverlapStats {
    /// Indexes the half-edges of `g` by node and records the placement `b`.
    pub fn new<G: GraphView + ?Sized>(
        g: &G,
        node_index: Vec<usize>,
        b: &[usize],
    ) -> Result<Self, SbmError> {
        if node_index.len() != g.num_vertices() {
            return Err(SbmError::config(
                "node-index-length",
                "node index must name one node per half-edge",
            )
            .with_context("expected", g.num_vertices())
            .with_context("actual", node_index.len()));
        }
        let num_nodes = node_index.iter().map(|&u| u + 1).max().unwrap_or(0);
        let mut half_edges = vec![Vec::new(); num_nodes];
        for (v, &u) in node_index.iter().enumerate() {
            half_edges[u].push(v);
        }
        let mut stats = Self {
            directed: g.is_directed(),
            node_index,
            half_edges,
            node_blocks: vec![HashMap::new(); num_nodes],
            block_size: Vec::new(),
            bundles: HashMap::new(),
        };
        let mut placed = vec![NULL_GROUP; b.len()];
        for (v, &r) in b.iter().enumerate() {
            if r != NULL_GROUP {
                stats.add_half_edge(g, v, r, &placed);
                placed[v] = r;
            }
        }
        Ok(stats)
    }

    /// Node that half-edge `v` belongs to.
    pub fn node(&self, v: usize) -> usize {
        self.node_index[v]
    }

    /// Half-edges of node `u`.
    pub fn half_edges(&self, u: usize) -> &[usize] {
        &self.half_edges[u]
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.half_edges.len()
    }

    /// Uniformly drawn half-edge of the node owning `v`.
    pub fn sample_half_edge<R: Rng + ?Sized>(&self, v: usize, rng: &mut R) -> usize {
        let hs = &self.half_edges[self.node(v)];
        hs[rng.gen_range(0..hs.len())]
    }

    /// Number of nodes present in block `r`.
    pub fn block_size(&self, r: usize) -> i64 {
        self.block_size.get(r).copied().unwrap_or(0)
    }

    fn count(&self, u: usize, r: usize) -> i64 {
        self.node_blocks[u].get(&r).map_or(0, |nb| nb.count)
    }

    /// Size of block `r` if half-edge `v` left it.
    pub fn virtual_remove_size(&self, v: usize, r: usize) -> i64 {
        let size = self.block_size(r);
        if self.count(self.node(v), r) == 1 {
            size - 1
        } else {
            size
        }
    }

    /// Size of block `nr` if half-edge `v` joined it.
    pub fn virtual_add_size(&self, v: usize, nr: usize) -> i64 {
        let size = self.block_size(nr);
        if self.count(self.node(v), nr) == 0 {
            size + 1
        } else {
            size
        }
    }

    fn bundle_key(&self, a: (usize, usize), c: (usize, usize), out: bool) -> BundleKey {
        if self.directed {
            if out {
                (a, c)
            } else {
                (c, a)
            }
        } else if a <= c {
            (a, c)
        } else {
            (c, a)
        }
    }

    fn bundle_changes<G: GraphView + ?Sized>(
        &self,
        g: &G,
        v: usize,
        r: usize,
        b: &[usize],
        sign: i64,
        out: &mut Vec<(BundleKey, i64)>,
    ) {
        let u = self.node(v);
        let lists = [(g.out_edges(v), true), (g.in_edges(v), false)];
        for (list, is_out) in lists {
            for adj in list {
                let w = adj.vertex;
                let bw = if w == v { r } else { b[w] };
                if bw == NULL_GROUP {
                    continue;
                }
                let key = self.bundle_key((u, r), (self.node(w), bw), is_out);
                let d = sign * g.edge_weight(adj.edge);
                match out.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, x)) => *x += d,
                    None => out.push((key, d)),
                }
            }
        }
    }

    fn change_half_edge<G: GraphView + ?Sized>(&mut self, g: &G, v: usize, r: usize, b: &[usize], sign: i64) {
        let u = self.node(v);
        let (kin, kout) = half_edge_degree(g, v);
        if r >= self.block_size.len() {
            self.block_size.resize(r + 1, 0);
        }
        let nb = self.node_blocks[u].entry(r).or_default();
        let before = nb.count;
        nb.count += sign;
        nb.kin += sign * kin;
        nb.kout += sign * kout;
        let after = nb.count;
        if after == 0 {
            self.node_blocks[u].remove(&r);
        }
        match (before, after) {
            (0, _) => self.block_size[r] += 1,
            (_, 0) => self.block_size[r] -= 1,
            _ => {}
        }
        let mut changes = Vec::new();
        self.bundle_changes(g, v, r, b, sign, &mut changes);
        for (key, d) in changes {
            let m = self.bundles.entry(key).or_insert(0);
            *m += d;
            if *m == 0 {
                self.bundles.remove(&key);
            }
        }
    }

    /// Places half-edge `v` into block `r`; `b` holds the placement of the
    /// other half-edges.
    pub fn add_half_edge<G: GraphView + ?Sized>(&mut self, g: &G, v: usize, r: usize, b: &[usize]) {
        self.change_half_edge(g, v, r, b, 1);
    }

    /// Removes half-edge `v` from block `r`.
    pub fn remove_half_edge<G: GraphView + ?Sized>(&mut self, g: &G, v: usize, r: usize, b: &[usize]) {
        self.change_half_edge(g, v, r, b, -1);
    }

    fn node_deg_term(nb: NodeBlock) -> f64 {
        -lgamma_int(nb.kin + 1) - lgamma_int(nb.kout + 1)
    }

    /// Degree entropy over the per-node, per-block degrees.
    pub fn deg_entropy(&self) -> f64 {
        self.node_blocks
            .iter()
            .flat_map(|blocks| blocks.values())
            .map(|&nb| Self::node_deg_term(nb))
            .sum()
    }

    /// Change of [`Self::deg_entropy`] if half-edge `v` moved from `r` to `nr`.
    pub fn virtual_move_deg_ds<G: GraphView + ?Sized>(&self, g: &G, v: usize, r: usize, nr: usize) -> f64 {
        let u = self.node(v);
        let (kin, kout) = half_edge_degree(g, v);
        let get = |s: usize| self.node_blocks[u].get(&s).copied().unwrap_or_default();
        let shift = |nb: NodeBlock, sign: i64| NodeBlock {
            count: nb.count + sign,
            kin: nb.kin + sign * kin,
            kout: nb.kout + sign * kout,
        };
        let mut ds = 0.0;
        if r != NULL_GROUP {
            let nb = get(r);
            ds += Self::node_deg_term(shift(nb, -1)) - Self::node_deg_term(nb);
        }
        if nr != NULL_GROUP {
            let nb = get(nr);
            ds += Self::node_deg_term(shift(nb, 1)) - Self::node_deg_term(nb);
        }
        ds
    }

    fn bundle_term(&self, key: &BundleKey, m: i64) -> f64 {
        parallel_term(m, !self.directed && key.0 == key.1)
    }

    /// Parallel-edge entropy of the bundles.
    pub fn parallel_entropy(&self) -> f64 {
        self.bundles.iter().map(|(key, &m)| self.bundle_term(key, m)).sum()
    }

    /// Change of [`Self::parallel_entropy`] if half-edge `v` moved from `r`
    /// to `nr`.
    pub fn virtual_move_parallel_ds<G: GraphView + ?Sized>(
        &self,
        g: &G,
        v: usize,
        r: usize,
        nr: usize,
        b: &[usize],
    ) -> f64 {
        let mut changes = Vec::new();
        if r != NULL_GROUP {
            self.bundle_changes(g, v, r, b, -1, &mut changes);
        }
        if nr != NULL_GROUP {
            let mut added = Vec::new();
            self.bundle_changes(g, v, nr, b, 1, &mut added);
            for (key, d) in added {
                match changes.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, x)) => *x += d,
                    None => changes.push((key, d)),
                }
            }
        }
        changes
            .iter()
            .map(|(key, d)| {
                let m = self.bundles.get(key).copied().unwrap_or(0);
                self.bundle_term(key, m + d) - self.bundle_term(key, m)
            })
            .sum()
    }
}
