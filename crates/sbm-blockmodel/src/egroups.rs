//! Edge-guided neighbour-block sampling.

use rand::Rng;

use sbm_core::GraphView;

use crate::block_graph::BlockGraph;
use crate::sampler::DynamicSampler;

const NONE: usize = usize::MAX;

/// One sampler per block over its neighbouring blocks, weighted by the
/// block-pair multiplicity. Each block-graph edge `(r, s)` appears in the
/// sampler of `r` and in that of `s`, so a self-pair weighs twice.
#[derive(Debug, Clone, Default)]
pub struct EGroups {
    samplers: Vec<DynamicSampler<usize>>,
    handles: Vec<[usize; 2]>,
}

impl EGroups {
    /// Builds the samplers from the current block graph.
    pub fn build(bg: &BlockGraph) -> Self {
        let mut groups = Self {
            samplers: (0..bg.num_vertices()).map(|_| DynamicSampler::new()).collect(),
            handles: vec![[NONE; 2]; bg.edge_bound()],
        };
        for e in bg.edges() {
            let (r, s) = bg.endpoints(e);
            groups.update_edge(e, r, s, bg.mrs(e));
        }
        groups
    }

    /// Registers a freshly allocated block.
    pub fn add_block(&mut self) {
        self.samplers.push(DynamicSampler::new());
    }

    /// Sets the weight of block edge `e = (r, s)` to `mrs`, inserting or
    /// removing its sampler items as needed.
    pub fn update_edge(&mut self, e: usize, r: usize, s: usize, mrs: i64) {
        if e >= self.handles.len() {
            self.handles.resize(e + 1, [NONE; 2]);
        }
        while self.samplers.len() <= r.max(s) {
            self.samplers.push(DynamicSampler::new());
        }
        let ends = [(r, s), (s, r)];
        for (side, (from, to)) in ends.into_iter().enumerate() {
            let h = self.handles[e][side];
            if mrs > 0 {
                if h == NONE {
                    self.handles[e][side] = self.samplers[from].insert(to, mrs as f64);
                } else {
                    self.samplers[from].update(h, mrs as f64, false);
                }
            } else if h != NONE {
                self.samplers[from].remove(h);
                self.handles[e][side] = NONE;
            }
        }
    }

    /// Draws a neighbour block of `r`.
    pub fn sample_edge<R: Rng + ?Sized>(&self, r: usize, rng: &mut R) -> Option<usize> {
        self.samplers.get(r)?.sample(rng).copied()
    }

    /// Total sampling weight of block `r`.
    pub fn total(&self, r: usize) -> f64 {
        self.samplers.get(r).map_or(0.0, DynamicSampler::total)
    }

    /// Returns whether the samplers agree with the block graph.
    pub fn is_consistent(&self, bg: &BlockGraph) -> bool {
        bg.edges().all(|e| {
            let (r, s) = bg.endpoints(e);
            let [h0, h1] = self.handles.get(e).copied().unwrap_or([NONE; 2]);
            if bg.mrs(e) == 0 {
                return h0 == NONE && h1 == NONE;
            }
            h0 != NONE
                && h1 != NONE
                && self.samplers[r].get_prob(h0) == bg.mrs(e) as f64
                && self.samplers[s].get_prob(h1) == bg.mrs(e) as f64
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn tracks_block_edges() {
        let mut bg = BlockGraph::new(3, false, 0);
        let e01 = bg.add_edge(0, 1);
        bg.add_mrs(e01, 3);
        let e11 = bg.add_edge(1, 1);
        bg.add_mrs(e11, 2);
        let mut groups = EGroups::build(&bg);
        assert!(groups.is_consistent(&bg));
        assert_eq!(groups.total(1), 7.0);
        assert_eq!(groups.total(0), 3.0);

        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(groups.sample_edge(0, &mut rng), Some(1));
        assert_eq!(groups.sample_edge(2, &mut rng), None);

        groups.update_edge(e01, 0, 1, 0);
        assert_eq!(groups.total(0), 0.0);
        assert_eq!(groups.total(1), 4.0);
    }
}
