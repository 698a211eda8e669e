//! Scratch record of the block-pair changes implied by one vertex move.

use sbm_core::NULL_GROUP;

const EMPTY: usize = usize::MAX;

/// Change of the out/in edge totals of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDelta {
    /// Block id.
    pub block: usize,
    /// Change of the out-degree total (`mrp`).
    pub dmrp: i64,
    /// Change of the in-degree total (`mrm`).
    pub dmrm: i64,
}

/// A block-pair multiplicity change forwarded to the parent level, where the
/// pair's endpoints are vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairDelta {
    /// Source block at the forwarding level.
    pub source: usize,
    /// Target block at the forwarding level.
    pub target: usize,
    /// Multiplicity of the pair before the change.
    pub weight: i64,
    /// Change of the multiplicity.
    pub delta: i64,
}

/// Accumulates `(block pair -> delta)` for a move from `r` to `nr`.
///
/// Every pair touched by a single move has `r` or `nr` as an endpoint, so
/// lookups go through four block-indexed slot tables; pairs outside that
/// pattern fall back to a linear scan. Undirected pairs are stored with the
/// smaller block first.
#[derive(Debug, Clone)]
pub struct MoveEntrySet {
    directed: bool,
    channels: usize,
    r: usize,
    nr: usize,
    r_out: Vec<usize>,
    r_in: Vec<usize>,
    nr_out: Vec<usize>,
    nr_in: Vec<usize>,
    pairs: Vec<(usize, usize)>,
    delta: Vec<i64>,
    dcount: Vec<i64>,
    drec: Vec<f64>,
    ddrec: Vec<f64>,
    blocks: Vec<BlockDelta>,
    propagated: Vec<PairDelta>,
}

#[derive(Clone, Copy)]
enum Slot {
    ROut,
    RIn,
    NrOut,
    NrIn,
}

impl MoveEntrySet {
    /// Creates an empty set carrying `channels` covariate channels.
    pub fn new(directed: bool, channels: usize) -> Self {
        Self {
            directed,
            channels,
            r: NULL_GROUP,
            nr: NULL_GROUP,
            r_out: Vec::new(),
            r_in: Vec::new(),
            nr_out: Vec::new(),
            nr_in: Vec::new(),
            pairs: Vec::new(),
            delta: Vec::new(),
            dcount: Vec::new(),
            drec: Vec::new(),
            ddrec: Vec::new(),
            blocks: Vec::new(),
            propagated: Vec::new(),
        }
    }

    /// Clears the set for a move from `r` to `nr` among `num_blocks` blocks.
    pub fn set_move(&mut self, r: usize, nr: usize, num_blocks: usize) {
        for i in 0..self.pairs.len() {
            let (t, u) = self.pairs[i];
            if let Some((slot, k)) = self.slot_of(t, u) {
                if let Some(x) = self.table_mut(slot).get_mut(k) {
                    *x = EMPTY;
                }
            }
        }
        self.r = r;
        self.nr = nr;
        for table in [
            &mut self.r_out,
            &mut self.r_in,
            &mut self.nr_out,
            &mut self.nr_in,
        ] {
            if table.len() < num_blocks {
                table.resize(num_blocks, EMPTY);
            }
        }
        self.pairs.clear();
        self.delta.clear();
        self.dcount.clear();
        self.drec.clear();
        self.ddrec.clear();
        self.blocks.clear();
    }

    /// Source and target blocks of the current move.
    pub fn move_blocks(&self) -> (usize, usize) {
        (self.r, self.nr)
    }

    /// Returns whether pairs keep their orientation.
    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// Number of covariate channels carried per entry.
    pub fn channels(&self) -> usize {
        self.channels
    }

    fn canonical(&self, t: usize, u: usize) -> (usize, usize) {
        if self.directed || t <= u {
            (t, u)
        } else {
            (u, t)
        }
    }

    fn slot_of(&self, t: usize, u: usize) -> Option<(Slot, usize)> {
        if t == self.r {
            Some((Slot::ROut, u))
        } else if t == self.nr {
            Some((Slot::NrOut, u))
        } else if u == self.r {
            Some((Slot::RIn, t))
        } else if u == self.nr {
            Some((Slot::NrIn, t))
        } else {
            None
        }
    }

    fn table(&self, slot: Slot) -> &[usize] {
        match slot {
            Slot::ROut => &self.r_out,
            Slot::RIn => &self.r_in,
            Slot::NrOut => &self.nr_out,
            Slot::NrIn => &self.nr_in,
        }
    }

    fn table_mut(&mut self, slot: Slot) -> &mut Vec<usize> {
        match slot {
            Slot::ROut => &mut self.r_out,
            Slot::RIn => &mut self.r_in,
            Slot::NrOut => &mut self.nr_out,
            Slot::NrIn => &mut self.nr_in,
        }
    }

    /// Index of the entry for pair `(t, u)`, if present.
    pub fn find(&self, t: usize, u: usize) -> Option<usize> {
        let (t, u) = self.canonical(t, u);
        match self.slot_of(t, u) {
            Some((slot, k)) => self.table(slot).get(k).copied().filter(|&i| i != EMPTY),
            None => self.scan(t, u),
        }
    }

    fn scan(&self, t: usize, u: usize) -> Option<usize> {
        self.pairs.iter().position(|&p| p == (t, u))
    }

    /// Adds `d` to the multiplicity change of pair `(t, u)` and returns the
    /// entry index; pairs touching an unassigned vertex are dropped.
    pub fn insert_delta(&mut self, t: usize, u: usize, d: i64) -> Option<usize> {
        if t == NULL_GROUP || u == NULL_GROUP {
            return None;
        }
        let (t, u) = self.canonical(t, u);
        let i = match self.find(t, u) {
            Some(i) => i,
            None => {
                let i = self.pairs.len();
                self.pairs.push((t, u));
                self.delta.push(0);
                self.dcount.push(0);
                self.drec.extend(std::iter::repeat(0.0).take(self.channels));
                self.ddrec.extend(std::iter::repeat(0.0).take(self.channels));
                if let Some((slot, k)) = self.slot_of(t, u) {
                    let table = self.table_mut(slot);
                    if k >= table.len() {
                        table.resize(k + 1, EMPTY);
                    }
                    table[k] = i;
                }
                i
            }
        };
        self.delta[i] += d;
        if d != 0 {
            self.add_block_delta(t, d, 0);
            if self.directed {
                self.add_block_delta(u, 0, d);
            } else {
                self.add_block_delta(u, d, 0);
            }
        }
        Some(i)
    }

    fn add_block_delta(&mut self, block: usize, dmrp: i64, dmrm: i64) {
        match self.blocks.iter_mut().find(|b| b.block == block) {
            Some(b) => {
                b.dmrp += dmrp;
                b.dmrm += dmrm;
            }
            None => self.blocks.push(BlockDelta { block, dmrp, dmrm }),
        }
    }

    /// Adds `d` to the edge-record count change of entry `i`.
    pub fn add_count(&mut self, i: usize, d: i64) {
        self.dcount[i] += d;
    }

    /// Adds to the covariate sum and sum-of-squares changes of entry `i`.
    pub fn add_rec(&mut self, i: usize, channel: usize, dx: f64, dx2: f64) {
        self.drec[i * self.channels + channel] += dx;
        self.ddrec[i * self.channels + channel] += dx2;
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns whether no pair was touched.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Block pair of entry `i`.
    pub fn pair(&self, i: usize) -> (usize, usize) {
        self.pairs[i]
    }

    /// Multiplicity change of entry `i`.
    pub fn delta(&self, i: usize) -> i64 {
        self.delta[i]
    }

    /// Edge-record count change of entry `i`.
    pub fn dcount(&self, i: usize) -> i64 {
        self.dcount[i]
    }

    /// Covariate sum change of entry `i`.
    pub fn drec(&self, i: usize, channel: usize) -> f64 {
        self.drec[i * self.channels + channel]
    }

    /// Covariate sum-of-squares change of entry `i`.
    pub fn ddrec(&self, i: usize, channel: usize) -> f64 {
        self.ddrec[i * self.channels + channel]
    }

    /// Multiplicity change recorded for pair `(t, u)`, zero if untouched.
    pub fn get_delta(&self, t: usize, u: usize) -> i64 {
        self.find(t, u).map_or(0, |i| self.delta[i])
    }

    /// Iterates over `(source, target, delta)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, i64)> + '_ {
        self.pairs
            .iter()
            .zip(&self.delta)
            .map(|(&(t, u), &d)| (t, u, d))
    }

    /// Per-block changes of the edge totals implied by the entries.
    pub fn block_deltas(&self) -> &[BlockDelta] {
        &self.blocks
    }

    /// Net change of the total edge weight.
    pub fn total_delta(&self) -> i64 {
        self.delta.iter().sum()
    }

    /// Flips the sign of every recorded change.
    pub fn negate(&mut self) {
        self.delta.iter_mut().for_each(|d| *d = -*d);
        self.dcount.iter_mut().for_each(|d| *d = -*d);
        self.drec.iter_mut().for_each(|d| *d = -*d);
        self.ddrec.iter_mut().for_each(|d| *d = -*d);
        for b in &mut self.blocks {
            b.dmrp = -b.dmrp;
            b.dmrm = -b.dmrm;
        }
    }

    pub(crate) fn propagated(&self) -> &[PairDelta] {
        &self.propagated
    }

    pub(crate) fn propagated_mut(&mut self) -> &mut Vec<PairDelta> {
        &mut self.propagated
    }
}
