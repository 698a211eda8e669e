//! Block-pair to block-edge lookup.

use std::collections::HashMap;

const NO_EDGE: usize = usize::MAX;

/// Lookup from a block pair to the edge of the block multigraph joining them.
///
/// For undirected block graphs `(r, s)` and `(s, r)` resolve to the same
/// edge. Implementations differ only in their cost profile.
pub trait BlockEdgeIndex {
    /// Edge joining `r` to `s`, if any.
    fn get(&self, r: usize, s: usize) -> Option<usize>;
    /// Records `e` as the edge joining `r` to `s`.
    fn put(&mut self, r: usize, s: usize, e: usize);
    /// Forgets the edge joining `r` to `s`.
    fn remove(&mut self, r: usize, s: usize);
    /// Makes room for one more block id.
    fn add_block(&mut self);
}

/// Dense `B x B` table; `O(1)` access, `O(B²)` memory.
#[derive(Debug, Clone)]
pub struct DenseEdgeIndex {
    directed: bool,
    num_blocks: usize,
    stride: usize,
    table: Vec<usize>,
}

impl DenseEdgeIndex {
    /// Creates a table for `num_blocks` blocks.
    pub fn new(num_blocks: usize, directed: bool) -> Self {
        let stride = num_blocks.max(1);
        Self {
            directed,
            num_blocks,
            stride,
            table: vec![NO_EDGE; stride * stride],
        }
    }

    fn grow(&mut self, stride: usize) {
        let mut table = vec![NO_EDGE; stride * stride];
        for r in 0..self.num_blocks {
            let old = &self.table[r * self.stride..r * self.stride + self.num_blocks];
            table[r * stride..r * stride + self.num_blocks].copy_from_slice(old);
        }
        self.table = table;
        self.stride = stride;
    }
}

impl BlockEdgeIndex for DenseEdgeIndex {
    fn get(&self, r: usize, s: usize) -> Option<usize> {
        if r >= self.num_blocks || s >= self.num_blocks {
            return None;
        }
        match self.table[r * self.stride + s] {
            NO_EDGE => None,
            e => Some(e),
        }
    }

    fn put(&mut self, r: usize, s: usize, e: usize) {
        self.table[r * self.stride + s] = e;
        if !self.directed {
            self.table[s * self.stride + r] = e;
        }
    }

    fn remove(&mut self, r: usize, s: usize) {
        self.put(r, s, NO_EDGE);
    }

    fn add_block(&mut self) {
        if self.num_blocks == self.stride {
            self.grow(self.stride * 2);
        }
        self.num_blocks += 1;
    }
}

/// Hash map keyed by block pair; memory proportional to occupied pairs.
#[derive(Debug, Clone)]
pub struct HashEdgeIndex {
    directed: bool,
    map: HashMap<(usize, usize), usize>,
}

impl HashEdgeIndex {
    /// Creates an empty index.
    pub fn new(directed: bool) -> Self {
        Self {
            directed,
            map: HashMap::new(),
        }
    }

    #[inline]
    fn key(&self, r: usize, s: usize) -> (usize, usize) {
        if self.directed || r <= s {
            (r, s)
        } else {
            (s, r)
        }
    }
}

impl BlockEdgeIndex for HashEdgeIndex {
    fn get(&self, r: usize, s: usize) -> Option<usize> {
        self.map.get(&self.key(r, s)).copied()
    }

    fn put(&mut self, r: usize, s: usize, e: usize) {
        let key = self.key(r, s);
        self.map.insert(key, e);
    }

    fn remove(&mut self, r: usize, s: usize) {
        let key = self.key(r, s);
        self.map.remove(&key);
    }

    fn add_block(&mut self) {}
}

/// Backend chosen at construction time from `use_hash`.
#[derive(Debug, Clone)]
pub enum EdgeIndex {
    /// Dense table backend.
    Dense(DenseEdgeIndex),
    /// Hash map backend.
    Hash(HashEdgeIndex),
}

impl EdgeIndex {
    /// Creates the backend selected by `use_hash`.
    pub fn new(num_blocks: usize, directed: bool, use_hash: bool) -> Self {
        if use_hash {
            EdgeIndex::Hash(HashEdgeIndex::new(directed))
        } else {
            EdgeIndex::Dense(DenseEdgeIndex::new(num_blocks, directed))
        }
    }

    fn backend(&self) -> &dyn BlockEdgeIndex {
        match self {
            EdgeIndex::Dense(index) => index,
            EdgeIndex::Hash(index) => index,
        }
    }

    fn backend_mut(&mut self) -> &mut dyn BlockEdgeIndex {
        match self {
            EdgeIndex::Dense(index) => index,
            EdgeIndex::Hash(index) => index,
        }
    }
}

impl BlockEdgeIndex for EdgeIndex {
    fn get(&self, r: usize, s: usize) -> Option<usize> {
        self.backend().get(r, s)
    }

    fn put(&mut self, r: usize, s: usize, e: usize) {
        self.backend_mut().put(r, s, e)
    }

    fn remove(&mut self, r: usize, s: usize) {
        self.backend_mut().remove(r, s)
    }

    fn add_block(&mut self) {
        self.backend_mut().add_block()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(index: &mut EdgeIndex) {
        index.put(0, 1, 10);
        index.put(2, 2, 11);
        assert_eq!(index.get(0, 1), Some(10));
        assert_eq!(index.get(2, 2), Some(11));
        index.add_block();
        index.add_block();
        index.put(4, 0, 12);
        assert_eq!(index.get(4, 0), Some(12));
        assert_eq!(index.get(0, 1), Some(10));
        index.remove(0, 1);
        assert_eq!(index.get(0, 1), None);
    }

    #[test]
    fn backends_agree_on_undirected_symmetry() {
        for use_hash in [false, true] {
            let mut index = EdgeIndex::new(3, false, use_hash);
            exercise(&mut index);
            assert_eq!(index.get(0, 4), Some(12));
        }
    }

    #[test]
    fn directed_pairs_are_ordered() {
        for use_hash in [false, true] {
            let mut index = EdgeIndex::new(3, true, use_hash);
            exercise(&mut index);
            assert_eq!(index.get(0, 4), None);
        }
    }
}
