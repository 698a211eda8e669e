//! Weighted sampling over a mutable item set.

use rand::Rng;

const NONE: usize = usize::MAX;

/// Sampler drawing items with probability proportional to their weights.
///
/// Weights live in the leaves of a complete binary tree stored in a flat
/// array; every internal node holds the sum of its subtree. Insertion,
/// removal, reweighting and sampling are `O(log n)`. Removed leaves go to a
/// free list and are recycled first; otherwise the tree grows by turning the
/// last leaf into an internal node whose left child keeps the old item and
/// whose right child receives the new one.
#[derive(Debug, Clone)]
pub struct DynamicSampler<T> {
    items: Vec<Option<T>>,
    ipos: Vec<usize>,
    tree: Vec<f64>,
    idx: Vec<usize>,
    back: usize,
    free: Vec<usize>,
    n_items: usize,
}

impl<T> Default for DynamicSampler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn parent(i: usize) -> usize {
    (i - 1) / 2
}

#[inline]
fn left(i: usize) -> usize {
    2 * i + 1
}

#[inline]
fn right(i: usize) -> usize {
    2 * i + 2
}

impl<T> DynamicSampler<T> {
    /// Creates an empty sampler.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            ipos: Vec::new(),
            tree: Vec::new(),
            idx: Vec::new(),
            back: 0,
            free: Vec::new(),
            n_items: 0,
        }
    }

    /// Inserts `item` with weight `w` and returns its handle.
    pub fn insert(&mut self, item: T, w: f64) -> usize {
        debug_assert!(w >= 0.0, "negative sampler weight");
        let pos = match self.free.pop() {
            Some(pos) => {
                let i = self.idx[pos];
                self.items[i] = Some(item);
                pos
            }
            None => {
                if self.back > 0 {
                    // push the last leaf down so the new item lands beside it
                    let pos = parent(self.back);
                    let l = left(pos);
                    self.check_size(l);
                    self.idx[l] = self.idx[pos];
                    self.ipos[self.idx[l]] = l;
                    self.tree[l] = self.tree[pos];
                    self.idx[pos] = NONE;
                    self.back = right(pos);
                }
                let pos = self.back;
                self.check_size(pos);
                self.idx[pos] = self.items.len();
                self.items.push(Some(item));
                self.ipos.push(pos);
                self.back += 1;
                self.check_size(self.back);
                pos
            }
        };
        self.tree[pos] = w;
        self.insert_leaf_prob(pos);
        self.n_items += 1;
        self.idx[pos]
    }

    /// Removes the item behind handle `i`.
    pub fn remove(&mut self, i: usize) {
        let pos = self.ipos[i];
        self.remove_leaf_prob(pos);
        self.tree[pos] = 0.0;
        self.free.push(pos);
        self.items[i] = None;
        self.n_items -= 1;
    }

    /// Sets (or, with `delta`, adds to) the weight of handle `i`.
    pub fn update(&mut self, i: usize, w: f64, delta: bool) {
        let pos = self.ipos[i];
        self.remove_leaf_prob(pos);
        if delta {
            self.tree[pos] += w;
        } else {
            self.tree[pos] = w;
        }
        self.insert_leaf_prob(pos);
    }

    /// Draws an item; `None` when the sampler holds no positive weight.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&T> {
        let total = self.total();
        if self.n_items == 0 || total <= 0.0 {
            return None;
        }
        let u = rng.gen::<f64>() * total;
        let mut c = 0.0;
        let mut pos = 0;
        while self.idx[pos] == NONE {
            let l = left(pos);
            let a = self.tree[l];
            if u < a + c {
                pos = l;
            } else {
                pos = right(pos);
                c += a;
            }
        }
        self.items[self.idx[pos]].as_ref()
    }

    /// Compacts away recycled leaves. Live items are reinserted in order of
    /// their old handles and receive new ones; the returned vector holds
    /// the new handles in that order.
    pub fn rebuild(&mut self) -> Vec<usize> {
        let mut live = Vec::with_capacity(self.n_items);
        for (i, item) in self.items.drain(..).enumerate() {
            if let Some(item) = item {
                live.push((i, item, self.tree[self.ipos[i]]));
            }
        }
        self.clear();
        live.into_iter()
            .map(|(_, item, w)| self.insert(item, w))
            .collect()
    }

    /// Removes every item.
    pub fn clear(&mut self) {
        self.items.clear();
        self.ipos.clear();
        self.tree.clear();
        self.idx.clear();
        self.free.clear();
        self.back = 0;
        self.n_items = 0;
    }

    /// Current weight of handle `i`.
    pub fn get_prob(&self, i: usize) -> f64 {
        self.tree[self.ipos[i]]
    }

    /// Item behind handle `i`, if it is live.
    pub fn get(&self, i: usize) -> Option<&T> {
        self.items.get(i).and_then(Option::as_ref)
    }

    /// Returns whether handle `i` refers to a live item.
    pub fn is_valid(&self, i: usize) -> bool {
        self.get(i).is_some()
    }

    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        self.tree.first().copied().unwrap_or(0.0)
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.n_items
    }

    /// Returns whether no item is live.
    pub fn is_empty(&self) -> bool {
        self.n_items == 0
    }

    /// Returns whether every internal node equals the sum of its children,
    /// within `tol` relative to the total weight.
    pub fn is_consistent(&self, tol: f64) -> bool {
        let scale = self.total().abs().max(1.0);
        (0..self.tree.len()).all(|pos| {
            if self.idx[pos] != NONE || right(pos) >= self.tree.len() {
                return true;
            }
            let sum = self.tree[left(pos)] + self.tree[right(pos)];
            (self.tree[pos] - sum).abs() <= tol * scale
        })
    }

    fn check_size(&mut self, i: usize) {
        if i >= self.tree.len() {
            self.idx.resize(i + 1, NONE);
            self.tree.resize(i + 1, 0.0);
        }
    }

    fn insert_leaf_prob(&mut self, i: usize) {
        let w = self.tree[i];
        let mut pos = i;
        while pos > 0 {
            pos = parent(pos);
            self.tree[pos] += w;
        }
    }

    fn remove_leaf_prob(&mut self, i: usize) {
        let w = self.tree[i];
        let mut pos = i;
        while pos > 0 {
            pos = parent(pos);
            self.tree[pos] -= w;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn single_item_is_always_drawn() {
        let mut sampler = DynamicSampler::new();
        let h = sampler.insert('a', 2.0);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10 {
            assert_eq!(sampler.sample(&mut rng), Some(&'a'));
        }
        assert_eq!(sampler.get_prob(h), 2.0);
    }

    #[test]
    fn free_leaves_are_recycled() {
        let mut sampler = DynamicSampler::new();
        let a = sampler.insert(0, 1.0);
        let b = sampler.insert(1, 2.0);
        let c = sampler.insert(2, 3.0);
        sampler.remove(b);
        assert!(!sampler.is_valid(b));
        assert_eq!(sampler.total(), 4.0);
        let d = sampler.insert(3, 5.0);
        assert_eq!(d, b);
        assert_eq!(sampler.len(), 3);
        assert_eq!(sampler.total(), 9.0);
        assert!(sampler.is_valid(a) && sampler.is_valid(c));
    }

    #[test]
    fn empty_or_zero_weight_sampler_yields_none() {
        let mut sampler: DynamicSampler<u8> = DynamicSampler::new();
        let mut rng = StdRng::seed_from_u64(3);
        assert!(sampler.sample(&mut rng).is_none());
        sampler.insert(1, 0.0);
        assert!(sampler.sample(&mut rng).is_none());
    }

    #[test]
    fn rebuild_drops_removed_items() {
        let mut sampler = DynamicSampler::new();
        let handles: Vec<_> = (0..6).map(|i| sampler.insert(i, i as f64 + 1.0)).collect();
        sampler.remove(handles[1]);
        sampler.remove(handles[4]);
        let remapped = sampler.rebuild();
        assert_eq!(remapped.len(), 4);
        assert_eq!(sampler.len(), 4);
        assert!((sampler.total() - (1.0 + 3.0 + 4.0 + 6.0)).abs() < 1e-12);
        assert!(sampler.is_consistent(1e-12));
    }

    #[test]
    fn draws_follow_the_weights() {
        let weights = [1.0, 2.0, 3.0, 4.0, 10.0, 0.5];
        let mut sampler = DynamicSampler::new();
        let handles: Vec<_> = weights.iter().enumerate().map(|(i, &w)| sampler.insert(i, w)).collect();
        // recycle one leaf and grow past it so both insertion paths are live
        sampler.remove(handles[2]);
        sampler.insert(2, weights[2]);
        sampler.insert(6, 6.0);
        sampler.update(handles[0], 1.5, true);
        let expected = [2.5, 2.0, 3.0, 4.0, 10.0, 0.5, 6.0];
        let total: f64 = expected.iter().sum();
        assert!((sampler.total() - total).abs() < 1e-12);

        let draws = 100_000;
        let mut counts = [0usize; 7];
        let mut rng = StdRng::seed_from_u64(2024);
        for _ in 0..draws {
            let &i = sampler.sample(&mut rng).unwrap();
            counts[i] += 1;
        }
        let chi2: f64 = counts
            .iter()
            .zip(expected)
            .map(|(&o, w)| {
                let e = draws as f64 * w / total;
                (o as f64 - e).powi(2) / e
            })
            .sum();
        // 0.999 quantile of chi-squared with 6 degrees of freedom
        assert!(chi2 < 22.46, "chi2 = {chi2}, counts = {counts:?}");
    }

    #[test]
    fn random_mutations_keep_the_tree_consistent() {
        let mut rng = StdRng::seed_from_u64(77);
        let mut sampler = DynamicSampler::new();
        let mut live: HashMap<usize, (u32, f64)> = HashMap::new();
        let mut next_id = 0u32;
        for step in 0..3000 {
            let handles: Vec<usize> = live.keys().copied().collect();
            match rng.gen_range(0..4) {
                0 | 1 if handles.len() < 64 => {
                    let w = rng.gen_range(0.0..10.0);
                    let h = sampler.insert(next_id, w);
                    assert!(live.insert(h, (next_id, w)).is_none(), "handle {h} reused while live");
                    next_id += 1;
                }
                2 if !handles.is_empty() => {
                    let h = handles[rng.gen_range(0..handles.len())];
                    sampler.remove(h);
                    live.remove(&h);
                }
                _ if !handles.is_empty() => {
                    let h = handles[rng.gen_range(0..handles.len())];
                    let entry = live.get_mut(&h).unwrap();
                    if rng.gen_bool(0.5) {
                        let dw = rng.gen_range(0.0..3.0);
                        sampler.update(h, dw, true);
                        entry.1 += dw;
                    } else {
                        let w = rng.gen_range(0.0..10.0);
                        sampler.update(h, w, false);
                        entry.1 = w;
                    }
                }
                _ => continue,
            }

            assert!(sampler.is_consistent(1e-9), "inconsistent tree at step {step}");
            assert_eq!(sampler.len(), live.len());
            let total: f64 = live.values().map(|&(_, w)| w).sum();
            assert!((sampler.total() - total).abs() < 1e-9 * (1.0 + total));
            for (&h, &(id, w)) in &live {
                assert_eq!(sampler.get(h), Some(&id));
                assert!((sampler.get_prob(h) - w).abs() < 1e-9 * (1.0 + w));
            }
            if let Some(&id) = sampler.sample(&mut rng) {
                assert!(live.values().any(|&(x, w)| x == id && w > 0.0));
            }
        }
    }
}
