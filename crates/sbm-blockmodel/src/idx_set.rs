use rand::Rng;

const ABSENT: usize = usize::MAX;

/// Set of small integer ids with `O(1)` insert, erase and uniform draws.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdxSet {
    items: Vec<usize>,
    pos: Vec<usize>,
}

impl IdxSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `x`; returns `false` if it was already present.
    pub fn insert(&mut self, x: usize) -> bool {
        if x >= self.pos.len() {
            self.pos.resize(x + 1, ABSENT);
        }
        if self.pos[x] != ABSENT {
            return false;
        }
        self.pos[x] = self.items.len();
        self.items.push(x);
        true
    }

    /// Removes `x`; returns `false` if it was absent.
    pub fn erase(&mut self, x: usize) -> bool {
        if !self.contains(x) {
            return false;
        }
        let i = self.pos[x];
        let last = self.items.len() - 1;
        self.items.swap(i, last);
        self.pos[self.items[i]] = i;
        self.items.pop();
        self.pos[x] = ABSENT;
        true
    }

    /// Returns whether `x` is in the set.
    pub fn contains(&self, x: usize) -> bool {
        self.pos.get(x).is_some_and(|&p| p != ABSENT)
    }

    /// Element at the end of the storage order; a fresh insertion is always last.
    pub fn last(&self) -> Option<usize> {
        self.items.last().copied()
    }

    /// Uniformly drawn element.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items[rng.gen_range(0..self.items.len())])
        }
    }

    /// Elements in storage order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.items.iter().copied()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Removes every element.
    pub fn clear(&mut self) {
        for &x in &self.items {
            self.pos[x] = ABSENT;
        }
        self.items.clear();
    }
}
