//! Disjoint-set forest over dense `u32` indices.

/// Union-find with union by rank and path compression.
#[derive(Clone, Debug)]
pub struct UnionFind {
    parent: Vec<u32>,
    rank: Vec<u8>,
}

impl UnionFind {
    /// `n` singleton sets `{0}, {1}, ..., {n-1}`.
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
            rank: vec![0; n],
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Whether the forest has no elements.
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Representative of `x`'s set.
    ///
    /// # Panics
    ///
    /// Panics if `x >= self.len()`.
    pub fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        let mut cur = x;
        while self.parent[cur as usize] != root {
            let next = self.parent[cur as usize];
            self.parent[cur as usize] = root;
            cur = next;
        }
        root
    }

    /// Merge the sets containing `a` and `b`. Returns `false` if they were
    /// already the same set.
    pub fn union(&mut self, a: u32, b: u32) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        let (hi, lo) = match self.rank[ra as usize].cmp(&self.rank[rb as usize]) {
            std::cmp::Ordering::Less => (rb, ra),
            std::cmp::Ordering::Greater => (ra, rb),
            std::cmp::Ordering::Equal => {
                self.rank[ra as usize] += 1;
                (ra, rb)
            }
        };
        self.parent[lo as usize] = hi;
        true
    }

    /// Whether `a` and `b` are in the same set.
    pub fn same(&mut self, a: u32, b: u32) -> bool {
        self.find(a) == self.find(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn singletons_are_disjoint() {
        let mut uf = UnionFind::new(3);
        assert!(!uf.same(0, 1));
        assert_eq!(uf.find(2), 2);
        assert_eq!(uf.len(), 3);
    }

    #[test]
    fn union_is_transitive() {
        let mut uf = UnionFind::new(5);
        assert!(uf.union(0, 1));
        assert!(uf.union(3, 4));
        assert!(uf.union(1, 4));
        assert!(!uf.union(0, 3));
        assert!(uf.same(0, 4));
        assert!(!uf.same(2, 0));
    }

    proptest! {
        #[test]
        fn matches_naive_labels(pairs in prop::collection::vec((0u32..16, 0u32..16), 0..24)) {
            let mut uf = UnionFind::new(16);
            let mut label: Vec<u32> = (0..16).collect();
            for &(a, b) in &pairs {
                uf.union(a, b);
                let (la, lb) = (label[a as usize], label[b as usize]);
                for l in label.iter_mut() {
                    if *l == lb {
                        *l = la;
                    }
                }
            }
            for a in 0..16u32 {
                for b in 0..16u32 {
                    prop_assert_eq!(uf.same(a, b), label[a as usize] == label[b as usize]);
                }
            }
        }
    }
}
