//! Dense-index directed graph with the handful of algorithms the
//! scheduler needs: reachability, strongly connected components and
//! longest-path levelization.

use std::collections::VecDeque;

/// Fixed-capacity bitset over node indices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeSet {
    bits: Vec<u64>,
}

impl NodeSet {
    /// An empty set able to hold `n` nodes.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            bits: vec![0; n.div_ceil(64)],
        }
    }

    /// Insert a node. Returns `false` if it was already present.
    pub fn insert(&mut self, i: usize) -> bool {
        let (w, b) = (i / 64, i % 64);
        if w >= self.bits.len() {
            self.bits.resize(w + 1, 0);
        }
        let fresh = self.bits[w] & (1 << b) == 0;
        self.bits[w] |= 1 << b;
        fresh
    }

    /// Whether `i` is in the set.
    pub fn contains(&self, i: usize) -> bool {
        self.bits
            .get(i / 64)
            .is_some_and(|w| w & (1 << (i % 64)) != 0)
    }
}

/// Directed graph over nodes `0..n` with de-duplicated successor lists.
#[derive(Clone, Debug, Default)]
pub struct DiGraph {
    succ: Vec<Vec<usize>>,
}

impl DiGraph {
    /// A graph with `n` nodes and no edges.
    pub fn new(n: usize) -> Self {
        Self {
            succ: vec![Vec::new(); n],
        }
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.succ.len()
    }

    /// Add `from → to`. Parallel edges collapse into one.
    pub fn add_edge(&mut self, from: usize, to: usize) {
        let s = &mut self.succ[from];
        if !s.contains(&to) {
            s.push(to);
        }
    }

    /// Successors of a node, in insertion order.
    pub fn successors(&self, node: usize) -> &[usize] {
        &self.succ[node]
    }

    /// For every node, the set of nodes reachable through one or more edges.
    pub fn reachability(&self) -> Vec<NodeSet> {
        let n = self.node_count();
        let mut out = Vec::with_capacity(n);
        let mut stack = Vec::new();
        for start in 0..n {
            let mut seen = NodeSet::with_capacity(n);
            stack.extend(self.succ[start].iter().copied());
            while let Some(v) = stack.pop() {
                if seen.insert(v) {
                    stack.extend(self.succ[v].iter().copied());
                }
            }
            out.push(seen);
        }
        out
    }

    /// Tarjan's strongly connected components.
    ///
    /// Each component is sorted ascending; components are ordered by
    /// their smallest member.
    pub fn strongly_connected(&self) -> Vec<Vec<usize>> {
        const UNVISITED: usize = usize::MAX;
        let n = self.node_count();
        let mut index = vec![UNVISITED; n];
        let mut low = vec![0; n];
        let mut on_stack = vec![false; n];
        let mut stack = Vec::new();
        let mut call: Vec<(usize, usize)> = Vec::new();
        let mut next = 0;
        let mut out = Vec::new();

        for root in 0..n {
            if index[root] != UNVISITED {
                continue;
            }
            index[root] = next;
            low[root] = next;
            next += 1;
            stack.push(root);
            on_stack[root] = true;
            call.push((root, 0));

            while let Some(frame) = call.last_mut() {
                let v = frame.0;
                if let Some(&w) = self.succ[v].get(frame.1) {
                    frame.1 += 1;
                    if index[w] == UNVISITED {
                        index[w] = next;
                        low[w] = next;
                        next += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        call.push((w, 0));
                    } else if on_stack[w] {
                        low[v] = low[v].min(index[w]);
                    }
                    continue;
                }

                call.pop();
                if let Some(&(parent, _)) = call.last() {
                    low[parent] = low[parent].min(low[v]);
                }
                if low[v] == index[v] {
                    let mut comp = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        comp.push(w);
                        if w == v {
                            break;
                        }
                    }
                    comp.sort_unstable();
                    out.push(comp);
                }
            }
        }
        out.sort_by_key(|c| c[0]);
        out
    }

    /// Longest-path level of every node (Kahn's algorithm): sources are
    /// level 0 and every other node sits one past its deepest predecessor.
    ///
    /// Returns `None` if the graph has a cycle.
    pub fn levels(&self) -> Option<Vec<usize>> {
        let n = self.node_count();
        let mut indeg = vec![0usize; n];
        for s in &self.succ {
            for &v in s {
                indeg[v] += 1;
            }
        }
        let mut queue: VecDeque<usize> = (0..n).filter(|&v| indeg[v] == 0).collect();
        let mut level = vec![0usize; n];
        let mut done = 0;
        while let Some(u) = queue.pop_front() {
            done += 1;
            for &v in &self.succ[u] {
                level[v] = level[v].max(level[u] + 1);
                indeg[v] -= 1;
                if indeg[v] == 0 {
                    queue.push_back(v);
                }
            }
        }
        (done == n).then_some(level)
    }
}
