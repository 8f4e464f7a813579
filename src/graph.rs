//! Causal graphs, as far as [`IndTestDSep`](crate::IndTestDSep) needs them.

use crate::error::{Error, Result};
use crate::variable::{Variable, Variables};
use std::collections::{HashSet, VecDeque};

/// A graph which can answer d-separation queries over its nodes.
pub trait Graph {
    /// Every node in the graph.
    fn nodes(&self) -> &[Variable];

    /// Returns `true` if `x` and `y` are d-separated given `z`.
    ///
    /// # Errors
    ///
    /// Fails if any variable isn't a node of this graph.
    fn is_d_separated(&self, x: &Variable, y: &Variable, z: &[Variable]) -> Result<bool>;
}

/// A directed acyclic graph.
///
/// ```
/// use indtest::graph::{Dag, Graph};
/// use indtest::Variable;
///
/// let [a, b, c] = ["a", "b", "c"].map(|n| Variable::continuous(n));
/// let mut dag = Dag::new();
/// for v in [&a, &b, &c] {
///     dag.add_node(v.clone()).unwrap();
/// }
/// // a -> c <- b: a collider.
/// dag.add_edge(&a, &c).unwrap();
/// dag.add_edge(&b, &c).unwrap();
///
/// assert!(dag.is_d_separated(&a, &b, &[]).unwrap());
/// assert!(!dag.is_d_separated(&a, &b, &[c.clone()]).unwrap());
/// assert!(dag.add_edge(&c, &a).is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Dag {
    nodes: Variables,
    parents: Vec<Vec<usize>>,
    children: Vec<Vec<usize>>,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum Direction {
    /// Arrived from a child, heading towards parents.
    Up,
    /// Arrived from a parent, heading towards children.
    Down,
}

impl Dag {
    /// An empty graph.
    pub fn new() -> Self {
        Dag::default()
    }

    /// Adds a node with no edges, returning its index.
    pub fn add_node(&mut self, node: Variable) -> Result<usize> {
        let index = self.nodes.push(node)?;
        self.parents.push(Vec::new());
        self.children.push(Vec::new());
        Ok(index)
    }

    /// Adds the edge `from -> to`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Cycle`] if `to` is already an ancestor of `from`, including a
    /// self-loop.
    pub fn add_edge(&mut self, from: &Variable, to: &Variable) -> Result<()> {
        let f = self.nodes.index_of(from)?;
        let t = self.nodes.index_of(to)?;
        if self.ancestors(&[f]).contains(&t) {
            return Err(Error::Cycle(from.name().to_owned(), to.name().to_owned()));
        }
        if !self.parents[t].contains(&f) {
            self.parents[t].push(f);
            self.children[f].push(t);
        }
        Ok(())
    }

    /// The parents of a node.
    pub fn parents(&self, node: &Variable) -> Result<Vec<&Variable>> {
        let i = self.nodes.index_of(node)?;
        Ok(self.parents[i]
            .iter()
            .map(|&p| &self.nodes.as_slice()[p])
            .collect())
    }

    /// The given nodes together with all their ancestors.
    fn ancestors(&self, of: &[usize]) -> HashSet<usize> {
        let mut seen: HashSet<usize> = of.iter().copied().collect();
        let mut stack: Vec<usize> = of.to_vec();
        while let Some(node) = stack.pop() {
            for &p in &self.parents[node] {
                if seen.insert(p) {
                    stack.push(p);
                }
            }
        }
        seen
    }

    /// Every node reachable from `source` along an active trail given `evidence`.
    fn reachable(&self, source: usize, evidence: &HashSet<usize>) -> HashSet<usize> {
        let evidence_list: Vec<usize> = evidence.iter().copied().collect();
        let has_observed_descendant = self.ancestors(&evidence_list);

        let mut visited = HashSet::new();
        let mut reachable = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back((source, Direction::Up));

        while let Some((node, direction)) = queue.pop_front() {
            if !visited.insert((node, direction)) {
                continue;
            }
            let observed = evidence.contains(&node);
            if !observed {
                reachable.insert(node);
            }

            match direction {
                Direction::Up if !observed => {
                    queue.extend(self.parents[node].iter().map(|&p| (p, Direction::Up)));
                    queue.extend(self.children[node].iter().map(|&c| (c, Direction::Down)));
                }
                Direction::Up => {}
                Direction::Down => {
                    if !observed {
                        queue.extend(self.children[node].iter().map(|&c| (c, Direction::Down)));
                    }
                    // A collider, or the ancestor of one, that's been observed opens the trail.
                    if has_observed_descendant.contains(&node) {
                        queue.extend(self.parents[node].iter().map(|&p| (p, Direction::Up)));
                    }
                }
            }
        }
        reachable
    }
}

impl Graph for Dag {
    fn nodes(&self) -> &[Variable] {
        self.nodes.as_slice()
    }

    /// Bayes-ball reachability. A variable that's in the conditioning set is d-separated from
    /// everything, and no variable is d-separated from itself.
    fn is_d_separated(&self, x: &Variable, y: &Variable, z: &[Variable]) -> Result<bool> {
        let x = self.nodes.index_of(x)?;
        let y = self.nodes.index_of(y)?;
        let evidence = z
            .iter()
            .map(|v| self.nodes.index_of(v))
            .collect::<Result<HashSet<usize>>>()?;

        if evidence.contains(&x) || evidence.contains(&y) {
            return Ok(true);
        }
        if x == y {
            return Ok(false);
        }
        Ok(!self.reachable(x, &evidence).contains(&y))
    }
}
