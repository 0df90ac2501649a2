//! Provide/consume dependency graph
//!
//! Items declare the keys they provide and the keys they consume. An item
//! depends on every provider of every key it consumes; keys nobody provides
//! impose no ordering. A node consuming a key it provides itself does not
//! depend on itself.
//!
//! ```text
//!   A provides "x"      B consumes "x"
//!         A ──────────────▶ B          (B runs after A)
//! ```

use std::collections::{HashMap, HashSet};
use std::future::Future;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tracing::warn;

/// Why [`DependencyGraph::parallel_topological_traversal`] did not visit every node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraversalError<E> {
    /// One or more visits failed
    Visit(Vec<E>),
    /// Nodes on or behind a cycle were never started
    Unvisited {
        /// Number of nodes left unvisited
        skipped: usize,
    },
}

/// One item handed to [`DependencyGraph::from_iterable`]
#[derive(Debug, Clone)]
pub struct DependencyNode<T> {
    /// The payload
    pub value: T,
    /// Keys this item provides
    pub provides: Vec<String>,
    /// Keys this item consumes
    pub consumes: Vec<String>,
}

impl<T> DependencyNode<T> {
    /// Create a node
    pub fn new<P, C>(value: T, provides: P, consumes: C) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            value,
            provides: provides.into_iter().map(Into::into).collect(),
            consumes: consumes.into_iter().map(Into::into).collect(),
        }
    }
}

/// Directed graph over provide/consume edges
#[derive(Debug)]
pub struct DependencyGraph<T> {
    nodes: Vec<DependencyNode<T>>,
    /// For each node, the indices of the other nodes it waits for
    dependencies: Vec<Vec<usize>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl<T> DependencyGraph<T> {
    /// Build a graph; node order is preserved for deterministic traversal
    pub fn from_iterable<I>(items: I) -> Self
    where
        I: IntoIterator<Item = DependencyNode<T>>,
    {
        let nodes: Vec<DependencyNode<T>> = items.into_iter().collect();

        let mut providers: HashMap<&str, Vec<usize>> = HashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            for key in &node.provides {
                providers.entry(key.as_str()).or_default().push(index);
            }
        }

        let dependencies = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| {
                let mut seen = HashSet::new();
                node.consumes
                    .iter()
                    .filter_map(|key| providers.get(key.as_str()))
                    .flatten()
                    .copied()
                    .filter(|&provider| provider != index && seen.insert(provider))
                    .collect()
            })
            .collect();

        Self {
            nodes,
            dependencies,
        }
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Find a dependency cycle
    ///
    /// Returns the values along the first cycle found, with the first value
    /// repeated at the end (`a -> b -> a`).
    pub fn detect_circular_dependency(&self) -> Option<Vec<&T>> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut path = Vec::new();

        for start in 0..self.nodes.len() {
            if marks[start] == Mark::Unvisited {
                if let Some(cycle) = self.visit_for_cycle(start, &mut marks, &mut path) {
                    return Some(cycle.into_iter().map(|i| &self.nodes[i].value).collect());
                }
            }
        }
        None
    }

    fn visit_for_cycle(
        &self,
        index: usize,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        marks[index] = Mark::InProgress;
        path.push(index);

        for &dependency in &self.dependencies[index] {
            match marks[dependency] {
                Mark::InProgress => {
                    let start = path.iter().position(|&i| i == dependency).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(dependency);
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    if let Some(cycle) = self.visit_for_cycle(dependency, marks, path) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }

        path.pop();
        marks[index] = Mark::Done;
        None
    }

    /// Visit every node, running independent nodes concurrently
    ///
    /// A node starts once every node it depends on has completed. After the
    /// first failure no further node is started; visits already in flight run
    /// to completion and every error is returned as [`TraversalError::Visit`].
    /// Nodes on a cycle, and everything depending on them, are never started;
    /// the traversal then fails with [`TraversalError::Unvisited`].
    pub async fn parallel_topological_traversal<F, Fut, R, E>(
        &self,
        visit: F,
    ) -> Result<Vec<R>, TraversalError<E>>
    where
        F: Fn(&T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let count = self.nodes.len();
        let mut remaining: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (index, deps) in self.dependencies.iter().enumerate() {
            for &dependency in deps {
                dependents[dependency].push(index);
            }
        }

        let run = |index: usize| {
            let fut = visit(&self.nodes[index].value);
            async move { (index, fut.await) }
        };

        let mut in_flight = FuturesUnordered::new();
        for index in (0..count).filter(|&i| remaining[i] == 0) {
            in_flight.push(run(index));
        }

        let mut started = in_flight.len();
        let mut results = Vec::with_capacity(count);
        let mut errors = Vec::new();

        while let Some((index, outcome)) = in_flight.next().await {
            match outcome {
                Ok(result) => {
                    results.push(result);
                    if !errors.is_empty() {
                        continue;
                    }
                    for &dependent in &dependents[index] {
                        remaining[dependent] -= 1;
                        if remaining[dependent] == 0 {
                            in_flight.push(run(dependent));
                            started += 1;
                        }
                    }
                }
                Err(e) => errors.push(e),
            }
        }

        if !errors.is_empty() {
            return Err(TraversalError::Visit(errors));
        }
        if started < count {
            let skipped = count - started;
            warn!(skipped, "Dependency graph traversal left nodes unvisited");
            return Err(TraversalError::Unvisited { skipped });
        }
        Ok(results)
    }
}
