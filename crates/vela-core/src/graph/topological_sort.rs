// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A generic, order-stable implementation of Kahn's algorithm.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;

/// An error indicating that a cycle was detected in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError<T> {
    /// Nodes that could not be ordered, in the order they were declared.
    ///
    /// Every node on a cycle is included, along with anything that depends on one.
    pub unresolved: Vec<T>,
}

impl<T: fmt::Debug> fmt::Display for CycleError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dependency cycle among {:?}", self.unresolved)
    }
}

impl<T: fmt::Debug> std::error::Error for CycleError<T> {}

/// Performs a topological sort on a generic directed graph.
///
/// The graph is defined by a collection of nodes and a set of directed edges
/// representing dependencies (from parent to child). Roots are visited in the
/// order the nodes were supplied, so the result is deterministic.
///
/// # Arguments
///
/// * `nodes`: An iterator over the unique nodes in the graph.
/// * `edges`: An iterator over the directed edges, represented as `(parent, child)` tuples.
///   Edges that mention a node outside `nodes` are ignored.
///
/// # Returns
///
/// * `Ok(Vec<T>)`: A vector of nodes in a valid topological order.
/// * `Err(CycleError)`: If the graph contains one or more cycles.
pub fn topological_sort<T>(
    nodes: impl IntoIterator<Item = T>,
    edges: impl IntoIterator<Item = (T, T)>,
) -> Result<Vec<T>, CycleError<T>>
where
    T: Copy + Eq + Hash,
{
    let node_list: Vec<T> = nodes.into_iter().collect();
    if node_list.is_empty() {
        return Ok(Vec::new());
    }

    let mut adjacency_list: HashMap<T, Vec<T>> = HashMap::new();
    let mut in_degree: HashMap<T, usize> = node_list.iter().map(|id| (*id, 0)).collect();

    // 1. Build adjacency list and in-degree counts from edges.
    for (parent, child) in edges {
        if !in_degree.contains_key(&parent) {
            continue;
        }
        if let Some(degree) = in_degree.get_mut(&child) {
            *degree += 1;
            adjacency_list.entry(parent).or_default().push(child);
        }
    }

    // 2. Seed the queue with every root, in declaration order.
    let mut queue: VecDeque<T> = node_list
        .iter()
        .copied()
        .filter(|node| in_degree.get(node).copied().unwrap_or(0) == 0)
        .collect();

    // 3. Process the queue.
    let mut sorted_list = Vec::with_capacity(node_list.len());
    while let Some(parent_node) = queue.pop_front() {
        sorted_list.push(parent_node);
        if let Some(children) = adjacency_list.get(&parent_node) {
            for &child_node in children {
                if let Some(degree) = in_degree.get_mut(&child_node) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(child_node);
                    }
                }
            }
        }
    }

    // 4. Anything left with incoming edges sits on or behind a cycle.
    if sorted_list.len() != node_list.len() {
        let unresolved = node_list
            .into_iter()
            .filter(|node| in_degree.get(node).copied().unwrap_or(0) > 0)
            .collect();
        Err(CycleError { unresolved })
    } else {
        Ok(sorted_list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position<T: PartialEq>(order: &[T], node: T) -> usize {
        order.iter().position(|n| *n == node).unwrap()
    }

    #[test]
    fn orders_a_chain_with_a_shortcut() {
        let order = topological_sort(["A", "B", "C"], [("A", "B"), ("A", "C"), ("B", "C")]).unwrap();
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    #[test]
    fn independent_nodes_keep_declaration_order() {
        let order = topological_sort([3, 1, 2], []).unwrap();
        assert_eq!(order, vec![3, 1, 2]);
    }

    #[test]
    fn every_edge_is_respected() {
        let edges = [(5, 2), (5, 0), (4, 0), (4, 1), (2, 3), (3, 1)];
        let order = topological_sort(0..6, edges).unwrap();
        assert_eq!(order.len(), 6);
        for (parent, child) in edges {
            assert!(position(&order, parent) < position(&order, child));
        }
    }

    #[test]
    fn cycle_is_reported_with_its_members() {
        let err = topological_sort(["A", "B", "C", "D"], [("B", "C"), ("C", "B"), ("C", "D")])
            .unwrap_err();
        assert_eq!(err.unresolved, vec!["B", "C", "D"]);
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn edges_to_unknown_nodes_are_ignored() {
        let order = topological_sort([1, 2], [(9, 1), (1, 2), (2, 9)]).unwrap();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn empty_graph_is_empty_order() {
        let order: Vec<u32> = topological_sort(Vec::new(), Vec::new()).unwrap();
        assert!(order.is_empty());
    }
}
