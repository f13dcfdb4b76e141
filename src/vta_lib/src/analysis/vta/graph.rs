//! The type propagation graph.

use super::node::Node;
use fnv::FnvHashMap;
use itertools::Itertools;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::fmt;

/// A directed graph over [`Node`]s without parallel edges.
///
/// An edge `n -> m` means that the concrete types of values at `n` may flow to `m`.
/// Each node is contained at most once in the graph.
#[derive(Debug, Clone, Default)]
pub struct TypePropGraph {
    graph: DiGraph<Node, ()>,
    node_indices: FnvHashMap<Node, NodeIndex>,
}

impl TypePropGraph {
    /// Create a new, empty graph.
    pub fn new() -> TypePropGraph {
        TypePropGraph::default()
    }

    /// Add a node to the graph if it is not already contained and return its index.
    pub fn add_node(&mut self, node: Node) -> NodeIndex {
        if let Some(index) = self.node_indices.get(&node) {
            return *index;
        }
        let index = self.graph.add_node(node.clone());
        self.node_indices.insert(node, index);
        index
    }

    /// Add the edge `from -> to` to the graph.
    /// Returns `false` if the edge was already contained in the graph.
    pub fn add_edge(&mut self, from: Node, to: Node) -> bool {
        let from = self.add_node(from);
        let to = self.add_node(to);
        if self.graph.find_edge(from, to).is_some() {
            false
        } else {
            self.graph.add_edge(from, to, ());
            true
        }
    }

    /// Get the index of a node.
    pub fn node_index(&self, node: &Node) -> Option<NodeIndex> {
        self.node_indices.get(node).copied()
    }

    /// Get the successors of a node.
    /// Unknown nodes have no successors.
    pub fn successors<'a>(&'a self, node: &Node) -> Vec<&'a Node> {
        match self.node_index(node) {
            Some(index) => self
                .graph
                .neighbors_directed(index, Direction::Outgoing)
                .map(|successor| &self.graph[successor])
                .collect(),
            None => Vec::new(),
        }
    }

    /// Returns `true` if the edge `from -> to` is contained in the graph.
    pub fn contains_edge(&self, from: &Node, to: &Node) -> bool {
        match (self.node_index(from), self.node_index(to)) {
            (Some(from), Some(to)) => self.graph.contains_edge(from, to),
            _ => false,
        }
    }

    /// Iterate over all nodes of the graph.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Iterate over all edges of the graph.
    pub fn edges(&self) -> impl Iterator<Item = (&Node, &Node)> {
        self.graph.raw_edges().iter().map(move |edge| {
            (
                &self.graph[edge.source()],
                &self.graph[edge.target()],
            )
        })
    }

    /// The number of nodes of the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// The number of edges of the graph.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Get the underlying `petgraph` graph.
    pub fn get_graph(&self) -> &DiGraph<Node, ()> {
        &self.graph
    }

    /// Render the graph as sorted lines of the form `node -> successor1, successor2`.
    /// Nodes without successors are omitted.
    pub fn to_lines(&self) -> Vec<String> {
        self.graph
            .node_indices()
            .filter_map(|index| {
                let successors = self
                    .graph
                    .neighbors_directed(index, Direction::Outgoing)
                    .map(|successor| self.graph[successor].to_string())
                    .sorted()
                    .join(", ");
                if successors.is_empty() {
                    None
                } else {
                    Some(format!("{} -> {}", self.graph[index], successors))
                }
            })
            .sorted()
            .collect()
    }
}

impl fmt::Display for TypePropGraph {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        for line in self.to_lines() {
            writeln!(formatter, "{line}")?;
        }
        Ok(())
    }
}
