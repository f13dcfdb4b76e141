//! Call graphs of whole programs.

use crate::prelude::*;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet};

/// A call graph mapping each caller to its call sites and each call site to its possible callees.
///
/// Functions without call sites may still be contained as nodes of the call graph.
/// Call sites are identified by the term identifiers of the corresponding call instructions.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
pub struct CallGraph {
    /// Maps callers to their call sites and the call sites to their callees.
    callers: BTreeMap<Tid, BTreeMap<Tid, BTreeSet<Tid>>>,
}

impl CallGraph {
    /// Create a new, empty call graph.
    pub fn new() -> CallGraph {
        CallGraph::default()
    }

    /// Add a function without any call sites to the call graph.
    /// Nothing happens if the function is already contained.
    pub fn add_node(&mut self, function: Tid) {
        self.callers.entry(function).or_default();
    }

    /// Add the edge `caller -> callee` at the call site `site`.
    /// Returns `true` if the edge was not already contained in the call graph.
    pub fn add_edge(&mut self, caller: &Tid, site: &Tid, callee: &Tid) -> bool {
        self.add_node(callee.clone());
        self.callers
            .entry(caller.clone())
            .or_default()
            .entry(site.clone())
            .or_default()
            .insert(callee.clone())
    }

    /// Get all functions contained in the call graph.
    pub fn nodes(&self) -> impl Iterator<Item = &Tid> {
        self.callers.keys()
    }

    /// Returns `true` if the function is contained in the call graph.
    pub fn contains_node(&self, function: &Tid) -> bool {
        self.callers.contains_key(function)
    }

    /// Get the callees of the given call site.
    /// The set is empty if the call site is not contained in the call graph.
    pub fn callees(&self, caller: &Tid, site: &Tid) -> BTreeSet<&Tid> {
        self.callers
            .get(caller)
            .and_then(|sites| sites.get(site))
            .map(|callees| callees.iter().collect())
            .unwrap_or_default()
    }

    /// Iterate over the call sites of a caller together with their callees.
    pub fn sites<'a>(
        &'a self,
        caller: &Tid,
    ) -> impl Iterator<Item = (&'a Tid, &'a BTreeSet<Tid>)> + 'a {
        self.callers
            .get(caller)
            .into_iter()
            .flat_map(|sites| sites.iter())
    }

    /// Iterate over all edges of the call graph as `(caller, site, callee)` triples.
    pub fn edges(&self) -> impl Iterator<Item = (&Tid, &Tid, &Tid)> {
        self.callers.iter().flat_map(|(caller, sites)| {
            sites.iter().flat_map(move |(site, callees)| {
                callees.iter().map(move |callee| (caller, site, callee))
            })
        })
    }

    /// Return the number of edges of the call graph.
    pub fn edge_count(&self) -> usize {
        self.edges().count()
    }

    /// Get all `(caller, site)` pairs where the given function may be called.
    pub fn callers_of(&self, callee: &Tid) -> Vec<(&Tid, &Tid)> {
        self.edges()
            .filter(|(_, _, target)| *target == callee)
            .map(|(caller, site, _)| (caller, site))
            .collect()
    }

    /// Returns `true` if the edge `caller -> callee` at the call site `site` is contained in the call graph.
    pub fn contains_edge(&self, caller: &Tid, site: &Tid, callee: &Tid) -> bool {
        self.callers
            .get(caller)
            .and_then(|sites| sites.get(site))
            .map(|callees| callees.contains(callee))
            .unwrap_or(false)
    }

    /// Returns `true` if every node and every edge of `other` is also contained in `self`.
    pub fn is_superset_of(&self, other: &CallGraph) -> bool {
        other.nodes().all(|node| self.contains_node(node))
            && other
                .edges()
                .all(|(caller, site, callee)| self.contains_edge(caller, site, callee))
    }

    /// Add all nodes and edges of `other` to `self`.
    pub fn merge(&mut self, other: &CallGraph) {
        for node in other.nodes() {
            self.add_node(node.clone());
        }
        for (caller, site, callee) in other.edges() {
            self.add_edge(caller, site, callee);
        }
    }

    /// Return the edges of the call graph as sorted and deduplicated strings of the form `caller -> callee`.
    ///
    /// Call sites are not part of the strings,
    /// so two call sites of the same caller with the same callee result in only one string.
    pub fn edge_strings(&self) -> Vec<String> {
        self.edges()
            .map(|(caller, _, callee)| format!("{} -> {}", caller, callee))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Convert to a `petgraph` graph.
    ///
    /// The nodes of the returned graph are the functions of the call graph.
    /// Each edge is labeled with the term identifier of its call site.
    pub fn to_digraph(&self) -> DiGraph<Tid, Tid> {
        let mut graph = DiGraph::new();
        let mut tid_to_node_index_map: BTreeMap<&Tid, NodeIndex> = BTreeMap::new();
        for function in self.nodes() {
            let node_index = graph.add_node(function.clone());
            tid_to_node_index_map.insert(function, node_index);
        }
        for (caller, site, callee) in self.edges() {
            if let (Some(source), Some(target)) = (
                tid_to_node_index_map.get(caller),
                tid_to_node_index_map.get(callee),
            ) {
                graph.add_edge(*source, *target, site.clone());
            }
        }
        graph
    }
}
