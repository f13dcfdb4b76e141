//! Propagation of concrete types along the edges of the type propagation graph.
//!
//! Every node whose static type is not an interface is seeded with its own type.
//! Function nodes are additionally tagged with the function they represent,
//! so that calls through function values can be resolved to the called function.
//! The types then get propagated along the graph edges until a fixpoint is reached.
//! When types flow into an interface-typed node, only the types implementing the interface are kept.
//! Functions flowing into a node of a named function type take that named type,
//! so that they keep the methods of the named type at interface boundaries.

use super::graph::TypePropGraph;
use super::node::Node;
use crate::analysis::fixpoint::{self, Computation};
use crate::intermediate_representation::*;
use crate::prelude::*;
use crate::utils::log::LogMessage;
use fnv::FnvHashMap;
use itertools::Itertools;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use std::collections::{BTreeMap, BTreeSet};

/// A concrete type that may reach a node,
/// optionally tagged with the function a value of this type denotes.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct PropType {
    /// The concrete type.
    pub ty: Type,
    /// The function denoted by values of a function type.
    pub function: Option<Tid>,
}

impl std::fmt::Display for PropType {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.function {
            Some(function) => write!(formatter, "{} ({})", self.ty, function),
            None => write!(formatter, "{}", self.ty),
        }
    }
}

/// The set of propagation types reaching a node.
pub type TypeSet = BTreeSet<PropType>;

/// The result of the type propagation: the type sets of all nodes.
#[derive(Debug, Clone, Default)]
pub struct TypeSets {
    sets: FnvHashMap<Node, TypeSet>,
}

impl TypeSets {
    /// Get the type set of a node.
    /// Returns `None` if no types reach the node.
    pub fn get(&self, node: &Node) -> Option<&TypeSet> {
        self.sets.get(node)
    }

    /// Iterate over the types reaching a node.
    pub fn types<'a>(&'a self, node: &Node) -> impl Iterator<Item = &'a PropType> + 'a {
        self.sets.get(node).into_iter().flatten()
    }

    /// Iterate over all nodes with a non-empty type set.
    pub fn iter(&self) -> impl Iterator<Item = (&Node, &TypeSet)> {
        self.sets.iter()
    }
}

/// The fixpoint context for the type propagation.
struct PropagationContext<'a> {
    graph: &'a DiGraph<Node, ()>,
    /// The methods required by the types of interface-typed nodes.
    interface_filters: FnvHashMap<NodeIndex, Vec<InterfaceMethod>>,
    /// The named function types of nodes with such a static type.
    function_retags: FnvHashMap<NodeIndex, Type>,
    /// The method sets of all types that the propagation starts with.
    method_sets: BTreeMap<Type, MethodSet>,
}

impl<'a> fixpoint::Context for PropagationContext<'a> {
    type EdgeLabel = ();
    type NodeLabel = Node;
    type NodeValue = TypeSet;

    fn get_graph(&self) -> &DiGraph<Node, ()> {
        self.graph
    }

    /// Type sets are merged by union.
    fn merge(&self, types1: &TypeSet, types2: &TypeSet) -> TypeSet {
        types1.union(types2).cloned().collect()
    }

    /// Types flow unchanged along edges, except for edges into interface-typed nodes,
    /// where only types implementing the interface pass,
    /// and edges into nodes of a named function type, where functions take the named type.
    fn update_edge(&self, types: &TypeSet, edge: EdgeIndex) -> Option<TypeSet> {
        let (_, target) = self.graph.edge_endpoints(edge)?;
        if let Some(named) = self.function_retags.get(&target) {
            return Some(
                types
                    .iter()
                    .map(|prop_type| match &prop_type.function {
                        Some(function) => PropType {
                            ty: named.clone(),
                            function: Some(function.clone()),
                        },
                        None => prop_type.clone(),
                    })
                    .collect(),
            );
        }
        let Some(required) = self.interface_filters.get(&target) else {
            return Some(types.clone());
        };
        let filtered: TypeSet = types
            .iter()
            .filter(|prop_type| {
                self.method_sets
                    .get(&prop_type.ty)
                    .map_or(required.is_empty(), |method_set| {
                        method_set.implements(required)
                    })
            })
            .cloned()
            .collect();
        if filtered.is_empty() {
            None
        } else {
            Some(filtered)
        }
    }
}

/// A wrapper struct for the type propagation computation object.
pub struct Propagation<'a> {
    graph: &'a TypePropGraph,
    computation: Computation<PropagationContext<'a>>,
}

impl<'a> Propagation<'a> {
    /// Generate a new type propagation computation for a graph
    /// with the starting types of all nodes already set.
    ///
    /// Returns an error if the types of the nodes reference unknown named types or functions.
    pub fn new(
        program: &Program,
        prop_graph: &'a TypePropGraph,
    ) -> Result<Propagation<'a>, Error> {
        let graph = prop_graph.get_graph();
        let mut interface_filters = FnvHashMap::default();
        let mut function_retags = FnvHashMap::default();
        let mut method_sets = BTreeMap::new();
        let mut seeds = Vec::new();
        for index in graph.node_indices() {
            let node = &graph[index];
            let Some(ty) = node.ty() else {
                continue;
            };
            if let Some(required) = program.interface_methods(ty)? {
                interface_filters.insert(index, required.to_vec());
                continue;
            }
            // Nested function pointer locations only hold the functions stored into them.
            if let Node::NestedPtrFunction(_) = node {
                continue;
            }
            if !method_sets.contains_key(ty) {
                method_sets.insert(ty.clone(), program.method_set(ty)?);
            }
            if let Type::Named(_) = ty {
                if program.is_function(ty)? {
                    function_retags.insert(index, ty.clone());
                }
            }
            seeds.push((
                index,
                PropType {
                    ty: ty.clone(),
                    function: node.function().cloned(),
                },
            ));
        }
        let context = PropagationContext {
            graph,
            interface_filters,
            function_retags,
            method_sets,
        };
        let mut computation = Computation::new(context, None);
        for (index, seed) in seeds {
            computation.set_node_value(index, BTreeSet::from([seed]));
        }
        Ok(Propagation {
            graph: prop_graph,
            computation,
        })
    }

    /// Compute one round of the propagation.
    /// Returns the number of nodes whose types were propagated in the round.
    pub fn compute_round(&mut self) -> usize {
        self.computation.compute_round()
    }

    /// Compute the propagation until the type sets do not change anymore.
    /// Returns the number of computed rounds.
    ///
    /// Since type sets only grow and the number of types is finite, the propagation always terminates.
    /// Exceeding `max_rounds` thus indicates a bug and is reported as an error.
    pub fn compute(&mut self, max_rounds: u64) -> Result<u64, Error> {
        self.computation
            .compute_with_max_rounds(max_rounds)
            .with_context(|| {
                let graph = self.computation.get_graph();
                format!(
                    "Types still changing at {}",
                    self.computation
                        .get_worklist()
                        .iter()
                        .map(|index| &graph[*index])
                        .join(", ")
                )
            })
    }

    /// Returns `true` if the type sets have stabilized.
    pub fn has_stabilized(&self) -> bool {
        self.computation.has_stabilized()
    }

    /// Get the current type set of a node.
    pub fn get_types(&self, node: &Node) -> Option<&TypeSet> {
        self.graph
            .node_index(node)
            .and_then(|index| self.computation.get_node_value(index))
    }

    /// Collect the type sets of all nodes.
    pub fn type_sets(&self) -> TypeSets {
        let graph = self.computation.get_graph();
        TypeSets {
            sets: self
                .computation
                .node_values()
                .iter()
                .filter(|(_, types)| !types.is_empty())
                .map(|(index, types)| (graph[*index].clone(), types.clone()))
                .collect(),
        }
    }
}

/// Compute the type sets of all nodes of the graph.
///
/// The computation is aborted with an error if it does not stabilize after `max_rounds` rounds.
/// If no bound is given, the bound is the number of nodes plus two.
pub fn propagate(
    program: &Program,
    graph: &TypePropGraph,
    max_rounds: Option<u64>,
) -> Result<(TypeSets, Vec<LogMessage>), Error> {
    let mut propagation = Propagation::new(program, graph)?;
    let max_rounds = max_rounds.unwrap_or(graph.node_count() as u64 + 2);
    let rounds = propagation
        .compute(max_rounds)
        .context("Type propagation did not stabilize")?;
    let type_sets = propagation.type_sets();
    let logs = vec![LogMessage::new_info(format!(
        "Type propagation stabilized after {} rounds with {} of {} nodes reached by concrete types.",
        rounds,
        type_sets.sets.len(),
        graph.node_count()
    ))
    .source(super::ANALYSIS_NAME)];
    Ok((type_sets, logs))
}
