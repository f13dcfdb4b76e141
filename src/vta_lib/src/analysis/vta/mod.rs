//! Variable type analysis (VTA) for refining call graphs.
//!
//! The analysis computes for each value of the program the set of concrete types
//! that values flowing into it may have at runtime.
//! With these type sets the callees of interface method invocations
//! and of calls through function values are resolved.
//!
//! The analysis works in three phases:
//! - The [`builder`] translates the instructions of all analyzed functions into a [`TypePropGraph`].
//! Its nodes are values and abstract memory locations of the program,
//! its edges the possible flows of values between them.
//! Interprocedural flows are added along the edges of a baseline call graph.
//! - The [`propagation`] computes the type sets of all nodes
//! by propagating concrete types along the edges until a fixpoint is reached.
//! - The [`resolver`] looks up the callees of each dynamic call site in the type set of its operand.
//!
//! The analysis is flow-insensitive and context-insensitive.
//! Its result is always a superset of the baseline call graph,
//! i.e. edges of the baseline call graph are never removed.
//!
//! See the `Config` struct for configurable analysis parameters.

use crate::analysis::callgraph::CallGraph;
use crate::intermediate_representation::*;
use crate::prelude::*;
use crate::utils::log::LogMessage;

pub mod builder;
pub mod graph;
pub mod node;
pub mod propagation;
pub mod resolver;

pub use graph::TypePropGraph;
pub use node::Node;

/// The name of the analysis used as source for log messages.
const ANALYSIS_NAME: &str = "VTA";

/// Configurable parameters for the analysis.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Default)]
pub struct Config {
    /// The IDs of the functions whose bodies get analyzed.
    /// If not set, all functions with available bodies get analyzed.
    #[serde(default)]
    pub functions: Option<Vec<String>>,
    /// The maximum number of rounds of the type propagation before it is aborted with an error.
    /// If not set, the number of nodes of the type propagation graph plus two is used.
    #[serde(default)]
    pub max_rounds: Option<u64>,
}

/// Select the functions to analyze.
fn analyzed_functions<'a>(
    program: &'a Program,
    config: &Config,
    logs: &mut Vec<LogMessage>,
) -> Result<Vec<&'a Term<Function>>, Error> {
    let Some(names) = &config.functions else {
        return Ok(program.functions_with_body().collect());
    };
    let mut functions = Vec::new();
    for name in names {
        let function = program
            .functions
            .values()
            .find(|function| function.tid.id() == name.as_str())
            .ok_or_else(|| anyhow!("Unknown function {} in configuration", name))?;
        if function.term.has_body() {
            functions.push(function);
        } else {
            logs.push(
                LogMessage::new_debug("Function body not available")
                    .location(function.tid.clone())
                    .source(ANALYSIS_NAME),
            );
        }
    }
    Ok(functions)
}

/// Compute the edges for the dynamic call sites of the program that the analysis can resolve.
///
/// The returned call graph only contains the resolved edges of dynamic call sites,
/// not the edges of the baseline call graph.
pub fn compute_resolved_edges(
    program: &Program,
    baseline: &CallGraph,
    config: &Config,
) -> Result<(CallGraph, Vec<LogMessage>), Error> {
    let mut logs = Vec::new();
    let functions = analyzed_functions(program, config, &mut logs)?;
    let (flow_graph, build_logs) = builder::build(program, baseline, &functions)?;
    logs.extend(build_logs);
    let (type_sets, propagation_logs) =
        propagation::propagate(program, &flow_graph.graph, config.max_rounds)?;
    logs.extend(propagation_logs);
    let (resolved, resolver_logs) = resolver::resolve(program, &flow_graph.sites, &type_sets)?;
    logs.extend(resolver_logs);
    Ok((resolved, logs))
}

/// Compute the refined call graph of the program.
///
/// The result contains all nodes and edges of the baseline call graph
/// plus the edges resolved by the analysis.
/// Returns an error if the program contains malformed instructions.
pub fn compute_call_graph(
    program: &Program,
    baseline: &CallGraph,
    config: &Config,
) -> Result<(CallGraph, Vec<LogMessage>), Error> {
    let (resolved, logs) = compute_resolved_edges(program, baseline, config)?;
    Ok((resolver::refine(baseline, &resolved), logs))
}

#[cfg(test)]
mod tests;
