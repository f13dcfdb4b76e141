//! Resolution of dynamic call sites from the propagated type sets.

use super::builder::DynamicCallSite;
use super::propagation::TypeSets;
use crate::analysis::callgraph::CallGraph;
use crate::intermediate_representation::*;
use crate::prelude::*;
use crate::utils::log::LogMessage;
use std::collections::BTreeMap;

/// Compute the callees of the dynamic call sites from the types reaching their operands.
///
/// For interface method invocations the invoked method is looked up in the method set of each type
/// reaching the receiver.
/// For calls through function values each function reaching the called value is a callee.
///
/// The returned call graph only contains the resolved edges of the dynamic call sites.
/// Call sites that no types reach get no edges and are logged at debug level.
pub fn resolve(
    program: &Program,
    sites: &[DynamicCallSite],
    type_sets: &TypeSets,
) -> Result<(CallGraph, Vec<LogMessage>), Error> {
    let mut method_sets: BTreeMap<&Type, MethodSet> = BTreeMap::new();
    let mut resolved = CallGraph::new();
    let mut logs = Vec::new();
    for site in sites {
        let mut reached = false;
        for prop_type in type_sets.types(&site.operand) {
            reached = true;
            let callee = match &site.method {
                Some(method) => {
                    if !method_sets.contains_key(&prop_type.ty) {
                        let method_set = program.method_set(&prop_type.ty).with_context(|| {
                            format!("Method set of {} at call site {}", prop_type.ty, site.site)
                        })?;
                        method_sets.insert(&prop_type.ty, method_set);
                    }
                    method_sets
                        .get(&prop_type.ty)
                        .and_then(|method_set| method_set.lookup(method))
                }
                None => prop_type.function.as_ref(),
            };
            if let Some(callee) = callee {
                resolved.add_edge(&site.caller, &site.site, callee);
            }
        }
        if !reached {
            logs.push(
                LogMessage::new_debug(format!(
                    "No concrete types reach {} of the dynamic call",
                    site.operand
                ))
                .location(site.site.clone())
                .source(super::ANALYSIS_NAME),
            );
        }
    }
    logs.push(
        LogMessage::new_info(format!(
            "Resolved {} edges for {} dynamic call sites.",
            resolved.edge_count(),
            sites.len()
        ))
        .source(super::ANALYSIS_NAME),
    );
    Ok((resolved, logs))
}

/// Combine the baseline call graph with the resolved edges.
///
/// The result contains every node and edge of the baseline call graph.
pub fn refine(baseline: &CallGraph, resolved: &CallGraph) -> CallGraph {
    let mut callgraph = baseline.clone();
    callgraph.merge(resolved);
    callgraph
}
