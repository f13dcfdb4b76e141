//! A conservative baseline call graph based on class hierarchy analysis (CHA).
//!
//! The call graph is sound but imprecise:
//! - Static calls get an edge to their callee.
//! - An interface method invocation may call the method with the invoked name
//! of every named type `T` or pointer type `*T` implementing the receiver's interface.
//! - A call through a function value may call every function without receiver
//! whose signature is identical to the type of the function value.
//! - Calls to built-ins get no edges.
//!
//! The variable type analysis in [`vta`](crate::analysis::vta) uses such a call graph
//! both for the interprocedural flows of its type propagation graph and as the lower bound of its result.

use super::callgraph::CallGraph;
use crate::intermediate_representation::*;
use crate::prelude::*;
use crate::utils::log::LogMessage;
use std::collections::{BTreeMap, BTreeSet};

/// The name of the analysis used as source for log messages.
const ANALYSIS_NAME: &str = "CHA";

/// The possible callees of dynamic calls, precomputed for all types of the program.
struct CalleeIndex<'a> {
    program: &'a Program,
    /// The method sets of all named non-interface types `T` and their pointer types `*T`.
    method_sets: Vec<MethodSet>,
    /// All functions without receiver, grouped by their signature.
    functions_by_signature: BTreeMap<&'a Signature, Vec<&'a Tid>>,
}

impl<'a> CalleeIndex<'a> {
    fn new(program: &'a Program) -> Result<CalleeIndex<'a>, Error> {
        let mut method_sets = Vec::new();
        for name in program.types.keys() {
            let named = Type::Named(name.clone());
            method_sets.push(program.method_set(&named)?);
            method_sets.push(program.method_set(&Type::pointer(named))?);
        }
        let mut functions_by_signature: BTreeMap<&Signature, Vec<&Tid>> = BTreeMap::new();
        for function in program
            .functions
            .values()
            .filter(|function| function.term.receiver.is_none())
        {
            functions_by_signature
                .entry(&function.term.signature)
                .or_default()
                .push(&function.tid);
        }
        Ok(CalleeIndex {
            program,
            method_sets,
            functions_by_signature,
        })
    }

    /// Get the possible callees of a call.
    fn callees(&self, call: &CallCommon) -> Result<BTreeSet<Tid>, Error> {
        if let Some(method) = &call.method {
            let receiver_type = call.value.ty(self.program)?;
            let required = self
                .program
                .interface_methods(&receiver_type)?
                .ok_or_else(|| {
                    anyhow!("Receiver of method {} has non-interface type {}", method, receiver_type)
                })?;
            return Ok(self
                .method_sets
                .iter()
                .filter(|method_set| method_set.implements(required))
                .filter_map(|method_set| method_set.lookup(method))
                .cloned()
                .collect());
        }
        match &call.value {
            Value::Builtin(_) => Ok(BTreeSet::new()),
            Value::Function(callee) => {
                self.program.function(callee)?;
                Ok(BTreeSet::from([callee.clone()]))
            }
            value => {
                let value_type = value.ty(self.program)?;
                match self.program.underlying(&value_type)? {
                    Type::Signature(signature) => Ok(self
                        .functions_by_signature
                        .get(signature)
                        .into_iter()
                        .flatten()
                        .map(|tid| (*tid).clone())
                        .collect()),
                    _ => Err(anyhow!("Called value {} has non-function type {}", value, value_type)),
                }
            }
        }
    }
}

/// Compute the baseline call graph of the program.
///
/// Every function of the program is contained as a node in the call graph,
/// including functions whose bodies are not available.
/// Returns an error if a call instruction references unknown functions or types.
pub fn compute_call_graph(program: &Program) -> Result<(CallGraph, Vec<LogMessage>), Error> {
    let index = CalleeIndex::new(program)?;
    let mut callgraph = CallGraph::new();
    for tid in program.functions.keys() {
        callgraph.add_node(tid.clone());
    }
    let mut logs = Vec::new();
    for function in program.functions_with_body() {
        for instr in function.term.instructions() {
            let Some(call) = instr.term.call_common() else {
                continue;
            };
            let callees = index.callees(call).with_context(|| {
                format!(
                    "Invalid call instruction {} at {} in function {}",
                    instr.tid, instr.tid.position, function.tid
                )
            })?;
            if callees.is_empty() && call.is_dynamic() {
                logs.push(
                    LogMessage::new_debug("No possible callees for dynamic call")
                        .location(instr.tid.clone())
                        .source(ANALYSIS_NAME),
                );
            }
            for callee in callees {
                callgraph.add_edge(&function.tid, &instr.tid, &callee);
            }
        }
    }
    logs.push(
        LogMessage::new_info(format!(
            "Computed call graph with {} functions and {} edges.",
            callgraph.nodes().count(),
            callgraph.edge_count()
        ))
        .source(ANALYSIS_NAME),
    );
    Ok((callgraph, logs))
}
