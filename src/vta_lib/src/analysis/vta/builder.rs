//! Construction of the type propagation graph.
//!
//! The builder translates each instruction of the analyzed functions into edges of the graph.
//! Edges only get added if the target node can receive concrete types at all,
//! i.e. if its type is an interface or function type or a (nested) pointer to one of them.
//! Interprocedural flows between arguments and parameters and between returned values and call results
//! are added for all callees of a call site in the baseline call graph.

use super::graph::TypePropGraph;
use super::node::{LocalId, Node};
use crate::analysis::callgraph::CallGraph;
use crate::intermediate_representation::*;
use crate::prelude::*;
use crate::utils::log::LogMessage;
use std::collections::{BTreeMap, BTreeSet};

/// A call site whose callees are determined by a runtime value.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct DynamicCallSite {
    /// The function containing the call site.
    pub caller: Tid,
    /// The call instruction.
    pub site: Tid,
    /// The node of the interface-typed receiver or of the called function value.
    pub operand: Node,
    /// The name of the invoked method for interface method invocations.
    /// `None` for calls through function values.
    pub method: Option<String>,
}

/// The result of building the type propagation graph.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    /// The type propagation graph.
    pub graph: TypePropGraph,
    /// The dynamic call sites of the analyzed functions.
    pub sites: Vec<DynamicCallSite>,
}

/// Build the type propagation graph for the given functions of the program.
///
/// Returns an error naming the offending instruction
/// if an instruction cannot be translated into graph edges,
/// e.g. because it references an unknown function or type.
pub fn build(
    program: &Program,
    baseline: &CallGraph,
    functions: &[&Term<Function>],
) -> Result<(FlowGraph, Vec<LogMessage>), Error> {
    let mut builder = Builder::new(program, baseline);
    for function in functions {
        for instr in function.term.instructions() {
            builder.instr(function, instr).with_context(|| {
                format!(
                    "Malformed instruction {} at {} in function {}",
                    instr.tid, instr.tid.position, function.tid
                )
            })?;
        }
    }
    let logs = vec![LogMessage::new_info(format!(
        "Built type propagation graph with {} nodes and {} edges for {} functions and {} dynamic call sites.",
        builder.graph.node_count(),
        builder.graph.edge_count(),
        functions.len(),
        builder.sites.len()
    ))
    .source(super::ANALYSIS_NAME)];
    Ok((
        FlowGraph {
            graph: builder.graph,
            sites: builder.sites,
        },
        logs,
    ))
}

/// Returns `true` if values of the type can have methods,
/// i.e. for named types, interfaces, function types and structs.
fn can_have_methods(program: &Program, ty: &Type) -> Result<bool, Error> {
    if let Type::Named(_) = ty {
        return Ok(true);
    }
    Ok(matches!(
        program.underlying(ty)?,
        Type::Interface(_) | Type::Signature(_) | Type::Struct(_)
    ))
}

struct Builder<'a> {
    program: &'a Program,
    baseline: &'a CallGraph,
    /// Maps each callee of the baseline call graph to its call sites.
    call_sites: BTreeMap<&'a Tid, Vec<(&'a Tid, &'a Tid)>>,
    /// The result registers of all call instructions with used results, keyed by caller and call site.
    site_results: BTreeMap<(&'a Tid, &'a Tid), &'a Variable>,
    graph: TypePropGraph,
    sites: Vec<DynamicCallSite>,
}

impl<'a> Builder<'a> {
    fn new(program: &'a Program, baseline: &'a CallGraph) -> Builder<'a> {
        let mut call_sites: BTreeMap<&Tid, Vec<(&Tid, &Tid)>> = BTreeMap::new();
        for (caller, site, callee) in baseline.edges() {
            call_sites.entry(callee).or_default().push((caller, site));
        }
        let mut site_results = BTreeMap::new();
        for function in program.functions_with_body() {
            for instr in function.term.instructions() {
                if let Instr::Call {
                    result: Some(result),
                    ..
                } = &instr.term
                {
                    site_results.insert((&function.tid, &instr.tid), result);
                }
            }
        }
        let mut graph = TypePropGraph::new();
        graph.add_edge(Node::PanicArg, Node::RecoverReturn);
        Builder {
            program,
            baseline,
            call_sites,
            site_results,
            graph,
            sites: Vec::new(),
        }
    }

    /// If the type is a pointer to an interface, possibly through several pointer indirections,
    /// return the interface type.
    /// Returns `None` for recursive pointer types like `type P *P`.
    fn interface_under_ptr(&self, ty: &Type) -> Result<Option<Type>, Error> {
        let mut seen = BTreeSet::new();
        let mut current = ty;
        while let Type::Pointer(elem) = self.program.underlying(current)? {
            if !seen.insert(current) {
                break;
            }
            if self.program.is_interface(elem)? {
                return Ok(Some(elem.as_ref().clone()));
            }
            current = elem;
        }
        Ok(None)
    }

    /// If the type is a pointer to a function type, possibly through several pointer indirections,
    /// return the function type.
    fn function_under_ptr(&self, ty: &Type) -> Result<Option<Type>, Error> {
        let mut seen = BTreeSet::new();
        let mut current = ty;
        while let Type::Pointer(elem) = self.program.underlying(current)? {
            if !seen.insert(current) {
                break;
            }
            if self.program.is_function(elem)? {
                return Ok(Some(elem.as_ref().clone()));
            }
            current = elem;
        }
        Ok(None)
    }

    /// Get the node of a value used inside `function`.
    fn node_from_val(&self, function: &Tid, value: &Value) -> Result<Node, Error> {
        if let Value::Builtin(name) = value {
            return Err(anyhow!("Built-in {} used as a value", name));
        }
        let ty = value.ty(self.program)?;
        if let Some(elem) = ty.pointer_elem() {
            if !self.program.is_interface(elem)? && !self.program.is_function(elem)? {
                if let Some(interface) = self.interface_under_ptr(elem)? {
                    return Ok(Node::NestedPtrInterface(interface));
                }
                if let Some(function_type) = self.function_under_ptr(elem)? {
                    return Ok(Node::NestedPtrFunction(function_type));
                }
                return Ok(Node::Pointer(ty));
            }
        }
        Ok(match value {
            Value::Const { .. } => Node::Constant(ty),
            Value::Global { name, .. } => Node::Global {
                name: name.clone(),
                ty,
            },
            Value::Function(tid) => Node::Function {
                function: tid.clone(),
                ty,
            },
            Value::Var(var) => Node::Local(LocalId::new(function, var)),
            Value::Builtin(name) => return Err(anyhow!("Built-in {} used as a value", name)),
        })
    }

    /// Get the node of a register of `function`.
    fn node_from_var(&self, function: &Tid, var: &Variable) -> Result<Node, Error> {
        self.node_from_val(function, &Value::Var(var.clone()))
    }

    /// Get the node of the element at `index` of a tuple-typed register.
    fn indexed_local(&self, function: &Tid, var: &Variable, index: usize) -> Result<Node, Error> {
        Ok(Node::IndexedLocal {
            local: LocalId::new(function, var),
            index,
            ty: tuple_elem(var, index)?,
        })
    }

    /// Returns `true` if concrete types can flow into the node.
    fn has_in_flow(&self, node: &Node) -> Result<bool, Error> {
        let Some(ty) = node.ty() else {
            return Ok(true);
        };
        Ok(self.interface_under_ptr(ty)?.is_some()
            || self.function_under_ptr(ty)?.is_some()
            || self.program.is_interface(ty)?
            || self.program.is_function(ty)?)
    }

    /// Add the edge `source -> target` if concrete types can flow into `target`.
    fn add_in_flow_edge(&mut self, source: Node, target: Node) -> Result<(), Error> {
        if self.has_in_flow(&target)? {
            self.graph.add_edge(source, target);
        }
        Ok(())
    }

    /// Add the edges for an assignment `left = right`.
    ///
    /// If both sides are pointers, they alias each other and types flow in both directions.
    fn add_in_flow_alias_edges(&mut self, left: Node, right: Node) -> Result<(), Error> {
        self.add_in_flow_edge(right.clone(), left.clone())?;
        if is_reference(&left) && is_reference(&right) {
            self.add_in_flow_edge(left, right)?;
        }
        Ok(())
    }

    /// Get the element type of a channel.
    fn chan_elem(&self, value: &Value) -> Result<Type, Error> {
        let ty = value.ty(self.program)?;
        match self.program.underlying(&ty)? {
            Type::Chan(elem, _) => Ok(elem.as_ref().clone()),
            _ => Err(anyhow!("{} of type {} is not a channel", value, ty)),
        }
    }

    /// Get the key and value type of a map or `None` for strings.
    fn map_types(&self, value: &Value) -> Result<Option<(Type, Type)>, Error> {
        let ty = value.ty(self.program)?;
        match self.program.underlying(&ty)? {
            Type::Map(key, elem) => Ok(Some((key.as_ref().clone(), elem.as_ref().clone()))),
            Type::Basic(BasicKind::String) => Ok(None),
            _ => Err(anyhow!("{} of type {} is not a map or string", value, ty)),
        }
    }

    /// Get the element type of a slice, array, pointer to array or string.
    fn slice_array_elem(&self, value: &Value) -> Result<Type, Error> {
        let ty = value.ty(self.program)?;
        match self.program.underlying(&ty)? {
            Type::Pointer(pointee) => match self.program.underlying(pointee)? {
                Type::Array(elem, _) => Ok(elem.as_ref().clone()),
                _ => Err(anyhow!("{} of type {} is not a pointer to an array", value, ty)),
            },
            Type::Array(elem, _) | Type::Slice(elem) => Ok(elem.as_ref().clone()),
            Type::Basic(BasicKind::String) => Ok(Type::byte()),
            _ => Err(anyhow!("{} of type {} cannot be indexed", value, ty)),
        }
    }

    /// Get the node for the field at `index` of the struct type `struct_type`.
    fn field(&self, struct_type: Type, index: usize) -> Result<Node, Error> {
        let Type::Struct(fields) = self.program.underlying(&struct_type)? else {
            return Err(anyhow!("{} is not a struct type", struct_type));
        };
        let field = fields
            .get(index)
            .ok_or_else(|| anyhow!("{} has no field with index {}", struct_type, index))?;
        Ok(Node::Field {
            name: field.name.clone(),
            ty: field.ty.clone(),
            struct_type,
            index,
        })
    }

    /// Add the edges for a single instruction of `function`.
    fn instr(&mut self, function: &Term<Function>, instr: &Term<Instr>) -> Result<(), Error> {
        let program = self.program;
        let fn_tid = &function.tid;
        match &instr.term {
            Instr::Store { address, value } => {
                let left = self.node_from_val(fn_tid, address)?;
                let right = self.node_from_val(fn_tid, value)?;
                self.add_in_flow_alias_edges(left, right)?;
            }
            Instr::UnOp {
                result,
                op: UnOpKind::Deref,
                operand,
            } => {
                let left = self.node_from_var(fn_tid, result)?;
                let right = self.node_from_val(fn_tid, operand)?;
                self.add_in_flow_alias_edges(left, right)?;
            }
            Instr::UnOp {
                result,
                op: UnOpKind::Recv { comma_ok },
                operand,
            } => {
                let left = if *comma_ok {
                    self.indexed_local(fn_tid, result, 0)?
                } else {
                    self.node_from_var(fn_tid, result)?
                };
                let elem = self.chan_elem(operand)?;
                self.add_in_flow_alias_edges(left, Node::ChannelElem(elem))?;
            }
            Instr::Phi { result, edges } => {
                let left = self.node_from_var(fn_tid, result)?;
                for value in edges {
                    let right = self.node_from_val(fn_tid, value)?;
                    self.add_in_flow_alias_edges(left.clone(), right)?;
                }
            }
            Instr::MakeInterface { result, value } | Instr::ChangeInterface { result, value } => {
                let source = self.node_from_val(fn_tid, value)?;
                let target = self.node_from_var(fn_tid, result)?;
                self.add_in_flow_edge(source, target)?;
            }
            Instr::ChangeType { result, value } => {
                let left = self.node_from_var(fn_tid, result)?;
                let right = self.node_from_val(fn_tid, value)?;
                self.add_in_flow_alias_edges(left, right)?;
            }
            Instr::TypeAssert {
                result,
                value,
                comma_ok,
                ..
            } => {
                let source = self.node_from_val(fn_tid, value)?;
                let target = if *comma_ok {
                    self.indexed_local(fn_tid, result, 0)?
                } else {
                    self.node_from_var(fn_tid, result)?
                };
                self.add_in_flow_edge(source, target)?;
            }
            Instr::Extract {
                result,
                tuple,
                index,
            } => {
                let Value::Var(tuple_var) = tuple else {
                    return Err(anyhow!("Extract from non-register value {}", tuple));
                };
                let left = self.node_from_var(fn_tid, result)?;
                let right = self.indexed_local(fn_tid, tuple_var, *index)?;
                self.add_in_flow_alias_edges(left, right)?;
            }
            Instr::Field {
                result,
                value,
                field,
            } => {
                let field_node = self.field(value.ty(program)?, *field)?;
                let target = self.node_from_var(fn_tid, result)?;
                self.add_in_flow_edge(field_node, target)?;
            }
            Instr::FieldAddr {
                result,
                value,
                field,
            } => {
                let ty = value.ty(program)?;
                let Type::Pointer(struct_type) = program.underlying(&ty)? else {
                    return Err(anyhow!("{} of type {} is not a pointer", value, ty));
                };
                let field_node = self.field(struct_type.as_ref().clone(), *field)?;
                let result_node = self.node_from_var(fn_tid, result)?;
                self.add_in_flow_edge(field_node.clone(), result_node.clone())?;
                self.add_in_flow_edge(result_node, field_node)?;
            }
            Instr::Send { chan, value } => {
                let elem = self.chan_elem(chan)?;
                let right = self.node_from_val(fn_tid, value)?;
                self.add_in_flow_alias_edges(Node::ChannelElem(elem), right)?;
            }
            Instr::Select { result, states, .. } => {
                let mut recv_index = 0;
                for state in states {
                    let elem = self.chan_elem(&state.chan)?;
                    match (&state.dir, &state.send) {
                        (ChanDir::Send, Some(sent)) => {
                            let right = self.node_from_val(fn_tid, sent)?;
                            self.add_in_flow_alias_edges(Node::ChannelElem(elem), right)?;
                        }
                        (ChanDir::Recv, None) => {
                            let left = self.indexed_local(fn_tid, result, 2 + recv_index)?;
                            self.add_in_flow_alias_edges(left, Node::ChannelElem(elem))?;
                            recv_index += 1;
                        }
                        _ => {
                            return Err(anyhow!(
                                "Invalid select state on channel {}",
                                state.chan
                            ))
                        }
                    }
                }
            }
            Instr::Index { result, value, .. } => {
                let elem = self.slice_array_elem(value)?;
                let left = self.node_from_var(fn_tid, result)?;
                self.add_in_flow_alias_edges(left, Node::SliceElem(elem))?;
            }
            Instr::IndexAddr { result, value, .. } => {
                let elem = Node::SliceElem(self.slice_array_elem(value)?);
                let result_node = self.node_from_var(fn_tid, result)?;
                self.add_in_flow_edge(elem.clone(), result_node.clone())?;
                self.add_in_flow_edge(result_node, elem)?;
            }
            Instr::Lookup {
                result,
                map,
                comma_ok,
                ..
            } => {
                if let Some((_, elem)) = self.map_types(map)? {
                    let left = if *comma_ok {
                        self.indexed_local(fn_tid, result, 0)?
                    } else {
                        self.node_from_var(fn_tid, result)?
                    };
                    self.add_in_flow_alias_edges(left, Node::MapValue(elem))?;
                }
            }
            Instr::MapUpdate { map, key, value } => {
                let Some((key_type, elem_type)) = self.map_types(map)? else {
                    return Err(anyhow!("Update of non-map value {}", map));
                };
                let key_node = self.node_from_val(fn_tid, key)?;
                self.add_in_flow_alias_edges(Node::MapKey(key_type), key_node)?;
                let value_node = self.node_from_val(fn_tid, value)?;
                self.add_in_flow_alias_edges(Node::MapValue(elem_type), value_node)?;
            }
            Instr::Next {
                result, is_string, ..
            } => {
                if !*is_string {
                    let key = self.indexed_local(fn_tid, result, 1)?;
                    self.add_in_flow_alias_edges(key, Node::MapKey(tuple_elem(result, 1)?))?;
                    let value = self.indexed_local(fn_tid, result, 2)?;
                    self.add_in_flow_alias_edges(value, Node::MapValue(tuple_elem(result, 2)?))?;
                }
            }
            Instr::MakeClosure {
                result,
                function: closure,
                bindings,
            } => {
                let closure_node = self.node_from_val(fn_tid, &Value::Function(closure.clone()))?;
                let result_node = self.node_from_var(fn_tid, result)?;
                self.add_in_flow_edge(closure_node, result_node)?;
                let free_vars = &program.function(closure)?.term.free_vars;
                if free_vars.len() != bindings.len() {
                    return Err(anyhow!(
                        "Closure of {} binds {} values to {} free variables",
                        closure,
                        bindings.len(),
                        free_vars.len()
                    ));
                }
                for (free_var, binding) in free_vars.iter().zip(bindings) {
                    let left = self.node_from_var(closure, free_var)?;
                    let right = self.node_from_val(fn_tid, binding)?;
                    self.add_in_flow_alias_edges(left, right)?;
                }
            }
            Instr::Call { result, call } => {
                self.call(fn_tid, &instr.tid, result.as_ref(), call)?;
            }
            Instr::Go { call } | Instr::Defer { call } => {
                self.call(fn_tid, &instr.tid, None, call)?;
            }
            Instr::Panic { value } => {
                if can_have_methods(program, &value.ty(program)?)? {
                    let source = self.node_from_val(fn_tid, value)?;
                    self.add_in_flow_edge(source, Node::PanicArg)?;
                }
            }
            Instr::Return { results } => self.rtrn(fn_tid, results)?,
            Instr::UnOp { .. }
            | Instr::Alloc { .. }
            | Instr::BinOp { .. }
            | Instr::Convert { .. }
            | Instr::MakeMap { .. }
            | Instr::MakeChan { .. }
            | Instr::MakeSlice { .. }
            | Instr::Slice { .. }
            | Instr::SliceToArrayPointer { .. }
            | Instr::Range { .. }
            | Instr::Jump
            | Instr::If { .. }
            | Instr::RunDefers => (),
        }
        Ok(())
    }

    /// Add the edges for a `Call`, `Go` or `Defer` instruction
    /// and register dynamic call sites.
    fn call(
        &mut self,
        caller: &Tid,
        site: &Tid,
        result: Option<&Variable>,
        call: &CallCommon,
    ) -> Result<(), Error> {
        if call.value.is_builtin("recover") {
            if let Some(result) = result {
                let target = self.node_from_var(caller, result)?;
                self.add_in_flow_edge(Node::RecoverReturn, target)?;
            }
            return Ok(());
        }
        if call.is_dynamic() {
            self.sites.push(DynamicCallSite {
                caller: caller.clone(),
                site: site.clone(),
                operand: self.node_from_val(caller, &call.value)?,
                method: call.method.clone(),
            });
        }
        let (program, baseline) = (self.program, self.baseline);
        for callee in baseline.callees(caller, site) {
            let callee = program.function(callee)?;
            self.add_argument_flows(caller, call, callee)?;
        }
        Ok(())
    }

    /// Add the flows from the arguments of a call to the parameters of a callee.
    ///
    /// For interface method invocations the receiver only flows to the callee
    /// if the receiver parameter of the callee has a function type.
    fn add_argument_flows(
        &mut self,
        caller: &Tid,
        call: &CallCommon,
        callee: &Term<Function>,
    ) -> Result<(), Error> {
        let params: Vec<&Variable> = callee.term.call_params().collect();
        let Some(first_param) = params.first() else {
            return Ok(());
        };
        let offset = if call.method.is_some() {
            if self.program.is_function(&first_param.ty)? {
                let source = self.node_from_val(caller, &call.value)?;
                let target = self.node_from_var(&callee.tid, first_param)?;
                self.add_in_flow_edge(source, target)?;
            }
            1
        } else {
            0
        };
        for (arg, param) in call.args.iter().zip(params.iter().skip(offset)) {
            let left = self.node_from_var(&callee.tid, param)?;
            let right = self.node_from_val(caller, arg)?;
            self.add_in_flow_alias_edges(left, right)?;
        }
        Ok(())
    }

    /// Add the flows from the returned values to the results of all call sites
    /// of `function` in the baseline call graph.
    fn rtrn(&mut self, function: &Tid, results: &[Value]) -> Result<(), Error> {
        let Some(call_sites) = self.call_sites.get(function).cloned() else {
            return Ok(());
        };
        for (caller, site) in call_sites {
            let Some(site_result) = self.site_results.get(&(caller, site)).copied() else {
                continue;
            };
            if let [single] = results {
                let source = self.node_from_val(function, single)?;
                let target = self.node_from_var(caller, site_result)?;
                self.add_in_flow_edge(source, target)?;
            } else {
                for (index, value) in results.iter().enumerate() {
                    let source = self.node_from_val(function, value)?;
                    let target = self.indexed_local(caller, site_result, index)?;
                    self.add_in_flow_edge(source, target)?;
                }
            }
        }
        Ok(())
    }
}

/// Get the type of the element at `index` of a tuple-typed register.
fn tuple_elem(var: &Variable, index: usize) -> Result<Type, Error> {
    var.ty.tuple_elem(index).cloned().ok_or_else(|| {
        anyhow!(
            "Register {} of type {} has no tuple element {}",
            var,
            var.ty,
            index
        )
    })
}

/// Returns `true` if the node represents a pointer, i.e. a value that can alias other values.
fn is_reference(node: &Node) -> bool {
    match node {
        Node::NestedPtrInterface(_) | Node::NestedPtrFunction(_) => true,
        _ => matches!(node.ty(), Some(Type::Pointer(_))),
    }
}
