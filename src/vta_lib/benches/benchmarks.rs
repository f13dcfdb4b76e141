//! Microbenchmarks for the call graph analyses.
//!
//! This module contains microbenchmarks for the following steps:
//!
//! - CHA baseline call graph construction,
//! - type propagation graph construction,
//! - type propagation,
//! - the complete analysis.
//!
//! All benchmarks are executed on synthetic programs of increasing size.
//! A program of size `n` contains `n` types implementing a common interface
//! and `n` functions, each wrapping one of the types into the interface,
//! storing it into a global and invoking the interface method both on the local and on the global value.
//! Each function also calls one of its neighbours through a function value.
//!
//! # Running the Benchmarks
//!
//! If you submit a PR that makes changes which might impact performance you are
//! encouraged to run these benchmarks. In this case, please report the relevant
//! changes between the current master and your code in the PR description.
//!
//! First run the benchmarks on the current master and save the result:
//!
//! ```
//! $ git checkout master
//! $ cargo bench --bench "benchmarks" -- --save-baseline master propagation
//! ```
//!
//! Then, checkout your feature branch and compare to the current master:
//!
//! ```
//! $ git checkout my_awesome_fix
//! $ cargo bench --bench "benchmarks" -- --verbose --baseline master propagation
//! ```
//!
//! In general, absolute benchmark results are always tied to the system that
//! they were measured on. Thus, it only makes sense to report relative results
//! in your PR.

use std::time;

use criterion::{
    black_box, criterion_group, criterion_main, measurement::Measurement, BenchmarkGroup,
    BenchmarkId, Criterion, Throughput,
};

use vta_lib::analysis::{cha, vta};
use vta_lib::intermediate_representation::*;
use vta_lib::utils;

mod inputs {
    //! Sizes of the synthetic input programs.

    pub const PROGRAM_SIZES: [usize; 3] = [10, 50, 200];
}

mod helpers {
    //! Helpers to generate inputs and configurations.

    use super::*;

    fn with_body(mut function: Function, instrs: Vec<Instr>) -> Function {
        let name = function.name.clone();
        let instrs = instrs
            .into_iter()
            .enumerate()
            .map(|(index, instr)| Term::new(format!("{name}${index}"), instr))
            .collect();
        function
            .blocks
            .push(Term::new(format!("{name}$blk0"), Blk { instrs }));
        function
    }

    pub fn get_program(size: usize) -> Program {
        let iface = Type::named("P.I");
        let func = Type::func(vec![], vec![]);
        let mut program = Program::default();
        program.add_named_type(NamedType::new(
            "P.I",
            Type::interface(vec![InterfaceMethod::new("f", Signature::default())]),
        ));
        for index in 0..size {
            let type_name = format!("P.T{index}");
            let method_name = format!("(T{index}).f");
            program.add_named_type(
                NamedType::new(&type_name, Type::int()).with_method("f", false, &method_name),
            );
            let mut method = Function::new(&method_name, Signature::default());
            method.receiver = Some(Variable::new("t", Type::named(&type_name)));
            program.add_function(with_body(method, vec![Instr::Return { results: vec![] }]));

            let neighbour = format!("caller{}", (index + 1) % size);
            program.add_function(with_body(
                Function::new(format!("caller{index}"), Signature::default()),
                vec![
                    Instr::MakeInterface {
                        result: Variable::new("t0", iface.clone()),
                        value: Value::constant(index, Type::named(&type_name)),
                    },
                    Instr::Store {
                        address: Value::global("gl", iface.clone()),
                        value: Value::var("t0", iface.clone()),
                    },
                    Instr::UnOp {
                        result: Variable::new("t1", iface.clone()),
                        op: UnOpKind::Deref,
                        operand: Value::global("gl", iface.clone()),
                    },
                    Instr::Call {
                        result: None,
                        call: CallCommon::invoke(Value::var("t0", iface.clone()), "f", vec![]),
                    },
                    Instr::Call {
                        result: None,
                        call: CallCommon::invoke(Value::var("t1", iface.clone()), "f", vec![]),
                    },
                    Instr::Phi {
                        result: Variable::new("t2", func.clone()),
                        edges: vec![Value::function(neighbour)],
                    },
                    Instr::Call {
                        result: None,
                        call: CallCommon::call(Value::var("t2", func.clone()), vec![]),
                    },
                    Instr::Return { results: vec![] },
                ],
            ));
        }
        program
    }

    pub fn get_config() -> serde_json::Value {
        utils::default_config().expect("Could not read bundled config file.")
    }
}

mod call_graphs {
    //! Benchmarks for the individual analysis steps.

    use super::helpers::*;
    use super::inputs::*;
    use super::*;

    fn bench_with_sizes<T, F>(mut group: BenchmarkGroup<T>, routine: F)
    where
        T: Measurement,
        F: Fn(&Program),
    {
        for size in PROGRAM_SIZES {
            let program = get_program(size);
            group.throughput(Throughput::Elements(program.functions.len() as u64));
            group.bench_with_input(BenchmarkId::from_parameter(size), &program, |b, program| {
                b.iter(|| routine(black_box(program)))
            });
        }
        group.finish();
    }

    pub fn bench_cha(c: &mut Criterion) {
        bench_with_sizes(c.benchmark_group("cha"), |program| {
            cha::compute_call_graph(program).expect("CHA failed.");
        });
    }

    pub fn bench_graph_construction(c: &mut Criterion) {
        bench_with_sizes(c.benchmark_group("graph_construction"), |program| {
            let (baseline, _) = cha::compute_call_graph(program).expect("CHA failed.");
            let functions: Vec<_> = program.functions_with_body().collect();
            vta::builder::build(program, &baseline, &functions).expect("Graph construction failed.");
        });
    }

    pub fn bench_propagation(c: &mut Criterion) {
        let mut group = c.benchmark_group("propagation");
        for size in PROGRAM_SIZES {
            let program = get_program(size);
            let (baseline, _) = cha::compute_call_graph(&program).expect("CHA failed.");
            let functions: Vec<_> = program.functions_with_body().collect();
            let (flow_graph, _) = vta::builder::build(&program, &baseline, &functions)
                .expect("Graph construction failed.");
            group.throughput(Throughput::Elements(flow_graph.graph.edge_count() as u64));
            group.bench_with_input(
                BenchmarkId::from_parameter(size),
                &flow_graph,
                |b, flow_graph| {
                    b.iter_with_large_drop(|| {
                        vta::propagation::propagate(&program, &flow_graph.graph, None)
                            .expect("Propagation failed.")
                    })
                },
            );
        }
        group.finish();
    }

    pub fn bench_full_analysis(c: &mut Criterion) {
        let config = get_config();
        bench_with_sizes(c.benchmark_group("full_analysis"), |program| {
            vta_lib::run(program, Some(&config)).expect("Analysis failed.");
        });
    }
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .sample_size(10)
        .warm_up_time(time::Duration::new(2, 0))
        .measurement_time(time::Duration::new(5, 0));
    targets = call_graphs::bench_cha,
        call_graphs::bench_graph_construction,
        call_graphs::bench_propagation,
        call_graphs::bench_full_analysis,
);
criterion_main!(benches);
