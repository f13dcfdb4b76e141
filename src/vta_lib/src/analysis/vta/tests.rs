use super::*;
use crate::analysis::cha;
use std::collections::BTreeSet;

/// Add a body to the function whose instructions get the IDs `{name}${index}`.
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

fn func() -> Type {
    Type::func(vec![], vec![])
}

fn iface() -> Type {
    Type::named("P.I")
}

fn var(name: &str, ty: Type) -> Variable {
    Variable::new(name, ty)
}

fn make_c_interface(result: &str) -> Instr {
    Instr::MakeInterface {
        result: var(result, iface()),
        value: Value::constant("0", Type::named("P.C")),
    }
}

fn rtrn() -> Instr {
    Instr::Return { results: vec![] }
}

/// Build the type propagation graph of all functions with a CHA baseline.
fn graph_lines(program: &Program) -> Vec<String> {
    let (baseline, _) = cha::compute_call_graph(program).unwrap();
    let functions: Vec<_> = program.functions_with_body().collect();
    let (flow_graph, _) = builder::build(program, &baseline, &functions).unwrap();
    flow_graph.graph.to_lines()
}

fn callees(callgraph: &CallGraph, caller: &str, site: &str) -> BTreeSet<String> {
    callgraph
        .callees(&Tid::new(caller), &Tid::new(site))
        .into_iter()
        .map(|callee| callee.to_string())
        .collect()
}

fn names(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

/// `func g() { var i I = C(0); i.f() }`
fn mock_invoke_program() -> Program {
    let mut program = Program::mock_interfaces();
    program.add_function(with_body(
        Function::new("g", Signature::default()),
        vec![
            make_c_interface("t0"),
            Instr::Call {
                result: None,
                call: CallCommon::invoke(Value::var("t0", iface()), "f", vec![]),
            },
            rtrn(),
        ],
    ));
    program
}

#[test]
fn interface_invocation() {
    let program = mock_invoke_program();
    let (baseline, _) = cha::compute_call_graph(&program).unwrap();
    assert_eq!(callees(&baseline, "g", "g$1"), names(&["(*D).f", "(C).f"]));

    let (resolved, logs) =
        compute_resolved_edges(&program, &baseline, &Config::default()).unwrap();
    assert_eq!(resolved.edge_strings(), vec!["g -> (C).f"]);
    assert!(logs.iter().all(|log| log.source.as_deref() == Some("VTA")));

    let (callgraph, _) = compute_call_graph(&program, &baseline, &Config::default()).unwrap();
    assert!(callgraph.is_superset_of(&baseline));
    assert!(callgraph.contains_edge(&Tid::new("g"), &Tid::new("g$1"), &Tid::new("(C).f")));
    assert_eq!(
        graph_lines(&program),
        vec!["Constant(P.C) -> Local(t0)", "Panic -> Recover"]
    );
}

#[test]
fn closures() {
    let mut program = Program::mock_empty();
    for name in ["h", "f$1", "unused"] {
        program.add_function(with_body(Function::new(name, Signature::default()), vec![rtrn()]));
    }
    // func f(b bool) { p := func() {}; p(); if b { p = h }; p() }
    let mut f = Function::new("f", Signature::new(vec![Type::bool()], vec![]));
    f.params = vec![var("b", Type::bool())];
    program.add_function(with_body(
        f,
        vec![
            Instr::Call {
                result: None,
                call: CallCommon::call(Value::function("f$1"), vec![]),
            },
            Instr::If {
                condition: Value::var("b", Type::bool()),
            },
            Instr::Phi {
                result: var("t0", func()),
                edges: vec![Value::function("f$1"), Value::function("h")],
            },
            Instr::Call {
                result: None,
                call: CallCommon::call(Value::var("t0", func()), vec![]),
            },
            rtrn(),
        ],
    ));
    let (baseline, _) = cha::compute_call_graph(&program).unwrap();
    assert_eq!(
        callees(&baseline, "f", "f$3"),
        names(&["f$1", "h", "unused"])
    );

    let (resolved, _) = compute_resolved_edges(&program, &baseline, &Config::default()).unwrap();
    assert_eq!(callees(&resolved, "f", "f$3"), names(&["f$1", "h"]));
    assert!(callees(&resolved, "f", "f$0").is_empty());

    let (callgraph, _) = compute_call_graph(&program, &baseline, &Config::default()).unwrap();
    assert_eq!(callees(&callgraph, "f", "f$0"), names(&["f$1"]));
    assert!(callgraph.is_superset_of(&baseline));
    assert_eq!(
        graph_lines(&program),
        vec![
            "Function(f$1) -> Local(t0)",
            "Function(h) -> Local(t0)",
            "Panic -> Recover",
        ]
    );
}

/// Two instantiations of `func instantiated[X I](x X) { var i I = x; i.F() }`.
fn mock_generic_program() -> Program {
    let mut program = Program::mock_empty();
    program.add_named_type(NamedType::new(
        "P.I",
        Type::interface(vec![InterfaceMethod::new("F", Signature::default())]),
    ));
    for name in ["A", "B"] {
        let type_name = format!("P.{name}");
        let method = format!("({name}).F");
        program.add_named_type(
            NamedType::new(&type_name, Type::structure(vec![])).with_method("F", false, &method),
        );
        let mut method_function = Function::new(&method, Signature::default());
        method_function.receiver = Some(var("recv", Type::named(&type_name)));
        program.add_function(with_body(method_function, vec![rtrn()]));

        let mut instance = Function::new(
            format!("instantiated[{name}]"),
            Signature::new(vec![Type::named(&type_name)], vec![]),
        );
        instance.params = vec![var("x", Type::named(&type_name))];
        instance.type_args = vec![Type::named(&type_name)];
        program.add_function(with_body(
            instance,
            vec![
                Instr::MakeInterface {
                    result: var("t0", iface()),
                    value: Value::var("x", Type::named(&type_name)),
                },
                Instr::Call {
                    result: None,
                    call: CallCommon::invoke(Value::var("t0", iface()), "F", vec![]),
                },
                rtrn(),
            ],
        ));
    }
    let main_instrs = ["A", "B"]
        .iter()
        .map(|name| Instr::Call {
            result: None,
            call: CallCommon::call(
                Value::function(format!("instantiated[{name}]")),
                vec![Value::constant(format!("{name}{{}}"), Type::named(&format!("P.{name}")))],
            ),
        })
        .chain([rtrn()])
        .collect();
    program.add_function(with_body(
        Function::new("main", Signature::default()),
        main_instrs,
    ));
    program
}

#[test]
fn generic_instantiations() {
    let program = mock_generic_program();
    let (baseline, _) = cha::compute_call_graph(&program).unwrap();
    assert_eq!(
        callees(&baseline, "instantiated[A]", "instantiated[A]$1"),
        names(&["(A).F", "(B).F"])
    );

    let (resolved, _) = compute_resolved_edges(&program, &baseline, &Config::default()).unwrap();
    assert_eq!(
        resolved.edge_strings(),
        vec!["instantiated[A] -> (A).F", "instantiated[B] -> (B).F"]
    );
    let (callgraph, _) = compute_call_graph(&program, &baseline, &Config::default()).unwrap();
    assert!(callgraph.is_superset_of(&baseline));
}

#[test]
fn stores_and_nested_pointers() {
    let mut program = Program::mock_interfaces();
    let ptr_iface = Type::pointer(iface());
    let mut main = Function::new("main", Signature::new(vec![ptr_iface.clone()], vec![]));
    main.params = vec![var("p", ptr_iface.clone())];
    program.add_function(with_body(
        main,
        vec![
            make_c_interface("t0"),
            Instr::Store {
                address: Value::global("gl", iface()),
                value: Value::var("t0", iface()),
            },
            Instr::UnOp {
                result: var("t1", iface()),
                op: UnOpKind::Deref,
                operand: Value::global("gl", iface()),
            },
            Instr::Alloc {
                result: var("t2", Type::pointer(ptr_iface.clone())),
            },
            Instr::Store {
                address: Value::var("t2", Type::pointer(ptr_iface.clone())),
                value: Value::var("p", ptr_iface),
            },
            Instr::BinOp {
                result: var("t3", Type::int()),
                lhs: Value::constant("1", Type::int()),
                rhs: Value::constant("2", Type::int()),
            },
        ],
    ));
    assert_eq!(
        graph_lines(&program),
        vec![
            "Constant(P.C) -> Local(t0)",
            "Global(gl) -> Local(t1)",
            "Local(p) -> PtrInterface(P.I)",
            "Local(t0) -> Global(gl)",
            "Panic -> Recover",
            "PtrInterface(P.I) -> Local(p)",
        ]
    );
}

#[test]
fn struct_fields() {
    let mut program = Program::mock_interfaces();
    program.add_named_type(NamedType::new(
        "P.S",
        Type::structure(vec![("a", iface()), ("b", Type::int())]),
    ));
    let s = Type::named("P.S");
    let mut main = Function::new(
        "main",
        Signature::new(vec![s.clone(), Type::pointer(s.clone())], vec![]),
    );
    main.params = vec![var("s", s.clone()), var("sp", Type::pointer(s.clone()))];
    program.add_function(with_body(
        main,
        vec![
            Instr::Field {
                result: var("t0", iface()),
                value: Value::var("s", s.clone()),
                field: 0,
            },
            Instr::FieldAddr {
                result: var("t1", Type::pointer(iface())),
                value: Value::var("sp", Type::pointer(s.clone())),
                field: 0,
            },
            Instr::Field {
                result: var("t2", Type::int()),
                value: Value::var("s", s),
                field: 1,
            },
        ],
    ));
    assert_eq!(
        graph_lines(&program),
        vec![
            "Field(P.S:a) -> Local(t0), Local(t1)",
            "Local(t1) -> Field(P.S:a)",
            "Panic -> Recover",
        ]
    );
}

#[test]
fn channels_and_select() {
    let mut program = Program::mock_interfaces();
    let chan = Type::chan(iface());
    let mut main = Function::new("main", Signature::new(vec![chan.clone()], vec![]));
    main.params = vec![var("ch", chan.clone())];
    let ch = Value::var("ch", chan);
    program.add_function(with_body(
        main,
        vec![
            make_c_interface("t0"),
            Instr::Send {
                chan: ch.clone(),
                value: Value::var("t0", iface()),
            },
            Instr::UnOp {
                result: var("t1", iface()),
                op: UnOpKind::Recv { comma_ok: false },
                operand: ch.clone(),
            },
            Instr::UnOp {
                result: var("t2", Type::tuple(vec![iface(), Type::bool()])),
                op: UnOpKind::Recv { comma_ok: true },
                operand: ch.clone(),
            },
            Instr::Select {
                result: var("t3", Type::tuple(vec![Type::int(), Type::bool(), iface()])),
                states: vec![
                    SelectState {
                        chan: ch.clone(),
                        dir: ChanDir::Send,
                        send: Some(Value::var("t0", iface())),
                    },
                    SelectState {
                        chan: ch,
                        dir: ChanDir::Recv,
                        send: None,
                    },
                ],
                blocking: true,
            },
        ],
    ));
    assert_eq!(
        graph_lines(&program),
        vec![
            "Channel(chan P.I) -> Local(t1), Local(t2[0]), Local(t3[2])",
            "Constant(P.C) -> Local(t0)",
            "Local(t0) -> Channel(chan P.I)",
            "Panic -> Recover",
        ]
    );
}

#[test]
fn maps_and_slices() {
    let mut program = Program::mock_interfaces();
    let map = Type::map(iface(), iface());
    let slice = Type::slice(iface());
    let array_ptr = Type::pointer(Type::array(iface(), 4));
    let mut main = Function::new(
        "main",
        Signature::new(
            vec![map.clone(), slice.clone(), array_ptr.clone(), Type::string()],
            vec![],
        ),
    );
    main.params = vec![
        var("m", map.clone()),
        var("sl", slice.clone()),
        var("arr", array_ptr.clone()),
        var("str", Type::string()),
    ];
    let m = Value::var("m", map);
    let t0 = Value::var("t0", iface());
    let zero = Value::constant("0", Type::int());
    program.add_function(with_body(
        main,
        vec![
            make_c_interface("t0"),
            Instr::MapUpdate {
                map: m.clone(),
                key: t0.clone(),
                value: t0.clone(),
            },
            Instr::Lookup {
                result: var("t1", iface()),
                map: m.clone(),
                key: t0.clone(),
                comma_ok: false,
            },
            Instr::Lookup {
                result: var("t2", Type::tuple(vec![iface(), Type::bool()])),
                map: m.clone(),
                key: t0,
                comma_ok: true,
            },
            Instr::Lookup {
                result: var("t3", Type::byte()),
                map: Value::var("str", Type::string()),
                key: zero.clone(),
                comma_ok: false,
            },
            Instr::Range {
                result: var("t4", Type::tuple(vec![])),
                value: m,
            },
            Instr::Next {
                result: var("t5", Type::tuple(vec![Type::bool(), iface(), iface()])),
                iter: Value::var("t4", Type::tuple(vec![])),
                is_string: false,
            },
            Instr::Index {
                result: var("t6", iface()),
                value: Value::var("sl", slice),
                index: zero.clone(),
            },
            Instr::IndexAddr {
                result: var("t7", Type::pointer(iface())),
                value: Value::var("arr", array_ptr),
                index: zero,
            },
        ],
    ));
    assert_eq!(
        graph_lines(&program),
        vec![
            "Constant(P.C) -> Local(t0)",
            "Local(t0) -> MapKey(P.I), MapValue(P.I)",
            "Local(t7) -> Slice([]P.I)",
            "MapKey(P.I) -> Local(t5[1])",
            "MapValue(P.I) -> Local(t1), Local(t2[0]), Local(t5[2])",
            "Panic -> Recover",
            "Slice([]P.I) -> Local(t6), Local(t7)",
        ]
    );
}

#[test]
fn closures_returns_and_panics() {
    let mut program = Program::mock_interfaces();
    program.add_named_type(NamedType::new("P.F", func()));
    let mut closure = Function::new("main$1", Signature::default());
    closure.free_vars = vec![var("fv", iface())];
    program.add_function(with_body(closure, vec![rtrn()]));
    let pair_type = Type::tuple(vec![iface(), Type::bool()]);
    program.add_function(with_body(
        Function::new("pair", Signature::new(vec![], vec![iface(), Type::bool()])),
        vec![Instr::Return {
            results: vec![
                Value::var("r", iface()),
                Value::constant("true", Type::bool()),
            ],
        }],
    ));
    let mut main = Function::new(
        "main",
        Signature::new(vec![Type::empty_interface()], vec![]),
    );
    main.params = vec![var("e", Type::empty_interface())];
    program.add_function(with_body(
        main,
        vec![
            make_c_interface("t0"),
            Instr::MakeClosure {
                result: var("t1", func()),
                function: Tid::new("main$1"),
                bindings: vec![Value::var("t0", iface())],
            },
            Instr::TypeAssert {
                result: var("t2", iface()),
                value: Value::var("e", Type::empty_interface()),
                asserted: iface(),
                comma_ok: false,
            },
            Instr::TypeAssert {
                result: var("t3", Type::tuple(vec![iface(), Type::bool()])),
                value: Value::var("e", Type::empty_interface()),
                asserted: iface(),
                comma_ok: true,
            },
            Instr::Call {
                result: Some(var("t4", pair_type.clone())),
                call: CallCommon::call(Value::function("pair"), vec![]),
            },
            Instr::Extract {
                result: var("t5", iface()),
                tuple: Value::var("t4", pair_type),
                index: 0,
            },
            Instr::Panic {
                value: Value::var("t0", iface()),
            },
            Instr::Call {
                result: Some(var("t6", iface())),
                call: CallCommon::call(Value::builtin("recover"), vec![]),
            },
            Instr::ChangeType {
                result: var("t7", Type::named("P.F")),
                value: Value::var("t1", func()),
            },
            rtrn(),
        ],
    ));
    assert_eq!(
        graph_lines(&program),
        vec![
            "Constant(P.C) -> Local(t0)",
            "Function(main$1) -> Local(t1)",
            "Local(e) -> Local(t2), Local(t3[0])",
            "Local(r) -> Local(t4[0])",
            "Local(t0) -> Local(fv), Panic",
            "Local(t1) -> Local(t7)",
            "Local(t4[0]) -> Local(t5)",
            "Panic -> Recover",
            "Recover -> Local(t6)",
        ]
    );
}

#[test]
fn call_argument_flows() {
    let mut program = Program::mock_interfaces();
    program.add_named_type(NamedType::new("P.G", func()).with_method("f", false, "(G).f"));
    let mut g_f = Function::new("(G).f", Signature::default());
    g_f.receiver = Some(var("g", Type::named("P.G")));
    program.add_function(with_body(g_f, vec![rtrn()]));
    let mut takes = Function::new("takes", Signature::new(vec![iface()], vec![]));
    takes.params = vec![var("x", iface())];
    program.add_function(with_body(takes, vec![rtrn()]));
    let mut main = Function::new("main", Signature::new(vec![iface()], vec![]));
    main.params = vec![var("i", iface())];
    program.add_function(with_body(
        main,
        vec![
            Instr::Call {
                result: None,
                call: CallCommon::call(Value::function("takes"), vec![Value::var("i", iface())]),
            },
            Instr::Call {
                result: None,
                call: CallCommon::invoke(Value::var("i", iface()), "f", vec![]),
            },
            rtrn(),
        ],
    ));
    assert_eq!(
        graph_lines(&program),
        vec!["Local(i) -> Local(g), Local(x)", "Panic -> Recover"]
    );

    // No concrete types reach the parameter of `main`.
    let (baseline, _) = cha::compute_call_graph(&program).unwrap();
    let (resolved, logs) =
        compute_resolved_edges(&program, &baseline, &Config::default()).unwrap();
    assert_eq!(resolved.edge_count(), 0);
    assert!(logs.contains(
        &LogMessage::new_debug("No concrete types reach Local(i) of the dynamic call")
            .location(Tid::new("main$1"))
            .source("VTA")
    ));
}

#[test]
fn named_function_type_receiver() {
    // type G func(); func (g G) f() { g() }
    let mut program = Program::mock_interfaces();
    let named = Type::named("P.G");
    program.add_named_type(NamedType::new("P.G", func()).with_method("f", false, "(G).f"));
    let mut g_f = Function::new("(G).f", Signature::default());
    g_f.receiver = Some(var("g", named.clone()));
    program.add_function(with_body(
        g_f,
        vec![
            Instr::Call {
                result: None,
                call: CallCommon::call(Value::var("g", named.clone()), vec![]),
            },
            rtrn(),
        ],
    ));
    program.add_function(with_body(Function::new("h", Signature::default()), vec![rtrn()]));
    // func main() { var i I = G(h); i.f() }
    program.add_function(with_body(
        Function::new("main", Signature::default()),
        vec![
            Instr::ChangeType {
                result: var("t0", named.clone()),
                value: Value::function("h"),
            },
            Instr::MakeInterface {
                result: var("t1", iface()),
                value: Value::var("t0", named),
            },
            Instr::Call {
                result: None,
                call: CallCommon::invoke(Value::var("t1", iface()), "f", vec![]),
            },
            rtrn(),
        ],
    ));
    assert_eq!(
        graph_lines(&program),
        vec![
            "Function(h) -> Local(t0)",
            "Local(t0) -> Local(t1)",
            "Local(t1) -> Local(g)",
            "Panic -> Recover",
        ]
    );

    let (baseline, _) = cha::compute_call_graph(&program).unwrap();
    let (resolved, _) = compute_resolved_edges(&program, &baseline, &Config::default()).unwrap();
    assert_eq!(resolved.edge_strings(), vec!["(G).f -> h", "main -> (G).f"]);
}

#[test]
fn recursive_pointer_types() {
    // type P *P; func main(p P) { t0 := p; *t1 = p }
    let mut program = Program::mock_empty();
    let recursive = Type::named("P.P");
    program.add_named_type(NamedType::new("P.P", Type::pointer(recursive.clone())));
    let mut main = Function::new("main", Signature::new(vec![recursive.clone()], vec![]));
    main.params = vec![var("p", recursive.clone())];
    program.add_function(with_body(
        main,
        vec![
            Instr::Phi {
                result: var("t0", recursive.clone()),
                edges: vec![Value::var("p", recursive.clone())],
            },
            Instr::Store {
                address: Value::var("t1", Type::pointer(recursive.clone())),
                value: Value::var("p", recursive),
            },
            rtrn(),
        ],
    ));
    assert_eq!(graph_lines(&program), vec!["Panic -> Recover"]);
    let (baseline, _) = cha::compute_call_graph(&program).unwrap();
    let (callgraph, _) = compute_call_graph(&program, &baseline, &Config::default()).unwrap();
    assert_eq!(callgraph, baseline);
}

#[test]
fn malformed_instructions() {
    let malformed = [
        Instr::MakeInterface {
            result: var("t0", iface()),
            value: Value::builtin("len"),
        },
        Instr::Field {
            result: var("t0", iface()),
            value: Value::constant("1", Type::int()),
            field: 0,
        },
        Instr::Extract {
            result: var("t0", iface()),
            tuple: Value::var("t1", Type::int()),
            index: 0,
        },
        Instr::MakeInterface {
            result: var("t0", Type::named("P.Missing")),
            value: Value::constant("0", Type::named("P.C")),
        },
        Instr::MakeClosure {
            result: var("t0", func()),
            function: Tid::new("missing$1"),
            bindings: vec![],
        },
    ];
    for instr in malformed {
        let mut program = Program::mock_interfaces();
        let mut function = with_body(Function::new("main", Signature::default()), vec![instr]);
        function.blocks[0].term.instrs[0].tid =
            Tid::new("main$0").with_position("main.go:3:4");
        program.add_function(function);
        let (baseline, _) = cha::compute_call_graph(&program).unwrap();
        let err = compute_call_graph(&program, &baseline, &Config::default()).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.starts_with("Malformed instruction main$0 at main.go:3:4 in function main"));
    }
}

#[test]
fn analyzed_function_selection() {
    let program = mock_invoke_program();
    let (baseline, _) = cha::compute_call_graph(&program).unwrap();

    let config = Config {
        functions: Some(vec!["g".to_string(), "(C).f".to_string()]),
        max_rounds: None,
    };
    let (resolved, logs) = compute_resolved_edges(&program, &baseline, &config).unwrap();
    assert_eq!(resolved.edge_strings(), vec!["g -> (C).f"]);
    assert_eq!(
        logs[0],
        LogMessage::new_debug("Function body not available")
            .location(Tid::new("(C).f"))
            .source("VTA")
    );

    let config = Config {
        functions: Some(vec![]),
        max_rounds: None,
    };
    let (resolved, _) = compute_resolved_edges(&program, &baseline, &config).unwrap();
    assert_eq!(resolved.edge_count(), 0);
    let (callgraph, _) = compute_call_graph(&program, &baseline, &config).unwrap();
    assert_eq!(callgraph, baseline);

    let config = Config {
        functions: Some(vec!["missing".to_string()]),
        max_rounds: None,
    };
    assert!(compute_resolved_edges(&program, &baseline, &config).is_err());
}

#[test]
fn round_limit() {
    let program = mock_invoke_program();
    let (baseline, _) = cha::compute_call_graph(&program).unwrap();
    let config = Config {
        functions: None,
        max_rounds: Some(0),
    };
    assert!(compute_call_graph(&program, &baseline, &config).is_err());
}

#[test]
fn config_deserialization() {
    let config: Config = serde_json::from_value(serde_json::json!({
        "functions": ["main", "g"],
        "max_rounds": 10
    }))
    .unwrap();
    assert_eq!(
        config,
        Config {
            functions: Some(vec!["main".to_string(), "g".to_string()]),
            max_rounds: Some(10),
        }
    );
    let config: Config = serde_json::from_value(serde_json::json!({})).unwrap();
    assert_eq!(config, Config::default());
}
