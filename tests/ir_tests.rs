use clonk::ir::{self, BasicBlock, Function, Inst, Module, Terminator, Value};

fn lower(source: &str) -> Module {
    let module = clonk::compile(source).expect("source should compile");
    ir::verify(&module).expect("lowered module should verify");
    module
}

fn function<'m>(module: &'m Module, name: &str) -> &'m Function {
    module
        .functions
        .iter()
        .find(|function| function.name == name)
        .unwrap_or_else(|| panic!("no function named {}", name))
}

fn block<'f>(function: &'f Function, label: &str) -> &'f BasicBlock {
    function
        .blocks
        .iter()
        .find(|block| block.label == label)
        .unwrap_or_else(|| panic!("no block labeled {}", label))
}

fn ret_value(block: &BasicBlock) -> Value {
    match block.terminator {
        Some(Terminator::Ret { value }) => value,
        ref other => panic!("expected ret terminator, got {:?}", other),
    }
}

#[test]
fn empty_body_lowers_to_ret_zero() {
    let module = lower("f() {}");
    let f = function(&module, "f");
    assert_eq!(f.blocks.len(), 1);
    assert!(f.blocks[0].instructions.is_empty());
    assert_eq!(ret_value(&f.blocks[0]), Value::Const(0));
}

#[test]
fn missing_return_appends_ret_zero() {
    let module = lower("f(a) { a + 1; }");
    let f = function(&module, "f");
    assert_eq!(ret_value(f.blocks.last().expect("at least one block")), Value::Const(0));
}

#[test]
fn if_else_merges_auto_local_through_phi() {
    let module = lower("f(a) { auto x = 0; if (a) x = 1; else x = 2; return x; }");
    let f = function(&module, "f");

    let end = block(f, "if0.end");
    assert_eq!(end.phis.len(), 1);
    let Inst::Phi { incoming } = f.inst(end.phis[0]) else {
        panic!("expected phi");
    };
    let mut merged: Vec<(Value, &str)> = incoming
        .iter()
        .map(|(value, pred)| (*value, f.block(*pred).label.as_str()))
        .collect();
    merged.sort_by_key(|(_, label)| *label);
    assert_eq!(
        merged,
        vec![
            (Value::Const(1), "if0.body"),
            (Value::Const(2), "if0.else"),
        ]
    );
    assert_eq!(ret_value(end), Value::Inst(end.phis[0]));

    // The store-to-alloca model is preserved alongside the SSA values.
    let allocas: Vec<_> = f
        .insts
        .iter()
        .filter(|inst| matches!(inst, Inst::Alloca { .. }))
        .collect();
    assert_eq!(allocas.len(), 1);
    let stores = f
        .insts
        .iter()
        .filter(|inst| matches!(inst, Inst::Store { .. }))
        .count();
    assert_eq!(stores, 3);
}

#[test]
fn while_loop_seals_back_edge_with_one_phi_operand_per_predecessor() {
    let module =
        lower("f(n) { auto i = 0; auto s = 0; while (i < n) { s = s + i; i = i + 1; } return s; }");
    let f = function(&module, "f");

    let cond = block(f, "loop0.cond");
    assert_eq!(cond.predecessors.len(), 2);
    assert_eq!(cond.phis.len(), 2);
    for &phi in &cond.phis {
        let Inst::Phi { incoming } = f.inst(phi) else {
            panic!("expected phi");
        };
        assert_eq!(incoming.len(), 2);
        let mut labels: Vec<_> = incoming
            .iter()
            .map(|(_, pred)| f.block(*pred).label.as_str())
            .collect();
        labels.sort();
        assert_eq!(labels, vec!["entry", "loop0.body"]);
    }

    let end = block(f, "loop0.end");
    assert!(matches!(ret_value(end), Value::Inst(_)));
}

#[test]
fn while_zero_keeps_a_body_block_nothing_branches_to() {
    let module = lower("f() { auto x = 5; while (0) { x = 1; } return x; }");
    let f = function(&module, "f");

    let cond = block(f, "loop0.cond");
    let end = block(f, "loop0.end");
    let body = block(f, "loop0.body");

    assert!(body.predecessors.is_empty());
    match cond.terminator {
        Some(Terminator::Br { target }) => assert_eq!(f.block(target).label, end.label),
        ref other => panic!("expected unconditional branch, got {:?}", other),
    }
    // The dead body still feeds the condition block's bookkeeping.
    assert_eq!(cond.predecessors.len(), 2);
}

#[test]
fn while_one_has_no_exit_edge() {
    let module = lower("f() { while (1) { return 4; } return 0; }");
    let f = function(&module, "f");

    let cond = block(f, "loop0.cond");
    match cond.terminator {
        Some(Terminator::Br { target }) => assert_eq!(f.block(target).label, "loop0.body"),
        ref other => panic!("expected unconditional branch, got {:?}", other),
    }
    assert!(block(f, "loop0.end").predecessors.is_empty());
    assert_eq!(ret_value(block(f, "loop0.body")), Value::Const(4));
}

#[test]
fn constant_if_lowers_only_the_taken_side() {
    let module = lower("f() { auto x = 0; if (1) x = 1; else x = 2; return x; }");
    let f = function(&module, "f");
    assert!(f.blocks.iter().all(|block| block.label != "if0.body"));
    assert!(f.blocks.iter().all(|block| block.label != "if0.else"));
    assert_eq!(ret_value(block(f, "if0.end")), Value::Const(1));

    let module = lower("f() { auto x = 0; if (0) x = 1; else x = 2; return x; }");
    let f = function(&module, "f");
    assert_eq!(ret_value(block(f, "if0.end")), Value::Const(2));
}

#[test]
fn registers_and_parameters_get_no_alloca() {
    let module = lower("f(a) { register r = a + 1; return r + a; }");
    let f = function(&module, "f");
    assert!(f
        .insts
        .iter()
        .all(|inst| !matches!(inst, Inst::Alloca { .. })));
}

#[test]
fn auto_local_gets_exactly_one_named_alloca_in_entry() {
    let module = lower("f() { auto x = 3; { auto x = 4; } return x; }");
    let f = function(&module, "f");
    let entry = &f.blocks[f.entry.0];
    let alloca_names: Vec<_> = entry
        .instructions
        .iter()
        .filter_map(|&id| match f.inst(id) {
            Inst::Alloca { name } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(alloca_names, vec!["x", "x.1"]);
    // Straight-line reads come from the SSA value, not the stack slot.
    assert_eq!(ret_value(f.blocks.last().expect("entry block")), Value::Const(3));
}

#[test]
fn calls_lower_with_their_argument_count() {
    let module = lower("f(a) { return g(a, 1) + h(); }");
    assert_eq!(
        module.externs,
        vec![("g".to_string(), 2), ("h".to_string(), 0)]
    );

    let f = function(&module, "f");
    let call = f
        .insts
        .iter()
        .find_map(|inst| match inst {
            Inst::Call { callee, args } if callee == "g" => Some(args.len()),
            _ => None,
        })
        .expect("call to g");
    assert_eq!(call, 2);
}

#[test]
fn logical_and_short_circuits_through_select_and_phi() {
    let module = lower("f(a, b) { return a && b; }");
    let f = function(&module, "f");

    let entry = &f.blocks[f.entry.0];
    match entry.terminator {
        Some(Terminator::CondBr {
            then_target,
            else_target,
            ..
        }) => {
            // On a == 0 control skips straight to the merge block.
            assert_eq!(f.block(then_target).label, "and0.end");
            assert_eq!(f.block(else_target).label, "and0.rhs");
        }
        ref other => panic!("expected conditional branch, got {:?}", other),
    }

    assert!(f
        .insts
        .iter()
        .any(|inst| matches!(inst, Inst::Select { .. })));

    let end = block(f, "and0.end");
    assert_eq!(end.phis.len(), 1);
    let Inst::Phi { incoming } = f.inst(end.phis[0]) else {
        panic!("expected phi");
    };
    let short: Vec<_> = incoming
        .iter()
        .filter(|(value, pred)| *value == Value::Const(0) && f.block(*pred).label == "entry")
        .collect();
    assert_eq!(short.len(), 1);
    assert_eq!(ret_value(end), Value::Inst(end.phis[0]));
}

#[test]
fn logical_or_short_circuits_with_one() {
    let module = lower("f(a, b) { return a || b; }");
    let f = function(&module, "f");
    let end = block(f, "or0.end");
    let Inst::Phi { incoming } = f.inst(end.phis[0]) else {
        panic!("expected phi");
    };
    assert!(incoming
        .iter()
        .any(|(value, pred)| *value == Value::Const(1) && f.block(*pred).label == "entry"));
}

#[test]
fn nested_short_circuit_conditions_verify() {
    lower("f(a, b, c) { if (a && b || c) return 1; return 0; }");
    lower("f(a, b) { while (a && (b || a)) { a = a - 1; } return a; }");
}

#[test]
fn loop_invariant_variable_does_not_keep_a_phi() {
    let module = lower("f(n) { auto x = 5; while (n) { n = n - 1; } return x; }");
    let f = function(&module, "f");

    // Only n needs a phi in the condition block; the x phi is trivial and
    // gets removed again.
    let cond = block(f, "loop0.cond");
    assert_eq!(cond.phis.len(), 1);
    assert_eq!(ret_value(block(f, "loop0.end")), Value::Const(5));
}

#[test]
fn block_labels_reset_per_function() {
    let module = lower("f(a) { if (a) return 1; return 0; } g(b) { if (b) return 2; return 3; }");
    assert!(function(&module, "f").blocks.iter().any(|b| b.label == "if0.cond"));
    assert!(function(&module, "g").blocks.iter().any(|b| b.label == "if0.cond"));
}

#[test]
fn lowering_is_deterministic() {
    let source = "f(n) { auto s = 0; register i = 0; while (i < n) { if (i % 2 == 0 && n > 3) s = s + i; i = i + 1; } return s; }";
    let first = lower(source).to_string();
    let second = lower(source).to_string();
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[test]
fn verify_accepts_a_spread_of_programs() {
    let sources = [
        "f() { return; }",
        "f(a) { return -a + ~a + !a; }",
        "f(a) { if (a > 1) if (a > 2) return 2; else return 1; return 0; }",
        "f(a) { while (a) if (a == 1) return 1; else a = a - 2; return a; }",
        "f(a) { auto p = &a[0]; p[0@1] = 255; return p[0@1]; }",
        "main() { auto buffer = alloc(64); buffer[0@4] = 7; return buffer[0@4]; }",
    ];
    for source in sources {
        lower(source);
    }
}
