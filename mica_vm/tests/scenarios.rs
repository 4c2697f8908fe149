//! End-to-end scenarios over hand-assembled bytecode.

mod support;

use mica_bytecode::PoolValue;
use mica_runtime::{CaptureHal, Runtime, Value};
use mica_vm::{builtins, Vm};
use std::sync::Arc;
use support::*;

/// Run one IREP on a bare VM (no scheduler), returning the VM, runtime and
/// console capture. Programs end with ABORT when register contents are
/// inspected afterwards.
fn raw_run(top: mica_bytecode::Irep) -> (Vm, Runtime, Arc<CaptureHal>) {
    let hal = Arc::new(CaptureHal::new());
    let mut rt = Runtime::with_hal(64 * 1024, hal.clone());
    builtins::install(&mut rt);
    let mut vm = Vm::new(1, Arc::new(top));
    vm.run(&mut rt);
    (vm, rt, hal)
}

// =============================================================================
// S1 - arithmetic fast path
// =============================================================================

#[test]
fn s1_add_fast_path() {
    let top = irep(
        4,
        vec![
            asbx(Op::LoadI, 1, 1),
            asbx(Op::LoadI, 2, 2),
            abc(Op::Add, 1, 0, 1),
            abc(Op::Abort, 0, 0, 0),
        ],
        vec![],
        &["+"],
        vec![],
    );
    let (vm, _, _) = raw_run(top);
    assert_eq!(vm.regs[1], Value::Fixnum(3));
}

#[test]
fn fixnum_arithmetic_wraps() {
    let cases: &[(i64, i64)] = &[
        (i64::MAX, 1),
        (i64::MIN, -1),
        (123_456_789, 987_654_321),
        (-5, 3),
    ];
    for &(a, b) in cases {
        for (op, expect) in [
            (Op::Add, a.wrapping_add(b)),
            (Op::Sub, a.wrapping_sub(b)),
            (Op::Mul, a.wrapping_mul(b)),
            (Op::Div, a.wrapping_div(b)),
        ] {
            let top = irep(
                4,
                vec![
                    abx(Op::LoadL, 1, 0),
                    abx(Op::LoadL, 2, 1),
                    abc(op, 1, 0, 1),
                    abc(Op::Abort, 0, 0, 0),
                ],
                vec![PoolValue::Fixnum(a), PoolValue::Fixnum(b)],
                &["+"],
                vec![],
            );
            let (vm, _, _) = raw_run(top);
            assert_eq!(vm.regs[1], Value::Fixnum(expect), "{:?} {} {}", op, a, b);
        }
    }
}

#[test]
fn division_by_zero_prints_and_yields_nil() {
    let top = irep(
        4,
        vec![
            asbx(Op::LoadI, 1, 1),
            asbx(Op::LoadI, 2, 0),
            abc(Op::Div, 1, 0, 1),
            abc(Op::Abort, 0, 0, 0),
        ],
        vec![],
        &["/"],
        vec![],
    );
    let (vm, _, hal) = raw_run(top);
    assert!(hal.contents().contains("ZeroDivisionError"));
    assert_eq!(vm.regs[1], Value::Nil);
}

#[test]
fn addi_on_non_numeric_is_a_diagnostic() {
    let top = irep(
        3,
        vec![
            abc(Op::LoadNil, 1, 0, 0),
            abc(Op::AddI, 1, 0, 7),
            asbx(Op::LoadI, 2, 5),
            abc(Op::Abort, 0, 0, 0),
        ],
        vec![],
        &[],
        vec![],
    );
    let (vm, _, hal) = raw_run(top);
    assert!(hal.contents().contains("TypeError"));
    // Execution continued past the failing instruction.
    assert_eq!(vm.regs[2], Value::Fixnum(5));
}

// =============================================================================
// S2 - method dispatch through the class hierarchy
// =============================================================================

/// `class A; def hello; 42; end; end / class B < A; end / B.new.hello`
fn dispatch_program() -> mica_bytecode::Irep {
    let hello_body = irep(
        3,
        vec![asbx(Op::LoadI, 1, 42), abc(Op::Return, 1, 0, 0)],
        vec![],
        &[],
        vec![],
    );
    let a_body = irep(
        4,
        vec![
            abc(Op::TClass, 1, 0, 0),
            bz(Op::Lambda, 2, 0),
            abc(Op::Method, 1, 0, 0),
            abc(Op::Return, 0, 0, 0),
        ],
        vec![],
        &["hello"],
        vec![hello_body],
    );
    let b_body = irep(2, vec![abc(Op::Return, 0, 0, 0)], vec![], &[], vec![]);

    // syms: 0="A" 1="B" 2="hello" 3="new" 4="$result"
    irep(
        4,
        vec![
            abc(Op::LoadNil, 2, 0, 0),
            abc(Op::Class, 1, 0, 0),
            abx(Op::Exec, 1, 0),
            abx(Op::GetConst, 2, 0),
            abc(Op::Class, 1, 1, 0),
            abx(Op::Exec, 1, 1),
            abx(Op::GetConst, 1, 1),
            abc(Op::Send, 1, 3, 0),
            abc(Op::Send, 1, 2, 0),
            abx(Op::SetGlobal, 1, 4),
            abc(Op::Stop, 0, 0, 0),
        ],
        vec![],
        &["A", "B", "hello", "new", "$result"],
        vec![a_body, b_body],
    )
}

#[test]
fn s2_inherited_method_dispatch() {
    let (mut interp, _hal) = capture_interp(64 * 1024);
    interp.create_task(&blob(&dispatch_program()), 0).unwrap();
    assert_eq!(interp.run(), 0);

    let rt = interp.runtime_mut();
    let result = rt.sym("$result").and_then(|s| rt.globals.get(s));
    assert_eq!(result, Some(Value::Fixnum(42)));

    // Lookup left both method chains untouched.
    let a_sym = rt.sym("A").unwrap();
    let b_sym = rt.sym("B").unwrap();
    let (Some(Value::Class(a)), Some(Value::Class(b))) =
        (rt.consts.get(a_sym), rt.consts.get(b_sym))
    else {
        panic!("classes not defined");
    };
    assert_eq!(rt.classes.get(a).unwrap().method_count(), 1);
    assert_eq!(rt.classes.get(b).unwrap().method_count(), 0);
}

#[test]
fn subclass_override_wins_and_super_reaches_parent() {
    let a_hello = irep(
        3,
        vec![asbx(Op::LoadI, 1, 32), abc(Op::Return, 1, 0, 0)],
        vec![],
        &[],
        vec![],
    );
    let a_body = irep(
        4,
        vec![
            abc(Op::TClass, 1, 0, 0),
            bz(Op::Lambda, 2, 0),
            abc(Op::Method, 1, 0, 0),
            abc(Op::Return, 0, 0, 0),
        ],
        vec![],
        &["hello"],
        vec![a_hello],
    );
    // B#hello: super + 10
    let b_hello = irep(
        3,
        vec![
            abc(Op::Super, 1, 0, 0),
            abc(Op::AddI, 1, 0, 10),
            abc(Op::Return, 1, 0, 0),
        ],
        vec![],
        &[],
        vec![],
    );
    let b_body = irep(
        4,
        vec![
            abc(Op::TClass, 1, 0, 0),
            bz(Op::Lambda, 2, 0),
            abc(Op::Method, 1, 0, 0),
            abc(Op::Return, 0, 0, 0),
        ],
        vec![],
        &["hello"],
        vec![b_hello],
    );

    let top = irep(
        4,
        vec![
            abc(Op::LoadNil, 2, 0, 0),
            abc(Op::Class, 1, 0, 0),
            abx(Op::Exec, 1, 0),
            abx(Op::GetConst, 2, 0),
            abc(Op::Class, 1, 1, 0),
            abx(Op::Exec, 1, 1),
            abx(Op::GetConst, 1, 1),
            abc(Op::Send, 1, 3, 0),
            abc(Op::Send, 1, 2, 0),
            abx(Op::SetGlobal, 1, 4),
            abc(Op::Stop, 0, 0, 0),
        ],
        vec![],
        &["A", "B", "hello", "new", "$result"],
        vec![a_body, b_body],
    );

    let (mut interp, _hal) = capture_interp(64 * 1024);
    interp.create_task(&blob(&top), 0).unwrap();
    assert_eq!(interp.run(), 0);

    let rt = interp.runtime_mut();
    let result = rt.sym("$result").and_then(|s| rt.globals.get(s));
    assert_eq!(result, Some(Value::Fixnum(42)));
}

// =============================================================================
// S3 - globals are shared across VMs
// =============================================================================

#[test]
fn s3_global_round_trip_across_vms() {
    let writer = irep(
        3,
        vec![
            asbx(Op::LoadI, 1, 7),
            abx(Op::SetGlobal, 1, 0),
            abc(Op::Stop, 0, 0, 0),
        ],
        vec![],
        &["$x"],
        vec![],
    );
    let reader = irep(
        4,
        vec![
            abc(Op::LoadSelf, 1, 0, 0),
            abx(Op::GetGlobal, 2, 0),
            abc(Op::Send, 1, 1, 1),
            abc(Op::Stop, 0, 0, 0),
        ],
        vec![],
        &["$x", "puts"],
        vec![],
    );

    let (mut interp, hal) = capture_interp(64 * 1024);
    interp.create_task(&blob(&writer), 0).unwrap();
    interp.create_task(&blob(&reader), 0).unwrap();
    assert_eq!(interp.run(), 0);

    assert_eq!(hal.contents(), "7\n");
    let rt = interp.runtime_mut();
    let x = rt.sym("$x").and_then(|s| rt.globals.get(s));
    assert_eq!(x, Some(Value::Fixnum(7)));
}

// =============================================================================
// S5 - refcounting and teardown accounting
// =============================================================================

#[test]
fn s5_array_drop_returns_memory() {
    let top = irep(
        6,
        vec![
            asbx(Op::LoadI, 2, 1),
            asbx(Op::LoadI, 3, 2),
            asbx(Op::LoadI, 4, 3),
            abc(Op::Array, 1, 2, 3),
            abc(Op::LoadNil, 1, 0, 0),
            abc(Op::Abort, 0, 0, 0),
        ],
        vec![],
        &[],
        vec![],
    );
    let hal = Arc::new(CaptureHal::new());
    let mut rt = Runtime::with_hal(64 * 1024, hal);
    builtins::install(&mut rt);
    let baseline = rt.statistics().used;

    let mut vm = Vm::new(1, Arc::new(top));
    vm.run(&mut rt);

    assert_eq!(rt.heap.live(), 0);
    assert_eq!(rt.statistics().used, baseline);
}

#[test]
fn stop_reclaims_even_reference_cycles() {
    // a = []; a[0] = a; STOP - the cycle never refcounts to zero, the
    // teardown sweep reclaims it.
    let top = irep(
        5,
        vec![
            abc(Op::Array, 1, 2, 0),
            asbx(Op::LoadI, 2, 0),
            abc(Op::Move, 3, 1, 0),
            abc(Op::Send, 1, 0, 2),
            abc(Op::Stop, 0, 0, 0),
        ],
        vec![],
        &["[]="],
        vec![],
    );

    let (mut interp, _hal) = capture_interp(64 * 1024);
    let baseline = interp.statistics().used;
    interp.create_task(&blob(&top), 0).unwrap();
    assert_eq!(interp.run(), 0);
    assert_eq!(interp.statistics().used, baseline);
}

// =============================================================================
// S6 - loader rejection
// =============================================================================

#[test]
fn s6_bad_container_is_rejected_without_installation() {
    let (mut interp, _hal) = capture_interp(64 * 1024);
    let before = interp.statistics();

    // Not a container at all.
    assert!(interp.create_task(b"garbage", 0).is_err());

    // Valid container with a lying ilen.
    let mut bad = blob(&irep(
        2,
        vec![abc(Op::Stop, 0, 0, 0)],
        vec![],
        &[],
        vec![],
    ));
    let ilen_at = 22 + 8 + 4 + 6;
    bad[ilen_at..ilen_at + 4].copy_from_slice(&0x00ff_0000u32.to_be_bytes());
    assert!(interp.create_task(&bad, 0).is_err());

    assert_eq!(interp.statistics(), before);
    assert_eq!(interp.run(), 0);
}

// =============================================================================
// Diagnostics keep the VM alive
// =============================================================================

#[test]
fn undefined_method_prints_and_continues() {
    let top = irep(
        4,
        vec![
            abc(Op::LoadSelf, 1, 0, 0),
            abc(Op::Send, 1, 0, 0),
            asbx(Op::LoadI, 2, 5),
            abx(Op::SetGlobal, 2, 1),
            abc(Op::Stop, 0, 0, 0),
        ],
        vec![],
        &["nope", "$after"],
        vec![],
    );

    let (mut interp, hal) = capture_interp(64 * 1024);
    interp.create_task(&blob(&top), 0).unwrap();
    assert_eq!(interp.run(), 0);

    assert!(hal.contents().contains("NoMethodError"));
    let rt = interp.runtime_mut();
    let after = rt.sym("$after").and_then(|s| rt.globals.get(s));
    assert_eq!(after, Some(Value::Fixnum(5)));
}

#[test]
fn uninitialized_constant_prints_name_error() {
    let top = irep(
        3,
        vec![abx(Op::GetConst, 1, 0), abc(Op::Stop, 0, 0, 0)],
        vec![],
        &["Missing"],
        vec![],
    );
    let (mut interp, hal) = capture_interp(64 * 1024);
    interp.create_task(&blob(&top), 0).unwrap();
    assert_eq!(interp.run(), 0);
    assert!(hal.contents().contains("uninitialized constant Missing"));
}

// =============================================================================
// Blocks, upvars, argument marshalling
// =============================================================================

#[test]
fn block_reads_upvar_from_defining_frame() {
    // x = 77; go { x } where go calls its block.
    let block_body = irep(
        3,
        vec![abc(Op::GetUpvar, 1, 1, 0), abc(Op::Return, 1, 0, 0)],
        vec![],
        &[],
        vec![],
    );
    let go_body = irep(
        4,
        vec![abc(Op::Send, 1, 0, 0), abc(Op::Return, 1, 0, 0)],
        vec![],
        &["call"],
        vec![],
    );
    let top = irep(
        6,
        vec![
            abc(Op::TClass, 1, 0, 0),
            bz(Op::Lambda, 2, 1),
            abc(Op::Method, 1, 0, 0),
            asbx(Op::LoadI, 1, 77),
            abc(Op::LoadSelf, 2, 0, 0),
            bz(Op::Lambda, 3, 0),
            abc(Op::SendB, 2, 0, 0),
            abx(Op::SetGlobal, 2, 1),
            abc(Op::Stop, 0, 0, 0),
        ],
        vec![],
        &["go", "$r"],
        vec![block_body, go_body],
    );

    let (mut interp, _hal) = capture_interp(64 * 1024);
    interp.create_task(&blob(&top), 0).unwrap();
    assert_eq!(interp.run(), 0);

    let rt = interp.runtime_mut();
    let r = rt.sym("$r").and_then(|s| rt.globals.get(s));
    assert_eq!(r, Some(Value::Fixnum(77)));
}

#[test]
fn enter_fills_optional_arguments() {
    // def m(a, b = 9); b; end
    let m_body = irep(
        4,
        vec![
            enter_sig(1, 1),
            asbx(Op::LoadI, 2, 9),
            abc(Op::Return, 2, 0, 0),
        ],
        vec![],
        &[],
        vec![],
    );
    let top = irep(
        6,
        vec![
            abc(Op::TClass, 1, 0, 0),
            bz(Op::Lambda, 2, 0),
            abc(Op::Method, 1, 0, 0),
            // m(5) -> default applies
            abc(Op::LoadSelf, 1, 0, 0),
            asbx(Op::LoadI, 2, 5),
            abc(Op::Send, 1, 0, 1),
            abx(Op::SetGlobal, 1, 1),
            // m(5, 42) -> default skipped
            abc(Op::LoadSelf, 1, 0, 0),
            asbx(Op::LoadI, 2, 5),
            asbx(Op::LoadI, 3, 42),
            abc(Op::Send, 1, 0, 2),
            abx(Op::SetGlobal, 1, 2),
            abc(Op::Stop, 0, 0, 0),
        ],
        vec![],
        &["m", "$r1", "$r2"],
        vec![m_body],
    );

    let (mut interp, _hal) = capture_interp(64 * 1024);
    interp.create_task(&blob(&top), 0).unwrap();
    assert_eq!(interp.run(), 0);

    let rt = interp.runtime_mut();
    let r1 = rt.sym("$r1").and_then(|s| rt.globals.get(s));
    let r2 = rt.sym("$r2").and_then(|s| rt.globals.get(s));
    assert_eq!(r1, Some(Value::Fixnum(9)));
    assert_eq!(r2, Some(Value::Fixnum(42)));
}

#[test]
fn sendb_rejects_non_proc_block() {
    let top = irep(
        5,
        vec![
            abc(Op::LoadSelf, 1, 0, 0),
            asbx(Op::LoadI, 2, 3),
            abc(Op::SendB, 1, 0, 0),
            abc(Op::Stop, 0, 0, 0),
        ],
        vec![],
        &["puts"],
        vec![],
    );
    let (mut interp, hal) = capture_interp(64 * 1024);
    interp.create_task(&blob(&top), 0).unwrap();
    assert_eq!(interp.run(), 0);
    assert!(hal.contents().contains("block argument is not a proc"));
}

// =============================================================================
// Containers through bytecode
// =============================================================================

#[cfg(feature = "string")]
#[test]
fn string_literal_and_concat() {
    // "temp: " + 21.to_s via STRCAT
    let top = irep(
        5,
        vec![
            abx(Op::String, 1, 0),
            asbx(Op::LoadI, 2, 21),
            abc(Op::StrCat, 1, 2, 0),
            abc(Op::LoadSelf, 2, 0, 0),
            abc(Op::Move, 3, 1, 0),
            abc(Op::Send, 2, 0, 1),
            abc(Op::Stop, 0, 0, 0),
        ],
        vec![PoolValue::Str(b"temp: ".as_slice().into())],
        &["puts"],
        vec![],
    );
    let (mut interp, hal) = capture_interp(64 * 1024);
    interp.create_task(&blob(&top), 0).unwrap();
    assert_eq!(interp.run(), 0);
    assert_eq!(hal.contents(), "temp: 21\n");
}

#[test]
fn hash_and_range_literals() {
    // h = {1 => 2}; $a = h[1]; r = (1..5); $b = r.last
    let top = irep(
        8,
        vec![
            asbx(Op::LoadI, 2, 1),
            asbx(Op::LoadI, 3, 2),
            abc(Op::Hash, 1, 2, 1),
            asbx(Op::LoadI, 2, 1),
            abc(Op::Send, 1, 0, 1),
            abx(Op::SetGlobal, 1, 2),
            asbx(Op::LoadI, 2, 1),
            asbx(Op::LoadI, 3, 5),
            abc(Op::Range, 1, 2, 0),
            abc(Op::Send, 1, 1, 0),
            abx(Op::SetGlobal, 1, 3),
            abc(Op::Stop, 0, 0, 0),
        ],
        vec![],
        &["[]", "last", "$a", "$b"],
        vec![],
    );
    let (mut interp, _hal) = capture_interp(64 * 1024);
    interp.create_task(&blob(&top), 0).unwrap();
    assert_eq!(interp.run(), 0);

    let rt = interp.runtime_mut();
    let a = rt.sym("$a").and_then(|s| rt.globals.get(s));
    let b = rt.sym("$b").and_then(|s| rt.globals.get(s));
    assert_eq!(a, Some(Value::Fixnum(2)));
    assert_eq!(b, Some(Value::Fixnum(5)));
}

// =============================================================================
// Task limits
// =============================================================================

#[test]
fn task_count_is_bounded_by_vm_bitmap() {
    let prog = blob(&irep(2, vec![abc(Op::Stop, 0, 0, 0)], vec![], &[], vec![]));
    let (mut interp, _hal) = capture_interp(128 * 1024);
    for _ in 0..mica_runtime::config::MAX_VM_COUNT {
        interp.create_task(&prog, 0).unwrap();
    }
    assert!(interp.create_task(&prog, 0).is_err());
}
