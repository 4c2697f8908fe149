//! Call discipline: SEND/SENDB, CALL, SUPER and instance construction.
//!
//! A `SEND ra, sym, n` lays out `[recv, arg1..argn, block]` at window
//! registers `ra..=ra+n+1`. Host built-ins run synchronously against that
//! slice; bytecode methods push a call-info record and advance the window
//! base by `ra`, so the laid-out registers become the callee's frame.

use crate::dispatch::ControlFlow;
use crate::ops::resolve_sym;
use crate::vm::{Vm, VmFlags};
use mica_bytecode::instruction::mk_abc;
use mica_bytecode::{Instruction, Irep, Opcode};
use mica_runtime::{
    BuiltinCall, BuiltinFn, MethodKind, Runtime, RuntimeError, SymId, Value,
};
use std::sync::Arc;

/// Block-slot policy for one send.
enum BlockArg {
    /// SEND: the block slot is cleared to nil.
    SetNil,
    /// SENDB: the block slot must hold nil or a proc.
    Verify,
    /// Arithmetic fallback: the slot beyond the operand is not part of the
    /// call and must not be touched.
    Leave,
}

/// SEND / SENDB entry from the dispatcher.
pub fn op_send(vm: &mut Vm, rt: &mut Runtime, inst: Instruction, with_block: bool) -> ControlFlow {
    let mode = if with_block {
        BlockArg::Verify
    } else {
        BlockArg::SetNil
    };
    send_common(vm, rt, inst, mode)
}

/// Entry for the arithmetic/compare fast paths falling back to a method
/// call with the operator symbol.
pub(crate) fn op_send_fallback(
    vm: &mut Vm,
    rt: &mut Runtime,
    inst: Instruction,
) -> ControlFlow {
    send_common(vm, rt, inst, BlockArg::Leave)
}

fn send_common(vm: &mut Vm, rt: &mut Runtime, inst: Instruction, mode: BlockArg) -> ControlFlow {
    let ra = inst.a();
    let rc = inst.c();
    let bidx = ra + rc + 1;

    match mode {
        BlockArg::SetNil => vm.replace(rt, bidx, Value::Nil),
        BlockArg::Verify => match vm.reg(bidx) {
            Value::Nil | Value::Proc(_) => {}
            _ => {
                rt.console
                    .diag(format_args!("TypeError: block argument is not a proc"));
                return ControlFlow::Continue;
            }
        },
        BlockArg::Leave => {}
    }

    let Some(sym) = resolve_sym(vm, rt, inst.b()) else {
        return ControlFlow::Continue;
    };
    send_by_sym(vm, rt, ra, rc, sym)
}

/// Dispatch `sym` on the receiver at window register `ra` with `rc` args.
pub(crate) fn send_by_sym(
    vm: &mut Vm,
    rt: &mut Runtime,
    ra: usize,
    rc: usize,
    sym: SymId,
) -> ControlFlow {
    let recv = vm.reg(ra);
    let cls = rt.class_of(recv);
    let Some(method) = rt.classes.find_method(cls, sym) else {
        let cls_name = rt
            .classes
            .get(cls)
            .map(|c| rt.sym_name(c.sym_id))
            .unwrap_or("?");
        let msg = format!("{}#{}", cls_name, rt.sym_name(sym));
        rt.console
            .diag(format_args!("{}", RuntimeError::UndefinedMethod(msg)));
        return ControlFlow::Continue;
    };

    match method.kind.clone() {
        MethodKind::Builtin(f) => {
            call_builtin(vm, rt, f, ra, rc);
            release_args(vm, rt, ra, rc);
            ControlFlow::Continue
        }
        MethodKind::Bytecode(irep) => enter_method(vm, rt, irep, ra, rc, Some(sym)),
        MethodKind::ProcCall => {
            let Value::Proc(r) = recv else {
                rt.console
                    .diag(format_args!("TypeError: receiver is not a proc"));
                return ControlFlow::Continue;
            };
            let Some(irep) = rt.heap.proc(r).map(|p| p.irep.clone()) else {
                return ControlFlow::Continue;
            };
            enter_method(vm, rt, irep, ra, rc, Some(sym))
        }
        MethodKind::New => op_new(vm, rt, ra, rc),
    }
}

/// Push a call-info and switch into a bytecode method body.
fn enter_method(
    vm: &mut Vm,
    _rt: &mut Runtime,
    irep: Arc<Irep>,
    ra: usize,
    rc: usize,
    mid: Option<SymId>,
) -> ControlFlow {
    vm.push_callinfo(mid, rc);
    match vm.enter_frame(irep, ra) {
        Ok(()) => ControlFlow::Continue,
        Err(e) => {
            vm.callinfo.pop();
            ControlFlow::Fatal(e)
        }
    }
}

/// Run a host built-in against the receiver's register window.
pub(crate) fn call_builtin(vm: &mut Vm, rt: &mut Runtime, f: BuiltinFn, ra: usize, rc: usize) {
    let base = vm.current + ra;
    let vm_id = vm.id;
    let mut call = BuiltinCall {
        rt,
        argv: &mut vm.regs[base..],
        argc: rc,
        vm_id,
        wait: &mut vm.wait,
        error_code: &mut vm.error_code,
    };
    f(&mut call);
    // A built-in that parked the VM or flagged an error must cut the
    // dispatch loop at the next boundary.
    if vm.wait.is_some() || vm.error_code != 0 {
        vm.signals.set_preempt();
    }
}

/// Release the argument and block slots after a synchronous built-in call.
pub(crate) fn release_args(vm: &mut Vm, rt: &mut Runtime, ra: usize, rc: usize) {
    for i in (ra + 1)..=(ra + rc + 1) {
        let abs = vm.current + i;
        vm.release_abs(rt, abs);
    }
}

/// CALL: invoke the proc held in window register 0 (block entry). The
/// window base does not move.
pub fn op_call(vm: &mut Vm, rt: &mut Runtime, _inst: Instruction) -> ControlFlow {
    let Value::Proc(r) = vm.reg(0) else {
        rt.console
            .diag(format_args!("TypeError: self is not a proc"));
        return ControlFlow::Continue;
    };
    let Some(irep) = rt.heap.proc(r).map(|p| p.irep.clone()) else {
        return ControlFlow::Continue;
    };
    vm.push_callinfo(None, 0);
    vm.pc = 0;
    vm.pc_irep = irep;
    ControlFlow::Continue
}

/// SUPER: re-dispatch the current method's symbol starting above the class
/// that would resolve it for the receiver. The receiver's class pointer is
/// moved to the defining class so chained supers keep climbing.
pub fn op_super(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let ra = inst.a();
    let rc = inst.c();

    // Copy self into the receiver slot, like LOADSELF.
    let this = vm.reg(0);
    rt.dup(this);
    vm.replace(rt, ra, this);

    let Some(sym) = vm.callinfo.last().and_then(|ci| ci.mid) else {
        rt.console
            .diag(format_args!("super called outside of method"));
        return ControlFlow::Continue;
    };
    let Value::Object(obj) = vm.reg(ra) else {
        rt.console
            .diag(format_args!("TypeError: super on a non-instance"));
        return ControlFlow::Continue;
    };
    let Some(inst_cls) = rt.heap.instance(obj).map(|i| i.class) else {
        return ControlFlow::Continue;
    };
    let Some((found_cls, method)) = rt.classes.find_super_method(inst_cls, sym) else {
        // No super method: quietly fall through.
        return ControlFlow::Continue;
    };
    let kind = method.kind.clone();

    if let Some(i) = rt.heap.instance_mut(obj) {
        i.class = found_cls;
    }

    match kind {
        MethodKind::Builtin(f) => {
            call_builtin(vm, rt, f, ra, rc);
            release_args(vm, rt, ra, rc);
            ControlFlow::Continue
        }
        MethodKind::Bytecode(irep) => enter_method(vm, rt, irep, ra, rc, Some(sym)),
        _ => ControlFlow::Continue,
    }
}

// =============================================================================
// Instance construction
// =============================================================================

/// `new`: allocate the instance, run `initialize` when the class chain has
/// one, and leave the instance in the return slot.
fn op_new(vm: &mut Vm, rt: &mut Runtime, ra: usize, rc: usize) -> ControlFlow {
    let Value::Class(cls) = vm.reg(ra) else {
        rt.console
            .diag(format_args!("TypeError: new on a non-class receiver"));
        return ControlFlow::Continue;
    };
    let instance = match rt.heap.new_instance(&mut rt.pool, vm.id, cls) {
        Ok(v) => v,
        Err(e) => return ControlFlow::Fatal(e),
    };
    vm.replace(rt, ra, instance);

    if let Some(init_sym) = rt.sym("initialize") {
        if let Some(method) = rt.classes.find_method(cls, init_sym) {
            match method.kind.clone() {
                MethodKind::Bytecode(_) => {
                    if let ControlFlow::Fatal(e) = run_initialize_stub(vm, rt, ra, rc) {
                        return ControlFlow::Fatal(e);
                    }
                    if vm.flags.contains(VmFlags::REGS_RELEASED) {
                        // initialize executed STOP; nothing left to run.
                        return ControlFlow::Halt;
                    }
                }
                MethodKind::Builtin(f) => call_builtin(vm, rt, f, ra, rc),
                _ => {}
            }
        }
    }

    release_args(vm, rt, ra, rc);
    ControlFlow::Continue
}

/// Execute `initialize` through a synthetic two-instruction unit
/// (`SEND initialize; ABORT`) so the constructor runs with normal call
/// discipline, then restore the receiver into the return slot.
fn run_initialize_stub(vm: &mut Vm, rt: &mut Runtime, ra: usize, rc: usize) -> ControlFlow {
    let instance = vm.reg(ra);
    rt.dup(instance);

    let stub = Arc::new(Irep {
        nlocals: 0,
        nregs: (rc + 2) as u16,
        code: vec![
            mk_abc(Opcode::Send, 0, 0, rc),
            mk_abc(Opcode::Abort, 0, 0, 0),
        ],
        pools: Vec::new(),
        sym_names: vec!["initialize".into()],
        reps: Vec::new(),
    });

    let saved_irep = vm.pc_irep.clone();
    let saved_pc = vm.pc;
    let saved_current = vm.current;
    let saved_target = vm.target_class;

    if let Err(e) = vm.enter_frame(stub, ra) {
        rt.release(instance);
        return ControlFlow::Fatal(e);
    }

    loop {
        match vm.step(rt) {
            ControlFlow::Continue => {}
            ControlFlow::Halt => break,
            ControlFlow::Fatal(e) => {
                rt.release(instance);
                return ControlFlow::Fatal(e);
            }
        }
    }
    vm.flags.remove(VmFlags::HALTED);

    vm.pc_irep = saved_irep;
    vm.pc = saved_pc;
    vm.current = saved_current;
    vm.target_class = saved_target;

    // Discard initialize's return value; `new` answers the instance.
    vm.replace(rt, ra, instance);
    ControlFlow::Continue
}
